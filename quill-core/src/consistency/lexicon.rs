//! Word lists and light-weight text matching for the lexical checks.
//!
//! Matching is deliberately shallow: lowercase tokens, a crude suffix
//! stemmer, and substring search for CJK terms (which have no spaces).

/// Casual particles that break a formal speech pattern.
pub const CASUAL_PARTICLES: &[&str] = &[
    "gonna", "wanna", "gotta", "yeah", "yep", "nope", "kinda", "sorta", "ain't", "y'all", "dude",
    "哈哈", "嘛", "呗", "咋", "啥",
];

/// Expressions a rough or crude speaker is expected to use.
pub const ROUGH_WORDS: &[&str] = &[
    "damn", "hell", "bloody", "bastard", "crap", "shut up", "idiot", "老子", "妈的", "滚", "混蛋",
];

/// Markers that introduce a negated behaviour in a habit description.
pub const HABIT_NEGATIONS: &[&str] = &[
    "must not", "does not", "doesn't", "will not", "won't", "never", "avoids", "avoid", "refuses to",
    "从不", "绝不", "决不", "不会",
];

/// Markers placed before the prohibited thing ("Mortals may not ...").
pub const PROHIBITION_PREFIXES: &[&str] = &[
    "may not", "must not", "must never", "cannot", "can not", "can't", "never", "禁止", "不得", "不能",
    "不可",
];

/// Prefix markers that only forbid when they open the sentence ("No firearms exist").
pub const LEADING_PROHIBITIONS: &[&str] = &["no"];

/// Markers placed after the prohibited thing ("Magic is forbidden").
pub const PROHIBITION_POSTFIXES: &[&str] = &[
    "is forbidden",
    "are forbidden",
    "is prohibited",
    "are prohibited",
    "is banned",
    "are banned",
    "is not allowed",
    "are not allowed",
    "is impossible",
    "are impossible",
    "被禁止",
    "是禁止的",
];

/// Prepositions that introduce the place a prohibition applies to.
pub const SCOPE_MARKERS: &[&str] = &["inside", "within", "in", "在"];

/// Words carrying no meaning for rule matching.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "for", "by", "and", "or", "any", "all", "one", "anyone", "anybody",
    "may", "be", "is", "are", "use", "using", "his", "her", "their", "its", "with", "from", "than",
    "that", "this", "ever", "someone", "somebody", "he", "she", "they", "it", "at", "on",
];

/// Concepts and the surface words that count as evidence of them.
pub const CONCEPTS: &[(&str, &[&str])] = &[
    ("magic", &["magic", "spell", "sorcery", "enchant", "cast", "incantation", "wizardry"]),
    ("spell", &["spell", "cast", "incantation", "magic"]),
    ("weapon", &["weapon", "sword", "blade", "dagger", "gun", "bow"]),
    ("kill", &["kill", "slay", "murder", "slain"]),
    ("fly", &["fly", "flew", "flying", "flight", "soar"]),
    ("teleport", &["teleport", "blink", "vanish", "reappear"]),
    ("resurrect", &["resurrect", "revive", "raise the dead", "came back to life"]),
    ("faster-than-light", &["faster-than-light", "ftl", "warp"]),
    ("魔法", &["魔法", "法术", "咒语", "施法"]),
];

/// A declared trait and the language that contradicts it.
#[derive(Debug)]
pub struct TraitRule {
    /// Trait names (any of them triggers the rule).
    pub traits: &'static [&'static str],
    /// Phrases that contradict the trait.
    pub contradictions: &'static [&'static str],
}

/// Trait-contradiction lexicon.
pub const TRAIT_RULES: &[TraitRule] = &[
    TraitRule {
        traits: &["brave", "courageous", "fearless", "bold", "勇敢", "无畏"],
        contradictions: &[
            "terrified", "afraid", "cowered", "cowering", "fled in fear", "ran away", "panicked",
            "trembled with fear", "refused to move", "froze in fear", "害怕", "恐惧", "吓得", "逃跑",
        ],
    },
    TraitRule {
        traits: &["cautious", "careful", "prudent", "谨慎", "小心"],
        contradictions: &[
            "recklessly", "without thinking", "rushed headlong", "impulsively", "charged in blindly",
            "鲁莽", "冲动",
        ],
    },
    TraitRule {
        traits: &["gentle", "kind", "kind-hearted", "温柔", "善良"],
        contradictions: &["brutally", "viciously", "cruelly", "savagely", "sneered", "残忍", "暴力"],
    },
    TraitRule {
        traits: &["calm", "composed", "serene", "冷静", "沉着"],
        contradictions: &[
            "screamed", "exploded with rage", "lost his temper", "lost her temper", "lost their temper",
            "shouted furiously", "flew into a rage", "暴怒", "尖叫",
        ],
    },
    TraitRule {
        traits: &["honest", "truthful", "sincere", "诚实", "真诚"],
        contradictions: &["lied", "deceived", "tricked", "a bald-faced lie", "撒谎", "欺骗"],
    },
];

/// A piece of text prepared for repeated lexical lookups.
#[derive(Debug)]
pub struct Text {
    lower: String,
    tokens: Vec<String>,
    stems: Vec<String>,
}

impl Text {
    /// Prepare `raw` for matching.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let tokens = tokenize(&lower);
        let stems = tokens.iter().map(|t| stem(t)).collect();
        Self {
            lower,
            tokens,
            stems,
        }
    }

    /// Lowercased source text.
    #[must_use]
    pub fn lower(&self) -> &str {
        &self.lower
    }

    /// Whether the text has no word tokens at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether a single term occurs, by stem or as a word prefix.
    #[must_use]
    pub fn has_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return false;
        }
        if is_cjk(&term) {
            return self.lower.contains(&term);
        }
        let words = tokenize(&term);
        if words.len() > 1 {
            return self.has_phrase(&term);
        }
        let Some(word) = words.first() else {
            return false;
        };
        // Prefix matching only for longer words, so "cast" never hits "castle".
        let wanted = stem(word);
        self.stems.iter().any(|s| same_stem(s, &wanted))
            || (word.len() >= 5 && self.tokens.iter().any(|t| t.starts_with(word.as_str())))
    }

    /// Whether the words of `phrase` occur consecutively.
    #[must_use]
    pub fn has_phrase(&self, phrase: &str) -> bool {
        let phrase = phrase.trim().to_lowercase();
        if is_cjk(&phrase) {
            return self.lower.contains(&phrase);
        }
        let words = tokenize(&phrase);
        if words.is_empty() || words.len() > self.tokens.len() {
            return false;
        }
        self.tokens.windows(words.len()).any(|window| {
            window
                .iter()
                .zip(&words)
                .all(|(t, w)| t == w || same_stem(&stem(t), &stem(w)))
        })
    }

    /// The first phrase from `phrases` that occurs.
    #[must_use]
    pub fn first_of<'a>(&self, phrases: &[&'a str]) -> Option<&'a str> {
        phrases.iter().copied().find(|p| self.has_phrase(p))
    }
}

/// Split lowercase text into word tokens (apostrophes kept inside words).
#[must_use]
pub fn tokenize(lower: &str) -> Vec<String> {
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strip common English inflections so "lies"/"lied" and "spells"/"spell" meet.
#[must_use]
pub fn stem(word: &str) -> String {
    if word.chars().count() < 4 || !word.is_ascii() {
        return word.to_string();
    }
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(root) = word.strip_suffix(suffix) {
            if root.len() >= 2 {
                return root.to_string();
            }
        }
    }
    word.to_string()
}

/// Stems are equal, or differ only by a silent trailing "e" ("hors"/"horse").
#[must_use]
pub fn same_stem(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= 2 && long.len() == short.len() + 1 && long.starts_with(short) && long.ends_with('e')
}

/// Content words of a clause, stopwords removed.
#[must_use]
pub fn content_words(clause: &str) -> Vec<String> {
    let lower = clause.to_lowercase();
    if is_cjk(lower.trim()) {
        let trimmed = lower.trim().to_string();
        return if trimmed.is_empty() { Vec::new() } else { vec![trimmed] };
    }
    tokenize(&lower)
        .into_iter()
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Surface words that count as evidence for `word`.
#[must_use]
pub fn expand_concept(word: &str) -> Vec<String> {
    CONCEPTS
        .iter()
        .find(|(concept, _)| *concept == word || stem(concept) == stem(word))
        .map_or_else(
            || vec![word.to_string()],
            |(_, alts)| alts.iter().map(|a| (*a).to_string()).collect(),
        )
}

/// Whether the text is written in a script without word spacing.
#[must_use]
pub fn is_cjk(text: &str) -> bool {
    text.chars().any(|c| matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3040}'..='\u{30FF}'))
}

/// Byte range of the first whole-word occurrence of `marker` in `lower`.
#[must_use]
pub fn find_marker(lower: &str, marker: &str) -> Option<(usize, usize)> {
    if is_cjk(marker) {
        return lower.find(marker).map(|start| (start, start + marker.len()));
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '\'';
    let mut from = 0;
    while let Some(offset) = lower[from..].find(marker) {
        let start = from + offset;
        let end = start + marker.len();
        let before_ok = lower[..start].chars().next_back().is_none_or(|c| !is_word(c));
        let after_ok = lower[end..].chars().next().is_none_or(|c| !is_word(c));
        if before_ok && after_ok {
            return Some((start, end));
        }
        from = end;
    }
    None
}

/// Split a rule text into sentences.
#[must_use]
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', ';', '!', '\n', '。', '；', '！'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_meet_across_inflections() {
        assert_eq!(stem("lies"), stem("lied"));
        assert_eq!(stem("spells"), "spell");
        assert_eq!(stem("casting"), "cast");
        assert_eq!(stem("war"), "war");
    }

    #[test]
    fn phrases_match_on_word_boundaries() {
        let text = Text::new("Her heartbeat slowed. Alex refused to move.");
        assert!(text.has_phrase("refused to move"));
        assert!(!text.has_phrase("beat"));
        assert!(text.has_term("MOVE"));
    }

    #[test]
    fn cjk_terms_use_substring_search() {
        let text = Text::new("他吓得不敢动");
        assert!(text.has_term("吓得"));
        assert!(is_cjk("魔法"));
        assert!(!is_cjk("magic"));
    }

    #[test]
    fn content_words_drop_stopwords() {
        assert_eq!(content_words("No one may use magic"), vec!["no", "magic"]);
        assert_eq!(expand_concept("magic")[1], "spell");
        assert_eq!(expand_concept("bread"), vec!["bread"]);
    }

    #[test]
    fn sentences_split_on_mixed_punctuation() {
        assert_eq!(sentences("A. B; C。"), vec!["A", "B", "C"]);
    }
}
