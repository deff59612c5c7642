//! Character consistency: personality, speech, habits and traits.
//!
//! Score = 0.4·vector + 0.3·speech + 0.3·behaviour − min(cap, penalty·violations)

use tracing::debug;

use super::lexicon::{self, Text, TraitRule};
use super::ConsistencyResult;
use crate::config::ConsistencyConfig;
use crate::entities::Character;
use crate::types::ContentType;

const VECTOR_WEIGHT: f64 = 0.4;
const SPEECH_WEIGHT: f64 = 0.3;
const BEHAVIOR_WEIGHT: f64 = 0.3;

/// Score `text` against `character`'s declared traits.
#[must_use]
pub fn score(
    character: &Character,
    text: &str,
    content_type: ContentType,
    config: &ConsistencyConfig,
) -> ConsistencyResult {
    let prepared = Text::new(text);
    let mut violations = Vec::new();

    let vector = vector_score(character, text);

    let speech_valid = if content_type.is_voiced() {
        match speech_violation(character, &prepared) {
            Some(v) => {
                violations.push(v);
                false
            }
            None => true,
        }
    } else {
        true
    };

    let habit_violations = habit_violations(character, &prepared);
    let behavior_valid = habit_violations.is_empty();
    violations.extend(habit_violations);
    violations.extend(trait_contradictions(character, &prepared));

    let base = VECTOR_WEIGHT * vector
        + SPEECH_WEIGHT * f64::from(u8::from(speech_valid))
        + BEHAVIOR_WEIGHT * f64::from(u8::from(behavior_valid));
    let penalty = (config.character_violation_penalty * violations.len() as f64)
        .min(config.character_penalty_cap);

    debug!(
        character = %character.name,
        vector,
        speech_valid,
        behavior_valid,
        violations = violations.len(),
        "Scored character consistency"
    );

    let mut result = ConsistencyResult::new(base - penalty, violations, config.pass_threshold);
    result.vector_score = Some(vector);
    result.speech_pattern_valid = Some(speech_valid);
    result.behavior_pattern_valid = Some(behavior_valid);
    result
}

/// Coarse plausibility of the text against the personality vector.
///
/// Not an embedding similarity: characters without a vector are neutral,
/// very short texts carry too little signal, and pronounced personalities
/// (any strong component) get a small bonus.
fn vector_score(character: &Character, text: &str) -> f64 {
    if character.personality_vector.is_empty() {
        return 0.7;
    }
    if text.trim().chars().count() < 10 {
        return 0.5;
    }
    let pronounced = character
        .personality_vector
        .iter()
        .any(|v| *v > 0.7 || *v < 0.3);
    if pronounced { 0.8 } else { 0.7 }
}

fn speech_violation(character: &Character, text: &Text) -> Option<String> {
    let pattern = character
        .speech_pattern
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())?
        .to_lowercase();
    if text.is_empty() {
        return Some(format!("{} has no speech to check: the text is empty", character.name));
    }

    if pattern.contains("formal") || pattern.contains("正式") {
        if let Some(casual) = text.first_of(lexicon::CASUAL_PARTICLES) {
            return Some(format!(
                "Speech pattern mismatch: {} speaks formally but uses \"{casual}\"",
                character.name
            ));
        }
    }
    let rough = ["rough", "crude", "coarse", "粗"].iter().any(|p| pattern.contains(p));
    if rough && text.first_of(lexicon::ROUGH_WORDS).is_none() {
        return Some(format!(
            "Speech pattern mismatch: {} speaks roughly but the text has no rough expressions",
            character.name
        ));
    }
    None
}

/// A habit like "never lies to friends" is broken when every content word
/// of the negated clause shows up in the text.
fn habit_violations(character: &Character, text: &Text) -> Vec<String> {
    character
        .behavioral_habits
        .iter()
        .filter_map(|habit| {
            let clause = negated_clause(habit)?;
            let words = lexicon::content_words(clause);
            if words.is_empty() {
                return None;
            }
            words
                .iter()
                .all(|w| text.has_term(w))
                .then(|| format!("Behavior violation: {} {habit}", character.name))
        })
        .collect()
}

fn negated_clause(habit: &str) -> Option<&str> {
    let lower = habit.to_lowercase();
    // Lowercasing can change byte lengths for some scripts; only slice the
    // original when offsets line up.
    if lower.len() != habit.len() {
        return None;
    }
    let (_, end) = lexicon::HABIT_NEGATIONS
        .iter()
        .filter_map(|m| lexicon::find_marker(&lower, m))
        .min_by_key(|(start, _)| *start)?;
    let rest = &habit[end..];
    let clause = rest
        .split([',', '.', ';', '，', '。', '；'])
        .next()
        .unwrap_or(rest)
        .trim();
    (!clause.is_empty()).then_some(clause)
}

fn trait_contradictions(character: &Character, text: &Text) -> Vec<String> {
    let declared: Vec<String> = character
        .personality_traits
        .iter()
        .map(|t| t.trim().to_lowercase())
        .collect();

    lexicon::TRAIT_RULES
        .iter()
        .filter_map(|rule: &TraitRule| {
            let trait_name = rule
                .traits
                .iter()
                .find(|t| declared.iter().any(|d| d == *t))?;
            let hit = text.first_of(rule.contradictions)?;
            Some(format!(
                "Trait contradiction: {} is {trait_name} but the text shows \"{hit}\"",
                character.name
            ))
        })
        .collect()
}
