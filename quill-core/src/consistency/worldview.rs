//! Worldview consistency: prohibitions in rules, constraints and physics.
//!
//! Score = 1 − min(cap, penalty·rule_violations) − physics_penalty·[physics broken]

use tracing::debug;

use super::lexicon::{self, Text};
use super::ConsistencyResult;
use crate::config::ConsistencyConfig;
use crate::entities::Worldview;

/// Something a worldview sentence forbids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prohibition {
    /// Every group must be evidenced in the text; any word of a group will do.
    pub object: Vec<Vec<String>>,
    /// Optional place the prohibition is limited to.
    pub scope: Vec<Vec<String>>,
    /// The sentence the prohibition came from.
    pub source: String,
}

impl Prohibition {
    /// Whether `text` does the forbidden thing (inside the scope, if any).
    #[must_use]
    pub fn is_violated_by(&self, text: &Text) -> bool {
        let evidenced = |groups: &[Vec<String>]| {
            groups
                .iter()
                .all(|alts| alts.iter().any(|w| text.has_term(w)))
        };
        !self.object.is_empty() && evidenced(&self.object) && evidenced(&self.scope)
    }
}

/// Extract a prohibition from one sentence, if it states one.
#[must_use]
pub fn extract_prohibition(sentence: &str) -> Option<Prohibition> {
    let lower = sentence.trim().to_lowercase();

    // "X is forbidden [in Y]"
    let postfix = lexicon::PROHIBITION_POSTFIXES
        .iter()
        .filter_map(|m| lexicon::find_marker(&lower, m))
        .min_by_key(|(start, _)| *start);
    let (object, scope) = if let Some((start, end)) = postfix {
        (&lower[..start], scope_of(&lower[end..]))
    } else {
        // "[Someone] may not X [in Y]"
        let (_, end) = lexicon::PROHIBITION_PREFIXES
            .iter()
            .filter_map(|m| lexicon::find_marker(&lower, m))
            .chain(
                lexicon::LEADING_PROHIBITIONS
                    .iter()
                    .filter_map(|m| lexicon::find_marker(&lower, m))
                    .filter(|(start, _)| *start == 0),
            )
            .min_by_key(|(start, _)| *start)?;
        split_scope(&lower[end..])
    };

    let object: Vec<Vec<String>> = lexicon::content_words(object)
        .iter()
        .map(|w| lexicon::expand_concept(w))
        .collect();
    if object.is_empty() {
        return None;
    }
    let scope = scope
        .map(|s| {
            lexicon::content_words(s)
                .iter()
                .map(|w| vec![w.clone()])
                .collect()
        })
        .unwrap_or_default();

    Some(Prohibition {
        object,
        scope,
        source: sentence.trim().to_string(),
    })
}

/// Everything after a scope preposition, if the remainder starts with one.
fn scope_of(rest: &str) -> Option<&str> {
    let rest = rest.trim_start();
    lexicon::SCOPE_MARKERS.iter().find_map(|m| {
        let (start, end) = lexicon::find_marker(rest, m)?;
        (start == 0).then(|| rest[end..].trim()).filter(|s| !s.is_empty())
    })
}

/// Split "cast spells inside the capital" into object and scope.
fn split_scope(rest: &str) -> (&str, Option<&str>) {
    let found = lexicon::SCOPE_MARKERS
        .iter()
        .filter_map(|m| lexicon::find_marker(rest, m))
        .min_by_key(|(start, _)| *start);
    match found {
        Some((start, end)) => {
            let scope = rest[end..].trim();
            (&rest[..start], (!scope.is_empty()).then_some(scope))
        }
        None => (rest, None),
    }
}

/// Score `text` against `worldview`.
#[must_use]
pub fn score(worldview: &Worldview, text: &str, config: &ConsistencyConfig) -> ConsistencyResult {
    let prepared = Text::new(text);
    let mut violations = rule_violations(worldview, &prepared);
    let rule_count = violations.len();

    let physics_broken = physics_violations(worldview, &prepared);
    let physics_ok = physics_broken.is_empty();
    violations.extend(physics_broken);

    scan_terminology(worldview, text);

    let penalty = (config.worldview_violation_penalty * rule_count as f64)
        .min(config.worldview_penalty_cap);
    let physics_penalty = if physics_ok { 0.0 } else { config.physics_penalty };

    debug!(
        worldview = %worldview.name,
        rule_violations = rule_count,
        physics_ok,
        "Scored worldview consistency"
    );

    ConsistencyResult::new(1.0 - penalty - physics_penalty, violations, config.pass_threshold)
}

/// Whether `text` breaks none of the rules or constraints. Physics and
/// terminology are not consulted.
#[must_use]
pub fn quick_check(worldview: &Worldview, text: &str) -> bool {
    rule_violations(worldview, &Text::new(text)).is_empty()
}

fn rule_violations(worldview: &Worldview, text: &Text) -> Vec<String> {
    let rules = worldview.rules.iter().map(|r| ("Rule", r));
    let constraints = worldview.constraints.iter().map(|c| ("Constraint", c));
    rules
        .chain(constraints)
        .flat_map(|(kind, body)| {
            lexicon::sentences(body)
                .into_iter()
                .filter_map(extract_prohibition)
                .filter(|p| p.is_violated_by(text))
                .map(move |p| format!("{kind} violated: {}", p.source))
        })
        .collect()
}

fn physics_violations(worldview: &Worldview, text: &Text) -> Vec<String> {
    let Some(physics) = worldview.physics() else {
        return Vec::new();
    };
    lexicon::sentences(physics)
        .into_iter()
        .filter_map(extract_prohibition)
        .filter(|p| p.is_violated_by(text))
        .map(|p| format!("Physics law broken: {}", p.source))
        .collect()
}

/// Log capitalized multi-word names the worldview's glossary does not define.
fn scan_terminology(worldview: &Worldview, text: &str) {
    let mut run: Vec<&str> = Vec::new();
    let mut flush = |run: &mut Vec<&str>| {
        if run.len() >= 2 {
            let term = run.join(" ");
            let known = worldview
                .terminology
                .keys()
                .any(|k| k.eq_ignore_ascii_case(&term));
            if term.len() > 3 && !known {
                debug!(worldview = %worldview.name, term = %term, "Undefined term in generated text");
            }
        }
        run.clear();
    };
    for word in text.split_whitespace() {
        let clean = word.trim_matches(|c: char| !c.is_alphanumeric());
        let capitalized = clean.chars().next().is_some_and(char::is_uppercase);
        if capitalized {
            run.push(clean);
        } else {
            flush(&mut run);
        }
        if word.ends_with(['.', ',', ';', '!', '?']) {
            flush(&mut run);
        }
    }
    flush(&mut run);
}
