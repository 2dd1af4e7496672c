use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::rules::{RuleSet, RuleStore};

/// Link, handle and phone-number patterns, applied in this order.
static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"https?://\S+",
        r"www\.\S+",
        r"chat\.whatsapp\.com\S*",
        r"wa\.me\S*",
        r"t\.me\S*",
        r"[a-zA-Z0-9-]+\.(com|co\.il|net|org|me)\S*",
        r"@\S+",
        r"\d{2,3}[-\s]?\d{3}[-\s]?\d{4}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,!?()\x{0590}-\x{05FF}]").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Cleans message text for speech synthesis.
///
/// Substitutions run first, longest source first, each seeing the result of
/// the previous one. Blocked words are then deleted, followed by links,
/// handles, phone numbers and any character outside word characters, basic
/// punctuation and the Hebrew block. Whitespace is collapsed last.
///
/// Rule tokens are literal and case-sensitive.
pub fn normalize(raw: &str, rules: &RuleSet) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut text = raw.to_string();

    let mut sources: Vec<(&String, &String)> = rules
        .replacements
        .iter()
        .filter(|(src, _)| !src.is_empty())
        .collect();
    sources.sort_by(|(a, _), (b, _)| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    for (src, target) in sources {
        if text.contains(src.as_str()) {
            text = text.replace(src.as_str(), target);
        }
    }

    for word in rules.blacklist.iter().filter(|w| !w.is_empty()) {
        if text.contains(word.as_str()) {
            text = text.replace(word.as_str(), "");
        }
    }

    for pattern in NOISE_PATTERNS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    text = DISALLOWED_CHARS.replace_all(&text, "").into_owned();

    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Normalizer bound to a rule store; rules are re-read on every call.
#[derive(Clone)]
pub struct TextNormalizer {
    store: Arc<dyn RuleStore>,
}

impl TextNormalizer {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        let rules = self.store.snapshot();
        let cleaned = normalize(raw, &rules);
        debug!(
            raw_chars = raw.chars().count(),
            clean_chars = cleaned.chars().count(),
            "Text normalized"
        );
        cleaned
    }
}
