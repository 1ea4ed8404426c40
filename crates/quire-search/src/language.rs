//! Language detection.
//!
//! Maps text to a language code and a diagnostic confidence. Detection never
//! fails: short text, non-prose content (code, markup, number lists) and
//! ambiguous text come back as [`UNDETERMINED`], which the analyzer registry
//! resolves to the simple analyzer.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use quire_core::defaults::{MIN_DETECTION_CHARS, UNDETERMINED};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::script_detection::{detect_script, DetectedScript, ScriptDetection};
use crate::stopwords::{stopwords_for, CYRILLIC_PROFILES, LATIN_PROFILES};

/// Characters that dominate code and markup but are rare in prose.
const STRUCTURAL_CHARS: &[char] = &[
    '{', '}', '[', ']', '(', ')', '<', '>', ';', '=', '|', '&', '$', '\\', '*', '#', '/', '_',
];

/// Structural characters above this share of non-whitespace text mean non-prose.
const MAX_STRUCTURAL_RATIO: f32 = 0.12;

/// Code keywords above this share of words mean non-prose.
const MAX_KEYWORD_RATIO: f32 = 0.25;

/// Letters below this share of non-whitespace text mean non-prose.
const MIN_LETTER_RATIO: f32 = 0.5;

static CODE_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "fn", "let", "var", "const", "function", "return", "def", "class", "import", "include",
        "public", "private", "static", "void", "impl", "struct", "enum", "async", "await", "null",
        "nil", "true", "false", "elif", "else", "println", "printf", "console", "select", "where",
        "from", "int", "string",
    ]
    .into_iter()
    .collect()
});

/// Detected language with a diagnostic confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetection {
    /// ISO 639-1 code, or `und`
    pub code: String,
    /// Diagnostic confidence in [0, 1]; never used to reject a write
    pub confidence: f32,
}

impl LanguageDetection {
    pub fn undetermined() -> Self {
        Self {
            code: UNDETERMINED.to_string(),
            confidence: 0.0,
        }
    }

    fn new(code: &str, confidence: f32) -> Self {
        Self {
            code: code.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn is_undetermined(&self) -> bool {
        self.code == UNDETERMINED
    }
}

/// Detect the language of a text.
///
/// # Example
///
/// ```
/// use quire_search::language::detect_language;
///
/// let detection = detect_language("Remember to buy milk on the way home");
/// assert_eq!(detection.code, "en");
///
/// let detection = detect_language("buy milk");
/// assert_eq!(detection.code, "und");
/// ```
pub fn detect_language(text: &str) -> LanguageDetection {
    let text = text.trim();
    if text.chars().count() < MIN_DETECTION_CHARS {
        return LanguageDetection::undetermined();
    }
    if looks_like_non_prose(text) {
        tracing::trace!(
            subsystem = "analysis",
            component = "language",
            "Text classified as non-prose"
        );
        return LanguageDetection::undetermined();
    }

    let scripts = detect_script(text);
    match scripts.primary {
        DetectedScript::Latin => profile_match(text, LATIN_PROFILES, &scripts),
        DetectedScript::Cyrillic => profile_match(text, CYRILLIC_PROFILES, &scripts),
        DetectedScript::Han => LanguageDetection::new("zh", scripts.confidence),
        DetectedScript::Kana => LanguageDetection::new("ja", scripts.confidence),
        DetectedScript::Hangul => LanguageDetection::new("ko", scripts.confidence),
        DetectedScript::Arabic => LanguageDetection::new("ar", scripts.confidence),
        DetectedScript::Greek => LanguageDetection::new("el", scripts.confidence),
        DetectedScript::Hebrew => LanguageDetection::new("he", scripts.confidence),
        DetectedScript::Devanagari => LanguageDetection::new("hi", scripts.confidence),
        DetectedScript::Thai => LanguageDetection::new("th", scripts.confidence),
        DetectedScript::Emoji | DetectedScript::Mixed | DetectedScript::Unknown => {
            LanguageDetection::undetermined()
        }
    }
}

/// Picks the profile language with the most stopword hits.
///
/// A tie for first place is ambiguous and yields `und`.
fn profile_match(text: &str, profiles: &[&str], scripts: &ScriptDetection) -> LanguageDetection {
    let words: Vec<String> = text.unicode_words().map(|w| w.to_lowercase()).collect();
    if words.is_empty() {
        return LanguageDetection::undetermined();
    }

    let mut scores: Vec<(&str, usize)> = profiles
        .iter()
        .map(|code| {
            let list = stopwords_for(code);
            let hits = words.iter().filter(|w| list.contains(&w.as_str())).count();
            (*code, hits)
        })
        .collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    let (best_code, best) = scores[0];
    let second = scores.get(1).map(|(_, hits)| *hits).unwrap_or(0);
    if best == 0 || best == second {
        return LanguageDetection::undetermined();
    }

    let margin = (best - second) as f32 / best as f32;
    // Prose runs roughly one stopword in three words
    let coverage = (best as f32 * 3.0 / words.len() as f32).min(1.0);
    let confidence = scripts.confidence * (0.5 + 0.5 * margin) * (0.5 + 0.5 * coverage);
    LanguageDetection::new(best_code, confidence)
}

/// Structural heuristics for code, markup and tabular data.
fn looks_like_non_prose(text: &str) -> bool {
    let mut visible = 0usize;
    let mut structural = 0usize;
    let mut letters = 0usize;
    for ch in text.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if STRUCTURAL_CHARS.contains(&ch) {
            structural += 1;
        }
        if ch.is_alphabetic() {
            letters += 1;
        }
    }
    if visible == 0 {
        return true;
    }
    if structural as f32 / visible as f32 > MAX_STRUCTURAL_RATIO {
        return true;
    }
    if (letters as f32 / visible as f32) < MIN_LETTER_RATIO {
        return true;
    }

    let words: Vec<&str> = text.unicode_words().collect();
    if words.len() >= 4 {
        let keywords = words
            .iter()
            .filter(|w| CODE_KEYWORDS.contains(w.to_lowercase().as_str()))
            .count();
        if keywords as f32 / words.len() as f32 > MAX_KEYWORD_RATIO {
            return true;
        }
    }
    false
}
