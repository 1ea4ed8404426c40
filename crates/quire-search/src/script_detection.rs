//! Unicode script census for multilingual text analysis.
//!
//! A single O(n) pass counts the characters of each script family, skipping
//! whitespace, punctuation and digits. The census drives language detection:
//! scripts with a single dominant language map to it directly, while Latin
//! and Cyrillic text is disambiguated further by stopword profiles.

use std::collections::HashMap;
use unicode_script::{Script, UnicodeScript};

/// Detected script category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetectedScript {
    /// Latin alphabet (English, French, German, etc.)
    Latin,
    /// Han ideographs (Chinese, and Kanji within Japanese)
    Han,
    /// Hiragana or Katakana (Japanese)
    Kana,
    /// Hangul (Korean)
    Hangul,
    /// Arabic script
    Arabic,
    /// Cyrillic script (Russian, Ukrainian, etc.)
    Cyrillic,
    /// Greek script
    Greek,
    /// Hebrew script
    Hebrew,
    /// Devanagari script (Hindi, Sanskrit, etc.)
    Devanagari,
    /// Thai script
    Thai,
    /// Emoji characters
    Emoji,
    /// Multiple script families with significant presence
    Mixed,
    /// Unknown or unclassified script
    Unknown,
}

impl DetectedScript {
    /// True for the scripts written without spaces between words
    /// (handled by bigram analysis).
    pub fn is_cjk(&self) -> bool {
        matches!(self, Self::Han | Self::Kana | Self::Hangul)
    }
}

/// Result of script detection analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptDetection {
    /// Primary script family. Han, Kana and Hangul count as one CJK family
    /// when deciding whether text is mixed, so Japanese (Kanji + Kana) is
    /// not reported as `Mixed`.
    pub primary: DetectedScript,
    /// Proportion of counted characters belonging to the primary family
    pub confidence: f32,
    /// Per-script character counts
    pub counts: HashMap<DetectedScript, usize>,
    /// Number of characters counted
    pub total: usize,
}

impl ScriptDetection {
    fn empty() -> Self {
        Self {
            primary: DetectedScript::Unknown,
            confidence: 0.0,
            counts: HashMap::new(),
            total: 0,
        }
    }

    /// Characters counted for one script.
    pub fn count(&self, script: DetectedScript) -> usize {
        self.counts.get(&script).copied().unwrap_or(0)
    }

    /// Characters counted for Han, Kana and Hangul together.
    pub fn cjk_count(&self) -> usize {
        self.count(DetectedScript::Han)
            + self.count(DetectedScript::Kana)
            + self.count(DetectedScript::Hangul)
    }
}

/// Maps a Unicode script to our categories.
fn map_unicode_script(script: Script) -> DetectedScript {
    match script {
        Script::Latin => DetectedScript::Latin,
        Script::Han => DetectedScript::Han,
        Script::Hiragana | Script::Katakana => DetectedScript::Kana,
        Script::Hangul => DetectedScript::Hangul,
        Script::Arabic => DetectedScript::Arabic,
        Script::Cyrillic => DetectedScript::Cyrillic,
        Script::Greek => DetectedScript::Greek,
        Script::Hebrew => DetectedScript::Hebrew,
        Script::Devanagari => DetectedScript::Devanagari,
        Script::Thai => DetectedScript::Thai,
        _ => DetectedScript::Unknown,
    }
}

/// Collapses CJK scripts into one family for the primary/mixed decision.
fn family(script: DetectedScript) -> DetectedScript {
    if script.is_cjk() {
        DetectedScript::Han
    } else {
        script
    }
}

/// Detects the script(s) used in the input text.
///
/// # Examples
///
/// ```
/// use quire_search::script_detection::{detect_script, DetectedScript};
///
/// let result = detect_script("Hello world");
/// assert_eq!(result.primary, DetectedScript::Latin);
/// assert!(result.confidence > 0.9);
///
/// let result = detect_script("こんにちは");
/// assert_eq!(result.primary, DetectedScript::Kana);
/// ```
pub fn detect_script(text: &str) -> ScriptDetection {
    let mut counts: HashMap<DetectedScript, usize> = HashMap::new();
    let mut total = 0usize;

    for ch in text.chars() {
        if ch.is_whitespace() || ch.is_ascii_punctuation() || ch.is_numeric() {
            continue;
        }

        let detected = if is_emoji(ch) {
            DetectedScript::Emoji
        } else {
            let script = ch.script();
            // Common/Inherited cover punctuation and combining marks
            if matches!(script, Script::Common | Script::Inherited) {
                continue;
            }
            map_unicode_script(script)
        };

        *counts.entry(detected).or_insert(0) += 1;
        total += 1;
    }

    if total == 0 {
        return ScriptDetection::empty();
    }

    let mut families: HashMap<DetectedScript, usize> = HashMap::new();
    for (script, count) in &counts {
        *families.entry(family(*script)).or_insert(0) += count;
    }

    // Ties resolve by enum order so output is deterministic
    let (primary_family, primary_count) = families
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(script, count)| (*script, *count))
        .unwrap_or((DetectedScript::Unknown, 0));

    let confidence = primary_count as f32 / total as f32;

    // Mixed when more than one known family exceeds 20%
    let mixed_threshold = (total as f32 * 0.20).ceil() as usize;
    let significant = families
        .iter()
        .filter(|(script, count)| **count >= mixed_threshold && **script != DetectedScript::Unknown)
        .count();

    let primary = if significant > 1 {
        DetectedScript::Mixed
    } else if primary_family == DetectedScript::Han {
        // Report the most specific CJK script
        if counts.contains_key(&DetectedScript::Kana) {
            DetectedScript::Kana
        } else if counts.get(&DetectedScript::Hangul).copied().unwrap_or(0)
            >= counts.get(&DetectedScript::Han).copied().unwrap_or(0)
        {
            DetectedScript::Hangul
        } else {
            DetectedScript::Han
        }
    } else {
        primary_family
    };

    ScriptDetection {
        primary,
        confidence,
        counts,
        total,
    }
}

/// True for Han, Hiragana, Katakana and Hangul characters.
pub fn is_cjk_char(ch: char) -> bool {
    matches!(
        ch.script(),
        Script::Han | Script::Hiragana | Script::Katakana | Script::Hangul
    )
}

/// Determines if a character is an emoji by its code point range.
fn is_emoji(ch: char) -> bool {
    matches!(ch as u32,
        0x1F600..=0x1F64F | // Emoticons
        0x1F300..=0x1F5FF | // Misc Symbols and Pictographs
        0x1F680..=0x1F6FF | // Transport and Map
        0x1F1E6..=0x1F1FF | // Regional indicator symbols
        0x2600..=0x26FF |   // Misc symbols
        0x2700..=0x27BF |   // Dingbats
        0x1F900..=0x1F9FF   // Supplemental Symbols and Pictographs
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pure_latin() {
        let result = detect_script("Hello, world! How are you?");
        assert_eq!(result.primary, DetectedScript::Latin);
        assert!(result.confidence > 0.99);
    }

    #[test]
    fn test_detect_chinese_han() {
        let result = detect_script("你好世界");
        assert_eq!(result.primary, DetectedScript::Han);
        assert_eq!(result.count(DetectedScript::Han), 4);
    }

    #[test]
    fn test_japanese_is_not_mixed() {
        // Kanji, hiragana and katakana together
        let result = detect_script("私はカタカナが好きです");
        assert_eq!(result.primary, DetectedScript::Kana);
        assert!(result.confidence > 0.99);
    }

    #[test]
    fn test_detect_korean_hangul() {
        let result = detect_script("안녕하세요");
        assert_eq!(result.primary, DetectedScript::Hangul);
    }

    #[test]
    fn test_detect_cyrillic() {
        let result = detect_script("Привет мир");
        assert_eq!(result.primary, DetectedScript::Cyrillic);
        assert!(result.confidence > 0.99);
    }

    #[test]
    fn test_detect_mixed_latin_cjk() {
        let result = detect_script("Hello 你好 World 世界");
        assert_eq!(result.primary, DetectedScript::Mixed);
    }

    #[test]
    fn test_minor_script_not_mixed() {
        let latin = "a".repeat(90);
        let text = format!("{}你好世界你好", latin);
        let result = detect_script(&text);
        assert_eq!(result.primary, DetectedScript::Latin);
        assert_eq!(result.cjk_count(), 6);
    }

    #[test]
    fn test_digits_and_punctuation_ignored() {
        let result = detect_script("2026-10-19 !!! ...");
        assert_eq!(result.primary, DetectedScript::Unknown);
        assert_eq!(result.total, 0);
    }

    #[test]
    fn test_emoji_only() {
        let result = detect_script("🚀🎉");
        assert_eq!(result.primary, DetectedScript::Emoji);
    }
}
