//! Feature flags for text analysis.
//!
//! Every flag defaults to enabled. Each can be switched off through an
//! environment variable when an analysis stage misbehaves for a deployment;
//! switched-off stages fall back to the simple analyzer, which keeps every
//! note searchable.

use std::env;

/// Flags controlling which analysis stages are active.
///
/// # Example
/// ```
/// use quire_search::flags::AnalysisFlags;
///
/// let flags = AnalysisFlags::default();
/// assert!(flags.language_detection);
/// assert!(flags.stemming);
///
/// let simple = AnalysisFlags::simple_only();
/// assert!(!simple.stemming);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisFlags {
    /// Detect a language per note. When off every note is `und`.
    pub language_detection: bool,

    /// Register stemming analyzers for supported languages.
    pub stemming: bool,

    /// Register the bigram analyzer for Chinese, Japanese and Korean.
    pub cjk_bigrams: bool,

    /// Strip diacritics after stemming in language analyzers.
    pub diacritic_folding: bool,
}

impl Default for AnalysisFlags {
    fn default() -> Self {
        Self {
            language_detection: true,
            stemming: true,
            cjk_bigrams: true,
            diacritic_folding: true,
        }
    }
}

impl AnalysisFlags {
    /// Constructs flags from environment variables.
    ///
    /// Environment variables:
    /// - `QUIRE_LANGUAGE_DETECTION` (default: true)
    /// - `QUIRE_STEMMING` (default: true)
    /// - `QUIRE_CJK_BIGRAMS` (default: true)
    /// - `QUIRE_DIACRITIC_FOLDING` (default: true)
    ///
    /// "true", "1", "yes", "on" (case-insensitive) are truthy; "false", "0",
    /// "no", "off" are falsy; anything else keeps the default.
    pub fn from_env() -> Self {
        Self {
            language_detection: parse_bool_env("QUIRE_LANGUAGE_DETECTION", true),
            stemming: parse_bool_env("QUIRE_STEMMING", true),
            cjk_bigrams: parse_bool_env("QUIRE_CJK_BIGRAMS", true),
            diacritic_folding: parse_bool_env("QUIRE_DIACRITIC_FOLDING", true),
        }
    }

    /// Flags that route everything through the simple analyzer.
    #[inline]
    pub fn simple_only() -> Self {
        Self {
            language_detection: false,
            stemming: false,
            cjk_bigrams: false,
            diacritic_folding: false,
        }
    }
}

/// Parses a boolean environment variable with a default fallback.
fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|val| parse_bool(&val))
        .unwrap_or(default)
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("QUIRE_LANGUAGE_DETECTION");
        env::remove_var("QUIRE_STEMMING");
        env::remove_var("QUIRE_CJK_BIGRAMS");
        env::remove_var("QUIRE_DIACRITIC_FOLDING");
    }

    #[test]
    fn test_default_flags_all_enabled() {
        let flags = AnalysisFlags::default();
        assert!(flags.language_detection);
        assert!(flags.stemming);
        assert!(flags.cjk_bigrams);
        assert!(flags.diacritic_folding);
    }

    #[test]
    fn test_from_env_defaults_when_unset() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert_eq!(AnalysisFlags::from_env(), AnalysisFlags::default());
    }

    #[test]
    fn test_from_env_disables_stemming() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("QUIRE_STEMMING", "off");
        let flags = AnalysisFlags::from_env();
        assert!(!flags.stemming);
        assert!(flags.language_detection);
        clear_env();
    }

    #[test]
    fn test_from_env_ignores_garbage() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("QUIRE_CJK_BIGRAMS", "maybe");
        assert!(AnalysisFlags::from_env().cjk_bigrams);
        clear_env();
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool(""), None);
    }
}
