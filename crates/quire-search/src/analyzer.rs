//! Tokenizer/analyzer registry.
//!
//! Analyzers turn text into positioned, weighted tokens. Selection is a
//! strategy registry keyed by language code with a guaranteed default: any
//! code without a registered analyzer (including `und`) resolves to the
//! simple analyzer.
//!
//! Pipelines:
//! - simple: NFC → case fold → UAX#29 words
//! - stemming: NFC → case fold → UAX#29 words → stopwords → Snowball stem → fold
//! - CJK bigram: NFC → case fold → overlapping bigrams over CJK runs,
//!   simple analysis for everything else

use std::collections::HashMap;
use std::sync::Arc;

use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use quire_core::defaults::{BODY_WEIGHT, TITLE_WEIGHT};

use crate::flags::AnalysisFlags;
use crate::script_detection::is_cjk_char;
use crate::stopwords::is_stopword;

/// Code of the universal fallback analyzer.
pub const SIMPLE_ANALYZER: &str = "simple";

/// Languages with a Snowball stemmer and a stopword list.
pub const STEMMED_LANGUAGES: &[&str] = &["en", "de", "fr", "es", "pt", "it", "nl", "ru"];

/// Languages analyzed with overlapping CJK bigrams.
pub const BIGRAM_LANGUAGES: &[&str] = &["zh", "ja", "ko"];

/// Ranking class of the field a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldWeight {
    /// Title
    A,
    /// Body
    B,
}

impl FieldWeight {
    pub fn multiplier(&self) -> f32 {
        match self {
            Self::A => TITLE_WEIGHT,
            Self::B => BODY_WEIGHT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            _ => None,
        }
    }
}

/// A normalized token with its position within the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
    pub weight: FieldWeight,
}

/// Text analysis strategy.
pub trait Analyzer: Send + Sync {
    /// Code stored alongside every token this analyzer produced.
    fn code(&self) -> &str;

    /// Analyze one field. Positions start at 0 and increase monotonically.
    fn analyze(&self, text: &str, weight: FieldWeight) -> Vec<Token>;
}

/// NFC, then Unicode full case folding ("Straße" and "STRASSE" both become
/// "strasse"). Folding can decompose, so recompose afterwards.
fn normalize(text: &str) -> String {
    let composed: String = text.nfc().collect();
    caseless::default_case_fold_str(&composed).nfc().collect()
}

/// Strip combining marks after canonical decomposition ("café" → "cafe").
pub fn fold_diacritics(term: &str) -> String {
    term.nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect()
}

// =============================================================================
// SIMPLE
// =============================================================================

/// Language-agnostic analyzer: no stemming, stopwords or folding.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleAnalyzer;

impl Analyzer for SimpleAnalyzer {
    fn code(&self) -> &str {
        SIMPLE_ANALYZER
    }

    fn analyze(&self, text: &str, weight: FieldWeight) -> Vec<Token> {
        normalize(text)
            .unicode_words()
            .enumerate()
            .map(|(i, word)| Token {
                term: word.to_string(),
                position: i as u32,
                weight,
            })
            .collect()
    }
}

// =============================================================================
// STEMMING
// =============================================================================

/// Snowball stemming analyzer for one language.
pub struct StemmingAnalyzer {
    code: String,
    stemmer: Stemmer,
    fold: bool,
}

impl std::fmt::Debug for StemmingAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StemmingAnalyzer")
            .field("code", &self.code)
            .field("fold", &self.fold)
            .finish()
    }
}

fn snowball_algorithm(code: &str) -> Option<Algorithm> {
    match code {
        "en" => Some(Algorithm::English),
        "de" => Some(Algorithm::German),
        "fr" => Some(Algorithm::French),
        "es" => Some(Algorithm::Spanish),
        "pt" => Some(Algorithm::Portuguese),
        "it" => Some(Algorithm::Italian),
        "nl" => Some(Algorithm::Dutch),
        "ru" => Some(Algorithm::Russian),
        _ => None,
    }
}

impl StemmingAnalyzer {
    /// Analyzer for a supported language code; `None` for anything else.
    pub fn for_language(code: &str, fold: bool) -> Option<Self> {
        snowball_algorithm(code).map(|algorithm| Self {
            code: code.to_string(),
            stemmer: Stemmer::create(algorithm),
            fold,
        })
    }
}

impl Analyzer for StemmingAnalyzer {
    fn code(&self) -> &str {
        &self.code
    }

    fn analyze(&self, text: &str, weight: FieldWeight) -> Vec<Token> {
        let normalized = normalize(text);
        let mut tokens = Vec::new();
        // Stopwords still advance the position so phrases keep their gaps
        for (i, word) in normalized.unicode_words().enumerate() {
            if is_stopword(&self.code, word) {
                continue;
            }
            let stemmed = self.stemmer.stem(word);
            let term = if self.fold {
                fold_diacritics(&stemmed)
            } else {
                stemmed.into_owned()
            };
            if term.is_empty() {
                continue;
            }
            tokens.push(Token {
                term,
                position: i as u32,
                weight,
            });
        }
        tokens
    }
}

// =============================================================================
// CJK BIGRAM
// =============================================================================

/// Overlapping-bigram analyzer for scripts written without spaces.
#[derive(Debug, Clone)]
pub struct CjkBigramAnalyzer {
    code: String,
}

impl CjkBigramAnalyzer {
    pub fn for_language(code: &str) -> Option<Self> {
        BIGRAM_LANGUAGES.contains(&code).then(|| Self {
            code: code.to_string(),
        })
    }
}

impl Analyzer for CjkBigramAnalyzer {
    fn code(&self) -> &str {
        &self.code
    }

    fn analyze(&self, text: &str, weight: FieldWeight) -> Vec<Token> {
        let normalized = normalize(text);
        let mut sink = TokenSink::new(weight);
        let mut run: Vec<char> = Vec::new();
        let mut other = String::new();

        for ch in normalized.chars() {
            if is_cjk_char(ch) {
                sink.push_words(&other);
                other.clear();
                run.push(ch);
            } else {
                sink.push_bigrams(&run);
                run.clear();
                other.push(ch);
            }
        }
        sink.push_bigrams(&run);
        sink.push_words(&other);
        sink.tokens
    }
}

/// Accumulates tokens with consecutive positions.
struct TokenSink {
    weight: FieldWeight,
    position: u32,
    tokens: Vec<Token>,
}

impl TokenSink {
    fn new(weight: FieldWeight) -> Self {
        Self {
            weight,
            position: 0,
            tokens: Vec::new(),
        }
    }

    fn push(&mut self, term: String) {
        self.tokens.push(Token {
            term,
            position: self.position,
            weight: self.weight,
        });
        self.position += 1;
    }

    fn push_words(&mut self, text: &str) {
        for word in text.unicode_words() {
            self.push(word.to_string());
        }
    }

    /// A lone character stays a unigram.
    fn push_bigrams(&mut self, run: &[char]) {
        match run.len() {
            0 => {}
            1 => self.push(run[0].to_string()),
            _ => {
                for pair in run.windows(2) {
                    self.push(pair.iter().collect());
                }
            }
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Language code → analyzer, with the simple analyzer as guaranteed default.
#[derive(Clone)]
pub struct AnalyzerRegistry {
    flags: AnalysisFlags,
    simple: Arc<dyn Analyzer>,
    analyzers: HashMap<String, Arc<dyn Analyzer>>,
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut codes: Vec<&String> = self.analyzers.keys().collect();
        codes.sort();
        f.debug_struct("AnalyzerRegistry")
            .field("flags", &self.flags)
            .field("analyzers", &codes)
            .finish()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new(AnalysisFlags::default())
    }
}

impl AnalyzerRegistry {
    /// Registers analyzers for every stage the flags enable.
    pub fn new(flags: AnalysisFlags) -> Self {
        let mut analyzers: HashMap<String, Arc<dyn Analyzer>> = HashMap::new();
        if flags.stemming {
            for code in STEMMED_LANGUAGES {
                if let Some(analyzer) = StemmingAnalyzer::for_language(code, flags.diacritic_folding)
                {
                    analyzers.insert(code.to_string(), Arc::new(analyzer));
                }
            }
        }
        if flags.cjk_bigrams {
            for code in BIGRAM_LANGUAGES {
                if let Some(analyzer) = CjkBigramAnalyzer::for_language(code) {
                    analyzers.insert(code.to_string(), Arc::new(analyzer));
                }
            }
        }
        tracing::debug!(
            subsystem = "analysis",
            component = "registry",
            analyzer_count = analyzers.len(),
            "Analyzer registry built"
        );
        Self {
            flags,
            simple: Arc::new(SimpleAnalyzer),
            analyzers,
        }
    }

    pub fn flags(&self) -> AnalysisFlags {
        self.flags
    }

    /// Analyzer for a language code, falling back to the simple analyzer.
    pub fn resolve(&self, code: &str) -> &dyn Analyzer {
        match self.analyzers.get(code) {
            Some(analyzer) => analyzer.as_ref(),
            None => {
                tracing::debug!(
                    subsystem = "analysis",
                    component = "registry",
                    language = code,
                    "No analyzer registered, using simple analyzer"
                );
                self.simple.as_ref()
            }
        }
    }

    pub fn simple(&self) -> &dyn Analyzer {
        self.simple.as_ref()
    }

    /// True when a dedicated analyzer is registered for the code.
    pub fn has_analyzer(&self, code: &str) -> bool {
        self.analyzers.contains_key(code)
    }
}
