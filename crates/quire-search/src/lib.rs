//! # quire-search
//!
//! Text analysis for the quire note index.
//!
//! This crate provides:
//! - Script census and language detection with an `und` fallback
//! - An analyzer registry (simple, Snowball stemming, CJK bigrams)
//! - Note search representations grouped per analyzer, term and field
//! - Query planning (plain terms, or opt-in phrases, exclusions and OR) and
//!   pure relevance scoring
//! - Heuristic tag suggestions
//!
//! Nothing here performs I/O; `quire-db` stores representations and runs
//! queries against them.
//!
//! ## Example
//!
//! ```
//! use quire_search::{build_representation, AnalyzerRegistry, QueryPlan};
//!
//! let registry = AnalyzerRegistry::default();
//! let rep = build_representation(&registry, Some("Errands"), "Remember to buy milk");
//! let plan = QueryPlan::parse("milk", registry.simple());
//! assert!(rep.postings.iter().any(|p| plan.lookup_terms().contains(&p.term)));
//! ```

pub mod analyzer;
pub mod autotag;
pub mod flags;
pub mod language;
pub mod query;
pub mod representation;
pub mod script_detection;
pub mod stopwords;

pub use analyzer::{
    Analyzer, AnalyzerRegistry, CjkBigramAnalyzer, FieldWeight, SimpleAnalyzer,
    StemmingAnalyzer, Token, SIMPLE_ANALYZER,
};
pub use autotag::{extract_hashtags, suggest};
pub use flags::AnalysisFlags;
pub use language::{detect_language, LanguageDetection};
pub use query::{
    check_cursor, compare_candidates, paginate, Clause, MatchMode, QueryPlan, RankedCandidate,
    StoredPosting,
};
pub use representation::{build_representation, Posting, SearchRepresentation};
pub use script_detection::{detect_script, DetectedScript, ScriptDetection};
