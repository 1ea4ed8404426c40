//! Derived search representation of a note.
//!
//! Built before the write transaction opens and stored verbatim: one posting
//! per `(analyzer, term, field)` with term frequency and positions. Every
//! note is indexed with the simple analyzer; notes in a language with a
//! dedicated analyzer are indexed with that analyzer as well.

use std::collections::BTreeMap;

use crate::analyzer::{Analyzer, AnalyzerRegistry, FieldWeight};
use crate::language::{detect_language, LanguageDetection};

/// Occurrences of one term in one field under one analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub analyzer: String,
    pub term: String,
    pub field: FieldWeight,
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn tf(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Everything the index stores for a note.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRepresentation {
    pub language: LanguageDetection,
    /// Analyzer codes used, language analyzer first
    pub analyzers: Vec<String>,
    /// Postings sorted by analyzer, term and field
    pub postings: Vec<Posting>,
}

impl SearchRepresentation {
    /// Total token occurrences across all postings.
    pub fn token_count(&self) -> usize {
        self.postings.iter().map(|p| p.positions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// Detect the note's language and analyze title and body.
///
/// # Example
///
/// ```
/// use quire_search::analyzer::AnalyzerRegistry;
/// use quire_search::representation::build_representation;
///
/// let registry = AnalyzerRegistry::default();
/// let rep = build_representation(&registry, None, "Remember to buy milk on the way home");
/// assert_eq!(rep.language.code, "en");
/// assert!(rep.postings.iter().any(|p| p.analyzer == "simple" && p.term == "milk"));
/// ```
pub fn build_representation(
    registry: &AnalyzerRegistry,
    title: Option<&str>,
    body: &str,
) -> SearchRepresentation {
    let language = if registry.flags().language_detection {
        let text = match title {
            Some(title) => format!("{}\n{}", title, body),
            None => body.to_string(),
        };
        detect_language(&text)
    } else {
        LanguageDetection::undetermined()
    };

    let primary = registry.resolve(&language.code);
    let simple = registry.simple();
    let mut analyzers: Vec<&dyn Analyzer> = vec![primary];
    if primary.code() != simple.code() {
        analyzers.push(simple);
    }

    let mut grouped: BTreeMap<(String, String, FieldWeight), Vec<u32>> = BTreeMap::new();
    for analyzer in &analyzers {
        let fields = title
            .map(|t| (t, FieldWeight::A))
            .into_iter()
            .chain(std::iter::once((body, FieldWeight::B)));
        for (text, weight) in fields {
            for token in analyzer.analyze(text, weight) {
                grouped
                    .entry((analyzer.code().to_string(), token.term, weight))
                    .or_default()
                    .push(token.position);
            }
        }
    }

    let postings = grouped
        .into_iter()
        .map(|((analyzer, term, field), positions)| Posting {
            analyzer,
            term,
            field,
            positions,
        })
        .collect();

    SearchRepresentation {
        analyzers: analyzers.iter().map(|a| a.code().to_string()).collect(),
        language,
        postings,
    }
}
