//! Query planning and ranking.
//!
//! Parses query text into a [`QueryPlan`] and scores stored postings against
//! it. Everything here is pure; the persistence layer fetches postings and
//! hands them over for scoring.
//!
//! Plain queries (the default) treat every analyzed token as a required
//! term, so any word-aligned slice of a note finds that note, dashes, quotes
//! and `OR` included. Web syntax is opt-in:
//! - `milk bread` both words required
//! - `"buy milk"` words adjacent, in order, within one field
//! - `-bread` notes containing the word are excluded
//! - `milk OR bread` any term suffices

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use quire_core::{Error, PageCursor, QuerySyntax, Result, SortOrder};

use crate::analyzer::{Analyzer, FieldWeight};

/// How positive clauses combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

/// One analyzed query unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Term(String),
    /// Terms with their offset from the first term
    Phrase(Vec<(String, u32)>),
}

impl Clause {
    fn terms(&self) -> Vec<&str> {
        match self {
            Clause::Term(term) => vec![term.as_str()],
            Clause::Phrase(parts) => parts.iter().map(|(t, _)| t.as_str()).collect(),
        }
    }

    fn matches(&self, postings: &HashMap<(&str, FieldWeight), &StoredPosting>) -> bool {
        match self {
            Clause::Term(term) => [FieldWeight::A, FieldWeight::B]
                .iter()
                .any(|field| postings.contains_key(&(term.as_str(), *field))),
            Clause::Phrase(parts) => [FieldWeight::A, FieldWeight::B]
                .iter()
                .any(|field| phrase_in_field(parts, *field, postings)),
        }
    }
}

fn phrase_in_field(
    parts: &[(String, u32)],
    field: FieldWeight,
    postings: &HashMap<(&str, FieldWeight), &StoredPosting>,
) -> bool {
    let Some((first, _)) = parts.first() else {
        return false;
    };
    let Some(anchor) = postings.get(&(first.as_str(), field)) else {
        return false;
    };
    anchor.positions.iter().any(|start| {
        parts.iter().all(|(term, offset)| {
            postings
                .get(&(term.as_str(), field))
                .is_some_and(|p| p.positions.contains(&(start + offset)))
        })
    })
}

/// Postings of one note as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPosting {
    pub term: String,
    pub field: FieldWeight,
    pub positions: Vec<u32>,
}

impl StoredPosting {
    pub fn tf(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Analyzed query ready for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Analyzer whose stored tokens the plan matches
    pub analyzer: String,
    pub required: Vec<Clause>,
    pub excluded: Vec<Clause>,
    pub mode: MatchMode,
}

#[derive(Debug, PartialEq, Eq)]
enum Lexeme {
    Word { text: String, negated: bool },
    Phrase { text: String, negated: bool },
    Or,
}

fn lex(query: &str) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let mut chars = query.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        let mut negated = false;
        if ch == '-' {
            chars.next();
            match chars.peek() {
                Some(next) if !next.is_whitespace() => negated = true,
                _ => continue,
            }
        }
        if chars.peek() == Some(&'"') {
            chars.next();
            // An unclosed quote runs to the end of the query
            let text: String = chars.by_ref().take_while(|c| *c != '"').collect();
            lexemes.push(Lexeme::Phrase { text, negated });
            continue;
        }
        let mut text = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            text.push(c);
            chars.next();
        }
        if text == "OR" && !negated {
            lexemes.push(Lexeme::Or);
        } else {
            lexemes.push(Lexeme::Word { text, negated });
        }
    }
    lexemes
}

fn analyze_clause(analyzer: &dyn Analyzer, text: &str) -> Option<Clause> {
    let tokens = analyzer.analyze(text, FieldWeight::B);
    match tokens.len() {
        0 => None,
        1 => tokens.into_iter().next().map(|t| Clause::Term(t.term)),
        _ => {
            let base = tokens[0].position;
            Some(Clause::Phrase(
                tokens
                    .into_iter()
                    .map(|t| (t.term, t.position - base))
                    .collect(),
            ))
        }
    }
}

impl QueryPlan {
    fn empty(analyzer: &dyn Analyzer) -> Self {
        Self {
            analyzer: analyzer.code().to_string(),
            required: Vec::new(),
            excluded: Vec::new(),
            mode: MatchMode::All,
        }
    }

    pub fn parse_with(query: &str, analyzer: &dyn Analyzer, syntax: QuerySyntax) -> Self {
        match syntax {
            QuerySyntax::Plain => Self::parse(query, analyzer),
            QuerySyntax::Web => Self::parse_web(query, analyzer),
        }
    }

    /// Parse plain query text: every distinct token is a required term.
    ///
    /// ```
    /// use quire_search::analyzer::SimpleAnalyzer;
    /// use quire_search::query::{Clause, QueryPlan};
    ///
    /// let plan = QueryPlan::parse("-5 degrees", &SimpleAnalyzer);
    /// assert_eq!(
    ///     plan.required,
    ///     vec![Clause::Term("5".into()), Clause::Term("degrees".into())]
    /// );
    /// assert!(plan.excluded.is_empty());
    /// ```
    pub fn parse(query: &str, analyzer: &dyn Analyzer) -> Self {
        let mut plan = Self::empty(analyzer);
        let mut seen = BTreeSet::new();
        for token in analyzer.analyze(query, FieldWeight::B) {
            if seen.insert(token.term.clone()) {
                plan.required.push(Clause::Term(token.term));
            }
        }
        plan
    }

    /// Parse query text with operators.
    ///
    /// Words that analyze to nothing (stopwords, punctuation) are dropped;
    /// a word that analyzes to several tokens ("e-mail", "牛奶") is matched
    /// as a phrase.
    ///
    /// # Example
    ///
    /// ```
    /// use quire_search::analyzer::SimpleAnalyzer;
    /// use quire_search::query::{Clause, MatchMode, QueryPlan};
    ///
    /// let plan = QueryPlan::parse_web("Milk -bread", &SimpleAnalyzer);
    /// assert_eq!(plan.required, vec![Clause::Term("milk".into())]);
    /// assert_eq!(plan.excluded, vec![Clause::Term("bread".into())]);
    /// assert_eq!(plan.mode, MatchMode::All);
    /// ```
    pub fn parse_web(query: &str, analyzer: &dyn Analyzer) -> Self {
        let mut plan = Self::empty(analyzer);
        for lexeme in lex(query) {
            let (text, negated) = match lexeme {
                Lexeme::Or => {
                    plan.mode = MatchMode::Any;
                    continue;
                }
                Lexeme::Word { text, negated } | Lexeme::Phrase { text, negated } => {
                    (text, negated)
                }
            };
            if let Some(clause) = analyze_clause(analyzer, &text) {
                if negated {
                    plan.excluded.push(clause);
                } else {
                    plan.required.push(clause);
                }
            }
        }
        plan
    }

    /// True when nothing can match: no positive clause survived analysis.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    /// Distinct terms to fetch from storage, positive and excluded.
    pub fn lookup_terms(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .required
            .iter()
            .chain(&self.excluded)
            .flat_map(|c| c.terms())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Score one note's postings; `None` when the note does not match.
    ///
    /// Score is the sum over distinct matched positive terms of
    /// `field weight × term frequency`.
    pub fn score(&self, postings: &[StoredPosting]) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let index: HashMap<(&str, FieldWeight), &StoredPosting> = postings
            .iter()
            .map(|p| ((p.term.as_str(), p.field), p))
            .collect();

        if self.excluded.iter().any(|c| c.matches(&index)) {
            return None;
        }

        let matched: Vec<&Clause> = self
            .required
            .iter()
            .filter(|c| c.matches(&index))
            .collect();
        let accepted = match self.mode {
            MatchMode::All => matched.len() == self.required.len(),
            MatchMode::Any => !matched.is_empty(),
        };
        if !accepted {
            return None;
        }

        let terms: BTreeSet<&str> = matched.iter().flat_map(|c| c.terms()).collect();
        let index = &index;
        let score: f32 = terms
            .iter()
            .flat_map(|term| {
                [FieldWeight::A, FieldWeight::B]
                    .into_iter()
                    .filter_map(move |field| index.get(&(*term, field)).copied())
            })
            .map(|p| p.field.multiplier() * p.tf() as f32)
            .sum();
        Some(score)
    }
}

// =============================================================================
// ORDERING AND PAGINATION
// =============================================================================

/// A matching note with its sort key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate {
    pub note_id: Uuid,
    pub created_at_micros: i64,
    pub score: f32,
}

impl RankedCandidate {
    fn from_cursor(cursor: &PageCursor) -> Self {
        Self {
            note_id: cursor.id,
            created_at_micros: cursor.created_at_micros,
            score: cursor.rank.unwrap_or(0.0),
        }
    }

    /// Cursor positioned at this candidate.
    pub fn cursor(&self, sort: SortOrder) -> PageCursor {
        let cursor = PageCursor::new(self.created_at_micros, self.note_id);
        match sort {
            SortOrder::Relevance => cursor.with_rank(self.score),
            SortOrder::Newest | SortOrder::Oldest => cursor,
        }
    }
}

/// Total order of results for a sort mode.
///
/// Relevance: score desc, then `created_at` desc, then id desc.
pub fn compare_candidates(a: &RankedCandidate, b: &RankedCandidate, sort: SortOrder) -> Ordering {
    let newest = b
        .created_at_micros
        .cmp(&a.created_at_micros)
        .then_with(|| b.note_id.cmp(&a.note_id));
    match sort {
        SortOrder::Relevance => b.score.total_cmp(&a.score).then(newest),
        SortOrder::Newest => newest,
        SortOrder::Oldest => newest.reverse(),
    }
}

/// Relevance cursors must carry a rank.
pub fn check_cursor(cursor: &PageCursor, sort: SortOrder) -> Result<()> {
    if sort == SortOrder::Relevance && cursor.rank.is_none() {
        return Err(Error::Validation(
            "pagination cursor does not match relevance ordering".to_string(),
        ));
    }
    Ok(())
}

/// Sort candidates and cut the page that follows `cursor`.
///
/// Returns the page and, when more candidates remain, the cursor of the
/// page's last entry.
pub fn paginate(
    mut candidates: Vec<RankedCandidate>,
    sort: SortOrder,
    cursor: Option<&PageCursor>,
    limit: usize,
) -> (Vec<RankedCandidate>, Option<PageCursor>) {
    candidates.sort_by(|a, b| compare_candidates(a, b, sort));
    if let Some(cursor) = cursor {
        let anchor = RankedCandidate::from_cursor(cursor);
        candidates.retain(|c| compare_candidates(c, &anchor, sort) == Ordering::Greater);
    }
    let has_more = candidates.len() > limit;
    candidates.truncate(limit);
    let next = if has_more {
        candidates.last().map(|c| c.cursor(sort))
    } else {
        None
    };
    (candidates, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{SimpleAnalyzer, StemmingAnalyzer};

    fn posting(term: &str, field: FieldWeight, positions: &[u32]) -> StoredPosting {
        StoredPosting {
            term: term.to_string(),
            field,
            positions: positions.to_vec(),
        }
    }

    fn candidate(n: u128, created: i64, score: f32) -> RankedCandidate {
        RankedCandidate {
            note_id: Uuid::from_u128(n),
            created_at_micros: created,
            score,
        }
    }

    #[test]
    fn test_parse_syntax() {
        let plan = QueryPlan::parse_web(r#"milk "whole grain" -bread"#, &SimpleAnalyzer);
        assert_eq!(plan.analyzer, "simple");
        assert_eq!(
            plan.required,
            vec![
                Clause::Term("milk".into()),
                Clause::Phrase(vec![("whole".into(), 0), ("grain".into(), 1)]),
            ]
        );
        assert_eq!(plan.excluded, vec![Clause::Term("bread".into())]);
        assert_eq!(plan.lookup_terms(), vec!["bread", "grain", "milk", "whole"]);
    }

    #[test]
    fn test_parse_or_mode() {
        let plan = QueryPlan::parse_web("milk OR bread", &SimpleAnalyzer);
        assert_eq!(plan.mode, MatchMode::Any);
        assert_eq!(plan.required.len(), 2);
        // Lowercase "or" is an ordinary word
        let plan = QueryPlan::parse_web("milk or bread", &SimpleAnalyzer);
        assert_eq!(plan.mode, MatchMode::All);
        assert_eq!(plan.required.len(), 3);
    }

    #[test]
    fn test_parse_edge_cases() {
        assert!(QueryPlan::parse_web("  - \"\" ...", &SimpleAnalyzer).is_empty());
        let plan = QueryPlan::parse_web("\"unclosed phrase", &SimpleAnalyzer);
        assert_eq!(plan.required.len(), 1);
        let plan = QueryPlan::parse_web("-\"buy milk\"", &SimpleAnalyzer);
        assert_eq!(plan.excluded.len(), 1);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_stemmed_query_keeps_stopword_gaps() {
        let en = StemmingAnalyzer::for_language("en", true).unwrap();
        let plan = QueryPlan::parse_web("\"running of the bulls\"", &en);
        assert_eq!(
            plan.required,
            vec![Clause::Phrase(vec![("run".into(), 0), ("bull".into(), 3)])]
        );
    }

    #[test]
    fn test_plain_query_has_no_operators() {
        use crate::analyzer::{AnalyzerRegistry, SIMPLE_ANALYZER};
        use crate::representation::build_representation;

        let registry = AnalyzerRegistry::default();
        let cases = [
            ("Outside it is -5 degrees today", "-5 degrees"),
            ("Outside it is -5 degrees today", "-5"),
            ("Press OR to continue with setup", "OR"),
            ("tasks: -groceries -laundry", "-groceries"),
            (r#"She wrote "buy milk" on the list"#, r#""buy milk"#),
        ];
        for (body, query) in cases {
            let rep = build_representation(&registry, None, body);
            let postings: Vec<StoredPosting> = rep
                .postings
                .iter()
                .filter(|p| p.analyzer == SIMPLE_ANALYZER)
                .map(|p| posting(&p.term, p.field, &p.positions))
                .collect();
            let plan = QueryPlan::parse_with(query, registry.simple(), QuerySyntax::Plain);
            assert!(plan.excluded.is_empty(), "{query:?}");
            assert_eq!(plan.mode, MatchMode::All);
            assert!(plan.score(&postings).is_some(), "{query:?} missed {body:?}");
        }

        let web = QueryPlan::parse_with("-groceries", registry.simple(), QuerySyntax::Web);
        assert!(web.is_empty());
    }

    #[test]
    fn test_plain_query_dedupes_terms() {
        let plan = QueryPlan::parse("milk Milk MILK", &SimpleAnalyzer);
        assert_eq!(plan.required, vec![Clause::Term("milk".into())]);
    }

    #[test]
    fn test_score_weights_title_over_body() {
        let plan = QueryPlan::parse("milk", &SimpleAnalyzer);
        let title_hit = [posting("milk", FieldWeight::A, &[0])];
        let body_hit = [posting("milk", FieldWeight::B, &[3])];
        assert_eq!(plan.score(&title_hit), Some(2.0));
        assert_eq!(plan.score(&body_hit), Some(1.0));
        let both = [
            posting("milk", FieldWeight::A, &[0]),
            posting("milk", FieldWeight::B, &[1, 4]),
        ];
        assert_eq!(plan.score(&both), Some(4.0));
    }

    #[test]
    fn test_score_requires_all_terms() {
        let plan = QueryPlan::parse("milk bread", &SimpleAnalyzer);
        assert_eq!(plan.score(&[posting("milk", FieldWeight::B, &[0])]), None);
        let plan = QueryPlan::parse_web("milk OR bread", &SimpleAnalyzer);
        assert_eq!(plan.score(&[posting("milk", FieldWeight::B, &[0])]), Some(1.0));
    }

    #[test]
    fn test_score_exclusion() {
        let plan = QueryPlan::parse_web("milk -bread", &SimpleAnalyzer);
        let postings = [
            posting("milk", FieldWeight::B, &[0]),
            posting("bread", FieldWeight::A, &[0]),
        ];
        assert_eq!(plan.score(&postings), None);
    }

    #[test]
    fn test_phrase_adjacency_within_field() {
        let plan = QueryPlan::parse_web("\"buy milk\"", &SimpleAnalyzer);
        let adjacent = [
            posting("buy", FieldWeight::B, &[2]),
            posting("milk", FieldWeight::B, &[3]),
        ];
        assert_eq!(plan.score(&adjacent), Some(2.0));
        let apart = [
            posting("buy", FieldWeight::B, &[2]),
            posting("milk", FieldWeight::B, &[5]),
        ];
        assert_eq!(plan.score(&apart), None);
        let split_fields = [
            posting("buy", FieldWeight::A, &[0]),
            posting("milk", FieldWeight::B, &[1]),
        ];
        assert_eq!(plan.score(&split_fields), None);
    }

    #[test]
    fn test_relevance_tie_breaks_newest_first() {
        let older = candidate(1, 100, 2.0);
        let newer = candidate(2, 200, 2.0);
        let best = candidate(3, 50, 5.0);
        let (page, next) = paginate(vec![older, newer, best], SortOrder::Relevance, None, 10);
        assert_eq!(page, vec![best, newer, older]);
        assert!(next.is_none());
    }

    #[test]
    fn test_paginate_with_cursor() {
        let all: Vec<_> = (0..5).map(|i| candidate(i, i as i64 * 10, 0.0)).collect();
        let (first, next) = paginate(all.clone(), SortOrder::Oldest, None, 2);
        assert_eq!(first.iter().map(|c| c.created_at_micros).collect::<Vec<_>>(), vec![0, 10]);
        let next = next.unwrap();
        let (second, _) = paginate(all.clone(), SortOrder::Oldest, Some(&next), 2);
        assert_eq!(second.iter().map(|c| c.created_at_micros).collect::<Vec<_>>(), vec![20, 30]);

        let (newest, _) = paginate(all, SortOrder::Newest, None, 1);
        assert_eq!(newest[0].created_at_micros, 40);
    }

    #[test]
    fn test_relevance_cursor_carries_rank() {
        let c = candidate(7, 10, 1.5);
        let cursor = c.cursor(SortOrder::Relevance);
        assert_eq!(cursor.rank, Some(1.5));
        assert!(check_cursor(&cursor, SortOrder::Relevance).is_ok());
        let bare = c.cursor(SortOrder::Newest);
        assert!(check_cursor(&bare, SortOrder::Relevance).is_err());
        assert!(check_cursor(&bare, SortOrder::Newest).is_ok());
    }
}
