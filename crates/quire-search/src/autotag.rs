//! Heuristic tag suggestions.
//!
//! Suggestions are computed from the note text, the owner's catalog and the
//! capture time. They are never persisted; a caller accepts one by attaching
//! the tag with `auto_tagged = true`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use quire_core::{SuggestedTag, SuggestionReason, TagCatalogEntry};

use crate::analyzer::{Analyzer, FieldWeight, SimpleAnalyzer};

const HASHTAG_CONFIDENCE: f32 = 0.9;
const CATALOG_CONFIDENCE: f32 = 0.8;
const TIME_OF_DAY_CONFIDENCE: f32 = 0.3;

struct PatternClass {
    name: &'static str,
    reason: SuggestionReason,
    confidence: f32,
    pattern: &'static Lazy<Regex>,
}

// Keyword sets cover English, German, French and Spanish.
static ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(todo|to-do|to do|need to|have to|must|remember to|don't forget|buy|call|email|fix|finish|submit|send|pick up|erledigen|nicht vergessen|kaufen|anrufen|besorgen|il faut|acheter|appeler|envoyer|ne pas oublier|tengo que|hay que|comprar|llamar|enviar|no olvidar)\b",
    )
    .expect("valid action pattern")
});

static URGENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(urgent|urgently|asap|immediately|right away|deadline|critical|dringend|sofort|eilig|frist|immédiatement|tout de suite|au plus vite|urgente|inmediatamente|cuanto antes|plazo)\b",
    )
    .expect("valid urgency pattern")
});

static IDEATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(idea|ideas|brainstorm|what if|maybe we could|concept|inspiration|idee|ideen|vielleicht könnten|einfall|idée|idées|et si|peut-être|lluvia de ideas|y si|quizás|tal vez)\b",
    )
    .expect("valid ideation pattern")
});

static TEMPORAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(today|tomorrow|tonight|next week|this weekend|monday|tuesday|wednesday|thursday|friday|saturday|sunday|heute|morgen|übermorgen|nächste woche|montag|dienstag|mittwoch|donnerstag|freitag|samstag|sonntag|aujourd'hui|demain|la semaine prochaine|lundi|mardi|mercredi|jeudi|vendredi|samedi|dimanche|hoy|mañana|la próxima semana|lunes|martes|miércoles|jueves|viernes|sábado|domingo)\b",
    )
    .expect("valid temporal pattern")
});

static CLASSES: [PatternClass; 4] = [
    PatternClass {
        name: "todo",
        reason: SuggestionReason::Action,
        confidence: 0.7,
        pattern: &ACTION,
    },
    PatternClass {
        name: "urgent",
        reason: SuggestionReason::Urgency,
        confidence: 0.75,
        pattern: &URGENCY,
    },
    PatternClass {
        name: "idea",
        reason: SuggestionReason::Ideation,
        confidence: 0.6,
        pattern: &IDEATION,
    },
    PatternClass {
        name: "scheduled",
        reason: SuggestionReason::TemporalContext,
        confidence: 0.5,
        pattern: &TEMPORAL,
    },
];

static FENCED_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```.*?```").expect("valid code pattern")
});

static INLINE_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`[^`]+`").expect("valid inline code pattern")
});

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link pattern")
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s<>\[\]()]+|www\.[^\s<>\[\]()]+")
        .expect("valid url pattern")
});

static HASHTAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\p{L}\p{N}_#-])#(\p{L}[\p{L}\p{N}_-]*)")
        .expect("valid hashtag pattern")
});

/// Inline hashtags, lowercased, deduplicated and sorted.
///
/// Code, link targets and URLs are stripped first so anchors and
/// preprocessor lines are not mistaken for tags.
///
/// ```
/// use quire_search::autotag::extract_hashtags;
///
/// let tags = extract_hashtags("Trip #Travel notes, see [map](#route) `#include`");
/// assert_eq!(tags, vec!["travel".to_string()]);
/// ```
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let text = FENCED_CODE.replace_all(text, "");
    let text = INLINE_CODE.replace_all(&text, "");
    let text = MARKDOWN_LINK.replace_all(&text, "$1");
    let text = URL.replace_all(&text, "");

    let mut tags: Vec<String> = HASHTAG
        .captures_iter(&text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    tags.sort();
    tags
}

/// Bucket name for an hour of the local day.
pub fn time_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=21 => "evening",
        _ => "night",
    }
}

fn terms(text: &str) -> Vec<String> {
    SimpleAnalyzer
        .analyze(text, FieldWeight::B)
        .into_iter()
        .map(|t| t.term)
        .collect()
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Suggest tags for a note text.
///
/// Ranked by confidence descending then name; at most one suggestion per
/// case-insensitive name.
pub fn suggest(
    text: &str,
    catalog: &[TagCatalogEntry],
    now: DateTime<FixedOffset>,
) -> Vec<SuggestedTag> {
    let by_key: HashMap<String, &TagCatalogEntry> = catalog
        .iter()
        .map(|entry| (entry.name.to_lowercase(), entry))
        .collect();
    let named = |name: &str, confidence: f32, reason: SuggestionReason| match by_key
        .get(&name.to_lowercase())
    {
        Some(entry) => SuggestedTag {
            name: entry.name.clone(),
            existing_tag_id: Some(entry.id),
            confidence,
            reason,
        },
        None => SuggestedTag {
            name: name.to_string(),
            existing_tag_id: None,
            confidence,
            reason,
        },
    };

    let mut suggestions = Vec::new();

    for tag in extract_hashtags(text) {
        suggestions.push(named(&tag, HASHTAG_CONFIDENCE, SuggestionReason::Hashtag));
    }

    let words = terms(text);
    for entry in catalog {
        if contains_sequence(&words, &terms(&entry.name)) {
            suggestions.push(SuggestedTag {
                name: entry.name.clone(),
                existing_tag_id: Some(entry.id),
                confidence: CATALOG_CONFIDENCE,
                reason: SuggestionReason::CatalogMatch,
            });
        }
    }

    for class in CLASSES.iter() {
        if class.pattern.is_match(text) {
            suggestions.push(named(class.name, class.confidence, class.reason));
        }
    }

    suggestions.push(named(
        time_of_day(now.hour()),
        TIME_OF_DAY_CONFIDENCE,
        SuggestionReason::TimeOfDay,
    ));

    suggestions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.name.cmp(&b.name))
    });
    let mut seen = HashSet::new();
    suggestions.retain(|s| seen.insert(s.name.to_lowercase()));

    tracing::debug!(
        subsystem = "analysis",
        component = "autotag",
        result_count = suggestions.len(),
        "Tag suggestions computed"
    );
    suggestions
}
