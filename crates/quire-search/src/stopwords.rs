//! Stopword lists for the stemming analyzers.
//!
//! The same lists serve two purposes: the analyzers drop these words before
//! stemming, and the language detector uses them as frequency profiles to
//! tell Latin-script languages apart. Lists hold lowercase, accented forms.

const EN: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "i", "if", "in", "into", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our",
    "she", "so", "such", "that", "the", "their", "then", "there", "these", "they", "this", "to",
    "was", "we", "were", "what", "when", "which", "will", "with", "you", "your",
];

const DE: &[&str] = &[
    "aber", "als", "am", "an", "auch", "auf", "aus", "bei", "bin", "bis", "das", "dass", "dem",
    "den", "der", "des", "die", "doch", "du", "ein", "eine", "einen", "einer", "es", "für", "hat",
    "ich", "ihr", "im", "in", "ist", "mit", "muss", "nach", "nicht", "noch", "nur", "oder",
    "sich", "sie", "sind", "und", "uns", "von", "vor", "war", "was", "wie", "wir", "zu", "zum",
    "zur",
];

const FR: &[&str] = &[
    "à", "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "est", "et",
    "il", "ils", "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "mes", "mon", "ne",
    "nous", "on", "ou", "par", "pas", "pour", "qu", "que", "qui", "sa", "se", "ses", "son", "sur",
    "ta", "te", "tu", "un", "une", "vous",
];

const ES: &[&str] = &[
    "al", "como", "con", "de", "del", "el", "ella", "en", "es", "esta", "este", "hay", "la",
    "las", "le", "les", "lo", "los", "me", "mi", "muy", "más", "no", "nos", "para", "pero",
    "por", "que", "se", "sin", "su", "sus", "también", "tengo", "un", "una", "y", "ya", "yo",
];

const PT: &[&str] = &[
    "ao", "aos", "as", "com", "como", "da", "das", "de", "do", "dos", "e", "ela", "ele", "em",
    "eu", "foi", "isso", "lhe", "mais", "mas", "me", "meu", "minha", "na", "nas", "no", "nos",
    "não", "o", "os", "ou", "para", "pela", "pelo", "por", "que", "se", "sem", "seu", "sua",
    "também", "um", "uma", "você", "é",
];

const IT: &[&str] = &[
    "a", "al", "alla", "anche", "che", "chi", "ci", "come", "con", "da", "dei", "del", "della",
    "di", "e", "gli", "ha", "ho", "i", "il", "in", "io", "la", "le", "lo", "ma", "mi", "nel",
    "nella", "non", "per", "più", "questo", "se", "si", "sono", "su", "sua", "suo", "ti", "tu",
    "un", "una", "è",
];

const NL: &[&str] = &[
    "aan", "al", "als", "bij", "dat", "de", "die", "dit", "een", "en", "er", "het", "hij", "ik",
    "in", "is", "je", "maar", "met", "mij", "moet", "naar", "niet", "nog", "of", "om", "ook",
    "op", "te", "tot", "uit", "van", "voor", "was", "wat", "we", "wij", "ze", "zijn", "zo",
];

const RU: &[&str] = &[
    "а", "без", "бы", "в", "во", "вот", "все", "вы", "да", "для", "до", "его", "ее", "если",
    "же", "за", "и", "из", "или", "им", "к", "как", "ли", "меня", "мне", "мы", "на", "не", "нет",
    "но", "о", "он", "она", "они", "от", "по", "с", "так", "то", "только", "у", "уже", "что",
    "это", "я",
];

/// Stopwords for a language code; empty for languages without a list.
pub fn stopwords_for(code: &str) -> &'static [&'static str] {
    match code {
        "en" => EN,
        "de" => DE,
        "fr" => FR,
        "es" => ES,
        "pt" => PT,
        "it" => IT,
        "nl" => NL,
        "ru" => RU,
        _ => &[],
    }
}

/// Languages written in Latin script that have a profile.
pub const LATIN_PROFILES: &[&str] = &["en", "de", "fr", "es", "pt", "it", "nl"];

/// Languages written in Cyrillic script that have a profile.
pub const CYRILLIC_PROFILES: &[&str] = &["ru"];

/// Check if a lowercased word is a stopword for the language.
#[inline]
pub fn is_stopword(code: &str, word: &str) -> bool {
    // Linear scan is fast for lists of ~50 short entries
    stopwords_for(code).contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_are_lowercase() {
        for code in LATIN_PROFILES.iter().chain(CYRILLIC_PROFILES) {
            for word in stopwords_for(code) {
                assert_eq!(&word.to_lowercase(), word, "{} list has {}", code, word);
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert!(is_stopword("en", "the"));
        assert!(is_stopword("de", "für"));
        assert!(is_stopword("ru", "это"));
        assert!(!is_stopword("en", "milk"));
        assert!(!is_stopword("xx", "the"));
    }
}
