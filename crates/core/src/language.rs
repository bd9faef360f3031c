//! Subtitle language normalization and priority scoring.
//!
//! Catalogs label languages inconsistently ("简体", "Chinese (Simplified)",
//! "chs&eng", "zh-CN", ...). Everything is folded into a small set of
//! canonical codes before it is compared against the user's priority list.

/// Canonical code for subtitles carrying two languages (usually Chinese + English).
pub const BILINGUAL: &str = "bilingual";
/// Canonical code for Simplified Chinese.
pub const SIMPLIFIED_CHINESE: &str = "zh-cn";
/// Canonical code for Traditional Chinese.
pub const TRADITIONAL_CHINESE: &str = "zh-tw";
/// Canonical code for English.
pub const ENGLISH: &str = "en";
/// Code used when a catalog gives no language at all.
pub const UNKNOWN: &str = "unknown";

/// Score for a language that appears nowhere in the priority list.
const UNLISTED_SCORE: f64 = 3.0;
/// Score for a candidate whose language could not be determined.
const UNKNOWN_SCORE: f64 = 1.0;
/// Weight of one step in the priority list.
const PRIORITY_STEP: f64 = 10.0;

/// Ordered classification table. Earlier rows win, so "chs&eng" is
/// bilingual even though it also contains the simplified marker.
const LANGUAGE_MARKERS: &[(&str, &[&str])] = &[
    (
        BILINGUAL,
        &["双语", "bilingual", "chs&eng", "zh-en", "简英", "中英"],
    ),
    (SIMPLIFIED_CHINESE, &["简", "zh-cn", "chs", "simplified"]),
    (TRADITIONAL_CHINESE, &["繁", "zh-tw", "cht", "traditional"]),
    (ENGLISH, &["english", "en"]),
];

/// Map a raw catalog language label to `(canonical_code, display_text)`.
///
/// Matching is substring containment on the trimmed, lower-cased label.
/// Labels that match nothing keep their lower-cased form as the code and
/// the raw label as display text; an empty label becomes `("unknown", "")`.
pub fn normalize_language(raw: &str) -> (String, String) {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return (UNKNOWN.to_string(), String::new());
    }

    for (code, markers) in LANGUAGE_MARKERS {
        if markers.iter().any(|marker| lowered.contains(marker)) {
            return (code.to_string(), raw.to_string());
        }
    }

    (lowered, raw.to_string())
}

/// Score a canonical language code against an ordered priority list.
///
/// The entry at index `i` of a list of length `n` scores `(n - i) * 10`.
/// Unknown languages score 1 and anything else not in the list scores 3.
pub fn score_by_language(priority: &[String], code: &str) -> f64 {
    let code = code.trim();
    if let Some(index) = priority
        .iter()
        .position(|entry| entry.trim().eq_ignore_ascii_case(code))
    {
        return (priority.len() - index) as f64 * PRIORITY_STEP;
    }

    if code.is_empty() || code.eq_ignore_ascii_case(UNKNOWN) {
        UNKNOWN_SCORE
    } else {
        UNLISTED_SCORE
    }
}

/// The priority list used until the operator changes it.
pub fn default_priority() -> Vec<String> {
    vec![
        BILINGUAL.to_string(),
        SIMPLIFIED_CHINESE.to_string(),
        TRADITIONAL_CHINESE.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priority() -> Vec<String> {
        default_priority()
    }

    #[test]
    fn test_normalize_bilingual_wins_over_simplified() {
        assert_eq!(normalize_language("简英双语").0, BILINGUAL);
        assert_eq!(normalize_language("CHS&ENG").0, BILINGUAL);
        assert_eq!(normalize_language("中英字幕").0, BILINGUAL);
    }

    #[test]
    fn test_normalize_chinese_variants() {
        assert_eq!(normalize_language("简体").0, SIMPLIFIED_CHINESE);
        assert_eq!(normalize_language("zh-CN").0, SIMPLIFIED_CHINESE);
        assert_eq!(normalize_language("繁体").0, TRADITIONAL_CHINESE);
        assert_eq!(normalize_language(" Traditional ").0, TRADITIONAL_CHINESE);
    }

    #[test]
    fn test_normalize_keeps_display_text() {
        let (code, display) = normalize_language("English");
        assert_eq!(code, ENGLISH);
        assert_eq!(display, "English");
    }

    #[test]
    fn test_normalize_unmatched_is_lowercased() {
        let (code, display) = normalize_language("FR");
        assert_eq!(code, "fr");
        assert_eq!(display, "FR");
    }

    #[test]
    fn test_normalize_empty_is_unknown() {
        assert_eq!(
            normalize_language("   "),
            (UNKNOWN.to_string(), String::new())
        );
    }

    #[test]
    fn test_score_follows_priority_order() {
        let p = priority();
        assert_eq!(score_by_language(&p, "bilingual"), 30.0);
        assert_eq!(score_by_language(&p, "zh-cn"), 20.0);
        assert_eq!(score_by_language(&p, "zh-tw"), 10.0);
    }

    #[test]
    fn test_score_is_case_insensitive() {
        let p = vec![" ZH-CN ".to_string(), "en".to_string()];
        assert_eq!(score_by_language(&p, "zh-cn"), 20.0);
        assert_eq!(score_by_language(&p, " EN"), 10.0);
    }

    #[test]
    fn test_score_unlisted_and_unknown() {
        let p = priority();
        assert_eq!(score_by_language(&p, "en"), 3.0);
        assert_eq!(score_by_language(&p, "unknown"), 1.0);
        assert_eq!(score_by_language(&p, ""), 1.0);
    }

    #[test]
    fn test_score_empty_priority_list() {
        assert_eq!(score_by_language(&[], "zh-cn"), 3.0);
    }
}
