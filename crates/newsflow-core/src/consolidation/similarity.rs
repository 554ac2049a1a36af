//! Title normalization and fuzzy matching.

use similar::TextDiff;

/// Ratio a normalized title must strictly exceed to match a registered key.
pub const TITLE_MATCH_THRESHOLD: f32 = 0.95;

/// Lowercase, strip ASCII punctuation, trim surrounding whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Character-level similarity in `[0, 1]`: `2 * matches / (len(a) + len(b))`.
pub fn similarity_ratio(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio()
}

/// First key, in the given order, whose similarity to `normalized` exceeds
/// `threshold`.
pub fn find_close_key<'a, I>(normalized: &str, keys: I, threshold: f32) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter()
        .position(|key| similarity_ratio(normalized, key) > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_and_punctuation() {
        assert_eq!(normalize_title("  Fed Raises Rates! "), "fed raises rates");
        assert_eq!(normalize_title("U.S. Jobs: 'Strong'"), "us jobs strong");
    }

    #[test]
    fn identical_normalized_titles_match() {
        let a = normalize_title("Fed Raises Rates!");
        let b = normalize_title("fed raises rates");
        assert!(similarity_ratio(&a, &b) > TITLE_MATCH_THRESHOLD);
    }

    #[test]
    fn different_stories_stay_apart() {
        let a = normalize_title("Fed Raises Rates");
        let b = normalize_title("Fed Cuts Rates");
        assert!(similarity_ratio(&a, &b) <= TITLE_MATCH_THRESHOLD);
    }

    #[test]
    fn single_typo_in_long_title_matches() {
        let a = normalize_title("Central bank raises interest rates for the third consecutive quarter");
        let b = normalize_title("Central bank raises interest rates for the third consecutive quartr");
        assert!(similarity_ratio(&a, &b) > TITLE_MATCH_THRESHOLD);
    }

    #[test]
    fn first_close_key_wins() {
        let keys = ["fed cuts rates", "fed raises rates", "fed raises rates"];
        assert_eq!(
            find_close_key("fed raises rates", keys.iter().copied(), TITLE_MATCH_THRESHOLD),
            Some(1)
        );
        assert_eq!(
            find_close_key("ecb holds", keys.iter().copied(), TITLE_MATCH_THRESHOLD),
            None
        );
    }
}
