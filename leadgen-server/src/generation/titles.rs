//! Title list parsing

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBERED_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s*").expect("valid regex"));

/// Extract at most `limit` titles from a numbered-list completion
///
/// Lines are matched after leading whitespace is dropped; only lines starting
/// with `<digits>.` count. The number is stripped, the rest trimmed, and empty
/// results are skipped. Order is preserved.
pub fn parse_titles(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(str::trim_start)
        .filter(|line| NUMBERED_PREFIX.is_match(line))
        .map(|line| NUMBERED_PREFIX.replace(line, "").trim().to_string())
        .filter(|title| !title.is_empty())
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_count() {
        let text = "1. How much does a plumber cost?\n\
                    2. Why is my boiler losing pressure?\n\
                    3.   What causes low water pressure?  \n\
                    4. Do I need a plumber for a leaky tap?\n\
                    5. How do I find an emergency plumber?";
        let titles = parse_titles(text, 5);
        assert_eq!(
            titles,
            vec![
                "How much does a plumber cost?",
                "Why is my boiler losing pressure?",
                "What causes low water pressure?",
                "Do I need a plumber for a leaky tap?",
                "How do I find an emergency plumber?",
            ]
        );
    }

    #[test]
    fn test_preamble_and_extra_lines_ignored() {
        let text = "Here are your titles:\n\n1. First\n- not numbered\n2. Second\n3. Third\n\nHope this helps!";
        assert_eq!(parse_titles(text, 5), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_truncates_to_limit() {
        let text = (1..=8).map(|i| format!("{}. Title {}", i, i)).collect::<Vec<_>>().join("\n");
        let titles = parse_titles(&text, 5);
        assert_eq!(titles.len(), 5);
        assert_eq!(titles[4], "Title 5");
    }

    #[test]
    fn test_indented_and_empty_entries() {
        let text = "  1. Indented\n2.\n3.    \n\t4. Tabbed\n10. Double digit";
        assert_eq!(parse_titles(text, 5), vec!["Indented", "Tabbed", "Double digit"]);
    }

    #[test]
    fn test_no_numbered_lines() {
        assert!(parse_titles("Sorry, I can't help with that.", 5).is_empty());
        assert!(parse_titles("", 5).is_empty());
    }
}
