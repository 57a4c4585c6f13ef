/// Canonical form used for every text comparison: lower-cased, whitespace
/// runs collapsed, trailing footnote-style numbers removed.
pub fn normalize(text: &str) -> String {
    let collapsed = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ");

    let mut current = collapsed.as_str();
    while let Some(stripped) = strip_trailing_number(current) {
        current = stripped;
    }
    current.to_string()
}

// A trailing digit run only counts as a footnote marker when something other
// than a digit precedes it, so a bare number like "12" survives.
fn strip_trailing_number(text: &str) -> Option<&str> {
    let digits_start = text.trim_end_matches(|ch: char| ch.is_ascii_digit()).len();
    if digits_start == 0 || digits_start == text.len() {
        return None;
    }
    Some(text[..digits_start].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(normalize("  System\t  Overview \n"), "system overview");
        assert_eq!(normalize("Scope  "), normalize("scope"));
    }

    #[test]
    fn strips_trailing_footnote_number() {
        assert_eq!(normalize("Overview 3"), "overview");
        assert_eq!(normalize("Overview3"), "overview");
        assert_eq!(normalize("3.2 System Overview"), "3.2 system overview");
    }

    #[test]
    fn keeps_purely_numeric_text() {
        assert_eq!(normalize("12"), "12");
        assert_eq!(normalize(" 2024 "), "2024");
    }

    #[test]
    fn is_idempotent() {
        for input in [
            "Overview 3 4",
            "Annex  B 12 ",
            "3.2",
            "목차 7",
            "Appendix A",
            "",
            "  ",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }
}
