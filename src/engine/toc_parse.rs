use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::ConverterConfig;

pub const MAX_HEADING_LEVEL: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub raw_text: String,
    pub clean_text: String,
    pub heading_level: u8,
    pub declared_page: usize,
    pub is_section: bool,
    pub numbering: String,
}

#[derive(Debug)]
pub struct TocParser {
    keyword_lines: HashSet<String>,
    non_heading_prefixes: Vec<String>,
    section_prefixes: Vec<String>,
    page_suffix: Regex,
    leader_suffix: Regex,
    bare_number_suffix: Regex,
    numbering_prefix: Regex,
}

impl TocParser {
    pub fn new(config: &ConverterConfig) -> Result<Self> {
        Ok(Self {
            keyword_lines: config
                .toc_keywords
                .iter()
                .map(|keyword| keyword.trim().to_lowercase())
                .collect(),
            non_heading_prefixes: lowercase_all(&config.non_heading_prefixes),
            section_prefixes: lowercase_all(&config.section_prefixes),
            page_suffix: Regex::new(r"[.\s]*(\d+)\s*$")
                .context("failed to compile page-number suffix regex")?,
            leader_suffix: Regex::new(r"\s*\.{2,}\s*\d+\s*$")
                .context("failed to compile dot-leader suffix regex")?,
            bare_number_suffix: Regex::new(r"\s+\d+\s*$")
                .context("failed to compile bare page-number regex")?,
            numbering_prefix: Regex::new(r"^(\d+(?:\.\d+)*\.?)\s")
                .context("failed to compile numbering prefix regex")?,
        })
    }

    /// Parses the text of the TOC pages, in page order, into entries. Lines
    /// without a trailing page number are not entries and are dropped.
    pub fn parse(&self, pages: &[String]) -> Vec<TocEntry> {
        pages
            .iter()
            .flat_map(|page| page.lines())
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    pub fn parse_line(&self, line: &str) -> Option<TocEntry> {
        let line = line.trim();
        if line.is_empty() || self.keyword_lines.contains(&line.to_lowercase()) {
            return None;
        }

        let declared_page = self
            .page_suffix
            .captures(line)
            .and_then(|captures| captures.get(1))
            .and_then(|digits| digits.as_str().parse::<usize>().ok())?;

        let without_leader = self.leader_suffix.replace(line, "");
        let clean_text = self
            .bare_number_suffix
            .replace(&without_leader, "")
            .trim()
            .to_string();
        if clean_text.is_empty() || clean_text.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }

        let is_section = !starts_with_any(&clean_text, &self.non_heading_prefixes);
        let numbering = self.numbering(&clean_text);
        let heading_level = heading_level_for(&numbering);

        Some(TocEntry {
            raw_text: line.to_string(),
            clean_text,
            heading_level,
            declared_page,
            is_section,
            numbering,
        })
    }

    /// Appendix-style entries carry no dotted numbering and always open a
    /// top-level section.
    pub fn is_appendix(&self, entry: &TocEntry) -> bool {
        entry.numbering.is_empty() && starts_with_any(&entry.clean_text, &self.section_prefixes)
    }

    fn numbering(&self, clean_text: &str) -> String {
        self.numbering_prefix
            .captures(clean_text)
            .and_then(|captures| captures.get(1))
            .map(|prefix| prefix.as_str().trim_end_matches('.').to_string())
            .unwrap_or_default()
    }
}

pub fn heading_level_for(numbering: &str) -> u8 {
    if numbering.is_empty() {
        return 1;
    }
    let depth = numbering.matches('.').count() + 1;
    depth.min(MAX_HEADING_LEVEL as usize) as u8
}

fn starts_with_any(text: &str, lowered_prefixes: &[String]) -> bool {
    let lowered = text.to_lowercase();
    lowered_prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && lowered.starts_with(prefix.as_str()))
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|value| value.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TocParser {
        TocParser::new(&ConverterConfig::default()).expect("parser should build")
    }

    #[test]
    fn numbered_entry_with_dot_leader() {
        let entry = parser()
            .parse_line("3.2 System Overview ..... 14")
            .expect("line should parse");

        assert_eq!(entry.clean_text, "3.2 System Overview");
        assert_eq!(entry.numbering, "3.2");
        assert_eq!(entry.heading_level, 2);
        assert_eq!(entry.declared_page, 14);
        assert!(entry.is_section);
        assert_eq!(entry.raw_text, "3.2 System Overview ..... 14");
    }

    #[test]
    fn figure_reference_is_not_a_section() {
        let entry = parser()
            .parse_line("Figure 4: Block Diagram .......... 9")
            .expect("line should parse");

        assert!(!entry.is_section);
        assert_eq!(entry.clean_text, "Figure 4: Block Diagram");
        assert_eq!(entry.declared_page, 9);
        assert_eq!(entry.heading_level, 1);
    }

    #[test]
    fn bare_page_number_without_leader() {
        let entry = parser()
            .parse_line("1 Introduction 3")
            .expect("line should parse");
        assert_eq!(entry.clean_text, "1 Introduction");
        assert_eq!(entry.numbering, "1");
        assert_eq!(entry.heading_level, 1);
        assert_eq!(entry.declared_page, 3);
    }

    #[test]
    fn trailing_dot_in_numbering_is_dropped() {
        let entry = parser()
            .parse_line("4.1.1. Timing budget .... 22")
            .expect("line should parse");
        assert_eq!(entry.numbering, "4.1.1");
        assert_eq!(entry.heading_level, 3);
    }

    #[test]
    fn deep_numbering_is_capped() {
        let entry = parser()
            .parse_line("1.2.3.4.5.6.7 Very deep ..... 40")
            .expect("line should parse");
        assert_eq!(entry.heading_level, MAX_HEADING_LEVEL);
    }

    #[test]
    fn rejects_lines_without_page_numbers_and_numeric_only_text() {
        let parser = parser();
        assert!(parser.parse_line("Foreword").is_none());
        assert!(parser.parse_line("   ").is_none());
        assert!(parser.parse_line("12 ...... 14").is_none());
        assert!(parser.parse_line("........ 14").is_none());
        assert!(parser.parse_line("Table of Contents").is_none());
    }

    #[test]
    fn appendix_entries_are_top_level() {
        let parser = parser();
        let entry = parser
            .parse_line("Appendix A Glossary ...... 80")
            .expect("line should parse");
        assert_eq!(entry.heading_level, 1);
        assert!(entry.is_section);
        assert!(parser.is_appendix(&entry));
    }

    #[test]
    fn parse_keeps_page_then_line_order() {
        let pages = vec![
            "Contents\n1 Intro ..... 3\nunnumbered text".to_string(),
            "2 Scope ..... 5\n2.1 Goals ..... 6".to_string(),
        ];
        let entries = parser().parse(&pages);
        let texts = entries
            .iter()
            .map(|entry| entry.clean_text.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(texts, vec!["1 Intro", "2 Scope", "2.1 Goals"]);
    }

    #[test]
    fn heading_level_follows_numbering_depth() {
        for (numbering, expected) in [("", 1), ("7", 1), ("3.2", 2), ("1.1.1.1", 4)] {
            assert_eq!(heading_level_for(numbering), expected, "{numbering}");
        }
    }
}
