use anyhow::{Context, Result};
use regex::Regex;

use crate::config::ConverterConfig;

/// Inclusive range of 0-based page indices holding the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocRegion {
    pub start: usize,
    pub end: usize,
}

impl TocRegion {
    pub fn body_start(&self) -> usize {
        self.end + 1
    }
}

#[derive(Debug)]
pub struct TocLocator {
    keywords: Vec<String>,
    max_pages: usize,
    dot_leader: Regex,
}

impl TocLocator {
    pub fn new(config: &ConverterConfig) -> Result<Self> {
        Ok(Self {
            keywords: config
                .toc_keywords
                .iter()
                .map(|keyword| keyword.trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
            max_pages: config.toc_max_search_pages,
            dot_leader: Regex::new(r"\.{4,}").context("failed to compile dot-leader regex")?,
        })
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// `pages` holds the leading page texts of the document; anything beyond
    /// the scan limit is ignored.
    pub fn locate(&self, pages: &[String]) -> Option<TocRegion> {
        let limit = self.max_pages.min(pages.len());
        let mut start = None;

        for (index, text) in pages.iter().enumerate().take(limit) {
            match start {
                None => {
                    if self.has_marker(text) {
                        start = Some(index);
                    }
                }
                Some(start) => {
                    if !self.dot_leader.is_match(text) {
                        return Some(TocRegion {
                            start,
                            end: index - 1,
                        });
                    }
                }
            }
        }

        let start = start?;
        let end = (start..limit)
            .filter(|&index| self.dot_leader.is_match(&pages[index]))
            .last()
            .unwrap_or(start);
        Some(TocRegion { start, end })
    }

    fn has_marker(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> TocLocator {
        TocLocator::new(&ConverterConfig::default()).expect("locator should build")
    }

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|text| text.to_string()).collect()
    }

    #[test]
    fn region_ends_before_first_page_without_leaders() {
        let pages = pages(&[
            "Cover page",
            "Table of Contents\n1 Intro ........ 3",
            "2 Scope ........ 5",
            "1 Intro\nBody text",
        ]);

        assert_eq!(locator().locate(&pages), Some(TocRegion { start: 1, end: 2 }));
    }

    #[test]
    fn marker_match_is_case_insensitive() {
        let pages = pages(&["CONTENTS\n1 Intro ..... 2", "Body"]);
        assert_eq!(locator().locate(&pages), Some(TocRegion { start: 0, end: 0 }));
    }

    #[test]
    fn missing_marker_yields_none() {
        let pages = pages(&["Cover", "1 Intro ...... 2", "Body"]);
        assert_eq!(locator().locate(&pages), None);
    }

    #[test]
    fn unterminated_region_ends_at_last_leader_page_within_limit() {
        let mut config = ConverterConfig::default();
        config.toc_max_search_pages = 3;
        let locator = TocLocator::new(&config).expect("locator should build");

        let pages = pages(&[
            "Contents",
            "1 Intro ..... 4",
            "2 Scope ..... 6",
            "page beyond the limit without leaders",
        ]);

        assert_eq!(locator.locate(&pages), Some(TocRegion { start: 0, end: 2 }));
    }

    #[test]
    fn three_dots_are_not_a_leader() {
        let pages = pages(&["Contents\n1 Intro ..... 2", "Etc... and so on", "Body"]);
        assert_eq!(locator().locate(&pages), Some(TocRegion { start: 0, end: 0 }));
    }
}
