use std::collections::BTreeSet;
use std::ops::Range;

use crate::config::MatchingConfig;

use super::body_scan::BodyPage;
use super::normalize::normalize;
use super::similarity::similarity_ratio;
use super::toc_parse::TocEntry;

/// Identity of one body fragment: its page and its position on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentKey {
    pub page_index: usize,
    pub fragment_index: usize,
}

/// Fragments already assigned to some TOC entry. Threaded through one whole
/// matching run so that no fragment is ever claimed twice.
#[derive(Debug, Clone, Default)]
pub struct ClaimedFragments {
    keys: BTreeSet<FragmentKey>,
}

impl ClaimedFragments {
    pub fn is_claimed(&self, key: FragmentKey) -> bool {
        self.keys.contains(&key)
    }

    fn claim(&mut self, key: FragmentKey) {
        let newly_claimed = self.keys.insert(key);
        debug_assert!(newly_claimed, "fragment {key:?} claimed twice");
    }

    pub fn count(&self) -> usize {
        self.keys.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub text: String,
    pub page_index: usize,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Skipped,
    Matched {
        text: String,
        page_index: usize,
        similarity: f64,
        fragments: Vec<FragmentKey>,
    },
    Unmatched {
        suggestions: Vec<Suggestion>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    pub entry: &'a TocEntry,
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone)]
struct FuzzyCandidate {
    key: FragmentKey,
    text: String,
    similarity: f64,
}

#[derive(Debug, Clone)]
pub struct Matcher {
    settings: MatchingConfig,
}

impl Matcher {
    pub fn new(settings: MatchingConfig) -> Self {
        Self { settings }
    }

    /// Matches every entry in TOC order. `pages[i]` must hold page
    /// `body_start + i`. Earlier entries claim fragments first, so the order of
    /// `entries` affects the outcome.
    pub fn match_entries<'a>(
        &self,
        entries: &'a [TocEntry],
        pages: &[BodyPage],
        body_start: usize,
        claimed: &mut ClaimedFragments,
    ) -> Vec<MatchResult<'a>> {
        debug_assert!(
            pages
                .iter()
                .enumerate()
                .all(|(offset, page)| page.page_index == body_start + offset)
        );

        entries
            .iter()
            .map(|entry| MatchResult {
                entry,
                outcome: self.match_entry(entry, pages, body_start, claimed),
            })
            .collect()
    }

    pub fn match_entry(
        &self,
        entry: &TocEntry,
        pages: &[BodyPage],
        body_start: usize,
        claimed: &mut ClaimedFragments,
    ) -> MatchOutcome {
        if !entry.is_section {
            return MatchOutcome::Skipped;
        }

        let needle = normalize(&entry.clean_text);
        if needle.is_empty() {
            return MatchOutcome::Unmatched {
                suggestions: Vec::new(),
            };
        }
        let needle_chars = needle.chars().count();

        let window = self.search_window(entry, pages.len(), body_start);
        let mut best: Option<FuzzyCandidate> = None;
        let mut suggestions = Vec::new();

        for page_index in window.clone() {
            let fragments = &pages[page_index - body_start].fragments;

            for (fragment_index, fragment) in fragments.iter().enumerate() {
                let key = FragmentKey {
                    page_index,
                    fragment_index,
                };
                if claimed.is_claimed(key) {
                    continue;
                }

                let haystack = normalize(&fragment.text);
                if haystack.starts_with(&needle) {
                    claimed.claim(key);
                    return MatchOutcome::Matched {
                        text: fragment.text.clone(),
                        page_index,
                        similarity: 1.0,
                        fragments: vec![key],
                    };
                }

                if let Some(next) = fragments.get(fragment_index + 1) {
                    let next_key = FragmentKey {
                        page_index,
                        fragment_index: fragment_index + 1,
                    };
                    let combined = format!("{} {}", haystack, normalize(&next.text));
                    if !claimed.is_claimed(next_key) && combined.starts_with(&needle) {
                        claimed.claim(key);
                        claimed.claim(next_key);
                        return MatchOutcome::Matched {
                            text: format!("{} {}", fragment.text, next.text),
                            page_index,
                            similarity: 1.0,
                            fragments: vec![key, next_key],
                        };
                    }
                }

                let Some(similarity) = self.scored_similarity(&needle, needle_chars, &haystack)
                else {
                    continue;
                };

                if similarity >= self.settings.fuzzy_threshold {
                    if best
                        .as_ref()
                        .is_none_or(|current| similarity > current.similarity)
                    {
                        best = Some(FuzzyCandidate {
                            key,
                            text: fragment.text.clone(),
                            similarity,
                        });
                    }
                } else {
                    suggestions.push(Suggestion {
                        text: fragment.text.clone(),
                        page_index,
                        similarity: displayed_score(similarity),
                    });
                }
            }
        }

        if let Some(best) = best {
            claimed.claim(best.key);
            return MatchOutcome::Matched {
                text: best.text,
                page_index: best.key.page_index,
                similarity: best.similarity,
                fragments: vec![best.key],
            };
        }

        suggestions.extend(self.suggestions_outside(
            &window,
            &needle,
            needle_chars,
            pages,
            body_start,
            claimed,
        ));
        // Stable: equal displayed scores keep scan order.
        suggestions.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        suggestions.truncate(self.settings.max_suggestions);

        MatchOutcome::Unmatched { suggestions }
    }

    /// Page indices searched for `entry`: the declared page mapped onto the
    /// body, widened by the page window and clamped to the available pages.
    pub fn search_window(&self, entry: &TocEntry, page_count: usize, body_start: usize) -> Range<usize> {
        let window = self.settings.page_window;
        let target = body_start
            .saturating_add(entry.declared_page)
            .saturating_sub(1);
        let last = body_start.saturating_add(page_count);

        let start = target.saturating_sub(window).max(body_start);
        let end = target.saturating_add(window).saturating_add(1).min(last);
        start..end.max(start)
    }

    // Ratio for candidates that can reach the suggestion threshold; `None`
    // when even a perfect alignment of the shorter string could not.
    fn scored_similarity(&self, needle: &str, needle_chars: usize, haystack: &str) -> Option<f64> {
        let haystack_chars = haystack.chars().count();
        let upper_bound =
            2.0 * needle_chars.min(haystack_chars) as f64 / (needle_chars + haystack_chars) as f64;
        if upper_bound < self.settings.suggestion_threshold {
            return None;
        }

        let similarity = similarity_ratio(needle, haystack);
        (similarity >= self.settings.suggestion_threshold).then_some(similarity)
    }

    // Unmatched entries whose heading sits beyond the page window still get
    // pointers to where it probably is. These are never promoted to matches.
    fn suggestions_outside(
        &self,
        window: &Range<usize>,
        needle: &str,
        needle_chars: usize,
        pages: &[BodyPage],
        body_start: usize,
        claimed: &ClaimedFragments,
    ) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        for page in pages {
            if window.contains(&page.page_index) {
                continue;
            }
            debug_assert!(page.page_index >= body_start);

            for (fragment_index, fragment) in page.fragments.iter().enumerate() {
                let key = FragmentKey {
                    page_index: page.page_index,
                    fragment_index,
                };
                if claimed.is_claimed(key) {
                    continue;
                }

                let haystack = normalize(&fragment.text);
                if let Some(similarity) = self.scored_similarity(needle, needle_chars, &haystack) {
                    suggestions.push(Suggestion {
                        text: fragment.text.clone(),
                        page_index: page.page_index,
                        similarity: displayed_score(similarity),
                    });
                }
            }
        }

        suggestions
    }
}

/// Suggestion scores are kept at the two decimals the report prints.
fn displayed_score(similarity: f64) -> f64 {
    (similarity * 100.0).round() / 100.0
}
