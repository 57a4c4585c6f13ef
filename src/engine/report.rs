use super::matcher::{MatchOutcome, MatchResult};

const RULE_WIDTH: usize = 50;
const CANDIDATE_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub sections: usize,
    pub matched: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl MatchSummary {
    pub fn from_results(results: &[MatchResult<'_>]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.outcome {
                MatchOutcome::Skipped => summary.skipped += 1,
                MatchOutcome::Matched { .. } => {
                    summary.sections += 1;
                    summary.matched += 1;
                }
                MatchOutcome::Unmatched { .. } => {
                    summary.sections += 1;
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Percentage of section entries that matched; 0 when there are none.
    pub fn match_rate(&self) -> f64 {
        if self.sections == 0 {
            return 0.0;
        }
        self.matched as f64 * 100.0 / self.sections as f64
    }
}

pub fn render_report(filename: &str, results: &[MatchResult<'_>]) -> String {
    let rule = "─".repeat(RULE_WIDTH);
    let mut lines = vec![format!("[Conversion report] {filename}"), rule.clone()];

    for result in results {
        let entry = result.entry;
        match &result.outcome {
            MatchOutcome::Skipped => {
                lines.push(format!(
                    "- [skipped] \"{}\" (figure/table reference)",
                    entry.clean_text
                ));
            }
            MatchOutcome::Matched {
                page_index,
                similarity,
                ..
            } => {
                lines.push(format!(
                    "✓ h{}: \"{}\" (p.{}) → matched (similarity: {similarity:.2})",
                    entry.heading_level,
                    entry.clean_text,
                    page_index + 1
                ));
            }
            MatchOutcome::Unmatched { suggestions } => {
                lines.push(format!(
                    "✗ h{}: \"{}\" (p.{}) → not matched",
                    entry.heading_level, entry.clean_text, entry.declared_page
                ));
                for suggestion in suggestions {
                    lines.push(format!(
                        "   candidate: \"{}\" (p.{}, {:.2})",
                        preview(&suggestion.text),
                        suggestion.page_index + 1,
                        suggestion.similarity
                    ));
                }
            }
        }
    }

    let summary = MatchSummary::from_results(results);
    lines.push(rule);
    lines.push(format!(
        "Sections: {} | Matched: {} ({:.1}%) | Failed: {}",
        summary.sections,
        summary.matched,
        summary.match_rate(),
        summary.failed
    ));

    lines.join("\n")
}

fn preview(text: &str) -> String {
    text.chars().take(CANDIDATE_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::matcher::{FragmentKey, Suggestion};
    use crate::engine::toc_parse::TocEntry;

    fn entry(clean_text: &str, level: u8, declared_page: usize, is_section: bool) -> TocEntry {
        TocEntry {
            raw_text: clean_text.to_string(),
            clean_text: clean_text.to_string(),
            heading_level: level,
            declared_page,
            is_section,
            numbering: String::new(),
        }
    }

    #[test]
    fn renders_each_outcome_and_the_summary() {
        let figure = entry("Figure 4: Block Diagram", 1, 9, false);
        let overview = entry("3.2 System Overview", 2, 14, true);
        let missing = entry("5 Verification", 1, 30, true);
        let results = vec![
            MatchResult {
                entry: &figure,
                outcome: MatchOutcome::Skipped,
            },
            MatchResult {
                entry: &overview,
                outcome: MatchOutcome::Matched {
                    text: "3.2 System Overveiw".to_string(),
                    page_index: 15,
                    similarity: 0.9333,
                    fragments: vec![FragmentKey {
                        page_index: 15,
                        fragment_index: 0,
                    }],
                },
            },
            MatchResult {
                entry: &missing,
                outcome: MatchOutcome::Unmatched {
                    suggestions: vec![Suggestion {
                        text: "x".repeat(80),
                        page_index: 33,
                        similarity: 0.6238,
                    }],
                },
            },
        ];

        let report = render_report("manual.pdf", &results);
        let lines = report.lines().collect::<Vec<&str>>();
        let rule = "─".repeat(50);

        assert_eq!(lines[0], "[Conversion report] manual.pdf");
        assert_eq!(lines[1], rule);
        assert_eq!(
            lines[2],
            "- [skipped] \"Figure 4: Block Diagram\" (figure/table reference)"
        );
        assert_eq!(
            lines[3],
            "✓ h2: \"3.2 System Overview\" (p.16) → matched (similarity: 0.93)"
        );
        assert_eq!(lines[4], "✗ h1: \"5 Verification\" (p.30) → not matched");
        assert_eq!(
            lines[5],
            format!("   candidate: \"{}\" (p.34, 0.62)", "x".repeat(60))
        );
        assert_eq!(lines[6], rule);
        assert_eq!(lines[7], "Sections: 2 | Matched: 1 (50.0%) | Failed: 1");
    }

    #[test]
    fn empty_results_have_zero_rate() {
        let summary = MatchSummary::from_results(&[]);
        assert_eq!(summary.match_rate(), 0.0);
        assert!(render_report("a.pdf", &[]).ends_with("Sections: 0 | Matched: 0 (0.0%) | Failed: 0"));
    }
}
