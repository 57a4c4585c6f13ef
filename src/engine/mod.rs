pub mod body_scan;
pub mod html;
pub mod images;
pub mod matcher;
pub mod normalize;
pub mod reconstruct;
pub mod report;
pub mod similarity;
pub mod toc_locate;
pub mod toc_parse;


use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::ConverterConfig;
use crate::document::DocumentSource;
use crate::model::{AnalysisReport, ConversionStats, HeadingCounts};

use self::body_scan::scan_body;
use self::images::ImageStore;
use self::matcher::{ClaimedFragments, MatchOutcome, MatchResult, Matcher};
use self::reconstruct::{Reconstruction, reconstruct};
use self::report::{MatchSummary, render_report};
use self::toc_locate::{TocLocator, TocRegion};
use self::toc_parse::{TocEntry, TocParser};

/// Non-fatal problems met while converting one document, in the order they
/// occurred. Every message is also logged.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    pub fn push(&mut self, message: String) {
        warn!(warning = %message, "conversion warning");
        self.messages.push(message);
    }

    /// Unwraps a per-page extraction result, turning a failure into a warning
    /// and an empty contribution.
    pub fn recover<T: Default>(&mut self, page_index: usize, what: &str, result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => {
                self.push(format!(
                    "page {}: {what} extraction failed: {err:#}",
                    page_index + 1
                ));
                T::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.messages
    }
}

#[derive(Debug, Clone, Default)]
pub struct TocScan {
    pub region: Option<TocRegion>,
    pub entries: Vec<TocEntry>,
}

impl TocScan {
    pub fn body_start(&self) -> usize {
        self.region.map(|region| region.body_start()).unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct ConvertedDocument {
    pub toc_region: Option<TocRegion>,
    pub body_start: usize,
    pub entries: Vec<TocEntry>,
    pub outcomes: Vec<MatchOutcome>,
    pub reconstruction: Reconstruction,
    pub warnings: Warnings,
}

impl ConvertedDocument {
    pub fn match_results(&self) -> Vec<MatchResult<'_>> {
        self.entries
            .iter()
            .zip(&self.outcomes)
            .map(|(entry, outcome)| MatchResult {
                entry,
                outcome: outcome.clone(),
            })
            .collect()
    }

    pub fn html(&self) -> String {
        self.reconstruction.html()
    }

    /// The operator report, or `None` when there was nothing to match.
    pub fn report(&self, filename: &str) -> Option<String> {
        if self.outcomes.is_empty() {
            return None;
        }
        Some(render_report(filename, &self.match_results()))
    }

    pub fn stats(&self) -> ConversionStats {
        let summary = MatchSummary::from_results(&self.match_results());
        ConversionStats {
            paragraphs: self.reconstruction.paragraphs,
            headings: section_heading_counts(&self.entries),
            tables: self.reconstruction.tables,
            images: self.reconstruction.images,
            toc_entries: self.entries.len(),
            matched: summary.matched,
            failed: summary.failed,
            skipped: summary.skipped,
        }
    }
}

/// Compiled once per run and shared by every document converted with the
/// same configuration.
#[derive(Debug)]
pub struct Engine {
    config: ConverterConfig,
    locator: TocLocator,
    parser: TocParser,
    matcher: Matcher,
}

impl Engine {
    pub fn new(config: ConverterConfig) -> Result<Self> {
        Ok(Self {
            locator: TocLocator::new(&config)?,
            parser: TocParser::new(&config)?,
            matcher: Matcher::new(config.matching),
            config,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn read_toc<D: DocumentSource + ?Sized>(
        &self,
        document: &D,
        warnings: &mut Warnings,
    ) -> TocScan {
        let scanned = self.locator.max_pages().min(document.page_count());
        let page_texts = (0..scanned)
            .map(|page| warnings.recover(page, "text", document.page_text(page)))
            .collect::<Vec<String>>();

        let Some(region) = self.locator.locate(&page_texts) else {
            warnings.push(
                "no table of contents detected; every fragment is rendered as a paragraph"
                    .to_string(),
            );
            return TocScan::default();
        };

        let entries = self.parser.parse(&page_texts[region.start..=region.end]);
        info!(
            toc_start = region.start + 1,
            toc_end = region.end + 1,
            entries = entries.len(),
            "parsed table of contents"
        );
        TocScan {
            region: Some(region),
            entries,
        }
    }

    /// Runs the whole pipeline on one document. Images are written through
    /// `image_store` when one is given and image extraction is enabled;
    /// otherwise they are left out of the HTML.
    pub fn convert<D: DocumentSource + ?Sized>(
        &self,
        document: &D,
        image_store: Option<&mut ImageStore>,
    ) -> ConvertedDocument {
        let mut warnings = Warnings::default();
        let options = self.config.options;

        let toc = self.read_toc(document, &mut warnings);
        let body_start = toc.body_start();
        let pages = scan_body(document, body_start, &options, &mut warnings);

        let mut claimed = ClaimedFragments::default();
        let results =
            self.matcher
                .match_entries(&toc.entries, &pages, body_start, &mut claimed);
        for result in &results {
            if let MatchOutcome::Matched {
                page_index,
                similarity,
                ..
            } = &result.outcome
            {
                debug!(
                    entry = %result.entry.clean_text,
                    page = page_index + 1,
                    similarity,
                    "matched toc entry"
                );
            }
        }
        debug!(claimed = claimed.count(), "matching finished");

        let image_sources = match image_store {
            Some(store) if options.extract_images => store.store_pages(&pages, &mut warnings),
            _ => Default::default(),
        };
        let reconstruction = reconstruct(&pages, &results, &image_sources);
        let outcomes = results
            .into_iter()
            .map(|result| result.outcome)
            .collect::<Vec<MatchOutcome>>();

        ConvertedDocument {
            toc_region: toc.region,
            body_start,
            entries: toc.entries,
            outcomes,
            reconstruction,
            warnings,
        }
    }

    /// Structure overview without matching or writing anything.
    pub fn analyze<D: DocumentSource + ?Sized>(
        &self,
        document: &D,
        filename: &str,
    ) -> AnalysisReport {
        let mut warnings = Warnings::default();
        let toc = self.read_toc(document, &mut warnings);

        let mut images = 0;
        let mut tables = 0;
        for page in 0..document.page_count() {
            images += warnings.recover(page, "images", document.images(page)).len();
            tables += warnings.recover(page, "tables", document.tables(page)).len();
        }

        AnalysisReport {
            filename: filename.to_string(),
            pages: document.page_count(),
            toc_found: toc.region.is_some(),
            toc_pages: toc.region.map(|region| [region.start + 1, region.end + 1]),
            toc_entries: toc.entries.len(),
            section_entries: toc.entries.iter().filter(|entry| entry.is_section).count(),
            appendix_entries: toc
                .entries
                .iter()
                .filter(|entry| self.parser.is_appendix(entry))
                .count(),
            headings: section_heading_counts(&toc.entries),
            images,
            tables,
            warnings: warnings.into_vec(),
        }
    }
}

fn section_heading_counts(entries: &[TocEntry]) -> HeadingCounts {
    let mut counts = HeadingCounts::default();
    for entry in entries.iter().filter(|entry| entry.is_section) {
        counts.record(entry.heading_level);
    }
    counts
}
