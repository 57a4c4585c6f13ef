use std::collections::{BTreeMap, HashMap};

use super::body_scan::BodyPage;
use super::html;
use super::images::ImageKey;
use super::matcher::{MatchOutcome, MatchResult};
use super::normalize::normalize;
use super::toc_parse::TocEntry;

// Shorter keys would turn stray one-letter fragments into headings.
const MIN_HEADING_KEY_CHARS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    pub blocks: Vec<String>,
    pub paragraphs: usize,
    pub headings: usize,
    pub tables: usize,
    pub images: usize,
}

impl Reconstruction {
    pub fn html(&self) -> String {
        self.blocks.join("\n\n")
    }

    fn push_placed(&mut self, block: Placed) {
        match block {
            Placed::Table(markup) => {
                self.tables += 1;
                self.blocks.push(markup);
            }
            Placed::Image(markup) => {
                self.images += 1;
                self.blocks.push(markup);
            }
        }
    }
}

/// Lookup from the normalized matched text to the entry that owns it. A later
/// entry with the same key replaces an earlier one.
pub fn heading_lookup<'a>(results: &[MatchResult<'a>]) -> HashMap<String, &'a TocEntry> {
    let mut lookup = HashMap::new();
    for result in results {
        let MatchOutcome::Matched { text, .. } = &result.outcome else {
            continue;
        };
        if !result.entry.is_section {
            continue;
        }
        let key = normalize(text);
        if key.chars().count() >= MIN_HEADING_KEY_CHARS {
            lookup.insert(key, result.entry);
        }
    }
    lookup
}

/// Replays the body in page order. Tables and images are placed before the
/// first fragment that starts at or below their top edge; whatever is left is
/// appended at the end of the page.
pub fn reconstruct(
    pages: &[BodyPage],
    results: &[MatchResult<'_>],
    image_sources: &BTreeMap<ImageKey, String>,
) -> Reconstruction {
    let lookup = heading_lookup(results);
    let mut out = Reconstruction::default();

    for page in pages {
        let mut placed = Vec::new();
        for table in &page.tables {
            if let Some(markup) = html::table(&table.rows) {
                placed.push((table.bbox.top, Placed::Table(markup)));
            }
        }
        for (index, image) in page.images.iter().enumerate() {
            if let Some(src) = image_sources.get(&(page.page_index, index)) {
                placed.push((image.bbox.top, Placed::Image(html::image(src))));
            }
        }
        placed.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut pending = placed.into_iter().peekable();
        for fragment in &page.fragments {
            while let Some((_, block)) =
                pending.next_if(|(top, _)| *top <= fragment.bbox.top)
            {
                out.push_placed(block);
            }

            match lookup.get(&normalize(&fragment.text)) {
                Some(entry) => {
                    out.blocks
                        .push(html::heading(entry.heading_level, &fragment.text));
                    out.headings += 1;
                }
                None => {
                    out.blocks.push(html::paragraph(
                        &fragment.text,
                        fragment.is_bold,
                        fragment.is_italic,
                    ));
                    out.paragraphs += 1;
                }
            }
        }
        for (_, block) in pending {
            out.push_placed(block);
        }
    }

    out
}

enum Placed {
    Table(String),
    Image(String),
}
