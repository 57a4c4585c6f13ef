use crate::config::OutputOptions;
use crate::document::{BoundingBox, DocumentSource, ImageRegion, TableRegion, TextSpan};

use super::Warnings;

#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub bbox: BoundingBox,
    pub is_bold: bool,
    pub is_italic: bool,
}

/// Everything the engine needs from one body page. `fragments` never contains
/// text lying inside one of `tables` or `images`.
#[derive(Debug, Clone, Default)]
pub struct BodyPage {
    pub page_index: usize,
    pub fragments: Vec<TextFragment>,
    pub tables: Vec<TableRegion>,
    pub images: Vec<ImageRegion>,
}

pub fn scan_body<D: DocumentSource + ?Sized>(
    document: &D,
    body_start: usize,
    options: &OutputOptions,
    warnings: &mut Warnings,
) -> Vec<BodyPage> {
    (body_start..document.page_count())
        .map(|page_index| scan_page(document, page_index, options, warnings))
        .collect()
}

fn scan_page<D: DocumentSource + ?Sized>(
    document: &D,
    page_index: usize,
    options: &OutputOptions,
    warnings: &mut Warnings,
) -> BodyPage {
    let spans = warnings.recover(page_index, "text", document.text_spans(page_index));
    let tables = if options.extract_tables {
        warnings.recover(page_index, "tables", document.tables(page_index))
    } else {
        Vec::new()
    };
    let images = if options.extract_images {
        warnings.recover(page_index, "images", document.images(page_index))
    } else {
        Vec::new()
    };

    let excluded = tables
        .iter()
        .map(|table| table.bbox)
        .chain(images.iter().map(|image| image.bbox))
        .collect::<Vec<BoundingBox>>();

    let fragments = merge_blocks(&spans)
        .into_iter()
        .filter(|fragment| !is_noise(&fragment.text))
        .filter(|fragment| !excluded.iter().any(|region| region.intersects(&fragment.bbox)))
        .collect();

    BodyPage {
        page_index,
        fragments,
        tables,
        images,
    }
}

fn merge_blocks(spans: &[TextSpan]) -> Vec<TextFragment> {
    let mut fragments = Vec::new();
    let mut current: Option<(usize, Vec<&str>, TextFragment)> = None;

    for span in spans {
        let text = span.text.trim();

        if let Some((block, parts, fragment)) = current.as_mut() {
            if *block == span.block {
                if !text.is_empty() {
                    parts.push(text);
                    fragment.is_bold |= span.bold;
                    fragment.is_italic |= span.italic;
                }
                fragment.bbox = fragment.bbox.union(&span.bbox);
                continue;
            }
        }

        if let Some(finished) = current.take() {
            fragments.push(finish(finished));
        }

        let non_empty = !text.is_empty();
        current = Some((
            span.block,
            if non_empty { vec![text] } else { Vec::new() },
            TextFragment {
                text: String::new(),
                bbox: span.bbox,
                is_bold: non_empty && span.bold,
                is_italic: non_empty && span.italic,
            },
        ));
    }

    if let Some(finished) = current.take() {
        fragments.push(finish(finished));
    }

    fragments
}

fn finish((_, parts, mut fragment): (usize, Vec<&str>, TextFragment)) -> TextFragment {
    fragment.text = parts.join(" ");
    fragment
}

fn is_noise(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.chars().all(|ch| ch.is_ascii_digit())
}
