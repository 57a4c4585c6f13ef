use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::tables::detect_tables;
use super::{
    BoundingBox, DocumentSource, ImageRegion, TableRegion, TextSpan, content_type_for_extension,
};

/// `DocumentSource` backed by the poppler command line tools: `pdfinfo` for
/// the page count, `pdftotext -layout` for plain page text and
/// `pdftohtml -xml` for positioned spans and embedded images.
pub struct PopplerDocument {
    pdf_path: PathBuf,
    page_count: usize,
    page_texts: Vec<String>,
    extract_images: bool,
    patterns: XmlPatterns,
    scratch: TempDir,
    layouts: RefCell<HashMap<usize, Rc<Result<PageLayout, String>>>>,
}

#[derive(Debug, Default)]
struct PageLayout {
    spans: Vec<TextSpan>,
    tables: Vec<TableRegion>,
    images: Vec<ImageRegion>,
}

impl PopplerDocument {
    pub fn open(pdf_path: &Path, extract_images: bool) -> Result<Self> {
        if !pdf_path.is_file() {
            bail!("input file not found: {}", pdf_path.display());
        }

        let is_pdf = pdf_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            bail!("unsupported input format: {}", pdf_path.display());
        }

        let page_count = read_page_count(pdf_path)?;
        if page_count == 0 {
            bail!("{} contains no pages", pdf_path.display());
        }

        let mut page_texts = extract_pages_with_pdftotext(pdf_path)?;
        page_texts.resize(page_count, String::new());

        let scratch = tempfile::Builder::new()
            .prefix("toc2html_")
            .tempdir()
            .context("failed to create scratch directory for pdftohtml output")?;

        debug!(path = %pdf_path.display(), pages = page_count, "opened pdf");

        Ok(Self {
            pdf_path: pdf_path.to_path_buf(),
            page_count,
            page_texts,
            extract_images,
            patterns: XmlPatterns::new()?,
            scratch,
            layouts: RefCell::new(HashMap::new()),
        })
    }

    fn layout(&self, page: usize) -> Result<Rc<Result<PageLayout, String>>> {
        if page >= self.page_count {
            bail!(
                "page index {} out of range ({} pages)",
                page,
                self.page_count
            );
        }

        if let Some(cached) = self.layouts.borrow().get(&page) {
            return Ok(Rc::clone(cached));
        }

        let layout = Rc::new(self.extract_layout(page).map_err(|err| format!("{err:#}")));
        self.layouts.borrow_mut().insert(page, Rc::clone(&layout));
        Ok(layout)
    }

    fn with_layout<T>(&self, page: usize, pick: impl FnOnce(&PageLayout) -> T) -> Result<T> {
        let layout = self.layout(page)?;
        match layout.as_ref() {
            Ok(layout) => Ok(pick(layout)),
            Err(message) => Err(anyhow!("{message}")),
        }
    }

    fn extract_layout(&self, page: usize) -> Result<PageLayout> {
        let page_number = (page + 1).to_string();
        let output_base = self.scratch.path().join(format!("page_{page_number}"));

        let mut command = Command::new("pdftohtml");
        command
            .arg("-xml")
            .arg("-q")
            .arg("-f")
            .arg(&page_number)
            .arg("-l")
            .arg(&page_number);
        if !self.extract_images {
            command.arg("-i");
        }
        command.arg(&self.pdf_path).arg(&output_base);

        let output = command.output().with_context(|| {
            format!("failed to execute pdftohtml for {}", self.pdf_path.display())
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftohtml returned non-zero exit status for {} page {}: {}",
                self.pdf_path.display(),
                page_number,
                stderr.trim()
            );
        }

        let xml_path = output_base.with_extension("xml");
        let raw = fs::read(&xml_path)
            .with_context(|| format!("failed to read {}", xml_path.display()))?;
        let xml = String::from_utf8_lossy(&raw);

        let spans = group_into_blocks(&self.patterns.scan_text(&xml));
        let tables = detect_tables(&spans);
        let images = self.patterns.scan_images(&xml, self.scratch.path());

        Ok(PageLayout {
            spans,
            tables,
            images,
        })
    }
}

impl DocumentSource for PopplerDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, page: usize) -> Result<String> {
        self.page_texts
            .get(page)
            .cloned()
            .with_context(|| format!("page index {page} out of range"))
    }

    fn text_spans(&self, page: usize) -> Result<Vec<TextSpan>> {
        self.with_layout(page, |layout| layout.spans.clone())
    }

    fn tables(&self, page: usize) -> Result<Vec<TableRegion>> {
        self.with_layout(page, |layout| layout.tables.clone())
    }

    fn images(&self, page: usize) -> Result<Vec<ImageRegion>> {
        self.with_layout(page, |layout| layout.images.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RawSpan {
    text: String,
    bbox: BoundingBox,
    bold: bool,
    italic: bool,
    font_size: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct FontInfo {
    size: f64,
    bold: bool,
    italic: bool,
}

#[derive(Debug)]
struct XmlPatterns {
    fontspec: Regex,
    text: Regex,
    image: Regex,
    markup: Regex,
}

impl XmlPatterns {
    fn new() -> Result<Self> {
        Ok(Self {
            fontspec: Regex::new(r#"<fontspec\s+id="(\d+)"\s+size="(-?[\d.]+)"\s+family="([^"]*)""#)
                .context("failed to compile fontspec regex")?,
            text: Regex::new(
                r#"(?s)<text\s+top="(-?[\d.]+)"\s+left="(-?[\d.]+)"\s+width="(-?[\d.]+)"\s+height="(-?[\d.]+)"\s+font="(\d+)"[^>]*>(.*?)</text>"#,
            )
            .context("failed to compile text element regex")?,
            image: Regex::new(
                r#"<image\s+top="(-?[\d.]+)"\s+left="(-?[\d.]+)"\s+width="(-?[\d.]+)"\s+height="(-?[\d.]+)"\s+src="([^"]*)""#,
            )
            .context("failed to compile image element regex")?,
            markup: Regex::new(r"<[^>]+>").context("failed to compile markup regex")?,
        })
    }

    fn scan_fonts(&self, xml: &str) -> HashMap<String, FontInfo> {
        self.fontspec
            .captures_iter(xml)
            .map(|captures| {
                let family = captures[3].to_ascii_lowercase();
                let font = FontInfo {
                    size: captures[2].parse::<f64>().unwrap_or_default(),
                    bold: ["bold", "black", "heavy", "semibold"]
                        .iter()
                        .any(|marker| family.contains(marker)),
                    italic: family.contains("italic") || family.contains("oblique"),
                };
                (captures[1].to_string(), font)
            })
            .collect()
    }

    fn scan_text(&self, xml: &str) -> Vec<RawSpan> {
        let fonts = self.scan_fonts(xml);
        let mut spans = Vec::new();

        for captures in self.text.captures_iter(xml) {
            let content = &captures[6];
            let stripped = self.markup.replace_all(content, "");
            let text = html_escape::decode_html_entities(stripped.as_ref())
                .replace('\u{00a0}', " ");
            if text.trim().is_empty() {
                continue;
            }

            let font = fonts.get(&captures[5]).copied().unwrap_or_default();
            spans.push(RawSpan {
                text,
                bbox: BoundingBox::from_origin(
                    parse_coordinate(&captures[2]),
                    parse_coordinate(&captures[1]),
                    parse_coordinate(&captures[3]),
                    parse_coordinate(&captures[4]),
                ),
                bold: font.bold || content.contains("<b>"),
                italic: font.italic || content.contains("<i>"),
                font_size: font.size,
            });
        }

        spans
    }

    fn scan_images(&self, xml: &str, scratch_dir: &Path) -> Vec<ImageRegion> {
        let mut images = Vec::new();

        for captures in self.image.captures_iter(xml) {
            let src = Path::new(&captures[5]);
            let Some(file_name) = src.file_name() else {
                continue;
            };
            let image_path = scratch_dir.join(file_name);

            let bytes = match fs::read(&image_path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(path = %image_path.display(), error = %err, "failed to read extracted image");
                    continue;
                }
            };

            let extension = image_path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or_default();

            images.push(ImageRegion {
                id: file_name.to_string_lossy().into_owned(),
                bbox: BoundingBox::from_origin(
                    parse_coordinate(&captures[2]),
                    parse_coordinate(&captures[1]),
                    parse_coordinate(&captures[3]),
                    parse_coordinate(&captures[4]),
                ),
                bytes,
                content_type: content_type_for_extension(extension).to_string(),
            });
        }

        images
    }
}

fn parse_coordinate(value: &str) -> f64 {
    value.parse::<f64>().unwrap_or_default()
}

fn group_into_blocks(raw_spans: &[RawSpan]) -> Vec<TextSpan> {
    let mut spans = Vec::with_capacity(raw_spans.len());
    let mut block = 0usize;
    let mut block_bbox: Option<BoundingBox> = None;
    let mut previous: Option<&RawSpan> = None;

    for span in raw_spans {
        let continues = match (block_bbox, previous) {
            (Some(bbox), Some(previous)) => continues_block(&bbox, previous, span),
            _ => true,
        };

        if continues {
            block_bbox = Some(block_bbox.map_or(span.bbox, |bbox| bbox.union(&span.bbox)));
        } else {
            block += 1;
            block_bbox = Some(span.bbox);
        }

        spans.push(TextSpan {
            text: span.text.clone(),
            bbox: span.bbox,
            bold: span.bold,
            italic: span.italic,
            block,
        });
        previous = Some(span);
    }

    spans
}

fn continues_block(block: &BoundingBox, previous: &RawSpan, span: &RawSpan) -> bool {
    let line_height = previous.bbox.height().max(1.0);

    let same_line = (span.bbox.top - previous.bbox.top).abs() <= line_height * 0.5;
    if same_line {
        let gap = span.bbox.x0 - previous.bbox.x1;
        return span.bbox.x0 >= previous.bbox.x0 && gap <= line_height * 2.0;
    }

    let gap = span.bbox.top - previous.bbox.bottom;
    (span.font_size - previous.font_size).abs() < 0.5
        && span.bold == previous.bold
        && gap >= -line_height * 0.5
        && gap <= line_height
        && block.overlaps_horizontally(&span.bbox)
}

fn read_page_count(pdf_path: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(pdf_path)
        .output()
        .with_context(|| format!("failed to execute pdfinfo for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdfinfo returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_page_count(&stdout)
        .with_context(|| format!("pdfinfo reported no page count for {}", pdf_path.display()))
}

fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    pdfinfo_output.lines().find_map(|line| {
        line.strip_prefix("Pages:")
            .and_then(|value| value.trim().parse::<usize>().ok())
    })
}

fn extract_pages_with_pdftotext(pdf_path: &Path) -> Result<Vec<String>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg("-layout")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(split_form_feed_pages(&String::from_utf8_lossy(&output.stdout)))
}

fn split_form_feed_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_XML: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<pdf2xml producer="poppler" version="23.08.0">
<page number="5" position="absolute" top="0" left="0" height="1188" width="918">
	<fontspec id="0" size="18" family="Helvetica-Bold" color="#000000"/>
	<fontspec id="1" size="11" family="Times" color="#000000"/>
<image top="600" left="100" width="200" height="150" src="/tmp/x/page_5-5_1.png"/>
<text top="100" left="72" width="300" height="22" font="0">3.2 System Overview</text>
<text top="140" left="72" width="450" height="14" font="1">The system consists of <i>three</i> parts</text>
<text top="155" left="72" width="430" height="14" font="1">that talk &amp; listen.</text>
<text top="1100" left="450" width="12" height="14" font="1">14</text>
</page>
</pdf2xml>
"##;

    #[test]
    fn scan_text_reads_geometry_and_styles() {
        let patterns = XmlPatterns::new().expect("patterns should compile");
        let spans = patterns.scan_text(PAGE_XML);

        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0].text, "3.2 System Overview");
        assert!(spans[0].bold);
        assert_eq!(spans[0].bbox, BoundingBox::new(72.0, 100.0, 372.0, 122.0));
        assert!(spans[1].italic);
        assert_eq!(spans[1].text, "The system consists of three parts");
        assert_eq!(spans[2].text, "that talk & listen.");
    }

    #[test]
    fn blocks_split_on_style_and_vertical_gaps() {
        let patterns = XmlPatterns::new().expect("patterns should compile");
        let spans = group_into_blocks(&patterns.scan_text(PAGE_XML));

        let blocks = spans.iter().map(|span| span.block).collect::<Vec<usize>>();
        assert_eq!(blocks, vec![0, 1, 1, 2]);
    }

    #[test]
    fn scan_images_skips_missing_files() {
        let scratch = tempfile::tempdir().expect("tempdir should be created");
        fs::write(scratch.path().join("page_5-5_1.png"), b"\x89PNG").expect("write image");

        let patterns = XmlPatterns::new().expect("patterns should compile");
        let images = patterns.scan_images(PAGE_XML, scratch.path());
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].content_type, "image/png");
        assert_eq!(images[0].bbox.top, 600.0);

        let empty = tempfile::tempdir().expect("tempdir should be created");
        assert!(patterns.scan_images(PAGE_XML, empty.path()).is_empty());
    }

    #[test]
    fn parse_page_count_reads_pdfinfo_output() {
        let output = "Title:          Sample\nPages:          42\nEncrypted:      no\n";
        assert_eq!(parse_page_count(output), Some(42));
        assert_eq!(parse_page_count("Title: none"), None);
    }

    #[test]
    fn split_form_feed_pages_drops_trailing_blank_pages() {
        let pages = split_form_feed_pages("one\u{000C}two\u{000C}\n\u{000C}");
        assert_eq!(pages, vec!["one".to_string(), "two".to_string()]);
    }
}
