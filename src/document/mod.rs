mod poppler;
mod tables;

pub use poppler::PopplerDocument;

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    pub fn from_origin(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.top < other.bottom && other.top < self.bottom
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.x0.min(other.x0),
            self.top.min(other.top),
            self.x1.max(other.x1),
            self.bottom.max(other.bottom),
        )
    }

    pub fn overlaps_horizontally(&self, other: &BoundingBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }
}

/// One run of text as positioned by the extraction backend. Spans sharing a
/// `block` id belong to the same layout block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BoundingBox,
    pub bold: bool,
    pub italic: bool,
    pub block: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRegion {
    pub bbox: BoundingBox,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRegion {
    pub id: String,
    pub bbox: BoundingBox,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Page-addressed access to a paginated document. Page indices are 0-based in
/// extraction order.
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    fn page_text(&self, page: usize) -> Result<String>;

    fn text_spans(&self, page: usize) -> Result<Vec<TextSpan>>;

    fn tables(&self, page: usize) -> Result<Vec<TableRegion>>;

    fn images(&self, page: usize) -> Result<Vec<ImageRegion>>;
}

pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "ppm" | "pnm" => "image/x-portable-anymap",
        "pbm" => "image/x-portable-bitmap",
        "jp2" => "image/jp2",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/x-portable-anymap" => "ppm",
        "image/x-portable-bitmap" => "pbm",
        "image/jp2" => "jp2",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersects_requires_positive_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let touching = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        let overlapping = BoundingBox::new(9.0, 9.0, 20.0, 20.0);
        assert!(!a.intersects(&touching));
        assert!(a.intersects(&overlapping));
    }

    #[test]
    fn content_type_round_trips_common_extensions() {
        assert_eq!(content_type_for_extension("JPG"), "image/jpeg");
        assert_eq!(extension_for_content_type("image/jpeg"), "jpg");
        assert_eq!(extension_for_content_type("application/pdf"), "bin");
    }
}
