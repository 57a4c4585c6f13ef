use serde::{Deserialize, Serialize};

use crate::engine::toc_parse::MAX_HEADING_LEVEL;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCounts {
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
    pub h4: usize,
    pub h5: usize,
    pub h6: usize,
}

impl HeadingCounts {
    pub fn record(&mut self, level: u8) {
        let slot = match level.clamp(1, MAX_HEADING_LEVEL) {
            1 => &mut self.h1,
            2 => &mut self.h2,
            3 => &mut self.h3,
            4 => &mut self.h4,
            5 => &mut self.h5,
            _ => &mut self.h6,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.h1 + self.h2 + self.h3 + self.h4 + self.h5 + self.h6
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub paragraphs: usize,
    pub headings: HeadingCounts,
    pub tables: usize,
    pub images: usize,
    pub toc_entries: usize,
    pub matched: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Converted,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub input_path: String,
    pub output_path: Option<String>,
    pub report_path: Option<String>,
    pub status: DocumentStatus,
    pub success: bool,
    pub error_message: Option<String>,
    pub warnings: Vec<String>,
    pub stats: ConversionStats,
}

impl ConversionResult {
    pub fn failed(input_path: String, error_message: String) -> Self {
        Self {
            input_path,
            output_path: None,
            report_path: None,
            status: DocumentStatus::Failed,
            success: false,
            error_message: Some(error_message),
            warnings: Vec::new(),
            stats: ConversionStats::default(),
        }
    }

    pub fn cancelled(input_path: String) -> Self {
        Self {
            status: DocumentStatus::Cancelled,
            error_message: Some("cancelled before start".to_string()),
            ..Self::failed(input_path, String::new())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub output_directory: String,
    pub document_count: usize,
    pub converted: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub documents: Vec<ConversionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub filename: String,
    pub pages: usize,
    pub toc_found: bool,
    pub toc_pages: Option<[usize; 2]>,
    pub toc_entries: usize,
    pub section_entries: usize,
    pub appendix_entries: usize,
    pub headings: HeadingCounts,
    pub images: usize,
    pub tables: usize,
    pub warnings: Vec<String>,
}
