use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub toc_keywords: Vec<String>,
    pub toc_max_search_pages: usize,
    pub non_heading_prefixes: Vec<String>,
    #[serde(alias = "heading_prefixes_as_section")]
    pub section_prefixes: Vec<String>,
    pub matching: MatchingConfig,
    pub options: OutputOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub fuzzy_threshold: f64,
    pub suggestion_threshold: f64,
    #[serde(alias = "page_search_window")]
    pub page_window: usize,
    pub max_suggestions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub generate_report: bool,
    pub extract_images: bool,
    pub extract_tables: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            toc_keywords: strings(&["Table of Contents", "Contents", "목차"]),
            toc_max_search_pages: 10,
            non_heading_prefixes: strings(&["Figure", "Table", "그림", "표", "List of"]),
            section_prefixes: strings(&["Appendix", "부록"]),
            matching: MatchingConfig::default(),
            options: OutputOptions::default(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.80,
            suggestion_threshold: 0.50,
            page_window: 2,
            max_suggestions: 3,
        }
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            generate_report: true,
            extract_images: true,
            extract_tables: true,
        }
    }
}

impl ConverterConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_json_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Accepts either a bare config object or one nested under a `pdf` key.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        let mut value: Value = serde_json::from_slice(raw).context("invalid json")?;
        if let Some(nested) = value
            .get_mut("pdf")
            .filter(|nested| nested.is_object())
            .map(Value::take)
        {
            value = nested;
        }
        serde_json::from_value(value).context("invalid converter configuration")
    }

    pub fn validate(&self) -> Result<()> {
        let matching = &self.matching;
        for (name, value) in [
            ("fuzzy_threshold", matching.fuzzy_threshold),
            ("suggestion_threshold", matching.suggestion_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be within [0, 1], got {value}");
            }
        }
        if matching.suggestion_threshold > matching.fuzzy_threshold {
            bail!(
                "suggestion_threshold ({}) must not exceed fuzzy_threshold ({})",
                matching.suggestion_threshold,
                matching.fuzzy_threshold
            );
        }
        if self.toc_keywords.iter().all(|keyword| keyword.trim().is_empty()) {
            bail!("toc_keywords must contain at least one non-empty keyword");
        }
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
