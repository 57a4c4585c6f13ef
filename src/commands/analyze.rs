use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::AnalyzeArgs;
use crate::config::ConverterConfig;
use crate::document::PopplerDocument;
use crate::engine::Engine;
use crate::model::AnalysisReport;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let config = ConverterConfig::load(args.config.as_deref())?;
    let engine = Engine::new(config)?;

    let document = PopplerDocument::open(&args.input, true)?;
    let filename = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let report = engine.analyze(&document, &filename);
    info!(
        path = %args.input.display(),
        pages = report.pages,
        toc_found = report.toc_found,
        toc_entries = report.toc_entries,
        headings = report.headings.total(),
        "analysis completed"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize analysis json output")?;
        writeln!(output)?;
    } else {
        write_text_report(&mut output, &report)?;
    }
    output.flush()?;
    Ok(())
}

fn write_text_report(output: &mut impl Write, report: &AnalysisReport) -> Result<()> {
    writeln!(output, "File: {}", report.filename)?;
    writeln!(output, "Pages: {}", report.pages)?;
    match report.toc_pages {
        Some([start, end]) => writeln!(
            output,
            "TOC: pages {start}-{end}, {} entries ({} sections, {} appendices)",
            report.toc_entries, report.section_entries, report.appendix_entries
        )?,
        None => writeln!(output, "TOC: not found")?,
    }

    let headings = &report.headings;
    writeln!(
        output,
        "Headings: h1={} h2={} h3={} h4={} h5={} h6={}",
        headings.h1, headings.h2, headings.h3, headings.h4, headings.h5, headings.h6
    )?;
    writeln!(output, "Images: {} | Tables: {}", report.images, report.tables)?;

    for warning in &report.warnings {
        writeln!(output, "Warning: {warning}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HeadingCounts;

    #[test]
    fn text_report_lists_structure() {
        let report = AnalysisReport {
            filename: "manual.pdf".to_string(),
            pages: 42,
            toc_found: true,
            toc_pages: Some([2, 3]),
            toc_entries: 30,
            section_entries: 27,
            appendix_entries: 2,
            headings: HeadingCounts {
                h1: 5,
                h2: 22,
                ..HeadingCounts::default()
            },
            images: 4,
            tables: 7,
            warnings: vec!["page 9: images extraction failed: boom".to_string()],
        };

        let mut buffer = Vec::new();
        write_text_report(&mut buffer, &report).expect("write report");
        let text = String::from_utf8(buffer).expect("utf-8");

        assert_eq!(
            text,
            "File: manual.pdf\n\
             Pages: 42\n\
             TOC: pages 2-3, 30 entries (27 sections, 2 appendices)\n\
             Headings: h1=5 h2=22 h3=0 h4=0 h5=0 h6=0\n\
             Images: 4 | Tables: 7\n\
             Warning: page 9: images extraction failed: boom\n"
        );
    }

    #[test]
    fn missing_toc_is_reported() {
        let report = AnalysisReport {
            filename: "scan.pdf".to_string(),
            pages: 1,
            toc_found: false,
            toc_pages: None,
            toc_entries: 0,
            section_entries: 0,
            appendix_entries: 0,
            headings: HeadingCounts::default(),
            images: 0,
            tables: 0,
            warnings: Vec::new(),
        };

        let mut buffer = Vec::new();
        write_text_report(&mut buffer, &report).expect("write report");
        let text = String::from_utf8(buffer).expect("utf-8");
        assert!(text.contains("TOC: not found\n"));
    }
}
