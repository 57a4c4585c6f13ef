use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::cli::ConvertArgs;
use crate::config::ConverterConfig;
use crate::document::PopplerDocument;
use crate::engine::Engine;
use crate::engine::images::ImageStore;
use crate::model::{BatchManifest, ConversionResult, DocumentStatus};
use crate::util::{now_utc_string, write_atomic, write_json_pretty};

const MANIFEST_FILE_NAME: &str = "conversion_manifest.json";

#[derive(Debug, Clone, PartialEq, Eq)]
struct DocumentJob {
    input: PathBuf,
    html_path: PathBuf,
    report_path: PathBuf,
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let config = build_config(&args)?;
    let engine = Engine::new(config)?;

    let inputs = collect_inputs(&args.inputs)?;
    let jobs = plan_jobs(&inputs, args.output_dir.as_deref())?;
    info!(documents = jobs.len(), workers = args.jobs.max(1), "starting conversion");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.max(1))
        .build()
        .context("failed to build worker pool")?;
    let stop = AtomicBool::new(false);
    let results = pool.install(|| {
        jobs.par_iter()
            .map(|job| run_job(&engine, job, args.fail_fast, &stop))
            .collect::<Vec<ConversionResult>>()
    });

    let manifest = build_manifest(&args, &jobs, results);
    if let Some(manifest_path) = manifest_path(&args, &jobs) {
        write_json_pretty(&manifest_path, &manifest)?;
        info!(path = %manifest_path.display(), "wrote batch manifest");
    }

    info!(
        converted = manifest.converted,
        failed = manifest.failed,
        cancelled = manifest.cancelled,
        "conversion completed"
    );

    if manifest.failed > 0 {
        bail!(
            "{} of {} documents failed to convert",
            manifest.failed,
            manifest.document_count
        );
    }
    Ok(())
}

fn build_config(args: &ConvertArgs) -> Result<ConverterConfig> {
    let mut config = ConverterConfig::load(args.config.as_deref())?;

    if let Some(threshold) = args.fuzzy_threshold {
        config.matching.fuzzy_threshold = threshold;
        config.matching.suggestion_threshold = config.matching.suggestion_threshold.min(threshold);
    }
    if let Some(window) = args.page_window {
        config.matching.page_window = window;
    }
    if args.no_report {
        config.options.generate_report = false;
    }
    if args.no_images {
        config.options.extract_images = false;
    }
    if args.no_tables {
        config.options.extract_tables = false;
    }

    config.validate().context("invalid converter configuration")?;
    Ok(config)
}

fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut collected = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found = discover_pdfs(input)?;
            if found.is_empty() {
                warn!(path = %input.display(), "directory contains no PDFs");
            }
            found.sort();
            collected.extend(found);
        } else {
            collected.push(input.clone());
        }
    }

    if collected.is_empty() {
        bail!("no PDF inputs found");
    }
    Ok(collected)
}

fn discover_pdfs(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();

    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read {}", directory.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            pdfs.push(path);
        }
    }

    Ok(pdfs)
}

fn plan_jobs(inputs: &[PathBuf], output_dir: Option<&Path>) -> Result<Vec<DocumentJob>> {
    let mut claimed_outputs: BTreeMap<PathBuf, &Path> = BTreeMap::new();
    let mut jobs = Vec::with_capacity(inputs.len());

    for input in inputs {
        let stem = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("invalid UTF-8 filename: {}", input.display()))?;
        let directory = match output_dir {
            Some(directory) => directory.to_path_buf(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let html_path = directory.join(format!("{stem}.html"));

        if let Some(previous) = claimed_outputs.insert(html_path.clone(), input.as_path()) {
            bail!(
                "{} and {} would both be written to {}",
                previous.display(),
                input.display(),
                html_path.display()
            );
        }

        jobs.push(DocumentJob {
            input: input.clone(),
            report_path: directory.join(format!("{stem}_report.txt")),
            html_path,
        });
    }

    Ok(jobs)
}

fn run_job(engine: &Engine, job: &DocumentJob, fail_fast: bool, stop: &AtomicBool) -> ConversionResult {
    let input_path = job.input.display().to_string();
    if stop.load(Ordering::SeqCst) {
        warn!(path = %input_path, "skipping document after earlier failure");
        return ConversionResult::cancelled(input_path);
    }

    match convert_document(engine, job) {
        Ok(result) => result,
        Err(err) => {
            let message = format!("{err:#}");
            error!(path = %input_path, error = %message, "conversion failed");
            if fail_fast {
                stop.store(true, Ordering::SeqCst);
            }
            ConversionResult::failed(input_path, message)
        }
    }
}

fn convert_document(engine: &Engine, job: &DocumentJob) -> Result<ConversionResult> {
    let options = engine.config().options;
    let document = PopplerDocument::open(&job.input, options.extract_images)?;
    let mut image_store = ImageStore::for_html(&job.html_path);

    let converted = engine.convert(&document, Some(&mut image_store));
    if image_store.unique_count() > 0 {
        debug!(
            dir = %image_store.image_dir().display(),
            images = image_store.unique_count(),
            "saved images"
        );
    }

    write_atomic(&job.html_path, converted.html().as_bytes())?;
    info!(path = %job.html_path.display(), "wrote html");

    let filename = job
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let report = if options.generate_report {
        converted.report(&filename)
    } else {
        None
    };
    let report_path = match report {
        Some(report) => {
            write_atomic(&job.report_path, report.as_bytes())?;
            info!(path = %job.report_path.display(), "wrote match report");
            Some(job.report_path.display().to_string())
        }
        None => None,
    };

    let stats = converted.stats();
    info!(
        path = %job.input.display(),
        toc_entries = stats.toc_entries,
        matched = stats.matched,
        failed = stats.failed,
        paragraphs = stats.paragraphs,
        warnings = converted.warnings.len(),
        "converted document"
    );

    Ok(ConversionResult {
        input_path: job.input.display().to_string(),
        output_path: Some(job.html_path.display().to_string()),
        report_path,
        status: DocumentStatus::Converted,
        success: true,
        error_message: None,
        warnings: converted.warnings.into_vec(),
        stats,
    })
}

fn manifest_path(args: &ConvertArgs, jobs: &[DocumentJob]) -> Option<PathBuf> {
    if let Some(path) = &args.manifest_path {
        return Some(path.clone());
    }
    if jobs.len() < 2 {
        return None;
    }
    let directory = match &args.output_dir {
        Some(directory) => directory.clone(),
        None => jobs[0]
            .html_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    Some(directory.join(MANIFEST_FILE_NAME))
}

fn build_manifest(
    args: &ConvertArgs,
    jobs: &[DocumentJob],
    documents: Vec<ConversionResult>,
) -> BatchManifest {
    let count = |status: DocumentStatus| {
        documents
            .iter()
            .filter(|document| document.status == status)
            .count()
    };
    let output_directory = args
        .output_dir
        .as_ref()
        .map(|directory| directory.display().to_string())
        .unwrap_or_else(|| "<input directory>".to_string());

    BatchManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        output_directory,
        document_count: jobs.len(),
        converted: count(DocumentStatus::Converted),
        failed: count(DocumentStatus::Failed),
        cancelled: count(DocumentStatus::Cancelled),
        documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(inputs: Vec<PathBuf>) -> ConvertArgs {
        ConvertArgs {
            inputs,
            output_dir: None,
            config: None,
            jobs: 1,
            fail_fast: false,
            no_report: false,
            no_images: false,
            no_tables: false,
            fuzzy_threshold: None,
            page_window: None,
            manifest_path: None,
        }
    }

    #[test]
    fn directories_expand_to_sorted_top_level_pdfs() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").expect("write input");
        }
        fs::create_dir(dir.path().join("nested.pdf")).expect("create dir");

        let inputs = collect_inputs(&[dir.path().to_path_buf()]).expect("inputs");
        let names = inputs
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect::<Vec<String>>();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn empty_input_set_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(collect_inputs(&[dir.path().to_path_buf()]).is_err());
    }

    #[test]
    fn jobs_write_next_to_input_or_into_output_dir() {
        let inputs = vec![PathBuf::from("docs/manual.pdf")];

        let jobs = plan_jobs(&inputs, None).expect("plan");
        assert_eq!(jobs[0].html_path, PathBuf::from("docs/manual.html"));
        assert_eq!(jobs[0].report_path, PathBuf::from("docs/manual_report.txt"));

        let jobs = plan_jobs(&inputs, Some(Path::new("out"))).expect("plan");
        assert_eq!(jobs[0].html_path, PathBuf::from("out/manual.html"));
    }

    #[test]
    fn colliding_outputs_are_rejected() {
        let inputs = vec![PathBuf::from("a/manual.pdf"), PathBuf::from("b/manual.pdf")];
        assert!(plan_jobs(&inputs, None).is_ok());
        assert!(plan_jobs(&inputs, Some(Path::new("out"))).is_err());
    }

    #[test]
    fn cli_overrides_are_merged_and_validated() {
        let mut args = args(vec![PathBuf::from("a.pdf")]);
        args.fuzzy_threshold = Some(0.4);
        args.page_window = Some(5);
        args.no_images = true;

        let config = build_config(&args).expect("config");
        assert_eq!(config.matching.fuzzy_threshold, 0.4);
        assert_eq!(config.matching.suggestion_threshold, 0.4);
        assert_eq!(config.matching.page_window, 5);
        assert!(!config.options.extract_images);
        assert!(config.options.extract_tables);

        args.fuzzy_threshold = Some(1.5);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn failed_document_stops_the_batch_under_fail_fast() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inputs = vec![dir.path().join("missing.pdf"), dir.path().join("other.pdf")];
        let jobs = plan_jobs(&inputs, None).expect("plan");
        let engine = Engine::new(ConverterConfig::default()).expect("engine");
        let stop = AtomicBool::new(false);

        let first = run_job(&engine, &jobs[0], true, &stop);
        assert_eq!(first.status, DocumentStatus::Failed);
        assert!(first.error_message.is_some());
        assert!(stop.load(Ordering::SeqCst));

        let second = run_job(&engine, &jobs[1], true, &stop);
        assert_eq!(second.status, DocumentStatus::Cancelled);
        assert!(!dir.path().join("other.html").exists());
    }

    #[test]
    fn manifest_is_written_for_batches_or_on_request() {
        let single = plan_jobs(&[PathBuf::from("a.pdf")], None).expect("plan");
        let batch =
            plan_jobs(&[PathBuf::from("x/a.pdf"), PathBuf::from("x/b.pdf")], None).expect("plan");

        let mut args = args(Vec::new());
        assert_eq!(manifest_path(&args, &single), None);
        assert_eq!(
            manifest_path(&args, &batch),
            Some(PathBuf::from("x").join(MANIFEST_FILE_NAME))
        );

        args.manifest_path = Some(PathBuf::from("m.json"));
        assert_eq!(manifest_path(&args, &single), Some(PathBuf::from("m.json")));

        let results = vec![
            ConversionResult::failed("x/a.pdf".to_string(), "boom".to_string()),
            ConversionResult::cancelled("x/b.pdf".to_string()),
        ];
        let manifest = build_manifest(&args, &batch, results);
        assert_eq!(
            (manifest.converted, manifest.failed, manifest.cancelled),
            (0, 1, 1)
        );
    }
}
