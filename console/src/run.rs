use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    bail,
    Context,
};
use clap::{
    Args,
    ValueEnum,
};
use console::style;
use ddb_report::prelude::*;
use ddb_report::store::DEFAULT_PAGE_SIZE;
use indicatif::ProgressBar;
use log::info;
use serde::Serialize;

use crate::utils::{
    init_pbar,
    UtilsArgs,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum OutputFormat {
    /// One JSON object per classified record.
    Jsonl,
    /// Tab separated table with a header line.
    Tsv,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct RunArgs {
    #[arg(
        long,
        required = true,
        help = "CSV/TSV dump of the variant table (columns sample, chr, pos, ref, \
                alt, quality, genotype)."
    )]
    variants: PathBuf,
    #[arg(
        long,
        required = true,
        help = "CSV/TSV dump of the coverage table (columns sample, chr, pos, depth, \
                mapq)."
    )]
    coverage: PathBuf,
    #[arg(
        short,
        long = "sample",
        num_args = 1..,
        required = true,
        help = "Sample identifiers to report on."
    )]
    samples:  Vec<String>,
    #[arg(
        short,
        long,
        required = true,
        help = "Genomic region, as 'chr1:100-200' or 'chr1' for a whole chromosome."
    )]
    region:   String,
    #[arg(
        short = 'o',
        long,
        help = "Output file. Records are written to stdout when omitted."
    )]
    output:   Option<PathBuf>,
    #[arg(
        short,
        long,
        value_enum,
        default_value_t = OutputFormat::Jsonl,
        help = "Output format."
    )]
    format:   OutputFormat,
    #[arg(
        long,
        help = "Write one coverage summary line per sample to this TSV file."
    )]
    coverage_report: Option<PathBuf>,
    #[arg(
        short,
        long,
        help = "JSON configuration file. Command line values override it."
    )]
    config:   Option<PathBuf>,

    #[arg(
        long,
        help_heading = "FILTER ARGS",
        help = "Variants with coverage depth below this value are LOW_COVERAGE. \
                [default: 10]"
    )]
    min_depth:   Option<u32>,
    #[arg(
        long,
        help_heading = "FILTER ARGS",
        help = "Variants with call quality below this value are LOW_QUALITY. \
                [default: 20.0]"
    )]
    min_quality: Option<f64>,
    #[arg(
        long,
        help_heading = "FILTER ARGS",
        help = "Variants with mapping quality below this value are \
                FILTERED_ARTIFACT. [default: 30.0]"
    )]
    min_mapq:    Option<f64>,

    #[arg(
        long,
        help_heading = "STORE ARGS",
        help = "Retries of a fetch that failed because a store was unreachable. \
                [default: 3]"
    )]
    max_retries: Option<u32>,
    #[arg(
        long,
        help_heading = "STORE ARGS",
        help = "Abort a fetch after this many milliseconds."
    )]
    timeout_ms:  Option<u64>,
    #[arg(
        long,
        help_heading = "STORE ARGS",
        help = "Rows requested per page. [default: 5000]"
    )]
    page_size:   Option<usize>,
}

/// Flat view of a classified record.
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    sample_id:       &'a str,
    chromosome:      &'a str,
    position:        u64,
    ref_allele:      &'a str,
    alt_allele:      &'a str,
    genotype:        Genotype,
    quality_score:   f64,
    depth:           Option<u32>,
    mapping_quality: Option<f64>,
    category:        Category,
    reasons:         String,
}

impl<'a> From<&'a ClassifiedRecord> for OutputRow<'a> {
    fn from(record: &'a ClassifiedRecord) -> Self {
        let variant = record.joined.variant();
        let coverage = record.joined.coverage();
        Self {
            sample_id:       &variant.sample_id,
            chromosome:      &variant.chromosome,
            position:        variant.position,
            ref_allele:      &variant.ref_allele,
            alt_allele:      &variant.alt_allele,
            genotype:        variant.genotype,
            quality_score:   variant.quality_score,
            depth:           coverage.map(|c| c.depth),
            mapping_quality: coverage.map(|c| c.mapping_quality),
            category:        record.category,
            reasons:         record
                .reasons
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Coverage summary line of one sample.
#[derive(Debug, Serialize)]
struct CoverageRow<'a> {
    sample_id:       &'a str,
    chromosome:      &'a str,
    start:           u64,
    end:             u64,
    positions:       usize,
    mean_depth:      f64,
    below_min_depth: usize,
    mean_mapq:       f64,
}

impl<'a> From<&'a SampleReport> for CoverageRow<'a> {
    fn from(report: &'a SampleReport) -> Self {
        Self {
            sample_id:       &report.sample_id,
            chromosome:      report.range.chromosome(),
            start:           report.range.start(),
            end:             report.range.end(),
            positions:       report.coverage.positions,
            mean_depth:      report.coverage.mean_depth,
            below_min_depth: report.coverage.below_min_depth,
            mean_mapq:       report.coverage.mean_mapq,
        }
    }
}

impl RunArgs {
    fn report_config(&self) -> anyhow::Result<ReportConfig> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::from_path(path)?,
            None => ReportConfig::default(),
        };
        if let Some(min_depth) = self.min_depth {
            config.thresholds.min_depth = min_depth;
        }
        if let Some(min_quality) = self.min_quality {
            config.thresholds.min_quality = min_quality;
        }
        if let Some(min_mapq) = self.min_mapq {
            config.thresholds.min_mapq = min_mapq;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if self.timeout_ms.is_some() {
            config.fetch_timeout_ms = self.timeout_ms;
        }
        if let Some(page_size) = self.page_size {
            config.variant_store.page_size = page_size;
            config.coverage_store.page_size = page_size;
        }
        config.validate()?;
        Ok(config)
    }

    fn check_input(path: &Path) -> anyhow::Result<()> {
        if !path.is_file() {
            bail!(
                "Input {} does not exist or is not a file",
                style(path.display()).red()
            );
        }
        Ok(())
    }

    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        Self::check_input(&self.variants)?;
        Self::check_input(&self.coverage)?;
        let range: ChromRange = self
            .region
            .parse()
            .with_context(|| format!("Invalid region '{}'", self.region))?;
        let config = self.report_config()?;
        info!(
            "Page size: variants {}, coverage {} (default {})",
            config.variant_store.page_size,
            config.coverage_store.page_size,
            DEFAULT_PAGE_SIZE
        );

        let variant_session = MemorySession::new(config.variant_store.keyspace.clone())
            .load_path(&config.variant_store.table, &self.variants)?;
        let coverage_session =
            MemorySession::new(config.coverage_store.keyspace.clone())
                .load_path(&config.coverage_store.table, &self.coverage)?;
        let runner = ReportRunner::try_new(
            VariantClient::try_new(config.variant_store.clone(), variant_session)?,
            CoverageClient::try_new(config.coverage_store.clone(), coverage_session)?,
            config,
        )?;

        let requests = self
            .samples
            .iter()
            .map(|sample| SampleRequest::new(sample.clone(), range.clone()))
            .collect::<Vec<_>>();
        let progress_bar = if utils.progress {
            init_pbar(requests.len())?
        }
        else {
            ProgressBar::hidden()
        };
        let results =
            runner.run_many_with(&requests, &CancelToken::new(), |_| progress_bar.inc(1));
        progress_bar.finish();

        let sink: Box<dyn Write> = match &self.output {
            Some(path) => {
                Box::new(BufWriter::new(File::create(path).with_context(|| {
                    format!("Failed to create output file {}", path.display())
                })?))
            },
            None => Box::new(BufWriter::new(std::io::stdout().lock())),
        };

        let mut failed = Vec::new();
        let mut reports = Vec::new();
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(report) => reports.push(report),
                Err(err) => {
                    eprintln!(
                        "{} {}: {}",
                        style("Report failed for").red(),
                        style(&request.sample_id).bold(),
                        err
                    );
                    failed.push(request.sample_id.clone());
                },
            }
        }
        write_reports(sink, self.format, &reports)?;
        if let Some(path) = &self.coverage_report {
            let file = File::create(path).with_context(|| {
                format!("Failed to create coverage report {}", path.display())
            })?;
            write_coverage_report(BufWriter::new(file), &reports)?;
        }

        for report in reports.iter() {
            eprintln!(
                "{}: {} records, {} PASS, {} LOW_COVERAGE, {} LOW_QUALITY, {} \
                 FILTERED_ARTIFACT; {} covered positions, mean depth {:.1}",
                style(&report.sample_id).green(),
                report.summary.total,
                report.summary.count(Category::Pass),
                report.summary.count(Category::LowCoverage),
                report.summary.count(Category::LowQuality),
                report.summary.count(Category::FilteredArtifact),
                report.coverage.positions,
                report.coverage.mean_depth,
            );
        }
        if !failed.is_empty() {
            return Err(anyhow!("Reports failed for: {}", failed.join(", ")));
        }
        Ok(())
    }
}

fn write_reports<W: Write>(
    mut sink: W,
    format: OutputFormat,
    reports: &[SampleReport],
) -> anyhow::Result<()> {
    let rows = reports
        .iter()
        .flat_map(|report| report.records.iter())
        .map(OutputRow::from);
    match format {
        OutputFormat::Jsonl => {
            for row in rows {
                serde_json::to_writer(&mut sink, &row)?;
                sink.write_all(b"\n")?;
            }
            sink.flush()?;
        },
        OutputFormat::Tsv => {
            let mut writer = csv::WriterBuilder::default()
                .delimiter(b'\t')
                .has_headers(true)
                .from_writer(sink);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        },
    }
    Ok(())
}

fn write_coverage_report<W: Write>(
    sink: W,
    reports: &[SampleReport],
) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::default()
        .delimiter(b'\t')
        .has_headers(true)
        .from_writer(sink);
    for report in reports {
        writer.serialize(CoverageRow::from(report))?;
    }
    writer.flush()?;
    Ok(())
}
