//! Churn Risk Scorer - Main Entry Point
//!
//! Reads newline-delimited JSON customer records, scores them in parallel
//! batches against the trained pipeline, writes one prediction per line to
//! stdout and finishes with the portfolio analytics summary.

use anyhow::{Context, Result};
use churn_risk_scorer::{
    config::AppConfig,
    logging::init_tracing,
    metrics::{MetricsReporter, ScoringMetrics},
    models::RiskAggregator,
    types::{AnalyticsReport, CustomerInput, PredictionReport, RawRecord, ScoredCustomer},
    ScoringPipeline, SharedPipeline, TrainedPipeline,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// One output line per input line, in input order
#[derive(Serialize)]
struct PredictionLine {
    line: usize,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Outcome {
    Scored(PredictionReport),
    Failed { error: String },
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    summary: &'a AnalyticsReport,
    model_version: &'a str,
    fingerprint: &'a str,
}

type PendingLine = (usize, Result<RawRecord, String>);

/// Scored-record count between milestone log lines
const MILESTONE_STEP: usize = 10_000;

/// True once `count` reaches `next`; moves `next` past `count`
fn reached_milestone(count: usize, next: &mut usize) -> bool {
    if count < *next {
        return false;
    }
    *next = (count / MILESTONE_STEP + 1) * MILESTONE_STEP;
    true
}

/// Parse and validate one JSON line at the boundary
fn parse_line(line: &str) -> Result<RawRecord, String> {
    let input: CustomerInput = serde_json::from_str(line).map_err(|e| e.to_string())?;
    input.validate().map_err(|e| e.to_string())?;
    Ok(input.into_raw())
}

/// Score the parseable records of a batch on the rayon pool
async fn score_batch(
    pipeline: Arc<ScoringPipeline>,
    batch: Vec<PendingLine>,
) -> Result<Vec<(usize, Result<ScoredCustomer, String>)>> {
    tokio::task::spawn_blocking(move || {
        let mut line_numbers = Vec::with_capacity(batch.len());
        let mut records = Vec::with_capacity(batch.len());
        let mut rejected = Vec::new();
        for (line, parsed) in batch {
            match parsed {
                Ok(raw) => {
                    line_numbers.push(line);
                    records.push(raw);
                }
                Err(e) => rejected.push((line, Err(e))),
            }
        }

        let mut outcomes: Vec<_> = line_numbers
            .into_iter()
            .zip(pipeline.score_each(&records))
            .map(|(line, result)| (line, result.map_err(|e| e.to_string())))
            .chain(rejected)
            .collect();
        outcomes.sort_by_key(|(line, _)| *line);
        outcomes
    })
    .await
    .context("Scoring task panicked")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging, "churn_scorer")?;

    info!("Starting Churn Risk Scorer");

    if config.pipeline.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.pipeline.workers)
            .build_global()
            .context("Failed to configure scoring thread pool")?;
    }
    info!(
        workers = rayon::current_num_threads(),
        batch_size = config.pipeline.batch_size,
        "Scoring pool ready"
    );

    // Load the encoder/classifier bundle once; it is read-only from here on
    let trained = TrainedPipeline::load(&config.artifact.path)
        .with_context(|| format!("Failed to load artifact from {}", config.artifact.path))?;
    let shared = SharedPipeline::new(trained);
    let identity = shared.snapshot().identity().clone();
    info!(
        model_version = %identity.model_version,
        run_id = %identity.run_id,
        trained_at = %identity.trained_at,
        fingerprint = %identity.fingerprint,
        "Trained pipeline loaded"
    );

    // Start metrics reporter
    let metrics = Arc::new(ScoringMetrics::new());
    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    let reporter_handle = tokio::spawn(reporter.start());

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &config.input.path {
        Some(path) => {
            info!(path = %path, "Reading customers from file");
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path))?;
            Box::new(BufReader::new(file))
        }
        None => {
            info!("Reading customers from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    let batch_size = config.pipeline.batch_size.max(1);
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();
    let mut aggregator = RiskAggregator::new();
    let mut batch: Vec<PendingLine> = Vec::with_capacity(batch_size);
    let mut line_no = 0;
    let mut next_milestone = MILESTONE_STEP;
    let mut input_done = false;

    while !input_done {
        match lines.next_line().await.context("Failed to read input")? {
            Some(line) => {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                batch.push((line_no, parse_line(&line)));
                if batch.len() < batch_size {
                    continue;
                }
            }
            None => input_done = true,
        }

        if batch.is_empty() {
            continue;
        }

        // Each batch scores against one snapshot of the shared bundle
        let pipeline = Arc::new(ScoringPipeline::from_shared(&shared));
        let started = Instant::now();
        let outcomes = score_batch(pipeline, std::mem::take(&mut batch)).await?;
        metrics.record_batch(started.elapsed());

        let mut out = Vec::new();
        for (line, outcome) in outcomes {
            let outcome = match outcome {
                Ok(scored) => {
                    metrics.record_score(&scored);
                    aggregator.record(&scored);
                    Outcome::Scored(scored.report())
                }
                Err(error) => {
                    metrics.record_failure();
                    warn!(line = line, error = %error, "Customer record rejected");
                    Outcome::Failed { error }
                }
            };
            serde_json::to_writer(&mut out, &PredictionLine { line, outcome })?;
            out.push(b'\n');
        }
        stdout.write_all(&out).await?;

        debug!(
            processed = aggregator.count(),
            elapsed_us = started.elapsed().as_micros(),
            "Batch scored"
        );
        if reached_milestone(aggregator.count(), &mut next_milestone) {
            info!(
                processed = aggregator.count(),
                throughput = format!("{:.1} rec/s", metrics.get_throughput()),
                "Scoring milestone"
            );
        }
    }

    reporter_handle.abort();
    info!("Input exhausted, summarizing");
    metrics.print_summary();

    let summary = aggregator
        .finish()
        .context("No customer records could be scored")?;
    let report = summary.report();
    info!(
        total_customers = report.total_customers,
        high_risk = report.high_risk,
        medium_risk = report.medium_risk,
        low_risk = report.low_risk,
        average_churn_probability = report.average_churn_probability,
        critical_percentage = report.critical_percentage,
        "Portfolio analytics"
    );

    let mut out = serde_json::to_vec(&SummaryLine {
        summary: &report,
        model_version: &identity.model_version,
        fingerprint: &identity.fingerprint,
    })?;
    out.push(b'\n');
    stdout.write_all(&out).await?;
    stdout.flush().await?;

    Ok(())
}
