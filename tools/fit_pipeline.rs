//! Pipeline Fitting Tool
//!
//! Fits the feature encoder and logistic classifier on a labelled dataset and
//! writes the trained pipeline artifact consumed by `churn-scorer`.
//!
//! Usage:
//!   fit-pipeline <labelled.jsonl> [output]
//!   fit-pipeline --synthetic <count> [seed] [output]
//!   fit-pipeline --dump <count> [seed]
//!
//! Labelled JSONL rows carry the customer fields plus `Churn_Value` (0 or 1).
//! `--dump` writes unlabelled synthetic customers to stdout for scoring demos.

use anyhow::{bail, Context, Result};
use churn_risk_scorer::{
    config::AppConfig,
    logging::init_tracing,
    models::training::fit_pipeline,
    synthetic::{self, LabelledCustomer},
    CustomerInput, RawRecord,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{info, warn};

/// One labelled dataset row
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LabelledRow {
    #[serde(flatten)]
    customer: CustomerInput,
    #[serde(rename = "Churn_Value", alias = "Churn Value")]
    churn_value: u8,
}

enum Source {
    Dataset(String),
    Synthetic { count: usize, seed: u64 },
}

fn parse_dataset(contents: &str) -> Result<(Vec<RawRecord>, Vec<u8>)> {
    let mut records = Vec::new();
    let mut labels = Vec::new();
    let mut skipped = 0usize;

    for (i, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: LabelledRow = serde_json::from_str(line)
            .with_context(|| format!("Invalid labelled row on line {}", i + 1))?;
        if let Err(e) = row.customer.validate() {
            warn!(line = i + 1, error = %e, "Skipping invalid customer");
            skipped += 1;
            continue;
        }
        labels.push(row.churn_value);
        records.push(row.customer.into_raw());
    }

    if skipped > 0 {
        warn!(skipped = skipped, "Rows skipped during load");
    }
    Ok((records, labels))
}

fn split_synthetic(dataset: Vec<LabelledCustomer>) -> (Vec<RawRecord>, Vec<u8>) {
    dataset
        .into_iter()
        .map(|c| (c.customer.into_raw(), c.churned))
        .unzip()
}

fn dump_synthetic(count: usize, seed: u64) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for labelled in synthetic::generate(count, seed) {
        serde_json::to_writer(&mut out, &labelled.customer)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    info!(count = count, seed = seed, "Synthetic customers written");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging, "fit_pipeline")?;

    info!("Starting Pipeline Fitting Tool");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let (source, output) = match args.get(1).map(|s| s.as_str()) {
        Some("--dump") => {
            let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
            let seed: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(42);
            return dump_synthetic(count, seed);
        }
        Some("--synthetic") => {
            let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5000);
            let seed: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(42);
            (Source::Synthetic { count, seed }, args.get(4))
        }
        Some(path) => (Source::Dataset(path.to_string()), args.get(2)),
        None => bail!("usage: fit-pipeline <labelled.jsonl | --synthetic N [seed] | --dump N [seed]> [output]"),
    };
    let output = output.cloned().unwrap_or_else(|| config.artifact.path.clone());

    let (records, labels) = match source {
        Source::Dataset(path) => {
            info!(path = %path, "Loading labelled dataset");
            let contents = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read dataset {}", path))?;
            parse_dataset(&contents)?
        }
        Source::Synthetic { count, seed } => {
            info!(count = count, seed = seed, "Generating synthetic dataset");
            split_synthetic(synthetic::generate(count, seed))
        }
    };

    let churned = labels.iter().filter(|&&l| l == 1).count();
    info!(
        records = records.len(),
        churned = churned,
        retained = labels.len() - churned,
        "Dataset ready"
    );

    let params = config.training.params();
    let model_version = config.training.model_version.clone();
    info!(
        model_version = %model_version,
        learning_rate = params.learning_rate,
        max_iter = params.max_iter,
        l2 = params.l2,
        balance_classes = params.balance_classes,
        "Fitting pipeline"
    );

    let trained = tokio::task::spawn_blocking(move || {
        fit_pipeline(&records, &labels, &params, &model_version)
    })
    .await
    .context("Fitting task panicked")??;

    trained.save(&output)?;
    let identity = trained.identity();
    info!(
        path = %output,
        model_version = %identity.model_version,
        run_id = %identity.run_id,
        fingerprint = %identity.fingerprint,
        "Completed! Trained pipeline written"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dataset_accepts_both_label_spellings() {
        let customers = synthetic::generate(2, 7);
        let mut contents = String::new();
        for (i, c) in customers.iter().enumerate() {
            let mut value = serde_json::to_value(&c.customer).unwrap();
            let key = if i == 0 { "Churn_Value" } else { "Churn Value" };
            value[key] = serde_json::json!(c.churned);
            contents.push_str(&value.to_string());
            contents.push('\n');
        }
        contents.push('\n');

        let (records, labels) = parse_dataset(&contents).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(labels, vec![customers[0].churned, customers[1].churned]);
    }

    #[test]
    fn test_parse_dataset_skips_invalid_customers() {
        let mut customer = synthetic::generate(1, 3).remove(0).customer;
        customer.tenure_months = -4;
        let mut value = serde_json::to_value(&customer).unwrap();
        value["Churn_Value"] = serde_json::json!(1);

        let (records, labels) = parse_dataset(&value.to_string()).unwrap();
        assert!(records.is_empty());
        assert!(labels.is_empty());
    }

    #[test]
    fn test_parse_dataset_rejects_missing_label() {
        let customer = synthetic::generate(1, 3).remove(0).customer;
        let line = serde_json::to_string(&customer).unwrap();
        assert!(parse_dataset(&line).is_err());
    }
}
