//! Tracing subscriber setup shared by the binaries

use crate::config::LoggingConfig;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `logging.level` applies to this crate
/// and `target` (the binary's own module path).
pub fn init_tracing(logging: &LoggingConfig, target: &str) -> Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(logging, target, env.as_deref())?;

    // Logs go to stderr, stdout carries scoring output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.pretty().init(),
    }
    Ok(())
}

fn build_filter(logging: &LoggingConfig, target: &str, env: Option<&str>) -> Result<EnvFilter> {
    match env.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::try_new(format!(
            "churn_risk_scorer={level},{target}={level}",
            level = logging.level
        ))?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: "pretty".to_string(),
        }
    }

    #[test]
    fn test_config_level_applies_without_env() {
        let filter = build_filter(&logging("warn"), "churn_scorer", None).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("churn_risk_scorer=warn"));
        assert!(rendered.contains("churn_scorer=warn"));
    }

    #[test]
    fn test_env_directives_take_precedence() {
        let filter = build_filter(
            &logging("info"),
            "churn_scorer",
            Some("churn_risk_scorer=debug"),
        )
        .unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("churn_risk_scorer=debug"));
        assert!(!rendered.contains("info"));
    }

    #[test]
    fn test_blank_env_falls_back_to_config() {
        let filter = build_filter(&logging("error"), "fit_pipeline", Some("  ")).unwrap();
        assert!(filter.to_string().contains("fit_pipeline=error"));
    }

    #[test]
    fn test_invalid_level_is_an_error() {
        assert!(build_filter(&logging("loud"), "churn_scorer", None).is_err());
    }
}
