//! Command-line surface and configuration loading.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use repurpose_common::PipelineConfig;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file picked up from the working directory when nothing else is named.
pub const DEFAULT_CONFIG_FILE: &str = "repurpose.toml";

#[derive(Parser, Debug)]
#[command(name = "repurpose")]
#[command(about = "Rank approved drugs as repurposing candidates for a disease")]
#[command(version)]
pub struct Cli {
    /// Disease name (e.g. "Parkinson's disease") or ontology id (e.g. MONDO_0005180)
    pub disease: String,

    /// Number of ranked candidates to show
    #[arg(short = 'n', long = "top")]
    pub top: Option<NonZeroUsize>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Skip the gate chain and return guardrail-adjusted scores
    #[arg(long)]
    pub no_gates: bool,

    /// Request explanation output (not available; accepted and logged)
    #[arg(short, long)]
    pub explain: bool,

    /// Configuration file (TOML, YAML or JSON); overrides REPURPOSE_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[value(name = "table")]
    Table,
    #[value(name = "json")]
    Json,
    #[value(name = "csv")]
    Csv,
}

impl Cli {
    /// `--config`, else `REPURPOSE_CONFIG`, else `repurpose.toml` if present,
    /// else built-in defaults.
    pub fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        let explicit = self
            .config
            .clone()
            .or_else(|| std::env::var_os("REPURPOSE_CONFIG").map(PathBuf::from));

        let path = match explicit {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
            None => {
                info!("No configuration file; using defaults");
                return Ok(PipelineConfig::default());
            }
        };

        let config = PipelineConfig::from_path(&path)
            .with_context(|| format!("Could not load configuration from {}", path.display()))?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn top_k(&self, config: &PipelineConfig) -> usize {
        self.top.map(NonZeroUsize::get).unwrap_or(config.output.top_k)
    }

    /// Flag wins over the configured format; an unrecognised configured
    /// format falls back to the table.
    pub fn output_format(&self, config: &PipelineConfig) -> OutputFormat {
        if let Some(format) = self.format {
            return format;
        }
        OutputFormat::from_str(&config.output.format, true).unwrap_or_else(|_| {
            warn!(format = %config.output.format, "Unknown output format; using table");
            OutputFormat::Table
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_reference_invocation() {
        let cli = Cli::try_parse_from([
            "repurpose", "Parkinson's disease", "-n", "5", "-f", "json", "--no-gates", "-e",
        ])
        .unwrap();
        assert_eq!(cli.disease, "Parkinson's disease");
        assert_eq!(cli.top.map(NonZeroUsize::get), Some(5));
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(cli.no_gates);
        assert!(cli.explain);
    }

    #[test]
    fn test_rejects_zero_and_unknown_format() {
        assert!(Cli::try_parse_from(["repurpose", "asthma", "--top", "0"]).is_err());
        assert!(Cli::try_parse_from(["repurpose", "asthma", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = PipelineConfig::default();
        config.output.top_k = 25;
        config.output.format = "CSV".to_string();

        let cli = Cli::try_parse_from(["repurpose", "asthma"]).unwrap();
        assert_eq!(cli.top_k(&config), 25);
        assert_eq!(cli.output_format(&config), OutputFormat::Csv);

        let cli = Cli::try_parse_from(["repurpose", "asthma", "--top", "3", "-f", "table"]).unwrap();
        assert_eq!(cli.top_k(&config), 3);
        assert_eq!(cli.output_format(&config), OutputFormat::Table);
    }
}
