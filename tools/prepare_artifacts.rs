//! Artifact Preparation Tool
//!
//! Cleans the training CSV, fits the feature scaler, and writes the scaler and
//! model card artifacts the API loads at startup.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use heart_risk_api::dataset::{cap_outliers, Dataset};
use heart_risk_api::models::{ModelCard, ModelKind, StandardScaler};
use heart_risk_api::types::patient::{FEATURE_COUNT, FEATURE_NAMES};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CardKind {
    TreeEnsemble,
    Linear,
    Unknown,
}

#[derive(Debug, Parser)]
#[command(name = "prepare_artifacts")]
#[command(about = "Fit the feature scaler and write model artifacts", version)]
struct Cli {
    /// Training dataset (CSV with a header row)
    #[arg(long)]
    dataset: PathBuf,

    /// Output directory for artifacts
    #[arg(long, default_value = "models")]
    out_dir: PathBuf,

    /// Target column name
    #[arg(long, default_value = "target")]
    target: String,

    /// Skip IQR outlier capping
    #[arg(long)]
    no_cap_outliers: bool,

    /// CSV of `feature,importance` rows used to build a model card
    #[arg(long)]
    importances: Option<PathBuf>,

    /// Model file stem the card belongs to
    #[arg(long, default_value = "random_forest")]
    card_name: String,

    /// Model kind recorded in the card
    #[arg(long, value_enum, default_value = "tree-ensemble")]
    kind: CardKind,

    /// Scaler artifact file name
    #[arg(long, default_value = "scaler.json")]
    scaler_name: String,
}

/// Read `feature,importance` rows into canonical order.
fn read_importances(path: &Path) -> Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open importances {:?}", path))?;

    let mut values = [None; FEATURE_COUNT];
    for record in reader.records() {
        let record = record?;
        let (Some(feature), Some(raw)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let Some(index) = FEATURE_NAMES.iter().position(|n| *n == feature) else {
            warn!(feature = %feature, "Ignoring unknown feature in importances file");
            continue;
        };
        let value: f64 = raw
            .parse()
            .with_context(|| format!("Invalid importance for '{}': {}", feature, raw))?;
        values[index] = Some(value);
    }

    FEATURE_NAMES
        .iter()
        .zip(values)
        .map(|(name, v)| v.with_context(|| format!("Importances file lacks '{}'", name)))
        .collect()
}

fn display_name(stem: &str) -> String {
    stem.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prepare_artifacts=info".parse()?)
                .add_directive("heart_risk_api=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!(dataset = %cli.dataset.display(), out_dir = %cli.out_dir.display(), "Preparing artifacts");

    let dataset = Dataset::load_csv(&cli.dataset, &cli.target)?;
    let profile = dataset.profile();
    profile.log();

    let mut rows = dataset.fill_missing()?;
    if cli.no_cap_outliers {
        info!("Outlier capping disabled");
    } else {
        let report = cap_outliers(&mut rows);
        info!(capped = report.iter().sum::<usize>(), "Outlier capping complete");
    }

    let scaler = StandardScaler::fit(&rows)?;
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("Failed to create {:?}", cli.out_dir))?;
    let scaler_path = cli.out_dir.join(&cli.scaler_name);
    scaler.save(&scaler_path)?;
    info!(path = %scaler_path.display(), "Scaler written");

    match &cli.importances {
        Some(path) => {
            let values = read_importances(path)?;
            let kind = match cli.kind {
                CardKind::TreeEnsemble => ModelKind::TreeEnsemble {
                    feature_importances: values,
                },
                CardKind::Linear => ModelKind::Linear {
                    coefficients: values,
                },
                CardKind::Unknown => ModelKind::Unknown,
            };
            let card = ModelCard {
                name: display_name(&cli.card_name),
                kind,
            };
            let card_path = cli.out_dir.join(format!("{}.card.json", cli.card_name));
            card.save(&card_path)?;
            info!(path = %card_path.display(), kind = card.kind.name(), "Model card written");
        }
        None => info!("No importances given, skipping model card"),
    }

    Ok(())
}
