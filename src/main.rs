mod config;
mod error;
mod model;
mod pipeline;
mod types;
mod web;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Settings;
use model::ModelKind;
use pipeline::{LoadMode, PredictionService, SeriesLoader, ServingContext, Trainer};
use web::{start_server, AppState};

const DEFAULT_CONFIG: &str = "forecaster.toml";

#[derive(Parser)]
#[command(name = "price-forecaster")]
#[command(author = "Trading Bot")]
#[command(version = "0.1.0")]
#[command(about = "Next-value forecaster for a daily closing-price series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (default: forecaster.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the scaler on the training file and export its windows as CSV
    Preprocess {
        /// Training CSV (defaults to data.path)
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Windows CSV output (defaults to data.windows_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Train a model and persist model, scaler and metrics
    Train {
        /// Training CSV (defaults to data.path)
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Model type: last_value or linear
        #[arg(short, long)]
        model: Option<ModelKind>,
    },
    /// Predict the next value once and print it as JSON
    Predict {
        /// Price CSV (defaults to data.path)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Start the prediction API
    Serve {
        /// Listen port (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings as TOML
    Show,
    /// Check the effective settings and report every problem
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs)?;

    info!("Price Forecaster v{}", env!("CARGO_PKG_VERSION"));

    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Preprocess { data, output } => {
            run_preprocess(&settings, data, output)?;
        }
        Commands::Train { data, model } => {
            run_train(&settings, data, model)?;
        }
        Commands::Predict { data } => {
            run_predict(&settings, data)?;
        }
        Commands::Serve { port } => {
            run_serve(&settings, port).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => println!("{}", settings.to_toml()?),
            ConfigAction::Validate => info!("Configuration is valid"),
        },
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    dotenvy::dotenv().ok();

    let explicit = path.is_some();
    let path = path.cloned().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let settings = Settings::load(&path, explicit)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    settings
        .validate()
        .map_err(|errors| anyhow!("invalid configuration:\n  {}", errors.join("\n  ")))?;
    Ok(settings)
}

fn run_preprocess(settings: &Settings, data: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let data_path = data.unwrap_or_else(|| settings.data.path.clone());
    let output = output.unwrap_or_else(|| settings.data.windows_path.clone());
    let w = settings.pipeline.window_size;

    info!("━━━ Step 1: Loading {} ━━━", data_path.display());
    let series = SeriesLoader::new(&settings.data.target_column, w)
        .load_path(&data_path, LoadMode::Training)?;
    info!("Loaded {} rows", series.len());

    info!("━━━ Step 2: Fitting scaler and building windows ━━━");
    let trainer = Trainer::new(w, settings.pipeline.validation_split);
    let (scaler, windows) = trainer.prepare(&series)?;
    settings.artifacts.store().save_scaler(&scaler)?;

    info!("━━━ Step 3: Writing windows ━━━");
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&output)
        .with_context(|| format!("cannot create {}", output.display()))?;
    windows.write_csv(file)?;
    info!("✓ Wrote {} windows to {}", windows.len(), output.display());

    Ok(())
}

fn run_train(settings: &Settings, data: Option<PathBuf>, kind: Option<ModelKind>) -> Result<()> {
    let data_path = data.unwrap_or_else(|| settings.data.path.clone());
    let kind = kind.unwrap_or(settings.training.model);
    let w = settings.pipeline.window_size;

    info!("═══════════════════════════════════════════════════");
    info!("Training {} forecaster", kind);
    info!("═══════════════════════════════════════════════════");
    info!("Data: {}", data_path.display());
    info!("Window size: {}", w);
    info!("Validation split: {}", settings.pipeline.validation_split);

    let series = SeriesLoader::new(&settings.data.target_column, w)
        .load_path(&data_path, LoadMode::Training)?;
    info!("✓ Loaded {} rows", series.len());

    let mut model = kind.build(settings.training.params());
    let trainer = Trainer::new(w, settings.pipeline.validation_split);
    let outcome = trainer.run(&series, model.as_mut())?;

    if let (Some(actual), Some(predicted)) =
        (outcome.validation_true.last(), outcome.validation_pred.last())
    {
        info!(
            "Last validation step: actual {:.4}, predicted {:.4} ({} validation samples)",
            actual,
            predicted,
            outcome.validation_true.len()
        );
    }

    info!("━━━ Step 5: Saving artifacts ━━━");
    let artifact = model.to_artifact()?;
    settings
        .artifacts
        .store()
        .save_all(&artifact, &outcome.scaler, &outcome.metrics)?;

    info!(
        "✓ Training complete: {} epochs, best epoch {}",
        outcome.report.epochs_run, outcome.report.best_epoch
    );
    println!("{}", outcome.metrics.to_json()?);
    Ok(())
}

fn load_service(settings: &Settings) -> Result<PredictionService> {
    let store = settings.artifacts.store();
    let context = ServingContext::load(&store, settings.pipeline.window_size)
        .with_context(|| format!("cannot load artifacts from {}", store.dir().display()))?;
    info!("Serving {} model", context.model_kind());
    Ok(PredictionService::new(
        Arc::new(context),
        settings.data.target_column.clone(),
    ))
}

fn run_predict(settings: &Settings, data: Option<PathBuf>) -> Result<()> {
    let data_path = data.unwrap_or_else(|| settings.data.path.clone());
    let service = load_service(settings)?;
    let result = service.predict_from_path(&data_path)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_serve(settings: &Settings, port: Option<u16>) -> Result<()> {
    let service = load_service(settings)?;
    let state = AppState::new(service, settings.data.path.clone());
    let port = port.unwrap_or(settings.server.port);
    start_server(state, &settings.server.host, port).await
}
