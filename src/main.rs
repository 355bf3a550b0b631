pub mod types;
pub mod error;
pub mod config;
pub mod data;
pub mod sample;
pub mod store;
pub mod export;
pub mod navigation;
pub mod server;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the generated sample dataset as CSV
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE", default_value = "observations.csv")]
        out: PathBuf,
    },
    /// Export a filtered view or a ranking as CSV
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
        #[arg(long)]
        year: Option<u16>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        indicator: Option<String>,
        /// Comma-separated country names
        #[arg(long)]
        countries: Option<String>,
        /// Export a ranking (needs --indicator and --year) instead of raw rows
        #[arg(long)]
        rank: bool,
    },
    /// Serve the query API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[derive(Debug)]
enum ExportRequest {
    Ranking {
        indicator: types::Indicator,
        year: u16,
        gender: types::Gender,
        countries: Option<BTreeSet<types::Country>>,
    },
    Rows(store::Criteria),
}

fn export_request(
    year: Option<u16>,
    gender: Option<String>,
    indicator: Option<String>,
    countries: Option<String>,
    rank: bool,
) -> anyhow::Result<ExportRequest> {
    let gender = gender.map(|g| g.parse::<types::Gender>()).transpose()?;
    let indicator = indicator.map(|i| i.parse::<types::Indicator>()).transpose()?;
    let countries = countries
        .map(|list| {
            list.split(',')
                .filter(|name| !name.trim().is_empty())
                .map(str::parse::<types::Country>)
                .collect::<Result<BTreeSet<_>, _>>()
        })
        .transpose()?;

    if rank {
        Ok(ExportRequest::Ranking {
            indicator: indicator.ok_or_else(|| anyhow!("--rank needs --indicator"))?,
            year: year.ok_or_else(|| anyhow!("--rank needs --year"))?,
            gender: gender.unwrap_or(types::Gender::All),
            countries,
        })
    } else {
        Ok(ExportRequest::Rows(store::Criteria {
            year,
            gender,
            countries,
            indicator,
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { config, out } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let observations = sample::generate(&app_config.generator);

            let file = File::create(&out)
                .with_context(|| format!("Failed to create output file: {:?}", out))?;
            export::write_observations(file, &observations)?;
            info!(count = observations.len(), path = ?out, "Wrote sample dataset");
        }
        Commands::Export {
            config,
            out,
            year,
            gender,
            indicator,
            countries,
            rank,
        } => {
            // Bad arguments must fail before the output file is truncated.
            let request = export_request(year, gender, indicator, countries, rank)?;

            let app_config = config::AppConfig::load_from_file(&config)?;
            let source = data::source_from_config(&app_config);
            let store = store::ObservationStore::load(source.as_ref())?;

            let file = File::create(&out)
                .with_context(|| format!("Failed to create output file: {:?}", out))?;

            match request {
                ExportRequest::Ranking {
                    indicator,
                    year,
                    gender,
                    countries,
                } => {
                    let entries = store.rank(indicator, year, gender, countries.as_ref());
                    export::write_ranking(file, indicator, &entries)?;
                    info!(rows = entries.len(), path = ?out, "Exported ranking");
                }
                ExportRequest::Rows(criteria) => {
                    let rows = store.filter(&criteria);
                    export::write_observations(file, &rows)?;
                    info!(rows = rows.len(), path = ?out, "Exported observations");
                }
            }
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let source = data::source_from_config(&app_config);
            info!(source = %source.describe(), "Loading data for API");

            let state = server::AppState::load(source)?;
            server::start_server(&app_config.server, Arc::new(state)).await?;
        }
    }

    Ok(())
}
