mod app;
mod config;
mod graph;
mod physics;
mod registry;
mod session;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use tracing::info;

use crate::config::Config;
use crate::registry::{EntityId, RegistrySnapshot};
use crate::session::FocalRef;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Registry snapshot (JSON) to browse.
    #[arg(long)]
    data: PathBuf,

    /// Entity id to start from.
    #[arg(long, conflicts_with = "orgnr", required_unless_present = "orgnr")]
    id: Option<String>,

    /// Organisation number of the company to start from.
    #[arg(long)]
    orgnr: Option<String>,

    /// Register year, overrides the config file.
    #[arg(long)]
    year: Option<u16>,

    #[arg(long, default_value = "aksjegraf.toml")]
    config: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn focal(&self) -> anyhow::Result<FocalRef> {
        match (&self.id, &self.orgnr) {
            (Some(id), _) => Ok(FocalRef::Id(EntityId::new(id.as_str()))),
            (None, Some(orgnr)) => Ok(FocalRef::RegistryNumber(orgnr.clone())),
            (None, None) => Err(anyhow!("either --id or --orgnr is required")),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(year) = args.year {
        config.fetch.year = year;
    }

    let focal = args.focal()?;
    let snapshot = RegistrySnapshot::load(&args.data)?;
    info!(data = %args.data.display(), year = config.fetch.year, "starting aksjegraf");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "aksjegraf",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::AksjegrafApp::new(
                cc,
                Arc::new(snapshot),
                config,
                focal,
            )))
        }),
    )
    .map_err(|error| anyhow!("failed to run the viewer: {error}"))
}
