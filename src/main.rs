use std::path::PathBuf;

use anyhow::Context;
use bevy::prelude::*;
use clap::Parser;
use tileview::resources::{TokioRuntime, ViewerEventReceiver};
use tileview::{MapCatalog, MapViewer, Settings};

mod components;
mod plugins;
mod systems;

/// Tiled map viewer
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Settings file
    #[arg(short, long, default_value = "tileview.toml")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration problems are fatal, before any window shows up
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    let catalog = MapCatalog::load_dir(&settings.paths.maps).context("loading map sources")?;

    let runtime = tokio::runtime::Runtime::new().context("creating Tokio runtime")?;
    let (viewer, events) = MapViewer::from_settings(&settings, catalog, runtime.handle().clone())?;

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Tileview".into(),
                resolution: (800., 600.).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(TokioRuntime(runtime))
        .insert_resource(ViewerEventReceiver(events))
        .insert_resource(viewer)
        .add_plugins(plugins::AppPlugins)
        .run();

    Ok(())
}
