mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use wavereel::{config, pipeline, visualizer};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if cli.list_styles {
        println!("Available styles:");
        for name in visualizer::available_styles() {
            println!("  {}", name);
        }
        return Ok(());
    }

    // explicit --config, else ./wavereel.toml or the user config dir
    if let Some(path) = cli.config.clone().or_else(config::find_config) {
        match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cli.merge(cfg);
            }
            Err(e) => log::warn!("Ignoring config: {}", e),
        }
    }

    let input = cli.input.clone().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let audio_only = cli.audio_only;
    let mut settings = cli.into_settings(input).context("Invalid settings")?;
    settings.retain_existing_sounds();

    log::info!("wavereel - audio visualizer video generator");
    if audio_only {
        let duration = pipeline::render_audio(&settings)?;
        println!("{} ({:.1}s)", settings.output.display(), duration);
    } else {
        let summary = pipeline::render_video(&settings)?;
        println!(
            "{} ({} frames, {:.1}s)",
            settings.output.display(),
            summary.frames,
            summary.duration
        );
    }
    Ok(())
}
