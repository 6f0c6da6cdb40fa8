mod app;
mod config;
mod input;
mod render;

use std::path::PathBuf;

use anyhow::{bail, Context};

const DEFAULT_CONFIG_FILE: &str = "scan_tracker.ron";

fn main() -> anyhow::Result<()> {
    let config_path = parse_args(std::env::args().skip(1))?;
    let config = config::AppConfig::load(&config_path)
        .with_context(|| format!("loading settings from {}", config_path.display()))?;
    app::run_app(config)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<PathBuf> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = PathBuf::from(path),
                None => bail!("--config needs a path"),
            },
            other => bail!("unknown argument {other:?}; usage: scan_app [--config <file>]"),
        }
    }
    Ok(config_path)
}
