//! Layering of the run configuration: profile preset, config file, environment, CLI.
use crate::cli::Cli;
use crate::error::RuntimeError;
use serde_json::Value;
use std::path::Path;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use txload_core::{ConfigError, Profile, RunConfig, Schedule};

/// Builds the final configuration. `env_base_url` is the value of `BASE_URL`, if set.
pub fn resolve(cli: &Cli, env_base_url: Option<String>) -> Result<RunConfig, RuntimeError> {
    let profile = Profile::from(cli.profile);
    let mut config = match &cli.config {
        Some(path) => {
            debug!("Merging {} over the {} profile", path.display(), profile.name());
            load_file(profile.config(), path)?
        }
        None => profile.config(),
    };

    let base_url = cli
        .base_url
        .clone()
        .or(env_base_url.filter(|url| !url.trim().is_empty()));
    if let Some(raw) = base_url {
        config.set_base_url(&raw)?;
    }

    if let Some(path) = &cli.summary_path {
        config.summary_path = path.clone();
    }

    if cli.smoke {
        config.schedule = Schedule::iterations(1, 1);
    }

    config.validate()?;
    Ok(config)
}

/// Deep-merge the JSON document at `path` over `preset`.
pub fn load_file(preset: RunConfig, path: &Path) -> Result<RunConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let overlay: Value = serde_json::from_str(&raw)?;
    let mut merged = serde_json::to_value(&preset)?;
    merge(&mut merged, overlay);
    Ok(serde_json::from_value(merged)?)
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}
