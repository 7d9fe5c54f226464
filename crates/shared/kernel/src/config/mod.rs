use config::{Config, Environment, File};
use gatekit_domain::config::GateConfig;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Base name of the configuration file looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "gatekit";

/// Prefix of environment overrides (`GATEKIT__STACKS__HISTORY_CAPACITY=64`).
pub const ENV_PREFIX: &str = "GATEKIT";

#[gatekit_derive::gate_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Layered configuration loader: file first, then environment overrides.
///
/// 1. **Base File**: `path` (any format the `config` crate detects from the extension, or
///    `.toml`/`.json`/`.yaml` probing when the extension is omitted). An explicit path must
///    exist; the implicit `gatekit` file is optional so env-only deployments work.
/// 2. **Environment Overrides**: variables prefixed with `GATEKIT__`, nested with double
///    underscores (`GATEKIT__AVAILABILITY__CACHE_ENABLED=false` maps to
///    `availability.cache_enabled`).
///
/// # Errors
/// Returns [`ConfigError::Config`] if an explicit file is missing, a source cannot be parsed,
/// or the merged values do not deserialize into `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let required = path.is_some();
    let effective_path =
        path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    info!(path = %effective_path.display(), required, "Loading gatekit config");

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}

/// Loads the workspace [`GateConfig`].
///
/// # Errors
/// See [`load_config`].
pub fn load_gate_config(path: Option<impl AsRef<Path>>) -> Result<GateConfig, ConfigError> {
    load_config::<GateConfig>(path)
}
