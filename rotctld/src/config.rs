use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen: ListenConfig,
    /// JSON file holding the rotor settings.
    pub settings_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Loads configuration from defaults, then the TOML file at `path` (if
    /// any), then `ROTCTLD_` environment variables such as
    /// `ROTCTLD_LISTEN__PORT`.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("listen.host", "127.0.0.1")?
            .set_default("listen.port", 4533)?
            .set_default("settings_file", "rotor.json")?;

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("rotctld").required(false)),
        };

        builder
            .add_source(config::Environment::with_prefix("ROTCTLD").separator("__"))
            .build()?
            .try_deserialize()
    }
}

impl ListenConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
