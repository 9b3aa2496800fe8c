/// castctl configuration
use cast_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_storage")]
    pub storage: StorageSettings,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is not set
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// `CAST_STORAGE__DATABASE_URL` style variables override the file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = config::Config::builder();

        let config_path = path.map_or_else(|| PathBuf::from("castctl.toml"), Path::to_path_buf);
        if config_path.exists() {
            settings = settings.add_source(config::File::from(config_path));
        } else if path.is_some() {
            anyhow::bail!("Config file {} not found", config_path.display());
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build()?.try_deserialize::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.database_url.trim().is_empty() {
            anyhow::bail!("storage.database_url must not be empty");
        }
        if self.playback.save_debounce_ms == 0 {
            anyhow::bail!("playback.save_debounce_ms must be greater than zero");
        }
        if !(PlaybackConfig::MIN_RATE..=PlaybackConfig::MAX_RATE).contains(&self.playback.default_rate) {
            anyhow::bail!(
                "playback.default_rate must be between {} and {}",
                PlaybackConfig::MIN_RATE,
                PlaybackConfig::MAX_RATE
            );
        }
        Ok(())
    }
}

// Default values
fn default_storage() -> StorageSettings {
    StorageSettings {
        database_url: default_database_url(),
    }
}

fn default_database_url() -> String {
    "sqlite://./data/castaway.db".to_string()
}

fn default_logging() -> LoggingSettings {
    LoggingSettings {
        filter: default_filter(),
    }
}

fn default_filter() -> String {
    "castctl=info,cast_playback=info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            playback: PlaybackConfig::default(),
            logging: default_logging(),
        }
    }
}
