use crate::models::UserConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use directories::BaseDirs;
use std::fs;

/// File name of the user configuration inside the config directory.
pub const USER_CONFIG_FILE: &str = "ronmgr.yaml";

/// Prefix of environment overrides (`RONMGR_GAME_MODS_DIR`, `RONMGR_DEBUG_MODE`, ...).
pub const ENV_PREFIX: &str = "RONMGR";

/// Default data directory: `<local data dir>/ronmgr` (e.g. `~/.local/share/ronmgr`).
pub fn default_data_dir() -> Result<Utf8PathBuf> {
    let base = BaseDirs::new().context("Could not determine the user data directory")?;
    let dir = base.data_local_dir().join(crate::APP_NAME);
    Utf8PathBuf::from_path_buf(dir)
        .map_err(|p| anyhow::anyhow!("Data directory is not valid UTF-8: {}", p.display()))
}

/// Configuration manager for loading and saving `ronmgr.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing `ronmgr.yaml` (normally the data directory)
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join(USER_CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the user configuration file.
    ///
    /// # Returns
    /// The loaded UserConfig, or default if file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::debug!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Effective settings: `ronmgr.yaml` overlaid with `RONMGR_*` environment variables.
    pub fn load_settings(&self) -> Result<UserConfig> {
        self.load_settings_with_env(None)
    }

    /// Same as [`load_settings`](Self::load_settings), reading overrides from `env` instead of
    /// the process environment when given.
    pub fn load_settings_with_env(
        &self,
        env: Option<config::Map<String, String>>,
    ) -> Result<UserConfig> {
        let settings = Config::builder()
            .add_source(File::new(self.user_config_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ai_keywords")
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to load settings from {}", self.user_config_path))?;

        let config: UserConfig = settings
            .try_deserialize()
            .context("Failed to interpret settings")?;
        tracing::debug!("Effective settings: {:?}", config);
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn user_config_path(&self) -> &Utf8Path {
        &self.user_config_path
    }
}
