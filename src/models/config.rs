use serde::{Deserialize, Serialize};

/// User configuration from `ronmgr.yaml`.
///
/// Every field can also be supplied through a `RONMGR_<FIELD>` environment variable when
/// loaded with [`ConfigManager::load_settings`](crate::config::ConfigManager::load_settings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Managed directory override; skips Steam discovery when set
    #[serde(default)]
    pub game_mods_dir: Option<String>,

    /// Data directory override (library, instances, state, logs)
    #[serde(default)]
    pub data_dir: Option<String>,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_console_log")]
    pub console_log: bool,

    /// Write the log file as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Words that mark a mod as touching AI behaviour
    #[serde(default = "default_ai_keywords")]
    pub ai_keywords: Vec<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            game_mods_dir: None,
            data_dir: None,
            debug_mode: false,
            console_log: default_console_log(),
            json_logs: false,
            ai_keywords: default_ai_keywords(),
        }
    }
}

fn default_console_log() -> bool {
    true
}

pub fn default_ai_keywords() -> Vec<String> {
    ["ai", "suspect", "suspects", "swat", "officer", "officers"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_config_defaults() {
        let config = UserConfig::default();
        assert!(config.game_mods_dir.is_none());
        assert!(!config.debug_mode);
        assert!(config.console_log);
        assert!(config.ai_keywords.contains(&"swat".to_string()));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: UserConfig = serde_yaml_ng::from_str("debug_mode: true\n").unwrap();
        assert!(config.debug_mode);
        assert!(config.console_log);
        assert_eq!(config.ai_keywords, default_ai_keywords());
    }
}
