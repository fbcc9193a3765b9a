//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Defaults for missing files and missing keys
//! - Environment overrides layered over the YAML file
//! - Settings feeding the conflict detector

use camino::Utf8PathBuf;
use ronmgr::config::USER_CONFIG_FILE;
use ronmgr::services::ConflictDetector;
use ronmgr::{ConfigManager, ModId, UserConfig};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("nested/data");
    let manager = ConfigManager::new(&nested).unwrap();

    assert_eq!(manager.config_dir(), &nested);
    assert!(nested.is_dir());
}

#[test]
fn test_load_default_user_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let user_config = manager.load_user_config().unwrap();

    assert_eq!(user_config, UserConfig::default());
    assert!(user_config.game_mods_dir.is_none());
}

#[test]
fn test_save_writes_yaml() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let config = UserConfig {
        debug_mode: true,
        ai_keywords: vec!["npc".to_string()],
        ..UserConfig::default()
    };
    manager.save_user_config(&config).unwrap();

    let raw = fs::read_to_string(config_path.join(USER_CONFIG_FILE)).unwrap();
    assert!(raw.contains("debug_mode: true"));
    assert_eq!(manager.load_user_config().unwrap(), config);
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join(USER_CONFIG_FILE), "debug_mode: [unclosed").unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let err = manager.load_user_config().unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse user config"));
}

#[test]
fn test_settings_without_file_or_env() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = manager.load_settings_with_env(env(&[])).unwrap();

    assert_eq!(settings, UserConfig::default());
}

#[test]
fn test_env_list_override() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = manager
        .load_settings_with_env(env(&[("RONMGR_AI_KEYWORDS", "npc,enemy")]))
        .unwrap();

    assert_eq!(settings.ai_keywords, vec!["npc", "enemy"]);
}

#[test]
fn test_configured_keywords_drive_detector() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join(USER_CONFIG_FILE),
        "ai_keywords:\n  - npc\n",
    )
    .unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();
    let settings = manager.load_settings_with_env(env(&[])).unwrap();

    let detector = ConflictDetector::with_default_rules(&settings.ai_keywords);
    let enabled = [ModId::from("NPCSpawns.pak"), ModId::from("npc_voices.pak")];
    let warnings = detector.evaluate(&enabled);

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].rule, "ai-behavior");
    // The default keywords no longer apply
    assert!(
        detector
            .evaluate(&[ModId::from("SmartAI.pak"), ModId::from("SWATPack.pak")])
            .is_empty()
    );
}

#[test]
fn test_env_enables_json_logs() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = manager
        .load_settings_with_env(env(&[("RONMGR_JSON_LOGS", "true")]))
        .unwrap();

    assert!(settings.json_logs);
    assert!(!UserConfig::default().json_logs);
}
