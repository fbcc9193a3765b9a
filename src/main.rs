//! ronmgr - instance-based mod manager for Ready or Not under Proton
//!
//! Main entry point for the command-line application.
//!
//! # Execution Flow
//!
//! 1. Parse arguments (clap)
//! 2. Resolve the data directory and load `ronmgr.yaml` plus `RONMGR_*` overrides
//! 3. Initialize logging → `<data>/logs/ronmgr.<date>`
//! 4. Locate the game mod directory (override or Steam discovery)
//! 5. Build the [`ModManager`] and run the command
//! 6. Log the metrics summary
//!
//! # Data Directory
//!
//! Defaults to `~/.local/share/ronmgr`:
//! - `ronmgr.yaml`: user settings (optional)
//! - `state.json`: the active instance
//! - `instances/<id>/instance.json`: one record per instance
//! - `mods/`: the mod library
//! - `logs/`: daily rotated log files

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use ronmgr::cli::{self, Cli};
use ronmgr::config::{self as settings, ConfigManager};
use ronmgr::logging::{self, LOG_PREFIX};
use ronmgr::services::{ConflictDetector, ModManager};
use ronmgr::{APP_NAME, VERSION};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => settings::default_data_dir()?,
    };
    let user_config = ConfigManager::new(&config_dir)?.load_settings()?;
    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| user_config.data_dir.as_deref().map(Utf8PathBuf::from))
        .unwrap_or(config_dir);

    // Held until exit so buffered log lines are flushed
    let _guard = logging::setup_logging_with_console(
        &data_dir.join("logs"),
        LOG_PREFIX,
        cli.debug || user_config.debug_mode,
        user_config.console_log,
        user_config.json_logs,
    )?;
    tracing::info!("Starting {} v{} (data: {})", APP_NAME, VERSION, data_dir);

    let override_dir = cli
        .game_dir
        .clone()
        .or_else(|| user_config.game_mods_dir.as_deref().map(Utf8PathBuf::from));
    let (mods_dir, game_dir_error) = match cli::locate_mods_dir(override_dir.as_deref()) {
        Ok(dir) => (Some(dir), None),
        Err(e) => {
            tracing::warn!("Game mod directory unavailable: {:#}", e);
            (None, Some(format!("{:#}", e)))
        }
    };

    let mut manager = ModManager::open(&data_dir, mods_dir.as_deref())?
        .with_detector(ConflictDetector::with_default_rules(&user_config.ai_keywords));

    let mut stdout = std::io::stdout().lock();
    let result = cli::execute(
        cli.command,
        &mut manager,
        game_dir_error.as_deref(),
        &mut stdout,
    );

    manager.metrics().log_summary();
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}
