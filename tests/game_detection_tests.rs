//! Integration tests for Steam/Proton game path discovery
//!
//! These tests build fake home directories and verify:
//! - Native and Flatpak library discovery, plus extra libraries from libraryfolders.vdf
//! - Each failure mode (game files missing, prefix missing, prefix incomplete)
//! - Creation of the Paks directory inside an initialised prefix

use camino::{Utf8Path, Utf8PathBuf};
use ronmgr::services::game_detection::{GameDetectionError, GameLocator, mods_dir_in_library};
use std::fs;
use tempfile::TempDir;

const PAKS: &str =
    "compatdata/1144200/pfx/drive_c/users/steamuser/AppData/Local/ReadyOrNot/Saved/Paks";

fn temp_home() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let home = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, home)
}

/// Lay out a library that has the game installed and a prefix down to `AppData/Local`.
fn install_game(steamapps: &Utf8Path) {
    fs::create_dir_all(steamapps.join("common/Ready Or Not")).unwrap();
    fs::create_dir_all(
        steamapps.join("compatdata/1144200/pfx/drive_c/users/steamuser/AppData/Local"),
    )
    .unwrap();
    fs::write(steamapps.join("appmanifest_1144200.acf"), "\"AppState\" {}").unwrap();
}

#[test]
fn test_native_library_found() {
    let (_temp_dir, home) = temp_home();
    let steamapps = home.join(".steam/steam/steamapps");
    fs::create_dir_all(&steamapps).unwrap();

    let locator = GameLocator::new(&home);
    assert_eq!(locator.find_steam_libraries(), vec![steamapps]);
}

#[test]
fn test_flatpak_and_extra_libraries() {
    let (_temp_dir, home) = temp_home();
    let flatpak = home.join(".var/app/com.valvesoftware.Steam/.steam/steam/steamapps");
    let extra_root = home.join("games/SteamLibrary");
    fs::create_dir_all(&flatpak).unwrap();
    fs::create_dir_all(extra_root.join("steamapps")).unwrap();
    fs::write(
        flatpak.join("libraryfolders.vdf"),
        format!(
            "\"libraryfolders\"\n{{\n\t\"0\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n\t\"1\"\n\t{{\n\t\t\"path\"\t\t\"/does/not/exist\"\n\t}}\n}}\n",
            extra_root
        ),
    )
    .unwrap();

    let locator = GameLocator::new(&home);
    assert_eq!(
        locator.find_steam_libraries(),
        vec![flatpak, extra_root.join("steamapps")]
    );
}

#[test]
fn test_detects_game_in_secondary_library() {
    let (_temp_dir, home) = temp_home();
    let native = home.join(".steam/steam/steamapps");
    let extra_root = home.join("ssd");
    fs::create_dir_all(&native).unwrap();
    install_game(&extra_root.join("steamapps"));
    fs::write(
        native.join("libraryfolders.vdf"),
        format!("\"path\"  \"{}\"", extra_root),
    )
    .unwrap();

    let mods_dir = GameLocator::new(&home).detect_mods_dir().unwrap();

    assert_eq!(mods_dir, extra_root.join("steamapps").join(PAKS));
    assert!(mods_dir.is_dir());
}

#[test]
fn test_not_installed() {
    let (_temp_dir, home) = temp_home();
    fs::create_dir_all(home.join(".steam/steam/steamapps")).unwrap();

    let result = GameLocator::new(&home).detect_mods_dir();
    assert!(matches!(
        result,
        Err(GameDetectionError::NotInstalled { checked: 1 })
    ));
}

#[test]
fn test_game_files_missing() {
    let (_temp_dir, home) = temp_home();
    let steamapps = home.join("steamapps");
    install_game(&steamapps);
    fs::remove_dir_all(steamapps.join("common")).unwrap();

    assert!(matches!(
        mods_dir_in_library(&steamapps),
        Err(GameDetectionError::GameFilesMissing { .. })
    ));
}

#[test]
fn test_prefix_missing() {
    let (_temp_dir, home) = temp_home();
    let steamapps = home.join("steamapps");
    install_game(&steamapps);
    fs::remove_dir_all(steamapps.join("compatdata")).unwrap();

    let err = mods_dir_in_library(&steamapps).unwrap_err();
    assert!(matches!(err, GameDetectionError::PrefixMissing { .. }));
    assert!(err.to_string().contains("launch the game once"));
}

#[test]
fn test_prefix_incomplete_is_not_repaired() {
    let (_temp_dir, home) = temp_home();
    let steamapps = home.join("steamapps");
    install_game(&steamapps);
    fs::remove_dir_all(steamapps.join("compatdata/1144200/pfx/drive_c/users")).unwrap();

    assert!(matches!(
        mods_dir_in_library(&steamapps),
        Err(GameDetectionError::PrefixIncomplete { .. })
    ));
    assert!(!steamapps.join(PAKS).exists());
}

#[test]
fn test_existing_paks_dir_is_reused() {
    let (_temp_dir, home) = temp_home();
    let steamapps = home.join("steamapps");
    install_game(&steamapps);
    fs::create_dir_all(steamapps.join(PAKS)).unwrap();
    fs::write(steamapps.join(PAKS).join("pakchunk99-Mod.pak"), b"x").unwrap();

    let found = mods_dir_in_library(&steamapps).unwrap().unwrap();
    assert_eq!(found, steamapps.join(PAKS));
    assert!(found.join("pakchunk99-Mod.pak").exists());
}
