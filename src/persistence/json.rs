use super::Store;
use crate::models::{AppState, Instance, InstanceId};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;

const STATE_FILE: &str = "state.json";
const INSTANCES_DIR: &str = "instances";
const INSTANCE_FILE: &str = "instance.json";

/// JSON files under the application data directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: Utf8PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `data_dir`, creating the directory layout if needed.
    pub fn open<P: AsRef<Utf8Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let instances_dir = data_dir.join(INSTANCES_DIR);
        fs::create_dir_all(&instances_dir)
            .with_context(|| format!("Failed to create data directory: {}", instances_dir))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    fn state_path(&self) -> Utf8PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    fn instances_dir(&self) -> Utf8PathBuf {
        self.data_dir.join(INSTANCES_DIR)
    }

    fn instance_dir(&self, id: &InstanceId) -> Utf8PathBuf {
        self.instances_dir().join(id.as_str())
    }
}

/// Write through a temp file and rename so a crash never leaves a truncated record.
fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path))?;
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, raw).with_context(|| format!("Failed to write {}", temp))?;
    fs::rename(&temp, path).with_context(|| format!("Failed to finalize {}", path))?;
    Ok(())
}

impl Store for JsonStore {
    fn load_state(&self) -> Result<AppState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("No state file at {}, starting with no active instance", path);
            return Ok(AppState::default());
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
        let state: AppState =
            serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path))?;
        tracing::info!(
            "Loaded state from {} (active: {:?})",
            path,
            state.active_instance.as_ref().map(InstanceId::as_str)
        );
        Ok(state)
    }

    fn save_state(&self, state: &AppState) -> Result<()> {
        let path = self.state_path();
        write_json_atomic(&path, state)?;
        tracing::debug!("Saved state to {}", path);
        Ok(())
    }

    fn load_instances(&self) -> Result<Vec<Instance>> {
        let dir = self.instances_dir();
        let mut instances = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir))? {
            let entry = entry.with_context(|| format!("Failed to list {}", dir))?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path().join(INSTANCE_FILE)) else {
                continue;
            };
            if !path.is_file() {
                continue;
            }
            let loaded = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path))
                .and_then(|raw| {
                    serde_json::from_str::<Instance>(&raw)
                        .with_context(|| format!("Failed to parse {}", path))
                });
            match loaded {
                Ok(instance) => instances.push(instance),
                Err(e) => tracing::warn!("Skipping unreadable instance record: {:#}", e),
            }
        }
        instances.sort_by_key(|instance| instance.name.to_lowercase());
        tracing::info!("Loaded {} instance(s) from {}", instances.len(), dir);
        Ok(instances)
    }

    fn save_instance(&self, instance: &Instance) -> Result<()> {
        let dir = self.instance_dir(&instance.id);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir))?;
        write_json_atomic(&dir.join(INSTANCE_FILE), instance)?;
        tracing::debug!("Saved instance '{}' to {}", instance.id, dir);
        Ok(())
    }

    fn delete_instance(&self, id: &InstanceId) -> Result<()> {
        let dir = self.instance_dir(id);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to remove {}", dir))?;
            tracing::debug!("Removed instance record {}", dir);
        }
        Ok(())
    }
}
