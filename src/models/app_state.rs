use super::InstanceId;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an instance, derived from [`AppState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Draft,
    Active,
}

/// Single source of truth for which instance is projected into the game directory.
///
/// Only `active_instance` is persisted (`state.json`). `activating` marks the instance whose
/// activation is in flight and lives for the duration of that call only.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`]. Never
/// access it directly; use [`read()`](crate::state::StateManager::read) and the state manager's
/// transition methods, which persist before publishing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub active_instance: Option<InstanceId>,

    #[serde(skip)]
    pub activating: Option<InstanceId>,
}

impl AppState {
    pub fn is_active(&self, id: &InstanceId) -> bool {
        self.active_instance.as_ref() == Some(id)
    }

    pub fn is_activating(&self) -> bool {
        self.activating.is_some()
    }

    /// Whether `id` is the target of the activation currently in flight.
    pub fn is_activation_target(&self, id: &InstanceId) -> bool {
        self.activating.as_ref() == Some(id)
    }

    pub fn instance_state(&self, id: &InstanceId) -> InstanceState {
        if self.is_active(id) {
            InstanceState::Active
        } else {
            InstanceState::Draft
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_active_instance() {
        let state = AppState::default();
        assert!(state.active_instance.is_none());
        assert!(!state.is_activating());
    }

    #[test]
    fn test_only_pointer_target_is_active() {
        let state = AppState {
            active_instance: Some(InstanceId::new("realism")),
            activating: None,
        };
        assert_eq!(
            state.instance_state(&InstanceId::new("realism")),
            InstanceState::Active
        );
        assert_eq!(
            state.instance_state(&InstanceId::new("pvp")),
            InstanceState::Draft
        );
    }

    #[test]
    fn test_activation_marker_is_not_persisted() {
        let state = AppState {
            active_instance: Some(InstanceId::new("pvp")),
            activating: Some(InstanceId::new("realism")),
        };
        let raw = serde_json::to_string(&state).unwrap();
        assert_eq!(raw, r#"{"active_instance":"pvp"}"#);

        let loaded: AppState = serde_json::from_str(&raw).unwrap();
        assert!(loaded.activating.is_none());
        assert!(loaded.is_active(&InstanceId::new("pvp")));
    }
}
