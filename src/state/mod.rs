// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>>, persists the active-instance pointer through the Store, and
// emits change events for front ends.

use crate::error::InvalidOperation;
use crate::models::{AppState, InstanceId};
use crate::persistence::Store;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::broadcast;

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The active-instance pointer moved (and was persisted)
    ActiveInstanceChanged {
        previous: Option<InstanceId>,
        current: Option<InstanceId>,
    },

    /// An activation took the in-flight slot
    ActivationStarted { instance: InstanceId },

    /// The in-flight slot was released, whatever the outcome
    ActivationFinished { instance: InstanceId },
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Invalid(#[from] InvalidOperation),

    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

/// Thread-safe state manager with transactional persistence and event emission
///
/// This is the one accessor for [`AppState`]:
/// - [`load()`](Self::load) reads the persisted record once at startup
/// - [`read()`](Self::read) / [`snapshot()`](Self::snapshot) for reads
/// - [`set_active_instance()`](Self::set_active_instance) persists first and only then
///   publishes the new pointer, so a failed write leaves the in-memory state untouched
/// - [`begin_activation()`](Self::begin_activation) hands out the single activation slot
/// - [`subscribe()`](Self::subscribe) for listening to state changes
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
    store: Arc<dyn Store>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a StateManager from the persisted state record
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn load(store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let initial = store.load_state()?;
        Ok(Self::with_state(store, initial))
    }

    /// Create a StateManager around an already-loaded state without touching the store
    pub fn with_state(store: Arc<dyn Store>, initial: AppState) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState {
                activating: None,
                ..initial
            })),
            store,
            state_tx,
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, AppState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, AppState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a read-only snapshot of the current state
    pub fn snapshot(&self) -> AppState {
        self.read_lock().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_activating());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.read_lock();
        f(&state)
    }

    pub fn active_instance(&self) -> Option<InstanceId> {
        self.read(|state| state.active_instance.clone())
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Point AppState at `next` and persist it.
    ///
    /// The record is written exactly once, before the in-memory value changes. If the write
    /// fails the previous pointer stays visible to every reader.
    pub fn set_active_instance(
        &self,
        next: Option<InstanceId>,
    ) -> Result<Vec<StateChange>, StateError> {
        let mut state = self.write_lock();
        let mut candidate = state.clone();
        candidate.active_instance = next;
        self.store.save_state(&candidate)?;

        let old = std::mem::replace(&mut *state, candidate);
        let changes = Self::detect_changes(&old, &state);
        drop(state);
        self.emit(&changes);
        Ok(changes)
    }

    /// Take the single activation slot for `target`.
    ///
    /// The slot is released when the returned guard is dropped.
    pub fn begin_activation(&self, target: &InstanceId) -> Result<ActivationGuard, InvalidOperation> {
        let changes = {
            let mut state = self.write_lock();
            if state.is_activating() {
                return Err(InvalidOperation::ActivationInProgress);
            }
            let old = state.clone();
            state.activating = Some(target.clone());
            Self::detect_changes(&old, &state)
        };
        self.emit(&changes);
        Ok(ActivationGuard {
            manager: self.clone(),
        })
    }

    fn finish_activation(&self) {
        let changes = {
            let mut state = self.write_lock();
            let old = state.clone();
            state.activating = None;
            Self::detect_changes(&old, &state)
        };
        self.emit(&changes);
    }

    fn emit(&self, changes: &[StateChange]) {
        for change in changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }
    }

    /// Detect what changed between two states and generate events
    fn detect_changes(old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.activating != new.activating {
            if let Some(instance) = &new.activating {
                changes.push(StateChange::ActivationStarted {
                    instance: instance.clone(),
                });
            } else if let Some(instance) = &old.activating {
                changes.push(StateChange::ActivationFinished {
                    instance: instance.clone(),
                });
            }
        }

        if old.active_instance != new.active_instance {
            changes.push(StateChange::ActiveInstanceChanged {
                previous: old.active_instance.clone(),
                current: new.active_instance.clone(),
            });
        }

        changes
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            state_tx: self.state_tx.clone(),
        }
    }
}

/// Holds the activation slot; dropping it releases the slot.
#[must_use = "the activation slot is released as soon as the guard is dropped"]
pub struct ActivationGuard {
    manager: StateManager,
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        self.manager.finish_activation();
    }
}
