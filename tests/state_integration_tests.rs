//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events on activation-pointer changes
//! - Supports multiple subscribers
//! - Persists the pointer before anyone can observe it
//! - Serializes activations across threads

use camino::Utf8PathBuf;
use ronmgr::persistence::{JsonStore, Store};
use ronmgr::{InstanceId, InvalidOperation, StateChange, StateManager};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use tokio::time::{Duration, timeout};

fn create_state() -> (TempDir, Arc<dyn Store>, StateManager) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let store: Arc<dyn Store> = Arc::new(JsonStore::open(&path).unwrap());
    let state = StateManager::load(Arc::clone(&store)).unwrap();
    (temp_dir, store, state)
}

#[tokio::test]
async fn test_pointer_change_event_emitted() {
    let (_temp_dir, _store, state) = create_state();
    let mut rx = state.subscribe();

    state
        .set_active_instance(Some(InstanceId::new("realism")))
        .unwrap();

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");

    assert_eq!(
        event,
        StateChange::ActiveInstanceChanged {
            previous: None,
            current: Some(InstanceId::new("realism")),
        }
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let (_temp_dir, _store, state) = create_state();
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();

    state
        .set_active_instance(Some(InstanceId::new("pvp")))
        .unwrap();

    for rx in [&mut rx1, &mut rx2] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout")
            .expect("Channel closed");
        assert!(matches!(event, StateChange::ActiveInstanceChanged { .. }));
    }
}

#[tokio::test]
async fn test_unchanged_pointer_emits_nothing() {
    let (_temp_dir, _store, state) = create_state();
    let mut rx = state.subscribe();

    let changes = state.set_active_instance(None).unwrap();

    assert!(changes.is_empty());
    assert!(
        timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
        "No event expected when the pointer does not move"
    );
}

#[tokio::test]
async fn test_activation_lifecycle_events_in_order() {
    let (_temp_dir, _store, state) = create_state();
    let mut rx = state.subscribe();
    let target = InstanceId::new("realism");

    {
        let _slot = state.begin_activation(&target).unwrap();
        state.set_active_instance(Some(target.clone())).unwrap();
    }

    let mut events = Vec::new();
    for _ in 0..3 {
        events.push(
            timeout(Duration::from_millis(100), rx.recv())
                .await
                .expect("Timeout")
                .expect("Channel closed"),
        );
    }

    assert_eq!(
        events,
        vec![
            StateChange::ActivationStarted {
                instance: target.clone()
            },
            StateChange::ActiveInstanceChanged {
                previous: None,
                current: Some(target.clone()),
            },
            StateChange::ActivationFinished { instance: target },
        ]
    );
}

#[test]
fn test_pointer_survives_restart() {
    let (_temp_dir, store, state) = create_state();
    state
        .set_active_instance(Some(InstanceId::new("pvp")))
        .unwrap();

    let reloaded = StateManager::load(store).unwrap();
    assert_eq!(reloaded.active_instance(), Some(InstanceId::new("pvp")));
    assert!(!reloaded.read(|s| s.is_activating()));
}

#[test]
fn test_concurrent_activation_attempts_are_serialized() {
    let (_temp_dir, _store, state) = create_state();
    let slot = state.begin_activation(&InstanceId::new("realism")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let state = state.clone();
            thread::spawn(move || {
                state
                    .begin_activation(&InstanceId::new(format!("other-{}", i)))
                    .map(drop)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            Err(InvalidOperation::ActivationInProgress)
        );
    }

    drop(slot);
    assert!(state.begin_activation(&InstanceId::new("pvp")).is_ok());
}
