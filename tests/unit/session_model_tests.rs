//! Session mirror and slot lifecycle rules.

use std::path::PathBuf;

use serde_json::json;

use agent_link::acp::schema::NewSessionResponse;
use agent_link::models::{Session, SlotState};

fn response(with_modes: bool) -> NewSessionResponse {
    let mut raw = json!({ "sessionId": "sess-1" });
    if with_modes {
        raw["modes"] = json!({
            "currentModeId": "default",
            "availableModes": [{ "id": "default", "name": "Default" }, { "id": "plan", "name": "Plan" }],
        });
        raw["models"] = json!({
            "currentModelId": "small",
            "availableModels": [{ "modelId": "small", "name": "Small" }],
        });
    }
    serde_json::from_value(raw).unwrap()
}

#[test]
fn from_response_copies_identity() {
    let session = Session::from_response(response(true), "proc-1", "claude", PathBuf::from("/work"));

    assert_eq!(session.session_id, "sess-1");
    assert_eq!(session.agent_id, "proc-1");
    assert_eq!(session.agent_name, "claude");
    assert_eq!(session.cwd, PathBuf::from("/work"));
    assert_eq!(session.current_mode(), Some("default"));
    assert_eq!(session.current_model(), Some("small"));
}

#[test]
fn apply_mode_and_model_update_the_mirror() {
    let mut session = Session::from_response(response(true), "p", "a", PathBuf::from("/"));

    assert!(session.apply_mode("plan"));
    assert!(session.apply_model("large"));

    assert_eq!(session.current_mode(), Some("plan"));
    assert_eq!(session.current_model(), Some("large"));
}

#[test]
fn agents_without_modes_ignore_switches() {
    let mut session = Session::from_response(response(false), "p", "a", PathBuf::from("/"));

    assert!(!session.apply_mode("plan"));
    assert!(!session.apply_model("large"));
    assert_eq!(session.current_mode(), None);
}

#[test]
fn session_serialises_snake_case() {
    let session = Session::from_response(response(false), "p", "a", PathBuf::from("/w"));
    let value = serde_json::to_value(&session).unwrap();

    assert_eq!(value["session_id"], "sess-1");
    assert_eq!(value["agent_name"], "a");
    assert!(value["created_at"].is_string());
}

// ── Slot lifecycle ──────────────────────────────────────────────────────────

#[test]
fn slot_defaults_to_disconnected() {
    assert_eq!(SlotState::default(), SlotState::Disconnected);
}

#[test]
fn auth_detour_is_allowed() {
    assert!(SlotState::Connecting.can_transition_to(SlotState::AwaitingAuth));
    assert!(SlotState::AwaitingAuth.can_transition_to(SlotState::Active));
}

#[test]
fn skipping_states_is_not_allowed() {
    assert!(!SlotState::Disconnected.can_transition_to(SlotState::Active));
    assert!(!SlotState::Spawning.can_transition_to(SlotState::Active));
    assert!(!SlotState::Active.can_transition_to(SlotState::Spawning));
}

#[test]
fn every_state_can_fall_back_to_disconnected() {
    for state in [
        SlotState::Disconnected,
        SlotState::Spawning,
        SlotState::Connecting,
        SlotState::AwaitingAuth,
        SlotState::Active,
    ] {
        assert!(state.can_transition_to(SlotState::Disconnected), "{state:?}");
    }
}

#[test]
fn slot_state_serialises_snake_case() {
    assert_eq!(
        serde_json::to_value(SlotState::AwaitingAuth).unwrap(),
        json!("awaiting_auth")
    );
}
