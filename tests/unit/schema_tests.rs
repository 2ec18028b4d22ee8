//! Wire shapes of ACP payloads: camelCase fields, tagged unions and
//! forward-compatible fallbacks for unknown variants.

use serde_json::json;

use agent_link::acp::schema::{
    ClientCapabilities, ContentBlock, InitializeResponse, NewSessionResponse,
    PermissionOptionKind, PermissionOutcome, PromptResponse, RequestPermissionRequest,
    SessionNotification, SessionUpdate, TerminalOutputResponse, ToolCallStatus,
};

// ── Session updates ─────────────────────────────────────────────────────────

#[test]
fn agent_message_chunk_parses() {
    let n: SessionNotification = serde_json::from_value(json!({
        "sessionId": "s-1",
        "update": {
            "sessionUpdate": "agent_message_chunk",
            "content": { "type": "text", "text": "hello" },
        },
    }))
    .unwrap();

    assert_eq!(n.session_id, "s-1");
    match n.update {
        SessionUpdate::AgentMessageChunk(chunk) => assert_eq!(chunk.content.as_text(), Some("hello")),
        other => panic!("unexpected update {other:?}"),
    }
}

#[test]
fn tool_call_and_update_parse() {
    let call: SessionUpdate = serde_json::from_value(json!({
        "sessionUpdate": "tool_call",
        "toolCallId": "call-1",
        "title": "Read file",
        "kind": "read",
        "status": "pending",
    }))
    .unwrap();
    let SessionUpdate::ToolCall(call) = call else {
        panic!("expected tool_call");
    };
    assert_eq!(call.tool_call_id, "call-1");
    assert_eq!(call.status, Some(ToolCallStatus::Pending));

    let update: SessionUpdate = serde_json::from_value(json!({
        "sessionUpdate": "tool_call_update",
        "toolCallId": "call-1",
        "status": "something_new",
    }))
    .unwrap();
    let SessionUpdate::ToolCallUpdate(update) = update else {
        panic!("expected tool_call_update");
    };
    assert_eq!(update.status, Some(ToolCallStatus::Unknown));
}

#[test]
fn plan_and_mode_updates_parse() {
    let plan: SessionUpdate = serde_json::from_value(json!({
        "sessionUpdate": "plan",
        "entries": [{ "content": "write tests", "priority": "high", "status": "pending" }],
    }))
    .unwrap();
    assert_eq!(plan.kind(), "plan");

    let mode: SessionUpdate = serde_json::from_value(json!({
        "sessionUpdate": "current_mode_update",
        "currentModeId": "plan",
    }))
    .unwrap();
    assert!(matches!(mode, SessionUpdate::CurrentModeUpdate(ref m) if m.current_mode_id == "plan"));
}

/// Update kinds this client does not model are kept rather than rejected.
#[test]
fn unknown_update_kind_is_preserved() {
    let raw = json!({ "sessionUpdate": "usage_update", "used": 42 });
    let update: SessionUpdate = serde_json::from_value(raw.clone()).unwrap();

    assert_eq!(update.kind(), "usage_update");
    assert_eq!(
        update,
        SessionUpdate::Unknown {
            kind: "usage_update".into(),
            raw,
        }
    );
}

#[test]
fn missing_discriminator_is_an_error() {
    let result = serde_json::from_value::<SessionUpdate>(json!({ "content": {} }));
    assert!(result.is_err());
}

/// A known kind whose payload does not fit its typed shape is passed
/// through untyped rather than rejected.
#[test]
fn known_kind_with_bad_payload_is_kept_raw() {
    let raw = json!({
        "sessionUpdate": "tool_call",
        "toolCallId": "call-7",
        "title": null,
    });

    let update: SessionUpdate = serde_json::from_value(raw.clone()).unwrap();

    assert_eq!(update.kind(), "tool_call");
    assert_eq!(
        update,
        SessionUpdate::Unknown {
            kind: "tool_call".into(),
            raw,
        }
    );
}

// ── Content ─────────────────────────────────────────────────────────────────

#[test]
fn unknown_content_block_type_is_unsupported() {
    let block: ContentBlock = serde_json::from_value(json!({ "type": "hologram" })).unwrap();
    assert_eq!(block, ContentBlock::Unsupported);
    assert_eq!(block.as_text(), None);
}

#[test]
fn text_block_serialises_with_type_tag() {
    let value = serde_json::to_value(ContentBlock::text("hi")).unwrap();
    assert_eq!(value, json!({ "type": "text", "text": "hi" }));
}

// ── Handshake and session ───────────────────────────────────────────────────

#[test]
fn client_capabilities_serialise_camel_case() {
    let value = serde_json::to_value(ClientCapabilities::all()).unwrap();
    assert_eq!(
        value,
        json!({ "fs": { "readTextFile": true, "writeTextFile": true }, "terminal": true })
    );
}

#[test]
fn initialize_response_tolerates_missing_fields() {
    let resp: InitializeResponse = serde_json::from_value(json!({ "protocolVersion": 1 })).unwrap();
    assert_eq!(resp.protocol_version, 1);
    assert!(resp.auth_methods.is_empty());
    assert!(resp.agent_info.is_none());
}

#[test]
fn new_session_response_reads_modes_and_models() {
    let resp: NewSessionResponse = serde_json::from_value(json!({
        "sessionId": "abc",
        "modes": { "currentModeId": "default", "availableModes": [{ "id": "default", "name": "Default" }] },
        "models": { "currentModelId": "m1", "availableModels": [{ "modelId": "m1", "name": "M1" }] },
    }))
    .unwrap();

    assert_eq!(resp.session_id, "abc");
    assert_eq!(resp.modes.unwrap().available_modes.len(), 1);
    assert_eq!(resp.models.unwrap().current_model_id, "m1");
}

#[test]
fn prompt_response_reads_stop_reason_and_usage() {
    let resp: PromptResponse = serde_json::from_value(json!({
        "stopReason": "end_turn",
        "usage": { "inputTokens": 10, "cachedTokens": 3 },
    }))
    .unwrap();

    assert_eq!(resp.stop_reason, "end_turn");
    let usage = resp.usage.unwrap();
    assert_eq!(usage.input_tokens, Some(10));
    assert_eq!(usage.extra.get("cachedTokens"), Some(&json!(3)));
}

// ── Permissions and terminals ───────────────────────────────────────────────

#[test]
fn permission_request_exposes_tool_title() {
    let req: RequestPermissionRequest = serde_json::from_value(json!({
        "sessionId": "s",
        "toolCall": { "toolCallId": "c", "title": "rm -rf build" },
        "options": [
            { "optionId": "a", "name": "Allow", "kind": "allow_always" },
            { "optionId": "x", "name": "Other", "kind": "ask_later" },
        ],
    }))
    .unwrap();

    assert_eq!(req.tool_title(), Some("rm -rf build"));
    assert!(req.options[0].kind.is_allow());
    assert_eq!(req.options[1].kind, PermissionOptionKind::Other);
}

#[test]
fn permission_outcome_wire_shape() {
    let selected = serde_json::to_value(PermissionOutcome::Selected {
        option_id: "allow".into(),
    })
    .unwrap();
    assert_eq!(selected, json!({ "outcome": "selected", "optionId": "allow" }));

    let cancelled = serde_json::to_value(PermissionOutcome::Cancelled).unwrap();
    assert_eq!(cancelled, json!({ "outcome": "cancelled" }));
}

#[test]
fn terminal_output_omits_exit_status_while_running() {
    let value = serde_json::to_value(TerminalOutputResponse {
        output: "partial".into(),
        truncated: false,
        exit_status: None,
    })
    .unwrap();
    assert_eq!(value, json!({ "output": "partial", "truncated": false }));
}
