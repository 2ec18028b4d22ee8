//! `TerminalManager` driving real child processes.

use std::time::Duration;

use serde_json::json;

use agent_link::acp::schema::CreateTerminalRequest;
use agent_link::client::terminal::{OutputBuffer, TerminalManager, TerminalOptions};
use agent_link::AppError;

const TIMEOUT: Duration = Duration::from_secs(10);

fn manager(limit: usize) -> TerminalManager {
    TerminalManager::new(TerminalOptions {
        cwd: std::env::temp_dir(),
        output_byte_limit: limit,
        kill_grace: Duration::from_secs(2),
    })
}

fn request(raw: serde_json::Value) -> CreateTerminalRequest {
    serde_json::from_value(raw).expect("valid terminal/create params")
}

// ── Output buffer ───────────────────────────────────────────────────────────

#[test]
fn buffer_keeps_last_bytes_across_pushes() {
    let mut buf = OutputBuffer::new(10);
    buf.push(b"0123456789");
    assert!(!buf.is_truncated());

    buf.push(b"abcdefghijklmno");

    assert_eq!(buf.text(), "fghijklmno");
    assert!(buf.is_truncated());
    assert_eq!(buf.limit(), 10);
}

// ── Processes ───────────────────────────────────────────────────────────────

/// 25 bytes of output with a 10-byte cap keeps the last 10 and reports
/// truncation.
#[cfg(unix)]
#[tokio::test]
async fn output_is_capped_at_the_requested_limit() {
    let terminals = manager(1024);
    let id = terminals
        .create(request(json!({
            "command": "printf",
            "args": ["0123456789abcdefghijklmno"],
            "outputByteLimit": 10,
        })))
        .await
        .unwrap();

    let exit = tokio::time::timeout(TIMEOUT, terminals.wait_for_exit(&id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit.exit_code, Some(0));

    let output = terminals.output(&id).await.unwrap();
    assert_eq!(output.output, "fghijklmno");
    assert!(output.truncated);
    assert_eq!(output.exit_status, Some(exit));
}

#[cfg(unix)]
#[tokio::test]
async fn stdout_and_stderr_share_one_buffer() {
    let terminals = manager(1024);
    let id = terminals
        .create(request(json!({ "command": "echo out; echo err 1>&2" })))
        .await
        .unwrap();

    tokio::time::timeout(TIMEOUT, terminals.wait_for_exit(&id))
        .await
        .unwrap()
        .unwrap();

    let output = terminals.output(&id).await.unwrap().output;
    assert!(output.contains("out"), "{output:?}");
    assert!(output.contains("err"), "{output:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn exit_code_and_env_are_reported() {
    let terminals = manager(1024);
    let id = terminals
        .create(request(json!({
            "command": "sh",
            "args": ["-c", "printf %s \"$GREETING\"; exit 3"],
            "env": [{ "name": "GREETING", "value": "hi" }],
        })))
        .await
        .unwrap();

    let exit = tokio::time::timeout(TIMEOUT, terminals.wait_for_exit(&id))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit.exit_code, Some(3));
    assert_eq!(exit.signal, None);
    assert_eq!(terminals.output(&id).await.unwrap().output, "hi");
}

#[cfg(unix)]
#[tokio::test]
async fn cwd_defaults_and_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    let terminals = manager(1024);

    let id = terminals
        .create(request(json!({ "command": "pwd", "cwd": canonical })))
        .await
        .unwrap();
    tokio::time::timeout(TIMEOUT, terminals.wait_for_exit(&id))
        .await
        .unwrap()
        .unwrap();

    let output = terminals.output(&id).await.unwrap().output;
    assert_eq!(output.trim_end(), canonical.display().to_string());
}

#[cfg(unix)]
#[tokio::test]
async fn kill_terminates_but_keeps_output() {
    let terminals = manager(1024);
    let id = terminals
        .create(request(json!({ "command": "sleep", "args": ["30"] })))
        .await
        .unwrap();

    assert!(terminals.output(&id).await.unwrap().exit_status.is_none());

    terminals.kill(&id).await.unwrap();
    let exit = tokio::time::timeout(TIMEOUT, terminals.wait_for_exit(&id))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit.exit_code, None);
    assert_eq!(exit.signal.as_deref(), Some("SIGTERM"));
    assert!(terminals.output(&id).await.is_ok(), "killed terminals stay queryable");
}

#[cfg(unix)]
#[tokio::test]
async fn release_forgets_the_terminal() {
    let terminals = manager(1024);
    let id = terminals
        .create(request(json!({ "command": "sleep", "args": ["30"] })))
        .await
        .unwrap();
    assert_eq!(terminals.len().await, 1);

    terminals.release(&id).await.unwrap();

    assert!(terminals.is_empty().await);
    assert!(matches!(
        terminals.output(&id).await,
        Err(AppError::TerminalNotFound(_))
    ));
    assert!(matches!(
        terminals.release(&id).await,
        Err(AppError::TerminalNotFound(_))
    ));
}

#[tokio::test]
async fn unknown_program_is_a_spawn_error() {
    let terminals = manager(1024);

    let err = terminals
        .create(request(json!({ "command": "definitely-not-a-real-binary-5f2c" })))
        .await
        .expect_err("no such program");

    assert!(matches!(err, AppError::Spawn(_)), "got {err:?}");
    assert!(terminals.is_empty().await);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let terminals = manager(1024);

    assert!(matches!(
        terminals.wait_for_exit("term-nope").await,
        Err(AppError::TerminalNotFound(_))
    ));
    assert!(matches!(
        terminals.kill("term-nope").await,
        Err(AppError::TerminalNotFound(_))
    ));
}
