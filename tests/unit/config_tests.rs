//! Unit tests for configuration parsing and validation.

use std::io::Write;

use agent_link::config::{AutoApprove, DEFAULT_KILL_GRACE_SECONDS, DEFAULT_TERMINAL_OUTPUT_BYTE_LIMIT};
use agent_link::{AppError, GlobalConfig};

fn sample_toml(cwd: &str) -> String {
    format!(
        r#"
cwd = '{cwd}'
auto_approve = "allow_all"
use_login_shell = false
terminal_output_byte_limit = 4096
kill_grace_seconds = 2

[[agents]]
name = "claude"
display_name = "Claude Code"
command = "npx"
args = ["@zed-industries/claude-code-acp"]

[agents.env]
ACP_LOG = "debug"

[[agents]]
name = "gemini"
command = "gemini"
args = ["--experimental-acp"]
"#
    )
}

#[test]
fn parses_full_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GlobalConfig::from_toml_str(&sample_toml(&dir.path().display().to_string()))
        .expect("valid config");

    assert_eq!(config.auto_approve, AutoApprove::AllowAll);
    assert!(!config.use_login_shell);
    assert_eq!(config.terminal_output_byte_limit, 4096);
    assert_eq!(config.kill_grace().as_secs(), 2);
    assert_eq!(config.cwd, dir.path().canonicalize().unwrap());

    let claude = config.agent("claude").expect("claude configured");
    assert_eq!(claude.label(), "Claude Code");
    assert_eq!(claude.env.get("ACP_LOG").map(String::as_str), Some("debug"));

    let gemini = config.agent("gemini").expect("gemini configured");
    assert_eq!(gemini.label(), "gemini", "label falls back to name");
    assert!(config.agent("codex").is_none());
}

#[test]
fn defaults_apply_when_omitted() {
    let config = GlobalConfig::from_toml_str(
        r#"
[[agents]]
name = "a"
command = "agent"
"#,
    )
    .expect("valid config");

    assert_eq!(config.auto_approve, AutoApprove::Off);
    assert!(config.use_login_shell);
    assert_eq!(config.terminal_output_byte_limit, DEFAULT_TERMINAL_OUTPUT_BYTE_LIMIT);
    assert_eq!(config.kill_grace_seconds, DEFAULT_KILL_GRACE_SECONDS);
    assert!(config.cwd.is_absolute());
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("agent-link.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(sample_toml(&dir.path().display().to_string()).as_bytes())
        .unwrap();

    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(config.agents.len(), 2);
}

#[test]
fn missing_file_is_config_error() {
    let err = GlobalConfig::load_from_path("/definitely/not/here.toml").expect_err("missing");
    assert!(matches!(err, AppError::Config(ref m) if m.contains("failed to read config")));
}

// ── Validation ──────────────────────────────────────────────────────────────

fn expect_config_error(raw: &str, needle: &str) {
    match GlobalConfig::from_toml_str(raw) {
        Err(AppError::Config(msg)) => assert!(msg.contains(needle), "{msg:?} lacks {needle:?}"),
        other => panic!("expected config error containing {needle:?}, got {other:?}"),
    }
}

#[test]
fn rejects_empty_agent_list() {
    expect_config_error("cwd = '.'", "at least one");
}

#[test]
fn rejects_duplicate_names() {
    expect_config_error(
        r#"
[[agents]]
name = "a"
command = "x"

[[agents]]
name = "a"
command = "y"
"#,
        "duplicate agent name",
    );
}

#[test]
fn rejects_blank_command() {
    expect_config_error(
        r#"
[[agents]]
name = "a"
command = "  "
"#,
        "empty command",
    );
}

#[test]
fn rejects_zero_output_limit() {
    expect_config_error(
        r#"
terminal_output_byte_limit = 0

[[agents]]
name = "a"
command = "x"
"#,
        "terminal_output_byte_limit",
    );
}

#[test]
fn rejects_unknown_auto_approve_policy() {
    expect_config_error(
        r#"
auto_approve = "allow_reads"

[[agents]]
name = "a"
command = "x"
"#,
        "invalid config",
    );
}

#[test]
fn rejects_nonexistent_cwd() {
    expect_config_error(
        r#"
cwd = "/no/such/dir/for/agent-link"

[[agents]]
name = "a"
command = "x"
"#,
        "cwd invalid",
    );
}
