//! Launch-command construction for agents and terminals.

use std::path::Path;

use agent_link::process::shell::{
    agent_launch, resolve_login_shell, shell_escape, shell_flags, terminal_launch, LaunchSpec,
    Platform,
};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

// ── Escaping ────────────────────────────────────────────────────────────────

#[test]
fn escape_wraps_in_single_quotes() {
    assert_eq!(shell_escape("plain"), "'plain'");
    assert_eq!(shell_escape("two words"), "'two words'");
    assert_eq!(shell_escape(""), "''");
}

#[test]
fn escape_handles_embedded_quotes() {
    assert_eq!(shell_escape("a'b'c"), r"'a'\''b'\''c'");
    assert_eq!(shell_escape("$HOME; rm"), "'$HOME; rm'");
}

// ── Shell resolution ────────────────────────────────────────────────────────

#[test]
fn env_shell_wins() {
    assert_eq!(resolve_login_shell(Some("/usr/bin/fish"), |_| false), "/usr/bin/fish");
}

#[test]
fn blank_env_shell_falls_through_to_probe() {
    let shell = resolve_login_shell(Some("  "), |p: &Path| p == Path::new("/bin/bash"));
    assert_eq!(shell, "/bin/bash");
}

#[test]
fn probe_order_prefers_zsh() {
    let shell = resolve_login_shell(None, |_| true);
    assert_eq!(shell, "/bin/zsh");
}

#[test]
fn nothing_found_uses_bin_sh() {
    assert_eq!(resolve_login_shell(None, |_| false), "/bin/sh");
}

#[test]
fn sh_family_skips_login_flag() {
    assert_eq!(shell_flags("/bin/sh"), ["-c"]);
    assert_eq!(shell_flags("/usr/bin/dash"), ["-c"]);
    assert_eq!(shell_flags("fish"), ["-c"]);
    assert_eq!(shell_flags("/bin/zsh"), ["-l", "-c"]);
    assert_eq!(shell_flags("/usr/local/bin/bash"), ["-l", "-c"]);
}

// ── Agent launch ────────────────────────────────────────────────────────────

#[test]
fn posix_agent_runs_through_login_shell_with_exec() {
    let spec = agent_launch(
        Platform::Posix,
        "npx",
        &args(&["@zed-industries/claude-code-acp", "--flag=it's"]),
        true,
        Some("/bin/bash"),
    );

    assert_eq!(
        spec,
        LaunchSpec {
            program: "/bin/bash".into(),
            args: args(&[
                "-l",
                "-c",
                r"exec 'npx' '@zed-industries/claude-code-acp' '--flag=it'\''s'",
            ]),
        }
    );
}

#[test]
fn windows_agent_runs_through_cmd() {
    let spec = agent_launch(
        Platform::Windows,
        "npx",
        &args(&["my agent", "--x"]),
        true,
        None,
    );

    assert_eq!(spec.program, "cmd.exe");
    assert_eq!(spec.args[..3], args(&["/d", "/s", "/c"])[..]);
    assert_eq!(spec.args[3], "\"npx \"my agent\" --x\"");
}

#[test]
fn login_shell_off_executes_directly() {
    for platform in [Platform::Posix, Platform::Windows] {
        let spec = agent_launch(platform, "/opt/agent", &args(&["--acp"]), false, Some("/bin/zsh"));
        assert_eq!(spec, LaunchSpec::direct("/opt/agent", &args(&["--acp"])));
    }
}

// ── Terminal launch ─────────────────────────────────────────────────────────

#[test]
fn terminal_with_args_is_direct() {
    let spec = terminal_launch(Platform::Posix, "cargo", &args(&["test", "--all"]));
    assert_eq!(spec, LaunchSpec::direct("cargo", &args(&["test", "--all"])));
}

#[test]
fn terminal_single_word_is_direct() {
    let spec = terminal_launch(Platform::Posix, "ls", &[]);
    assert_eq!(spec, LaunchSpec::direct("ls", &[]));
}

#[test]
fn terminal_command_line_goes_through_a_shell() {
    let posix = terminal_launch(Platform::Posix, "ls -la | wc -l", &[]);
    assert_eq!(posix.program, "/bin/sh");
    assert_eq!(posix.args, args(&["-c", "ls -la | wc -l"]));

    let windows = terminal_launch(Platform::Windows, "dir /b", &[]);
    assert_eq!(windows.program, "cmd.exe");
    assert_eq!(windows.args.last().map(String::as_str), Some("dir /b"));
}
