//! Command-line construction for agent and terminal processes.
//!
//! GUI-launched hosts often inherit a minimal `PATH`, so on POSIX agents are
//! started through the user's login shell to pick up their profile. On
//! Windows the command goes through `cmd.exe` so `.cmd`/`.bat` shims (as
//! installed by npm) resolve.

use std::path::Path;

/// Login shells probed, in order, when `$SHELL` is unset.
pub const SHELL_CANDIDATES: &[&str] = &[
    "/bin/zsh",
    "/usr/bin/zsh",
    "/bin/bash",
    "/usr/bin/bash",
    "/usr/local/bin/bash",
    "/bin/sh",
];

/// Shells that are invoked without the `-l` flag.
const NON_LOGIN_SHELLS: &[&str] = &["sh", "dash", "fish"];

/// Target platform family for command construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `cmd.exe` wrapping.
    Windows,
    /// Login-shell wrapping.
    Posix,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// A resolved program and argument vector, ready for `Command::new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
}

impl LaunchSpec {
    /// Execute `program` directly.
    pub fn direct(program: impl Into<String>, args: &[String]) -> Self {
        Self {
            program: program.into(),
            args: args.to_vec(),
        }
    }
}

/// Single-quote a word for a POSIX shell.
///
/// ```
/// use agent_link::process::shell::shell_escape;
/// assert_eq!(shell_escape("it's"), r"'it'\''s'");
/// ```
#[must_use]
pub fn shell_escape(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Pick the user's shell: `$SHELL` if set, else the first existing entry of
/// [`SHELL_CANDIDATES`], else `/bin/sh`.
pub fn resolve_login_shell(env_shell: Option<&str>, exists: impl Fn(&Path) -> bool) -> String {
    if let Some(shell) = env_shell.map(str::trim).filter(|s| !s.is_empty()) {
        return shell.to_owned();
    }
    SHELL_CANDIDATES
        .iter()
        .find(|candidate| exists(Path::new(candidate)))
        .map_or_else(|| "/bin/sh".to_owned(), |s| (*s).to_owned())
}

/// Flags placed before the command string for `shell`.
#[must_use]
pub fn shell_flags(shell: &str) -> &'static [&'static str] {
    let name = Path::new(shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(shell);
    if NON_LOGIN_SHELLS.contains(&name) {
        &["-c"]
    } else {
        &["-l", "-c"]
    }
}

/// Build the launch for an agent process.
///
/// With `use_login_shell` off the command is executed directly on every
/// platform.
#[must_use]
pub fn agent_launch(
    platform: Platform,
    command: &str,
    args: &[String],
    use_login_shell: bool,
    env_shell: Option<&str>,
) -> LaunchSpec {
    if !use_login_shell {
        return LaunchSpec::direct(command, args);
    }

    match platform {
        Platform::Windows => {
            let line = std::iter::once(command)
                .chain(args.iter().map(String::as_str))
                .map(windows_quote)
                .collect::<Vec<_>>()
                .join(" ");
            LaunchSpec {
                program: "cmd.exe".into(),
                args: vec!["/d".into(), "/s".into(), "/c".into(), format!("\"{line}\"")],
            }
        }
        Platform::Posix => {
            let shell = resolve_login_shell(env_shell, Path::exists);
            let line = std::iter::once(command)
                .chain(args.iter().map(String::as_str))
                .map(shell_escape)
                .collect::<Vec<_>>()
                .join(" ");
            let mut shell_args: Vec<String> =
                shell_flags(&shell).iter().map(|f| (*f).to_owned()).collect();
            // `exec` so signals reach the agent rather than the shell.
            shell_args.push(format!("exec {line}"));
            LaunchSpec {
                program: shell,
                args: shell_args,
            }
        }
    }
}

/// Build the launch for an agent-requested terminal command.
///
/// A command with no arguments that contains whitespace is treated as a
/// shell line; anything else is executed directly.
#[must_use]
pub fn terminal_launch(platform: Platform, command: &str, args: &[String]) -> LaunchSpec {
    if !args.is_empty() || !command.trim().contains(char::is_whitespace) {
        return LaunchSpec::direct(command, args);
    }

    match platform {
        Platform::Windows => LaunchSpec {
            program: "cmd.exe".into(),
            args: vec!["/d".into(), "/s".into(), "/c".into(), command.to_owned()],
        },
        Platform::Posix => LaunchSpec {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), command.to_owned()],
        },
    }
}

fn windows_quote(word: &str) -> String {
    if word.is_empty() || word.contains([' ', '\t', '"']) {
        format!("\"{}\"", word.replace('"', "\\\""))
    } else {
        word.to_owned()
    }
}
