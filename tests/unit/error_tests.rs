//! Display formatting and conversions for `AppError`.

use agent_link::acp::protocol::RpcError;
use agent_link::AppError;

#[test]
fn display_prefixes_each_kind() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Spawn("enoent".into()), "spawn: enoent"),
        (AppError::Connection("connection closed".into()), "connection: connection closed"),
        (AppError::Acp("line too long".into()), "acp: line too long"),
        (AppError::AuthRequired("x".into()), "auth required: x"),
        (AppError::NoAuthMethods("x".into()), "no auth methods: x"),
        (AppError::AuthCancelled("x".into()), "auth cancelled: x"),
        (AppError::AuthFailed("x".into()), "auth failed: x"),
        (AppError::SessionNotFound("s-1".into()), "session not found: s-1"),
        (AppError::TerminalNotFound("t-1".into()), "terminal not found: t-1"),
        (AppError::Io("disk".into()), "io: disk"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn rpc_display_includes_code() {
    let err = AppError::Rpc(RpcError::new(-32603, "boom"));
    assert_eq!(err.to_string(), "rpc: boom (code -32603)");
}

#[test]
fn io_error_converts() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(ref m) if m.contains("pipe closed")));
}

#[test]
fn toml_error_converts_to_config() {
    let parse = toml::from_str::<toml::Value>("= nope").expect_err("invalid toml");
    let err: AppError = parse.into();
    assert!(matches!(err, AppError::Config(ref m) if m.starts_with("invalid config")));
}
