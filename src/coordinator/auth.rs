//! Authentication sub-flow.
//!
//! Entered when `session/new` fails with the auth-required error. The user
//! picks one of the advertised methods, the client calls `authenticate`,
//! and `session/new` is retried exactly once.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tracing::{info, warn};

use crate::acp::connection::AcpConnection;
use crate::acp::schema::{AuthMethod, NewSessionResponse};
use crate::{AppError, Result};

/// Future returned by [`AuthMethodChooser`] methods.
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Asks the user how to authenticate.
pub trait AuthMethodChooser: Send + Sync {
    /// Confirm the only advertised method.
    fn confirm<'a>(&'a self, agent: &'a str, method: &'a AuthMethod) -> AuthFuture<'a, bool>;

    /// Pick one of several methods; `None` cancels.
    fn select<'a>(
        &'a self,
        agent: &'a str,
        methods: &'a [AuthMethod],
    ) -> AuthFuture<'a, Option<String>>;
}

/// Ask `chooser` for a method id.
///
/// # Errors
///
/// - [`AppError::NoAuthMethods`] when `methods` is empty.
/// - [`AppError::AuthCancelled`] when the user declines.
/// - [`AppError::AuthFailed`] when the chooser names a method that was not
///   offered.
pub async fn choose_method(
    chooser: &dyn AuthMethodChooser,
    agent: &str,
    methods: &[AuthMethod],
) -> Result<String> {
    match methods {
        [] => Err(AppError::NoAuthMethods(format!(
            "agent '{agent}' requires authentication but advertised no methods"
        ))),
        [only] => {
            if chooser.confirm(agent, only).await {
                Ok(only.id.clone())
            } else {
                Err(AppError::AuthCancelled(format!(
                    "authentication with '{}' declined",
                    only.name
                )))
            }
        }
        many => match chooser.select(agent, many).await {
            Some(id) if many.iter().any(|m| m.id == id) => Ok(id),
            Some(id) => Err(AppError::AuthFailed(format!(
                "unknown authentication method '{id}'"
            ))),
            None => Err(AppError::AuthCancelled(format!(
                "no authentication method chosen for '{agent}'"
            ))),
        },
    }
}

/// Authenticate with a user-chosen method and retry `session/new` once.
///
/// # Errors
///
/// Everything [`choose_method`] returns, plus [`AppError::AuthFailed`] if
/// `authenticate` fails or the retry still requires authentication.
pub async fn authenticate_and_retry(
    connection: &AcpConnection,
    chooser: &dyn AuthMethodChooser,
    agent: &str,
    cwd: &Path,
) -> Result<NewSessionResponse> {
    let method_id = choose_method(chooser, agent, &connection.info().auth_methods).await?;

    connection.authenticate(&method_id).await.map_err(|e| {
        warn!(agent, method_id, error = %e, "authentication rejected");
        AppError::AuthFailed(format!("authenticate with '{method_id}' failed: {e}"))
    })?;
    info!(agent, method_id, "authenticated, retrying session/new");

    match connection.new_session(cwd).await {
        Err(AppError::AuthRequired(msg)) => Err(AppError::AuthFailed(format!(
            "agent '{agent}' still requires authentication: {msg}"
        ))),
        other => other,
    }
}
