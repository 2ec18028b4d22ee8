//! Permission prompts, one at a time.
//!
//! Agents may ask for several permissions concurrently, but the user can
//! only answer one prompt at a time. [`PermissionArbiter`] puts every
//! request on a FIFO queue at call time and a single worker resolves them
//! in that order, consulting the auto-approve policy first.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::acp::schema::{PermissionOutcome, RequestPermissionRequest};
use crate::config::AutoApprove;
use crate::Result;

/// Future returned by [`PermissionChooser::choose`].
pub type ChooserFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

/// Presents options to the user.
pub trait PermissionChooser: Send + Sync {
    /// Return the chosen `option_id`, or `None` if the prompt was dismissed.
    fn choose<'a>(&'a self, request: &'a RequestPermissionRequest) -> ChooserFuture<'a>;
}

struct Job {
    request: RequestPermissionRequest,
    reply: oneshot::Sender<PermissionOutcome>,
}

/// FIFO permission queue with a single resolving worker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PermissionArbiter {
    queue: mpsc::UnboundedSender<Job>,
}

impl PermissionArbiter {
    /// Start the worker task.
    pub fn spawn(policy: AutoApprove, chooser: Arc<dyn PermissionChooser>) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(policy, chooser, rx).instrument(info_span!("permission_arbiter")));
        Self { queue }
    }

    /// Queue `request` and return a future resolving to its outcome.
    ///
    /// The request takes its place in the queue when this method is called,
    /// not when the future is first polled.
    pub fn request_permission(
        &self,
        request: RequestPermissionRequest,
    ) -> impl Future<Output = PermissionOutcome> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let queued = self.queue.send(Job { request, reply }).is_ok();
        if !queued {
            warn!("permission worker is gone, cancelling request");
        }

        async move {
            if !queued {
                return PermissionOutcome::Cancelled;
            }
            rx.await.unwrap_or(PermissionOutcome::Cancelled)
        }
    }
}

async fn run_worker(
    policy: AutoApprove,
    chooser: Arc<dyn PermissionChooser>,
    mut rx: mpsc::UnboundedReceiver<Job>,
) {
    while let Some(job) = rx.recv().await {
        let outcome = resolve(policy, chooser.as_ref(), &job.request).await;
        if job.reply.send(outcome).is_err() {
            debug!("permission requester went away before the outcome was ready");
        }
    }
    debug!("permission worker stopped");
}

/// Resolve one request: auto-approve if the policy allows it, otherwise ask
/// `chooser`. Chooser failures and panics resolve to `Cancelled`.
pub async fn resolve(
    policy: AutoApprove,
    chooser: &dyn PermissionChooser,
    request: &RequestPermissionRequest,
) -> PermissionOutcome {
    if policy == AutoApprove::AllowAll {
        if let Some(option) = request.options.iter().find(|o| o.kind.is_allow()) {
            info!(
                session_id = %request.session_id,
                option_id = %option.option_id,
                tool = request.tool_title().unwrap_or_default(),
                "permission auto-approved"
            );
            return PermissionOutcome::Selected {
                option_id: option.option_id.clone(),
            };
        }
        debug!(session_id = %request.session_id, "no allow option offered, asking chooser");
    }

    let choice = AssertUnwindSafe(chooser.choose(request))
        .catch_unwind()
        .await;

    match choice {
        Ok(Ok(Some(option_id))) => {
            if request.options.iter().any(|o| o.option_id == option_id) {
                PermissionOutcome::Selected { option_id }
            } else {
                warn!(option_id, "chooser returned an option that was not offered");
                PermissionOutcome::Cancelled
            }
        }
        Ok(Ok(None)) => PermissionOutcome::Cancelled,
        Ok(Err(err)) => {
            warn!(%err, "permission chooser failed");
            PermissionOutcome::Cancelled
        }
        Err(_) => {
            warn!("permission chooser panicked");
            PermissionOutcome::Cancelled
        }
    }
}
