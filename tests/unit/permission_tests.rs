//! Permission arbitration: FIFO ordering, one prompt at a time, and the
//! auto-approve policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use agent_link::acp::schema::{
    PermissionOption, PermissionOptionKind, PermissionOutcome, RequestPermissionRequest,
};
use agent_link::client::permission::{resolve, ChooserFuture, PermissionArbiter, PermissionChooser};
use agent_link::config::AutoApprove;
use agent_link::AppError;

fn request(title: &str, options: &[(&str, PermissionOptionKind)]) -> RequestPermissionRequest {
    RequestPermissionRequest {
        session_id: "s-1".into(),
        tool_call: json!({ "toolCallId": title, "title": title }),
        options: options
            .iter()
            .map(|(id, kind)| PermissionOption {
                option_id: (*id).to_owned(),
                name: (*id).to_owned(),
                kind: *kind,
            })
            .collect(),
    }
}

fn allow_reject(title: &str) -> RequestPermissionRequest {
    request(
        title,
        &[
            ("allow", PermissionOptionKind::AllowOnce),
            ("reject", PermissionOptionKind::RejectOnce),
        ],
    )
}

/// Answers with a fixed option and records the order it was asked in. The
/// first prompt is slow so later ones would overtake it if prompts ran
/// concurrently.
#[derive(Default)]
struct ScriptedChooser {
    answer: Option<String>,
    asked: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedChooser {
    fn answering(option_id: &str) -> Self {
        Self {
            answer: Some(option_id.to_owned()),
            ..Self::default()
        }
    }
}

impl PermissionChooser for ScriptedChooser {
    fn choose<'a>(&'a self, request: &'a RequestPermissionRequest) -> ChooserFuture<'a> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let first = {
                let mut asked = self.asked.lock().unwrap();
                asked.push(request.tool_title().unwrap_or_default().to_owned());
                asked.len() == 1
            };
            if first {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        })
    }
}

struct FailingChooser;

impl PermissionChooser for FailingChooser {
    fn choose<'a>(&'a self, _request: &'a RequestPermissionRequest) -> ChooserFuture<'a> {
        Box::pin(async { Err::<Option<String>, _>(AppError::Io("prompt window closed".into())) })
    }
}

struct PanickingChooser;

fn request_is_poisoned() -> bool {
    true
}

impl PermissionChooser for PanickingChooser {
    fn choose<'a>(&'a self, _request: &'a RequestPermissionRequest) -> ChooserFuture<'a> {
        Box::pin(async {
            if request_is_poisoned() {
                panic!("chooser blew up");
            }
            Ok::<Option<String>, AppError>(None)
        })
    }
}

// ── Queueing ────────────────────────────────────────────────────────────────

/// Three concurrent requests are presented one at a time, in call order.
#[tokio::test]
async fn concurrent_requests_resolve_in_fifo_order() {
    let chooser = Arc::new(ScriptedChooser::answering("allow"));
    let arbiter = PermissionArbiter::spawn(AutoApprove::Off, chooser.clone());

    let first = arbiter.request_permission(allow_reject("first"));
    let second = arbiter.request_permission(allow_reject("second"));
    let third = arbiter.request_permission(allow_reject("third"));

    // Poll in reverse so completion order cannot come from polling order.
    let (c, b, a) = tokio::join!(third, second, first);

    let selected = PermissionOutcome::Selected {
        option_id: "allow".into(),
    };
    assert_eq!(a, selected);
    assert_eq!(b, selected);
    assert_eq!(c, selected);
    assert_eq!(*chooser.asked.lock().unwrap(), vec!["first", "second", "third"]);
    assert_eq!(chooser.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dismissed_prompt_is_cancelled() {
    let chooser = Arc::new(ScriptedChooser::default());
    let arbiter = PermissionArbiter::spawn(AutoApprove::Off, chooser);

    let outcome = arbiter.request_permission(allow_reject("dismiss me")).await;

    assert_eq!(outcome, PermissionOutcome::Cancelled);
}

#[tokio::test]
async fn panicking_chooser_does_not_stop_the_queue() {
    let arbiter = PermissionArbiter::spawn(AutoApprove::Off, Arc::new(PanickingChooser));

    let first = arbiter.request_permission(allow_reject("one"));
    let second = arbiter.request_permission(allow_reject("two"));

    assert_eq!(first.await, PermissionOutcome::Cancelled);
    assert_eq!(second.await, PermissionOutcome::Cancelled);
}

// ── Resolution rules ────────────────────────────────────────────────────────

#[tokio::test]
async fn allow_all_picks_first_allow_option_without_asking() {
    let chooser = ScriptedChooser::answering("reject");
    let req = request(
        "edit",
        &[
            ("no", PermissionOptionKind::RejectOnce),
            ("always", PermissionOptionKind::AllowAlways),
            ("once", PermissionOptionKind::AllowOnce),
        ],
    );

    let outcome = resolve(AutoApprove::AllowAll, &chooser, &req).await;

    assert_eq!(
        outcome,
        PermissionOutcome::Selected {
            option_id: "always".into()
        }
    );
    assert!(chooser.asked.lock().unwrap().is_empty(), "chooser must not be asked");
}

/// With no allow option on offer, auto-approve falls through to the chooser.
#[tokio::test]
async fn allow_all_without_allow_option_asks_chooser() {
    let chooser = ScriptedChooser::answering("reject");
    let req = request("edit", &[("reject", PermissionOptionKind::RejectAlways)]);

    let outcome = resolve(AutoApprove::AllowAll, &chooser, &req).await;

    assert_eq!(
        outcome,
        PermissionOutcome::Selected {
            option_id: "reject".into()
        }
    );
    assert_eq!(chooser.asked.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn off_policy_always_asks() {
    let chooser = ScriptedChooser::answering("reject");

    let outcome = resolve(AutoApprove::Off, &chooser, &allow_reject("t")).await;

    assert_eq!(
        outcome,
        PermissionOutcome::Selected {
            option_id: "reject".into()
        }
    );
}

#[tokio::test]
async fn option_not_offered_is_cancelled() {
    let chooser = ScriptedChooser::answering("made-up");

    let outcome = resolve(AutoApprove::Off, &chooser, &allow_reject("t")).await;

    assert_eq!(outcome, PermissionOutcome::Cancelled);
}

#[tokio::test]
async fn chooser_error_is_cancelled() {
    let outcome = resolve(AutoApprove::Off, &FailingChooser, &allow_reject("t")).await;
    assert_eq!(outcome, PermissionOutcome::Cancelled);
}
