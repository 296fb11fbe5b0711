//! Drives a run to a terminal state.
//!
//! The run's state machine lives on the service; this loop only observes
//! it: poll while the run is working, answer pending tool-approval requests
//! when it stops in `requires_action`, and map the terminal states onto
//! results. The number of approval round-trips is bounded so a run that
//! never stops asking cannot poll forever.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::agents::{AgentError, AgentsApi, McpApprovalRequest, Run, RunStatus, ToolApproval};

/// Decision for one pending tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

/// Decides pending MCP tool calls. Arguments are relayed as the model
/// produced them; the only choice is whether the call may execute.
#[async_trait]
pub trait ApprovalPolicy: Send + Sync {
    async fn decide(&self, request: &McpApprovalRequest) -> ApprovalDecision;
}

/// Approves every request. What the sample runs with.
pub struct ApproveAll;

#[async_trait]
impl ApprovalPolicy for ApproveAll {
    async fn decide(&self, _request: &McpApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approve
    }
}

/// Knobs for the drive loop.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Interval between status polls while the run is working.
    pub poll_interval: Duration,
    /// Upper bound on `requires_action` round-trips before the run is
    /// abandoned.
    pub max_approval_rounds: u32,
    /// Headers resubmitted with each approval, for authenticated MCP
    /// servers.
    pub approval_headers: Option<BTreeMap<String, String>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            max_approval_rounds: 8,
            approval_headers: None,
        }
    }
}

/// Poll a run until it reaches a terminal state, resolving approval
/// requests along the way.
///
/// Returns the completed run. Every other terminal state maps onto an
/// error: `failed` surfaces the service's `last_error`, and exceeding the
/// approval round bound cancels the run best-effort before giving up.
pub async fn drive_run<A>(
    api: &A,
    policy: &dyn ApprovalPolicy,
    run: Run,
    options: &RunOptions,
) -> Result<Run, AgentError>
where
    A: AgentsApi + ?Sized,
{
    let thread_id = run.thread_id.clone();
    let mut current = run;
    let mut rounds = 0u32;

    loop {
        match current.status {
            RunStatus::Completed => return Ok(current),
            RunStatus::Failed => {
                let (code, message) = match current.last_error {
                    Some(error) => (error.code, error.message),
                    None => (
                        "unknown".to_string(),
                        "run failed without error detail".to_string(),
                    ),
                };
                return Err(AgentError::RunFailed { code, message });
            }
            RunStatus::Cancelled => return Err(AgentError::RunCancelled),
            RunStatus::Expired => return Err(AgentError::RunExpired),
            RunStatus::RequiresAction => {
                rounds += 1;
                if rounds > options.max_approval_rounds {
                    if let Err(error) = api.cancel_run(&thread_id, &current.id).await {
                        tracing::warn!(
                            "failed to cancel abandoned run {}: {}",
                            current.id,
                            error
                        );
                    }
                    return Err(AgentError::ApprovalRoundsExceeded {
                        rounds: options.max_approval_rounds,
                    });
                }

                let pending = match current.pending_approvals() {
                    Some(pending) if !pending.is_empty() => pending,
                    _ => {
                        return Err(AgentError::Parse(
                            "run requires action but lists no pending tool approvals".to_string(),
                        ))
                    }
                };

                let mut approvals = Vec::with_capacity(pending.len());
                for request in pending {
                    let decision = policy.decide(request).await;
                    tracing::info!(
                        tool = %request.name,
                        server = %request.server_label,
                        ?decision,
                        round = rounds,
                        "resolving tool approval"
                    );
                    approvals.push(ToolApproval {
                        tool_call_id: request.id.clone(),
                        approve: decision == ApprovalDecision::Approve,
                        headers: options.approval_headers.clone(),
                    });
                }

                current = api
                    .submit_tool_approvals(&thread_id, &current.id, &approvals)
                    .await?;
            }
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => {
                tokio::time::sleep(options.poll_interval).await;
                current = api.get_run(&thread_id, &current.id).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{
        approval_request, failed_run, run_requiring, run_with_status, ScriptedApi,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records how often it was consulted; used to prove the approval path
    /// stays cold when the service never pauses.
    struct CountingPolicy {
        calls: AtomicUsize,
        decision: ApprovalDecision,
    }

    impl CountingPolicy {
        fn approving() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                decision: ApprovalDecision::Approve,
            }
        }

        fn rejecting() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                decision: ApprovalDecision::Reject,
            }
        }
    }

    #[async_trait]
    impl ApprovalPolicy for CountingPolicy {
        async fn decide(&self, _request: &McpApprovalRequest) -> ApprovalDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision
        }
    }

    fn options() -> RunOptions {
        RunOptions {
            poll_interval: Duration::from_millis(1),
            ..RunOptions::default()
        }
    }

    #[tokio::test]
    async fn run_without_pauses_never_consults_the_policy() {
        let api = ScriptedApi::new([
            run_with_status(RunStatus::InProgress),
            run_with_status(RunStatus::Completed),
        ]);
        let policy = CountingPolicy::approving();

        let initial = run_with_status(RunStatus::Queued);
        let run = drive_run(&api, &policy, initial, &options()).await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(policy.calls.load(Ordering::SeqCst), 0);
        assert!(api.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn n_pending_calls_get_exactly_n_approvals() {
        let api = ScriptedApi::new([
            run_with_status(RunStatus::InProgress),
            run_with_status(RunStatus::Completed),
        ]);
        let policy = CountingPolicy::approving();

        let initial = run_requiring(vec![
            approval_request("call_1", "microsoft_docs_search"),
            approval_request("call_2", "microsoft_docs_fetch"),
        ]);
        let run = drive_run(&api, &policy, initial, &options()).await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(policy.calls.load(Ordering::SeqCst), 2);

        let submitted = api.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].len(), 2);
        assert!(submitted[0].iter().all(|approval| approval.approve));
        assert_eq!(submitted[0][0].tool_call_id, "call_1");
        assert_eq!(submitted[0][1].tool_call_id, "call_2");
    }

    #[tokio::test]
    async fn rejection_is_relayed_not_swallowed() {
        let api = ScriptedApi::new([run_with_status(RunStatus::Completed)]);
        let policy = CountingPolicy::rejecting();

        let initial = run_requiring(vec![approval_request("call_1", "microsoft_docs_search")]);
        drive_run(&api, &policy, initial, &options()).await.unwrap();

        let submitted = api.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert!(!submitted[0][0].approve);
    }

    #[tokio::test]
    async fn approval_headers_ride_along_with_each_decision() {
        let api = ScriptedApi::new([run_with_status(RunStatus::Completed)]);
        let policy = ApproveAll;

        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer tok".to_string());
        let options = RunOptions {
            approval_headers: Some(headers.clone()),
            ..options()
        };

        let initial = run_requiring(vec![approval_request("call_1", "microsoft_docs_search")]);
        drive_run(&api, &policy, initial, &options).await.unwrap();

        let submitted = api.submitted.lock().unwrap();
        assert_eq!(submitted[0][0].headers.as_ref(), Some(&headers));
    }

    #[tokio::test]
    async fn a_run_that_never_stops_asking_is_abandoned() {
        // The queue repeats its last state, so every submission comes back
        // as another requires_action.
        let api = ScriptedApi::new([run_requiring(vec![approval_request(
            "call_2",
            "microsoft_docs_search",
        )])]);
        let policy = ApproveAll;

        let options = RunOptions {
            max_approval_rounds: 3,
            ..options()
        };
        let initial = run_requiring(vec![approval_request("call_1", "microsoft_docs_search")]);
        let error = drive_run(&api, &policy, initial, &options).await.unwrap_err();

        assert!(matches!(
            error,
            AgentError::ApprovalRoundsExceeded { rounds: 3 }
        ));
        assert_eq!(api.submitted.lock().unwrap().len(), 3);
        assert_eq!(api.cancelled.lock().unwrap().as_slice(), ["run_1"]);
    }

    #[tokio::test]
    async fn failed_run_surfaces_the_service_error() {
        let api = ScriptedApi::new([failed_run("rate_limit_exceeded", "quota exhausted")]);
        let policy = ApproveAll;

        let initial = run_with_status(RunStatus::Queued);
        let error = drive_run(&api, &policy, initial, &options()).await.unwrap_err();

        match error {
            AgentError::RunFailed { code, message } => {
                assert_eq!(code, "rate_limit_exceeded");
                assert_eq!(message, "quota exhausted");
            }
            other => panic!("expected RunFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_and_expired_map_to_their_own_errors() {
        let api = ScriptedApi::new([run_with_status(RunStatus::Cancelled)]);
        let error = drive_run(&api, &ApproveAll, run_with_status(RunStatus::Queued), &options())
            .await
            .unwrap_err();
        assert!(matches!(error, AgentError::RunCancelled));

        let api = ScriptedApi::new([run_with_status(RunStatus::Expired)]);
        let error = drive_run(&api, &ApproveAll, run_with_status(RunStatus::Queued), &options())
            .await
            .unwrap_err();
        assert!(matches!(error, AgentError::RunExpired));
    }

    #[tokio::test]
    async fn requires_action_without_payload_is_a_protocol_error() {
        let api = ScriptedApi::new([run_with_status(RunStatus::Completed)]);
        let initial = run_with_status(RunStatus::RequiresAction);
        let error = drive_run(&api, &ApproveAll, initial, &options()).await.unwrap_err();
        assert!(matches!(error, AgentError::Parse(_)));
    }
}
