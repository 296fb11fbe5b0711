//! Scripted in-memory `AgentsApi` for tests.
//!
//! The run-state sequence is a queue: `create_run`, `get_run`, and
//! `submit_tool_approvals` each pop the next state, and the final state
//! repeats once the queue is exhausted.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    Agent, AgentError, AgentsApi, CreateAgentRequest, CreateRunRequest, McpApprovalRequest,
    MessageContent, MessageRole, RequiredAction, Run, RunError, RunStatus, RunStep, StepDetails,
    StepToolCall, SubmitToolApproval, TextBlock, Thread, ThreadMessage, ToolApproval,
};

pub(crate) struct ScriptedApi {
    states: Mutex<VecDeque<Run>>,
    last: Mutex<Option<Run>>,
    pub submitted: Mutex<Vec<Vec<ToolApproval>>>,
    pub cancelled: Mutex<Vec<String>>,
    pub deleted_agents: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<ThreadMessage>>,
    pub steps: Mutex<Vec<RunStep>>,
}

impl ScriptedApi {
    pub fn new(states: impl IntoIterator<Item = Run>) -> Self {
        Self {
            states: Mutex::new(states.into_iter().collect()),
            last: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            deleted_agents: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            steps: Mutex::new(Vec::new()),
        }
    }

    fn next_state(&self) -> Run {
        let mut queue = self.states.lock().unwrap();
        match queue.pop_front() {
            Some(run) => {
                *self.last.lock().unwrap() = Some(run.clone());
                run
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .expect("scripted state queue is empty"),
        }
    }
}

#[async_trait]
impl AgentsApi for ScriptedApi {
    async fn create_agent(&self, request: &CreateAgentRequest) -> Result<Agent, AgentError> {
        Ok(Agent {
            id: "agent_1".to_string(),
            name: Some(request.name.clone()),
            model: request.model.clone(),
        })
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), AgentError> {
        self.deleted_agents.lock().unwrap().push(agent_id.to_string());
        Ok(())
    }

    async fn create_thread(&self) -> Result<Thread, AgentError> {
        Ok(Thread {
            id: "thread_1".to_string(),
        })
    }

    async fn create_message(
        &self,
        _thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        Ok(ThreadMessage {
            id: "msg_user".to_string(),
            role,
            content: vec![text_block(content)],
        })
    }

    async fn create_run(
        &self,
        _thread_id: &str,
        _request: &CreateRunRequest,
    ) -> Result<Run, AgentError> {
        Ok(self.next_state())
    }

    async fn get_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AgentError> {
        Ok(self.next_state())
    }

    async fn submit_tool_approvals(
        &self,
        _thread_id: &str,
        _run_id: &str,
        approvals: &[ToolApproval],
    ) -> Result<Run, AgentError> {
        self.submitted.lock().unwrap().push(approvals.to_vec());
        Ok(self.next_state())
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        self.cancelled.lock().unwrap().push(run_id.to_string());
        Ok(run_with_status(RunStatus::Cancelled))
    }

    async fn list_run_steps(
        &self,
        _thread_id: &str,
        _run_id: &str,
    ) -> Result<Vec<RunStep>, AgentError> {
        Ok(self.steps.lock().unwrap().clone())
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        Ok(self.messages.lock().unwrap().clone())
    }
}

pub(crate) fn run_with_status(status: RunStatus) -> Run {
    Run {
        id: "run_1".to_string(),
        thread_id: "thread_1".to_string(),
        status,
        required_action: None,
        last_error: None,
    }
}

pub(crate) fn failed_run(code: &str, message: &str) -> Run {
    Run {
        last_error: Some(RunError {
            code: code.to_string(),
            message: message.to_string(),
        }),
        ..run_with_status(RunStatus::Failed)
    }
}

pub(crate) fn approval_request(id: &str, name: &str) -> McpApprovalRequest {
    McpApprovalRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments: "{\"query\": \"azure functions\"}".to_string(),
        server_label: "microsoft_learn".to_string(),
    }
}

pub(crate) fn run_requiring(requests: Vec<McpApprovalRequest>) -> Run {
    Run {
        required_action: Some(RequiredAction {
            kind: "submit_tool_approval".to_string(),
            submit_tool_approval: Some(SubmitToolApproval {
                tool_calls: requests,
            }),
        }),
        ..run_with_status(RunStatus::RequiresAction)
    }
}

pub(crate) fn assistant_message(text: &str) -> ThreadMessage {
    ThreadMessage {
        id: "msg_assistant".to_string(),
        role: MessageRole::Assistant,
        content: vec![text_block(text)],
    }
}

pub(crate) fn mcp_step(tool_name: &str) -> RunStep {
    RunStep {
        id: "step_1".to_string(),
        kind: "tool_calls".to_string(),
        status: "completed".to_string(),
        step_details: Some(StepDetails {
            kind: "tool_calls".to_string(),
            tool_calls: vec![StepToolCall {
                id: "call_1".to_string(),
                kind: "mcp".to_string(),
                name: Some(tool_name.to_string()),
                server_label: Some("microsoft_learn".to_string()),
            }],
        }),
    }
}

fn text_block(text: &str) -> MessageContent {
    MessageContent {
        kind: "text".to_string(),
        text: Some(TextBlock {
            value: text.to_string(),
        }),
    }
}
