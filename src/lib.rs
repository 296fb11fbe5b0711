//! # foundry-docs-agent
//!
//! A command-line sample that drives one agent on the Azure AI Foundry
//! Agent Service, wired to the Microsoft Learn MCP server for
//! documentation search.
//!
//! ## Flow
//!
//! ```text
//!   Config ──► AzureCliCredential ──► AgentsClient
//!                                        │
//!                   create agent (MCP tool attached)
//!                   create thread + user message
//!                   create run ──► poll ──► requires_action?
//!                                    │          │
//!                                    │   resolve approvals, resubmit
//!                                    ▼
//!                         completed | failed | cancelled
//! ```
//!
//! The run's state machine is owned by the service; this crate only
//! observes it and answers tool-approval requests. See [`runner`] for the
//! drive loop and [`assistant`] for the end-to-end call sequence.
//!
//! ## Modules
//! - `config`: environment-backed process configuration
//! - `credentials`: Azure CLI token acquisition
//! - `mcp`: MCP tool descriptors and approval modes
//! - `agents`: types and REST client for the agent service
//! - `runner`: run drive loop and approval policies
//! - `assistant`: the one-call `ask` flow used by the binary

pub mod agents;
pub mod assistant;
pub mod config;
pub mod credentials;
pub mod mcp;
pub mod runner;

pub use assistant::{AssistantReply, DocsAssistant};
pub use config::{Config, ConfigError};
