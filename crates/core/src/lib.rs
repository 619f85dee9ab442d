//! # KernelTune Core
//!
//! Domain types, traits, and error definitions for the KernelTune sysctl
//! tuning agent. This crate has **no framework dependencies**; it defines the
//! domain model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators of the tuning loop are defined as traits
//! here: the [`Provider`] (the language model gateway) and the [`Tool`]
//! (a named capability the model can invoke). Implementations live in their
//! respective crates, which keeps the loop testable with scripted stand-ins.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod phase;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentState;
pub use error::Error;
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use phase::{ImpactLevel, Phase, PhaseRules, PhaseTable, PhaseThresholds};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
