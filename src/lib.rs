//! Turn reconstruction and interrupt/resume primitives for an agent chat
//! client.
//!
//! This crate owns the wire-to-state path for agent turns: SSE and batch
//! transport normalization, tool-call identity and lifecycle tracking,
//! conversation identity resolution, and the assembler state machine that
//! rebuilds one coherent turn from either shape. It intentionally contains no
//! rendering or persistence code.
//!
//! The interrupt/resume cycle is mediated by [`TurnSession`]: a turn that
//! raises an interrupt suspends until a [`Decision`] is submitted, and the
//! resumed continuation accumulates into the same turn.

pub mod assembler;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod identity;
pub mod interrupt;
pub mod payload;
pub mod registry;
pub mod retry;
pub mod session;
pub mod sse;
pub mod url;

pub use assembler::{Turn, TurnAssembler, TurnState, TurnUpdate};
pub use client::{AgentApiClient, CancellationSignal, TurnFeed, TurnTransport};
pub use config::AgentApiConfig;
pub use error::TurnError;
pub use events::{ToolCallDecl, TurnEvent};
pub use identity::ConversationIdResolver;
pub use interrupt::{Decision, InterruptConfig, InterruptPayload, InterruptRequest, ToolDecisionInput};
pub use payload::{BatchResponse, TurnRequest};
pub use registry::{DecisionEffect, ToolCallRecord, ToolCallRegistry, ToolCallStatus};
pub use session::{DecisionOutcome, TurnOutcome, TurnSession};
pub use sse::{SseParser, SseRecord};
pub use url::normalize_turns_url;
