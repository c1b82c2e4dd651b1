//! # reforge-agent
//!
//! Coding-agent execution port for reforge orchestration.
//!
//! All agent runtimes honor one contract: run against a workspace with a
//! prompt under a cancellation budget, and normalize whatever the runtime
//! streams into a single [`AgentRunResult`]. Cancellation is never an
//! error; a cancelled run reports `timeout` with the logs collected so
//! far.
//!
//! ## Key Pattern
//!
//! Streaming runtimes are consumed through the [`EventStream`]
//! abstraction: a consumer loop polls the next event while watching the
//! cancellation token, and invokes the producer's explicit `stop`
//! capability when cancelled. The producer guarantees its cleanup has run
//! before `stop` resolves, so a cancelled run never leaks the underlying
//! process or stream.

mod codex;
mod gemini;
mod port;
mod registry;
mod stream;

pub use codex::CodexAgent;
pub use gemini::GeminiAgent;
pub use port::{Agent, AgentRunOptions, AgentRunResult, RunStatus};
pub use registry::AgentRegistry;
pub use stream::{
    consume_stream, format_event, parse_event, EventStream, StreamOutcome, ThreadEvent, TurnError,
};
