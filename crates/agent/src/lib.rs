//! Conversational booking agent.
//!
//! A chat message flows through [`runtime::AgentRuntime`]: the caller's
//! [`session`] is loaded, [`conversation`] assembles the prompt, the [`llm`]
//! client is asked for an answer, and any requested [`tools`] run against the
//! clinic records with best-effort [`collaborators`] side effects. The loop
//! repeats until the model answers in plain text or the round cap is hit.
//!
//! The model never writes clinic records directly. Every booking change goes
//! through a typed tool handler that enforces slot and status rules.

pub mod collaborators;
pub mod conversation;
pub mod llm;
pub mod profile;
pub mod runtime;
pub mod session;
pub mod tools;

pub use conversation::ConversationAssembler;
pub use profile::{CallerProfile, ProfileResolver};
pub use runtime::{AgentError, AgentRuntime, ChatFailure, ChatOutcome, RuntimeSettings};
pub use session::{SessionLocks, SessionStore};
