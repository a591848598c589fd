//! Run-orchestration engine and HTTP/WebSocket surface for preflight.
//!
//! The server discovers tests from a project plugin, executes them against
//! the user's agent on a bounded worker pool, judges responses through the
//! validator, persists per-test history, broadcasts live job state, and
//! relays streaming chat sessions. Embedders construct a
//! [`state::ProjectBundle`] with their collaborators and serve
//! [`router::build_router`].

pub mod chat;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod handlers;
pub mod jobs;
pub mod pipeline;
pub mod router;
pub mod schema;
pub mod state;
pub mod streaming;
pub mod tooling;
pub mod validator;

#[cfg(test)]
pub(crate) mod testutil;
