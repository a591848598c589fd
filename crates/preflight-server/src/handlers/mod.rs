//! HTTP and WebSocket handlers.
//!
//! Handlers stay thin: parse the request, delegate to the engine component,
//! and serialize the response. No orchestration logic lives here.

pub mod chatting;
pub mod testing;
pub mod tooling;
