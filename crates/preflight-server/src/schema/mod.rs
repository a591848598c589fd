//! API schema types for request/response definitions.
//!
//! Each sub-module defines the request and response types for one API
//! domain. Core domain types (`Job`, `TestResult`, `Conversation`) serialize
//! directly and are not re-wrapped here.

pub mod chatting;
pub mod testing;
pub mod tooling;
