//! Guarded language-model subcalls.
//!
//! - [`SubcallBackend`] is the injected inference capability: prompt and
//!   chunk in, text and token counts out.
//! - [`SubcallGateway`] wraps a backend with the guard protocol and adds
//!   typed variants (`subcall_json`, `subcall_bool`, `subcall_choice`).
//! - [`OpenRouterBackend`] is the production backend.

pub mod backend;
pub mod gateway;
pub mod openrouter;
mod parse;

pub use backend::{FnBackend, RawCompletion, SubcallBackend};
pub use gateway::SubcallGateway;
pub use openrouter::OpenRouterBackend;
