//! Public facade crate for `aporia`.
//!
//! This crate contains no IO, document bindings, or LLM-specific logic.
//! It re-exports the backend-agnostic types/traits from `aporia-core`.

pub use aporia_core::*;
