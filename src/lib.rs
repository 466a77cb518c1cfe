//! Purpose: Client-side SSE stream validator for the local repository service.
//! Exports: `api` (stable surface), `core` (decoder, parser, validators, session), `config`.
//! Role: Library backing the `ds-sse-validate` binary and the integration tests.
//! Invariants: Core modules take explicit inputs (readers, clocks, budgets) over hidden state.
pub mod api;
pub mod config;
pub mod core;
