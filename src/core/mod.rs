// Core modules: decoding, parsing, payload checks, session state, and errors.
pub mod error;
pub mod event;
pub mod frame;
pub mod session;
pub mod validate;
