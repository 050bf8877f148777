//! Socket service for the stamp estimation pipeline.
//!
//! Exposes the length-prefixed framing codec and the Unix socket server
//! that drives the estimation pipeline; the `estimator` binary wires
//! them to the configured storage backend and execution engine.

/// Length-prefixed message framing over a stream transport.
pub mod framing;
/// The Unix socket listener and per-connection request loop.
pub mod server;
