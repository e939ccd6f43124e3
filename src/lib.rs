//! MIDI → keyboard bridge.
//!
//! The real-time path (`dispatch`, `message`, `mapping`, `resolver`, and the
//! producer half of `queue`) never allocates, blocks or logs. Key injection and
//! diagnostics happen on the worker thread in `inject`.

pub mod config;
pub mod dispatch;
pub mod inject;
pub mod jack_input;
pub mod keys;
pub mod mapping;
pub mod message;
pub mod midi;
pub mod queue;
pub mod resolver;
