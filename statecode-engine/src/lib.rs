//! # statecode-engine
//!
//! Execution engine for compiled statecode programs.
//!
//! This crate provides:
//! - The [`ExecutionEngine`] interpreting instruction streams
//! - The [`DataModel`] trait for the expression-evaluator collaborator
//! - The [`EventRouter`] trait for the host state machine's event sinks
//! - [`DelayedSends`], a passive registry for pending delayed sends
//!
//! The engine executes one container at a time, synchronously. Everything
//! observable - raised events, sent messages, assignments, logs, done-data
//! - happens through the collaborator traits, so the host state machine
//! keeps full control over queues, timers and the data model.

pub mod engine;
pub mod error;
pub mod message;
pub mod model;
pub mod router;
pub mod scheduler;

pub use engine::ExecutionEngine;
pub use error::EngineError;
pub use message::{parse_delay, DoneDataPayload, SendMessage};
pub use model::DataModel;
pub use router::EventRouter;
pub use scheduler::{DelayedSends, PendingSend};
