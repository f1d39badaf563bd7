//! # statecode
//!
//! Relocatable binary encoding for hierarchical state charts and the
//! engine that executes it.
//!
//! A compiler lowers a state-chart document once into an immutable,
//! offset-addressed word buffer; any number of machine instances then
//! interpret it concurrently without decoding or allocation. See
//! [`statecode_encoding`] for the format and [`statecode_engine`] for the
//! interpreter.

pub use statecode_encoding as encoding;
pub use statecode_engine as engine;

pub use statecode_encoding::{
    EncodingError, Instruction, InstructionKind, Program, StateTable, StringPool,
};
pub use statecode_engine::{
    DataModel, DelayedSends, EngineError, EventRouter, ExecutionEngine, SendMessage,
};
