//! # statecode-encoding
//!
//! Relocatable binary encoding for hierarchical state charts.
//!
//! A compiled chart is a pair of immutable 32-bit word buffers plus an
//! interned string table:
//! - the *state table*: a flat, offset-addressed description of the state
//!   hierarchy, transitions and per-state instruction references
//! - the *instruction streams*: variable-size, self-sizing instruction
//!   records traversed front-to-back
//!
//! All structural references are word offsets, never addresses, so a
//! compiled program can be shared read-only between any number of running
//! machines and persisted as-is.
//!
//! This crate provides:
//! - Packed array and instruction record views (no decoding, no allocation)
//! - The state/transition table with load-time validation
//! - The builder API used by an offline compiler (and by tests)
//! - Blob persistence with CRC32C corruption detection

pub mod array;
pub mod blob;
pub mod builder;
pub mod error;
pub mod instruction;
pub mod program;
pub mod strings;
pub mod table;
mod words;

pub use array::{PackedArray, Param, WordItem};
pub use builder::{IfBranch, InstructionBuilder, SendSpec, StateSpec, TableBuilder, TransitionSpec};
pub use error::EncodingError;
pub use instruction::{Instruction, InstructionKind, StreamIter};
pub use program::Program;
pub use strings::StringPool;
pub use table::{Binding, DataModelKind, IndexArray, State, StateKind, StateTable, Transition, TransitionKind};

/// Handle to an interned string, resolved through the program's [`StringPool`].
pub type StringId = i32;

/// Handle to a compiled expression, resolved by the data-model collaborator.
pub type EvaluatorId = i32;

/// Word offset of an instruction stream inside the instruction buffer.
pub type ContainerId = i32;

/// Sentinel for any absent offset, index or id field.
pub const INVALID_INDEX: i32 = -1;

/// Absent string id.
pub const NO_STRING: StringId = INVALID_INDEX;

/// Absent evaluator id.
pub const NO_EVALUATOR: EvaluatorId = INVALID_INDEX;

/// Absent instruction stream reference.
pub const NO_INSTRUCTION: ContainerId = INVALID_INDEX;

/// Table format version produced and accepted by this implementation.
pub const FORMAT_VERSION: i32 = 1;

/// Word placed after the array pool; a cheap corruption check at load time.
pub const TERMINATOR: i32 = 0x00c0_ff33;
