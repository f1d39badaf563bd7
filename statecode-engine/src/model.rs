//! The data-model collaborator.
//!
//! Expressions never live inside the encoded buffer; every condition,
//! script, assignment and collection is an opaque [`EvaluatorId`] that the
//! compiler registered with the embedding's data model. The engine only
//! asks for results and side effects through this trait.

use crate::error::EngineError;
use serde_json::Value;
use statecode_encoding::EvaluatorId;

/// Evaluates compiled expressions against a live data model.
///
/// Evaluation failures are ordinary runtime conditions: the engine aborts
/// the current instruction stream and the machine keeps running.
pub trait DataModel {
    /// Evaluates `id` to a boolean (transition conditions, if branches).
    fn evaluate_to_bool(&mut self, id: EvaluatorId) -> Result<bool, EngineError>;

    /// Evaluates `id` to a string (dynamic send attributes, log messages).
    fn evaluate_to_string(&mut self, id: EvaluatorId) -> Result<String, EngineError>;

    /// Evaluates `id` to a value (param expressions, done-data).
    fn evaluate_to_value(&mut self, id: EvaluatorId) -> Result<Value, EngineError>;

    /// Evaluates `id` purely for side effect (scripts).
    fn evaluate_to_void(&mut self, id: EvaluatorId) -> Result<(), EngineError>;

    /// Evaluates `id` as a location assignment.
    fn evaluate_assignment(&mut self, id: EvaluatorId) -> Result<(), EngineError>;

    /// Evaluates `id` as a data-model initialization. Only invoked during
    /// initial data setup; the host's binding policy decides when that is.
    fn evaluate_initialization(&mut self, id: EvaluatorId) -> Result<(), EngineError>;

    /// Evaluates the collection expression of a foreach once, failing if
    /// it does not yield an iterable value.
    fn evaluate_foreach_collection(&mut self, id: EvaluatorId) -> Result<Vec<Value>, EngineError>;

    /// Binds the iteration (and optional index) variable of foreach `id`
    /// before one body run. Bindings must not leak across iterations
    /// except through explicit data-model side effects.
    fn bind_foreach_item(
        &mut self,
        id: EvaluatorId,
        item: &Value,
        index: usize,
    ) -> Result<(), EngineError>;

    /// Reads the data-model property `name` (send namelists, param
    /// locations).
    fn property_value(&mut self, name: &str) -> Result<Value, EngineError>;

    /// Writes `value` to the data-model location `location` (send id
    /// locations).
    fn set_property(&mut self, location: &str, value: Value) -> Result<(), EngineError>;

    /// Installs or clears the ambient data of the current `execute` call
    /// (typically the event being processed).
    fn set_ambient_data(&mut self, data: Option<Value>);
}
