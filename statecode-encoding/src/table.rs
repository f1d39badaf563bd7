//! The state/transition table.
//!
//! Table blob layout (everything is a 32-bit word, offsets are word counts
//! from the start of the blob):
//!
//! ```text
//! +-----------------------+---------------------+--------------------------+
//! | header (14 words)     | states (11 each)    | transitions (6 each)     |
//! +-----------------------+---------------------+--------------------------+
//! | array pool            | terminator          |
//! | array_size words      | 1 word (0x00c0ff33) |
//! +-----------------------+---------------------+
//! ```
//!
//! The array pool holds self-length-prefixed int arrays (`pool[off]` is the
//! length, elements follow) shared by all child-state, transition, target,
//! event and service-id lists.
//!
//! [`StateTable::parse`] validates every kind code, index and pool
//! reference up front; record accessors are infallible reads afterwards,
//! and the table is never mutated once built.

use crate::error::EncodingError;
use crate::{ContainerId, EvaluatorId, StringId, FORMAT_VERSION, INVALID_INDEX, TERMINATOR};

/// Header length in words.
pub const HEADER_WORDS: usize = 14;

/// Encoded length of one [`State`] record.
pub const STATE_WORDS: usize = 11;

/// Encoded length of one [`Transition`] record.
pub const TRANSITION_WORDS: usize = 6;

const IDX_VERSION: usize = 0;
const IDX_NAME: usize = 1;
const IDX_DATA_MODEL: usize = 2;
const IDX_CHILD_STATES: usize = 3;
const IDX_INITIAL_TRANSITION: usize = 4;
const IDX_INITIAL_SETUP: usize = 5;
const IDX_BINDING: usize = 6;
const IDX_MAX_SERVICE_ID: usize = 7;
const IDX_STATE_OFFSET: usize = 8;
const IDX_STATE_COUNT: usize = 9;
const IDX_TRANSITION_OFFSET: usize = 10;
const IDX_TRANSITION_COUNT: usize = 11;
const IDX_ARRAY_OFFSET: usize = 12;
const IDX_ARRAY_SIZE: usize = 13;

/// Which expression language the document's data model uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DataModelKind {
    /// No data model: conditions and expressions are unavailable.
    Null = 0,
    /// Script-language data model, evaluated by the evaluator collaborator.
    Script = 1,
    /// Host-language data model, compiled into the embedding application.
    Host = 2,
}

impl TryFrom<i32> for DataModelKind {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, i32> {
        match value {
            0 => Ok(DataModelKind::Null),
            1 => Ok(DataModelKind::Script),
            2 => Ok(DataModelKind::Host),
            other => Err(other),
        }
    }
}

/// When data-model variables are initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Binding {
    /// All variables initialized at document load.
    Early = 0,
    /// Variables initialized on first entry of their declaring state.
    Late = 1,
}

impl TryFrom<i32> for Binding {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, i32> {
        match value {
            0 => Ok(Binding::Early),
            1 => Ok(Binding::Late),
            other => Err(other),
        }
    }
}

/// Kind of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StateKind {
    Normal = 0,
    Parallel = 1,
    Final = 2,
    ShallowHistory = 3,
    DeepHistory = 4,
}

impl TryFrom<i32> for StateKind {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, i32> {
        match value {
            0 => Ok(StateKind::Normal),
            1 => Ok(StateKind::Parallel),
            2 => Ok(StateKind::Final),
            3 => Ok(StateKind::ShallowHistory),
            4 => Ok(StateKind::DeepHistory),
            other => Err(other),
        }
    }
}

/// Kind of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TransitionKind {
    External = 0,
    Internal = 1,
}

impl TryFrom<i32> for TransitionKind {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, i32> {
        match value {
            0 => Ok(TransitionKind::External),
            1 => Ok(TransitionKind::Internal),
            other => Err(other),
        }
    }
}

/// A state record.
///
/// Indices are dense (`0..state_count`), so runtime configuration bitsets
/// can be addressed by them directly. Offset fields hold
/// [`INVALID_INDEX`] when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Name of the state (string id), or [`crate::NO_STRING`].
    pub name: StringId,
    /// Index of the parent state, [`INVALID_INDEX`] for top-level states.
    pub parent: i32,
    pub kind: StateKind,
    /// Index of the initial transition of a compound state.
    pub initial_transition: i32,
    /// Container id of the data-initialization instructions.
    pub init_instructions: ContainerId,
    /// Container id of the entry handler instructions.
    pub entry_instructions: ContainerId,
    /// Container id of the exit handler instructions.
    pub exit_instructions: ContainerId,
    /// Container id of the done-data instruction of a final state.
    pub done_data: ContainerId,
    /// Pool offset of the child state index list.
    pub child_states: i32,
    /// Pool offset of the outgoing transition index list.
    pub transitions: i32,
    /// Pool offset of the invoked-service factory id list.
    pub service_factory_ids: i32,
}

impl State {
    fn read(words: &[i32], base: usize) -> Result<Self, EncodingError> {
        let kind = StateKind::try_from(words[base + 2]).map_err(|code| {
            EncodingError::InvalidTable {
                reason: format!("unknown state kind {code}"),
            }
        })?;
        Ok(Self {
            name: words[base],
            parent: words[base + 1],
            kind,
            initial_transition: words[base + 3],
            init_instructions: words[base + 4],
            entry_instructions: words[base + 5],
            exit_instructions: words[base + 6],
            done_data: words[base + 7],
            child_states: words[base + 8],
            transitions: words[base + 9],
            service_factory_ids: words[base + 10],
        })
    }

    /// True if the state has no children.
    pub fn is_atomic(&self) -> bool {
        self.child_states == INVALID_INDEX
    }

    /// True for a normal state with children.
    pub fn is_compound(&self) -> bool {
        self.kind == StateKind::Normal && self.child_states != INVALID_INDEX
    }

    pub fn is_history(&self) -> bool {
        matches!(self.kind, StateKind::ShallowHistory | StateKind::DeepHistory)
    }

    pub fn is_parallel(&self) -> bool {
        self.kind == StateKind::Parallel
    }

    /// True for states whose parent is the document itself.
    pub fn is_top_level(&self) -> bool {
        self.parent == INVALID_INDEX
    }
}

/// A transition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Pool offset of the event-name string id list; [`INVALID_INDEX`]
    /// for an eventless transition.
    pub events: i32,
    /// Condition evaluator, or [`crate::NO_EVALUATOR`].
    pub condition: EvaluatorId,
    pub kind: TransitionKind,
    /// Index of the source state, [`INVALID_INDEX`] for the document's
    /// initial transition.
    pub source: i32,
    /// Pool offset of the target state index list.
    pub targets: i32,
    /// Container id of the transition action instructions.
    pub instructions: ContainerId,
}

impl Transition {
    fn read(words: &[i32], base: usize) -> Result<Self, EncodingError> {
        let kind = TransitionKind::try_from(words[base + 2]).map_err(|code| {
            EncodingError::InvalidTable {
                reason: format!("unknown transition kind {code}"),
            }
        })?;
        Ok(Self {
            events: words[base],
            condition: words[base + 1],
            kind,
            source: words[base + 3],
            targets: words[base + 4],
            instructions: words[base + 5],
        })
    }

    /// True if the transition fires without an event.
    pub fn is_eventless(&self) -> bool {
        self.events == INVALID_INDEX
    }
}

/// A self-length-prefixed int array in the pool.
#[derive(Debug, Clone, Copy)]
pub struct IndexArray<'a> {
    words: &'a [i32],
}

impl<'a> IndexArray<'a> {
    pub fn len(&self) -> i32 {
        self.words[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at(&self, index: i32) -> Result<i32, EncodingError> {
        if index < 0 || index >= self.len() {
            return Err(EncodingError::IndexOutOfRange {
                what: "index array",
                index,
                count: self.len(),
            });
        }
        Ok(self.words[index as usize + 1])
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + 'a {
        let words = self.words;
        words[1..].iter().copied()
    }
}

/// Read-only view of a validated table blob.
#[derive(Debug, Clone, Copy)]
pub struct StateTable<'a> {
    words: &'a [i32],
    data_model: DataModelKind,
    binding: Binding,
}

impl<'a> StateTable<'a> {
    /// Parses and fully validates a table blob.
    ///
    /// Validation covers the header, the terminator word, every state and
    /// transition record, and every pool reference, so that accessors and
    /// the execution engine can trust the table afterwards.
    pub fn parse(words: &'a [i32]) -> Result<Self, EncodingError> {
        if words.len() < HEADER_WORDS {
            return Err(EncodingError::InvalidTable {
                reason: format!("blob is {} words, header needs {}", words.len(), HEADER_WORDS),
            });
        }

        let version = words[IDX_VERSION];
        if version != FORMAT_VERSION {
            return Err(EncodingError::UnsupportedVersion(version));
        }

        let data_model = DataModelKind::try_from(words[IDX_DATA_MODEL]).map_err(|code| {
            EncodingError::InvalidTable {
                reason: format!("unknown data model kind {code}"),
            }
        })?;
        let binding = Binding::try_from(words[IDX_BINDING]).map_err(|code| {
            EncodingError::InvalidTable {
                reason: format!("unknown binding mode {code}"),
            }
        })?;

        let table = Self {
            words,
            data_model,
            binding,
        };
        table.validate()?;
        Ok(table)
    }

    pub(crate) fn from_validated(
        words: &'a [i32],
        data_model: DataModelKind,
        binding: Binding,
    ) -> Self {
        Self {
            words,
            data_model,
            binding,
        }
    }

    fn validate(&self) -> Result<(), EncodingError> {
        let len = self.words.len();
        let section = |offset: i32, count: i32, width: usize, what: &str| {
            if offset < 0 || count < 0 {
                return Err(EncodingError::InvalidTable {
                    reason: format!("negative {what} section ({offset}, {count})"),
                });
            }
            let end = offset as usize + count as usize * width;
            if end > len {
                return Err(EncodingError::InvalidTable {
                    reason: format!("{what} section ends at word {end}, blob is {len} words"),
                });
            }
            Ok(())
        };

        let state_count = self.state_count();
        let transition_count = self.transition_count();
        section(self.words[IDX_STATE_OFFSET], state_count, STATE_WORDS, "state")?;
        section(
            self.words[IDX_TRANSITION_OFFSET],
            transition_count,
            TRANSITION_WORDS,
            "transition",
        )?;
        section(self.words[IDX_ARRAY_OFFSET], self.array_size(), 1, "array pool")?;

        let terminator_at = self.words[IDX_ARRAY_OFFSET] as usize + self.array_size() as usize;
        if terminator_at >= len || self.words[terminator_at] != TERMINATOR {
            return Err(EncodingError::InvalidTable {
                reason: format!("missing terminator at word {terminator_at}"),
            });
        }

        self.check_pool_offset(self.child_states(), "document child states")?;
        self.check_index(self.initial_transition(), transition_count, "initial transition")?;

        for idx in 0..state_count {
            let state = self.state(idx)?;
            self.check_index(state.parent, state_count, "state parent")?;
            self.check_index(state.initial_transition, transition_count, "state initial transition")?;
            self.check_pool_offset(state.child_states, "state child list")?;
            self.check_pool_offset(state.transitions, "state transition list")?;
            self.check_pool_offset(state.service_factory_ids, "state service id list")?;
            if let Some(children) = self.array(state.child_states)? {
                for child in children.iter() {
                    self.check_index(child, state_count, "child state")?;
                }
            }
            if let Some(transitions) = self.array(state.transitions)? {
                for t in transitions.iter() {
                    self.check_index(t, transition_count, "state transition")?;
                }
            }
        }

        for idx in 0..transition_count {
            let transition = self.transition(idx)?;
            self.check_index(transition.source, state_count, "transition source")?;
            self.check_pool_offset(transition.events, "transition event list")?;
            self.check_pool_offset(transition.targets, "transition target list")?;
            if let Some(targets) = self.array(transition.targets)? {
                for target in targets.iter() {
                    self.check_index(target, state_count, "transition target")?;
                }
            }
        }

        Ok(())
    }

    fn check_index(&self, index: i32, count: i32, what: &str) -> Result<(), EncodingError> {
        if index != INVALID_INDEX && (index < 0 || index >= count) {
            return Err(EncodingError::InvalidTable {
                reason: format!("{what} index {index} out of range (count is {count})"),
            });
        }
        Ok(())
    }

    fn check_pool_offset(&self, offset: i32, what: &str) -> Result<(), EncodingError> {
        if offset == INVALID_INDEX {
            return Ok(());
        }
        let size = self.array_size();
        if offset < 0 || offset >= size {
            return Err(EncodingError::InvalidTable {
                reason: format!("{what} pool offset {offset} out of range (pool is {size} words)"),
            });
        }
        let base = self.words[IDX_ARRAY_OFFSET] as usize + offset as usize;
        let len = self.words[base];
        if len < 0 || offset as i64 + 1 + len as i64 > size as i64 {
            return Err(EncodingError::InvalidTable {
                reason: format!("{what} at pool offset {offset} has length {len}, pool is {size} words"),
            });
        }
        Ok(())
    }

    pub fn version(&self) -> i32 {
        self.words[IDX_VERSION]
    }

    /// Name of the compiled document, or [`crate::NO_STRING`].
    pub fn name(&self) -> StringId {
        self.words[IDX_NAME]
    }

    pub fn data_model(&self) -> DataModelKind {
        self.data_model
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Pool offset of the document's top-level child state list.
    pub fn child_states(&self) -> i32 {
        self.words[IDX_CHILD_STATES]
    }

    /// Index of the document's initial transition.
    pub fn initial_transition(&self) -> i32 {
        self.words[IDX_INITIAL_TRANSITION]
    }

    /// Container id of the document-level initialization instructions.
    pub fn initial_setup(&self) -> ContainerId {
        self.words[IDX_INITIAL_SETUP]
    }

    pub fn max_service_id(&self) -> i32 {
        self.words[IDX_MAX_SERVICE_ID]
    }

    pub fn state_count(&self) -> i32 {
        self.words[IDX_STATE_COUNT]
    }

    pub fn transition_count(&self) -> i32 {
        self.words[IDX_TRANSITION_COUNT]
    }

    fn array_size(&self) -> i32 {
        self.words[IDX_ARRAY_SIZE]
    }

    /// Returns state `idx`.
    pub fn state(&self, idx: i32) -> Result<State, EncodingError> {
        if idx < 0 || idx >= self.state_count() {
            return Err(EncodingError::IndexOutOfRange {
                what: "state",
                index: idx,
                count: self.state_count(),
            });
        }
        let base = self.words[IDX_STATE_OFFSET] as usize + idx as usize * STATE_WORDS;
        State::read(self.words, base)
    }

    /// Returns transition `idx`.
    pub fn transition(&self, idx: i32) -> Result<Transition, EncodingError> {
        if idx < 0 || idx >= self.transition_count() {
            return Err(EncodingError::IndexOutOfRange {
                what: "transition",
                index: idx,
                count: self.transition_count(),
            });
        }
        let base = self.words[IDX_TRANSITION_OFFSET] as usize + idx as usize * TRANSITION_WORDS;
        Transition::read(self.words, base)
    }

    /// Returns the pool array at `offset`, or `None` for [`INVALID_INDEX`].
    pub fn array(&self, offset: i32) -> Result<Option<IndexArray<'a>>, EncodingError> {
        if offset == INVALID_INDEX {
            return Ok(None);
        }
        let size = self.array_size();
        if offset < 0 || offset >= size {
            return Err(EncodingError::IndexOutOfRange {
                what: "array pool",
                index: offset,
                count: size,
            });
        }
        let base = self.words[IDX_ARRAY_OFFSET] as usize + offset as usize;
        let len = self.words[base];
        if len < 0 || offset as i64 + 1 + len as i64 > size as i64 {
            return Err(EncodingError::InvalidTable {
                reason: format!("pool array at offset {offset} has length {len}, pool is {size} words"),
            });
        }
        Ok(Some(IndexArray {
            words: &self.words[base..base + 1 + len as usize],
        }))
    }

    /// Iterates all states with their indices.
    pub fn states(&self) -> impl Iterator<Item = (i32, State)> + '_ {
        // Records were validated in parse, the reads cannot fail.
        (0..self.state_count()).filter_map(move |idx| self.state(idx).ok().map(|s| (idx, s)))
    }

    /// Iterates all transitions with their indices.
    pub fn transitions(&self) -> impl Iterator<Item = (i32, Transition)> + '_ {
        (0..self.transition_count()).filter_map(move |idx| self.transition(idx).ok().map(|t| (idx, t)))
    }
}
