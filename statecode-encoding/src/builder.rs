//! Writer API for encoded programs.
//!
//! An offline compiler lowers a parsed document into two word buffers: an
//! instruction buffer written with [`InstructionBuilder`] and a table blob
//! written with [`TableBuilder`]. Both enforce the structural invariants
//! the readers rely on: counts are patched back once a nested construct is
//! complete, If branch and block counts always match, and variable-length
//! tails are packed last.

use crate::array::{Param, WordItem};
use crate::instruction::InstructionKind;
use crate::table::{
    Binding, DataModelKind, StateKind, TransitionKind, HEADER_WORDS, STATE_WORDS, TRANSITION_WORDS,
};
use crate::{
    ContainerId, EvaluatorId, StringId, FORMAT_VERSION, INVALID_INDEX, NO_EVALUATOR,
    NO_INSTRUCTION, NO_STRING, TERMINATOR,
};

/// Attribute set of a `<send>` instruction.
///
/// Each attribute has a literal and a dynamic slot; populate at most one.
/// A bare [`SendSpec::default()`] leaves everything absent.
#[derive(Debug, Clone)]
pub struct SendSpec {
    pub instruction_location: StringId,
    pub event: StringId,
    pub eventexpr: EvaluatorId,
    pub type_id: StringId,
    pub typeexpr: EvaluatorId,
    pub target: StringId,
    pub targetexpr: EvaluatorId,
    pub id: StringId,
    pub id_location: StringId,
    pub delay: StringId,
    pub delayexpr: EvaluatorId,
    pub content: StringId,
    pub namelist: Vec<StringId>,
    pub params: Vec<Param>,
}

impl Default for SendSpec {
    fn default() -> Self {
        Self {
            instruction_location: NO_STRING,
            event: NO_STRING,
            eventexpr: NO_EVALUATOR,
            type_id: NO_STRING,
            typeexpr: NO_EVALUATOR,
            target: NO_STRING,
            targetexpr: NO_EVALUATOR,
            id: NO_STRING,
            id_location: NO_STRING,
            delay: NO_STRING,
            delayexpr: NO_EVALUATOR,
            content: NO_STRING,
            namelist: Vec::new(),
            params: Vec::new(),
        }
    }
}

/// One branch of an `if`: a condition and the block it guards.
///
/// A bare else branch uses [`NO_EVALUATOR`] as its condition and must be
/// the last branch.
pub struct IfBranch<'b> {
    pub condition: EvaluatorId,
    pub body: &'b mut dyn FnMut(&mut InstructionBuilder),
}

/// Appends instruction records to a word buffer.
///
/// Every method returns the container id of the record it wrote, so the
/// caller can store it in a state or transition field.
#[derive(Debug, Default)]
pub struct InstructionBuilder {
    words: Vec<i32>,
}

impl InstructionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next record will be written at.
    pub fn position(&self) -> ContainerId {
        self.words.len() as ContainerId
    }

    /// Consumes the builder, returning the instruction buffer.
    pub fn finish(self) -> Vec<i32> {
        self.words
    }

    /// Writes a sequence; `body` writes the nested instructions.
    pub fn sequence(&mut self, body: impl FnOnce(&mut Self)) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::Sequence as i32);
        self.words.push(0);
        body(self);
        self.words[start + 1] = (self.words.len() - start - 2) as i32;
        start as ContainerId
    }

    pub fn raise(&mut self, event: StringId) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::Raise as i32);
        self.words.push(event);
        start as ContainerId
    }

    pub fn log(&mut self, label: StringId, expr: EvaluatorId) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::Log as i32);
        self.words.push(label);
        self.words.push(expr);
        start as ContainerId
    }

    pub fn script(&mut self, expr: EvaluatorId) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::ScriptEval as i32);
        self.words.push(expr);
        start as ContainerId
    }

    pub fn assign(&mut self, expr: EvaluatorId) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::Assign as i32);
        self.words.push(expr);
        start as ContainerId
    }

    pub fn initialize(&mut self, expr: EvaluatorId) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::Initialize as i32);
        self.words.push(expr);
        start as ContainerId
    }

    pub fn cancel(&mut self, sendid: StringId, sendidexpr: EvaluatorId) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::Cancel as i32);
        self.words.push(sendid);
        self.words.push(sendidexpr);
        start as ContainerId
    }

    pub fn send(&mut self, spec: &SendSpec) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::Send as i32);
        self.words.push(spec.instruction_location);
        self.words.push(spec.event);
        self.words.push(spec.eventexpr);
        self.words.push(spec.type_id);
        self.words.push(spec.typeexpr);
        self.words.push(spec.target);
        self.words.push(spec.targetexpr);
        self.words.push(spec.id);
        self.words.push(spec.id_location);
        self.words.push(spec.delay);
        self.words.push(spec.delayexpr);
        self.words.push(spec.content);
        self.words.push(spec.namelist.len() as i32);
        self.words.extend_from_slice(&spec.namelist);
        self.words.push(spec.params.len() as i32);
        for param in &spec.params {
            param.write(&mut self.words);
        }
        start as ContainerId
    }

    pub fn done_data(
        &mut self,
        location: StringId,
        contents: StringId,
        expr: EvaluatorId,
        params: &[Param],
    ) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::DoneData as i32);
        self.words.push(location);
        self.words.push(contents);
        self.words.push(expr);
        self.words.push(params.len() as i32);
        for param in params {
            param.write(&mut self.words);
        }
        start as ContainerId
    }

    /// Writes an if with one block per branch.
    pub fn if_(&mut self, branches: &mut [IfBranch<'_>]) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::If as i32);
        self.words.push(branches.len() as i32);
        for branch in branches.iter() {
            self.words.push(branch.condition);
        }

        let blocks = self.words.len();
        self.words.push(InstructionKind::Sequences as i32);
        self.words.push(branches.len() as i32);
        self.words.push(0);
        for branch in branches.iter_mut() {
            let seq = self.words.len();
            self.words.push(InstructionKind::Sequence as i32);
            self.words.push(0);
            (branch.body)(self);
            self.words[seq + 1] = (self.words.len() - seq - 2) as i32;
        }
        self.words[blocks + 2] = (self.words.len() - blocks - 3) as i32;
        start as ContainerId
    }

    /// Writes a foreach; `body` writes the loop body sequence.
    pub fn foreach(&mut self, collection: EvaluatorId, body: impl FnOnce(&mut Self)) -> ContainerId {
        let start = self.words.len();
        self.words.push(InstructionKind::Foreach as i32);
        self.words.push(collection);
        self.sequence(body);
        start as ContainerId
    }
}

/// A state record under construction. Defaults to an atomic normal state
/// with every reference absent.
#[derive(Debug, Clone)]
pub struct StateSpec {
    pub name: StringId,
    pub parent: i32,
    pub kind: StateKind,
    pub initial_transition: i32,
    pub init_instructions: ContainerId,
    pub entry_instructions: ContainerId,
    pub exit_instructions: ContainerId,
    pub done_data: ContainerId,
    pub child_states: i32,
    pub transitions: i32,
    pub service_factory_ids: i32,
}

impl Default for StateSpec {
    fn default() -> Self {
        Self {
            name: NO_STRING,
            parent: INVALID_INDEX,
            kind: StateKind::Normal,
            initial_transition: INVALID_INDEX,
            init_instructions: NO_INSTRUCTION,
            entry_instructions: NO_INSTRUCTION,
            exit_instructions: NO_INSTRUCTION,
            done_data: NO_INSTRUCTION,
            child_states: INVALID_INDEX,
            transitions: INVALID_INDEX,
            service_factory_ids: INVALID_INDEX,
        }
    }
}

/// A transition record under construction. Defaults to an eventless,
/// unguarded, targetless external transition.
#[derive(Debug, Clone)]
pub struct TransitionSpec {
    pub events: i32,
    pub condition: EvaluatorId,
    pub kind: TransitionKind,
    pub source: i32,
    pub targets: i32,
    pub instructions: ContainerId,
}

impl Default for TransitionSpec {
    fn default() -> Self {
        Self {
            events: INVALID_INDEX,
            condition: NO_EVALUATOR,
            kind: TransitionKind::External,
            source: INVALID_INDEX,
            targets: INVALID_INDEX,
            instructions: NO_INSTRUCTION,
        }
    }
}

/// Builds a table blob.
#[derive(Debug)]
pub struct TableBuilder {
    name: StringId,
    data_model: DataModelKind,
    binding: Binding,
    child_states: i32,
    initial_transition: i32,
    initial_setup: ContainerId,
    max_service_id: i32,
    states: Vec<StateSpec>,
    transitions: Vec<TransitionSpec>,
    pool: Vec<i32>,
}

impl TableBuilder {
    pub fn new(name: StringId, data_model: DataModelKind, binding: Binding) -> Self {
        Self {
            name,
            data_model,
            binding,
            child_states: INVALID_INDEX,
            initial_transition: INVALID_INDEX,
            initial_setup: NO_INSTRUCTION,
            max_service_id: INVALID_INDEX,
            states: Vec::new(),
            transitions: Vec::new(),
            pool: Vec::new(),
        }
    }

    /// Sets the pool offset of the document's top-level child list.
    pub fn with_child_states(mut self, pool_offset: i32) -> Self {
        self.child_states = pool_offset;
        self
    }

    pub fn with_initial_transition(mut self, transition: i32) -> Self {
        self.initial_transition = transition;
        self
    }

    pub fn with_initial_setup(mut self, container: ContainerId) -> Self {
        self.initial_setup = container;
        self
    }

    pub fn with_max_service_id(mut self, id: i32) -> Self {
        self.max_service_id = id;
        self
    }

    /// Adds a state, returning its dense index.
    pub fn add_state(&mut self, spec: StateSpec) -> i32 {
        self.states.push(spec);
        (self.states.len() - 1) as i32
    }

    /// Adds a transition, returning its dense index.
    pub fn add_transition(&mut self, spec: TransitionSpec) -> i32 {
        self.transitions.push(spec);
        (self.transitions.len() - 1) as i32
    }

    /// Appends a length-prefixed array to the pool, returning its offset.
    pub fn add_array(&mut self, items: &[i32]) -> i32 {
        let offset = self.pool.len() as i32;
        self.pool.push(items.len() as i32);
        self.pool.extend_from_slice(items);
        offset
    }

    pub fn set_state_children(&mut self, state: i32, pool_offset: i32) {
        self.states[state as usize].child_states = pool_offset;
    }

    pub fn set_state_transitions(&mut self, state: i32, pool_offset: i32) {
        self.states[state as usize].transitions = pool_offset;
    }

    pub fn set_transition_events(&mut self, transition: i32, pool_offset: i32) {
        self.transitions[transition as usize].events = pool_offset;
    }

    pub fn set_transition_targets(&mut self, transition: i32, pool_offset: i32) {
        self.transitions[transition as usize].targets = pool_offset;
    }

    /// Assembles the table blob.
    pub fn build(self) -> Vec<i32> {
        let state_offset = HEADER_WORDS;
        let transition_offset = state_offset + self.states.len() * STATE_WORDS;
        let array_offset = transition_offset + self.transitions.len() * TRANSITION_WORDS;
        let total = array_offset + self.pool.len() + 1;

        let mut words = Vec::with_capacity(total);
        words.push(FORMAT_VERSION);
        words.push(self.name);
        words.push(self.data_model as i32);
        words.push(self.child_states);
        words.push(self.initial_transition);
        words.push(self.initial_setup);
        words.push(self.binding as i32);
        words.push(self.max_service_id);
        words.push(state_offset as i32);
        words.push(self.states.len() as i32);
        words.push(transition_offset as i32);
        words.push(self.transitions.len() as i32);
        words.push(array_offset as i32);
        words.push(self.pool.len() as i32);

        for state in &self.states {
            words.push(state.name);
            words.push(state.parent);
            words.push(state.kind as i32);
            words.push(state.initial_transition);
            words.push(state.init_instructions);
            words.push(state.entry_instructions);
            words.push(state.exit_instructions);
            words.push(state.done_data);
            words.push(state.child_states);
            words.push(state.transitions);
            words.push(state.service_factory_ids);
        }

        for transition in &self.transitions {
            words.push(transition.events);
            words.push(transition.condition);
            words.push(transition.kind as i32);
            words.push(transition.source);
            words.push(transition.targets);
            words.push(transition.instructions);
        }

        words.extend_from_slice(&self.pool);
        words.push(TERMINATOR);
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Instruction, InstructionKind, StreamIter};
    use proptest::prelude::*;

    #[test]
    fn test_flat_sequence_roundtrip() {
        let mut b = InstructionBuilder::new();
        let id = b.sequence(|b| {
            b.raise(1);
            b.log(2, 3);
            b.script(4);
            b.assign(5);
            b.initialize(6);
            b.cancel(7, NO_EVALUATOR);
        });
        assert_eq!(id, 0);
        let words = b.finish();

        let instr = Instruction::decode(&words, 0).unwrap();
        assert_eq!(instr.size(), words.len());

        let seq = match instr {
            Instruction::Sequence(s) => s,
            _ => panic!("expected Sequence"),
        };
        let kinds: Vec<_> = seq.body().map(|i| i.unwrap().kind()).collect();
        assert_eq!(
            kinds,
            vec![
                InstructionKind::Raise,
                InstructionKind::Log,
                InstructionKind::ScriptEval,
                InstructionKind::Assign,
                InstructionKind::Initialize,
                InstructionKind::Cancel,
            ]
        );
    }

    #[test]
    fn test_if_builder_counts_match() {
        let mut b = InstructionBuilder::new();
        b.if_(&mut [
            IfBranch {
                condition: 10,
                body: &mut |b| {
                    b.raise(1);
                },
            },
            IfBranch {
                condition: 11,
                body: &mut |b| {
                    b.raise(2);
                    b.raise(3);
                },
            },
            IfBranch {
                condition: NO_EVALUATOR,
                body: &mut |_| {},
            },
        ]);
        let words = b.finish();

        let if_instr = match Instruction::decode(&words, 0).unwrap() {
            Instruction::If(i) => i,
            _ => panic!("expected If"),
        };
        assert_eq!(if_instr.conditions().count(), 3);
        assert_eq!(if_instr.blocks().sequence_count(), 3);
        assert_eq!(if_instr.size(), words.len());
        assert_eq!(if_instr.blocks().at(1).unwrap().entry_count(), 4);
        assert_eq!(if_instr.blocks().at(2).unwrap().entry_count(), 0);
    }

    #[test]
    fn test_send_builder_layout() {
        let mut b = InstructionBuilder::new();
        b.send(&SendSpec {
            event: 1,
            target: 2,
            delay: 3,
            namelist: vec![4, 5],
            params: vec![Param {
                name: 6,
                expr: 7,
                location: NO_STRING,
            }],
            ..Default::default()
        });
        let words = b.finish();

        let send = match Instruction::decode(&words, 0).unwrap() {
            Instruction::Send(s) => s,
            _ => panic!("expected Send"),
        };
        assert_eq!(send.event(), 1);
        assert_eq!(send.eventexpr(), NO_EVALUATOR);
        assert_eq!(send.target(), 2);
        assert_eq!(send.delay(), 3);
        assert_eq!(send.namelist().count(), 2);
        assert_eq!(send.params().count(), 1);
        assert_eq!(send.size(), words.len());
    }

    #[test]
    fn test_nested_size_roundtrip() {
        // Sequence > If > Foreach > Send, the deepest nesting the format
        // uses in practice.
        let mut b = InstructionBuilder::new();
        b.sequence(|b| {
            b.if_(&mut [IfBranch {
                condition: 1,
                body: &mut |b| {
                    b.foreach(2, |b| {
                        b.send(&SendSpec {
                            event: 3,
                            ..Default::default()
                        });
                    });
                },
            }]);
            b.raise(4);
        });
        let words = b.finish();

        let instr = Instruction::decode(&words, 0).unwrap();
        assert_eq!(instr.size(), words.len());
    }

    #[test]
    fn test_table_builder_sections() {
        let mut b = TableBuilder::new(5, DataModelKind::Null, Binding::Late);
        b.add_state(StateSpec::default());
        b.add_state(StateSpec::default());
        let events = b.add_array(&[8, 9]);
        let t = b.add_transition(TransitionSpec {
            source: 0,
            ..Default::default()
        });
        b.set_transition_events(t, events);
        let words = b.build();

        assert_eq!(words.len(), HEADER_WORDS + 2 * STATE_WORDS + TRANSITION_WORDS + 3 + 1);
        assert_eq!(*words.last().unwrap(), TERMINATOR);
    }

    // Random instruction trees for the size round-trip property.

    #[derive(Debug, Clone)]
    enum Node {
        Raise,
        Log,
        Script,
        Assign,
        Initialize,
        Cancel,
        Send { names: usize, params: usize },
        DoneData { params: usize },
        If(Vec<Vec<Node>>),
        Foreach(Vec<Node>),
        Sequence(Vec<Node>),
    }

    fn node_strategy() -> impl Strategy<Value = Node> {
        let leaf = prop_oneof![
            Just(Node::Raise),
            Just(Node::Log),
            Just(Node::Script),
            Just(Node::Assign),
            Just(Node::Initialize),
            Just(Node::Cancel),
            (0usize..4, 0usize..4).prop_map(|(names, params)| Node::Send { names, params }),
            (0usize..4).prop_map(|params| Node::DoneData { params }),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(prop::collection::vec(inner.clone(), 0..3), 1..4)
                    .prop_map(Node::If),
                prop::collection::vec(inner.clone(), 0..3).prop_map(Node::Foreach),
                prop::collection::vec(inner, 0..4).prop_map(Node::Sequence),
            ]
        })
    }

    fn emit(b: &mut InstructionBuilder, node: &Node) {
        match node {
            Node::Raise => {
                b.raise(1);
            }
            Node::Log => {
                b.log(1, 2);
            }
            Node::Script => {
                b.script(1);
            }
            Node::Assign => {
                b.assign(1);
            }
            Node::Initialize => {
                b.initialize(1);
            }
            Node::Cancel => {
                b.cancel(1, NO_EVALUATOR);
            }
            Node::Send { names, params } => {
                b.send(&SendSpec {
                    event: 1,
                    namelist: vec![2; *names],
                    params: vec![
                        Param {
                            name: 3,
                            expr: 4,
                            location: NO_STRING
                        };
                        *params
                    ],
                    ..Default::default()
                });
            }
            Node::DoneData { params } => {
                b.done_data(
                    NO_STRING,
                    NO_STRING,
                    1,
                    &vec![
                        Param {
                            name: 3,
                            expr: 4,
                            location: NO_STRING
                        };
                        *params
                    ],
                );
            }
            Node::If(blocks) => {
                let mut bodies: Vec<Box<dyn FnMut(&mut InstructionBuilder)>> = blocks
                    .iter()
                    .map(|block| {
                        let block = block.clone();
                        Box::new(move |b: &mut InstructionBuilder| {
                            for child in &block {
                                emit(b, child);
                            }
                        }) as Box<dyn FnMut(&mut InstructionBuilder)>
                    })
                    .collect();
                let mut branches: Vec<IfBranch<'_>> = bodies
                    .iter_mut()
                    .map(|body| IfBranch {
                        condition: 1,
                        body: body.as_mut(),
                    })
                    .collect();
                b.if_(&mut branches);
            }
            Node::Foreach(body) => {
                b.foreach(1, |b| {
                    for child in body {
                        emit(b, child);
                    }
                });
            }
            Node::Sequence(body) => {
                b.sequence(|b| {
                    for child in body {
                        emit(b, child);
                    }
                });
            }
        }
    }

    // Walks every instruction recursively, asserting stream boundaries.
    fn walk(stream: StreamIter<'_>) -> usize {
        let mut count = 0;
        for item in stream {
            let instr = item.unwrap();
            count += 1;
            match instr {
                Instruction::Sequence(seq) => count += walk(seq.body()),
                Instruction::Sequences(blocks) => {
                    for seq in blocks.iter() {
                        count += walk(seq.unwrap().body());
                    }
                }
                Instruction::If(if_instr) => {
                    for seq in if_instr.blocks().iter() {
                        count += walk(seq.unwrap().body());
                    }
                }
                Instruction::Foreach(foreach) => count += walk(foreach.body().body()),
                _ => {}
            }
        }
        count
    }

    proptest! {
        #[test]
        fn prop_size_equals_traversed_words(nodes in prop::collection::vec(node_strategy(), 0..6)) {
            let mut b = InstructionBuilder::new();
            b.sequence(|b| {
                for node in &nodes {
                    emit(b, node);
                }
            });
            let words = b.finish();

            let instr = Instruction::decode(&words, 0).unwrap();
            prop_assert_eq!(instr.size(), words.len());

            let seq = match instr {
                Instruction::Sequence(s) => s,
                _ => unreachable!(),
            };
            walk(seq.body());
        }
    }
}
