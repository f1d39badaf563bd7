//! A compiled program: table, instructions and strings as one shared unit.

use crate::error::EncodingError;
use crate::instruction::Instruction;
use crate::strings::StringPool;
use crate::table::{Binding, DataModelKind, StateTable};
use crate::{ContainerId, NO_INSTRUCTION};
use std::sync::Arc;

/// An immutable compiled state chart.
///
/// Construction validates the table and decodes every referenced
/// instruction container once; afterwards the program is read-only and
/// cheap to clone, so any number of concurrently running machines can
/// share one copy.
#[derive(Debug, Clone)]
pub struct Program {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    table: Vec<i32>,
    instructions: Vec<i32>,
    strings: StringPool,
    data_model: DataModelKind,
    binding: Binding,
}

impl Program {
    /// Validates and wraps a compiled table, instruction buffer and string
    /// pool.
    pub fn new(
        table: Vec<i32>,
        instructions: Vec<i32>,
        strings: StringPool,
    ) -> Result<Self, EncodingError> {
        let view = StateTable::parse(&table)?;
        let data_model = view.data_model();
        let binding = view.binding();

        // Decode-check every container the table references; a dangling
        // stream offset is a compiler bug surfaced here, not at runtime.
        let mut check = |container: ContainerId| -> Result<(), EncodingError> {
            if container != NO_INSTRUCTION {
                Instruction::decode(&instructions, container as usize)?;
            }
            Ok(())
        };
        check(view.initial_setup())?;
        for (_, state) in view.states() {
            check(state.init_instructions)?;
            check(state.entry_instructions)?;
            check(state.exit_instructions)?;
            check(state.done_data)?;
        }
        for (_, transition) in view.transitions() {
            check(transition.instructions)?;
        }

        Ok(Self {
            inner: Arc::new(Inner {
                table,
                instructions,
                strings,
                data_model,
                binding,
            }),
        })
    }

    /// The state/transition table.
    pub fn table(&self) -> StateTable<'_> {
        StateTable::from_validated(&self.inner.table, self.inner.data_model, self.inner.binding)
    }

    /// Raw table words.
    pub fn table_words(&self) -> &[i32] {
        &self.inner.table
    }

    /// Raw instruction buffer.
    pub fn instructions(&self) -> &[i32] {
        &self.inner.instructions
    }

    /// Decodes the instruction at `container`.
    pub fn instruction_at(&self, container: ContainerId) -> Result<Instruction<'_>, EncodingError> {
        if container < 0 {
            return Err(EncodingError::IndexOutOfRange {
                what: "container",
                index: container,
                count: self.inner.instructions.len() as i32,
            });
        }
        Instruction::decode(&self.inner.instructions, container as usize)
    }

    pub fn strings(&self) -> &StringPool {
        &self.inner.strings
    }

    /// Document name, when the compiler assigned one.
    pub fn name(&self) -> Option<&str> {
        self.inner.strings.get(self.table().name())
    }
}
