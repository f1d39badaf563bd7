//! Instruction records and stream traversal.
//!
//! Every instruction starts with a tag word and knows its own encoded word
//! length, so a stream is traversed by repeatedly adding `size()`:
//!
//! ```text
//! +-----+--------~~--+-----+------~~-+-----+---~~-+
//! | tag | fields ... | tag | fields  | tag | ...  |
//! +-----+--------~~--+-----+------~~-+-----+---~~-+
//! ^ offset            ^ offset + size()
//! ```
//!
//! Variable-length payloads (packed arrays, nested sequences) sit after the
//! fixed fields of their record. Nested constructs (`If`, `Foreach`,
//! sequences of sequences) embed complete instruction records and are
//! traversed with the same rule.

use crate::array::{PackedArray, Param};
use crate::error::EncodingError;
use crate::words;
use crate::{EvaluatorId, StringId};

/// Tag identifying an instruction record. Always the first word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum InstructionKind {
    /// Ordered list of instructions.
    Sequence = 1,
    /// Ordered list of sequences (if/else blocks, transition action batches).
    Sequences = 2,
    /// Deliver or schedule an external event.
    Send = 3,
    /// Enqueue an internal event.
    Raise = 4,
    /// Log an evaluated expression under a label.
    Log = 5,
    /// Evaluate an expression for side effect only.
    ScriptEval = 6,
    /// Evaluate a location assignment.
    Assign = 7,
    /// Evaluate a data-model initialization.
    Initialize = 8,
    /// Conditional branch over sequences.
    If = 9,
    /// Iterate a body sequence over a collection.
    Foreach = 10,
    /// Cancel a pending delayed send.
    Cancel = 11,
    /// Assemble the done-data of a final state.
    DoneData = 12,
}

impl TryFrom<i32> for InstructionKind {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, i32> {
        match value {
            1 => Ok(InstructionKind::Sequence),
            2 => Ok(InstructionKind::Sequences),
            3 => Ok(InstructionKind::Send),
            4 => Ok(InstructionKind::Raise),
            5 => Ok(InstructionKind::Log),
            6 => Ok(InstructionKind::ScriptEval),
            7 => Ok(InstructionKind::Assign),
            8 => Ok(InstructionKind::Initialize),
            9 => Ok(InstructionKind::If),
            10 => Ok(InstructionKind::Foreach),
            11 => Ok(InstructionKind::Cancel),
            12 => Ok(InstructionKind::DoneData),
            other => Err(other),
        }
    }
}

/// A decoded instruction: a typed view into the shared word buffer.
///
/// Decoding validates that the complete record, including its
/// variable-length tail, lies within the buffer; accessors on the variant
/// views are cheap reads afterwards.
#[derive(Debug, Clone, Copy)]
pub enum Instruction<'a> {
    Sequence(Sequence<'a>),
    Sequences(Sequences<'a>),
    Send(Send<'a>),
    Raise(Raise<'a>),
    Log(Log<'a>),
    ScriptEval(ScriptEval<'a>),
    Assign(Assign<'a>),
    Initialize(Initialize<'a>),
    If(If<'a>),
    Foreach(Foreach<'a>),
    Cancel(Cancel<'a>),
    DoneData(DoneData<'a>),
}

impl<'a> Instruction<'a> {
    /// Decodes the instruction starting at word `offset`.
    pub fn decode(buf: &'a [i32], offset: usize) -> Result<Self, EncodingError> {
        let tag = words::word(buf, offset)?;
        let kind = InstructionKind::try_from(tag)
            .map_err(|tag| EncodingError::UnknownInstruction { tag, offset })?;
        match kind {
            InstructionKind::Sequence => Sequence::parse(buf, offset).map(Instruction::Sequence),
            InstructionKind::Sequences => Sequences::parse(buf, offset).map(Instruction::Sequences),
            InstructionKind::Send => Send::parse(buf, offset).map(Instruction::Send),
            InstructionKind::Raise => Raise::parse(buf, offset).map(Instruction::Raise),
            InstructionKind::Log => Log::parse(buf, offset).map(Instruction::Log),
            InstructionKind::ScriptEval => ScriptEval::parse(buf, offset).map(Instruction::ScriptEval),
            InstructionKind::Assign => Assign::parse(buf, offset).map(Instruction::Assign),
            InstructionKind::Initialize => Initialize::parse(buf, offset).map(Instruction::Initialize),
            InstructionKind::If => If::parse(buf, offset).map(Instruction::If),
            InstructionKind::Foreach => Foreach::parse(buf, offset).map(Instruction::Foreach),
            InstructionKind::Cancel => Cancel::parse(buf, offset).map(Instruction::Cancel),
            InstructionKind::DoneData => DoneData::parse(buf, offset).map(Instruction::DoneData),
        }
    }

    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Sequence(_) => InstructionKind::Sequence,
            Instruction::Sequences(_) => InstructionKind::Sequences,
            Instruction::Send(_) => InstructionKind::Send,
            Instruction::Raise(_) => InstructionKind::Raise,
            Instruction::Log(_) => InstructionKind::Log,
            Instruction::ScriptEval(_) => InstructionKind::ScriptEval,
            Instruction::Assign(_) => InstructionKind::Assign,
            Instruction::Initialize(_) => InstructionKind::Initialize,
            Instruction::If(_) => InstructionKind::If,
            Instruction::Foreach(_) => InstructionKind::Foreach,
            Instruction::Cancel(_) => InstructionKind::Cancel,
            Instruction::DoneData(_) => InstructionKind::DoneData,
        }
    }

    /// Word offset of this record in the buffer.
    pub fn offset(&self) -> usize {
        match self {
            Instruction::Sequence(i) => i.base,
            Instruction::Sequences(i) => i.base,
            Instruction::Send(i) => i.base,
            Instruction::Raise(i) => i.base,
            Instruction::Log(i) => i.base,
            Instruction::ScriptEval(i) => i.base,
            Instruction::Assign(i) => i.base,
            Instruction::Initialize(i) => i.base,
            Instruction::If(i) => i.base,
            Instruction::Foreach(i) => i.base,
            Instruction::Cancel(i) => i.base,
            Instruction::DoneData(i) => i.base,
        }
    }

    /// Total encoded word length; the only way to reach the next sibling.
    pub fn size(&self) -> usize {
        match self {
            Instruction::Sequence(i) => i.size(),
            Instruction::Sequences(i) => i.size(),
            Instruction::Send(i) => i.size(),
            Instruction::Raise(i) => i.size(),
            Instruction::Log(i) => i.size(),
            Instruction::ScriptEval(i) => i.size(),
            Instruction::Assign(i) => i.size(),
            Instruction::Initialize(i) => i.size(),
            Instruction::If(i) => i.size(),
            Instruction::Foreach(i) => i.size(),
            Instruction::Cancel(i) => i.size(),
            Instruction::DoneData(i) => i.size(),
        }
    }
}

/// `[tag, entry_count, body...]`
#[derive(Debug, Clone, Copy)]
pub struct Sequence<'a> {
    buf: &'a [i32],
    base: usize,
    entry_count: usize,
}

impl<'a> Sequence<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Sequence)?;
        let entry_count = words::count(buf, base + 1)? as usize;
        words::check_span(buf, base + 2, entry_count)?;
        Ok(Self {
            buf,
            base,
            entry_count,
        })
    }

    /// Word length of the nested instruction list.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn size(&self) -> usize {
        2 + self.entry_count
    }

    /// Lazily iterates the nested instructions.
    pub fn body(&self) -> StreamIter<'a> {
        StreamIter {
            buf: self.buf,
            pos: self.base + 2,
            end: self.base + 2 + self.entry_count,
        }
    }
}

/// `[tag, sequence_count, entry_count, sequences...]`
#[derive(Debug, Clone, Copy)]
pub struct Sequences<'a> {
    buf: &'a [i32],
    base: usize,
    sequence_count: i32,
    entry_count: usize,
}

impl<'a> Sequences<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Sequences)?;
        let sequence_count = words::count(buf, base + 1)?;
        let entry_count = words::count(buf, base + 2)? as usize;
        words::check_span(buf, base + 3, entry_count)?;
        Ok(Self {
            buf,
            base,
            sequence_count,
            entry_count,
        })
    }

    pub fn sequence_count(&self) -> i32 {
        self.sequence_count
    }

    pub fn size(&self) -> usize {
        3 + self.entry_count
    }

    /// Returns the nested sequence at `pos`, walking the preceding ones.
    pub fn at(&self, pos: i32) -> Result<Sequence<'a>, EncodingError> {
        if pos < 0 || pos >= self.sequence_count {
            return Err(EncodingError::IndexOutOfRange {
                what: "sequence",
                index: pos,
                count: self.sequence_count,
            });
        }
        let mut offset = self.base + 3;
        let mut seq = Sequence::parse(self.buf, offset)?;
        for _ in 0..pos {
            offset += seq.size();
            seq = Sequence::parse(self.buf, offset)?;
        }
        Ok(seq)
    }

    /// Iterates the nested sequences in order.
    pub fn iter(&self) -> SequencesIter<'a> {
        SequencesIter {
            buf: self.buf,
            pos: self.base + 3,
            end: self.base + 3 + self.entry_count,
            remaining: self.sequence_count,
        }
    }
}

/// Iterator over the sequences of a [`Sequences`] record.
pub struct SequencesIter<'a> {
    buf: &'a [i32],
    pos: usize,
    end: usize,
    remaining: i32,
}

impl<'a> Iterator for SequencesIter<'a> {
    type Item = Result<Sequence<'a>, EncodingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining <= 0 {
            return None;
        }
        self.remaining -= 1;
        match Sequence::parse(self.buf, self.pos) {
            Ok(seq) => {
                let next = self.pos + seq.size();
                if next > self.end {
                    self.remaining = 0;
                    return Some(Err(EncodingError::StreamOverrun {
                        offset: self.pos,
                        end: next,
                        limit: self.end,
                    }));
                }
                self.pos = next;
                Some(Ok(seq))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// `[tag, instruction_location, event, eventexpr, type, typeexpr, target,
/// targetexpr, id, id_location, delay, delayexpr, content,
/// namelist..., params...]`
///
/// Every attribute exists as a literal string id and, alternatively, as an
/// evaluator id computing it dynamically; the compiler populates at most
/// one of each pair.
#[derive(Debug, Clone, Copy)]
pub struct Send<'a> {
    buf: &'a [i32],
    base: usize,
    namelist: PackedArray<'a, StringId>,
    params: PackedArray<'a, Param>,
}

/// Fixed field count of a [`Send`] record, excluding its packed tails.
const SEND_FIXED_WORDS: usize = 13;

impl<'a> Send<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Send)?;
        words::check_span(buf, base, SEND_FIXED_WORDS)?;
        let namelist = PackedArray::parse(buf, base + SEND_FIXED_WORDS)?;
        let params = PackedArray::parse(buf, base + SEND_FIXED_WORDS + namelist.size())?;
        Ok(Self {
            buf,
            base,
            namelist,
            params,
        })
    }

    pub fn instruction_location(&self) -> StringId {
        self.buf[self.base + 1]
    }

    pub fn event(&self) -> StringId {
        self.buf[self.base + 2]
    }

    pub fn eventexpr(&self) -> EvaluatorId {
        self.buf[self.base + 3]
    }

    pub fn type_id(&self) -> StringId {
        self.buf[self.base + 4]
    }

    pub fn typeexpr(&self) -> EvaluatorId {
        self.buf[self.base + 5]
    }

    pub fn target(&self) -> StringId {
        self.buf[self.base + 6]
    }

    pub fn targetexpr(&self) -> EvaluatorId {
        self.buf[self.base + 7]
    }

    pub fn id(&self) -> StringId {
        self.buf[self.base + 8]
    }

    pub fn id_location(&self) -> StringId {
        self.buf[self.base + 9]
    }

    pub fn delay(&self) -> StringId {
        self.buf[self.base + 10]
    }

    pub fn delayexpr(&self) -> EvaluatorId {
        self.buf[self.base + 11]
    }

    pub fn content(&self) -> StringId {
        self.buf[self.base + 12]
    }

    /// Data-model names contributing payload entries by name.
    pub fn namelist(&self) -> PackedArray<'a, StringId> {
        self.namelist
    }

    /// Explicit name/value payload entries.
    pub fn params(&self) -> PackedArray<'a, Param> {
        self.params
    }

    pub fn size(&self) -> usize {
        SEND_FIXED_WORDS + self.namelist.size() + self.params.size()
    }
}

/// `[tag, event]`
#[derive(Debug, Clone, Copy)]
pub struct Raise<'a> {
    buf: &'a [i32],
    base: usize,
}

impl<'a> Raise<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Raise)?;
        words::check_span(buf, base, 2)?;
        Ok(Self { buf, base })
    }

    pub fn event(&self) -> StringId {
        self.buf[self.base + 1]
    }

    pub fn size(&self) -> usize {
        2
    }
}

/// `[tag, label, expr]`
#[derive(Debug, Clone, Copy)]
pub struct Log<'a> {
    buf: &'a [i32],
    base: usize,
}

impl<'a> Log<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Log)?;
        words::check_span(buf, base, 3)?;
        Ok(Self { buf, base })
    }

    pub fn label(&self) -> StringId {
        self.buf[self.base + 1]
    }

    pub fn expr(&self) -> EvaluatorId {
        self.buf[self.base + 2]
    }

    pub fn size(&self) -> usize {
        3
    }
}

/// `[tag, expr]` - evaluated purely for side effect.
#[derive(Debug, Clone, Copy)]
pub struct ScriptEval<'a> {
    buf: &'a [i32],
    base: usize,
}

impl<'a> ScriptEval<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::ScriptEval)?;
        words::check_span(buf, base, 2)?;
        Ok(Self { buf, base })
    }

    pub fn expr(&self) -> EvaluatorId {
        self.buf[self.base + 1]
    }

    pub fn size(&self) -> usize {
        2
    }
}

/// `[tag, expr]` - the evaluator performs a location assignment.
#[derive(Debug, Clone, Copy)]
pub struct Assign<'a> {
    buf: &'a [i32],
    base: usize,
}

impl<'a> Assign<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Assign)?;
        words::check_span(buf, base, 2)?;
        Ok(Self { buf, base })
    }

    pub fn expr(&self) -> EvaluatorId {
        self.buf[self.base + 1]
    }

    pub fn size(&self) -> usize {
        2
    }
}

/// `[tag, expr]` - like [`Assign`], only valid during initial data setup.
#[derive(Debug, Clone, Copy)]
pub struct Initialize<'a> {
    buf: &'a [i32],
    base: usize,
}

impl<'a> Initialize<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Initialize)?;
        words::check_span(buf, base, 2)?;
        Ok(Self { buf, base })
    }

    pub fn expr(&self) -> EvaluatorId {
        self.buf[self.base + 1]
    }

    pub fn size(&self) -> usize {
        2
    }
}

/// `[tag, conditions..., blocks (Sequences)]`
///
/// Condition count equals block count; a bare else branch stores
/// [`crate::NO_EVALUATOR`] in its condition slot and must come last.
#[derive(Debug, Clone, Copy)]
pub struct If<'a> {
    base: usize,
    conditions: PackedArray<'a, EvaluatorId>,
    blocks: Sequences<'a>,
}

impl<'a> If<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::If)?;
        let conditions = PackedArray::parse(buf, base + 1)?;
        let blocks = Sequences::parse(buf, base + 1 + conditions.size())?;
        if conditions.count() != blocks.sequence_count() {
            return Err(EncodingError::BranchMismatch {
                offset: base,
                conditions: conditions.count(),
                blocks: blocks.sequence_count(),
            });
        }
        Ok(Self {
            base,
            conditions,
            blocks,
        })
    }

    pub fn conditions(&self) -> PackedArray<'a, EvaluatorId> {
        self.conditions
    }

    pub fn blocks(&self) -> Sequences<'a> {
        self.blocks
    }

    pub fn size(&self) -> usize {
        1 + self.conditions.size() + self.blocks.size()
    }
}

/// `[tag, collection, body (Sequence)]`
///
/// The iteration and index variables are resolved through the evaluator
/// context of `collection`, not stored here.
#[derive(Debug, Clone, Copy)]
pub struct Foreach<'a> {
    base: usize,
    collection: EvaluatorId,
    body: Sequence<'a>,
}

impl<'a> Foreach<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Foreach)?;
        let collection = words::word(buf, base + 1)?;
        let body = Sequence::parse(buf, base + 2)?;
        Ok(Self {
            base,
            collection,
            body,
        })
    }

    pub fn collection(&self) -> EvaluatorId {
        self.collection
    }

    /// The loop body, one complete inline sequence.
    pub fn body(&self) -> Sequence<'a> {
        self.body
    }

    pub fn size(&self) -> usize {
        2 + self.body.size()
    }
}

/// `[tag, sendid, sendidexpr]`
#[derive(Debug, Clone, Copy)]
pub struct Cancel<'a> {
    buf: &'a [i32],
    base: usize,
}

impl<'a> Cancel<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::Cancel)?;
        words::check_span(buf, base, 3)?;
        Ok(Self { buf, base })
    }

    pub fn sendid(&self) -> StringId {
        self.buf[self.base + 1]
    }

    pub fn sendidexpr(&self) -> EvaluatorId {
        self.buf[self.base + 2]
    }

    pub fn size(&self) -> usize {
        3
    }
}

/// `[tag, location, contents, expr, params...]`
#[derive(Debug, Clone, Copy)]
pub struct DoneData<'a> {
    buf: &'a [i32],
    base: usize,
    params: PackedArray<'a, Param>,
}

impl<'a> DoneData<'a> {
    pub(crate) fn parse(buf: &'a [i32], base: usize) -> Result<Self, EncodingError> {
        expect_tag(buf, base, InstructionKind::DoneData)?;
        words::check_span(buf, base, 4)?;
        let params = PackedArray::parse(buf, base + 4)?;
        Ok(Self { buf, base, params })
    }

    pub fn location(&self) -> StringId {
        self.buf[self.base + 1]
    }

    pub fn contents(&self) -> StringId {
        self.buf[self.base + 2]
    }

    pub fn expr(&self) -> EvaluatorId {
        self.buf[self.base + 3]
    }

    pub fn params(&self) -> PackedArray<'a, Param> {
        self.params
    }

    pub fn size(&self) -> usize {
        4 + self.params.size()
    }
}

/// Lazy, restartable iterator over the top-level instructions of a stream.
///
/// Yields each instruction with the stream boundary enforced: a record
/// whose `size()` crosses the end of the stream is a
/// [`EncodingError::StreamOverrun`].
pub struct StreamIter<'a> {
    buf: &'a [i32],
    pos: usize,
    end: usize,
}

impl<'a> StreamIter<'a> {
    /// Iterator over `[start, start + len)` of `buf`.
    pub fn new(buf: &'a [i32], start: usize, len: usize) -> Self {
        Self {
            buf,
            pos: start,
            end: start + len,
        }
    }

    /// Current word position in the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for StreamIter<'a> {
    type Item = Result<Instruction<'a>, EncodingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        match Instruction::decode(self.buf, self.pos) {
            Ok(instr) => {
                let next = self.pos + instr.size();
                if next > self.end {
                    self.pos = self.end;
                    return Some(Err(EncodingError::StreamOverrun {
                        offset: instr.offset(),
                        end: next,
                        limit: self.end,
                    }));
                }
                self.pos = next;
                Some(Ok(instr))
            }
            Err(e) => {
                self.pos = self.end;
                Some(Err(e))
            }
        }
    }
}

fn expect_tag(buf: &[i32], base: usize, kind: InstructionKind) -> Result<(), EncodingError> {
    let tag = words::word(buf, base)?;
    if tag != kind as i32 {
        return Err(EncodingError::UnexpectedInstruction {
            expected: kind_name(kind),
            found: tag,
            offset: base,
        });
    }
    Ok(())
}

fn kind_name(kind: InstructionKind) -> &'static str {
    match kind {
        InstructionKind::Sequence => "Sequence",
        InstructionKind::Sequences => "Sequences",
        InstructionKind::Send => "Send",
        InstructionKind::Raise => "Raise",
        InstructionKind::Log => "Log",
        InstructionKind::ScriptEval => "ScriptEval",
        InstructionKind::Assign => "Assign",
        InstructionKind::Initialize => "Initialize",
        InstructionKind::If => "If",
        InstructionKind::Foreach => "Foreach",
        InstructionKind::Cancel => "Cancel",
        InstructionKind::DoneData => "DoneData",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NO_EVALUATOR, NO_STRING};

    // Hand-encoded streams; the builder tests cover the writer side.

    #[test]
    fn test_decode_raise() {
        let buf = [4, 7];
        let instr = Instruction::decode(&buf, 0).unwrap();

        assert_eq!(instr.kind(), InstructionKind::Raise);
        assert_eq!(instr.size(), 2);
        match instr {
            Instruction::Raise(r) => assert_eq!(r.event(), 7),
            _ => panic!("expected Raise"),
        }
    }

    #[test]
    fn test_decode_unknown_tag() {
        let buf = [99, 0];
        let result = Instruction::decode(&buf, 0);
        assert!(matches!(
            result,
            Err(EncodingError::UnknownInstruction { tag: 99, offset: 0 })
        ));
    }

    #[test]
    fn test_sequence_traversal() {
        // Sequence of [Raise 1, Log(2, 3), Assign 4]
        let buf = [1, 7, 4, 1, 5, 2, 3, 7, 4];
        let instr = Instruction::decode(&buf, 0).unwrap();
        assert_eq!(instr.size(), 9);

        let seq = match instr {
            Instruction::Sequence(s) => s,
            _ => panic!("expected Sequence"),
        };
        let kinds: Vec<_> = seq
            .body()
            .map(|i| i.unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                InstructionKind::Raise,
                InstructionKind::Log,
                InstructionKind::Assign
            ]
        );
    }

    #[test]
    fn test_send_with_tails() {
        // Send with namelist [8, 9] and one param (1, 2, 3).
        let mut buf = vec![3];
        buf.extend_from_slice(&[NO_STRING; 12]);
        buf.extend_from_slice(&[2, 8, 9]);
        buf.extend_from_slice(&[1, 1, 2, 3]);

        let instr = Instruction::decode(&buf, 0).unwrap();
        assert_eq!(instr.size(), buf.len());

        let send = match instr {
            Instruction::Send(s) => s,
            _ => panic!("expected Send"),
        };
        assert_eq!(send.namelist().iter().collect::<Vec<_>>(), vec![8, 9]);
        assert_eq!(send.params().count(), 1);
        assert_eq!(send.params().at(0).unwrap().expr, 2);
    }

    #[test]
    fn test_if_branch_mismatch() {
        // Two conditions but a Sequences record with one block.
        let buf = [
            9, // If
            2, 10, 11, // conditions
            2, 1, 2, // Sequences: one block, two body words
            1, 0, // empty Sequence
        ];
        let result = Instruction::decode(&buf, 0);
        assert!(matches!(
            result,
            Err(EncodingError::BranchMismatch {
                conditions: 2,
                blocks: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_if_layout() {
        // if (cond 5) {} else {}
        let buf = [
            9, // If
            2, 5, NO_EVALUATOR, // conditions
            2, 2, 4, // Sequences: two blocks, four body words
            1, 0, // empty block 0
            1, 0, // empty block 1
        ];
        let instr = Instruction::decode(&buf, 0).unwrap();
        assert_eq!(instr.size(), buf.len());

        let if_instr = match instr {
            Instruction::If(i) => i,
            _ => panic!("expected If"),
        };
        assert_eq!(if_instr.conditions().iter().collect::<Vec<_>>(), vec![5, NO_EVALUATOR]);
        assert_eq!(if_instr.blocks().sequence_count(), 2);
        assert_eq!(if_instr.blocks().at(1).unwrap().entry_count(), 0);
    }

    #[test]
    fn test_foreach_layout() {
        // foreach (collection 6) { raise 2 }
        let buf = [10, 6, 1, 2, 4, 2];
        let instr = Instruction::decode(&buf, 0).unwrap();
        assert_eq!(instr.size(), 6);

        let foreach = match instr {
            Instruction::Foreach(f) => f,
            _ => panic!("expected Foreach"),
        };
        assert_eq!(foreach.collection(), 6);
        let body: Vec<_> = foreach.body().body().map(|i| i.unwrap().kind()).collect();
        assert_eq!(body, vec![InstructionKind::Raise]);
    }

    #[test]
    fn test_stream_overrun() {
        // Sequence claims 1 body word, but a Raise needs 2.
        let buf = [1, 1, 4, 2];
        let seq = match Instruction::decode(&buf, 0).unwrap() {
            Instruction::Sequence(s) => s,
            _ => panic!("expected Sequence"),
        };
        let results: Vec<_> = seq.body().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(EncodingError::StreamOverrun { .. })
        ));
    }

    #[test]
    fn test_truncated_instruction() {
        let buf = [3]; // Send tag with nothing after it
        let result = Instruction::decode(&buf, 0);
        assert!(matches!(result, Err(EncodingError::OutOfBounds { .. })));
    }
}
