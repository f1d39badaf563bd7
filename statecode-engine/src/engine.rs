//! The instruction interpreter.

use crate::error::EngineError;
use crate::message::{parse_delay, DoneDataPayload, SendMessage};
use crate::model::DataModel;
use crate::router::EventRouter;
use serde_json::{Map, Value};
use statecode_encoding::array::Param;
use statecode_encoding::instruction::{
    Cancel, DoneData, Foreach, If, Send, StreamIter,
};
use statecode_encoding::{
    ContainerId, EvaluatorId, Instruction, PackedArray, Program, StringId, NO_EVALUATOR, NO_STRING,
};
use std::time::Duration;

/// Executes instruction streams of one shared [`Program`].
///
/// The engine is stateless between calls: every `execute` interprets one
/// container synchronously, delegating evaluation to the data model and
/// every observable effect to the event router. It can be shared freely;
/// per-call state lives in the collaborators.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    program: Program,
}

impl ExecutionEngine {
    pub fn new(program: Program) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Executes the instruction stream at `container`.
    ///
    /// `extra_data` is made available to the data model for the duration
    /// of this call (typically the event being processed). On failure the
    /// current stream stops at the failing instruction; effects already
    /// produced stay, and the caller decides whether to raise an internal
    /// error event. Later calls for other containers are unaffected.
    pub fn execute<M: DataModel, R: EventRouter>(
        &self,
        container: ContainerId,
        extra_data: Option<Value>,
        model: &mut M,
        router: &mut R,
    ) -> Result<(), EngineError> {
        if container < 0 {
            return Err(EngineError::InvalidContainer { id: container });
        }

        model.set_ambient_data(extra_data);
        let result = match self.program.instruction_at(container) {
            Ok(instr) => self.exec_instruction(&instr, model, router),
            Err(error) => Err(error.into()),
        };
        model.set_ambient_data(None);

        if let Err(error) = &result {
            tracing::warn!(container, %error, "instruction stream aborted");
        }
        result
    }

    fn exec_stream<M: DataModel, R: EventRouter>(
        &self,
        stream: StreamIter<'_>,
        model: &mut M,
        router: &mut R,
    ) -> Result<(), EngineError> {
        for item in stream {
            let instr = item?;
            self.exec_instruction(&instr, model, router)?;
        }
        Ok(())
    }

    fn exec_instruction<M: DataModel, R: EventRouter>(
        &self,
        instr: &Instruction<'_>,
        model: &mut M,
        router: &mut R,
    ) -> Result<(), EngineError> {
        match instr {
            Instruction::Sequence(seq) => self.exec_stream(seq.body(), model, router),

            Instruction::Sequences(blocks) => {
                for seq in blocks.iter() {
                    self.exec_stream(seq?.body(), model, router)?;
                }
                Ok(())
            }

            Instruction::If(if_instr) => self.exec_if(if_instr, model, router),

            Instruction::Foreach(foreach) => self.exec_foreach(foreach, model, router),

            Instruction::Send(send) => self.exec_send(send, model, router),

            Instruction::Raise(raise) => {
                let event = self.resolve_string(raise.event())?;
                router.raise(event);
                Ok(())
            }

            Instruction::Log(log) => {
                let message = if log.expr() != NO_EVALUATOR {
                    model.evaluate_to_string(log.expr())?
                } else {
                    String::new()
                };
                let label = self.optional_string(log.label())?.unwrap_or("");
                router.log(label, &message);
                Ok(())
            }

            Instruction::ScriptEval(script) => model.evaluate_to_void(script.expr()),

            Instruction::Assign(assign) => model.evaluate_assignment(assign.expr()),

            Instruction::Initialize(init) => model.evaluate_initialization(init.expr()),

            Instruction::Cancel(cancel) => self.exec_cancel(cancel, model, router),

            Instruction::DoneData(done) => self.exec_done_data(done, model, router),
        }
    }

    /// Conditions are evaluated in declared order; the first truthy one
    /// selects its block, and no later condition is looked at. A bare
    /// else stores [`NO_EVALUATOR`] and always matches. No match at all
    /// executes nothing.
    fn exec_if<M: DataModel, R: EventRouter>(
        &self,
        if_instr: &If<'_>,
        model: &mut M,
        router: &mut R,
    ) -> Result<(), EngineError> {
        let conditions = if_instr.conditions();
        for i in 0..conditions.count() {
            let condition = conditions.at(i)?;
            let matched = condition == NO_EVALUATOR || model.evaluate_to_bool(condition)?;
            if matched {
                let block = if_instr.blocks().at(i)?;
                return self.exec_stream(block.body(), model, router);
            }
        }
        Ok(())
    }

    /// The collection expression is evaluated exactly once; the body runs
    /// once per element with the iteration variables rebound before each
    /// run.
    fn exec_foreach<M: DataModel, R: EventRouter>(
        &self,
        foreach: &Foreach<'_>,
        model: &mut M,
        router: &mut R,
    ) -> Result<(), EngineError> {
        let items = model.evaluate_foreach_collection(foreach.collection())?;
        for (index, item) in items.iter().enumerate() {
            model.bind_foreach_item(foreach.collection(), item, index)?;
            self.exec_stream(foreach.body().body(), model, router)?;
        }
        Ok(())
    }

    fn exec_send<M: DataModel, R: EventRouter>(
        &self,
        send: &Send<'_>,
        model: &mut M,
        router: &mut R,
    ) -> Result<(), EngineError> {
        let event = self.resolve_dynamic(send.event(), send.eventexpr(), model)?;
        let event = match event {
            Some(event) if !event.is_empty() => event,
            _ => {
                let location = self
                    .optional_string(send.instruction_location())?
                    .unwrap_or("<send>")
                    .to_string();
                return Err(EngineError::Send {
                    location,
                    reason: "no event name".to_string(),
                });
            }
        };

        let target = self.resolve_dynamic(send.target(), send.targetexpr(), model)?;
        let event_type = self.resolve_dynamic(send.type_id(), send.typeexpr(), model)?;
        let content = self.optional_string(send.content())?.map(str::to_string);

        // An id location means the platform picks the id and publishes it
        // to the data model before delivery.
        let send_id = if send.id_location() != NO_STRING {
            let location = self.resolve_string(send.id_location())?;
            let generated = uuid::Uuid::new_v4().to_string();
            model.set_property(location, Value::String(generated.clone()))?;
            Some(generated)
        } else {
            self.optional_string(send.id())?.map(str::to_string)
        };

        let mut payload = Map::new();
        for name_id in send.namelist().iter() {
            let name = self.resolve_string(name_id)?;
            let value = model.property_value(name)?;
            payload.insert(name.to_string(), value);
        }
        self.apply_params(send.params(), &mut payload, model)?;
        let payload = if payload.is_empty() {
            Value::Null
        } else {
            Value::Object(payload)
        };

        let delay = match self.resolve_dynamic(send.delay(), send.delayexpr(), model)? {
            Some(delay) => parse_delay(&delay)?,
            None => Duration::ZERO,
        };

        let message = SendMessage {
            event,
            send_id,
            target,
            event_type,
            content,
            payload,
        };
        if delay.is_zero() {
            router.send(message);
        } else {
            router.schedule_send(message, delay);
        }
        Ok(())
    }

    fn exec_cancel<M: DataModel, R: EventRouter>(
        &self,
        cancel: &Cancel<'_>,
        model: &mut M,
        router: &mut R,
    ) -> Result<(), EngineError> {
        if let Some(send_id) = self.resolve_dynamic(cancel.sendid(), cancel.sendidexpr(), model)? {
            router.cancel_send(&send_id);
        }
        Ok(())
    }

    fn exec_done_data<M: DataModel, R: EventRouter>(
        &self,
        done: &DoneData<'_>,
        model: &mut M,
        router: &mut R,
    ) -> Result<(), EngineError> {
        let location = self.optional_string(done.location())?.map(str::to_string);
        let content = if done.contents() != NO_STRING {
            Some(Value::String(self.resolve_string(done.contents())?.to_string()))
        } else if done.expr() != NO_EVALUATOR {
            Some(model.evaluate_to_value(done.expr())?)
        } else {
            None
        };

        let mut params = Map::new();
        self.apply_params(done.params(), &mut params, model)?;
        let params = if params.is_empty() {
            Value::Null
        } else {
            Value::Object(params)
        };

        router.done_data(DoneDataPayload {
            location,
            content,
            params,
        });
        Ok(())
    }

    fn apply_params<M: DataModel>(
        &self,
        params: PackedArray<'_, Param>,
        into: &mut Map<String, Value>,
        model: &mut M,
    ) -> Result<(), EngineError> {
        for param in params.iter() {
            let name = self.resolve_string(param.name)?.to_string();
            let value = if param.expr != NO_EVALUATOR {
                model.evaluate_to_value(param.expr)?
            } else if param.location != NO_STRING {
                let location = self.resolve_string(param.location)?;
                model.property_value(location)?
            } else {
                Value::Null
            };
            into.insert(name, value);
        }
        Ok(())
    }

    fn resolve_string(&self, id: StringId) -> Result<&str, EngineError> {
        Ok(self.program.strings().resolve(id)?)
    }

    fn optional_string(&self, id: StringId) -> Result<Option<&str>, EngineError> {
        if id == NO_STRING {
            Ok(None)
        } else {
            Ok(Some(self.resolve_string(id)?))
        }
    }

    /// Resolves an attribute with a literal and a dynamic slot; the
    /// dynamic evaluator takes precedence when present.
    fn resolve_dynamic<M: DataModel>(
        &self,
        literal: StringId,
        dynamic: EvaluatorId,
        model: &mut M,
    ) -> Result<Option<String>, EngineError> {
        if dynamic != NO_EVALUATOR {
            Ok(Some(model.evaluate_to_string(dynamic)?))
        } else if literal != NO_STRING {
            Ok(Some(self.resolve_string(literal)?.to_string()))
        } else {
            Ok(None)
        }
    }
}
