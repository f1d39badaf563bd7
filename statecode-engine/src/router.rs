//! The host/event-delivery collaborator.

use crate::message::{DoneDataPayload, SendMessage};
use std::time::Duration;

/// Sink for every observable effect of an instruction stream.
///
/// The host state machine implements this: it owns the internal event
/// queue, the external delivery path, the delayed-send timers and the
/// done-data notification path. The engine itself never queues, times or
/// delivers anything.
pub trait EventRouter {
    /// Enqueues an internal event. Internal events are processed before
    /// external ones, in raise order.
    fn raise(&mut self, event: &str);

    /// Delivers a message immediately.
    fn send(&mut self, message: SendMessage);

    /// Schedules a message for delivery after `delay`. The pending send
    /// must stay cancellable through its id until it fires, and fire at
    /// most once.
    fn schedule_send(&mut self, message: SendMessage, delay: Duration);

    /// Cancels a pending delayed send. Unknown and already-fired ids are
    /// a no-op.
    fn cancel_send(&mut self, send_id: &str);

    /// Receives the assembled done-data when a final child state is
    /// entered.
    fn done_data(&mut self, payload: DoneDataPayload);

    /// Receives a `<log>` line. The default forwards to `tracing`.
    fn log(&mut self, label: &str, message: &str) {
        tracing::info!(target: "statecode", label, message, "document log");
    }
}
