//! Message objects and the reporting pipeline.
//!
//! A `MessageObject` is the unit actually reported: a template id, one
//! formatting argument, a source location, and an optional captured
//! frame sequence. `MessageHandler` formats and dispatches it, either
//! to embedder-registered listeners or to the default textual reporter,
//! bracketing the runtime's fault state around every re-entrant call.

use crate::runtime::Runtime;
use crate::templates::{format_message_with_value, MessageTemplate};
use std::rc::Rc;
use veld_types::{FrameSeq, ObjRef, Script, Value};

/// Immutable source location attached to a diagnostic.
#[derive(Debug, Clone)]
pub struct MessageLocation {
    script: Rc<Script>,
    start: i32,
    end: i32,
    function: Option<ObjRef>,
}

impl MessageLocation {
    pub fn new(script: Rc<Script>, start: i32, end: i32) -> Self {
        Self {
            script,
            start,
            end,
            function: None,
        }
    }

    pub fn with_function(script: Rc<Script>, start: i32, end: i32, function: ObjRef) -> Self {
        Self {
            script,
            start,
            end,
            function: Some(function),
        }
    }

    /// The "no location" value: offsets are -1 and the source unit is
    /// the designated unknown unit.
    pub fn none() -> Self {
        Self::new(Rc::new(Script::empty()), -1, -1)
    }

    pub fn script(&self) -> &Rc<Script> {
        &self.script
    }

    pub fn start_pos(&self) -> i32 {
        self.start
    }

    pub fn end_pos(&self) -> i32 {
        self.end
    }

    pub fn function(&self) -> Option<&ObjRef> {
        self.function.as_ref()
    }
}

/// A reportable diagnostic message.
#[derive(Debug, Clone)]
pub struct MessageObject {
    template: MessageTemplate,
    argument: Value,
    start: i32,
    end: i32,
    script: Rc<Script>,
    stack_frames: Option<FrameSeq>,
    argument_replaced: bool,
}

impl MessageObject {
    pub fn template(&self) -> MessageTemplate {
        self.template
    }

    pub fn argument(&self) -> &Value {
        &self.argument
    }

    pub fn start_pos(&self) -> i32 {
        self.start
    }

    pub fn end_pos(&self) -> i32 {
        self.end
    }

    pub fn script(&self) -> &Rc<Script> {
        &self.script
    }

    /// The captured frame sequence, if one was attached at creation.
    /// Never mutated, only read when a trace is produced.
    pub fn stack_frames(&self) -> Option<&FrameSeq> {
        self.stack_frames.as_ref()
    }

    /// One-time replacement of the argument with its display-string
    /// form. Not a general setter: reporting performs this at most once
    /// per message lifetime.
    pub(crate) fn replace_argument(&mut self, value: Value) {
        debug_assert!(!self.argument_replaced, "message argument replaced twice");
        self.argument = value;
        self.argument_replaced = true;
    }
}

/// Formats and dispatches message objects.
pub struct MessageHandler;

impl MessageHandler {
    /// Build a message object. Without a location the offsets default
    /// to -1 and the script to the runtime's unknown unit, so the
    /// reporting path never dereferences a missing unit.
    pub fn make_message_object(
        rt: &Runtime,
        template: MessageTemplate,
        location: Option<&MessageLocation>,
        argument: Value,
        stack_frames: Option<FrameSeq>,
    ) -> MessageObject {
        let (start, end, script) = match location {
            Some(loc) => (loc.start_pos(), loc.end_pos(), loc.script().clone()),
            None => (-1, -1, rt.empty_script()),
        };
        MessageObject {
            template,
            argument,
            start,
            end,
            script,
            stack_frames,
            argument_replaced: false,
        }
    }

    /// Format the message text from its template and argument.
    pub fn get_message(rt: &Runtime, message: &MessageObject) -> String {
        format_message_with_value(rt, message.template(), message.argument())
    }

    /// Report a message to the live registered listeners, or to the
    /// default reporter when none are live.
    ///
    /// Listener callbacks are embedder code and may raise; the pending
    /// fault is snapshotted (for hand-off as the listener's fallback
    /// argument), cleared before dispatch, and restored afterwards.
    /// Faults raised by a listener are discarded per-listener, and any
    /// scheduled fault is cleared after every dispatch attempt.
    pub fn report_message(
        rt: &mut Runtime,
        location: Option<&MessageLocation>,
        message: &mut MessageObject,
    ) {
        let fault_snapshot = rt.pending_fault().unwrap_or(Value::Undefined);

        rt.with_exception_scope(|rt| {
            Self::stringify_argument(rt, message);

            if rt.live_listener_count() == 0 {
                Self::default_message_report(rt, location, message);
                rt.clear_scheduled_fault();
                return;
            }

            for entry in rt.listener_snapshot() {
                let Some(listener) = entry else { continue };
                let data = if listener.data.is_undefined() {
                    fault_snapshot.clone()
                } else {
                    listener.data.clone()
                };
                // A fault from one listener never reaches the next.
                if (listener.callback)(message, &data).is_err() {
                    rt.clear_pending_fault();
                }
                rt.clear_scheduled_fault();
            }
        });
    }

    /// The reporter used when no live listeners remain: one line per
    /// message on the runtime's diagnostic stream.
    pub fn default_message_report(
        rt: &mut Runtime,
        location: Option<&MessageLocation>,
        message: &MessageObject,
    ) {
        let text = Self::get_message(rt, message);
        match location {
            None => rt.write_diagnostic_line(&text),
            Some(loc) => {
                let name = loc
                    .script()
                    .name
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| "<unknown>".to_string());
                let offset = loc.start_pos().max(0) as usize;
                let line = loc.script().line_number(offset) + 1;
                rt.write_diagnostic_line(&format!("{name}:{line}: {text}"));
            }
        }
    }

    /// Turn a structured argument into display text before dispatch, so
    /// listeners and the default reporter never see raw object
    /// payloads.
    fn stringify_argument(rt: &mut Runtime, message: &mut MessageObject) {
        let Value::Object(obj) = message.argument().clone() else {
            return;
        };
        let argument = Value::Object(obj.clone());
        // Internally generated errors take the restricted path: their
        // text must not come from a user-overridable toString.
        let stringified = if obj.borrow().is_error() {
            Some(rt.no_side_effects_to_string(&argument))
        } else {
            match rt.to_string(&argument) {
                Ok(text) => Some(text),
                Err(_) => {
                    rt.clear_pending_fault();
                    None
                }
            }
        };
        let text = stringified.unwrap_or_else(|| "exception".into());
        message.replace_argument(Value::Str(text));
    }
}
