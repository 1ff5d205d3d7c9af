//! Activation stack and stack-trace capture.

use crate::runtime::Runtime;
use std::rc::Rc;
use veld_types::{FrameSeq, ObjRef, RawFrame, VResult, Value};

/// One live activation on the runtime's call stack.
#[derive(Debug, Clone)]
pub enum ActivationFrame {
    /// An interpreted function activation.
    Interpreted {
        function: ObjRef,
        receiver: Value,
        position: i32,
    },
    /// A foreign-module function activation.
    Foreign {
        instance: ObjRef,
        func_index: u32,
        position: i32,
    },
}

impl ActivationFrame {
    fn to_raw(&self) -> RawFrame {
        match self {
            Self::Interpreted {
                function,
                receiver,
                position,
            } => RawFrame {
                function: Some(Value::Object(function.clone())),
                receiver: Some(receiver.clone()),
                position: Some(Value::Number(*position as f64)),
                ..RawFrame::default()
            },
            Self::Foreign {
                instance,
                func_index,
                position,
            } => RawFrame {
                module: Some(Value::Object(instance.clone())),
                func_index: Some(Value::Number(*func_index as f64)),
                position: Some(Value::Number(*position as f64)),
                ..RawFrame::default()
            },
        }
    }
}

/// Which leading frames a capture omits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSkipMode {
    /// Keep every frame.
    SkipNone,
    /// Drop the youngest frame.
    SkipFirst,
    /// Drop frames until a marker function has been observed,
    /// including the marker's own frame.
    SkipUntilSeen,
}

impl Runtime {
    /// Push an activation. The interpreter calls this on entry to every
    /// function body; tests use it to stage a stack.
    pub fn push_frame(&mut self, frame: ActivationFrame) {
        self.call_stack.push(frame);
    }

    /// Pop the youngest activation.
    pub fn pop_frame(&mut self) {
        self.call_stack.pop();
    }

    pub fn stack_depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Capture the current stack as raw frame descriptors,
    /// youngest-first, honoring the skip policy and the trace limit.
    pub fn capture_raw_frames(&self, mode: FrameSkipMode, caller: Option<&ObjRef>) -> FrameSeq {
        let mut frames = Vec::new();
        let mut skip_first = mode == FrameSkipMode::SkipFirst;
        let mut waiting_for = match mode {
            FrameSkipMode::SkipUntilSeen => caller,
            _ => None,
        };
        for frame in self.call_stack.iter().rev() {
            if skip_first {
                skip_first = false;
                continue;
            }
            if let Some(marker) = waiting_for {
                if matches!(frame, ActivationFrame::Interpreted { function, .. }
                    if Rc::ptr_eq(function, marker))
                {
                    waiting_for = None;
                }
                continue;
            }
            if frames.len() >= self.stack_trace_limit {
                break;
            }
            frames.push(frame.to_raw());
        }
        Rc::from(frames)
    }

    /// Capture and attach the detailed trace used for diagnostics.
    pub fn capture_detailed_stack_trace(&mut self, err: &ObjRef) -> VResult<()> {
        if !err.borrow().is_error() {
            return Err(self.throw(Value::string("cannot attach a stack trace to a non-error")));
        }
        let frames = self.capture_raw_frames(FrameSkipMode::SkipNone, None);
        if let Some(data) = err.borrow_mut().as_error_mut() {
            data.detailed_trace = Some(frames);
        }
        Ok(())
    }

    /// Capture and attach the simple trace that backs the lazily
    /// rendered `stack` text.
    pub fn capture_simple_stack_trace(
        &mut self,
        err: &ObjRef,
        mode: FrameSkipMode,
        caller: Option<&ObjRef>,
    ) -> VResult<()> {
        if !err.borrow().is_error() {
            return Err(self.throw(Value::string("cannot attach a stack trace to a non-error")));
        }
        let frames = self.capture_raw_frames(mode, caller);
        if let Some(data) = err.borrow_mut().as_error_mut() {
            data.simple_trace = Some(frames);
        }
        Ok(())
    }
}
