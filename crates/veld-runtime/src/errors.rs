//! Structured error construction.

use crate::frames::FrameSkipMode;
use crate::runtime::Runtime;
use veld_types::{ObjRef, PropertyAttributes, VResult, Value};

/// Build a new error value per the runtime's object protocol.
///
/// The effective new-target is `new_target` when it is object-like,
/// otherwise `target` itself. The fresh value is prototype-chained from
/// the effective new-target, gets a non-enumerable `message` property
/// when one was supplied, and has its stack traces captured under the
/// requested skip policy. Every failure is terminal: no partially
/// constructed value is ever returned.
pub fn construct_error(
    rt: &mut Runtime,
    target: &ObjRef,
    new_target: &Value,
    message: &Value,
    mut mode: FrameSkipMode,
    suppress_detailed_trace: bool,
) -> VResult<Value> {
    let new_target_recv = match new_target.as_object() {
        Some(obj) => obj.clone(),
        None => target.clone(),
    };

    let err = rt.new_error_object(&new_target_recv)?;

    if !message.is_undefined() {
        let text = rt.to_string(message)?;
        err.borrow_mut().define_data_property(
            "message",
            Value::Str(text),
            PropertyAttributes::DONT_ENUM,
        )?;
    }

    if !suppress_detailed_trace {
        rt.capture_detailed_stack_trace(&err)?;
    }

    // A concrete callable new-target upgrades the skip policy: frames
    // are dropped until that function is observed, so a subclass
    // constructor chaining to its base keeps the base frame out of the
    // trace.
    let mut caller: Option<ObjRef> = None;
    if mode == FrameSkipMode::SkipFirst {
        if let Some(function) = new_target.as_object().filter(|obj| obj.borrow().is_function()) {
            mode = FrameSkipMode::SkipUntilSeen;
            caller = Some(function.clone());
        }
    }

    rt.capture_simple_stack_trace(&err, mode, caller.as_ref())?;

    Ok(Value::Object(err))
}
