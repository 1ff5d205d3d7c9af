//! Integration tests for error construction and stack-trace capture.
//!
//! Covers:
//! - the message property and its attributes
//! - prototype resolution from the effective new-target
//! - fault propagation (coercion failure, allocation budget)
//! - detailed vs simple traces and the skip policies
//! - trace rendering and the serializable projections

use std::rc::Rc;
use veld_runtime::{
    construct_error, render_stack_trace, ActivationFrame, FrameSkipMode, MessageHandler,
    MessageTemplate, Runtime,
};
use veld_runtime::{project_frame, project_message, CallSite};
use veld_types::{
    Fault, FrameSeq, ObjRef, Object, ObjectKind, Property, PropertyAttributes, Script, Value,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn function(rt: &Runtime, name: &str, script: Option<Rc<Script>>) -> ObjRef {
    rt.new_function(name, script, Some(Rc::new(|_args| Ok(Value::Undefined))))
}

fn interpreted(function: &ObjRef, position: i32) -> ActivationFrame {
    ActivationFrame::Interpreted {
        function: function.clone(),
        receiver: Value::Undefined,
        position,
    }
}

fn simple_trace(value: &Value) -> FrameSeq {
    value
        .as_object()
        .expect("constructed error is an object")
        .borrow()
        .as_error()
        .expect("constructed value is an error")
        .simple_trace
        .clone()
        .expect("simple trace was captured")
}

fn trace_functions(frames: &FrameSeq) -> Vec<String> {
    frames
        .iter()
        .map(|raw| {
            CallSite::new(raw)
                .function_name()
                .unwrap_or_else(|| "<anonymous>".to_string())
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Construction protocol
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn message_property_is_defined_non_enumerable() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    let value = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::string("boom"),
        FrameSkipMode::SkipNone,
        false,
    )
    .unwrap();

    let err = value.as_object().unwrap();
    let inner = err.borrow();
    assert!(inner.is_error());
    match inner.get_own_property("message") {
        Some(Property::Data { value, attributes }) => {
            assert_eq!(value, &Value::string("boom"));
            assert!(!attributes.enumerable);
            assert!(attributes.writable);
            assert!(attributes.configurable);
        }
        other => panic!("expected a data property, got {other:?}"),
    }
}

#[test]
fn undefined_message_defines_no_property() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    let value = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::Undefined,
        FrameSkipMode::SkipNone,
        false,
    )
    .unwrap();
    assert!(value
        .as_object()
        .unwrap()
        .borrow()
        .get_own_property("message")
        .is_none());
}

#[test]
fn non_string_message_is_coerced() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    let value = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::Number(42.0),
        FrameSkipMode::SkipNone,
        false,
    )
    .unwrap();
    assert_eq!(
        value
            .as_object()
            .unwrap()
            .borrow()
            .get_own_data_value("message"),
        Some(Value::string("42"))
    );
}

#[test]
fn prototype_comes_from_the_effective_new_target() {
    let mut rt = Runtime::new();
    let custom_proto = Object::alloc(ObjectKind::Ordinary, None);
    let target = function(&rt, "RangeFault", None);
    target
        .borrow_mut()
        .define_data_property(
            "prototype",
            Value::Object(custom_proto.clone()),
            PropertyAttributes::DONT_ENUM,
        )
        .unwrap();

    let value = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::Undefined,
        FrameSkipMode::SkipNone,
        false,
    )
    .unwrap();
    let proto = value.as_object().unwrap().borrow().prototype.clone();
    assert!(proto.is_some_and(|p| Rc::ptr_eq(&p, &custom_proto)));
}

#[test]
fn missing_prototype_slot_falls_back_to_error_prototype() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    let value = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::Undefined,
        FrameSkipMode::SkipNone,
        false,
    )
    .unwrap();
    let proto = value.as_object().unwrap().borrow().prototype.clone();
    assert!(proto.is_some_and(|p| Rc::ptr_eq(&p, &rt.error_prototype)));
}

#[test]
fn object_new_target_overrides_the_target() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Base", None);
    let sub_proto = Object::alloc(ObjectKind::Ordinary, None);
    let new_target = function(&rt, "Sub", None);
    new_target
        .borrow_mut()
        .define_data_property(
            "prototype",
            Value::Object(sub_proto.clone()),
            PropertyAttributes::DONT_ENUM,
        )
        .unwrap();

    let value = construct_error(
        &mut rt,
        &target,
        &Value::Object(new_target),
        &Value::Undefined,
        FrameSkipMode::SkipNone,
        false,
    )
    .unwrap();
    let proto = value.as_object().unwrap().borrow().prototype.clone();
    assert!(proto.is_some_and(|p| Rc::ptr_eq(&p, &sub_proto)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Fault propagation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn throwing_message_tostring_aborts_construction() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    let message = Object::alloc(ObjectKind::Ordinary, None);
    let to_string = rt.new_function(
        "toString",
        None,
        Some(Rc::new(|_args| {
            Err(Fault::Thrown(Value::string("unprintable")))
        })),
    );
    message
        .borrow_mut()
        .define_data_property(
            "toString",
            Value::Object(to_string),
            PropertyAttributes::default(),
        )
        .unwrap();

    let result = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::Object(message),
        FrameSkipMode::SkipNone,
        false,
    );
    assert!(matches!(result, Err(Fault::Thrown(_))));
    assert_eq!(rt.pending_fault(), Some(Value::string("unprintable")));
}

#[test]
fn exhausted_allocation_budget_aborts_construction() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    rt.set_heap_budget(0);
    let result = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::string("boom"),
        FrameSkipMode::SkipNone,
        false,
    );
    assert!(result.is_err());
    assert!(rt.has_pending_fault());
}

#[test]
fn budget_of_one_is_enough_for_one_error() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    rt.set_heap_budget(1);
    assert!(construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::string("boom"),
        FrameSkipMode::SkipNone,
        false,
    )
    .is_ok());
}

// ══════════════════════════════════════════════════════════════════════════════
// Trace capture & skip policies
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn both_traces_are_captured_by_default() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    let f = function(&rt, "tick", None);
    rt.push_frame(interpreted(&f, 0));

    let value = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::Undefined,
        FrameSkipMode::SkipNone,
        false,
    )
    .unwrap();

    let err = value.as_object().unwrap();
    let inner = err.borrow();
    let data = inner.as_error().unwrap();
    assert_eq!(data.detailed_trace.as_ref().map(|t| t.len()), Some(1));
    assert_eq!(data.simple_trace.as_ref().map(|t| t.len()), Some(1));
}

#[test]
fn suppressing_the_detailed_trace_keeps_the_simple_one() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    let value = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::Undefined,
        FrameSkipMode::SkipNone,
        true,
    )
    .unwrap();
    let err = value.as_object().unwrap();
    let inner = err.borrow();
    let data = inner.as_error().unwrap();
    assert!(data.detailed_trace.is_none());
    assert!(data.simple_trace.is_some());
}

#[test]
fn skip_first_without_callable_new_target_drops_one_frame() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Error", None);
    let caller = function(&rt, "caller", None);
    let ctor = function(&rt, "ctor", None);
    rt.push_frame(interpreted(&caller, 0));
    rt.push_frame(interpreted(&ctor, 0));

    let value = construct_error(
        &mut rt,
        &target,
        &Value::Undefined,
        &Value::Undefined,
        FrameSkipMode::SkipFirst,
        false,
    )
    .unwrap();

    assert_eq!(trace_functions(&simple_trace(&value)), vec!["caller"]);
}

#[test]
fn skip_first_with_callable_new_target_skips_until_it_is_seen() {
    let mut rt = Runtime::new();
    let target = function(&rt, "Base", None);
    let sub = function(&rt, "Sub", None);
    let caller = function(&rt, "caller", None);
    let base = function(&rt, "Base", None);
    // Youngest-first at capture time: Base, Sub, caller.
    rt.push_frame(interpreted(&caller, 0));
    rt.push_frame(interpreted(&sub, 0));
    rt.push_frame(interpreted(&base, 0));

    let value = construct_error(
        &mut rt,
        &target,
        &Value::Object(sub.clone()),
        &Value::Undefined,
        FrameSkipMode::SkipFirst,
        false,
    )
    .unwrap();

    // Frames are dropped up to and including the marker function.
    assert_eq!(trace_functions(&simple_trace(&value)), vec!["caller"]);

    // The detailed trace is unaffected by the skip policy.
    let err = value.as_object().unwrap();
    let inner = err.borrow();
    assert_eq!(
        inner.as_error().unwrap().detailed_trace.as_ref().map(|t| t.len()),
        Some(3)
    );
}

#[test]
fn capture_respects_the_stack_trace_limit() {
    let mut rt = Runtime::new();
    rt.stack_trace_limit = 2;
    let f = function(&rt, "deep", None);
    for position in 0..5 {
        rt.push_frame(interpreted(&f, position));
    }
    let frames = rt.capture_raw_frames(FrameSkipMode::SkipNone, None);
    assert_eq!(frames.len(), 2);
}

#[test]
fn traces_cannot_attach_to_a_non_error() {
    let mut rt = Runtime::new();
    let plain = Object::alloc(ObjectKind::Ordinary, None);
    assert!(rt.capture_detailed_stack_trace(&plain).is_err());
    rt.clear_pending_fault();
    assert!(rt
        .capture_simple_stack_trace(&plain, FrameSkipMode::SkipNone, None)
        .is_err());
}

// ══════════════════════════════════════════════════════════════════════════════
// Rendering & projections
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn render_stack_trace_formats_every_frame_kind() {
    let mut rt = Runtime::new();
    let script = Rc::new(Script::new(Value::string("app.veld"), "ab\ncd\nef"));
    let tick = function(&rt, "tick", Some(script));

    let mut env = veld_types::ModuleInstance::new(Some("env".to_string()));
    env.add_function(Some("add".to_string()));
    env.add_function(None);
    let env = Object::alloc(ObjectKind::Module(env), None);

    rt.push_frame(ActivationFrame::Foreign {
        instance: env.clone(),
        func_index: 1,
        position: 5,
    });
    rt.push_frame(ActivationFrame::Foreign {
        instance: env,
        func_index: 0,
        position: 9,
    });
    rt.push_frame(interpreted(&tick, 4));

    let frames = rt.capture_raw_frames(FrameSkipMode::SkipNone, None);
    let text = render_stack_trace(&mut rt, &frames);
    let expected = [
        "    at tick (app.veld:2:2)",
        "    at add (env[0]:9)",
        "    at env[1] (5)",
        "",
    ]
    .join("\n");
    assert_eq!(text, expected);
}

#[test]
fn projected_frame_serializes_for_the_embedder() {
    let mut rt = Runtime::new();
    let script = Rc::new(Script::new(Value::string("app.veld"), "ab\ncd"));
    let tick = function(&rt, "tick", Some(script));
    rt.push_frame(interpreted(&tick, 3));
    let frames = rt.capture_raw_frames(FrameSkipMode::SkipNone, None);

    let rendered = project_frame(&mut rt, &CallSite::new(&frames[0]));
    let json = serde_json::to_value(&rendered).unwrap();
    assert_eq!(json["function_name"], "tick");
    assert_eq!(json["file_name"], "app.veld");
    assert_eq!(json["line"], 2);
    assert_eq!(json["column"], 1);
    assert_eq!(json["is_foreign"], false);
    assert_eq!(json["is_toplevel"], true);
}

#[test]
fn projected_message_carries_its_frames() {
    let mut rt = Runtime::new();
    let f = function(&rt, "tick", None);
    rt.push_frame(interpreted(&f, 0));
    let frames = rt.capture_raw_frames(FrameSkipMode::SkipNone, None);

    let msg = MessageHandler::make_message_object(
        &rt,
        MessageTemplate::NotDefined,
        None,
        Value::string("tick"),
        Some(frames),
    );
    let rendered = project_message(&mut rt, &msg);
    assert_eq!(rendered.text, "tick is not defined");
    assert_eq!(rendered.line, -1);
    assert_eq!(rendered.script_name, None);
    assert_eq!(rendered.frames.len(), 1);
    assert_eq!(rendered.frames[0].function_name.as_deref(), Some("tick"));
}
