//! Runtime instance state.
//!
//! One `Runtime` is one isolate: it owns the well-known objects, the
//! pending/scheduled fault slots, the activation stack, the message
//! listener table, and the diagnostic output sink. All operations are
//! synchronous on the calling thread; re-entrancy into embedder
//! callbacks is handled with explicit save/clear/restore brackets, not
//! locks.

use crate::frames::ActivationFrame;
use crate::messages::MessageObject;
use crate::templates::{format_message_with_value, MessageTemplate};
use std::io::{self, Write};
use std::rc::Rc;
use veld_types::value::format_number;
use veld_types::{
    get_data_property, Fault, LookupMode, NativeFn, ObjRef, Object, ObjectKind, Script, VResult,
    Value,
};

/// Embedder callback invoked once per reported message.
///
/// The second argument is the listener's registered data, or the
/// pending fault snapshotted when reporting began if no data was
/// registered. A returned fault counts as the listener raising; the
/// handler discards it.
pub type MessageCallback = Rc<dyn Fn(&MessageObject, &Value) -> VResult<()>>;

/// One live entry of the message listener table.
#[derive(Clone)]
pub struct MessageListener {
    pub callback: MessageCallback,
    pub data: Value,
}

/// Identifier returned by [`Runtime::add_message_listener`].
pub type ListenerId = usize;

/// A Veld runtime instance.
pub struct Runtime {
    pub object_prototype: ObjRef,
    pub error_prototype: ObjRef,
    pub global_proxy: ObjRef,
    /// Sentinel receiver marking builtin-constructor exit frames.
    constructor_marker: ObjRef,
    empty_script: Rc<Script>,

    pending_fault: Option<Value>,
    scheduled_fault: Option<Value>,
    external_caught: bool,

    /// Ordered listener table; removed entries become `None` and are
    /// skipped during dispatch.
    listeners: Vec<Option<MessageListener>>,

    pub(crate) call_stack: Vec<ActivationFrame>,
    /// Maximum number of frames a capture retains.
    pub stack_trace_limit: usize,

    /// Remaining object allocations, if a budget is armed.
    heap_budget: Option<usize>,

    out: Box<dyn Write>,
}

impl Runtime {
    pub fn new() -> Self {
        let object_prototype = Object::alloc(ObjectKind::Ordinary, None);
        let error_prototype = Object::alloc(ObjectKind::Ordinary, Some(object_prototype.clone()));
        let global_proxy = Object::alloc(ObjectKind::GlobalProxy, Some(object_prototype.clone()));
        let constructor_marker = Object::alloc(ObjectKind::Ordinary, None);
        Self {
            object_prototype,
            error_prototype,
            global_proxy,
            constructor_marker,
            empty_script: Rc::new(Script::empty()),
            pending_fault: None,
            scheduled_fault: None,
            external_caught: false,
            listeners: Vec::new(),
            call_stack: Vec::new(),
            stack_trace_limit: 64,
            heap_budget: None,
            out: Box::new(io::stdout()),
        }
    }

    /// Redirect default-reporter output (stdout by default).
    pub fn set_diagnostic_sink(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    pub(crate) fn write_diagnostic_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }

    /// The designated "unknown" source unit.
    pub fn empty_script(&self) -> Rc<Script> {
        self.empty_script.clone()
    }

    /// The sentinel receiver used by builtin-constructor exit frames.
    pub fn constructor_marker(&self) -> &ObjRef {
        &self.constructor_marker
    }

    // ══════════════════════════════════════════════════════════════════
    // Fault state
    // ══════════════════════════════════════════════════════════════════

    /// Raise `value` as the pending fault and return the fault marker
    /// for `?`-propagation.
    pub fn throw(&mut self, value: Value) -> Fault {
        self.pending_fault = Some(value.clone());
        Fault::Thrown(value)
    }

    /// Raise a fault whose text comes from the message template table.
    pub fn throw_with_template(&mut self, template: MessageTemplate, arg: &Value) -> Fault {
        let text = format_message_with_value(self, template, arg);
        self.throw(Value::string(text))
    }

    pub fn has_pending_fault(&self) -> bool {
        self.pending_fault.is_some()
    }

    pub fn pending_fault(&self) -> Option<Value> {
        self.pending_fault.clone()
    }

    pub fn clear_pending_fault(&mut self) {
        self.pending_fault = None;
    }

    pub fn set_external_caught(&mut self, caught: bool) {
        self.external_caught = caught;
    }

    pub fn external_caught(&self) -> bool {
        self.external_caught
    }

    /// Queue a fault to be re-raised when control returns to the
    /// runtime's outer loop.
    pub fn schedule_fault(&mut self, value: Value) {
        self.scheduled_fault = Some(value);
    }

    pub fn has_scheduled_fault(&self) -> bool {
        self.scheduled_fault.is_some()
    }

    pub fn clear_scheduled_fault(&mut self) {
        self.scheduled_fault = None;
    }

    /// Run `f` with a clean fault state.
    ///
    /// The pending fault is snapshotted and cleared (along with the
    /// external-caught flag) before `f` runs, and the snapshot is
    /// restored on every exit path, discarding whatever fault `f` left
    /// pending.
    pub fn with_exception_scope<R>(&mut self, f: impl FnOnce(&mut Runtime) -> R) -> R {
        let saved = self.pending_fault.take();
        self.external_caught = false;
        let result = f(self);
        self.pending_fault = saved;
        result
    }

    // ══════════════════════════════════════════════════════════════════
    // Allocation
    // ══════════════════════════════════════════════════════════════════

    /// Arm an allocation budget of `remaining` objects.
    pub fn set_heap_budget(&mut self, remaining: usize) {
        self.heap_budget = Some(remaining);
    }

    fn charge_allocation(&mut self) -> VResult<()> {
        match self.heap_budget {
            Some(0) => Err(self.throw(Value::string("allocation budget exhausted"))),
            Some(remaining) => {
                self.heap_budget = Some(remaining - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Allocate an ordinary object.
    pub fn new_object(&mut self, prototype: Option<ObjRef>) -> VResult<ObjRef> {
        self.charge_allocation()?;
        Ok(Object::alloc(ObjectKind::Ordinary, prototype))
    }

    /// Allocate a function object. Functions are not budgeted; only the
    /// object-construction path is observably fallible.
    pub fn new_function(
        &self,
        name: &str,
        script: Option<Rc<Script>>,
        call: Option<NativeFn>,
    ) -> ObjRef {
        Object::alloc(
            ObjectKind::Function(veld_types::FunctionData {
                name: name.to_string(),
                script,
                call,
            }),
            Some(self.object_prototype.clone()),
        )
    }

    /// Allocate a fresh error value prototype-chained from the
    /// effective new-target.
    ///
    /// The new-target's `prototype` data property wins when it is an
    /// object; otherwise the runtime's error prototype is used.
    pub fn new_error_object(&mut self, new_target: &ObjRef) -> VResult<ObjRef> {
        self.charge_allocation()?;
        let prototype = match get_data_property(new_target, "prototype", LookupMode::Own) {
            Value::Object(proto) => proto,
            _ => self.error_prototype.clone(),
        };
        Ok(Object::alloc(
            ObjectKind::Error(veld_types::ErrorData::default()),
            Some(prototype),
        ))
    }

    // ══════════════════════════════════════════════════════════════════
    // Calls & coercion
    // ══════════════════════════════════════════════════════════════════

    /// Invoke a function object. `args[0]` is the receiver by
    /// convention. A fault thrown by the body becomes the pending fault.
    pub fn call_function(&mut self, fun: &ObjRef, args: &[Value]) -> VResult<Value> {
        let native = fun.borrow().as_function().and_then(|f| f.call.clone());
        let Some(native) = native else {
            return Err(self.throw_with_template(
                MessageTemplate::CalledNonCallable,
                &Value::Object(fun.clone()),
            ));
        };
        native(args).map_err(|fault| {
            if let Fault::Thrown(value) = &fault {
                self.pending_fault = Some(value.clone());
            }
            fault
        })
    }

    /// Invoke a function, swallowing any fault it raises. The pending
    /// fault is cleared on failure.
    pub fn try_call(&mut self, fun: &ObjRef, args: &[Value]) -> Option<Value> {
        match self.call_function(fun, args) {
            Ok(value) => Some(value),
            Err(_) => {
                self.clear_pending_fault();
                None
            }
        }
    }

    /// Coerce a value to an object. Nullish values fault; other
    /// primitives get a fresh wrapper object.
    pub fn to_object(&mut self, value: &Value) -> VResult<ObjRef> {
        match value {
            Value::Object(obj) => Ok(obj.clone()),
            Value::Undefined | Value::Null => {
                Err(self.throw_with_template(MessageTemplate::UndefinedOrNullToObject, value))
            }
            _ => self.new_object(Some(self.object_prototype.clone())),
        }
    }

    /// Ordinary to-string coercion. Invokes a user-visible `toString`
    /// method when the receiver has one (re-entrant, fallible).
    pub fn to_string(&mut self, value: &Value) -> VResult<Rc<str>> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::Undefined => Ok("undefined".into()),
            Value::Null => Ok("null".into()),
            Value::Bool(b) => Ok((if *b { "true" } else { "false" }).into()),
            Value::Number(n) => Ok(format_number(*n).into()),
            Value::Object(obj) => {
                let to_string =
                    get_data_property(obj, "toString", LookupMode::PrototypeChain);
                match to_string.as_object().filter(|f| f.borrow().is_function()) {
                    Some(fun) => {
                        let fun = fun.clone();
                        let result = self.call_function(&fun, &[value.clone()])?;
                        if result.is_object() {
                            return Err(self.throw_with_template(
                                MessageTemplate::CannotConvertToPrimitive,
                                value,
                            ));
                        }
                        self.to_string(&result)
                    }
                    None => Ok(self.no_side_effects_to_string(value)),
                }
            }
        }
    }

    /// Restricted display-string coercion: never re-enters user code.
    ///
    /// Error objects are rendered from their own `name`/`message` data
    /// slots only; accessors and inherited slots are ignored.
    pub fn no_side_effects_to_string(&self, value: &Value) -> Rc<str> {
        match value {
            Value::Str(s) => s.clone(),
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => (if *b { "true" } else { "false" }).into(),
            Value::Number(n) => format_number(*n).into(),
            Value::Object(obj) => {
                let inner = obj.borrow();
                match &inner.kind {
                    ObjectKind::Error(_) => {
                        let name = inner
                            .get_own_data_value("name")
                            .and_then(|v| v.as_str().map(str::to_string))
                            .unwrap_or_else(|| "Error".to_string());
                        let message = inner
                            .get_own_data_value("message")
                            .and_then(|v| v.as_str().map(str::to_string))
                            .unwrap_or_default();
                        if message.is_empty() {
                            name.into()
                        } else {
                            format!("{name}: {message}").into()
                        }
                    }
                    ObjectKind::Function(f) => {
                        format!("function {}() {{ [native code] }}", f.name).into()
                    }
                    ObjectKind::GlobalProxy => "[object global]".into(),
                    ObjectKind::Module(_) => "[object Module]".into(),
                    ObjectKind::Ordinary => "[object Object]".into(),
                }
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Message listeners
    // ══════════════════════════════════════════════════════════════════

    /// Register a message listener; returns its slot id.
    pub fn add_message_listener(&mut self, callback: MessageCallback, data: Value) -> ListenerId {
        self.listeners.push(Some(MessageListener { callback, data }));
        self.listeners.len() - 1
    }

    /// Tombstone a listener slot. The table is never compacted;
    /// dispatch skips holes.
    pub fn remove_message_listener(&mut self, id: ListenerId) {
        if let Some(slot) = self.listeners.get_mut(id) {
            *slot = None;
        }
    }

    pub(crate) fn live_listener_count(&self) -> usize {
        self.listeners.iter().flatten().count()
    }

    pub(crate) fn listener_snapshot(&self) -> Vec<Option<MessageListener>> {
        self.listeners.clone()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
