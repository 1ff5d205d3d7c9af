//! Call sites: symbolic views of captured stack frames.
//!
//! A call site is a tagged union over the frame kinds the runtime can
//! capture. The variant is decided exactly once, by probing the raw
//! descriptor at construction; every derived query dispatches on the
//! tag and degrades to a no-value answer on `Invalid`.

use crate::runtime::Runtime;
use std::rc::Rc;
use veld_types::{
    lookup_property, prototype_chain, CompilationKind, LookupMode, ObjRef, Property, RawFrame,
    Script, Value,
};

/// One entry of a captured stack trace.
#[derive(Debug, Clone)]
pub enum CallSite {
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
    /// A malformed descriptor. Queries return no-value answers.
    Invalid,
}

impl CallSite {
    /// Probe a raw frame descriptor and fix the variant.
    ///
    /// A function slot holding a function object wins; otherwise a
    /// non-negative integer module-function index together with a
    /// module slot makes a foreign frame. Everything else, including a
    /// position slot that fails integer coercion, is `Invalid`.
    pub fn new(frame: &RawFrame) -> Self {
        let Some(position) = frame.position.as_ref().and_then(Value::to_int32) else {
            return Self::Invalid;
        };

        if let Some(function) = frame
            .function
            .as_ref()
            .and_then(Value::as_object)
            .filter(|obj| obj.borrow().is_function())
        {
            let receiver = frame.receiver.clone().unwrap_or(Value::Undefined);
            return Self::Interpreted {
                function: function.clone(),
                receiver,
                position,
            };
        }

        if let Some(index) = frame
            .func_index
            .as_ref()
            .and_then(Value::to_int32)
            .filter(|index| *index >= 0)
        {
            if let Some(instance) = frame.module.as_ref().and_then(Value::as_object) {
                return Self::Foreign {
                    instance: instance.clone(),
                    func_index: index as u32,
                    position,
                };
            }
        }

        Self::Invalid
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self, Self::Foreign { .. })
    }

    pub fn is_interpreted(&self) -> bool {
        matches!(self, Self::Interpreted { .. })
    }

    /// The byte offset of this activation, if the site is valid.
    pub fn position(&self) -> Option<i32> {
        match self {
            Self::Interpreted { position, .. } | Self::Foreign { position, .. } => Some(*position),
            Self::Invalid => None,
        }
    }

    /// The source unit owning the interpreted function, if any.
    fn script(&self) -> Option<Rc<Script>> {
        match self {
            Self::Interpreted { function, .. } => function
                .borrow()
                .as_function()
                .and_then(|data| data.script.clone()),
            _ => None,
        }
    }

    /// Declared name of the owning source unit.
    pub fn file_name(&self) -> Option<Value> {
        self.script().map(|script| script.name.clone())
    }

    /// The function's name: a foreign module names its own functions;
    /// an interpreted function uses its stored name, or the literal
    /// `"eval"` when anonymous inside an eval unit.
    pub fn function_name(&self) -> Option<String> {
        match self {
            Self::Foreign {
                instance,
                func_index,
                ..
            } => instance
                .borrow()
                .as_module()
                .and_then(|module| module.function_name(*func_index).map(str::to_string)),
            Self::Interpreted { function, .. } => {
                let name = function
                    .borrow()
                    .as_function()
                    .map(|data| data.name.clone())
                    .unwrap_or_default();
                if !name.is_empty() {
                    return Some(name);
                }
                if self
                    .script()
                    .is_some_and(|script| script.compilation == CompilationKind::Eval)
                {
                    return Some("eval".to_string());
                }
                None
            }
            Self::Invalid => None,
        }
    }

    /// An explicit source-url override wins over the unit's declared
    /// name.
    pub fn script_name_or_source_url(&self) -> Option<Value> {
        let script = self.script()?;
        match &script.source_url {
            Some(url) => Some(Value::string(url.as_str())),
            None => Some(script.name.clone()),
        }
    }

    /// 1-based line of this activation, or -1.
    pub fn line_number(&self) -> i32 {
        self.position_mapping(|script, offset| script.line_number(offset) as i32 + 1)
    }

    /// 1-based column of this activation, or -1.
    pub fn column_number(&self) -> i32 {
        self.position_mapping(|script, offset| script.column_number(offset) as i32 + 1)
    }

    fn position_mapping(&self, map: impl FnOnce(&Script, usize) -> i32) -> i32 {
        let Self::Interpreted { position, .. } = self else {
            return -1;
        };
        if *position < 0 {
            return -1;
        }
        match self.script() {
            Some(script) => map(&script, *position as usize),
            None => -1,
        }
    }

    /// Whether the owning unit is a runtime-native built-in.
    pub fn is_native(&self) -> bool {
        self.script().is_some_and(|script| script.native)
    }

    /// Whether the owning unit was compiled from `eval`.
    pub fn is_eval(&self) -> bool {
        self.script()
            .is_some_and(|script| script.compilation == CompilationKind::Eval)
    }

    /// Toplevel activations have no meaningful receiver: the global
    /// proxy, `null`, or `undefined`. Foreign frames are never
    /// toplevel.
    pub fn is_toplevel(&self) -> bool {
        match self {
            Self::Interpreted { receiver, .. } => match receiver {
                Value::Object(obj) => obj.borrow().is_global_proxy(),
                value => value.is_nullish(),
            },
            _ => false,
        }
    }

    /// Constructor activations are marked either by the sentinel
    /// receiver (builtin exit frames, where the true receiver is
    /// unobservable) or by the receiver's own `constructor` data slot
    /// being this very function.
    pub fn is_constructor(&self, rt: &Runtime) -> bool {
        let Self::Interpreted {
            function, receiver, ..
        } = self
        else {
            return false;
        };
        if receiver.is_identical_to(rt.constructor_marker()) {
            return true;
        }
        let Some(obj) = receiver.as_object() else {
            return false;
        };
        obj.borrow()
            .get_own_data_value("constructor")
            .is_some_and(|value| value.is_identical_to(function))
    }

    // ══════════════════════════════════════════════════════════════════
    // Method-name resolution
    // ══════════════════════════════════════════════════════════════════

    /// Recover the property name this function was invoked under.
    ///
    /// The call itself never retains the name, so it is searched for:
    /// first a fast probe of the function's declared name (with the
    /// accessor `"get "`/`"set "` prefixes stripped), then a full walk
    /// of the receiver's prototype chain over own enumerable keys. Two
    /// independent bindings make the answer ambiguous, and ambiguity is
    /// resolved as no-value, never a guess.
    pub fn method_name(&self, rt: &mut Runtime) -> Option<String> {
        let Self::Interpreted {
            function, receiver, ..
        } = self
        else {
            return None;
        };
        if receiver.is_nullish() {
            return None;
        }
        let receiver_obj = match rt.to_object(receiver) {
            Ok(obj) => obj,
            Err(_) => {
                rt.clear_pending_fault();
                return None;
            }
        };

        // Fast path: the declared name, minus an accessor prefix, bound
        // exactly once in the common case.
        let declared = function
            .borrow()
            .as_function()
            .map(|data| data.name.clone())
            .unwrap_or_default();
        if !declared.is_empty() {
            let candidate = declared
                .strip_prefix("get ")
                .or_else(|| declared.strip_prefix("set "))
                .unwrap_or(&declared);
            if check_method_name(
                &receiver_obj,
                candidate,
                function,
                LookupMode::PrototypeChain,
            ) {
                return Some(candidate.to_string());
            }
        }

        // General path: enumerate every hop of the chain.
        let mut found: Option<String> = None;
        for current in prototype_chain(&receiver_obj) {
            let keys = current.borrow().own_enum_keys();
            for key in keys {
                if !check_method_name(&current, &key, function, LookupMode::Own) {
                    continue;
                }
                if found.is_some() {
                    // Duplicate binding: ambiguous.
                    return None;
                }
                found = Some(key);
            }
        }
        found
    }
}

/// Whether `obj`'s property `name` binds `fun` as its data value or as
/// either half of its accessor pair.
fn check_method_name(obj: &ObjRef, name: &str, fun: &ObjRef, mode: LookupMode) -> bool {
    match lookup_property(obj, name, mode) {
        Some(Property::Data { value, .. }) => value.is_identical_to(fun),
        Some(Property::Accessor { getter, setter, .. }) => {
            getter.is_identical_to(fun) || setter.is_identical_to(fun)
        }
        None => false,
    }
}
