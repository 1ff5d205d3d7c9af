//! Object model: property maps, prototype chains, lookup.
//!
//! Properties live in an insertion-ordered map; enumeration order is
//! observable and part of the contract (method-name resolution walks own
//! enumerable keys in that order). Lookup never consults interceptors,
//! and a prototype-chain walk ends at the first object that requires an
//! access check.

use crate::error::{Fault, VResult};
use crate::frame::FrameSeq;
use crate::module::ModuleInstance;
use crate::script::Script;
use crate::value::{ObjRef, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Native implementation of a callable function.
///
/// Convention: `args[0]` is the receiver, the rest are the call
/// arguments.
pub type NativeFn = Rc<dyn Fn(&[Value]) -> VResult<Value>>;

/// Per-function bookkeeping shared by all interpreted functions.
#[derive(Clone)]
pub struct FunctionData {
    /// Declared name; empty for anonymous functions.
    pub name: String,
    /// The source unit this function was compiled from, if any.
    pub script: Option<Rc<Script>>,
    /// Native body, if the function is callable from Rust.
    pub call: Option<NativeFn>,
}

impl fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionData")
            .field("name", &self.name)
            .field("script", &self.script.as_ref().map(|s| s.name.clone()))
            .field("call", &self.call.as_ref().map(|_| "<native>"))
            .finish()
    }
}

/// Stack traces attached to an error object.
///
/// The detailed trace feeds diagnostics; the simple trace underlies the
/// lazily formatted user-visible trace text. Once set, a trace is only
/// read.
#[derive(Debug, Clone, Default)]
pub struct ErrorData {
    pub detailed_trace: Option<FrameSeq>,
    pub simple_trace: Option<FrameSeq>,
}

/// What kind of object this is. The kind never changes after allocation.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Ordinary,
    Function(FunctionData),
    Error(ErrorData),
    GlobalProxy,
    Module(ModuleInstance),
}

/// Attributes of a data property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAttributes {
    pub enumerable: bool,
    pub writable: bool,
    pub configurable: bool,
}

impl Default for PropertyAttributes {
    fn default() -> Self {
        Self {
            enumerable: true,
            writable: true,
            configurable: true,
        }
    }
}

impl PropertyAttributes {
    /// Writable and configurable, but hidden from enumeration.
    pub const DONT_ENUM: Self = Self {
        enumerable: false,
        writable: true,
        configurable: true,
    };
}

/// A single property slot.
#[derive(Debug, Clone)]
pub enum Property {
    Data {
        value: Value,
        attributes: PropertyAttributes,
    },
    Accessor {
        /// Getter function, or `Undefined` when absent.
        getter: Value,
        /// Setter function, or `Undefined` when absent.
        setter: Value,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { attributes, .. } => attributes.enumerable,
            Self::Accessor { enumerable, .. } => *enumerable,
        }
    }
}

/// A heap object: a kind tag, an ordered property map, and an optional
/// prototype link.
#[derive(Debug)]
pub struct Object {
    pub kind: ObjectKind,
    pub prototype: Option<ObjRef>,
    /// Sandboxed objects end prototype-chain walks without being scanned.
    pub needs_access_check: bool,
    extensible: bool,
    properties: IndexMap<String, Property>,
}

impl Object {
    /// Allocate a new object behind a shared reference.
    pub fn alloc(kind: ObjectKind, prototype: Option<ObjRef>) -> ObjRef {
        Rc::new(RefCell::new(Object {
            kind,
            prototype,
            needs_access_check: false,
            extensible: true,
            properties: IndexMap::new(),
        }))
    }

    // ── Kind queries ─────────────────────────────────────────────────

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.kind {
            ObjectKind::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ObjectKind::Error(_))
    }

    pub fn as_error(&self) -> Option<&ErrorData> {
        match &self.kind {
            ObjectKind::Error(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_error_mut(&mut self) -> Option<&mut ErrorData> {
        match &mut self.kind {
            ObjectKind::Error(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_global_proxy(&self) -> bool {
        matches!(self.kind, ObjectKind::GlobalProxy)
    }

    pub fn as_module(&self) -> Option<&ModuleInstance> {
        match &self.kind {
            ObjectKind::Module(instance) => Some(instance),
            _ => None,
        }
    }

    /// One-line label used when a value of this kind is displayed.
    pub fn brief_label(&self) -> String {
        match &self.kind {
            ObjectKind::Ordinary => "[object Object]".to_string(),
            ObjectKind::Function(f) if f.name.is_empty() => "[function]".to_string(),
            ObjectKind::Function(f) => format!("[function {}]", f.name),
            ObjectKind::Error(_) => "[object Error]".to_string(),
            ObjectKind::GlobalProxy => "[object global]".to_string(),
            ObjectKind::Module(_) => "[object Module]".to_string(),
        }
    }

    // ── Property storage ─────────────────────────────────────────────

    /// Own property slot by name, ignoring the prototype chain.
    pub fn get_own_property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Own data-property value by name, or `None` for accessors and
    /// missing slots.
    pub fn get_own_data_value(&self, name: &str) -> Option<Value> {
        match self.properties.get(name)? {
            Property::Data { value, .. } => Some(value.clone()),
            Property::Accessor { .. } => None,
        }
    }

    /// Define (or redefine) a data property.
    pub fn define_data_property(
        &mut self,
        name: &str,
        value: Value,
        attributes: PropertyAttributes,
    ) -> VResult<()> {
        if !self.extensible && !self.properties.contains_key(name) {
            return Err(Fault::Thrown(Value::string(format!(
                "cannot define property '{name}' on a non-extensible object"
            ))));
        }
        self.properties
            .insert(name.to_string(), Property::Data { value, attributes });
        Ok(())
    }

    /// Define (or redefine) an accessor property. Absent getter/setter
    /// slots are `Undefined`.
    pub fn define_accessor_property(
        &mut self,
        name: &str,
        getter: Value,
        setter: Value,
        enumerable: bool,
    ) -> VResult<()> {
        if !self.extensible && !self.properties.contains_key(name) {
            return Err(Fault::Thrown(Value::string(format!(
                "cannot define property '{name}' on a non-extensible object"
            ))));
        }
        self.properties.insert(
            name.to_string(),
            Property::Accessor {
                getter,
                setter,
                enumerable,
                configurable: true,
            },
        );
        Ok(())
    }

    /// Prevent further property additions.
    pub fn prevent_extensions(&mut self) {
        self.extensible = false;
    }

    /// Own enumerable keys, in insertion order.
    pub fn own_enum_keys(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|(_, prop)| prop.is_enumerable())
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// How far a property lookup may travel.
///
/// Interceptors are never consulted on this path; both modes read the
/// property maps directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Own properties only.
    Own,
    /// Own properties, then the prototype chain.
    PrototypeChain,
}

/// Find the first property slot named `name`, per `mode`.
///
/// A chain walk ends (without a match) at the first object that requires
/// an access check.
pub fn lookup_property(obj: &ObjRef, name: &str, mode: LookupMode) -> Option<Property> {
    match mode {
        LookupMode::Own => {
            let inner = obj.borrow();
            if inner.needs_access_check {
                return None;
            }
            inner.get_own_property(name).cloned()
        }
        LookupMode::PrototypeChain => {
            for current in prototype_chain(obj) {
                if let Some(prop) = current.borrow().get_own_property(name) {
                    return Some(prop.clone());
                }
            }
            None
        }
    }
}

/// Identical-value data lookup: the first data property named `name`,
/// or `Undefined` when the slot is missing or is an accessor.
pub fn get_data_property(obj: &ObjRef, name: &str, mode: LookupMode) -> Value {
    match lookup_property(obj, name, mode) {
        Some(Property::Data { value, .. }) => value,
        _ => Value::Undefined,
    }
}

const MAX_CHAIN_HOPS: usize = 1_000;

/// Iterator over the prototype chain, starting at the receiver itself.
///
/// Objects that require an access check terminate the walk and are not
/// yielded.
pub struct PrototypeChainIter {
    next: Option<ObjRef>,
    hops: usize,
}

impl Iterator for PrototypeChainIter {
    type Item = ObjRef;

    fn next(&mut self) -> Option<ObjRef> {
        let current = self.next.take()?;
        if current.borrow().needs_access_check || self.hops >= MAX_CHAIN_HOPS {
            return None;
        }
        self.hops += 1;
        self.next = current.borrow().prototype.clone();
        Some(current)
    }
}

/// Walk the prototype chain starting at (and including) `start`.
pub fn prototype_chain(start: &ObjRef) -> PrototypeChainIter {
    PrototypeChainIter {
        next: Some(start.clone()),
        hops: 0,
    }
}
