//! Shared runtime types for the Veld diagnostics subsystem.
//!
//! This crate defines the value representation, the object model
//! (property maps, prototype chains), source units, foreign-module
//! instances, and the fault type used across the runtime crates.

mod error;
mod frame;
pub mod module;
pub mod object;
pub mod script;
pub mod value;

pub use error::{Fault, VResult};
pub use frame::{FrameSeq, RawFrame};
pub use module::ModuleInstance;
pub use object::{
    get_data_property, lookup_property, prototype_chain, ErrorData, FunctionData, LookupMode,
    NativeFn, Object, ObjectKind, Property, PropertyAttributes,
};
pub use script::{CompilationKind, Script};
pub use value::{ObjRef, Value};
