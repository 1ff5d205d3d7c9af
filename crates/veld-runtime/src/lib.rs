//! Veld diagnostics core.
//!
//! Turns internal error conditions into structured, embedder-consumable
//! values: parameterized message templates, message objects and their
//! reporting pipeline, symbolic call sites over captured stack frames,
//! and the error-value constructor.

pub mod call_site;
pub mod errors;
pub mod frames;
pub mod messages;
pub mod runtime;
pub mod templates;
pub mod trace;

pub use call_site::CallSite;
pub use errors::construct_error;
pub use frames::{ActivationFrame, FrameSkipMode};
pub use messages::{MessageHandler, MessageLocation, MessageObject};
pub use runtime::{ListenerId, MessageCallback, MessageListener, Runtime};
pub use templates::{format_message_with_value, MessageTemplate};
pub use trace::{
    project_frame, project_message, render_stack_trace, RenderedFrame, RenderedMessage,
};
