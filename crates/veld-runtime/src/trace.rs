//! User-visible stack-trace rendering and embedder projections.

use crate::call_site::CallSite;
use crate::messages::{MessageHandler, MessageObject};
use crate::runtime::Runtime;
use serde::{Deserialize, Serialize};
use veld_types::FrameSeq;

/// Render a captured frame sequence as the classic indented trace text,
/// one `    at …` line per frame, youngest first.
pub fn render_stack_trace(rt: &mut Runtime, frames: &FrameSeq) -> String {
    let mut out = String::new();
    for raw in frames.iter() {
        let site = CallSite::new(raw);
        out.push_str(&render_frame_line(rt, &site));
        out.push('\n');
    }
    out
}

fn render_frame_line(rt: &mut Runtime, site: &CallSite) -> String {
    match site {
        CallSite::Invalid => "    at <anonymous>".to_string(),
        CallSite::Foreign {
            instance,
            func_index,
            position,
        } => {
            let module = instance
                .borrow()
                .as_module()
                .and_then(|m| m.name.clone())
                .unwrap_or_else(|| "<module>".to_string());
            match site.function_name() {
                Some(name) => format!("    at {name} ({module}[{func_index}]:{position})"),
                None => format!("    at {module}[{func_index}] ({position})"),
            }
        }
        CallSite::Interpreted { .. } => {
            let name = site
                .method_name(rt)
                .or_else(|| site.function_name())
                .unwrap_or_else(|| "<anonymous>".to_string());
            if site.is_native() {
                return format!("    at {name} (native)");
            }
            let file = site
                .script_name_or_source_url()
                .and_then(|value| value.as_str().map(str::to_string))
                .unwrap_or_else(|| "<anonymous>".to_string());
            let line = site.line_number();
            if line >= 0 {
                format!("    at {name} ({file}:{line}:{})", site.column_number())
            } else {
                format!("    at {name} ({file})")
            }
        }
    }
}

/// Embedder-facing projection of one call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedFrame {
    pub function_name: Option<String>,
    pub method_name: Option<String>,
    pub file_name: Option<String>,
    pub line: i32,
    pub column: i32,
    pub is_toplevel: bool,
    pub is_eval: bool,
    pub is_native: bool,
    pub is_constructor: bool,
    pub is_foreign: bool,
}

/// Project a call site into its serializable form.
pub fn project_frame(rt: &mut Runtime, site: &CallSite) -> RenderedFrame {
    RenderedFrame {
        function_name: site.function_name(),
        method_name: site.method_name(rt),
        file_name: site
            .file_name()
            .and_then(|value| value.as_str().map(str::to_string)),
        line: site.line_number(),
        column: site.column_number(),
        is_toplevel: site.is_toplevel(),
        is_eval: site.is_eval(),
        is_native: site.is_native(),
        is_constructor: site.is_constructor(rt),
        is_foreign: site.is_foreign(),
    }
}

/// Embedder-facing projection of a reported message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// The formatted message text.
    pub text: String,
    /// Declared name of the source unit, when textual.
    pub script_name: Option<String>,
    /// 1-based line of the message location, or -1 without a location.
    pub line: i32,
    pub start: i32,
    pub end: i32,
    pub frames: Vec<RenderedFrame>,
}

/// Project a message object (and its captured frames, if any) for the
/// embedder.
pub fn project_message(rt: &mut Runtime, message: &MessageObject) -> RenderedMessage {
    let text = MessageHandler::get_message(rt, message);
    let script_name = message.script().name.as_str().map(str::to_string);
    let line = if message.start_pos() >= 0 {
        message.script().line_number(message.start_pos() as usize) as i32 + 1
    } else {
        -1
    };
    let frames = message
        .stack_frames()
        .cloned()
        .map(|frames| {
            frames
                .iter()
                .map(|raw| project_frame(rt, &CallSite::new(raw)))
                .collect()
        })
        .unwrap_or_default();
    RenderedMessage {
        text,
        script_name,
        line,
        start: message.start_pos(),
        end: message.end_pos(),
        frames,
    }
}
