//! Source units and offset→position mapping.

use crate::value::Value;

/// How a source unit entered the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationKind {
    /// Loaded by the host embedder.
    Host,
    /// Compiled from a dynamic `eval` call.
    Eval,
}

/// A compiled source unit.
///
/// Line and column numbers are 0-based internally; callers that produce
/// human-facing positions add 1 at that boundary.
#[derive(Debug, Clone)]
pub struct Script {
    /// Declared name. May be any value; non-string names render as
    /// `<unknown>` in the default reporter.
    pub name: Value,
    /// Explicit source-url override, preferred over the declared name.
    pub source_url: Option<String>,
    pub compilation: CompilationKind,
    /// Runtime-native built-in unit.
    pub native: bool,
    source: String,
    /// Cached line start byte offsets for fast position lookup.
    line_starts: Vec<usize>,
}

impl Script {
    /// Create a new script from its declared name and source text.
    pub fn new(name: Value, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name,
            source_url: None,
            compilation: CompilationKind::Host,
            native: false,
            source,
            line_starts,
        }
    }

    /// The designated "unknown" unit used when a diagnostic has no
    /// location.
    pub fn empty() -> Self {
        Self::new(Value::Undefined, "")
    }

    /// Attach a source-url override.
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Mark this unit as eval-compiled.
    pub fn with_compilation(mut self, compilation: CompilationKind) -> Self {
        self.compilation = compilation;
        self
    }

    /// Mark this unit as runtime-native.
    pub fn with_native(mut self) -> Self {
        self.native = true;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 0-based line containing `offset`. Offsets past the end of the
    /// source clamp to the last line.
    pub fn line_number(&self, offset: usize) -> u32 {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        (line - 1) as u32
    }

    /// 0-based column of `offset` within its line.
    pub fn column_number(&self, offset: usize) -> u32 {
        let line = self.line_number(offset) as usize;
        let start = self.line_starts[line];
        offset.saturating_sub(start) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(source: &str) -> Script {
        Script::new(Value::string("test.veld"), source)
    }

    #[test]
    fn test_line_number_mapping() {
        let s = script("one\ntwo\nthree");
        assert_eq!(s.line_number(0), 0);
        assert_eq!(s.line_number(3), 0);
        assert_eq!(s.line_number(4), 1);
        assert_eq!(s.line_number(8), 2);
    }

    #[test]
    fn test_column_number_mapping() {
        let s = script("one\ntwo\nthree");
        assert_eq!(s.column_number(0), 0);
        assert_eq!(s.column_number(5), 1);
        assert_eq!(s.column_number(10), 2);
    }

    #[test]
    fn test_offset_past_end_clamps_to_last_line() {
        let s = script("a\nb");
        assert_eq!(s.line_number(100), 1);
        assert_eq!(s.line_count(), 2);
    }

    #[test]
    fn test_empty_script() {
        let s = Script::empty();
        assert!(s.name.is_undefined());
        assert_eq!(s.line_number(0), 0);
        assert_eq!(s.line_count(), 1);
    }

    #[test]
    fn test_builders() {
        let s = script("")
            .with_source_url("https://host/app.veld")
            .with_compilation(CompilationKind::Eval)
            .with_native();
        assert_eq!(s.source_url.as_deref(), Some("https://host/app.veld"));
        assert_eq!(s.compilation, CompilationKind::Eval);
        assert!(s.native);
    }
}
