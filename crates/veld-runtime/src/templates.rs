//! Static diagnostic message templates and the `%` formatter.

use crate::runtime::Runtime;
use veld_types::{Fault, VResult, Value};

macro_rules! message_templates {
    ($(($name:ident, $text:expr),)*) => {
        /// Dense template id table. `LastMessage` is the terminal
        /// sentinel and has no template string.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum MessageTemplate {
            $($name,)*
            LastMessage,
        }

        impl MessageTemplate {
            /// The template text for this id; `None` for the sentinel.
            pub fn template_string(self) -> Option<&'static str> {
                match self {
                    $(Self::$name => Some($text),)*
                    Self::LastMessage => None,
                }
            }

            /// Recover a template from a raw dense index, as supplied by
            /// an embedder. Out-of-range indices yield `None`.
            pub fn from_index(index: u16) -> Option<Self> {
                const TABLE: &[MessageTemplate] = &[$(MessageTemplate::$name,)*];
                TABLE.get(index as usize).copied()
            }
        }
    };
}

message_templates! {
    (ApplyNonFunction, "% is not a function"),
    (CalledNonCallable, "% is not callable"),
    (CannotConvertToPrimitive, "Cannot convert object to primitive value"),
    (CannotReadProperty, "Cannot read property '%' of %"),
    (CannotWriteProperty, "Cannot set property '%' of %"),
    (IncompatibleMethodReceiver, "Method % called on incompatible receiver %"),
    (ModuleFunctionTrap, "Foreign function %[%] trapped at offset %"),
    (ModuloByZero, "% %% 0 is undefined"),
    (NotConstructor, "% is not a constructor"),
    (NotDefined, "% is not defined"),
    (PropertyNotFunction, "Property '%' of % is not a function"),
    (StackOverflow, "Maximum call stack size exceeded"),
    (UndefinedOrNullToObject, "Cannot convert % to an object"),
    (UnsupportedOperation, "Unsupported operation: %"),
}

impl MessageTemplate {
    /// Format this template with up to three positional arguments.
    ///
    /// `%%` emits a literal `%`; every other `%` consumes the next
    /// unused argument in order. Consuming a fourth argument is a
    /// contract violation: no template in the table has more than three
    /// markers.
    pub fn format(self, arg0: &str, arg1: &str, arg2: &str) -> VResult<String> {
        let Some(template) = self.template_string() else {
            return Err(Fault::IllegalOperation(format!(
                "message template {self:?} has no format string"
            )));
        };
        let args = [arg0, arg1, arg2];
        let mut used = 0;
        let mut out = String::with_capacity(template.len() + arg0.len() + arg1.len() + arg2.len());
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
            } else {
                debug_assert!(used < args.len(), "template consumed a fourth argument");
                out.push_str(args.get(used).copied().unwrap_or_default());
                used += 1;
            }
        }
        Ok(out)
    }
}

/// Format a template with a single not-necessarily-textual argument.
///
/// A string argument is used directly; anything else goes through the
/// restricted, side-effect-free display coercion. This path never
/// raises: a failed lookup or format collapses to the literal
/// `"<error>"`.
pub fn format_message_with_value(rt: &Runtime, template: MessageTemplate, arg: &Value) -> String {
    let arg0 = match arg {
        Value::Str(s) => s.to_string(),
        other => rt.no_side_effects_to_string(other).to_string(),
    };
    template
        .format(&arg0, "", "")
        .unwrap_or_else(|_| "<error>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_non_sentinel_template_has_text() {
        let mut index = 0;
        while let Some(template) = MessageTemplate::from_index(index) {
            assert!(
                template.template_string().is_some(),
                "{template:?} has no template string"
            );
            index += 1;
        }
        assert!(index > 0);
    }

    #[test]
    fn test_sentinel_is_not_indexable() {
        let mut last = 0;
        while MessageTemplate::from_index(last).is_some() {
            last += 1;
        }
        assert_eq!(MessageTemplate::LastMessage as u16, last);
        assert_eq!(MessageTemplate::LastMessage.template_string(), None);
    }

    #[test]
    fn test_format_substitutes_in_order() {
        let text = MessageTemplate::ModuleFunctionTrap
            .format("env", "3", "17")
            .unwrap();
        assert_eq!(text, "Foreign function env[3] trapped at offset 17");
    }

    #[test]
    fn test_percent_escape_is_literal() {
        let text = MessageTemplate::ModuloByZero.format("x", "", "").unwrap();
        assert_eq!(text, "x % 0 is undefined");
    }

    #[test]
    fn test_sentinel_format_is_illegal_operation() {
        let err = MessageTemplate::LastMessage.format("a", "b", "c");
        assert!(matches!(err, Err(Fault::IllegalOperation(_))));
    }

    #[test]
    fn test_format_is_deterministic() {
        let first = MessageTemplate::CannotReadProperty
            .format("x", "undefined", "")
            .unwrap();
        for _ in 0..100 {
            let again = MessageTemplate::CannotReadProperty
                .format("x", "undefined", "")
                .unwrap();
            assert_eq!(first, again);
        }
        assert_eq!(first, "Cannot read property 'x' of undefined");
    }
}
