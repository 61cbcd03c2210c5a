//! Format engine: `{}` / `{N}` placeholders with per-argument directives
//!
//! Template syntax:
//!
//! | Placeholder | Meaning                                   |
//! |-------------|-------------------------------------------|
//! | `{}`        | next positional argument                  |
//! | `{N}`       | argument `N` (0-based)                    |
//! | `{.N}`      | fixed notation with `N` fractional digits |
//! | `{b}`       | binary integer                            |
//! | `{x}`/`{X}` | lower/upper hex integer                   |
//! | `{e}`/`{E}` | scientific notation                       |
//! | `{g}`       | fixed or scientific depending on magnitude|
//! | `{{` `}}`   | literal braces                            |
//!
//! Index and directive compose: `{0.3}`, `{1X}`, `{2.4e}`.
//!
//! ```
//! use flog::format::render;
//!
//! assert_eq!(render("{0} is {1}", &[13.into(), 10.into()]).unwrap(), "13 is 10");
//! assert_eq!(render("{X}", &[255.into()]).unwrap(), "FF");
//! assert_eq!(render("{.3}", &[3.141592653589793.into()]).unwrap(), "3.142");
//! ```

pub mod argument;
pub mod cache;
pub mod template;

pub use argument::{Directive, FormatArgument, Notation, Value, MAX_PRECISION};
pub use cache::{TemplateCache, DEFAULT_TEMPLATE_CACHE_CAPACITY};
pub use template::FormatTemplate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A placeholder refers past the end of the argument list
    #[error("placeholder index {index} out of range ({count} argument(s) supplied)")]
    IndexOutOfRange { index: usize, count: usize },

    /// `{` with no closing `}`
    #[error("unmatched '{{' at byte {position}")]
    UnmatchedOpen { position: usize },

    /// `}` that is neither closing a placeholder nor escaped as `}}`
    #[error("unmatched '}}' at byte {position}")]
    UnmatchedClose { position: usize },

    /// Unrecognized characters inside a placeholder
    #[error("invalid placeholder '{{{directive}}}' at byte {position}")]
    InvalidDirective { directive: String, position: usize },

    /// Directive cannot be applied to the argument's kind
    #[error("directive '{directive}' cannot format a {kind} argument")]
    IncompatibleDirective {
        directive: String,
        kind: &'static str,
    },
}

/// Parse and render in one step, without caching.
pub fn render(template: &str, args: &[FormatArgument<'_>]) -> Result<String, FormatError> {
    FormatTemplate::parse(template)?.render(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FormatError::UnmatchedOpen { position: 4 }.to_string(),
            "unmatched '{' at byte 4"
        );
        assert_eq!(
            FormatError::InvalidDirective {
                directive: "q".to_string(),
                position: 1
            }
            .to_string(),
            "invalid placeholder '{q}' at byte 1"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let args = [FormatArgument::from(42), "disk".into(), 0.5.into()];
        let first = render("{1}: {0X} at {2.2}", &args).unwrap();
        let second = render("{1}: {0X} at {2.2}", &args).unwrap();
        assert_eq!(first, "disk: 2A at 0.50");
        assert_eq!(first, second);
    }
}
