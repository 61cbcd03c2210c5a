//! Typed arguments and rendering directives

use std::fmt;

/// Numeric rendering selected by a directive character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    /// `b`: binary digits, no prefix
    Binary,
    /// `x`: lowercase hex, no prefix
    LowerHex,
    /// `X`: uppercase hex, no prefix
    UpperHex,
    /// `e` / `E`: exponential form, `3.142e+00`
    Scientific { uppercase: bool },
    /// `g`: fixed inside `[1e-4, 1e16)`, exponential outside
    General,
}

impl Notation {
    pub(crate) fn from_char(c: char) -> Option<Self> {
        match c {
            'b' => Some(Notation::Binary),
            'x' => Some(Notation::LowerHex),
            'X' => Some(Notation::UpperHex),
            'e' => Some(Notation::Scientific { uppercase: false }),
            'E' => Some(Notation::Scientific { uppercase: true }),
            'g' => Some(Notation::General),
            _ => None,
        }
    }

    /// Integer-only bases, which cannot take a precision.
    pub fn is_base(&self) -> bool {
        matches!(
            self,
            Notation::Binary | Notation::LowerHex | Notation::UpperHex
        )
    }
}

/// Largest precision the standard formatter accepts.
pub const MAX_PRECISION: usize = u16::MAX as usize;

/// Rendering directive: `[.precision][notation]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directive {
    pub precision: Option<usize>,
    pub notation: Option<Notation>,
}

impl Directive {
    pub fn is_empty(&self) -> bool {
        self.precision.is_none() && self.notation.is_none()
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(precision) = self.precision {
            write!(f, ".{}", precision)?;
        }
        if let Some(notation) = self.notation {
            let c = match notation {
                Notation::Binary => 'b',
                Notation::LowerHex => 'x',
                Notation::UpperHex => 'X',
                Notation::Scientific { uppercase: false } => 'e',
                Notation::Scientific { uppercase: true } => 'E',
                Notation::General => 'g',
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// The value half of a [`FormatArgument`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(&'a str),
}

impl Value<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
        }
    }
}

/// One positional argument. Strings are borrowed until rendering.
///
/// A directive attached here applies only when the placeholder itself has none.
///
/// ```
/// use flog::format::{render, FormatArgument};
///
/// let out = render("{} / {}", &[FormatArgument::from(255).hex(), 255.into()]).unwrap();
/// assert_eq!(out, "ff / 255");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatArgument<'a> {
    value: Value<'a>,
    directive: Directive,
}

impl<'a> FormatArgument<'a> {
    pub fn new(value: Value<'a>) -> Self {
        Self {
            value,
            directive: Directive::default(),
        }
    }

    pub fn value(&self) -> &Value<'a> {
        &self.value
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    #[must_use]
    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directive = directive;
        self
    }

    #[must_use]
    pub fn binary(mut self) -> Self {
        self.directive.notation = Some(Notation::Binary);
        self
    }

    #[must_use]
    pub fn hex(mut self) -> Self {
        self.directive.notation = Some(Notation::LowerHex);
        self
    }

    #[must_use]
    pub fn upper_hex(mut self) -> Self {
        self.directive.notation = Some(Notation::UpperHex);
        self
    }

    /// Digits after the point, capped at [`MAX_PRECISION`].
    #[must_use]
    pub fn precision(mut self, digits: usize) -> Self {
        self.directive.precision = Some(digits.min(MAX_PRECISION));
        self
    }

    #[must_use]
    pub fn scientific(mut self) -> Self {
        self.directive.notation = Some(Notation::Scientific { uppercase: false });
        self
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for FormatArgument<'_> {
            fn from(v: $t) -> Self {
                FormatArgument::new(Value::Int(i64::from(v)))
            }
        }
    )*};
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for FormatArgument<'_> {
            fn from(v: $t) -> Self {
                FormatArgument::new(Value::UInt(u64::from(v)))
            }
        }
    )*};
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<isize> for FormatArgument<'_> {
    fn from(v: isize) -> Self {
        // isize is at most 64 bits on supported targets
        FormatArgument::new(Value::Int(v as i64))
    }
}

impl From<usize> for FormatArgument<'_> {
    fn from(v: usize) -> Self {
        FormatArgument::new(Value::UInt(v as u64))
    }
}

impl From<f32> for FormatArgument<'_> {
    fn from(v: f32) -> Self {
        FormatArgument::new(Value::Float(f64::from(v)))
    }
}

impl From<f64> for FormatArgument<'_> {
    fn from(v: f64) -> Self {
        FormatArgument::new(Value::Float(v))
    }
}

impl From<bool> for FormatArgument<'_> {
    fn from(v: bool) -> Self {
        FormatArgument::new(Value::Bool(v))
    }
}

impl From<char> for FormatArgument<'_> {
    fn from(v: char) -> Self {
        FormatArgument::new(Value::Char(v))
    }
}

impl<'a> From<&'a str> for FormatArgument<'a> {
    fn from(v: &'a str) -> Self {
        FormatArgument::new(Value::Str(v))
    }
}

impl<'a> From<&'a String> for FormatArgument<'a> {
    fn from(v: &'a String) -> Self {
        FormatArgument::new(Value::Str(v.as_str()))
    }
}

macro_rules! impl_from_ref {
    ($($t:ty),*) => {$(
        impl From<&$t> for FormatArgument<'_> {
            fn from(v: &$t) -> Self {
                FormatArgument::from(*v)
            }
        }
    )*};
}

impl_from_ref!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char);
