//! Template parsing and rendering

use super::argument::{Directive, FormatArgument, Notation, Value, MAX_PRECISION};
use super::FormatError;
use std::fmt::Write;

/// Magnitudes inside this range stay in fixed notation under the `g` directive.
const GENERAL_FIXED_RANGE: std::ops::Range<f64> = 1e-4..1e16;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placeholder {
    /// Argument position, already resolved from the implicit cursor when unindexed
    pub index: usize,
    pub directive: Directive,
}

/// A parsed template: literal runs and placeholders in source order.
///
/// Parsing resolves every implicit `{}` to a concrete argument index, so
/// rendering is a single pass with no further bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatTemplate {
    segments: Vec<Segment>,
    required_args: usize,
    literal_len: usize,
}

impl FormatTemplate {
    pub fn parse(template: &str) -> Result<Self, FormatError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut cursor = 0usize;
        let mut required_args = 0usize;
        let mut literal_len = 0usize;

        let mut chars = template.char_indices().peekable();
        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if chars.next_if(|&(_, next)| next == '{').is_some() {
                        literal.push('{');
                        continue;
                    }
                    let start = pos + 1;
                    let end = loop {
                        match chars.next() {
                            Some((end, '}')) => break end,
                            Some((_, '{')) | None => {
                                return Err(FormatError::UnmatchedOpen { position: pos })
                            }
                            Some(_) => {}
                        }
                    };

                    let placeholder = parse_placeholder(&template[start..end], start, &mut cursor)?;
                    required_args = required_args.max(placeholder.index + 1);

                    if !literal.is_empty() {
                        literal_len += literal.len();
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(placeholder));
                }
                '}' => {
                    if chars.next_if(|&(_, next)| next == '}').is_some() {
                        literal.push('}');
                    } else {
                        return Err(FormatError::UnmatchedClose { position: pos });
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            literal_len += literal.len();
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            segments,
            required_args,
            literal_len,
        })
    }

    /// Smallest argument count that satisfies every placeholder.
    pub fn required_args(&self) -> usize {
        self.required_args
    }

    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder(_)))
            .count()
    }

    pub fn render(&self, args: &[FormatArgument<'_>]) -> Result<String, FormatError> {
        let mut out = String::with_capacity(self.literal_len + args.len() * 8);
        self.render_into(&mut out, args)?;
        Ok(out)
    }

    pub fn render_into(
        &self,
        out: &mut String,
        args: &[FormatArgument<'_>],
    ) -> Result<(), FormatError> {
        if self.required_args > args.len() {
            return Err(FormatError::IndexOutOfRange {
                index: self.required_args - 1,
                count: args.len(),
            });
        }

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(placeholder) => {
                    let arg = &args[placeholder.index];
                    let directive = if placeholder.directive.is_empty() {
                        *arg.directive()
                    } else {
                        placeholder.directive
                    };
                    write_value(out, arg.value(), &directive)?;
                }
            }
        }
        Ok(())
    }
}

fn parse_placeholder(
    body: &str,
    offset: usize,
    cursor: &mut usize,
) -> Result<Placeholder, FormatError> {
    let invalid = || FormatError::InvalidDirective {
        directive: body.to_string(),
        position: offset,
    };

    let digits_end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    let (index_part, mut rest) = body.split_at(digits_end);

    let index = if index_part.is_empty() {
        let index = *cursor;
        *cursor += 1;
        index
    } else {
        index_part.parse::<usize>().map_err(|_| invalid())?
    };

    let mut directive = Directive::default();

    if let Some(after_dot) = rest.strip_prefix('.') {
        let digits_end = after_dot
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_dot.len());
        if digits_end == 0 {
            return Err(invalid());
        }
        let precision = after_dot[..digits_end]
            .parse::<usize>()
            .map_err(|_| invalid())?;
        if precision > MAX_PRECISION {
            return Err(invalid());
        }
        directive.precision = Some(precision);
        rest = &after_dot[digits_end..];
    }

    let mut kind = rest.chars();
    if let Some(c) = kind.next() {
        if kind.next().is_some() {
            return Err(invalid());
        }
        let notation = Notation::from_char(c).ok_or_else(invalid)?;
        if notation.is_base() && directive.precision.is_some() {
            return Err(invalid());
        }
        directive.notation = Some(notation);
    }

    Ok(Placeholder { index, directive })
}

fn incompatible(directive: &Directive, value: &Value<'_>) -> FormatError {
    FormatError::IncompatibleDirective {
        directive: directive.to_string(),
        kind: value.kind(),
    }
}

fn write_value(out: &mut String, value: &Value<'_>, directive: &Directive) -> Result<(), FormatError> {
    // Writing into a String cannot fail.
    let _ = match (*value, directive.notation) {
        (Value::Int(v), None) if directive.precision.is_none() => write!(out, "{}", v),
        (Value::UInt(v), None) if directive.precision.is_none() => write!(out, "{}", v),
        (Value::Int(v), Some(Notation::Binary)) => write!(out, "{:b}", v),
        (Value::Int(v), Some(Notation::LowerHex)) => write!(out, "{:x}", v),
        (Value::Int(v), Some(Notation::UpperHex)) => write!(out, "{:X}", v),
        (Value::UInt(v), Some(Notation::Binary)) => write!(out, "{:b}", v),
        (Value::UInt(v), Some(Notation::LowerHex)) => write!(out, "{:x}", v),
        (Value::UInt(v), Some(Notation::UpperHex)) => write!(out, "{:X}", v),
        (Value::Int(v), notation) => {
            write_float(out, v as f64, directive.precision, notation);
            Ok(())
        }
        (Value::UInt(v), notation) => {
            write_float(out, v as f64, directive.precision, notation);
            Ok(())
        }
        (Value::Float(_), Some(n)) if n.is_base() => {
            return Err(incompatible(directive, value));
        }
        (Value::Float(v), notation) => {
            write_float(out, v, directive.precision, notation);
            Ok(())
        }
        (_, _) if !directive.is_empty() => return Err(incompatible(directive, value)),
        (Value::Bool(v), _) => write!(out, "{}", v),
        (Value::Char(v), _) => write!(out, "{}", v),
        (Value::Str(v), _) => {
            out.push_str(v);
            Ok(())
        }
    };
    Ok(())
}

fn write_float(out: &mut String, v: f64, precision: Option<usize>, notation: Option<Notation>) {
    // Directive fields are public, so a hand-built one may exceed the cap
    let precision = precision.map(|p| p.min(MAX_PRECISION));
    match notation {
        Some(Notation::Scientific { uppercase }) => {
            write_scientific(out, v, precision.unwrap_or(6), uppercase)
        }
        Some(Notation::General) if v != 0.0 && !GENERAL_FIXED_RANGE.contains(&v.abs()) => {
            write_scientific(out, v, precision.unwrap_or(6), false)
        }
        _ => {
            let _ = match precision {
                Some(p) => write!(out, "{:.*}", p, v),
                None => write!(out, "{}", v),
            };
        }
    }
}

/// Exponential form with a signed, two-digit-minimum exponent: `1.500e-07`.
fn write_scientific(out: &mut String, v: f64, precision: usize, uppercase: bool) {
    let raw = format!("{:.*e}", precision, v);
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            let marker = if uppercase { 'E' } else { 'e' };
            let _ = write!(out, "{}{}{}{:0>2}", mantissa, marker, sign, digits);
        }
        // NaN and infinities carry no exponent
        None => out.push_str(&raw),
    }
}
