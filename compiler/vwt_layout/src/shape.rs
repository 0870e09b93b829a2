//! Layout strings: a compact text form for type shapes.
//!
//! ```text
//! shape  := scalar | '{' shape* '}' | '[' case (',' case)* ']' | '[' ']'
//!         | 'C' num | 'e' num '(' shape ')' | 'E' num '(' shape (',' shape)* ')'
//!         | 'A' num | '@' ident ('<' shape (',' shape)* '>')?
//! case   := '_' | shape
//! scalar := c s l L r N n W u w b B o f
//! ```
//!
//! `{...}` is a struct and `[...]` an enum in declaration order, `_` marking
//! an empty case. `C n`, `e n(P)` and `E n(P, ...)` are shorthands for enums
//! with `n` empty cases after their payload cases. `A n` is generic
//! parameter `n`, `@Name<...>` an instance of a registered declaration.
//! Whitespace between tokens is ignored.
//!
//! Parsed struct fields and enum cases are named by position (`"0"`,
//! `"1"`, ...) and enum case tags are their positions. `Display` prints the
//! canonical form, which for concrete shapes equals the layout key.

use std::fmt;
use std::str::FromStr;

use crate::calc::LayoutEngine;
use crate::enums::EnumCaseDescriptor;
use crate::error::{LayoutError, ShapeParseError};
use crate::layout::{LayoutSlot, Name, TypeLayout};
use crate::scalar::ScalarKind;
use crate::stack::ensure_sufficient_stack;

/// Most empty cases a `C`, `e` or `E` shorthand may declare.
pub const MAX_SHORTHAND_CASES: u32 = 1 << 16;

/// A type shape, possibly generic.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar(ScalarKind),
    Struct(Vec<(Name, Shape)>),
    Enum(Vec<(Name, Option<Shape>)>),
    /// Generic parameter by index.
    Param(u32),
    /// Instance of a registered declaration.
    Named { name: Name, args: Vec<Shape> },
}

impl Shape {
    /// Struct with positionally named fields.
    pub fn tuple(fields: impl IntoIterator<Item = Shape>) -> Shape {
        Shape::Struct(
            fields
                .into_iter()
                .enumerate()
                .map(|(i, s)| (position_name(i), s))
                .collect(),
        )
    }

    /// Enum with positionally named cases.
    pub fn cases(cases: impl IntoIterator<Item = Option<Shape>>) -> Shape {
        Shape::Enum(
            cases
                .into_iter()
                .enumerate()
                .map(|(i, s)| (position_name(i), s))
                .collect(),
        )
    }

    pub fn named(name: impl Into<Name>, args: Vec<Shape>) -> Shape {
        Shape::Named {
            name: name.into(),
            args,
        }
    }

    /// True if the shape contains no parameters and no named references.
    pub fn is_concrete(&self) -> bool {
        match self {
            Self::Scalar(_) => true,
            Self::Struct(fields) => fields.iter().all(|(_, s)| s.is_concrete()),
            Self::Enum(cases) => cases
                .iter()
                .all(|(_, s)| s.as_ref().is_none_or(Shape::is_concrete)),
            Self::Param(_) | Self::Named { .. } => false,
        }
    }

    /// Names of declarations this shape embeds by value, in first-seen
    /// order, without duplicates. Arguments of named references count too.
    pub fn named_refs(&self) -> Vec<Name> {
        let mut out = Vec::new();
        self.collect_named_refs(&mut out);
        out
    }

    fn collect_named_refs(&self, out: &mut Vec<Name>) {
        ensure_sufficient_stack(|| match self {
            Self::Scalar(_) | Self::Param(_) => {}
            Self::Struct(fields) => {
                for (_, s) in fields {
                    s.collect_named_refs(out);
                }
            }
            Self::Enum(cases) => {
                for s in cases.iter().filter_map(|(_, s)| s.as_ref()) {
                    s.collect_named_refs(out);
                }
            }
            Self::Named { name, args } => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
                for arg in args {
                    arg.collect_named_refs(out);
                }
            }
        });
    }

    /// Highest parameter index used, if any.
    pub fn max_param(&self) -> Option<u32> {
        ensure_sufficient_stack(|| match self {
            Self::Scalar(_) => None,
            Self::Param(n) => Some(*n),
            Self::Struct(fields) => fields.iter().filter_map(|(_, s)| s.max_param()).max(),
            Self::Enum(cases) => cases
                .iter()
                .filter_map(|(_, s)| s.as_ref().and_then(Shape::max_param))
                .max(),
            Self::Named { args, .. } => args.iter().filter_map(Shape::max_param).max(),
        })
    }
}

fn position_name(i: usize) -> Name {
    Name::from(i.to_string())
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{}", kind.code()),
            Self::Struct(fields) => {
                f.write_str("{")?;
                for (_, s) in fields {
                    write!(f, "{s}")?;
                }
                f.write_str("}")
            }
            Self::Enum(cases) => {
                f.write_str("[")?;
                for (i, (_, s)) in cases.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match s {
                        Some(s) => write!(f, "{s}")?,
                        None => f.write_str("_")?,
                    }
                }
                f.write_str("]")
            }
            Self::Param(n) => write!(f, "A{n}"),
            Self::Named { name, args } => {
                write!(f, "@{name}")?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Shape {
    type Err = ShapeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            src: s.as_bytes(),
            pos: 0,
        };
        let shape = parser.shape()?;
        parser.skip_ws();
        if parser.pos < parser.src.len() {
            return Err(parser.error("trailing input after shape"));
        }
        Ok(shape)
    }
}

// ── Parser ──────────────────────────────────────────────────────

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> ShapeParseError {
        ShapeParseError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        while self.src.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, byte: u8) -> Result<(), ShapeParseError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(format!(
                "expected `{}`, found `{}`",
                char::from(byte),
                char::from(b)
            ))),
            None => Err(self.error(format!("expected `{}`, found end of input", char::from(byte)))),
        }
    }

    fn number(&mut self) -> Result<u32, ShapeParseError> {
        self.skip_ws();
        let start = self.pos;
        while self.src.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a number"));
        }
        // Digits are ASCII, so the slice is valid UTF-8.
        std::str::from_utf8(&self.src[start..self.pos])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| ShapeParseError {
                position: start,
                message: "number out of range".to_string(),
            })
    }

    /// Empty-case count of a shorthand, checked before any case is built.
    fn case_count(&mut self) -> Result<u32, ShapeParseError> {
        let start = self.pos;
        let count = self.number()?;
        if count > MAX_SHORTHAND_CASES {
            return Err(ShapeParseError {
                position: start,
                message: format!(
                    "{count} cases given, shorthands allow at most {MAX_SHORTHAND_CASES}"
                ),
            });
        }
        Ok(count)
    }

    fn ident(&mut self) -> Result<Name, ShapeParseError> {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            self.pos += 1;
        }
        let ident = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ShapeParseError {
                position: start,
                message: "expected a declaration name".to_string(),
            });
        }
        Ok(Name::from(ident))
    }

    /// `item (',' item)*` up to and including `close`.
    fn list<T>(
        &mut self,
        close: u8,
        mut item: impl FnMut(&mut Self) -> Result<T, ShapeParseError>,
    ) -> Result<Vec<T>, ShapeParseError> {
        let mut items = vec![item(self)?];
        while self.peek() == Some(b',') {
            self.pos += 1;
            items.push(item(self)?);
        }
        self.expect(close)?;
        Ok(items)
    }

    fn case(&mut self) -> Result<Option<Shape>, ShapeParseError> {
        if self.peek() == Some(b'_') {
            self.pos += 1;
            return Ok(None);
        }
        self.shape().map(Some)
    }

    fn shape(&mut self) -> Result<Shape, ShapeParseError> {
        ensure_sufficient_stack(|| self.shape_inner())
    }

    fn shape_inner(&mut self) -> Result<Shape, ShapeParseError> {
        self.skip_ws();
        let start = self.pos;
        let Some(b) = self.bump() else {
            return Err(self.error("expected a shape, found end of input"));
        };
        match b {
            b'{' => {
                let mut fields = Vec::new();
                while self.peek() != Some(b'}') {
                    if self.peek().is_none() {
                        return Err(self.error("unclosed `{`"));
                    }
                    fields.push(self.shape()?);
                }
                self.pos += 1;
                Ok(Shape::tuple(fields))
            }
            b'[' => {
                if self.peek() == Some(b']') {
                    self.pos += 1;
                    return Ok(Shape::Enum(Vec::new()));
                }
                let cases = self.list(b']', Self::case)?;
                Ok(Shape::cases(cases))
            }
            b'C' => {
                let empty = self.case_count()?;
                Ok(Shape::cases((0..empty).map(|_| None)))
            }
            b'e' | b'E' => {
                let empty = self.case_count()?;
                self.expect(b'(')?;
                let payloads = self.list(b')', Self::shape)?;
                if b == b'e' && payloads.len() != 1 {
                    return Err(ShapeParseError {
                        position: start,
                        message: "`e` takes exactly one payload".to_string(),
                    });
                }
                Ok(Shape::cases(
                    payloads
                        .into_iter()
                        .map(Some)
                        .chain((0..empty).map(|_| None)),
                ))
            }
            b'A' => Ok(Shape::Param(self.number()?)),
            b'@' => {
                let name = self.ident()?;
                let args = if self.peek() == Some(b'<') {
                    self.pos += 1;
                    self.list(b'>', Self::shape)?
                } else {
                    Vec::new()
                };
                Ok(Shape::Named { name, args })
            }
            other => ScalarKind::from_code(char::from(other))
                .map(Shape::Scalar)
                .ok_or_else(|| ShapeParseError {
                    position: start,
                    message: format!("unknown shape code `{}`", char::from(other)),
                }),
        }
    }
}

// ── Concrete layout ─────────────────────────────────────────────

impl LayoutEngine {
    /// Lay out a concrete shape.
    ///
    /// Parameters and named references cannot be laid out here; they
    /// fail with [`LayoutError::IncompleteLayout`]. Use the generic resolver
    /// for those.
    pub fn shape_layout(&self, shape: &Shape) -> Result<TypeLayout, LayoutError> {
        ensure_sufficient_stack(|| match shape {
            Shape::Scalar(kind) => Ok(self.scalar(*kind)),
            Shape::Struct(fields) => {
                let slots = fields
                    .iter()
                    .map(|(name, s)| Ok((name.clone(), LayoutSlot::from(self.shape_layout(s)?))))
                    .collect::<Result<Vec<_>, LayoutError>>()?;
                self.compute_layout(&slots)
            }
            Shape::Enum(cases) => {
                let descriptors = cases
                    .iter()
                    .enumerate()
                    .map(|(i, (name, s))| {
                        let tag = u32::try_from(i).map_err(|_| LayoutError::TagOverflow {
                            cases: cases.len() as u64,
                            max_bytes: crate::enums::MAX_TAG_BYTES,
                        })?;
                        let payload = s
                            .as_ref()
                            .map(|s| self.shape_layout(s).map(LayoutSlot::from))
                            .transpose()?;
                        Ok(EnumCaseDescriptor {
                            name: name.clone(),
                            tag,
                            payload,
                        })
                    })
                    .collect::<Result<Vec<_>, LayoutError>>()?;
                self.allocate_tags(&descriptors)
            }
            Shape::Param(_) | Shape::Named { .. } => Err(LayoutError::IncompleteLayout {
                what: shape.to_string(),
            }),
        })
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
