// Data model for mapping declarations.
//
// One `MappingDecl` per node type, as found in declaration source by the
// scanner; its mapping string parses into an ordered list of `FieldMapping`s.
// Every node carries a span into the declaration source for error reporting.
//
// Preconditions: produced by `scan` and `parser`.
// Postconditions: spans are byte offsets into the whole declaration source.
// Failure modes: `Mode::from_op` rejects unknown operators.
// Side effects: none.

use std::fmt;

use chumsky::span::SimpleSpan;
use serde::Serialize;

use crate::driver::CompileError;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// Build a span from a byte range.
pub fn span(start: usize, end: usize) -> Span {
    (start..end).into()
}

// ── Declaration ──

/// `map!("Tag", Ctor, "mapping")` — one node type's field correspondence.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingDecl {
    /// Representation-A discriminant (the `type` string).
    pub a_tag: String,
    /// Representation-B constructor, as written (may be a path).
    pub b_ctor: String,
    /// The mapping string, if present.
    pub mapping: Option<MappingLit>,
    /// Span of the whole invocation, `map!` through the closing paren.
    pub span: Span,
}

/// A mapping string literal and where its contents start in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingLit {
    pub text: String,
    /// Byte offset of the first character after the opening quote.
    pub offset: usize,
}

// ── Field mapping ──

/// One `a_field<op>b_field` token.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub a_field: Ident,
    pub b_field: Ident,
    pub mode: Mode,
    pub span: Span,
}

/// How a field's value moves between the representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// `x=y` — plain copy.
    Direct,
    /// `x>y` — one child node, converted recursively.
    Recursive,
    /// `x@y` — ordered sequence of child nodes.
    MappedList,
    /// `x%y` — A-side block node whose statements become B's sequence.
    BlockBody,
}

impl Mode {
    #[cfg(test)]
    pub const OPERATORS: [char; 4] = ['=', '>', '@', '%'];

    /// Resolve an operator character to a mode.
    pub fn from_op(op: char) -> Result<Mode, CompileError> {
        match op {
            '=' => Ok(Mode::Direct),
            '>' => Ok(Mode::Recursive),
            '@' => Ok(Mode::MappedList),
            '%' => Ok(Mode::BlockBody),
            other => Err(CompileError::UnknownOperator {
                op: other,
                span: span(0, 0),
                decl: None,
            }),
        }
    }

    pub fn op(self) -> char {
        match self {
            Mode::Direct => '=',
            Mode::Recursive => '>',
            Mode::MappedList => '@',
            Mode::BlockBody => '%',
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Direct => "direct",
            Mode::Recursive => "recursive",
            Mode::MappedList => "mapped list",
            Mode::BlockBody => "block body",
        };
        write!(f, "{name}")
    }
}

// ── Identifier ──

/// A field name with its source text and span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_op_round_trips_every_operator() {
        for op in Mode::OPERATORS {
            assert_eq!(Mode::from_op(op).unwrap().op(), op);
        }
    }

    #[test]
    fn from_op_rejects_foreign_character() {
        let err = Mode::from_op('#').unwrap_err();
        assert!(matches!(err, CompileError::UnknownOperator { op: '#', .. }));
    }

    #[test]
    fn mode_serializes_snake_case() {
        let json = serde_json::to_string(&Mode::MappedList).unwrap();
        assert_eq!(json, "\"mapped_list\"");
    }
}
