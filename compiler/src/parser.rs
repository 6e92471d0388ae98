// Parser for field-mapping strings.
//
// Parses the token stream of one mapping string into an ordered list of
// field mappings:
//
//   mapping := field (',' field)*
//   field   := IDENT OP IDENT
//
// Uses chumsky combinators. Operators are resolved to `Mode`s after parsing,
// so an unrecognized operator is reported as `UnknownOperator` rather than a
// syntax error.
//
// Preconditions: none.
// Postconditions: returned spans are offsets into the declaration source
//                 (mapping-relative spans shifted by the literal's offset).
// Failure modes: first lex or syntax error becomes `MalformedMapping`.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::{span, FieldMapping, Ident, MappingLit, Mode};
use crate::driver::CompileError;
use crate::lexer::Token;

/// One parsed token before its operator is resolved.
#[derive(Debug, Clone, PartialEq)]
struct RawField {
    a_field: Ident,
    op: char,
    op_span: SimpleSpan,
    b_field: Ident,
    span: SimpleSpan,
}

/// Parse an optional mapping literal.
///
/// An absent or empty literal yields no fields: only the span and tag
/// boilerplate applies to the node.
pub fn parse_mapping(mapping: Option<&MappingLit>) -> Result<Vec<FieldMapping>, CompileError> {
    match mapping {
        Some(lit) if !lit.text.is_empty() => parse_fields(&lit.text, lit.offset),
        _ => Ok(Vec::new()),
    }
}

/// Parse a non-empty mapping string whose first byte sits at `offset` in the
/// declaration source.
pub fn parse_fields(source: &str, offset: usize) -> Result<Vec<FieldMapping>, CompileError> {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = mapping_parser(source);
    let (fields, parse_errors) = parser.parse(stream).into_output_errors();

    // Lex errors come first: an unknown character usually explains the
    // syntax error that follows it.
    let mut errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    if let Some(first) = errors.into_iter().next() {
        let at = *first.span();
        return Err(CompileError::MalformedMapping {
            token: offending_token(source, at.start()),
            message: first.to_string(),
            span: span(offset + at.start(), offset + at.end()),
            decl: None,
        });
    }

    let Some(fields) = fields else {
        return Err(CompileError::MalformedMapping {
            token: source.to_string(),
            message: "mapping produced no fields".to_string(),
            span: span(offset, offset + len),
            decl: None,
        });
    };

    fields
        .into_iter()
        .map(|raw| {
            let mode = Mode::from_op(raw.op).map_err(|_| CompileError::UnknownOperator {
                op: raw.op,
                span: shift(raw.op_span, offset),
                decl: None,
            })?;
            Ok(FieldMapping {
                a_field: shift_ident(raw.a_field, offset),
                b_field: shift_ident(raw.b_field, offset),
                mode,
                span: shift(raw.span, offset),
            })
        })
        .collect()
}

fn mapping_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Vec<RawField>, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    let op = select! {
        Token::Op(c) = e => (c, e.span()),
    };

    // Whitespace is skipped by the lexer, so the three parts of a field
    // must be checked to touch.
    let field = ident
        .clone()
        .then(op)
        .then(ident)
        .try_map(|((a_field, (op, op_span)), b_field): ((Ident, (char, SimpleSpan)), Ident), span: SimpleSpan| {
            if a_field.span.end() != op_span.start() || op_span.end() != b_field.span.start() {
                return Err(Rich::custom(
                    span,
                    "whitespace inside a field mapping; expected `<field><op><field>`",
                ));
            }
            Ok(RawField {
                a_field,
                op,
                op_span,
                b_field,
                span,
            })
        });

    field
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// The comma-delimited token containing byte `at`, for error messages.
fn offending_token(source: &str, at: usize) -> String {
    let at = at.min(source.len());
    let start = source[..at].rfind(',').map_or(0, |i| i + 1);
    let end = source[at..].find(',').map_or(source.len(), |i| at + i);
    source[start..end].trim().to_string()
}

fn shift(s: SimpleSpan, offset: usize) -> SimpleSpan {
    span(offset + s.start(), offset + s.end())
}

fn shift_ident(ident: Ident, offset: usize) -> Ident {
    Ident {
        name: ident.name,
        span: shift(ident.span, offset),
    }
}

// ── Tests ──
