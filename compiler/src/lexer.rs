// Lexer for field-mapping strings.
//
// Tokenizes the mini-language carried by the third argument of a mapping
// declaration: `a_field<op>b_field` tokens separated by commas, e.g.
// `"body@body, test>condition, value=value"`. Uses the `logos` crate for
// DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans relative to the
//                 mapping string, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in the mapping string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Mapping-string token types.
///
/// Field names carry no value; use the span to retrieve the text.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token(",")]
    Comma,

    /// Mode operator. Only `=`, `@`, `>` and `%` are lexed; anything else is
    /// a lex error, so mode resolution never sees a foreign character from
    /// here.
    #[regex(r"[=@>%]", |lex| lex.slice().chars().next())]
    Op(char),

    /// Field name: `[A-Za-z0-9$_]+`
    #[regex(r"[A-Za-z0-9$_]+")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Comma => write!(f, ","),
            Token::Op(c) => write!(f, "{c}"),
            Token::Ident => write!(f, "<field>"),
        }
    }
}

/// Lex a mapping string into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters so the parser can report the first problem precisely.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn all_operators() {
        let tokens = lex_ok("= @ > %");
        assert_eq!(
            tokens,
            vec![
                Token::Op('='),
                Token::Op('@'),
                Token::Op('>'),
                Token::Op('%'),
            ]
        );
    }

    #[test]
    fn single_field() {
        assert_eq!(
            lex_ok("body@body"),
            vec![Token::Ident, Token::Op('@'), Token::Ident]
        );
    }

    #[test]
    fn identifier_charset() {
        // `$`, `_` and digits are all field characters
        assert_eq!(lex_ok("$x_1 0abc"), vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn whitespace_around_commas_skipped() {
        let tokens = lex_ok("  a=b ,\tc>d\n");
        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::Op('='),
                Token::Ident,
                Token::Comma,
                Token::Ident,
                Token::Op('>'),
                Token::Ident,
            ]
        );
    }

    #[test]
    fn spans_correct() {
        let result = lex("test>condition");
        assert_eq!(result.tokens[0].1, Span { start: 0, end: 4 });
        assert_eq!(result.tokens[1].1, Span { start: 4, end: 5 });
        assert_eq!(result.tokens[2].1, Span { start: 5, end: 14 });
    }

    #[test]
    fn unknown_operator_is_lex_error() {
        let result = lex("value#value");
        let tokens: Vec<_> = result.tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 5, end: 6 });
        assert!(result.errors[0].message.contains('#'));
    }

    #[test]
    fn non_ascii_rejected() {
        let result = lex("näme=name");
        assert!(!result.errors.is_empty());
    }
}
