// scan.rs — Declaration scanner
//
// Finds mapping declarations (`map!("Tag", Ctor, "mapping")`) and the seed
// table literal in declaration source at the text level. No host-language
// parsing: comments and string contents are masked out first so delimiters
// and macro names inside them are never seen, and the masked text keeps every
// byte offset of the original.
//
// Preconditions: none.
// Postconditions: declarations are returned in source order with spans into
//                 the original text; the seed literal's interior range and
//                 placeholder tags are known.
// Failure modes: MissingSeedTable, MalformedDeclaration.
// Side effects: none.

use std::ops::Range;

use crate::ast::{span, MappingDecl, MappingLit, Span};
use crate::driver::{CompileError, CompileOptions};

/// The seed table literal, e.g. the `[ ... ]` of
/// `static A_TO_B: &[(&str, FromA)] = &[ ("Node", from_a_unknown), ];`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedTable {
    /// Byte range strictly between the opening and closing delimiters.
    pub interior: Range<usize>,
    /// Placeholder tags already present, with the span of each tag literal.
    pub tags: Vec<(String, Span)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub declarations: Vec<MappingDecl>,
    pub seed: SeedTable,
}

/// Scan declaration source for the seed table and every declaration.
pub fn scan(source: &str, options: &CompileOptions) -> Result<ScanResult, CompileError> {
    let masked = mask(source);
    let seed = find_seed_table(source, &masked, &options.seed_table)?;
    let declarations = scan_declarations(source, &masked, &options.decl_macro)?;

    if let Some(inside) = declarations
        .iter()
        .find(|d| d.span.start >= seed.interior.start && d.span.end <= seed.interior.end)
    {
        return Err(CompileError::MalformedDeclaration {
            message: format!(
                "declaration of \"{}\" sits inside the seed table `{}`",
                inside.a_tag, options.seed_table
            ),
            span: inside.span,
        });
    }

    Ok(ScanResult { declarations, seed })
}

// ── Masking ─────────────────────────────────────────────────────────────────

/// Blank out comments, string-literal and char-literal contents with spaces,
/// keeping quotes, raw-string hashes, newlines and the byte length of the
/// source. Lifetimes and labels are left alone.
pub fn mask(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let blank = |b: u8| if b == b'\n' { b'\n' } else { b' ' };
    let mut i = 0;

    while i < bytes.len() {
        if let Some((hashes, close)) = raw_string_at(bytes, i) {
            // `r#"..."#`: everything between the quotes is content.
            let open_quote = i + 1 + hashes;
            out.extend_from_slice(&bytes[i..=open_quote]);
            out.extend(bytes[open_quote + 1..close].iter().map(|&b| blank(b)));
            let end = (close + 1 + hashes).min(bytes.len());
            out.extend_from_slice(&bytes[close..end]);
            i = end;
        } else if bytes[i] == b'\'' {
            out.push(b'\'');
            i += 1;
            if let Some(close) = char_literal_end(source, i - 1) {
                out.extend(std::iter::repeat(b' ').take(close - i));
                out.push(b'\'');
                i = close + 1;
            }
        } else if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                out.push(b' ');
                i += 1;
            }
        } else if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            out.extend_from_slice(b"  ");
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                out.push(blank(bytes[i]));
                i += 1;
            }
            if i < bytes.len() {
                out.extend_from_slice(b"  ");
                i += 2;
            }
        } else if bytes[i] == b'"' {
            out.push(b'"');
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    out.push(b' ');
                    i += 1;
                }
                out.push(blank(bytes[i]));
                i += 1;
            }
            if i < bytes.len() {
                out.push(b'"');
                i += 1;
            }
        } else if bytes[i].is_ascii() {
            out.push(bytes[i]);
            i += 1;
        } else {
            // Non-ASCII outside strings and comments: keep the length only.
            out.push(b' ');
            i += 1;
        }
    }

    // Every byte pushed is ASCII.
    String::from_utf8(out).unwrap_or_default()
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// A raw string literal (`r"..."`, `r#"..."#`, `br"..."`) starting at `at`.
/// Returns the number of hashes and the index of the closing quote.
fn raw_string_at(bytes: &[u8], at: usize) -> Option<(usize, usize)> {
    if bytes[at] != b'r' {
        return None;
    }
    let starts_token = match at.checked_sub(1).map(|p| bytes[p]) {
        None => true,
        Some(b'b') => at < 2 || !is_ident_byte(bytes[at - 2]),
        Some(prev) => !is_ident_byte(prev),
    };
    if !starts_token {
        return None;
    }
    let hashes = bytes[at + 1..].iter().take_while(|&&b| b == b'#').count();
    let open_quote = at + 1 + hashes;
    if bytes.get(open_quote) != Some(&b'"') {
        return None;
    }
    let mut i = open_quote + 1;
    while i < bytes.len() {
        if bytes[i] == b'"'
            && bytes[i + 1..].iter().take(hashes).filter(|&&b| b == b'#').count() == hashes
        {
            return Some((hashes, i));
        }
        i += 1;
    }
    // Unterminated: mask to the end.
    Some((hashes, bytes.len()))
}

/// Index of the closing quote of a char literal opening at `open`, or `None`
/// when the quote starts a lifetime or label (`'a`, `'outer:`).
fn char_literal_end(source: &str, open: usize) -> Option<usize> {
    let rest = source.get(open + 1..)?;
    let first = rest.chars().next()?;
    match first {
        '\\' => {
            // `'\n'`, `'\''`, `'\x7f'`, `'\u{10FFFF}'`
            let escaped = rest[1..].chars().next()?;
            let from = 1 + escaped.len_utf8();
            let close = from + rest[from..].find('\'')?;
            (close <= 10 && !rest[..close].contains('\n')).then_some(open + 1 + close)
        }
        '\'' | '\n' => None,
        c => (rest.as_bytes().get(c.len_utf8()) == Some(&b'\'')).then_some(open + 1 + c.len_utf8()),
    }
}

// ── Seed table ──────────────────────────────────────────────────────────────

fn find_seed_table(source: &str, masked: &str, name: &str) -> Result<SeedTable, CompileError> {
    let missing = || CompileError::MissingSeedTable {
        name: name.to_string(),
    };

    // The definition, not a use: `static`/`const`/`let` (optionally `mut`)
    // directly before the name.
    let mut from = 0;
    let name_at = loop {
        let at = find_word(masked, name, from).ok_or_else(missing)?;
        if is_binding(masked, at) {
            break at;
        }
        from = at + name.len();
    };
    let after_name = name_at + name.len();
    let eq = masked[after_name..]
        .find('=')
        .map(|i| after_name + i)
        .ok_or_else(missing)?;
    let open = masked[eq..]
        .find(|c: char| c == '[' || c == '{')
        .map(|i| eq + i)
        .ok_or_else(missing)?;
    let bytes = masked.as_bytes();
    let close_byte = if bytes[open] == b'[' { b']' } else { b'}' };
    let close = extract_balanced(bytes, open, bytes[open], close_byte).ok_or_else(|| {
        CompileError::MalformedDeclaration {
            message: format!("unbalanced delimiters in seed table `{name}`"),
            span: span(open, open + 1),
        }
    })?;

    let interior = open + 1..close;
    let mut tags = Vec::new();
    for entry in split_top_level_commas(&masked[interior.clone()]) {
        let range = interior.start + entry.start..interior.start + entry.end;
        if masked[range.clone()].trim().is_empty() {
            continue;
        }
        let (tag, tag_span) = first_string_literal(source, masked, range.clone()).ok_or_else(|| {
            CompileError::MalformedDeclaration {
                message: format!(
                    "seed table entry `{}` has no tag string",
                    source[range.clone()].trim()
                ),
                span: span(range.start, range.end),
            }
        })?;
        tags.push((tag, tag_span));
    }

    Ok(SeedTable { interior, tags })
}

fn is_binding(masked: &str, at: usize) -> bool {
    let mut before = masked[..at].trim_end();
    if let Some(rest) = strip_word_suffix(before, "mut") {
        before = rest.trim_end();
    }
    ["static", "const", "let"]
        .iter()
        .any(|kw| strip_word_suffix(before, kw).is_some())
}

/// `text` without a trailing whole `word`.
fn strip_word_suffix<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let rest = text.strip_suffix(word)?;
    match rest.bytes().last() {
        Some(b) if is_ident_byte(b) => None,
        _ => Some(rest),
    }
}

fn first_string_literal(
    source: &str,
    masked: &str,
    range: Range<usize>,
) -> Option<(String, Span)> {
    let open = range.start + masked[range.clone()].find('"')?;
    let close = open + 1 + masked[open + 1..range.end].find('"')?;
    let value = unescape(&source[open + 1..close])?;
    Some((value, span(open, close + 1)))
}

// ── Declarations ────────────────────────────────────────────────────────────

fn scan_declarations(
    source: &str,
    masked: &str,
    macro_name: &str,
) -> Result<Vec<MappingDecl>, CompileError> {
    let bytes = masked.as_bytes();
    let mut results = Vec::new();
    let mut pos = 0;

    while let Some(at) = find_word(masked, macro_name, pos) {
        let mut cursor = at + macro_name.len();
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        // `map!(..)` and `map !(..)` are invocations; `map != x` is not.
        if bytes.get(cursor) != Some(&b'!') || bytes.get(cursor + 1) == Some(&b'=') {
            pos = at + macro_name.len();
            continue;
        }
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if bytes.get(cursor) != Some(&b'(') {
            return Err(CompileError::MalformedDeclaration {
                message: format!("expected `(` after `{macro_name}!`"),
                span: span(at, cursor.min(bytes.len())),
            });
        }
        let close = extract_balanced(bytes, cursor, b'(', b')').ok_or_else(|| {
            CompileError::MalformedDeclaration {
                message: format!("unbalanced parentheses in `{macro_name}!` declaration"),
                span: span(at, cursor + 1),
            }
        })?;

        let decl = parse_declaration(source, masked, cursor + 1..close, span(at, close + 1))?;
        results.push(decl);
        pos = close + 1;
    }

    Ok(results)
}

/// Parse the arguments of one declaration: `"Tag", Ctor[, "mapping"]`.
fn parse_declaration(
    source: &str,
    masked: &str,
    args: Range<usize>,
    whole: Span,
) -> Result<MappingDecl, CompileError> {
    let malformed = |message: String| CompileError::MalformedDeclaration {
        message,
        span: whole,
    };

    let mut parts: Vec<Range<usize>> = split_top_level_commas(&masked[args.clone()])
        .into_iter()
        .map(|r| args.start + r.start..args.start + r.end)
        .collect();
    // A single trailing comma is allowed.
    if parts.len() > 1 && parts.last().is_some_and(|r| masked[r.clone()].trim().is_empty()) {
        parts.pop();
    }
    if parts.len() < 2 || parts.len() > 3 {
        return Err(malformed(format!(
            "expected (\"tag\", Constructor) or (\"tag\", Constructor, \"mapping\"), found {} argument(s)",
            parts.len()
        )));
    }

    let (a_tag, _) = string_arg(source, masked, parts[0].clone())
        .ok_or_else(|| malformed(format!("expected a tag string, found `{}`", source[parts[0].clone()].trim())))?;
    if a_tag.is_empty() {
        return Err(malformed("tag string is empty".to_string()));
    }

    let b_ctor = source[parts[1].clone()].trim();
    if !is_path(b_ctor) {
        return Err(malformed(format!(
            "expected a constructor name, found `{}`",
            b_ctor
        )));
    }

    let mapping = match parts.get(2) {
        Some(range) => {
            let (text, offset) = string_arg(source, masked, range.clone()).ok_or_else(|| {
                malformed(format!(
                    "expected a mapping string, found `{}`",
                    source[range.clone()].trim()
                ))
            })?;
            Some(MappingLit { text, offset })
        }
        None => None,
    };

    Ok(MappingDecl {
        a_tag,
        b_ctor: b_ctor.to_string(),
        mapping,
        span: whole,
    })
}

/// A whole argument that is exactly one string literal. Returns the decoded
/// value and the offset of its first content byte.
fn string_arg(source: &str, masked: &str, range: Range<usize>) -> Option<(String, usize)> {
    let text = &masked[range.clone()];
    let lead = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('"') || !trimmed.ends_with('"') {
        return None;
    }
    // Interior quotes would mean two literals.
    if trimmed[1..trimmed.len() - 1].contains('"') {
        return None;
    }
    let start = range.start + lead + 1;
    let end = range.start + lead + trimmed.len() - 1;
    Some((unescape(&source[start..end])?, start))
}

fn unescape(raw: &str) -> Option<String> {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                'n' => result.push('\n'),
                't' => result.push('\t'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// `Ident(::Ident)*`
fn is_path(s: &str) -> bool {
    !s.is_empty()
        && s.split("::").all(|seg| {
            let mut chars = seg.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

// ── Text helpers ────────────────────────────────────────────────────────────

/// Find `word` at or after `from`, bounded by non-identifier characters.
fn find_word(haystack: &str, word: &str, from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut pos = from;
    while let Some(idx) = haystack.get(pos..)?.find(word) {
        let at = pos + idx;
        let end = at + word.len();
        let before_ok = at == 0 || !is_ident_byte(bytes[at - 1]);
        let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
        if before_ok && after_ok {
            return Some(at);
        }
        pos = at + 1;
    }
    None
}

/// Extract balanced delimiter content. Returns index of closing delimiter.
fn extract_balanced(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    if start >= bytes.len() || bytes[start] != open {
        return None;
    }

    let mut depth = 0;
    let mut i = start;

    while i < bytes.len() {
        if bytes[i] == open {
            depth += 1;
        } else if bytes[i] == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }

    None
}

/// Split masked text at top-level commas (respecting `()`, `[]` and `{}`).
/// Returns byte ranges relative to `s`.
fn split_top_level_commas(s: &str) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, b) in s.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(start..i);
                start = i + 1;
            }
            _ => {}
        }
    }

    parts.push(start..s.len());
    parts
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    let col = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
    (line, col)
}

/// Leading whitespace of the line containing `offset`.
pub fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let rest = &source[line_start..];
    let width = rest.len() - rest.trim_start_matches(|c: char| c == ' ' || c == '\t').len();
    &rest[..width]
}

// ── Tests ───────────────────────────────────────────────────────────────────
