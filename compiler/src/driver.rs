// driver.rs — Compilation pass and output rewriting
//
// Runs the whole pass over one declaration source: scan, seed the registry,
// compile every declaration in source order, then rewrite the text. Each
// declaration becomes a B→A registration call and its A→B function is
// appended to the seed table literal.
//
// Preconditions: none.
// Postconditions: on success the registry holds one A entry per seed
//                 placeholder plus one per declaration, and the output text
//                 contains every generated artifact.
// Failure modes: the first CompileError aborts the pass; no output is built.
// Side effects: none.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ast::{span, Span};
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::emit;
use crate::node::compile_decl;
use crate::registry::Registry;
use crate::scan::{line_indent, scan, ScanResult};

// ── Options ────────────────────────────────────────────────────────────────

/// Names the pass looks for in the source and writes into the output.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Declaration macro name, without the `!`.
    pub decl_macro: String,
    /// Identifier bound to the A-tag table literal.
    pub seed_table: String,
    /// Registration sink called with each B→A function.
    pub register_fn: String,
    /// Representation-A record type in generated signatures.
    pub a_type: String,
    /// Representation-B node type in generated signatures.
    pub b_type: String,
    /// Tag of the synthetic block built by `rewrap_block`.
    pub block_tag: String,
    /// Field holding a block's statement sequence on both sides.
    pub block_field: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            decl_macro: "map".to_string(),
            seed_table: "A_TO_B".to_string(),
            register_fn: "register_b_to_a".to_string(),
            a_type: "AstNode".to_string(),
            b_type: "Node".to_string(),
            block_tag: "BlockStatement".to_string(),
            block_field: "body".to_string(),
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Every way a pass can fail. All of them abort the pass.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A mapping token does not match `<field><op><field>`.
    MalformedMapping {
        token: String,
        message: String,
        span: Span,
        decl: Option<String>,
    },
    /// Mode resolution saw an operator outside `= > @ %`.
    UnknownOperator {
        op: char,
        span: Span,
        decl: Option<String>,
    },
    /// The seed table literal is not in the source.
    MissingSeedTable { name: String },
    /// An A-tag is already in the registry.
    DuplicateTag { tag: String, span: Span, first: Span },
    /// A declaration's arguments, or the seed literal, cannot be read.
    MalformedDeclaration { message: String, span: Span },
}

impl CompileError {
    pub fn code(&self) -> crate::diag::DiagCode {
        match self {
            CompileError::MalformedMapping { .. } => codes::E0001,
            CompileError::UnknownOperator { .. } => codes::E0002,
            CompileError::MissingSeedTable { .. } => codes::E0003,
            CompileError::DuplicateTag { .. } => codes::E0004,
            CompileError::MalformedDeclaration { .. } => codes::E0005,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::MalformedMapping { span, .. }
            | CompileError::UnknownOperator { span, .. }
            | CompileError::DuplicateTag { span, .. }
            | CompileError::MalformedDeclaration { span, .. } => Some(*span),
            CompileError::MissingSeedTable { .. } => None,
        }
    }

    /// Attach the tag of the declaration being compiled.
    pub fn in_decl(self, tag: &str) -> Self {
        match self {
            CompileError::MalformedMapping {
                token,
                message,
                span,
                decl: None,
            } => CompileError::MalformedMapping {
                token,
                message,
                span,
                decl: Some(tag.to_string()),
            },
            CompileError::UnknownOperator {
                op,
                span,
                decl: None,
            } => CompileError::UnknownOperator {
                op,
                span,
                decl: Some(tag.to_string()),
            },
            other => other,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let at = self.span().unwrap_or_else(|| span(0, 0));
        let d = Diagnostic::new(DiagLevel::Error, at, self.to_string()).with_code(self.code());
        match self {
            CompileError::MalformedMapping { .. } => {
                d.with_hint("each token must be <field><op><field> with op one of = > @ %")
            }
            CompileError::UnknownOperator { .. } => {
                d.with_hint("recognized operators are = (direct), > (recursive), @ (list), % (block body)")
            }
            CompileError::MissingSeedTable { name } => d.with_hint(format!(
                "declare the table literal, e.g. `static {name}: &[(&str, FromA)] = &[(\"Node\", from_a_unknown)];`"
            )),
            CompileError::DuplicateTag { first, .. } => {
                d.with_related(*first, "first registered here")
            }
            CompileError::MalformedDeclaration { .. } => d,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_decl = |decl: &Option<String>| match decl {
            Some(tag) => format!(" in declaration of \"{tag}\""),
            None => String::new(),
        };
        match self {
            CompileError::MalformedMapping {
                token,
                message,
                decl,
                ..
            } => write!(
                f,
                "can't understand property map `{}`{}: {}",
                token,
                in_decl(decl),
                message
            ),
            CompileError::UnknownOperator { op, decl, .. } => {
                write!(f, "unknown mapping operator '{}'{}", op, in_decl(decl))
            }
            CompileError::MissingSeedTable { name } => {
                write!(f, "seed table `{}` not found in declaration source", name)
            }
            CompileError::DuplicateTag { tag, .. } => {
                write!(f, "duplicate tag \"{}\": already registered", tag)
            }
            CompileError::MalformedDeclaration { message, .. } => {
                write!(f, "malformed declaration: {}", message)
            }
        }
    }
}

impl std::error::Error for CompileError {}

// ── Output ─────────────────────────────────────────────────────────────────

/// Wall-clock time of one phase, for `--verbose`.
#[derive(Debug, Clone, Copy)]
pub struct PhaseTiming {
    pub phase: &'static str,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct CompileOutput {
    /// The rewritten declaration source.
    pub source: String,
    /// Fully populated after the pass.
    pub registry: Registry,
    pub declarations: usize,
    /// Warnings only; errors abort the pass.
    pub diagnostics: Vec<Diagnostic>,
    pub timings: Vec<PhaseTiming>,
}

// ── Pass ───────────────────────────────────────────────────────────────────

/// Compile every declaration in `source` and rewrite it.
pub fn compile(source: &str, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    let mut timings = Vec::new();

    let t = Instant::now();
    let ScanResult { declarations, seed } = scan(source, options)?;
    timings.push(PhaseTiming {
        phase: "scan",
        elapsed: t.elapsed(),
    });

    let t = Instant::now();
    let mut registry = Registry::seeded(seed.tags.iter().cloned())?;
    let mut diagnostics = Vec::new();
    for decl in &declarations {
        let registered = compile_decl(decl, &mut registry)?;
        if registered.shadowed {
            let first = registry
                .lookup_ctor(&decl.b_ctor)
                .map_or(decl.span, |n| n.span);
            diagnostics.push(
                Diagnostic::new(
                    DiagLevel::Warning,
                    decl.span,
                    format!(
                        "constructor `{}` already converts back to \"{}\"; \"{}\" is shadowed for B→A",
                        decl.b_ctor,
                        registry
                            .lookup_ctor(&decl.b_ctor)
                            .map_or("", |n| n.a_tag.as_str()),
                        decl.a_tag
                    ),
                )
                .with_code(codes::W0001)
                .with_related(first, "first registered here"),
            );
        }
    }
    timings.push(PhaseTiming {
        phase: "compile",
        elapsed: t.elapsed(),
    });

    let t = Instant::now();
    let output = rewrite(source, &declarations, &seed, &registry, options);
    timings.push(PhaseTiming {
        phase: "emit",
        elapsed: t.elapsed(),
    });

    Ok(CompileOutput {
        source: output,
        registry,
        declarations: declarations.len(),
        diagnostics,
        timings,
    })
}

/// Splice the generated artifacts into the source.
fn rewrite(
    source: &str,
    declarations: &[crate::ast::MappingDecl],
    seed: &crate::scan::SeedTable,
    registry: &Registry,
    options: &CompileOptions,
) -> String {
    let mut edits: Vec<(usize, usize, String)> = Vec::with_capacity(declarations.len() + 1);

    if registry.nodes().next().is_some() {
        let interior = &source[seed.interior.clone()];
        let kept = interior.trim_end();
        let suffix = &interior[kept.len()..];
        let open_indent = line_indent(source, seed.interior.start.saturating_sub(1));
        let entry_indent = match seed.tags.first() {
            Some((_, tag_span)) => line_indent(source, tag_span.start).to_string(),
            None => format!("{open_indent}    "),
        };

        let mut text = kept.to_string();
        if !kept.trim().is_empty() && !kept.ends_with(',') {
            text.push(',');
        }
        for node in registry.nodes() {
            text.push('\n');
            text.push_str(&entry_indent);
            text.push_str(&emit::join_indented(
                &emit::to_b_entry(node, options),
                &entry_indent,
            ));
            text.push(',');
        }
        if suffix.contains('\n') {
            text.push_str(suffix);
        } else {
            text.push('\n');
            text.push_str(open_indent);
        }
        edits.push((seed.interior.start, seed.interior.end, text));
    }

    for (decl, node) in declarations.iter().zip(registry.nodes()) {
        let indent = line_indent(source, decl.span.start);
        let text = emit::join_indented(&emit::registration(node, options), indent);
        edits.push((decl.span.start, decl.span.end, text));
    }

    edits.sort_by_key(|(start, _, _)| *start);

    let mut out = String::with_capacity(source.len() * 4);
    let mut pos = 0;
    for (start, end, text) in edits {
        out.push_str(&source[pos..start]);
        out.push_str(&text);
        pos = end;
    }
    out.push_str(&source[pos..]);
    out
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Build metadata for `--emit build-info`.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    /// SHA-256 of the declaration source, lowercase hex.
    pub source_hash: String,
    pub declarations: usize,
    pub compiler_version: &'static str,
}

pub fn compute_provenance(source: &str, declarations: usize) -> Provenance {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();

    let mut source_hash = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write;
        let _ = write!(source_hash, "{:02x}", b);
    }

    Provenance {
        source_hash,
        declarations,
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
