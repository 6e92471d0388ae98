// emit.rs — Source emission for compiled nodes
//
// Renders the expression IR of each compiled node as Rust source: an A→B
// closure entry for the seed table and a `register_b_to_a(Ctor, closure)`
// call that replaces the declaration.
//
// Preconditions: nodes come from `node::compile_node`.
// Postconditions: output is deterministic; one field per line, in IR order.
// Failure modes: none.
// Side effects: none.

use std::fmt::Write as _;

use crate::driver::CompileOptions;
use crate::expr::{Expr, Side};
use crate::node::{Build, CompiledNode, ConvFn};

const INDENT: &str = "    ";

/// `("Tag", |a: &AstNode| -> Node { ... })` — one A-table entry, without a
/// trailing comma. Returned as lines with no base indentation.
pub fn to_b_entry(node: &CompiledNode, options: &CompileOptions) -> Vec<String> {
    let mut lines = closure(&node.to_b, options);
    lines[0] = format!("({:?}, {}", node.a_tag, lines[0]);
    if let Some(last) = lines.last_mut() {
        last.push(')');
    }
    lines
}

/// `register_b_to_a(Ctor, |b: &Node| -> AstNode { ... })`, without the
/// statement's semicolon.
pub fn registration(node: &CompiledNode, options: &CompileOptions) -> Vec<String> {
    let mut lines = closure(&node.to_a, options);
    lines[0] = format!("{}({}, {}", options.register_fn, node.b_ctor, lines[0]);
    if let Some(last) = lines.last_mut() {
        last.push(')');
    }
    lines
}

/// Join lines, indenting every line after the first by `indent`.
pub fn join_indented(lines: &[String], indent: &str) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}

fn closure(f: &ConvFn, options: &CompileOptions) -> Vec<String> {
    let (param_type, return_type) = match f.param {
        Side::A => (&options.a_type, &options.b_type),
        Side::B => (&options.b_type, &options.a_type),
    };
    let opener = match &f.build {
        Build::Construct(ctor) => format!("{}::new({}, vec![", options.b_type, ctor),
        Build::Record => format!("{}::record(vec![", options.a_type),
    };

    let mut lines = Vec::with_capacity(f.fields.len() + 4);
    lines.push(format!(
        "|{}: &{}| -> {} {{",
        param_name(f.param),
        param_type,
        return_type
    ));
    lines.push(format!("{INDENT}{opener}"));
    for (name, value) in &f.fields {
        let mut line = String::new();
        let _ = write!(line, "{INDENT}{INDENT}({:?}, {}.into()),", name, expr(value));
        lines.push(line);
    }
    lines.push(format!("{INDENT}])"));
    lines.push("}".to_string());
    lines
}

fn param_name(side: Side) -> &'static str {
    match side {
        Side::A => "a",
        Side::B => "b",
    }
}

/// Render one expression.
pub fn expr(e: &Expr) -> String {
    match e {
        Expr::Param(side) => param_name(*side).to_string(),
        Expr::Member(base, field) => format!("{}.get({:?})", expr(base), field),
        Expr::Call(helper, arg) => format!("{}({})", helper.name(), expr(arg)),
        Expr::Str(s) => format!("{s:?}"),
    }
}
