// node.rs — Node compiler
//
// Assembles one declaration's A→B and B→A functions from its field
// expressions plus the fixed span/tag boilerplate, then registers them.
//
// Preconditions: the declaration came from `scan` (tag and ctor are
//                well-formed); its mapping string is not yet parsed.
// Postconditions: A→B fields are `start, end, <user fields>`; B→A fields are
//                 `type, <user fields>`; both in mapping order.
// Failure modes: MalformedMapping / UnknownOperator from the mapping string,
//                DuplicateTag from the registry.
// Side effects: `compile_decl` appends one entry to each registry table.

use crate::ast::{FieldMapping, MappingDecl, Span};
use crate::driver::CompileError;
use crate::expr::{Expr, Helper, Side};
use crate::field::compile_field;
use crate::parser::parse_mapping;
use crate::registry::{Registered, Registry};

/// What a conversion function returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Build {
    /// A new B node of the given constructor.
    Construct(String),
    /// A plain A-side record (Representation A is data-only).
    Record,
}

/// One generated conversion function.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvFn {
    pub param: Side,
    pub fields: Vec<(String, Expr)>,
    pub build: Build,
}

impl ConvFn {
    pub fn field(&self, name: &str) -> Option<&Expr> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }
}

/// Both functions compiled from one declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledNode {
    pub a_tag: String,
    pub b_ctor: String,
    pub fields: Vec<FieldMapping>,
    pub to_b: ConvFn,
    pub to_a: ConvFn,
    pub span: Span,
}

/// Compile a declaration without touching any registry.
///
/// The result depends on `decl` alone, so declarations can be compiled in
/// any order.
pub fn compile_node(decl: &MappingDecl) -> Result<CompiledNode, CompileError> {
    let fields = parse_mapping(decl.mapping.as_ref()).map_err(|e| e.in_decl(&decl.a_tag))?;

    let mut to_b_fields = vec![
        (
            "start".to_string(),
            Expr::call(Helper::DeriveStart, Expr::Param(Side::A)),
        ),
        (
            "end".to_string(),
            Expr::call(Helper::DeriveEnd, Expr::Param(Side::A)),
        ),
    ];
    let mut to_a_fields = vec![("type".to_string(), Expr::Str(decl.a_tag.clone()))];

    for field in &fields {
        let exprs = compile_field(field);
        to_b_fields.push(exprs.to_b);
        to_a_fields.push(exprs.to_a);
    }

    Ok(CompiledNode {
        a_tag: decl.a_tag.clone(),
        b_ctor: decl.b_ctor.clone(),
        fields,
        to_b: ConvFn {
            param: Side::A,
            fields: to_b_fields,
            build: Build::Construct(decl.b_ctor.clone()),
        },
        to_a: ConvFn {
            param: Side::B,
            fields: to_a_fields,
            build: Build::Record,
        },
        span: decl.span,
    })
}

/// Compile a declaration and append it to both registry tables.
pub fn compile_decl(
    decl: &MappingDecl,
    registry: &mut Registry,
) -> Result<Registered, CompileError> {
    if let Some(first) = registry.tag_span(&decl.a_tag) {
        // Checked before compiling so a repeated tag is reported even when
        // its mapping string is also broken.
        return Err(CompileError::DuplicateTag {
            tag: decl.a_tag.clone(),
            span: decl.span,
            first,
        });
    }
    let node = compile_node(decl)?;
    registry.register(node)
}
