// expr.rs — Expression IR for generated conversion functions
//
// The field and node compilers build these trees; `emit` renders them as
// source text and `runtime` evaluates them directly. Both consumers match
// exhaustively, so a new helper is a compile-time-checked addition.

use std::fmt;

/// Which representation a conversion function's parameter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Standardized parse-tree record (input of A→B).
    A,
    /// Internal node (input of B→A).
    B,
}

/// External collaborators the generated code calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    /// Generic A→B converter, dispatching on the record's tag.
    FromA,
    /// Generic B→A converter, dispatching on the node's constructor.
    ToA,
    FromAList,
    ToAList,
    /// Statement sequence of an already-converted block node.
    UnwrapBlock,
    /// Synthetic A-side block around a B statement sequence.
    RewrapBlock,
    DeriveStart,
    DeriveEnd,
}

impl Helper {
    #[cfg(test)]
    pub const ALL: [Helper; 8] = [
        Helper::FromA,
        Helper::ToA,
        Helper::FromAList,
        Helper::ToAList,
        Helper::UnwrapBlock,
        Helper::RewrapBlock,
        Helper::DeriveStart,
        Helper::DeriveEnd,
    ];

    /// Name of the collaborator function in generated source.
    pub fn name(self) -> &'static str {
        match self {
            Helper::FromA => "from_a",
            Helper::ToA => "to_a",
            Helper::FromAList => "from_a_list",
            Helper::ToAList => "to_a_list",
            Helper::UnwrapBlock => "unwrap_block",
            Helper::RewrapBlock => "rewrap_block",
            Helper::DeriveStart => "derive_start",
            Helper::DeriveEnd => "derive_end",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The enclosing function's node parameter.
    Param(Side),
    /// `base.field`
    Member(Box<Expr>, String),
    /// `helper(arg)`
    Call(Helper, Box<Expr>),
    /// String literal.
    Str(String),
}

impl Expr {
    pub fn member(base: Expr, field: &str) -> Expr {
        Expr::Member(Box::new(base), field.to_string())
    }

    pub fn call(helper: Helper, arg: Expr) -> Expr {
        Expr::Call(helper, Box::new(arg))
    }

    /// `param.field` on the given side.
    pub fn field(side: Side, field: &str) -> Expr {
        Expr::member(Expr::Param(side), field)
    }

    /// Sides referenced by parameters anywhere in this expression.
    #[cfg(test)]
    pub fn sides(&self) -> Vec<Side> {
        let mut out = Vec::new();
        self.collect_sides(&mut out);
        out
    }

    #[cfg(test)]
    fn collect_sides(&self, out: &mut Vec<Side>) {
        match self {
            Expr::Param(side) => {
                if !out.contains(side) {
                    out.push(*side);
                }
            }
            Expr::Member(base, _) => base.collect_sides(out),
            Expr::Call(_, arg) => arg.collect_sides(out),
            Expr::Str(_) => {}
        }
    }
}

/// Compact notation used in diagnostics and test failure messages,
/// e.g. `from_a_list(A.body)`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Param(Side::A) => write!(f, "A"),
            Expr::Param(Side::B) => write!(f, "B"),
            Expr::Member(base, field) => write!(f, "{base}.{field}"),
            Expr::Call(helper, arg) => write!(f, "{}({arg})", helper.name()),
            Expr::Str(s) => write!(f, "{s:?}"),
        }
    }
}
