// field.rs — Field compiler
//
// Turns one field mapping into the pair of expressions placed in the two
// generated functions. The A→B expression reads the A parameter and is stored
// under the B field name; the B→A expression reads the B parameter and is
// stored under the A field name.
//
// Preconditions: the mapping's mode is already resolved.
// Postconditions: `to_b` only references `Side::A`, `to_a` only `Side::B`.
// Failure modes: none.
// Side effects: none.

use crate::ast::{FieldMapping, Mode};
use crate::expr::{Expr, Helper, Side};

/// Both directions of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExprs {
    /// B field name and its A→B value.
    pub to_b: (String, Expr),
    /// A field name and its B→A value.
    pub to_a: (String, Expr),
}

pub fn compile_field(field: &FieldMapping) -> FieldExprs {
    let a = field.a_field.name.as_str();
    let b = field.b_field.name.as_str();
    let a_value = Expr::field(Side::A, a);
    let b_value = Expr::field(Side::B, b);

    let (to_b, to_a) = match field.mode {
        Mode::Direct => (a_value, b_value),
        Mode::Recursive => (
            Expr::call(Helper::FromA, a_value),
            Expr::call(Helper::ToA, b_value),
        ),
        Mode::MappedList => (
            Expr::call(Helper::FromAList, a_value),
            Expr::call(Helper::ToAList, b_value),
        ),
        // Unwrap one block level on the way in; rebuild a synthetic block on
        // the way out. Not mirror images.
        Mode::BlockBody => (
            Expr::call(Helper::UnwrapBlock, Expr::call(Helper::FromA, a_value)),
            Expr::call(Helper::RewrapBlock, b_value),
        ),
    };

    FieldExprs {
        to_b: (b.to_string(), to_b),
        to_a: (a.to_string(), to_a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{span, Ident};

    fn mapping(a: &str, mode: Mode, b: &str) -> FieldMapping {
        FieldMapping {
            a_field: Ident {
                name: a.to_string(),
                span: span(0, a.len()),
            },
            b_field: Ident {
                name: b.to_string(),
                span: span(a.len() + 1, a.len() + 1 + b.len()),
            },
            mode,
            span: span(0, a.len() + 1 + b.len()),
        }
    }

    fn rendered(field: &FieldExprs) -> (String, String) {
        (
            format!("{} = {}", field.to_b.0, field.to_b.1),
            format!("{} = {}", field.to_a.0, field.to_a.1),
        )
    }

    #[test]
    fn direct_is_syntactic_inverse() {
        let f = compile_field(&mapping("value", Mode::Direct, "val"));
        assert_eq!(
            rendered(&f),
            ("val = A.value".to_string(), "value = B.val".to_string())
        );
    }

    #[test]
    fn recursive_uses_generic_converters() {
        let f = compile_field(&mapping("test", Mode::Recursive, "condition"));
        assert_eq!(
            rendered(&f),
            (
                "condition = from_a(A.test)".to_string(),
                "test = to_a(B.condition)".to_string()
            )
        );
    }

    #[test]
    fn mapped_list_uses_sequence_converters() {
        let f = compile_field(&mapping("body", Mode::MappedList, "body"));
        assert_eq!(
            rendered(&f),
            (
                "body = from_a_list(A.body)".to_string(),
                "body = to_a_list(B.body)".to_string()
            )
        );
    }

    #[test]
    fn block_body_is_asymmetric() {
        let f = compile_field(&mapping("body", Mode::BlockBody, "body"));
        assert_eq!(
            rendered(&f),
            (
                "body = unwrap_block(from_a(A.body))".to_string(),
                "body = rewrap_block(B.body)".to_string()
            )
        );
    }

    #[test]
    fn each_direction_reads_only_its_own_side() {
        for mode in [
            Mode::Direct,
            Mode::Recursive,
            Mode::MappedList,
            Mode::BlockBody,
        ] {
            let f = compile_field(&mapping("x", mode, "y"));
            assert_eq!(f.to_b.1.sides(), vec![Side::A], "{mode}");
            assert_eq!(f.to_a.1.sides(), vec![Side::B], "{mode}");
        }
    }
}
