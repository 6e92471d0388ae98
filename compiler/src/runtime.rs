// runtime.rs — Reference evaluator for compiled conversions
//
// Runs the expression IR held in a populated registry directly, standing in
// for the collaborators generated source calls (`from_a`, `to_a`, list and
// block helpers, span derivation). Representation A is JSON
// (`serde_json::Value` records tagged by `type`); Representation B is
// `BNode` trees.
//
// Preconditions: the registry came out of a successful compilation pass.
// Postconditions: `from_a`/`to_a` never mutate the registry; `null` children
//                 pass through both directions unchanged.
// Failure modes: RuntimeError on unknown tags/constructors or on values whose
//                shape does not fit the helper applied to them.
// Side effects: none.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::driver::CompileOptions;
use crate::expr::{Expr, Helper, Side};
use crate::node::{Build, ConvFn};
use crate::registry::Registry;

// ── Representation B ───────────────────────────────────────────────────────

/// A value held in a B node field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BValue {
    /// Scalar copied as-is (also `null` for absent children).
    Plain(Value),
    Node(Box<BNode>),
    List(Vec<BValue>),
}

impl BValue {
    pub const NULL: BValue = BValue::Plain(Value::Null);

    pub fn as_node(&self) -> Option<&BNode> {
        match self {
            BValue::Node(node) => Some(node),
            _ => None,
        }
    }

    fn kind(&self) -> String {
        match self {
            BValue::Plain(v) => json_kind(v).to_string(),
            BValue::Node(node) => format!("node `{}`", node.ctor),
            BValue::List(_) => "list".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BNode {
    pub ctor: String,
    pub fields: Vec<(String, BValue)>,
}

impl BNode {
    pub fn get(&self, field: &str) -> Option<&BValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v)
    }
}

// ── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// No compiled A→B function for this tag (includes seed placeholders).
    UnknownTag(String),
    /// A record without a string `type` field.
    Untagged(String),
    UnknownCtor(String),
    /// A helper received a value of the wrong kind.
    Shape {
        helper: &'static str,
        expected: &'static str,
        found: String,
    },
    /// A conversion function referenced the other side's parameter.
    Scope(Side),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnknownTag(tag) => write!(f, "no conversion registered for tag \"{}\"", tag),
            RuntimeError::Untagged(found) => {
                write!(f, "expected a record with a string `type`, found {}", found)
            }
            RuntimeError::UnknownCtor(ctor) => {
                write!(f, "no conversion registered for constructor `{}`", ctor)
            }
            RuntimeError::Shape {
                helper,
                expected,
                found,
            } => write!(f, "{}: expected {}, found {}", helper, expected, found),
            RuntimeError::Scope(side) => {
                write!(f, "parameter {:?} is not in scope", side)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

// ── Evaluator ──────────────────────────────────────────────────────────────

/// An intermediate value: either side can appear mid-expression.
enum Val {
    A(Value),
    B(BValue),
}

#[derive(Clone, Copy)]
enum Scope<'v> {
    A(&'v Value),
    B(&'v BNode),
}

pub struct Runtime<'r> {
    registry: &'r Registry,
    block_tag: String,
    block_field: String,
}

impl<'r> Runtime<'r> {
    pub fn new(registry: &'r Registry, options: &CompileOptions) -> Self {
        Self {
            registry,
            block_tag: options.block_tag.clone(),
            block_field: options.block_field.clone(),
        }
    }

    /// Convert an A record to B by dispatching on its `type`.
    pub fn from_a(&self, a: &Value) -> Result<BValue, RuntimeError> {
        if a.is_null() {
            return Ok(BValue::NULL);
        }
        let tag = a
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RuntimeError::Untagged(json_kind(a).to_string()))?;
        let node = self
            .registry
            .lookup(tag)
            .ok_or_else(|| RuntimeError::UnknownTag(tag.to_string()))?;

        let fields = self.fields(&node.to_b, Scope::A(a))?;
        let ctor = match &node.to_b.build {
            Build::Construct(ctor) => ctor.clone(),
            Build::Record => node.b_ctor.clone(),
        };
        let fields = fields
            .into_iter()
            .map(|(name, v)| (name, into_b(v)))
            .collect();
        Ok(BValue::Node(Box::new(BNode { ctor, fields })))
    }

    /// Convert a B node to A by dispatching on its constructor. Known
    /// `start`/`end` positions are carried onto the record.
    pub fn to_a(&self, b: &BValue) -> Result<Value, RuntimeError> {
        let b = match b {
            BValue::Plain(Value::Null) => return Ok(Value::Null),
            BValue::Node(node) => node,
            other => {
                return Err(RuntimeError::Shape {
                    helper: Helper::ToA.name(),
                    expected: "node",
                    found: other.kind(),
                })
            }
        };
        let node = self
            .registry
            .lookup_ctor(&b.ctor)
            .ok_or_else(|| RuntimeError::UnknownCtor(b.ctor.clone()))?;

        let mut record = Map::new();
        for (name, v) in self.fields(&node.to_a, Scope::B(b))? {
            record.insert(name, into_a(v, Helper::ToA)?);
        }
        for pos in ["start", "end"] {
            if let Some(BValue::Plain(v)) = b.get(pos) {
                if !v.is_null() && !record.contains_key(pos) {
                    record.insert(pos.to_string(), v.clone());
                }
            }
        }
        Ok(Value::Object(record))
    }

    /// A→B→A.
    pub fn round_trip(&self, a: &Value) -> Result<Value, RuntimeError> {
        self.to_a(&self.from_a(a)?)
    }

    fn fields(&self, f: &ConvFn, scope: Scope<'_>) -> Result<Vec<(String, Val)>, RuntimeError> {
        f.fields
            .iter()
            .map(|(name, e)| Ok((name.clone(), self.eval(e, scope)?)))
            .collect()
    }

    fn eval(&self, e: &Expr, scope: Scope<'_>) -> Result<Val, RuntimeError> {
        match e {
            Expr::Param(side) => match (side, scope) {
                (Side::A, Scope::A(a)) => Ok(Val::A(a.clone())),
                (Side::B, Scope::B(b)) => Ok(Val::B(BValue::Node(Box::new(b.clone())))),
                (side, _) => Err(RuntimeError::Scope(*side)),
            },
            Expr::Member(base, field) => {
                if let Expr::Param(side) = base.as_ref() {
                    return match (side, scope) {
                        (Side::A, Scope::A(a)) => Ok(Val::A(a_field(a, field))),
                        (Side::B, Scope::B(b)) => Ok(Val::B(b.get(field).cloned().unwrap_or(BValue::NULL))),
                        (side, _) => Err(RuntimeError::Scope(*side)),
                    };
                }
                Ok(match self.eval(base, scope)? {
                    Val::A(a) => Val::A(a_field(&a, field)),
                    Val::B(BValue::Node(b)) => Val::B(b.get(field).cloned().unwrap_or(BValue::NULL)),
                    Val::B(_) => Val::B(BValue::NULL),
                })
            }
            Expr::Call(helper @ (Helper::DeriveStart | Helper::DeriveEnd), arg) => {
                if let (Expr::Param(Side::A), Scope::A(a)) = (arg.as_ref(), scope) {
                    let start = *helper == Helper::DeriveStart;
                    return Ok(Val::B(BValue::Plain(derive_pos(a, start))));
                }
                let arg = self.eval(arg, scope)?;
                self.call(*helper, arg)
            }
            Expr::Call(helper, arg) => {
                let arg = self.eval(arg, scope)?;
                self.call(*helper, arg)
            }
            Expr::Str(s) => Ok(Val::A(Value::String(s.clone()))),
        }
    }

    fn call(&self, helper: Helper, arg: Val) -> Result<Val, RuntimeError> {
        match helper {
            Helper::FromA => Ok(Val::B(self.from_a(&expect_a(arg, helper)?)?)),
            Helper::ToA => Ok(Val::A(self.to_a(&expect_b(arg, helper)?)?)),
            Helper::FromAList => match expect_a(arg, helper)? {
                Value::Null => Ok(Val::B(BValue::NULL)),
                Value::Array(items) => Ok(Val::B(BValue::List(
                    items
                        .iter()
                        .map(|item| self.from_a(item))
                        .collect::<Result<_, _>>()?,
                ))),
                other => Err(shape(helper, "array", json_kind(&other))),
            },
            Helper::ToAList => match expect_b(arg, helper)? {
                BValue::Plain(Value::Null) => Ok(Val::A(Value::Null)),
                BValue::List(items) => Ok(Val::A(Value::Array(
                    items
                        .iter()
                        .map(|item| self.to_a(item))
                        .collect::<Result<_, _>>()?,
                ))),
                other => Err(shape(helper, "list", &other.kind())),
            },
            Helper::UnwrapBlock => match expect_b(arg, helper)? {
                BValue::Plain(Value::Null) => Ok(Val::B(BValue::NULL)),
                BValue::Node(block) => Ok(Val::B(
                    block
                        .get(&self.block_field)
                        .cloned()
                        .unwrap_or(BValue::List(Vec::new())),
                )),
                other => Err(shape(helper, "block node", &other.kind())),
            },
            Helper::RewrapBlock => match expect_b(arg, helper)? {
                BValue::Plain(Value::Null) => Ok(Val::A(Value::Null)),
                BValue::List(items) => {
                    let body = items
                        .iter()
                        .map(|item| self.to_a(item))
                        .collect::<Result<Vec<_>, _>>()?;
                    let mut block = Map::new();
                    block.insert("type".to_string(), Value::String(self.block_tag.clone()));
                    block.insert(self.block_field.clone(), Value::Array(body));
                    Ok(Val::A(Value::Object(block)))
                }
                other => Err(shape(helper, "list", &other.kind())),
            },
            Helper::DeriveStart | Helper::DeriveEnd => {
                let a = expect_a(arg, helper)?;
                Ok(Val::B(BValue::Plain(derive_pos(
                    &a,
                    helper == Helper::DeriveStart,
                ))))
            }
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn a_field(a: &Value, field: &str) -> Value {
    a.get(field).cloned().unwrap_or(Value::Null)
}

/// `start`/`end` of a record, falling back to `range: [start, end]`.
fn derive_pos(a: &Value, start: bool) -> Value {
    let (key, index) = if start { ("start", 0) } else { ("end", 1) };
    match a.get(key) {
        Some(v) if !v.is_null() => v.clone(),
        _ => a
            .get("range")
            .and_then(|r| r.get(index))
            .cloned()
            .unwrap_or(Value::Null),
    }
}

fn expect_a(v: Val, helper: Helper) -> Result<Value, RuntimeError> {
    match v {
        Val::A(a) => Ok(a),
        Val::B(b) => Err(shape(helper, "representation A value", &b.kind())),
    }
}

fn expect_b(v: Val, helper: Helper) -> Result<BValue, RuntimeError> {
    match v {
        Val::B(b) => Ok(b),
        Val::A(a) => Err(shape(helper, "representation B value", json_kind(&a))),
    }
}

/// Direct-mode A values become plain B scalars.
fn into_b(v: Val) -> BValue {
    match v {
        Val::A(a) => BValue::Plain(a),
        Val::B(b) => b,
    }
}

/// Direct-mode B values must be plain to land in an A record.
fn into_a(v: Val, helper: Helper) -> Result<Value, RuntimeError> {
    match v {
        Val::A(a) | Val::B(BValue::Plain(a)) => Ok(a),
        Val::B(b) => Err(shape(helper, "plain value", &b.kind())),
    }
}

fn shape(helper: Helper, expected: &'static str, found: &str) -> RuntimeError {
    RuntimeError::Shape {
        helper: helper.name(),
        expected,
        found: found.to_string(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::compile;
    use serde_json::json;

    fn registry(decls: &str) -> Registry {
        let source = format!("static A_TO_B: T = &[(\"Node\", f)];\n{decls}");
        compile(&source, &CompileOptions::default())
            .unwrap_or_else(|e| panic!("{e}"))
            .registry
    }

    const JS: &str = r#"
map!("Program", Toplevel, "body@body");
map!("ExpressionStatement", SimpleStatement, "expression>body");
map!("Literal", String, "value=value");
map!("Identifier", SymbolRef, "name=name");
map!("BlockStatement", BlockStatement, "body@body");
map!("WhileStatement", While, "test>condition, body%body");
map!("IfStatement", If, "test>condition, consequent>body, alternate>alternative");
map!("EmptyStatement", EmptyStatement);
"#;

    #[test]
    fn literal_round_trip_is_identity() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let lit = json!({"type": "Literal", "value": "x", "start": 3, "end": 6});
        assert_eq!(rt.round_trip(&lit).unwrap(), lit);
    }

    #[test]
    fn direct_field_copied_into_b() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let b = rt
            .from_a(&json!({"type": "Literal", "value": 42, "start": 0, "end": 2}))
            .unwrap();
        let node = b.as_node().unwrap();
        assert_eq!(node.ctor, "String");
        assert_eq!(node.get("value"), Some(&BValue::Plain(json!(42))));
        assert_eq!(node.get("start"), Some(&BValue::Plain(json!(0))));
    }

    #[test]
    fn positions_fall_back_to_range() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let b = rt
            .from_a(&json!({"type": "Identifier", "name": "x", "range": [5, 6]}))
            .unwrap();
        assert_eq!(b.as_node().unwrap().get("end"), Some(&BValue::Plain(json!(6))));
    }

    #[test]
    fn program_list_keeps_order_and_length() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let program = json!({
            "type": "Program",
            "body": [
                {"type": "ExpressionStatement", "expression": {"type": "Identifier", "name": "a"}},
                {"type": "EmptyStatement"},
                {"type": "ExpressionStatement", "expression": {"type": "Literal", "value": 1}}
            ]
        });
        let b = rt.from_a(&program).unwrap();
        let Some(BValue::List(items)) = b.as_node().unwrap().get("body") else {
            panic!("body is not a list")
        };
        let ctors: Vec<_> = items.iter().map(|i| i.as_node().unwrap().ctor.as_str()).collect();
        assert_eq!(ctors, vec!["SimpleStatement", "EmptyStatement", "SimpleStatement"]);
        assert_eq!(rt.to_a(&b).unwrap(), program);
    }

    #[test]
    fn recursive_field_preserves_tags() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let stmt = json!({"type": "ExpressionStatement", "expression": {"type": "Identifier", "name": "a"}});
        let back = rt.round_trip(&stmt).unwrap();
        assert_eq!(back["type"], "ExpressionStatement");
        assert_eq!(back["expression"]["type"], "Identifier");
    }

    #[test]
    fn null_children_pass_through() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let stmt = json!({
            "type": "IfStatement",
            "test": {"type": "Identifier", "name": "c"},
            "consequent": {"type": "EmptyStatement"},
            "alternate": null
        });
        let b = rt.from_a(&stmt).unwrap();
        assert_eq!(b.as_node().unwrap().get("alternative"), Some(&BValue::NULL));
        assert_eq!(rt.to_a(&b).unwrap(), stmt);
    }

    #[test]
    fn block_body_unwraps_then_rewraps() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let block = json!({"type": "BlockStatement", "body": [{"type": "EmptyStatement"}]});
        let stmt = json!({
            "type": "WhileStatement",
            "test": {"type": "Identifier", "name": "go"},
            "body": block
        });
        let b = rt.from_a(&stmt).unwrap();
        // One block level removed on the B side.
        let Some(BValue::List(body)) = b.as_node().unwrap().get("body") else {
            panic!("body is not a list")
        };
        assert_eq!(body.len(), 1);
        assert_eq!(rt.to_a(&b).unwrap(), stmt);
    }

    #[test]
    fn rewrap_uses_configured_block_tag() {
        let reg = registry(JS);
        let options = CompileOptions {
            block_tag: "Block".to_string(),
            ..CompileOptions::default()
        };
        let rt = Runtime::new(&reg, &options);
        let stmt = json!({
            "type": "WhileStatement",
            "test": {"type": "Identifier", "name": "go"},
            "body": {"type": "BlockStatement", "body": []}
        });
        let back = rt.round_trip(&stmt).unwrap();
        assert_eq!(back["body"], json!({"type": "Block", "body": []}));
    }

    #[test]
    fn unknown_tag_and_seed_tag_fail() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        assert_eq!(
            rt.from_a(&json!({"type": "ClassDeclaration"})).unwrap_err(),
            RuntimeError::UnknownTag("ClassDeclaration".to_string())
        );
        assert!(matches!(
            rt.from_a(&json!({"type": "Node"})),
            Err(RuntimeError::UnknownTag(_))
        ));
        assert!(matches!(
            rt.from_a(&json!({"value": 1})),
            Err(RuntimeError::Untagged(_))
        ));
    }

    #[test]
    fn unknown_ctor_fails() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let b = BValue::Node(Box::new(BNode {
            ctor: "Nope".to_string(),
            fields: Vec::new(),
        }));
        assert_eq!(
            rt.to_a(&b).unwrap_err(),
            RuntimeError::UnknownCtor("Nope".to_string())
        );
    }

    #[test]
    fn list_field_rejects_scalar() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let err = rt
            .from_a(&json!({"type": "Program", "body": 3}))
            .unwrap_err();
        assert_eq!(err.to_string(), "from_a_list: expected array, found number");
    }

    #[test]
    fn b_tree_serializes_untagged() {
        let reg = registry(JS);
        let rt = Runtime::new(&reg, &CompileOptions::default());
        let b = rt
            .from_a(&json!({"type": "Identifier", "name": "x", "start": 0, "end": 1}))
            .unwrap();
        assert_eq!(
            serde_json::to_value(&b).unwrap(),
            json!({"ctor": "SymbolRef", "fields": [["start", 0], ["end", 1], ["name", "x"]]})
        );
    }
}
