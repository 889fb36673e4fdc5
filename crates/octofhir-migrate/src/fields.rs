//! Location of reference-carrying fields inside resource bodies.
//!
//! A body is walked as a tree of [`Node`]s. A string becomes a
//! [`Node::Reference`] when the member that holds it (directly, or as an item
//! of an array) is one of the reference-carrying members; everything else is a
//! map, a list or a scalar. References can sit at any depth.

use serde_json::{Map, Value};

/// Member holding an instance reference (`Reference.reference`).
pub const INSTANCE_FIELD: &str = "reference";

/// Members holding canonical references, either as a string or an array of strings.
pub const CANONICAL_FIELDS: [&str; 10] = [
    "definitionCanonical",
    "definitionUri",
    "transform",
    "library",
    "answerValueSet",
    "derivedFrom",
    "import",
    "valueSet",
    "resource",
    "instantiatesCanonical",
];

/// Which kind of member carries a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceShape {
    Instance,
    Canonical,
}

impl ReferenceShape {
    pub fn of_member(name: &str) -> Option<Self> {
        if name == INSTANCE_FIELD {
            Some(Self::Instance)
        } else if CANONICAL_FIELDS.contains(&name) {
            Some(Self::Canonical)
        } else {
            None
        }
    }
}

/// One reference found in a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceField {
    /// Dotted path from the resource root, e.g. `action[0].definitionCanonical`.
    pub path: String,
    pub shape: ReferenceShape,
    pub value: String,
}

/// A position in a resource body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'v> {
    Map(&'v Map<String, Value>),
    List(&'v [Value]),
    Scalar(&'v Value),
    Reference(ReferenceShape, &'v str),
}

impl<'v> Node<'v> {
    /// Classifies `value`, held by `member` (or by an array held by `member`).
    pub fn of(member: Option<&str>, value: &'v Value) -> Self {
        match (member.and_then(ReferenceShape::of_member), value) {
            (Some(shape), Value::String(s)) => Node::Reference(shape, s),
            (_, Value::Object(map)) => Node::Map(map),
            (_, Value::Array(items)) => Node::List(items),
            _ => Node::Scalar(value),
        }
    }
}

/// Collects every reference in `body`, in document order.
pub fn collect_references(body: &Value) -> Vec<ReferenceField> {
    let mut found = Vec::new();
    collect_into(Node::of(None, body), None, String::new(), &mut found);
    found
}

fn collect_into(node: Node<'_>, member: Option<&str>, path: String, out: &mut Vec<ReferenceField>) {
    match node {
        Node::Reference(shape, value) => out.push(ReferenceField {
            path,
            shape,
            value: value.to_string(),
        }),
        Node::Map(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                let member = Some(key.as_str());
                collect_into(Node::of(member, child), member, child_path, out);
            }
        }
        Node::List(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_into(
                    Node::of(member, item),
                    member,
                    format!("{path}[{index}]"),
                    out,
                );
            }
        }
        Node::Scalar(_) => {}
    }
}

/// Rewrites references in place. `replace` returns the new value, or `None`
/// to keep the reference as it is. Returns the number of rewritten fields.
pub fn rewrite_references<F>(body: &mut Value, mut replace: F) -> usize
where
    F: FnMut(&ReferenceField) -> Option<String>,
{
    let mut rewritten = 0;
    rewrite_in(body, None, String::new(), &mut replace, &mut rewritten);
    rewritten
}

fn rewrite_in<F>(
    value: &mut Value,
    member: Option<&str>,
    path: String,
    replace: &mut F,
    rewritten: &mut usize,
) where
    F: FnMut(&ReferenceField) -> Option<String>,
{
    let shape = member.and_then(ReferenceShape::of_member);
    match value {
        Value::String(current) => {
            let Some(shape) = shape else { return };
            let field = ReferenceField {
                path,
                shape,
                value: current.clone(),
            };
            if let Some(next) = replace(&field) {
                *current = next;
                *rewritten += 1;
            }
        }
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                rewrite_in(child, Some(key.as_str()), child_path, replace, rewritten);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                rewrite_in(item, member, format!("{path}[{index}]"), replace, rewritten);
            }
        }
        _ => {}
    }
}
