//! `CExpr`: a compiled boolean/comparison predicate over named entity
//! properties, used for `WHERE` (spec §4.3, glossary "CExpr"). Compiled
//! once from the `where_xxx_stmt` sub-tree on enter, then evaluated once
//! per candidate row during the matching `exit` handler.

use std::collections::HashMap;

use super::error::QueryError;
use super::gid::Gid;
use super::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CValue {
    Int(i64),
    Str(String),
}

impl CValue {
    fn parse(token: &str) -> Self {
        if let Ok(i) = token.parse::<i64>() {
            CValue::Int(i)
        } else {
            CValue::Str(token.trim_matches('\'').trim_matches('"').to_string())
        }
    }

    fn compare(&self, op: CmpOp, other: &CValue) -> bool {
        match (self, other) {
            (CValue::Int(a), CValue::Int(b)) => match op {
                CmpOp::Eq => a == b,
                CmpOp::Ne => a != b,
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
            },
            (CValue::Str(a), CValue::Str(b)) => match op {
                CmpOp::Eq => a == b,
                CmpOp::Ne => a != b,
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
            },
            // Mismatched types never satisfy an ordering/equality check.
            _ => false,
        }
    }
}

/// A compiled `WHERE` expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CExpr {
    And(Box<CExpr>, Box<CExpr>),
    Or(Box<CExpr>, Box<CExpr>),
    Not(Box<CExpr>),
    Cmp { prop: String, op: CmpOp, value: CValue },
}

/// Properties of the row currently being evaluated.
pub trait Properties {
    fn get(&self, name: &str) -> Option<CValue>;
}

impl Properties for HashMap<String, CValue> {
    fn get(&self, name: &str) -> Option<CValue> {
        HashMap::get(self, name).cloned()
    }
}

impl CExpr {
    /// Compile a `where_xxx_stmt` sub-tree into a `CExpr`, rejecting
    /// trees deeper than `max_depth` (spec §7 edge case: "where-depth
    /// exceeded").
    pub fn compile(node: &Node, max_depth: u32) -> Result<CExpr, QueryError> {
        Self::compile_depth(node, max_depth, 0)
    }

    fn compile_depth(node: &Node, max_depth: u32, depth: u32) -> Result<CExpr, QueryError> {
        if depth > max_depth {
            return Err(QueryError::WhereDepthExceeded(max_depth));
        }

        match node.gid {
            Gid::WhereAnd => {
                let (lhs, rhs) = Self::binary_children(node)?;
                Ok(CExpr::And(
                    Box::new(Self::compile_depth(lhs, max_depth, depth + 1)?),
                    Box::new(Self::compile_depth(rhs, max_depth, depth + 1)?),
                ))
            }
            Gid::WhereOr => {
                let (lhs, rhs) = Self::binary_children(node)?;
                Ok(CExpr::Or(
                    Box::new(Self::compile_depth(lhs, max_depth, depth + 1)?),
                    Box::new(Self::compile_depth(rhs, max_depth, depth + 1)?),
                ))
            }
            Gid::WhereNot => {
                let child = node
                    .children
                    .first()
                    .ok_or_else(|| QueryError::Malformed("`not` with no operand".into()))?;
                Ok(CExpr::Not(Box::new(Self::compile_depth(
                    child,
                    max_depth,
                    depth + 1,
                )?)))
            }
            Gid::WhereCmp => {
                let text = node
                    .text
                    .as_deref()
                    .ok_or_else(|| QueryError::Malformed("comparison node has no text".into()))?;
                Self::parse_cmp(text)
            }
            _ => Err(QueryError::Malformed(format!(
                "unexpected node in where-expression: {:?}",
                node.gid
            ))),
        }
    }

    fn binary_children(node: &Node) -> Result<(&Node, &Node), QueryError> {
        match node.children.as_slice() {
            [lhs, rhs] => Ok((lhs, rhs)),
            _ => Err(QueryError::Malformed(
                "and/or node must have exactly two children".into(),
            )),
        }
    }

    /// Parse `"prop op value"` — the minimal textual shape a `WhereCmp`
    /// leaf carries since the real grammar is out of scope.
    fn parse_cmp(text: &str) -> Result<CExpr, QueryError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            [prop, op, value] => {
                let op = CmpOp::parse(op)
                    .ok_or_else(|| QueryError::Malformed(format!("unknown operator \"{op}\"")))?;
                Ok(CExpr::Cmp {
                    prop: prop.to_string(),
                    op,
                    value: CValue::parse(value),
                })
            }
            _ => Err(QueryError::Malformed(format!(
                "malformed comparison \"{text}\""
            ))),
        }
    }

    pub fn eval(&self, props: &dyn Properties) -> bool {
        match self {
            CExpr::And(lhs, rhs) => lhs.eval(props) && rhs.eval(props),
            CExpr::Or(lhs, rhs) => lhs.eval(props) || rhs.eval(props),
            CExpr::Not(inner) => !inner.eval(props),
            CExpr::Cmp { prop, op, value } => match props.get(prop) {
                Some(actual) => actual.compare(*op, value),
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn props(pairs: &[(&str, CValue)]) -> HashMap<String, CValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn compiles_and_evaluates_a_simple_comparison() {
        let node = Node::with_text(Gid::WhereCmp, "name = active");
        let expr = CExpr::compile(&node, 32).unwrap();
        assert!(expr.eval(&props(&[("name", CValue::Str("active".into()))])));
        assert!(!expr.eval(&props(&[("name", CValue::Str("idle".into()))])));
    }

    #[test]
    fn compiles_and_over_two_comparisons() {
        let tree = Node::new(Gid::WhereAnd)
            .push(Node::with_text(Gid::WhereCmp, "pool = 0"))
            .push(Node::with_text(Gid::WhereCmp, "online = 1"));
        let expr = CExpr::compile(&tree, 32).unwrap();

        assert!(expr.eval(&props(&[
            ("pool", CValue::Int(0)),
            ("online", CValue::Int(1)),
        ])));
        assert!(!expr.eval(&props(&[
            ("pool", CValue::Int(0)),
            ("online", CValue::Int(0)),
        ])));
    }

    #[test]
    fn not_negates_its_operand() {
        let tree = Node::new(Gid::WhereNot).push(Node::with_text(Gid::WhereCmp, "pool = 0"));
        let expr = CExpr::compile(&tree, 32).unwrap();
        assert!(!expr.eval(&props(&[("pool", CValue::Int(0))])));
        assert!(expr.eval(&props(&[("pool", CValue::Int(1))])));
    }

    #[test]
    fn missing_property_never_matches() {
        let node = Node::with_text(Gid::WhereCmp, "missing = 1");
        let expr = CExpr::compile(&node, 32).unwrap();
        assert!(!expr.eval(&props(&[])));
    }

    #[test]
    fn exceeding_where_depth_limit_is_rejected() {
        // Build a right-leaning chain of `and`s deeper than the limit.
        let mut tree = Node::with_text(Gid::WhereCmp, "a = 1");
        for _ in 0..5 {
            tree = Node::new(Gid::WhereAnd)
                .push(Node::with_text(Gid::WhereCmp, "a = 1"))
                .push(tree);
        }
        let result = CExpr::compile(&tree, 2);
        assert!(matches!(result, Err(QueryError::WhereDepthExceeded(2))));
    }

    #[test]
    fn unknown_operator_is_malformed() {
        let node = Node::with_text(Gid::WhereCmp, "a ~= 1");
        assert!(CExpr::compile(&node, 32).is_err());
    }
}
