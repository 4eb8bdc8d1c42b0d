use std::fmt;

use crate::json::{DynamicValue, Segment};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOp::*;
        let symbol = match self {
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "&&",
            Or => "||",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
        };
        f.write_str(symbol)
    }
}

/// Accessor applied to a path after its leading context id
#[derive(Clone, Debug, PartialEq)]
pub enum Accessor {
    /// `.field`, `[0]` or `['field']`
    Static(Segment),
    /// `[expr]`, resolved at evaluation time to an index (int) or a key (string)
    Dynamic(Box<Node>),
}

/// Parsed expression tree
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Literal(DynamicValue),
    Path {
        context: String,
        accessors: Vec<Accessor>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Conditional {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
}

impl Node {
    /// Collect the ids of every context read by this node, without duplicates
    pub fn collect_context_ids(&self, ids: &mut Vec<String>) {
        match self {
            Node::Literal(_) => {}
            Node::Path { context, accessors } => {
                if !ids.contains(context) {
                    ids.push(context.clone());
                }
                for accessor in accessors {
                    if let Accessor::Dynamic(node) = accessor {
                        node.collect_context_ids(ids);
                    }
                }
            }
            Node::Unary { operand, .. } => operand.collect_context_ids(ids),
            Node::Binary { lhs, rhs, .. } => {
                lhs.collect_context_ids(ids);
                rhs.collect_context_ids(ids);
            }
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_context_ids(ids);
                then.collect_context_ids(ids);
                otherwise.collect_context_ids(ids);
            }
        }
    }
}
