//! Operator mutators: `expression/comparison` and `expression/remove`

use quote::ToTokens;
use syn::{parse_quote, BinOp, Expr};

use super::{Context, Edit, Mutation, Mutator, Registry};
use crate::node::{Node, NodeMut};

pub fn register(registry: &mut Registry) {
    registry.register("expression/comparison", || Box::new(Comparison));
    registry.register("expression/remove", || Box::new(RemoveTerm));
}

/// Moves an ordering comparison's boundary by one: `<` and `<=`, `>` and
/// `>=` trade places. Equality is left alone.
pub struct Comparison;

/// Replaces one operand of `&&` with `true`, or of `||` with `false`
pub struct RemoveTerm;

fn flipped(op: &BinOp) -> Option<BinOp> {
    let flipped = match op {
        BinOp::Lt(_) => BinOp::Le(Default::default()),
        BinOp::Le(_) => BinOp::Lt(Default::default()),
        BinOp::Gt(_) => BinOp::Ge(Default::default()),
        BinOp::Ge(_) => BinOp::Gt(Default::default()),
        _ => return None,
    };
    Some(flipped)
}

impl Mutator for Comparison {
    fn mutations(&self, node: Node<'_>, _ctx: &Context<'_>) -> Vec<Mutation> {
        let Node::Expr(Expr::Binary(binary)) = node else {
            return Vec::new();
        };
        let Some(op) = flipped(&binary.op) else {
            return Vec::new();
        };

        let description = format!(
            "replaced `{}` with `{}`",
            binary.op.to_token_stream(),
            op.to_token_stream()
        );
        vec![Mutation::new(description, SwapOperator { op })]
    }
}

impl Mutator for RemoveTerm {
    fn mutations(&self, node: Node<'_>, _ctx: &Context<'_>) -> Vec<Mutation> {
        let Node::Expr(Expr::Binary(binary)) = node else {
            return Vec::new();
        };
        let (identity, name): (Expr, _) = match binary.op {
            BinOp::And(_) => (parse_quote!(true), "true"),
            BinOp::Or(_) => (parse_quote!(false), "false"),
            _ => return Vec::new(),
        };

        [
            (Side::Left, binary.left.as_ref()),
            (Side::Right, binary.right.as_ref()),
        ]
        .into_iter()
        // `let` conditions bind names the other operand or the body may use
        .filter(|(_, operand)| !matches!(operand, Expr::Let(_)))
        .map(|(side, _)| {
            Mutation::new(
                format!("replaced {} operand with `{}`", side, name),
                SwapOperand {
                    side,
                    expr: identity.clone(),
                },
            )
        })
        .collect()
    }
}

struct SwapOperator {
    op: BinOp,
}

impl Edit for SwapOperator {
    fn swap(&mut self, node: NodeMut<'_>) {
        if let Some(Expr::Binary(binary)) = node.into_expr() {
            std::mem::swap(&mut binary.op, &mut self.op);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

struct SwapOperand {
    side: Side,
    expr: Expr,
}

impl Edit for SwapOperand {
    fn swap(&mut self, node: NodeMut<'_>) {
        if let Some(Expr::Binary(binary)) = node.into_expr() {
            let operand = match self.side {
                Side::Left => binary.left.as_mut(),
                Side::Right => binary.right.as_mut(),
            };
            std::mem::swap(operand, &mut self.expr);
        }
    }
}
