//! Views of the syntax nodes the mutators work on
//!
//! The walk visits blocks, match arms and expressions. Mutators inspect a
//! [`Node`] and later edit the very same node through a [`NodeMut`].

use quote::ToTokens;
use syn::{Arm, Block, Expr, ExprIf, Stmt};

/// Read-only view of a visited node
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Block(&'a Block),
    Arm(&'a Arm),
    Expr(&'a Expr),
}

/// Whether the value of a visited node is used
///
/// For an expression or a match arm, `Statement` means the value is thrown
/// away and must be `()`. For a block it means the block evaluates to `()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Position {
    #[default]
    Value,
    Statement,
}

/// Mutable view of a visited node
#[derive(Debug)]
pub enum NodeMut<'a> {
    Block(&'a mut Block),
    Arm(&'a mut Arm),
    Expr(&'a mut Expr),
}

impl<'a> Node<'a> {
    /// Line (1-indexed) where the node starts in the parsed source
    pub fn line(&self) -> usize {
        let tokens = match self {
            Node::Block(block) => block.to_token_stream(),
            Node::Arm(arm) => arm.to_token_stream(),
            Node::Expr(expr) => expr.to_token_stream(),
        };
        tokens
            .into_iter()
            .next()
            .map(|t| t.span().start().line)
            .unwrap_or(0)
    }
}

impl<'a> NodeMut<'a> {
    pub fn into_block(self) -> Option<&'a mut Block> {
        match self {
            NodeMut::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn into_arm(self) -> Option<&'a mut Arm> {
        match self {
            NodeMut::Arm(arm) => Some(arm),
            _ => None,
        }
    }

    pub fn into_expr(self) -> Option<&'a mut Expr> {
        match self {
            NodeMut::Expr(expr) => Some(expr),
            _ => None,
        }
    }
}

/// Render tokens without any whitespace, so textual heuristics do not
/// depend on how the token stream happens to be spaced.
pub fn render_compact<T: ToTokens>(node: &T) -> String {
    node.to_token_stream()
        .to_string()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Whether a block evaluates to `()`: no tail expression, or a tail that is
/// itself unit-valued (loops, `if` chains of unit blocks, nested unit blocks).
pub fn block_is_unit(block: &Block) -> bool {
    match block.stmts.last() {
        Some(Stmt::Expr(expr, None)) => expr_is_unit(expr),
        _ => true,
    }
}

fn expr_is_unit(expr: &Expr) -> bool {
    match expr {
        Expr::ForLoop(_) | Expr::While(_) => true,
        Expr::If(expr_if) => if_is_unit(expr_if),
        Expr::Block(expr_block) => block_is_unit(&expr_block.block),
        Expr::Unsafe(expr_unsafe) => block_is_unit(&expr_unsafe.block),
        _ => false,
    }
}

/// Whether every branch of an `if` chain is a unit block
pub fn if_is_unit(expr_if: &ExprIf) -> bool {
    if !block_is_unit(&expr_if.then_branch) {
        return false;
    }
    match &expr_if.else_branch {
        None => true,
        Some((_, else_expr)) => expr_is_unit(else_expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_block(s: &str) -> Block {
        syn::parse_str(s).unwrap()
    }

    #[test]
    fn test_block_is_unit() {
        assert!(block_is_unit(&parse_block("{ a = 1; b(); }")));
        assert!(block_is_unit(&parse_block("{}")));
        assert!(block_is_unit(&parse_block("{ for x in y { z(x); } }")));
        assert!(!block_is_unit(&parse_block("{ a = 1; a }")));
        assert!(!block_is_unit(&parse_block("{ if c { 1 } else { 2 } }")));
    }

    #[test]
    fn test_if_is_unit() {
        let unit: ExprIf = syn::parse_str("if a { b(); } else if c { d(); } else { e(); }").unwrap();
        assert!(if_is_unit(&unit));

        let value: ExprIf = syn::parse_str("if a { b(); } else { 5 }").unwrap();
        assert!(!if_is_unit(&value));
    }

    #[test]
    fn test_render_compact() {
        let expr: Expr = syn::parse_str("err . is_some ( )").unwrap();
        assert_eq!(render_compact(&expr), "err.is_some()");
    }

    #[test]
    fn test_line() {
        let file = syn::parse_file("fn f() {\n    let x = 1;\n    g(x);\n}\n").unwrap();
        let syn::Item::Fn(func) = &file.items[0] else {
            panic!("expected a function");
        };
        assert_eq!(Node::Block(&func.block).line(), 1);
        let syn::Stmt::Expr(call, _) = &func.block.stmts[1] else {
            panic!("expected an expression statement");
        };
        assert_eq!(Node::Expr(call).line(), 3);
    }
}
