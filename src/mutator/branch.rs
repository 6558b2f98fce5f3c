//! Branch elision: `branch/if`, `branch/else` and `branch/case`
//!
//! Each mutator replaces the whole body of one branch with a no-op that keeps
//! the body's variables in use. Only non-empty bodies whose value is `()`
//! are touched: bodies without a tail expression, an `if` without `else`,
//! and branches whose value is thrown away by the enclosing block.

use syn::{Block, Expr, ExprIf, Stmt};

use super::{Context, Edit, Mutation, Mutator, Registry};
use crate::node::{block_is_unit, if_is_unit, render_compact, Node, NodeMut, Position};
use crate::noop::noop_of_statements;

pub fn register(registry: &mut Registry) {
    registry.register("branch/if", || Box::new(IfBranch));
    registry.register("branch/else", || Box::new(ElseBranch));
    registry.register("branch/case", || Box::new(CaseBranch));
}

/// Empties the body of `if` and `else if` branches
pub struct IfBranch;

/// Empties plain `else` blocks
pub struct ElseBranch;

/// Empties the block bodies of `match` arms
pub struct CaseBranch;

impl Mutator for IfBranch {
    fn mutations(&self, node: Node<'_>, ctx: &Context<'_>) -> Vec<Mutation> {
        let Node::Expr(Expr::If(expr_if)) = node else {
            return Vec::new();
        };
        let body = &expr_if.then_branch;
        if body.stmts.is_empty() || !branches_are_unit(expr_if, ctx) {
            return Vec::new();
        }
        if ctx
            .guard
            .matches(&render_compact(&*expr_if.cond), body.stmts.len())
        {
            return Vec::new();
        }

        vec![Mutation::new(
            "emptied if body",
            ReplaceBody::new(Branch::Then, body, ctx),
        )]
    }
}

impl Mutator for ElseBranch {
    fn mutations(&self, node: Node<'_>, ctx: &Context<'_>) -> Vec<Mutation> {
        let Node::Expr(Expr::If(expr_if)) = node else {
            return Vec::new();
        };
        // `else if` chains are handled by `branch/if` on the nested `if`
        let Some(body) = else_block(expr_if) else {
            return Vec::new();
        };
        if body.stmts.is_empty() || !branches_are_unit(expr_if, ctx) {
            return Vec::new();
        }

        vec![Mutation::new(
            "emptied else body",
            ReplaceBody::new(Branch::Else, body, ctx),
        )]
    }
}

impl Mutator for CaseBranch {
    fn mutations(&self, node: Node<'_>, ctx: &Context<'_>) -> Vec<Mutation> {
        let Node::Arm(arm) = node else {
            return Vec::new();
        };
        let Expr::Block(body) = arm.body.as_ref() else {
            return Vec::new();
        };
        let body = &body.block;
        if body.stmts.is_empty() || !(ctx.position == Position::Statement || block_is_unit(body)) {
            return Vec::new();
        }

        vec![Mutation::new(
            "emptied match arm",
            ReplaceBody::new(Branch::Arm, body, ctx),
        )]
    }
}

fn branches_are_unit(expr_if: &ExprIf, ctx: &Context<'_>) -> bool {
    expr_if.else_branch.is_none() || ctx.position == Position::Statement || if_is_unit(expr_if)
}

fn else_block(expr_if: &ExprIf) -> Option<&Block> {
    match expr_if.else_branch.as_ref()?.1.as_ref() {
        Expr::Block(block) => Some(&block.block),
        _ => None,
    }
}

fn else_block_mut(expr_if: &mut ExprIf) -> Option<&mut Block> {
    match expr_if.else_branch.as_mut()?.1.as_mut() {
        Expr::Block(block) => Some(&mut block.block),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Branch {
    Then,
    Else,
    Arm,
}

/// Exchanges a branch body with its stored replacement
struct ReplaceBody {
    branch: Branch,
    stmts: Vec<Stmt>,
}

impl ReplaceBody {
    fn new(branch: Branch, body: &Block, ctx: &Context<'_>) -> Self {
        Self {
            branch,
            stmts: vec![noop_of_statements(&body.stmts, ctx.types)],
        }
    }

    fn body<'a>(&self, node: NodeMut<'a>) -> Option<&'a mut Block> {
        match self.branch {
            Branch::Then => match node.into_expr()? {
                Expr::If(expr_if) => Some(&mut expr_if.then_branch),
                _ => None,
            },
            Branch::Else => match node.into_expr()? {
                Expr::If(expr_if) => else_block_mut(expr_if),
                _ => None,
            },
            Branch::Arm => match node.into_arm()?.body.as_mut() {
                Expr::Block(block) => Some(&mut block.block),
                _ => None,
            },
        }
    }
}

impl Edit for ReplaceBody {
    fn swap(&mut self, node: NodeMut<'_>) {
        if let Some(body) = self.body(node) {
            std::mem::swap(&mut body.stmts, &mut self.stmts);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GuardPattern;
    use crate::test_util::{formatted, mutants_of, mutants_with};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_if_body_becomes_discard() {
        let source = r#"
fn step(x: i32, mut total: i32, mut count: i32) -> i32 {
    if x > 0 {
        total = total + x;
        count += 1;
    }
    total * count
}
"#;
        let mutants = mutants_of("branch/if", source);
        assert_eq!(mutants.len(), 1);
        assert_eq!(
            mutants[0],
            formatted(
                r#"
fn step(x: i32, mut total: i32, mut count: i32) -> i32 {
    if x > 0 {
        let (_, _, _) = (&total, &x, &count);
    }
    total * count
}
"#
            )
        );
    }

    #[test]
    fn test_if_skips_error_guard() {
        let source = r#"
fn load(path: &str) -> Result<String, std::io::Error> {
    let result = std::fs::read_to_string(path);
    if let Err(err) = &result {
        return Err(std::io::Error::new(err.kind(), "load failed"));
    }
    if result.is_err() {
        log_failure(path);
        flush();
    }
    result
}
"#;
        let mutants = mutants_of("branch/if", source);
        assert_eq!(mutants.len(), 1);
        assert!(mutants[0].contains("let _ = &path;"));
    }

    #[test]
    fn test_guard_can_be_disabled() {
        let source = r#"
fn check(err: Option<String>) {
    if err.is_some() {
        panic!("failed");
    }
}
"#;
        assert!(mutants_of("branch/if", source).is_empty());

        let guard = GuardPattern {
            enabled: false,
            ..GuardPattern::default()
        };
        let mutants = mutants_with("branch/if", source, &guard);
        assert_eq!(mutants.len(), 1);
        assert!(mutants[0].contains("();"));
    }

    #[test]
    fn test_if_skips_empty_and_value_bodies() {
        let source = r#"
fn pick(flag: bool, a: i32, b: i32) -> i32 {
    if flag {}
    if flag { a } else { b }
}
"#;
        assert!(mutants_of("branch/if", source).is_empty());
        assert!(mutants_of("branch/else", source).is_empty());
    }

    #[test]
    fn test_else_if_chain() {
        let source = r#"
fn route(code: u8, sink: &mut Vec<u8>) {
    if code == 0 {
        sink.push(0);
    } else if code == 1 {
        sink.push(1);
    } else {
        sink.clear();
    }
}
"#;
        // both `if` heads, nested `else if` included
        assert_eq!(mutants_of("branch/if", source).len(), 2);

        let mutants = mutants_of("branch/else", source);
        assert_eq!(mutants.len(), 1);
        assert!(mutants[0].contains("sink.push(1);"));
        assert!(!mutants[0].contains("sink.clear();"));
    }

    #[test]
    fn test_case_arms() {
        let source = r#"
fn apply(op: Op, stack: &mut Vec<i64>) {
    match op {
        Op::Push(v) => {
            stack.push(v);
        }
        Op::Pop => {
            stack.pop();
        }
        Op::Nop => {}
        Op::Peek => println!("{:?}", stack.last()),
    }
}
"#;
        let mutants = mutants_of("branch/case", source);
        assert_eq!(mutants.len(), 2);
        assert!(mutants[0].contains("let (_, _) = (&stack, &v);"));
        assert!(mutants[1].contains("stack.push(v);"));
        assert!(mutants[1].contains("let _ = &stack;"));
    }

    #[test]
    fn test_if_without_else_is_unit() {
        let source = r#"
fn record(x: i32, log: &mut Vec<i32>) {
    if x > 0 { log.push(x) }
    log.clear();
}
"#;
        let mutants = mutants_of("branch/if", source);
        assert_eq!(mutants.len(), 1);
        assert!(mutants[0].contains("let (_, _) = (&log, &x);"));
    }

    #[test]
    fn test_discarded_branches_are_unit() {
        let source = r#"
fn route(code: u8, sink: &mut Vec<u8>) -> usize {
    if code == 0 { sink.push(0) } else { sink.clear() }
    match code {
        1 => { sink.push(1) }
        _ => { sink.clear() }
    }
    let width = if code > 2 { sink.len() } else { 0 };
    width
}
"#;
        assert_eq!(mutants_of("branch/if", source).len(), 1);
        assert_eq!(mutants_of("branch/else", source).len(), 1);
        // arm tails are calls, but the match value is thrown away
        assert_eq!(mutants_of("branch/case", source).len(), 2);
    }

    #[test]
    fn test_generic_field_is_borrowed() {
        let source = r#"
struct Buf<T> {
    items: Vec<T>,
    n: usize,
}

fn drain(b: &mut Buf<u8>) {
    if b.n > 0 {
        consume(b.items.clone());
    }
}
"#;
        let mutants = mutants_of("branch/if", source);
        assert_eq!(mutants.len(), 1);
        assert!(mutants[0].contains("let _ = &b.items;"));
        assert!(!mutants[0].contains("<Vec<T>>::default()"));
    }
}
