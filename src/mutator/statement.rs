//! `statement/remove`: drops single statements from a block

use syn::{BinOp, Block, Expr, Stmt};

use super::{Context, Edit, Mutation, Mutator, Registry};
use crate::node::{Node, NodeMut, Position};
use crate::noop::noop_of_statement;

pub fn register(registry: &mut Registry) {
    registry.register("statement/remove", || Box::new(RemoveStatement));
}

/// Macros that end the program or the thread
const ABORT_MACROS: &[&str] = &["panic", "unreachable", "todo", "unimplemented"];

/// Functions that end the process
const ABORT_FUNCTIONS: &[&str] = &["abort", "exit"];

/// Replaces each removable statement of a block with a no-op
pub struct RemoveStatement;

impl Mutator for RemoveStatement {
    fn mutations(&self, node: Node<'_>, ctx: &Context<'_>) -> Vec<Mutation> {
        let Node::Block(block) = node else {
            return Vec::new();
        };
        if is_lone_abort(block) {
            return Vec::new();
        }
        let last = block.stmts.len().saturating_sub(1);
        let unit = ctx.position == Position::Statement;

        block
            .stmts
            .iter()
            .enumerate()
            .filter(|(index, stmt)| {
                is_removable(stmt) || (unit && *index == last && is_removable_tail(stmt))
            })
            .map(|(index, stmt)| {
                Mutation::new(
                    format!("removed statement {}", index + 1),
                    ReplaceStatement {
                        index,
                        stmt: noop_of_statement(stmt, ctx.types),
                    },
                )
            })
            .collect()
    }
}

/// Assignments and side-effecting expression statements; never `let`
/// declarations, items or the tail expression.
fn is_removable(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(expr, Some(_)) => is_side_effect(expr),
        Stmt::Macro(mac) => mac.semi_token.is_some(),
        _ => false,
    }
}

/// The tail of a block that evaluates to `()`, e.g. `log.push(x)` in
/// `if x > 0 { log.push(x) }`
fn is_removable_tail(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(expr, None) => is_side_effect(expr),
        Stmt::Macro(_) => true,
        _ => false,
    }
}

fn is_side_effect(expr: &Expr) -> bool {
    match expr {
        Expr::Assign(_)
        | Expr::Call(_)
        | Expr::MethodCall(_)
        | Expr::Macro(_)
        | Expr::Await(_)
        | Expr::Try(_) => true,
        Expr::Binary(binary) => is_compound_assignment(&binary.op),
        _ => false,
    }
}

fn is_compound_assignment(op: &BinOp) -> bool {
    matches!(
        op,
        BinOp::AddAssign(_)
            | BinOp::SubAssign(_)
            | BinOp::MulAssign(_)
            | BinOp::DivAssign(_)
            | BinOp::RemAssign(_)
            | BinOp::BitXorAssign(_)
            | BinOp::BitAndAssign(_)
            | BinOp::BitOrAssign(_)
            | BinOp::ShlAssign(_)
            | BinOp::ShrAssign(_)
    )
}

/// A block consisting of nothing but a panic or a process exit
fn is_lone_abort(block: &Block) -> bool {
    let [stmt] = block.stmts.as_slice() else {
        return false;
    };
    let macro_name = |mac: &syn::Macro| {
        mac.path
            .segments
            .last()
            .map_or(false, |s| ABORT_MACROS.contains(&s.ident.to_string().as_str()))
    };
    match stmt {
        Stmt::Macro(mac) => macro_name(&mac.mac),
        Stmt::Expr(Expr::Macro(mac), _) => macro_name(&mac.mac),
        Stmt::Expr(Expr::Call(call), _) => match call.func.as_ref() {
            Expr::Path(path) => path
                .path
                .segments
                .last()
                .map_or(false, |s| ABORT_FUNCTIONS.contains(&s.ident.to_string().as_str())),
            _ => false,
        },
        _ => false,
    }
}

struct ReplaceStatement {
    index: usize,
    stmt: Stmt,
}

impl Edit for ReplaceStatement {
    fn swap(&mut self, node: NodeMut<'_>) {
        if let Some(stmt) = node
            .into_block()
            .and_then(|block| block.stmts.get_mut(self.index))
        {
            std::mem::swap(stmt, &mut self.stmt);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_util::{formatted, mutants_of};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_removes_eligible_statements() {
        let source = r#"
fn tally(items: &[u32], out: &mut Vec<u32>) -> u32 {
    let mut sum = 0;
    for item in items {
        sum += item;
    }
    out.push(sum);
    println!("{}", sum);
    sum
}
"#;
        let mutants = mutants_of("statement/remove", source);
        assert_eq!(mutants.len(), 3);
        // the outer block comes first in pre-order
        assert!(mutants[0].contains("let (_, _) = (&out, &sum);"));
        assert!(!mutants[1].contains("println!"));
        assert!(mutants[1].contains("out.push(sum);\n    let _ = &sum;"));
        assert!(mutants[2].contains("let (_, _) = (&sum, &item);"));
    }

    #[test]
    fn test_assignment_and_question_mark() {
        let source = r#"
fn save(path: &str, data: &[u8]) -> std::io::Result<()> {
    let mut written = 0;
    std::fs::write(path, data)?;
    written = data.len();
    report(written);
    Ok(())
}
"#;
        let mutants = mutants_of("statement/remove", source);
        assert_eq!(mutants.len(), 3);
        assert_eq!(
            mutants[0],
            formatted(
                r#"
fn save(path: &str, data: &[u8]) -> std::io::Result<()> {
    let mut written = 0;
    let (_, _) = (&path, &data);
    written = data.len();
    report(written);
    Ok(())
}
"#
            )
        );
    }

    #[test]
    fn test_lone_abort_is_kept() {
        let source = r#"
fn check(ok: bool) {
    if !ok {
        panic!("invariant broken");
    }
    if ok {
        std::process::exit(1);
    }
}
"#;
        assert!(mutants_of("statement/remove", source).is_empty());
    }

    #[test]
    fn test_tail_of_unit_block() {
        let source = r#"
fn record(x: i32, log: &mut Vec<i32>) -> usize {
    if x > 0 { log.push(x) }
    log.len()
}
"#;
        let mutants = mutants_of("statement/remove", source);
        assert_eq!(mutants.len(), 1);
        assert!(mutants[0].contains("let (_, _) = (&log, &x);"));
        assert!(mutants[0].contains("log.len()"));
    }
}
