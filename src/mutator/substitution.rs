//! Table-driven method name substitution
//!
//! A [`Substitution`] renames calls whose final name appears in its table,
//! e.g. `a.checked_add(b)` to `a.checked_sub(b)` or `i64::max(a, b)` to
//! `i64::min(a, b)`. Any closed vocabulary of domain operations can be
//! mutated this way; extra tables are registered from the configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use syn::{Expr, Ident};

use super::{Context, Edit, Mutation, Mutator, Registry};
use crate::node::{Node, NodeMut};

const ARITHMETIC: &[(&str, &str)] = &[
    ("add", "sub"),
    ("sub", "add"),
    ("mul", "div"),
    ("div", "mul"),
    ("checked_add", "checked_sub"),
    ("checked_sub", "checked_add"),
    ("checked_mul", "checked_div"),
    ("checked_div", "checked_mul"),
    ("wrapping_add", "wrapping_sub"),
    ("wrapping_sub", "wrapping_add"),
    ("wrapping_mul", "wrapping_div"),
    ("wrapping_div", "wrapping_mul"),
    ("saturating_add", "saturating_sub"),
    ("saturating_sub", "saturating_add"),
    ("saturating_mul", "saturating_div"),
    ("saturating_div", "saturating_mul"),
    ("overflowing_add", "overflowing_sub"),
    ("overflowing_sub", "overflowing_add"),
    ("overflowing_mul", "overflowing_div"),
    ("overflowing_div", "overflowing_mul"),
];

const COMPARISON: &[(&str, &str)] = &[
    ("gt", "le"),
    ("lt", "ge"),
    ("ge", "lt"),
    ("le", "gt"),
    ("max", "min"),
    ("min", "max"),
];

pub fn register(registry: &mut Registry) {
    register_table(registry, "arithmetic/method", table(ARITHMETIC));
    register_table(registry, "comparison/method", table(COMPARISON));
}

/// Register a substitution mutator for `pairs` under `name`
///
/// # Panics
/// If `name` is already registered.
pub fn register_table(registry: &mut Registry, name: &str, pairs: BTreeMap<String, String>) {
    let pairs = Arc::new(pairs);
    registry.register(name, move || {
        Box::new(Substitution {
            pairs: Arc::clone(&pairs),
        })
    });
}

fn table(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

/// Renames method and path calls according to a lookup table
pub struct Substitution {
    pairs: Arc<BTreeMap<String, String>>,
}

impl Substitution {
    pub fn new(pairs: BTreeMap<String, String>) -> Self {
        Self {
            pairs: Arc::new(pairs),
        }
    }

    fn replacement(&self, ident: &Ident) -> Option<Ident> {
        let name = self.pairs.get(&ident.to_string())?;
        let mut to: Ident = syn::parse_str(name).ok()?;
        to.set_span(ident.span());
        Some(to)
    }
}

fn called_name(expr: &Expr) -> Option<&Ident> {
    match expr {
        Expr::MethodCall(call) => Some(&call.method),
        Expr::Call(call) => match call.func.as_ref() {
            Expr::Path(path) => path.path.segments.last().map(|s| &s.ident),
            _ => None,
        },
        _ => None,
    }
}

fn called_name_mut(expr: &mut Expr) -> Option<&mut Ident> {
    match expr {
        Expr::MethodCall(call) => Some(&mut call.method),
        Expr::Call(call) => match call.func.as_mut() {
            Expr::Path(path) => path.path.segments.last_mut().map(|s| &mut s.ident),
            _ => None,
        },
        _ => None,
    }
}

impl Mutator for Substitution {
    fn mutations(&self, node: Node<'_>, _ctx: &Context<'_>) -> Vec<Mutation> {
        let Node::Expr(expr) = node else {
            return Vec::new();
        };
        let Some(from) = called_name(expr) else {
            return Vec::new();
        };
        let Some(to) = self.replacement(from) else {
            return Vec::new();
        };

        vec![Mutation::new(
            format!("replaced `{}` with `{}`", from, to),
            Rename { ident: to },
        )]
    }
}

struct Rename {
    ident: Ident,
}

impl Edit for Rename {
    fn swap(&mut self, node: NodeMut<'_>) {
        if let Some(ident) = node.into_expr().and_then(called_name_mut) {
            std::mem::swap(ident, &mut self.ident);
        }
    }
}
