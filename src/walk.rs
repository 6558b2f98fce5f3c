//! Tree walking and the one-mutation-at-a-time protocol
//!
//! Nodes are numbered in pre-order. [`count`] asks the mutator about every
//! node in scope. A [`Driver`] discovers mutations in that same order and
//! applies them to the shared tree one at a time:
//!
//! ```text
//! resume() -> Applied    tree is mutated, observe it
//! resume() -> Reverted   tree is back to its original shape, observe it
//! resume() -> Applied    next mutation
//! ...
//! resume() -> None       traversal finished
//! ```
//!
//! Every call to [`Driver::resume`] is the signal to continue. The driver
//! holds the only mutable borrow of the tree, so no two drivers can walk the
//! same tree at once.

use std::collections::{HashSet, VecDeque};

use regex::Regex;
use syn::visit::Visit;
use syn::visit_mut::VisitMut;
use syn::{Arm, Attribute, Block, Expr, Ident, ReturnType, Signature, Stmt};
use tracing::warn;

use crate::mutator::{Context, Mutation, Mutator};
use crate::node::{Node, NodeMut, Position};

/// Which parts of a file are mutated
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Only mutate bodies of functions whose name matches
    pub functions: Option<Regex>,
    /// Also mutate `#[test]` functions and `#[cfg(test)]` items
    pub include_tests: bool,
}

impl Scope {
    fn whole_file(&self) -> bool {
        self.functions.is_none()
    }

    fn admits_item(&self, attrs: &[Attribute]) -> bool {
        self.include_tests || !is_test_code(attrs)
    }

    fn admits_fn(&self, attrs: &[Attribute], ident: &Ident) -> bool {
        self.admits_item(attrs)
            && self
                .functions
                .as_ref()
                .map_or(true, |re| re.is_match(&ident.to_string()))
    }
}

fn is_test_code(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        let path = attr.path();
        if path.is_ident("cfg") {
            return attr
                .parse_args::<Ident>()
                .map_or(false, |ident| ident == "test");
        }
        path.segments.last().map_or(false, |s| s.ident == "test")
    })
}

/// Signals of the apply/revert protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A mutation has just been applied
    Applied,
    /// The mutation has just been reverted
    Reverted,
}

/// Total number of mutations `mutator` proposes for `tree`
pub fn count(tree: &syn::File, mutator: &dyn Mutator, ctx: &Context<'_>, scope: &Scope) -> usize {
    let mut finder = Finder::new(tree, mutator, ctx, scope, None, false);
    finder.visit_file(tree);
    finder.count
}

/// Drives one mutator over one tree
pub struct Driver<'a> {
    tree: &'a mut syn::File,
    mutator: &'a dyn Mutator,
    ctx: &'a Context<'a>,
    scope: &'a Scope,
    /// Index of the last node whose mutations were discovered
    cursor: Option<usize>,
    pending: VecDeque<Mutation>,
    current: Option<Mutation>,
    finished: bool,
}

impl<'a> Driver<'a> {
    pub fn new(
        tree: &'a mut syn::File,
        mutator: &'a dyn Mutator,
        ctx: &'a Context<'a>,
        scope: &'a Scope,
    ) -> Self {
        Self {
            tree,
            mutator,
            ctx,
            scope,
            cursor: None,
            pending: VecDeque::new(),
            current: None,
            finished: false,
        }
    }

    /// The tree in its current state
    pub fn tree(&self) -> &syn::File {
        self.tree
    }

    /// The mutation being observed, between `Applied` and the next `Applied`
    pub fn mutation(&self) -> Option<&Mutation> {
        self.current.as_ref()
    }

    /// Continue the traversal up to the next suspension point
    pub fn resume(&mut self) -> Option<Signal> {
        if let Some(mutation) = self.current.as_mut() {
            if mutation.is_applied() {
                locate(self.tree, self.scope, mutation, Phase::Revert);
                return Some(Signal::Reverted);
            }
        }
        self.current = None;

        loop {
            if self.pending.is_empty() && !self.discover() {
                return None;
            }
            let mut mutation = self.pending.pop_front()?;
            if locate(self.tree, self.scope, &mut mutation, Phase::Apply) {
                self.current = Some(mutation);
                return Some(Signal::Applied);
            }
            warn!(
                "node {} of {:?} not found, mutation skipped",
                mutation.node(),
                mutation.description()
            );
        }
    }

    /// Find the next node after the cursor that has mutations
    fn discover(&mut self) -> bool {
        if self.finished {
            return false;
        }
        let mut finder = Finder::new(
            &*self.tree,
            self.mutator,
            self.ctx,
            self.scope,
            self.cursor,
            true,
        );
        finder.visit_file(self.tree);
        match finder.found {
            Some((index, mutations)) => {
                self.cursor = Some(index);
                self.pending = mutations.into();
                true
            }
            None => {
                self.finished = true;
                false
            }
        }
    }
}

impl Drop for Driver<'_> {
    fn drop(&mut self) {
        if let Some(mutation) = self.current.as_mut() {
            if mutation.is_applied() {
                locate(self.tree, self.scope, mutation, Phase::Revert);
            }
        }
    }
}

/// Read-only pre-order walk asking the mutator about each node in scope
struct Finder<'a> {
    mutator: &'a dyn Mutator,
    ctx: &'a Context<'a>,
    scope: &'a Scope,
    /// Only nodes strictly after this index are considered
    after: Option<usize>,
    stop_at_first: bool,
    index: usize,
    in_scope: bool,
    count: usize,
    found: Option<(usize, Vec<Mutation>)>,
    units: UnitPositions,
}

impl<'a> Finder<'a> {
    fn new(
        tree: &syn::File,
        mutator: &'a dyn Mutator,
        ctx: &'a Context<'a>,
        scope: &'a Scope,
        after: Option<usize>,
        stop_at_first: bool,
    ) -> Self {
        Self {
            mutator,
            ctx,
            scope,
            after,
            stop_at_first,
            index: 0,
            in_scope: scope.whole_file(),
            count: 0,
            found: None,
            units: UnitPositions::collect(tree),
        }
    }

    fn done(&self) -> bool {
        self.found.is_some()
    }

    fn inspect(&mut self, node: Node<'_>) {
        let index = self.index;
        self.index += 1;

        if !self.in_scope || self.after.map_or(false, |after| index <= after) {
            return;
        }
        let ctx = Context {
            position: self.units.position(node),
            ..*self.ctx
        };
        let mutations = self.mutator.mutations(node, &ctx);
        if mutations.is_empty() {
            return;
        }
        self.count += mutations.len();
        if self.stop_at_first {
            let line = node.line();
            let mutations = mutations.into_iter().map(|m| m.at(index, line)).collect();
            self.found = Some((index, mutations));
        }
    }

    fn enter_fn(&mut self, attrs: &[Attribute], ident: &Ident, walk: impl FnOnce(&mut Self)) {
        if self.done() || !self.scope.admits_fn(attrs, ident) {
            return;
        }
        let outer = self.in_scope;
        self.in_scope = true;
        walk(self);
        self.in_scope = outer;
    }
}

impl<'ast> Visit<'ast> for Finder<'_> {
    fn visit_item_fn(&mut self, func: &'ast syn::ItemFn) {
        self.enter_fn(&func.attrs, &func.sig.ident, |v| syn::visit::visit_item_fn(v, func));
    }

    fn visit_impl_item_fn(&mut self, func: &'ast syn::ImplItemFn) {
        self.enter_fn(&func.attrs, &func.sig.ident, |v| {
            syn::visit::visit_impl_item_fn(v, func)
        });
    }

    fn visit_trait_item_fn(&mut self, func: &'ast syn::TraitItemFn) {
        self.enter_fn(&func.attrs, &func.sig.ident, |v| {
            syn::visit::visit_trait_item_fn(v, func)
        });
    }

    fn visit_item_mod(&mut self, module: &'ast syn::ItemMod) {
        if !self.done() && self.scope.admits_item(&module.attrs) {
            syn::visit::visit_item_mod(self, module);
        }
    }

    fn visit_item_impl(&mut self, item: &'ast syn::ItemImpl) {
        if !self.done() && self.scope.admits_item(&item.attrs) {
            syn::visit::visit_item_impl(self, item);
        }
    }

    fn visit_block(&mut self, block: &'ast Block) {
        if self.done() {
            return;
        }
        self.inspect(Node::Block(block));
        if !self.done() {
            syn::visit::visit_block(self, block);
        }
    }

    fn visit_arm(&mut self, arm: &'ast Arm) {
        if self.done() {
            return;
        }
        self.inspect(Node::Arm(arm));
        if !self.done() {
            syn::visit::visit_arm(self, arm);
        }
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        if self.done() {
            return;
        }
        self.inspect(Node::Expr(expr));
        if !self.done() {
            syn::visit::visit_expr(self, expr);
        }
    }
}

/// Expressions whose value is thrown away and blocks that evaluate to `()`
///
/// Nodes are keyed by address, so a collection is only valid for the tree
/// it was built from while that tree is not edited.
#[derive(Default)]
struct UnitPositions {
    exprs: HashSet<*const Expr>,
    blocks: HashSet<*const Block>,
}

impl UnitPositions {
    fn collect(tree: &syn::File) -> Self {
        let mut units = Self::default();
        units.visit_file(tree);
        units
    }

    fn position(&self, node: Node<'_>) -> Position {
        let unit = match node {
            Node::Block(block) => self.blocks.contains(&(block as *const Block)),
            Node::Arm(arm) => self.exprs.contains(&(&*arm.body as *const Expr)),
            Node::Expr(expr) => self.exprs.contains(&(expr as *const Expr)),
        };
        if unit {
            Position::Statement
        } else {
            Position::Value
        }
    }

    fn unit_block(&mut self, block: &Block) {
        self.blocks.insert(block as *const Block);
        if let Some(Stmt::Expr(tail, None)) = block.stmts.last() {
            self.statement(tail);
        }
    }

    fn statement(&mut self, expr: &Expr) {
        self.exprs.insert(expr as *const Expr);
        match expr {
            Expr::If(expr_if) => {
                self.unit_block(&expr_if.then_branch);
                if let Some((_, else_expr)) = &expr_if.else_branch {
                    self.statement(else_expr);
                }
            }
            Expr::Match(expr_match) => {
                for arm in &expr_match.arms {
                    self.statement(&arm.body);
                }
            }
            Expr::Block(expr_block) => self.unit_block(&expr_block.block),
            Expr::Unsafe(expr_unsafe) => self.unit_block(&expr_unsafe.block),
            _ => {}
        }
    }
}

fn returns_unit(sig: &Signature) -> bool {
    matches!(sig.output, ReturnType::Default)
}

impl<'ast> Visit<'ast> for UnitPositions {
    fn visit_item_fn(&mut self, func: &'ast syn::ItemFn) {
        if returns_unit(&func.sig) {
            self.unit_block(&func.block);
        }
        syn::visit::visit_item_fn(self, func);
    }

    fn visit_impl_item_fn(&mut self, func: &'ast syn::ImplItemFn) {
        if returns_unit(&func.sig) {
            self.unit_block(&func.block);
        }
        syn::visit::visit_impl_item_fn(self, func);
    }

    fn visit_trait_item_fn(&mut self, func: &'ast syn::TraitItemFn) {
        if let Some(block) = &func.default {
            if returns_unit(&func.sig) {
                self.unit_block(block);
            }
        }
        syn::visit::visit_trait_item_fn(self, func);
    }

    fn visit_block(&mut self, block: &'ast Block) {
        // block-like expressions before the tail must be `()`
        if let Some((_, init)) = block.stmts.split_last() {
            for stmt in init {
                if let Stmt::Expr(expr, None) = stmt {
                    self.statement(expr);
                }
            }
        }
        syn::visit::visit_block(self, block);
    }

    fn visit_expr_if(&mut self, expr_if: &'ast syn::ExprIf) {
        if expr_if.else_branch.is_none() {
            self.unit_block(&expr_if.then_branch);
        }
        syn::visit::visit_expr_if(self, expr_if);
    }

    fn visit_expr_for_loop(&mut self, for_loop: &'ast syn::ExprForLoop) {
        self.unit_block(&for_loop.body);
        syn::visit::visit_expr_for_loop(self, for_loop);
    }

    fn visit_expr_while(&mut self, while_loop: &'ast syn::ExprWhile) {
        self.unit_block(&while_loop.body);
        syn::visit::visit_expr_while(self, while_loop);
    }

    fn visit_expr_loop(&mut self, expr_loop: &'ast syn::ExprLoop) {
        self.unit_block(&expr_loop.body);
        syn::visit::visit_expr_loop(self, expr_loop);
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Apply,
    Revert,
}

/// Walk to the mutation's node and apply or revert it there; false when
/// the node was not reached
fn locate(tree: &mut syn::File, scope: &Scope, mutation: &mut Mutation, phase: Phase) -> bool {
    let mut locator = Locator {
        scope,
        target: mutation.node(),
        index: 0,
        mutation: Some(mutation),
        phase,
    };
    locator.visit_file_mut(tree);
    locator.done()
}

/// Mutable twin of [`Finder`]; numbers nodes identically
struct Locator<'a> {
    scope: &'a Scope,
    target: usize,
    index: usize,
    /// Taken once the target node has been reached
    mutation: Option<&'a mut Mutation>,
    phase: Phase,
}

impl Locator<'_> {
    fn hit(&mut self, node: NodeMut<'_>) -> bool {
        let index = self.index;
        self.index += 1;
        if index != self.target {
            return false;
        }
        if let Some(mutation) = self.mutation.take() {
            match self.phase {
                Phase::Apply => mutation.apply(node),
                Phase::Revert => mutation.revert(node),
            }
        }
        true
    }

    fn done(&self) -> bool {
        self.mutation.is_none()
    }
}

impl VisitMut for Locator<'_> {
    fn visit_item_fn_mut(&mut self, func: &mut syn::ItemFn) {
        if !self.done() && self.scope.admits_fn(&func.attrs, &func.sig.ident) {
            syn::visit_mut::visit_item_fn_mut(self, func);
        }
    }

    fn visit_impl_item_fn_mut(&mut self, func: &mut syn::ImplItemFn) {
        if !self.done() && self.scope.admits_fn(&func.attrs, &func.sig.ident) {
            syn::visit_mut::visit_impl_item_fn_mut(self, func);
        }
    }

    fn visit_trait_item_fn_mut(&mut self, func: &mut syn::TraitItemFn) {
        if !self.done() && self.scope.admits_fn(&func.attrs, &func.sig.ident) {
            syn::visit_mut::visit_trait_item_fn_mut(self, func);
        }
    }

    fn visit_item_mod_mut(&mut self, module: &mut syn::ItemMod) {
        if !self.done() && self.scope.admits_item(&module.attrs) {
            syn::visit_mut::visit_item_mod_mut(self, module);
        }
    }

    fn visit_item_impl_mut(&mut self, item: &mut syn::ItemImpl) {
        if !self.done() && self.scope.admits_item(&item.attrs) {
            syn::visit_mut::visit_item_impl_mut(self, item);
        }
    }

    fn visit_block_mut(&mut self, block: &mut Block) {
        if self.done() || self.hit(NodeMut::Block(&mut *block)) {
            return;
        }
        syn::visit_mut::visit_block_mut(self, block);
    }

    fn visit_arm_mut(&mut self, arm: &mut Arm) {
        if self.done() || self.hit(NodeMut::Arm(&mut *arm)) {
            return;
        }
        syn::visit_mut::visit_arm_mut(self, arm);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if self.done() || self.hit(NodeMut::Expr(&mut *expr)) {
            return;
        }
        syn::visit_mut::visit_expr_mut(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate_source;
    use crate::config::GuardPattern;
    use crate::mutator::Registry;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
fn classify(a: i32, b: i32) -> bool {
    if a < b && b > 0 {
        return true;
    }
    a >= b
}

fn helper(x: i32) -> bool {
    x < 10
}

#[cfg(test)]
mod tests {
    fn check(a: i32) -> bool {
        a < 3
    }
}
"#;

    fn comparison() -> Box<dyn Mutator> {
        Registry::with_builtins().create("expression/comparison").unwrap()
    }

    #[test]
    fn test_count_skips_test_code() {
        let tree = syn::parse_file(SOURCE).unwrap();
        let guard = GuardPattern::default();
        let ctx = Context::new(None, &guard);
        let mutator = comparison();

        assert_eq!(count(&tree, mutator.as_ref(), &ctx, &Scope::default()), 4);

        let with_tests = Scope {
            include_tests: true,
            ..Scope::default()
        };
        assert_eq!(count(&tree, mutator.as_ref(), &ctx, &with_tests), 5);
    }

    #[test]
    fn test_function_filter() {
        let tree = syn::parse_file(SOURCE).unwrap();
        let guard = GuardPattern::default();
        let ctx = Context::new(None, &guard);
        let mutator = comparison();
        let scope = Scope {
            functions: Some(Regex::new("^help").unwrap()),
            include_tests: false,
        };

        assert_eq!(count(&tree, mutator.as_ref(), &ctx, &scope), 1);

        let mut tree = tree;
        let mut driver = Driver::new(&mut tree, mutator.as_ref(), &ctx, &scope);
        assert_eq!(driver.resume(), Some(Signal::Applied));
        assert!(generate_source(driver.tree()).contains("x <= 10"));
        assert_eq!(driver.mutation().unwrap().line(), 10);
        assert_eq!(driver.resume(), Some(Signal::Reverted));
        assert_eq!(driver.resume(), None);
    }

    #[test]
    fn test_drive_applies_in_preorder_and_restores() {
        let mut tree = syn::parse_file(SOURCE).unwrap();
        let original = generate_source(&tree);
        let guard = GuardPattern::default();
        let ctx = Context::new(None, &guard);
        let mutator = comparison();
        let scope = Scope::default();

        let mut mutants = Vec::new();
        let mut driver = Driver::new(&mut tree, mutator.as_ref(), &ctx, &scope);
        while let Some(signal) = driver.resume() {
            let source = generate_source(driver.tree());
            match signal {
                Signal::Applied => mutants.push(source),
                Signal::Reverted => assert_eq!(source, original),
            }
        }
        drop(driver);

        assert_eq!(mutants.len(), 4);
        assert!(mutants[0].contains("a <= b && b > 0"));
        assert!(mutants[1].contains("a < b && b >= 0"));
        assert!(mutants[2].contains("a > b"));
        assert!(mutants[3].contains("x <= 10"));
        assert_eq!(generate_source(&tree), original);
    }

    #[test]
    fn test_dropping_driver_reverts() {
        let mut tree = syn::parse_file(SOURCE).unwrap();
        let original = generate_source(&tree);
        let guard = GuardPattern::default();
        let ctx = Context::new(None, &guard);
        let mutator = comparison();
        let scope = Scope::default();

        {
            let mut driver = Driver::new(&mut tree, mutator.as_ref(), &ctx, &scope);
            assert_eq!(driver.resume(), Some(Signal::Applied));
            assert_ne!(generate_source(driver.tree()), original);
        }

        assert_eq!(generate_source(&tree), original);
    }

    #[test]
    fn test_is_test_code() {
        let item: syn::ItemFn = syn::parse_str("#[test] fn t() {}").unwrap();
        assert!(is_test_code(&item.attrs));
        let item: syn::ItemFn = syn::parse_str("#[tokio::test] async fn t() {}").unwrap();
        assert!(is_test_code(&item.attrs));
        let item: syn::ItemMod = syn::parse_str("#[cfg(test)] mod tests {}").unwrap();
        assert!(is_test_code(&item.attrs));
        let item: syn::ItemMod = syn::parse_str("#[cfg(feature = \"x\")] mod real {}").unwrap();
        assert!(!is_test_code(&item.attrs));
    }

    #[test]
    fn test_unit_positions() {
        let file = syn::parse_file(
            r#"
fn record(x: i32, log: &mut Vec<i32>) -> usize {
    if x > 0 { log.push(x) } else { log.clear() }
    let n = match x { 0 => 1, _ => 2 };
    n
}
"#,
        )
        .unwrap();
        let units = UnitPositions::collect(&file);
        let syn::Item::Fn(func) = &file.items[0] else {
            panic!("expected a function");
        };
        assert_eq!(units.position(Node::Block(&func.block)), Position::Value);

        let Stmt::Expr(branch @ Expr::If(expr_if), None) = &func.block.stmts[0] else {
            panic!("expected an if statement");
        };
        assert_eq!(units.position(Node::Expr(branch)), Position::Statement);
        assert_eq!(
            units.position(Node::Block(&expr_if.then_branch)),
            Position::Statement
        );

        let Stmt::Local(local) = &func.block.stmts[1] else {
            panic!("expected a let statement");
        };
        let Some(init) = &local.init else {
            panic!("expected an initializer");
        };
        let Expr::Match(expr_match) = init.expr.as_ref() else {
            panic!("expected a match");
        };
        assert_eq!(units.position(Node::Expr(&init.expr)), Position::Value);
        assert_eq!(units.position(Node::Arm(&expr_match.arms[0])), Position::Value);
    }

    struct Untouched;

    impl crate::mutator::Edit for Untouched {
        fn swap(&mut self, _node: NodeMut<'_>) {}
    }

    #[test]
    fn test_locate_reports_missing_node() {
        let mut tree = syn::parse_file(SOURCE).unwrap();
        let scope = Scope::default();

        let mut missing = Mutation::new("nothing", Untouched).at(100_000, 1);
        assert!(!locate(&mut tree, &scope, &mut missing, Phase::Apply));
        assert!(!missing.is_applied());

        let mut first = Mutation::new("nothing", Untouched).at(0, 1);
        assert!(locate(&mut tree, &scope, &mut first, Phase::Apply));
        assert!(first.is_applied());
        assert!(locate(&mut tree, &scope, &mut first, Phase::Revert));
        assert!(!first.is_applied());
    }
}
