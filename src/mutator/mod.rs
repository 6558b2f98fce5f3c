//! Mutators and their registry
//!
//! A mutator looks at one node at a time and proposes zero or more
//! [`Mutation`]s for it. A mutation edits exactly that node in place and can
//! put it back exactly as it was.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::GuardPattern;
use crate::error::{MutestingError, Result};
use crate::node::{Node, NodeMut, Position};
use crate::types::TypeInfo;

pub mod branch;
pub mod expression;
pub mod statement;
pub mod substitution;

/// Everything a mutator may consult besides the node itself
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// Resolution metadata of the file being mutated, if available
    pub types: Option<&'a dyn TypeInfo>,
    /// Which conditionals count as error guards
    pub guard: &'a GuardPattern,
    /// Set by the walk for each visited node
    pub position: Position,
}

impl<'a> Context<'a> {
    pub fn new(types: Option<&'a dyn TypeInfo>, guard: &'a GuardPattern) -> Self {
        Self {
            types,
            guard,
            position: Position::Value,
        }
    }
}

/// A transformation rule producing candidate mutations for a node
pub trait Mutator {
    /// Mutations for `node`; empty for node kinds the mutator ignores
    fn mutations(&self, node: Node<'_>, ctx: &Context<'_>) -> Vec<Mutation>;
}

/// The in-place edit behind a mutation
///
/// Edits hold the value that is not currently in the tree and exchange it
/// with the live one, so applying twice restores the original.
pub trait Edit {
    fn swap(&mut self, node: NodeMut<'_>);
}

/// One reversible change of one node
pub struct Mutation {
    description: String,
    edit: Box<dyn Edit>,
    applied: bool,
    node: usize,
    line: usize,
}

impl Mutation {
    pub fn new(description: impl Into<String>, edit: impl Edit + 'static) -> Self {
        Self {
            description: description.into(),
            edit: Box::new(edit),
            applied: false,
            node: 0,
            line: 0,
        }
    }

    /// Record where the walk found this mutation
    pub(crate) fn at(mut self, node: usize, line: usize) -> Self {
        self.node = node;
        self.line = line;
        self
    }

    /// Change the node; does nothing if already applied
    pub fn apply(&mut self, node: NodeMut<'_>) {
        if !self.applied {
            self.edit.swap(node);
            self.applied = true;
        }
    }

    /// Restore the node; does nothing unless applied
    pub fn revert(&mut self, node: NodeMut<'_>) {
        if self.applied {
            self.edit.swap(node);
            self.applied = false;
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Pre-order index of the mutated node
    pub fn node(&self) -> usize {
        self.node
    }

    /// Source line of the mutated node
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("description", &self.description)
            .field("applied", &self.applied)
            .field("node", &self.node)
            .field("line", &self.line)
            .finish()
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Mutator>>;

/// Name to factory mapping of all known mutators
///
/// Names are kept sorted so that listing and enabling mutators is
/// reproducible between runs.
#[derive(Default)]
pub struct Registry {
    factories: BTreeMap<String, Factory>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in mutator
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        branch::register(&mut registry);
        expression::register(&mut registry);
        statement::register(&mut registry);
        substitution::register(&mut registry);
        registry
    }

    /// Register a mutator factory
    ///
    /// # Panics
    /// If `name` is already registered.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Mutator> + 'static,
    {
        if self.factories.contains_key(name) {
            panic!("mutator {name:?} already registered");
        }
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the mutator registered under `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn Mutator>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| MutestingError::UnknownMutator {
                name: name.to_string(),
            })
    }

    /// All registered names, sorted
    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Names left after applying the enable and disable patterns
    ///
    /// An empty `enable` list enables everything.
    pub fn select(&self, enable: &[String], disable: &[String]) -> Vec<String> {
        self.factories
            .keys()
            .filter(|name| enable.is_empty() || enable.iter().any(|p| matches_pattern(name, p)))
            .filter(|name| !disable.iter().any(|p| matches_pattern(name, p)))
            .cloned()
            .collect()
    }
}

/// Match a mutator name against an exact name or a `prefix*` pattern
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}
