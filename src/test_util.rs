//! Shared helpers for mutator tests

use pretty_assertions::assert_eq;

use crate::codegen::generate_source;
use crate::config::GuardPattern;
use crate::mutator::{Context, Registry};
use crate::types::DeclaredTypes;
use crate::walk::{count, Driver, Scope, Signal};

/// Drive the built-in mutator `name` over `source` and return every mutant.
///
/// Asserts that the count matches the number of applied mutations, and that
/// each revert, and the end of the walk, restores the original text.
pub fn mutants_of(name: &str, source: &str) -> Vec<String> {
    mutants_with(name, source, &GuardPattern::default())
}

/// Like [`mutants_of`] with a custom guard pattern
pub fn mutants_with(name: &str, source: &str, guard: &GuardPattern) -> Vec<String> {
    let mut tree = syn::parse_file(source).unwrap();
    let original = generate_source(&tree);
    let types = DeclaredTypes::collect(&tree);
    let ctx = Context::new(Some(&types), guard);
    let scope = Scope::default();
    let mutator = Registry::with_builtins().create(name).unwrap();

    let expected = count(&tree, mutator.as_ref(), &ctx, &scope);

    let mut mutants = Vec::new();
    let mut driver = Driver::new(&mut tree, mutator.as_ref(), &ctx, &scope);
    while let Some(signal) = driver.resume() {
        let current = generate_source(driver.tree());
        match signal {
            Signal::Applied => {
                assert_ne!(current, original, "mutation did not change the tree");
                mutants.push(current);
            }
            Signal::Reverted => assert_eq!(current, original),
        }
    }
    drop(driver);

    assert_eq!(expected, mutants.len(), "count and walk disagree");
    assert_eq!(generate_source(&tree), original);
    mutants
}

/// Format a snippet the same way mutants are printed
pub fn formatted(source: &str) -> String {
    generate_source(&syn::parse_file(source).unwrap())
}
