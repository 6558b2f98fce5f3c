//! Safe no-op synthesis
//!
//! Code removed by a mutator is replaced with a statement that keeps every
//! variable the removed code referenced in use, so the mutant still compiles
//! without new unused-variable errors, while having no observable effect:
//!
//! - nothing referenced: `();`
//! - one reference: `let _ = &total;`
//! - several: `let (_, _) = (&total, &config.limit);`
//!
//! Values are only borrowed, never moved.

use std::collections::HashSet;

use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::visit::Visit;
use syn::{parse_quote, Expr, ExprField, ExprPath, Stmt, Token};

use crate::types::TypeInfo;

/// Keywords and prelude names that are never treated as variables
pub const RESERVED: &[&str] = &[
    // strict and reserved keywords
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "union", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
    "final", "gen", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
    // primitive types
    "bool", "char", "str", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64",
    "i128", "isize", "f32", "f64",
    // prelude
    "Some", "None", "Ok", "Err", "Option", "Result", "Vec", "String", "Box", "ToString",
    "ToOwned", "Clone", "Copy", "Send", "Sync", "Sized", "Unpin", "Drop", "Fn", "FnMut",
    "FnOnce", "drop", "Default", "Eq", "PartialEq", "Ord", "PartialOrd", "AsRef", "AsMut",
    "Into", "From", "TryFrom", "TryInto", "Iterator", "IntoIterator", "Extend",
    "FromIterator", "DoubleEndedIterator", "ExactSizeIterator", "std", "core", "alloc",
];

/// The discard identifier
const DISCARD: &str = "_";

/// Build a no-op that stands in for a single removed statement
pub fn noop_of_statement(stmt: &Stmt, types: Option<&dyn TypeInfo>) -> Stmt {
    noop_of_statements(std::slice::from_ref(stmt), types)
}

/// Build a no-op that stands in for a list of removed statements
pub fn noop_of_statements(stmts: &[Stmt], types: Option<&dyn TypeInfo>) -> Stmt {
    let references = identifiers_in_statements(stmts, types);

    match references.as_slice() {
        [] => parse_quote!(();),
        [single] => parse_quote!(let _ = #single;),
        many => {
            let discards = many.iter().map(|_| quote::quote!(_));
            parse_quote!(let (#(#discards),*) = (#(#many),*);)
        }
    }
}

/// Collect the side-effect-relevant references of the given statements
///
/// Variables come out as borrows (`&name`, `&name.field`), member accesses of
/// composite type as a fresh empty value (`<Vec<u8>>::default()`). Every
/// reference appears once, in traversal order. Names bound inside the
/// statements themselves are left out since they vanish with them.
pub fn identifiers_in_statements(stmts: &[Stmt], types: Option<&dyn TypeInfo>) -> Vec<Expr> {
    let mut bindings = BindingCollector::default();
    for stmt in stmts {
        bindings.visit_stmt(stmt);
    }

    let mut walker = IdentifierWalker {
        types,
        local: bindings.names,
        seen: HashSet::new(),
        identifiers: Vec::new(),
    };
    for stmt in stmts {
        walker.visit_stmt(stmt);
    }
    walker.identifiers
}

/// Whether `name` can never denote a variable
pub fn is_reserved(name: &str) -> bool {
    name == DISCARD || RESERVED.contains(&name)
}

#[derive(Default)]
struct BindingCollector {
    names: HashSet<String>,
}

impl<'ast> Visit<'ast> for BindingCollector {
    fn visit_pat_ident(&mut self, pat_ident: &'ast syn::PatIdent) {
        self.names.insert(pat_ident.ident.to_string());
        syn::visit::visit_pat_ident(self, pat_ident);
    }

    fn visit_item(&mut self, _item: &'ast syn::Item) {}
}

struct IdentifierWalker<'a> {
    types: Option<&'a dyn TypeInfo>,
    local: HashSet<String>,
    seen: HashSet<String>,
    identifiers: Vec<Expr>,
}

impl IdentifierWalker<'_> {
    fn is_variable(&self, name: &str) -> bool {
        if is_reserved(name) || self.local.contains(name) {
            return false;
        }
        match self.types {
            Some(types) => types.is_variable(name),
            None => name.starts_with(|c: char| c.is_lowercase() || c == '_'),
        }
    }

    fn variable_name<'p>(&self, path: &'p ExprPath) -> Option<&'p syn::Ident> {
        if path.qself.is_some() {
            return None;
        }
        let ident = path.path.get_ident()?;
        self.is_variable(&ident.to_string()).then_some(ident)
    }

    /// A member access chain ending in a variable, e.g. `a.b.c`
    fn rooted_in_variable(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Path(path) => self.variable_name(path).is_some(),
            Expr::Field(field) => self.rooted_in_variable(&field.base),
            _ => false,
        }
    }

    fn push(&mut self, expr: Expr) {
        let key = expr.to_token_stream().to_string();
        if self.seen.insert(key) {
            self.identifiers.push(expr);
        }
    }

    fn push_field(&mut self, field: &ExprField) {
        let composite = self
            .types
            .and_then(|types| types.field_type(field).filter(|ty| types.is_composite(ty)));
        match composite {
            Some(ty) => self.push(parse_quote!(<#ty>::default())),
            None => self.push(parse_quote!(&#field)),
        }
    }

    fn visit_macro_arguments(&mut self, mac: &syn::Macro) {
        let parser = Punctuated::<Expr, Token![,]>::parse_terminated;
        if let Ok(arguments) = mac.parse_body_with(parser) {
            for argument in &arguments {
                self.visit_expr(argument);
            }
        }
    }
}

impl<'ast> Visit<'ast> for IdentifierWalker<'_> {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        match expr {
            Expr::Path(path) => {
                if self.variable_name(path).is_some() {
                    self.push(parse_quote!(&#path));
                }
            }
            Expr::Field(field) if self.rooted_in_variable(&field.base) => self.push_field(field),
            _ => syn::visit::visit_expr(self, expr),
        }
    }

    fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
        match call.func.as_ref() {
            // only closures held in known variables are referenced, never fn items
            Expr::Path(path) => {
                let known = self.types.is_some() && self.variable_name(path).is_some();
                if known {
                    self.push(parse_quote!(&#path));
                }
            }
            func => self.visit_expr(func),
        }
        for argument in &call.args {
            self.visit_expr(argument);
        }
    }

    fn visit_macro(&mut self, mac: &'ast syn::Macro) {
        self.visit_macro_arguments(mac);
    }

    fn visit_item(&mut self, _item: &'ast syn::Item) {}
}
