//! Identifier resolution for no-op synthesis
//!
//! Rust has no type checker we can call from a library, so the resolution
//! the mutators need (is this identifier a variable, what type does this
//! member access have) is answered by [`DeclaredTypes`], a per-file
//! collection of what the source declares.

use std::collections::{HashMap, HashSet};

use quote::ToTokens;
use syn::visit::Visit;
use syn::{Expr, ExprField, Fields, GenericParam, Member, Pat, Type};

/// Resolution metadata consulted when synthesizing no-ops
pub trait TypeInfo {
    /// Whether `name` denotes a variable binding
    fn is_variable(&self, name: &str) -> bool;

    /// Type of a member access such as `config.limits.values`, if known
    fn field_type(&self, access: &ExprField) -> Option<Type>;

    /// Whether values of `ty` are composites that can be built empty
    /// with `<ty>::default()`
    fn is_composite(&self, ty: &Type) -> bool;
}

/// Std collections that are always `Default`
const COLLECTIONS: &[&str] = &[
    "Vec", "VecDeque", "HashMap", "HashSet", "BTreeMap", "BTreeSet", "BinaryHeap", "LinkedList",
];

/// Arrays implement `Default` up to this length
const MAX_DEFAULT_ARRAY: usize = 32;

#[derive(Debug, Clone)]
enum Binding {
    Untyped,
    Typed(Type),
    /// The same name is bound with different types somewhere in the file
    Conflict,
}

/// Declarations collected from one source file
#[derive(Debug, Default)]
pub struct DeclaredTypes {
    variables: HashMap<String, Binding>,
    structs: HashMap<String, HashMap<String, Type>>,
    /// Generic parameters of each struct, lifetimes with their `'`
    generics: HashMap<String, HashSet<String>>,
    defaults: HashSet<String>,
}

impl DeclaredTypes {
    /// Collect the declarations of a parsed file
    pub fn collect(file: &syn::File) -> Self {
        let mut types = DeclaredTypes::default();
        types.visit_file(file);
        types
    }

    fn bind(&mut self, name: String, ty: Option<&Type>) {
        let next = match (self.variables.get(&name), ty) {
            (None, None) => Binding::Untyped,
            (None, Some(ty)) => Binding::Typed(ty.clone()),
            (Some(Binding::Untyped), None) => Binding::Untyped,
            (Some(Binding::Typed(old)), Some(ty)) if same_type(old, ty) => return,
            _ => Binding::Conflict,
        };
        self.variables.insert(name, next);
    }

    fn variable_type(&self, name: &str) -> Option<&Type> {
        match self.variables.get(name) {
            Some(Binding::Typed(ty)) => Some(ty),
            _ => None,
        }
    }

    fn member_type(&self, owner: &Type, member: &Member) -> Option<Type> {
        let name = type_name(owner)?;
        let fields = self.structs.get(&name)?;
        let key = match member {
            Member::Named(ident) => ident.to_string(),
            Member::Unnamed(index) => index.index.to_string(),
        };
        let ty = fields.get(&key)?;
        // `Vec<T>` names a type only inside the struct's own scope
        match self.generics.get(&name) {
            Some(params) if mentions_any(ty, params) => None,
            _ => Some(ty.clone()),
        }
    }

    fn resolve(&self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Path(path) => {
                let ident = path.path.get_ident()?;
                self.variable_type(&ident.to_string()).cloned()
            }
            Expr::Field(field) => self.field_type(field),
            Expr::Paren(paren) => self.resolve(&paren.expr),
            _ => None,
        }
    }
}

impl TypeInfo for DeclaredTypes {
    fn is_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
            && !name.starts_with(|c: char| c.is_ascii_uppercase())
    }

    fn field_type(&self, access: &ExprField) -> Option<Type> {
        let owner = self.resolve(&access.base)?;
        self.member_type(&owner, &access.member)
    }

    fn is_composite(&self, ty: &Type) -> bool {
        match ty {
            Type::Array(array) => match &array.len {
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Int(len),
                    ..
                }) => len
                    .base10_parse::<usize>()
                    .map_or(false, |n| n <= MAX_DEFAULT_ARRAY),
                _ => false,
            },
            Type::Path(path) if path.qself.is_none() => path
                .path
                .segments
                .last()
                .map_or(false, |segment| {
                    let name = segment.ident.to_string();
                    COLLECTIONS.contains(&name.as_str()) || self.defaults.contains(&name)
                }),
            Type::Paren(paren) => self.is_composite(&paren.elem),
            _ => false,
        }
    }
}

impl<'ast> Visit<'ast> for DeclaredTypes {
    fn visit_pat_type(&mut self, pat_type: &'ast syn::PatType) {
        if let Pat::Ident(pat_ident) = pat_type.pat.as_ref() {
            self.bind(pat_ident.ident.to_string(), Some(&pat_type.ty));
            if let Some((_, sub)) = &pat_ident.subpat {
                self.visit_pat(sub);
            }
            self.visit_type(&pat_type.ty);
            return;
        }
        syn::visit::visit_pat_type(self, pat_type);
    }

    fn visit_pat_ident(&mut self, pat_ident: &'ast syn::PatIdent) {
        self.bind(pat_ident.ident.to_string(), None);
        syn::visit::visit_pat_ident(self, pat_ident);
    }

    fn visit_item_struct(&mut self, item: &'ast syn::ItemStruct) {
        let name = item.ident.to_string();
        let fields = match &item.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .filter_map(|f| f.ident.as_ref().map(|i| (i.to_string(), f.ty.clone())))
                .collect(),
            Fields::Unnamed(unnamed) => unnamed
                .unnamed
                .iter()
                .enumerate()
                .map(|(i, f)| (i.to_string(), f.ty.clone()))
                .collect(),
            Fields::Unit => HashMap::new(),
        };
        if derives_default(&item.attrs) {
            self.defaults.insert(name.clone());
        }
        let params = item
            .generics
            .params
            .iter()
            .map(|param| match param {
                GenericParam::Type(ty) => ty.ident.to_string(),
                GenericParam::Lifetime(def) => def.lifetime.to_string(),
                GenericParam::Const(constant) => constant.ident.to_string(),
            })
            .collect();
        self.generics.insert(name.clone(), params);
        self.structs.insert(name, fields);
        syn::visit::visit_item_struct(self, item);
    }
}

fn derives_default(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().filter(|a| a.path().is_ident("derive")).any(|attr| {
        let mut found = false;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.segments.last().map_or(false, |s| s.ident == "Default") {
                found = true;
            }
            Ok(())
        });
        found
    })
}

/// Name of the nominal type behind references and parentheses
fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Reference(reference) => type_name(&reference.elem),
        Type::Paren(paren) => type_name(&paren.elem),
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// Whether `ty` refers to `Self` or to one of `params`
fn mentions_any(ty: &Type, params: &HashSet<String>) -> bool {
    struct Mentions<'p> {
        params: &'p HashSet<String>,
        found: bool,
    }

    impl<'ast> Visit<'ast> for Mentions<'_> {
        fn visit_path(&mut self, path: &'ast syn::Path) {
            if let Some(first) = path.segments.first() {
                let name = first.ident.to_string();
                if name == "Self" || self.params.contains(&name) {
                    self.found = true;
                }
            }
            syn::visit::visit_path(self, path);
        }

        fn visit_lifetime(&mut self, lifetime: &'ast syn::Lifetime) {
            if self.params.contains(&lifetime.to_string()) {
                self.found = true;
            }
        }
    }

    let mut mentions = Mentions {
        params,
        found: false,
    };
    mentions.visit_type(ty);
    mentions.found
}

fn same_type(a: &Type, b: &Type) -> bool {
    a.to_token_stream().to_string() == b.to_token_stream().to_string()
}
