//! Parsing, code generation and checksums
//!
//! This module handles converting between source text and ASTs, and
//! fingerprinting generated mutants.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{MutestingError, Result};

/// Width of a mutant checksum in hex characters
pub const CHECKSUM_LEN: usize = 32;

/// Parse source text into an AST
pub fn parse_source(file: &Path, source: &str) -> Result<syn::File> {
    syn::parse_file(source).map_err(|e| MutestingError::ParseError {
        file: file.to_path_buf(),
        error: format!("{} (line {})", e, e.span().start().line),
    })
}

/// Read and parse a source file
pub fn parse_file(file: &Path) -> Result<(String, syn::File)> {
    let source = std::fs::read_to_string(file).map_err(|e| MutestingError::FileReadError {
        file: file.to_path_buf(),
        error: e.to_string(),
    })?;
    let ast = parse_source(file, &source)?;
    Ok((source, ast))
}

/// Generate source code from AST
pub fn generate_source(ast: &syn::File) -> String {
    prettyplease::unparse(ast)
}

/// Fixed-width hex digest of a generated source
pub fn checksum(source: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(source.as_bytes()));
    digest[..CHECKSUM_LEN].to_string()
}

/// Whether `entry` has the shape of a checksum produced by [`checksum`]
pub fn is_checksum(entry: &str) -> bool {
    entry.len() == CHECKSUM_LEN && entry.chars().all(|c| c.is_ascii_hexdigit())
}
