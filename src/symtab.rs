//! Entity references into front-end-owned side tables.
//!
//! The IR nodes described in spec.md §3 never own a name directly; they
//! carry a compact index (`snum` for symbols, `val2` for labels) that the
//! front end resolves. We model those indices the way Cranelift IR models
//! references to its own side tables: a newtype wrapping `u32`, implementing
//! `EntityRef` so it can key a `PrimaryMap`/`SecondaryMap` if a consumer
//! wants one, with a `Display` impl matching the textual forms used in
//! emitted assembly (`_name`, `L<n>`, `T<n>`).

use cranelift_entity::EntityRef;
use std::fmt;

/// A reference to a named C-level symbol (global, static, or function).
///
/// Resolved to a string by a [`SymbolTable`] at emission time; never
/// resolved by the back end itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolIndex(u32);

impl EntityRef for SymbolIndex {
    fn new(index: usize) -> Self {
        debug_assert!(index < (u32::MAX as usize));
        SymbolIndex(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sym{}", self.0)
    }
}

/// A reference to a branch-target label number, local to one function.
///
/// Emitted as `L<n>` optionally followed by a caller-supplied suffix (used
/// to distinguish e.g. the "else" and "end" labels of the same `if`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalLabel(u32);

impl EntityRef for LocalLabel {
    fn new(index: usize) -> Self {
        debug_assert!(index < (u32::MAX as usize));
        LocalLabel(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LocalLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A reference to a literal/static-data label, emitted as `T<n>`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextLabel(u32);

impl EntityRef for TextLabel {
    fn new(index: usize) -> Self {
        debug_assert!(index < (u32::MAX as usize));
        TextLabel(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TextLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Resolves the opaque indices the front end attaches to IR nodes into the
/// strings the assembler expects.
///
/// spec.md §6: "The front end also supplies a symbol table resolver
/// (integer → string) used to emit name references."
pub trait SymbolTable {
    /// Resolve a symbol reference to the C-level name it was declared with
    /// (without the leading `_` the assembler dialect requires; the emitter
    /// adds that).
    fn name(&self, sym: SymbolIndex) -> &str;
}

/// An in-memory [`SymbolTable`] backed by a plain vector, used by the CLI
/// harness and by tests that build small IR trees by hand.
#[derive(Debug, Default, Clone)]
pub struct VecSymbolTable {
    names: Vec<String>,
}

impl VecSymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the index future nodes should reference it by.
    pub fn intern(&mut self, name: impl Into<String>) -> SymbolIndex {
        let idx = SymbolIndex::new(self.names.len());
        self.names.push(name.into());
        idx
    }
}

impl SymbolTable for VecSymbolTable {
    fn name(&self, sym: SymbolIndex) -> &str {
        &self.names[sym.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_names_round_trip() {
        let mut t = VecSymbolTable::new();
        let g = t.intern("g");
        let f = t.intern("main");
        assert_eq!(t.name(g), "g");
        assert_eq!(t.name(f), "main");
    }

    #[test]
    fn label_display_matches_assembler_dialect() {
        let l = LocalLabel::new(3);
        assert_eq!(l.to_string(), "L3");
        let t = TextLabel::new(7);
        assert_eq!(t.to_string(), "T7");
    }
}
