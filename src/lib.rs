//! A retargetable code-generation back end for the Z80 CPU family (Z80,
//! eZ80, Rabbit, Z280, Z80N).
//!
//! Consumes a decorated expression-tree intermediate representation from an
//! upstream front end and lowers it, through a five-stage pipeline, into
//! textual assembly for the target's dialect:
//!
//! 1. [`rewrite`] — the Tree Rewriter folds addressing modes into synthetic
//!    opcodes and performs algebraic simplification.
//! 2. [`flags`] — the Flag Propagator marks subtrees whose value is only
//!    ever consumed by a branch, so they can be left in processor flags.
//! 3. [`select`] — the Code Selector emits assembly via a three-rung
//!    priority ladder.
//! 4. [`frame`] — the Frame/Stack Tracker maintains prologue/epilogue
//!    bookkeeping and the running stack delta.
//! 5. [`helpers`] — the Helper Dispatcher emits runtime-library call
//!    sequences for operations with no direct instruction sequence.
//!
//! The back end does not emit binary machine code, does not manage a
//! control-flow graph, and is strictly single-threaded per function (see
//! DESIGN.md for what was kept and dropped from the teacher crate this one
//! descends from).

pub mod emit;
pub mod error;
pub mod flags;
pub mod frame;
pub mod helpers;
pub mod ir;
pub mod isa;
pub mod rewrite;
pub mod select;
pub mod settings;
pub mod symtab;

pub use error::CodegenError;
pub use settings::{Flags as Settings, Variant};

/// The crate version, for `--version` and diagnostic banners.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use emit::Emitter;
use frame::RegisterSaveFlags;
use ir::Node;
use select::Selector;
use symtab::SymbolTable;

/// Compile one function's expression tree into assembly text, driving all
/// five pipeline stages in order. This is the entry point the CLI harness
/// and integration tests call.
pub fn compile_function(
    name: &str,
    body: &mut Node,
    frame_len: u32,
    reg_save: RegisterSaveFlags,
    settings: &Settings,
    symtab: &dyn SymbolTable,
) -> Result<String, CodegenError> {
    let mut emit = Emitter::new();
    emit.segment(emit::Segment::Code);
    emit.function_label(name);

    let mut state = frame::prologue(&mut emit, settings, frame_len, reg_save);

    rewrite::rewrite(body, &state);
    flags::propagate(body, false);

    {
        let mut sel = Selector::new(&mut emit, &mut state, settings, symtab);
        sel.select_tree(body)?;
    }

    frame::epilogue(&mut emit, &mut state)?;
    Ok(emit.into_text())
}
