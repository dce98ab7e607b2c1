//! Code Selector (spec.md 4.3): the three-rung emission ladder.
//!
//! Grounded on the overall structure of `gen_tree`/`gen_shortcut`/
//! `gen_direct`/`gen_node` in backend-z80.c: visit the tree post-order, and
//! at each node try `shortcut`, then `direct`, then fall back to `node`.
//! Each rung returns whether it handled the node; a decline is not an
//! error (spec.md §7 "Propagation") until every rung, including the Helper
//! Dispatcher fallback inside `node`, has declined.

pub mod access;
pub mod arith;
pub mod direct;
pub mod node;
pub mod shortcut;

use crate::emit::Emitter;
use crate::error::CodegenError;
use crate::frame::FunctionState;
use crate::ir::{Node, Opcode};
use crate::settings::Flags;
use crate::symtab::SymbolTable;

/// Shared context threaded through every selection rung, bundling the
/// configuration and output sink so individual emitter functions don't
/// each need half a dozen parameters.
pub struct Selector<'a> {
    pub emit: &'a mut Emitter,
    pub state: &'a mut FunctionState,
    pub flags: &'a Flags,
    pub symtab: &'a dyn SymbolTable,
}

impl<'a> Selector<'a> {
    pub fn new(
        emit: &'a mut Emitter,
        state: &'a mut FunctionState,
        flags: &'a Flags,
        symtab: &'a dyn SymbolTable,
    ) -> Self {
        Selector {
            emit,
            state,
            flags,
            symtab,
        }
    }

    /// Visit `node` and everything under it, post-order, generating
    /// assembly as each node is resolved by the first rung that accepts it.
    pub fn select_tree(&mut self, n: &Node) -> Result<(), CodegenError> {
        if self.state.unreachable {
            return Ok(());
        }
        if shortcut::try_emit(self, n)? {
            return Ok(());
        }
        if let Some(l) = n.left() {
            self.select_tree(l)?;
        }
        if direct::try_emit(self, n)? {
            return Ok(());
        }
        if let Some(r) = n.right() {
            if r.op == Opcode::Constant {
                // The rung-3 fallback loads a constant right operand as an
                // immediate (spec.md 4.3 rung 3); nothing needs to survive
                // the trip, so there is nothing to stack.
                self.select_tree(r)?;
            } else {
                // `direct` declined, so evaluating the right operand will
                // clobber the accumulator pair the left operand is sitting
                // in. Stack it first and let the fallback reload it (spec.md
                // 4.3's stacking scheme for rung 3).
                self.emit.push(self.state, "hl");
                self.select_tree(r)?;
            }
        }
        node::emit(self, n)
    }
}
