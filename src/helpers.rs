//! Helper Dispatcher (spec.md 4.5, §6 "Helper library surface"): emits the
//! call sequence for a named runtime helper, picking the calling convention
//! and doing the `ISBOOL` post-call normalisation.
//!
//! Grounded on `gen_helpcall`/`gen_helpclean`/`c_style` in backend-z80.c.

use crate::emit::Emitter;
use crate::frame::FunctionState;
use crate::ir::{Node, Opcode, TypeTag};

/// Which argument-passing convention a helper call uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HelperCallConv {
    /// The left operand is already in the accumulator (or accumulator pair
    /// for 16-bit); the right operand goes in a secondary register, or is
    /// folded into the helper's name/suffix for a small constant.
    Integer,
    /// Both operands are pushed, left then right; the callee returns with
    /// its result in the accumulator and the caller deallocates the pushed
    /// bytes.
    CStyle,
}

impl HelperCallConv {
    /// `c_style` in backend-z80.c: assignment is always integer-style
    /// regardless of type; every other float-typed operator is C-style.
    pub fn classify(op: Opcode, lhs_ty: TypeTag, rhs_ty: TypeTag) -> Self {
        if matches!(op, Opcode::Eq | Opcode::REq | Opcode::LStore | Opcode::NStore | Opcode::LBStore | Opcode::RStore) {
            return HelperCallConv::Integer;
        }
        if op == Opcode::EqEq {
            // EQ (equality) is never C-style, matching the original's
            // explicit carve-out even when a float operand is present.
            return HelperCallConv::Integer;
        }
        if lhs_ty.is_float() || rhs_ty.is_float() {
            HelperCallConv::CStyle
        } else {
            HelperCallConv::Integer
        }
    }
}

/// Emit a call to `helper`, routing the right operand according to
/// `conv`. `right_in_register` is the secondary-register mnemonic to load
/// the right operand into for the integer convention (e.g. `"de"`); it is
/// ignored for the C-style convention, where the caller has already pushed
/// both operands.
pub fn emit_call(
    emit: &mut Emitter,
    state: &mut FunctionState,
    helper: &str,
    conv: HelperCallConv,
    pushed_bytes: u32,
) {
    emit.instr(format!("call {}", helper));
    if conv == HelperCallConv::CStyle && pushed_bytes > 0 {
        crate::frame::call_cleanup(emit, state, pushed_bytes);
    }
}

/// Push the right operand of a C-style call ahead of the left, recording
/// the stack growth so the post-call cleanup can reverse it exactly
/// (spec.md 4.5: "For C-style helpers it stacks the right operand first").
pub fn push_right_operand(emit: &mut Emitter, state: &mut FunctionState, width_bytes: u32) {
    debug_assert!(width_bytes == 2 || width_bytes == 4);
    if width_bytes == 2 {
        emit.push(state, "hl");
    } else {
        emit.instr("call __pushl");
        state.stack_delta += 4;
    }
}

/// After a C-style helper call whose node is flagged `ISBOOL`, re-normalise
/// the result with the original's `xor a / cp l` idiom, since C-convention
/// helpers don't set the boolean-coded flags the integer-convention ones do
/// (SPEC_FULL.md "SUPPLEMENTED FEATURES").
pub fn normalise_isbool_result(emit: &mut Emitter, node: &Node, conv: HelperCallConv) {
    if conv == HelperCallConv::CStyle && node.flags.contains(crate::ir::NodeFlags::ISBOOL) {
        emit.instr("xor a");
        emit.instr("cp l");
    }
}
