//! Flag Propagator (spec.md 4.2): marks subtrees whose value is consumed
//! only by a conditional branch, so the Code Selector can leave the answer
//! in processor flags rather than materialising a 0/1 value.
//!
//! Grounded on `propogate_cconly`/`is_ccdown`/`is_cconly` in backend-z80.c,
//! run as a second top-down pass after the Tree Rewriter.

use log::trace;

use crate::ir::{Node, NodeFlags, Opcode};

/// Run the propagator over `node`, seeded with whether the *parent* wants a
/// flag-only result. Call with `false` at the root of a statement whose
/// value is actually used, `true` at the condition of an `if`/`while`/`for`.
pub fn propagate(node: &mut Node, want_cconly: bool) {
    if bitcheck_single_bit_and(node) {
        rewrite_to_bit_test(node);
        // The zero flag now means "bit was clear", the opposite sense of
        // the AND it replaced; a later shortcut must not invert it back
        // (spec.md 4.2 "CCFIXED semantics").
        node.flags.insert(NodeFlags::CCFIXED);
    }

    if want_cconly && can_produce_flags(node.op) {
        node.flags.insert(NodeFlags::CCONLY);
        trace!("flags: {:?} marked CCONLY", node.op);
    }

    let propagates = propagates_to_children(node.op);
    let pass_cconly = want_cconly && propagates;
    let pass_ccfixed = node.flags.contains(NodeFlags::CCFIXED) && propagates;

    if let Some(l) = node.left.as_deref_mut() {
        if pass_ccfixed {
            l.flags.insert(NodeFlags::CCFIXED);
        }
        propagate(l, pass_cconly);
    }
    if let Some(r) = node.right.as_deref_mut() {
        if pass_ccfixed {
            r.flags.insert(NodeFlags::CCFIXED);
        }
        propagate(r, pass_cconly);
    }
}

/// Opcodes that can hand back a result in the processor flags directly,
/// without ever materialising a 0/1 value (spec.md 4.2).
fn can_produce_flags(op: Opcode) -> bool {
    use Opcode::*;
    matches!(
        op,
        EqEq | BangEq | Lt | LtEq | Gt | GtEq | AndAnd | OrOr | Bool | Bang | BTst | ByteEq
            | ByteNe
    )
}

/// Opcodes that can pass a flag-only request down to both children, because
/// their own result is exactly a boolean combination of theirs.
fn propagates_to_children(op: Opcode) -> bool {
    use Opcode::*;
    matches!(op, AndAnd | OrOr | Bool | Bang)
}

/// The bit-test special case: `x & k` where `k` has exactly one bit set is
/// rewritten here (not in the Tree Rewriter) into `BTst`, because only the
/// Flag Propagator knows the result will be consumed as a condition.
fn bitcheck_single_bit_and(node: &Node) -> bool {
    if node.op != Opcode::And {
        return false;
    }
    let Some(r) = node.right.as_deref() else { return false };
    r.op == Opcode::Constant && is_single_bit(r.value)
}

fn is_single_bit(v: u32) -> bool {
    v != 0 && (v & (v - 1)) == 0
}

fn rewrite_to_bit_test(node: &mut Node) {
    let mask = node.right.as_deref().unwrap().value;
    let bit_index = mask.trailing_zeros();
    trace!("flags: AND with single-bit mask 0x{:x} -> BTst bit {}", mask, bit_index);
    let lhs = node.left.take().unwrap();
    node.op = Opcode::BTst;
    node.value = bit_index;
    node.left = Some(lhs);
    node.right = None;
}
