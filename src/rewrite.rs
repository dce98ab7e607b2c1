//! Tree Rewriter (spec.md 4.1): bottom-up addressing-mode folding and
//! algebraic simplification, applied once per node after both children.
//!
//! Grounded on `gen_rewrite_node` in backend-z80.c. The eight rules are
//! applied in the order spec.md lists them; later rules see the tree as the
//! earlier ones left it, since the recursion in [`rewrite`] visits children
//! first and then runs every rule against the current node in sequence.

use log::trace;

use crate::frame::FunctionState;
use crate::ir::{Node, Opcode};
use crate::isa::RegisterVar;

/// Rewrite `node` and its subtree in place.
///
/// `state` supplies the argument-base/frame-length figures rule 5 needs to
/// fold an argument's offset; it is read-only here (the rewriter never
/// itself changes the stack delta).
pub fn rewrite(node: &mut Node, state: &FunctionState) {
    if let Some(l) = node.left.as_deref_mut() {
        rewrite(l, state);
    }
    if let Some(r) = node.right.as_deref_mut() {
        rewrite(r, state);
    }

    rule1_byte_compare_shortcut(node);
    rule2_indexed_pointer_deref(node);
    rule3_indexed_pointer_store(node);
    rule4_constant_offset_folding(node);
    rule5_load_store_canonicalisation(node, state);
    rule6_cast_elision(node);
    rule7_direct_call(node);
    rule8_commutative_reorder(node);
}

/// Rule 1: `(u8)x == k` / `(u8)x != k` for a constant `k <= 255` becomes a
/// synthetic byte-compare, discarding the cast.
fn rule1_byte_compare_shortcut(node: &mut Node) {
    if !matches!(node.op, Opcode::EqEq | Opcode::BangEq) {
        return;
    }
    let Some(left) = node.left.as_deref() else { return };
    let Some(right) = node.right.as_deref() else { return };
    let is_u8_cast = left.op == Opcode::Cast && left.ty.base_width_class() == crate::ir::BaseWidthClass::W8 && !left.ty.is_pointer();
    if !is_u8_cast || right.op != Opcode::Constant || right.value > 255 {
        return;
    }
    trace!("rewrite: byte-compare shortcut on {:?}", node.op);
    let constant = right.value;
    let operand = node.left.take().unwrap().left.take().unwrap();
    node.op = if node.op == Opcode::EqEq {
        Opcode::ByteEq
    } else {
        Opcode::ByteNe
    };
    node.left = Some(operand);
    node.right = None;
    node.value = constant;
}

/// Rule 2: `*(regvar + k)` with `k` in range becomes `RDeref` with the
/// offset in `val2`.
fn rule2_indexed_pointer_deref(node: &mut Node) {
    if node.op != Opcode::Deref {
        return;
    }
    let Some((var, offset)) = register_plus_constant(node.left.as_deref()) else { return };
    if !var.can_address(offset) {
        return;
    }
    trace!("rewrite: indexed-pointer deref via {}+{}", var, offset);
    node.op = Opcode::RDeref;
    node.val2 = offset;
    node.value = register_var_code(var);
    node.left = None;
}

/// Rule 3: the assignment mirror of rule 2 — `*(regvar + k) = rhs`.
fn rule3_indexed_pointer_store(node: &mut Node) {
    if node.op != Opcode::Eq {
        return;
    }
    let Some(lhs) = node.left.as_deref() else { return };
    if lhs.op != Opcode::Deref {
        return;
    }
    let Some((var, offset)) = register_plus_constant(lhs.left.as_deref()) else { return };
    if !var.can_address(offset) {
        return;
    }
    trace!("rewrite: indexed-pointer store via {}+{}", var, offset);
    let rhs = node.right.take();
    node.op = Opcode::REq;
    node.val2 = offset;
    node.value = register_var_code(var);
    node.left = rhs;
    node.right = None;
}

/// If `deref_target` is `Reg(var)` or `Reg(var) + Constant(k)`, return the
/// register and constant offset (0 for the bare-register case).
fn register_plus_constant(deref_target: Option<&Node>) -> Option<(RegisterVar, i32)> {
    let n = deref_target?;
    if n.op == Opcode::Reg {
        return Some((register_var_from_code(n.value), 0));
    }
    if n.op == Opcode::Plus {
        let l = n.left.as_deref()?;
        let r = n.right.as_deref()?;
        if l.op == Opcode::Reg && r.op == Opcode::Constant {
            return Some((register_var_from_code(l.value), r.value as i32));
        }
        if r.op == Opcode::Reg && l.op == Opcode::Constant {
            return Some((register_var_from_code(r.value), l.value as i32));
        }
    }
    None
}

fn register_var_code(var: RegisterVar) -> u32 {
    match var {
        RegisterVar::Bc => 0,
        RegisterVar::Ix => 1,
        RegisterVar::Iy => 2,
    }
}

fn register_var_from_code(code: u32) -> RegisterVar {
    RegisterVar::from_code(code)
}

/// Rule 4: `Name/Label/Local/Argument(addr) + Constant` collapses to the
/// address node with the constant folded into its own `value`.
fn rule4_constant_offset_folding(node: &mut Node) {
    if node.op != Opcode::Plus {
        return;
    }
    let is_address_of = |n: &Node| {
        matches!(n.op, Opcode::Name | Opcode::Label | Opcode::Local | Opcode::Argument)
    };
    let (addr_is_left, folds) = match (node.left.as_deref(), node.right.as_deref()) {
        (Some(l), Some(r)) if is_address_of(l) && r.op == Opcode::Constant => (true, Some(r.value)),
        (Some(l), Some(r)) if is_address_of(r) && l.op == Opcode::Constant => (false, Some(l.value)),
        _ => (true, None),
    };
    let Some(k) = folds else { return };
    trace!("rewrite: constant-offset folding into address-of, +{}", k);
    let mut addr = if addr_is_left {
        node.left.take().unwrap()
    } else {
        node.right.take().unwrap()
    };
    addr.value = addr.value.wrapping_add(k);
    *node = *addr;
}

/// Rule 5: canonicalise a `Deref`/`Eq` over a directly-addressable operand
/// (local, global, labelled literal, register-variable, argument) into the
/// matching synthetic load/store. Argument offsets are shifted by
/// `arg_base + frame_len`, since an argument lives above the frame rather
/// than inside it.
fn rule5_load_store_canonicalisation(node: &mut Node, state: &FunctionState) {
    if node.op == Opcode::Deref {
        if let Some(kind) = addressable_kind(node.left.as_deref()) {
            let mut target = node.left.take().unwrap();
            if kind == AddressableKind::Argument {
                target.value = target
                    .value
                    .wrapping_add((state.arg_base as u32).wrapping_add(state.frame_len));
            }
            node.op = kind.load_opcode();
            node.value = target.value;
            node.val2 = target.val2;
            node.snum = target.snum;
        }
        return;
    }
    if node.op == Opcode::Eq {
        if let Some(kind) = addressable_kind(node.left.as_deref()) {
            let mut target = node.left.take().unwrap();
            if kind == AddressableKind::Argument {
                target.value = target
                    .value
                    .wrapping_add((state.arg_base as u32).wrapping_add(state.frame_len));
            }
            let rhs = node.right.take();
            node.op = kind.store_opcode();
            node.value = target.value;
            node.val2 = target.val2;
            node.snum = target.snum;
            node.left = rhs;
            node.right = None;
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum AddressableKind {
    Name,
    Label,
    Local,
    RegisterVar,
    Argument,
}

impl AddressableKind {
    fn load_opcode(self) -> Opcode {
        match self {
            AddressableKind::Name => Opcode::NRef,
            AddressableKind::Label => Opcode::LBRef,
            AddressableKind::Local | AddressableKind::Argument => Opcode::LRef,
            AddressableKind::RegisterVar => Opcode::RRef,
        }
    }

    fn store_opcode(self) -> Opcode {
        match self {
            AddressableKind::Name => Opcode::NStore,
            AddressableKind::Label => Opcode::LBStore,
            AddressableKind::Local | AddressableKind::Argument => Opcode::LStore,
            AddressableKind::RegisterVar => Opcode::RStore,
        }
    }
}

fn addressable_kind(n: Option<&Node>) -> Option<AddressableKind> {
    match n?.op {
        Opcode::Name => Some(AddressableKind::Name),
        Opcode::Label => Some(AddressableKind::Label),
        Opcode::Local => Some(AddressableKind::Local),
        Opcode::Argument => Some(AddressableKind::Argument),
        Opcode::Reg => Some(AddressableKind::RegisterVar),
        _ => None,
    }
}

/// Rule 6: drop a cast that only changes signedness, is pointer-to-pointer,
/// or is the identity cast.
fn rule6_cast_elision(node: &mut Node) {
    if node.op != Opcode::Cast {
        return;
    }
    let Some(operand) = node.left.as_deref() else { return };
    let same_width = operand.ty.base_width_class() == node.ty.base_width_class();
    let both_pointers = operand.ty.is_pointer() && node.ty.is_pointer();
    let identity = operand.ty == node.ty;
    if same_width || both_pointers || identity {
        trace!("rewrite: cast elision {} -> {}", operand.ty, node.ty);
        let ty = node.ty;
        let mut operand = node.left.take().unwrap();
        operand.ty = ty;
        *node = *operand;
    }
}

/// Rule 7: a call through a named function pointer becomes `CallName`.
fn rule7_direct_call(node: &mut Node) {
    if node.op != Opcode::FuncCall {
        return;
    }
    let Some(target) = node.left.as_deref() else { return };
    if target.op != Opcode::Name || !target.ty.is_pointer() {
        return;
    }
    trace!("rewrite: direct call");
    let snum = target.snum;
    node.op = Opcode::CallName;
    node.snum = snum;
    node.left = node.right.take();
    node.right = None;
}

/// Rule 8: for AND/OR/XOR/multiply/plus, swap children so the simpler
/// operand is on the left and the more complex one lands on the right,
/// where the Code Selector prefers to hold it (in the accumulator).
fn rule8_commutative_reorder(node: &mut Node) {
    if !node.op.is_commutative() {
        return;
    }
    let (Some(l), Some(r)) = (node.left.as_deref(), node.right.as_deref()) else { return };
    if is_simple(l) > is_simple(r) {
        trace!("rewrite: commutative reorder on {:?}", node.op);
        node.swap_children();
    }
}

/// `is_simple` in backend-z80.c: a commutative-reorder desirability score.
/// Higher means "simpler", i.e. more willing to let it be the left operand.
fn is_simple(n: &Node) -> i32 {
    use Opcode::*;
    match n.op {
        Constant | Label | Name | Reg => 10,
        NRef | LBRef => 9,
        RRef | RDeref => 5,
        _ => 0,
    }
}
