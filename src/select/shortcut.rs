//! `gen_shortcut`: whole-subtree patterns that avoid stacking the left
//! operand (spec.md 4.3 rung 1). Tried before any child of `n` has been
//! visited, since a shortcut typically supplies its own traversal of (or
//! skips) its children.

use crate::error::CodegenError;
use crate::frame::Polarity;
use crate::ir::{BaseWidthClass, Node, NodeFlags, Opcode};
use crate::isa::RegisterVar;
use crate::settings::FeatureVector;

use super::Selector;

/// Try every shortcut pattern against `n`. Returns `Ok(true)` if one
/// matched and emitted code (the node and its children, if any were
/// consumed, are fully handled); `Ok(false)` defers to the next rung.
pub fn try_emit(sel: &mut Selector, n: &Node) -> Result<bool, CodegenError> {
    if global_store_of_constant(sel, n)? {
        return Ok(true);
    }
    if bit_test(sel, n)? {
        return Ok(true);
    }
    if frame_pointer_increment(sel, n)? {
        return Ok(true);
    }
    if zero_comparison_cconly(sel, n)? {
        return Ok(true);
    }
    if bc_register_compare_cconly(sel, n)? {
        return Ok(true);
    }
    if call_by_name(sel, n)? {
        return Ok(true);
    }
    Ok(false)
}

/// spec.md §8 scenario 1: `NSTORE` of a constant emits the constant load
/// and the store in two lines, with no stacking at all.
fn global_store_of_constant(sel: &mut Selector, n: &Node) -> Result<bool, CodegenError> {
    if n.op != Opcode::NStore {
        return Ok(false);
    }
    let Some(rhs) = n.left() else { return Ok(false) };
    if rhs.op != Opcode::Constant {
        return Ok(false);
    }
    let Some(sym) = n.snum else {
        return Err(CodegenError::unknown_segment());
    };
    let name = sel.symtab.name(sym).to_string();
    if n.ty.base_width_class() == BaseWidthClass::W8 {
        sel.emit.instr(format!("ld a,0x{:x}", rhs.value));
        sel.emit.instr(format!("ld (_{}+{}), a", name, n.value));
    } else {
        sel.emit.instr(format!("ld hl,0x{:x}", rhs.value));
        sel.emit.instr(format!("ld (_{}+{}), hl", name, n.value));
    }
    Ok(true)
}

/// spec.md §8 scenario 2: a `BTST` node emits a direct `bit` test against
/// the correct byte half and inverts polarity (the zero flag now means
/// "bit was clear", i.e. the opposite of the pre-rewrite `AND` truthiness).
fn bit_test(sel: &mut Selector, n: &Node) -> Result<bool, CodegenError> {
    if n.op != Opcode::BTst {
        return Ok(false);
    }
    if let Some(operand) = n.left() {
        sel.select_tree(operand)?;
    }
    let bit = n.value;
    let (reg, bit_in_byte) = if bit >= 8 { ("h", bit - 8) } else { ("l", bit) };
    sel.emit.instr(format!("bit {},{}", bit_in_byte, reg));
    sel.state.set_polarity(Polarity::TrueWhenZero);
    Ok(true)
}

/// spec.md §8 scenario 3: `x += 1` on a frame-pointer-relative local
/// becomes a single `inc (iy + off)`.
fn frame_pointer_increment(sel: &mut Selector, n: &Node) -> Result<bool, CodegenError> {
    if n.op != Opcode::PlusEq || !sel.state.use_fp {
        return Ok(false);
    }
    let Some(rhs) = n.right() else { return Ok(false) };
    if rhs.op != Opcode::Constant || rhs.value != 1 {
        return Ok(false);
    }
    // The left operand must itself already be the canonicalised local
    // access form (`LRef`/`LStore` share the frame-relative offset in
    // `value`); we read it straight off `n` since the rewriter folds the
    // compound assignment's target offset into the node itself.
    let Some(target) = n.left() else { return Ok(false) };
    if target.op != Opcode::LRef {
        return Ok(false);
    }
    sel.emit.instr(format!("inc (iy + {})", target.value));
    if n.is_noreturn() {
        return Ok(true);
    }
    sel.emit.instr(format!("ld a,(iy + {})", target.value));
    sel.emit.instr("ld l,a");
    Ok(true)
}

/// spec.md §8 scenario 4: a 16-bit equality-against-zero in `CCONLY`
/// context becomes `ld a,h` / `or l`, with polarity inverted (zero flag now
/// means "equal"), and no `CCFIXED` pin forbidding that inversion.
fn zero_comparison_cconly(sel: &mut Selector, n: &Node) -> Result<bool, CodegenError> {
    if n.op != Opcode::EqEq || !n.is_cconly() {
        return Ok(false);
    }
    if n.ty.base_width_class() != BaseWidthClass::W16 {
        return Ok(false);
    }
    let Some(rhs) = n.right() else { return Ok(false) };
    if rhs.op != Opcode::Constant || rhs.value != 0 {
        return Ok(false);
    }
    if let Some(lhs) = n.left() {
        sel.select_tree(lhs)?;
    }
    sel.emit.instr("ld a,h");
    sel.emit.instr("or l");
    sel.state.set_polarity(Polarity::TrueWhenZero);
    Ok(true)
}

/// A 16-bit equality comparison in `CCONLY` context against the `bc`
/// register variable folds into `or a / sbc hl,bc` instead of stacking the
/// left operand and routing through a compare helper: `bc` is already
/// sitting in a register, so it needs no evaluation of its own.
fn bc_register_compare_cconly(sel: &mut Selector, n: &Node) -> Result<bool, CodegenError> {
    if !matches!(n.op, Opcode::EqEq | Opcode::BangEq) || !n.is_cconly() {
        return Ok(false);
    }
    if n.ty.base_width_class() != BaseWidthClass::W16 {
        return Ok(false);
    }
    let Some(rhs) = n.right() else { return Ok(false) };
    if rhs.op != Opcode::RRef || !RegisterVar::from_code(rhs.value).has_accumulator_shortcut() {
        return Ok(false);
    }
    if n.op == Opcode::EqEq && n.flags.contains(NodeFlags::CCFIXED) {
        // EqEq needs to invert the flag below; CCFIXED forbids that.
        return Ok(false);
    }
    if let Some(lhs) = n.left() {
        sel.select_tree(lhs)?;
    }
    sel.emit.instr("or a");
    sel.emit.instr("sbc hl,bc");
    let polarity = if n.op == Opcode::EqEq {
        Polarity::TrueWhenZero
    } else {
        Polarity::normal()
    };
    sel.state.set_polarity(polarity);
    Ok(true)
}

/// spec.md §8 scenario 5: a direct call in banked mode saves/restores `af`
/// around the call, and the argument-base accounting (the extra banking
/// slot) was already folded into `state.arg_base` by the prologue.
fn call_by_name(sel: &mut Selector, n: &Node) -> Result<bool, CodegenError> {
    if n.op != Opcode::CallName {
        return Ok(false);
    }
    let Some(sym) = n.snum else {
        return Err(CodegenError::unknown_segment());
    };
    let name = sel.symtab.name(sym).to_string();
    let banked = sel.flags.features().contains(FeatureVector::BANKED);
    if banked {
        sel.emit.push(sel.state, "af");
    }
    sel.emit.instr(format!("call _{}+0", name));
    if banked {
        sel.emit.pop(sel.state, "af");
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Emitter;
    use crate::frame::FunctionState;
    use crate::ir::{BaseType, TypeTag};
    use crate::settings::{Flags, Variant};
    use crate::symtab::VecSymbolTable;

    fn selector_parts() -> (Emitter, FunctionState, Flags, VecSymbolTable) {
        (
            Emitter::new(),
            FunctionState::new(0, Default::default()),
            Flags::builder(Variant::Z80).finish(),
            VecSymbolTable::new(),
        )
    }

    #[test]
    fn bangeq_against_bc_regvar_uses_sbc_shortcut() {
        let (mut emit, mut state, flags, symtab) = selector_parts();
        let lhs = Node::leaf(Opcode::LRef, TypeTag::new(BaseType::I16));
        let mut rhs = Node::leaf(Opcode::RRef, TypeTag::new(BaseType::I16));
        rhs.value = 0; // bc
        let mut n = Node::binary(Opcode::BangEq, TypeTag::new(BaseType::I16), lhs, rhs);
        n.flags.insert(NodeFlags::CCONLY);
        let mut sel = Selector::new(&mut emit, &mut state, &flags, &symtab);
        assert!(bc_register_compare_cconly(&mut sel, &n).unwrap());
        assert!(emit.text().contains("sbc hl,bc"));
    }

    #[test]
    fn eqeq_against_bc_regvar_declines_when_ccfixed() {
        let (mut emit, mut state, flags, symtab) = selector_parts();
        let lhs = Node::leaf(Opcode::LRef, TypeTag::new(BaseType::I16));
        let mut rhs = Node::leaf(Opcode::RRef, TypeTag::new(BaseType::I16));
        rhs.value = 0; // bc
        let mut n = Node::binary(Opcode::EqEq, TypeTag::new(BaseType::I16), lhs, rhs);
        n.flags.insert(NodeFlags::CCONLY);
        n.flags.insert(NodeFlags::CCFIXED);
        let mut sel = Selector::new(&mut emit, &mut state, &flags, &symtab);
        assert!(!bc_register_compare_cconly(&mut sel, &n).unwrap());
    }

    #[test]
    fn comparison_against_ix_regvar_is_not_shortcut() {
        let (mut emit, mut state, flags, symtab) = selector_parts();
        let lhs = Node::leaf(Opcode::LRef, TypeTag::new(BaseType::I16));
        let mut rhs = Node::leaf(Opcode::RRef, TypeTag::new(BaseType::I16));
        rhs.value = 1; // ix
        let mut n = Node::binary(Opcode::BangEq, TypeTag::new(BaseType::I16), lhs, rhs);
        n.flags.insert(NodeFlags::CCONLY);
        let mut sel = Selector::new(&mut emit, &mut state, &flags, &symtab);
        assert!(!bc_register_compare_cconly(&mut sel, &n).unwrap());
    }
}
