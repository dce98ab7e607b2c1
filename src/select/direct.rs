//! `gen_direct`: the second selection rung (spec.md 4.3 rung 2). By the
//! time this runs, `n`'s left child has already been emitted by
//! [`super::Selector::select_tree`] and its value sits in the accumulator
//! pair; this rung only fires when the right child is "accessible" without
//! stacking: a constant, a named global, a labelled literal, or an in-range
//! local/register-variable load.

use crate::error::CodegenError;
use crate::ir::{BaseWidthClass, Node, Opcode};

use super::Selector;

/// True if `n` can be loaded into `de` (the secondary register pair) in a
/// single instruction, with no stack use — the definition of "accessible"
/// this rung requires of its right operand.
fn is_directly_accessible(n: &Node) -> bool {
    matches!(n.op, Opcode::Constant | Opcode::NRef | Opcode::LBRef | Opcode::RRef)
}

/// Load `n` (already known [`is_directly_accessible`]) into `de`.
fn load_de_with(sel: &mut Selector, n: &Node) {
    match n.op {
        Opcode::Constant => {
            sel.emit.instr(format!("ld de,0x{:x}", n.value));
        }
        Opcode::NRef => {
            let name = n
                .snum
                .map(|s| sel.symtab.name(s).to_string())
                .unwrap_or_default();
            sel.emit.instr(format!("ld de,(_{}+{})", name, n.value));
        }
        Opcode::LBRef => {
            sel.emit.instr(format!("ld de,({})", n.label()));
        }
        Opcode::RRef => {
            sel.emit.instr("ld d,b");
            sel.emit.instr("ld e,c");
        }
        _ => unreachable!("load_de_with called on an opcode is_directly_accessible rejected"),
    }
}

pub fn try_emit(sel: &mut Selector, n: &Node) -> Result<bool, CodegenError> {
    if n.ty.base_width_class() != BaseWidthClass::W16 && n.ty.base_width_class() != BaseWidthClass::W8 {
        return Ok(false);
    }
    let Some(rhs) = n.right() else { return Ok(false) };
    if !is_directly_accessible(rhs) {
        return Ok(false);
    }

    match n.op {
        Opcode::Plus => {
            load_de_with(sel, rhs);
            sel.emit.instr("add hl,de");
            Ok(true)
        }
        Opcode::Minus => {
            load_de_with(sel, rhs);
            sel.emit.instr("or a");
            sel.emit.instr("sbc hl,de");
            Ok(true)
        }
        Opcode::And => {
            load_de_with(sel, rhs);
            sel.emit.instr("ld a,l");
            sel.emit.instr("and e");
            sel.emit.instr("ld l,a");
            sel.emit.instr("ld a,h");
            sel.emit.instr("and d");
            sel.emit.instr("ld h,a");
            Ok(true)
        }
        Opcode::Or => {
            load_de_with(sel, rhs);
            sel.emit.instr("ld a,l");
            sel.emit.instr("or e");
            sel.emit.instr("ld l,a");
            sel.emit.instr("ld a,h");
            sel.emit.instr("or d");
            sel.emit.instr("ld h,a");
            Ok(true)
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Emitter;
    use crate::frame::FunctionState;
    use crate::ir::{BaseType, TypeTag};
    use crate::settings::{Flags, Variant};
    use crate::symtab::VecSymbolTable;

    #[test]
    fn plus_with_constant_right_operand_adds_directly() {
        let flags = Flags::builder(Variant::Z80).finish();
        let symtab = VecSymbolTable::new();
        let mut emit = Emitter::new();
        let mut state = FunctionState::new(0, Default::default());
        let mut sel = Selector::new(&mut emit, &mut state, &flags, &symtab);
        let lhs = Node::leaf(Opcode::LRef, TypeTag::new(BaseType::I16));
        let mut k = Node::leaf(Opcode::Constant, TypeTag::new(BaseType::I16));
        k.value = 5;
        let plus = Node::binary(Opcode::Plus, TypeTag::new(BaseType::I16), lhs, k);
        let handled = try_emit(&mut sel, &plus).unwrap();
        assert!(handled);
        assert!(emit.text().contains("ld de,0x5"));
        assert!(emit.text().contains("add hl,de"));
    }
}
