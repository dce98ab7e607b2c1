//! Load/store emission for the five addressable-reference opcodes the Tree
//! Rewriter canonicalises addressing modes into: `NRef`/`NStore` (globals),
//! `LBRef`/`LBStore` (literal labels), `LRef`/`LStore` (locals/arguments,
//! consulting the Frame/Stack Tracker's [`crate::frame::choose_local_access`]
//! ladder), `RRef`/`RStore` (register variables), and `RDeref`/`REq`
//! (register-variable-plus-offset derefs).
//!
//! Grounded on `generate_lref`/`generate_lref_a`/`gen_node`'s name/label/
//! register-variable cases in backend-z80.c.

use crate::error::CodegenError;
use crate::frame::{choose_local_access, LocalAccess};
use crate::ir::{BaseWidthClass, Node, Opcode};
use crate::isa::RegisterVar;

use super::Selector;

fn is_word(n: &Node) -> bool {
    n.ty.base_width_class() != BaseWidthClass::W8
}

/// Load `n` (one of `NRef`/`LBRef`/`LRef`/`RRef`/`RDeref`) into `hl` (16-bit
/// types) or `a`/`l` (8-bit types).
pub fn load(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    match n.op {
        Opcode::NRef => {
            let name = sel
                .symtab
                .name(n.snum.ok_or_else(CodegenError::unknown_segment)?)
                .to_string();
            if is_word(n) {
                sel.emit.instr(format!("ld hl,(_{}+{})", name, n.value));
            } else {
                sel.emit.instr(format!("ld a,(_{}+{})", name, n.value));
            }
            Ok(())
        }
        Opcode::LBRef => {
            if is_word(n) {
                sel.emit.instr(format!("ld hl,({})", n.label()));
            } else {
                sel.emit.instr(format!("ld a,({})", n.label()));
            }
            Ok(())
        }
        Opcode::LRef => load_local(sel, n),
        Opcode::RRef => {
            load_register_var(sel, RegisterVar::from_code(n.value), is_word(n));
            Ok(())
        }
        Opcode::RDeref => load_reg_deref(sel, n),
        _ => Err(CodegenError::unreachable_opcode()),
    }
}

/// Store the value already in `hl`/`a` to the address described by `n` (one
/// of `NStore`/`LBStore`/`LStore`/`RStore`/`REq`). `n.left()` holds the
/// already-evaluated right-hand side, which the caller is responsible for
/// having selected first; this only emits the final write.
pub fn store(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    match n.op {
        Opcode::NStore => {
            let name = sel
                .symtab
                .name(n.snum.ok_or_else(CodegenError::unknown_segment)?)
                .to_string();
            if is_word(n) {
                sel.emit.instr(format!("ld (_{}+{}), hl", name, n.value));
            } else {
                sel.emit.instr(format!("ld (_{}+{}), a", name, n.value));
            }
            Ok(())
        }
        Opcode::LBStore => {
            if is_word(n) {
                sel.emit.instr(format!("ld ({}), hl", n.label()));
            } else {
                sel.emit.instr(format!("ld ({}), a", n.label()));
            }
            Ok(())
        }
        Opcode::LStore => store_local(sel, n),
        Opcode::RStore => {
            store_register_var(sel, RegisterVar::from_code(n.value), is_word(n));
            Ok(())
        }
        Opcode::REq => store_reg_deref(sel, n),
        _ => Err(CodegenError::unreachable_opcode()),
    }
}

fn load_local(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let offset = n.value as i32;
    match choose_local_access(sel.flags, sel.state, offset) {
        LocalAccess::StackTop => {
            sel.emit.pop(sel.state, "hl");
            sel.emit.push(sel.state, "hl");
        }
        LocalAccess::FramePointer => {
            if is_word(n) {
                sel.emit.instr(format!("ld l,(iy + {})", offset));
                sel.emit.instr(format!("ld h,(iy + {})", offset + 1));
            } else {
                sel.emit.instr(format!("ld l,(iy + {})", offset));
            }
        }
        LocalAccess::InlineStackRelative => {
            sel.emit.instr(format!("ld hl,{}", offset));
            sel.emit.instr("add hl,sp");
            if is_word(n) {
                sel.emit.instr("ld e,(hl)");
                sel.emit.instr("inc hl");
                sel.emit.instr("ld d,(hl)");
                sel.emit.instr("ex de,hl");
            } else {
                sel.emit.instr("ld l,(hl)");
            }
        }
        LocalAccess::HelperNumericSuffix => {
            sel.emit.instr(format!("call __lref{}", offset));
        }
        LocalAccess::HelperByteFollower => {
            sel.emit.instr("call __lrefb");
            sel.emit.instr(format!(".byte {}", offset));
        }
        LocalAccess::HelperWordFollower => {
            sel.emit.instr("call __lrefw");
            sel.emit.instr(format!(".word {}", offset));
        }
    }
    Ok(())
}

fn store_local(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let offset = n.value as i32;
    match choose_local_access(sel.flags, sel.state, offset) {
        LocalAccess::StackTop => {
            sel.emit.pop(sel.state, "de");
            sel.emit.push(sel.state, "hl");
            sel.emit.instr("ex de,hl");
        }
        LocalAccess::FramePointer => {
            if is_word(n) {
                sel.emit.instr(format!("ld (iy + {}), l", offset));
                sel.emit.instr(format!("ld (iy + {}), h", offset + 1));
            } else {
                sel.emit.instr(format!("ld (iy + {}), l", offset));
            }
        }
        LocalAccess::InlineStackRelative => {
            sel.emit.instr("ex de,hl");
            sel.emit.instr(format!("ld hl,{}", offset));
            sel.emit.instr("add hl,sp");
            if is_word(n) {
                sel.emit.instr("ld (hl),e");
                sel.emit.instr("inc hl");
                sel.emit.instr("ld (hl),d");
            } else {
                sel.emit.instr("ld (hl),e");
            }
        }
        LocalAccess::HelperNumericSuffix => {
            sel.emit.instr(format!("call __lstore{}", offset));
        }
        LocalAccess::HelperByteFollower => {
            sel.emit.instr("call __lstoreb");
            sel.emit.instr(format!(".byte {}", offset));
        }
        LocalAccess::HelperWordFollower => {
            sel.emit.instr("call __lstorew");
            sel.emit.instr(format!(".word {}", offset));
        }
    }
    Ok(())
}

fn load_register_var(sel: &mut Selector, var: RegisterVar, word: bool) {
    if var.has_accumulator_shortcut() {
        let (hi, lo) = var.halves();
        if word {
            sel.emit.instr(format!("ld h,{}", hi));
        }
        sel.emit.instr(format!("ld l,{}", lo));
    } else {
        sel.emit.push(sel.state, var.name());
        sel.emit.pop(sel.state, "hl");
    }
}

fn store_register_var(sel: &mut Selector, var: RegisterVar, word: bool) {
    if var.has_accumulator_shortcut() {
        let (hi, lo) = var.halves();
        if word {
            sel.emit.instr(format!("ld {},h", hi));
        }
        sel.emit.instr(format!("ld {},l", lo));
    } else {
        sel.emit.push(sel.state, "hl");
        sel.emit.pop(sel.state, var.name());
    }
}

fn load_reg_deref(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let var = RegisterVar::from_code(n.value);
    let offset = n.val2;
    match var {
        RegisterVar::Bc if offset == 0 => {
            if is_word(n) {
                sel.emit.instr("ld a,(bc)");
                sel.emit.instr("inc bc");
                sel.emit.instr("ld h,(bc)");
                sel.emit.instr("ld l,a");
                sel.emit.instr("dec bc");
            } else {
                sel.emit.instr("ld l,(bc)");
            }
        }
        RegisterVar::Bc => return Err(CodegenError::unknown_register_var()),
        RegisterVar::Ix | RegisterVar::Iy => {
            let reg = var.name();
            if is_word(n) {
                sel.emit.instr(format!("ld l,({} + {})", reg, offset));
                sel.emit.instr(format!("ld h,({} + {})", reg, offset + 1));
            } else {
                sel.emit.instr(format!("ld l,({} + {})", reg, offset));
            }
        }
    }
    Ok(())
}

fn store_reg_deref(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let var = RegisterVar::from_code(n.value);
    let offset = n.val2;
    match var {
        RegisterVar::Bc if offset == 0 => {
            if is_word(n) {
                sel.emit.instr("ld a,l");
                sel.emit.instr("ld (bc),a");
                sel.emit.instr("inc bc");
                sel.emit.instr("ld (bc),h");
                sel.emit.instr("dec bc");
            } else {
                sel.emit.instr("ld (bc),l");
            }
        }
        RegisterVar::Bc => return Err(CodegenError::unknown_register_var()),
        RegisterVar::Ix | RegisterVar::Iy => {
            let reg = var.name();
            if is_word(n) {
                sel.emit.instr(format!("ld ({} + {}), l", reg, offset));
                sel.emit.instr(format!("ld ({} + {}), h", reg, offset + 1));
            } else {
                sel.emit.instr(format!("ld ({} + {}), l", reg, offset));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Emitter;
    use crate::frame::FunctionState;
    use crate::ir::{BaseType, TypeTag};
    use crate::settings::Variant;
    use crate::symtab::VecSymbolTable;

    fn selector_parts() -> (Emitter, FunctionState, crate::settings::Flags, VecSymbolTable) {
        (
            Emitter::new(),
            FunctionState::new(0, Default::default()),
            crate::settings::Flags::builder(Variant::Z80).finish(),
            VecSymbolTable::new(),
        )
    }

    #[test]
    fn local_load_via_frame_pointer_reads_both_bytes() {
        let (mut emit, mut state, flags, symtab) = selector_parts();
        state.use_fp = true;
        let mut n = Node::leaf(Opcode::LRef, TypeTag::new(BaseType::I16));
        n.value = 4;
        let mut sel = Selector::new(&mut emit, &mut state, &flags, &symtab);
        load(&mut sel, &n).unwrap();
        assert!(emit.text().contains("ld l,(iy + 4)"));
        assert!(emit.text().contains("ld h,(iy + 5)"));
    }

    #[test]
    fn global_byte_load_reads_the_accumulator() {
        let (mut emit, mut state, flags, mut symtab) = selector_parts();
        let g = symtab.intern("g");
        let mut n = Node::leaf(Opcode::NRef, TypeTag::new(BaseType::U8));
        n.snum = Some(g);
        let mut sel = Selector::new(&mut emit, &mut state, &flags, &symtab);
        load(&mut sel, &n).unwrap();
        assert_eq!(emit.text().trim(), "ld a,(_g+0)");
    }

    #[test]
    fn bc_deref_at_nonzero_offset_is_an_error() {
        let (mut emit, mut state, flags, symtab) = selector_parts();
        let mut n = Node::leaf(Opcode::RDeref, TypeTag::new(BaseType::U8));
        n.value = 0; // bc
        n.val2 = 1;
        let mut sel = Selector::new(&mut emit, &mut state, &flags, &symtab);
        assert!(load_reg_deref(&mut sel, &n).is_err());
    }
}
