//! `gen_node`: the fallback selection rung (spec.md 4.3 rung 3). Reached
//! when neither `gen_shortcut` nor `gen_direct` recognised the node; both
//! operands have already been evaluated (left in the accumulator, right on
//! the stack) by the time this runs, so the fallback dispatches to a named
//! runtime helper via the Helper Dispatcher (spec.md 4.5, §6 "Helper
//! library surface").

use crate::error::CodegenError;
use crate::helpers::{self, HelperCallConv};
use crate::ir::{BaseWidthClass, Node, Opcode};

use super::arith;
use super::{access, Selector};

/// Emit `n`'s fallback sequence. This is the rung of last resort: if it
/// also declines, the node is genuinely [`CodegenError::Unsupported`].
pub fn emit(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    match n.op {
        // A bare constant needs no code of its own: every rung that treats
        // one as an operand (`direct`, and `mul`/`div_or_rem`/`logic`/
        // `compare` below) reads its value directly rather than expecting
        // it materialised in a register first.
        Opcode::Constant => Ok(()),
        Opcode::NRef | Opcode::LBRef | Opcode::LRef | Opcode::RRef | Opcode::RDeref => {
            access::load(sel, n)
        }
        Opcode::NStore | Opcode::LBStore | Opcode::LStore | Opcode::RStore | Opcode::REq => {
            access::store(sel, n)
        }
        Opcode::Star => mul(sel, n),
        Opcode::Slash | Opcode::Percent => div_or_rem(sel, n),
        Opcode::And | Opcode::Or | Opcode::Hat => logic(sel, n),
        Opcode::Plus | Opcode::Minus => helper_binary(sel, n),
        op if op.is_comparison() => compare(sel, n),
        Opcode::Bang | Opcode::Bool => boolify(sel, n),
        Opcode::Comma => Ok(()), // children already emitted in order; nothing further
        Opcode::Cleanup => {
            crate::frame::call_cleanup(sel.emit, sel.state, n.value);
            Ok(())
        }
        Opcode::FuncCall => {
            sel.emit.instr("call __callhl");
            Ok(())
        }
        op if op.is_compound_assign() => helper_binary(sel, n),
        Opcode::PlusPlus | Opcode::MinusMinus => post_incdec(sel, n),
        _ => Err(CodegenError::Unsupported { op: n.op, ty: n.ty }),
    }
}

fn width_suffix(n: &Node) -> &'static str {
    match n.ty.base_width_class() {
        BaseWidthClass::W8 => "b",
        BaseWidthClass::W16 => "",
        _ => "l",
    }
}

fn helper_binary(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let Some(lhs) = n.left() else {
        return Err(CodegenError::unreachable_opcode());
    };
    let rhs = n.right();
    let rhs_ty = rhs.map(|r| r.ty).unwrap_or(n.ty);
    let conv = HelperCallConv::classify(n.op, lhs.ty, rhs_ty);
    let base = match n.op {
        Opcode::Plus => "__plus",
        Opcode::Minus => "__minus",
        Opcode::PlusEq => "__pluseq",
        Opcode::MinusEq => "__minuseq",
        Opcode::StarEq => "__muleq",
        Opcode::SlashEq => "__diveq",
        Opcode::PercentEq => "__modeq",
        Opcode::AndEq => "__andeq",
        Opcode::OrEq => "__oreq",
        Opcode::HatEq => "__xoreq",
        Opcode::ShlEq => "__shleq",
        Opcode::ShrEq => "__shreq",
        _ => return Err(CodegenError::unreachable_opcode()),
    };
    let helper = match conv {
        HelperCallConv::Integer => format!("{}de", base),
        HelperCallConv::CStyle => base.to_string(),
    };
    let mut pushed = 0;
    match conv {
        HelperCallConv::CStyle => {
            let width = n.ty.size().clamp(2, 4);
            helpers::push_right_operand(sel.emit, sel.state, width);
            pushed = width;
        }
        HelperCallConv::Integer => {
            if let Some(rhs) = rhs {
                if rhs.op == Opcode::Constant {
                    sel.emit.instr(format!("ld de,0x{:x}", rhs.value));
                } else {
                    // Right was just evaluated into `hl`; left is where
                    // `select_tree` stacked it before that evaluation.
                    sel.emit.instr("ex de,hl");
                    sel.emit.pop(sel.state, "hl");
                }
            }
        }
    }
    helpers::emit_call(sel.emit, sel.state, &helper, conv, pushed);
    helpers::normalise_isbool_result(sel.emit, n, conv);
    Ok(())
}

fn mul(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let Some(rhs) = n.right() else {
        return Err(CodegenError::unreachable_opcode());
    };
    let width = n.ty.size();
    if rhs.op == Opcode::Constant && arith::can_fast_mul(sel.flags, width, rhs.value as u16) {
        if rhs.value == 0 {
            sel.emit.instr("ld hl,0x0");
        } else if rhs.value != 1 {
            arith::emit_fast_mul(sel.emit, sel.state, rhs.value as u16);
        }
        return Ok(());
    }
    helper_call_with_constant_or_stack(sel, n, "__mulde")
}

fn div_or_rem(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let Some(rhs) = n.right() else {
        return Err(CodegenError::unreachable_opcode());
    };
    let signed = !n.ty.is_unsigned();
    if n.op == Opcode::Slash && rhs.op == Opcode::Constant {
        if let Some(strategy) = arith::div_strategy(rhs.value as u16, signed) {
            emit_div_strategy(sel, strategy);
            return Ok(());
        }
    }
    let base = if n.op == Opcode::Slash { "__divde" } else { "__modde" };
    let helper = if signed { format!("{}s", base) } else { base.to_string() };
    helper_call_with_constant_or_stack(sel, n, &helper)
}

fn emit_div_strategy(sel: &mut Selector, strategy: arith::DivStrategy) {
    use arith::DivStrategy::*;
    match strategy {
        Identity => {}
        ByteSwap => {
            sel.emit.instr("ld a,h");
            sel.emit.instr("ld h,0");
            sel.emit.instr("ld l,a");
        }
        Shifts { n, signed } => {
            for _ in 0..n {
                if signed {
                    sel.emit.instr("sra h");
                } else {
                    sel.emit.instr("srl h");
                }
                sel.emit.instr("rr l");
            }
        }
    }
}

fn logic(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let Some(rhs) = n.right() else {
        return Err(CodegenError::unreachable_opcode());
    };
    if rhs.op != Opcode::Constant {
        let helper = match n.op {
            Opcode::And => "__andde",
            Opcode::Or => "__orde",
            _ => "__xorde",
        };
        return helper_call_with_constant_or_stack(sel, n, helper);
    }
    let lo = (rhs.value & 0xff) as u8;
    let hi = ((rhs.value >> 8) & 0xff) as u8;
    for (reg, byte) in [("l", lo), ("h", hi)] {
        let strategy = match n.op {
            Opcode::And => arith::and_byte_strategy(byte),
            Opcode::Or => arith::or_byte_strategy(byte),
            _ => arith::xor_byte_strategy(byte),
        };
        use arith::ByteLogicOp::*;
        match strategy {
            Clear => sel.emit.instr(format!("ld {},0", reg)),
            SetOrInvert if n.op == Opcode::Or => sel.emit.instr(format!("ld {},0xff", reg)),
            SetOrInvert => {
                sel.emit.instr(format!("ld a,{}", reg));
                sel.emit.instr("cpl");
                sel.emit.instr(format!("ld {},a", reg));
            }
            SingleBit { op, bit } => sel.emit.instr(format!("{} {},{}", op, bit, reg)),
            ViaAccumulator => {
                let mnemonic = match n.op {
                    Opcode::And => "and",
                    Opcode::Or => "or",
                    _ => "xor",
                };
                sel.emit.instr(format!("ld a,{}", reg));
                sel.emit.instr(format!("{} 0x{:x}", mnemonic, byte));
                sel.emit.instr(format!("ld {},a", reg));
            }
        }
    }
    Ok(())
}

fn compare(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    use crate::frame::Polarity;
    let signed = !n.ty.is_unsigned();
    let base = match n.op {
        Opcode::EqEq => "__cmpeq",
        Opcode::BangEq => "__cmpne",
        Opcode::Lt => "__cmplt",
        Opcode::LtEq => "__cmplteq",
        Opcode::Gt => "__cmpgt",
        Opcode::GtEq => "__cmpgteq",
        _ => return Err(CodegenError::unreachable_opcode()),
    };
    let helper = if signed { format!("{}s", base) } else { base.to_string() };
    helper_call_with_constant_or_stack(sel, n, &helper)?;
    if n.is_cconly() {
        sel.state.set_polarity(Polarity::normal());
    }
    Ok(())
}

fn boolify(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    if n.is_cconly() {
        sel.emit.instr("call __cctobool");
    } else {
        sel.emit.instr("call __bool");
    }
    Ok(())
}

fn post_incdec(sel: &mut Selector, n: &Node) -> Result<(), CodegenError> {
    let base = if n.op == Opcode::PlusPlus {
        "__postinc"
    } else {
        "__postdec"
    };
    sel.emit.instr(format!("call {}{}", base, width_suffix(n)));
    Ok(())
}

fn helper_call_with_constant_or_stack(
    sel: &mut Selector,
    n: &Node,
    helper: &str,
) -> Result<(), CodegenError> {
    let Some(rhs) = n.right() else {
        return Err(CodegenError::unreachable_opcode());
    };
    if rhs.op == Opcode::Constant {
        sel.emit.instr(format!("ld de,0x{:x}", rhs.value));
    } else {
        // The right operand was just evaluated into `hl`, and the left
        // operand is sitting where `select_tree` stacked it beforehand.
        sel.emit.instr("ex de,hl");
        sel.emit.pop(sel.state, "hl");
    }
    helpers::emit_call(sel.emit, sel.state, helper, HelperCallConv::Integer, 0);
    Ok(())
}
