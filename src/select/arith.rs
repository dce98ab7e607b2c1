//! Multiply/divide/remainder/logic cost-model heuristics (spec.md 4.3 "Key
//! selection heuristics").
//!
//! Grounded on `count_mul_cost`/`write_mul`/`can_fast_mul`/`gen_fast_mul`/
//! `gen_fast_div`/`gen_logicc` in backend-z80.c.

use crate::emit::Emitter;
use crate::frame::FunctionState;
use crate::settings::Flags;

/// `count_mul_cost` in backend-z80.c: the cycle-cost estimate of an inline
/// shift-and-add sequence multiplying by `k`. Processed LSB-first: a whole
/// byte of zero low bits folds into a single register move (3), then each
/// remaining bit costs 1 for the doubling plus 3 more if it is set (a
/// push/pop/add round trip to fold that bit's contribution back in).
pub fn count_mul_cost(k: u16) -> u32 {
    let mut n = k;
    let mut cost = 0u32;
    if n & 0xff == 0 {
        n >>= 8;
        cost += 3;
    }
    while n > 1 {
        if n & 1 == 1 {
            cost += 3;
        }
        n >>= 1;
        cost += 1;
    }
    cost
}

/// `can_fast_mul` in backend-z80.c: `cost = 15 + 3*opt_level` (10 when
/// optimising for size), and the helper only ever inlines multiplies of
/// operands up to 16 bits wide (`s <= 2`).
pub fn can_fast_mul(flags: &Flags, width_bytes: u32, k: u16) -> bool {
    if width_bytes > 2 {
        return false;
    }
    let threshold = if flags.prefer_size() {
        10
    } else {
        15 + 3 * flags.opt_level().get() as u32
    };
    k == 0 || count_mul_cost(k) <= threshold
}

/// Emit an inline doubling-and-add multiply of the accumulator pair (`hl`)
/// by the nonzero constant `k` (`k == 0` is the caller's `ld hl,0x0`
/// shortcut, spec.md 4.3's "zero-fast-path"; `k == 1` is a no-op, both
/// handled by the caller before this is reached).
///
/// Matches `write_mul` exactly: walk `k` from the low bit up, doubling each
/// step; push the running value first whenever the bit about to be
/// discarded is set, then at the end pop and add back every saved value, in
/// reverse (LIFO) order.
pub fn emit_fast_mul(emit: &mut Emitter, state: &mut FunctionState, k: u16) {
    debug_assert_ne!(k, 0);
    let mut n = k;
    if n & 0xff == 0 {
        emit.instr("ld h,l");
        emit.instr("ld l,0");
        n >>= 8;
    }
    let mut pops = 0u32;
    while n > 1 {
        if n & 1 == 1 {
            pops += 1;
            emit.push(state, "hl");
        }
        emit.instr("add hl,hl");
        n >>= 1;
    }
    for _ in 0..pops {
        emit.pop(state, "de");
        emit.instr("add hl,de");
    }
}

/// `gen_fast_div`: is `k` a power of two (including 1), so division can be
/// done with shifts instead of a helper call?
pub fn is_power_of_two_divisor(k: u16) -> bool {
    k != 0 && (k & (k - 1)) == 0
}

/// Number of right shifts `gen_fast_div` needs to divide by `k`, or a
/// special-cased byte swap for 256.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DivStrategy {
    /// `k == 1`: no-op.
    Identity,
    /// `k == 256`: swap high/low bytes (`ld a,h` / `ld l,a` / `ld h,0`).
    ByteSwap,
    /// General power-of-two: `n` right shifts, arithmetic if signed.
    Shifts { n: u32, signed: bool },
}

pub fn div_strategy(k: u16, signed: bool) -> Option<DivStrategy> {
    if !is_power_of_two_divisor(k) {
        return None;
    }
    Some(match k {
        1 => DivStrategy::Identity,
        256 => DivStrategy::ByteSwap,
        _ => DivStrategy::Shifts {
            n: k.trailing_zeros(),
            signed,
        },
    })
}

/// Per-byte AND/OR/XOR-with-constant optimisation (spec.md 4.3 "Logical ops
/// with constant"): what to do with one byte of the accumulator given one
/// byte of the constant operand.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ByteLogicOp {
    /// AND with 0: the byte becomes 0, no accumulator read needed.
    Clear,
    /// OR/XOR with 0xff: the byte becomes 0xff (OR) or is inverted (XOR).
    SetOrInvert,
    /// Neither identity case applies: emit the operation via the
    /// accumulator.
    ViaAccumulator,
    /// AND clearing exactly one bit, or OR/XOR setting exactly one bit:
    /// emit a direct `res`/`set` instruction instead of a full byte op.
    SingleBit { op: &'static str, bit: u32 },
}

pub fn and_byte_strategy(constant_byte: u8) -> ByteLogicOp {
    match constant_byte {
        0 => ByteLogicOp::Clear,
        0xff => ByteLogicOp::ViaAccumulator, // AND with 0xff is identity, handled by caller skipping emission
        b if (!b).count_ones() == 1 => ByteLogicOp::SingleBit {
            op: "res",
            bit: (!b).trailing_zeros(),
        },
        _ => ByteLogicOp::ViaAccumulator,
    }
}

pub fn or_byte_strategy(constant_byte: u8) -> ByteLogicOp {
    match constant_byte {
        0xff => ByteLogicOp::SetOrInvert,
        0 => ByteLogicOp::ViaAccumulator, // OR with 0 is identity
        b if b.count_ones() == 1 => ByteLogicOp::SingleBit {
            op: "set",
            bit: b.trailing_zeros(),
        },
        _ => ByteLogicOp::ViaAccumulator,
    }
}

pub fn xor_byte_strategy(constant_byte: u8) -> ByteLogicOp {
    match constant_byte {
        0xff => ByteLogicOp::SetOrInvert,
        0 => ByteLogicOp::ViaAccumulator,
        _ => ByteLogicOp::ViaAccumulator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Variant;

    #[test]
    fn multiply_by_one_and_two_are_cheap() {
        let flags = Flags::builder(Variant::Z80).finish();
        assert!(can_fast_mul(&flags, 2, 1));
        assert!(can_fast_mul(&flags, 2, 2));
    }

    #[test]
    fn multiply_by_256_is_cheaper_than_by_257() {
        let with_bonus = count_mul_cost(256);
        let without = count_mul_cost(257);
        assert!(with_bonus < without);
    }

    #[test]
    fn multiply_by_six_matches_the_canonical_double_save_double_pop_add_sequence() {
        let mut emit = Emitter::new();
        let mut state = FunctionState::new(0, Default::default());
        emit_fast_mul(&mut emit, &mut state, 6);
        let lines: Vec<&str> = emit.text().lines().map(str::trim).collect();
        assert_eq!(
            lines,
            vec!["add hl,hl", "push hl", "add hl,hl", "pop de", "add hl,de"]
        );
        assert_eq!(state.stack_delta, 0);
    }

    #[test]
    fn thirty_two_bit_wide_multiply_never_inlines() {
        let flags = Flags::builder(Variant::Z80).finish();
        assert!(!can_fast_mul(&flags, 4, 3));
    }

    #[test]
    fn divide_by_one_is_identity() {
        assert_eq!(div_strategy(1, false), Some(DivStrategy::Identity));
    }

    #[test]
    fn divide_by_256_is_byte_swap() {
        assert_eq!(div_strategy(256, false), Some(DivStrategy::ByteSwap));
    }

    #[test]
    fn divide_by_non_power_of_two_has_no_fast_strategy() {
        assert_eq!(div_strategy(6, false), None);
    }

    #[test]
    fn and_with_zero_byte_clears() {
        assert_eq!(and_byte_strategy(0), ByteLogicOp::Clear);
    }

    #[test]
    fn or_with_single_bit_is_a_direct_set() {
        assert_eq!(
            or_byte_strategy(0x10),
            ByteLogicOp::SingleBit { op: "set", bit: 4 }
        );
    }
}
