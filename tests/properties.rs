//! Property-based invariants from spec.md §8 ("Boundary behaviours") and §5
//! ("Stack delta discipline"), checked against arbitrary inputs rather than
//! fixed scenarios.

use proptest::prelude::*;

use z80_codegen::frame::{
    choose_local_access, epilogue, prologue, FunctionState, LocalAccess, Polarity,
    RegisterSaveFlags,
};
use z80_codegen::ir::{BaseType, Node, Opcode, TypeTag};
use z80_codegen::rewrite::rewrite;
use z80_codegen::select::arith;
use z80_codegen::settings::{Flags, Variant};

/// spec.md §5: "the tracker reflects the true stack pointer offset from the
/// prologue baseline" — for any frame length and register-save combination,
/// a prologue followed immediately by an epilogue must leave `stack_delta`
/// at zero and must not error.
proptest! {
    #[test]
    fn prologue_epilogue_round_trip_balances_the_stack(
        frame_len in 0u32..4096,
        bc in any::<bool>(),
        ix in any::<bool>(),
        iy in any::<bool>(),
        prefer_size in any::<bool>(),
    ) {
        let mut reg_save = RegisterSaveFlags::empty();
        if bc { reg_save |= RegisterSaveFlags::BC; }
        if ix { reg_save |= RegisterSaveFlags::IX; }
        if iy { reg_save |= RegisterSaveFlags::IY; }

        let flags = Flags::builder(Variant::Z80).prefer_size(prefer_size).finish();
        let mut emit = z80_codegen::emit::Emitter::new();
        let mut state = prologue(&mut emit, &flags, frame_len, reg_save);
        epilogue(&mut emit, &mut state).unwrap();
        prop_assert_eq!(state.stack_delta, 0);
    }
}

/// spec.md 4.4: a frame pointer is claimed only when `iy` is free, the
/// frame is large enough to be worth it, and the build isn't optimising for
/// size — never any other combination.
proptest! {
    #[test]
    fn frame_pointer_is_claimed_only_under_its_exact_conditions(
        frame_len in 0u32..64,
        iy_taken in any::<bool>(),
        prefer_size in any::<bool>(),
    ) {
        let reg_save = if iy_taken { RegisterSaveFlags::IY } else { RegisterSaveFlags::empty() };
        let flags = Flags::builder(Variant::Z80).prefer_size(prefer_size).finish();
        let mut emit = z80_codegen::emit::Emitter::new();
        let state = prologue(&mut emit, &flags, frame_len, reg_save);

        let expected = !iy_taken && frame_len > 4 && !prefer_size;
        prop_assert_eq!(state.use_fp, expected);
    }
}

/// spec.md "Boundary behaviours": offsets either side of the helper
/// thresholds must land in the adjacent `LocalAccess` bucket, and a
/// function using the frame pointer always resolves locals through it
/// regardless of offset.
proptest! {
    #[test]
    fn local_access_ladder_is_monotone_in_offset_magnitude(offset in -4000i32..4000) {
        let flags = Flags::builder(Variant::Z80).finish();
        let mut state = FunctionState::new(0, RegisterSaveFlags::empty());
        state.stack_delta = 1; // disable the offset-zero stack-top shortcut
        let access = choose_local_access(&flags, &state, offset);
        let magnitude = offset.unsigned_abs();
        let expected = if magnitude < 24 {
            LocalAccess::HelperNumericSuffix
        } else if magnitude < 253 {
            LocalAccess::HelperByteFollower
        } else {
            LocalAccess::HelperWordFollower
        };
        prop_assert_eq!(access, expected);

        state.use_fp = true;
        prop_assert_eq!(choose_local_access(&flags, &state, offset), LocalAccess::FramePointer);
    }
}

/// spec.md 4.3 "Multiplication by 0, 1, 2, 256, 257": the fast-multiply
/// decision must accept every constant whose bit-processing cost is within
/// budget, and the budget must only ever grow with optimisation level.
proptest! {
    #[test]
    fn fast_mul_budget_is_monotone_in_opt_level(k in 0u16..=1024, opt_level in 0u8..=3) {
        let low = Flags::builder(Variant::Z80).opt_level(0).finish();
        let high = Flags::builder(Variant::Z80).opt_level(opt_level).finish();
        let low_ok = arith::can_fast_mul(&low, 2, k);
        let high_ok = arith::can_fast_mul(&high, 2, k);
        // Raising the opt level can only ever make more constants eligible.
        prop_assert!(!low_ok || high_ok);
    }

    #[test]
    fn fast_mul_cost_of_one_is_free(_unused in any::<bool>()) {
        // `k == 1` is the caller's no-op case (spec.md "Multiplication by
        // 0, 1, 2..."): the bit-processing loop never runs past the
        // implicit leading one.
        prop_assert_eq!(arith::count_mul_cost(1), 0);
    }

    #[test]
    fn fast_mul_cost_is_bounded_by_width(k in 1u16..=u16::MAX) {
        // At most one `add hl,hl` (cost 1) and one `push`/`pop` pair (cost
        // 3) per remaining bit (16 of them), plus the fixed 3-instruction
        // byte-swap pre-shift.
        prop_assert!(arith::count_mul_cost(k) <= 3 + 4 * 16);
    }
}

/// spec.md 4.1 rule 6: cast elision must preserve the destination type's
/// width whenever the source and destination already agree on width (the
/// case the rule actually fires on).
proptest! {
    #[test]
    fn cast_elision_preserves_width_when_widths_already_agree(
        src_is_u8 in any::<bool>(),
        dst_is_u8 in any::<bool>(),
    ) {
        prop_assume!(src_is_u8 == dst_is_u8);
        let src_ty = if src_is_u8 { TypeTag::new(BaseType::U8) } else { TypeTag::new(BaseType::U16) };
        let dst_ty = if dst_is_u8 { TypeTag::new(BaseType::U8) } else { TypeTag::new(BaseType::U16) };

        let operand = Node::leaf(Opcode::Name, src_ty);
        let mut cast = Node::unary(Opcode::Cast, dst_ty, operand);
        let state = FunctionState::new(0, RegisterSaveFlags::empty());
        rewrite(&mut cast, &state);

        prop_assert_eq!(cast.op, Opcode::Name);
        prop_assert_eq!(cast.ty.base_width_class(), dst_ty.base_width_class());
    }
}

/// spec.md 4.1: the rewriter is applied bottom-up exactly once per node,
/// but running it a second time over its own output must be a no-op — no
/// rule should find new work in a tree it already normalised.
proptest! {
    #[test]
    fn rewriter_is_idempotent_on_its_own_output(src_is_u8 in any::<bool>(), k in 0u32..255) {
        let ty = if src_is_u8 { TypeTag::new(BaseType::U8) } else { TypeTag::new(BaseType::U16) };
        let operand = Node::leaf(Opcode::Name, ty);
        let mut cast = Node::unary(Opcode::Cast, ty, operand);
        let mut constant = Node::leaf(Opcode::Constant, TypeTag::new(BaseType::U8));
        constant.value = k;
        let mut tree = Node::binary(Opcode::EqEq, TypeTag::new(BaseType::U8), cast, constant);

        let state = FunctionState::new(0, RegisterSaveFlags::empty());
        rewrite(&mut tree, &state);
        let once = format!("{:?}", tree);
        rewrite(&mut tree, &state);
        let twice = format!("{:?}", tree);
        prop_assert_eq!(once, twice);
    }
}

/// spec.md §9 Open Questions: the commutative-reorder heuristic's exact
/// scores are an implementation choice; the only contract is that after
/// reorder, the right operand scores no lower than the left, for every
/// opcode pair the rewriter assigns a score to (DESIGN.md "Open Question
/// decisions").
fn score_group(op: Opcode) -> i32 {
    use Opcode::*;
    match op {
        Constant | Label | Name | Reg => 2,
        NRef | LBRef => 1,
        RRef | RDeref => 0,
        _ => -1,
    }
}

fn simple_leaf(op: Opcode) -> Node {
    let ty = TypeTag::new(BaseType::U16);
    let mut n = Node::leaf(op, ty);
    if op == Opcode::Constant {
        n.value = 1;
    }
    n
}

proptest! {
    #[test]
    fn commutative_reorder_never_leaves_the_left_operand_simpler(
        left_idx in 0usize..7,
        right_idx in 0usize..7,
    ) {
        let scored = [
            Opcode::Constant, Opcode::Label, Opcode::Name, Opcode::Reg,
            Opcode::NRef, Opcode::LBRef, Opcode::RRef,
        ];
        let left = simple_leaf(scored[left_idx]);
        let right = simple_leaf(scored[right_idx]);
        // `And` (unlike `Plus`) has no other rewrite rule that would
        // restructure the node before rule 8 runs, keeping this test
        // isolated to the reorder heuristic alone.
        let mut tree = Node::binary(Opcode::And, TypeTag::new(BaseType::U16), left, right);
        let state = FunctionState::new(0, RegisterSaveFlags::empty());
        rewrite(&mut tree, &state);

        let l = tree.left().unwrap();
        let r = tree.right().unwrap();
        prop_assert!(score_group(l.op) <= score_group(r.op));
    }
}

/// spec.md: "Polarity... each comparison returns a (flag-state, polarity)
/// pair". Inverting twice must return to the original, and a value can
/// never be consumed more than once without being re-set.
proptest! {
    #[test]
    fn polarity_inversion_is_its_own_inverse(start_at_zero in any::<bool>()) {
        let start = if start_at_zero { Polarity::TrueWhenZero } else { Polarity::TrueWhenNonZero };
        prop_assert_eq!(start.inverted().inverted(), start);

        let mut state = FunctionState::new(0, RegisterSaveFlags::empty());
        state.set_polarity(start);
        let taken = state.take_polarity().unwrap();
        prop_assert_eq!(taken, start);
        prop_assert!(state.take_polarity().is_err());
    }
}

/// spec.md 4.3 "Unreachable-code suppression": once a function state is
/// marked unreachable, placing a label is the only thing that can clear it.
proptest! {
    #[test]
    fn unreachable_flag_only_clears_via_label_placement(initially_unreachable in any::<bool>()) {
        let mut state = FunctionState::new(0, RegisterSaveFlags::empty());
        state.unreachable = initially_unreachable;
        state.clear_unreachable();
        prop_assert!(!state.unreachable);
    }
}
