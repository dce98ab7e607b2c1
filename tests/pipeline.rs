//! End-to-end checks of the full five-stage pipeline against the exact
//! instruction sequences named by each scenario: a global constant store,
//! a high-byte bit test, a frame-pointer increment, a zero comparison, a
//! banked direct call, and a constant multiply.

use z80_codegen::frame::{FunctionState, Polarity, RegisterSaveFlags};
use z80_codegen::ir::{BaseType, Node, NodeFlags, Opcode, TypeTag};
use z80_codegen::select::Selector;
use z80_codegen::settings::{FeatureVector, Flags, Variant};
use z80_codegen::symtab::VecSymbolTable;
use z80_codegen::{compile_function, emit::Emitter};

fn leaf(op: Opcode, ty: TypeTag) -> Node {
    Node::leaf(op, ty)
}

#[test]
fn scenario_one_global_byte_store_of_constant() {
    let settings = Flags::builder(Variant::Z80).finish();
    let mut symtab = VecSymbolTable::new();
    let g = symtab.intern("g");

    // Build `g = 5` as the front end would: `Eq(Name(g), Constant(5))`.
    let mut name = leaf(Opcode::Name, TypeTag::pointer_to(BaseType::U8));
    name.snum = Some(g);
    let mut constant = leaf(Opcode::Constant, TypeTag::new(BaseType::U8));
    constant.value = 5;
    let mut store = Node::binary(Opcode::Eq, TypeTag::new(BaseType::U8), name, constant);
    store.flags.insert(NodeFlags::NORETURN);

    let asm = compile_function(
        "f",
        &mut store,
        0,
        RegisterSaveFlags::empty(),
        &settings,
        &symtab,
    )
    .unwrap();

    assert!(asm.contains("ld a,0x5"));
    assert!(asm.contains("ld (_g+0), a"));
}

#[test]
fn scenario_two_bit_test_of_high_byte_inverts_polarity() {
    let settings = Flags::builder(Variant::Z80).finish();
    let symtab = VecSymbolTable::new();
    let mut emit = Emitter::new();
    let mut state = FunctionState::new(0, RegisterSaveFlags::empty());

    // Bit 11 of a u16 value lives in the high byte at bit index 3.
    let mut btst = leaf(Opcode::BTst, TypeTag::new(BaseType::U16));
    btst.value = 11;
    btst.left = Some(Box::new(leaf(Opcode::LRef, TypeTag::new(BaseType::U16))));

    let mut sel = Selector::new(&mut emit, &mut state, &settings, &symtab);
    sel.select_tree(&btst).unwrap();

    assert!(emit.text().contains("bit 3,h"));
    assert_eq!(state.take_polarity().unwrap(), Polarity::TrueWhenZero);
}

#[test]
fn scenario_three_frame_pointer_increment() {
    let settings = Flags::builder(Variant::Z80).finish();
    let symtab = VecSymbolTable::new();
    let mut emit = Emitter::new();
    // A large frame claims iy as the frame pointer (spec.md 4.4).
    let mut state = z80_codegen::frame::prologue(&mut emit, &settings, 20, RegisterSaveFlags::empty());
    assert!(state.use_fp);
    emit = Emitter::new(); // discard the prologue text, isolate the increment

    let mut target = leaf(Opcode::LRef, TypeTag::new(BaseType::U8));
    target.value = 4;
    let mut one = leaf(Opcode::Constant, TypeTag::new(BaseType::U8));
    one.value = 1;
    let mut incr = Node::binary(Opcode::PlusEq, TypeTag::new(BaseType::U8), target, one);
    incr.flags.insert(NodeFlags::NORETURN);

    let mut sel = Selector::new(&mut emit, &mut state, &settings, &symtab);
    sel.select_tree(&incr).unwrap();

    assert_eq!(emit.text().trim(), "inc (iy + 4)");
}

#[test]
fn scenario_four_sixteen_bit_zero_comparison() {
    let settings = Flags::builder(Variant::Z80).finish();
    let symtab = VecSymbolTable::new();
    let mut emit = Emitter::new();
    // Put the compared local behind the frame pointer so its own load is a
    // single deterministic pair of instructions, not the stack-top peek
    // shortcut (which would also fire at offset zero).
    let mut state = FunctionState::new(0, RegisterSaveFlags::empty());
    state.use_fp = true;

    let mut lhs = leaf(Opcode::LRef, TypeTag::new(BaseType::I16));
    lhs.value = 4;
    let mut zero = leaf(Opcode::Constant, TypeTag::new(BaseType::I16));
    zero.value = 0;
    let mut cmp = Node::binary(Opcode::EqEq, TypeTag::new(BaseType::I16), lhs, zero);
    cmp.flags.insert(NodeFlags::CCONLY);

    let mut sel = Selector::new(&mut emit, &mut state, &settings, &symtab);
    sel.select_tree(&cmp).unwrap();

    let lines: Vec<&str> = emit.text().lines().map(str::trim).collect();
    assert_eq!(
        lines,
        vec!["ld l,(iy + 4)", "ld h,(iy + 5)", "ld a,h", "or l"]
    );
    assert_eq!(state.take_polarity().unwrap(), Polarity::TrueWhenZero);
}

#[test]
fn scenario_five_banked_call_by_name_saves_af() {
    let settings = Flags::builder(Variant::Z80)
        .set_feature(FeatureVector::BANKED, true)
        .finish();
    let mut symtab = VecSymbolTable::new();
    let f = symtab.intern("callee");
    let mut emit = Emitter::new();
    let mut state = FunctionState::new(0, RegisterSaveFlags::empty());

    let mut call = leaf(Opcode::CallName, TypeTag::VOID);
    call.snum = Some(f);

    let mut sel = Selector::new(&mut emit, &mut state, &settings, &symtab);
    sel.select_tree(&call).unwrap();

    let lines: Vec<&str> = emit.text().lines().map(str::trim).collect();
    assert_eq!(lines, vec!["push af", "call _callee+0", "pop af"]);
}

#[test]
fn scenario_six_multiply_by_six_inline() {
    let settings = Flags::builder(Variant::Z80).finish();
    let symtab = VecSymbolTable::new();
    let mut emit = Emitter::new();
    let mut state = FunctionState::new(0, RegisterSaveFlags::empty());
    // As in scenario four, put the left operand behind the frame pointer so
    // loading it is a deterministic pair of instructions rather than the
    // stack-top peek shortcut, isolating the canonical multiply sequence
    // that follows it.
    state.use_fp = true;

    let mut lhs = leaf(Opcode::LRef, TypeTag::new(BaseType::I16));
    lhs.value = 4;
    let mut six = leaf(Opcode::Constant, TypeTag::new(BaseType::I16));
    six.value = 6;
    let mul = Node::binary(Opcode::Star, TypeTag::new(BaseType::I16), lhs, six);

    let mut sel = Selector::new(&mut emit, &mut state, &settings, &symtab);
    sel.select_tree(&mul).unwrap();

    let lines: Vec<&str> = emit.text().lines().map(str::trim).collect();
    assert_eq!(
        lines,
        vec![
            "ld l,(iy + 4)",
            "ld h,(iy + 5)",
            "add hl,hl",
            "push hl",
            "add hl,hl",
            "pop de",
            "add hl,de"
        ]
    );
    assert_eq!(state.stack_delta, 0);
}
