//! Frame/Stack Tracker (spec.md 4.4) and the per-function mutable state it
//! owns (spec.md §3 "Function state").
//!
//! Grounded on `gen_frame`/`gen_prologue`/`gen_epilogue`/`generate_lref` in
//! backend-z80.c. The original keeps this as a handful of file-scope
//! globals (`sp`, `argbase`, `ccflags`, `func_cleanup`...); per spec.md §9
//! REDESIGN FLAGS we thread it explicitly as `FunctionState` instead, so the
//! pipeline can run concurrently over more than one function.

use bitflags::bitflags;
use log::{debug, trace};

use crate::emit::Emitter;
use crate::error::CodegenError;
use crate::isa::RegisterVar;
use crate::settings::Flags;

bitflags! {
    /// Which callee-save registers this function touches as register
    /// variables, decided once at the start of code generation and
    /// consulted by the prologue/epilogue.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct RegisterSaveFlags: u8 {
        const BC = 0b001;
        const IX = 0b010;
        const IY = 0b100;
    }
}

impl RegisterSaveFlags {
    fn for_var(var: RegisterVar) -> Self {
        match var {
            RegisterVar::Bc => RegisterSaveFlags::BC,
            RegisterVar::Ix => RegisterSaveFlags::IX,
            RegisterVar::Iy => RegisterSaveFlags::IY,
        }
    }

    /// Iterate the registers set, in the fixed push order the prologue uses
    /// (`bc`, `ix`, `iy`).
    pub fn iter_in_push_order(self) -> impl Iterator<Item = RegisterVar> {
        [RegisterVar::Bc, RegisterVar::Ix, RegisterVar::Iy]
            .iter()
            .copied()
            .filter(move |v| self.contains(Self::for_var(*v)))
    }
}

/// Which jump mnemonic represents "branch taken" for the condition code
/// currently pending in flags (spec.md §3 "condition-code polarity").
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Polarity {
    /// The branch should be taken when the zero flag is set.
    TrueWhenZero,
    /// The branch should be taken when the zero flag is clear.
    TrueWhenNonZero,
}

impl Polarity {
    /// Default polarity after a flag is freshly produced and not yet
    /// inverted by any rewrite.
    pub fn normal() -> Self {
        Polarity::TrueWhenNonZero
    }

    /// Swap sense, used when the code selector can fold a logical negation
    /// into the branch instead of materialising a boolean (spec.md 4.3).
    /// Forbidden when the node carries `CCFIXED` (spec.md 4.2).
    pub fn inverted(self) -> Self {
        match self {
            Polarity::TrueWhenZero => Polarity::TrueWhenNonZero,
            Polarity::TrueWhenNonZero => Polarity::TrueWhenZero,
        }
    }

    /// Mnemonic `gen_jtrue` should emit for "jump if the tested condition
    /// holds".
    pub fn jump_if_true(self) -> &'static str {
        match self {
            Polarity::TrueWhenZero => "jp z,",
            Polarity::TrueWhenNonZero => "jp nz,",
        }
    }

    /// Mnemonic `gen_jfalse` should emit for "jump if the tested condition
    /// does not hold".
    pub fn jump_if_false(self) -> &'static str {
        self.inverted().jump_if_true()
    }
}

/// Per-function mutable state (spec.md §3 "Function state"). A fresh value
/// is created per function; nothing here is global.
#[derive(Debug, Clone)]
pub struct FunctionState {
    /// Stack frame length in bytes, fixed for the function's lifetime.
    pub frame_len: u32,
    /// Bytes currently pushed above the prologue baseline. The primary test
    /// oracle (spec.md §5): must be zero exactly at the epilogue.
    pub stack_delta: i32,
    /// Offset from the frame pointer/stack pointer to the first argument,
    /// accounting for register-save pushes and (in banked mode) the extra
    /// return-bank slot.
    pub arg_base: i32,
    /// Set once the prologue decides to dedicate `iy` as a frame pointer.
    pub use_fp: bool,
    /// False once the only live exit is a single bare `ret` with nothing to
    /// clean up (spec.md 4.3 `gen_exit` "shortcut return").
    pub needs_cleanup: bool,
    /// Set after an unconditional transfer of control; cleared by the next
    /// label placement. Suppresses further emission (spec.md 4.3
    /// "Unreachable-code suppression").
    pub unreachable: bool,
    /// Which callee-save registers this function uses as register
    /// variables.
    pub reg_save: RegisterSaveFlags,
    /// The condition-code polarity pending in flags, if any has been
    /// produced and not yet consumed.
    pub polarity: Option<Polarity>,
}

impl FunctionState {
    pub fn new(frame_len: u32, reg_save: RegisterSaveFlags) -> Self {
        FunctionState {
            frame_len,
            stack_delta: 0,
            arg_base: 0,
            use_fp: false,
            needs_cleanup: true,
            unreachable: false,
            reg_save,
            polarity: None,
        }
    }

    /// Record a freshly produced condition code, overwriting any stale one.
    pub fn set_polarity(&mut self, p: Polarity) {
        self.polarity = Some(p);
    }

    /// Consume the pending polarity for `gen_jtrue`/`gen_jfalse`, resetting
    /// it to `None` (spec.md 4.3: "After emission the polarity is reset to
    /// the default."). Errors with the `"ccf"` tag if none is pending.
    pub fn take_polarity(&mut self) -> Result<Polarity, CodegenError> {
        self.polarity.take().ok_or_else(CodegenError::stale_condition_code)
    }

    /// Clear the unreachable flag; called when a label is placed.
    pub fn clear_unreachable(&mut self) {
        self.unreachable = false;
    }
}

/// Threshold (in bytes) above which the prologue/epilogue use a
/// register-arithmetic frame-allocation sequence instead of a push-per-word
/// loop (spec.md 4.4).
const ARITHMETIC_FRAME_THRESHOLD: u32 = 10;

/// `ARGBASE` in backend-z80.c: the fixed cost (in bytes) of the return
/// address pushed by `call`, before any register saves are counted.
const RETURN_ADDRESS_BYTES: i32 = 2;

/// Emit the function prologue and return the initialised [`FunctionState`].
///
/// `frame_len` is the number of bytes of local-variable storage the
/// function needs; `reg_save` is the set of register variables it will use.
pub fn prologue(
    emit: &mut Emitter,
    flags: &Flags,
    frame_len: u32,
    reg_save: RegisterSaveFlags,
) -> FunctionState {
    let mut state = FunctionState::new(frame_len, reg_save);
    state.arg_base = RETURN_ADDRESS_BYTES;
    if flags.features().contains(crate::settings::FeatureVector::BANKED) {
        state.arg_base += 2;
    }

    for var in reg_save.iter_in_push_order() {
        emit.push_untracked(var.name());
        state.arg_base += 2;
    }

    if frame_len > 0 {
        let use_fp = !reg_save.contains(RegisterSaveFlags::IY)
            && frame_len > 4
            && !flags.prefer_size();
        if use_fp {
            debug!("prologue: using iy as frame pointer, frame_len={}", frame_len);
            emit.push_untracked("iy");
            emit.instr(format!("ld iy,-{} ; frame", frame_len));
            emit.instr("add iy,sp");
            emit.instr("ld sp,iy");
            state.use_fp = true;
        } else if frame_len > ARITHMETIC_FRAME_THRESHOLD {
            trace!("prologue: arithmetic frame allocation, frame_len={}", frame_len);
            emit.instr(format!("ld hl,-{}", frame_len));
            emit.instr("add hl,sp");
            emit.instr("ld sp,hl");
        } else {
            trace!("prologue: push-per-word frame allocation, frame_len={}", frame_len);
            for _ in 0..frame_len / 2 {
                emit.instr("push hl ; frame");
            }
            if frame_len % 2 == 1 {
                emit.instr("dec sp");
            }
        }
    }

    state
}

/// Emit the function epilogue. Errors with [`CodegenError::unbalanced_stack`]
/// if `state.stack_delta` is non-zero (spec.md 4.4).
pub fn epilogue(emit: &mut Emitter, state: &mut FunctionState) -> Result<(), CodegenError> {
    if state.stack_delta != 0 {
        return Err(CodegenError::unbalanced_stack());
    }
    if state.use_fp {
        emit.instr("ld sp,iy");
        emit.pop_untracked("iy");
    } else if state.frame_len > ARITHMETIC_FRAME_THRESHOLD {
        emit.instr(format!("ld hl,{}", state.frame_len));
        emit.instr("add hl,sp");
        emit.instr("ld sp,hl");
    } else {
        for _ in 0..state.frame_len / 2 {
            emit.pop_untracked("hl");
        }
        if state.frame_len % 2 == 1 {
            emit.instr("inc sp");
        }
    }

    for var in state.reg_save.iter_in_push_order().collect::<Vec<_>>().into_iter().rev() {
        emit.pop_untracked(var.name());
    }

    if !state.unreachable {
        emit.instr("ret");
    }
    Ok(())
}

/// Deallocate `bytes` of already-pushed call arguments after a call returns
/// (spec.md 4.4 "Call-site cleanup").
pub fn call_cleanup(emit: &mut Emitter, state: &mut FunctionState, bytes: u32) {
    if bytes == 0 {
        return;
    }
    emit.adjust_sp(state, bytes as i32);
}

/// The five local-access strategies `generate_lref`/`generate_lref_a` choose
/// between (SPEC_FULL.md "SUPPLEMENTED FEATURES").
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocalAccess {
    /// Offset zero, top of stack: a plain `pop`/`push` suffices.
    StackTop,
    /// Frame-pointer-relative load/store via `iy`.
    FramePointer,
    /// Inline `ld hl,n` / `add hl,sp` then dereference `hl`.
    InlineStackRelative,
    /// Helper call with the offset folded into the helper's mnemonic
    /// (`<LWDIRECT`, i.e. below the numeric-suffix threshold).
    HelperNumericSuffix,
    /// Helper call with the offset passed as a byte follower operand
    /// (offset magnitude below 253).
    HelperByteFollower,
    /// Helper call with the offset passed as a 16-bit follower operand.
    HelperWordFollower,
}

/// `LWDIRECT` in backend-z80.c: offsets below this are folded straight into
/// the helper name as a numeric suffix instead of being passed as an
/// operand.
const LWDIRECT: i32 = 24;

/// Offsets with an absolute value below this fit the byte-follower helper
/// encoding; larger ones need the word-follower form.
const BYTE_FOLLOWER_LIMIT: i32 = 253;

/// Choose a [`LocalAccess`] strategy for a local/argument reference at
/// `offset` bytes from the frame base, consulting the CPU's feature vector.
pub fn choose_local_access(
    flags: &Flags,
    state: &FunctionState,
    offset: i32,
) -> LocalAccess {
    use crate::settings::FeatureVector;

    if offset == 0 && state.stack_delta == 0 {
        return LocalAccess::StackTop;
    }
    if state.use_fp {
        return LocalAccess::FramePointer;
    }
    if flags.features().contains(FeatureVector::STACK_WORD_LOAD) {
        return LocalAccess::InlineStackRelative;
    }
    if offset.unsigned_abs() < LWDIRECT as u32 {
        LocalAccess::HelperNumericSuffix
    } else if offset.unsigned_abs() < BYTE_FOLLOWER_LIMIT as u32 {
        LocalAccess::HelperByteFollower
    } else {
        LocalAccess::HelperWordFollower
    }
}
