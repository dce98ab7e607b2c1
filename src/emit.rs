//! The output text stream and the single gateway through which stack-depth
//! tracking happens (spec.md §6 "Output", §9 REDESIGN FLAGS "stack tracking
//! as a capability").
//!
//! No call site anywhere in the pipeline writes `push`/`pop` directly; it
//! goes through [`Emitter::push`]/[`Emitter::pop`]/[`Emitter::adjust_sp`] so
//! the running stack delta in [`crate::frame::FunctionState`] can never drift
//! from the text actually emitted.

use crate::frame::FunctionState;
use std::fmt::Write as _;

/// Output segments, spec.md §6's `.code`/`.data`/`.bss`/`.literal`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Segment {
    Code,
    Data,
    Bss,
    Literal,
}

impl Segment {
    fn directive(self) -> &'static str {
        match self {
            Segment::Code => ".code",
            Segment::Data => ".data",
            Segment::Bss => ".bss",
            Segment::Literal => ".literal",
        }
    }
}

/// Accumulates the textual assembly output for one translation unit.
///
/// A fresh `Emitter` is created per front-end invocation; it owns no
/// process-global state, matching the explicit-context design spec.md §9
/// calls for.
#[derive(Debug, Default)]
pub struct Emitter {
    out: String,
    current_segment: Option<Segment>,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter::default()
    }

    /// The accumulated assembly text.
    pub fn into_text(self) -> String {
        self.out
    }

    pub fn text(&self) -> &str {
        &self.out
    }

    /// Emit a tab-prefixed instruction line. `unreachable` (spec.md 4.3
    /// "Unreachable-code suppression") is checked by the caller, not here:
    /// the Code Selector consults `FunctionState::unreachable` before
    /// calling any `Emitter` method at all, since even label placement
    /// needs to happen through [`Emitter::label`].
    pub fn instr(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.out, "\t{}", line.as_ref());
    }

    /// Emit a function label (`_name:`) and reset per-function tracking.
    pub fn function_label(&mut self, name: &str) {
        let _ = writeln!(self.out, "_{}:", name);
    }

    /// Emit a local branch-target label (`L<n>[suffix]:`).
    pub fn local_label(&mut self, label: crate::symtab::LocalLabel, suffix: &str) {
        let _ = writeln!(self.out, "{}{}:", label, suffix);
    }

    /// Emit a text/string-literal label (`T<n>:`).
    pub fn text_label(&mut self, label: crate::symtab::TextLabel) {
        let _ = writeln!(self.out, "{}:", label);
    }

    /// Switch segments, emitting the directive only when it actually
    /// changes (repeated `.code` directives would be redundant noise).
    pub fn segment(&mut self, seg: Segment) {
        if self.current_segment != Some(seg) {
            let _ = writeln!(self.out, "{}", seg.directive());
            self.current_segment = Some(seg);
        }
    }

    pub fn byte_directive(&mut self, value: u8) {
        let _ = writeln!(self.out, "\t.byte 0x{:02x}", value);
    }

    pub fn word_directive(&mut self, value: u16) {
        let _ = writeln!(self.out, "\t.word 0x{:04x}", value);
    }

    pub fn space_directive(&mut self, bytes: u32) {
        let _ = writeln!(self.out, "\t.ds {}", bytes);
    }

    pub fn export(&mut self, name: &str) {
        let _ = writeln!(self.out, "\t.export _{}", name);
    }

    /// Push a 16-bit register pair, updating `state.stack_delta` by +2 in
    /// the same statement (spec.md §5 "Stack delta discipline").
    pub fn push(&mut self, state: &mut FunctionState, reg: &str) {
        self.instr(format!("push {}", reg));
        state.stack_delta += 2;
    }

    /// Pop a 16-bit register pair, updating `state.stack_delta` by -2.
    pub fn pop(&mut self, state: &mut FunctionState, reg: &str) {
        self.instr(format!("pop {}", reg));
        state.stack_delta -= 2;
    }

    /// Push a 16-bit register pair as fixed frame bookkeeping (a
    /// callee-save spill, or frame allocation) rather than an expression
    /// temporary: does not move `state.stack_delta`. Mirrors
    /// backend-z80.c's `gen_frame`, which sets `sp = 0` only after these
    /// exact pushes have already happened — `sp` tracks operand
    /// temporaries alone (spec.md §5, §9 "stack tracking as a capability").
    pub fn push_untracked(&mut self, reg: impl AsRef<str>) {
        self.instr(format!("push {}", reg.as_ref()));
    }

    /// The untracked counterpart of [`Emitter::pop`], for unwinding a
    /// [`Emitter::push_untracked`] frame-bookkeeping push.
    pub fn pop_untracked(&mut self, reg: impl AsRef<str>) {
        self.instr(format!("pop {}", reg.as_ref()));
    }

    /// Pop into nothing (the stack-adjustment idiom `pop hl` used purely to
    /// deallocate, or `inc sp`/`dec sp` for an odd byte), updating the
    /// tracker by `bytes` in the direction `bytes` indicates (positive
    /// shrinks, i.e. deallocates; negative grows).
    pub fn adjust_sp(&mut self, state: &mut FunctionState, bytes: i32) {
        if bytes == 0 {
            return;
        }
        if bytes > 0 {
            if bytes % 2 == 0 && bytes <= 12 {
                for _ in 0..bytes / 2 {
                    self.instr("pop hl");
                }
            } else {
                self.instr(format!("ld hl,0x{:04x}", bytes as u16));
                self.instr("add hl,sp");
                self.instr("ld sp,hl");
            }
        } else {
            self.instr(format!("ld hl,0x{:04x}", (bytes as i32) as u16));
            self.instr("add hl,sp");
            self.instr("ld sp,hl");
        }
        state.stack_delta -= bytes;
    }
}
