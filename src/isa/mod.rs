//! Register-variable model: the small, fixed set of callee-save registers a
//! function may dedicate to a C-level variable for its lifetime (spec.md §3
//! "Register-variable").
//!
//! Grounded on `src/isa/call_conv.rs`'s enum-plus-`Display` shape; the
//! register-allocation problem itself is nothing like cranelift's SSA
//! coloring (see DESIGN.md), so only the naming convention is kept.

use std::fmt;

/// One of the three registers the front end may dedicate to a C variable
/// for the lifetime of a function.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegisterVar {
    /// The dedicated byte-pointer register variable. Can only address
    /// offset zero when used as a pointer (spec.md 4.1 rule 2); its byte
    /// halves (`b`/`c`) get special-cased save/restore shortcuts
    /// (`ld l,c` instead of `push`/`pop`) in the Code Selector.
    Bc,
    /// An index register used as a pointer, with a wide signed-offset
    /// addressing range.
    Ix,
    /// The other index register, used as a pointer the same way as `Ix`
    /// unless the function has claimed it as the frame pointer.
    Iy,
}

impl RegisterVar {
    /// Decode the small integer code the Tree Rewriter folds into
    /// `Node::value` for `Reg`/`RRef`/`RStore`/`RDeref`/`REq` nodes
    /// (`0` = `bc`, `1` = `ix`, `2` = `iy`).
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => RegisterVar::Bc,
            1 => RegisterVar::Ix,
            _ => RegisterVar::Iy,
        }
    }

    /// The inclusive offset range this register can address as a pointer
    /// when dereferenced (spec.md 4.1 rule 2).
    pub fn offset_range(self) -> std::ops::RangeInclusive<i32> {
        match self {
            RegisterVar::Bc => 0..=0,
            RegisterVar::Ix | RegisterVar::Iy => -128..=124,
        }
    }

    /// Is `offset` within this register's addressable range?
    pub fn can_address(self, offset: i32) -> bool {
        self.offset_range().contains(&offset)
    }

    /// The assembler's 16-bit register name.
    pub fn name(self) -> &'static str {
        match self {
            RegisterVar::Bc => "bc",
            RegisterVar::Ix => "ix",
            RegisterVar::Iy => "iy",
        }
    }

    /// High/low 8-bit half names, used by the byte-wise save/restore
    /// shortcuts (`ld l,c`/`ld c,l` for `bc`; `ixh`/`ixl` etc. otherwise).
    pub fn halves(self) -> (&'static str, &'static str) {
        match self {
            RegisterVar::Bc => ("b", "c"),
            RegisterVar::Ix => ("ixh", "ixl"),
            RegisterVar::Iy => ("iyh", "iyl"),
        }
    }

    /// True for `Bc`, which takes the `ld l,c` / `ld c,l` shortcut instead
    /// of a push/pop round trip when saved and restored around a call.
    pub fn has_accumulator_shortcut(self) -> bool {
        matches!(self, RegisterVar::Bc)
    }
}

impl fmt::Display for RegisterVar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bc_only_addresses_offset_zero() {
        assert!(RegisterVar::Bc.can_address(0));
        assert!(!RegisterVar::Bc.can_address(1));
        assert!(!RegisterVar::Bc.can_address(-1));
    }

    #[test]
    fn index_registers_cover_the_signed_byte_range() {
        assert!(RegisterVar::Ix.can_address(-128));
        assert!(RegisterVar::Ix.can_address(124));
        assert!(!RegisterVar::Ix.can_address(125));
        assert!(!RegisterVar::Iy.can_address(-129));
    }

    #[test]
    fn only_bc_has_the_accumulator_shortcut() {
        assert!(RegisterVar::Bc.has_accumulator_shortcut());
        assert!(!RegisterVar::Ix.has_accumulator_shortcut());
    }
}
