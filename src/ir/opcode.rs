//! The closed operator set described in spec.md §3 "IR node".
//!
//! Opcodes partition into a *generic* set produced by the front end and a
//! *synthetic* set introduced by the Tree Rewriter (spec.md 4.1) and Flag
//! Propagator (spec.md 4.2, the bit-test special case). Once a synthetic
//! opcode appears it never reverts to its generic form (spec.md §3
//! invariants), and the Code Selector must have an emitter for every
//! synthetic opcode it can produce.

/// One IR node operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    // --- generic: leaves -------------------------------------------------
    /// An integer, float, or pointer constant in `Node::value`/`val2`.
    Constant,
    /// Address of a named global/static (`_name`).
    Name,
    /// Address of a literal or local-static label (`T<n>`).
    Label,
    /// Address of a local variable, frame-relative.
    Local,
    /// Address of a function argument, frame-relative.
    Argument,
    /// Reference to a register-variable (`bc`/`ix`/`iy`), pre-rewrite.
    Reg,

    // --- generic: loads/stores/derefs ------------------------------------
    /// `*ptr`
    Deref,
    /// `lhs = rhs`
    Eq,

    // --- generic: arithmetic ----------------------------------------------
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Hat,
    /// `<<`
    LtLt,
    /// `>>`
    GtGt,

    // --- generic: comparisons ----------------------------------------------
    /// `==`
    EqEq,
    /// `!=`
    BangEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,

    // --- generic: logical ---------------------------------------------------
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// Explicit boolification (`!!x`): normalise any nonzero value to 1.
    Bool,

    // --- generic: casts, increments, calls ----------------------------------
    /// A type cast.
    Cast,
    /// `x++`
    PlusPlus,
    /// `x--`
    MinusMinus,
    /// `+=`
    PlusEq,
    /// `-=`
    MinusEq,
    /// `*=`
    StarEq,
    /// `/=`
    SlashEq,
    /// `%=`
    PercentEq,
    /// `&=`
    AndEq,
    /// `|=`
    OrEq,
    /// `^=`
    HatEq,
    /// `<<=`
    ShlEq,
    /// `>>=`
    ShrEq,
    /// An indirect function call through a pointer value.
    FuncCall,
    /// `a, b` — evaluate `a` for side effects, discard, yield `b`.
    Comma,
    /// One comma-separated argument in a call's argument list; left stacked,
    /// the call node itself cleans up (see `Node::op != T_ARGCOMMA` guard in
    /// backend-z80.c's `gen_node`).
    ArgComma,
    /// Deallocate `value` bytes of already-pushed call arguments.
    Cleanup,

    // --- synthetic: introduced by the Tree Rewriter (spec.md 4.1) -----------
    /// Load of a named global/static, `(_name+off)`.
    NRef,
    /// Store to a named global/static.
    NStore,
    /// Load of a literal/local-static label, `(T<n>+off)`.
    LBRef,
    /// Store to a literal/local-static label.
    LBStore,
    /// Load of a local variable or argument, frame-relative.
    LRef,
    /// Store to a local variable or argument, frame-relative.
    LStore,
    /// Load of a register-variable's value.
    RRef,
    /// Store to a register-variable.
    RStore,
    /// `*(regvar + val2)`, offset dereference through a register-variable.
    RDeref,
    /// `*(regvar + val2) = rhs`
    REq,
    /// Direct call to a named function (`call _name`).
    CallName,

    // --- synthetic: introduced by the Flag Propagator (spec.md 4.2) --------
    /// Bit test: `(value & (1 << Node::value)) != 0`, producible directly in
    /// processor flags.
    BTst,
    /// `cast-to-u8(lhs) == value` shortcut (spec.md 4.1 rule 1).
    ByteEq,
    /// `cast-to-u8(lhs) != value` shortcut (spec.md 4.1 rule 1).
    ByteNe,
}

impl Opcode {
    /// True for opcodes only the Tree Rewriter or Flag Propagator can
    /// introduce. spec.md §3: "Synthetic opcodes introduced by the
    /// rewriter never reappear in their generic form."
    pub fn is_synthetic(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            NRef | NStore
                | LBRef
                | LBStore
                | LRef
                | LStore
                | RRef
                | RStore
                | RDeref
                | REq
                | CallName
                | BTst
                | ByteEq
                | ByteNe
        )
    }

    /// True for the binary comparison operators (`==`, `!=`, `<`, `<=`,
    /// `>`, `>=`), which the Code Selector lowers through `gen_compc`
    /// (backend-z80.c) / [`crate::select::arith::compare`].
    pub fn is_comparison(self) -> bool {
        use Opcode::*;
        matches!(self, EqEq | BangEq | Lt | LtEq | Gt | GtEq)
    }

    /// True for the compound-assignment family (`+=`, `-=`, ...), which
    /// share a left-hand-side-is-an-address emission shape.
    pub fn is_compound_assign(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            PlusEq | MinusEq | StarEq | SlashEq | PercentEq | AndEq | OrEq | HatEq | ShlEq
                | ShrEq
        )
    }

    /// True for the commutative binary operators the rewriter may swap
    /// operands of (spec.md 4.1 rule 8).
    pub fn is_commutative(self) -> bool {
        use Opcode::*;
        matches!(self, And | Or | Hat | Star | Plus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_opcodes_are_closed() {
        assert!(Opcode::NRef.is_synthetic());
        assert!(Opcode::BTst.is_synthetic());
        assert!(!Opcode::Plus.is_synthetic());
        assert!(!Opcode::Constant.is_synthetic());
    }

    #[test]
    fn commutative_set_matches_rewriter_rule_eight() {
        for op in [Opcode::And, Opcode::Or, Opcode::Hat, Opcode::Star, Opcode::Plus] {
            assert!(op.is_commutative());
        }
        assert!(!Opcode::Minus.is_commutative());
    }
}
