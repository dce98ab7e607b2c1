//! `Node`: one expression-tree node, and `NodeFlags`, the bitset the front
//! end and the Tree Rewriter/Flag Propagator attach to it (spec.md §3).

use super::opcode::Opcode;
use super::types::TypeTag;
use crate::symtab::{SymbolIndex, TextLabel};
use bitflags::bitflags;
use cranelift_entity::EntityRef;

bitflags! {
    /// Per-node annotation bits. Mirrors the ad hoc bit tests on `n->flags`
    /// in backend-z80.c (`bitcheck1`/`bitcheck0` and friends) with names
    /// taken from spec.md §3.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// The node's value is never consumed; a comparison flagged
        /// `NORETURN` needs no boolification at all, just processor flags.
        const NORETURN = 0b0000_0001;
        /// Only the processor's condition flags are needed from this node,
        /// set by the Flag Propagator (spec.md 4.2).
        const CCONLY   = 0b0000_0010;
        /// Like `CCONLY`, but the polarity is pinned and must not be
        /// inverted by a later rewrite (used for the `AND`→bit-test rule).
        const CCFIXED  = 0b0000_0100;
        /// The node is known to already hold a canonical 0/1 boolean.
        const ISBOOL   = 0b0000_1000;
        /// The Code Selector may consume this node straight out of the
        /// processor flags left by its left child, skipping materialisation.
        const USECC    = 0b0001_0000;
    }
}

/// One node of the decorated expression tree described in spec.md §3.
///
/// Children are heap-allocated since the tree is not balanced and depth is
/// unbounded; `Box` keeps a leaf node's size small.
#[derive(Debug, Clone)]
pub struct Node {
    pub op: Opcode,
    pub ty: TypeTag,
    pub left: Option<Box<Node>>,
    pub right: Option<Box<Node>>,
    /// Primary immediate. Widened beyond spec.md's "16-bit" to `u32` so a
    /// 32-bit `Constant` node can carry its full value directly rather than
    /// needing a second node for the high word — the original C `value`
    /// field is likewise wider than 16 bits for this same reason. Most
    /// opcodes only ever look at the low 16 bits.
    pub value: u32,
    /// Secondary immediate: a signed byte offset for `RDeref`/`REq`, or (via
    /// [`Node::label`]) a label number for `LBRef`/`LBStore`.
    pub val2: i32,
    /// Symbol table reference, set on `Name`/`NRef`/`NStore`/`CallName`.
    pub snum: Option<SymbolIndex>,
    pub flags: NodeFlags,
}

impl Node {
    /// Build a leaf node (no children): constants, name/label/local/argument
    /// references, and register-variable references.
    pub fn leaf(op: Opcode, ty: TypeTag) -> Self {
        Node {
            op,
            ty,
            left: None,
            right: None,
            value: 0,
            val2: 0,
            snum: None,
            flags: NodeFlags::empty(),
        }
    }

    /// Build a unary node.
    pub fn unary(op: Opcode, ty: TypeTag, operand: Node) -> Self {
        Node {
            op,
            ty,
            left: Some(Box::new(operand)),
            right: None,
            value: 0,
            val2: 0,
            snum: None,
            flags: NodeFlags::empty(),
        }
    }

    /// Build a binary node.
    pub fn binary(op: Opcode, ty: TypeTag, lhs: Node, rhs: Node) -> Self {
        Node {
            op,
            ty,
            left: Some(Box::new(lhs)),
            right: None,
            value: 0,
            val2: 0,
            snum: None,
            flags: NodeFlags::empty(),
        }
        .with_right(rhs)
    }

    fn with_right(mut self, rhs: Node) -> Self {
        self.right = Some(Box::new(rhs));
        self
    }

    /// `val2` reinterpreted as a [`TextLabel`], for `Label`/`LBRef`/`LBStore`
    /// nodes where the original overloads the same field for a label number
    /// rather than a byte offset.
    pub fn label(&self) -> TextLabel {
        debug_assert!(self.val2 >= 0);
        TextLabel::new(self.val2 as usize)
    }

    /// Is the node's value discarded by its parent? (spec.md §3 `NORETURN`.)
    pub fn is_noreturn(&self) -> bool {
        self.flags.contains(NodeFlags::NORETURN)
    }

    /// Does only a processor flag, not a materialised value, matter here?
    pub fn is_cconly(&self) -> bool {
        self.flags.contains(NodeFlags::CCONLY)
    }

    pub fn left(&self) -> Option<&Node> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&Node> {
        self.right.as_deref()
    }

    /// Swap the two children in place. Used by the Tree Rewriter's
    /// commutative-reorder rule (spec.md 4.1 rule 8).
    pub fn swap_children(&mut self) {
        std::mem::swap(&mut self.left, &mut self.right);
    }
}
