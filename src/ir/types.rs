//! The primitive type tag carried by every IR node.
//!
//! spec.md §3 "Type tag": "A small fixed enumeration of primitive types:
//! signed/unsigned 8-bit, signed/unsigned 16-bit, signed/unsigned 32-bit,
//! signed/unsigned 64-bit, 32-bit float, 64-bit double, void. A flag bit
//! distinguishes pointer types; a pointer's size is always 16-bit."

use std::fmt;

/// Signedness/kind of a primitive type, independent of whether it is
/// behind a pointer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BaseType {
    /// `void`
    Void,
    /// `signed char`
    I8,
    /// `unsigned char`
    U8,
    /// `short`
    I16,
    /// `unsigned short`
    U16,
    /// `long`
    I32,
    /// `unsigned long`
    U32,
    /// `long long`
    I64,
    /// `unsigned long long`
    U64,
    /// `float`
    F32,
    /// `double`
    F64,
}

/// A primitive type tag: a [`BaseType`] plus a pointer bit.
///
/// "The sign bit may be stripped to compare 'base types'" (spec.md §3) is
/// [`TypeTag::base`]; pointers are always 16-bit regardless of what they
/// point to, so [`TypeTag::size`] never inspects `base` when `is_pointer`
/// is set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeTag {
    base: BaseType,
    is_pointer: bool,
}

impl TypeTag {
    /// Construct a non-pointer type tag.
    pub const fn new(base: BaseType) -> Self {
        TypeTag {
            base,
            is_pointer: false,
        }
    }

    /// Construct the pointer-to-`base` version of a type tag. Per spec.md
    /// §3 a pointer's own size is always 16-bit no matter what `base` is;
    /// `base` here only records what it points to, for type-compatibility
    /// checks in the rewriter (spec.md 4.1 rule 2's `type_compatible`).
    pub const fn pointer_to(base: BaseType) -> Self {
        TypeTag {
            base,
            is_pointer: true,
        }
    }

    /// `void`, used for functions that return nothing.
    pub const VOID: TypeTag = TypeTag::new(BaseType::Void);

    /// Is this a pointer type?
    pub fn is_pointer(self) -> bool {
        self.is_pointer
    }

    /// The "base type" comparison spec.md §3 describes: the sign bit
    /// stripped, pointer-ness ignored. Two `TypeTag`s with the same base
    /// width compare equal here even if one is signed and the other
    /// unsigned, or one is a pointer and the other an integer of the same
    /// width.
    pub fn base_width_class(self) -> BaseWidthClass {
        use BaseType::*;
        match self.base {
            Void => BaseWidthClass::Void,
            I8 | U8 => BaseWidthClass::W8,
            I16 | U16 => BaseWidthClass::W16,
            I32 | U32 => BaseWidthClass::W32,
            I64 | U64 => BaseWidthClass::W64,
            F32 => BaseWidthClass::F32,
            F64 => BaseWidthClass::F64,
        }
    }

    /// True if the type is one of the unsigned integer kinds.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self.base,
            BaseType::U8 | BaseType::U16 | BaseType::U32 | BaseType::U64
        )
    }

    /// True if the type is `float` or `double`.
    pub fn is_float(self) -> bool {
        matches!(self.base, BaseType::F32 | BaseType::F64)
    }

    /// `get_size` in backend-z80.c: byte width of the type. Pointers are
    /// always 2 regardless of `base`.
    pub fn size(self) -> u32 {
        if self.is_pointer {
            return 2;
        }
        match self.base {
            BaseType::Void => 0,
            BaseType::I8 | BaseType::U8 => 1,
            BaseType::I16 | BaseType::U16 => 2,
            BaseType::I32 | BaseType::U32 | BaseType::F32 => 4,
            BaseType::I64 | BaseType::U64 | BaseType::F64 => 8,
        }
    }

    /// `get_stack_size` in backend-z80.c: like [`TypeTag::size`] but a
    /// byte occupies a full 16-bit stack slot, since the Z80 only pushes in
    /// 16-bit units.
    pub fn stack_size(self) -> u32 {
        match self.size() {
            1 => 2,
            n => n,
        }
    }
}

/// The result of stripping sign and pointer-ness from a [`TypeTag`], used
/// for the "base type" comparisons spec.md §3 calls for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BaseWidthClass {
    /// `void`
    Void,
    /// 8-bit integer, either signedness
    W8,
    /// 16-bit integer, either signedness, or any pointer
    W16,
    /// 32-bit integer, either signedness
    W32,
    /// 64-bit integer, either signedness
    W64,
    /// `float`
    F32,
    /// `double`
    F64,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_pointer {
            write!(f, "ptr<{:?}>", self.base)
        } else {
            write!(f, "{:?}", self.base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_size_is_always_two() {
        let p = TypeTag::pointer_to(BaseType::I64);
        assert_eq!(p.size(), 2);
        assert_eq!(p.stack_size(), 2);
    }

    #[test]
    fn byte_stacks_as_a_word() {
        let c = TypeTag::new(BaseType::U8);
        assert_eq!(c.size(), 1);
        assert_eq!(c.stack_size(), 2);
    }

    #[test]
    fn base_width_class_ignores_sign_and_pointer() {
        let a = TypeTag::new(BaseType::I16);
        let b = TypeTag::new(BaseType::U16);
        let p = TypeTag::pointer_to(BaseType::Void);
        assert_eq!(a.base_width_class(), BaseWidthClass::W16);
        assert_eq!(a.base_width_class(), b.base_width_class());
        assert_eq!(a.base_width_class(), p.base_width_class());
    }
}
