//! Process-wide configuration: optimisation level, size preference, target
//! sub-variant, and the target feature vector (spec.md §3 "Target feature
//! vector", §4 "Input (from front end)").
//!
//! Grounded on cranelift-codegen's `settings::Flags`: a small builder
//! constructs an immutable value, rather than reading process-global state,
//! so the same back end can run concurrently over several functions with
//! different settings (spec.md §9 REDESIGN FLAGS).

use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

/// Which member of the Z80 family is being targeted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Variant {
    /// The baseline Z80.
    Z80,
    /// Zilog eZ80: adds 16-bit stack-relative loads and an atomic indirect
    /// load through `hl`.
    EZ80,
    /// Rabbit 2000/3000: similar extensions to eZ80 but a different encoding.
    Rabbit,
    /// Z280: adds indexed-register 16-bit logical ops.
    Z280,
    /// Z80N (Next): baseline Z80 timing with a handful of extra opcodes, no
    /// extra addressing modes relevant to this back end.
    Z80N,
}

impl Variant {
    /// The feature vector that ships with each variant by default. A driver
    /// may still override individual bits (e.g. banked mode is orthogonal to
    /// the CPU variant).
    pub fn default_features(self) -> FeatureVector {
        use Variant::*;
        match self {
            Z80 => FeatureVector::empty(),
            EZ80 => FeatureVector::STACK_WORD_LOAD
                | FeatureVector::STACK_BYTE_LOAD
                | FeatureVector::ATOMIC_INDIRECT,
            Rabbit => FeatureVector::STACK_WORD_LOAD | FeatureVector::STACK_BYTE_LOAD,
            Z280 => {
                FeatureVector::STACK_WORD_LOAD
                    | FeatureVector::STACK_BYTE_LOAD
                    | FeatureVector::ATOMIC_INDIRECT
                    | FeatureVector::INDEXED_LOGICAL16
            }
            Z80N => FeatureVector::empty(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Variant::Z80 => "z80",
            Variant::EZ80 => "ez80",
            Variant::Rabbit => "rabbit",
            Variant::Z280 => "z280",
            Variant::Z80N => "z80n",
        };
        f.write_str(s)
    }
}

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "z80" => Ok(Variant::Z80),
            "ez80" => Ok(Variant::EZ80),
            "rabbit" | "rabbit2000" | "rabbit3000" => Ok(Variant::Rabbit),
            "z280" => Ok(Variant::Z280),
            "z80n" | "next" => Ok(Variant::Z80N),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Returned by [`Variant::from_str`] for an unrecognised `--target` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown Z80-family variant `{}`", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

bitflags! {
    /// spec.md §3 "Target feature vector": which addressing modes and
    /// atomicity guarantees the target CPU offers, consulted at emission
    /// time to choose the cheaper of several semantically-identical
    /// sequences.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureVector: u8 {
        /// 16-bit loads from frame/stack-pointer-relative addresses exist.
        const STACK_WORD_LOAD   = 0b0000_0001;
        /// Byte loads from stack-relative addresses exist.
        const STACK_BYTE_LOAD   = 0b0000_0010;
        /// Indirect load through a pointer register is atomic.
        const ATOMIC_INDIRECT   = 0b0000_0100;
        /// 16-bit logical ops (`and`/`or`/`xor`) on indexed registers exist.
        const INDEXED_LOGICAL16 = 0b0000_1000;
        /// Output targets banked mode: calls return through an extra
        /// bank-restore slot, widening the argument base by two bytes
        /// (spec.md §8 scenario 5, `cpufeat & 1` in backend-z80.c).
        const BANKED            = 0b0001_0000;
    }
}

/// Optimisation level, `0..=3` as spec.md §4 requires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OptLevel(u8);

impl OptLevel {
    /// Clamp an arbitrary integer into the valid `0..=3` range.
    pub fn new(level: u8) -> Self {
        OptLevel(level.min(3))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for OptLevel {
    fn default() -> Self {
        OptLevel(0)
    }
}

/// Immutable configuration threaded through every pass of the pipeline.
///
/// Built with [`Flags::builder`]; there is deliberately no `static mut` or
/// `thread_local!` copy of this anywhere, so two functions (even on two
/// threads) can be compiled with different flags concurrently.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Flags {
    opt_level: OptLevel,
    prefer_size: bool,
    variant: Variant,
    features: FeatureVector,
}

impl Flags {
    /// Start building a `Flags` for `variant`, seeded with that variant's
    /// default feature vector.
    pub fn builder(variant: Variant) -> FlagsBuilder {
        FlagsBuilder {
            opt_level: OptLevel::default(),
            prefer_size: false,
            variant,
            features: variant.default_features(),
        }
    }

    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    /// True when the Code Selector should break ties in favour of shorter
    /// encodings rather than fewer cycles (spec.md 4.3's multiply/divide
    /// cost model consults this).
    pub fn prefer_size(&self) -> bool {
        self.prefer_size
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn features(&self) -> FeatureVector {
        self.features
    }
}

/// Builder for [`Flags`]. Mirrors cranelift-codegen's `settings::Builder`.
#[derive(Debug, Clone)]
pub struct FlagsBuilder {
    opt_level: OptLevel,
    prefer_size: bool,
    variant: Variant,
    features: FeatureVector,
}

impl FlagsBuilder {
    pub fn opt_level(mut self, level: u8) -> Self {
        self.opt_level = OptLevel::new(level);
        self
    }

    pub fn prefer_size(mut self, prefer: bool) -> Self {
        self.prefer_size = prefer;
        self
    }

    /// Override a feature bit the variant's default doesn't set, e.g.
    /// `BANKED` mode, which is a link-time choice independent of CPU.
    pub fn set_feature(mut self, bit: FeatureVector, on: bool) -> Self {
        self.features.set(bit, on);
        self
    }

    pub fn finish(self) -> Flags {
        Flags {
            opt_level: self.opt_level,
            prefer_size: self.prefer_size,
            variant: self.variant,
            features: self.features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_level_clamps_above_three() {
        assert_eq!(OptLevel::new(9).get(), 3);
        assert_eq!(OptLevel::new(2).get(), 2);
    }

    #[test]
    fn variant_round_trips_through_display_and_from_str() {
        for v in [Variant::Z80, Variant::EZ80, Variant::Rabbit, Variant::Z280, Variant::Z80N] {
            let s = v.to_string();
            assert_eq!(Variant::from_str(&s).unwrap(), v);
        }
    }

    #[test]
    fn banked_mode_is_orthogonal_to_variant_defaults() {
        let flags = Flags::builder(Variant::Z80)
            .set_feature(FeatureVector::BANKED, true)
            .finish();
        assert!(flags.features().contains(FeatureVector::BANKED));
        assert!(!flags.features().contains(FeatureVector::STACK_WORD_LOAD));
    }

    #[test]
    fn ez80_defaults_include_atomic_indirect_load() {
        let flags = Flags::builder(Variant::EZ80).finish();
        assert!(flags.features().contains(FeatureVector::ATOMIC_INDIRECT));
    }
}
