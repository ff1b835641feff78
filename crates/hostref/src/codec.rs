//! Boxed-reference encoding.
//!
//! A reference is an IEEE-754 double. Any non-NaN bit pattern is an ordinary
//! number. A NaN whose high word carries [`NAN_PREFIX`] is a boxed
//! reference:
//!
//! ```text
//!  63            36 35  32 31                              0
//! ┌────────────────┬──────┬─────────────────────────────────┐
//! │  0x7FFC0 prefix│ tag  │            slot id              │
//! └────────────────┴──────┴─────────────────────────────────┘
//! ```
//!
//! The prefix sets the quiet bit plus one more mantissa bit, so it never
//! matches the canonical NaN (`0x7FF8_0000_0000_0000`) that arithmetic
//! produces.

use std::fmt;

use hostref_value::Value;
use serde::{Deserialize, Serialize};

/// High word shared by every boxed reference (tag bits clear).
pub const NAN_PREFIX: u32 = 0x7FFC_0000;

/// Low bits of the high word that hold the [`TypeTag`].
pub const TAG_MASK: u32 = 0x0000_000F;

/// Bit pattern of the host's default NaN.
pub const CANONICAL_NAN_BITS: u64 = 0x7FF8_0000_0000_0000;

/// Type hint stored next to the slot id. Decoding never depends on it.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    None = 0,
    Object = 1,
    String = 2,
    Symbol = 3,
    Function = 4,
}

impl TypeTag {
    /// Classify a value for encoding. Primitives that never occupy a dynamic
    /// slot (and `null`) get [`TypeTag::None`].
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::Object,
            Value::String(_) => Self::String,
            Value::Symbol(_) => Self::Symbol,
            Value::Function(_) => Self::Function,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) => Self::None,
        }
    }

    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::None),
            1 => Some(Self::Object),
            2 => Some(Self::String),
            3 => Some(Self::Symbol),
            4 => Some(Self::Function),
            _ => None,
        }
    }
}

/// A 64-bit reference as it travels through linear memory.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ref(u64);

impl Ref {
    /// Box a slot id.
    pub const fn boxed(id: u32, tag: TypeTag) -> Self {
        let hi = NAN_PREFIX | tag as u32;
        Self(((hi as u64) << 32) | id as u64)
    }

    /// Wrap a plain number. NaN is not a valid payload here; callers route it
    /// to the NaN slot instead (see [`crate::table::ValueTable::store`]).
    pub fn number(n: f64) -> Self {
        debug_assert!(!n.is_nan(), "NaN must be boxed, not passed raw");
        Self(n.to_bits())
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn from_f64(n: f64) -> Self {
        Self(n.to_bits())
    }

    pub fn to_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    pub const fn high_word(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn low_word(self) -> u32 {
        self.0 as u32
    }

    /// Whether the high word carries the reserved prefix. The tag bits are
    /// masked off so any tag matches.
    pub const fn is_boxed(self) -> bool {
        self.high_word() & !TAG_MASK == NAN_PREFIX
    }

    /// The slot id of a boxed reference.
    pub const fn slot(self) -> Option<u32> {
        if self.is_boxed() {
            Some(self.low_word())
        } else {
            None
        }
    }

    pub fn tag(self) -> Option<TypeTag> {
        if self.is_boxed() {
            TypeTag::from_bits(self.high_word() & TAG_MASK)
        } else {
            None
        }
    }

    /// The number carried by an unboxed reference.
    pub fn as_number(self) -> Option<f64> {
        let n = self.to_f64();
        (!n.is_nan()).then_some(n)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.slot(), self.as_number()) {
            (Some(id), _) => write!(f, "Ref(#{id}, {:?})", self.tag()),
            (None, Some(n)) => write!(f, "Ref({n})"),
            (None, None) => write!(f, "Ref(NaN {:#018x})", self.0),
        }
    }
}

/// Encode a slot id as a boxed reference double (tag omitted).
pub fn encode_ref(id: u32) -> f64 {
    Ref::boxed(id, TypeTag::None).to_f64()
}

/// Decode a boxed reference double. `None` means the value is not a boxed
/// reference: either an ordinary number or a foreign NaN.
pub fn decode_ref(r: f64) -> Option<u32> {
    Ref::from_f64(r).slot()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        for id in [0, 1, 2, 6, 7, 255, 65_536, u32::MAX - 1, u32::MAX] {
            let r = encode_ref(id);
            assert!(r.is_nan(), "ref for {id} must be NaN");
            assert_eq!(decode_ref(r), Some(id));
        }
    }

    #[test]
    fn tags_do_not_break_decoding() {
        for tag in [
            TypeTag::None,
            TypeTag::Object,
            TypeTag::String,
            TypeTag::Symbol,
            TypeTag::Function,
        ] {
            let r = Ref::boxed(42, tag);
            assert!(r.to_f64().is_nan());
            assert_eq!(r.slot(), Some(42));
            assert_eq!(r.tag(), Some(tag));
        }
    }

    #[test]
    fn canonical_nan_is_not_a_ref() {
        assert_eq!(f64::NAN.to_bits(), CANONICAL_NAN_BITS);
        assert_eq!(decode_ref(f64::NAN), None);
        assert_eq!(decode_ref(f64::from_bits(CANONICAL_NAN_BITS | 5)), None);
    }

    #[test]
    fn numbers_are_not_refs() {
        for n in [0.0, -0.0, 1.5, 1e300, f64::INFINITY, f64::NEG_INFINITY] {
            let r = Ref::number(n);
            assert_eq!(r.slot(), None);
            assert_eq!(r.as_number().map(f64::to_bits), Some(n.to_bits()));
        }
    }

    #[test]
    fn layout_matches_wire_format() {
        let r = Ref::boxed(7, TypeTag::String);
        assert_eq!(r.bits(), 0x7FFC_0002_0000_0007);
        assert_eq!(r.to_f64().to_bits().to_le_bytes(), [7, 0, 0, 0, 2, 0, 0xFC, 0x7F]);
    }

    #[test]
    fn type_tags_follow_value_kind() {
        use hostref_value::{Object, Symbol};
        assert_eq!(TypeTag::of(&Value::Object(Object::new())), TypeTag::Object);
        assert_eq!(TypeTag::of(&Value::from("s")), TypeTag::String);
        assert_eq!(TypeTag::of(&Value::Symbol(Symbol::new(None))), TypeTag::Symbol);
        assert_eq!(TypeTag::of(&Value::Bool(true)), TypeTag::None);
    }
}
