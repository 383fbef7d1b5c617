//! Reference classes for classed ptgs.
//!
//! BIFF packs the class of an operand token into bits 5-6 of its ptg byte. The converter works
//! with [`RefClass`] and only touches the packed form through [`RefClass::bits`] /
//! [`RefClass::from_bits`] when an [`Opcode`](crate::Opcode) is turned into a byte.

use serde::{Deserialize, Serialize};

const CLASS_MASK: u8 = 0x60;
const CLASS_REFERENCE: u8 = 0x20;
const CLASS_VALUE: u8 = 0x40;
const CLASS_ARRAY: u8 = 0x60;

/// How the result of a token is consumed by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefClass {
    /// A single scalar value.
    Value,
    /// A cell or range address.
    Reference,
    /// A 2-D grid of values.
    Array,
}

impl RefClass {
    /// Packed class bits as stored in a BIFF8/BIFF12 ptg byte.
    pub const fn bits(self) -> u8 {
        match self {
            RefClass::Reference => CLASS_REFERENCE,
            RefClass::Value => CLASS_VALUE,
            RefClass::Array => CLASS_ARRAY,
        }
    }

    /// Read the class bits from a packed ptg byte.
    ///
    /// Returns `None` for unclassed ptgs (bits 5-6 clear).
    pub const fn from_bits(ptg: u8) -> Option<Self> {
        match ptg & CLASS_MASK {
            CLASS_REFERENCE => Some(RefClass::Reference),
            CLASS_VALUE => Some(RefClass::Value),
            CLASS_ARRAY => Some(RefClass::Array),
            _ => None,
        }
    }

    /// Strip the class bits from a packed ptg byte.
    pub const fn strip(ptg: u8) -> u8 {
        ptg & !CLASS_MASK
    }
}

impl std::fmt::Display for RefClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RefClass::Value => "value",
            RefClass::Reference => "reference",
            RefClass::Array => "array",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_bits_match_biff_layout() {
        // PtgRef = 0x04: 0x24 (ref), 0x44 (value), 0x64 (array).
        assert_eq!(0x04 | RefClass::Reference.bits(), 0x24);
        assert_eq!(0x04 | RefClass::Value.bits(), 0x44);
        assert_eq!(0x04 | RefClass::Array.bits(), 0x64);

        for class in [RefClass::Value, RefClass::Reference, RefClass::Array] {
            assert_eq!(RefClass::from_bits(0x05 | class.bits()), Some(class));
        }
        assert_eq!(RefClass::from_bits(0x03), None);
        assert_eq!(RefClass::strip(0x65), 0x05);
    }
}
