//! Register block to engineering value conversion.
//!
//! 32-bit values are assembled high word first. Signed registers use standard
//! two's-complement sign extension from bit 15 or bit 31 depending on width.

use crate::descriptor::{MeasurementDescriptor, RegisterWidth};
use crate::error::DecodeFailure;

/// Assemble the integer carried by `block`, honouring width and signedness.
/// `None` if the block does not have exactly the words the width needs.
fn raw_value(width: RegisterWidth, signed: bool, block: &[u16]) -> Option<i64> {
    match (width, block) {
        (RegisterWidth::Single, &[word]) => Some(if signed {
            i64::from(word as i16)
        } else {
            i64::from(word)
        }),
        (RegisterWidth::Double, &[high, low]) => {
            let word = (u32::from(high) << 16) | u32::from(low);
            Some(if signed {
                i64::from(word as i32)
            } else {
                i64::from(word)
            })
        }
        _ => None,
    }
}

/// Decode a register block into an engineering-unit value.
pub fn decode(descriptor: &MeasurementDescriptor, block: &[u16]) -> Result<f64, DecodeFailure> {
    let raw = raw_value(descriptor.width, descriptor.signed, block).ok_or(
        DecodeFailure::MalformedBlock {
            expected: usize::from(descriptor.word_count()),
            actual: block.len(),
        },
    )?;
    Ok(raw as f64 * descriptor.gain + descriptor.offset)
}

/// Decode the result of a bus read that may have returned nothing.
///
/// A missing block is [`DecodeFailure::NoResponse`], never a zero reading.
pub fn decode_response(
    descriptor: &MeasurementDescriptor,
    response: Option<&[u16]>,
) -> Result<f64, DecodeFailure> {
    match response {
        Some(block) => decode(descriptor, block),
        None => Err(DecodeFailure::NoResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn descriptor(word_count: u16, signed: bool) -> MeasurementDescriptor {
        MeasurementDescriptor::new("m", "u", 1024, word_count, 1.0, 0.0, None)
            .unwrap()
            .with_signed(signed)
    }

    #[test]
    fn signed_16_bit_edges() {
        let d = descriptor(1, true);
        assert_eq!(decode(&d, &[0xFFFF]).unwrap(), -1.0);
        assert_eq!(decode(&d, &[0x8000]).unwrap(), -32768.0);
        assert_eq!(decode(&d, &[0x7FFF]).unwrap(), 32767.0);
    }

    #[test]
    fn assembles_32_bit_high_word_first() {
        let d = descriptor(2, false);
        assert_eq!(decode(&d, &[0x0001, 0x0000]).unwrap(), 65536.0);
        assert_eq!(decode(&d, &[0xFFFF, 0xFFFF]).unwrap(), 4_294_967_295.0);
    }

    #[test]
    fn signed_32_bit_sign_extends_from_bit_31() {
        let d = descriptor(2, true);
        assert_eq!(decode(&d, &[0xFFFF, 0xFFFF]).unwrap(), -1.0);
        assert_eq!(decode(&d, &[0x8000, 0x0000]).unwrap(), -2_147_483_648.0);
        // Bit 15 of the low word must not affect the sign
        assert_eq!(decode(&d, &[0x0000, 0x8000]).unwrap(), 32768.0);
    }

    #[test]
    fn applies_gain_then_offset() {
        let d = MeasurementDescriptor::new("v", "V", 1024, 1, 0.1, -5.0, None).unwrap();
        let value = decode(&d, &[250]).unwrap();
        assert!((value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn oil_pressure_example() {
        let d = MeasurementDescriptor::new("Oil P", "kPa", 1024, 1, 1.0, 0.0, None).unwrap();
        assert!(!d.signed);
        assert_eq!(decode(&d, &[250]).unwrap(), 250.0);
        assert_eq!(d.units, "kPa");
    }

    #[test]
    fn block_length_mismatch_is_malformed() {
        let d = descriptor(2, false);
        assert_eq!(
            decode(&d, &[1]),
            Err(DecodeFailure::MalformedBlock {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            decode(&d, &[1, 2, 3]),
            Err(DecodeFailure::MalformedBlock {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(
            decode(&descriptor(1, false), &[]),
            Err(DecodeFailure::MalformedBlock {
                expected: 1,
                actual: 0
            })
        );
    }

    #[test]
    fn missing_block_is_no_response() {
        let d = descriptor(1, false);
        assert_eq!(decode_response(&d, None), Err(DecodeFailure::NoResponse));
        assert_eq!(decode_response(&d, Some(&[7])), Ok(7.0));
    }

    proptest! {
        #[test]
        fn unsigned_16_bit_is_identity(raw in any::<u16>()) {
            let d = descriptor(1, false);
            prop_assert_eq!(decode(&d, &[raw]).unwrap(), f64::from(raw));
        }

        #[test]
        fn signed_16_bit_upper_half_wraps(raw in 0x8000u16..=0xFFFF) {
            let d = descriptor(1, true);
            prop_assert_eq!(decode(&d, &[raw]).unwrap(), f64::from(raw) - 65536.0);
        }

        #[test]
        fn signed_32_bit_matches_twos_complement(high in any::<u16>(), low in any::<u16>()) {
            let d = descriptor(2, true);
            let unsigned = (u64::from(high) << 16) | u64::from(low);
            let expected = if unsigned >= 1 << 31 {
                unsigned as f64 - 4_294_967_296.0
            } else {
                unsigned as f64
            };
            prop_assert_eq!(decode(&d, &[high, low]).unwrap(), expected);
        }
    }
}
