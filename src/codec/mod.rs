//! Value codec: typed values to and from data block images.
//!
//! Images are plain byte slices as exchanged with the PLC. Multi-byte values
//! are stored big-endian, the byte order of the target controller. A BIT is
//! stored in bit `address.bit` (0 = least significant) of byte
//! `address.start`; writing it leaves the other seven bits untouched.

mod error;

pub use error::CodecError;

use crate::core::{Address, PlcDataType, PlcValue};

/// Big-endian bytes of `value`. A BIT encodes as a single `0` or `1` byte.
pub fn encode(value: &PlcValue) -> Vec<u8> {
    match *value {
        PlcValue::Bit(bit) => vec![u8::from(bit)],
        PlcValue::Byte(v) => vec![v],
        PlcValue::Word(v) => v.to_be_bytes().to_vec(),
        PlcValue::Dword(v) => v.to_be_bytes().to_vec(),
        PlcValue::Int(v) => v.to_be_bytes().to_vec(),
        PlcValue::Dint(v) => v.to_be_bytes().to_vec(),
        PlcValue::Real(v) => v.to_bits().to_be_bytes().to_vec(),
    }
}

/// Write `value` into `image` at `address`.
///
/// # Example
///
/// ```rust
/// use plc_conformance::codec::encode_into;
/// use plc_conformance::core::{Address, PlcValue};
///
/// let mut image = vec![0u8; 4];
/// encode_into(&mut image, Address { start: 1, bit: 0 }, &PlcValue::Word(0x1234)).unwrap();
/// encode_into(&mut image, Address { start: 3, bit: 2 }, &PlcValue::Bit(true)).unwrap();
/// assert_eq!(image, vec![0x00, 0x12, 0x34, 0x04]);
/// ```
pub fn encode_into(image: &mut [u8], address: Address, value: &PlcValue) -> Result<(), CodecError> {
    let slot = slot_mut(image, address, value.data_type())?;
    match *value {
        PlcValue::Bit(bit) => {
            let mask = 1u8 << address.bit;
            if bit {
                slot[0] |= mask;
            } else {
                slot[0] &= !mask;
            }
        }
        _ => slot.copy_from_slice(&encode(value)),
    }
    Ok(())
}

/// Read a value of `data_type` from `image` at `address`.
pub fn decode(image: &[u8], address: Address, data_type: PlcDataType) -> Result<PlcValue, CodecError> {
    let bytes = slot(image, address, data_type)?;
    Ok(match data_type {
        PlcDataType::Bit => PlcValue::Bit(bytes[0] & (1u8 << address.bit) != 0),
        PlcDataType::Byte => PlcValue::Byte(bytes[0]),
        PlcDataType::Word => PlcValue::Word(u16::from_be_bytes([bytes[0], bytes[1]])),
        PlcDataType::Int => PlcValue::Int(i16::from_be_bytes([bytes[0], bytes[1]])),
        PlcDataType::Dword => PlcValue::Dword(u32::from_be_bytes(four(bytes))),
        PlcDataType::Dint => PlcValue::Dint(i32::from_be_bytes(four(bytes))),
        PlcDataType::Real => PlcValue::Real(f32::from_bits(u32::from_be_bytes(four(bytes)))),
    })
}

fn four(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn check(image_len: usize, address: Address, data_type: PlcDataType) -> Result<std::ops::Range<usize>, CodecError> {
    if data_type.is_bit() && address.bit > 7 {
        return Err(CodecError::InvalidBit { bit: address.bit });
    }
    let start = address.start as usize;
    let end = address.end(data_type);
    if end > image_len {
        return Err(CodecError::OutOfBounds {
            start,
            width: data_type.byte_width(),
            len: image_len,
        });
    }
    Ok(start..end)
}

fn slot(image: &[u8], address: Address, data_type: PlcDataType) -> Result<&[u8], CodecError> {
    let range = check(image.len(), address, data_type)?;
    Ok(&image[range])
}

fn slot_mut(image: &mut [u8], address: Address, data_type: PlcDataType) -> Result<&mut [u8], CodecError> {
    let range = check(image.len(), address, data_type)?;
    Ok(&mut image[range])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: u32) -> Address {
        Address { start, bit: 0 }
    }

    #[test]
    fn multi_byte_values_are_big_endian() {
        assert_eq!(encode(&PlcValue::Word(0x1122)), vec![0x11, 0x22]);
        assert_eq!(encode(&PlcValue::Dword(0x11223344)), vec![0x11, 0x22, 0x33, 0x44]);
        assert_eq!(encode(&PlcValue::Int(-12345)), vec![0xCF, 0xC7]);
        assert_eq!(encode(&PlcValue::Dint(-123456789)), vec![0xF8, 0xA4, 0x32, 0xEB]);
        assert_eq!(encode(&PlcValue::Real(1.0)), vec![0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn decode_reads_known_vectors() {
        let image = [0x3F, 0x80, 0x00, 0x00, 0xD4, 0x31];
        assert_eq!(decode(&image, at(0), PlcDataType::Real).unwrap(), PlcValue::Real(1.0));
        assert_eq!(decode(&image, at(4), PlcDataType::Word).unwrap(), PlcValue::Word(54321));
        assert_eq!(decode(&image, at(0), PlcDataType::Byte).unwrap(), PlcValue::Byte(0x3F));
    }

    #[test]
    fn bits_share_a_byte_without_clobbering() {
        let mut image = vec![0b1000_0001u8];
        encode_into(&mut image, Address { start: 0, bit: 3 }, &PlcValue::Bit(true)).unwrap();
        encode_into(&mut image, Address { start: 0, bit: 0 }, &PlcValue::Bit(false)).unwrap();
        assert_eq!(image[0], 0b1000_1000);
        assert_eq!(
            decode(&image, Address { start: 0, bit: 7 }, PlcDataType::Bit).unwrap(),
            PlcValue::Bit(true)
        );
        assert_eq!(
            decode(&image, Address { start: 0, bit: 1 }, PlcDataType::Bit).unwrap(),
            PlcValue::Bit(false)
        );
    }

    #[test]
    fn short_image_is_an_error_not_a_panic() {
        let image = [0u8; 3];
        assert_eq!(
            decode(&image, at(1), PlcDataType::Dword),
            Err(CodecError::OutOfBounds {
                start: 1,
                width: 4,
                len: 3
            })
        );
        let mut image = [0u8; 1];
        assert!(encode_into(&mut image, at(0), &PlcValue::Word(1)).is_err());
        assert_eq!(
            decode(&image, Address { start: 0, bit: 8 }, PlcDataType::Bit),
            Err(CodecError::InvalidBit { bit: 8 })
        );
    }

    #[test]
    fn real_boundaries_survive_bit_for_bit() {
        for value in [0.0f32, 1.18e-38, -1.18e-38, 3.40e38, -3.40e38] {
            let mut image = [0u8; 4];
            encode_into(&mut image, at(0), &PlcValue::Real(value)).unwrap();
            let decoded = decode(&image, at(0), PlcDataType::Real).unwrap();
            assert_eq!(decoded, PlcValue::Real(value));
        }
    }
}
