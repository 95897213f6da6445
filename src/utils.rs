//! Helpers for reading and writing S7 values inside raw byte buffers.
//!
//! Area reads return plain bytes. S7 stores every multi-byte value
//! big-endian, bits are addressed as `byte.bit` with bit 0 the least
//! significant, and strings carry a two-byte header (maximum length, actual
//! length) in front of the characters.
//!
//! Every accessor checks bounds and returns `InvalidArgument` instead of
//! panicking.
//!
//! # Example
//!
//! ```
//! use s7_session::utils::{get_bool, get_int, get_real, set_real};
//!
//! let mut db = vec![0u8; 8];
//! db[0] = 0b0000_0100; // DBX0.2
//! db[2..4].copy_from_slice(&(-5i16).to_be_bytes());
//!
//! assert!(get_bool(&db, 0, 2).unwrap());
//! assert_eq!(get_int(&db, 2).unwrap(), -5);
//!
//! set_real(&mut db, 4, 21.5).unwrap();
//! assert_eq!(get_real(&db, 4).unwrap(), 21.5);
//! ```

use crate::error::{Result, S7Error};

/// Represents a single bit with its index and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitInfo {
    /// Bit position (0-7).
    pub index: u8,
    /// Bit value (true = ON, false = OFF).
    pub value: bool,
}

impl std::fmt::Display for BitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bit {}: {}",
            self.index,
            if self.value { "ON" } else { "OFF" }
        )
    }
}

fn field<const N: usize>(data: &[u8], index: usize) -> Result<[u8; N]> {
    index
        .checked_add(N)
        .and_then(|end| data.get(index..end))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| out_of_range(data.len(), index, N))
}

fn field_mut<const N: usize>(data: &mut [u8], index: usize) -> Result<&mut [u8]> {
    let len = data.len();
    index
        .checked_add(N)
        .and_then(|end| data.get_mut(index..end))
        .ok_or_else(|| out_of_range(len, index, N))
}

fn out_of_range(len: usize, index: usize, width: usize) -> S7Error {
    S7Error::invalid_argument(
        "index",
        format!("{width} byte(s) at offset {index} exceed buffer of {len} bytes"),
    )
}

fn check_bit(bit: u8) -> Result<()> {
    if bit > 7 {
        return Err(S7Error::invalid_argument("bit", format!("{bit} is not in 0-7")));
    }
    Ok(())
}

/// Reads bit `bit` of byte `byte_index`.
///
/// # Errors
///
/// Returns `InvalidArgument` if `bit > 7` or the byte is out of range.
pub fn get_bool(data: &[u8], byte_index: usize, bit: u8) -> Result<bool> {
    check_bit(bit)?;
    let [byte] = field::<1>(data, byte_index)?;
    Ok(byte & (1 << bit) != 0)
}

/// Writes bit `bit` of byte `byte_index`, leaving the other bits untouched.
///
/// # Example
///
/// ```
/// use s7_session::utils::set_bool;
///
/// let mut data = [0b1000_0000u8];
/// set_bool(&mut data, 0, 1, true).unwrap();
/// assert_eq!(data[0], 0b1000_0010);
/// ```
pub fn set_bool(data: &mut [u8], byte_index: usize, bit: u8, value: bool) -> Result<()> {
    check_bit(bit)?;
    let byte = &mut field_mut::<1>(data, byte_index)?[0];
    if value {
        *byte |= 1 << bit;
    } else {
        *byte &= !(1 << bit);
    }
    Ok(())
}

/// Returns the eight bits of a byte, LSB first.
pub fn get_bits(byte: u8) -> Vec<BitInfo> {
    (0..8)
        .map(|index| BitInfo {
            index,
            value: byte & (1 << index) != 0,
        })
        .collect()
}

/// Formats a byte as `0bxxxx_xxxx`.
///
/// ```
/// use s7_session::utils::format_bits;
///
/// assert_eq!(format_bits(0xA5), "0b1010_0101");
/// ```
pub fn format_bits(byte: u8) -> String {
    format!("0b{:04b}_{:04b}", byte >> 4, byte & 0x0F)
}

/// Reads an unsigned byte.
pub fn get_byte(data: &[u8], index: usize) -> Result<u8> {
    Ok(field::<1>(data, index)?[0])
}

/// Writes an unsigned byte.
pub fn set_byte(data: &mut [u8], index: usize, value: u8) -> Result<()> {
    field_mut::<1>(data, index)?[0] = value;
    Ok(())
}

/// Reads a WORD (unsigned 16-bit).
pub fn get_word(data: &[u8], index: usize) -> Result<u16> {
    Ok(u16::from_be_bytes(field(data, index)?))
}

/// Writes a WORD.
pub fn set_word(data: &mut [u8], index: usize, value: u16) -> Result<()> {
    field_mut::<2>(data, index)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads an INT (signed 16-bit).
pub fn get_int(data: &[u8], index: usize) -> Result<i16> {
    Ok(i16::from_be_bytes(field(data, index)?))
}

/// Writes an INT.
pub fn set_int(data: &mut [u8], index: usize, value: i16) -> Result<()> {
    field_mut::<2>(data, index)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads a DWORD (unsigned 32-bit).
pub fn get_dword(data: &[u8], index: usize) -> Result<u32> {
    Ok(u32::from_be_bytes(field(data, index)?))
}

/// Writes a DWORD.
pub fn set_dword(data: &mut [u8], index: usize, value: u32) -> Result<()> {
    field_mut::<4>(data, index)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads a DINT (signed 32-bit).
pub fn get_dint(data: &[u8], index: usize) -> Result<i32> {
    Ok(i32::from_be_bytes(field(data, index)?))
}

/// Writes a DINT.
pub fn set_dint(data: &mut [u8], index: usize, value: i32) -> Result<()> {
    field_mut::<4>(data, index)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads a REAL (IEEE 754 single precision).
pub fn get_real(data: &[u8], index: usize) -> Result<f32> {
    Ok(f32::from_be_bytes(field(data, index)?))
}

/// Writes a REAL.
pub fn set_real(data: &mut [u8], index: usize, value: f32) -> Result<()> {
    field_mut::<4>(data, index)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads an S7 STRING starting at its header.
///
/// Characters are taken as Latin-1. The actual length is clamped to the
/// declared maximum.
///
/// # Errors
///
/// Returns `InvalidArgument` if the header or the characters run past the
/// buffer.
///
/// # Example
///
/// ```
/// use s7_session::utils::get_string;
///
/// let data = [10, 5, b'P', b'U', b'M', b'P', b'1', 0, 0, 0, 0, 0];
/// assert_eq!(get_string(&data, 0).unwrap(), "PUMP1");
/// ```
pub fn get_string(data: &[u8], index: usize) -> Result<String> {
    let [max_len, len] = field::<2>(data, index)?;
    let len = usize::from(len.min(max_len));
    let start = index + 2;
    let chars = data
        .get(start..start + len)
        .ok_or_else(|| out_of_range(data.len(), start, len))?;
    Ok(chars.iter().map(|&b| char::from(b)).collect())
}

/// Writes an S7 STRING with room for `max_len` characters.
///
/// The unused tail of the field is zeroed.
///
/// # Errors
///
/// Returns `InvalidArgument` if `value` is longer than `max_len`, holds a
/// character outside Latin-1, or the field runs past the buffer.
pub fn set_string(data: &mut [u8], index: usize, value: &str, max_len: u8) -> Result<()> {
    let bytes = value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| S7Error::invalid_argument("value", "not representable in Latin-1"))?;
    if bytes.len() > usize::from(max_len) {
        return Err(S7Error::invalid_argument(
            "value",
            format!("{} characters exceed maximum of {max_len}", bytes.len()),
        ));
    }

    let len = data.len();
    let total = 2 + usize::from(max_len);
    let slot = index
        .checked_add(total)
        .and_then(|end| data.get_mut(index..end))
        .ok_or_else(|| out_of_range(len, index, total))?;
    slot[0] = max_len;
    slot[1] = bytes.len() as u8;
    slot[2..2 + bytes.len()].copy_from_slice(&bytes);
    slot[2 + bytes.len()..].fill(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_get_bool() {
        let data = [0b0000_0101u8, 0x80];
        assert!(get_bool(&data, 0, 0).unwrap());
        assert!(!get_bool(&data, 0, 1).unwrap());
        assert!(get_bool(&data, 0, 2).unwrap());
        assert!(get_bool(&data, 1, 7).unwrap());
    }

    #[test]
    fn test_set_bool() {
        let mut data = [0xFFu8];
        set_bool(&mut data, 0, 0, false).unwrap();
        assert_eq!(data[0], 0xFE);
        set_bool(&mut data, 0, 0, true).unwrap();
        assert_eq!(data[0], 0xFF);
    }

    #[test]
    fn test_bit_index_checked() {
        let mut data = [0u8; 2];
        assert_eq!(
            get_bool(&data, 0, 8).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(set_bool(&mut data, 2, 0, true).is_err());
    }

    #[test]
    fn test_get_bits() {
        let bits = get_bits(0b0000_0101);
        assert_eq!(bits.len(), 8);
        assert_eq!(bits[0].index, 0);
        assert!(bits[0].value);
        assert!(!bits[1].value);
        assert!(bits[2].value);
        assert_eq!(bits[2].to_string(), "Bit 2: ON");
    }

    #[test]
    fn test_format_bits() {
        assert_eq!(format_bits(0), "0b0000_0000");
        assert_eq!(format_bits(0xFF), "0b1111_1111");
    }

    #[test]
    fn test_words_are_big_endian() {
        let mut data = [0u8; 6];
        set_word(&mut data, 0, 0x1234).unwrap();
        set_int(&mut data, 2, -2).unwrap();
        assert_eq!(hex::encode(data), "1234fffe0000");
        assert_eq!(get_word(&data, 0).unwrap(), 0x1234);
        assert_eq!(get_int(&data, 2).unwrap(), -2);
    }

    #[test]
    fn test_double_words() {
        let mut data = [0u8; 8];
        set_dint(&mut data, 0, -100_000).unwrap();
        set_dword(&mut data, 4, 0xDEAD_BEEF).unwrap();
        assert_eq!(get_dint(&data, 0).unwrap(), -100_000);
        assert_eq!(hex::encode(&data[4..]), "deadbeef");
    }

    #[test]
    fn test_real() {
        let mut data = [0u8; 4];
        set_real(&mut data, 0, 3.14159).unwrap();
        assert_eq!(data, [0x40, 0x49, 0x0F, 0xD0]);
        assert_eq!(get_real(&data, 0).unwrap(), 3.14159);
    }

    #[test]
    fn test_out_of_range() {
        let mut data = [0u8; 3];
        assert!(get_dint(&data, 0).is_err());
        assert!(get_word(&data, 2).is_err());
        assert!(get_byte(&data, usize::MAX).is_err());
        assert!(set_real(&mut data, 1, 1.0).is_err());
        set_byte(&mut data, 2, 7).unwrap();
        assert_eq!(get_byte(&data, 2).unwrap(), 7);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut data = [0xEEu8; 12];
        set_string(&mut data, 0, "PRODUCT", 10).unwrap();
        assert_eq!(data[0], 10);
        assert_eq!(data[1], 7);
        assert_eq!(&data[9..], &[0, 0, 0]);
        assert_eq!(get_string(&data, 0).unwrap(), "PRODUCT");
    }

    #[test]
    fn test_string_limits() {
        let mut data = [0u8; 6];
        assert!(set_string(&mut data, 0, "TOOLONG", 4).is_err());
        assert!(set_string(&mut data, 0, "€", 4).is_err());
        assert!(set_string(&mut data, 2, "ABCD", 4).is_err());

        // actual length clamped to the declared maximum
        let data = [2, 9, b'O', b'K', b'X'];
        assert_eq!(get_string(&data, 0).unwrap(), "OK");
    }
}
