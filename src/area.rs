//! Area addressing model: which PLC memory a request touches and how its
//! bytes are laid out.
//!
//! An S7 transfer names an [`Area`], a start offset, an element count and a
//! [`WordLen`]. The word length fixes the element width, which in turn fixes
//! the byte size of the transfer buffer.
//!
//! # Areas
//!
//! | Area | Code | Word lengths |
//! |------|:----:|--------------|
//! | [`Area::ProcessInputs`] | 0x81 | Bit, Byte, Word, DWord, Real |
//! | [`Area::ProcessOutputs`] | 0x82 | Bit, Byte, Word, DWord, Real |
//! | [`Area::Markers`] | 0x83 | Bit, Byte, Word, DWord, Real |
//! | [`Area::DataBlock`] | 0x84 | Bit, Byte, Word, DWord, Real |
//! | [`Area::Counters`] | 0x1C | Counter |
//! | [`Area::Timers`] | 0x1D | Timer |
//!
//! # Example
//!
//! ```
//! use s7_session::{decode, encode, layout, Area, Values, WordLen};
//!
//! let l = layout(Area::DataBlock(1), WordLen::DWord, 2).unwrap();
//! assert_eq!(l.element_width, 4);
//! assert_eq!(l.buffer_size, 8);
//!
//! let bytes = encode(&Values::DWords(vec![1, 0xDEAD_BEEF]), WordLen::DWord).unwrap();
//! assert_eq!(bytes, [0, 0, 0, 1, 0xDE, 0xAD, 0xBE, 0xEF]);
//! assert_eq!(
//!     decode(&bytes, WordLen::DWord, 2).unwrap(),
//!     Values::DWords(vec![1, 0xDEAD_BEEF])
//! );
//! ```

use crate::error::{Result, S7Error};

/// PLC memory area.
///
/// The data block number only exists for [`Area::DataBlock`], so the
/// "block number is zero for other areas" rule holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Area {
    /// Process inputs (PE / E).
    ProcessInputs,
    /// Process outputs (PA / A).
    ProcessOutputs,
    /// Markers (MK / M).
    Markers,
    /// Data block with its number.
    DataBlock(u16),
    /// Counters (CT / Z).
    Counters,
    /// Timers (TM / T).
    Timers,
}

impl Area {
    /// Returns the native area code.
    pub fn code(self) -> u8 {
        match self {
            Area::ProcessInputs => 0x81,
            Area::ProcessOutputs => 0x82,
            Area::Markers => 0x83,
            Area::DataBlock(_) => 0x84,
            Area::Counters => 0x1C,
            Area::Timers => 0x1D,
        }
    }

    /// Returns the data block number, or 0 for every other area.
    pub fn db_number(self) -> u16 {
        match self {
            Area::DataBlock(number) => number,
            _ => 0,
        }
    }

    /// Returns the word length an area is read with when the caller has no
    /// preference: `Counter` and `Timer` for their areas, `Byte` elsewhere.
    pub fn natural_word_len(self) -> WordLen {
        match self {
            Area::Counters => WordLen::Counter,
            Area::Timers => WordLen::Timer,
            _ => WordLen::Byte,
        }
    }

    /// Returns whether `word_len` may be used to address this area.
    ///
    /// ```
    /// use s7_session::{Area, WordLen};
    ///
    /// assert!(Area::Markers.supports(WordLen::Real));
    /// assert!(!Area::Markers.supports(WordLen::Counter));
    /// assert!(Area::Counters.supports(WordLen::Counter));
    /// assert!(!Area::Timers.supports(WordLen::Byte));
    /// ```
    pub fn supports(self, word_len: WordLen) -> bool {
        match self {
            Area::Counters => word_len == WordLen::Counter,
            Area::Timers => word_len == WordLen::Timer,
            _ => !matches!(word_len, WordLen::Counter | WordLen::Timer),
        }
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Area::ProcessInputs => write!(f, "PE"),
            Area::ProcessOutputs => write!(f, "PA"),
            Area::Markers => write!(f, "MK"),
            Area::DataBlock(number) => write!(f, "DB{number}"),
            Area::Counters => write!(f, "CT"),
            Area::Timers => write!(f, "TM"),
        }
    }
}

/// Element width and interpretation of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WordLen {
    /// Single bit, transferred as one byte.
    Bit,
    /// Unsigned byte.
    Byte,
    /// 16-bit word.
    Word,
    /// 32-bit double word.
    DWord,
    /// IEEE-754 single precision float.
    Real,
    /// S7 counter (16 bits).
    Counter,
    /// S7 timer (16 bits).
    Timer,
}

impl WordLen {
    /// Returns the native word length code.
    pub fn code(self) -> u8 {
        match self {
            WordLen::Bit => 0x01,
            WordLen::Byte => 0x02,
            WordLen::Word => 0x04,
            WordLen::DWord => 0x06,
            WordLen::Real => 0x08,
            WordLen::Counter => 0x1C,
            WordLen::Timer => 0x1D,
        }
    }

    /// Returns the element width in bytes.
    pub fn width(self) -> usize {
        match self {
            WordLen::Bit | WordLen::Byte => 1,
            WordLen::Word | WordLen::Counter | WordLen::Timer => 2,
            WordLen::DWord | WordLen::Real => 4,
        }
    }
}

impl std::fmt::Display for WordLen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WordLen::Bit => "Bit",
            WordLen::Byte => "Byte",
            WordLen::Word => "Word",
            WordLen::DWord => "DWord",
            WordLen::Real => "Real",
            WordLen::Counter => "Counter",
            WordLen::Timer => "Timer",
        };
        f.write_str(name)
    }
}

/// Buffer layout of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Width of one element in bytes.
    pub element_width: usize,
    /// Total buffer size: `amount × element_width`.
    pub buffer_size: usize,
}

/// Computes the buffer layout of a transfer.
///
/// # Errors
///
/// - `InvalidWordLength` if the area cannot be addressed with `word_len`
/// - `InvalidArgument` if `amount` is zero
pub fn layout(area: Area, word_len: WordLen, amount: usize) -> Result<Layout> {
    if !area.supports(word_len) {
        return Err(S7Error::invalid_word_len(
            word_len,
            format!("not valid for area {area}"),
        ));
    }
    if amount == 0 {
        return Err(S7Error::invalid_argument("amount", "must be greater than 0"));
    }
    let element_width = word_len.width();
    let buffer_size = amount
        .checked_mul(element_width)
        .ok_or_else(|| S7Error::invalid_argument("amount", "buffer size overflows"))?;

    Ok(Layout {
        element_width,
        buffer_size,
    })
}

/// Typed element values of a transfer.
///
/// The variant follows the word length: `Bytes` for Bit/Byte, `Words` for
/// Word/Counter/Timer, `DWords` for DWord and `Reals` for Real.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// Raw single bytes.
    Bytes(Vec<u8>),
    /// Unsigned 16-bit values.
    Words(Vec<u16>),
    /// Unsigned 32-bit values.
    DWords(Vec<u32>),
    /// 32-bit floats.
    Reals(Vec<f32>),
}

impl Values {
    /// Returns the element count.
    pub fn len(&self) -> usize {
        match self {
            Values::Bytes(v) => v.len(),
            Values::Words(v) => v.len(),
            Values::DWords(v) => v.len(),
            Values::Reals(v) => v.len(),
        }
    }

    /// Returns `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Values::Bytes(_) => "Bytes",
            Values::Words(_) => "Words",
            Values::DWords(_) => "DWords",
            Values::Reals(_) => "Reals",
        }
    }
}

/// Encodes typed values into the big-endian transfer buffer.
///
/// # Errors
///
/// Returns `InvalidWordLength` if the values variant does not belong to
/// `word_len`.
pub fn encode(values: &Values, word_len: WordLen) -> Result<Vec<u8>> {
    let bytes = match (values, word_len) {
        (Values::Bytes(v), WordLen::Bit | WordLen::Byte) => v.clone(),
        (Values::Words(v), WordLen::Word | WordLen::Counter | WordLen::Timer) => {
            v.iter().flat_map(|w| w.to_be_bytes()).collect()
        }
        (Values::DWords(v), WordLen::DWord) => v.iter().flat_map(|d| d.to_be_bytes()).collect(),
        (Values::Reals(v), WordLen::Real) => v.iter().flat_map(|r| r.to_be_bytes()).collect(),
        (values, word_len) => {
            return Err(S7Error::invalid_word_len(
                word_len,
                format!("cannot encode {} values", values.variant_name()),
            ))
        }
    };
    Ok(bytes)
}

/// Decodes a big-endian transfer buffer into typed values.
///
/// No sign extension is applied: words and double words decode as unsigned.
///
/// # Errors
///
/// Returns `PayloadSizeMismatch` if `bytes.len() != amount × width`.
pub fn decode(bytes: &[u8], word_len: WordLen, amount: usize) -> Result<Values> {
    let expected = amount.saturating_mul(word_len.width());
    if bytes.len() != expected {
        return Err(S7Error::PayloadSizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let values = match word_len {
        WordLen::Bit | WordLen::Byte => Values::Bytes(bytes.to_vec()),
        WordLen::Word | WordLen::Counter | WordLen::Timer => Values::Words(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect(),
        ),
        WordLen::DWord => Values::DWords(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        WordLen::Real => Values::Reals(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
    };
    Ok(values)
}
