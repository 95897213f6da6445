//! Read-only snapshots returned by block and status queries.
//!
//! All of these are plain values filled in one engine call. None of them has
//! setters: a query either produces a complete value or fails.

use std::str::FromStr;

use crate::error::S7Error;

/// Program block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockType {
    /// Organization block.
    OB,
    /// Data block.
    DB,
    /// System data block.
    SDB,
    /// Function.
    FC,
    /// System function.
    SFC,
    /// Function block.
    FB,
    /// System function block.
    SFB,
}

impl BlockType {
    /// Returns the native block type code.
    pub fn code(self) -> u8 {
        match self {
            BlockType::OB => 0x38,
            BlockType::DB => 0x41,
            BlockType::SDB => 0x42,
            BlockType::FC => 0x43,
            BlockType::SFC => 0x44,
            BlockType::FB => 0x45,
            BlockType::SFB => 0x46,
        }
    }

    /// Looks a block type up by native code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x38 => Some(BlockType::OB),
            0x41 => Some(BlockType::DB),
            0x42 => Some(BlockType::SDB),
            0x43 => Some(BlockType::FC),
            0x44 => Some(BlockType::SFC),
            0x45 => Some(BlockType::FB),
            0x46 => Some(BlockType::SFB),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl FromStr for BlockType {
    type Err = S7Error;

    /// Parses a block mnemonic, case-insensitively.
    ///
    /// ```
    /// use s7_session::BlockType;
    ///
    /// assert_eq!("db".parse::<BlockType>().unwrap(), BlockType::DB);
    /// assert!("XYZ".parse::<BlockType>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OB" => Ok(BlockType::OB),
            "DB" => Ok(BlockType::DB),
            "SDB" => Ok(BlockType::SDB),
            "FC" => Ok(BlockType::FC),
            "SFC" => Ok(BlockType::SFC),
            "FB" => Ok(BlockType::FB),
            "SFB" => Ok(BlockType::SFB),
            _ => Err(S7Error::invalid_argument(
                "block_type",
                format!("unknown block type '{s}'"),
            )),
        }
    }
}

/// Number of blocks of each type in the PLC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlocksList {
    /// Organization blocks.
    pub ob_count: i32,
    /// Function blocks.
    pub fb_count: i32,
    /// Functions.
    pub fc_count: i32,
    /// System function blocks.
    pub sfb_count: i32,
    /// System functions.
    pub sfc_count: i32,
    /// Data blocks.
    pub db_count: i32,
    /// System data blocks.
    pub sdb_count: i32,
}

impl BlocksList {
    /// Returns the count for one block type.
    pub fn count(&self, block_type: BlockType) -> i32 {
        match block_type {
            BlockType::OB => self.ob_count,
            BlockType::FB => self.fb_count,
            BlockType::FC => self.fc_count,
            BlockType::SFB => self.sfb_count,
            BlockType::SFC => self.sfc_count,
            BlockType::DB => self.db_count,
            BlockType::SDB => self.sdb_count,
        }
    }
}

impl std::fmt::Display for BlocksList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<block list count OB: {} FB: {} FC: {} SFB: {} SFC: {} DB: {} SDB: {}>",
            self.ob_count,
            self.fb_count,
            self.fc_count,
            self.sfb_count,
            self.sfc_count,
            self.db_count,
            self.sdb_count
        )
    }
}

/// Header information of one block in the PLC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockInfo {
    /// Native block type code.
    pub block_type: u8,
    /// Block number.
    pub number: u16,
    /// Language code.
    pub language: u8,
    /// Block flags.
    pub flags: u8,
    /// Size of the MC7 code (the payload size of a DB).
    pub mc7_size: usize,
    /// Load memory size.
    pub load_size: usize,
    /// Local data size.
    pub local_data: usize,
    /// Checksum.
    pub checksum: u16,
    /// Version (major in the high nibble).
    pub version: u8,
    /// Code date, `YYYY/MM/DD`.
    pub code_date: String,
    /// Interface date, `YYYY/MM/DD`.
    pub interface_date: String,
    /// Author.
    pub author: String,
    /// Family.
    pub family: String,
    /// Header name.
    pub header: String,
}

/// PLC run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuStatus {
    /// State not reported.
    Unknown,
    /// CPU in STOP.
    Stop,
    /// CPU in RUN.
    Run,
}

impl CpuStatus {
    /// Maps the native status code (0, 4, 8). Other codes are `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            4 => CpuStatus::Stop,
            8 => CpuStatus::Run,
            _ => CpuStatus::Unknown,
        }
    }
}

impl std::fmt::Display for CpuStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuStatus::Unknown => write!(f, "S7CpuStatusUnknown"),
            CpuStatus::Stop => write!(f, "S7CpuStatusStop"),
            CpuStatus::Run => write!(f, "S7CpuStatusRun"),
        }
    }
}

/// PDU sizes of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduLength {
    /// Size requested by the client.
    pub requested: i32,
    /// Size granted by the PLC.
    pub negotiated: i32,
}

/// Block numbers returned by a block-of-type listing.
///
/// Produced by one query, bounded by the requested maximum, consumed once.
#[derive(Debug)]
pub struct BlockNumbers {
    inner: std::vec::IntoIter<u16>,
}

impl BlockNumbers {
    pub(crate) fn new(mut numbers: Vec<u16>, max_count: usize) -> Self {
        numbers.truncate(max_count);
        Self {
            inner: numbers.into_iter(),
        }
    }
}

impl Iterator for BlockNumbers {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for BlockNumbers {}

impl std::iter::FusedIterator for BlockNumbers {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_type_codes() {
        let all = [
            (BlockType::OB, 0x38),
            (BlockType::DB, 0x41),
            (BlockType::SDB, 0x42),
            (BlockType::FC, 0x43),
            (BlockType::SFC, 0x44),
            (BlockType::FB, 0x45),
            (BlockType::SFB, 0x46),
        ];
        for (block_type, code) in all {
            assert_eq!(block_type.code(), code);
            assert_eq!(BlockType::from_code(code), Some(block_type));
            assert_eq!(block_type.to_string().parse::<BlockType>().unwrap(), block_type);
        }
        assert_eq!(BlockType::from_code(0x40), None);
    }

    #[test]
    fn test_blocks_list_display() {
        let list = BlocksList {
            ob_count: 1,
            fb_count: 2,
            fc_count: 3,
            sfb_count: 4,
            sfc_count: 5,
            db_count: 6,
            sdb_count: 7,
        };
        assert_eq!(
            list.to_string(),
            "<block list count OB: 1 FB: 2 FC: 3 SFB: 4 SFC: 5 DB: 6 SDB: 7>"
        );
        assert_eq!(list.count(BlockType::DB), 6);
    }

    #[test]
    fn test_cpu_status() {
        assert_eq!(CpuStatus::from_code(0), CpuStatus::Unknown);
        assert_eq!(CpuStatus::from_code(4), CpuStatus::Stop);
        assert_eq!(CpuStatus::from_code(8), CpuStatus::Run);
        assert_eq!(CpuStatus::from_code(3), CpuStatus::Unknown);
        assert_eq!(CpuStatus::Run.to_string(), "S7CpuStatusRun");
    }

    #[test]
    fn test_block_numbers_bounded() {
        let mut numbers = BlockNumbers::new(vec![1, 2, 3, 4], 3);
        assert_eq!(numbers.len(), 3);
        assert_eq!(numbers.by_ref().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(numbers.next(), None);
    }
}
