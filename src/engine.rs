//! Boundary to the external S7 protocol engine.
//!
//! The engine owns everything below the session layer: ISO-on-TCP framing,
//! socket I/O and PDU negotiation. This crate only talks to it through the
//! narrow [`Engine`] trait, whose methods mirror the native call interface:
//! each returns a raw result code (0 = success) that
//! [`translate`](crate::translate) turns into an outcome.
//!
//! # Design
//!
//! - **Protocol agnostic** - the session never builds or parses frames
//! - **Codes, not errors** - the engine reports native codes; only the
//!   translator interprets them
//! - **One handle** - an engine value is one native client handle, owned by
//!   exactly one session and released when dropped
//!
//! Sync and async transfers share [`JobRequest`]: [`run_blocking`] maps a
//! request onto the blocking calls, [`Engine::submit`] hands the same request
//! to the engine's job machinery.

use crate::area::{Area, WordLen};
use crate::info::{BlockInfo, BlockType, BlocksList, PduLength};
use crate::param::{Param, DEFAULT_S7_PORT};

/// Largest block image an upload can return.
pub const MAX_BLOCK_SIZE: usize = 65536;

/// Most block numbers a single block-of-type listing can return.
pub const MAX_BLOCK_LIST: usize = 0x2000;

/// Engine-side id of a submitted job.
pub type EngineJobId = u32;

/// Connection type, the high byte of the remote TSAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionType(pub u16);

impl ConnectionType {
    /// Programming device (default).
    pub const PG: ConnectionType = ConnectionType(0x01);
    /// Operator panel.
    pub const OP: ConnectionType = ConnectionType(0x02);
    /// S7 basic communication.
    pub const S7_BASIC: ConnectionType = ConnectionType(0x03);
}

impl Default for ConnectionType {
    fn default() -> Self {
        Self::PG
    }
}

/// Explicit TSAP pair, for hardware addressed without rack/slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tsap {
    /// Client TSAP.
    pub local: u16,
    /// PLC TSAP.
    pub remote: u16,
}

/// Everything the engine needs to open a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// PLC IPv4 address.
    pub address: String,
    /// CPU rack.
    pub rack: u16,
    /// CPU slot.
    pub slot: u16,
    /// TCP port.
    pub port: u16,
    /// Connection type.
    pub connection_type: ConnectionType,
    /// Explicit TSAPs, overriding rack/slot.
    pub tsap: Option<Tsap>,
}

impl ConnectTarget {
    /// Creates a rack/slot target on the default port.
    pub fn new(address: impl Into<String>, rack: u16, slot: u16) -> Self {
        Self {
            address: address.into(),
            rack,
            slot,
            port: DEFAULT_S7_PORT,
            connection_type: ConnectionType::default(),
            tsap: None,
        }
    }

    /// Returns the TSAP pair the connection request will carry.
    ///
    /// ```
    /// use s7_session::{ConnectTarget, Tsap};
    ///
    /// // S7-300: rack 0, slot 2, as PG
    /// let target = ConnectTarget::new("10.0.0.2", 0, 2);
    /// assert_eq!(target.tsap(), Tsap { local: 0x0100, remote: 0x0102 });
    /// ```
    pub fn tsap(&self) -> Tsap {
        self.tsap.unwrap_or(Tsap {
            local: 0x0100,
            remote: (self.connection_type.0 << 8) + self.rack * 0x20 + self.slot,
        })
    }
}

/// PLC run control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlcControl {
    /// Put the CPU in STOP.
    Stop,
    /// Warm restart.
    HotStart,
    /// Cold restart.
    ColdStart,
}

/// A data transfer or long-running PLC job, as submitted to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    /// Read `amount` elements.
    ReadArea {
        /// Area to read.
        area: Area,
        /// Start offset.
        start: u32,
        /// Element count.
        amount: usize,
        /// Element width.
        word_len: WordLen,
    },
    /// Write `amount` elements.
    WriteArea {
        /// Area to write.
        area: Area,
        /// Start offset.
        start: u32,
        /// Element count.
        amount: usize,
        /// Element width.
        word_len: WordLen,
        /// Encoded payload, exactly `amount × width` bytes.
        data: Vec<u8>,
    },
    /// Upload a block image from the PLC.
    Upload {
        /// Block type.
        block_type: BlockType,
        /// Block number.
        number: u16,
    },
    /// Download a block image into the PLC.
    Download {
        /// Target number, or `None` to keep the number stored in the image.
        number: Option<u16>,
        /// Block image.
        data: Vec<u8>,
    },
    /// Compress PLC memory.
    Compress {
        /// Engine-side timeout.
        timeout_ms: u32,
    },
    /// Copy RAM to ROM.
    CopyRamToRom {
        /// Engine-side timeout.
        timeout_ms: u32,
    },
}

impl JobRequest {
    /// Bytes a successful read returns, if this is a read.
    pub fn expected_len(&self) -> Option<usize> {
        match self {
            JobRequest::ReadArea {
                amount, word_len, ..
            } => Some(amount * word_len.width()),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobRequest::ReadArea {
                area,
                start,
                amount,
                word_len,
            } => write!(f, "read {area} start {start} amount {amount} {word_len}"),
            JobRequest::WriteArea {
                area,
                start,
                amount,
                word_len,
                ..
            } => write!(f, "write {area} start {start} amount {amount} {word_len}"),
            JobRequest::Upload { block_type, number } => write!(f, "upload {block_type}{number}"),
            JobRequest::Download { number, data } => match number {
                Some(n) => write!(f, "download block {n} ({} bytes)", data.len()),
                None => write!(f, "download block ({} bytes)", data.len()),
            },
            JobRequest::Compress { timeout_ms } => write!(f, "compress ({timeout_ms} ms)"),
            JobRequest::CopyRamToRom { timeout_ms } => {
                write!(f, "copy ram to rom ({timeout_ms} ms)")
            }
        }
    }
}

/// State of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Still running.
    Pending,
    /// Finished; the accompanying code is the job's result.
    Complete,
}

/// Native call interface of an S7 protocol engine.
///
/// Every method returns the native result code last; `0` means success. Out
/// values are only meaningful on success.
pub trait Engine: Send {
    /// Opens the connection.
    ///
    /// The engine applies `target.port` as its `RemotePort` parameter: the
    /// session never replays that parameter through [`set_param`](Engine::set_param),
    /// so a later `get_param(RemotePort)` must report the port connected to.
    fn connect(&mut self, target: &ConnectTarget) -> i32;

    /// Closes the connection.
    fn disconnect(&mut self) -> i32;

    /// Reads a parameter: `(value, code)`.
    fn get_param(&mut self, param: Param) -> (i32, i32);

    /// Writes a parameter.
    fn set_param(&mut self, param: Param, value: i32) -> i32;

    /// Reads `amount` elements into `buf`, which is exactly the layout size.
    fn read_area(
        &mut self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
        buf: &mut [u8],
    ) -> i32;

    /// Writes `amount` elements from `data`.
    fn write_area(
        &mut self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
        data: &[u8],
    ) -> i32;

    /// Counts blocks per type.
    fn list_blocks(&mut self) -> (BlocksList, i32);

    /// Fills `buf` with block numbers: `(count, code)`.
    fn list_blocks_of_type(&mut self, block_type: BlockType, buf: &mut [u16]) -> (usize, i32);

    /// Reads a block header.
    fn block_info(&mut self, block_type: BlockType, number: u16) -> (BlockInfo, i32);

    /// Uploads a block image into `buf`: `(size, code)`.
    fn upload(&mut self, block_type: BlockType, number: u16, buf: &mut [u8]) -> (usize, i32);

    /// Downloads a block image.
    fn download(&mut self, number: Option<u16>, data: &[u8]) -> i32;

    /// Runs a start/stop command.
    fn plc_control(&mut self, command: PlcControl) -> i32;

    /// Compresses PLC memory.
    fn compress(&mut self, timeout_ms: u32) -> i32;

    /// Copies RAM to ROM.
    fn copy_ram_to_rom(&mut self, timeout_ms: u32) -> i32;

    /// Reads the CPU run state: `(status code, code)`.
    fn plc_status(&mut self) -> (i32, i32);

    /// Sends the session password.
    fn set_session_password(&mut self, password: &str) -> i32;

    /// Clears the session password.
    fn clear_session_password(&mut self) -> i32;

    /// Reads the requested and negotiated PDU sizes.
    fn pdu_length(&mut self) -> (PduLength, i32);

    /// Starts a job and returns at once: `(job id, code)`.
    fn submit(&mut self, request: &JobRequest) -> (EngineJobId, i32);

    /// Polls a job. On `Complete`, the code is the job result and `data`
    /// holds the bytes a read or upload produced.
    fn check_completion(&mut self, job: EngineJobId, data: &mut Vec<u8>) -> (JobStatus, i32);
}

/// Runs a job request through the blocking calls of `engine`.
///
/// `out` receives the bytes of a read or upload.
pub fn run_blocking<E: Engine + ?Sized>(
    engine: &mut E,
    request: &JobRequest,
    out: &mut Vec<u8>,
) -> i32 {
    match request {
        JobRequest::ReadArea {
            area,
            start,
            amount,
            word_len,
        } => {
            out.clear();
            out.resize(amount * word_len.width(), 0);
            engine.read_area(*area, *start, *amount, *word_len, out)
        }
        JobRequest::WriteArea {
            area,
            start,
            amount,
            word_len,
            data,
        } => engine.write_area(*area, *start, *amount, *word_len, data),
        JobRequest::Upload { block_type, number } => {
            out.clear();
            out.resize(MAX_BLOCK_SIZE, 0);
            let (size, code) = engine.upload(*block_type, *number, out);
            out.truncate(size.min(MAX_BLOCK_SIZE));
            code
        }
        JobRequest::Download { number, data } => engine.download(*number, data),
        JobRequest::Compress { timeout_ms } => engine.compress(*timeout_ms),
        JobRequest::CopyRamToRom { timeout_ms } => engine.copy_ram_to_rom(*timeout_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    #[test]
    fn test_default_constants() {
        assert_eq!(MAX_BLOCK_SIZE, 65536);
        assert_eq!(MAX_BLOCK_LIST, 0x2000);
        assert_eq!(ConnectionType::default(), ConnectionType::PG);
    }

    #[test]
    fn test_tsap_from_rack_slot() {
        let mut target = ConnectTarget::new("192.168.0.1", 1, 3);
        target.connection_type = ConnectionType::OP;
        assert_eq!(
            target.tsap(),
            Tsap {
                local: 0x0100,
                remote: 0x0223
            }
        );

        target.tsap = Some(Tsap {
            local: 0x1000,
            remote: 0x2000,
        });
        assert_eq!(target.tsap().remote, 0x2000);
    }

    #[test]
    fn test_run_blocking_read_sizes_buffer() {
        let mut engine = MockEngine::new();
        engine.handle().connected = true;
        let request = JobRequest::ReadArea {
            area: Area::DataBlock(1),
            start: 0,
            amount: 3,
            word_len: WordLen::Word,
        };
        let mut out = vec![0xAA; 100];
        assert_eq!(run_blocking(&mut engine, &request, &mut out), 0);
        assert_eq!(out, vec![0; 6]);
        assert_eq!(request.expected_len(), Some(6));
    }

    #[test]
    fn test_request_display() {
        let request = JobRequest::WriteArea {
            area: Area::Markers,
            start: 4,
            amount: 2,
            word_len: WordLen::Byte,
            data: vec![1, 2],
        };
        assert_eq!(request.to_string(), "write MK start 4 amount 2 Byte");
        assert_eq!(
            JobRequest::Upload {
                block_type: BlockType::DB,
                number: 3
            }
            .to_string(),
            "upload DB3"
        );
    }
}
