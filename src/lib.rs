//! # S7 Session Library
//!
//! A Rust session layer for Siemens S7 PLCs. It sits on top of a protocol
//! [`Engine`] (the native Snap7 client with the `snap7` feature, or any other
//! implementation) and gives it a typed, validated and thread-safe face.
//!
//! This is a **session-only** library: the engine owns the wire protocol.
//! Each synchronous call is one engine round trip. No automatic retries,
//! caching or reconnection.
//!
//! ## Features
//!
//! - **Typed addressing**: areas and word lengths as enums, sizes checked before I/O
//! - **Parameters**: staged while disconnected, replayed at every connect
//! - **One error type**: every native code becomes an [`S7Error`] with an [`ErrorKind`]
//! - **Explicit lifecycle**: [`SessionState`] with a `Faulted` state after link loss
//! - **Async jobs**: submit, then poll or wait on a [`JobHandle`]
//! - **No panics**: all errors returned as `Result<T, S7Error>`
//!
//! ## Quick Start
//!
//! ```ignore
//! use s7_session::{Client, Snap7Engine, WordLen, Area};
//!
//! fn main() -> s7_session::Result<()> {
//!     let client = Client::new(Snap7Engine::new());
//!     client.connect("192.168.0.10", 0, 2, 102)?;
//!
//!     // 4 bytes of DB1 starting at byte 0
//!     let data = client.db_read(1, 0, 4)?;
//!     println!("DB1.DBB0..3 = {:02X?}", data);
//!
//!     // Two words of the marker area
//!     client.write_area(Area::Markers, 10, 2, WordLen::Word, &[0x12, 0x34, 0x56, 0x78])?;
//!
//!     client.disconnect()
//! }
//! ```
//!
//! ## Areas
//!
//! | Area | Native code | Natural word length |
//! |------|:-----------:|:-------------------:|
//! | [`Area::ProcessInputs`] | `0x81` | Byte |
//! | [`Area::ProcessOutputs`] | `0x82` | Byte |
//! | [`Area::Markers`] | `0x83` | Byte |
//! | [`Area::DataBlock`] | `0x84` | Byte |
//! | [`Area::Counters`] | `0x1C` | Counter |
//! | [`Area::Timers`] | `0x1D` | Timer |
//!
//! Buffer sizes follow `amount × width` (see [`layout`]). Timers and
//! counters only accept their own word length.
//!
//! ## Async Jobs
//!
//! ```
//! use s7_session::{Client, Completion, Engine};
//! use std::time::Duration;
//!
//! fn snapshot<E: Engine>(client: &Client<E>) -> s7_session::Result<Vec<u8>> {
//!     let handle = client.as_db_read(1, 0, 16)?;
//!     if let Completion::Done(bytes) = client.check_completion(&handle)? {
//!         return Ok(bytes);
//!     }
//!     // ... other work ...
//!     client.wait_completion(&handle, Duration::from_secs(2))
//! }
//! ```
//!
//! Only one job of each [`JobKind`] may be outstanding per session.
//!
//! ## Utility Functions
//!
//! The [`utils`] module reads and writes S7 data types in raw buffers:
//!
//! ```
//! use s7_session::utils::{get_bool, get_int, set_real, get_real};
//!
//! let mut db = [0u8; 8];
//! db[0] = 0b0000_0100;
//! db[2] = 0xFF;
//! db[3] = 0x38;
//!
//! assert!(get_bool(&db, 0, 2).unwrap());
//! assert_eq!(get_int(&db, 2).unwrap(), -200);
//!
//! set_real(&mut db, 4, 1.5).unwrap();
//! assert_eq!(get_real(&db, 4).unwrap(), 1.5);
//! ```
//!
//! ## Error Handling
//!
//! ```
//! use s7_session::{translate, codes, EngineCall, ErrorKind};
//!
//! let err = translate(codes::CLI_ADDRESS_OUT_OF_RANGE, EngineCall::Read).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::EngineReadFailure);
//! assert_eq!(err.native_code(), Some(codes::CLI_ADDRESS_OUT_OF_RANGE));
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod area;
mod client;
mod engine;
mod error;
mod event;
mod info;
mod job;
#[cfg(test)]
mod mock;
mod param;
mod session;
#[cfg(feature = "snap7")]
mod snap7;
pub mod utils;

// Public re-exports
pub use area::{decode, encode, layout, Area, Layout, Values, WordLen};
pub use client::{Client, ClientConfig, DEFAULT_POLL_INTERVAL, PASSWORD_LEN};
pub use engine::{
    run_blocking, ConnectTarget, ConnectionType, Engine, EngineJobId, JobRequest, JobStatus,
    PlcControl, Tsap, MAX_BLOCK_LIST, MAX_BLOCK_SIZE,
};
pub use error::{codes, error_text, translate, EngineCall, ErrorKind, Result, S7Error};
pub use event::{
    Event, ServerStatus, EVC_CLIENTS_DROPPED, EVC_CLIENT_ADDED, EVC_CLIENT_DISCONNECTED,
    EVC_CLIENT_EXCEPTION, EVC_CLIENT_NO_ROOM, EVC_CLIENT_REJECTED, EVC_CLIENT_TERMINATED,
    EVC_CLOCK, EVC_CONTROL, EVC_DATA_READ, EVC_DATA_WRITE, EVC_DIRECTORY, EVC_DOWNLOAD,
    EVC_LISTENER_CANNOT_START, EVC_NEGOTIATE_PDU, EVC_PDU_INCOMING, EVC_READ_SZL, EVC_SECURITY,
    EVC_SERVER_STARTED, EVC_SERVER_STOPPED, EVC_UPLOAD,
};
pub use info::{BlockInfo, BlockNumbers, BlockType, BlocksList, CpuStatus, PduLength};
pub use job::{Completion, JobHandle, JobKind, JobOutput};
pub use param::{access, Access, Param, ParamStore, Role, DEFAULT_S7_PORT};
pub use session::SessionState;
#[cfg(feature = "snap7")]
pub use snap7::{native_error_text, Snap7Engine};
