//! Error taxonomy and native result-code translation.
//!
//! The protocol engine reports every outcome as a signed 32-bit code. Zero
//! means success; any other value packs up to three independent fields:
//!
//! | Bits  | Field  | Meaning |
//! |-------|--------|---------|
//! | 0-15  | TCP    | socket error number (WSA numbering) |
//! | 16-19 | ISO    | ISO-on-TCP layer error |
//! | 20-27 | CLI    | client / CPU error |
//!
//! [`translate`] is the single place where such a code becomes an
//! [`S7Error`]. The [`EngineCall`] context only selects which engine-failure
//! variant is produced; the authorization, job-pending and unknown-code rules
//! apply to every call alike.
//!
//! # Example
//!
//! ```
//! use s7_session::{codes, translate, EngineCall, ErrorKind};
//!
//! assert!(translate(0, EngineCall::Read).is_ok());
//!
//! let err = translate(codes::CLI_ADDRESS_OUT_OF_RANGE, EngineCall::Read).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::EngineReadFailure);
//! assert_eq!(err.native_code(), Some(codes::CLI_ADDRESS_OUT_OF_RANGE));
//! ```

use thiserror::Error;

use crate::area::WordLen;
use crate::job::JobKind;
use crate::param::Param;

/// Result type alias for S7 session operations.
pub type Result<T> = std::result::Result<T, S7Error>;

/// Native result codes understood by the translator.
///
/// Engine implementations return these (or combinations of one value per
/// field) from every call.
pub mod codes {
    /// Mask of the TCP (socket) field.
    pub const TCP_MASK: i32 = 0x0000_FFFF;
    /// Mask of the ISO field.
    pub const ISO_MASK: i32 = 0x000F_0000;
    /// Mask of the client field.
    pub const CLI_MASK: i32 = 0x0FF0_0000;

    /// Socket: connection timed out.
    pub const TCP_TIMED_OUT: i32 = 10060;
    /// Socket: connection refused.
    pub const TCP_CONNECTION_REFUSED: i32 = 10061;
    /// Socket: connection reset by peer.
    pub const TCP_CONNECTION_RESET: i32 = 10054;

    /// ISO: connection error.
    pub const ISO_CONNECT: i32 = 0x0001_0000;
    /// ISO: disconnect error.
    pub const ISO_DISCONNECT: i32 = 0x0002_0000;
    /// ISO: invalid PDU received.
    pub const ISO_INVALID_PDU: i32 = 0x0003_0000;
    /// ISO: error during receive.
    pub const ISO_RECV_PACKET: i32 = 0x000A_0000;
    /// ISO: invalid TSAP parameters.
    pub const ISO_INVALID_PARAMS: i32 = 0x000B_0000;

    /// Client: PDU negotiation failed.
    pub const CLI_NEGOTIATING_PDU: i32 = 0x0010_0000;
    /// Client: invalid parameters.
    pub const CLI_INVALID_PARAMS: i32 = 0x0020_0000;
    /// Client: a job is already pending.
    pub const CLI_JOB_PENDING: i32 = 0x0030_0000;
    /// Client: invalid word length.
    pub const CLI_INVALID_WORD_LEN: i32 = 0x0050_0000;
    /// Client: address out of range.
    pub const CLI_ADDRESS_OUT_OF_RANGE: i32 = 0x0090_0000;
    /// Client: item not available.
    pub const CLI_ITEM_NOT_AVAILABLE: i32 = 0x00C0_0000;
    /// Client: cannot start the PLC.
    pub const CLI_CANNOT_START_PLC: i32 = 0x00E0_0000;
    /// Client: cannot stop the PLC.
    pub const CLI_CANNOT_STOP_PLC: i32 = 0x0100_0000;
    /// Client: cannot compress.
    pub const CLI_CANNOT_COMPRESS: i32 = 0x0120_0000;
    /// Client: function not available.
    pub const CLI_FUN_NOT_AVAILABLE: i32 = 0x0140_0000;
    /// Client: upload sequence failed.
    pub const CLI_UPLOAD_SEQUENCE_FAILED: i32 = 0x0150_0000;
    /// Client: invalid block size.
    pub const CLI_INVALID_BLOCK_SIZE: i32 = 0x0190_0000;
    /// Client: download sequence failed.
    pub const CLI_DOWNLOAD_SEQUENCE_FAILED: i32 = 0x01A0_0000;
    /// Client: function not authorized, password required.
    pub const CLI_NEED_PASSWORD: i32 = 0x01D0_0000;
    /// Client: invalid password.
    pub const CLI_INVALID_PASSWORD: i32 = 0x01E0_0000;
    /// Client: job timeout.
    pub const CLI_JOB_TIMEOUT: i32 = 0x0200_0000;
    /// Client: function refused by the CPU.
    pub const CLI_FUNCTION_REFUSED: i32 = 0x0230_0000;
    /// Client: invalid parameter number.
    pub const CLI_INVALID_PARAM_NUMBER: i32 = 0x0250_0000;
    /// Client: parameter cannot be changed now.
    pub const CLI_CANNOT_CHANGE_PARAM: i32 = 0x0260_0000;
}

/// Client-field messages, indexed by `(code & CLI_MASK) >> 20`.
const CLI_TEXT: [&str; 0x27] = [
    "",
    "PDU negotiation error",
    "Invalid parameters",
    "A job is already pending",
    "Too many items (>20) in multi read/write",
    "Invalid word length",
    "Partial data written",
    "Requested size exceeds the PDU",
    "Invalid answer from PLC",
    "Address out of range",
    "Invalid transport size",
    "Write data size mismatch",
    "Item not available",
    "Invalid value supplied",
    "Cannot start PLC",
    "PLC already in RUN",
    "Cannot stop PLC",
    "Cannot copy RAM to ROM",
    "Cannot compress",
    "PLC already in STOP",
    "Function not available",
    "Upload sequence failed",
    "Invalid data size received",
    "Invalid block type",
    "Invalid block number",
    "Invalid block size",
    "Download sequence failed",
    "Insert command refused",
    "Delete command refused",
    "Function not authorized for current protection level",
    "Invalid password",
    "No password to set or clear",
    "Job timeout",
    "Partial data read",
    "Buffer too small",
    "Function refused by CPU",
    "Client destroying",
    "Invalid parameter number",
    "Cannot change this parameter now",
];

/// ISO-field messages, indexed by `(code & ISO_MASK) >> 16`. Values past the
/// end are reserved.
const ISO_TEXT: [&str; 0x0C] = [
    "",
    "Connection error",
    "Disconnect error",
    "Bad format",
    "Bad data size passed to send/recv",
    "Null pointer passed",
    "Short packet received",
    "Too many packets without EoT flag",
    "Fragments data exceeded maximum packet size",
    "Send error",
    "Receive error",
    "Invalid TSAP params",
];

/// Which engine call produced a native code.
///
/// Used by [`translate`] to choose the engine-failure variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    /// Connection establishment.
    Connect,
    /// Disconnection.
    Disconnect,
    /// Area read (sync or async).
    Read,
    /// Area write (sync or async).
    Write,
    /// Block list / block info / status queries.
    Query,
    /// Parameter get or set.
    Param(Param),
    /// Block upload or download.
    Transfer,
    /// PLC start/stop, compress, copy RAM to ROM, session password.
    Control,
}

impl From<JobKind> for EngineCall {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::Read => EngineCall::Read,
            JobKind::Write => EngineCall::Write,
            JobKind::Upload | JobKind::Download => EngineCall::Transfer,
            JobKind::Compress | JobKind::CopyRamToRom => EngineCall::Control,
        }
    }
}

/// Fieldless mirror of [`S7Error`], handy for matching and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation requires a connected session.
    NotConnected,
    /// Connect requested while already connected.
    AlreadyConnected,
    /// Connect requested while the session is faulted.
    SessionFaulted,
    /// Word length not valid for the area or the values supplied.
    InvalidWordLength,
    /// Payload length does not match `amount × element width`.
    PayloadSizeMismatch,
    /// Session password is not exactly 8 characters.
    InvalidPasswordLength,
    /// Parameter illegal for the role or the current state.
    ParamNotSupported,
    /// Parameter value out of range.
    InvalidParamValue,
    /// Argument out of its domain (zero amount, oversized block number).
    InvalidArgument,
    /// PLC refused the function at the current protection level.
    AuthorizationRequired,
    /// A job of the same kind is already outstanding.
    OperationInProgress,
    /// Handle does not name an outstanding job.
    UnknownOperationHandle,
    /// Waiting for a job exceeded its deadline.
    Timeout,
    /// Engine refused the connection.
    EngineConnectFailure,
    /// Engine failed a read.
    EngineReadFailure,
    /// Engine failed a write.
    EngineWriteFailure,
    /// Engine failed a query.
    EngineQueryFailure,
    /// Engine failed an upload or download.
    EngineTransferFailure,
    /// Engine failed a control operation.
    EngineControlFailure,
    /// Native code outside the known code space.
    UnknownNativeError,
}

/// Errors produced by the S7 session layer.
///
/// Local validation failures are raised before the engine is touched and never
/// carry a native code. Every engine-originated variant carries the raw code
/// and the text from [`error_text`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum S7Error {
    /// Operation requires a connected session.
    #[error("Not connected")]
    NotConnected,

    /// Connect requested while already connected.
    #[error("Already connected")]
    AlreadyConnected,

    /// Connect requested while the session is faulted.
    #[error("Session faulted: disconnect before reconnecting")]
    SessionFaulted,

    /// Word length not valid for the requested area or values.
    #[error("Invalid word length {word_len}: {reason}")]
    InvalidWordLength {
        /// Offending word length.
        word_len: WordLen,
        /// Why it was rejected.
        reason: String,
    },

    /// Payload length does not match the request layout.
    #[error("Payload size mismatch: expected {expected} bytes, got {actual}")]
    PayloadSizeMismatch {
        /// `amount × element width`.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Session password must be exactly 8 characters.
    #[error("Invalid password length: expected 8 characters, got {length}")]
    InvalidPasswordLength {
        /// Length supplied.
        length: usize,
    },

    /// Parameter not legal for this role or state.
    #[error("Parameter {param} not supported: {reason}")]
    ParamNotSupported {
        /// Parameter concerned.
        param: Param,
        /// Why it was rejected.
        reason: String,
        /// Native code, when the engine refused it.
        code: Option<i32>,
    },

    /// Parameter value outside its documented range.
    #[error("Invalid value {value} for parameter {param}")]
    InvalidParamValue {
        /// Parameter concerned.
        param: Param,
        /// Rejected value.
        value: i32,
    },

    /// Argument outside its domain.
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        /// Argument name.
        argument: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// PLC requires a session password for this function.
    #[error("Authorization required: {message} (code 0x{code:08X})")]
    AuthorizationRequired {
        /// Native code.
        code: i32,
        /// Native text.
        message: String,
    },

    /// A job is already outstanding.
    #[error("Operation already in progress{}", job_suffix(.kind))]
    OperationInProgress {
        /// Kind of the blocking job, when known locally.
        kind: Option<JobKind>,
        /// Native code, when the engine reported the conflict.
        code: Option<i32>,
    },

    /// Handle does not refer to an outstanding job.
    #[error("Unknown operation handle #{id}")]
    UnknownOperationHandle {
        /// Handle id.
        id: u64,
    },

    /// `wait_completion` deadline elapsed; the job is still pending.
    #[error("Timed out waiting for {kind} operation")]
    Timeout {
        /// Kind of the job waited on.
        kind: JobKind,
    },

    /// Engine refused the connection.
    #[error("Connect failed: {message} (code 0x{code:08X})")]
    EngineConnectFailure {
        /// Native code.
        code: i32,
        /// Native text.
        message: String,
    },

    /// Engine failed a read.
    #[error("Read failed: {message} (code 0x{code:08X})")]
    EngineReadFailure {
        /// Native code.
        code: i32,
        /// Native text.
        message: String,
    },

    /// Engine failed a write.
    #[error("Write failed: {message} (code 0x{code:08X})")]
    EngineWriteFailure {
        /// Native code.
        code: i32,
        /// Native text.
        message: String,
    },

    /// Engine failed a query.
    #[error("Query failed: {message} (code 0x{code:08X})")]
    EngineQueryFailure {
        /// Native code.
        code: i32,
        /// Native text.
        message: String,
    },

    /// Engine failed a block transfer.
    #[error("Transfer failed: {message} (code 0x{code:08X})")]
    EngineTransferFailure {
        /// Native code.
        code: i32,
        /// Native text.
        message: String,
    },

    /// Engine failed a control operation.
    #[error("Control operation failed: {message} (code 0x{code:08X})")]
    EngineControlFailure {
        /// Native code.
        code: i32,
        /// Native text.
        message: String,
    },

    /// Native code outside the known code space.
    #[error("Unknown native error 0x{code:08X}: {message}")]
    UnknownNativeError {
        /// Native code.
        code: i32,
        /// Generic text.
        message: String,
    },
}

impl S7Error {
    /// Creates a new `InvalidWordLength` error.
    pub fn invalid_word_len(word_len: WordLen, reason: impl Into<String>) -> Self {
        Self::InvalidWordLength {
            word_len,
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidArgument` error.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_session::S7Error;
    ///
    /// let err = S7Error::invalid_argument("amount", "must be greater than 0");
    /// assert_eq!(err.to_string(), "Invalid argument 'amount': must be greater than 0");
    /// ```
    pub fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    /// Creates a locally detected `ParamNotSupported` error.
    pub fn param_not_supported(param: Param, reason: impl Into<String>) -> Self {
        Self::ParamNotSupported {
            param,
            reason: reason.into(),
            code: None,
        }
    }

    /// Returns the fieldless kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            S7Error::NotConnected => ErrorKind::NotConnected,
            S7Error::AlreadyConnected => ErrorKind::AlreadyConnected,
            S7Error::SessionFaulted => ErrorKind::SessionFaulted,
            S7Error::InvalidWordLength { .. } => ErrorKind::InvalidWordLength,
            S7Error::PayloadSizeMismatch { .. } => ErrorKind::PayloadSizeMismatch,
            S7Error::InvalidPasswordLength { .. } => ErrorKind::InvalidPasswordLength,
            S7Error::ParamNotSupported { .. } => ErrorKind::ParamNotSupported,
            S7Error::InvalidParamValue { .. } => ErrorKind::InvalidParamValue,
            S7Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            S7Error::AuthorizationRequired { .. } => ErrorKind::AuthorizationRequired,
            S7Error::OperationInProgress { .. } => ErrorKind::OperationInProgress,
            S7Error::UnknownOperationHandle { .. } => ErrorKind::UnknownOperationHandle,
            S7Error::Timeout { .. } => ErrorKind::Timeout,
            S7Error::EngineConnectFailure { .. } => ErrorKind::EngineConnectFailure,
            S7Error::EngineReadFailure { .. } => ErrorKind::EngineReadFailure,
            S7Error::EngineWriteFailure { .. } => ErrorKind::EngineWriteFailure,
            S7Error::EngineQueryFailure { .. } => ErrorKind::EngineQueryFailure,
            S7Error::EngineTransferFailure { .. } => ErrorKind::EngineTransferFailure,
            S7Error::EngineControlFailure { .. } => ErrorKind::EngineControlFailure,
            S7Error::UnknownNativeError { .. } => ErrorKind::UnknownNativeError,
        }
    }

    /// Returns the native engine code, if the engine produced this error.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            S7Error::AuthorizationRequired { code, .. }
            | S7Error::EngineConnectFailure { code, .. }
            | S7Error::EngineReadFailure { code, .. }
            | S7Error::EngineWriteFailure { code, .. }
            | S7Error::EngineQueryFailure { code, .. }
            | S7Error::EngineTransferFailure { code, .. }
            | S7Error::EngineControlFailure { code, .. }
            | S7Error::UnknownNativeError { code, .. } => Some(*code),
            S7Error::ParamNotSupported { code, .. } | S7Error::OperationInProgress { code, .. } => {
                *code
            }
            _ => None,
        }
    }

    /// Returns `true` when the error means the link to the PLC is gone.
    ///
    /// A connected session that sees such an error moves to `Faulted`.
    pub fn is_link_failure(&self) -> bool {
        self.native_code().is_some_and(is_link_code)
    }
}

fn job_suffix(kind: &Option<JobKind>) -> String {
    kind.map(|k| format!(" ({k})")).unwrap_or_default()
}

/// Returns whether a native code carries a TCP or ISO field.
pub(crate) fn is_link_code(code: i32) -> bool {
    code > 0 && code & (codes::TCP_MASK | codes::ISO_MASK) != 0
}

fn tcp_text(error: i32) -> String {
    let text = match error {
        10004 => "Interrupted function call",
        10013 => "Permission denied",
        10035 => "Resource temporarily unavailable",
        10038 => "Socket operation on nonsocket",
        10048 => "Address already in use",
        10049 => "Cannot assign requested address",
        10050 => "Network is down",
        10051 => "Network is unreachable",
        10053 => "Software caused connection abort",
        codes::TCP_CONNECTION_RESET => "Connection reset by peer",
        10055 => "No buffer space available",
        10056 => "Socket is already connected",
        10057 => "Socket is not connected",
        codes::TCP_TIMED_OUT => "Connection timed out",
        codes::TCP_CONNECTION_REFUSED => "Connection refused",
        10065 => "No route to host",
        _ => return format!("Other socket error ({error})"),
    };
    text.to_string()
}

/// Splits a code into its (tcp, iso, cli) fields, or `None` if any field is
/// outside the known code space.
fn fields(code: i32) -> Option<(i32, usize, usize)> {
    if code < 0 || code & !(codes::TCP_MASK | codes::ISO_MASK | codes::CLI_MASK) != 0 {
        return None;
    }
    let tcp = code & codes::TCP_MASK;
    let iso = ((code & codes::ISO_MASK) >> 16) as usize;
    let cli = ((code & codes::CLI_MASK) >> 20) as usize;
    if iso >= ISO_TEXT.len() || cli >= CLI_TEXT.len() {
        return None;
    }
    Some((tcp, iso, cli))
}

/// Returns the human-readable text of a native code.
///
/// Pure and total: codes outside the known space render as a generic message.
///
/// # Example
///
/// ```
/// use s7_session::{codes, error_text};
///
/// assert_eq!(error_text(0), "OK");
/// assert_eq!(error_text(codes::CLI_INVALID_PASSWORD), "CLI : Invalid password");
/// assert_eq!(
///     error_text(codes::ISO_CONNECT | codes::TCP_CONNECTION_REFUSED),
///     "TCP : Connection refused - ISO : Connection error"
/// );
/// ```
pub fn error_text(code: i32) -> String {
    if code == 0 {
        return "OK".to_string();
    }
    let Some((tcp, iso, cli)) = fields(code) else {
        return format!("Unknown error (0x{code:08X})");
    };

    let mut parts = Vec::with_capacity(3);
    if tcp != 0 {
        parts.push(format!("TCP : {}", tcp_text(tcp)));
    }
    if iso != 0 {
        parts.push(format!("ISO : {}", ISO_TEXT[iso]));
    }
    if cli != 0 {
        parts.push(format!("CLI : {}", CLI_TEXT[cli]));
    }
    parts.join(" - ")
}

/// Translates a native result code into a session outcome.
///
/// - `0` is success.
/// - Codes outside the known space become [`S7Error::UnknownNativeError`].
/// - The password codes become [`S7Error::AuthorizationRequired`].
/// - The job-pending code becomes [`S7Error::OperationInProgress`].
/// - In a parameter context, the parameter-number codes become
///   [`S7Error::ParamNotSupported`].
/// - Everything else becomes the engine-failure variant of `call`.
pub fn translate(code: i32, call: EngineCall) -> Result<()> {
    if code == 0 {
        return Ok(());
    }
    let message = error_text(code);
    let Some((_, _, cli)) = fields(code) else {
        return Err(S7Error::UnknownNativeError { code, message });
    };

    let cli_code = (cli as i32) << 20;
    match cli_code {
        codes::CLI_NEED_PASSWORD | codes::CLI_INVALID_PASSWORD => {
            return Err(S7Error::AuthorizationRequired { code, message })
        }
        codes::CLI_JOB_PENDING => {
            return Err(S7Error::OperationInProgress {
                kind: None,
                code: Some(code),
            });
        }
        _ => {}
    }

    Err(match call {
        EngineCall::Param(param)
            if cli_code == codes::CLI_INVALID_PARAM_NUMBER
                || cli_code == codes::CLI_CANNOT_CHANGE_PARAM =>
        {
            S7Error::ParamNotSupported {
                param,
                reason: message,
                code: Some(code),
            }
        }
        EngineCall::Connect => S7Error::EngineConnectFailure { code, message },
        EngineCall::Read => S7Error::EngineReadFailure { code, message },
        EngineCall::Write => S7Error::EngineWriteFailure { code, message },
        EngineCall::Query | EngineCall::Param(_) => S7Error::EngineQueryFailure { code, message },
        EngineCall::Transfer => S7Error::EngineTransferFailure { code, message },
        EngineCall::Disconnect | EngineCall::Control => {
            S7Error::EngineControlFailure { code, message }
        }
    })
}
