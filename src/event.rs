//! Server/partner event records.
//!
//! A session acting as the event-receiving side gets one [`Event`] per
//! notification. Events are immutable: they are built once from the engine's
//! record and only ever rendered.

use std::net::Ipv4Addr;

/// Server started.
pub const EVC_SERVER_STARTED: u32 = 0x0000_0001;
/// Server stopped.
pub const EVC_SERVER_STOPPED: u32 = 0x0000_0002;
/// Listener could not start.
pub const EVC_LISTENER_CANNOT_START: u32 = 0x0000_0004;
/// Client connection accepted.
pub const EVC_CLIENT_ADDED: u32 = 0x0000_0008;
/// Client connection refused.
pub const EVC_CLIENT_REJECTED: u32 = 0x0000_0010;
/// Client refused, no free slot.
pub const EVC_CLIENT_NO_ROOM: u32 = 0x0000_0020;
/// Client raised an exception.
pub const EVC_CLIENT_EXCEPTION: u32 = 0x0000_0040;
/// Client disconnected by peer.
pub const EVC_CLIENT_DISCONNECTED: u32 = 0x0000_0080;
/// Client terminated by the server.
pub const EVC_CLIENT_TERMINATED: u32 = 0x0000_0100;
/// Clients dropped at shutdown.
pub const EVC_CLIENTS_DROPPED: u32 = 0x0000_0200;
/// PDU received.
pub const EVC_PDU_INCOMING: u32 = 0x0001_0000;
/// Data read request.
pub const EVC_DATA_READ: u32 = 0x0002_0000;
/// Data write request.
pub const EVC_DATA_WRITE: u32 = 0x0004_0000;
/// PDU negotiation.
pub const EVC_NEGOTIATE_PDU: u32 = 0x0008_0000;
/// SZL read request.
pub const EVC_READ_SZL: u32 = 0x0010_0000;
/// Clock request.
pub const EVC_CLOCK: u32 = 0x0020_0000;
/// Block upload request.
pub const EVC_UPLOAD: u32 = 0x0040_0000;
/// Block download request.
pub const EVC_DOWNLOAD: u32 = 0x0080_0000;
/// Directory request.
pub const EVC_DIRECTORY: u32 = 0x0100_0000;
/// Security request.
pub const EVC_SECURITY: u32 = 0x0200_0000;
/// Control request.
pub const EVC_CONTROL: u32 = 0x0400_0000;

/// One server/partner notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    time: u64,
    sender: i32,
    code: u32,
    ret_code: u16,
    params: [u16; 4],
}

impl Event {
    /// Builds an event from the engine's record.
    pub fn new(time: u64, sender: i32, code: u32, ret_code: u16, params: [u16; 4]) -> Self {
        Self {
            time,
            sender,
            code,
            ret_code,
            params,
        }
    }

    /// Seconds since the Unix epoch.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Raw sender id (IPv4 address in network byte order).
    pub fn sender(&self) -> i32 {
        self.sender
    }

    /// Sender as an IPv4 address.
    pub fn sender_addr(&self) -> Ipv4Addr {
        let [a, b, c, d] = self.sender.to_le_bytes();
        Ipv4Addr::new(a, b, c, d)
    }

    /// Event code (one of the `EVC_*` bits).
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Return code of the request the event describes.
    pub fn ret_code(&self) -> u16 {
        self.ret_code
    }

    /// The four word-sized parameters.
    pub fn params(&self) -> [u16; 4] {
        self.params
    }

    /// Returns whether the event passes a mask of `EVC_*` bits.
    pub fn matches(&self, mask: u32) -> bool {
        self.code & mask != 0
    }

    /// Human-readable description.
    ///
    /// ```
    /// use s7_session::{Event, EVC_DATA_READ};
    ///
    /// let event = Event::new(0, 0x0100_007F, EVC_DATA_READ, 0, [0x84, 1, 0, 4]);
    /// assert_eq!(
    ///     event.text(),
    ///     "127.0.0.1 Read request, Area : 0x84, Number : 1, Start : 0, Size : 4 --> OK"
    /// );
    /// ```
    pub fn text(&self) -> String {
        let [p1, p2, p3, p4] = self.params;
        let result = if self.ret_code == 0 {
            "OK".to_string()
        } else {
            format!("error 0x{:04X}", self.ret_code)
        };
        let what = match self.code {
            EVC_SERVER_STARTED => "Server started".to_string(),
            EVC_SERVER_STOPPED => "Server stopped".to_string(),
            EVC_LISTENER_CANNOT_START => "Listener cannot start".to_string(),
            EVC_CLIENT_ADDED => "Client added".to_string(),
            EVC_CLIENT_REJECTED => "Client refused".to_string(),
            EVC_CLIENT_NO_ROOM => "Client refused, maximum connections reached".to_string(),
            EVC_CLIENT_EXCEPTION => "Client exception".to_string(),
            EVC_CLIENT_DISCONNECTED => "Client disconnected by peer".to_string(),
            EVC_CLIENT_TERMINATED => "Client terminated".to_string(),
            EVC_CLIENTS_DROPPED => format!("{p1} clients were dropped"),
            EVC_PDU_INCOMING => "PDU incoming".to_string(),
            EVC_DATA_READ => format!(
                "Read request, Area : 0x{p1:02X}, Number : {p2}, Start : {p3}, Size : {p4} --> {result}"
            ),
            EVC_DATA_WRITE => format!(
                "Write request, Area : 0x{p1:02X}, Number : {p2}, Start : {p3}, Size : {p4} --> {result}"
            ),
            EVC_NEGOTIATE_PDU => format!("PDU negotiation, requested {p1} bytes --> {result}"),
            EVC_READ_SZL => {
                format!("Read SZL request, ID : 0x{p1:04X}, Index : 0x{p2:04X} --> {result}")
            }
            EVC_CLOCK => format!("Clock request --> {result}"),
            EVC_UPLOAD => format!("Block upload request --> {result}"),
            EVC_DOWNLOAD => format!("Block download request --> {result}"),
            EVC_DIRECTORY => format!("Block directory request --> {result}"),
            EVC_SECURITY => format!("Security request --> {result}"),
            EVC_CONTROL => format!("Control request --> {result}"),
            other => format!("Unknown event (0x{other:08X})"),
        };
        format!("{} {what}", self.sender_addr())
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<event time: {} sender: {} code: {} retcode: {} param1: {} param2: {} param3: {} param4: {}>",
            self.time,
            self.sender,
            self.code,
            self.ret_code,
            self.params[0],
            self.params[1],
            self.params[2],
            self.params[3]
        )
    }
}

/// Run state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerStatus {
    /// Not listening.
    Stopped,
    /// Listening.
    Running,
    /// Listener failed.
    Error,
}

impl ServerStatus {
    /// Maps the native status code (0, 1, 2).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ServerStatus::Stopped),
            1 => Some(ServerStatus::Running),
            2 => Some(ServerStatus::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let event = Event::new(1_700_000_000, 42, EVC_CLIENT_ADDED, 0, [1, 2, 3, 4]);
        assert_eq!(
            event.to_string(),
            "<event time: 1700000000 sender: 42 code: 8 retcode: 0 param1: 1 param2: 2 param3: 3 param4: 4>"
        );
    }

    #[test]
    fn test_text_of_write_error() {
        let event = Event::new(0, 0x0A00_A8C0, EVC_DATA_WRITE, 0x0005, [0x83, 0, 10, 2]);
        assert_eq!(
            event.text(),
            "192.168.0.10 Write request, Area : 0x83, Number : 0, Start : 10, Size : 2 --> error 0x0005"
        );
    }

    #[test]
    fn test_unknown_event_text() {
        let event = Event::new(0, 0, 0x8000_0000, 0, [0; 4]);
        assert!(event.text().ends_with("Unknown event (0x80000000)"));
    }

    #[test]
    fn test_mask() {
        let event = Event::new(0, 0, EVC_DATA_READ, 0, [0; 4]);
        assert!(event.matches(EVC_DATA_READ | EVC_DATA_WRITE));
        assert!(!event.matches(EVC_CLIENT_ADDED));
    }

    #[test]
    fn test_server_status() {
        assert_eq!(ServerStatus::from_code(1), Some(ServerStatus::Running));
        assert_eq!(ServerStatus::from_code(9), None);
    }
}
