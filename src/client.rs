//! S7 client session and its synchronous façade.
//!
//! This module provides the [`Client`] struct, the primary interface for
//! talking to a Siemens S7 PLC through a protocol [`Engine`].
//!
//! # Overview
//!
//! The client handles:
//! - The connection lifecycle (see [`SessionState`])
//! - Parameter staging and the client-role legality table
//! - Input validation before anything reaches the engine
//! - Translating native result codes into [`S7Error`]
//!
//! Every synchronous operation is one blocking engine round trip:
//! validate inputs, require `Connected`, call the engine, translate the code,
//! decode the result. No retries, caching or reconnection.
//!
//! # Example
//!
//! ```
//! use s7_session::{Area, Client, Engine, WordLen};
//!
//! fn tank_level<E: Engine>(client: &Client<E>) -> s7_session::Result<f32> {
//!     client.connect("192.168.0.10", 0, 2, 102)?;
//!     let bytes = client.read_area(Area::DataBlock(10), 4, 1, WordLen::Real)?;
//!     s7_session::utils::get_real(&bytes, 0)
//! }
//! ```
//!
//! # Configuration
//!
//! [`ClientConfig`] bundles everything a connect needs:
//! - PLC address, rack and slot (or an explicit TSAP pair)
//! - TCP port and connection type
//! - Parameter overrides replayed at connect
//! - Poll interval of [`Client::wait_completion`]
//!
//! # Thread Safety
//!
//! A `Client` serializes engine calls through an internal lock: only one
//! engine call is ever in flight per session. State queries take a shared
//! lock and never wait on each other. `Client<E>` is `Send + Sync` when the
//! engine is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::{debug, info};

use crate::area::{decode, encode, Area, Values, WordLen};
use crate::engine::{ConnectionType, Engine, PlcControl, Tsap, MAX_BLOCK_LIST};
use crate::error::{error_text, EngineCall, Result, S7Error};
use crate::info::{BlockInfo, BlockNumbers, BlockType, BlocksList, CpuStatus, PduLength};
use crate::job::Job;
use crate::param::{Param, Role, DEFAULT_S7_PORT};
use crate::session::{Session, SessionState};

/// Default poll interval of [`Client::wait_completion`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Length of a session password.
pub const PASSWORD_LEN: usize = 8;

/// Configuration for connecting a client.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
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
    /// Explicit TSAP pair, overriding rack/slot.
    pub tsap: Option<Tsap>,
    /// Parameter overrides, applied in order.
    pub params: Vec<(Param, i32)>,
    /// Poll interval of `wait_completion`.
    pub poll_interval: Duration,
}

impl ClientConfig {
    /// Creates a configuration with the required addressing.
    ///
    /// Uses port 102, a PG connection and no parameter overrides.
    ///
    /// # Arguments
    ///
    /// * `address` - PLC IPv4 address
    /// * `rack` - CPU rack (0 for S7-300/1200/1500)
    /// * `slot` - CPU slot (2 for S7-300, 1 or 0 for S7-1200/1500)
    ///
    /// # Example
    ///
    /// ```
    /// use s7_session::ClientConfig;
    ///
    /// let config = ClientConfig::new("192.168.0.10", 0, 2);
    /// assert_eq!(config.port, 102);
    /// ```
    pub fn new(address: impl Into<String>, rack: u16, slot: u16) -> Self {
        Self {
            address: address.into(),
            rack,
            slot,
            port: DEFAULT_S7_PORT,
            connection_type: ConnectionType::default(),
            tsap: None,
            params: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets a custom TCP port (default is 102).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connection type (default is PG).
    ///
    /// # Example
    ///
    /// ```
    /// use s7_session::{ClientConfig, ConnectionType};
    ///
    /// let config = ClientConfig::new("192.168.0.10", 0, 2)
    ///     .with_connection_type(ConnectionType::OP);
    /// ```
    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    /// Addresses the PLC by TSAP pair instead of rack/slot.
    pub fn with_tsap(mut self, local: u16, remote: u16) -> Self {
        self.tsap = Some(Tsap { local, remote });
        self
    }

    /// Adds a parameter override.
    ///
    /// `RemotePort` is taken from [`with_port`](Self::with_port) instead.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_session::{ClientConfig, Param};
    ///
    /// let config = ClientConfig::new("192.168.0.10", 0, 2)
    ///     .with_param(Param::PduRequest, 240)
    ///     .with_param(Param::RecvTimeout, 5000);
    /// assert_eq!(config.params.len(), 2);
    /// ```
    pub fn with_param(mut self, param: Param, value: i32) -> Self {
        self.params.push((param, value));
        self
    }

    /// Sets the poll interval of `wait_completion` (default is 10 ms).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// S7 client session over a protocol engine.
///
/// Owns exactly one engine handle. Dropping the client releases it, after
/// disconnecting if needed.
///
/// # Example
///
/// ```
/// use s7_session::{Client, ClientConfig, Engine, Param};
///
/// fn configure<E: Engine>(engine: E) -> s7_session::Result<Client<E>> {
///     let client = Client::new(engine);
///     client.set_param(Param::PduRequest, 480)?;
///     client.connect_with(&ClientConfig::new("192.168.0.10", 0, 2))?;
///     Ok(client)
/// }
/// ```
pub struct Client<E: Engine> {
    session: RwLock<Session<E>>,
    poll_interval_us: AtomicU64,
}

impl<E: Engine> Client<E> {
    /// Creates a disconnected client-role session around `engine`.
    pub fn new(engine: E) -> Self {
        Self {
            session: RwLock::new(Session::new(engine, Role::Client)),
            poll_interval_us: AtomicU64::new(DEFAULT_POLL_INTERVAL.as_micros() as u64),
        }
    }

    pub(crate) fn lock(&self) -> RwLockWriteGuard<'_, Session<E>> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read_lock(&self) -> RwLockReadGuard<'_, Session<E>> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us.load(Ordering::Relaxed))
    }

    /// Runs one engine call on a connected session and translates its code.
    fn call<R>(&self, call: EngineCall, f: impl FnOnce(&mut E) -> (R, i32)) -> Result<R> {
        let mut session = self.lock();
        session.require_connected()?;
        let (value, code) = f(session.engine());
        session.settle(code, call)?;
        Ok(value)
    }

    /// Connects to a PLC by rack and slot.
    ///
    /// # Errors
    ///
    /// - `InvalidParamValue` if `port` is 0
    /// - `AlreadyConnected` if the session is connected
    /// - `SessionFaulted` if the session is faulted
    /// - `EngineConnectFailure` if the engine refuses; the session is left
    ///   `Disconnected`
    pub fn connect(&self, address: &str, rack: u16, slot: u16, port: u16) -> Result<()> {
        let mut session = self.lock();
        if session.state() == SessionState::Disconnected {
            session
                .params_mut()
                .stage(Param::RemotePort, i32::from(port))?;
            let target = session.target_mut();
            target.address = address.to_string();
            target.rack = rack;
            target.slot = slot;
        }
        session.connect()
    }

    /// Stages everything in `config`, then connects.
    ///
    /// Nothing is staged if any override is invalid.
    pub fn connect_with(&self, config: &ClientConfig) -> Result<()> {
        let mut session = self.lock();
        if session.state() == SessionState::Disconnected {
            let mut staged = session.params().clone();
            for (param, value) in &config.params {
                staged.stage(*param, *value)?;
            }
            staged.stage(Param::RemotePort, i32::from(config.port))?;
            *session.params_mut() = staged;

            let target = session.target_mut();
            target.address = config.address.clone();
            target.rack = config.rack;
            target.slot = config.slot;
            target.connection_type = config.connection_type;
            target.tsap = config.tsap;
            self.poll_interval_us
                .store(config.poll_interval.as_micros() as u64, Ordering::Relaxed);
        }
        session.connect()
    }

    /// Disconnects. A no-op while disconnected.
    ///
    /// Outstanding async jobs are discarded.
    pub fn disconnect(&self) -> Result<()> {
        self.lock().disconnect()
    }

    /// Disconnects if needed and releases the engine handle. Never fails.
    pub fn destroy(self) {
        info!("destroying client");
        drop(self);
    }

    /// Returns `true` while connected.
    pub fn is_connected(&self) -> bool {
        self.read_lock().state() == SessionState::Connected
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SessionState {
        self.read_lock().state()
    }

    /// Native code of the last engine call (0 on success).
    pub fn last_error_code(&self) -> i32 {
        self.read_lock().last_error()
    }

    /// Text of a native code. Same text the errors carry.
    pub fn error_text(&self, code: i32) -> String {
        error_text(code)
    }

    fn require_disconnected(session: &Session<E>) -> Result<()> {
        match session.state() {
            SessionState::Disconnected => Ok(()),
            SessionState::Faulted => Err(S7Error::SessionFaulted),
            SessionState::Connecting | SessionState::Connected => Err(S7Error::AlreadyConnected),
        }
    }

    /// Stages the connection type used by the next connect.
    pub fn set_connection_type(&self, connection_type: ConnectionType) -> Result<()> {
        let mut session = self.lock();
        Self::require_disconnected(&session)?;
        session.target_mut().connection_type = connection_type;
        Ok(())
    }

    /// Stages an explicit TSAP pair; the next connect ignores rack/slot.
    pub fn set_connection_params(
        &self,
        address: &str,
        local_tsap: u16,
        remote_tsap: u16,
    ) -> Result<()> {
        let mut session = self.lock();
        Self::require_disconnected(&session)?;
        let target = session.target_mut();
        target.address = address.to_string();
        target.tsap = Some(Tsap {
            local: local_tsap,
            remote: remote_tsap,
        });
        Ok(())
    }

    /// Reads a parameter.
    ///
    /// While disconnected the staged value (or default) is returned without
    /// an engine call; once connected the engine is asked.
    ///
    /// # Errors
    ///
    /// Returns `ParamNotSupported` if the parameter is not readable by a
    /// client.
    pub fn get_param(&self, param: Param) -> Result<i32> {
        {
            let session = self.read_lock();
            session.params().check_get(param)?;
            if session.state() != SessionState::Connected {
                return session.params().get_local(param);
            }
        }
        let mut session = self.lock();
        if session.state() != SessionState::Connected {
            return session.params().get_local(param);
        }
        let (value, code) = session.engine().get_param(param);
        session.settle(code, EngineCall::Param(param))?;
        debug!(%param, value, "parameter read");
        Ok(value)
    }

    /// Sets a parameter.
    ///
    /// While disconnected the value is staged and replayed at every connect.
    /// Once connected it is forwarded to the engine.
    ///
    /// # Errors
    ///
    /// - `ParamNotSupported` if illegal for a client, or not changeable on a
    ///   live connection (RemotePort)
    /// - `InvalidParamValue` if out of range
    pub fn set_param(&self, param: Param, value: i32) -> Result<()> {
        let mut session = self.lock();
        if session.state() != SessionState::Connected {
            return session.params_mut().stage(param, value);
        }
        session.params().check_set(param, value, true)?;
        let code = session.engine().set_param(param, value);
        session.settle(code, EngineCall::Param(param))?;
        session.params_mut().record(param, value);
        debug!(%param, value, "parameter set");
        Ok(())
    }

    /// Reads `amount` elements from an area.
    ///
    /// The result is always `amount × width` bytes, big-endian.
    ///
    /// # Errors
    ///
    /// - `InvalidWordLength` if the area cannot be read with `word_len`
    /// - `InvalidArgument` if `amount` is 0
    /// - `NotConnected` if not connected
    /// - `EngineReadFailure` if the engine fails
    pub fn read_area(
        &self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
    ) -> Result<Vec<u8>> {
        self.execute(Job::read_area(area, start, amount, word_len)?)
    }

    /// Writes `amount` elements to an area.
    ///
    /// # Errors
    ///
    /// - `PayloadSizeMismatch` if `data.len() != amount × width`, before the
    ///   engine is touched
    /// - `NotConnected` if not connected
    /// - `EngineWriteFailure` if the engine fails
    pub fn write_area(
        &self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
        data: &[u8],
    ) -> Result<()> {
        self.execute(Job::write_area(area, start, amount, word_len, data)?)
    }

    /// Reads typed values.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_session::{Area, Client, Engine, Values, WordLen};
    ///
    /// fn setpoints<E: Engine>(client: &Client<E>) -> s7_session::Result<Vec<f32>> {
    ///     match client.read_values(Area::DataBlock(5), 0, 3, WordLen::Real)? {
    ///         Values::Reals(v) => Ok(v),
    ///         _ => unreachable!(),
    ///     }
    /// }
    /// ```
    pub fn read_values(
        &self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
    ) -> Result<Values> {
        let bytes = self.read_area(area, start, amount, word_len)?;
        decode(&bytes, word_len, amount)
    }

    /// Writes typed values. The element count is `values.len()`.
    pub fn write_values(
        &self,
        area: Area,
        start: u32,
        word_len: WordLen,
        values: &Values,
    ) -> Result<()> {
        let bytes = encode(values, word_len)?;
        self.write_area(area, start, values.len(), word_len, &bytes)
    }

    /// Reads bytes from a data block.
    pub fn db_read(&self, db: u16, start: u32, size: usize) -> Result<Vec<u8>> {
        self.read_area(Area::DataBlock(db), start, size, WordLen::Byte)
    }

    /// Writes bytes to a data block.
    pub fn db_write(&self, db: u16, start: u32, data: &[u8]) -> Result<()> {
        self.write_area(Area::DataBlock(db), start, data.len(), WordLen::Byte, data)
    }

    /// Reads bytes from the process outputs.
    pub fn ab_read(&self, start: u32, size: usize) -> Result<Vec<u8>> {
        self.read_area(Area::ProcessOutputs, start, size, WordLen::Byte)
    }

    /// Writes bytes to the process outputs.
    pub fn ab_write(&self, start: u32, data: &[u8]) -> Result<()> {
        self.write_area(Area::ProcessOutputs, start, data.len(), WordLen::Byte, data)
    }

    /// Reads bytes from the process inputs.
    pub fn eb_read(&self, start: u32, size: usize) -> Result<Vec<u8>> {
        self.read_area(Area::ProcessInputs, start, size, WordLen::Byte)
    }

    /// Writes bytes to the process inputs.
    pub fn eb_write(&self, start: u32, data: &[u8]) -> Result<()> {
        self.write_area(Area::ProcessInputs, start, data.len(), WordLen::Byte, data)
    }

    /// Reads bytes from the markers.
    pub fn mb_read(&self, start: u32, size: usize) -> Result<Vec<u8>> {
        self.read_area(Area::Markers, start, size, WordLen::Byte)
    }

    /// Writes bytes to the markers.
    pub fn mb_write(&self, start: u32, data: &[u8]) -> Result<()> {
        self.write_area(Area::Markers, start, data.len(), WordLen::Byte, data)
    }

    fn read_words(&self, area: Area, start: u32, amount: usize) -> Result<Vec<u16>> {
        let word_len = area.natural_word_len();
        match self.read_values(area, start, amount, word_len)? {
            Values::Words(words) => Ok(words),
            _ => Err(S7Error::invalid_word_len(word_len, "expected word values")),
        }
    }

    /// Reads timers.
    pub fn tm_read(&self, start: u32, amount: usize) -> Result<Vec<u16>> {
        self.read_words(Area::Timers, start, amount)
    }

    /// Writes timers.
    pub fn tm_write(&self, start: u32, values: &[u16]) -> Result<()> {
        self.write_values(Area::Timers, start, WordLen::Timer, &Values::Words(values.to_vec()))
    }

    /// Reads counters.
    pub fn ct_read(&self, start: u32, amount: usize) -> Result<Vec<u16>> {
        self.read_words(Area::Counters, start, amount)
    }

    /// Writes counters.
    pub fn ct_write(&self, start: u32, values: &[u16]) -> Result<()> {
        self.write_values(Area::Counters, start, WordLen::Counter, &Values::Words(values.to_vec()))
    }

    /// Counts the blocks of each type.
    pub fn list_blocks(&self) -> Result<BlocksList> {
        let list = self.call(EngineCall::Query, |engine| engine.list_blocks())?;
        debug!(%list, "blocks listed");
        Ok(list)
    }

    /// Lists the numbers of blocks of one type, at most `max_count`.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_session::{BlockType, Client, Engine};
    ///
    /// fn data_blocks<E: Engine>(client: &Client<E>) -> s7_session::Result<Vec<u16>> {
    ///     Ok(client.list_blocks_of_type(BlockType::DB, 128)?.collect())
    /// }
    /// ```
    pub fn list_blocks_of_type(
        &self,
        block_type: BlockType,
        max_count: usize,
    ) -> Result<BlockNumbers> {
        let mut buf = vec![0u16; max_count.min(MAX_BLOCK_LIST)];
        let count = self.call(EngineCall::Query, |engine| {
            engine.list_blocks_of_type(block_type, &mut buf)
        })?;
        buf.truncate(count);
        debug!(%block_type, count, "blocks of type listed");
        Ok(BlockNumbers::new(buf, max_count))
    }

    /// Reads a block header.
    pub fn block_info(&self, block_type: BlockType, number: u16) -> Result<BlockInfo> {
        self.call(EngineCall::Query, |engine| engine.block_info(block_type, number))
    }

    /// Reads the whole payload of a data block.
    pub fn db_get(&self, db: u16) -> Result<Vec<u8>> {
        let info = self.block_info(BlockType::DB, db)?;
        if info.mc7_size == 0 {
            return Ok(Vec::new());
        }
        self.db_read(db, 0, info.mc7_size)
    }

    /// Overwrites every byte of a data block with `fill`.
    pub fn db_fill(&self, db: u16, fill: u8) -> Result<()> {
        let info = self.block_info(BlockType::DB, db)?;
        if info.mc7_size == 0 {
            return Ok(());
        }
        self.db_write(db, 0, &vec![fill; info.mc7_size])
    }

    /// Uploads a data block image.
    ///
    /// # Errors
    ///
    /// - `AuthorizationRequired` if the PLC is protected
    /// - `EngineTransferFailure` otherwise
    pub fn upload(&self, number: u16) -> Result<Vec<u8>> {
        self.upload_block(BlockType::DB, number)
    }

    /// Uploads a block image of any type.
    pub fn upload_block(&self, block_type: BlockType, number: u16) -> Result<Vec<u8>> {
        self.execute(Job::upload(block_type, number)?)
    }

    /// Downloads a block image.
    ///
    /// With `number` set to `None` the block keeps the number stored in its
    /// image.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `data` is empty
    /// - `AuthorizationRequired` if the PLC is protected
    /// - `EngineTransferFailure` otherwise
    pub fn download(&self, number: Option<u16>, data: &[u8]) -> Result<()> {
        self.execute(Job::download(number, data)?)
    }

    /// Sends the session password.
    ///
    /// # Errors
    ///
    /// - `InvalidPasswordLength` unless exactly 8 characters, before the
    ///   engine is touched
    /// - `EngineControlFailure` or `AuthorizationRequired` from the engine
    pub fn set_session_password(&self, password: &str) -> Result<()> {
        let length = password.chars().count();
        if length != PASSWORD_LEN {
            return Err(S7Error::InvalidPasswordLength { length });
        }
        self.call(EngineCall::Control, |engine| {
            ((), engine.set_session_password(password))
        })
    }

    /// Clears the session password.
    pub fn clear_session_password(&self) -> Result<()> {
        self.call(EngineCall::Control, |engine| ((), engine.clear_session_password()))
    }

    fn plc_control(&self, command: PlcControl) -> Result<()> {
        self.call(EngineCall::Control, |engine| ((), engine.plc_control(command)))?;
        info!(?command, "plc control done");
        Ok(())
    }

    /// Puts the CPU in STOP.
    pub fn plc_stop(&self) -> Result<()> {
        self.plc_control(PlcControl::Stop)
    }

    /// Warm-restarts the CPU.
    pub fn plc_hot_start(&self) -> Result<()> {
        self.plc_control(PlcControl::HotStart)
    }

    /// Cold-restarts the CPU.
    pub fn plc_cold_start(&self) -> Result<()> {
        self.plc_control(PlcControl::ColdStart)
    }

    /// Compresses PLC memory.
    pub fn compress(&self, timeout_ms: u32) -> Result<()> {
        self.execute(Job::compress(timeout_ms))
    }

    /// Copies RAM to ROM.
    pub fn copy_ram_to_rom(&self, timeout_ms: u32) -> Result<()> {
        self.execute(Job::copy_ram_to_rom(timeout_ms))
    }

    /// Reads the CPU run state.
    pub fn plc_status(&self) -> Result<CpuStatus> {
        let code = self.call(EngineCall::Query, |engine| engine.plc_status())?;
        Ok(CpuStatus::from_code(code))
    }

    /// Reads the requested and negotiated PDU sizes.
    pub fn pdu_length(&self) -> Result<PduLength> {
        self.call(EngineCall::Query, |engine| engine.pdu_length())
    }
}

impl<E: Engine> Drop for Client<E> {
    fn drop(&mut self) {
        self.session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
    }
}

impl<E: Engine> std::fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &*self.read_lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{codes, ErrorKind};
    use crate::mock::MockEngine;

    fn connected() -> (Client<MockEngine>, MockEngine) {
        let engine = MockEngine::new();
        let client = Client::new(engine.clone());
        client.connect("192.168.0.10", 0, 2, 102).unwrap();
        (client, engine)
    }

    #[test]
    fn test_client_config_new() {
        let config = ClientConfig::new("192.168.0.10", 0, 2);

        assert_eq!(config.address, "192.168.0.10");
        assert_eq!(config.port, DEFAULT_S7_PORT);
        assert_eq!(config.connection_type, ConnectionType::PG);
        assert_eq!(config.tsap, None);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_client_config_builders() {
        let config = ClientConfig::new("10.0.0.1", 0, 1)
            .with_port(1102)
            .with_connection_type(ConnectionType::S7_BASIC)
            .with_tsap(0x1000, 0x2000)
            .with_param(Param::PduRequest, 240)
            .with_poll_interval(Duration::from_millis(2));

        assert_eq!(config.port, 1102);
        assert_eq!(config.connection_type, ConnectionType::S7_BASIC);
        assert_eq!(config.tsap.unwrap().remote, 0x2000);
        assert_eq!(config.params, vec![(Param::PduRequest, 240)]);
        assert_eq!(config.poll_interval, Duration::from_millis(2));
    }

    #[test]
    fn test_write_then_read_data_block() {
        let (client, _engine) = connected();
        let payload: Vec<u8> = (1..=40).collect();

        client
            .write_area(Area::DataBlock(1), 0, 40, WordLen::Byte, &payload)
            .unwrap();
        let data = client.read_area(Area::DataBlock(1), 0, 40, WordLen::Byte).unwrap();
        assert_eq!(data.len(), 40);
        assert_eq!(data, payload);
    }

    #[test]
    fn test_read_length_matches_layout() {
        let (client, _engine) = connected();
        let data = client.read_area(Area::Markers, 0, 3, WordLen::DWord).unwrap();
        assert_eq!(data.len(), 12);
        assert_eq!(client.tm_read(0, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_typed_values() {
        let (client, _engine) = connected();
        let values = Values::Reals(vec![1.5, -2.25]);
        client
            .write_values(Area::DataBlock(3), 0, WordLen::Real, &values)
            .unwrap();
        assert_eq!(
            client.read_values(Area::DataBlock(3), 0, 2, WordLen::Real).unwrap(),
            values
        );

        client.ct_write(0, &[7, 0x0999]).unwrap();
        assert_eq!(client.ct_read(0, 2).unwrap(), vec![7, 0x0999]);
    }

    #[test]
    fn test_payload_mismatch_never_reaches_engine() {
        let (client, engine) = connected();
        let err = client
            .write_area(Area::DataBlock(1), 0, 10, WordLen::Byte, &[0; 9])
            .unwrap_err();
        assert_eq!(
            err,
            S7Error::PayloadSizeMismatch {
                expected: 10,
                actual: 9
            }
        );
        assert_eq!(engine.handle().count("write_area"), 0);

        // validation comes before the connection check
        let idle = Client::new(MockEngine::new());
        assert_eq!(
            idle.write_area(Area::Markers, 0, 1, WordLen::Word, &[0])
                .unwrap_err()
                .kind(),
            ErrorKind::PayloadSizeMismatch
        );
    }

    #[test]
    fn test_invalid_word_length() {
        let (client, engine) = connected();
        let err = client
            .read_area(Area::Timers, 0, 1, WordLen::Byte)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidWordLength);
        assert_eq!(engine.handle().count("read_area"), 0);
    }

    #[test]
    fn test_operations_require_connection() {
        let engine = MockEngine::new();
        let state = engine.state();
        let client = Client::new(engine);

        let results = [
            client.read_area(Area::DataBlock(1), 0, 1, WordLen::Byte).map(drop),
            client.write_area(Area::DataBlock(1), 0, 1, WordLen::Byte, &[0]),
            client.db_read(1, 0, 1).map(drop),
            client.db_write(1, 0, &[1]),
            client.list_blocks().map(drop),
            client.list_blocks_of_type(BlockType::DB, 10).map(drop),
            client.block_info(BlockType::OB, 1).map(drop),
            client.upload(1).map(drop),
            client.download(Some(1), &[1, 2]),
            client.set_session_password("12345678"),
            client.clear_session_password(),
            client.plc_stop(),
            client.plc_hot_start(),
            client.plc_cold_start(),
            client.compress(100),
            client.copy_ram_to_rom(100),
            client.plc_status().map(drop),
            client.pdu_length().map(drop),
        ];
        for result in results {
            assert_eq!(result.unwrap_err(), S7Error::NotConnected);
        }
        assert!(state.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn test_connect_twice_fails() {
        let (client, engine) = connected();
        assert_eq!(
            client.connect("192.168.0.10", 0, 2, 102).unwrap_err(),
            S7Error::AlreadyConnected
        );
        assert!(client.is_connected());
        assert_eq!(engine.handle().count("connect"), 1);
    }

    #[test]
    fn test_disconnect_when_disconnected_is_noop() {
        let engine = MockEngine::new();
        let client = Client::new(engine.clone());
        client.disconnect().unwrap();
        client.disconnect().unwrap();
        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(engine.handle().count("disconnect"), 0);
    }

    #[test]
    fn test_connect_failure() {
        let engine = MockEngine::new();
        engine
            .handle()
            .fail
            .insert("connect", codes::ISO_CONNECT | codes::TCP_CONNECTION_REFUSED);
        let client = Client::new(engine);

        let err = client.connect("10.0.0.9", 0, 2, 102).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineConnectFailure);
        assert_eq!(
            err.to_string(),
            "Connect failed: TCP : Connection refused - ISO : Connection error (code 0x0001274D)"
        );
        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(client.last_error_code(), codes::ISO_CONNECT | codes::TCP_CONNECTION_REFUSED);
    }

    #[test]
    fn test_remote_port_staging() {
        let engine = MockEngine::new();
        let client = Client::new(engine.clone());

        assert_eq!(client.get_param(Param::RemotePort).unwrap(), 102);
        client.set_param(Param::RemotePort, 1102).unwrap();
        assert_eq!(client.get_param(Param::RemotePort).unwrap(), 1102);
        assert!(engine.handle().calls.is_empty());

        client.connect("10.0.0.1", 0, 2, 1102).unwrap();
        assert_eq!(engine.handle().target.as_ref().unwrap().port, 1102);
        assert_eq!(client.get_param(Param::RemotePort).unwrap(), 1102);
        assert_eq!(engine.handle().count("get_param"), 1);
        assert_eq!(
            client.set_param(Param::RemotePort, 2000).unwrap_err().kind(),
            ErrorKind::ParamNotSupported
        );
    }

    #[test]
    fn test_connected_remote_port_comes_from_engine() {
        let engine = MockEngine::new();
        let client = Client::new(engine.clone());
        client
            .connect_with(&ClientConfig::new("10.0.0.1", 0, 2).with_port(1102))
            .unwrap();

        assert_eq!(client.get_param(Param::RemotePort).unwrap(), 1102);
        assert!(engine
            .handle()
            .param_writes
            .iter()
            .all(|(param, _)| *param != Param::RemotePort));

        client.disconnect().unwrap();
        client.connect("10.0.0.1", 0, 2, 102).unwrap();
        assert_eq!(client.get_param(Param::RemotePort).unwrap(), 102);
    }

    #[test]
    fn test_local_port_always_illegal() {
        let client = Client::new(MockEngine::new());
        for _ in 0..2 {
            assert_eq!(
                client.set_param(Param::LocalPort, 5000).unwrap_err().kind(),
                ErrorKind::ParamNotSupported
            );
            assert_eq!(
                client.get_param(Param::LocalPort).unwrap_err().kind(),
                ErrorKind::ParamNotSupported
            );
            client.connect("10.0.0.1", 0, 2, 102).ok();
        }
        assert!(client.is_connected());
    }

    #[test]
    fn test_live_params_forwarded() {
        let (client, engine) = connected();
        client.set_param(Param::PingTimeout, 900).unwrap();
        assert_eq!(client.get_param(Param::PingTimeout).unwrap(), 900);

        let state = engine.handle();
        assert_eq!(state.param_writes, vec![(Param::PingTimeout, 900)]);
        assert_eq!(state.count("get_param"), 1);
    }

    #[test]
    fn test_engine_param_refusal() {
        let (client, engine) = connected();
        engine
            .handle()
            .fail
            .insert("set_param", codes::CLI_CANNOT_CHANGE_PARAM);
        let err = client.set_param(Param::PduRequest, 240).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParamNotSupported);
        assert_eq!(err.native_code(), Some(codes::CLI_CANNOT_CHANGE_PARAM));
    }

    #[test]
    fn test_connect_with_config() {
        let engine = MockEngine::new();
        let client = Client::new(engine.clone());
        let config = ClientConfig::new("10.1.1.1", 0, 1)
            .with_port(1102)
            .with_tsap(0x0200, 0x0301)
            .with_param(Param::PduRequest, 240)
            .with_poll_interval(Duration::from_millis(1));

        client.connect_with(&config).unwrap();
        assert_eq!(client.poll_interval(), Duration::from_millis(1));
        let state = engine.handle();
        let target = state.target.as_ref().unwrap();
        assert_eq!(target.port, 1102);
        assert_eq!(target.tsap().remote, 0x0301);
        assert_eq!(state.param_writes, vec![(Param::PduRequest, 240)]);
    }

    #[test]
    fn test_connect_with_rejects_bad_override() {
        let engine = MockEngine::new();
        let client = Client::new(engine.clone());
        let config = ClientConfig::new("10.1.1.1", 0, 1)
            .with_param(Param::PingTimeout, 100)
            .with_param(Param::PduRequest, 10);

        let err = client.connect_with(&config).unwrap_err();
        assert_eq!(
            err,
            S7Error::InvalidParamValue {
                param: Param::PduRequest,
                value: 10
            }
        );
        assert_eq!(client.get_param(Param::PingTimeout).unwrap(), 750);
        assert!(engine.handle().calls.is_empty());
    }

    #[test]
    fn test_connection_settings_only_while_disconnected() {
        let engine = MockEngine::new();
        let client = Client::new(engine.clone());
        client.set_connection_type(ConnectionType::OP).unwrap();
        client.set_connection_params("10.0.0.5", 0x0100, 0x0201).unwrap();

        client.connect("10.0.0.5", 0, 1, 102).unwrap();
        assert_eq!(
            engine.handle().target.as_ref().unwrap().connection_type,
            ConnectionType::OP
        );
        assert_eq!(
            client.set_connection_type(ConnectionType::PG).unwrap_err(),
            S7Error::AlreadyConnected
        );
    }

    #[test]
    fn test_session_password_length() {
        let (client, engine) = connected();
        for password in ["", "1234567", "123456789"] {
            assert_eq!(
                client.set_session_password(password).unwrap_err(),
                S7Error::InvalidPasswordLength {
                    length: password.len()
                }
            );
        }
        assert_eq!(engine.handle().count("set_session_password"), 0);

        client.set_session_password("s3cr3t!!").unwrap();
        assert_eq!(engine.handle().password.as_deref(), Some("s3cr3t!!"));
        client.clear_session_password().unwrap();
        assert_eq!(engine.handle().password, None);
    }

    #[test]
    fn test_upload_requires_authorization() {
        let (client, engine) = connected();
        engine.handle().fail.insert("upload", codes::CLI_NEED_PASSWORD);
        let err = client.upload(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationRequired);
        assert!(client.is_connected());

        engine.handle().fail.insert("download", codes::CLI_DOWNLOAD_SEQUENCE_FAILED);
        let err = client.download(Some(1), &[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineTransferFailure);
    }

    #[test]
    fn test_download_then_upload() {
        let (client, _engine) = connected();
        client.download(Some(7), &[0xAA, 0xBB]).unwrap();
        assert_eq!(client.upload(7).unwrap(), vec![0xAA, 0xBB]);
        assert_eq!(
            client.download(None, &[]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_block_queries() {
        let (client, engine) = connected();
        {
            let mut state = engine.handle();
            for n in [1, 2, 10, 20] {
                state.blocks.insert((BlockType::DB, n), vec![0; 8]);
            }
        }
        assert_eq!(client.list_blocks().unwrap().db_count, 4);
        let numbers: Vec<u16> = client.list_blocks_of_type(BlockType::DB, 3).unwrap().collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert_eq!(client.block_info(BlockType::DB, 10).unwrap().mc7_size, 8);
    }

    #[test]
    fn test_db_fill_and_get() {
        let (client, engine) = connected();
        engine.handle().blocks.insert((BlockType::DB, 4), vec![0; 6]);

        client.db_fill(4, 0x5A).unwrap();
        assert_eq!(client.db_get(4).unwrap(), vec![0x5A; 6]);
        assert_eq!(client.db_get(99).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_control_operations() {
        let (client, engine) = connected();
        client.plc_stop().unwrap();
        assert_eq!(client.plc_status().unwrap(), CpuStatus::Stop);
        client.plc_hot_start().unwrap();
        assert_eq!(client.plc_status().unwrap(), CpuStatus::Run);

        engine.handle().fail.insert("compress", codes::CLI_CANNOT_COMPRESS);
        let err = client.compress(1000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineControlFailure);
        assert_eq!(client.last_error_code(), codes::CLI_CANNOT_COMPRESS);

        client.copy_ram_to_rom(1000).unwrap();
        assert_eq!(client.last_error_code(), 0);
    }

    #[test]
    fn test_pdu_length() {
        let engine = MockEngine::new();
        let client = Client::new(engine);
        client.set_param(Param::PduRequest, 960).unwrap();
        client.connect("10.0.0.1", 0, 2, 102).unwrap();
        let pdu = client.pdu_length().unwrap();
        assert_eq!(pdu.requested, 960);
        assert_eq!(pdu.negotiated, 240);
    }

    #[test]
    fn test_link_failure_faults_client() {
        let (client, engine) = connected();
        engine.handle().fail.insert("read_area", codes::TCP_CONNECTION_RESET);

        let err = client.db_read(1, 0, 4).unwrap_err();
        assert!(err.is_link_failure());
        assert_eq!(client.state(), SessionState::Faulted);
        assert_eq!(client.db_read(1, 0, 4).unwrap_err(), S7Error::NotConnected);
        assert_eq!(
            client.connect("192.168.0.10", 0, 2, 102).unwrap_err(),
            S7Error::SessionFaulted
        );

        engine.handle().fail.clear();
        client.disconnect().unwrap();
        client.connect("192.168.0.10", 0, 2, 102).unwrap();
        assert_eq!(client.db_read(1, 0, 4).unwrap().len(), 4);
    }

    #[test]
    fn test_drop_releases_connection() {
        let engine = MockEngine::new();
        let state = engine.state();
        {
            let client = Client::new(engine);
            client.connect("10.0.0.1", 0, 2, 102).unwrap();
        }
        assert!(!state.lock().unwrap().connected);

        let engine = MockEngine::new();
        let state = engine.state();
        let client = Client::new(engine);
        client.destroy();
        assert_eq!(state.lock().unwrap().count("disconnect"), 0);
    }

    #[test]
    fn test_client_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Client<MockEngine>>();

        let (client, _engine) = connected();
        std::thread::scope(|s| {
            for db in 1..=4u16 {
                let client = &client;
                s.spawn(move || {
                    client.db_write(db, 0, &[db as u8; 4]).unwrap();
                    assert_eq!(client.db_read(db, 0, 4).unwrap(), vec![db as u8; 4]);
                });
            }
        });
    }

    #[test]
    fn test_client_debug() {
        let client = Client::new(MockEngine::new());
        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("Client"));
        assert!(debug_str.contains("Disconnected"));
    }
}
