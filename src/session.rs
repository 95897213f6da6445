//! Connection lifecycle of one engine handle.
//!
//! ```text
//!                connect()                 engine ok
//! Disconnected ───────────▶ Connecting ─────────────▶ Connected
//!      ▲                        │ engine error            │
//!      │        cleanup         ▼                         │ link failure
//!      └─────────────────── Faulted ◀─────────────────────┘
//!      ▲                                                  │
//!      └──────────────────── disconnect() ────────────────┘
//! ```
//!
//! A failed connect passes through `Faulted` only while the half-open engine
//! state is cleaned up, and ends in `Disconnected`. A link failure reported by
//! an operation on a live connection leaves the session `Faulted` until the
//! caller disconnects.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::engine::{ConnectTarget, Engine, EngineJobId, JobRequest};
use crate::error::{is_link_code, translate, EngineCall, Result, S7Error};
use crate::job::JobKind;
use crate::param::{Param, ParamStore, Role};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection; parameters are staged locally.
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Live connection.
    Connected,
    /// Link lost or connect being cleaned up.
    Faulted,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A submitted job the engine has not finished yet.
#[derive(Debug)]
pub(crate) struct Outstanding {
    pub kind: JobKind,
    pub engine_job: EngineJobId,
    pub request: JobRequest,
}

/// Engine handle plus everything the session layer tracks about it.
pub(crate) struct Session<E> {
    engine: E,
    state: SessionState,
    params: ParamStore,
    target: ConnectTarget,
    jobs: HashMap<u64, Outstanding>,
    next_job: u64,
    last_error: i32,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E, role: Role) -> Self {
        Self {
            engine,
            state: SessionState::Disconnected,
            params: ParamStore::new(role),
            target: ConnectTarget::new("", 0, 0),
            jobs: HashMap::new(),
            next_job: 1,
            last_error: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    pub fn target_mut(&mut self) -> &mut ConnectTarget {
        &mut self.target
    }

    pub fn engine(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn last_error(&self) -> i32 {
        self.last_error
    }

    pub fn require_connected(&self) -> Result<()> {
        match self.state {
            SessionState::Connected => Ok(()),
            _ => Err(S7Error::NotConnected),
        }
    }

    /// Records and translates the code of an engine call.
    ///
    /// A link failure on a live connection moves the session to `Faulted`.
    pub fn settle(&mut self, code: i32, call: EngineCall) -> Result<()> {
        self.last_error = code;
        if code != 0 && self.state == SessionState::Connected && is_link_code(code) {
            warn!(code, ?call, "link failure, session faulted");
            self.state = SessionState::Faulted;
        }
        translate(code, call)
    }

    /// Opens the connection described by the staged target and parameters.
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Connected | SessionState::Connecting => {
                return Err(S7Error::AlreadyConnected)
            }
            SessionState::Faulted => return Err(S7Error::SessionFaulted),
            SessionState::Disconnected => {}
        }

        self.state = SessionState::Connecting;
        self.target.port = u16::try_from(self.params.value(Param::RemotePort))
            .unwrap_or(crate::param::DEFAULT_S7_PORT);
        info!(
            address = %self.target.address,
            rack = self.target.rack,
            slot = self.target.slot,
            port = self.target.port,
            "connecting"
        );

        let overrides: Vec<(Param, i32)> = self
            .params
            .overrides()
            .filter(|(param, _)| *param != Param::RemotePort)
            .collect();
        for (param, value) in overrides {
            debug!(%param, value, "replaying parameter");
            let code = self.engine.set_param(param, value);
            if code != 0 {
                return self.abort_connect(code, EngineCall::Param(param));
            }
        }

        let code = self.engine.connect(&self.target);
        if code != 0 {
            return self.abort_connect(code, EngineCall::Connect);
        }

        self.last_error = 0;
        self.state = SessionState::Connected;
        info!(address = %self.target.address, "connected");
        Ok(())
    }

    fn abort_connect(&mut self, code: i32, call: EngineCall) -> Result<()> {
        self.last_error = code;
        self.state = SessionState::Faulted;
        warn!(
            address = %self.target.address,
            code,
            "connect failed"
        );
        self.engine.disconnect();
        self.state = SessionState::Disconnected;
        translate(code, call)
    }

    /// Closes the connection. A no-op while disconnected.
    ///
    /// The session ends `Disconnected` even if the engine reports an error.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        self.discard_jobs();
        let code = self.engine.disconnect();
        self.last_error = code;
        self.state = SessionState::Disconnected;
        info!(address = %self.target.address, "disconnected");
        translate(code, EngineCall::Disconnect)
    }

    /// Releases the connection on destroy, ignoring engine errors.
    pub fn release(&mut self) {
        self.discard_jobs();
        if self.state != SessionState::Disconnected {
            let code = self.engine.disconnect();
            if code != 0 {
                debug!(code, "disconnect on release failed");
            }
            self.state = SessionState::Disconnected;
        }
    }

    fn discard_jobs(&mut self) {
        if !self.jobs.is_empty() {
            warn!(count = self.jobs.len(), "discarding outstanding jobs");
            self.jobs.clear();
        }
    }

    pub fn has_outstanding(&self, kind: JobKind) -> bool {
        self.jobs.values().any(|job| job.kind == kind)
    }

    pub fn track(&mut self, job: Outstanding) -> u64 {
        let id = self.next_job;
        self.next_job += 1;
        self.jobs.insert(id, job);
        id
    }

    pub fn outstanding(&self, id: u64) -> Option<&Outstanding> {
        self.jobs.get(&id)
    }

    pub fn retire(&mut self, id: u64) -> Option<Outstanding> {
        self.jobs.remove(&id)
    }
}

impl<E> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("address", &self.target.address)
            .field("outstanding", &self.jobs.len())
            .finish()
    }
}
