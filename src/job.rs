//! Transfer jobs and the fire-and-poll façade.
//!
//! Every data transfer goes through one pipeline: the request is validated and
//! encoded up front, then either executed blocking (the sync calls on
//! [`Client`]) or submitted to the engine, which hands back a [`JobHandle`].
//!
//! # Async lifecycle
//!
//! ```text
//! submit ──▶ Pending ──poll──▶ Done(value) / Failed(error) ──▶ consumed
//! ```
//!
//! At most one job per [`JobKind`] may be outstanding on a session. A second
//! submission of the same kind fails with `OperationInProgress` until the
//! first has been consumed through [`Client::check_completion`] or
//! [`Client::wait_completion`]. Jobs of different kinds may overlap unless the
//! engine runs one job at a time; it then refuses the submission with its
//! job-pending code, also reported as `OperationInProgress`.
//!
//! # Example
//!
//! ```
//! # use s7_session::{Area, Client, WordLen};
//! # fn demo<E: s7_session::Engine>(client: &Client<E>) -> s7_session::Result<()> {
//! use std::time::Duration;
//!
//! let handle = client.as_read_area(Area::DataBlock(1), 0, 40, WordLen::Byte)?;
//! // ... do other work ...
//! let data = client.wait_completion(&handle, Duration::from_secs(1))?;
//! assert_eq!(data.len(), 40);
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::area::{encode, layout, Area, Values, WordLen};
use crate::client::Client;
use crate::engine::{run_blocking, Engine, JobRequest, JobStatus};
use crate::error::{EngineCall, Result, S7Error};
use crate::info::BlockType;
use crate::session::Outstanding;

/// Kind of a transfer job. One job per kind may be outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JobKind {
    /// Area read.
    Read,
    /// Area write.
    Write,
    /// Block download.
    Download,
    /// Block upload.
    Upload,
    /// Memory compression.
    Compress,
    /// RAM to ROM copy.
    CopyRamToRom,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobKind::Read => "read",
            JobKind::Write => "write",
            JobKind::Download => "download",
            JobKind::Upload => "upload",
            JobKind::Compress => "compress",
            JobKind::CopyRamToRom => "copy ram to rom",
        };
        f.write_str(name)
    }
}

impl JobRequest {
    /// Returns the kind of job this request starts.
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::ReadArea { .. } => JobKind::Read,
            JobRequest::WriteArea { .. } => JobKind::Write,
            JobRequest::Upload { .. } => JobKind::Upload,
            JobRequest::Download { .. } => JobKind::Download,
            JobRequest::Compress { .. } => JobKind::Compress,
            JobRequest::CopyRamToRom { .. } => JobKind::CopyRamToRom,
        }
    }
}

/// Value a finished job produces.
pub trait JobOutput: Sized {
    /// Builds the value from the bytes the engine returned.
    fn finish(request: &JobRequest, data: Vec<u8>) -> Result<Self>;
}

impl JobOutput for () {
    fn finish(_request: &JobRequest, _data: Vec<u8>) -> Result<Self> {
        Ok(())
    }
}

impl JobOutput for Vec<u8> {
    fn finish(request: &JobRequest, data: Vec<u8>) -> Result<Self> {
        match request.expected_len() {
            Some(expected) if expected != data.len() => Err(S7Error::PayloadSizeMismatch {
                expected,
                actual: data.len(),
            }),
            _ => Ok(data),
        }
    }
}

/// Big-endian words, as timers and counters are transferred.
impl JobOutput for Vec<u16> {
    fn finish(request: &JobRequest, data: Vec<u8>) -> Result<Self> {
        let bytes = Vec::<u8>::finish(request, data)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect())
    }
}

/// A validated request, ready to run blocking or to submit.
#[derive(Debug)]
pub(crate) struct Job<T> {
    request: JobRequest,
    _output: PhantomData<fn() -> T>,
}

impl<T> Job<T> {
    fn new(request: JobRequest) -> Self {
        Self {
            request,
            _output: PhantomData,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.request.kind()
    }
}

impl Job<Vec<u8>> {
    pub fn read_area(area: Area, start: u32, amount: usize, word_len: WordLen) -> Result<Self> {
        layout(area, word_len, amount)?;
        Ok(Self::new(JobRequest::ReadArea {
            area,
            start,
            amount,
            word_len,
        }))
    }

    pub fn upload(block_type: BlockType, number: u16) -> Result<Self> {
        Ok(Self::new(JobRequest::Upload { block_type, number }))
    }
}

impl Job<Vec<u16>> {
    /// Reads timers or counters with their own word length.
    pub fn read_words(area: Area, start: u32, amount: usize) -> Result<Self> {
        let word_len = area.natural_word_len();
        if word_len.width() != 2 {
            return Err(S7Error::invalid_word_len(word_len, "expected word values"));
        }
        layout(area, word_len, amount)?;
        Ok(Self::new(JobRequest::ReadArea {
            area,
            start,
            amount,
            word_len,
        }))
    }
}

impl Job<()> {
    pub fn write_area(
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
        data: &[u8],
    ) -> Result<Self> {
        let layout = layout(area, word_len, amount)?;
        if data.len() != layout.buffer_size {
            return Err(S7Error::PayloadSizeMismatch {
                expected: layout.buffer_size,
                actual: data.len(),
            });
        }
        Ok(Self::new(JobRequest::WriteArea {
            area,
            start,
            amount,
            word_len,
            data: data.to_vec(),
        }))
    }

    pub fn download(number: Option<u16>, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(S7Error::invalid_argument("data", "block image is empty"));
        }
        Ok(Self::new(JobRequest::Download {
            number,
            data: data.to_vec(),
        }))
    }

    pub fn compress(timeout_ms: u32) -> Self {
        Self::new(JobRequest::Compress { timeout_ms })
    }

    pub fn copy_ram_to_rom(timeout_ms: u32) -> Self {
        Self::new(JobRequest::CopyRamToRom { timeout_ms })
    }
}

/// Ticket for a submitted job.
///
/// Not cloneable: the handle is consumed logically once its result has been
/// taken, after which polling it fails with `UnknownOperationHandle`.
pub struct JobHandle<T> {
    id: u64,
    kind: JobKind,
    _output: PhantomData<fn() -> T>,
}

impl<T> JobHandle<T> {
    /// Session-local job id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Kind of the job.
    pub fn kind(&self) -> JobKind {
        self.kind
    }
}

impl<T> std::fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Result of polling a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    /// Still running.
    Pending,
    /// Finished successfully; the job has been consumed.
    Done(T),
    /// Finished with an error; the job has been consumed.
    Failed(S7Error),
}

impl<T> Completion<T> {
    /// Returns `true` while the job is running.
    pub fn is_pending(&self) -> bool {
        matches!(self, Completion::Pending)
    }
}

impl<E: Engine> Client<E> {
    /// Runs a job through the blocking engine calls.
    pub(crate) fn execute<T: JobOutput>(&self, job: Job<T>) -> Result<T> {
        let mut session = self.lock();
        session.require_connected()?;
        debug!(request = %job.request, "execute");

        let mut out = Vec::new();
        let code = run_blocking(session.engine(), &job.request, &mut out);
        session.settle(code, EngineCall::from(job.kind()))?;
        T::finish(&job.request, out)
    }

    /// Hands a job to the engine and returns at once.
    pub(crate) fn submit<T: JobOutput>(&self, job: Job<T>) -> Result<JobHandle<T>> {
        let mut session = self.lock();
        session.require_connected()?;
        let kind = job.kind();
        if session.has_outstanding(kind) {
            return Err(S7Error::OperationInProgress {
                kind: Some(kind),
                code: None,
            });
        }

        let (engine_job, code) = session.engine().submit(&job.request);
        session.settle(code, EngineCall::from(kind))?;
        let id = session.track(Outstanding {
            kind,
            engine_job,
            request: job.request,
        });
        debug!(id, %kind, "job submitted");
        Ok(JobHandle {
            id,
            kind,
            _output: PhantomData,
        })
    }

    /// Starts an area read.
    ///
    /// # Errors
    ///
    /// Same validation as [`read_area`](Client::read_area), plus
    /// `OperationInProgress` while another read is outstanding.
    pub fn as_read_area(
        &self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
    ) -> Result<JobHandle<Vec<u8>>> {
        self.submit(Job::read_area(area, start, amount, word_len)?)
    }

    /// Starts an area write. The payload is copied before returning.
    pub fn as_write_area(
        &self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
        data: &[u8],
    ) -> Result<JobHandle<()>> {
        self.submit(Job::write_area(area, start, amount, word_len, data)?)
    }

    /// Starts a byte read from a data block.
    pub fn as_db_read(&self, db: u16, start: u32, size: usize) -> Result<JobHandle<Vec<u8>>> {
        self.as_read_area(Area::DataBlock(db), start, size, WordLen::Byte)
    }

    /// Starts a byte write to a data block.
    pub fn as_db_write(&self, db: u16, start: u32, data: &[u8]) -> Result<JobHandle<()>> {
        self.as_write_area(Area::DataBlock(db), start, data.len(), WordLen::Byte, data)
    }

    /// Starts a byte read from the process outputs.
    pub fn as_ab_read(&self, start: u32, size: usize) -> Result<JobHandle<Vec<u8>>> {
        self.as_read_area(Area::ProcessOutputs, start, size, WordLen::Byte)
    }

    /// Starts a byte write to the process outputs.
    pub fn as_ab_write(&self, start: u32, data: &[u8]) -> Result<JobHandle<()>> {
        self.as_write_area(Area::ProcessOutputs, start, data.len(), WordLen::Byte, data)
    }

    /// Starts a byte read from the process inputs.
    pub fn as_eb_read(&self, start: u32, size: usize) -> Result<JobHandle<Vec<u8>>> {
        self.as_read_area(Area::ProcessInputs, start, size, WordLen::Byte)
    }

    /// Starts a byte write to the process inputs.
    pub fn as_eb_write(&self, start: u32, data: &[u8]) -> Result<JobHandle<()>> {
        self.as_write_area(Area::ProcessInputs, start, data.len(), WordLen::Byte, data)
    }

    /// Starts a byte read from the markers.
    pub fn as_mb_read(&self, start: u32, size: usize) -> Result<JobHandle<Vec<u8>>> {
        self.as_read_area(Area::Markers, start, size, WordLen::Byte)
    }

    /// Starts a byte write to the markers.
    pub fn as_mb_write(&self, start: u32, data: &[u8]) -> Result<JobHandle<()>> {
        self.as_write_area(Area::Markers, start, data.len(), WordLen::Byte, data)
    }

    /// Starts a timer read.
    pub fn as_tm_read(&self, start: u32, amount: usize) -> Result<JobHandle<Vec<u16>>> {
        self.submit(Job::read_words(Area::Timers, start, amount)?)
    }

    /// Starts a timer write.
    pub fn as_tm_write(&self, start: u32, values: &[u16]) -> Result<JobHandle<()>> {
        self.as_write_words(Area::Timers, WordLen::Timer, start, values)
    }

    /// Starts a counter read.
    pub fn as_ct_read(&self, start: u32, amount: usize) -> Result<JobHandle<Vec<u16>>> {
        self.submit(Job::read_words(Area::Counters, start, amount)?)
    }

    /// Starts a counter write.
    pub fn as_ct_write(&self, start: u32, values: &[u16]) -> Result<JobHandle<()>> {
        self.as_write_words(Area::Counters, WordLen::Counter, start, values)
    }

    fn as_write_words(
        &self,
        area: Area,
        word_len: WordLen,
        start: u32,
        values: &[u16],
    ) -> Result<JobHandle<()>> {
        let bytes = encode(&Values::Words(values.to_vec()), word_len)?;
        self.as_write_area(area, start, values.len(), word_len, &bytes)
    }

    /// Starts overwriting every byte of a data block with `fill`.
    ///
    /// The block size is queried first, as a blocking call.
    ///
    /// # Errors
    ///
    /// - `EngineQueryFailure` if the block size cannot be read
    /// - `InvalidArgument` if the block is empty
    pub fn as_db_fill(&self, db: u16, fill: u8) -> Result<JobHandle<()>> {
        let info = self.block_info(BlockType::DB, db)?;
        self.as_db_write(db, 0, &vec![fill; info.mc7_size])
    }

    /// Starts a DB upload.
    pub fn as_upload(&self, number: u16) -> Result<JobHandle<Vec<u8>>> {
        self.submit(Job::upload(BlockType::DB, number)?)
    }

    /// Starts a block download.
    pub fn as_download(&self, number: Option<u16>, data: &[u8]) -> Result<JobHandle<()>> {
        self.submit(Job::download(number, data)?)
    }

    /// Starts a memory compression.
    pub fn as_compress(&self, timeout_ms: u32) -> Result<JobHandle<()>> {
        self.submit(Job::compress(timeout_ms))
    }

    /// Starts a RAM to ROM copy.
    pub fn as_copy_ram_to_rom(&self, timeout_ms: u32) -> Result<JobHandle<()>> {
        self.submit(Job::copy_ram_to_rom(timeout_ms))
    }

    /// Polls a job without blocking.
    ///
    /// `Done` and `Failed` consume the job: its kind becomes free again and
    /// the handle is no longer known.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the session is not connected
    /// - `UnknownOperationHandle` if the job was already consumed or
    ///   discarded by a disconnect
    pub fn check_completion<T: JobOutput>(&self, handle: &JobHandle<T>) -> Result<Completion<T>> {
        let mut session = self.lock();
        session.require_connected()?;
        let engine_job = session
            .outstanding(handle.id)
            .map(|job| job.engine_job)
            .ok_or(S7Error::UnknownOperationHandle { id: handle.id })?;

        let mut data = Vec::new();
        let (status, code) = session.engine().check_completion(engine_job, &mut data);
        if status == JobStatus::Pending {
            return Ok(Completion::Pending);
        }

        let Some(job) = session.retire(handle.id) else {
            return Err(S7Error::UnknownOperationHandle { id: handle.id });
        };
        let outcome = session
            .settle(code, EngineCall::from(job.kind))
            .and_then(|()| T::finish(&job.request, data));
        Ok(match outcome {
            Ok(value) => {
                debug!(id = handle.id, kind = %job.kind, "job done");
                Completion::Done(value)
            }
            Err(err) => {
                warn!(id = handle.id, kind = %job.kind, %err, "job failed");
                Completion::Failed(err)
            }
        })
    }

    /// Polls a job until it finishes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the deadline passes; the job stays outstanding and may
    ///   be polled again
    /// - the job's own error if it failed
    pub fn wait_completion<T: JobOutput>(
        &self,
        handle: &JobHandle<T>,
        timeout: Duration,
    ) -> Result<T> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.check_completion(handle)? {
                Completion::Done(value) => return Ok(value),
                Completion::Failed(err) => return Err(err),
                Completion::Pending => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(S7Error::Timeout { kind: handle.kind });
            }
            thread::sleep(self.poll_interval().min(deadline - now));
        }
    }

    /// Returns whether a job of `kind` is outstanding.
    pub fn outstanding(&self, kind: JobKind) -> bool {
        self.read_lock().has_outstanding(kind)
    }
}
