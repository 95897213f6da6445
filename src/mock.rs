//! In-memory stub engine for unit tests.
//!
//! Records every call by name, keeps a byte image per area so writes can be
//! read back, and returns injected codes for chosen calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::area::{Area, WordLen};
use crate::engine::{ConnectTarget, Engine, EngineJobId, JobRequest, JobStatus, PlcControl};
use crate::info::{BlockInfo, BlockType, BlocksList, PduLength};
use crate::param::Param;

/// Shared state behind a [`MockEngine`].
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub connected: bool,
    pub calls: Vec<&'static str>,
    pub target: Option<ConnectTarget>,
    pub memory: HashMap<Area, Vec<u8>>,
    pub params: BTreeMap<Param, i32>,
    pub param_writes: Vec<(Param, i32)>,
    /// Code returned by the named call; absent means success.
    pub fail: HashMap<&'static str, i32>,
    /// Polls answered `Pending` before a job completes.
    pub pending_polls: usize,
    pub jobs: HashMap<EngineJobId, (JobRequest, usize)>,
    pub next_job: EngineJobId,
    pub password: Option<String>,
    pub blocks: BTreeMap<(BlockType, u16), Vec<u8>>,
    pub cpu_status: i32,
    /// Allow one job at a time, finished or not, until its result is polled.
    pub single_job: bool,
}

impl MockState {
    fn step(&mut self, name: &'static str) -> i32 {
        self.calls.push(name);
        self.fail.get(name).copied().unwrap_or(0)
    }

    /// Number of recorded calls with this name.
    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| **c == name).count()
    }

    fn read_into(&mut self, area: Area, start: u32, buf: &mut [u8]) {
        let image = self.memory.entry(area).or_default();
        let start = start as usize;
        if image.len() < start + buf.len() {
            image.resize(start + buf.len(), 0);
        }
        buf.copy_from_slice(&image[start..start + buf.len()]);
    }

    fn write_from(&mut self, area: Area, start: u32, data: &[u8]) {
        let image = self.memory.entry(area).or_default();
        let start = start as usize;
        if image.len() < start + data.len() {
            image.resize(start + data.len(), 0);
        }
        image[start..start + data.len()].copy_from_slice(data);
    }

    fn finish_job(&mut self, request: &JobRequest, data: &mut Vec<u8>) -> i32 {
        match request {
            JobRequest::ReadArea {
                area,
                start,
                amount,
                word_len,
            } => {
                data.clear();
                data.resize(amount * word_len.width(), 0);
                self.read_into(*area, *start, data);
            }
            JobRequest::WriteArea {
                area, start, data: payload, ..
            } => self.write_from(*area, *start, payload),
            JobRequest::Upload { block_type, number } => {
                *data = self
                    .blocks
                    .get(&(*block_type, *number))
                    .cloned()
                    .unwrap_or_default();
            }
            JobRequest::Download { number, data: image } => {
                self.blocks
                    .insert((BlockType::DB, number.unwrap_or(0)), image.clone());
            }
            JobRequest::Compress { .. } | JobRequest::CopyRamToRom { .. } => {}
        }
        0
    }
}

/// Stub [`Engine`] backed by [`MockState`].
#[derive(Debug, Clone, Default)]
pub(crate) struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle that outlives the move into a client.
    pub fn state(&self) -> Arc<Mutex<MockState>> {
        Arc::clone(&self.state)
    }

    pub fn handle(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl Engine for MockEngine {
    fn connect(&mut self, target: &ConnectTarget) -> i32 {
        let mut s = self.handle();
        let code = s.step("connect");
        if code == 0 {
            s.connected = true;
            s.params.insert(Param::RemotePort, i32::from(target.port));
            s.target = Some(target.clone());
        }
        code
    }

    fn disconnect(&mut self) -> i32 {
        let mut s = self.handle();
        s.connected = false;
        s.step("disconnect")
    }

    fn get_param(&mut self, param: Param) -> (i32, i32) {
        let mut s = self.handle();
        let code = s.step("get_param");
        let value = s
            .params
            .get(&param)
            .copied()
            .unwrap_or_else(|| param.default_value());
        (value, code)
    }

    fn set_param(&mut self, param: Param, value: i32) -> i32 {
        let mut s = self.handle();
        let code = s.step("set_param");
        if code == 0 {
            s.params.insert(param, value);
            s.param_writes.push((param, value));
        }
        code
    }

    fn read_area(
        &mut self,
        area: Area,
        start: u32,
        _amount: usize,
        _word_len: WordLen,
        buf: &mut [u8],
    ) -> i32 {
        let mut s = self.handle();
        let code = s.step("read_area");
        if code == 0 {
            s.read_into(area, start, buf);
        }
        code
    }

    fn write_area(
        &mut self,
        area: Area,
        start: u32,
        _amount: usize,
        _word_len: WordLen,
        data: &[u8],
    ) -> i32 {
        let mut s = self.handle();
        let code = s.step("write_area");
        if code == 0 {
            s.write_from(area, start, data);
        }
        code
    }

    fn list_blocks(&mut self) -> (BlocksList, i32) {
        let mut s = self.handle();
        let code = s.step("list_blocks");
        let db_count = s.blocks.keys().filter(|(t, _)| *t == BlockType::DB).count() as i32;
        (
            BlocksList {
                db_count,
                ..BlocksList::default()
            },
            code,
        )
    }

    fn list_blocks_of_type(&mut self, block_type: BlockType, buf: &mut [u16]) -> (usize, i32) {
        let mut s = self.handle();
        let code = s.step("list_blocks_of_type");
        let numbers: Vec<u16> = s
            .blocks
            .keys()
            .filter(|(t, _)| *t == block_type)
            .map(|(_, n)| *n)
            .collect();
        let count = numbers.len().min(buf.len());
        buf[..count].copy_from_slice(&numbers[..count]);
        (count, code)
    }

    fn block_info(&mut self, block_type: BlockType, number: u16) -> (BlockInfo, i32) {
        let mut s = self.handle();
        let code = s.step("block_info");
        let size = s
            .blocks
            .get(&(block_type, number))
            .map(Vec::len)
            .unwrap_or_default();
        (
            BlockInfo {
                block_type: block_type.code(),
                number,
                mc7_size: size,
                ..BlockInfo::default()
            },
            code,
        )
    }

    fn upload(&mut self, block_type: BlockType, number: u16, buf: &mut [u8]) -> (usize, i32) {
        let mut s = self.handle();
        let code = s.step("upload");
        let image = s
            .blocks
            .get(&(block_type, number))
            .cloned()
            .unwrap_or_default();
        buf[..image.len()].copy_from_slice(&image);
        (image.len(), code)
    }

    fn download(&mut self, number: Option<u16>, data: &[u8]) -> i32 {
        let mut s = self.handle();
        let code = s.step("download");
        if code == 0 {
            s.blocks
                .insert((BlockType::DB, number.unwrap_or(0)), data.to_vec());
        }
        code
    }

    fn plc_control(&mut self, command: PlcControl) -> i32 {
        let mut s = self.handle();
        let code = s.step(match command {
            PlcControl::Stop => "plc_stop",
            PlcControl::HotStart => "plc_hot_start",
            PlcControl::ColdStart => "plc_cold_start",
        });
        if code == 0 {
            s.cpu_status = if command == PlcControl::Stop { 4 } else { 8 };
        }
        code
    }

    fn compress(&mut self, _timeout_ms: u32) -> i32 {
        self.handle().step("compress")
    }

    fn copy_ram_to_rom(&mut self, _timeout_ms: u32) -> i32 {
        self.handle().step("copy_ram_to_rom")
    }

    fn plc_status(&mut self) -> (i32, i32) {
        let mut s = self.handle();
        let code = s.step("plc_status");
        (s.cpu_status, code)
    }

    fn set_session_password(&mut self, password: &str) -> i32 {
        let mut s = self.handle();
        let code = s.step("set_session_password");
        if code == 0 {
            s.password = Some(password.to_string());
        }
        code
    }

    fn clear_session_password(&mut self) -> i32 {
        let mut s = self.handle();
        s.password = None;
        s.step("clear_session_password")
    }

    fn pdu_length(&mut self) -> (PduLength, i32) {
        let mut s = self.handle();
        let code = s.step("pdu_length");
        let requested = s
            .params
            .get(&Param::PduRequest)
            .copied()
            .unwrap_or_else(|| Param::PduRequest.default_value());
        (
            PduLength {
                requested,
                negotiated: requested.min(240),
            },
            code,
        )
    }

    fn submit(&mut self, request: &JobRequest) -> (EngineJobId, i32) {
        let mut s = self.handle();
        let mut code = s.step("submit");
        s.next_job += 1;
        let id = s.next_job;
        if code == 0 && s.single_job && !s.jobs.is_empty() {
            code = crate::error::codes::CLI_JOB_PENDING;
        }
        if code == 0 {
            let polls = s.pending_polls;
            s.jobs.insert(id, (request.clone(), polls));
        }
        (id, code)
    }

    fn check_completion(&mut self, job: EngineJobId, data: &mut Vec<u8>) -> (JobStatus, i32) {
        let mut s = self.handle();
        let code = s.step("check_completion");
        let Some((request, remaining)) = s.jobs.get_mut(&job) else {
            return (JobStatus::Complete, crate::error::codes::CLI_INVALID_PARAMS);
        };
        if *remaining > 0 {
            *remaining -= 1;
            return (JobStatus::Pending, 0);
        }
        let request = request.clone();
        s.jobs.remove(&job);
        if code != 0 {
            return (JobStatus::Complete, code);
        }
        (JobStatus::Complete, s.finish_job(&request, data))
    }
}
