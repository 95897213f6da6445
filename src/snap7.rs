//! [`Engine`] implementation over the native Snap7 client library.
//!
//! Enabled with the `snap7` feature. Links against `libsnap7`, which must be
//! installed on the system.
//!
//! The native client runs at most one async job at a time. A job holds that
//! slot until its result has been polled, even after the library reports it
//! finished; submitting another one meanwhile returns the job-pending code,
//! which the session translates to `OperationInProgress`. Buffers of the
//! active job are owned here until then.

use std::ffi::{c_char, c_int, c_void, CStr, CString};

use crate::area::{Area, WordLen};
use crate::engine::{
    ConnectTarget, Engine, EngineJobId, JobRequest, JobStatus, PlcControl, MAX_BLOCK_LIST,
    MAX_BLOCK_SIZE,
};
use crate::error::codes;
use crate::info::{BlockInfo, BlockType, BlocksList, PduLength};
use crate::param::Param;

type S7Object = usize;

const JOB_COMPLETE: c_int = 0;

#[repr(C)]
#[derive(Default)]
struct RawBlocksList {
    ob: c_int,
    fb: c_int,
    fc: c_int,
    sfb: c_int,
    sfc: c_int,
    db: c_int,
    sdb: c_int,
}

#[repr(C)]
#[derive(Default)]
struct RawBlockInfo {
    blk_type: c_int,
    blk_number: c_int,
    blk_lang: c_int,
    blk_flags: c_int,
    mc7_size: c_int,
    load_size: c_int,
    local_data: c_int,
    sbb_length: c_int,
    checksum: c_int,
    version: c_int,
    code_date: [c_char; 11],
    intf_date: [c_char; 11],
    author: [c_char; 9],
    family: [c_char; 9],
    header: [c_char; 9],
}

#[link(name = "snap7")]
extern "C" {
    fn Cli_Create() -> S7Object;
    fn Cli_Destroy(client: *mut S7Object);
    fn Cli_SetConnectionType(client: S7Object, connection_type: u16) -> c_int;
    fn Cli_SetConnectionParams(
        client: S7Object,
        address: *const c_char,
        local_tsap: u16,
        remote_tsap: u16,
    ) -> c_int;
    fn Cli_Connect(client: S7Object) -> c_int;
    fn Cli_ConnectTo(client: S7Object, address: *const c_char, rack: c_int, slot: c_int) -> c_int;
    fn Cli_Disconnect(client: S7Object) -> c_int;
    fn Cli_GetParam(client: S7Object, param: c_int, value: *mut c_void) -> c_int;
    fn Cli_SetParam(client: S7Object, param: c_int, value: *mut c_void) -> c_int;
    fn Cli_ReadArea(
        client: S7Object,
        area: c_int,
        db: c_int,
        start: c_int,
        amount: c_int,
        word_len: c_int,
        data: *mut c_void,
    ) -> c_int;
    fn Cli_WriteArea(
        client: S7Object,
        area: c_int,
        db: c_int,
        start: c_int,
        amount: c_int,
        word_len: c_int,
        data: *mut c_void,
    ) -> c_int;
    fn Cli_ListBlocks(client: S7Object, list: *mut RawBlocksList) -> c_int;
    fn Cli_ListBlocksOfType(
        client: S7Object,
        block_type: c_int,
        list: *mut u16,
        count: *mut c_int,
    ) -> c_int;
    fn Cli_GetAgBlockInfo(
        client: S7Object,
        block_type: c_int,
        number: c_int,
        info: *mut RawBlockInfo,
    ) -> c_int;
    fn Cli_Upload(
        client: S7Object,
        block_type: c_int,
        number: c_int,
        data: *mut c_void,
        size: *mut c_int,
    ) -> c_int;
    fn Cli_Download(client: S7Object, number: c_int, data: *mut c_void, size: c_int) -> c_int;
    fn Cli_PlcHotStart(client: S7Object) -> c_int;
    fn Cli_PlcColdStart(client: S7Object) -> c_int;
    fn Cli_PlcStop(client: S7Object) -> c_int;
    fn Cli_Compress(client: S7Object, timeout: c_int) -> c_int;
    fn Cli_CopyRamToRom(client: S7Object, timeout: c_int) -> c_int;
    fn Cli_GetPlcStatus(client: S7Object, status: *mut c_int) -> c_int;
    fn Cli_SetSessionPassword(client: S7Object, password: *mut c_char) -> c_int;
    fn Cli_ClearSessionPassword(client: S7Object) -> c_int;
    fn Cli_GetPduLength(client: S7Object, requested: *mut c_int, negotiated: *mut c_int) -> c_int;
    fn Cli_AsReadArea(
        client: S7Object,
        area: c_int,
        db: c_int,
        start: c_int,
        amount: c_int,
        word_len: c_int,
        data: *mut c_void,
    ) -> c_int;
    fn Cli_AsWriteArea(
        client: S7Object,
        area: c_int,
        db: c_int,
        start: c_int,
        amount: c_int,
        word_len: c_int,
        data: *mut c_void,
    ) -> c_int;
    fn Cli_AsUpload(
        client: S7Object,
        block_type: c_int,
        number: c_int,
        data: *mut c_void,
        size: *mut c_int,
    ) -> c_int;
    fn Cli_AsDownload(client: S7Object, number: c_int, data: *mut c_void, size: c_int) -> c_int;
    fn Cli_AsCompress(client: S7Object, timeout: c_int) -> c_int;
    fn Cli_AsCopyRamToRom(client: S7Object, timeout: c_int) -> c_int;
    fn Cli_CheckAsCompletion(client: S7Object, result: *mut c_int) -> c_int;
    fn Cli_ErrorText(code: c_int, text: *mut c_char, size: c_int) -> c_int;
}

/// Buffers of the async job in flight. Boxed so their addresses stay fixed.
struct ActiveJob {
    id: EngineJobId,
    buffer: Box<[u8]>,
    size: Box<c_int>,
    expects_data: bool,
}

/// One native Snap7 client handle.
pub struct Snap7Engine {
    handle: S7Object,
    next_job: EngineJobId,
    active: Option<ActiveJob>,
}

impl Snap7Engine {
    /// Creates a native client handle.
    pub fn new() -> Self {
        // SAFETY: Cli_Create has no preconditions and returns an owned handle.
        let handle = unsafe { Cli_Create() };
        Self {
            handle,
            next_job: 0,
            active: None,
        }
    }

    fn c_len(len: usize) -> Option<c_int> {
        c_int::try_from(len).ok()
    }
}

impl Default for Snap7Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Snap7Engine {
    fn drop(&mut self) {
        // SAFETY: the handle came from Cli_Create and is destroyed exactly once.
        unsafe { Cli_Destroy(&mut self.handle) };
    }
}

impl std::fmt::Debug for Snap7Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snap7Engine")
            .field("handle", &self.handle)
            .field("job_active", &self.active.is_some())
            .finish()
    }
}

fn c_text(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn param_is_word(param: Param) -> bool {
    matches!(
        param,
        Param::LocalPort | Param::RemotePort | Param::SrcRef | Param::DstRef | Param::SrcTSap
    )
}

fn download_number(number: Option<u16>) -> c_int {
    number.map_or(-1, c_int::from)
}

impl Engine for Snap7Engine {
    fn connect(&mut self, target: &ConnectTarget) -> i32 {
        let Ok(address) = CString::new(target.address.as_str()) else {
            return codes::CLI_INVALID_PARAMS;
        };
        let code = self.set_param(Param::RemotePort, i32::from(target.port));
        if code != 0 {
            return code;
        }
        // SAFETY: `address` outlives the calls; the handle is live.
        unsafe {
            match target.tsap {
                Some(tsap) => {
                    let code = Cli_SetConnectionParams(
                        self.handle,
                        address.as_ptr(),
                        tsap.local,
                        tsap.remote,
                    );
                    if code != 0 {
                        return code;
                    }
                    Cli_Connect(self.handle)
                }
                None => {
                    let code = Cli_SetConnectionType(self.handle, target.connection_type.0);
                    if code != 0 {
                        return code;
                    }
                    Cli_ConnectTo(
                        self.handle,
                        address.as_ptr(),
                        c_int::from(target.rack),
                        c_int::from(target.slot),
                    )
                }
            }
        }
    }

    fn disconnect(&mut self) -> i32 {
        // SAFETY: the handle is live. The active buffers stay alive until the
        // library has dropped the connection.
        let code = unsafe { Cli_Disconnect(self.handle) };
        self.active = None;
        code
    }

    fn get_param(&mut self, param: Param) -> (i32, i32) {
        // SAFETY: the value pointer matches the native type of the parameter.
        unsafe {
            if param_is_word(param) {
                let mut value: u16 = 0;
                let code = Cli_GetParam(self.handle, param.id(), (&mut value as *mut u16).cast());
                (i32::from(value), code)
            } else {
                let mut value: c_int = 0;
                let code = Cli_GetParam(self.handle, param.id(), (&mut value as *mut c_int).cast());
                (value, code)
            }
        }
    }

    fn set_param(&mut self, param: Param, value: i32) -> i32 {
        // SAFETY: the value pointer matches the native type of the parameter.
        unsafe {
            if param_is_word(param) {
                let Ok(mut value) = u16::try_from(value) else {
                    return codes::CLI_INVALID_PARAMS;
                };
                Cli_SetParam(self.handle, param.id(), (&mut value as *mut u16).cast())
            } else {
                let mut value = value;
                Cli_SetParam(self.handle, param.id(), (&mut value as *mut c_int).cast())
            }
        }
    }

    fn read_area(
        &mut self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
        buf: &mut [u8],
    ) -> i32 {
        let (Ok(start), Some(amount)) = (c_int::try_from(start), Self::c_len(amount)) else {
            return codes::CLI_INVALID_PARAMS;
        };
        // SAFETY: `buf` holds exactly amount × width bytes.
        unsafe {
            Cli_ReadArea(
                self.handle,
                c_int::from(area.code()),
                c_int::from(area.db_number()),
                start,
                amount,
                c_int::from(word_len.code()),
                buf.as_mut_ptr().cast(),
            )
        }
    }

    fn write_area(
        &mut self,
        area: Area,
        start: u32,
        amount: usize,
        word_len: WordLen,
        data: &[u8],
    ) -> i32 {
        let (Ok(start), Some(amount)) = (c_int::try_from(start), Self::c_len(amount)) else {
            return codes::CLI_INVALID_PARAMS;
        };
        // SAFETY: `data` holds exactly amount × width bytes; the library only
        // reads from it.
        unsafe {
            Cli_WriteArea(
                self.handle,
                c_int::from(area.code()),
                c_int::from(area.db_number()),
                start,
                amount,
                c_int::from(word_len.code()),
                data.as_ptr() as *mut c_void,
            )
        }
    }

    fn list_blocks(&mut self) -> (BlocksList, i32) {
        let mut raw = RawBlocksList::default();
        // SAFETY: `raw` matches TS7BlocksList.
        let code = unsafe { Cli_ListBlocks(self.handle, &mut raw) };
        let list = BlocksList {
            ob_count: raw.ob,
            fb_count: raw.fb,
            fc_count: raw.fc,
            sfb_count: raw.sfb,
            sfc_count: raw.sfc,
            db_count: raw.db,
            sdb_count: raw.sdb,
        };
        (list, code)
    }

    fn list_blocks_of_type(&mut self, block_type: BlockType, buf: &mut [u16]) -> (usize, i32) {
        // The native call always fills a full TS7BlocksOfType.
        let mut native = vec![0u16; MAX_BLOCK_LIST];
        let mut count = MAX_BLOCK_LIST as c_int;
        // SAFETY: `native` holds MAX_BLOCK_LIST words, the size the library expects.
        let code = unsafe {
            Cli_ListBlocksOfType(
                self.handle,
                c_int::from(block_type.code()),
                native.as_mut_ptr(),
                &mut count,
            )
        };
        let count = usize::try_from(count).unwrap_or(0).min(buf.len());
        buf[..count].copy_from_slice(&native[..count]);
        (count, code)
    }

    fn block_info(&mut self, block_type: BlockType, number: u16) -> (BlockInfo, i32) {
        let mut raw = RawBlockInfo::default();
        // SAFETY: `raw` matches TS7BlockInfo.
        let code = unsafe {
            Cli_GetAgBlockInfo(
                self.handle,
                c_int::from(block_type.code()),
                c_int::from(number),
                &mut raw,
            )
        };
        let info = BlockInfo {
            block_type: raw.blk_type as u8,
            number: raw.blk_number as u16,
            language: raw.blk_lang as u8,
            flags: raw.blk_flags as u8,
            mc7_size: usize::try_from(raw.mc7_size).unwrap_or(0),
            load_size: usize::try_from(raw.load_size).unwrap_or(0),
            local_data: usize::try_from(raw.local_data).unwrap_or(0),
            checksum: raw.checksum as u16,
            version: raw.version as u8,
            code_date: c_text(&raw.code_date),
            interface_date: c_text(&raw.intf_date),
            author: c_text(&raw.author),
            family: c_text(&raw.family),
            header: c_text(&raw.header),
        };
        (info, code)
    }

    fn upload(&mut self, block_type: BlockType, number: u16, buf: &mut [u8]) -> (usize, i32) {
        let Some(mut size) = Self::c_len(buf.len()) else {
            return (0, codes::CLI_INVALID_PARAMS);
        };
        // SAFETY: `size` tells the library how much of `buf` it may fill.
        let code = unsafe {
            Cli_Upload(
                self.handle,
                c_int::from(block_type.code()),
                c_int::from(number),
                buf.as_mut_ptr().cast(),
                &mut size,
            )
        };
        (usize::try_from(size).unwrap_or(0), code)
    }

    fn download(&mut self, number: Option<u16>, data: &[u8]) -> i32 {
        let Some(size) = Self::c_len(data.len()) else {
            return codes::CLI_INVALID_PARAMS;
        };
        // SAFETY: the library only reads `size` bytes from `data`.
        unsafe {
            Cli_Download(
                self.handle,
                download_number(number),
                data.as_ptr() as *mut c_void,
                size,
            )
        }
    }

    fn plc_control(&mut self, command: PlcControl) -> i32 {
        // SAFETY: the handle is live.
        unsafe {
            match command {
                PlcControl::Stop => Cli_PlcStop(self.handle),
                PlcControl::HotStart => Cli_PlcHotStart(self.handle),
                PlcControl::ColdStart => Cli_PlcColdStart(self.handle),
            }
        }
    }

    fn compress(&mut self, timeout_ms: u32) -> i32 {
        let timeout = c_int::try_from(timeout_ms).unwrap_or(c_int::MAX);
        // SAFETY: the handle is live.
        unsafe { Cli_Compress(self.handle, timeout) }
    }

    fn copy_ram_to_rom(&mut self, timeout_ms: u32) -> i32 {
        let timeout = c_int::try_from(timeout_ms).unwrap_or(c_int::MAX);
        // SAFETY: the handle is live.
        unsafe { Cli_CopyRamToRom(self.handle, timeout) }
    }

    fn plc_status(&mut self) -> (i32, i32) {
        let mut status: c_int = 0;
        // SAFETY: `status` is a valid out pointer.
        let code = unsafe { Cli_GetPlcStatus(self.handle, &mut status) };
        (status, code)
    }

    fn set_session_password(&mut self, password: &str) -> i32 {
        let Ok(password) = CString::new(password) else {
            return codes::CLI_INVALID_PARAMS;
        };
        // SAFETY: the library copies the NUL-terminated password.
        unsafe { Cli_SetSessionPassword(self.handle, password.as_ptr() as *mut c_char) }
    }

    fn clear_session_password(&mut self) -> i32 {
        // SAFETY: the handle is live.
        unsafe { Cli_ClearSessionPassword(self.handle) }
    }

    fn pdu_length(&mut self) -> (PduLength, i32) {
        let mut requested: c_int = 0;
        let mut negotiated: c_int = 0;
        // SAFETY: both are valid out pointers.
        let code = unsafe { Cli_GetPduLength(self.handle, &mut requested, &mut negotiated) };
        (
            PduLength {
                requested,
                negotiated,
            },
            code,
        )
    }

    fn submit(&mut self, request: &JobRequest) -> (EngineJobId, i32) {
        self.next_job = self.next_job.wrapping_add(1);
        let id = self.next_job;
        // A finished job keeps its slot until its result has been polled.
        if self.active.is_some() {
            return (id, codes::CLI_JOB_PENDING);
        }
        let (start, amount) = match request {
            JobRequest::ReadArea { start, amount, .. }
            | JobRequest::WriteArea { start, amount, .. } => {
                match (c_int::try_from(*start), Self::c_len(*amount)) {
                    (Ok(start), Some(amount)) => (start, amount),
                    _ => return (id, codes::CLI_INVALID_PARAMS),
                }
            }
            _ => (0, 0),
        };
        let (buffer, expects_data): (Box<[u8]>, bool) = match request {
            JobRequest::ReadArea { .. } => (
                vec![0; request.expected_len().unwrap_or(0)].into_boxed_slice(),
                true,
            ),
            JobRequest::Upload { .. } => (vec![0; MAX_BLOCK_SIZE].into_boxed_slice(), true),
            JobRequest::WriteArea { data, .. } | JobRequest::Download { data, .. } => {
                (data.clone().into_boxed_slice(), false)
            }
            JobRequest::Compress { .. } | JobRequest::CopyRamToRom { .. } => {
                (Box::default(), false)
            }
        };
        let Some(len) = Self::c_len(buffer.len()) else {
            return (id, codes::CLI_INVALID_PARAMS);
        };
        let mut job = ActiveJob {
            id,
            buffer,
            size: Box::new(len),
            expects_data,
        };
        let data: *mut c_void = job.buffer.as_mut_ptr().cast();
        let size: *mut c_int = &mut *job.size;

        // SAFETY: `job` owns the buffer and size cell; it is kept in
        // `self.active` until the library reports completion.
        let code = unsafe {
            match request {
                JobRequest::ReadArea { area, word_len, .. } => Cli_AsReadArea(
                    self.handle,
                    c_int::from(area.code()),
                    c_int::from(area.db_number()),
                    start,
                    amount,
                    c_int::from(word_len.code()),
                    data,
                ),
                JobRequest::WriteArea { area, word_len, .. } => Cli_AsWriteArea(
                    self.handle,
                    c_int::from(area.code()),
                    c_int::from(area.db_number()),
                    start,
                    amount,
                    c_int::from(word_len.code()),
                    data,
                ),
                JobRequest::Upload { block_type, number } => Cli_AsUpload(
                    self.handle,
                    c_int::from(block_type.code()),
                    c_int::from(*number),
                    data,
                    size,
                ),
                JobRequest::Download { number, .. } => {
                    Cli_AsDownload(self.handle, download_number(*number), data, len)
                }
                JobRequest::Compress { timeout_ms } => Cli_AsCompress(
                    self.handle,
                    c_int::try_from(*timeout_ms).unwrap_or(c_int::MAX),
                ),
                JobRequest::CopyRamToRom { timeout_ms } => Cli_AsCopyRamToRom(
                    self.handle,
                    c_int::try_from(*timeout_ms).unwrap_or(c_int::MAX),
                ),
            }
        };
        if code == 0 {
            self.active = Some(job);
        }
        (id, code)
    }

    fn check_completion(&mut self, job: EngineJobId, data: &mut Vec<u8>) -> (JobStatus, i32) {
        if self.active.as_ref().map(|active| active.id) != Some(job) {
            return (JobStatus::Complete, codes::CLI_INVALID_PARAMS);
        }
        let mut result: c_int = 0;
        // SAFETY: `result` is a valid out pointer.
        let status = unsafe { Cli_CheckAsCompletion(self.handle, &mut result) };
        if status != JOB_COMPLETE {
            return (JobStatus::Pending, 0);
        }

        if let Some(finished) = self.active.take() {
            if finished.expects_data && result == 0 {
                let len = usize::try_from(*finished.size)
                    .unwrap_or(0)
                    .min(finished.buffer.len());
                data.clear();
                data.extend_from_slice(&finished.buffer[..len]);
            }
        }
        (JobStatus::Complete, result)
    }
}

/// Returns the native library's text for a code.
///
/// Same wording as [`error_text`](crate::error_text), but straight from the
/// library.
pub fn native_error_text(code: i32) -> String {
    let mut text = [0 as c_char; 1024];
    // SAFETY: `text` is a writable buffer of the size passed.
    unsafe { Cli_ErrorText(code, text.as_mut_ptr(), text.len() as c_int) };
    // SAFETY: the library NUL-terminates within the buffer.
    unsafe { CStr::from_ptr(text.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}
