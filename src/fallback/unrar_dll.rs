//! UnRAR shared library loaded at runtime.
//!
//! Only the handful of entry points needed to list and test-extract are
//! resolved. `RARGetDllVersion` is resolved last so that a library missing
//! any other symbol never reports a usable version.

use super::{RarHeader, RarSession, UnrarEngine};
use crate::archive::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use libloading::Library;
use once_cell::sync::OnceCell;
use std::cell::Cell;
use std::ffi::{c_char, c_int, c_uint, c_void};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::Arc;
use tracing::{debug, info, warn};
use unrar_sys::{
    Handle, HeaderDataEx, OpenArchiveDataEx, ERAR_BAD_ARCHIVE, ERAR_BAD_DATA, ERAR_BAD_PASSWORD,
    ERAR_ECLOSE, ERAR_ECREATE, ERAR_END_ARCHIVE, ERAR_EOPEN, ERAR_EREAD, ERAR_EREFERENCE,
    ERAR_EWRITE, ERAR_MISSING_PASSWORD, ERAR_NO_MEMORY, ERAR_SMALL_BUF, ERAR_SUCCESS,
    ERAR_UNKNOWN_FORMAT, LPARAM, RAR_OM_EXTRACT, RAR_SKIP, RAR_TEST, RHDF_DIRECTORY, UCM_PROCESSDATA,
    UINT, WCHAR,
};

/// Environment variable naming the UnRAR library to load.
pub const LIBRARY_ENV: &str = "UNRAR_LIB_PATH";

type RarOpenArchiveExFn = unsafe extern "system" fn(*const OpenArchiveDataEx) -> *const Handle;
type RarReadHeaderExFn = unsafe extern "system" fn(*const Handle, *const HeaderDataEx) -> c_int;
type RarProcessFileFn =
    unsafe extern "system" fn(*const Handle, c_int, *const c_char, *const c_char) -> c_int;
type RarCloseArchiveFn = unsafe extern "system" fn(*const Handle) -> c_int;
type RarGetDllVersionFn = unsafe extern "system" fn() -> c_int;

fn describe(code: c_int) -> &'static str {
    match code {
        ERAR_END_ARCHIVE => "end of archive",
        ERAR_NO_MEMORY => "out of memory",
        ERAR_BAD_DATA => "bad data (CRC mismatch)",
        ERAR_BAD_ARCHIVE => "bad archive",
        ERAR_UNKNOWN_FORMAT => "unknown archive format",
        ERAR_EOPEN => "cannot open file",
        ERAR_ECREATE => "cannot create file",
        ERAR_ECLOSE => "cannot close file",
        ERAR_EREAD => "read error",
        ERAR_EWRITE => "write error",
        ERAR_SMALL_BUF => "buffer too small",
        ERAR_MISSING_PASSWORD => "password required",
        ERAR_EREFERENCE => "cannot open reference source",
        ERAR_BAD_PASSWORD => "wrong password",
        _ => "unknown error",
    }
}

/// UnRAR engine backed by `unrar.dll` / `libunrar`.
pub struct DynamicUnrar {
    open_archive: RarOpenArchiveExFn,
    read_header: RarReadHeaderExFn,
    process_file: RarProcessFileFn,
    close_archive: RarCloseArchiveFn,
    version: u32,
    path: PathBuf,
    // keeps the function pointers above valid
    _library: Library,
}

impl std::fmt::Debug for DynamicUnrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicUnrar")
            .field("version", &self.version)
            .field("path", &self.path)
            .finish()
    }
}

impl DynamicUnrar {
    /// Load the library at `path` and resolve its entry points.
    pub fn load(path: &Path) -> Result<Self> {
        let library = unsafe { Library::new(path) }.map_err(|e| {
            ArchiveError::FallbackUnavailable(format!("Failed to load {}: {}", path.display(), e))
        })?;
        let missing = |e: libloading::Error| {
            ArchiveError::FallbackUnavailable(format!(
                "Missing UnRAR symbol in {}: {}",
                path.display(),
                e
            ))
        };

        // SAFETY: signatures match unrar.h; the pointers are only called
        // while `_library` is alive
        let (open_archive, read_header, process_file, close_archive, version) = unsafe {
            let open_archive = *library
                .get::<RarOpenArchiveExFn>(b"RAROpenArchiveEx\0")
                .map_err(missing)?;
            let read_header = *library
                .get::<RarReadHeaderExFn>(b"RARReadHeaderEx\0")
                .map_err(missing)?;
            let process_file = *library
                .get::<RarProcessFileFn>(b"RARProcessFile\0")
                .map_err(missing)?;
            let close_archive = *library
                .get::<RarCloseArchiveFn>(b"RARCloseArchive\0")
                .map_err(missing)?;
            let get_version = *library
                .get::<RarGetDllVersionFn>(b"RARGetDllVersion\0")
                .map_err(missing)?;
            (open_archive, read_header, process_file, close_archive, get_version())
        };

        let version = u32::try_from(version).unwrap_or(0);
        debug!("Loaded {} (UnRAR API version {})", path.display(), version);
        Ok(Self {
            open_archive,
            read_header,
            process_file,
            close_archive,
            version,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try each candidate location in turn, see [`system_engine`].
    pub fn locate(explicit: Option<&Path>) -> Option<Self> {
        for candidate in candidates(explicit) {
            match Self::load(&candidate) {
                Ok(engine) => {
                    info!(
                        "Using UnRAR library {} (API version {})",
                        engine.path().display(),
                        engine.version
                    );
                    return Some(engine);
                }
                Err(e) => debug!("{}", e),
            }
        }
        warn!("No UnRAR library found, RAR fallback is unavailable");
        None
    }
}

fn library_names() -> Vec<PathBuf> {
    if cfg!(windows) {
        if cfg!(target_pointer_width = "64") {
            vec![PathBuf::from("unrar64.dll"), PathBuf::from("unrar.dll")]
        } else {
            vec![PathBuf::from("unrar.dll")]
        }
    } else {
        vec![PathBuf::from(libloading::library_filename("unrar"))]
    }
}

/// Explicit path, `UNRAR_LIB_PATH`, next to the executable, then bare names
/// for the platform loader's search path.
fn candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(path) = explicit {
        out.push(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(LIBRARY_ENV).filter(|p| !p.is_empty()) {
        out.push(PathBuf::from(path));
    }

    let names = library_names();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        out.extend(names.iter().map(|name| dir.join(name)));
    }
    out.extend(names);
    out
}

static SYSTEM_ENGINE: OnceCell<Option<Arc<DynamicUnrar>>> = OnceCell::new();

/// The process-wide UnRAR engine, located on first use.
///
/// The library is searched for once; `explicit` only matters on the first
/// call in the process.
pub fn system_engine(explicit: Option<&Path>) -> Option<Arc<dyn UnrarEngine>> {
    SYSTEM_ENGINE
        .get_or_init(|| DynamicUnrar::locate(explicit).map(Arc::new))
        .clone()
        .map(|engine| engine as Arc<dyn UnrarEngine>)
}

impl UnrarEngine for DynamicUnrar {
    fn version(&self) -> u32 {
        self.version
    }

    fn open(&self, archive: &Path) -> Result<Box<dyn RarSession + '_>> {
        let wide_name = to_wide(archive);
        let slot = Box::new(CallbackSlot {
            target: Cell::new(ptr::null_mut()),
        });

        // The wide name takes precedence over the narrow one, which stays null
        let mut data = OpenArchiveDataEx::new(ptr::null(), RAR_OM_EXTRACT);
        data.archive_name_w = wide_name.as_ptr();
        data.callback = Some(unrar_callback);
        data.user_data = &*slot as *const CallbackSlot as LPARAM;

        let handle = unsafe { (self.open_archive)(&mut data) };
        let handle = match NonNull::new(handle.cast_mut()) {
            Some(handle) if data.open_result == ERAR_SUCCESS as c_uint => handle,
            Some(handle) => {
                unsafe { (self.close_archive)(handle.as_ptr()) };
                return Err(open_error(archive, data.open_result));
            }
            None => return Err(open_error(archive, data.open_result)),
        };

        Ok(Box::new(DllSession {
            engine: self,
            handle,
            slot,
            archive: archive.to_path_buf(),
        }))
    }
}

fn open_error(archive: &Path, code: c_uint) -> ArchiveError {
    let code = c_int::try_from(code).unwrap_or(-1);
    ArchiveError::parse(
        ArchiveFormat::Rar,
        format!("UnRAR could not open {}: {}", archive.display(), describe(code)),
    )
}

/// Target of the data callback, fixed at open time and pointed at the
/// caller's closure for the duration of one `test`.
struct CallbackSlot {
    // *mut &mut dyn FnMut(&[u8]) -> bool, or null outside of `test`
    target: Cell<*mut c_void>,
}

extern "C" fn unrar_callback(msg: UINT, user_data: LPARAM, data: LPARAM, len: LPARAM) -> c_int {
    if msg != UCM_PROCESSDATA || user_data == 0 {
        return -1;
    }
    // SAFETY: user_data is the address of the session's boxed slot
    let slot = unsafe { &*(user_data as *const CallbackSlot) };
    let target = slot.target.get();
    if target.is_null() {
        return -1;
    }
    let Ok(len) = usize::try_from(len) else {
        return -1;
    };
    if len == 0 {
        return 1;
    }

    // SAFETY: the engine hands us `len` readable bytes; `target` was set by
    // `test` from a live closure reference and is cleared before it returns
    let (chunk, on_data) = unsafe {
        (
            std::slice::from_raw_parts(data as *const u8, len),
            &mut *(target as *mut &mut dyn FnMut(&[u8]) -> bool),
        )
    };
    if on_data(chunk) {
        1
    } else {
        -1
    }
}

struct DllSession<'a> {
    engine: &'a DynamicUnrar,
    handle: NonNull<Handle>,
    slot: Box<CallbackSlot>,
    archive: PathBuf,
}

impl DllSession<'_> {
    fn failure(&self, what: &str, code: c_int) -> ArchiveError {
        ArchiveError::decode(
            self.archive.display().to_string(),
            format!("UnRAR {} failed: {}", what, describe(code)),
        )
    }
}

impl RarSession for DllSession<'_> {
    fn read_header(&mut self) -> Result<Option<RarHeader>> {
        let mut header = Box::new(HeaderDataEx::default());
        let code = unsafe { (self.engine.read_header)(self.handle.as_ptr(), &mut *header) };
        match code {
            ERAR_SUCCESS => {}
            ERAR_END_ARCHIVE => return Ok(None),
            code => return Err(self.failure("header read", code)),
        }

        Ok(Some(RarHeader {
            file_name: from_wide(&header.filename_w),
            unpacked_size_low: header.unp_size,
            unpacked_size_high: header.unp_size_high,
            file_time: header.file_time,
            is_directory: header.flags & RHDF_DIRECTORY != 0,
        }))
    }

    fn skip(&mut self) -> Result<()> {
        let code = unsafe {
            (self.engine.process_file)(
                self.handle.as_ptr(),
                RAR_SKIP,
                ptr::null(),
                ptr::null(),
            )
        };
        if code != ERAR_SUCCESS {
            return Err(self.failure("skip", code));
        }
        Ok(())
    }

    fn test(&mut self, on_data: &mut dyn FnMut(&[u8]) -> bool) -> Result<()> {
        let mut target: &mut dyn FnMut(&[u8]) -> bool = on_data;
        self.slot
            .target
            .set((&mut target as *mut &mut dyn FnMut(&[u8]) -> bool).cast::<c_void>());

        let code = unsafe {
            (self.engine.process_file)(
                self.handle.as_ptr(),
                RAR_TEST,
                ptr::null(),
                ptr::null(),
            )
        };
        self.slot.target.set(ptr::null_mut());

        if code != ERAR_SUCCESS {
            return Err(self.failure("extraction", code));
        }
        Ok(())
    }
}

impl Drop for DllSession<'_> {
    fn drop(&mut self) {
        let code = unsafe { (self.engine.close_archive)(self.handle.as_ptr()) };
        if code != ERAR_SUCCESS {
            warn!("Failed to close {}: {}", self.archive.display(), describe(code));
        }
    }
}

#[cfg(windows)]
fn to_wide(path: &Path) -> Vec<WCHAR> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
}

#[cfg(not(windows))]
fn to_wide(path: &Path) -> Vec<WCHAR> {
    path.to_string_lossy()
        .chars()
        .map(|c| c as WCHAR)
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(windows)]
fn from_wide(buf: &[WCHAR]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

#[cfg(not(windows))]
fn from_wide(buf: &[WCHAR]) -> String {
    buf.iter()
        .take_while(|&&c| c != 0)
        .map(|&c| {
            u32::try_from(c)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect()
}
