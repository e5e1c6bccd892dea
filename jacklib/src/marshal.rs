use crate::encoding::TextEncoding;
use crate::flags::Status;
use crate::types::MidiData;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::iter::FusedIterator;

pub(crate) type FreeFn = unsafe extern "C" fn(*mut c_void);

const STATUS_DESCRIPTIONS: [(Status, &str); 13] = [
    (Status::FAILURE, "Overall operation failed"),
    (
        Status::INVALID_OPTION,
        "The operation contained an invalid or unsupported option",
    ),
    (
        Status::NAME_NOT_UNIQUE,
        "The desired client name was not unique",
    ),
    (
        Status::SERVER_STARTED,
        "The JACK server was started as a result of this operation",
    ),
    (Status::SERVER_FAILED, "Unable to connect to the JACK server"),
    (
        Status::SERVER_ERROR,
        "Communication error with the JACK server",
    ),
    (Status::NO_SUCH_CLIENT, "Requested client does not exist"),
    (Status::LOAD_FAILURE, "Unable to load internal client"),
    (Status::INIT_FAILURE, "Unable to initialize client"),
    (Status::SHM_FAILURE, "Unable to access shared memory"),
    (
        Status::VERSION_ERROR,
        "Client's protocol version does not match",
    ),
    (Status::BACKEND_ERROR, "Backend Error"),
    (
        Status::CLIENT_ZOMBIE,
        "Client is being shutdown against its will",
    ),
];

/// Human readable description of a `jack_status_t` bitmask: one sentence
/// per set bit in header order, joined by `";\n"` and closed with `"."`.
/// The generic failure text is included whenever bit 0x01 is set.
pub fn status_description(status: c_int) -> String {
    let status = Status(status);
    let parts: Vec<&str> = STATUS_DESCRIPTIONS
        .iter()
        .filter(|(flag, _)| status.contains(*flag))
        .map(|(_, text)| *text)
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("{}.", parts.join(";\n"))
    }
}

/// Lazily decodes a native null-terminated `char **` owned by libjack.
///
/// Iteration stops at the first null entry. The array is handed back to
/// `jack_free` exactly once: when the iterator is exhausted, or on drop if
/// iteration stopped early.
pub struct NativeStrings {
    array: *mut *const c_char,
    index: usize,
    free: Option<FreeFn>,
    encoding: TextEncoding,
    released: bool,
}

impl NativeStrings {
    /// # Safety
    /// `array` must be null or a null-terminated array of NUL-terminated
    /// strings allocated by libjack, not used elsewhere after this call.
    pub(crate) unsafe fn from_raw(
        array: *mut *const c_char,
        free: Option<FreeFn>,
        encoding: TextEncoding,
    ) -> Self {
        Self {
            array,
            index: 0,
            free,
            encoding,
            released: array.is_null(),
        }
    }

    pub fn empty() -> Self {
        // SAFETY: a null array is never read or freed.
        unsafe { Self::from_raw(std::ptr::null_mut(), None, TextEncoding::Utf8) }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(free) = self.free {
            // SAFETY: the array came from libjack and is released only here.
            unsafe { free(self.array.cast()) };
        }
    }
}

impl Iterator for NativeStrings {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.released {
            return None;
        }
        // SAFETY: `index` never moves past the terminating null entry, which
        // the constructor's contract guarantees exists.
        let entry = unsafe { *self.array.add(self.index) };
        if entry.is_null() {
            self.release();
            return None;
        }
        self.index += 1;
        // SAFETY: non-null entries are NUL-terminated strings.
        let bytes = unsafe { CStr::from_ptr(entry) }.to_bytes();
        Some(self.encoding.decode_lossy(bytes).into_owned())
    }
}

impl FusedIterator for NativeStrings {}

impl Drop for NativeStrings {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for NativeStrings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeStrings")
            .field("index", &self.index)
            .field("released", &self.released)
            .finish()
    }
}

/// Materializes a native string array and frees it immediately.
///
/// # Safety
/// Same contract as [`NativeStrings::from_raw`].
pub(crate) unsafe fn collect_strings(
    array: *mut *const c_char,
    free: Option<FreeFn>,
    encoding: TextEncoding,
) -> Vec<String> {
    // SAFETY: forwarded from the caller.
    unsafe { NativeStrings::from_raw(array, free, encoding) }.collect()
}

/// A MIDI message of at most four bytes, copied out of a native event
/// buffer without allocating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShortMessage {
    bytes: [u8; 4],
    len: u8,
}

impl ShortMessage {
    /// Copies `len` bytes from `buffer`. A null buffer or a length above
    /// four yields an empty message.
    ///
    /// # Safety
    /// When non-null and `len <= 4`, `buffer` must be readable for `len`
    /// bytes.
    pub unsafe fn from_raw(buffer: *const MidiData, len: usize) -> Self {
        let mut message = Self::default();
        if buffer.is_null() || len > message.bytes.len() {
            return message;
        }
        // SAFETY: guaranteed by the caller for `len <= 4`.
        let source = unsafe { std::slice::from_raw_parts(buffer.cast::<u8>(), len) };
        message.bytes[..len].copy_from_slice(source);
        message.len = len as u8;
        message
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn status(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }
}
