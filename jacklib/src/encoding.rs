use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ffi::{CStr, CString, c_char};
use std::fmt;

/// Text encoding applied to every string crossing the native boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    #[serde(alias = "iso-8859-1")]
    Latin1,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodeError {
    InteriorNul,
    Unrepresentable(char),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::InteriorNul => f.write_str("text contains an interior NUL byte"),
            EncodeError::Unrepresentable(c) => {
                write!(f, "character {c:?} cannot be represented in the target encoding")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

impl TextEncoding {
    pub fn encode(self, text: &str) -> Result<CString, EncodeError> {
        let bytes = match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| EncodeError::Unrepresentable(c)))
                .collect::<Result<Vec<u8>, _>>()?,
        };
        CString::new(bytes).map_err(|_| EncodeError::InteriorNul)
    }

    /// Strict decode; `None` when the bytes are not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    pub fn decode_lossy(self, bytes: &[u8]) -> Cow<'_, str> {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes),
            TextEncoding::Latin1 => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Reads a borrowed native string. Null yields `None`.
    ///
    /// # Safety
    /// `ptr` must be null or point to a NUL-terminated string that stays
    /// valid for the duration of the call.
    pub unsafe fn read(self, ptr: *const c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        // SAFETY: guaranteed by the caller.
        let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
        Some(self.decode_lossy(bytes).into_owned())
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 => f.write_str("utf-8"),
            TextEncoding::Latin1 => f.write_str("latin-1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_encode_rejects_interior_nul() {
        assert_eq!(
            TextEncoding::Utf8.encode("a\0b"),
            Err(EncodeError::InteriorNul)
        );
        assert_eq!(
            TextEncoding::Utf8.encode("système:playback_1").unwrap().as_bytes(),
            "système:playback_1".as_bytes()
        );
    }

    #[test]
    fn latin1_is_byte_per_char() {
        let encoded = TextEncoding::Latin1.encode("système").unwrap();
        assert_eq!(encoded.as_bytes(), b"syst\xe8me");
        assert_eq!(
            TextEncoding::Latin1.decode(encoded.as_bytes()).as_deref(),
            Some("système")
        );
        assert_eq!(
            TextEncoding::Latin1.encode("€"),
            Err(EncodeError::Unrepresentable('€'))
        );
    }

    #[test]
    fn strict_utf8_decode_fails_on_invalid_bytes() {
        assert_eq!(TextEncoding::Utf8.decode(b"\xff\xfe"), None);
        assert_eq!(TextEncoding::Utf8.decode_lossy(b"ok\xff"), "ok\u{fffd}");
    }

    #[test]
    fn reads_native_strings() {
        let owned = CString::new("system:capture_1").unwrap();
        // SAFETY: `owned` is a valid NUL-terminated string.
        let read = unsafe { TextEncoding::Utf8.read(owned.as_ptr()) };
        assert_eq!(read.as_deref(), Some("system:capture_1"));
        // SAFETY: null is explicitly allowed.
        assert_eq!(unsafe { TextEncoding::Utf8.read(std::ptr::null()) }, None);
    }
}
