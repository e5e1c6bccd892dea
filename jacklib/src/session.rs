//! Session management and client UUIDs.

use crate::client::{Api, ClientHandle};
use crate::encoding::TextEncoding;
use crate::flags::{SessionEventType, SessionFlags};
use crate::types::{JackSessionEvent, UUID_STRING_SIZE, Uuid};
use serde::Serialize;
use std::ffi::{c_char, c_int};
use std::ptr::NonNull;

/// A session event handed to the session callback. Answer it with
/// [`Api::session_reply`] and release it with [`Api::session_event_free`].
#[derive(Debug)]
pub struct SessionEvent {
    raw: NonNull<JackSessionEvent>,
    encoding: TextEncoding,
}

// SAFETY: the event is owned by the client until freed and may be answered
// from any thread.
unsafe impl Send for SessionEvent {}

impl SessionEvent {
    pub(crate) fn new(raw: NonNull<JackSessionEvent>, encoding: TextEncoding) -> Self {
        Self { raw, encoding }
    }

    fn event(&self) -> &JackSessionEvent {
        // SAFETY: the event stays valid until `session_event_free`.
        unsafe { self.raw.as_ref() }
    }

    pub fn kind(&self) -> Option<SessionEventType> {
        SessionEventType::from_raw(self.event().kind)
    }

    pub fn session_dir(&self) -> Option<String> {
        // SAFETY: libjack fills in a NUL-terminated directory.
        unsafe { self.encoding.read(self.event().session_dir) }
    }

    pub fn client_uuid(&self) -> Option<String> {
        // SAFETY: libjack fills in a NUL-terminated UUID string.
        unsafe { self.encoding.read(self.event().client_uuid) }
    }

    pub fn flags(&self) -> SessionFlags {
        SessionFlags(self.event().flags)
    }

    pub fn set_flags(&mut self, flags: SessionFlags) {
        // SAFETY: the client owns the event until it replies.
        unsafe { self.raw.as_mut() }.flags = flags.bits();
    }

    /// Stores the command that restores this client. Returns `false` when
    /// the text cannot be encoded or allocation fails.
    pub fn set_command_line(&mut self, command: &str) -> bool {
        let Ok(command) = self.encoding.encode(command) else {
            return false;
        };
        let bytes = command.as_bytes_with_nul();
        // SAFETY: plain C allocation; `jack_session_event_free` releases the
        // command line with the C allocator.
        let copy = unsafe { libc::malloc(bytes.len()) }.cast::<c_char>();
        if copy.is_null() {
            return false;
        }
        // SAFETY: `copy` holds `bytes.len()` writable bytes; any previous
        // command line is ours to release.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), copy, bytes.len());
            let event = self.raw.as_mut();
            if !event.command_line.is_null() {
                libc::free(event.command_line.cast());
            }
            event.command_line = copy;
        }
        true
    }

    pub fn as_ptr(&self) -> *mut JackSessionEvent {
        self.raw.as_ptr()
    }
}

/// One reply collected by `jack_session_notify`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionCommand {
    pub uuid: String,
    pub client_name: String,
    pub command: String,
    pub flags: c_int,
}

impl Api {
    pub fn session_reply(&self, client: ClientHandle, event: &SessionEvent) -> c_int {
        native_call!(self, jack_session_reply(client.as_ptr(), event.as_ptr()), -1)
    }

    pub fn session_event_free(&self, event: SessionEvent) {
        native_call!(self, jack_session_event_free(event.as_ptr()), ())
    }

    /// `jack_client_get_uuid`; the string is released with `jack_free`.
    pub fn client_get_uuid(&self, client: ClientHandle) -> Option<String> {
        let uuid = native_call!(self, jack_client_get_uuid(client.as_ptr()), return None);
        self.take(uuid, self.encoding())
    }

    /// Asks other clients to save their state; the native command list is
    /// released with `jack_session_commands_free`.
    pub fn session_notify(
        &self,
        client: ClientHandle,
        target: Option<&str>,
        kind: SessionEventType,
        path: &str,
    ) -> Vec<SessionCommand> {
        let encoding = self.encoding();
        let target = match target {
            Some(target) => match self.encode(target, encoding) {
                Some(target) => Some(target),
                None => return Vec::new(),
            },
            None => None,
        };
        let Some(path) = self.encode(path, encoding) else {
            return Vec::new();
        };
        let commands = native_call!(
            self,
            jack_session_notify(
                client.as_ptr(),
                target.as_ref().map_or(std::ptr::null(), |target| target.as_ptr()),
                kind.raw(),
                path.as_ptr(),
            ),
            return Vec::new()
        );
        if commands.is_null() {
            return Vec::new();
        }

        let mut replies = Vec::new();
        let mut cursor = commands;
        // SAFETY: the list is terminated by an entry with a null uuid.
        unsafe {
            while !(*cursor).uuid.is_null() {
                let command = &*cursor;
                replies.push(SessionCommand {
                    uuid: encoding.read(command.uuid).unwrap_or_default(),
                    client_name: encoding.read(command.client_name).unwrap_or_default(),
                    command: encoding.read(command.command).unwrap_or_default(),
                    flags: command.flags,
                });
                cursor = cursor.add(1);
            }
        }
        native_call!(self, jack_session_commands_free(commands), ());
        replies
    }

    pub fn get_uuid_for_client_name(&self, client: ClientHandle, client_name: &str) -> Option<String> {
        let client_name = self.encode(client_name, self.encoding())?;
        let uuid = native_call!(
            self,
            jack_get_uuid_for_client_name(client.as_ptr(), client_name.as_ptr()),
            return None
        );
        self.take(uuid, self.encoding())
    }

    pub fn get_client_name_by_uuid(&self, client: ClientHandle, client_uuid: &str) -> Option<String> {
        let client_uuid = self.encode(client_uuid, self.encoding())?;
        let name = native_call!(
            self,
            jack_get_client_name_by_uuid(client.as_ptr(), client_uuid.as_ptr()),
            return None
        );
        self.take(name, self.encoding())
    }

    pub fn reserve_client_name(&self, client: ClientHandle, name: &str, uuid: &str) -> c_int {
        let (Some(name), Some(uuid)) = (
            self.encode(name, self.encoding()),
            self.encode(uuid, self.encoding()),
        ) else {
            return -1;
        };
        native_call!(
            self,
            jack_reserve_client_name(client.as_ptr(), name.as_ptr(), uuid.as_ptr()),
            -1
        )
    }

    pub fn client_has_session_callback(&self, client: ClientHandle, client_name: &str) -> c_int {
        let Some(client_name) = self.encode(client_name, self.encoding()) else {
            return -1;
        };
        native_call!(
            self,
            jack_client_has_session_callback(client.as_ptr(), client_name.as_ptr()),
            -1
        )
    }

    /// `jack_uuid_parse`; `None` when unresolved or not a valid UUID.
    pub fn uuid_parse(&self, text: &str) -> Option<Uuid> {
        let text = self.encode(text, TextEncoding::Utf8)?;
        let mut uuid: Uuid = 0;
        let status = native_call!(self, jack_uuid_parse(text.as_ptr(), &mut uuid), return None);
        (status == 0).then_some(uuid)
    }

    pub fn uuid_unparse(&self, uuid: Uuid) -> Option<String> {
        let mut buffer = [0u8; UUID_STRING_SIZE];
        native_call!(
            self,
            jack_uuid_unparse(uuid, buffer.as_mut_ptr().cast::<c_char>()),
            return None
        );
        let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
        Some(String::from_utf8_lossy(&buffer[..end]).into_owned())
    }
}
