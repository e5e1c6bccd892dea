//! In-process stand-in for libjack. Every mock entry point records what it
//! was called with in thread-local state, so tests running in parallel never
//! observe each other.

use crate::library::{NativeLibrary, SymbolSource};
use crate::types::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_int, c_ulong, c_void};
use std::ptr::{self, NonNull};
use std::sync::Arc;

pub(crate) const PORT_UUID: Uuid = 0x2a00_0000_0001;
pub(crate) const PORT_NAME: &str = "system:capture_1";
pub(crate) const CLIENT_UUID: Uuid = 42;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Registration {
    pub callback: Option<usize>,
    pub arg: *mut c_void,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct MockProperty {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub mime: Option<Vec<u8>>,
}

#[derive(Default)]
pub(crate) struct MockState {
    pub events: Vec<String>,
    pub freed: Vec<usize>,
    pub freed_descriptions: Vec<(Uuid, c_int)>,
    pub registrations: HashMap<&'static str, Registration>,
    pub setter_status: c_int,
    pub string_array: Option<Vec<Option<String>>>,
    pub descriptions: Vec<(Uuid, Vec<MockProperty>)>,
    pub midi_events: Vec<(NFrames, Vec<u8>)>,
    pub error_function: Option<usize>,
    pub info_function: Option<usize>,
    pub closed: usize,
    pub session_commands: Option<usize>,
}

thread_local! {
    static STATE: RefCell<MockState> = RefCell::new(MockState::default());
}

pub(crate) fn with_state<R>(f: impl FnOnce(&mut MockState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub(crate) fn events() -> Vec<String> {
    with_state(|state| state.events.clone())
}

pub(crate) fn record(event: impl Into<String>) {
    let event = event.into();
    with_state(|state| state.events.push(event));
}

pub(crate) fn registration(setter: &str) -> Option<Registration> {
    with_state(|state| state.registrations.get(setter).copied())
}

pub(crate) fn free_count() -> usize {
    with_state(|state| state.freed.len())
}

/// Mock symbol table keyed by exported name.
#[derive(Default)]
pub(crate) struct MockLibrary {
    symbols: HashMap<&'static str, usize>,
}

extern "C" fn placeholder() {
    std::process::abort()
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports `name` without a usable implementation; resolution only.
    pub fn with(self, name: &'static str) -> Self {
        self.with_fn(name, placeholder as *const ())
    }

    pub fn with_fn(mut self, name: &'static str, address: *const ()) -> Self {
        self.symbols.insert(name, address as usize);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.symbols.remove(name);
        self
    }

    /// Every mock entry point of this module.
    pub fn full() -> Self {
        native::entry_points()
            .into_iter()
            .fold(Self::new(), |mock, (name, address)| mock.with_fn(name, address))
    }

    pub fn into_native(self) -> Arc<NativeLibrary> {
        // SAFETY: mock functions are `'static` and match the signature of
        // the name they are exported under; placeholders are never called.
        Arc::new(unsafe { NativeLibrary::from_source(&self) })
    }
}

impl SymbolSource for MockLibrary {
    fn address(&self, name: &str) -> Option<NonNull<c_void>> {
        self.symbols
            .get(name)
            .and_then(|&address| NonNull::new(address as *mut c_void))
    }
}

fn leak_text(bytes: &[u8]) -> *mut c_char {
    CString::new(bytes.to_vec())
        .expect("mock text without NUL")
        .into_raw()
}

/// Builds a native `char **` holding `entries` verbatim plus a closing null.
pub(crate) fn leak_string_array(entries: &[Option<String>]) -> *mut *const c_char {
    let mut raw: Vec<*const c_char> = entries
        .iter()
        .map(|entry| {
            entry
                .as_deref()
                .map_or(ptr::null(), |text| leak_text(text.as_bytes()).cast_const())
        })
        .collect();
    raw.push(ptr::null());
    Box::leak(raw.into_boxed_slice()).as_mut_ptr()
}

fn leak_description(subject: Uuid, properties: &[MockProperty]) -> JackDescription {
    let native: Vec<JackProperty> = properties
        .iter()
        .map(|property| JackProperty {
            key: leak_text(&property.key),
            data: leak_text(&property.value),
            mime_type: property
                .mime
                .as_deref()
                .map_or(ptr::null(), |mime| leak_text(mime).cast_const()),
        })
        .collect();
    let count = native.len() as u32;
    JackDescription {
        subject,
        property_cnt: count,
        properties: if native.is_empty() {
            ptr::null_mut()
        } else {
            Box::leak(native.into_boxed_slice()).as_mut_ptr()
        },
        property_size: count,
    }
}

unsafe fn read_bytes(text: *const c_char) -> Option<Vec<u8>> {
    if text.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(text) }.to_bytes().to_vec())
    }
}

mod native {
    use super::*;

    pub(super) fn entry_points() -> Vec<(&'static str, *const ())> {
        let mut points: Vec<(&'static str, *const ())> = vec![
            ("jack_get_version_string", get_version_string as *const ()),
            ("jack_free", free as *const ()),
            ("jack_client_close", client_close as *const ()),
            ("jack_activate", activate as *const ()),
            ("jack_get_sample_rate", get_sample_rate as *const ()),
            ("jack_get_buffer_size", get_buffer_size as *const ()),
            ("jack_get_cycle_times", get_cycle_times as *const ()),
            ("jack_get_ports", get_ports as *const ()),
            ("jack_port_get_connections", port_get_connections as *const ()),
            ("jack_port_get_all_connections", port_get_all_connections as *const ()),
            ("jack_port_by_name", port_by_name as *const ()),
            ("jack_port_name", port_name as *const ()),
            ("jack_port_uuid", port_uuid as *const ()),
            ("jack_port_name_size", port_name_size as *const ()),
            ("jack_port_get_aliases", port_get_aliases as *const ()),
            ("jack_connect", connect as *const ()),
            ("jack_get_uuid_for_client_name", get_uuid_for_client_name as *const ()),
            ("jack_client_get_uuid", client_get_uuid as *const ()),
            ("jack_uuid_parse", uuid_parse as *const ()),
            ("jack_uuid_unparse", uuid_unparse as *const ()),
            ("jack_session_notify", session_notify as *const ()),
            ("jack_session_commands_free", session_commands_free as *const ()),
            ("jack_get_properties", get_properties as *const ()),
            ("jack_get_all_properties", get_all_properties as *const ()),
            ("jack_free_description", free_description as *const ()),
            ("jack_get_property", get_property as *const ()),
            ("jack_set_property", set_property as *const ()),
            ("jack_remove_property", remove_property as *const ()),
            ("jack_remove_properties", remove_properties as *const ()),
            ("jack_remove_all_properties", remove_all_properties as *const ()),
            ("jack_set_error_function", set_error_function as *const ()),
            ("jack_set_info_function", set_info_function as *const ()),
            ("jack_midi_get_event_count", midi_get_event_count as *const ()),
            ("jack_midi_event_get", midi_event_get as *const ()),
            ("jack_transport_query", transport_query as *const ()),
            ("jack_on_shutdown", on_shutdown as *const ()),
            ("jack_on_info_shutdown", on_info_shutdown as *const ()),
            ("jack_set_timebase_callback", set_timebase_callback as *const ()),
        ];
        points.extend(status_setters());
        points
    }

    fn record_setter(name: &'static str, callback: Option<usize>, arg: *mut c_void) -> c_int {
        with_state(|state| {
            state.events.push(format!("set {name}"));
            if state.setter_status == 0 {
                state
                    .registrations
                    .insert(name, Registration { callback, arg });
            }
            state.setter_status
        })
    }

    macro_rules! mock_status_setters {
        ($($name:ident: $cb:ty,)*) => {
            $(
                unsafe extern "C" fn $name(
                    _client: *mut JackClient,
                    callback: Option<$cb>,
                    arg: *mut c_void,
                ) -> c_int {
                    record_setter(stringify!($name), callback.map(|f| f as usize), arg)
                }
            )*

            fn status_setters() -> Vec<(&'static str, *const ())> {
                vec![$((stringify!($name), $name as *const ())),*]
            }
        };
    }

    mock_status_setters! {
        jack_set_thread_init_callback: JackThreadInitCallback,
        jack_set_process_callback: JackProcessCallback,
        jack_set_freewheel_callback: JackFreewheelCallback,
        jack_set_buffer_size_callback: JackBufferSizeCallback,
        jack_set_sample_rate_callback: JackSampleRateCallback,
        jack_set_client_registration_callback: JackClientRegistrationCallback,
        jack_set_client_rename_callback: JackClientRenameCallback,
        jack_set_port_registration_callback: JackPortRegistrationCallback,
        jack_set_port_connect_callback: JackPortConnectCallback,
        jack_set_port_rename_callback: JackPortRenameCallback,
        jack_set_graph_order_callback: JackGraphOrderCallback,
        jack_set_xrun_callback: JackXRunCallback,
        jack_set_latency_callback: JackLatencyCallback,
        jack_set_sync_callback: JackSyncCallback,
        jack_set_session_callback: JackSessionCallback,
        jack_set_property_change_callback: JackPropertyChangeCallback,
        jack_set_process_thread: JackThreadCallback,
    }

    unsafe extern "C" fn set_timebase_callback(
        _client: *mut JackClient,
        _conditional: c_int,
        callback: Option<JackTimebaseCallback>,
        arg: *mut c_void,
    ) -> c_int {
        record_setter(
            "jack_set_timebase_callback",
            callback.map(|f| f as usize),
            arg,
        )
    }

    unsafe extern "C" fn on_shutdown(
        _client: *mut JackClient,
        callback: Option<JackShutdownCallback>,
        arg: *mut c_void,
    ) {
        record_setter("jack_on_shutdown", callback.map(|f| f as usize), arg);
    }

    unsafe extern "C" fn on_info_shutdown(
        _client: *mut JackClient,
        callback: Option<JackInfoShutdownCallback>,
        arg: *mut c_void,
    ) {
        record_setter("jack_on_info_shutdown", callback.map(|f| f as usize), arg);
    }

    unsafe extern "C" fn get_version_string() -> *const c_char {
        c"1.9.22".as_ptr()
    }

    unsafe extern "C" fn free(ptr: *mut c_void) {
        with_state(|state| {
            state.events.push("free".to_string());
            state.freed.push(ptr as usize);
        });
    }

    unsafe extern "C" fn client_close(_client: *mut JackClient) -> c_int {
        with_state(|state| {
            state.events.push("close".to_string());
            state.closed += 1;
        });
        0
    }

    unsafe extern "C" fn activate(_client: *mut JackClient) -> c_int {
        record("activate");
        0
    }

    unsafe extern "C" fn get_sample_rate(_client: *mut JackClient) -> NFrames {
        48_000
    }

    unsafe extern "C" fn get_buffer_size(_client: *mut JackClient) -> NFrames {
        256
    }

    unsafe extern "C" fn get_cycle_times(
        _client: *mut JackClient,
        current_frames: *mut NFrames,
        current_usecs: *mut Time,
        next_usecs: *mut Time,
        period_usecs: *mut f32,
    ) -> c_int {
        unsafe {
            *current_frames = 96_000;
            *current_usecs = 2_000_000;
            *next_usecs = 2_005_333;
            *period_usecs = 5333.333;
        }
        0
    }

    fn string_array() -> *mut *const c_char {
        with_state(|state| {
            state
                .string_array
                .as_deref()
                .map_or(ptr::null_mut(), leak_string_array)
        })
    }

    unsafe extern "C" fn get_ports(
        _client: *mut JackClient,
        _pattern: *const c_char,
        _type_pattern: *const c_char,
        _flags: c_ulong,
    ) -> *mut *const c_char {
        string_array()
    }

    unsafe extern "C" fn port_get_connections(_port: *mut JackPort) -> *mut *const c_char {
        string_array()
    }

    unsafe extern "C" fn port_get_all_connections(
        _client: *mut JackClient,
        _port: *mut JackPort,
    ) -> *mut *const c_char {
        string_array()
    }

    unsafe extern "C" fn port_by_name(
        _client: *mut JackClient,
        name: *const c_char,
    ) -> *mut JackPort {
        match unsafe { read_bytes(name) } {
            Some(name) if name == PORT_NAME.as_bytes() => NonNull::dangling().as_ptr(),
            _ => ptr::null_mut(),
        }
    }

    unsafe extern "C" fn port_name(_port: *mut JackPort) -> *const c_char {
        c"system:capture_1".as_ptr()
    }

    unsafe extern "C" fn port_uuid(_port: *mut JackPort) -> Uuid {
        PORT_UUID
    }

    unsafe extern "C" fn port_name_size() -> c_int {
        320
    }

    unsafe extern "C" fn port_get_aliases(_port: *mut JackPort, aliases: *const *mut c_char) -> c_int {
        let alias = b"alsa_pcm:capture_1\0";
        unsafe { ptr::copy_nonoverlapping(alias.as_ptr().cast(), *aliases, alias.len()) };
        1
    }

    unsafe extern "C" fn connect(
        _client: *mut JackClient,
        source: *const c_char,
        destination: *const c_char,
    ) -> c_int {
        let source = unsafe { read_bytes(source) }.unwrap_or_default();
        let destination = unsafe { read_bytes(destination) }.unwrap_or_default();
        record(format!(
            "connect {} {}",
            String::from_utf8_lossy(&source),
            String::from_utf8_lossy(&destination)
        ));
        0
    }

    unsafe extern "C" fn get_uuid_for_client_name(
        _client: *mut JackClient,
        name: *const c_char,
    ) -> *mut c_char {
        match unsafe { read_bytes(name) } {
            Some(name) if name == b"system" => leak_text(CLIENT_UUID.to_string().as_bytes()),
            _ => ptr::null_mut(),
        }
    }

    unsafe extern "C" fn client_get_uuid(_client: *mut JackClient) -> *mut c_char {
        leak_text(CLIENT_UUID.to_string().as_bytes())
    }

    /// Two replies, the terminator, then an entry that must never be read.
    unsafe extern "C" fn session_notify(
        _client: *mut JackClient,
        target: *const c_char,
        kind: c_int,
        path: *const c_char,
    ) -> *mut JackSessionCommand {
        let text = |ptr| {
            unsafe { read_bytes(ptr) }
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_else(|| "*".to_string())
        };
        record(format!("session_notify {} {kind} {}", text(target), text(path)));
        let entry = |uuid: &str, name: &str, command: &str, flags| JackSessionCommand {
            uuid: leak_text(uuid.as_bytes()).cast_const(),
            client_name: leak_text(name.as_bytes()).cast_const(),
            command: leak_text(command.as_bytes()).cast_const(),
            flags,
        };
        let commands = vec![
            entry("7", "synth", "synth -U 7 ${SESSION_DIR}", 0),
            entry("8", "drums", "drums --restore", 1),
            JackSessionCommand {
                uuid: ptr::null(),
                client_name: ptr::null(),
                command: ptr::null(),
                flags: 0,
            },
            entry("9", "unreachable", "never read", 0),
        ];
        let list = Box::leak(commands.into_boxed_slice()).as_mut_ptr();
        with_state(|state| state.session_commands = Some(list as usize));
        list
    }

    unsafe extern "C" fn session_commands_free(commands: *mut JackSessionCommand) {
        let known = with_state(|state| state.session_commands == Some(commands as usize));
        record(if known {
            "session_commands_free"
        } else {
            "session_commands_free foreign"
        });
    }

    unsafe extern "C" fn uuid_parse(text: *const c_char, uuid: *mut Uuid) -> c_int {
        let parsed = unsafe { read_bytes(text) }
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|text| text.parse::<Uuid>().ok());
        match parsed {
            Some(value) => {
                unsafe { *uuid = value };
                0
            }
            None => -1,
        }
    }

    unsafe extern "C" fn uuid_unparse(uuid: Uuid, buffer: *mut c_char) {
        let text = format!("{uuid}\0");
        unsafe { ptr::copy_nonoverlapping(text.as_ptr().cast(), buffer, text.len()) };
    }

    unsafe extern "C" fn get_properties(subject: Uuid, description: *mut JackDescription) -> c_int {
        let properties = with_state(|state| {
            state
                .descriptions
                .iter()
                .find(|(candidate, _)| *candidate == subject)
                .map(|(_, properties)| properties.clone())
                .unwrap_or_default()
        });
        let native = leak_description(subject, &properties);
        let count = native.property_cnt as c_int;
        unsafe { *description = native };
        count
    }

    unsafe extern "C" fn get_all_properties(descriptions: *mut *mut JackDescription) -> c_int {
        let all = with_state(|state| state.descriptions.clone());
        let native: Vec<JackDescription> = all
            .iter()
            .map(|(subject, properties)| leak_description(*subject, properties))
            .collect();
        let count = native.len() as c_int;
        unsafe {
            *descriptions = if native.is_empty() {
                ptr::null_mut()
            } else {
                Box::leak(native.into_boxed_slice()).as_mut_ptr()
            };
        }
        count
    }

    unsafe extern "C" fn free_description(description: *mut JackDescription, free_itself: c_int) {
        let subject = unsafe { (*description).subject };
        with_state(|state| {
            state.events.push("free_description".to_string());
            state.freed_descriptions.push((subject, free_itself));
        });
    }

    unsafe extern "C" fn get_property(
        subject: Uuid,
        key: *const c_char,
        value: *mut *mut c_char,
        mime: *mut *mut c_char,
    ) -> c_int {
        let key = unsafe { read_bytes(key) }.unwrap_or_default();
        let found = with_state(|state| {
            state
                .descriptions
                .iter()
                .filter(|(candidate, _)| *candidate == subject)
                .flat_map(|(_, properties)| properties.iter())
                .find(|property| property.key == key)
                .cloned()
        });
        match found {
            Some(property) => {
                unsafe {
                    *value = leak_text(&property.value);
                    *mime = property
                        .mime
                        .as_deref()
                        .map_or(ptr::null_mut(), leak_text);
                }
                0
            }
            None => -1,
        }
    }

    unsafe extern "C" fn set_property(
        _client: *mut JackClient,
        subject: Uuid,
        key: *const c_char,
        value: *const c_char,
        mime: *const c_char,
    ) -> c_int {
        let property = MockProperty {
            key: unsafe { read_bytes(key) }.unwrap_or_default(),
            value: unsafe { read_bytes(value) }.unwrap_or_default(),
            mime: unsafe { read_bytes(mime) },
        };
        with_state(|state| {
            let index = match state
                .descriptions
                .iter()
                .position(|(candidate, _)| *candidate == subject)
            {
                Some(index) => index,
                None => {
                    state.descriptions.push((subject, Vec::new()));
                    state.descriptions.len() - 1
                }
            };
            let properties = &mut state.descriptions[index].1;
            properties.retain(|existing| existing.key != property.key);
            properties.push(property);
        });
        0
    }

    unsafe extern "C" fn remove_property(
        _client: *mut JackClient,
        subject: Uuid,
        key: *const c_char,
    ) -> c_int {
        let key = unsafe { read_bytes(key) }.unwrap_or_default();
        with_state(|state| {
            let mut removed = false;
            for (candidate, properties) in &mut state.descriptions {
                if *candidate == subject {
                    let before = properties.len();
                    properties.retain(|property| property.key != key);
                    removed |= properties.len() != before;
                }
            }
            if removed { 0 } else { -1 }
        })
    }

    unsafe extern "C" fn remove_properties(_client: *mut JackClient, subject: Uuid) -> c_int {
        with_state(|state| {
            let mut count = 0;
            state.descriptions.retain(|(candidate, properties)| {
                if *candidate == subject {
                    count += properties.len() as c_int;
                    false
                } else {
                    true
                }
            });
            count
        })
    }

    unsafe extern "C" fn remove_all_properties(_client: *mut JackClient) -> c_int {
        with_state(|state| {
            state.events.push("remove_all_properties".to_string());
            state.descriptions.clear();
        });
        0
    }

    unsafe extern "C" fn set_error_function(callback: Option<JackMessageCallback>) {
        with_state(|state| {
            state.events.push("set error function".to_string());
            state.error_function = callback.map(|f| f as usize);
        });
    }

    unsafe extern "C" fn set_info_function(callback: Option<JackMessageCallback>) {
        with_state(|state| {
            state.events.push("set info function".to_string());
            state.info_function = callback.map(|f| f as usize);
        });
    }

    unsafe extern "C" fn midi_get_event_count(_buffer: *mut c_void) -> NFrames {
        with_state(|state| state.midi_events.len() as NFrames)
    }

    unsafe extern "C" fn midi_event_get(
        event: *mut JackMidiEvent,
        _buffer: *mut c_void,
        index: u32,
    ) -> c_int {
        let found = with_state(|state| state.midi_events.get(index as usize).cloned());
        match found {
            Some((time, bytes)) => {
                let size = bytes.len();
                let data = Box::leak(bytes.into_boxed_slice()).as_mut_ptr();
                unsafe {
                    *event = JackMidiEvent {
                        time,
                        size,
                        buffer: data.cast(),
                    };
                }
                0
            }
            None => -61,
        }
    }

    unsafe extern "C" fn transport_query(
        _client: *mut JackClient,
        position: *mut JackPosition,
    ) -> c_int {
        if !position.is_null() {
            unsafe {
                *position = JackPosition {
                    frame: 96_000,
                    frame_rate: 48_000,
                    valid: 0x10,
                    bar: 3,
                    beat: 2,
                    tick: 0,
                    beats_per_minute: 120.0,
                    ..JackPosition::default()
                };
            }
        }
        1
    }
}
