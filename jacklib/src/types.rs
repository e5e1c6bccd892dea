//! Native data layouts from `jack/types.h`, `jack/session.h` and
//! `jack/metadata.h`.

use std::ffi::{c_char, c_int, c_void};

pub type NFrames = u32;
pub type PortId = u32;
pub type Time = u64;
pub type Unique = u64;
pub type Uuid = u64;
pub type PortTypeId = u32;

pub const MAX_FRAMES: NFrames = 4_294_967_295;
pub const LOAD_INIT_LIMIT: usize = 1024;
pub const DEFAULT_AUDIO_TYPE: &str = "32 bit float mono audio";
pub const DEFAULT_MIDI_TYPE: &str = "8 bit raw midi";

pub const UUID_SIZE: usize = 36;
pub const UUID_STRING_SIZE: usize = UUID_SIZE + 1;
pub const UUID_EMPTY: Uuid = 0;

/// Opaque `jack_client_t`.
#[repr(C)]
pub struct JackClient {
    _private: [u8; 0],
}

/// Opaque `jack_port_t`.
#[repr(C)]
pub struct JackPort {
    _private: [u8; 0],
}

/// `jack_midi_data_t`, kept distinct from `c_char` so MIDI byte pointers
/// are described separately from C strings.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MidiData(pub u8);

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct JackMidiEvent {
    pub time: NFrames,
    pub size: usize,
    pub buffer: *mut MidiData,
}

impl Default for JackMidiEvent {
    fn default() -> Self {
        Self {
            time: 0,
            size: 0,
            buffer: std::ptr::null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JackLatencyRange {
    pub min: NFrames,
    pub max: NFrames,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JackPosition {
    pub unique_1: Unique,
    pub usecs: Time,
    pub frame_rate: NFrames,
    pub frame: NFrames,
    pub valid: c_int,
    pub bar: i32,
    pub beat: i32,
    pub tick: i32,
    pub bar_start_tick: f64,
    pub beats_per_bar: f32,
    pub beat_type: f32,
    pub ticks_per_beat: f64,
    pub beats_per_minute: f64,
    pub frame_time: f64,
    pub next_time: f64,
    pub bbt_offset: NFrames,
    pub audio_frames_per_video_frame: f32,
    pub video_offset: NFrames,
    pub padding: [i32; 7],
    pub unique_2: Unique,
}

// The native struct is declared packed; every field is already naturally
// aligned, so the C layout is identical.
const _: () = assert!(std::mem::size_of::<JackPosition>() == 136);

#[repr(C)]
#[derive(Debug)]
pub struct JackSessionEvent {
    pub kind: c_int,
    pub session_dir: *const c_char,
    pub client_uuid: *const c_char,
    pub command_line: *mut c_char,
    pub flags: c_int,
    pub future: u32,
}

#[repr(C)]
#[derive(Debug)]
pub struct JackSessionCommand {
    pub uuid: *const c_char,
    pub client_name: *const c_char,
    pub command: *const c_char,
    pub flags: c_int,
}

#[repr(C)]
#[derive(Debug)]
pub struct JackProperty {
    pub key: *const c_char,
    pub data: *const c_char,
    pub mime_type: *const c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct JackDescription {
    pub subject: Uuid,
    pub property_cnt: u32,
    pub properties: *mut JackProperty,
    pub property_size: u32,
}

impl Default for JackDescription {
    fn default() -> Self {
        Self {
            subject: UUID_EMPTY,
            property_cnt: 0,
            properties: std::ptr::null_mut(),
            property_size: 0,
        }
    }
}

pub type JackThreadInitCallback = unsafe extern "C" fn(arg: *mut c_void);
pub type JackShutdownCallback = unsafe extern "C" fn(arg: *mut c_void);
pub type JackInfoShutdownCallback =
    unsafe extern "C" fn(code: c_int, reason: *const c_char, arg: *mut c_void);
pub type JackProcessCallback = unsafe extern "C" fn(nframes: NFrames, arg: *mut c_void) -> c_int;
pub type JackFreewheelCallback = unsafe extern "C" fn(starting: c_int, arg: *mut c_void);
pub type JackBufferSizeCallback = JackProcessCallback;
pub type JackSampleRateCallback = JackProcessCallback;
pub type JackClientRegistrationCallback =
    unsafe extern "C" fn(name: *const c_char, register: c_int, arg: *mut c_void);
pub type JackClientRenameCallback = unsafe extern "C" fn(
    old_name: *const c_char,
    new_name: *const c_char,
    arg: *mut c_void,
) -> c_int;
pub type JackPortRegistrationCallback =
    unsafe extern "C" fn(port: PortId, register: c_int, arg: *mut c_void);
pub type JackPortConnectCallback =
    unsafe extern "C" fn(a: PortId, b: PortId, connect: c_int, arg: *mut c_void);
pub type JackPortRenameCallback = unsafe extern "C" fn(
    port: PortId,
    old_name: *const c_char,
    new_name: *const c_char,
    arg: *mut c_void,
);
pub type JackGraphOrderCallback = unsafe extern "C" fn(arg: *mut c_void) -> c_int;
pub type JackXRunCallback = JackGraphOrderCallback;
pub type JackLatencyCallback = JackFreewheelCallback;
pub type JackSyncCallback =
    unsafe extern "C" fn(state: c_int, pos: *mut JackPosition, arg: *mut c_void) -> c_int;
pub type JackSessionCallback = unsafe extern "C" fn(event: *mut JackSessionEvent, arg: *mut c_void);
pub type JackPropertyChangeCallback =
    unsafe extern "C" fn(subject: Uuid, key: *const c_char, change: c_int, arg: *mut c_void);
pub type JackTimebaseCallback = unsafe extern "C" fn(
    state: c_int,
    nframes: NFrames,
    pos: *mut JackPosition,
    new_pos: c_int,
    arg: *mut c_void,
);
pub type JackThreadCallback = unsafe extern "C" fn(arg: *mut c_void) -> *mut c_void;
pub type JackMessageCallback = unsafe extern "C" fn(msg: *const c_char);
