use crate::types::{
    JackClient, JackDescription, JackLatencyRange, JackMidiEvent, JackPort, JackPosition,
    JackSessionCommand, JackSessionEvent, MidiData, NFrames, PortId, Uuid,
};
use serde::Serialize;
use std::ffi::{c_char, c_int, c_void};
use std::fmt;

/// How a single argument or return value crosses the native boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MarshalKind {
    Int32,
    UInt32,
    UInt64,
    Float32,
    Float64,
    CString,
    OpaquePointer,
    TypedPointer(&'static str),
    FunctionPointer(CallbackShape),
    Void,
}

/// Structural shape of a native callback pointer. Categories sharing the
/// same C prototype share a shape (process, buffer size and sample rate all
/// use `Frames`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CallbackShape {
    /// `void (*)(void *arg)`
    Notify,
    /// `int (*)(void *arg)`
    NotifyStatus,
    /// `int (*)(jack_nframes_t, void *arg)`
    Frames,
    /// `void (*)(int, void *arg)`
    IntNotify,
    /// `void (*)(jack_status_t, const char *, void *arg)`
    InfoShutdown,
    /// `void (*)(const char *, int, void *arg)`
    ClientRegistration,
    /// `int (*)(const char *, const char *, void *arg)`
    ClientRename,
    /// `void (*)(jack_port_id_t, int, void *arg)`
    PortRegistration,
    /// `void (*)(jack_port_id_t, jack_port_id_t, int, void *arg)`
    PortConnect,
    /// `void (*)(jack_port_id_t, const char *, const char *, void *arg)`
    PortRename,
    /// `int (*)(jack_transport_state_t, jack_position_t *, void *arg)`
    Sync,
    /// `void (*)(jack_session_event_t *, void *arg)`
    Session,
    /// `void (*)(jack_uuid_t, const char *, jack_property_change_t, void *arg)`
    PropertyChange,
    /// `void (*)(jack_transport_state_t, jack_nframes_t, jack_position_t *, int, void *arg)`
    Timebase,
    /// `void *(*)(void *arg)`
    Thread,
    /// `void (*)(const char *)`
    Message,
}

/// Which server generation provides a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Availability {
    Any,
    Jack2,
}

/// Server implementation generation, detected through `jack_get_version_string`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Generation {
    Jack1,
    Jack2,
}

impl Availability {
    pub fn allows(self, generation: Generation) -> bool {
        match self {
            Availability::Any => true,
            Availability::Jack2 => generation == Generation::Jack2,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Jack1 => f.write_str("JACK1"),
            Generation::Jack2 => f.write_str("JACK2"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub params: Vec<MarshalKind>,
    pub ret: MarshalKind,
    pub variadic: bool,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param:?}")?;
        }
        if self.variadic {
            f.write_str(", ...")?;
        }
        write!(f, ") -> {:?}", self.ret)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    pub name: &'static str,
    pub resolved: bool,
    pub availability: Availability,
    pub signature: Signature,
}

/// Maps a Rust FFI type onto its marshalling kind.
pub trait Marshal {
    const KIND: MarshalKind;
}

/// Describes a native function pointer type.
pub trait FfiSignature: Copy {
    fn signature() -> Signature;
}

macro_rules! impl_marshal {
    ($($ty:ty => $kind:expr,)*) => {
        $(
            impl Marshal for $ty {
                const KIND: MarshalKind = $kind;
            }
        )*
    };
}

impl_marshal! {
    () => MarshalKind::Void,
    i32 => MarshalKind::Int32,
    u32 => MarshalKind::UInt32,
    u64 => MarshalKind::UInt64,
    f32 => MarshalKind::Float32,
    f64 => MarshalKind::Float64,
    *const c_char => MarshalKind::CString,
    *mut c_char => MarshalKind::CString,
    *mut c_void => MarshalKind::OpaquePointer,
    *mut JackClient => MarshalKind::TypedPointer("jack_client_t"),
    *mut JackPort => MarshalKind::TypedPointer("jack_port_t"),
    *mut JackPosition => MarshalKind::TypedPointer("jack_position_t"),
    *const JackPosition => MarshalKind::TypedPointer("jack_position_t"),
    *mut JackMidiEvent => MarshalKind::TypedPointer("jack_midi_event_t"),
    *mut JackLatencyRange => MarshalKind::TypedPointer("jack_latency_range_t"),
    *mut JackSessionEvent => MarshalKind::TypedPointer("jack_session_event_t"),
    *mut JackSessionCommand => MarshalKind::TypedPointer("jack_session_command_t"),
    *mut JackDescription => MarshalKind::TypedPointer("jack_description_t"),
    *mut *mut JackDescription => MarshalKind::TypedPointer("jack_description_t *"),
    *mut MidiData => MarshalKind::TypedPointer("jack_midi_data_t"),
    *const MidiData => MarshalKind::TypedPointer("jack_midi_data_t"),
    *mut *const c_char => MarshalKind::TypedPointer("const char *"),
    *mut *mut c_char => MarshalKind::TypedPointer("char *"),
    *const *mut c_char => MarshalKind::TypedPointer("char * const"),
    *mut c_int => MarshalKind::TypedPointer("int"),
    *mut u32 => MarshalKind::TypedPointer("uint32_t"),
    *mut u64 => MarshalKind::TypedPointer("uint64_t"),
    *mut f32 => MarshalKind::TypedPointer("float"),
}

#[cfg(target_pointer_width = "64")]
impl_marshal! {
    usize => MarshalKind::UInt64,
}

#[cfg(not(target_pointer_width = "64"))]
impl_marshal! {
    usize => MarshalKind::UInt32,
}

macro_rules! impl_callback_marshal {
    ($($shape:ident => $ty:ty,)*) => {
        $(
            impl Marshal for Option<$ty> {
                const KIND: MarshalKind = MarshalKind::FunctionPointer(CallbackShape::$shape);
            }
        )*
    };
}

impl_callback_marshal! {
    Notify => unsafe extern "C" fn(*mut c_void),
    NotifyStatus => unsafe extern "C" fn(*mut c_void) -> c_int,
    Frames => unsafe extern "C" fn(NFrames, *mut c_void) -> c_int,
    IntNotify => unsafe extern "C" fn(c_int, *mut c_void),
    InfoShutdown => unsafe extern "C" fn(c_int, *const c_char, *mut c_void),
    ClientRegistration => unsafe extern "C" fn(*const c_char, c_int, *mut c_void),
    ClientRename => unsafe extern "C" fn(*const c_char, *const c_char, *mut c_void) -> c_int,
    PortRegistration => unsafe extern "C" fn(PortId, c_int, *mut c_void),
    PortConnect => unsafe extern "C" fn(PortId, PortId, c_int, *mut c_void),
    PortRename => unsafe extern "C" fn(PortId, *const c_char, *const c_char, *mut c_void),
    Sync => unsafe extern "C" fn(c_int, *mut JackPosition, *mut c_void) -> c_int,
    Session => unsafe extern "C" fn(*mut JackSessionEvent, *mut c_void),
    PropertyChange => unsafe extern "C" fn(Uuid, *const c_char, c_int, *mut c_void),
    Timebase => unsafe extern "C" fn(c_int, NFrames, *mut JackPosition, c_int, *mut c_void),
    Thread => unsafe extern "C" fn(*mut c_void) -> *mut c_void,
    Message => unsafe extern "C" fn(*const c_char),
}

macro_rules! impl_ffi_signature {
    ($($arg:ident),*) => {
        impl<$($arg: Marshal,)* R: Marshal> FfiSignature for unsafe extern "C" fn($($arg),*) -> R {
            fn signature() -> Signature {
                Signature {
                    params: vec![$($arg::KIND),*],
                    ret: R::KIND,
                    variadic: false,
                }
            }
        }
    };
}

impl_ffi_signature!();
impl_ffi_signature!(A);
impl_ffi_signature!(A, B);
impl_ffi_signature!(A, B, C);
impl_ffi_signature!(A, B, C, D);
impl_ffi_signature!(A, B, C, D, E);

// jack_client_open is the only variadic entry point.
impl<A: Marshal, B: Marshal, C: Marshal, R: Marshal> FfiSignature
    for unsafe extern "C" fn(A, B, C, ...) -> R
{
    fn signature() -> Signature {
        Signature {
            params: vec![A::KIND, B::KIND, C::KIND],
            ret: R::KIND,
            variadic: true,
        }
    }
}
