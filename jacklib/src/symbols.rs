use crate::library::SymbolSource;
use crate::signature::{Availability, FfiSignature, Generation, SymbolEntry};
use crate::types::*;
use std::ffi::{c_char, c_int, c_ulong, c_void};
use tracing::debug;

/// Declares every exported function together with the server generation
/// providing it. Each declaration becomes an `Option` field of [`Symbols`]
/// and a [`SymbolEntry`] describing its call signature.
macro_rules! native_symbols {
    ($($avail:ident $name:ident: $ty:ty;)*) => {
        /// Function table resolved from the loaded library. A `None` slot
        /// means the installed library does not export that symbol.
        #[derive(Clone, Copy)]
        pub struct Symbols {
            $(pub $name: Option<$ty>,)*
        }

        impl Symbols {
            pub(crate) fn resolve(
                source: &dyn SymbolSource,
                generation: Generation,
            ) -> (Self, Vec<SymbolEntry>) {
                let mut entries = Vec::new();
                let symbols = Self {
                    $(
                        $name: bind::<$ty>(
                            source,
                            stringify!($name),
                            Availability::$avail,
                            generation,
                            &mut entries,
                        ),
                    )*
                };
                (symbols, entries)
            }

            /// A table with every slot unresolved.
            pub fn empty() -> Self {
                Self { $($name: None,)* }
            }
        }
    };
}

fn bind<F: FfiSignature>(
    source: &dyn SymbolSource,
    name: &'static str,
    availability: Availability,
    generation: Generation,
    entries: &mut Vec<SymbolEntry>,
) -> Option<F> {
    let address = if availability.allows(generation) {
        source.address(name)
    } else {
        None
    };
    if address.is_none() {
        debug!(symbol = name, ?availability, "native symbol unresolved");
    }
    entries.push(SymbolEntry {
        name,
        resolved: address.is_some(),
        availability,
        signature: F::signature(),
    });
    debug_assert_eq!(
        std::mem::size_of::<F>(),
        std::mem::size_of::<*mut c_void>()
    );
    // SAFETY: `F` is the `unsafe extern "C" fn` type declared for this exact
    // symbol name; function pointers and data pointers share a size on every
    // platform libjack supports.
    address.map(|ptr| unsafe { std::mem::transmute_copy::<*mut c_void, F>(&ptr.as_ptr()) })
}

/// Detects the implementation generation: only JACK2 exports
/// `jack_get_version_string`.
pub(crate) fn detect_generation(source: &dyn SymbolSource) -> Generation {
    if source.address("jack_get_version_string").is_some() {
        Generation::Jack2
    } else {
        Generation::Jack1
    }
}

type Client = *mut JackClient;
type Port = *mut JackPort;
type Text = *const c_char;

native_symbols! {
    // client lifecycle
    Any jack_get_version_string: unsafe extern "C" fn() -> Text;
    Any jack_get_version: unsafe extern "C" fn(*mut c_int, *mut c_int, *mut c_int, *mut c_int);
    Any jack_client_open: unsafe extern "C" fn(Text, c_int, *mut c_int, ...) -> Client;
    Any jack_client_rename: unsafe extern "C" fn(Client, Text) -> *mut c_char;
    Any jack_client_close: unsafe extern "C" fn(Client) -> c_int;
    Any jack_client_name_size: unsafe extern "C" fn() -> c_int;
    Any jack_get_client_name: unsafe extern "C" fn(Client) -> *mut c_char;
    Any jack_activate: unsafe extern "C" fn(Client) -> c_int;
    Any jack_deactivate: unsafe extern "C" fn(Client) -> c_int;
    Any jack_get_client_pid: unsafe extern "C" fn(Text) -> c_int;
    Any jack_is_realtime: unsafe extern "C" fn(Client) -> c_int;

    // non-callback api
    Any jack_cycle_wait: unsafe extern "C" fn(Client) -> NFrames;
    Any jack_cycle_signal: unsafe extern "C" fn(Client, c_int);
    Any jack_set_process_thread:
        unsafe extern "C" fn(Client, Option<JackThreadCallback>, *mut c_void) -> c_int;

    // callback setters
    Any jack_set_thread_init_callback:
        unsafe extern "C" fn(Client, Option<JackThreadInitCallback>, *mut c_void) -> c_int;
    Any jack_on_shutdown: unsafe extern "C" fn(Client, Option<JackShutdownCallback>, *mut c_void);
    Any jack_on_info_shutdown:
        unsafe extern "C" fn(Client, Option<JackInfoShutdownCallback>, *mut c_void);
    Any jack_set_process_callback:
        unsafe extern "C" fn(Client, Option<JackProcessCallback>, *mut c_void) -> c_int;
    Any jack_set_freewheel_callback:
        unsafe extern "C" fn(Client, Option<JackFreewheelCallback>, *mut c_void) -> c_int;
    Any jack_set_buffer_size_callback:
        unsafe extern "C" fn(Client, Option<JackBufferSizeCallback>, *mut c_void) -> c_int;
    Any jack_set_sample_rate_callback:
        unsafe extern "C" fn(Client, Option<JackSampleRateCallback>, *mut c_void) -> c_int;
    Any jack_set_client_registration_callback:
        unsafe extern "C" fn(Client, Option<JackClientRegistrationCallback>, *mut c_void) -> c_int;
    Any jack_set_client_rename_callback:
        unsafe extern "C" fn(Client, Option<JackClientRenameCallback>, *mut c_void) -> c_int;
    Any jack_set_port_registration_callback:
        unsafe extern "C" fn(Client, Option<JackPortRegistrationCallback>, *mut c_void) -> c_int;
    Any jack_set_port_connect_callback:
        unsafe extern "C" fn(Client, Option<JackPortConnectCallback>, *mut c_void) -> c_int;
    Any jack_set_port_rename_callback:
        unsafe extern "C" fn(Client, Option<JackPortRenameCallback>, *mut c_void) -> c_int;
    Any jack_set_graph_order_callback:
        unsafe extern "C" fn(Client, Option<JackGraphOrderCallback>, *mut c_void) -> c_int;
    Any jack_set_xrun_callback:
        unsafe extern "C" fn(Client, Option<JackXRunCallback>, *mut c_void) -> c_int;
    Any jack_set_latency_callback:
        unsafe extern "C" fn(Client, Option<JackLatencyCallback>, *mut c_void) -> c_int;
    Any jack_set_sync_callback:
        unsafe extern "C" fn(Client, Option<JackSyncCallback>, *mut c_void) -> c_int;
    Any jack_set_session_callback:
        unsafe extern "C" fn(Client, Option<JackSessionCallback>, *mut c_void) -> c_int;
    Any jack_set_property_change_callback:
        unsafe extern "C" fn(Client, Option<JackPropertyChangeCallback>, *mut c_void) -> c_int;
    Any jack_set_timebase_callback:
        unsafe extern "C" fn(Client, c_int, Option<JackTimebaseCallback>, *mut c_void) -> c_int;

    // server control
    Any jack_set_freewheel: unsafe extern "C" fn(Client, c_int) -> c_int;
    Any jack_set_buffer_size: unsafe extern "C" fn(Client, NFrames) -> c_int;
    Any jack_get_sample_rate: unsafe extern "C" fn(Client) -> NFrames;
    Any jack_get_buffer_size: unsafe extern "C" fn(Client) -> NFrames;
    Any jack_engine_takeover_timebase: unsafe extern "C" fn(Client) -> c_int;
    Any jack_cpu_load: unsafe extern "C" fn(Client) -> f32;

    // ports
    Any jack_port_register: unsafe extern "C" fn(Client, Text, Text, c_ulong, c_ulong) -> Port;
    Any jack_port_unregister: unsafe extern "C" fn(Client, Port) -> c_int;
    Any jack_port_get_buffer: unsafe extern "C" fn(Port, NFrames) -> *mut c_void;
    Any jack_port_name: unsafe extern "C" fn(Port) -> Text;
    Any jack_port_short_name: unsafe extern "C" fn(Port) -> Text;
    Any jack_port_flags: unsafe extern "C" fn(Port) -> c_int;
    Any jack_port_type: unsafe extern "C" fn(Port) -> Text;
    Jack2 jack_port_type_id: unsafe extern "C" fn(Port) -> PortTypeId;
    Any jack_port_is_mine: unsafe extern "C" fn(Client, Port) -> c_int;
    Any jack_port_connected: unsafe extern "C" fn(Port) -> c_int;
    Any jack_port_connected_to: unsafe extern "C" fn(Port, Text) -> c_int;
    Any jack_port_get_connections: unsafe extern "C" fn(Port) -> *mut Text;
    Any jack_port_get_all_connections: unsafe extern "C" fn(Client, Port) -> *mut Text;
    Any jack_port_tie: unsafe extern "C" fn(Port, Port) -> c_int;
    Any jack_port_untie: unsafe extern "C" fn(Port) -> c_int;
    Any jack_port_set_name: unsafe extern "C" fn(Port, Text) -> c_int;
    Any jack_port_rename: unsafe extern "C" fn(Client, Port, Text) -> c_int;
    Any jack_port_set_alias: unsafe extern "C" fn(Port, Text) -> c_int;
    Any jack_port_unset_alias: unsafe extern "C" fn(Port, Text) -> c_int;
    Any jack_port_get_aliases: unsafe extern "C" fn(Port, *const *mut c_char) -> c_int;
    Any jack_port_request_monitor: unsafe extern "C" fn(Port, c_int) -> c_int;
    Any jack_port_request_monitor_by_name: unsafe extern "C" fn(Client, Text, c_int) -> c_int;
    Any jack_port_ensure_monitor: unsafe extern "C" fn(Port, c_int) -> c_int;
    Any jack_port_monitoring_input: unsafe extern "C" fn(Port) -> c_int;
    Any jack_connect: unsafe extern "C" fn(Client, Text, Text) -> c_int;
    Any jack_disconnect: unsafe extern "C" fn(Client, Text, Text) -> c_int;
    Any jack_port_disconnect: unsafe extern "C" fn(Client, Port) -> c_int;
    Any jack_port_name_size: unsafe extern "C" fn() -> c_int;
    Any jack_port_type_size: unsafe extern "C" fn() -> c_int;
    Any jack_port_type_get_buffer_size: unsafe extern "C" fn(Client, Text) -> usize;
    Any jack_port_uuid: unsafe extern "C" fn(Port) -> Uuid;

    // latency
    Any jack_port_set_latency: unsafe extern "C" fn(Port, NFrames);
    Any jack_port_get_latency_range: unsafe extern "C" fn(Port, c_int, *mut JackLatencyRange);
    Any jack_port_set_latency_range: unsafe extern "C" fn(Port, c_int, *mut JackLatencyRange);
    Any jack_recompute_total_latencies: unsafe extern "C" fn(Client) -> c_int;
    Any jack_port_get_latency: unsafe extern "C" fn(Port) -> NFrames;
    Any jack_port_get_total_latency: unsafe extern "C" fn(Client, Port) -> NFrames;
    Any jack_recompute_total_latency: unsafe extern "C" fn(Client, Port) -> c_int;

    // port searching
    Any jack_get_ports: unsafe extern "C" fn(Client, Text, Text, c_ulong) -> *mut Text;
    Any jack_port_by_name: unsafe extern "C" fn(Client, Text) -> Port;
    Any jack_port_by_id: unsafe extern "C" fn(Client, PortId) -> Port;

    // time
    Any jack_frames_since_cycle_start: unsafe extern "C" fn(Client) -> NFrames;
    Any jack_frame_time: unsafe extern "C" fn(Client) -> NFrames;
    Any jack_last_frame_time: unsafe extern "C" fn(Client) -> NFrames;
    Any jack_get_cycle_times:
        unsafe extern "C" fn(Client, *mut NFrames, *mut Time, *mut Time, *mut f32) -> c_int;
    Any jack_frames_to_time: unsafe extern "C" fn(Client, NFrames) -> Time;
    Any jack_time_to_frames: unsafe extern "C" fn(Client, Time) -> NFrames;
    Any jack_get_time: unsafe extern "C" fn() -> Time;

    // misc
    Any jack_free: unsafe extern "C" fn(*mut c_void);
    Any jack_set_error_function: unsafe extern "C" fn(Option<JackMessageCallback>);
    Any jack_set_info_function: unsafe extern "C" fn(Option<JackMessageCallback>);

    // transport
    Any jack_release_timebase: unsafe extern "C" fn(Client) -> c_int;
    Any jack_set_sync_timeout: unsafe extern "C" fn(Client, Time) -> c_int;
    Any jack_transport_locate: unsafe extern "C" fn(Client, NFrames) -> c_int;
    Any jack_transport_query: unsafe extern "C" fn(Client, *mut JackPosition) -> c_int;
    Any jack_get_current_transport_frame: unsafe extern "C" fn(Client) -> NFrames;
    Any jack_transport_reposition: unsafe extern "C" fn(Client, *const JackPosition) -> c_int;
    Any jack_transport_start: unsafe extern "C" fn(Client);
    Any jack_transport_stop: unsafe extern "C" fn(Client);

    // midi
    Any jack_midi_get_event_count: unsafe extern "C" fn(*mut c_void) -> NFrames;
    Any jack_midi_event_get: unsafe extern "C" fn(*mut JackMidiEvent, *mut c_void, u32) -> c_int;
    Any jack_midi_clear_buffer: unsafe extern "C" fn(*mut c_void);
    Any jack_midi_max_event_size: unsafe extern "C" fn(*mut c_void) -> usize;
    Any jack_midi_event_reserve: unsafe extern "C" fn(*mut c_void, NFrames, usize) -> *mut MidiData;
    Any jack_midi_event_write:
        unsafe extern "C" fn(*mut c_void, NFrames, *const MidiData, usize) -> c_int;
    Any jack_midi_get_lost_event_count: unsafe extern "C" fn(*mut c_void) -> u32;

    // session
    Any jack_session_reply: unsafe extern "C" fn(Client, *mut JackSessionEvent) -> c_int;
    Any jack_session_event_free: unsafe extern "C" fn(*mut JackSessionEvent);
    Any jack_client_get_uuid: unsafe extern "C" fn(Client) -> *mut c_char;
    Any jack_session_notify:
        unsafe extern "C" fn(Client, Text, c_int, Text) -> *mut JackSessionCommand;
    Any jack_session_commands_free: unsafe extern "C" fn(*mut JackSessionCommand);
    Any jack_get_uuid_for_client_name: unsafe extern "C" fn(Client, Text) -> *mut c_char;
    Any jack_get_client_name_by_uuid: unsafe extern "C" fn(Client, Text) -> *mut c_char;
    Any jack_reserve_client_name: unsafe extern "C" fn(Client, Text, Text) -> c_int;
    Any jack_client_has_session_callback: unsafe extern "C" fn(Client, Text) -> c_int;
    Any jack_uuid_parse: unsafe extern "C" fn(Text, *mut Uuid) -> c_int;
    Any jack_uuid_unparse: unsafe extern "C" fn(Uuid, *mut c_char);

    // metadata
    Any jack_free_description: unsafe extern "C" fn(*mut JackDescription, c_int);
    Any jack_get_all_properties: unsafe extern "C" fn(*mut *mut JackDescription) -> c_int;
    Any jack_get_properties: unsafe extern "C" fn(Uuid, *mut JackDescription) -> c_int;
    Any jack_get_property: unsafe extern "C" fn(Uuid, Text, *mut *mut c_char, *mut *mut c_char) -> c_int;
    Any jack_remove_all_properties: unsafe extern "C" fn(Client) -> c_int;
    Any jack_remove_properties: unsafe extern "C" fn(Client, Uuid) -> c_int;
    Any jack_remove_property: unsafe extern "C" fn(Client, Uuid, Text) -> c_int;
    Any jack_set_property: unsafe extern "C" fn(Client, Uuid, Text, Text, Text) -> c_int;
}
