//! Drives the public facade through a hand-built symbol table.

use jacklib::types::{JackClient, JackProcessCallback, NFrames};
use jacklib::{ClientHandle, Jack, NativeLibrary, PortFlags, Status, SymbolSource, status_description};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_ulong, c_void};
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

thread_local! {
    static FREED: RefCell<usize> = const { RefCell::new(0) };
    static PROCESS: RefCell<Option<(JackProcessCallback, usize)>> = const { RefCell::new(None) };
}

struct Table(HashMap<&'static str, *const ()>);

impl SymbolSource for Table {
    fn address(&self, name: &str) -> Option<NonNull<c_void>> {
        self.0.get(name).and_then(|address| NonNull::new(address.cast_mut().cast()))
    }
}

unsafe extern "C" fn get_sample_rate(_client: *mut JackClient) -> NFrames {
    44_100
}

unsafe extern "C" fn free(_ptr: *mut c_void) {
    FREED.with(|freed| *freed.borrow_mut() += 1);
}

unsafe extern "C" fn get_ports(
    _client: *mut JackClient,
    _pattern: *const c_char,
    _type_pattern: *const c_char,
    _flags: c_ulong,
) -> *mut *const c_char {
    let array = vec![c"system:playback_1".as_ptr(), c"system:playback_2".as_ptr(), ptr::null()];
    Box::leak(array.into_boxed_slice()).as_mut_ptr()
}

unsafe extern "C" fn set_process_callback(
    _client: *mut JackClient,
    callback: Option<JackProcessCallback>,
    arg: *mut c_void,
) -> c_int {
    PROCESS.with(|slot| *slot.borrow_mut() = callback.map(|callback| (callback, arg as usize)));
    0
}

fn jack() -> Jack {
    let table = Table(HashMap::from([
        ("jack_get_sample_rate", get_sample_rate as *const ()),
        ("jack_free", free as *const ()),
        ("jack_get_ports", get_ports as *const ()),
        ("jack_set_process_callback", set_process_callback as *const ()),
    ]));
    // SAFETY: the table holds `'static` functions with the declared signatures.
    let native = unsafe { NativeLibrary::from_source(&table) };
    Jack::new(Arc::new(native))
}

fn client() -> ClientHandle {
    // SAFETY: the table above never dereferences client pointers.
    unsafe { ClientHandle::from_raw(NonNull::dangling().as_ptr()) }.expect("non-null")
}

#[test]
fn partial_table_reports_what_is_missing() {
    let jack = jack();
    let native = jack.native();

    assert_eq!(native.resolved_count(), 4);
    assert!(native.is_resolved("jack_get_ports"));
    assert!(!native.is_resolved("jack_client_close"));
    assert!(native.unresolved().any(|entry| entry.name == "jack_port_register"));
}

#[test]
fn resolved_calls_pass_through_and_missing_ones_fall_back() {
    let jack = jack();
    assert_eq!(jack.get_sample_rate(client()), Some(44_100));
    assert_eq!(jack.get_buffer_size(client()), None);
    assert_eq!(jack.activate(client()), -1);
}

#[test]
fn port_listing_is_decoded_and_released_once() {
    let jack = jack();
    let ports = jack.get_ports(client(), None, Some("audio"), PortFlags::IS_INPUT);
    assert_eq!(ports, ["system:playback_1", "system:playback_2"]);
    assert_eq!(FREED.with(|freed| *freed.borrow()), 1);
}

#[test]
fn process_handler_runs_through_registered_trampoline() {
    let mut jack = jack();
    let seen = Arc::new(AtomicU32::new(0));
    let sink = seen.clone();

    assert_eq!(
        jack.set_process_callback(client(), move |nframes| {
            sink.store(nframes, Ordering::SeqCst);
            0
        }),
        0
    );
    let (callback, arg) = PROCESS.with(|slot| *slot.borrow()).expect("registered");
    // SAFETY: invoked the way the server would, with the registered arg.
    let status = unsafe { callback(512, arg as *mut c_void) };

    assert_eq!(status, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 512);
    assert_eq!(jack.retained_callbacks(client()), 1);
    assert_eq!(jack.release_client(client()), 1);
}

#[test]
fn status_bits_describe_themselves() {
    let status = Status::FAILURE | Status::SERVER_FAILED;
    assert!(status_description(status.bits()).contains("Unable to connect to the JACK server"));
    assert_eq!(status_description(0), "");
}
