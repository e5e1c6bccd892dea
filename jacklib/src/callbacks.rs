//! Native callback trampolines and their retention.
//!
//! Each registration moves the caller's closure into a heap record whose
//! address becomes the native `void *arg`. The record stays alive in the
//! context's table, keyed by client and category, until it is replaced by a
//! successful registration of the same category or the client is closed.

use crate::client::ClientHandle;
use crate::encoding::TextEncoding;
use crate::flags::{LatencyMode, PropertyChange, Status, TransportState};
use crate::session::SessionEvent;
use crate::signature::CallbackShape;
use crate::symbols::Symbols;
use crate::types::{JackClient, JackPosition, JackSessionEvent, NFrames, PortId, Uuid};
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::ptr::NonNull;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

pub type NotifyHandler = Box<dyn FnMut() + Send>;
pub type StatusHandler = Box<dyn FnMut() -> c_int + Send>;
pub type FramesHandler = Box<dyn FnMut(NFrames) -> c_int + Send>;

/// A caller supplied handler; the variant selects the callback category.
///
/// Handlers run on threads owned by the server. `Process` handlers run on
/// the real-time thread and must not block, allocate or log. Thread-init
/// may run on several threads at once and therefore must be `Sync`.
pub enum Callback {
    ThreadInit(Box<dyn Fn() + Send + Sync>),
    Shutdown(NotifyHandler),
    InfoShutdown(Box<dyn FnMut(Status, String) + Send>),
    Process(FramesHandler),
    Freewheel(Box<dyn FnMut(bool) + Send>),
    BufferSize(FramesHandler),
    SampleRate(FramesHandler),
    ClientRegistration(Box<dyn FnMut(String, bool) + Send>),
    ClientRename(Box<dyn FnMut(String, String) -> c_int + Send>),
    PortRegistration(Box<dyn FnMut(PortId, bool) + Send>),
    PortConnect(Box<dyn FnMut(PortId, PortId, bool) + Send>),
    PortRename(Box<dyn FnMut(PortId, String, String) + Send>),
    GraphOrder(StatusHandler),
    Xrun(StatusHandler),
    Latency(Box<dyn FnMut(LatencyMode) + Send>),
    /// Returns whether this client is ready to roll.
    Sync(Box<dyn FnMut(TransportState, &JackPosition) -> bool + Send>),
    Session(Box<dyn FnMut(SessionEvent) + Send>),
    /// The key is `None` when every property of the subject was removed.
    PropertyChange(Box<dyn FnMut(Uuid, Option<String>, PropertyChange) + Send>),
    Timebase {
        conditional: bool,
        handler: Box<dyn FnMut(TransportState, NFrames, &mut JackPosition, bool) + Send>,
    },
    ProcessThread(NotifyHandler),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CallbackCategory {
    ThreadInit,
    Shutdown,
    InfoShutdown,
    Process,
    Freewheel,
    BufferSize,
    SampleRate,
    ClientRegistration,
    ClientRename,
    PortRegistration,
    PortConnect,
    PortRename,
    GraphOrder,
    Xrun,
    Latency,
    Sync,
    Session,
    PropertyChange,
    Timebase,
    ProcessThread,
}

/// Static configuration of one callback category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryConfig {
    pub setter: &'static str,
    pub shape: CallbackShape,
    /// `false` for the setters declared `void`, which cannot report failure.
    pub reports_status: bool,
}

const fn config(setter: &'static str, shape: CallbackShape, reports_status: bool) -> CategoryConfig {
    CategoryConfig {
        setter,
        shape,
        reports_status,
    }
}

// Indexed by `CallbackCategory as usize`.
const CATEGORY_TABLE: [CategoryConfig; 20] = [
    config("jack_set_thread_init_callback", CallbackShape::Notify, true),
    config("jack_on_shutdown", CallbackShape::Notify, false),
    config("jack_on_info_shutdown", CallbackShape::InfoShutdown, false),
    config("jack_set_process_callback", CallbackShape::Frames, true),
    config("jack_set_freewheel_callback", CallbackShape::IntNotify, true),
    config("jack_set_buffer_size_callback", CallbackShape::Frames, true),
    config("jack_set_sample_rate_callback", CallbackShape::Frames, true),
    config(
        "jack_set_client_registration_callback",
        CallbackShape::ClientRegistration,
        true,
    ),
    config("jack_set_client_rename_callback", CallbackShape::ClientRename, true),
    config(
        "jack_set_port_registration_callback",
        CallbackShape::PortRegistration,
        true,
    ),
    config("jack_set_port_connect_callback", CallbackShape::PortConnect, true),
    config("jack_set_port_rename_callback", CallbackShape::PortRename, true),
    config("jack_set_graph_order_callback", CallbackShape::NotifyStatus, true),
    config("jack_set_xrun_callback", CallbackShape::NotifyStatus, true),
    config("jack_set_latency_callback", CallbackShape::IntNotify, true),
    config("jack_set_sync_callback", CallbackShape::Sync, true),
    config("jack_set_session_callback", CallbackShape::Session, true),
    config(
        "jack_set_property_change_callback",
        CallbackShape::PropertyChange,
        true,
    ),
    config("jack_set_timebase_callback", CallbackShape::Timebase, true),
    config("jack_set_process_thread", CallbackShape::Thread, true),
];

impl CallbackCategory {
    pub const ALL: [CallbackCategory; 20] = [
        CallbackCategory::ThreadInit,
        CallbackCategory::Shutdown,
        CallbackCategory::InfoShutdown,
        CallbackCategory::Process,
        CallbackCategory::Freewheel,
        CallbackCategory::BufferSize,
        CallbackCategory::SampleRate,
        CallbackCategory::ClientRegistration,
        CallbackCategory::ClientRename,
        CallbackCategory::PortRegistration,
        CallbackCategory::PortConnect,
        CallbackCategory::PortRename,
        CallbackCategory::GraphOrder,
        CallbackCategory::Xrun,
        CallbackCategory::Latency,
        CallbackCategory::Sync,
        CallbackCategory::Session,
        CallbackCategory::PropertyChange,
        CallbackCategory::Timebase,
        CallbackCategory::ProcessThread,
    ];

    pub fn config(self) -> &'static CategoryConfig {
        &CATEGORY_TABLE[self as usize]
    }
}

impl Callback {
    pub fn category(&self) -> CallbackCategory {
        match self {
            Callback::ThreadInit(_) => CallbackCategory::ThreadInit,
            Callback::Shutdown(_) => CallbackCategory::Shutdown,
            Callback::InfoShutdown(_) => CallbackCategory::InfoShutdown,
            Callback::Process(_) => CallbackCategory::Process,
            Callback::Freewheel(_) => CallbackCategory::Freewheel,
            Callback::BufferSize(_) => CallbackCategory::BufferSize,
            Callback::SampleRate(_) => CallbackCategory::SampleRate,
            Callback::ClientRegistration(_) => CallbackCategory::ClientRegistration,
            Callback::ClientRename(_) => CallbackCategory::ClientRename,
            Callback::PortRegistration(_) => CallbackCategory::PortRegistration,
            Callback::PortConnect(_) => CallbackCategory::PortConnect,
            Callback::PortRename(_) => CallbackCategory::PortRename,
            Callback::GraphOrder(_) => CallbackCategory::GraphOrder,
            Callback::Xrun(_) => CallbackCategory::Xrun,
            Callback::Latency(_) => CallbackCategory::Latency,
            Callback::Sync(_) => CallbackCategory::Sync,
            Callback::Session(_) => CallbackCategory::Session,
            Callback::PropertyChange(_) => CallbackCategory::PropertyChange,
            Callback::Timebase { .. } => CallbackCategory::Timebase,
            Callback::ProcessThread(_) => CallbackCategory::ProcessThread,
        }
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callback::{:?}", self.category())
    }
}

struct Record {
    encoding: TextEncoding,
    callback: Callback,
}

/// Owning pointer to a record whose address was handed to libjack.
struct Trampoline {
    record: NonNull<Record>,
}

// SAFETY: the record is only touched by the native thread delivering its
// category and by the owning context when it is dropped; the closures are
// `Send`.
unsafe impl Send for Trampoline {}

impl Trampoline {
    fn new(encoding: TextEncoding, callback: Callback) -> Self {
        let record = Box::new(Record { encoding, callback });
        Self {
            record: NonNull::from(Box::leak(record)),
        }
    }

    fn arg(&self) -> *mut c_void {
        self.record.as_ptr().cast()
    }
}

impl Drop for Trampoline {
    fn drop(&mut self) {
        // SAFETY: the pointer came from `Box::leak` in `new` and is freed
        // only here.
        drop(unsafe { Box::from_raw(self.record.as_ptr()) });
    }
}

enum Installed {
    Unresolved,
    Status(c_int),
    Void,
}

fn status<F: Copy>(setter: Option<F>, call: impl FnOnce(F) -> c_int) -> Installed {
    setter.map_or(Installed::Unresolved, |setter| Installed::Status(call(setter)))
}

fn void<F: Copy>(setter: Option<F>, call: impl FnOnce(F)) -> Installed {
    setter.map_or(Installed::Unresolved, |setter| {
        call(setter);
        Installed::Void
    })
}

/// Calls the setter matching `callback` with the trampoline for its shape.
fn install(symbols: &Symbols, client: *mut JackClient, callback: &Callback, arg: *mut c_void) -> Installed {
    // SAFETY (all arms): `client` is a live client handle, the trampoline
    // matches the setter's declared callback type and `arg` points at the
    // record the trampoline expects.
    match callback {
        Callback::ThreadInit(_) => status(symbols.jack_set_thread_init_callback, |f| unsafe {
            f(client, Some(thread_init_trampoline), arg)
        }),
        Callback::Shutdown(_) => void(symbols.jack_on_shutdown, |f| unsafe {
            f(client, Some(shutdown_trampoline), arg)
        }),
        Callback::InfoShutdown(_) => void(symbols.jack_on_info_shutdown, |f| unsafe {
            f(client, Some(info_shutdown_trampoline), arg)
        }),
        Callback::Process(_) => status(symbols.jack_set_process_callback, |f| unsafe {
            f(client, Some(frames_trampoline), arg)
        }),
        Callback::Freewheel(_) => status(symbols.jack_set_freewheel_callback, |f| unsafe {
            f(client, Some(int_notify_trampoline), arg)
        }),
        Callback::BufferSize(_) => status(symbols.jack_set_buffer_size_callback, |f| unsafe {
            f(client, Some(frames_trampoline), arg)
        }),
        Callback::SampleRate(_) => status(symbols.jack_set_sample_rate_callback, |f| unsafe {
            f(client, Some(frames_trampoline), arg)
        }),
        Callback::ClientRegistration(_) => {
            status(symbols.jack_set_client_registration_callback, |f| unsafe {
                f(client, Some(client_registration_trampoline), arg)
            })
        }
        Callback::ClientRename(_) => status(symbols.jack_set_client_rename_callback, |f| unsafe {
            f(client, Some(client_rename_trampoline), arg)
        }),
        Callback::PortRegistration(_) => {
            status(symbols.jack_set_port_registration_callback, |f| unsafe {
                f(client, Some(port_registration_trampoline), arg)
            })
        }
        Callback::PortConnect(_) => status(symbols.jack_set_port_connect_callback, |f| unsafe {
            f(client, Some(port_connect_trampoline), arg)
        }),
        Callback::PortRename(_) => status(symbols.jack_set_port_rename_callback, |f| unsafe {
            f(client, Some(port_rename_trampoline), arg)
        }),
        Callback::GraphOrder(_) => status(symbols.jack_set_graph_order_callback, |f| unsafe {
            f(client, Some(notify_status_trampoline), arg)
        }),
        Callback::Xrun(_) => status(symbols.jack_set_xrun_callback, |f| unsafe {
            f(client, Some(notify_status_trampoline), arg)
        }),
        Callback::Latency(_) => status(symbols.jack_set_latency_callback, |f| unsafe {
            f(client, Some(int_notify_trampoline), arg)
        }),
        Callback::Sync(_) => status(symbols.jack_set_sync_callback, |f| unsafe {
            f(client, Some(sync_trampoline), arg)
        }),
        Callback::Session(_) => status(symbols.jack_set_session_callback, |f| unsafe {
            f(client, Some(session_trampoline), arg)
        }),
        Callback::PropertyChange(_) => {
            status(symbols.jack_set_property_change_callback, |f| unsafe {
                f(client, Some(property_change_trampoline), arg)
            })
        }
        Callback::Timebase { conditional, .. } => {
            let conditional = c_int::from(*conditional);
            status(symbols.jack_set_timebase_callback, |f| unsafe {
                f(client, conditional, Some(timebase_trampoline), arg)
            })
        }
        Callback::ProcessThread(_) => status(symbols.jack_set_process_thread, |f| unsafe {
            f(client, Some(thread_trampoline), arg)
        }),
    }
}

/// Retained trampolines of one context.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    retained: HashMap<(ClientHandle, CallbackCategory), Trampoline>,
}

impl CallbackRegistry {
    /// Installs `callback` for `client`.
    ///
    /// Returns the setter's status, `Some(-1)` when a status setter is not
    /// exported, and `None` for the `void` setters.
    pub(crate) fn register(
        &mut self,
        symbols: &Symbols,
        encoding: TextEncoding,
        client: ClientHandle,
        callback: Callback,
    ) -> Option<c_int> {
        let category = callback.category();
        let config = category.config();
        let trampoline = Trampoline::new(encoding, callback);
        // SAFETY: the record stays alive at least until the setter returns.
        let callback_ref = unsafe { &trampoline.record.as_ref().callback };
        let installed = install(symbols, client.as_ptr(), callback_ref, trampoline.arg());

        let (retain, result) = match installed {
            Installed::Unresolved => {
                debug!(setter = config.setter, "callback setter unresolved");
                (false, config.reports_status.then_some(-1))
            }
            Installed::Status(code) => {
                if code != 0 {
                    warn!(setter = config.setter, code, "callback registration failed");
                }
                (code == 0, Some(code))
            }
            Installed::Void => (true, None),
        };

        if retain {
            debug!(?category, ?client, "callback registered");
            // The superseded record is dropped only after the new one is in
            // place on the native side.
            let previous = self.retained.insert((client, category), trampoline);
            drop(previous);
        } else {
            drop(trampoline);
        }
        result
    }

    pub(crate) fn release_client(&mut self, client: ClientHandle) -> usize {
        let before = self.retained.len();
        self.retained.retain(|(owner, _), _| *owner != client);
        let released = before - self.retained.len();
        if released > 0 {
            debug!(?client, released, "released client callbacks");
        }
        released
    }

    pub(crate) fn retained_count(&self, client: ClientHandle) -> usize {
        self.retained.keys().filter(|(owner, _)| *owner == client).count()
    }

    pub(crate) fn is_retained(&self, client: ClientHandle, category: CallbackCategory) -> bool {
        self.retained.contains_key(&(client, category))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Gives up ownership of every record without freeing it.
    pub(crate) fn leak(&mut self) {
        for (_, trampoline) in self.retained.drain() {
            std::mem::forget(trampoline);
        }
    }
}

/// Borrows the record behind a native `arg`.
///
/// # Safety
/// `arg` must be the address of a live `Record` and the native side must
/// not deliver the same category concurrently.
unsafe fn record<'a>(arg: *mut c_void) -> &'a mut Record {
    // SAFETY: guaranteed by the caller.
    unsafe { &mut *arg.cast::<Record>() }
}

unsafe fn text(encoding: TextEncoding, ptr: *const c_char) -> String {
    // SAFETY: libjack passes NUL-terminated strings or null.
    unsafe { encoding.read(ptr) }.unwrap_or_default()
}

unsafe extern "C" fn thread_init_trampoline(arg: *mut c_void) {
    // SAFETY: `arg` is the record installed with this trampoline; the
    // handler is `Fn + Sync`, so shared access from several threads is fine.
    let record = unsafe { &*arg.cast::<Record>() };
    if let Callback::ThreadInit(handler) = &record.callback {
        handler();
    }
}

unsafe extern "C" fn shutdown_trampoline(arg: *mut c_void) {
    // SAFETY: `arg` is the record installed with this trampoline.
    if let Callback::Shutdown(handler) = &mut unsafe { record(arg) }.callback {
        handler();
    }
}

unsafe extern "C" fn info_shutdown_trampoline(code: c_int, reason: *const c_char, arg: *mut c_void) {
    // SAFETY: `arg` is the record installed with this trampoline.
    let record = unsafe { record(arg) };
    if let Callback::InfoShutdown(handler) = &mut record.callback {
        // SAFETY: `reason` is a native string or null.
        let reason = unsafe { text(record.encoding, reason) };
        handler(Status(code), reason);
    }
}

// Runs on the real-time thread: no allocation, locking or logging here.
unsafe extern "C" fn frames_trampoline(nframes: NFrames, arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the record installed with this trampoline.
    match &mut unsafe { record(arg) }.callback {
        Callback::Process(handler) | Callback::BufferSize(handler) | Callback::SampleRate(handler) => {
            handler(nframes)
        }
        _ => 0,
    }
}

unsafe extern "C" fn int_notify_trampoline(value: c_int, arg: *mut c_void) {
    // SAFETY: `arg` is the record installed with this trampoline.
    match &mut unsafe { record(arg) }.callback {
        Callback::Freewheel(handler) => handler(value != 0),
        Callback::Latency(handler) => handler(LatencyMode::from_raw(value)),
        _ => {}
    }
}

unsafe extern "C" fn notify_status_trampoline(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the record installed with this trampoline.
    match &mut unsafe { record(arg) }.callback {
        Callback::GraphOrder(handler) | Callback::Xrun(handler) => handler(),
        _ => 0,
    }
}

unsafe extern "C" fn client_registration_trampoline(
    name: *const c_char,
    register: c_int,
    arg: *mut c_void,
) {
    // SAFETY: `arg` is the record installed with this trampoline.
    let record = unsafe { record(arg) };
    if let Callback::ClientRegistration(handler) = &mut record.callback {
        // SAFETY: `name` is a native string.
        let name = unsafe { text(record.encoding, name) };
        handler(name, register != 0);
    }
}

unsafe extern "C" fn client_rename_trampoline(
    old_name: *const c_char,
    new_name: *const c_char,
    arg: *mut c_void,
) -> c_int {
    // SAFETY: `arg` is the record installed with this trampoline.
    let record = unsafe { record(arg) };
    match &mut record.callback {
        Callback::ClientRename(handler) => {
            // SAFETY: both names are native strings.
            let (old_name, new_name) =
                unsafe { (text(record.encoding, old_name), text(record.encoding, new_name)) };
            handler(old_name, new_name)
        }
        _ => 0,
    }
}

unsafe extern "C" fn port_registration_trampoline(port: PortId, register: c_int, arg: *mut c_void) {
    // SAFETY: `arg` is the record installed with this trampoline.
    if let Callback::PortRegistration(handler) = &mut unsafe { record(arg) }.callback {
        handler(port, register != 0);
    }
}

unsafe extern "C" fn port_connect_trampoline(a: PortId, b: PortId, connect: c_int, arg: *mut c_void) {
    // SAFETY: `arg` is the record installed with this trampoline.
    if let Callback::PortConnect(handler) = &mut unsafe { record(arg) }.callback {
        handler(a, b, connect != 0);
    }
}

unsafe extern "C" fn port_rename_trampoline(
    port: PortId,
    old_name: *const c_char,
    new_name: *const c_char,
    arg: *mut c_void,
) {
    // SAFETY: `arg` is the record installed with this trampoline.
    let record = unsafe { record(arg) };
    if let Callback::PortRename(handler) = &mut record.callback {
        // SAFETY: both names are native strings.
        let (old_name, new_name) =
            unsafe { (text(record.encoding, old_name), text(record.encoding, new_name)) };
        handler(port, old_name, new_name);
    }
}

unsafe extern "C" fn sync_trampoline(state: c_int, pos: *mut JackPosition, arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the record installed with this trampoline.
    let Callback::Sync(handler) = &mut unsafe { record(arg) }.callback else {
        return 1;
    };
    // SAFETY: libjack passes a valid position for the current cycle.
    let Some(pos) = (unsafe { pos.as_ref() }) else {
        return 1;
    };
    let state = TransportState::from_raw(state).unwrap_or(TransportState::Stopped);
    c_int::from(handler(state, pos))
}

unsafe extern "C" fn session_trampoline(event: *mut JackSessionEvent, arg: *mut c_void) {
    // SAFETY: `arg` is the record installed with this trampoline.
    let record = unsafe { record(arg) };
    if let Callback::Session(handler) = &mut record.callback
        && let Some(event) = NonNull::new(event)
    {
        handler(SessionEvent::new(event, record.encoding));
    }
}

unsafe extern "C" fn property_change_trampoline(
    subject: Uuid,
    key: *const c_char,
    change: c_int,
    arg: *mut c_void,
) {
    // SAFETY: `arg` is the record installed with this trampoline.
    let record = unsafe { record(arg) };
    if let Callback::PropertyChange(handler) = &mut record.callback
        && let Some(change) = PropertyChange::from_raw(change)
    {
        // SAFETY: `key` is a native string or null.
        let key = unsafe { record.encoding.read(key) };
        handler(subject, key, change);
    }
}

unsafe extern "C" fn timebase_trampoline(
    state: c_int,
    nframes: NFrames,
    pos: *mut JackPosition,
    new_pos: c_int,
    arg: *mut c_void,
) {
    // SAFETY: `arg` is the record installed with this trampoline.
    if let Callback::Timebase { handler, .. } = &mut unsafe { record(arg) }.callback
        // SAFETY: libjack passes the position to fill in for this cycle.
        && let Some(pos) = unsafe { pos.as_mut() }
    {
        let state = TransportState::from_raw(state).unwrap_or(TransportState::Stopped);
        handler(state, nframes, pos, new_pos != 0);
    }
}

unsafe extern "C" fn thread_trampoline(arg: *mut c_void) -> *mut c_void {
    // SAFETY: `arg` is the record installed with this trampoline.
    if let Callback::ProcessThread(handler) = &mut unsafe { record(arg) }.callback {
        handler();
    }
    std::ptr::null_mut()
}

type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MessageKind {
    Error,
    Info,
}

struct MessageSlot {
    encoding: TextEncoding,
    handler: MessageHandler,
}

// `jack_set_error_function` and `jack_set_info_function` carry no user
// argument, so their handlers live in process-wide slots.
static ERROR_HANDLER: RwLock<Option<MessageSlot>> = RwLock::new(None);
static INFO_HANDLER: RwLock<Option<MessageSlot>> = RwLock::new(None);

fn slot(kind: MessageKind) -> &'static RwLock<Option<MessageSlot>> {
    match kind {
        MessageKind::Error => &ERROR_HANDLER,
        MessageKind::Info => &INFO_HANDLER,
    }
}

/// Routes libjack's error or info messages to `handler`. Returns `false`
/// without retaining the handler when the setter is not exported.
pub(crate) fn set_message_handler(
    symbols: &Symbols,
    kind: MessageKind,
    encoding: TextEncoding,
    handler: MessageHandler,
) -> bool {
    let (setter, trampoline): (_, unsafe extern "C" fn(*const c_char)) = match kind {
        MessageKind::Error => (symbols.jack_set_error_function, error_trampoline),
        MessageKind::Info => (symbols.jack_set_info_function, info_trampoline),
    };
    let Some(setter) = setter else {
        debug!(?kind, "message function setter unresolved");
        return false;
    };
    let previous = match slot(kind).write() {
        Ok(mut guard) => guard.replace(MessageSlot { encoding, handler }),
        Err(poisoned) => poisoned.into_inner().replace(MessageSlot { encoding, handler }),
    };
    // SAFETY: the trampoline matches `JackMessageCallback` and only reads
    // the slot populated above.
    unsafe { setter(Some(trampoline)) };
    drop(previous);
    true
}

fn dispatch(kind: MessageKind, message: *const c_char) {
    let handler = match slot(kind).read() {
        Ok(guard) => guard.as_ref().map(|slot| (slot.encoding, Arc::clone(&slot.handler))),
        Err(_) => None,
    };
    if let Some((encoding, handler)) = handler
        && !message.is_null()
    {
        // SAFETY: libjack passes NUL-terminated messages.
        let bytes = unsafe { CStr::from_ptr(message) }.to_bytes();
        handler(&encoding.decode_lossy(bytes));
    }
}

unsafe extern "C" fn error_trampoline(message: *const c_char) {
    dispatch(MessageKind::Error, message);
}

unsafe extern "C" fn info_trampoline(message: *const c_char) {
    dispatch(MessageKind::Info, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockLibrary};
    use crate::signature::MarshalKind;
    use crate::types::JackProcessCallback;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client() -> ClientHandle {
        // SAFETY: the mock never dereferences client pointers.
        unsafe { ClientHandle::from_raw(NonNull::dangling().as_ptr()) }.unwrap()
    }

    /// Records its own drop in the mock event log.
    struct DropTracker(&'static str);

    impl Drop for DropTracker {
        fn drop(&mut self) {
            mock::record(format!("dropped {}", self.0));
        }
    }

    fn tracked_process(tag: &'static str) -> Callback {
        let tracker = DropTracker(tag);
        Callback::Process(Box::new(move |_| {
            std::hint::black_box(&tracker);
            0
        }))
    }

    #[test]
    fn category_table_matches_declared_setters() {
        let native = MockLibrary::new().into_native();
        for category in CallbackCategory::ALL {
            let config = category.config();
            let entry = native.resolve(config.setter).expect("setter declared");
            assert!(
                entry
                    .signature
                    .params
                    .contains(&MarshalKind::FunctionPointer(config.shape)),
                "{category:?}"
            );
            assert_eq!(
                entry.signature.ret == MarshalKind::Int32,
                config.reports_status
            );
        }
    }

    #[test]
    fn replacement_releases_previous_after_setter_returns() {
        let native = MockLibrary::full().into_native();
        let mut registry = CallbackRegistry::default();
        let client = client();

        let first = registry.register(native.symbols(), TextEncoding::Utf8, client, tracked_process("first"));
        let second = registry.register(native.symbols(), TextEncoding::Utf8, client, tracked_process("second"));

        assert_eq!((first, second), (Some(0), Some(0)));
        assert_eq!(registry.retained_count(client), 1);
        assert_eq!(
            mock::events(),
            vec![
                "set jack_set_process_callback",
                "set jack_set_process_callback",
                "dropped first",
            ]
        );
    }

    #[test]
    fn failed_registration_is_not_retained() {
        let native = MockLibrary::full().into_native();
        let mut registry = CallbackRegistry::default();
        let client = client();

        registry.register(native.symbols(), TextEncoding::Utf8, client, tracked_process("kept"));
        mock::with_state(|state| state.setter_status = 5);
        let status = registry.register(native.symbols(), TextEncoding::Utf8, client, tracked_process("rejected"));

        assert_eq!(status, Some(5));
        assert!(registry.is_retained(client, CallbackCategory::Process));
        assert_eq!(
            mock::events(),
            vec![
                "set jack_set_process_callback",
                "set jack_set_process_callback",
                "dropped rejected",
            ]
        );
    }

    #[test]
    fn unresolved_setters_return_category_sentinel() {
        let native = MockLibrary::new().into_native();
        let mut registry = CallbackRegistry::default();
        let client = client();

        let process = registry.register(native.symbols(), TextEncoding::Utf8, client, tracked_process("p"));
        let shutdown = registry.register(
            native.symbols(),
            TextEncoding::Utf8,
            client,
            Callback::Shutdown(Box::new(|| {})),
        );

        assert_eq!(process, Some(-1));
        assert_eq!(shutdown, None);
        assert!(registry.is_empty());
        assert_eq!(mock::events(), vec!["dropped p"]);
    }

    #[test]
    fn void_setter_registration_is_retained() {
        let native = MockLibrary::full().into_native();
        let mut registry = CallbackRegistry::default();
        let client = client();

        let status = registry.register(
            native.symbols(),
            TextEncoding::Utf8,
            client,
            Callback::InfoShutdown(Box::new(|_, _| {})),
        );
        assert_eq!(status, None);
        assert!(registry.is_retained(client, CallbackCategory::InfoShutdown));
    }

    #[test]
    fn process_trampoline_reaches_closure() {
        let native = MockLibrary::full().into_native();
        let mut registry = CallbackRegistry::default();
        let frames = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&frames);

        registry.register(
            native.symbols(),
            TextEncoding::Utf8,
            client(),
            Callback::Process(Box::new(move |nframes| {
                seen.fetch_add(nframes, Ordering::Relaxed);
                0
            })),
        );

        let registration = mock::registration("jack_set_process_callback").unwrap();
        // SAFETY: the mock recorded the pointer installed by the registry.
        let process: JackProcessCallback =
            unsafe { std::mem::transmute(registration.callback.unwrap()) };
        // SAFETY: `arg` is the retained record for this trampoline.
        let status = unsafe { process(256, registration.arg) };
        unsafe { process(256, registration.arg) };

        assert_eq!(status, 0);
        assert_eq!(frames.load(Ordering::Relaxed), 512);
    }

    #[test]
    fn release_client_drops_only_its_records() {
        let native = MockLibrary::full().into_native();
        let mut registry = CallbackRegistry::default();
        let a = client();
        // SAFETY: the mock never dereferences client pointers.
        let b = unsafe { ClientHandle::from_raw(8 as *mut JackClient) }.unwrap();

        registry.register(native.symbols(), TextEncoding::Utf8, a, tracked_process("a"));
        registry.register(native.symbols(), TextEncoding::Utf8, b, tracked_process("b"));
        registry.register(
            native.symbols(),
            TextEncoding::Utf8,
            a,
            Callback::Xrun(Box::new(|| 0)),
        );

        assert_eq!(registry.release_client(a), 2);
        assert_eq!(registry.retained_count(b), 1);
        assert!(mock::events().contains(&"dropped a".to_string()));
        assert!(!mock::events().contains(&"dropped b".to_string()));
    }

    #[test]
    fn message_handlers_replace_and_dispatch() {
        let native = MockLibrary::full().into_native();
        let messages = Arc::new(RwLock::new(Vec::new()));
        let sink = Arc::clone(&messages);

        assert!(set_message_handler(
            native.symbols(),
            MessageKind::Error,
            TextEncoding::Utf8,
            Arc::new(move |message| sink.write().unwrap().push(message.to_string())),
        ));
        let installed = mock::with_state(|state| state.error_function).unwrap();
        // SAFETY: the mock recorded the installed message trampoline.
        let trampoline: unsafe extern "C" fn(*const c_char) = unsafe { std::mem::transmute(installed) };
        unsafe { trampoline(c"cannot connect".as_ptr()) };

        assert_eq!(*messages.read().unwrap(), vec!["cannot connect".to_string()]);

        let empty = MockLibrary::new().into_native();
        assert!(!set_message_handler(
            empty.symbols(),
            MessageKind::Info,
            TextEncoding::Utf8,
            Arc::new(|_| {}),
        ));
    }
}
