//! The facade context: client lifecycle, server control, time and callback
//! registration.

use crate::callbacks::{Callback, CallbackCategory, CallbackRegistry, MessageKind, set_message_handler};
use crate::encoding::TextEncoding;
use crate::flags::{LatencyMode, Options, PropertyChange, Status, TransportState};
use crate::library::{LoadError, NativeLibrary};
use crate::session::SessionEvent;
use crate::signature::Generation;
use crate::symbols::Symbols;
use crate::types::{JackClient, JackPosition, NFrames, PortId, Time, Uuid};
use std::ffi::{CString, c_char, c_int, c_void};
use std::fmt;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use tracing::{debug, warn};

/// Opaque `jack_client_t *`. Never dereferenced by this crate; using a
/// handle after [`Jack::client_close`] is a caller error.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientHandle(NonNull<JackClient>);

// SAFETY: libjack client handles may be used from any thread.
unsafe impl Send for ClientHandle {}
// SAFETY: the handle is an opaque address; libjack synchronizes internally.
unsafe impl Sync for ClientHandle {}

impl ClientHandle {
    /// # Safety
    /// `ptr` must be null or a client returned by `jack_client_open` that
    /// has not been closed.
    pub unsafe fn from_raw(ptr: *mut JackClient) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut JackClient {
        self.0.as_ptr()
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientHandle({:p})", self.0)
    }
}

/// Extra arguments of `jack_client_open`; each one present sets its
/// option bit and is passed in the variadic tail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenArgs {
    pub server_name: Option<String>,
    pub session_id: Option<String>,
}

impl OpenArgs {
    /// Bits that announce a variadic argument. Only the arguments carried
    /// here may set them; load name and init are never passed.
    const ARGUMENT_BITS: Options =
        Options(Options::SERVER_NAME.0 | Options::SESSION_ID.0 | Options::LOAD_NAME.0 | Options::LOAD_INIT.0);

    /// The option word handed to `jack_client_open`: argument bits from the
    /// caller are dropped and set again from the arguments present.
    pub fn native_options(&self, options: Options) -> Options {
        let mut options = Options(options.bits() & !Self::ARGUMENT_BITS.bits());
        if self.server_name.is_some() {
            options |= Options::SERVER_NAME;
        }
        if self.session_id.is_some() {
            options |= Options::SESSION_ID;
        }
        options
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleTimes {
    pub current_frames: NFrames,
    pub current_usecs: Time,
    pub next_usecs: Time,
    pub period_usecs: f32,
}

/// Stateless call-through surface over a loaded library. Cheap to clone,
/// so process handlers can capture their own copy.
///
/// Sentinels when a symbol is not exported: status calls return `-1`,
/// value calls `None`, `void` calls do nothing. Text that cannot be encoded
/// is treated the same way.
#[derive(Clone)]
pub struct Api {
    native: Arc<NativeLibrary>,
    encoding: TextEncoding,
}

impl Api {
    pub fn new(native: Arc<NativeLibrary>) -> Self {
        Self {
            native,
            encoding: TextEncoding::default(),
        }
    }

    pub fn native(&self) -> &Arc<NativeLibrary> {
        &self.native
    }

    pub(crate) fn symbols(&self) -> &Symbols {
        self.native.symbols()
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn generation(&self) -> Generation {
        self.native.generation()
    }

    pub(crate) fn encode(&self, text: &str, encoding: TextEncoding) -> Option<CString> {
        encoding
            .encode(text)
            .map_err(|err| warn!(%err, %encoding, "text not passed to libjack"))
            .ok()
    }

    /// Decodes a string owned by libjack without freeing it.
    pub(crate) fn read(&self, ptr: *const c_char, encoding: TextEncoding) -> Option<String> {
        // SAFETY: libjack returns NUL-terminated strings or null.
        unsafe { encoding.read(ptr) }
    }

    /// Decodes a string the caller owns and hands it back to `jack_free`.
    pub(crate) fn take(&self, ptr: *mut c_char, encoding: TextEncoding) -> Option<String> {
        let text = self.read(ptr, encoding);
        if !ptr.is_null() {
            // SAFETY: `ptr` was allocated by libjack for the caller.
            unsafe { self.free(ptr.cast()) };
        }
        text
    }

    /// `jack_free`
    ///
    /// # Safety
    /// `ptr` must be null or memory libjack allocated for the caller.
    pub unsafe fn free(&self, ptr: *mut c_void) {
        native_call!(self, jack_free(ptr), ())
    }

    pub fn version(&self) -> Option<(c_int, c_int, c_int, c_int)> {
        let (mut major, mut minor, mut micro, mut proto) = (0, 0, 0, 0);
        native_call!(
            self,
            jack_get_version(&mut major, &mut minor, &mut micro, &mut proto),
            return None
        );
        Some((major, minor, micro, proto))
    }

    pub fn version_string(&self) -> Option<String> {
        let text = native_call!(self, jack_get_version_string(), ptr::null());
        self.read(text, self.encoding)
    }

    /// `jack_client_open`. The status is `FAILURE` when the symbol is
    /// missing or the name cannot be encoded.
    pub fn client_open(&self, name: &str, options: Options, args: &OpenArgs) -> (Option<ClientHandle>, Status) {
        let failed = (None, Status::FAILURE);
        let Some(open) = self.symbols().jack_client_open else {
            return failed;
        };
        let Some(name) = self.encode(name, self.encoding) else {
            return failed;
        };
        let encode_arg = |arg: &Option<String>| match arg {
            Some(text) => self.encode(text, self.encoding).map(Some),
            None => Some(None),
        };
        let (Some(server), Some(session)) = (encode_arg(&args.server_name), encode_arg(&args.session_id))
        else {
            return failed;
        };

        let options = args.native_options(options);
        let mut status: c_int = 0;
        // SAFETY: `native_options` sets exactly the bits of the arguments
        // present, and the variadic tail passes them in libjack's order.
        let client = unsafe {
            match (&server, &session) {
                (None, None) => open(name.as_ptr(), options.bits(), &mut status),
                (Some(server), None) => open(name.as_ptr(), options.bits(), &mut status, server.as_ptr()),
                (None, Some(session)) => open(name.as_ptr(), options.bits(), &mut status, session.as_ptr()),
                (Some(server), Some(session)) => open(
                    name.as_ptr(),
                    options.bits(),
                    &mut status,
                    server.as_ptr(),
                    session.as_ptr(),
                ),
            }
        };
        let status = Status(status);
        // SAFETY: a non-null result is a freshly opened client.
        let client = unsafe { ClientHandle::from_raw(client) };
        if client.is_none() {
            debug!(?status, "jack_client_open failed");
        }
        (client, status)
    }

    /// `jack_client_rename`; the returned name is released with `jack_free`.
    pub fn client_rename(&self, client: ClientHandle, new_name: &str) -> Option<String> {
        let new_name = self.encode(new_name, self.encoding)?;
        let renamed = native_call!(
            self,
            jack_client_rename(client.as_ptr(), new_name.as_ptr()),
            return None
        );
        self.take(renamed, self.encoding)
    }

    pub fn client_name_size(&self) -> c_int {
        native_call!(self, jack_client_name_size(), -1)
    }

    pub fn get_client_name(&self, client: ClientHandle) -> Option<String> {
        let name = native_call!(self, jack_get_client_name(client.as_ptr()), return None);
        self.read(name, self.encoding)
    }

    pub fn activate(&self, client: ClientHandle) -> c_int {
        native_call!(self, jack_activate(client.as_ptr()), -1)
    }

    pub fn deactivate(&self, client: ClientHandle) -> c_int {
        native_call!(self, jack_deactivate(client.as_ptr()), -1)
    }

    pub fn get_client_pid(&self, name: &str) -> c_int {
        let Some(name) = self.encode(name, self.encoding) else {
            return -1;
        };
        native_call!(self, jack_get_client_pid(name.as_ptr()), -1)
    }

    pub fn is_realtime(&self, client: ClientHandle) -> c_int {
        native_call!(self, jack_is_realtime(client.as_ptr()), -1)
    }

    pub fn cycle_wait(&self, client: ClientHandle) -> Option<NFrames> {
        Some(native_call!(self, jack_cycle_wait(client.as_ptr()), return None))
    }

    pub fn cycle_signal(&self, client: ClientHandle, status: c_int) {
        native_call!(self, jack_cycle_signal(client.as_ptr(), status), ())
    }

    pub fn set_freewheel(&self, client: ClientHandle, enabled: bool) -> c_int {
        native_call!(self, jack_set_freewheel(client.as_ptr(), c_int::from(enabled)), -1)
    }

    pub fn set_buffer_size(&self, client: ClientHandle, nframes: NFrames) -> c_int {
        native_call!(self, jack_set_buffer_size(client.as_ptr(), nframes), -1)
    }

    pub fn get_sample_rate(&self, client: ClientHandle) -> Option<NFrames> {
        Some(native_call!(self, jack_get_sample_rate(client.as_ptr()), return None))
    }

    pub fn get_buffer_size(&self, client: ClientHandle) -> Option<NFrames> {
        Some(native_call!(self, jack_get_buffer_size(client.as_ptr()), return None))
    }

    pub fn engine_takeover_timebase(&self, client: ClientHandle) -> c_int {
        native_call!(self, jack_engine_takeover_timebase(client.as_ptr()), -1)
    }

    pub fn cpu_load(&self, client: ClientHandle) -> Option<f32> {
        Some(native_call!(self, jack_cpu_load(client.as_ptr()), return None))
    }

    pub fn frames_since_cycle_start(&self, client: ClientHandle) -> Option<NFrames> {
        Some(native_call!(
            self,
            jack_frames_since_cycle_start(client.as_ptr()),
            return None
        ))
    }

    pub fn frame_time(&self, client: ClientHandle) -> Option<NFrames> {
        Some(native_call!(self, jack_frame_time(client.as_ptr()), return None))
    }

    pub fn last_frame_time(&self, client: ClientHandle) -> Option<NFrames> {
        Some(native_call!(self, jack_last_frame_time(client.as_ptr()), return None))
    }

    /// `jack_get_cycle_times`; `None` when unresolved or when libjack
    /// reports an error.
    pub fn get_cycle_times(&self, client: ClientHandle) -> Option<CycleTimes> {
        let mut times = CycleTimes::default();
        let status = native_call!(
            self,
            jack_get_cycle_times(
                client.as_ptr(),
                &mut times.current_frames,
                &mut times.current_usecs,
                &mut times.next_usecs,
                &mut times.period_usecs,
            ),
            return None
        );
        (status == 0).then_some(times)
    }

    pub fn frames_to_time(&self, client: ClientHandle, nframes: NFrames) -> Option<Time> {
        Some(native_call!(self, jack_frames_to_time(client.as_ptr(), nframes), return None))
    }

    pub fn time_to_frames(&self, client: ClientHandle, time: Time) -> Option<NFrames> {
        Some(native_call!(self, jack_time_to_frames(client.as_ptr(), time), return None))
    }

    pub fn get_time(&self) -> Option<Time> {
        Some(native_call!(self, jack_get_time(), return None))
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("native", &self.native)
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Binding context: the call-through [`Api`] plus the trampolines of every
/// callback registered through it.
///
/// Close clients through [`Jack::client_close`] so their trampolines are
/// released; trampolines of clients still open when the context is dropped
/// are leaked rather than freed under the server's feet.
pub struct Jack {
    api: Api,
    callbacks: CallbackRegistry,
}

impl Deref for Jack {
    type Target = Api;

    fn deref(&self) -> &Api {
        &self.api
    }
}

impl Jack {
    pub fn new(native: Arc<NativeLibrary>) -> Self {
        Self {
            api: Api::new(native),
            callbacks: CallbackRegistry::default(),
        }
    }

    /// Uses the process-wide library, loading it on first use.
    pub fn load() -> Result<Self, LoadError> {
        NativeLibrary::shared().map(Self::new)
    }

    pub fn api(&self) -> Api {
        self.api.clone()
    }

    /// Default encoding for every text crossing the boundary, including
    /// strings handed to callbacks registered afterwards.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.api.encoding = encoding;
    }

    /// Installs `callback` for `client` and retains its trampoline.
    ///
    /// Returns the setter's status (`0` on success), `Some(-1)` when the
    /// setter is not exported, and `None` for the shutdown setters, which
    /// cannot report failure. A callback that was not installed is dropped.
    pub fn register(&mut self, client: ClientHandle, callback: Callback) -> Option<c_int> {
        self.callbacks
            .register(self.api.symbols(), self.api.encoding, client, callback)
    }

    /// `jack_client_close`, then drops the client's trampolines.
    pub fn client_close(&mut self, client: ClientHandle) -> c_int {
        let status = native_call!(self.api, jack_client_close(client.as_ptr()), -1);
        self.release_client(client);
        status
    }

    /// Drops every trampoline of `client`. Only valid once libjack can no
    /// longer call them.
    pub fn release_client(&mut self, client: ClientHandle) -> usize {
        self.callbacks.release_client(client)
    }

    pub fn retained_callbacks(&self, client: ClientHandle) -> usize {
        self.callbacks.retained_count(client)
    }

    pub fn is_registered(&self, client: ClientHandle, category: CallbackCategory) -> bool {
        self.callbacks.is_retained(client, category)
    }

    fn status(&mut self, client: ClientHandle, callback: Callback) -> c_int {
        self.register(client, callback).unwrap_or(-1)
    }

    pub fn set_thread_init_callback(
        &mut self,
        client: ClientHandle,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> c_int {
        self.status(client, Callback::ThreadInit(Box::new(handler)))
    }

    pub fn on_shutdown(&mut self, client: ClientHandle, handler: impl FnMut() + Send + 'static) {
        self.register(client, Callback::Shutdown(Box::new(handler)));
    }

    pub fn on_info_shutdown(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(Status, String) + Send + 'static,
    ) {
        self.register(client, Callback::InfoShutdown(Box::new(handler)));
    }

    pub fn set_process_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(NFrames) -> c_int + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::Process(Box::new(handler)))
    }

    pub fn set_freewheel_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(bool) + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::Freewheel(Box::new(handler)))
    }

    pub fn set_buffer_size_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(NFrames) -> c_int + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::BufferSize(Box::new(handler)))
    }

    pub fn set_sample_rate_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(NFrames) -> c_int + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::SampleRate(Box::new(handler)))
    }

    pub fn set_client_registration_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(String, bool) + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::ClientRegistration(Box::new(handler)))
    }

    pub fn set_client_rename_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(String, String) -> c_int + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::ClientRename(Box::new(handler)))
    }

    pub fn set_port_registration_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(PortId, bool) + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::PortRegistration(Box::new(handler)))
    }

    pub fn set_port_connect_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(PortId, PortId, bool) + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::PortConnect(Box::new(handler)))
    }

    pub fn set_port_rename_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(PortId, String, String) + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::PortRename(Box::new(handler)))
    }

    pub fn set_graph_order_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut() -> c_int + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::GraphOrder(Box::new(handler)))
    }

    pub fn set_xrun_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut() -> c_int + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::Xrun(Box::new(handler)))
    }

    pub fn set_latency_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(LatencyMode) + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::Latency(Box::new(handler)))
    }

    pub fn set_sync_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(TransportState, &JackPosition) -> bool + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::Sync(Box::new(handler)))
    }

    pub fn set_session_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(SessionEvent) + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::Session(Box::new(handler)))
    }

    pub fn set_property_change_callback(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut(Uuid, Option<String>, PropertyChange) + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::PropertyChange(Box::new(handler)))
    }

    pub fn set_timebase_callback(
        &mut self,
        client: ClientHandle,
        conditional: bool,
        handler: impl FnMut(TransportState, NFrames, &mut JackPosition, bool) + Send + 'static,
    ) -> c_int {
        self.status(
            client,
            Callback::Timebase {
                conditional,
                handler: Box::new(handler),
            },
        )
    }

    pub fn set_process_thread(
        &mut self,
        client: ClientHandle,
        handler: impl FnMut() + Send + 'static,
    ) -> c_int {
        self.status(client, Callback::ProcessThread(Box::new(handler)))
    }

    /// Routes libjack's error messages to `handler` for the whole process.
    /// Returns `false` when the setter is not exported.
    pub fn set_error_function(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> bool {
        set_message_handler(
            self.api.symbols(),
            MessageKind::Error,
            self.api.encoding,
            Arc::new(handler),
        )
    }

    pub fn set_info_function(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> bool {
        set_message_handler(
            self.api.symbols(),
            MessageKind::Info,
            self.api.encoding,
            Arc::new(handler),
        )
    }
}

impl Drop for Jack {
    fn drop(&mut self) {
        if !self.callbacks.is_empty() {
            warn!("binding context dropped with open clients; leaking their callbacks");
            self.callbacks.leak();
        }
    }
}

impl fmt::Debug for Jack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jack").field("api", &self.api).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockLibrary};

    fn client() -> ClientHandle {
        // SAFETY: the mock never dereferences client pointers.
        unsafe { ClientHandle::from_raw(NonNull::dangling().as_ptr()) }.unwrap()
    }

    #[test]
    fn unresolved_symbols_return_sentinels() {
        let jack = Jack::new(MockLibrary::new().into_native());
        let client = client();

        assert_eq!(jack.activate(client), -1);
        assert_eq!(jack.client_name_size(), -1);
        assert_eq!(jack.get_sample_rate(client), None);
        assert_eq!(jack.get_cycle_times(client), None);
        assert_eq!(jack.version(), None);
        assert_eq!(jack.version_string(), None);
        assert_eq!(jack.client_rename(client, "renamed"), None);
        let (opened, status) = jack.client_open("inspector", Options::NO_START_SERVER, &OpenArgs::default());
        assert!(opened.is_none());
        assert_eq!(status, Status::FAILURE);
        jack.cycle_signal(client, 0);
        assert!(mock::events().is_empty());
    }

    #[test]
    fn caller_argument_bits_are_replaced_by_present_arguments() {
        let none = OpenArgs::default();
        assert_eq!(
            none.native_options(Options::SERVER_NAME | Options::NO_START_SERVER),
            Options::NO_START_SERVER
        );
        assert_eq!(
            none.native_options(Options::LOAD_NAME | Options::LOAD_INIT | Options::SESSION_ID | Options::USE_EXACT_NAME),
            Options::USE_EXACT_NAME
        );

        let server = OpenArgs {
            server_name: Some("studio".to_string()),
            session_id: None,
        };
        assert_eq!(
            server.native_options(Options::SESSION_ID),
            Options::SERVER_NAME
        );

        let both = OpenArgs {
            server_name: Some("studio".to_string()),
            session_id: Some("42".to_string()),
        };
        assert_eq!(
            both.native_options(Options::NO_START_SERVER | Options::LOAD_INIT),
            Options::NO_START_SERVER | Options::SERVER_NAME | Options::SESSION_ID
        );
    }

    #[test]
    fn resolved_symbols_call_through() {
        let jack = Jack::new(MockLibrary::full().into_native());
        let client = client();

        assert_eq!(jack.generation(), Generation::Jack2);
        assert_eq!(jack.version_string().as_deref(), Some("1.9.22"));
        assert_eq!(jack.activate(client), 0);
        assert_eq!(jack.get_sample_rate(client), Some(48_000));
        assert_eq!(jack.get_buffer_size(client), Some(256));
        assert_eq!(mock::events(), vec!["activate"]);
        assert_eq!(
            jack.get_cycle_times(client),
            Some(CycleTimes {
                current_frames: 96_000,
                current_usecs: 2_000_000,
                next_usecs: 2_005_333,
                period_usecs: 5333.333,
            })
        );
    }

    #[test]
    fn interior_nul_is_never_passed() {
        let jack = Jack::new(MockLibrary::full().into_native());
        assert_eq!(jack.get_client_pid("bad\0name"), -1);
        assert_eq!(jack.connect(client(), "a\0", "b"), -1);
        assert!(mock::events().is_empty());
    }

    #[test]
    fn close_releases_client_callbacks() {
        let mut jack = Jack::new(MockLibrary::full().into_native());
        let client = client();

        assert_eq!(jack.set_process_callback(client, |_| 0), 0);
        assert_eq!(jack.set_xrun_callback(client, || 0), 0);
        jack.on_shutdown(client, || {});
        assert_eq!(jack.retained_callbacks(client), 3);
        assert!(jack.is_registered(client, CallbackCategory::Shutdown));

        assert_eq!(jack.client_close(client), 0);
        assert_eq!(jack.retained_callbacks(client), 0);
        assert_eq!(mock::with_state(|state| state.closed), 1);
    }

    #[test]
    fn unresolved_setter_reports_minus_one() {
        let mut jack = Jack::new(MockLibrary::full().without("jack_set_xrun_callback").into_native());
        let client = client();
        assert_eq!(jack.set_xrun_callback(client, || 0), -1);
        assert!(!jack.is_registered(client, CallbackCategory::Xrun));
    }
}
