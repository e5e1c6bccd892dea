//! Port registration, connections, latency and lookup.

use crate::client::{Api, ClientHandle};
use crate::encoding::TextEncoding;
use crate::flags::{LatencyMode, PortFlags};
use crate::marshal::{NativeStrings, collect_strings};
use crate::types::{JackLatencyRange, JackPort, NFrames, PortId, PortTypeId, Uuid};
use std::ffi::{CString, c_char, c_int, c_ulong, c_void};
use std::fmt;
use std::ptr::{self, NonNull};

/// Opaque `jack_port_t *`, owned by libjack.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle(NonNull<JackPort>);

// SAFETY: port handles are opaque addresses valid on any thread.
unsafe impl Send for PortHandle {}
// SAFETY: see above.
unsafe impl Sync for PortHandle {}

impl PortHandle {
    /// # Safety
    /// `ptr` must be null or a port returned by libjack for a client that
    /// is still open.
    pub unsafe fn from_raw(ptr: *mut JackPort) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut JackPort {
        self.0.as_ptr()
    }
}

impl fmt::Debug for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortHandle({:p})", self.0)
    }
}

impl Api {
    fn port(&self, ptr: *mut JackPort) -> Option<PortHandle> {
        // SAFETY: `ptr` was just returned by libjack.
        unsafe { PortHandle::from_raw(ptr) }
    }

    fn optional_text(&self, text: Option<&str>, encoding: TextEncoding) -> Option<Option<CString>> {
        match text {
            Some(text) => self.encode(text, encoding).map(Some),
            None => Some(None),
        }
    }

    pub fn port_register(
        &self,
        client: ClientHandle,
        name: &str,
        port_type: &str,
        flags: PortFlags,
        buffer_size: c_ulong,
    ) -> Option<PortHandle> {
        let name = self.encode(name, self.encoding())?;
        let port_type = self.encode(port_type, self.encoding())?;
        let port = native_call!(
            self,
            jack_port_register(
                client.as_ptr(),
                name.as_ptr(),
                port_type.as_ptr(),
                flags.bits() as c_ulong,
                buffer_size,
            ),
            return None
        );
        self.port(port)
    }

    pub fn port_unregister(&self, client: ClientHandle, port: PortHandle) -> c_int {
        native_call!(self, jack_port_unregister(client.as_ptr(), port.as_ptr()), -1)
    }

    /// `jack_port_get_buffer`
    pub fn port_get_buffer(&self, port: PortHandle, nframes: NFrames) -> Option<NonNull<c_void>> {
        NonNull::new(native_call!(
            self,
            jack_port_get_buffer(port.as_ptr(), nframes),
            return None
        ))
    }

    /// The audio samples of `port` for the current cycle.
    ///
    /// # Safety
    /// Call only from the process callback, for an audio port, with the
    /// cycle's frame count; the slice must not outlive the cycle.
    pub unsafe fn port_audio_buffer<'a>(&self, port: PortHandle, nframes: NFrames) -> Option<&'a mut [f32]> {
        let buffer = self.port_get_buffer(port, nframes)?;
        // SAFETY: audio port buffers hold `nframes` samples for this cycle.
        Some(unsafe { std::slice::from_raw_parts_mut(buffer.as_ptr().cast::<f32>(), nframes as usize) })
    }

    pub fn port_name(&self, port: PortHandle) -> Option<String> {
        let name = native_call!(self, jack_port_name(port.as_ptr()), ptr::null());
        self.read(name, self.encoding())
    }

    pub fn port_short_name(&self, port: PortHandle) -> Option<String> {
        let name = native_call!(self, jack_port_short_name(port.as_ptr()), ptr::null());
        self.read(name, self.encoding())
    }

    pub fn port_flags(&self, port: PortHandle) -> Option<PortFlags> {
        Some(PortFlags(native_call!(
            self,
            jack_port_flags(port.as_ptr()),
            return None
        )))
    }

    pub fn port_type(&self, port: PortHandle) -> Option<String> {
        let name = native_call!(self, jack_port_type(port.as_ptr()), ptr::null());
        self.read(name, self.encoding())
    }

    /// Only bound on JACK2 servers.
    pub fn port_type_id(&self, port: PortHandle) -> Option<PortTypeId> {
        Some(native_call!(self, jack_port_type_id(port.as_ptr()), return None))
    }

    pub fn port_is_mine(&self, client: ClientHandle, port: PortHandle) -> c_int {
        native_call!(self, jack_port_is_mine(client.as_ptr(), port.as_ptr()), -1)
    }

    pub fn port_connected(&self, port: PortHandle) -> c_int {
        native_call!(self, jack_port_connected(port.as_ptr()), -1)
    }

    pub fn port_connected_to(&self, port: PortHandle, port_name: &str) -> c_int {
        let Some(port_name) = self.encode(port_name, self.encoding()) else {
            return -1;
        };
        native_call!(
            self,
            jack_port_connected_to(port.as_ptr(), port_name.as_ptr()),
            -1
        )
    }

    pub fn port_get_connections(&self, port: PortHandle) -> Vec<String> {
        self.port_get_connections_encoded(port, self.encoding())
    }

    pub fn port_get_connections_encoded(&self, port: PortHandle, encoding: TextEncoding) -> Vec<String> {
        let array = native_call!(
            self,
            jack_port_get_connections(port.as_ptr()),
            return Vec::new()
        );
        // SAFETY: libjack returns a null-terminated array owned by the caller.
        unsafe { collect_strings(array, self.symbols().jack_free, encoding) }
    }

    pub fn port_get_all_connections(&self, client: ClientHandle, port: PortHandle) -> Vec<String> {
        self.port_get_all_connections_encoded(client, port, self.encoding())
    }

    pub fn port_get_all_connections_encoded(
        &self,
        client: ClientHandle,
        port: PortHandle,
        encoding: TextEncoding,
    ) -> Vec<String> {
        let array = native_call!(
            self,
            jack_port_get_all_connections(client.as_ptr(), port.as_ptr()),
            return Vec::new()
        );
        // SAFETY: libjack returns a null-terminated array owned by the caller.
        unsafe { collect_strings(array, self.symbols().jack_free, encoding) }
    }

    pub fn port_tie(&self, src: PortHandle, dst: PortHandle) -> c_int {
        native_call!(self, jack_port_tie(src.as_ptr(), dst.as_ptr()), -1)
    }

    pub fn port_untie(&self, port: PortHandle) -> c_int {
        native_call!(self, jack_port_untie(port.as_ptr()), -1)
    }

    pub fn port_set_name(&self, port: PortHandle, name: &str) -> c_int {
        let Some(name) = self.encode(name, self.encoding()) else {
            return -1;
        };
        native_call!(self, jack_port_set_name(port.as_ptr(), name.as_ptr()), -1)
    }

    pub fn port_rename(&self, client: ClientHandle, port: PortHandle, name: &str) -> c_int {
        let Some(name) = self.encode(name, self.encoding()) else {
            return -1;
        };
        native_call!(
            self,
            jack_port_rename(client.as_ptr(), port.as_ptr(), name.as_ptr()),
            -1
        )
    }

    pub fn port_set_alias(&self, port: PortHandle, alias: &str) -> c_int {
        let Some(alias) = self.encode(alias, self.encoding()) else {
            return -1;
        };
        native_call!(self, jack_port_set_alias(port.as_ptr(), alias.as_ptr()), -1)
    }

    pub fn port_unset_alias(&self, port: PortHandle, alias: &str) -> c_int {
        let Some(alias) = self.encode(alias, self.encoding()) else {
            return -1;
        };
        native_call!(self, jack_port_unset_alias(port.as_ptr(), alias.as_ptr()), -1)
    }

    /// Up to two aliases of `port`. Each buffer is sized from
    /// `jack_port_name_size`.
    pub fn port_get_aliases(&self, port: PortHandle) -> Option<Vec<String>> {
        let size = usize::try_from(self.port_name_size()).ok().filter(|size| *size > 0)?;
        let mut first = vec![0u8; size];
        let mut second = vec![0u8; size];
        let buffers: [*mut c_char; 2] = [first.as_mut_ptr().cast(), second.as_mut_ptr().cast()];
        let count = native_call!(
            self,
            jack_port_get_aliases(port.as_ptr(), buffers.as_ptr()),
            return None
        );
        let count = usize::try_from(count).ok()?.min(2);
        Some(
            [first, second]
                .iter()
                .take(count)
                .map(|buffer| {
                    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
                    self.encoding().decode_lossy(&buffer[..end]).into_owned()
                })
                .collect(),
        )
    }

    pub fn port_request_monitor(&self, port: PortHandle, enabled: bool) -> c_int {
        native_call!(
            self,
            jack_port_request_monitor(port.as_ptr(), c_int::from(enabled)),
            -1
        )
    }

    pub fn port_request_monitor_by_name(&self, client: ClientHandle, port_name: &str, enabled: bool) -> c_int {
        let Some(port_name) = self.encode(port_name, self.encoding()) else {
            return -1;
        };
        native_call!(
            self,
            jack_port_request_monitor_by_name(client.as_ptr(), port_name.as_ptr(), c_int::from(enabled)),
            -1
        )
    }

    pub fn port_ensure_monitor(&self, port: PortHandle, enabled: bool) -> c_int {
        native_call!(
            self,
            jack_port_ensure_monitor(port.as_ptr(), c_int::from(enabled)),
            -1
        )
    }

    pub fn port_monitoring_input(&self, port: PortHandle) -> c_int {
        native_call!(self, jack_port_monitoring_input(port.as_ptr()), -1)
    }

    pub fn connect(&self, client: ClientHandle, source: &str, destination: &str) -> c_int {
        let (Some(source), Some(destination)) = (
            self.encode(source, self.encoding()),
            self.encode(destination, self.encoding()),
        ) else {
            return -1;
        };
        native_call!(
            self,
            jack_connect(client.as_ptr(), source.as_ptr(), destination.as_ptr()),
            -1
        )
    }

    pub fn disconnect(&self, client: ClientHandle, source: &str, destination: &str) -> c_int {
        let (Some(source), Some(destination)) = (
            self.encode(source, self.encoding()),
            self.encode(destination, self.encoding()),
        ) else {
            return -1;
        };
        native_call!(
            self,
            jack_disconnect(client.as_ptr(), source.as_ptr(), destination.as_ptr()),
            -1
        )
    }

    pub fn port_disconnect(&self, client: ClientHandle, port: PortHandle) -> c_int {
        native_call!(self, jack_port_disconnect(client.as_ptr(), port.as_ptr()), -1)
    }

    pub fn port_name_size(&self) -> c_int {
        native_call!(self, jack_port_name_size(), -1)
    }

    pub fn port_type_size(&self) -> c_int {
        native_call!(self, jack_port_type_size(), -1)
    }

    pub fn port_type_get_buffer_size(&self, client: ClientHandle, port_type: &str) -> Option<usize> {
        let port_type = self.encode(port_type, self.encoding())?;
        Some(native_call!(
            self,
            jack_port_type_get_buffer_size(client.as_ptr(), port_type.as_ptr()),
            return None
        ))
    }

    pub fn port_uuid(&self, port: PortHandle) -> Option<Uuid> {
        Some(native_call!(self, jack_port_uuid(port.as_ptr()), return None))
    }

    pub fn port_set_latency(&self, port: PortHandle, nframes: NFrames) {
        native_call!(self, jack_port_set_latency(port.as_ptr(), nframes), ())
    }

    pub fn port_get_latency_range(&self, port: PortHandle, mode: LatencyMode) -> Option<JackLatencyRange> {
        let mut range = JackLatencyRange::default();
        native_call!(
            self,
            jack_port_get_latency_range(port.as_ptr(), mode.raw(), &mut range),
            return None
        );
        Some(range)
    }

    pub fn port_set_latency_range(&self, port: PortHandle, mode: LatencyMode, range: JackLatencyRange) {
        let mut range = range;
        native_call!(
            self,
            jack_port_set_latency_range(port.as_ptr(), mode.raw(), &mut range),
            ()
        )
    }

    pub fn recompute_total_latencies(&self, client: ClientHandle) -> c_int {
        native_call!(self, jack_recompute_total_latencies(client.as_ptr()), -1)
    }

    pub fn port_get_latency(&self, port: PortHandle) -> Option<NFrames> {
        Some(native_call!(self, jack_port_get_latency(port.as_ptr()), return None))
    }

    pub fn port_get_total_latency(&self, client: ClientHandle, port: PortHandle) -> Option<NFrames> {
        Some(native_call!(
            self,
            jack_port_get_total_latency(client.as_ptr(), port.as_ptr()),
            return None
        ))
    }

    pub fn recompute_total_latency(&self, client: ClientHandle, port: PortHandle) -> c_int {
        native_call!(
            self,
            jack_recompute_total_latency(client.as_ptr(), port.as_ptr()),
            -1
        )
    }

    /// `jack_get_ports`, materialized.
    pub fn get_ports(
        &self,
        client: ClientHandle,
        name_pattern: Option<&str>,
        type_pattern: Option<&str>,
        flags: PortFlags,
    ) -> Vec<String> {
        self.get_ports_encoded(client, name_pattern, type_pattern, flags, self.encoding())
    }

    pub fn get_ports_encoded(
        &self,
        client: ClientHandle,
        name_pattern: Option<&str>,
        type_pattern: Option<&str>,
        flags: PortFlags,
        encoding: TextEncoding,
    ) -> Vec<String> {
        self.get_ports_iter(client, name_pattern, type_pattern, flags, encoding)
            .collect()
    }

    /// `jack_get_ports` decoded lazily; the native array is released once
    /// the iterator is exhausted or dropped.
    pub fn get_ports_iter(
        &self,
        client: ClientHandle,
        name_pattern: Option<&str>,
        type_pattern: Option<&str>,
        flags: PortFlags,
        encoding: TextEncoding,
    ) -> NativeStrings {
        let (Some(name_pattern), Some(type_pattern)) = (
            self.optional_text(name_pattern, encoding),
            self.optional_text(type_pattern, encoding),
        ) else {
            return NativeStrings::empty();
        };
        let as_ptr = |text: &Option<CString>| text.as_ref().map_or(ptr::null(), |text| text.as_ptr());
        let array = native_call!(
            self,
            jack_get_ports(
                client.as_ptr(),
                as_ptr(&name_pattern),
                as_ptr(&type_pattern),
                flags.bits() as c_ulong,
            ),
            return NativeStrings::empty()
        );
        // SAFETY: libjack returns a null-terminated array owned by the caller.
        unsafe { NativeStrings::from_raw(array, self.symbols().jack_free, encoding) }
    }

    pub fn port_by_name(&self, client: ClientHandle, port_name: &str) -> Option<PortHandle> {
        let port_name = self.encode(port_name, self.encoding())?;
        let port = native_call!(
            self,
            jack_port_by_name(client.as_ptr(), port_name.as_ptr()),
            return None
        );
        self.port(port)
    }

    pub fn port_by_id(&self, client: ClientHandle, port_id: PortId) -> Option<PortHandle> {
        let port = native_call!(self, jack_port_by_id(client.as_ptr(), port_id), return None);
        self.port(port)
    }
}
