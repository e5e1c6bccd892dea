//! Transport control and queries.

use crate::client::{Api, ClientHandle};
use crate::flags::{PositionBits, TransportState};
use crate::types::{JackPosition, NFrames, Time};
use std::ffi::c_int;

impl JackPosition {
    pub fn valid_bits(&self) -> PositionBits {
        PositionBits(self.valid)
    }

    pub fn has_bbt(&self) -> bool {
        self.valid_bits().contains(PositionBits::BBT)
    }

    /// Position in seconds at the reported frame rate.
    pub fn seconds(&self) -> Option<f64> {
        (self.frame_rate != 0).then(|| f64::from(self.frame) / f64::from(self.frame_rate))
    }
}

impl Api {
    pub fn release_timebase(&self, client: ClientHandle) -> c_int {
        native_call!(self, jack_release_timebase(client.as_ptr()), -1)
    }

    pub fn set_sync_timeout(&self, client: ClientHandle, timeout: Time) -> c_int {
        native_call!(self, jack_set_sync_timeout(client.as_ptr(), timeout), -1)
    }

    pub fn transport_locate(&self, client: ClientHandle, frame: NFrames) -> c_int {
        native_call!(self, jack_transport_locate(client.as_ptr(), frame), -1)
    }

    /// `jack_transport_query`; an unknown state value is reported as
    /// stopped.
    pub fn transport_query(&self, client: ClientHandle) -> Option<(TransportState, JackPosition)> {
        let mut position = JackPosition::default();
        let state = native_call!(
            self,
            jack_transport_query(client.as_ptr(), &mut position),
            return None
        );
        let state = TransportState::from_raw(state).unwrap_or(TransportState::Stopped);
        Some((state, position))
    }

    /// The transport state alone; passes a null position to libjack.
    pub fn transport_state(&self, client: ClientHandle) -> Option<TransportState> {
        let state = native_call!(
            self,
            jack_transport_query(client.as_ptr(), std::ptr::null_mut()),
            return None
        );
        Some(TransportState::from_raw(state).unwrap_or(TransportState::Stopped))
    }

    pub fn get_current_transport_frame(&self, client: ClientHandle) -> Option<NFrames> {
        Some(native_call!(
            self,
            jack_get_current_transport_frame(client.as_ptr()),
            return None
        ))
    }

    pub fn transport_reposition(&self, client: ClientHandle, position: &JackPosition) -> c_int {
        native_call!(self, jack_transport_reposition(client.as_ptr(), position), -1)
    }

    pub fn transport_start(&self, client: ClientHandle) {
        native_call!(self, jack_transport_start(client.as_ptr()), ())
    }

    pub fn transport_stop(&self, client: ClientHandle) {
        native_call!(self, jack_transport_stop(client.as_ptr()), ())
    }
}
