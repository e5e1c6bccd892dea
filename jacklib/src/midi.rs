//! MIDI port buffer access. Every call here is real-time safe and meant for
//! the process callback; buffers come from [`Api::port_get_buffer`] and are
//! only valid for the current cycle.

use crate::client::Api;
use crate::marshal::ShortMessage;
use crate::types::{JackMidiEvent, MidiData, NFrames};
use std::ffi::{c_int, c_void};
use std::ptr::NonNull;

/// A borrowed view of one event in a MIDI input buffer.
#[derive(Clone, Copy, Debug)]
pub struct MidiEvent<'a> {
    pub time: NFrames,
    pub bytes: &'a [u8],
}

impl Api {
    /// # Safety
    /// `buffer` must be a MIDI port buffer of the current cycle.
    pub unsafe fn midi_get_event_count(&self, buffer: NonNull<c_void>) -> Option<NFrames> {
        Some(native_call!(
            self,
            jack_midi_get_event_count(buffer.as_ptr()),
            return None
        ))
    }

    /// `jack_midi_event_get`; `None` when unresolved or when libjack
    /// reports no event at `index`.
    ///
    /// # Safety
    /// `buffer` must be a MIDI port buffer of the current cycle; the event
    /// bytes must not be used after the cycle ends.
    pub unsafe fn midi_event_get<'a>(&self, buffer: NonNull<c_void>, index: u32) -> Option<MidiEvent<'a>> {
        let mut event = JackMidiEvent::default();
        let status = native_call!(
            self,
            jack_midi_event_get(&mut event, buffer.as_ptr(), index),
            return None
        );
        if status != 0 {
            return None;
        }
        let bytes = if event.buffer.is_null() || event.size == 0 {
            &[][..]
        } else {
            // SAFETY: libjack reports `size` readable bytes at `buffer`.
            unsafe { std::slice::from_raw_parts(event.buffer.cast::<u8>().cast_const(), event.size) }
        };
        Some(MidiEvent {
            time: event.time,
            bytes,
        })
    }

    /// Like [`Api::midi_event_get`], copying messages of up to four bytes
    /// out of the buffer. Longer events (sysex) decode as empty.
    ///
    /// # Safety
    /// `buffer` must be a MIDI port buffer of the current cycle.
    pub unsafe fn midi_event_get_short(&self, buffer: NonNull<c_void>, index: u32) -> Option<(NFrames, ShortMessage)> {
        let mut event = JackMidiEvent::default();
        let status = native_call!(
            self,
            jack_midi_event_get(&mut event, buffer.as_ptr(), index),
            return None
        );
        if status != 0 {
            return None;
        }
        // SAFETY: libjack reports `size` readable bytes at `buffer`.
        let message = unsafe { ShortMessage::from_raw(event.buffer.cast_const(), event.size) };
        Some((event.time, message))
    }

    /// # Safety
    /// `buffer` must be a MIDI output port buffer of the current cycle.
    pub unsafe fn midi_clear_buffer(&self, buffer: NonNull<c_void>) {
        native_call!(self, jack_midi_clear_buffer(buffer.as_ptr()), ())
    }

    /// # Safety
    /// `buffer` must be a MIDI port buffer of the current cycle.
    pub unsafe fn midi_max_event_size(&self, buffer: NonNull<c_void>) -> Option<usize> {
        Some(native_call!(
            self,
            jack_midi_max_event_size(buffer.as_ptr()),
            return None
        ))
    }

    /// # Safety
    /// `buffer` must be a MIDI output port buffer of the current cycle.
    pub unsafe fn midi_event_reserve(
        &self,
        buffer: NonNull<c_void>,
        time: NFrames,
        size: usize,
    ) -> Option<NonNull<MidiData>> {
        NonNull::new(native_call!(
            self,
            jack_midi_event_reserve(buffer.as_ptr(), time, size),
            return None
        ))
    }

    /// # Safety
    /// `buffer` must be a MIDI output port buffer of the current cycle.
    pub unsafe fn midi_event_write(&self, buffer: NonNull<c_void>, time: NFrames, data: &[u8]) -> c_int {
        native_call!(
            self,
            jack_midi_event_write(buffer.as_ptr(), time, data.as_ptr().cast::<MidiData>(), data.len()),
            -1
        )
    }

    /// # Safety
    /// `buffer` must be a MIDI port buffer of the current cycle.
    pub unsafe fn midi_get_lost_event_count(&self, buffer: NonNull<c_void>) -> Option<u32> {
        Some(native_call!(
            self,
            jack_midi_get_lost_event_count(buffer.as_ptr()),
            return None
        ))
    }
}
