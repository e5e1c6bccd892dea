//! Runtime-loaded bindings to the JACK audio connection kit client library.
//!
//! [`NativeLibrary`] loads `libjack` and resolves every exported function it
//! knows about, recording the ones a given installation lacks. [`Jack`]
//! wraps the resolved table with text encoding, string-array and metadata
//! decoding, and retains the trampolines of registered callbacks.

/// Calls a resolved native symbol through the facade, or evaluates to
/// `$unresolved` when the loaded library does not export it.
macro_rules! native_call {
    ($api:expr, $name:ident($($arg:expr),* $(,)?), $unresolved:expr) => {
        match $api.symbols().$name {
            // SAFETY: the pointer was resolved for this exact symbol with its
            // declared C signature; handle arguments are live per the
            // facade's documented preconditions.
            Some(function) => unsafe { function($($arg),*) },
            None => $unresolved,
        }
    };
}

pub mod callbacks;
pub mod client;
pub mod encoding;
pub mod flags;
pub mod library;
pub mod marshal;
pub mod metadata;
pub mod midi;
pub mod port;
pub mod session;
pub mod signature;
pub mod symbols;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock;

pub use callbacks::{Callback, CallbackCategory};
pub use client::{Api, ClientHandle, CycleTimes, Jack, OpenArgs};
pub use encoding::TextEncoding;
pub use flags::{Options, PortFlags, Status, TransportState};
pub use library::{LoadError, NativeLibrary, SymbolSource};
pub use marshal::{NativeStrings, ShortMessage, status_description};
pub use metadata::{PropertyRecord, PropertyValue};
pub use port::PortHandle;
pub use signature::{Generation, MarshalKind, Signature, SymbolEntry};
