//! Bit flags and enumerations from `jack/types.h`, `jack/transport.h`,
//! `jack/session.h` and `jack/metadata.h`.

use serde::Serialize;
use std::ffi::c_int;
use std::fmt;

macro_rules! bit_flags {
    ($(#[$meta:meta])* $name:ident($repr:ty) { $($flag:ident = $value:expr,)* }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl $name {
            $(pub const $flag: Self = Self($value);)*

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            const NAMED: &'static [(&'static str, $repr)] = &[$((stringify!($flag), $value),)*];
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<&str> = Self::NAMED
                    .iter()
                    .filter(|(_, bit)| *bit != 0 && self.0 & *bit == *bit)
                    .map(|(name, _)| *name)
                    .collect();
                write!(f, "{}({:#x}: {})", stringify!($name), self.0, names.join(" | "))
            }
        }
    };
}

bit_flags! {
    /// `jack_options_t`
    Options(c_int) {
        NULL = 0x00,
        NO_START_SERVER = 0x01,
        USE_EXACT_NAME = 0x02,
        SERVER_NAME = 0x04,
        LOAD_NAME = 0x08,
        LOAD_INIT = 0x10,
        SESSION_ID = 0x20,
    }
}

impl Options {
    pub const OPEN_OPTIONS: Self = Self(0x20 | 0x04 | 0x01 | 0x02);
    pub const LOAD_OPTIONS: Self = Self(0x10 | 0x08 | 0x01 | 0x02);
}

bit_flags! {
    /// `jack_status_t`
    Status(c_int) {
        FAILURE = 0x01,
        INVALID_OPTION = 0x02,
        NAME_NOT_UNIQUE = 0x04,
        SERVER_STARTED = 0x08,
        SERVER_FAILED = 0x10,
        SERVER_ERROR = 0x20,
        NO_SUCH_CLIENT = 0x40,
        LOAD_FAILURE = 0x80,
        INIT_FAILURE = 0x100,
        SHM_FAILURE = 0x200,
        VERSION_ERROR = 0x400,
        BACKEND_ERROR = 0x800,
        CLIENT_ZOMBIE = 0x1000,
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::marshal::status_description(self.0))
    }
}

bit_flags! {
    /// `JackPortFlags`
    PortFlags(c_int) {
        IS_INPUT = 0x01,
        IS_OUTPUT = 0x02,
        IS_PHYSICAL = 0x04,
        CAN_MONITOR = 0x08,
        IS_TERMINAL = 0x10,
        IS_CONTROL_VOLTAGE = 0x100,
    }
}

bit_flags! {
    /// `jack_position_bits_t`
    PositionBits(c_int) {
        BBT = 0x10,
        TIMECODE = 0x20,
        BBT_FRAME_OFFSET = 0x40,
        AUDIO_VIDEO_RATIO = 0x80,
        VIDEO_FRAME_OFFSET = 0x100,
    }
}

impl PositionBits {
    pub const MASK: Self = Self(0x10 | 0x20 | 0x40 | 0x80 | 0x100);
}

bit_flags! {
    /// `jack_session_flags_t`
    SessionFlags(c_int) {
        SAVE_ERROR = 0x01,
        NEED_TERMINAL = 0x02,
    }
}

/// `jack_transport_state_t`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TransportState {
    Stopped,
    Rolling,
    Looping,
    Starting,
    NetStarting,
}

impl TransportState {
    pub fn from_raw(raw: c_int) -> Option<Self> {
        Some(match raw {
            0 => TransportState::Stopped,
            1 => TransportState::Rolling,
            2 => TransportState::Looping,
            3 => TransportState::Starting,
            4 => TransportState::NetStarting,
            _ => return None,
        })
    }

    pub fn raw(self) -> c_int {
        match self {
            TransportState::Stopped => 0,
            TransportState::Rolling => 1,
            TransportState::Looping => 2,
            TransportState::Starting => 3,
            TransportState::NetStarting => 4,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Stopped => "stopped",
            TransportState::Rolling => "rolling",
            TransportState::Looping => "looping",
            TransportState::Starting => "starting",
            TransportState::NetStarting => "net-starting",
        };
        f.write_str(name)
    }
}

/// `jack_session_event_type_t`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SessionEventType {
    Save,
    SaveAndQuit,
    SaveTemplate,
}

impl SessionEventType {
    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            1 => Some(SessionEventType::Save),
            2 => Some(SessionEventType::SaveAndQuit),
            3 => Some(SessionEventType::SaveTemplate),
            _ => None,
        }
    }

    pub fn raw(self) -> c_int {
        match self {
            SessionEventType::Save => 1,
            SessionEventType::SaveAndQuit => 2,
            SessionEventType::SaveTemplate => 3,
        }
    }
}

/// `jack_property_change_t`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyChange {
    Created,
    Changed,
    Deleted,
}

impl PropertyChange {
    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0 => Some(PropertyChange::Created),
            1 => Some(PropertyChange::Changed),
            2 => Some(PropertyChange::Deleted),
            _ => None,
        }
    }
}

/// `jack_latency_callback_mode_t`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LatencyMode {
    Capture,
    Playback,
}

impl LatencyMode {
    pub fn from_raw(raw: c_int) -> Self {
        if raw == 1 {
            LatencyMode::Playback
        } else {
            LatencyMode::Capture
        }
    }

    pub fn raw(self) -> c_int {
        match self {
            LatencyMode::Capture => 0,
            LatencyMode::Playback => 1,
        }
    }
}

/// Well-known metadata keys from `jack/metadata.h`.
pub mod keys {
    pub const CONNECTED: &str = "http://jackaudio.org/metadata/connected";
    pub const EVENT_TYPES: &str = "http://jackaudio.org/metadata/event-types";
    pub const HARDWARE: &str = "http://jackaudio.org/metadata/hardware";
    pub const ICON_LARGE: &str = "http://jackaudio.org/metadata/icon-large";
    pub const ICON_NAME: &str = "http://jackaudio.org/metadata/icon-name";
    pub const ICON_SMALL: &str = "http://jackaudio.org/metadata/icon-small";
    pub const ORDER: &str = "http://jackaudio.org/metadata/order";
    pub const PORT_GROUP: &str = "http://jackaudio.org/metadata/port-group";
    pub const PRETTY_NAME: &str = "http://jackaudio.org/metadata/pretty-name";
    pub const SIGNAL_TYPE: &str = "http://jackaudio.org/metadata/signal-type";
}
