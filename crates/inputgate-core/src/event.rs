//! Typed input events produced by the low-level hooks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decode::{self, RawHookEvent};
use crate::keys::{KeyCode, MouseButton};

/// The class of device a hook intercepts.  One hook exists per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    Keyboard,
    Pointer,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Keyboard => f.write_str("keyboard"),
            DeviceClass::Pointer => f.write_str("pointer"),
        }
    }
}

/// Whether a key went down or came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPhase {
    Down,
    Up,
}

/// A decoded keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub phase: KeyPhase,
    /// Hardware scan code as reported by the hook.
    pub scan_code: u32,
    /// `true` when the OS flagged the event as synthesized.
    pub injected: bool,
    /// Milliseconds since system start.
    pub time_ms: u32,
}

impl KeyEvent {
    /// Builds a physical (non-injected) event with zeroed scan code and timestamp.
    pub fn new(key: KeyCode, phase: KeyPhase) -> Self {
        Self {
            key,
            phase,
            scan_code: 0,
            injected: false,
            time_ms: 0,
        }
    }

    pub fn down(key: KeyCode) -> Self {
        Self::new(key, KeyPhase::Down)
    }

    pub fn up(key: KeyCode) -> Self {
        Self::new(key, KeyPhase::Up)
    }
}

/// A screen position in virtual-desktop pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// What happened on the pointer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    Move,
    /// Vertical wheel; positive is away from the user.
    Wheel { delta: i16 },
    /// Horizontal wheel; positive is to the right.
    HorizontalWheel { delta: i16 },
}

/// A decoded pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub position: Point,
    pub injected: bool,
    pub time_ms: u32,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, position: Point) -> Self {
        Self {
            kind,
            position,
            injected: false,
            time_ms: 0,
        }
    }
}

/// An event type that belongs to exactly one [`DeviceClass`] and knows how to
/// decode itself from a raw hook invocation.
///
/// The hook lifecycle manager is generic over this trait, which is what lets
/// the keyboard and pointer hooks share one implementation.
pub trait DeviceEvent: fmt::Debug + Clone + Send + Sync + 'static {
    const DEVICE: DeviceClass;

    /// Returns `None` when the raw message is not an interceptable event for
    /// this device.
    fn decode(raw: &RawHookEvent) -> Option<Self>;
}

impl DeviceEvent for KeyEvent {
    const DEVICE: DeviceClass = DeviceClass::Keyboard;

    fn decode(raw: &RawHookEvent) -> Option<Self> {
        decode::decode_keyboard(raw)
    }
}

impl DeviceEvent for PointerEvent {
    const DEVICE: DeviceClass = DeviceClass::Pointer;

    fn decode(raw: &RawHookEvent) -> Option<Self> {
        decode::decode_pointer(raw)
    }
}
