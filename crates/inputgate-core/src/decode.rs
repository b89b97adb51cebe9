//! Raw low-level hook payloads and their decoding into typed events.
//!
//! A low-level hook is invoked with three values: a hook code, a message
//! identifier and a pointer to a device-specific struct.  The platform adapter
//! copies that struct into a [`RawPayload`] before handing the invocation to
//! the hook manager, so everything from here on is safe, testable Rust.
//!
//! # Which events are interceptable?
//!
//! Only the messages listed in [`msg`] decode into events.  Anything else
//! (and any invocation with a negative hook code) must be passed straight to
//! the next hook in the chain without being shown to consumers.
//!
//! Message values match the Win32 `WM_*` constants so the Windows adapter can
//! pass `wParam` through unchanged.

use crate::event::{KeyEvent, KeyPhase, Point, PointerEvent, PointerEventKind};
use crate::keys::{KeyCode, MouseButton};

/// Message identifiers delivered with low-level hook invocations.
pub mod msg {
    pub const WM_KEYDOWN: u32 = 0x0100;
    pub const WM_KEYUP: u32 = 0x0101;
    pub const WM_SYSKEYDOWN: u32 = 0x0104;
    pub const WM_SYSKEYUP: u32 = 0x0105;

    pub const WM_MOUSEMOVE: u32 = 0x0200;
    pub const WM_LBUTTONDOWN: u32 = 0x0201;
    pub const WM_LBUTTONUP: u32 = 0x0202;
    pub const WM_RBUTTONDOWN: u32 = 0x0204;
    pub const WM_RBUTTONUP: u32 = 0x0205;
    pub const WM_MBUTTONDOWN: u32 = 0x0207;
    pub const WM_MBUTTONUP: u32 = 0x0208;
    pub const WM_MOUSEWHEEL: u32 = 0x020A;
    pub const WM_XBUTTONDOWN: u32 = 0x020B;
    pub const WM_XBUTTONUP: u32 = 0x020C;
    pub const WM_MOUSEHWHEEL: u32 = 0x020E;
}

/// `KBDLLHOOKSTRUCT.flags` bit set on synthesized keyboard input.
pub const LLKHF_INJECTED: u32 = 0x10;
/// `MSLLHOOKSTRUCT.flags` bit set on synthesized pointer input.
pub const LLMHF_INJECTED: u32 = 0x01;

const XBUTTON1: u16 = 0x0001;
const XBUTTON2: u16 = 0x0002;

/// Copy of the keyboard hook struct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardPayload {
    pub vk_code: u32,
    pub scan_code: u32,
    pub flags: u32,
    pub time: u32,
}

/// Copy of the mouse hook struct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerPayload {
    pub x: i32,
    pub y: i32,
    /// High word carries the wheel delta or the X button index.
    pub mouse_data: u32,
    pub flags: u32,
    pub time: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPayload {
    Keyboard(KeyboardPayload),
    Pointer(PointerPayload),
}

/// One invocation of a low-level hook procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHookEvent {
    /// Hook code.  Negative values must be passed on untouched.
    pub code: i32,
    /// Message identifier (`wParam`).
    pub message: u32,
    pub payload: RawPayload,
}

impl RawHookEvent {
    /// Builds an actionable keyboard invocation for `key`.
    pub fn key(key: KeyCode, phase: KeyPhase) -> Self {
        let message = match phase {
            KeyPhase::Down => msg::WM_KEYDOWN,
            KeyPhase::Up => msg::WM_KEYUP,
        };
        Self {
            code: 0,
            message,
            payload: RawPayload::Keyboard(KeyboardPayload {
                vk_code: u32::from(key.vk()),
                ..KeyboardPayload::default()
            }),
        }
    }

    /// Builds an actionable pointer invocation.
    pub fn pointer(message: u32, position: Point, mouse_data: u32) -> Self {
        Self {
            code: 0,
            message,
            payload: RawPayload::Pointer(PointerPayload {
                x: position.x,
                y: position.y,
                mouse_data,
                ..PointerPayload::default()
            }),
        }
    }

    /// Marks the invocation as synthesized, as the OS does for `SendInput`.
    pub fn injected(mut self) -> Self {
        match &mut self.payload {
            RawPayload::Keyboard(p) => p.flags |= LLKHF_INJECTED,
            RawPayload::Pointer(p) => p.flags |= LLMHF_INJECTED,
        }
        self
    }
}

/// Decodes a keyboard hook invocation.
///
/// Returns `None` for negative hook codes, pointer payloads, unrecognised
/// messages and VK codes outside the one-byte range.
pub fn decode_keyboard(raw: &RawHookEvent) -> Option<KeyEvent> {
    if raw.code < 0 {
        return None;
    }
    let RawPayload::Keyboard(payload) = raw.payload else {
        return None;
    };

    let phase = match raw.message {
        msg::WM_KEYDOWN | msg::WM_SYSKEYDOWN => KeyPhase::Down,
        msg::WM_KEYUP | msg::WM_SYSKEYUP => KeyPhase::Up,
        _ => return None,
    };

    Some(KeyEvent {
        key: KeyCode::from_raw(payload.vk_code)?,
        phase,
        scan_code: payload.scan_code,
        injected: payload.flags & LLKHF_INJECTED != 0,
        time_ms: payload.time,
    })
}

/// Decodes a pointer hook invocation.
pub fn decode_pointer(raw: &RawHookEvent) -> Option<PointerEvent> {
    if raw.code < 0 {
        return None;
    }
    let RawPayload::Pointer(payload) = raw.payload else {
        return None;
    };

    let high_word = (payload.mouse_data >> 16) as u16;
    let kind = match raw.message {
        msg::WM_MOUSEMOVE => PointerEventKind::Move,
        msg::WM_LBUTTONDOWN => PointerEventKind::ButtonDown(MouseButton::Left),
        msg::WM_LBUTTONUP => PointerEventKind::ButtonUp(MouseButton::Left),
        msg::WM_RBUTTONDOWN => PointerEventKind::ButtonDown(MouseButton::Right),
        msg::WM_RBUTTONUP => PointerEventKind::ButtonUp(MouseButton::Right),
        msg::WM_MBUTTONDOWN => PointerEventKind::ButtonDown(MouseButton::Middle),
        msg::WM_MBUTTONUP => PointerEventKind::ButtonUp(MouseButton::Middle),
        msg::WM_XBUTTONDOWN => PointerEventKind::ButtonDown(x_button(high_word)?),
        msg::WM_XBUTTONUP => PointerEventKind::ButtonUp(x_button(high_word)?),
        msg::WM_MOUSEWHEEL => PointerEventKind::Wheel {
            delta: high_word as i16,
        },
        msg::WM_MOUSEHWHEEL => PointerEventKind::HorizontalWheel {
            delta: high_word as i16,
        },
        _ => return None,
    };

    Some(PointerEvent {
        kind,
        position: Point::new(payload.x, payload.y),
        injected: payload.flags & LLMHF_INJECTED != 0,
        time_ms: payload.time,
    })
}

fn x_button(index: u16) -> Option<MouseButton> {
    match index {
        XBUTTON1 => Some(MouseButton::X1),
        XBUTTON2 => Some(MouseButton::X2),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_keyboard_down_and_up() {
        let down = decode_keyboard(&RawHookEvent::key(KeyCode::A, KeyPhase::Down)).unwrap();
        let up = decode_keyboard(&RawHookEvent::key(KeyCode::A, KeyPhase::Up)).unwrap();

        assert_eq!(down.key, KeyCode::A);
        assert_eq!(down.phase, KeyPhase::Down);
        assert_eq!(up.phase, KeyPhase::Up);
        assert!(!down.injected);
    }

    #[test]
    fn test_decode_keyboard_sys_messages_map_to_phases() {
        let mut raw = RawHookEvent::key(KeyCode::F1, KeyPhase::Down);
        raw.message = msg::WM_SYSKEYDOWN;
        assert_eq!(decode_keyboard(&raw).unwrap().phase, KeyPhase::Down);

        raw.message = msg::WM_SYSKEYUP;
        assert_eq!(decode_keyboard(&raw).unwrap().phase, KeyPhase::Up);
    }

    #[test]
    fn test_decode_keyboard_rejects_negative_code() {
        let mut raw = RawHookEvent::key(KeyCode::A, KeyPhase::Down);
        raw.code = -1;
        assert_eq!(decode_keyboard(&raw), None);
    }

    #[test]
    fn test_decode_keyboard_rejects_unknown_message_and_pointer_payload() {
        let mut raw = RawHookEvent::key(KeyCode::A, KeyPhase::Down);
        raw.message = 0x0102; // WM_CHAR never reaches a low-level hook
        assert_eq!(decode_keyboard(&raw), None);

        let pointer = RawHookEvent::pointer(msg::WM_KEYDOWN, Point::new(0, 0), 0);
        assert_eq!(decode_keyboard(&pointer), None);
    }

    #[test]
    fn test_decode_keyboard_reports_injected_flag() {
        let raw = RawHookEvent::key(KeyCode::B, KeyPhase::Down).injected();
        assert!(decode_keyboard(&raw).unwrap().injected);
    }

    #[test]
    fn test_decode_pointer_buttons_and_move() {
        let at = Point::new(10, 20);
        let left = decode_pointer(&RawHookEvent::pointer(msg::WM_LBUTTONDOWN, at, 0)).unwrap();
        let right_up = decode_pointer(&RawHookEvent::pointer(msg::WM_RBUTTONUP, at, 0)).unwrap();
        let moved = decode_pointer(&RawHookEvent::pointer(msg::WM_MOUSEMOVE, at, 0)).unwrap();

        assert_eq!(left.kind, PointerEventKind::ButtonDown(MouseButton::Left));
        assert_eq!(left.position, at);
        assert_eq!(right_up.kind, PointerEventKind::ButtonUp(MouseButton::Right));
        assert_eq!(moved.kind, PointerEventKind::Move);
    }

    #[test]
    fn test_decode_pointer_x_buttons_use_high_word() {
        let at = Point::default();
        let x1 = decode_pointer(&RawHookEvent::pointer(msg::WM_XBUTTONDOWN, at, 0x0001_0000)).unwrap();
        let x2 = decode_pointer(&RawHookEvent::pointer(msg::WM_XBUTTONUP, at, 0x0002_0000)).unwrap();

        assert_eq!(x1.kind, PointerEventKind::ButtonDown(MouseButton::X1));
        assert_eq!(x2.kind, PointerEventKind::ButtonUp(MouseButton::X2));
        assert_eq!(decode_pointer(&RawHookEvent::pointer(msg::WM_XBUTTONDOWN, at, 0x0003_0000)), None);
    }

    #[test]
    fn test_decode_pointer_wheel_delta_is_signed() {
        let at = Point::default();
        let towards_user = decode_pointer(&RawHookEvent::pointer(msg::WM_MOUSEWHEEL, at, 0xFF88_0000)).unwrap();
        let right = decode_pointer(&RawHookEvent::pointer(msg::WM_MOUSEHWHEEL, at, 0x0078_0000)).unwrap();

        assert_eq!(towards_user.kind, PointerEventKind::Wheel { delta: -120 });
        assert_eq!(right.kind, PointerEventKind::HorizontalWheel { delta: 120 });
    }
}
