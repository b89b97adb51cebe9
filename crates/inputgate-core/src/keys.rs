//! Key and mouse-button identifiers.
//!
//! [`KeyCode`] wraps a Windows virtual-key (VK) code.  VK codes are the values
//! the low-level keyboard hook reports and the values `SendInput` accepts, so
//! using them directly means no translation on the hot path.
//!
//! # Key names
//!
//! Configuration files and the command line refer to keys by name.  Parsing
//! is case-insensitive and accepts:
//!
//! | Input            | Meaning                        |
//! |------------------|--------------------------------|
//! | `A` … `Z`        | letter keys                    |
//! | `0` … `9`        | top-row digit keys             |
//! | `F1` … `F24`     | function keys                  |
//! | `Numpad0` …      | numeric keypad digits          |
//! | `CapsLock`, …    | named keys (see `NAMED_KEYS`)  |
//! | `0x41`           | any raw VK code in hex         |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a key name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("empty key name")]
    Empty,
    #[error("unknown key name: {0:?}")]
    UnknownName(String),
    #[error("invalid hex key code: {0:?}")]
    InvalidHex(String),
}

/// A Windows virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyCode(pub u8);

impl KeyCode {
    pub const BACKSPACE: KeyCode = KeyCode(0x08);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const ENTER: KeyCode = KeyCode(0x0D);
    pub const SHIFT: KeyCode = KeyCode(0x10);
    pub const CONTROL: KeyCode = KeyCode(0x11);
    pub const ALT: KeyCode = KeyCode(0x12);
    pub const PAUSE: KeyCode = KeyCode(0x13);
    pub const CAPS_LOCK: KeyCode = KeyCode(0x14);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const PAGE_UP: KeyCode = KeyCode(0x21);
    pub const PAGE_DOWN: KeyCode = KeyCode(0x22);
    pub const END: KeyCode = KeyCode(0x23);
    pub const HOME: KeyCode = KeyCode(0x24);
    pub const LEFT: KeyCode = KeyCode(0x25);
    pub const UP: KeyCode = KeyCode(0x26);
    pub const RIGHT: KeyCode = KeyCode(0x27);
    pub const DOWN: KeyCode = KeyCode(0x28);
    pub const PRINT_SCREEN: KeyCode = KeyCode(0x2C);
    pub const INSERT: KeyCode = KeyCode(0x2D);
    pub const DELETE: KeyCode = KeyCode(0x2E);

    pub const DIGIT_0: KeyCode = KeyCode(0x30);
    pub const DIGIT_1: KeyCode = KeyCode(0x31);
    pub const DIGIT_9: KeyCode = KeyCode(0x39);

    pub const A: KeyCode = KeyCode(0x41);
    pub const B: KeyCode = KeyCode(0x42);
    pub const C: KeyCode = KeyCode(0x43);
    pub const D: KeyCode = KeyCode(0x44);
    pub const E: KeyCode = KeyCode(0x45);
    pub const Q: KeyCode = KeyCode(0x51);
    pub const W: KeyCode = KeyCode(0x57);
    pub const X: KeyCode = KeyCode(0x58);
    pub const Y: KeyCode = KeyCode(0x59);
    pub const Z: KeyCode = KeyCode(0x5A);

    pub const LEFT_WIN: KeyCode = KeyCode(0x5B);
    pub const RIGHT_WIN: KeyCode = KeyCode(0x5C);
    pub const APPS: KeyCode = KeyCode(0x5D);
    pub const NUMPAD_0: KeyCode = KeyCode(0x60);
    pub const F1: KeyCode = KeyCode(0x70);
    pub const F12: KeyCode = KeyCode(0x7B);
    pub const NUM_LOCK: KeyCode = KeyCode(0x90);
    pub const SCROLL_LOCK: KeyCode = KeyCode(0x91);
    pub const LEFT_SHIFT: KeyCode = KeyCode(0xA0);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(0xA1);
    pub const LEFT_CONTROL: KeyCode = KeyCode(0xA2);
    pub const RIGHT_CONTROL: KeyCode = KeyCode(0xA3);
    pub const LEFT_ALT: KeyCode = KeyCode(0xA4);
    pub const RIGHT_ALT: KeyCode = KeyCode(0xA5);

    /// Returns the raw virtual-key code.
    pub fn vk(self) -> u8 {
        self.0
    }

    /// Converts a raw hook value, rejecting values outside the VK range.
    pub fn from_raw(vk: u32) -> Option<Self> {
        u8::try_from(vk).ok().filter(|&v| v != 0).map(KeyCode)
    }
}

/// Canonical names first; aliases follow so that `Display` picks the first match.
const NAMED_KEYS: &[(&str, u8)] = &[
    ("Backspace", 0x08),
    ("Tab", 0x09),
    ("Enter", 0x0D),
    ("Shift", 0x10),
    ("Control", 0x11),
    ("Alt", 0x12),
    ("Pause", 0x13),
    ("CapsLock", 0x14),
    ("Escape", 0x1B),
    ("Space", 0x20),
    ("PageUp", 0x21),
    ("PageDown", 0x22),
    ("End", 0x23),
    ("Home", 0x24),
    ("Left", 0x25),
    ("Up", 0x26),
    ("Right", 0x27),
    ("Down", 0x28),
    ("PrintScreen", 0x2C),
    ("Insert", 0x2D),
    ("Delete", 0x2E),
    ("LeftWin", 0x5B),
    ("RightWin", 0x5C),
    ("Apps", 0x5D),
    ("NumLock", 0x90),
    ("ScrollLock", 0x91),
    ("LeftShift", 0xA0),
    ("RightShift", 0xA1),
    ("LeftControl", 0xA2),
    ("RightControl", 0xA3),
    ("LeftAlt", 0xA4),
    ("RightAlt", 0xA5),
    // aliases
    ("Return", 0x0D),
    ("Ctrl", 0x11),
    ("Esc", 0x1B),
    ("Del", 0x2E),
    ("Ins", 0x2D),
    ("LeftCtrl", 0xA2),
    ("RightCtrl", 0xA3),
];

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vk = self.0;
        match vk {
            0x30..=0x39 | 0x41..=0x5A => write!(f, "{}", vk as char),
            0x60..=0x69 => write!(f, "Numpad{}", vk - 0x60),
            0x70..=0x87 => write!(f, "F{}", vk - 0x70 + 1),
            _ => match NAMED_KEYS.iter().find(|(_, code)| *code == vk) {
                Some((name, _)) => f.write_str(name),
                None => write!(f, "0x{vk:02X}"),
            },
        }
    }
}

impl FromStr for KeyCode {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err(KeyParseError::Empty);
        }

        if let Some(hex) = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
            return u8::from_str_radix(hex, 16)
                .ok()
                .filter(|&v| v != 0)
                .map(KeyCode)
                .ok_or_else(|| KeyParseError::InvalidHex(name.to_string()));
        }

        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphanumeric() {
                return Ok(KeyCode(c.to_ascii_uppercase() as u8));
            }
        }

        if let Some(n) = strip_prefix_ignore_case(name, "Numpad").and_then(|d| d.parse::<u8>().ok()) {
            if n <= 9 {
                return Ok(KeyCode(0x60 + n));
            }
        }

        if let Some(n) = strip_prefix_ignore_case(name, "F").and_then(|d| d.parse::<u8>().ok()) {
            if (1..=24).contains(&n) {
                return Ok(KeyCode(0x70 + n - 1));
            }
        }

        NAMED_KEYS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|&(_, vk)| KeyCode(vk))
            .ok_or_else(|| KeyParseError::UnknownName(name.to_string()))
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() > prefix.len() && s.is_char_boundary(prefix.len()) && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

impl TryFrom<String> for KeyCode {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyCode> for String {
    fn from(key: KeyCode) -> Self {
        key.to_string()
    }
}

/// Pointer buttons the low-level mouse hook reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
