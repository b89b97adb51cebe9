//! # inputgate-core
//!
//! Shared, OS-free building blocks for InputGate: key codes, typed input
//! events, the decoder that turns raw low-level hook payloads into those
//! events, and the consumer verdict pipeline.
//!
//! Nothing in this crate touches an OS API.  The `inputgate` crate layers the
//! hook lifecycle manager, the key remapper and the platform adapters on top.
//!
//! # Architecture overview
//!
//! InputGate sits between the operating system's raw input stream and every
//! application window.  For each keyboard or pointer event the OS hands to a
//! low-level hook, InputGate asks a list of *consumers* whether the event may
//! continue.  If any consumer vetoes, the event is swallowed.
//!
//! - **`keys`** – [`KeyCode`] (virtual-key codes with readable names) and
//!   [`MouseButton`].
//!
//! - **`event`** – [`DeviceClass`], [`KeyEvent`], [`PointerEvent`] and the
//!   [`DeviceEvent`] trait that ties an event type to its device class and
//!   decoder.
//!
//! - **`decode`** – The raw hook payload types ([`RawHookEvent`]) and the
//!   functions that recognise which raw messages are interceptable.
//!
//! - **`pipeline`** – [`Verdict`], [`ConsumerIdentity`] and the two-phase
//!   aggregator [`pipeline::run`] that turns many verdicts into one
//!   [`Decision`].

pub mod decode;
pub mod event;
pub mod keys;
pub mod pipeline;

pub use decode::{KeyboardPayload, PointerPayload, RawHookEvent, RawPayload};
pub use event::{DeviceClass, DeviceEvent, KeyEvent, KeyPhase, Point, PointerEvent, PointerEventKind};
pub use keys::{KeyCode, KeyParseError, MouseButton};
pub use pipeline::{ConsumerIdentity, ConsumerKind, Decision, RejectionHandler, Verdict};
