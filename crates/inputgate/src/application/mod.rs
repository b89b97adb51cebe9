//! Application layer: hook lifecycle, dispatch, remapping.
//!
//! # What lives here? (for beginners)
//!
//! Everything in this layer is platform independent.  It talks to the OS only
//! through three traits, each implemented once for Windows and once as an
//! in-memory double in `infrastructure::platform`:
//!
//! - [`HookPlatform`] installs and removes the low-level hooks,
//! - [`KeyInjector`] synthesizes key presses,
//! - [`PointerControl`] reads and moves the cursor and synthesizes clicks.
//!
//! # Sub-modules
//!
//! - **`hook_manager`** – One [`HookManager`] per device class.  Owns the hook
//!   state machine and runs every intercepted event through the registered
//!   consumers.  This runs on the OS hook thread for every keystroke and
//!   mouse movement, so it has to be fast.
//!
//! - **`remap`** – The [`KeyRemapper`] consumer that turns presses of one key
//!   into presses of another.
//!
//! - **`pointer`** – [`PointerInterceptor`], pointer hook access plus cursor
//!   control.
//!
//! - **`service`** – [`InputHooks`], which wires the above together.

pub mod hook_manager;
pub mod pointer;
pub mod remap;
pub mod service;

pub use hook_manager::{
    Consumer, ConsumerId, FnConsumer, HookCallback, HookError, HookHandle, HookManager, HookPlatform,
    KeyboardHook, PointerHook, SWALLOW,
};
pub use pointer::{PointerControl, PointerError, PointerInterceptor};
pub use remap::{InjectError, KeyInjector, KeyRemapper};
pub use service::{ConsumerHandle, InputHooks};
