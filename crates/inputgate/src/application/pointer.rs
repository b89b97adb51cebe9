//! PointerInterceptor: the pointer hook plus cursor control.
//!
//! Interception works exactly as for the keyboard: consumers subscribe to the
//! pointer [`HookManager`] and veto events they want swallowed.  Cursor
//! queries and synthetic clicks are passed straight to a [`PointerControl`]
//! collaborator and do not involve the hook state machine.

use std::sync::Arc;

use inputgate_core::{MouseButton, Point, PointerEvent};
use thiserror::Error;
use tracing::debug;

use super::hook_manager::{Consumer, ConsumerId, HookError, PointerHook};

/// Error type for cursor queries and synthetic pointer input.
#[derive(Debug, Error)]
pub enum PointerError {
    #[error("pointer operation failed: {0}")]
    Platform(String),
}

/// Cursor position and click synthesis.
#[cfg_attr(test, mockall::automock)]
pub trait PointerControl: Send + Sync {
    /// Current cursor position in screen coordinates.
    fn position(&self) -> Result<Point, PointerError>;

    fn set_position(&self, point: Point) -> Result<(), PointerError>;

    /// Presses and releases `button` at the current cursor position.
    fn click(&self, button: MouseButton) -> Result<(), PointerError>;

    /// Moves the cursor to `point`, then clicks there.
    fn click_at(&self, button: MouseButton, point: Point) -> Result<(), PointerError> {
        self.set_position(point)?;
        self.click(button)
    }
}

/// Pointer hook access and cursor control in one place.
pub struct PointerInterceptor {
    hook: Arc<PointerHook>,
    control: Arc<dyn PointerControl>,
}

impl PointerInterceptor {
    pub fn new(hook: Arc<PointerHook>, control: Arc<dyn PointerControl>) -> Self {
        Self { hook, control }
    }

    pub fn hook(&self) -> &Arc<PointerHook> {
        &self.hook
    }

    /// # Errors
    ///
    /// Propagates the hook installation error; the consumer is not kept.
    pub fn subscribe(&self, consumer: Arc<dyn Consumer<PointerEvent>>) -> Result<ConsumerId, HookError> {
        self.hook.subscribe(consumer)
    }

    /// Registers a closure returning `true` to forward, `false` to veto.
    pub fn subscribe_fn<F>(&self, name: impl Into<String>, handler: F) -> Result<ConsumerId, HookError>
    where
        F: Fn(&PointerEvent) -> bool + Send + Sync + 'static,
    {
        self.hook.subscribe_fn(name, handler)
    }

    pub fn unsubscribe(&self, id: ConsumerId) {
        self.hook.unsubscribe(id);
    }

    pub fn position(&self) -> Result<Point, PointerError> {
        self.control.position()
    }

    pub fn set_position(&self, point: Point) -> Result<(), PointerError> {
        debug!(x = point.x, y = point.y, "moving cursor");
        self.control.set_position(point)
    }

    pub fn click(&self, button: MouseButton) -> Result<(), PointerError> {
        debug!(?button, "synthesizing click");
        self.control.click(button)
    }

    pub fn click_at(&self, button: MouseButton, point: Point) -> Result<(), PointerError> {
        debug!(?button, x = point.x, y = point.y, "synthesizing click at position");
        self.control.click_at(button, point)
    }

    pub fn dispose(&self) {
        self.hook.dispose();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
