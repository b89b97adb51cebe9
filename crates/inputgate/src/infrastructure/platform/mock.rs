//! In-memory platform for tests and non-Windows development.
//!
//! [`MockHookPlatform`] behaves like the OS hook chain: it stores the
//! installed callbacks, lets tests fire raw invocations through them and
//! records every invocation a hook passed down the chain.
//! [`LoopbackInjector`] and [`MockPointerControl`] feed synthesized input back
//! through that platform, just as `SendInput` re-enters the real hooks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use inputgate_core::decode::msg;
use inputgate_core::{DeviceClass, KeyCode, KeyPhase, MouseButton, Point, RawHookEvent};

use crate::application::{
    HookCallback, HookError, HookHandle, HookPlatform, InjectError, KeyInjector, PointerControl, PointerError,
};

/// Mock implementation of [`HookPlatform`].
#[derive(Default)]
pub struct MockHookPlatform {
    hooks: Mutex<HashMap<DeviceClass, (HookHandle, HookCallback)>>,
    installs: AtomicUsize,
    uninstalls: AtomicUsize,
    next_handle: AtomicUsize,
    refuse_install: AtomicBool,
    forwarded: Mutex<Vec<RawHookEvent>>,
}

impl MockHookPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent install fail (or succeed again).
    pub fn set_refuse_install(&self, refuse: bool) {
        self.refuse_install.store(refuse, Ordering::SeqCst);
    }

    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn uninstall_count(&self) -> usize {
        self.uninstalls.load(Ordering::SeqCst)
    }

    pub fn is_installed(&self, device: DeviceClass) -> bool {
        lock(&self.hooks).contains_key(&device)
    }

    /// Every invocation a hook passed to the next hook, in order.
    pub fn forwarded(&self) -> Vec<RawHookEvent> {
        lock(&self.forwarded).clone()
    }

    pub fn clear_forwarded(&self) {
        lock(&self.forwarded).clear();
    }

    /// Invokes the installed hook for `device`, as the OS would.
    ///
    /// Returns the hook's result, or `None` when no hook is installed and the
    /// event went straight through.
    pub fn fire(&self, device: DeviceClass, raw: &RawHookEvent) -> Option<isize> {
        let callback = lock(&self.hooks).get(&device).map(|(_, cb)| Arc::clone(cb));
        match callback {
            Some(callback) => Some(callback(raw)),
            None => {
                lock(&self.forwarded).push(*raw);
                None
            }
        }
    }

    /// Fires a physical key event; `true` if it reached the rest of the system.
    pub fn press(&self, key: KeyCode, phase: KeyPhase) -> bool {
        !self.swallowed(self.fire(DeviceClass::Keyboard, &RawHookEvent::key(key, phase)))
    }

    /// Fires a physical pointer event; `true` if it reached the rest of the system.
    pub fn pointer(&self, message: u32, position: Point, mouse_data: u32) -> bool {
        let raw = RawHookEvent::pointer(message, position, mouse_data);
        !self.swallowed(self.fire(DeviceClass::Pointer, &raw))
    }

    fn swallowed(&self, result: Option<isize>) -> bool {
        result == Some(crate::application::SWALLOW)
    }
}

impl HookPlatform for MockHookPlatform {
    fn install(&self, device: DeviceClass, callback: HookCallback) -> Result<HookHandle, HookError> {
        if self.refuse_install.load(Ordering::SeqCst) {
            return Err(HookError::InstallFailed {
                device,
                reason: "install refused by mock platform".to_string(),
            });
        }
        let handle = HookHandle::from_raw(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.hooks).insert(device, (handle, callback));
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn uninstall(&self, device: DeviceClass, handle: HookHandle) -> Result<(), HookError> {
        let mut hooks = lock(&self.hooks);
        match hooks.get(&device) {
            Some((installed, _)) if *installed == handle => {
                hooks.remove(&device);
                self.uninstalls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(HookError::UninstallFailed {
                device,
                reason: format!("unknown hook handle {}", handle.as_raw()),
            }),
        }
    }

    fn call_next(&self, _handle: Option<HookHandle>, raw: &RawHookEvent) -> isize {
        lock(&self.forwarded).push(*raw);
        0
    }
}

/// [`KeyInjector`] that records every injection and fires it back through a
/// [`MockHookPlatform`] as an injected event.
pub struct LoopbackInjector {
    platform: Arc<MockHookPlatform>,
    injected: Mutex<Vec<(KeyCode, KeyPhase)>>,
    fail: AtomicBool,
}

impl LoopbackInjector {
    pub fn new(platform: Arc<MockHookPlatform>) -> Self {
        Self {
            platform,
            injected: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent injection fail without reaching the platform.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn injected(&self) -> Vec<(KeyCode, KeyPhase)> {
        lock(&self.injected).clone()
    }
}

impl KeyInjector for LoopbackInjector {
    fn inject(&self, key: KeyCode, phase: KeyPhase) -> Result<(), InjectError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InjectError::Platform("injection disabled".to_string()));
        }
        lock(&self.injected).push((key, phase));
        self.platform
            .fire(DeviceClass::Keyboard, &RawHookEvent::key(key, phase).injected());
        Ok(())
    }
}

/// In-memory cursor.  Clicks are recorded and, when a platform is attached,
/// fired through its pointer hook as injected button events.
#[derive(Default)]
pub struct MockPointerControl {
    position: Mutex<Point>,
    clicks: Mutex<Vec<(MouseButton, Point)>>,
    platform: Option<Arc<MockHookPlatform>>,
}

impl MockPointerControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loopback(platform: Arc<MockHookPlatform>) -> Self {
        Self {
            platform: Some(platform),
            ..Self::default()
        }
    }

    pub fn clicks(&self) -> Vec<(MouseButton, Point)> {
        lock(&self.clicks).clone()
    }
}

impl PointerControl for MockPointerControl {
    fn position(&self) -> Result<Point, PointerError> {
        Ok(*lock(&self.position))
    }

    fn set_position(&self, point: Point) -> Result<(), PointerError> {
        *lock(&self.position) = point;
        Ok(())
    }

    fn click(&self, button: MouseButton) -> Result<(), PointerError> {
        let at = *lock(&self.position);
        lock(&self.clicks).push((button, at));

        if let Some(platform) = &self.platform {
            let (down, up, data) = button_messages(button);
            for message in [down, up] {
                platform.fire(DeviceClass::Pointer, &RawHookEvent::pointer(message, at, data).injected());
            }
        }
        Ok(())
    }
}

/// Down message, up message and `mouse_data` for a button.
fn button_messages(button: MouseButton) -> (u32, u32, u32) {
    match button {
        MouseButton::Left => (msg::WM_LBUTTONDOWN, msg::WM_LBUTTONUP, 0),
        MouseButton::Right => (msg::WM_RBUTTONDOWN, msg::WM_RBUTTONUP, 0),
        MouseButton::Middle => (msg::WM_MBUTTONDOWN, msg::WM_MBUTTONUP, 0),
        MouseButton::X1 => (msg::WM_XBUTTONDOWN, msg::WM_XBUTTONUP, 1 << 16),
        MouseButton::X2 => (msg::WM_XBUTTONDOWN, msg::WM_XBUTTONUP, 2 << 16),
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
