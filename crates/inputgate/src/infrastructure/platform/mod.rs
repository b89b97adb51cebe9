//! Platform adapters for the application-layer collaborator traits.
//!
//! On Windows, [`native`] returns the `SetWindowsHookExW` / `SendInput`
//! adapters.  Everywhere else interception is unavailable and [`native`]
//! fails with [`HookError::UnsupportedPlatform`]; the [`mock`] adapters work
//! on every OS and are what the test suite runs against.

use std::sync::Arc;

use crate::application::{HookError, HookPlatform, KeyInjector, PointerControl};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// The three collaborators an [`InputHooks`](crate::application::InputHooks)
/// service is built from.
pub struct PlatformServices {
    pub hooks: Arc<dyn HookPlatform>,
    pub injector: Arc<dyn KeyInjector>,
    pub pointer: Arc<dyn PointerControl>,
}

/// Builds the adapters for the running OS.
///
/// # Errors
///
/// Returns [`HookError::UnsupportedPlatform`] on operating systems without
/// low-level hooks, or if the hook thread cannot be started.
#[cfg(target_os = "windows")]
pub fn native() -> Result<PlatformServices, HookError> {
    Ok(PlatformServices {
        hooks: Arc::new(windows::WindowsHookPlatform::new()?),
        injector: Arc::new(windows::WindowsKeyInjector::new()),
        pointer: Arc::new(windows::WindowsPointerControl::new()),
    })
}

/// Builds the adapters for the running OS.
///
/// # Errors
///
/// Always returns [`HookError::UnsupportedPlatform`] on this OS.
#[cfg(not(target_os = "windows"))]
pub fn native() -> Result<PlatformServices, HookError> {
    Err(HookError::UnsupportedPlatform(std::env::consts::OS.to_string()))
}

/// In-memory adapters wired into a loop: injected keys and synthesized clicks
/// come back through the returned platform's hooks.
pub fn loopback() -> (Arc<mock::MockHookPlatform>, PlatformServices) {
    let platform = Arc::new(mock::MockHookPlatform::new());
    let services = PlatformServices {
        hooks: Arc::clone(&platform) as Arc<dyn HookPlatform>,
        injector: Arc::new(mock::LoopbackInjector::new(Arc::clone(&platform))),
        pointer: Arc::new(mock::MockPointerControl::with_loopback(Arc::clone(&platform))),
    };
    (platform, services)
}
