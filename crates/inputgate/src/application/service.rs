//! InputHooks: the service object owning both hooks and the remapper.
//!
//! Callers construct one `InputHooks` from the platform collaborators and
//! share it however they like.  There is no global instance; two services
//! built over two mock platforms are fully independent, which is what the
//! integration tests rely on.

use std::sync::Arc;
use std::time::Duration;

use inputgate_core::{DeviceClass, KeyEvent, PointerEvent};
use tracing::debug;

use super::hook_manager::{
    ConsumerId, HookError, HookManager, HookPlatform, KeyboardHook, PointerHook, DEFAULT_SLOW_DISPATCH,
};
use super::pointer::{PointerControl, PointerInterceptor};
use super::remap::{KeyInjector, KeyRemapper};

/// A subscription made through [`InputHooks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerHandle {
    pub device: DeviceClass,
    pub id: ConsumerId,
}

/// Keyboard hook, pointer interceptor and key remapper over one platform.
pub struct InputHooks {
    keyboard: Arc<KeyboardHook>,
    pointer: PointerInterceptor,
    remapper: KeyRemapper,
}

impl InputHooks {
    pub fn new(
        platform: Arc<dyn HookPlatform>,
        injector: Arc<dyn KeyInjector>,
        pointer: Arc<dyn PointerControl>,
    ) -> Self {
        Self::with_slow_dispatch_threshold(platform, injector, pointer, DEFAULT_SLOW_DISPATCH)
    }

    pub fn with_slow_dispatch_threshold(
        platform: Arc<dyn HookPlatform>,
        injector: Arc<dyn KeyInjector>,
        pointer: Arc<dyn PointerControl>,
        slow_dispatch: Duration,
    ) -> Self {
        let keyboard = HookManager::with_slow_dispatch_threshold(Arc::clone(&platform), slow_dispatch);
        let pointer_hook = HookManager::with_slow_dispatch_threshold(platform, slow_dispatch);
        Self {
            remapper: KeyRemapper::new(Arc::clone(&keyboard), injector),
            pointer: PointerInterceptor::new(pointer_hook, pointer),
            keyboard,
        }
    }

    pub fn keyboard(&self) -> &Arc<KeyboardHook> {
        &self.keyboard
    }

    pub fn pointer(&self) -> &PointerInterceptor {
        &self.pointer
    }

    pub fn pointer_hook(&self) -> &Arc<PointerHook> {
        self.pointer.hook()
    }

    pub fn remapper(&self) -> &KeyRemapper {
        &self.remapper
    }

    /// Registers a keyboard listener returning `true` to forward, `false` to veto.
    ///
    /// # Errors
    ///
    /// Propagates the keyboard hook installation error.
    pub fn subscribe_keyboard<F>(&self, name: impl Into<String>, handler: F) -> Result<ConsumerHandle, HookError>
    where
        F: Fn(&KeyEvent) -> bool + Send + Sync + 'static,
    {
        let id = self.keyboard.subscribe_fn(name, handler)?;
        Ok(ConsumerHandle {
            device: DeviceClass::Keyboard,
            id,
        })
    }

    /// Registers a pointer listener returning `true` to forward, `false` to veto.
    ///
    /// # Errors
    ///
    /// Propagates the pointer hook installation error.
    pub fn subscribe_pointer<F>(&self, name: impl Into<String>, handler: F) -> Result<ConsumerHandle, HookError>
    where
        F: Fn(&PointerEvent) -> bool + Send + Sync + 'static,
    {
        let id = self.pointer.subscribe_fn(name, handler)?;
        Ok(ConsumerHandle {
            device: DeviceClass::Pointer,
            id,
        })
    }

    pub fn unsubscribe(&self, handle: ConsumerHandle) {
        match handle.device {
            DeviceClass::Keyboard => self.keyboard.unsubscribe(handle.id),
            DeviceClass::Pointer => self.pointer.unsubscribe(handle.id),
        }
    }

    /// Clears every binding and subscription and uninstalls both hooks.
    /// Idempotent.
    pub fn dispose(&self) {
        self.remapper.dispose();
        self.keyboard.dispose();
        self.pointer.dispose();
        debug!("input hooks disposed");
    }
}

impl Drop for InputHooks {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use inputgate_core::KeyCode;

    use super::super::hook_manager::testing::RecordingPlatform;
    use super::super::pointer::MockPointerControl;
    use super::super::remap::MockKeyInjector;
    use super::*;

    fn service(platform: &Arc<RecordingPlatform>) -> InputHooks {
        InputHooks::new(
            Arc::clone(platform) as Arc<dyn HookPlatform>,
            Arc::new(MockKeyInjector::new()),
            Arc::new(MockPointerControl::new()),
        )
    }

    #[test]
    fn test_subscriptions_route_to_their_device() {
        // Arrange
        let platform = Arc::new(RecordingPlatform::default());
        let hooks = service(&platform);

        // Act
        let kb = hooks.subscribe_keyboard("kb", |_| true).unwrap();
        let pt = hooks.subscribe_pointer("pt", |_| true).unwrap();

        // Assert
        assert_eq!(kb.device, DeviceClass::Keyboard);
        assert_eq!(pt.device, DeviceClass::Pointer);
        assert!(platform.is_installed(DeviceClass::Keyboard));
        assert!(platform.is_installed(DeviceClass::Pointer));
        assert_eq!(platform.installs(), 2);
    }

    #[test]
    fn test_unsubscribe_releases_only_that_device() {
        let platform = Arc::new(RecordingPlatform::default());
        let hooks = service(&platform);
        let kb = hooks.subscribe_keyboard("kb", |_| true).unwrap();
        hooks.subscribe_pointer("pt", |_| true).unwrap();

        hooks.unsubscribe(kb);

        assert!(!hooks.keyboard().is_installed());
        assert!(hooks.pointer_hook().is_installed());
    }

    #[test]
    fn test_dispose_is_idempotent_and_clears_bindings() {
        // Arrange
        let platform = Arc::new(RecordingPlatform::default());
        let hooks = service(&platform);
        hooks.remapper().bind(KeyCode::A, KeyCode::B).unwrap();
        hooks.subscribe_pointer("pt", |_| true).unwrap();

        // Act
        hooks.dispose();
        hooks.dispose();

        // Assert
        assert!(hooks.remapper().is_empty());
        assert!(!platform.is_installed(DeviceClass::Keyboard));
        assert!(!platform.is_installed(DeviceClass::Pointer));
        assert_eq!(platform.uninstalls(), 2);
    }

    #[test]
    fn test_drop_uninstalls_both_hooks() {
        let platform = Arc::new(RecordingPlatform::default());
        let hooks = service(&platform);
        hooks.subscribe_keyboard("kb", |_| true).unwrap();
        hooks.subscribe_pointer("pt", |_| true).unwrap();

        drop(hooks);

        assert!(!platform.is_installed(DeviceClass::Keyboard));
        assert!(!platform.is_installed(DeviceClass::Pointer));
    }
}
