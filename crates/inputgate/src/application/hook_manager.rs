//! HookManager: owns the low-level hook for one device class and fans every
//! intercepted event out to the registered consumers.
//!
//! # Lifecycle
//!
//! The hook is an explicit two-state machine guarded by one mutex:
//!
//! ```text
//!             install() / first subscribe()
//!  Uninstalled ─────────────────────────────▶ Installed(handle)
//!       ▲                                          │
//!       └──────────────────────────────────────────┘
//!        release() when every consumer's may_release() agrees,
//!        or dispose()
//! ```
//!
//! Consumers never touch the hook handle.  They only influence the state
//! machine by being registered and by their [`Consumer::may_release`] answer.
//!
//! # Dispatch
//!
//! The platform invokes [`HookManager::handle_raw`] on its hook thread for
//! every raw event.  The manager decodes it, asks every consumer for a
//! [`Verdict`] in registration order, aggregates them with
//! [`pipeline::run`] and either forwards the event down the hook chain or
//! returns [`SWALLOW`].
//!
//! The consumer list is snapshotted before any consumer runs, so a consumer
//! may synthesize input that re-enters the hook on the same thread.
//!
//! # Timing
//!
//! The OS silently removes a low-level hook whose callback takes too long.
//! Consumers must return quickly; dispatches slower than the configured
//! threshold are logged at `warn` level.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::{Duration, Instant};

use inputgate_core::{
    pipeline, ConsumerIdentity, ConsumerKind, Decision, DeviceClass, DeviceEvent, KeyEvent,
    PointerEvent, RawHookEvent, Verdict,
};
use thiserror::Error;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Value a hook procedure returns to stop an event from propagating.
pub const SWALLOW: isize = 1;

/// Default threshold above which a single dispatch is logged as slow.
pub const DEFAULT_SLOW_DISPATCH: Duration = Duration::from_millis(50);

/// Error type for hook lifecycle operations.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to install {device} hook: {reason}")]
    InstallFailed { device: DeviceClass, reason: String },
    #[error("failed to uninstall {device} hook: {reason}")]
    UninstallFailed { device: DeviceClass, reason: String },
    #[error("{0} hook has been disposed")]
    Disposed(DeviceClass),
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Opaque handle of an installed OS hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(usize);

impl HookHandle {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Procedure the platform calls for every raw invocation of an installed hook.
pub type HookCallback = Arc<dyn Fn(&RawHookEvent) -> isize + Send + Sync>;

/// Platform hook registration primitives.
///
/// The Windows implementation wraps `SetWindowsHookExW` and friends; tests
/// use an in-memory double that fires events through the stored callback.
pub trait HookPlatform: Send + Sync {
    /// Installs a hook for `device` that invokes `callback` for every event.
    fn install(&self, device: DeviceClass, callback: HookCallback) -> Result<HookHandle, HookError>;

    /// Removes a previously installed hook.
    fn uninstall(&self, device: DeviceClass, handle: HookHandle) -> Result<(), HookError>;

    /// Passes the invocation to the next hook in the chain.
    fn call_next(&self, handle: Option<HookHandle>, raw: &RawHookEvent) -> isize;
}

/// A participant in the dispatch pipeline for events of type `E`.
pub trait Consumer<E>: Send + Sync {
    fn identity(&self) -> &ConsumerIdentity;

    /// Returns this consumer's verdict.  Must not block.
    fn on_event(&self, event: &E) -> Verdict;

    /// Whether the hook may be released as far as this consumer is concerned.
    ///
    /// Called with the hook state locked; must not call back into the manager.
    fn may_release(&self) -> bool {
        false
    }
}

/// Identifies one registration with a [`HookManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Adapts a closure into a [`ConsumerKind::Listener`] consumer.
///
/// The closure returns `true` to let the event through.  A listener wants
/// events for as long as it is registered, so it never agrees to release.
pub struct FnConsumer<F> {
    identity: ConsumerIdentity,
    handler: F,
}

impl<F> FnConsumer<F> {
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            identity: ConsumerIdentity::new(name, ConsumerKind::Listener),
            handler,
        }
    }
}

impl<E, F> Consumer<E> for FnConsumer<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn identity(&self) -> &ConsumerIdentity {
        &self.identity
    }

    fn on_event(&self, event: &E) -> Verdict {
        Verdict::from_bool((self.handler)(event), self.identity.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookState {
    Uninstalled,
    Installed(HookHandle),
}

struct Registration<E> {
    id: ConsumerId,
    consumer: Arc<dyn Consumer<E>>,
}

/// Owner of the hook for the device class of `E`.
pub struct HookManager<E: DeviceEvent> {
    platform: Arc<dyn HookPlatform>,
    state: Mutex<HookState>,
    consumers: RwLock<Vec<Registration<E>>>,
    disposed: AtomicBool,
    slow_dispatch: Duration,
    this: Weak<Self>,
}

/// Keyboard hook manager.
pub type KeyboardHook = HookManager<KeyEvent>;
/// Pointer hook manager.
pub type PointerHook = HookManager<PointerEvent>;

impl<E: DeviceEvent> HookManager<E> {
    /// Creates an uninstalled manager.
    pub fn new(platform: Arc<dyn HookPlatform>) -> Arc<Self> {
        Self::with_slow_dispatch_threshold(platform, DEFAULT_SLOW_DISPATCH)
    }

    pub fn with_slow_dispatch_threshold(platform: Arc<dyn HookPlatform>, slow_dispatch: Duration) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            platform,
            state: Mutex::new(HookState::Uninstalled),
            consumers: RwLock::new(Vec::new()),
            disposed: AtomicBool::new(false),
            slow_dispatch,
            this: this.clone(),
        })
    }

    pub fn device(&self) -> DeviceClass {
        E::DEVICE
    }

    pub fn is_installed(&self) -> bool {
        matches!(*lock(&self.state), HookState::Installed(_))
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn consumer_count(&self) -> usize {
        read(&self.consumers).len()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Installs the OS hook if it is not installed yet.
    ///
    /// # Errors
    ///
    /// Returns the platform's error if it refuses the hook, or
    /// [`HookError::Disposed`] after [`dispose`](Self::dispose).
    pub fn install(&self) -> Result<(), HookError> {
        let mut state = lock(&self.state);
        if self.is_disposed() {
            return Err(HookError::Disposed(E::DEVICE));
        }
        if let HookState::Installed(_) = *state {
            return Ok(());
        }

        let handle = self.platform.install(E::DEVICE, self.callback())?;
        debug!(device = %E::DEVICE, handle = handle.as_raw(), "hook installed");
        *state = HookState::Installed(handle);
        Ok(())
    }

    /// Uninstalls the OS hook if every registered consumer agrees.
    pub fn release(&self) {
        let mut state = lock(&self.state);
        self.release_locked(&mut state, false);
    }

    /// Drops every registration and uninstalls the hook unconditionally.
    ///
    /// Safe to call repeatedly and from several threads; the hook is
    /// uninstalled at most once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = {
            let mut consumers = write(&self.consumers);
            let count = consumers.len();
            consumers.clear();
            count
        };
        let mut state = lock(&self.state);
        self.release_locked(&mut state, true);
        debug!(device = %E::DEVICE, dropped, "hook manager disposed");
    }

    /// Called from the hook thread, which must never wait on a lock held by a
    /// thread that is itself waiting on the hook thread.
    fn try_release(&self) {
        if let Ok(mut state) = self.state.try_lock() {
            self.release_locked(&mut state, false);
        }
    }

    fn release_locked(&self, state: &mut HookState, force: bool) {
        let HookState::Installed(handle) = *state else {
            return;
        };

        if !force {
            let snapshot = self.snapshot();
            if !snapshot.iter().all(|consumer| consumer.may_release()) {
                trace!(device = %E::DEVICE, "release declined by a consumer");
                return;
            }
        }

        match self.platform.uninstall(E::DEVICE, handle) {
            Ok(()) => debug!(device = %E::DEVICE, handle = handle.as_raw(), "hook released"),
            // The OS may already have dropped the hook (e.g. after a callback
            // timeout); the handle is unusable either way.
            Err(e) => warn!(device = %E::DEVICE, error = %e, "hook uninstall failed"),
        }
        *state = HookState::Uninstalled;
    }

    fn callback(&self) -> HookCallback {
        let manager = self.this.clone();
        let platform = Arc::downgrade(&self.platform);
        Arc::new(move |raw: &RawHookEvent| match manager.upgrade() {
            Some(manager) => manager.handle_raw(raw),
            None => platform.upgrade().map_or(0, |p| p.call_next(None, raw)),
        })
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Appends `consumer` to the dispatch order and installs the hook.
    ///
    /// # Errors
    ///
    /// If installation fails the registration is rolled back and the error is
    /// returned to the caller.
    pub fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Result<ConsumerId, HookError> {
        if self.is_disposed() {
            return Err(HookError::Disposed(E::DEVICE));
        }

        let id = ConsumerId::new();
        let identity = consumer.identity().clone();
        write(&self.consumers).push(Registration { id, consumer });

        if let Err(e) = self.install() {
            write(&self.consumers).retain(|r| r.id != id);
            return Err(e);
        }

        debug!(device = %E::DEVICE, consumer = %identity, %id, "consumer subscribed");
        Ok(id)
    }

    /// Registers a closure returning `true` to forward, `false` to veto.
    pub fn subscribe_fn<F>(&self, name: impl Into<String>, handler: F) -> Result<ConsumerId, HookError>
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnConsumer::new(name, handler)))
    }

    /// Removes a registration and asks for the hook to be released.
    ///
    /// Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ConsumerId) {
        let removed = {
            let mut consumers = write(&self.consumers);
            let before = consumers.len();
            consumers.retain(|r| r.id != id);
            before != consumers.len()
        };
        if !removed {
            return;
        }
        debug!(device = %E::DEVICE, %id, "consumer unsubscribed");
        self.release();
    }

    fn snapshot(&self) -> Vec<Arc<dyn Consumer<E>>> {
        read(&self.consumers)
            .iter()
            .map(|r| Arc::clone(&r.consumer))
            .collect()
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    /// Entry point for the platform callback.
    pub fn handle_raw(&self, raw: &RawHookEvent) -> isize {
        if raw.code < 0 {
            return self.platform.call_next(self.current_handle(), raw);
        }
        let Some(event) = E::decode(raw) else {
            return self.platform.call_next(self.current_handle(), raw);
        };

        match self.dispatch(&event) {
            Decision::Forward => self.platform.call_next(self.current_handle(), raw),
            Decision::Swallow => SWALLOW,
        }
    }

    /// Runs one decoded event through every consumer and returns the decision.
    pub fn dispatch(&self, event: &E) -> Decision {
        let consumers = self.snapshot();
        if consumers.is_empty() {
            self.try_release();
            return Decision::Forward;
        }

        let started = Instant::now();
        let verdicts = consumers.iter().map(|c| c.on_event(event)).collect();
        let decision = pipeline::run(verdicts);

        let elapsed = started.elapsed();
        if elapsed > self.slow_dispatch {
            warn!(
                device = %E::DEVICE,
                elapsed_ms = elapsed.as_millis() as u64,
                consumers = consumers.len(),
                "slow dispatch; the OS may remove the hook"
            );
        }
        trace!(device = %E::DEVICE, ?event, ?decision, "event dispatched");
        decision
    }

    /// The OS ignores the handle argument of `CallNextHookEx`, so contention on
    /// the state lock yields `None` instead of blocking the hook thread.
    fn current_handle(&self) -> Option<HookHandle> {
        match self.state.try_lock().map(|s| *s) {
            Ok(HookState::Installed(handle)) => Some(handle),
            _ => None,
        }
    }
}

impl<E: DeviceEvent> Drop for HookManager<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

// ── Test doubles ──────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Records lifecycle calls and fires events through the stored callback.
    #[derive(Default)]
    pub(crate) struct RecordingPlatform {
        pub installs: Mutex<u32>,
        pub uninstalls: Mutex<u32>,
        pub next_calls: Mutex<u32>,
        pub refuse_install: bool,
        callbacks: Mutex<HashMap<DeviceClass, HookCallback>>,
    }

    impl RecordingPlatform {
        pub fn refusing() -> Self {
            Self {
                refuse_install: true,
                ..Self::default()
            }
        }

        pub fn installs(&self) -> u32 {
            *self.installs.lock().unwrap()
        }

        pub fn uninstalls(&self) -> u32 {
            *self.uninstalls.lock().unwrap()
        }

        pub fn is_installed(&self, device: DeviceClass) -> bool {
            self.callbacks.lock().unwrap().contains_key(&device)
        }

        /// Simulates the OS invoking the hook; `None` if no hook is installed.
        pub fn fire(&self, device: DeviceClass, raw: &RawHookEvent) -> Option<isize> {
            let callback = self.callbacks.lock().unwrap().get(&device).cloned()?;
            Some(callback(raw))
        }
    }

    impl HookPlatform for RecordingPlatform {
        fn install(&self, device: DeviceClass, callback: HookCallback) -> Result<HookHandle, HookError> {
            if self.refuse_install {
                return Err(HookError::InstallFailed {
                    device,
                    reason: "refused by test platform".into(),
                });
            }
            let mut installs = self.installs.lock().unwrap();
            *installs += 1;
            self.callbacks.lock().unwrap().insert(device, callback);
            Ok(HookHandle::from_raw(*installs as usize))
        }

        fn uninstall(&self, device: DeviceClass, _handle: HookHandle) -> Result<(), HookError> {
            *self.uninstalls.lock().unwrap() += 1;
            self.callbacks.lock().unwrap().remove(&device);
            Ok(())
        }

        fn call_next(&self, _handle: Option<HookHandle>, _raw: &RawHookEvent) -> isize {
            *self.next_calls.lock().unwrap() += 1;
            0
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
