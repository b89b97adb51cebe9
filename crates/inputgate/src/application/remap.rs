//! KeyRemapper: substitutes presses of bound source keys with presses of
//! their target keys.
//!
//! The remapper is an ordinary pipeline consumer.  For a bound key going down
//! it vetoes the event, and in the rejection handler it injects a press of the
//! target key.  That injection travels back through the very same hook, so
//! the remapper remembers the key it just synthesized (the *reentry guard*)
//! and lets exactly that press through when it comes back around.
//!
//! ```text
//!  physical A ─▶ hook ─▶ remapper: A bound, not guarded ─▶ veto
//!                                   └─ notify: guard = B, inject B down
//!  injected B ─▶ hook ─▶ remapper: B == guard ─▶ accept, guard cleared
//! ```
//!
//! The guard test runs before the table lookup, so the echo passes even when
//! the target key is itself bound to something else.
//!
//! Key releases are never remapped: the source key's release is forwarded
//! unchanged and no release of the target is synthesized.
//!
//! # Hook ownership
//!
//! The remapper registers with the keyboard [`HookManager`] when the first
//! binding is added and unregisters when the last one is removed, which lets
//! the manager release the hook.  Registration changes are serialized on one
//! mutex so a concurrent `bind` and `unbind` of the last entry always leave
//! the hook and the table in agreement.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use inputgate_core::{ConsumerIdentity, ConsumerKind, DeviceClass, KeyCode, KeyEvent, KeyPhase, Verdict};
use thiserror::Error;
use tracing::{debug, error, trace};

use super::hook_manager::{Consumer, ConsumerId, HookError, KeyboardHook};

/// Name the remapper reports in its [`ConsumerIdentity`].
pub const REMAPPER_NAME: &str = "key-remapper";

/// Error type for synthetic key injection.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("injection failed: {0}")]
    Platform(String),
    #[error("key injection is not supported on this platform")]
    Unsupported,
}

/// Synthesizes key events.
///
/// Implementations must deliver injected events through the installed
/// keyboard hook; the reentry guard depends on seeing them again.
#[cfg_attr(test, mockall::automock)]
pub trait KeyInjector: Send + Sync {
    fn inject(&self, key: KeyCode, phase: KeyPhase) -> Result<(), InjectError>;
}

/// The consumer half of the remapper: binding table plus reentry guard.
struct RemapTable {
    identity: ConsumerIdentity,
    bindings: RwLock<HashMap<KeyCode, KeyCode>>,
    guard: Mutex<Option<KeyCode>>,
    injector: Arc<dyn KeyInjector>,
    this: Weak<RemapTable>,
}

impl RemapTable {
    fn target_of(&self, key: KeyCode) -> Option<KeyCode> {
        read(&self.bindings).get(&key).copied()
    }

    /// Rejection handler body: inject the target of `source`.
    fn substitute(&self, source: KeyCode, rejected: &[ConsumerIdentity]) {
        if !rejected.contains(&self.identity) {
            return;
        }
        // Unbound between evaluation and notification.
        let Some(target) = self.target_of(source) else {
            return;
        };

        // Set before injecting: the echo can arrive before inject() returns.
        *lock(&self.guard) = Some(target);
        debug!(%source, %target, "substituting key press");

        if let Err(e) = self.injector.inject(target, KeyPhase::Down) {
            error!(%source, %target, error = %e, "failed to inject substituted key");
            let mut guard = lock(&self.guard);
            if *guard == Some(target) {
                *guard = None;
            }
        }
    }
}

impl Consumer<KeyEvent> for RemapTable {
    fn identity(&self) -> &ConsumerIdentity {
        &self.identity
    }

    fn on_event(&self, event: &KeyEvent) -> Verdict {
        if event.phase == KeyPhase::Up {
            return Verdict::accept(self.identity.clone());
        }

        {
            let mut guard = lock(&self.guard);
            if *guard == Some(event.key) {
                *guard = None;
                trace!(key = %event.key, "synthesized press passed through");
                return Verdict::accept(self.identity.clone());
            }
        }

        if self.target_of(event.key).is_none() {
            return Verdict::accept(self.identity.clone());
        }

        let source = event.key;
        let this = self.this.clone();
        Verdict::reject(self.identity.clone()).on_rejected(move |rejected| {
            if let Some(table) = this.upgrade() {
                table.substitute(source, rejected);
            }
        })
    }

    fn may_release(&self) -> bool {
        read(&self.bindings).is_empty()
    }
}

/// Key remapping engine bound to one keyboard hook.
pub struct KeyRemapper {
    hook: Arc<KeyboardHook>,
    table: Arc<RemapTable>,
    registration: Mutex<Option<ConsumerId>>,
}

impl KeyRemapper {
    pub fn new(hook: Arc<KeyboardHook>, injector: Arc<dyn KeyInjector>) -> Self {
        let table = Arc::new_cyclic(|this| RemapTable {
            identity: ConsumerIdentity::new(REMAPPER_NAME, ConsumerKind::Binder),
            bindings: RwLock::new(HashMap::new()),
            guard: Mutex::new(None),
            injector,
            this: this.clone(),
        });
        Self {
            hook,
            table,
            registration: Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &ConsumerIdentity {
        &self.table.identity
    }

    /// Maps presses of `source` to presses of `target`.
    ///
    /// Binding a key to itself is ignored.  Rebinding an already bound
    /// source only changes its target.
    ///
    /// # Errors
    ///
    /// Returns the hook installation error when the first binding cannot
    /// install the keyboard hook; the binding is not kept in that case.
    pub fn bind(&self, source: KeyCode, target: KeyCode) -> Result<(), HookError> {
        if source == target {
            trace!(key = %source, "ignoring self-binding");
            return Ok(());
        }
        if self.hook.is_disposed() {
            return Err(HookError::Disposed(DeviceClass::Keyboard));
        }

        let mut registration = lock(&self.registration);
        {
            let mut bindings = write(&self.table.bindings);
            if let Some(existing) = bindings.get_mut(&source) {
                *existing = target;
                debug!(%source, %target, "binding retargeted");
                return Ok(());
            }
            // Inserted before registering so may_release() is already false
            // if a concurrent release() runs against the new registration.
            bindings.insert(source, target);
        }

        let hooked = if registration.is_some() {
            self.hook.install()
        } else {
            self.hook
                .subscribe(Arc::clone(&self.table) as Arc<dyn Consumer<KeyEvent>>)
                .map(|id| *registration = Some(id))
        };
        if let Err(e) = hooked {
            write(&self.table.bindings).remove(&source);
            return Err(e);
        }

        debug!(%source, %target, "key bound");
        Ok(())
    }

    /// Removes the binding for `source`; unknown keys are ignored.
    ///
    /// Removing the last binding unregisters the remapper and releases the
    /// hook unless another consumer still needs it.
    pub fn unbind(&self, source: KeyCode) {
        let mut registration = lock(&self.registration);
        let now_empty = {
            let mut bindings = write(&self.table.bindings);
            if bindings.remove(&source).is_none() {
                return;
            }
            bindings.is_empty()
        };
        debug!(%source, "key unbound");

        if now_empty {
            *lock(&self.table.guard) = None;
            if let Some(id) = registration.take() {
                self.hook.unsubscribe(id);
            }
        }
    }

    /// Removes every binding.
    pub fn unbind_all(&self) {
        let sources: Vec<KeyCode> = read(&self.table.bindings).keys().copied().collect();
        for source in sources {
            self.unbind(source);
        }
    }

    pub fn is_bound(&self, key: KeyCode) -> bool {
        read(&self.table.bindings).contains_key(&key)
    }

    pub fn target_of(&self, key: KeyCode) -> Option<KeyCode> {
        self.table.target_of(key)
    }

    /// Snapshot of the current bindings, ordered by source key.
    pub fn bindings(&self) -> BTreeMap<KeyCode, KeyCode> {
        read(&self.table.bindings)
            .iter()
            .map(|(&source, &target)| (source, target))
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.table.bindings).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The key synthesized most recently whose echo has not arrived yet.
    pub fn pending_echo(&self) -> Option<KeyCode> {
        *lock(&self.table.guard)
    }

    /// Removes every binding, releasing the hook if nothing else needs it.
    pub fn dispose(&self) {
        self.unbind_all();
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

// ── Tests ─────────────────────────────────────────────────────────────────────
