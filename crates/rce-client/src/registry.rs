//! Interface registry: tag → live receive-capable interface.
//!
//! Each registration gets a unique id so that a stale handle can never
//! remove somebody else's entry. Unregistration is synchronous: once
//! [`InterfaceRegistry::unregister`] returns, no `receive` for that entry is
//! running (except the caller's own, when unregistering from inside its
//! callback) and none will start.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rce_core::{CorrelationId, Payload};

use crate::errors::ClientError;

/// An interface that accepts inbound messages for its tag.
pub trait InterfaceReceiver: Send + Sync {
    /// Handle one inbound message addressed to this interface.
    fn receive(
        &self,
        msg_type: &str,
        payload: Payload,
        msg_id: &CorrelationId,
    ) -> Result<(), ClientError>;
}

/// Identifies one registration; never reused within a process.
pub type RegistrationId = u64;

struct Slot {
    id: RegistrationId,
    receiver: Arc<dyn InterfaceReceiver>,
    /// Held shared for the duration of each `receive`.
    gate: RwLock<()>,
    live: AtomicBool,
}

thread_local! {
    /// Registration whose `receive` is running on this thread (0 = none).
    static DISPATCHING: Cell<RegistrationId> = const { Cell::new(0) };
}

struct DispatchGuard(RegistrationId);

impl DispatchGuard {
    fn enter(id: RegistrationId) -> Self {
        Self(DISPATCHING.replace(id))
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.set(self.0);
    }
}

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// Tag-keyed table of registered interfaces.
pub struct InterfaceRegistry {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl InterfaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `tag` to `receiver`.
    pub fn register(
        &self,
        tag: &str,
        receiver: Arc<dyn InterfaceReceiver>,
    ) -> Result<RegistrationId, ClientError> {
        let mut slots = self.slots.lock();
        if slots.contains_key(tag) {
            return Err(ClientError::DuplicateTag(tag.to_owned()));
        }
        let id = NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed);
        let _ = slots.insert(
            tag.to_owned(),
            Arc::new(Slot {
                id,
                receiver,
                gate: RwLock::new(()),
                live: AtomicBool::new(true),
            }),
        );
        Ok(id)
    }

    /// Remove the binding for `tag` if it is registration `id`.
    ///
    /// Returns whether an entry was removed. A tag that is unbound, or bound
    /// by a different registration, is left alone.
    pub fn unregister(&self, tag: &str, id: RegistrationId) -> bool {
        let removed = {
            let mut slots = self.slots.lock();
            match slots.get(tag) {
                Some(slot) if slot.id == id => slots.remove(tag),
                _ => None,
            }
        };
        let Some(slot) = removed else {
            return false;
        };

        slot.live.store(false, Ordering::SeqCst);
        if DISPATCHING.get() != slot.id {
            // Wait out an in-flight receive on another thread.
            drop(slot.gate.write());
        }
        true
    }

    /// Deliver a message to the interface bound to `tag`.
    ///
    /// Returns `None` when no live interface is bound.
    pub fn dispatch(
        &self,
        tag: &str,
        msg_type: &str,
        payload: Payload,
        msg_id: &CorrelationId,
    ) -> Option<Result<(), ClientError>> {
        let slot = self.slots.lock().get(tag).cloned()?;
        let _gate = slot.gate.read();
        if !slot.live.load(Ordering::SeqCst) {
            return None;
        }
        let _dispatching = DispatchGuard::enter(slot.id);
        Some(slot.receiver.receive(msg_type, payload, msg_id))
    }

    /// Whether `tag` is currently bound.
    pub fn contains(&self, tag: &str) -> bool {
        self.slots.lock().contains_key(tag)
    }

    /// Registration id bound to `tag`, if any.
    pub fn registration(&self, tag: &str) -> Option<RegistrationId> {
        self.slots.lock().get(tag).map(|slot| slot.id)
    }

    /// Number of bound tags.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no tag is bound.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
