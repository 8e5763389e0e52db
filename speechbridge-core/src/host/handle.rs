//! Ownership of callables handed to the host.
//!
//! The host is given a [`HostRef`], never ownership. The owning
//! [`RegisteredHandle`] stays with the lifecycle controller and may only be
//! released once the host has confirmed unregistration. A handle dropped while
//! still registered leaks its callable instead of freeing it, so a late host
//! call can never reach freed code.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tracing::error;

use crate::error::{BridgeError, Result};

/// Script-visible control entry point (no arguments, no return value).
pub type ControlFn = dyn Fn() + Send + Sync;

/// Per-tick callback; receives the host's frame delta in seconds.
pub type TickFn = dyn Fn(f64) + Send + Sync;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a registered callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owning side of a callable exposed to the host.
pub struct RegisteredHandle<F: ?Sized + Send + Sync> {
    id: HandleId,
    label: Arc<str>,
    callable: Arc<F>,
    registered: bool,
}

impl<F: ?Sized + Send + Sync> RegisteredHandle<F> {
    pub fn new(label: &str, callable: Arc<F>) -> Self {
        Self {
            id: HandleId::next(),
            label: Arc::from(label),
            callable,
            registered: false,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The non-owning reference given to the host.
    pub fn host_ref(&self) -> HostRef<F> {
        HostRef {
            id: self.id,
            label: Arc::clone(&self.label),
            target: Arc::downgrade(&self.callable),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Record that the host accepted the registration.
    pub fn mark_registered(&mut self) {
        self.registered = true;
    }

    /// Record that the host confirmed unregistration.
    pub fn mark_unregistered(&mut self) {
        self.registered = false;
    }

    /// Drop the owning reference.
    ///
    /// # Errors
    /// Hands the handle back untouched while it is still registered.
    pub fn release(self) -> std::result::Result<(), Self> {
        if self.registered {
            Err(self)
        } else {
            Ok(())
        }
    }
}

impl<F: ?Sized + Send + Sync> Drop for RegisteredHandle<F> {
    fn drop(&mut self) {
        if self.registered {
            error!(
                handle = %self.id,
                label = %self.label,
                "handle dropped while still registered with the host; leaking its callable"
            );
            std::mem::forget(Arc::clone(&self.callable));
        }
    }
}

impl<F: ?Sized + Send + Sync> fmt::Debug for RegisteredHandle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

/// Non-owning reference the host keeps for as long as it likes.
pub struct HostRef<F: ?Sized> {
    id: HandleId,
    label: Arc<str>,
    target: Weak<F>,
}

impl<F: ?Sized> HostRef<F> {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the owning handle still exists.
    pub fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn upgrade(&self) -> Result<Arc<F>> {
        self.target.upgrade().ok_or_else(|| BridgeError::HandleReleased {
            label: self.label.to_string(),
        })
    }
}

impl HostRef<ControlFn> {
    /// # Errors
    /// `HandleReleased` if the owner has been released.
    pub fn invoke(&self) -> Result<()> {
        let callable = self.upgrade()?;
        callable();
        Ok(())
    }
}

impl HostRef<TickFn> {
    /// # Errors
    /// `HandleReleased` if the owner has been released.
    pub fn invoke(&self, delta_seconds: f64) -> Result<()> {
        let callable = self.upgrade()?;
        callable(delta_seconds);
        Ok(())
    }
}

impl<F: ?Sized> Clone for HostRef<F> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            label: Arc::clone(&self.label),
            target: Weak::clone(&self.target),
        }
    }
}

impl<F: ?Sized> fmt::Debug for HostRef<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRef")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("live", &self.is_live())
            .finish()
    }
}
