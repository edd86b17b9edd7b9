//! Foreign handles and the ownership-transfer protocol
//!
//! The engine does not share a garbage collector with host code, so
//! every host-constructed role implementation crosses the boundary
//! inside a [`HostHandle`] with an explicit owner tag. The protocol is
//! acquire-then-try-transfer: construct host-owned, offer the handle to
//! an engine adopt operation, and on rejection release it yourself. A
//! successful adoption moves the payload to the engine, which releases
//! it at `clear()` or explicit removal.
//!
//! Release is strict: any operation on a handle whose payload is gone
//! (released or adopted) returns [`BridgeError::UseAfterRelease`].
//! There is no tolerant no-op mode.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{BridgeError, BridgeResult};
use crate::roles::{Interface, SignalSink};

/// Identity token for a handle, unique within the process.
pub type HandleId = u64;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Which side currently owns the payload behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// The host constructed the payload and is responsible for release.
    HostOwned,
    /// An engine aggregate adopted the payload; the engine releases it.
    NativeOwned,
    /// The payload has been released. Any further use is an error.
    Released,
}

/// A handle to a host-constructed object being offered across the
/// boundary.
///
/// `R` is the role the payload implements, typically a trait object
/// (`dyn Interface` or `dyn SignalSink`).
pub struct HostHandle<R: ?Sized> {
    id: HandleId,
    state: HandleState,
    payload: Option<Box<R>>,
}

/// Handle to a host [`Interface`] implementation.
pub type InterfaceHandle = HostHandle<dyn Interface>;

/// Handle to a host [`SignalSink`] implementation.
pub type SinkHandle = HostHandle<dyn SignalSink>;

impl<R: ?Sized> HostHandle<R> {
    /// Wrap a freshly constructed payload in host-owned state.
    pub fn new(payload: Box<R>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            state: HandleState::HostOwned,
            payload: Some(payload),
        }
    }

    /// The handle's identity token.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Current owner tag.
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// True while the host still owns the payload.
    pub fn is_live(&self) -> bool {
        self.state == HandleState::HostOwned
    }

    /// Borrow the payload. Fails once the payload has left the handle.
    pub fn payload(&self) -> BridgeResult<&R> {
        self.payload
            .as_deref()
            .ok_or(BridgeError::UseAfterRelease(self.id))
    }

    /// Mutably borrow the payload. Fails once the payload has left the
    /// handle.
    pub fn payload_mut(&mut self) -> BridgeResult<&mut R> {
        let id = self.id;
        self.payload
            .as_deref_mut()
            .ok_or(BridgeError::UseAfterRelease(id))
    }

    /// Release the payload, dropping it exactly once.
    ///
    /// A second call, or a call after the engine adopted the payload,
    /// returns [`BridgeError::UseAfterRelease`]. The failed call never
    /// touches the (already gone) payload, so a mistaken release after
    /// adoption cannot cause a double drop.
    pub fn release(&mut self) -> BridgeResult<()> {
        match self.state {
            HandleState::HostOwned => {
                self.payload = None;
                self.state = HandleState::Released;
                Ok(())
            }
            HandleState::NativeOwned | HandleState::Released => {
                Err(BridgeError::UseAfterRelease(self.id))
            }
        }
    }

    /// Move the payload out for adoption by an engine aggregate.
    ///
    /// Called by adopt operations *after* their own validation has
    /// passed, so a rejected adoption leaves the payload with the
    /// caller (who must then release it). On success the handle is
    /// tagged native-owned and all further operations on it fail.
    pub fn take_for_adoption(&mut self) -> BridgeResult<Box<R>> {
        match self.state {
            HandleState::HostOwned => {
                self.state = HandleState::NativeOwned;
                // Payload is always present in HostOwned state.
                Ok(self.payload.take().expect("host-owned handle has payload"))
            }
            HandleState::NativeOwned | HandleState::Released => {
                Err(BridgeError::UseAfterRelease(self.id))
            }
        }
    }
}

impl<R: ?Sized> std::fmt::Debug for HostHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

/// Offer a host-owned handle to an adopt operation, releasing it on
/// every failure path.
///
/// This is the scoped form of acquire-then-try-transfer: the adopt
/// closure receives the handle and returns its result; if adoption
/// failed, the handle (still host-owned) is released before the error
/// is returned, so no exit path leaks the payload.
pub fn offer<R: ?Sized, T>(
    mut handle: HostHandle<R>,
    adopt: impl FnOnce(&mut HostHandle<R>) -> BridgeResult<T>,
) -> BridgeResult<T> {
    match adopt(&mut handle) {
        Ok(value) => Ok(value),
        Err(err) => {
            // Rejected adoptions leave the payload with us; released or
            // adopted handles have nothing left to clean up.
            if handle.is_live() {
                let _ = handle.release();
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSink;
    impl SignalSink for CountingSink {}

    fn sink_handle() -> SinkHandle {
        HostHandle::new(Box::new(CountingSink))
    }

    #[test]
    fn test_release_is_exactly_once() {
        let mut h = sink_handle();
        assert!(h.is_live());
        assert!(h.release().is_ok());
        assert_eq!(h.state(), HandleState::Released);
        assert_eq!(h.release(), Err(BridgeError::UseAfterRelease(h.id())));
        assert!(h.payload().is_err());
    }

    #[test]
    fn test_adoption_transfers_ownership() {
        let mut h = sink_handle();
        let taken = h.take_for_adoption();
        assert!(taken.is_ok());
        assert_eq!(h.state(), HandleState::NativeOwned);
        // The original holder must not release after a transfer.
        assert_eq!(h.release(), Err(BridgeError::UseAfterRelease(h.id())));
        assert!(h.take_for_adoption().is_err());
    }

    #[test]
    fn test_offer_releases_on_failure() {
        let result: BridgeResult<()> = offer(sink_handle(), |h| {
            assert!(h.is_live());
            Err(BridgeError::AdoptionFailed("rejected".into()))
        });
        assert!(matches!(result, Err(BridgeError::AdoptionFailed(_))));
    }

    #[test]
    fn test_offer_passes_through_success() {
        let result = offer(sink_handle(), |h| {
            h.take_for_adoption().map(|_| 7u32)
        });
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_handle_ids_are_unique() {
        let a = sink_handle();
        let b = sink_handle();
        assert_ne!(a.id(), b.id());
    }
}
