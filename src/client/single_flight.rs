//! Deduplicate concurrent calls to the same async operation.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::task::JoinError;

/// Future handed to every caller of one in-flight call.
pub type SharedCall<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlight<T, E> {
    id: u64,
    key: u64,
    call: SharedCall<T, E>,
}

struct Slot<T, E> {
    current: Option<InFlight<T, E>>,
    next_id: u64,
}

/// Runs at most one call at a time and shares its outcome.
///
/// While a call is in flight, further [`SingleFlight::run`] invocations with
/// the same key join it instead of invoking their factory. A different key
/// supersedes the in-flight call: it keeps running for the callers already
/// holding it, but nobody new joins it. The call runs on its own task, so it
/// completes even if every caller stops waiting. The slot clears as soon as
/// the call settles; the next `run` starts a fresh call.
pub struct SingleFlight<T, E> {
    slot: Arc<Mutex<Slot<T, E>>>,
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                current: None,
                next_id: 0,
            })),
        }
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight call for `key`, or start one with `factory`.
    pub fn run<F, Fut>(&self, key: u64, factory: F) -> SharedCall<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(in_flight) = slot.current.as_ref().filter(|c| c.key == key) {
            return in_flight.call.clone();
        }

        let id = slot.next_id;
        slot.next_id += 1;

        let work = factory();
        let guard = ClearOnDrop {
            slot: Arc::clone(&self.slot),
            id,
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            work.await
        });

        let call = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(E::from(e)),
            }
        }
        .boxed()
        .shared();

        slot.current = Some(InFlight {
            id,
            key,
            call: call.clone(),
        });
        call
    }

    /// Whether a call is currently in flight.
    pub fn is_running(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .is_some()
    }
}

/// Clears the slot when the spawned call ends, including by panic.
struct ClearOnDrop<T, E> {
    slot: Arc<Mutex<Slot<T, E>>>,
    id: u64,
}

impl<T, E> Drop for ClearOnDrop<T, E> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.current.as_ref().is_some_and(|c| c.id == self.id) {
            slot.current = None;
        }
    }
}
