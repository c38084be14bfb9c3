//! Identifier allocation.
//!
//! Identifiers are 16 random bytes rendered as a hyphenated UUID string. A
//! candidate is only handed out if no object exists under it and no other
//! in-flight create on this allocator holds it. The probe against the store
//! is not atomic with the later write, so two processes sharing a store can
//! still race; within one process the pending set closes that gap.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use rand::rngs::OsRng;
use rand::RngCore;
use sakuin_store::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::fanout::{guarded, Deadline};

type Pending = Arc<Mutex<HashSet<String>>>;

/// Claim on an allocated identifier. Dropping it releases the claim.
pub struct Reservation {
    id: String,
    pending: Pending,
}

impl Reservation {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reservation").field(&self.id).finish()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

/// Generates identifiers that are unused at the time of allocation.
pub struct IdAllocator {
    rng: Mutex<Box<dyn RngCore + Send>>,
    pending: Pending,
}

impl IdAllocator {
    pub fn new(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            rng: Mutex::new(rng),
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Allocator backed by the operating system's randomness.
    pub fn from_os_rng() -> Self {
        Self::new(Box::new(OsRng))
    }

    /// Number of identifiers currently reserved.
    pub fn reserved(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    /// Allocate an identifier that is neither reserved nor present in
    /// `objects`.
    ///
    /// A failing randomness source fails immediately with
    /// [`IndexError::Allocation`]. Collisions are retried without limit.
    pub async fn allocate(
        &self,
        objects: &dyn ObjectStore,
        cancel: &CancellationToken,
    ) -> IndexResult<Reservation> {
        self.allocate_within(objects, cancel, None).await
    }

    pub(crate) async fn allocate_within(
        &self,
        objects: &dyn ObjectStore,
        cancel: &CancellationToken,
        deadline: Option<Deadline>,
    ) -> IndexResult<Reservation> {
        loop {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }

            let candidate = self.next_candidate()?;
            let Some(reservation) = self.reserve(candidate)? else {
                debug!("candidate id already reserved, retrying");
                continue;
            };

            let stat = guarded(cancel, deadline, async {
                objects.stat(reservation.id()).await.map_err(IndexError::from)
            })
            .await?;
            if !stat.exists {
                debug!(id = %reservation.id(), "allocated id");
                return Ok(reservation);
            }
            debug!(id = %reservation.id(), "candidate id already in use, retrying");
        }
    }

    fn next_candidate(&self) -> IndexResult<String> {
        let mut bytes = [0u8; 16];
        self.rng
            .lock()
            .map_err(|e| IndexError::Internal(format!("rng lock poisoned: {e}")))?
            .try_fill_bytes(&mut bytes)
            .map_err(IndexError::Allocation)?;
        Ok(uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .hyphenated()
            .to_string())
    }

    fn reserve(&self, id: String) -> IndexResult<Option<Reservation>> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|e| IndexError::Internal(format!("reservation lock poisoned: {e}")))?;
        if !pending.insert(id.clone()) {
            return Ok(None);
        }
        Ok(Some(Reservation {
            id,
            pending: Arc::clone(&self.pending),
        }))
    }
}

impl fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator")
            .field("reserved", &self.reserved())
            .finish_non_exhaustive()
    }
}
