//! Hop-by-hop / end-to-end id allocation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use rand::Rng;

const UNSEEDED: u32 = 0;

/// Allocator for request correlation ids.
///
/// Ids are consecutive, never 0 and never `u32::MAX`. The first id is drawn at
/// random so that a restarted client does not reuse the ids of its previous
/// incarnation. After `u32::MAX - 1` the sequence continues at 1.
///
/// Connections share [`IdGenerator::global`] unless one is injected through
/// the builder.
///
/// # Example
///
/// ```
/// use async_dmconfig::client::IdGenerator;
///
/// let ids = IdGenerator::starting_at(41);
/// assert_eq!(ids.next_id(), 41);
/// assert_eq!(ids.next_id(), 42);
/// ```
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU32,
}

impl IdGenerator {
    /// Generator seeded randomly on first use.
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(UNSEEDED),
        }
    }

    /// Generator whose first id is `first` (0 and `u32::MAX` become 1).
    pub fn starting_at(first: u32) -> Self {
        let first = if first == UNSEEDED || first == u32::MAX {
            1
        } else {
            first
        };
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// The process-wide generator.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<IdGenerator>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// Allocate the next id; hop id and end id are both set to it.
    pub fn next_id(&self) -> u32 {
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let id = if current == UNSEEDED {
                let seed = rand::thread_rng().gen_range(1..u32::MAX);
                tracing::debug!(target: "async_dmconfig::client", { dm.initial_hop_id = seed }, "seeded id generator");
                seed
            } else {
                current
            };
            let following = if id >= u32::MAX - 1 { 1 } else { id + 1 };
            match self
                .next
                .compare_exchange_weak(current, following, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return id,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
