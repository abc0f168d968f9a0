//! Process-wide monotonic request-id allocation (spec.md §4.4.3).
//!
//! IDs start at 4 (0..3 are reserved, matching the handshake's use of
//! small fixed IDs for hello/login) and wrap back to 4 — not at `u64::MAX`,
//! but as soon as the next id would no longer fit ChainPack's single-byte
//! compact UInt form (`0x00..=0x3F` packs as the tag byte itself, see
//! `shv_chainpack::chainpack::tag::COMPACT_UINT_MAX`) — so every allocated
//! request id stays cheap to encode. Wraparound goes through
//! compare-and-swap rather than a plain fetch-add so the special case can
//! be expressed without a race.

use std::sync::atomic::{AtomicU64, Ordering};

use shv_chainpack::chainpack::tag;

const FIRST_ID: u64 = 4;

pub struct RequestIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        RequestIdAllocator {
            next: AtomicU64::new(FIRST_ID),
        }
    }

    pub fn allocate(&self) -> u64 {
        loop {
            let current = self.next.load(Ordering::Relaxed);
            let next = if current >= tag::COMPACT_UINT_MAX as u64 {
                FIRST_ID
            } else {
                current + 1
            };
            if self
                .next
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return current;
            }
        }
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_four_and_increments() {
        let a = RequestIdAllocator::new();
        assert_eq!(a.allocate(), 4);
        assert_eq!(a.allocate(), 5);
        assert_eq!(a.allocate(), 6);
    }

    #[test]
    fn wraps_at_compact_uint_budget_not_at_u64_max() {
        let a = RequestIdAllocator {
            next: AtomicU64::new(tag::COMPACT_UINT_MAX as u64),
        };
        assert_eq!(a.allocate(), tag::COMPACT_UINT_MAX as u64);
        assert_eq!(a.allocate(), FIRST_ID);
    }
}
