//! Memory resources: the accounting hooks every segment allocation goes through.
//!
//! Containers never talk to an allocator directly. Each one holds a
//! [`SharedResource`] handed in at construction and reports every segment it
//! creates or drops to it, so a caller can meter, cap, or pool storage per
//! container without touching container logic.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Accounting interface for segment storage.
///
/// `allocate` is called before a segment's slots are created and `release` after
/// they are dropped, always with the same byte count for a given segment.
pub trait MemoryResource: Send + Sync + fmt::Debug {
    fn allocate(&self, bytes: usize);
    fn release(&self, bytes: usize);
}

/// Resource handle shared between a container and all of its segments.
pub type SharedResource = Arc<dyn MemoryResource>;

/// Plain global-heap backing with no bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapResource;

impl MemoryResource for HeapResource {
    #[inline]
    fn allocate(&self, _bytes: usize) {}
    #[inline]
    fn release(&self, _bytes: usize) {}
}

/// The resource used by `new()` constructors.
pub fn default_resource() -> SharedResource {
    Arc::new(HeapResource)
}

/// Snapshot of a [`TrackingResource`]'s counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub current_bytes: usize,
    pub peak_bytes: usize,
    pub live_segments: usize,
    pub total_allocations: usize,
    pub total_releases: usize,
}

/// Counts bytes and segments handed out, optionally enforcing a byte budget.
///
/// Exceeding the budget is an allocator-level fault: it is logged and raised as
/// a panic. Containers themselves never report capacity errors.
#[derive(Debug, Default)]
pub struct TrackingResource {
    current: AtomicUsize,
    peak: AtomicUsize,
    segments: AtomicUsize,
    allocations: AtomicUsize,
    releases: AtomicUsize,
    budget: Option<usize>,
}

impl TrackingResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resource that refuses to hand out more than `bytes` at once.
    pub fn with_budget(bytes: usize) -> Self {
        Self {
            budget: Some(bytes),
            ..Self::default()
        }
    }

    pub fn budget(&self) -> Option<usize> {
        self.budget
    }

    pub fn current_bytes(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    pub fn live_segments(&self) -> usize {
        self.segments.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            current_bytes: self.current.load(Ordering::Relaxed),
            peak_bytes: self.peak.load(Ordering::Relaxed),
            live_segments: self.segments.load(Ordering::Relaxed),
            total_allocations: self.allocations.load(Ordering::Relaxed),
            total_releases: self.releases.load(Ordering::Relaxed),
        }
    }
}

impl MemoryResource for TrackingResource {
    /// # Panics
    ///
    /// If the allocation would push usage past the configured budget, or the
    /// byte counter would overflow.
    fn allocate(&self, bytes: usize) {
        let budget = self.budget.unwrap_or(usize::MAX);
        let result = self
            .current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_add(bytes).filter(|&total| total <= budget)
            });
        match result {
            Ok(previous) => {
                self.peak.fetch_max(previous + bytes, Ordering::Relaxed);
                self.segments.fetch_add(1, Ordering::Relaxed);
                self.allocations.fetch_add(1, Ordering::Relaxed);
            }
            Err(current) => {
                log::error!(
                    "segment allocation of {bytes} bytes refused: {current} bytes in use, budget {budget}"
                );
                panic!("memory resource exhausted: {bytes} bytes requested with {current} of {budget} in use");
            }
        }
    }

    fn release(&self, bytes: usize) {
        let result = self
            .current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(bytes)
            });
        if result.is_err() {
            log::error!("memory tracking counter underflowed on release of {bytes} bytes");
            return;
        }
        self.segments.fetch_sub(1, Ordering::Relaxed);
        self.releases.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: counters follow allocate/release pairs and the peak is sticky.
    #[test]
    fn tracking_counts_and_peak() {
        let r = TrackingResource::new();
        r.allocate(100);
        r.allocate(50);
        assert_eq!(r.current_bytes(), 150);
        assert_eq!(r.live_segments(), 2);
        r.release(100);
        assert_eq!(r.current_bytes(), 50);
        assert_eq!(r.peak_bytes(), 150);
        let s = r.stats();
        assert_eq!(s.total_allocations, 2);
        assert_eq!(s.total_releases, 1);
        assert_eq!(s.live_segments, 1);
    }

    /// Invariant: a release that does not match an allocation leaves counters intact.
    #[test]
    fn underflow_is_ignored() {
        let r = TrackingResource::new();
        r.allocate(8);
        r.release(16);
        assert_eq!(r.current_bytes(), 8);
        assert_eq!(r.live_segments(), 1);
    }

    /// Invariant: allocations up to the budget succeed; the next one is fatal.
    #[test]
    #[should_panic(expected = "memory resource exhausted")]
    fn budget_overrun_panics() {
        let r = TrackingResource::with_budget(64);
        r.allocate(64);
        r.allocate(1);
    }

    #[test]
    fn heap_resource_is_inert() {
        let r = default_resource();
        r.allocate(usize::MAX);
        r.release(usize::MAX);
    }
}
