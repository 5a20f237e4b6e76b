//! Concurrency tiers: how a container instance guards its state.
//!
//! Every container is generic over a [`SyncPolicy`] and funnels all access
//! through three entry points:
//!
//! - `read`: lookups and traversal.
//! - `write`: in-place mutation and structural changes (erase, swap, reserve).
//! - `append`: growth, split into a `prepare` phase that may build a new
//!   segment and a `commit` phase that links it in and stores the value.
//!
//! The tiers differ in what they lock for each entry point:
//!
//! | tier | policy         | read        | write       | append                                   |
//! |------|----------------|-------------|-------------|------------------------------------------|
//! | 0    | [`NoSync`]     | borrow      | borrow mut  | borrow mut                               |
//! | 1    | [`AppendSync`] | shared      | exclusive   | upgradable for prepare, exclusive commit |
//! | 2    | [`FullSync`]   | shared      | exclusive   | exclusive for both phases                |
//!
//! Under tier 1 only one appender runs at a time, and it builds new segments
//! while readers keep going; readers wait only for the commit. Under tier 2
//! every mutation, including segment allocation, excludes readers.
//!
//! Closures passed to these entry points must not call back into the same
//! container: tier 0 panics on such reentrancy and the locking tiers deadlock.

use core::cell::RefCell;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};

/// Locking granularity of a container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Tier {
    /// No synchronization; single-threaded use only.
    None = 0,
    /// Appends serialize against each other; readers only wait for commits.
    Append = 1,
    /// Shared/exclusive lock around every operation.
    Full = 2,
}

mod seal {
    pub trait Sealed {}
}

/// A tier's selection of lock for state `S`.
pub trait SyncPolicy: seal::Sealed + 'static {
    const TIER: Tier;

    type Lock<S>: Guarded<S>;
}

/// The access discipline of one tier over state `S`.
pub trait Guarded<S>: seal::Sealed {
    fn new(state: S) -> Self
    where
        Self: Sized;

    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R;

    fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R;

    fn append<P, R>(
        &self,
        prepare: impl FnOnce(&S) -> P,
        commit: impl FnOnce(&mut S, P) -> R,
    ) -> R;

    /// Lock-free access through an exclusive borrow of the container.
    fn get_mut(&mut self) -> &mut S;
}

/// Tier 0: single-threaded. Containers using it are `!Sync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSync;

/// Tier 1: append guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendSync;

/// Tier 2: full read-write guard. The default for every container.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullSync;

impl seal::Sealed for NoSync {}
impl seal::Sealed for AppendSync {}
impl seal::Sealed for FullSync {}

impl SyncPolicy for NoSync {
    const TIER: Tier = Tier::None;
    type Lock<S> = Unsynced<S>;
}

impl SyncPolicy for AppendSync {
    const TIER: Tier = Tier::Append;
    type Lock<S> = AppendLock<S>;
}

impl SyncPolicy for FullSync {
    const TIER: Tier = Tier::Full;
    type Lock<S> = FullLock<S>;
}

/// Tier 0 state holder: a `RefCell` that turns reentrant mutation into a panic.
#[derive(Debug, Default)]
pub struct Unsynced<S>(RefCell<S>);

/// Tier 1 state holder.
#[derive(Debug, Default)]
pub struct AppendLock<S>(RwLock<S>);

/// Tier 2 state holder.
#[derive(Debug, Default)]
pub struct FullLock<S>(RwLock<S>);

impl<S> seal::Sealed for Unsynced<S> {}
impl<S> seal::Sealed for AppendLock<S> {}
impl<S> seal::Sealed for FullLock<S> {}

const REENTRANCY: &str =
    "reentrancy detected: nested mutable entry into an unsynchronized container";

impl<S> Guarded<S> for Unsynced<S> {
    fn new(state: S) -> Self {
        Unsynced(RefCell::new(state))
    }

    #[inline]
    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        match self.0.try_borrow() {
            Ok(state) => f(&state),
            Err(_) => panic!("{REENTRANCY}"),
        }
    }

    #[inline]
    fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        match self.0.try_borrow_mut() {
            Ok(mut state) => f(&mut state),
            Err(_) => panic!("{REENTRANCY}"),
        }
    }

    #[inline]
    fn append<P, R>(
        &self,
        prepare: impl FnOnce(&S) -> P,
        commit: impl FnOnce(&mut S, P) -> R,
    ) -> R {
        self.write(|state| {
            let prepared = prepare(state);
            commit(state, prepared)
        })
    }

    #[inline]
    fn get_mut(&mut self) -> &mut S {
        self.0.get_mut()
    }
}

impl<S> Guarded<S> for AppendLock<S> {
    fn new(state: S) -> Self {
        AppendLock(RwLock::new(state))
    }

    #[inline]
    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.0.read())
    }

    #[inline]
    fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.0.write())
    }

    fn append<P, R>(
        &self,
        prepare: impl FnOnce(&S) -> P,
        commit: impl FnOnce(&mut S, P) -> R,
    ) -> R {
        let guard = self.0.upgradable_read();
        let prepared = prepare(&guard);
        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        commit(&mut guard, prepared)
    }

    #[inline]
    fn get_mut(&mut self) -> &mut S {
        self.0.get_mut()
    }
}

impl<S> Guarded<S> for FullLock<S> {
    fn new(state: S) -> Self {
        FullLock(RwLock::new(state))
    }

    #[inline]
    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.0.read())
    }

    #[inline]
    fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.0.write())
    }

    fn append<P, R>(
        &self,
        prepare: impl FnOnce(&S) -> P,
        commit: impl FnOnce(&mut S, P) -> R,
    ) -> R {
        let mut guard = self.0.write();
        let prepared = prepare(&guard);
        commit(&mut guard, prepared)
    }

    #[inline]
    fn get_mut(&mut self) -> &mut S {
        self.0.get_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;

    #[test]
    fn tiers_are_ordered() {
        assert_eq!(NoSync::TIER as u8, 0);
        assert_eq!(AppendSync::TIER as u8, 1);
        assert_eq!(FullSync::TIER as u8, 2);
        assert!(Tier::None < Tier::Append && Tier::Append < Tier::Full);
    }

    /// Invariant: nested reads are allowed without synchronization.
    #[test]
    fn nosync_nested_reads() {
        let lock = Unsynced::new(5u32);
        let v = lock.read(|a| lock.read(|b| a + b));
        assert_eq!(v, 10);
    }

    /// Invariant: a mutable entry nested inside another entry panics.
    #[test]
    #[should_panic(expected = "reentrancy detected")]
    fn nosync_nested_write_panics() {
        let lock = Unsynced::new(0u32);
        lock.read(|_| lock.write(|v| *v += 1));
    }

    /// Invariant: append runs prepare then commit, handing over the prepared value.
    #[test]
    fn append_phases_run_in_order() {
        fn run<P: SyncPolicy>() {
            let mut lock: P::Lock<Vec<u32>> = Guarded::new(vec![1u32]);
            let len = lock.append(
                |v| v.len(),
                |v, n| {
                    v.push(n as u32 + 1);
                    v.len()
                },
            );
            assert_eq!(len, 2);
            assert_eq!(*lock.get_mut(), vec![1, 2]);
        }
        run::<NoSync>();
        run::<AppendSync>();
        run::<FullSync>();
    }

    /// Invariant: under the append tier a reader is not blocked while an
    /// appender is in its prepare phase.
    #[test]
    fn append_tier_readers_overlap_prepare() {
        let lock = AppendLock::new(0u32);
        let in_prepare = Barrier::new(2);
        let read_done = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                lock.append(
                    |_| {
                        in_prepare.wait();
                        while !read_done.load(Ordering::Acquire) {
                            std::thread::yield_now();
                        }
                    },
                    |v, ()| *v += 1,
                );
            });
            in_prepare.wait();
            let seen = lock.read(|v| *v);
            assert_eq!(seen, 0);
            read_done.store(true, Ordering::Release);
        });
        assert_eq!(lock.read(|v| *v), 1);
    }
}
