//! Segment: fixed-size slot blocks and the index arithmetic every container shares.

use crate::memory::SharedResource;

/// Index decomposition for segments of `1 << bits` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    bits: u32,
}

impl Layout {
    pub(crate) const fn new(bits: u32) -> Self {
        Self { bits }
    }

    #[inline]
    pub(crate) const fn len(self) -> usize {
        1 << self.bits
    }

    #[inline]
    pub(crate) const fn segment(self, index: usize) -> usize {
        index >> self.bits
    }

    #[inline]
    pub(crate) const fn offset(self, index: usize) -> usize {
        index & (self.len() - 1)
    }
}

/// A block of slots plus the number of them currently holding a live value.
///
/// The segment reports its bytes to the owning container's resource when it is
/// created and when it is dropped, whether or not it was ever attached.
pub(crate) struct Segment<S> {
    slots: Box<[S]>,
    live: usize,
    resource: SharedResource,
}

impl<S> Segment<S> {
    fn bytes(len: usize) -> usize {
        core::mem::size_of::<S>().saturating_mul(len)
    }
}

// A copy is a new allocation charged to the same resource.
impl<S: Clone> Clone for Segment<S> {
    fn clone(&self) -> Self {
        self.resource.allocate(Self::bytes(self.slots.len()));
        Self {
            slots: self.slots.clone(),
            live: self.live,
            resource: self.resource.clone(),
        }
    }
}

impl<S> Drop for Segment<S> {
    fn drop(&mut self) {
        self.resource.release(Self::bytes(self.slots.len()));
    }
}

/// The ordered segment list of one container.
///
/// Segments are only ever appended or popped from the end, so the slot at a
/// given index stays in the same segment for as long as that segment exists.
#[derive(Clone)]
pub(crate) struct Segments<S> {
    layout: Layout,
    list: Vec<Segment<S>>,
    resource: SharedResource,
    fill: fn() -> S,
}

impl<S> Segments<S> {
    pub(crate) fn new(layout: Layout, resource: SharedResource, fill: fn() -> S) -> Self {
        Self {
            layout,
            list: Vec::new(),
            resource,
            fill,
        }
    }

    #[inline]
    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    /// Number of slots across all attached segments.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.list.len() * self.layout.len()
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.list.len()
    }

    /// Build a segment without attaching it.
    ///
    /// Tiered policies call this while other threads may still be reading, and
    /// only take exclusive access for [`Segments::attach`].
    pub(crate) fn fresh(&self) -> Segment<S> {
        let len = self.layout.len();
        self.resource.allocate(Segment::<S>::bytes(len));
        let slots: Box<[S]> = (0..len).map(|_| (self.fill)()).collect();
        log::trace!(
            "allocated segment of {len} slots ({} bytes)",
            Segment::<S>::bytes(len)
        );
        Segment {
            slots,
            live: 0,
            resource: self.resource.clone(),
        }
    }

    pub(crate) fn attach(&mut self, segment: Segment<S>) {
        debug_assert_eq!(segment.slots.len(), self.layout.len());
        self.list.push(segment);
    }

    pub(crate) fn grow(&mut self) {
        let segment = self.fresh();
        self.attach(segment);
    }

    /// Grow until at least `slots` slots exist.
    pub(crate) fn reserve(&mut self, slots: usize) {
        while self.capacity() < slots {
            self.grow();
        }
    }

    pub(crate) fn release_last(&mut self) -> bool {
        let released = self.list.pop().is_some();
        if released {
            log::trace!("released segment {}", self.list.len());
        }
        released
    }

    pub(crate) fn release_all(&mut self) {
        if !self.list.is_empty() {
            log::trace!("released all {} segments", self.list.len());
        }
        self.list.clear();
    }

    pub(crate) fn live_counts(&self) -> Vec<usize> {
        self.list.iter().map(|s| s.live).collect()
    }

    #[inline]
    pub(crate) fn mark_live(&mut self, index: usize) {
        self.list[self.layout.segment(index)].live += 1;
    }

    #[inline]
    pub(crate) fn mark_dead(&mut self, index: usize) {
        let segment = &mut self.list[self.layout.segment(index)];
        debug_assert!(segment.live > 0);
        segment.live -= 1;
    }

    /// Reset every slot below `end` to the fill value and zero the live counts.
    pub(crate) fn reset(&mut self, end: usize) {
        let fill = self.fill;
        for index in 0..end.min(self.capacity()) {
            *self.slot_mut(index) = fill();
        }
        for segment in &mut self.list {
            segment.live = 0;
        }
    }

    /// # Panics
    ///
    /// If `index` is beyond [`Segments::capacity`]. Containers bound-check first.
    #[inline]
    pub(crate) fn slot(&self, index: usize) -> &S {
        &self.list[self.layout.segment(index)].slots[self.layout.offset(index)]
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut S {
        let layout = self.layout;
        &mut self.list[layout.segment(index)].slots[layout.offset(index)]
    }

    /// Exchange the contents of two slots. Live counts are left alone.
    pub(crate) fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (sa, sb) = (self.layout.segment(a), self.layout.segment(b));
        let (oa, ob) = (self.layout.offset(a), self.layout.offset(b));
        if sa == sb {
            self.list[sa].slots.swap(oa, ob);
            return;
        }
        let (lo, hi, olo, ohi) = if sa < sb {
            (sa, sb, oa, ob)
        } else {
            (sb, sa, ob, oa)
        };
        let (head, tail) = self.list.split_at_mut(hi);
        core::mem::swap(&mut head[lo].slots[olo], &mut tail[0].slots[ohi]);
    }
}
