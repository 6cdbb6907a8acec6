use std::{cell::Cell, mem::size_of, num::NonZeroU32, vec};

use smallvec::SmallVec;
use strum::{Display, IntoStaticStr};

use crate::{
    resource::{NoLimitTracker, ResourceError, ResourceTracker},
    tracer::{HeapTracer, NoopTracer},
    types::{Dict, List},
    value::Value,
};

/// Unique identifier for a container stored inside the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The kind of container behind a [`HeapId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ContainerKind {
    Dict,
    List,
}

impl ContainerKind {
    /// User-facing type name, as used in error messages.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Dict => "Dictionary",
            Self::List => "List",
        }
    }
}

/// A collector generation id.
///
/// Epochs are handed out by [`Heap::next_epoch`] and are used both as the mark bit of a
/// collection pass and as the memoization key of one deep copy. Zero is never a valid
/// epoch; "no memoization" is spelled `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Epoch(NonZeroU32);

impl Epoch {
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Every container that must live in the arena.
#[derive(Debug)]
pub(crate) enum HeapData {
    Dict(Dict),
    List(List),
}

impl HeapData {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Self::Dict(_) => ContainerKind::Dict,
            Self::List(_) => ContainerKind::List,
        }
    }

    /// Approximate footprint in bytes of the header, reported to the resource tracker.
    ///
    /// Entries are accounted separately through `on_container_insert`.
    fn estimate_size(&self) -> usize {
        size_of::<HeapValue>()
            + match self {
                Self::Dict(_) => size_of::<Dict>(),
                Self::List(_) => size_of::<List>(),
            }
    }

    /// Moves every stored value out, leaving an empty container behind.
    ///
    /// The caller owns the returned values and must drop them with the heap.
    pub fn drain_values(&mut self) -> Vec<Value> {
        match self {
            Self::Dict(dict) => dict.drain_values(),
            Self::List(list) => list.drain_values(),
        }
    }

    fn collect_child_ids(&self, work_list: &mut impl Extend<HeapId>) {
        match self {
            Self::Dict(dict) => work_list.extend(dict.values().filter_map(Value::ref_id)),
            Self::List(list) => work_list.extend(list.iter().filter_map(Value::ref_id)),
        }
    }
}

/// A container header: the refcount and collector state plus the payload.
///
/// `epoch_id` and `epoch_copy` are only meaningful during the collector pass or copy
/// that stamped them. They use `Cell` so marking and formatting work through `&Heap`.
#[derive(Debug)]
struct HeapValue {
    refcount: Cell<usize>,
    epoch_id: Cell<Option<Epoch>>,
    epoch_copy: Cell<Option<HeapId>>,
    data: HeapData,
}

/// Snapshot of heap state at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Registered dictionaries.
    pub live_dicts: usize,
    /// Registered lists.
    pub live_lists: usize,
    /// Number of free (recycled) slots available for reuse.
    pub free_slots: usize,
    /// Total heap capacity (live + free).
    pub total_slots: usize,
}

impl HeapStats {
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.live_dicts + self.live_lists
    }
}

/// Proof that the first sweep pass completed for an epoch.
///
/// Returned by [`Heap::sweep_release_unmarked`] and consumed by
/// [`Heap::sweep_free_headers`], so headers can only be freed after the entries of every
/// unmarked container have been released. It records exactly which containers the first
/// pass emptied, so stamps written between the passes do not change what gets freed.
#[must_use = "headers of unreachable containers stay registered until `sweep_free_headers` runs"]
#[derive(Debug)]
pub struct PendingSweep {
    epoch: Epoch,
    emptied: Vec<HeapId>,
}

impl PendingSweep {
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// True when at least one unmarked container was found.
    #[must_use]
    pub fn released(&self) -> bool {
        !self.emptied.is_empty()
    }
}

/// Reference-counted arena that owns every list and dictionary of one engine instance.
///
/// The set of live slots is the registry of all containers: a container is registered
/// from allocation until its header is released, and the sweep phases walk exactly this
/// set. Freed slots go onto a free list and are reused by later allocations.
///
/// A heap is self-contained. `HeapId`s must never cross between heaps, and a heap is not
/// meant to be shared between independent hosts without [`Heap::reset`].
///
/// Generic over `T: ResourceTracker` for allocation limits and interrupts, and over
/// `R: HeapTracer` for lifecycle tracing; the defaults compile both away.
#[derive(Debug)]
pub struct Heap<T: ResourceTracker = NoLimitTracker, R: HeapTracer = NoopTracer> {
    entries: Vec<Option<HeapValue>>,
    /// IDs of freed slots available for reuse. Populated on free, consumed by `allocate`.
    free_list: Vec<HeapId>,
    tracker: T,
    tracer: R,
    /// Last epoch handed out by `next_epoch`; zero before the first.
    last_epoch: u32,
    /// True between the two sweep passes. Headers reaching refcount zero meanwhile are
    /// emptied at once and freed by the second pass.
    in_sweep: bool,
    deferred_headers: Vec<HeapId>,
    /// Remaining nesting budget for value equality, reset to the tracker's nesting limit
    /// for each top-level comparison. Shrinks each time it is hit so recursive structures
    /// bail out faster on the next comparison.
    equal_recurse_limit: Cell<usize>,
    equal_depth: Cell<usize>,
}

impl<T: ResourceTracker> Heap<T, NoopTracer> {
    /// Creates an empty heap with the given resource tracker and no tracing.
    pub fn new(tracker: T) -> Self {
        Self::with_tracer(tracker, NoopTracer)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(NoLimitTracker)
    }
}

impl<T: ResourceTracker, R: HeapTracer> Heap<T, R> {
    pub fn with_tracer(tracker: T, tracer: R) -> Self {
        let equal_limit = tracker.nesting_limit();
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            tracker,
            tracer,
            last_epoch: 0,
            in_sweep: false,
            deferred_headers: Vec::new(),
            equal_recurse_limit: Cell::new(equal_limit),
            equal_depth: Cell::new(0),
        }
    }

    /// Tears the heap down and makes it reusable.
    ///
    /// Every container is dropped without refcount bookkeeping and the registry is
    /// emptied; all outstanding `HeapId`s become invalid.
    pub fn reset(&mut self, tracker: T) {
        self.entries.clear();
        self.free_list.clear();
        self.deferred_headers.clear();
        self.tracker = tracker;
        self.last_epoch = 0;
        self.in_sweep = false;
        self.equal_recurse_limit.set(self.tracker.nesting_limit());
        self.equal_depth.set(0);
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    #[must_use]
    pub fn tracer(&self) -> &R {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut R {
        &mut self.tracer
    }

    /// Allocates and registers a new container with refcount zero.
    pub(crate) fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        self.tracker.on_allocate(|| data.estimate_size())?;
        let kind = data.kind();
        let new_entry = HeapValue {
            refcount: Cell::new(0),
            epoch_id: Cell::new(None),
            epoch_copy: Cell::new(None),
            data,
        };

        let id = if let Some(id) = self.free_list.pop() {
            self.entries[id.index()] = Some(new_entry);
            id
        } else {
            let id = HeapId(self.entries.len());
            self.entries.push(Some(new_entry));
            id
        };
        self.tracer.on_alloc(id, kind);
        Ok(id)
    }

    fn header(&self, id: HeapId, func: &'static str) -> &HeapValue {
        match self.entries.get(id.index()) {
            Some(Some(value)) => value,
            Some(None) => panic!("Heap::{func}: object already freed"),
            None => panic!("Heap::{func}: slot missing"),
        }
    }

    /// Returns the container stored at `id`.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the container has already been freed.
    pub(crate) fn get(&self, id: HeapId) -> &HeapData {
        &self.header(id, "get").data
    }

    /// Mutable counterpart of [`Heap::get`].
    pub(crate) fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        match self.entries.get_mut(id.index()) {
            Some(Some(value)) => &mut value.data,
            Some(None) => panic!("Heap::get_mut: object already freed"),
            None => panic!("Heap::get_mut: slot missing"),
        }
    }

    /// Returns whether `id` is registered, i.e. allocated and its header not yet released.
    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        matches!(self.entries.get(id.index()), Some(Some(_)))
    }

    #[must_use]
    pub fn kind(&self, id: HeapId) -> ContainerKind {
        self.get(id).kind()
    }

    /// Returns the reference count of a live container.
    #[must_use]
    pub fn refcount(&self, id: HeapId) -> usize {
        self.header(id, "refcount").refcount.get()
    }

    /// Iterates the IDs of every registered container, in slot order.
    pub fn registry(&self) -> impl Iterator<Item = HeapId> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| HeapId(index))
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            free_slots: self.free_list.len(),
            total_slots: self.entries.len(),
            ..HeapStats::default()
        };
        for value in self.entries.iter().flatten() {
            match value.data {
                HeapData::Dict(_) => stats.live_dicts += 1,
                HeapData::List(_) => stats.live_lists += 1,
            }
        }
        stats
    }

    /// Increments the reference count of a live container.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the container has already been freed.
    pub fn retain(&self, id: HeapId) {
        let refcount = &self.header(id, "retain").refcount;
        refcount.set(refcount.get() + 1);
    }

    /// Retains `id` and wraps it in an owning [`Value`].
    #[must_use]
    pub fn new_ref(&self, id: HeapId) -> Value {
        self.retain(id);
        Value::Ref(id)
    }

    /// Decrements the reference count without ever freeing.
    ///
    /// Used to hand back a container that was held only for the duration of its own
    /// construction, so the caller sees the refcount of its real owners.
    pub(crate) fn unretain(&self, id: HeapId) {
        let refcount = &self.header(id, "unretain").refcount;
        refcount.set(refcount.get().saturating_sub(1));
    }

    /// Decrements the reference count and frees the container (plus children) once it
    /// drops to zero.
    ///
    /// While a sweep is in progress only the entries are released at once; the header
    /// stays registered until [`Heap::sweep_free_headers`] so no other unreachable
    /// container is left pointing at a freed slot.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the container has already been freed.
    pub fn release(&mut self, id: HeapId) {
        let value = self.header(id, "release");
        let count = value.refcount.get();
        if count > 1 {
            value.refcount.set(count - 1);
            return;
        }
        value.refcount.set(0);

        if self.in_sweep {
            self.deferred_headers.push(id);
            self.release_contents(id);
            return;
        }

        let Some(value) = self.entries[id.index()].take() else {
            return;
        };
        self.free_list.push(id);
        let kind = value.data.kind();
        self.tracker.on_free(|| value.data.estimate_size());
        self.tracer.on_free(id, kind);

        let mut data = value.data;
        for child in data.drain_values() {
            child.drop_with_heap(self);
        }
    }

    /// Empties a container that failed mid-construction and releases the caller's hold.
    ///
    /// The container must be held (refcount >= 1) by the caller. Its entries are released
    /// first, so edges that point back at the container itself are gone before the final
    /// release decides whether to free it.
    pub(crate) fn discard(&mut self, id: HeapId) {
        self.release_contents(id);
        self.release(id);
    }

    /// Releases every value stored in `id`, keeping the header registered.
    fn release_contents(&mut self, id: HeapId) {
        let children = self.get_mut(id).drain_values();
        for child in children {
            child.drop_with_heap(self);
        }
    }

    /// Hands out a fresh epoch.
    ///
    /// When the counter wraps, every stamp in the registry is cleared before epoch 1 is
    /// reused, so a stale stamp can never alias a new pass.
    pub fn next_epoch(&mut self) -> Epoch {
        let epoch = if let Some(epoch) = NonZeroU32::new(self.last_epoch.wrapping_add(1)) {
            epoch
        } else {
            self.clear_epoch_stamps();
            NonZeroU32::MIN
        };
        self.last_epoch = epoch.get();
        Epoch(epoch)
    }

    fn clear_epoch_stamps(&self) {
        for value in self.entries.iter().flatten() {
            value.epoch_id.set(None);
            value.epoch_copy.set(None);
        }
    }

    /// Returns the last epoch stamped on `id`.
    #[must_use]
    pub fn epoch_of(&self, id: HeapId) -> Option<Epoch> {
        self.header(id, "epoch_of").epoch_id.get()
    }

    /// Stamps `id` with `epoch`. Returns false if it already carried that stamp.
    ///
    /// This is the primitive a root scanner uses: recurse into the children of `id` only
    /// when this returns true, so shared and cyclic structure is visited once.
    pub fn mark(&self, id: HeapId, epoch: Epoch) -> bool {
        let value = self.header(id, "mark");
        if value.epoch_id.get() == Some(epoch) {
            return false;
        }
        value.epoch_id.set(Some(epoch));
        value.epoch_copy.set(None);
        true
    }

    /// Records that `source` was copied to `copy` under `epoch`.
    pub(crate) fn stamp_copy(&self, source: HeapId, epoch: Epoch, copy: HeapId) {
        let value = self.header(source, "stamp_copy");
        value.epoch_id.set(Some(epoch));
        value.epoch_copy.set(Some(copy));
    }

    /// Returns the copy made of `source` under `epoch`, if any.
    pub(crate) fn copy_for_epoch(&self, source: HeapId, epoch: Epoch) -> Option<HeapId> {
        let value = self.header(source, "copy_for_epoch");
        if value.epoch_id.get() == Some(epoch) {
            value.epoch_copy.get()
        } else {
            None
        }
    }

    /// Marks every container reachable from `roots` with `epoch`.
    ///
    /// IDs that are not registered are skipped.
    pub fn mark_reachable(&self, roots: impl IntoIterator<Item = HeapId>, epoch: Epoch) {
        let mut work_list: SmallVec<[HeapId; 16]> = roots.into_iter().collect();
        while let Some(id) = work_list.pop() {
            if !self.is_live(id) || !self.mark(id, epoch) {
                continue;
            }
            self.get(id).collect_child_ids(&mut work_list);
        }
    }

    /// First sweep pass: releases the entries of every registered container whose stamp
    /// is not `epoch`, leaving its header registered.
    ///
    /// Breaking every outgoing edge of the unreachable set before any header is freed is
    /// what makes cycles safe to reclaim.
    pub fn sweep_release_unmarked(&mut self, epoch: Epoch) -> PendingSweep {
        self.in_sweep = true;
        let emptied: Vec<HeapId> = (0..self.entries.len())
            .filter(|&index| self.is_unmarked(index, epoch))
            .map(HeapId)
            .collect();
        for &id in &emptied {
            self.tracer.on_sweep_release(id, epoch);
            self.release_contents(id);
        }
        PendingSweep { epoch, emptied }
    }

    /// Second sweep pass: releases and unregisters the header of every container emptied
    /// by the first pass, then every header deferred during the sweep that is still at
    /// refcount zero.
    ///
    /// Containers allocated or re-stamped between the passes are left alone. Headers are
    /// never freed while a sweep is open, so the recorded ids still name the same slots.
    ///
    /// Returns the number of headers freed.
    pub fn sweep_free_headers(&mut self, pending: PendingSweep) -> usize {
        let PendingSweep { emptied, .. } = pending;
        let mut freed = 0;
        for id in emptied {
            if self.is_live(id) {
                self.free_header(id);
                freed += 1;
            }
        }
        while let Some(id) = self.deferred_headers.pop() {
            if self.is_live(id) && self.refcount(id) == 0 {
                self.free_header(id);
                freed += 1;
            }
        }
        self.in_sweep = false;
        freed
    }

    /// Runs a full collection: fresh epoch, mark from `roots`, then both sweep passes.
    ///
    /// Returns the number of headers freed.
    pub fn collect_garbage(&mut self, roots: impl IntoIterator<Item = HeapId>) -> usize {
        let epoch = self.next_epoch();
        self.mark_reachable(roots, epoch);
        let pending = self.sweep_release_unmarked(epoch);
        self.sweep_free_headers(pending)
    }

    fn is_unmarked(&self, index: usize, epoch: Epoch) -> bool {
        matches!(&self.entries[index], Some(value) if value.epoch_id.get() != Some(epoch))
    }

    fn free_header(&mut self, id: HeapId) {
        let Some(value) = self.entries[id.index()].take() else {
            return;
        };
        self.free_list.push(id);
        self.tracker.on_free(|| value.data.estimate_size());
        self.tracer.on_sweep_free(id);

        // Normally already empty after the first pass.
        let mut data = value.data;
        for child in data.drain_values() {
            child.drop_with_heap(self);
        }
    }

    /// Starts a top-level equality comparison with the full nesting budget.
    pub(crate) fn reset_equal_limit(&self) {
        self.equal_recurse_limit.set(self.tracker.nesting_limit());
    }

    /// Returns true when equality recursion is too deep; the limit shrinks each time.
    pub(crate) fn equal_limit_reached(&self) -> bool {
        let limit = self.equal_recurse_limit.get();
        if self.equal_depth.get() >= limit {
            self.equal_recurse_limit.set(limit.saturating_sub(1));
            true
        } else {
            false
        }
    }

    pub(crate) fn equal_enter(&self) {
        self.equal_depth.set(self.equal_depth.get() + 1);
    }

    pub(crate) fn equal_exit(&self) {
        self.equal_depth.set(self.equal_depth.get().saturating_sub(1));
    }

    #[cfg(test)]
    pub(crate) fn set_last_epoch(&mut self, epoch: u32) {
        self.last_epoch = epoch;
    }
}

/// Trait for types that require heap access for proper cleanup.
///
/// Rust's standard `Drop` trait cannot decrement heap reference counts because it has no
/// access to the `Heap`. This trait provides an explicit drop-with-heap method so that
/// ref-counted values (and containers of them) can properly decrement their counts when
/// they are no longer needed. A missed call leaks a reference.
pub trait DropWithHeap<T: ResourceTracker, R: HeapTracer> {
    /// Consume `self` and decrement reference counts for any heap references contained within.
    fn drop_with_heap(self, heap: &mut Heap<T, R>);
}

impl<T: ResourceTracker, R: HeapTracer> DropWithHeap<T, R> for Value {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap<T, R>) {
        Self::drop_with_heap(self, heap);
    }
}

impl<T: ResourceTracker, R: HeapTracer, U: DropWithHeap<T, R>> DropWithHeap<T, R> for Option<U> {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap<T, R>) {
        if let Some(value) = self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker, R: HeapTracer, U: DropWithHeap<T, R>> DropWithHeap<T, R> for Vec<U> {
    fn drop_with_heap(self, heap: &mut Heap<T, R>) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker, R: HeapTracer, U: DropWithHeap<T, R>> DropWithHeap<T, R> for vec::IntoIter<U> {
    fn drop_with_heap(self, heap: &mut Heap<T, R>) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker, R: HeapTracer, K> DropWithHeap<T, R> for (K, Value) {
    fn drop_with_heap(self, heap: &mut Heap<T, R>) {
        self.1.drop_with_heap(heap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_slots_are_reused() {
        let mut heap = Heap::default();
        let a = heap.dict_alloc().unwrap();
        heap.retain(a);
        heap.release(a);
        assert!(!heap.is_live(a));
        assert_eq!(heap.stats().free_slots, 1);

        let b = heap.dict_alloc().unwrap();
        assert_eq!(a, b, "free list slot should be reused");
        assert_eq!(heap.stats().free_slots, 0);
    }

    #[test]
    fn epoch_wrap_clears_stale_stamps() {
        let mut heap = Heap::default();
        let d = heap.dict_alloc().unwrap();
        let first = heap.next_epoch();
        assert_eq!(first.get(), 1);
        assert!(heap.mark(d, first));

        heap.set_last_epoch(u32::MAX);
        let wrapped = heap.next_epoch();
        assert_eq!(wrapped, first);
        assert_eq!(heap.epoch_of(d), None, "wrap must clear the old stamp of epoch 1");
        assert!(heap.mark(d, wrapped));
    }

    #[test]
    fn mark_reports_already_visited() {
        let mut heap = Heap::default();
        let d = heap.dict_alloc().unwrap();
        let epoch = heap.next_epoch();
        assert!(heap.mark(d, epoch));
        assert!(!heap.mark(d, epoch));
        let later = heap.next_epoch();
        assert!(heap.mark(d, later));
    }

    #[test]
    fn release_during_sweep_defers_the_header() {
        let mut heap = Heap::default();
        let root = heap.dict_alloc().unwrap();
        heap.retain(root);
        let child = heap.dict_alloc().unwrap();
        heap.dict_insert_dict(root, "child", child).unwrap();
        heap.dict_insert_number(child, "n", 1).unwrap();

        let epoch = heap.next_epoch();
        heap.mark_reachable([root], epoch);
        let pending = heap.sweep_release_unmarked(epoch);
        assert!(!pending.released());

        // A reachable container dropped to zero mid-sweep keeps its header until pass two.
        heap.dict_remove(root, "child").unwrap();
        assert!(heap.is_live(child));
        assert_eq!(heap.dict_len(Some(child)), 0);

        assert_eq!(heap.sweep_free_headers(pending), 1);
        assert!(!heap.is_live(child));
        assert!(heap.is_live(root));
    }

    #[test]
    fn allocation_between_passes_survives() {
        let mut heap = Heap::default();
        let root = heap.dict_alloc().unwrap();
        heap.retain(root);

        let epoch = heap.next_epoch();
        heap.mark_reachable([root], epoch);
        let pending = heap.sweep_release_unmarked(epoch);

        // Never stamped with the sweep epoch, but reachable from the marked root.
        let fresh = heap.dict_alloc().unwrap();
        heap.dict_insert_dict(root, "fresh", fresh).unwrap();

        assert_eq!(heap.sweep_free_headers(pending), 0);
        assert!(heap.is_live(fresh));
        assert_eq!(heap.refcount(fresh), 1);

        heap.release(root);
        assert!(!heap.is_live(root));
        assert!(!heap.is_live(fresh));
    }

    #[test]
    fn echo_between_passes_keeps_the_root() {
        let mut heap = Heap::default();
        let root = heap.dict_alloc().unwrap();
        heap.retain(root);
        heap.dict_insert_number(root, "n", 1).unwrap();
        let garbage = heap.dict_alloc().unwrap();

        let epoch = heap.next_epoch();
        heap.mark_reachable([root], epoch);
        let pending = heap.sweep_release_unmarked(epoch);
        assert!(pending.released());

        // Formatting takes a newer epoch and re-stamps the root.
        assert_eq!(heap.echo(&Value::Ref(root)).as_deref(), Some("{'n': 1}"));
        assert_ne!(heap.epoch_of(root), Some(epoch));

        assert_eq!(heap.sweep_free_headers(pending), 1);
        assert!(heap.is_live(root));
        assert!(!heap.is_live(garbage));
        assert_eq!(heap.dict_len(Some(root)), 1);
    }
}
