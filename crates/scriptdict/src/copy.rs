//! Shallow and deep copies of containers.
//!
//! A deep copy run under an [`Epoch`] records `source -> copy` on each source header as it
//! goes. When a nested reference points at a source that already carries the stamp, the
//! existing copy is reused, so shared substructure stays shared and cycles come out as
//! isomorphic cycles. Without an epoch every occurrence is copied again, and a cycle only
//! ends at the nesting limit.
//!
//! The copy under construction is held by the engine until it is complete. On any
//! failure it is emptied and released, so no partially built container survives.

use std::vec;

use crate::{
    error::DictResult,
    heap::{ContainerKind, DropWithHeap, Epoch, Heap, HeapId},
    resource::{ResourceError, ResourceTracker},
    tracer::HeapTracer,
    value::Value,
};

impl Value {
    /// Deep-copies a value. Scalars are duplicated; containers are copied recursively,
    /// memoized under `epoch` when one is given.
    ///
    /// The result owns one reference.
    pub fn deep_copy(
        &self,
        heap: &mut Heap<impl ResourceTracker, impl HeapTracer>,
        epoch: Option<Epoch>,
    ) -> DictResult<Self> {
        self.deep_copy_at(heap, epoch, 0)
    }

    fn deep_copy_at(
        &self,
        heap: &mut Heap<impl ResourceTracker, impl HeapTracer>,
        epoch: Option<Epoch>,
        depth: usize,
    ) -> DictResult<Self> {
        let Self::Ref(id) = self else {
            return Ok(self.clone_immediate());
        };
        let limit = heap.tracker().nesting_limit();
        if depth >= limit {
            return Err(ResourceError::Nesting { limit, depth: depth + 1 }.into());
        }
        if let Some(epoch) = epoch
            && let Some(copy) = heap.copy_for_epoch(*id, epoch)
        {
            return Ok(heap.new_ref(copy));
        }
        let copy = match heap.kind(*id) {
            ContainerKind::Dict => heap.dict_copy_at(*id, true, epoch, depth + 1)?,
            ContainerKind::List => heap.list_copy_at(*id, true, epoch, depth + 1)?,
        };
        Ok(heap.new_ref(copy))
    }
}

impl<T: ResourceTracker, R: HeapTracer> Heap<T, R> {
    /// Copies a dictionary into a new one with refcount zero; the caller must retain it.
    ///
    /// Entries of the copy get default flags and the copy is unlocked. A shallow copy
    /// shares nested containers with the source; a deep copy duplicates them.
    pub fn dict_copy(&mut self, source: HeapId, deep: bool, epoch: Option<Epoch>) -> DictResult<HeapId> {
        self.dict_copy_at(source, deep, epoch, 0)
    }

    /// List counterpart of [`Heap::dict_copy`].
    pub fn list_copy(&mut self, source: HeapId, deep: bool, epoch: Option<Epoch>) -> DictResult<HeapId> {
        self.list_copy_at(source, deep, epoch, 0)
    }

    fn dict_copy_at(&mut self, source: HeapId, deep: bool, epoch: Option<Epoch>, depth: usize) -> DictResult<HeapId> {
        let snapshot: Vec<(Box<str>, Value)> = self
            .dict(source)?
            .iter()
            .map(|(key, value)| (Box::from(key), value.clone_with_heap(self)))
            .collect();
        let copy = match self.dict_alloc() {
            Ok(copy) => copy,
            Err(err) => {
                snapshot.drop_with_heap(self);
                return Err(err);
            }
        };
        self.begin_copy(source, copy, epoch);

        let mut pending = snapshot.into_iter();
        let result = self.fill_dict_copy(copy, &mut pending, deep, epoch, depth);
        self.finish_copy(source, copy, deep, result, pending)
    }

    fn list_copy_at(&mut self, source: HeapId, deep: bool, epoch: Option<Epoch>, depth: usize) -> DictResult<HeapId> {
        let snapshot: Vec<Value> = self.list(source)?.iter().map(|value| value.clone_with_heap(self)).collect();
        let copy = match self.list_alloc() {
            Ok(copy) => copy,
            Err(err) => {
                snapshot.drop_with_heap(self);
                return Err(err);
            }
        };
        self.begin_copy(source, copy, epoch);

        let mut pending = snapshot.into_iter();
        let result = self.fill_list_copy(copy, &mut pending, deep, epoch, depth);
        self.finish_copy(source, copy, deep, result, pending)
    }

    fn begin_copy(&mut self, source: HeapId, copy: HeapId, epoch: Option<Epoch>) {
        // Held until complete so a nested failure releasing a back-edge cannot free it.
        self.retain(copy);
        if let Some(epoch) = epoch {
            self.stamp_copy(source, epoch, copy);
        }
    }

    fn finish_copy<P: DropWithHeap<T, R>>(
        &mut self,
        source: HeapId,
        copy: HeapId,
        deep: bool,
        result: DictResult<()>,
        pending: P,
    ) -> DictResult<HeapId> {
        match result {
            Ok(()) => {
                pending.drop_with_heap(self);
                self.unretain(copy);
                self.tracer_mut().on_copy(source, copy, deep);
                Ok(copy)
            }
            Err(err) => {
                pending.drop_with_heap(self);
                self.discard(copy);
                Err(err)
            }
        }
    }

    fn fill_dict_copy(
        &mut self,
        copy: HeapId,
        pending: &mut vec::IntoIter<(Box<str>, Value)>,
        deep: bool,
        epoch: Option<Epoch>,
        depth: usize,
    ) -> DictResult<()> {
        for (key, value) in pending.by_ref() {
            let value = self.copy_entry_value(value, deep, epoch, depth)?;
            self.dict_insert(copy, &key, value)?;
        }
        Ok(())
    }

    fn fill_list_copy(
        &mut self,
        copy: HeapId,
        pending: &mut vec::IntoIter<Value>,
        deep: bool,
        epoch: Option<Epoch>,
        depth: usize,
    ) -> DictResult<()> {
        for value in pending.by_ref() {
            let value = self.copy_entry_value(value, deep, epoch, depth)?;
            self.list_append(copy, value)?;
        }
        Ok(())
    }

    /// Turns one snapshotted source value into the value stored in the copy.
    fn copy_entry_value(&mut self, value: Value, deep: bool, epoch: Option<Epoch>, depth: usize) -> DictResult<Value> {
        if let Err(err) = self.tracker().check_interrupt() {
            value.drop_with_heap(self);
            return Err(err.into());
        }
        if !deep {
            return Ok(value);
        }
        let copied = value.deep_copy_at(self, epoch, depth);
        value.drop_with_heap(self);
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_copy_reports_only_external_references() {
        let mut heap = Heap::default();
        let source = heap.dict_alloc().unwrap();
        heap.retain(source);
        heap.dict_insert_number(source, "n", 1).unwrap();

        let copy = heap.dict_copy(source, false, None).unwrap();
        assert_eq!(heap.refcount(copy), 0, "caller must retain the copy");
        assert_eq!(heap.refcount(source), 1);
    }

    #[test]
    fn epoch_stamp_records_the_copy() {
        let mut heap = Heap::default();
        let source = heap.dict_alloc().unwrap();
        heap.retain(source);
        let epoch = heap.next_epoch();
        let copy = heap.dict_copy(source, true, Some(epoch)).unwrap();
        assert_eq!(heap.copy_for_epoch(source, epoch), Some(copy));

        let later = heap.next_epoch();
        assert_eq!(heap.copy_for_epoch(source, later), None);
    }
}
