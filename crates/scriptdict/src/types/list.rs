use crate::{
    error::{DictError, DictResult},
    heap::{Heap, HeapData, HeapId},
    resource::ResourceTracker,
    tracer::HeapTracer,
    types::LockLevel,
    value::Value,
};

/// An ordered sequence of values.
///
/// Lists exist here so dictionaries have something to nest besides themselves:
/// `dict_list` produces them and deep copies and equality recurse through them.
#[derive(Debug, Default)]
pub struct List {
    items: Vec<Value>,
    lock: LockLevel,
}

impl List {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    #[must_use]
    pub fn lock(&self) -> LockLevel {
        self.lock
    }

    pub fn set_lock(&mut self, lock: LockLevel) {
        self.lock = lock;
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    pub(crate) fn drain_values(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.items)
    }
}

impl<T: ResourceTracker, R: HeapTracer> Heap<T, R> {
    /// Allocates an empty list with refcount zero.
    pub fn list_alloc(&mut self) -> DictResult<HeapId> {
        Ok(self.allocate(HeapData::List(List::new()))?)
    }

    pub fn list(&self, id: HeapId) -> DictResult<&List> {
        match self.get(id) {
            HeapData::List(list) => Ok(list),
            HeapData::Dict(_) => Err(DictError::type_mismatch("expected a List, got a Dictionary")),
        }
    }

    pub fn list_mut(&mut self, id: HeapId) -> DictResult<&mut List> {
        match self.get_mut(id) {
            HeapData::List(list) => Ok(list),
            HeapData::Dict(_) => Err(DictError::type_mismatch("expected a List, got a Dictionary")),
        }
    }

    /// Appends an owned value. On failure the value is released.
    pub fn list_append(&mut self, id: HeapId, value: Value) -> DictResult<()> {
        if let Err(err) = self.tracker_mut().on_container_insert() {
            value.drop_with_heap(self);
            return Err(err.into());
        }
        match self.list_mut(id) {
            Ok(list) => {
                list.push(value);
                Ok(())
            }
            Err(err) => {
                value.drop_with_heap(self);
                Err(err)
            }
        }
    }

    /// Number of items; zero for `None` or a non-list.
    #[must_use]
    pub fn list_len(&self, id: Option<HeapId>) -> usize {
        id.and_then(|id| self.list(id).ok()).map_or(0, List::len)
    }

    /// Element-wise equality of two lists, in order.
    #[must_use]
    pub fn list_equal(&self, a: HeapId, b: HeapId, ignore_case: bool) -> bool {
        if a == b {
            return true;
        }
        let (Ok(a), Ok(b)) = (self.list(a), self.list(b)) else {
            return false;
        };
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equal(y, self, ignore_case, true))
    }
}
