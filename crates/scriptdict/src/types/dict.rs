use std::{
    borrow::Cow,
    fmt,
    hash::BuildHasher,
    sync::LazyLock,
    vec,
};

use ahash::RandomState;
use hashbrown::{HashTable, hash_table};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    error::{Denial, DictError, DictResult},
    heap::{ContainerKind, DropWithHeap, Heap, HeapData, HeapId},
    resource::ResourceTracker,
    tracer::HeapTracer,
    value::Value,
};

/// Hasher state shared by every dictionary so that key hashes are comparable between them.
static KEY_STATE: LazyLock<RandomState> =
    LazyLock::new(|| RandomState::with_seeds(0x243f_6a88, 0x85a3_08d3, 0x1319_8a2e, 0x0370_7344));

fn hash_key(key: &str) -> u64 {
    BuildHasher::hash_one(&*KEY_STATE, key)
}

/// Write-protection level of a value or container.
///
/// This is a language-level attribute set by `:lockvar` style commands, not a
/// synchronization primitive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, IntoStaticStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum LockLevel {
    #[default]
    Unlocked,
    /// No change at all: entries cannot be added, removed or overwritten.
    Locked,
    /// Entries cannot be added or removed, but existing values may change.
    Fixed,
}

impl LockLevel {
    pub(crate) fn denial(self) -> Option<Denial> {
        match self {
            Self::Unlocked => None,
            Self::Locked => Some(Denial::Locked),
            Self::Fixed => Some(Denial::Fixed),
        }
    }
}

/// Marks a dictionary that is a variable namespace of the scripting language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    /// A namespace such as `b:`, `w:` or `s:`: every key must be a valid variable name.
    Scope,
    /// The global or a function-local namespace: function references stored here also
    /// define callable names, so they must not shadow protected functions.
    Definition,
}

/// Per-entry mutation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryFlags {
    /// The value cannot be changed.
    pub read_only: bool,
    /// The entry cannot be removed.
    pub fixed: bool,
    /// Lock level of the stored value.
    pub lock: LockLevel,
}

/// One key/value slot of a [`Dict`].
///
/// The key is set at creation and never changes; the entry owns its value.
#[derive(Debug)]
pub struct DictEntry {
    key: Box<str>,
    hash: u64,
    value: Value,
    flags: EntryFlags,
}

impl DictEntry {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut EntryFlags {
        &mut self.flags
    }

    /// Swaps in a new value and hands back the old one, which the caller must drop with
    /// the heap.
    pub(crate) fn replace_value(&mut self, value: Value) -> Value {
        std::mem::replace(&mut self.value, value)
    }
}

/// Hashtable-backed dictionary with string keys.
///
/// Entries are stored directly in a `hashbrown::HashTable` keyed by a precomputed hash, so
/// lookups never rehash the stored keys. Iteration order is the table's bucket order:
/// stable while the dictionary is not mutated, otherwise unspecified.
#[derive(Debug, Default)]
pub struct Dict {
    table: HashTable<DictEntry>,
    lock: LockLevel,
    scope: Option<ScopeKind>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_lock(lock: LockLevel) -> Self {
        Self {
            lock,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    #[must_use]
    pub fn lock(&self) -> LockLevel {
        self.lock
    }

    pub fn set_lock(&mut self, lock: LockLevel) {
        self.lock = lock;
    }

    #[must_use]
    pub fn scope(&self) -> Option<ScopeKind> {
        self.scope
    }

    pub fn set_scope(&mut self, scope: Option<ScopeKind>) {
        self.scope = scope;
    }

    #[must_use]
    pub fn find(&self, key: &str) -> Option<&DictEntry> {
        self.table.find(hash_key(key), |entry| &*entry.key == key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut DictEntry> {
        self.table.find_mut(hash_key(key), |entry| &*entry.key == key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Adds a new entry. Gives the value back if the key is already present.
    pub(crate) fn add(&mut self, key: &str, value: Value, flags: EntryFlags) -> Result<(), Value> {
        let hash = hash_key(key);
        match self.table.entry(hash, |entry| &*entry.key == key, |entry| entry.hash) {
            hash_table::Entry::Occupied(_) => Err(value),
            hash_table::Entry::Vacant(vacant) => {
                vacant.insert(DictEntry {
                    key: key.into(),
                    hash,
                    value,
                    flags,
                });
                Ok(())
            }
        }
    }

    /// Detaches an entry. The caller owns its value from here on.
    pub(crate) fn take(&mut self, key: &str) -> Option<DictEntry> {
        let entry = self.table.find_entry(hash_key(key), |entry| &*entry.key == key).ok()?;
        Some(entry.remove().0)
    }

    /// Iterates `(key, value)` pairs in storage order.
    #[must_use]
    pub fn iter(&self) -> DictIter<'_> {
        DictIter {
            remaining: self.table.len(),
            inner: Some(self.table.iter()),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.table.iter().map(|entry| &*entry.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.table.iter().map(|entry| &entry.value)
    }

    pub(crate) fn drain_values(&mut self) -> Vec<Value> {
        self.table.drain().map(|entry| entry.value).collect()
    }

    /// Marks every entry read-only and fixed.
    pub fn set_items_read_only(&mut self) {
        for entry in self.table.iter_mut() {
            entry.flags.read_only = true;
            entry.flags.fixed = true;
        }
    }
}

/// External iterator over a dictionary's entries.
///
/// Captures the entry count at creation and yields exactly that many pairs. The borrow
/// on the heap keeps the dictionary from being mutated while the iterator is alive.
pub struct DictIter<'a> {
    remaining: usize,
    inner: Option<hash_table::Iter<'a, DictEntry>>,
}

impl fmt::Debug for DictIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictIter").field("remaining", &self.remaining).finish_non_exhaustive()
    }
}

impl DictIter<'_> {
    /// An iterator that is finished from the start.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            remaining: 0,
            inner: None,
        }
    }
}

impl<'a> Iterator for DictIter<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.inner.as_mut()?.next()?;
        self.remaining -= 1;
        Some((&*entry.key, &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for DictIter<'_> {}

/// What [`Heap::dict_list`] extracts from each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DictListKind {
    Keys,
    Values,
    /// `[key, value]` pair lists.
    Items,
}

fn expected_dict() -> DictError {
    DictError::type_mismatch("expected a Dictionary, got a List")
}

/// Truncates `s` to at most `len` bytes without splitting a character.
fn byte_prefix(s: &str, len: usize) -> &str {
    let mut end = len.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl<T: ResourceTracker, R: HeapTracer> Heap<T, R> {
    /// Allocates an empty, unlocked dictionary with refcount zero. The caller must retain it.
    pub fn dict_alloc(&mut self) -> DictResult<HeapId> {
        Ok(self.allocate(HeapData::Dict(Dict::new()))?)
    }

    pub fn dict_alloc_locked(&mut self, lock: LockLevel) -> DictResult<HeapId> {
        Ok(self.allocate(HeapData::Dict(Dict::with_lock(lock)))?)
    }

    /// Allocates an empty scope dictionary.
    pub fn dict_alloc_scope(&mut self, scope: ScopeKind) -> DictResult<HeapId> {
        let mut dict = Dict::new();
        dict.set_scope(Some(scope));
        Ok(self.allocate(HeapData::Dict(dict))?)
    }

    pub fn dict(&self, id: HeapId) -> DictResult<&Dict> {
        match self.get(id) {
            HeapData::Dict(dict) => Ok(dict),
            HeapData::List(_) => Err(expected_dict()),
        }
    }

    pub fn dict_mut(&mut self, id: HeapId) -> DictResult<&mut Dict> {
        match self.get_mut(id) {
            HeapData::Dict(dict) => Ok(dict),
            HeapData::List(_) => Err(expected_dict()),
        }
    }

    /// Inserts an owned value under a new key with default flags.
    ///
    /// Fails with `DuplicateKey` when the key exists or `OutOfMemory` when the tracker
    /// refuses the entry; either way the dictionary is unchanged and the value is released.
    pub fn dict_insert(&mut self, id: HeapId, key: &str, value: Value) -> DictResult<()> {
        if let Err(err) = self.tracker_mut().on_container_insert() {
            value.drop_with_heap(self);
            return Err(err.into());
        }
        let result = match self.get_mut(id) {
            HeapData::Dict(dict) => dict
                .add(key, value, EntryFlags::default())
                .map_err(|value| (DictError::duplicate_key(key), value)),
            HeapData::List(_) => Err((expected_dict(), value)),
        };
        result.map_err(|(err, value)| {
            value.drop_with_heap(self);
            err
        })
    }

    /// Inserts a copy of `value`; containers gain a reference.
    pub fn dict_insert_value(&mut self, id: HeapId, key: &str, value: &Value) -> DictResult<()> {
        let value = value.clone_with_heap(self);
        self.dict_insert(id, key, value)
    }

    pub fn dict_insert_number(&mut self, id: HeapId, key: &str, number: i64) -> DictResult<()> {
        self.dict_insert(id, key, Value::Number(number))
    }

    pub fn dict_insert_bool(&mut self, id: HeapId, key: &str, value: bool) -> DictResult<()> {
        self.dict_insert(id, key, Value::Bool(value))
    }

    pub fn dict_insert_string(&mut self, id: HeapId, key: &str, value: &str) -> DictResult<()> {
        self.dict_insert(id, key, Value::Str(value.to_owned()))
    }

    /// Inserts at most the first `len` bytes of `value`, backing off to a character boundary.
    pub fn dict_insert_string_len(&mut self, id: HeapId, key: &str, value: &str, len: usize) -> DictResult<()> {
        self.dict_insert_string(id, key, byte_prefix(value, len))
    }

    pub fn dict_insert_func(&mut self, id: HeapId, key: &str, name: &str) -> DictResult<()> {
        self.dict_insert(id, key, Value::Func(name.to_owned()))
    }

    /// Inserts a list, adding a reference to it.
    pub fn dict_insert_list(&mut self, id: HeapId, key: &str, list: HeapId) -> DictResult<()> {
        self.list(list)?;
        let value = self.new_ref(list);
        self.dict_insert(id, key, value)
    }

    /// Inserts a dictionary, adding a reference to it.
    pub fn dict_insert_dict(&mut self, id: HeapId, key: &str, dict: HeapId) -> DictResult<()> {
        self.dict(dict)?;
        let value = self.new_ref(dict);
        self.dict_insert(id, key, value)
    }

    /// Looks up an entry. A non-dictionary is treated as empty.
    #[must_use]
    pub fn dict_find(&self, id: HeapId, key: &str) -> Option<&DictEntry> {
        self.dict(id).ok()?.find(key)
    }

    #[must_use]
    pub fn dict_has_key(&self, id: HeapId, key: &str) -> bool {
        self.dict_find(id, key).is_some()
    }

    /// Number of entries; `None` (a null dictionary) has length zero.
    #[must_use]
    pub fn dict_len(&self, id: Option<HeapId>) -> usize {
        id.and_then(|id| self.dict(id).ok()).map_or(0, Dict::len)
    }

    /// Privileged removal: detaches and releases an entry without checking its flags.
    ///
    /// Callers that act for the user check the mutation policy first (see
    /// [`Heap::dict_remove_checked`]). Removing a key that is not present means the caller
    /// and the dictionary disagree, which is reported as `InternalConsistency`.
    pub fn dict_remove(&mut self, id: HeapId, key: &str) -> DictResult<()> {
        let Some(entry) = self.dict_mut(id)?.take(key) else {
            return Err(DictError::internal(&format!("removing missing dictionary entry {key:?}")));
        };
        entry.value.drop_with_heap(self);
        Ok(())
    }

    /// User-facing removal that enforces the mutation policy, returning the removed value.
    pub fn dict_remove_checked(&mut self, id: HeapId, key: &str) -> DictResult<Value> {
        let dict = self.dict(id)?;
        if let Some(denial) = dict.lock().denial() {
            return Err(DictError::mutation_denied(denial, key));
        }
        let Some(entry) = dict.find(key) else {
            return Err(DictError::key_not_found(key));
        };
        if entry.flags.fixed {
            return Err(DictError::mutation_denied(Denial::Fixed, key));
        }
        if entry.flags.read_only {
            return Err(DictError::mutation_denied(Denial::ReadOnly, key));
        }
        match self.dict_mut(id)?.take(key) {
            Some(entry) => Ok(entry.value),
            None => Err(DictError::internal("entry vanished during removal")),
        }
    }

    /// Returns a retained copy of the value stored under `key`.
    #[must_use]
    pub fn dict_get_value(&self, id: HeapId, key: &str) -> Option<Value> {
        self.dict_find(id, key).map(|entry| entry.value.clone_with_heap(self))
    }

    /// Reads a number, returning `default` when the key is missing and -1 when the stored
    /// value cannot be converted.
    #[must_use]
    pub fn dict_get_number(&self, id: HeapId, key: &str, default: i64) -> i64 {
        match self.dict_find(id, key) {
            Some(entry) => entry.value.to_number(self).unwrap_or(-1),
            None => default,
        }
    }

    /// Reads a value that must be a Number. A missing key reads as zero; any other stored
    /// type is a `TypeMismatch`, which callers treat as zero after reporting it.
    pub fn dict_get_number_checked(&self, id: HeapId, key: &str) -> DictResult<i64> {
        match self.dict_find(id, key).map(DictEntry::value) {
            None => Ok(0),
            Some(Value::Number(n)) => Ok(*n),
            Some(other) => Err(DictError::type_mismatch(format!(
                "invalid argument: {key} is a {}, expected a Number",
                other.type_name(self)
            ))),
        }
    }

    /// Reads the string form of the value under `key`.
    ///
    /// Strings are borrowed and numbers converted; `None` when the key is missing or the
    /// value has no string form. Call `into_owned` to keep a copy.
    #[must_use]
    pub fn dict_get_string(&self, id: HeapId, key: &str) -> Option<Cow<'_, str>> {
        self.dict_find(id, key)?.value.to_str(self).ok()
    }

    pub fn dict_set_items_read_only(&mut self, id: HeapId) -> DictResult<()> {
        self.dict_mut(id)?.set_items_read_only();
        Ok(())
    }

    /// Starts an external iteration. `None` or a non-dictionary yields nothing.
    #[must_use]
    pub fn dict_iter(&self, id: Option<HeapId>) -> DictIter<'_> {
        match id.map(|id| self.get(id)) {
            Some(HeapData::Dict(dict)) => dict.iter(),
            _ => DictIter::empty(),
        }
    }

    /// Renders `{k1: v1, k2: v2}` with quoted keys and echo-formatted values.
    ///
    /// Returns `None` if the interrupt flag is raised or a nested value cannot be
    /// formatted; nothing partial escapes.
    pub fn dict_stringify(&mut self, id: HeapId) -> Option<String> {
        if self.kind(id) != ContainerKind::Dict {
            return None;
        }
        let epoch = self.next_epoch();
        let mut out = String::new();
        self.fmt_container(id, epoch, 0, &mut out).ok()?;
        Some(out)
    }

    /// Builds a new list of the keys, values or `[key, value]` pairs of a dictionary.
    ///
    /// Returns an owned `Value::Ref` to the list. Interrupt or allocation failure releases
    /// everything built so far.
    pub fn dict_list(&mut self, id: HeapId, what: DictListKind) -> DictResult<Value> {
        let snapshot: Vec<(String, Option<Value>)> = self
            .dict(id)?
            .iter()
            .map(|(key, value)| {
                let value = (what != DictListKind::Keys).then(|| value.clone_with_heap(self));
                (key.to_owned(), value)
            })
            .collect();

        let list = match self.list_alloc() {
            Ok(list) => list,
            Err(err) => {
                for (_, value) in snapshot {
                    value.drop_with_heap(self);
                }
                return Err(err);
            }
        };
        let result = self.new_ref(list);
        let mut pending = snapshot.into_iter();
        if let Err(err) = self.fill_dict_list(list, what, &mut pending) {
            for (_, value) in pending {
                value.drop_with_heap(self);
            }
            result.drop_with_heap(self);
            return Err(err);
        }
        Ok(result)
    }

    fn fill_dict_list(
        &mut self,
        list: HeapId,
        what: DictListKind,
        pending: &mut vec::IntoIter<(String, Option<Value>)>,
    ) -> DictResult<()> {
        for (key, value) in pending.by_ref() {
            if let Err(err) = self.tracker().check_interrupt() {
                value.drop_with_heap(self);
                return Err(err.into());
            }
            match (what, value) {
                (DictListKind::Values, Some(value)) => self.list_append(list, value)?,
                (DictListKind::Items, Some(value)) => self.append_item_pair(list, key, value)?,
                (_, value) => {
                    value.drop_with_heap(self);
                    self.list_append(list, Value::Str(key))?;
                }
            }
        }
        Ok(())
    }

    fn append_item_pair(&mut self, list: HeapId, key: String, value: Value) -> DictResult<()> {
        let pair = match self.list_alloc() {
            Ok(pair) => pair,
            Err(err) => {
                value.drop_with_heap(self);
                return Err(err);
            }
        };
        let pair_ref = self.new_ref(pair);
        if let Err(err) = self.list_append(pair, Value::Str(key)) {
            value.drop_with_heap(self);
            pair_ref.drop_with_heap(self);
            return Err(err);
        }
        if let Err(err) = self.list_append(pair, value) {
            pair_ref.drop_with_heap(self);
            return Err(err);
        }
        self.list_append(list, pair_ref)
    }
}
