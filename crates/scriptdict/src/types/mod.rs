//! Container types stored in the heap.

pub(crate) mod dict;
pub(crate) mod list;

pub use dict::{Dict, DictEntry, DictIter, DictListKind, EntryFlags, LockLevel, ScopeKind};
pub use list::List;
