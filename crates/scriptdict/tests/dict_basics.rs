//! Tests for the dictionary container: insertion, lookup, removal, accessors and iteration.

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use scriptdict::{DictListKind, ErrorKind, Heap, HeapId, LockLevel, Value};

/// Allocates a dictionary and takes one reference to it.
fn new_dict(heap: &mut Heap) -> HeapId {
    let id = heap.dict_alloc().unwrap();
    heap.retain(id);
    id
}

// =============================================================================
// 1. Insertion and uniqueness
// =============================================================================

/// Inserting a key twice fails the second time and leaves the length unchanged.
#[test]
fn duplicate_insert_is_rejected() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_number(d, "k", 1).unwrap();

    let err = heap.dict_insert_number(d, "k", 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateKey);
    assert_eq!(err.subject(), Some("k"));
    assert_eq!(heap.dict_len(Some(d)), 1);
    assert_eq!(heap.dict_get_number(d, "k", 0), 1, "first value must survive");
}

/// A rejected container insert must not leave an extra reference behind.
#[test]
fn duplicate_container_insert_releases_the_value() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    let inner = new_dict(&mut heap);
    heap.dict_insert_dict(d, "inner", inner).unwrap();
    assert_eq!(heap.refcount(inner), 2);

    assert!(heap.dict_insert_dict(d, "inner", inner).is_err());
    assert_eq!(heap.refcount(inner), 2);
}

/// Typed inserts store the expected value kinds.
#[test]
fn typed_inserts() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    let list = heap.list_alloc().unwrap();

    heap.dict_insert_number(d, "n", 7).unwrap();
    heap.dict_insert_bool(d, "b", true).unwrap();
    heap.dict_insert_string(d, "s", "text").unwrap();
    heap.dict_insert_string_len(d, "prefix", "héllo", 2).unwrap();
    heap.dict_insert_func(d, "f", "MyFunc").unwrap();
    heap.dict_insert_list(d, "l", list).unwrap();
    heap.dict_insert_value(d, "v", &Value::Float(0.5)).unwrap();

    assert_eq!(heap.dict_find(d, "n").unwrap().value(), &Value::Number(7));
    assert_eq!(heap.dict_find(d, "b").unwrap().value(), &Value::Bool(true));
    assert_eq!(heap.dict_find(d, "s").unwrap().value(), &Value::Str("text".to_owned()));
    // "é" is two bytes, so a two-byte prefix backs off to "h".
    assert_eq!(heap.dict_find(d, "prefix").unwrap().value(), &Value::Str("h".to_owned()));
    assert_eq!(heap.dict_find(d, "f").unwrap().value(), &Value::Func("MyFunc".to_owned()));
    assert_eq!(heap.dict_find(d, "l").unwrap().value(), &Value::Ref(list));
    assert_eq!(heap.dict_find(d, "v").unwrap().value(), &Value::Float(0.5));
    assert_eq!(heap.refcount(list), 1, "inserting a list retains it");
    assert_eq!(heap.dict_len(Some(d)), 7);
}

/// A list handle cannot be used where a dictionary is expected.
#[test]
fn inserting_into_a_list_is_a_type_mismatch() {
    let mut heap = Heap::default();
    let list = heap.list_alloc().unwrap();
    let err = heap.dict_insert_number(list, "k", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let d = new_dict(&mut heap);
    let err = heap.dict_insert_dict(d, "x", list).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(heap.dict_len(Some(d)), 0);
}

// =============================================================================
// 2. Lookup and accessors
// =============================================================================

/// A null dictionary has length zero and yields nothing.
#[test]
fn null_dictionary_is_empty() {
    let heap = Heap::default();
    assert_eq!(heap.dict_len(None), 0);
    assert_eq!(heap.dict_iter(None).count(), 0);
}

/// get_number falls back to the default for missing keys and converts other types.
#[test]
fn get_number_defaults_and_conversions() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_string(d, "digits", "12abc").unwrap();
    heap.dict_insert_bool(d, "yes", true).unwrap();
    heap.dict_insert_value(d, "float", &Value::Float(2.5)).unwrap();

    assert_eq!(heap.dict_get_number(d, "missing", 42), 42);
    assert_eq!(heap.dict_get_number(d, "digits", 0), 12);
    assert_eq!(heap.dict_get_number(d, "yes", 0), 1);
    assert_eq!(heap.dict_get_number(d, "float", 0), -1, "unconvertible values read as -1");
}

/// The checked accessor reports a type mismatch for anything but a Number.
#[test]
fn get_number_checked_rejects_non_numbers() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_number(d, "n", 5).unwrap();
    heap.dict_insert_string(d, "s", "5").unwrap();

    assert_eq!(heap.dict_get_number_checked(d, "n").unwrap(), 5);
    assert_eq!(heap.dict_get_number_checked(d, "missing").unwrap(), 0);
    let err = heap.dict_get_number_checked(d, "s").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(err.message(), "invalid argument: s is a String, expected a Number");
}

/// get_string borrows strings and renders numbers.
#[test]
fn get_string_forms() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_string(d, "s", "abc").unwrap();
    heap.dict_insert_number(d, "n", -4).unwrap();
    heap.dict_insert_func(d, "f", "F").unwrap();

    assert_eq!(heap.dict_get_string(d, "s").as_deref(), Some("abc"));
    assert_eq!(heap.dict_get_string(d, "n").as_deref(), Some("-4"));
    assert_eq!(heap.dict_get_string(d, "f"), None);
    assert_eq!(heap.dict_get_string(d, "missing"), None);
}

/// get_value hands out an extra reference to container values.
#[test]
fn get_value_retains_containers() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    let inner = heap.dict_alloc().unwrap();
    heap.dict_insert_dict(d, "inner", inner).unwrap();

    let value = heap.dict_get_value(d, "inner").unwrap();
    assert_eq!(heap.refcount(inner), 2);
    value.drop_with_heap(&mut heap);
    assert_eq!(heap.refcount(inner), 1);
    assert!(heap.dict_get_value(d, "nope").is_none());
    assert!(heap.dict_has_key(d, "inner"));
    assert!(!heap.dict_has_key(d, "nope"));
}

// =============================================================================
// 3. Removal
// =============================================================================

/// Privileged removal of a missing key is a consistency error, not a user error.
#[test]
fn privileged_remove_of_missing_entry() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    let err = heap.dict_remove(d, "ghost").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalConsistency);
}

/// Privileged removal ignores the entry flags and releases the value.
#[test]
fn privileged_remove_ignores_flags() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    let inner = heap.dict_alloc().unwrap();
    heap.dict_insert_dict(d, "inner", inner).unwrap();
    heap.dict_set_items_read_only(d).unwrap();

    heap.dict_remove(d, "inner").unwrap();
    assert_eq!(heap.dict_len(Some(d)), 0);
    assert!(!heap.is_live(inner), "the only reference was the entry");
}

/// Checked removal honours entry flags and the container lock.
#[test]
fn checked_remove_enforces_policy() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_number(d, "plain", 1).unwrap();
    heap.dict_insert_number(d, "fixed", 2).unwrap();
    heap.dict_insert_number(d, "ro", 3).unwrap();
    heap.dict_mut(d).unwrap().find_mut("fixed").unwrap().flags_mut().fixed = true;
    heap.dict_mut(d).unwrap().find_mut("ro").unwrap().flags_mut().read_only = true;

    let err = heap.dict_remove_checked(d, "fixed").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MutationDenied);
    let err = heap.dict_remove_checked(d, "ro").unwrap_err();
    assert_eq!(err.message(), "variable is read-only: ro");
    let err = heap.dict_remove_checked(d, "missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);

    assert_eq!(heap.dict_remove_checked(d, "plain").unwrap(), Value::Number(1));
    assert_eq!(heap.dict_len(Some(d)), 2);

    heap.dict_mut(d).unwrap().set_lock(LockLevel::Locked);
    heap.dict_insert_number(d, "late", 4).unwrap();
    let err = heap.dict_remove_checked(d, "late").unwrap_err();
    assert_eq!(err.message(), "value is locked: late");
}

/// set_items_read_only marks every entry both read-only and fixed.
#[test]
fn set_items_read_only_marks_all_entries() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_number(d, "a", 1).unwrap();
    heap.dict_insert_number(d, "b", 2).unwrap();
    heap.dict_set_items_read_only(d).unwrap();

    for key in ["a", "b"] {
        let flags = heap.dict_find(d, key).unwrap().flags();
        assert!(flags.read_only && flags.fixed, "{key} should be read-only and fixed");
    }
}

// =============================================================================
// 4. Iteration and conversion
// =============================================================================

/// Iterating start to end yields exactly `len` distinct keys, each matching `find`.
#[test]
fn iteration_is_complete() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    for i in 0..100 {
        heap.dict_insert_number(d, &format!("key{i}"), i).unwrap();
    }

    let iter = heap.dict_iter(Some(d));
    assert_eq!(iter.len(), 100);
    let mut seen = HashSet::new();
    for (key, value) in iter {
        assert!(seen.insert(key.to_owned()), "duplicate key {key}");
        assert_eq!(heap.dict_find(d, key).unwrap().value(), value);
    }
    assert_eq!(seen.len(), heap.dict_len(Some(d)));
}

/// An empty dictionary's iterator is finished immediately.
#[test]
fn empty_iteration() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    let mut iter = heap.dict_iter(Some(d));
    assert_eq!(iter.len(), 0);
    assert!(iter.next().is_none());
}

/// dict_list builds keys, values and item pairs.
#[test]
fn dict_list_conversions() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_number(d, "one", 1).unwrap();

    let keys = heap.dict_list(d, DictListKind::Keys).unwrap();
    let values = heap.dict_list(d, DictListKind::Values).unwrap();
    let items = heap.dict_list(d, DictListKind::Items).unwrap();

    assert_eq!(heap.echo(&keys).unwrap(), "['one']");
    assert_eq!(heap.echo(&values).unwrap(), "[1]");
    assert_eq!(heap.echo(&items).unwrap(), "[['one', 1]]");

    for list in [keys, values, items] {
        list.drop_with_heap(&mut heap);
    }
    assert_eq!(heap.stats().live_lists, 0, "conversion lists must not leak");
}

/// stringify quotes keys and formats nested values.
#[test]
fn stringify_formats_entries() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_string(d, "it's", "a 'quote'").unwrap();
    assert_eq!(heap.dict_stringify(d).unwrap(), "{'it''s': 'a ''quote'''}");

    let empty = new_dict(&mut heap);
    assert_eq!(heap.dict_stringify(empty).unwrap(), "{}");
}

/// A dictionary that contains itself prints the inner occurrence as `{...}`.
#[test]
fn stringify_recursive_reference() {
    let mut heap = Heap::default();
    let d = new_dict(&mut heap);
    heap.dict_insert_dict(d, "self", d).unwrap();
    assert_eq!(heap.dict_stringify(d).unwrap(), "{'self': {...}}");
}
