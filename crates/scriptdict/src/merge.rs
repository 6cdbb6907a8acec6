//! Merging one dictionary into another, and structural comparison.

use ahash::AHashSet;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    error::{Denial, DictError, DictResult, ErrorKind},
    heap::{Heap, HeapId},
    resource::ResourceTracker,
    tracer::HeapTracer,
    types::{DictEntry, LockLevel, ScopeKind},
    value::Value,
};

/// What `extend` does when a key exists in both dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExtendAction {
    /// Abort at the first shared key. Entries merged before it stay merged.
    Error,
    /// Overwrite the destination value, subject to its lock and read-only flag.
    #[default]
    Force,
    /// Leave the destination value alone.
    Keep,
}

/// Naming rules for scope dictionaries.
///
/// Keys written into a dictionary that carries a [`ScopeKind`] become variable names, so
/// they must be valid identifiers, and function references stored into a
/// [`ScopeKind::Definition`] scope must not shadow protected functions.
pub trait NameRules {
    /// Checks that `name` can be used as a variable name.
    fn check_identifier(&self, name: &str) -> DictResult<()>;

    /// Checks that a function reference may be stored under `name`.
    ///
    /// `is_new` is true when the key does not exist yet in the destination.
    fn check_function_name(&self, name: &str, is_new: bool) -> DictResult<()>;
}

/// The standard rules: identifiers are `[A-Za-z_][A-Za-z0-9_#]*`, function variables start
/// with a capital (after an optional one-letter scope prefix such as `s:`), and new
/// function variables must not collide with a protected name.
#[derive(Debug, Clone, Default)]
pub struct DefaultNameRules {
    protected: AHashSet<String>,
}

impl DefaultNameRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_protected<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn protect(&mut self, name: impl Into<String>) {
        self.protected.insert(name.into());
    }

    #[must_use]
    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }
}

impl NameRules for DefaultNameRules {
    fn check_identifier(&self, name: &str) -> DictResult<()> {
        let mut chars = name.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#');
        if valid {
            Ok(())
        } else {
            Err(DictError::invalid_identifier(name))
        }
    }

    fn check_function_name(&self, name: &str, is_new: bool) -> DictResult<()> {
        let bare = match name.as_bytes() {
            [b'w' | b'b' | b's' | b't', b':', ..] => &name[2..],
            _ => name,
        };
        if !bare.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(DictError::new(
                ErrorKind::InvalidIdentifier,
                format!("Funcref variable name must start with a capital: {name}"),
            ));
        }
        if is_new && self.is_protected(name) {
            return Err(DictError::protected_name(name));
        }
        Ok(())
    }
}

impl<T: ResourceTracker, R: HeapTracer> Heap<T, R> {
    /// Merges every entry of `src` into `dest`.
    ///
    /// Keys missing from `dest` are always copied in. For shared keys `action` decides.
    /// When `dest` is a scope dictionary each key is checked against `rules` before it is
    /// written. The first failure aborts the merge; entries written before it remain.
    /// Polls the interrupt flag between keys.
    pub fn dict_extend(
        &mut self,
        dest: HeapId,
        src: HeapId,
        action: ExtendAction,
        rules: &impl NameRules,
    ) -> DictResult<()> {
        let keys: Vec<Box<str>> = self.dict(src)?.keys().map(Box::from).collect();
        self.dict(dest)?;

        for key in &keys {
            self.tracker().check_interrupt()?;
            let dest_dict = self.dict(dest)?;
            let exists = dest_dict.contains_key(key);
            let container_lock = dest_dict.lock();

            if let Some(scope) = dest_dict.scope() {
                let src_is_func = matches!(self.dict_find(src, key).map(DictEntry::value), Some(Value::Func(_)));
                if scope == ScopeKind::Definition && src_is_func {
                    rules.check_function_name(key, !exists)?;
                }
                rules.check_identifier(key)?;
            }

            if !exists {
                if let Some(denial) = container_lock.denial() {
                    return Err(DictError::mutation_denied(denial, key));
                }
                let Some(value) = self.dict_get_value(src, key) else {
                    continue;
                };
                self.dict_insert(dest, key, value)?;
                continue;
            }

            match action {
                ExtendAction::Error => return Err(DictError::duplicate_key(key)),
                ExtendAction::Keep => {}
                ExtendAction::Force => {
                    if dest == src {
                        continue;
                    }
                    self.force_overwrite(dest, src, key, container_lock)?;
                }
            }
        }
        Ok(())
    }

    fn force_overwrite(&mut self, dest: HeapId, src: HeapId, key: &str, container_lock: LockLevel) -> DictResult<()> {
        if container_lock == LockLevel::Locked {
            return Err(DictError::mutation_denied(Denial::Locked, key));
        }
        let Some(entry) = self.dict_find(dest, key) else {
            return Err(DictError::internal("extend target entry disappeared"));
        };
        let flags = entry.flags();
        if let Some(denial) = flags.lock.denial() {
            return Err(DictError::mutation_denied(denial, key));
        }
        if flags.read_only {
            return Err(DictError::mutation_denied(Denial::ReadOnly, key));
        }

        let Some(value) = self.dict_get_value(src, key) else {
            return Ok(());
        };
        let old = match self.dict_mut(dest)?.find_mut(key) {
            Some(entry) => entry.replace_value(value),
            None => value,
        };
        old.drop_with_heap(self);
        Ok(())
    }

    /// Structural equality of two dictionaries.
    ///
    /// Identity short-circuits; `None` and an empty dictionary are equal. Otherwise the
    /// lengths must match and every key of `a` must map to an equal value in `b`.
    #[must_use]
    pub fn dict_equal(&self, a: Option<HeapId>, b: Option<HeapId>, ignore_case: bool, recursive: bool) -> bool {
        if a == b {
            return true;
        }
        let len = self.dict_len(a);
        if len != self.dict_len(b) {
            return false;
        }
        if len == 0 {
            return true;
        }
        let (Some(a), Some(b)) = (a, b) else {
            return false;
        };
        let (Ok(a), Ok(b)) = (self.dict(a), self.dict(b)) else {
            return false;
        };
        if !recursive {
            self.reset_equal_limit();
        }
        a.iter().all(|(key, value)| {
            b.find(key)
                .is_some_and(|other| value.equal(other.value(), self, ignore_case, true))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn extend_action_parses_from_its_name() {
        assert_eq!(ExtendAction::from_str("keep").unwrap(), ExtendAction::Keep);
        assert_eq!(ExtendAction::from_str("error").unwrap(), ExtendAction::Error);
        assert!(ExtendAction::from_str("merge").is_err());
        assert_eq!(ExtendAction::default().to_string(), "force");
    }

    #[test]
    fn identifier_rules() {
        let rules = DefaultNameRules::new();
        assert!(rules.check_identifier("foo_1").is_ok());
        assert!(rules.check_identifier("_x").is_ok());
        assert!(rules.check_identifier("auto#load#name").is_ok());
        for bad in ["", "1abc", "a-b", "a:b", "a b"] {
            let err = rules.check_identifier(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidIdentifier, "{bad:?}");
        }
    }

    #[test]
    fn function_names_need_a_capital_after_the_scope_prefix() {
        let rules = DefaultNameRules::with_protected(["Len"]);
        assert!(rules.check_function_name("Handler", true).is_ok());
        assert!(rules.check_function_name("s:Handler", true).is_ok());
        assert_eq!(
            rules.check_function_name("s:handler", true).unwrap_err().kind(),
            ErrorKind::InvalidIdentifier
        );
        assert_eq!(
            rules.check_function_name("Len", true).unwrap_err().kind(),
            ErrorKind::ProtectedName
        );
        assert!(rules.check_function_name("Len", false).is_ok());
    }
}
