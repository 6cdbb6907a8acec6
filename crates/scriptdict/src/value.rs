use std::{borrow::Cow, fmt::Write};

use strum::{Display, IntoStaticStr};

use crate::{
    error::{DictError, DictResult},
    heap::{ContainerKind, Epoch, Heap, HeapData, HeapId},
    resource::{ResourceError, ResourceTracker},
    tracer::HeapTracer,
};

/// Special singleton values of the scripting language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Special {
    #[strum(serialize = "v:null")]
    Null,
    #[strum(serialize = "v:none")]
    None,
}

/// A scripting value as stored in lists and dictionaries.
///
/// Scalars are held inline. Lists and dictionaries live in the [`Heap`] and are held via
/// `Ref`, which owns one reference: clone with [`Value::clone_with_heap`] and dispose with
/// [`Value::drop_with_heap`], never by plain `Clone`/`Drop`.
#[derive(Debug, PartialEq)]
pub enum Value {
    Number(i64),
    Float(f64),
    Bool(bool),
    Special(Special),
    Str(String),
    /// A function reference, by name.
    Func(String),
    Ref(HeapId),
}

impl Value {
    /// Clones the value, adding a reference when it points into the heap.
    #[must_use]
    pub fn clone_with_heap(&self, heap: &Heap<impl ResourceTracker, impl HeapTracer>) -> Self {
        match self {
            Self::Ref(id) => heap.new_ref(*id),
            other => other.clone_immediate(),
        }
    }

    /// Drops the value, releasing its heap reference if it has one.
    ///
    /// This must be called before overwriting a stored value or discarding it, otherwise
    /// the container it points at leaks until the next collection.
    #[inline]
    pub fn drop_with_heap(self, heap: &mut Heap<impl ResourceTracker, impl HeapTracer>) {
        if let Self::Ref(id) = self {
            heap.release(id);
        }
    }

    /// Copies a value that holds no heap reference.
    ///
    /// # Panics
    /// Panics on `Ref`; those clones must go through `clone_with_heap`.
    pub(crate) fn clone_immediate(&self) -> Self {
        match self {
            Self::Number(n) => Self::Number(*n),
            Self::Float(f) => Self::Float(*f),
            Self::Bool(b) => Self::Bool(*b),
            Self::Special(s) => Self::Special(*s),
            Self::Str(s) => Self::Str(s.clone()),
            Self::Func(name) => Self::Func(name.clone()),
            Self::Ref(_) => panic!("Ref clones must go through clone_with_heap to maintain refcounts"),
        }
    }

    #[must_use]
    pub fn ref_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// User-facing type name.
    #[must_use]
    pub fn type_name(&self, heap: &Heap<impl ResourceTracker, impl HeapTracer>) -> &'static str {
        match self {
            Self::Number(_) => "Number",
            Self::Float(_) => "Float",
            Self::Bool(_) => "Bool",
            Self::Special(_) => "Special",
            Self::Str(_) => "String",
            Self::Func(_) => "Funcref",
            Self::Ref(id) => heap.kind(*id).type_name(),
        }
    }

    /// Converts to a Number the way the scripting language does for arithmetic.
    ///
    /// Strings yield their leading integer (decimal, `0x` hex or `0b` binary) or zero.
    /// Floats, function references and containers are type errors.
    pub fn to_number(&self, heap: &Heap<impl ResourceTracker, impl HeapTracer>) -> DictResult<i64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Bool(b) => Ok(i64::from(*b)),
            Self::Special(_) => Ok(0),
            Self::Str(s) => Ok(leading_number(s)),
            other => Err(DictError::type_mismatch(format!(
                "using {} as a Number",
                other.type_name(heap)
            ))),
        }
    }

    /// Converts to a string the way the scripting language does for keys and concatenation.
    pub fn to_str(&self, heap: &Heap<impl ResourceTracker, impl HeapTracer>) -> DictResult<Cow<'_, str>> {
        match self {
            Self::Number(n) => Ok(Cow::Owned(n.to_string())),
            Self::Str(s) => Ok(Cow::Borrowed(s)),
            Self::Bool(true) => Ok(Cow::Borrowed("v:true")),
            Self::Bool(false) => Ok(Cow::Borrowed("v:false")),
            Self::Special(s) => Ok(Cow::Borrowed(s.into())),
            other => Err(DictError::type_mismatch(format!(
                "using {} as a String",
                other.type_name(heap)
            ))),
        }
    }

    /// Structural equality.
    ///
    /// Identical containers are equal without looking inside. `ignore_case` compares
    /// strings case-insensitively. With `recursive` false this is a top-level comparison
    /// and the nesting budget is reset; once the budget is exhausted, the remaining nested
    /// containers are assumed equal, which also ends comparisons of cyclic structures.
    #[must_use]
    pub fn equal(
        &self,
        other: &Self,
        heap: &Heap<impl ResourceTracker, impl HeapTracer>,
        ignore_case: bool,
        recursive: bool,
    ) -> bool {
        if !recursive {
            heap.reset_equal_limit();
        }
        match (self, other) {
            (Self::Ref(a), Self::Ref(b)) => {
                if a == b {
                    return true;
                }
                let kind = heap.kind(*a);
                if kind != heap.kind(*b) {
                    return false;
                }
                if heap.equal_limit_reached() {
                    return true;
                }
                heap.equal_enter();
                let equal = match kind {
                    ContainerKind::Dict => heap.dict_equal(Some(*a), Some(*b), ignore_case, true),
                    ContainerKind::List => heap.list_equal(*a, *b, ignore_case),
                };
                heap.equal_exit();
                equal
            }
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Special(a), Self::Special(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => {
                if ignore_case {
                    a.to_lowercase() == b.to_lowercase()
                } else {
                    a == b
                }
            }
            (Self::Func(a), Self::Func(b)) => a == b,
            _ => false,
        }
    }
}

/// Parses the leading integer of a string, returning zero when there is none.
fn leading_number(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (radix, digits) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, bin)
    } else {
        (10, digits)
    };
    let end = digits.find(|c: char| !c.is_digit(radix)).unwrap_or(digits.len());
    let magnitude = digits[..end]
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0i64, |acc, d| acc.saturating_mul(i64::from(radix)).saturating_add(i64::from(d)));
    if negative { magnitude.saturating_neg() } else { magnitude }
}

/// Appends `s` as a single-quoted literal, doubling embedded quotes.
pub(crate) fn push_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
}

/// Formats a float like the scripting language's `%g` display: six significant digits,
/// always with a fractional part or exponent.
pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_owned();
    }

    // Round to six significant digits first so a carry into the next power of ten
    // picks the exponent of the rounded value.
    let scientific = format!("{f:.5e}");
    let (mantissa, exp) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exp.parse().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let mut mantissa = trim_fraction(mantissa).to_owned();
        if !mantissa.contains('.') {
            mantissa.push_str(".0");
        }
        return format!("{mantissa}e{exp}");
    }

    #[expect(clippy::cast_sign_loss, reason = "exponent is below 6 so the precision is non-negative")]
    let precision = (5 - exponent) as usize;
    let formatted = format!("{f:.precision$}");
    let mut trimmed = trim_fraction(&formatted).to_owned();
    if !trimmed.contains('.') {
        trimmed.push_str(".0");
    }
    trimmed
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

impl<T: ResourceTracker, R: HeapTracer> Heap<T, R> {
    /// Renders a value the way `:echo` shows it, or `None` when interrupted or nested too
    /// deep.
    ///
    /// Containers already rendered during this call print as `{...}` or `[...]`.
    pub fn echo(&mut self, value: &Value) -> Option<String> {
        let epoch = self.next_epoch();
        let mut out = String::new();
        self.fmt_value(value, epoch, 0, &mut out).ok()?;
        Some(out)
    }

    pub(crate) fn fmt_value(
        &self,
        value: &Value,
        epoch: Epoch,
        depth: usize,
        out: &mut String,
    ) -> Result<(), ResourceError> {
        match value {
            Value::Number(n) => {
                let _ = write!(out, "{n}");
            }
            Value::Float(f) => out.push_str(&float_repr(*f)),
            Value::Bool(true) => out.push_str("v:true"),
            Value::Bool(false) => out.push_str("v:false"),
            Value::Special(s) => out.push_str(s.into()),
            Value::Str(s) => push_quoted(out, s),
            Value::Func(name) => {
                out.push_str("function(");
                push_quoted(out, name);
                out.push(')');
            }
            Value::Ref(id) => self.fmt_container(*id, epoch, depth, out)?,
        }
        Ok(())
    }

    pub(crate) fn fmt_container(
        &self,
        id: HeapId,
        epoch: Epoch,
        depth: usize,
        out: &mut String,
    ) -> Result<(), ResourceError> {
        let limit = self.tracker().nesting_limit();
        if depth >= limit {
            return Err(ResourceError::Nesting { limit, depth: depth + 1 });
        }
        if !self.mark(id, epoch) {
            out.push_str(match self.kind(id) {
                ContainerKind::Dict => "{...}",
                ContainerKind::List => "[...]",
            });
            return Ok(());
        }
        match self.get(id) {
            HeapData::Dict(dict) => {
                out.push('{');
                for (i, (key, value)) in dict.iter().enumerate() {
                    self.tracker().check_interrupt()?;
                    if i > 0 {
                        out.push_str(", ");
                    }
                    push_quoted(out, key);
                    out.push_str(": ");
                    self.fmt_value(value, epoch, depth + 1, out)?;
                }
                out.push('}');
            }
            HeapData::List(list) => {
                out.push('[');
                for (i, value) in list.iter().enumerate() {
                    self.tracker().check_interrupt()?;
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.fmt_value(value, epoch, depth + 1, out)?;
                }
                out.push(']');
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn leading_number_follows_string_conversion_rules() {
        assert_eq!(leading_number("42abc"), 42);
        assert_eq!(leading_number("  -7"), -7);
        assert_eq!(leading_number("0x1F"), 31);
        assert_eq!(leading_number("0b101"), 5);
        assert_eq!(leading_number("abc"), 0);
        assert_eq!(leading_number(""), 0);
    }

    #[test]
    fn float_repr_matches_echo_output() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(1.5), "1.5");
        assert_eq!(float_repr(-0.25), "-0.25");
        assert_eq!(float_repr(1.0e20), "1.0e20");
        assert_eq!(float_repr(1.5e-7), "1.5e-7");
        assert_eq!(float_repr(123_456.0), "123456.0");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(999_999.5), "1.0e6");
        assert_eq!(float_repr(-999_999.5), "-1.0e6");
        assert_eq!(float_repr(0.000_099_999_99), "0.0001");
        assert_eq!(float_repr(0.000_009_999_999), "1.0e-5");
        assert_eq!(float_repr(9.999_996), "10.0");
        assert_eq!(float_repr(f64::NAN), "nan");
        assert_eq!(float_repr(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn quoting_doubles_single_quotes() {
        let mut out = String::new();
        push_quoted(&mut out, "it's");
        assert_eq!(out, "'it''s'");
    }

    #[test]
    fn scalar_conversions() {
        let heap = Heap::default();
        assert_eq!(Value::Bool(true).to_number(&heap).unwrap(), 1);
        assert_eq!(Value::Special(Special::Null).to_number(&heap).unwrap(), 0);
        assert_eq!(Value::Number(-3).to_str(&heap).unwrap(), "-3");
        assert_eq!(Value::Special(Special::None).to_str(&heap).unwrap(), "v:none");

        let err = Value::Float(1.0).to_str(&heap).unwrap_err();
        assert_eq!(err.message(), "using Float as a String");
        let err = Value::Func("F".to_owned()).to_number(&heap).unwrap_err();
        assert_eq!(err.message(), "using Funcref as a Number");
    }

    #[test]
    fn echo_marks_shared_containers() {
        let mut heap = Heap::default();
        let inner = heap.dict_alloc().unwrap();
        let list = heap.list_alloc().unwrap();
        let list_ref = heap.new_ref(list);
        heap.list_append(list, heap.new_ref(inner)).unwrap();
        heap.list_append(list, heap.new_ref(inner)).unwrap();
        heap.list_append(list, Value::Func("Cb".to_owned())).unwrap();

        assert_eq!(heap.echo(&list_ref).unwrap(), "[{}, {...}, function('Cb')]");
        list_ref.drop_with_heap(&mut heap);
        assert_eq!(heap.stats().live_objects(), 0);
    }
}
