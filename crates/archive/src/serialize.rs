//! Conversion of host message objects into plain JSON-shaped values.
//!
//! A plain value holds only integers, floats, strings, booleans, null,
//! sequences and string-keyed maps. Anything else is stored as its textual
//! representation, so conversion never fails. Map keys are emitted in sorted
//! order, which makes the output deterministic.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde_json::{Map, Number, Value};

/// A value that can be flattened into a plain structure.
pub trait ToPlain {
    fn to_plain(&self) -> Value;
}

/// Textual fallback for values with no recognized shape.
pub fn textual<T: fmt::Debug + ?Sized>(value: &T) -> Value {
    Value::String(format!("{value:?}"))
}

/// Build a plain map from named fields.
pub fn fields<'a, I>(entries: I) -> Value
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    let sorted: BTreeMap<&str, Value> = entries.into_iter().collect();
    Value::Object(
        sorted
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

impl ToPlain for Value {
    fn to_plain(&self) -> Value {
        self.clone()
    }
}

impl ToPlain for str {
    fn to_plain(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToPlain for String {
    fn to_plain(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToPlain for bool {
    fn to_plain(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! integer_to_plain {
    ($($t:ty),*) => {
        $(impl ToPlain for $t {
            fn to_plain(&self) -> Value {
                Value::from(*self)
            }
        })*
    };
}

integer_to_plain!(i32, i64, u32, u64);

impl ToPlain for f64 {
    fn to_plain(&self) -> Value {
        Number::from_f64(*self).map_or_else(|| textual(self), Value::Number)
    }
}

impl ToPlain for f32 {
    fn to_plain(&self) -> Value {
        f64::from(*self).to_plain()
    }
}

impl<T: ToPlain> ToPlain for Option<T> {
    fn to_plain(&self) -> Value {
        match self {
            Some(value) => value.to_plain(),
            None => Value::Null,
        }
    }
}

impl<T: ToPlain> ToPlain for [T] {
    fn to_plain(&self) -> Value {
        Value::Array(self.iter().map(ToPlain::to_plain).collect())
    }
}

impl<T: ToPlain> ToPlain for Vec<T> {
    fn to_plain(&self) -> Value {
        self.as_slice().to_plain()
    }
}

impl<T: ToPlain> ToPlain for BTreeMap<String, T> {
    fn to_plain(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_plain()))
                .collect::<Map<_, _>>(),
        )
    }
}

impl<T: ToPlain, S> ToPlain for HashMap<String, T, S> {
    fn to_plain(&self) -> Value {
        fields(self.iter().map(|(k, v)| (k.as_str(), v.to_plain())))
    }
}

impl<T: ToPlain + ?Sized> ToPlain for &T {
    fn to_plain(&self) -> Value {
        (**self).to_plain()
    }
}
