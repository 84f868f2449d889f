// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in scalar types.
//!
//! Each scalar accepts the event kinds it can be converted from with the
//! usual relational rules: integers parse from text, booleans from
//! `true`/`false`/`t`/`f`/`1`/`0`, text takes any scalar, and `Null` resets to
//! the zero value.

use super::descriptor::{Instance, Lifetime, ScalarKind, TypeDescriptor, TypeKind, TypeRef};
use super::handler::{Member, TypeHandler};
use crate::chain::blob;
use crate::context::{ParseContext, WriteContext};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, KindSet, Value};
use std::any::Any;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::OnceLock;

/// Opaque byte string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob(bytes.to_vec())
    }
}

/// Rust type backing a scalar descriptor.
pub trait ScalarValue: Any + Send + Default {
    const KIND: ScalarKind;
    const NAME: &'static str;
    /// Kinds convertible into this type, `Null` excluded.
    const ACCEPTS: KindSet;

    fn from_value(value: &Value<'_>) -> Result<Self>;

    fn to_value(&self) -> Value<'_>;
}

const NUMERIC: KindSet = KindSet::EMPTY
    .with(EventKind::Bool)
    .with(EventKind::Int)
    .with(EventKind::Int64)
    .with(EventKind::Str);

fn mismatch<T: ScalarValue>(value: &Value<'_>) -> Error {
    Error::mismatch(T::NAME, value.kind())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

impl ScalarValue for bool {
    const KIND: ScalarKind = ScalarKind::Bool;
    const NAME: &'static str = "bool";
    const ACCEPTS: KindSet = NUMERIC;

    fn from_value(value: &Value<'_>) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(*v),
            Value::Int(v) => Ok(*v != 0),
            Value::Int64(v) => Ok(*v != 0),
            Value::Str(s) => parse_bool(s).ok_or_else(|| mismatch::<Self>(value)),
            _ => Err(mismatch::<Self>(value)),
        }
    }

    fn to_value(&self) -> Value<'_> {
        Value::Bool(*self)
    }
}

/// Integers narrower than 64 bits: `Int64` input is range checked.
macro_rules! narrow_int {
    ($ty:ty, $kind:expr, $name:expr, |$v:ident| $to:expr) => {
        impl ScalarValue for $ty {
            const KIND: ScalarKind = $kind;
            const NAME: &'static str = $name;
            const ACCEPTS: KindSet = NUMERIC;

            fn from_value(value: &Value<'_>) -> Result<Self> {
                let wide = match value {
                    Value::Bool(v) => i64::from(*v),
                    Value::Int(v) => i64::from(*v),
                    Value::Int64(v) => *v,
                    Value::Str(s) => s.trim().parse::<i64>().map_err(|_| mismatch::<Self>(value))?,
                    _ => return Err(mismatch::<Self>(value)),
                };
                <$ty>::try_from(wide).map_err(|_| Error::OutOfRange {
                    value: wide.to_string(),
                    at: String::new(),
                })
            }

            fn to_value(&self) -> Value<'_> {
                let $v = *self;
                $to
            }
        }
    };
}

narrow_int!(i32, ScalarKind::Int, "int", |v| Value::Int(v));
narrow_int!(u32, ScalarKind::UInt, "uint", |v| match i32::try_from(v) {
    Ok(small) => Value::Int(small),
    Err(_) => Value::Int64(i64::from(v)),
});

impl ScalarValue for i64 {
    const KIND: ScalarKind = ScalarKind::Int64;
    const NAME: &'static str = "int64";
    const ACCEPTS: KindSet = NUMERIC;

    fn from_value(value: &Value<'_>) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(i64::from(*v)),
            Value::Int(v) => Ok(i64::from(*v)),
            Value::Int64(v) => Ok(*v),
            Value::Str(s) => s.trim().parse().map_err(|_| mismatch::<Self>(value)),
            _ => Err(mismatch::<Self>(value)),
        }
    }

    fn to_value(&self) -> Value<'_> {
        Value::Int64(*self)
    }
}

/// Travels as `Int64`, or as decimal text above `i64::MAX`.
impl ScalarValue for u64 {
    const KIND: ScalarKind = ScalarKind::UInt64;
    const NAME: &'static str = "uint64";
    const ACCEPTS: KindSet = NUMERIC;

    fn from_value(value: &Value<'_>) -> Result<Self> {
        let signed = match value {
            Value::Bool(v) => return Ok(u64::from(*v)),
            Value::Str(s) => return s.trim().parse().map_err(|_| mismatch::<Self>(value)),
            Value::Int(v) => i64::from(*v),
            Value::Int64(v) => *v,
            _ => return Err(mismatch::<Self>(value)),
        };
        u64::try_from(signed).map_err(|_| Error::OutOfRange {
            value: signed.to_string(),
            at: String::new(),
        })
    }

    fn to_value(&self) -> Value<'_> {
        match i64::try_from(*self) {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::Str(Cow::Owned(self.to_string())),
        }
    }
}

macro_rules! float {
    ($ty:ty, $kind:expr, $name:expr) => {
        impl ScalarValue for $ty {
            const KIND: ScalarKind = $kind;
            const NAME: &'static str = $name;
            const ACCEPTS: KindSet = KindSet::EMPTY
                .with(EventKind::Int)
                .with(EventKind::Int64)
                .with(EventKind::Double)
                .with(EventKind::Str);

            fn from_value(value: &Value<'_>) -> Result<Self> {
                match value {
                    Value::Int(v) => Ok(*v as $ty),
                    Value::Int64(v) => Ok(*v as $ty),
                    Value::Double(v) => Ok(*v as $ty),
                    Value::Str(s) => s.trim().parse().map_err(|_| mismatch::<Self>(value)),
                    _ => Err(mismatch::<Self>(value)),
                }
            }

            fn to_value(&self) -> Value<'_> {
                Value::Double(f64::from(*self))
            }
        }
    };
}

float!(f32, ScalarKind::Float, "float");
float!(f64, ScalarKind::Double, "double");

impl ScalarValue for String {
    const KIND: ScalarKind = ScalarKind::Str;
    const NAME: &'static str = "str";
    const ACCEPTS: KindSet = KindSet::SCALARS.without(EventKind::Null);

    fn from_value(value: &Value<'_>) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.clone().into_owned()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::Int64(v) => Ok(v.to_string()),
            Value::Double(v) => Ok(v.to_string()),
            Value::Raw(bytes) => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| mismatch::<Self>(value)),
            _ => Err(mismatch::<Self>(value)),
        }
    }

    fn to_value(&self) -> Value<'_> {
        Value::Str(Cow::Borrowed(self))
    }
}

impl ScalarValue for Blob {
    const KIND: ScalarKind = ScalarKind::Blob;
    const NAME: &'static str = "blob";
    const ACCEPTS: KindSet = KindSet::EMPTY.with(EventKind::Raw).with(EventKind::Str);

    fn from_value(value: &Value<'_>) -> Result<Self> {
        match value {
            Value::Raw(bytes) => Ok(Blob(bytes.to_vec())),
            Value::Str(text) => blob::decode_text(text)
                .map(Blob)
                .ok_or_else(|| mismatch::<Self>(value)),
            _ => Err(mismatch::<Self>(value)),
        }
    }

    fn to_value(&self) -> Value<'_> {
        Value::Raw(Cow::Borrowed(&self.0))
    }
}

/// Handler shared by every scalar type.
pub struct ScalarHandler<T>(PhantomData<fn() -> T>);

impl<T> Default for ScalarHandler<T> {
    fn default() -> Self {
        ScalarHandler(PhantomData)
    }
}

impl<T: ScalarValue> TypeHandler for ScalarHandler<T> {
    fn create(&self, _ty: &TypeDescriptor) -> Instance {
        Box::new(T::default())
    }

    fn reset(&self, _ty: &TypeDescriptor, instance: &mut dyn Any) -> Result<()> {
        let value = instance
            .downcast_mut::<T>()
            .ok_or(Error::InvalidState("scalar instance has the wrong type"))?;
        *value = T::default();
        Ok(())
    }

    fn accepts(&self, _ty: &TypeDescriptor, kind: EventKind) -> bool {
        kind == EventKind::Null || T::ACCEPTS.contains(kind)
    }

    fn parse(
        &self,
        _ty: &TypeRef,
        instance: &mut dyn Any,
        _cx: &mut ParseContext<'_>,
        event: &Event<'_>,
    ) -> Result<()> {
        let slot = instance
            .downcast_mut::<T>()
            .ok_or_else(|| Error::mismatch(T::NAME, event.kind()).at(event.position()))?;
        if let Value::Null = event.value {
            *slot = T::default();
            return Ok(());
        }
        *slot = T::from_value(&event.value).map_err(|e| e.at(event.position()))?;
        Ok(())
    }

    fn write(
        &self,
        _ty: &TypeRef,
        instance: &dyn Any,
        cx: &mut WriteContext<'_>,
        member: Member<'_>,
    ) -> Result<()> {
        let value = instance
            .downcast_ref::<T>()
            .ok_or(Error::InvalidState("scalar instance has the wrong type"))?;
        cx.emit(member.name, value.to_value(), member.field)
    }
}

/// Static descriptor of a scalar type.
pub fn descriptor<T: ScalarValue>() -> TypeDescriptor {
    TypeDescriptor::from_parts(
        Cow::Borrowed(T::NAME),
        TypeKind::Scalar(T::KIND),
        std::mem::size_of::<T>(),
        Lifetime::Static,
        Vec::new(),
        None,
        None,
        Box::new(ScalarHandler::<T>::default()),
    )
}

macro_rules! builtin {
    ($(#[$doc:meta])* $fn_name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $fn_name() -> TypeRef {
            static DESCRIPTOR: OnceLock<TypeDescriptor> = OnceLock::new();
            TypeRef::Static(DESCRIPTOR.get_or_init(descriptor::<$ty>))
        }
    };
}

builtin!(boolean, bool);
builtin!(
    /// 32-bit signed integer.
    int, i32
);
builtin!(uint, u32);
builtin!(int64, i64);
builtin!(uint64, u64);
builtin!(float, f32);
builtin!(double, f64);
builtin!(
    /// Owned UTF-8 text.
    string, String
);
builtin!(
    /// Opaque bytes, see [`Blob`].
    blob, Blob
);
