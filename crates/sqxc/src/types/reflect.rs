// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mapping from Rust types to their descriptors.

use super::builder::TypeDescriptorBuilder;
use super::descriptor::{TypeDescriptor, TypeRef};
use super::scalar::{self, Blob};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::OnceLock;

/// A Rust type with a runtime descriptor.
pub trait Reflect: Any + Send + Default {
    fn type_ref() -> TypeRef;
}

/// A struct with a static record descriptor, usually from `#[derive(Record)]`.
///
/// Records may not contain themselves, directly or through sequences.
pub trait Record: Reflect {
    fn type_descriptor() -> &'static TypeDescriptor;
}

macro_rules! reflect_scalar {
    ($($ty:ty => $builtin:ident),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn type_ref() -> TypeRef {
                    scalar::$builtin()
                }
            }
        )*
    };
}

reflect_scalar! {
    bool => boolean,
    i32 => int,
    u32 => uint,
    i64 => int64,
    u64 => uint64,
    f32 => float,
    f64 => double,
    String => string,
    Blob => blob,
}

/// Sequence descriptors built on first use, one per element type. They live
/// for the rest of the program like the scalar built-ins.
fn sequences() -> &'static DashMap<TypeId, TypeRef> {
    static SEQUENCES: OnceLock<DashMap<TypeId, TypeRef>> = OnceLock::new();
    SEQUENCES.get_or_init(DashMap::new)
}

impl<T: Reflect> Reflect for Vec<T> {
    fn type_ref() -> TypeRef {
        let id = TypeId::of::<Vec<T>>();
        if let Some(found) = sequences().get(&id).map(|entry| entry.value().clone()) {
            return found;
        }
        // Built outside the map lock: the element may itself be a sequence.
        let element = T::type_ref();
        let name = format!("[{}]", element.name());
        let built = TypeDescriptorBuilder::vec_of::<T>(name, element).build_static();
        sequences()
            .entry(id)
            .or_insert_with(|| TypeRef::Static(Box::leak(Box::new(built))))
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    #[test]
    fn test_scalar_reflection() {
        assert!(i32::type_ref().ptr_eq(&scalar::int()));
        assert!(Blob::type_ref().ptr_eq(&scalar::blob()));
    }

    #[test]
    fn test_vec_descriptor_is_cached() {
        let a = Vec::<Vec<String>>::type_ref();
        let b = Vec::<Vec<String>>::type_ref();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.kind(), TypeKind::Sequence);
        assert_eq!(a.name(), "[[str]]");
        assert_eq!(a.element().unwrap().name(), "[str]");
    }
}
