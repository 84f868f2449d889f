// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent name -> type registry.
//!
//! The schema side registers the record types it defines here so chains on
//! other threads can look them up by table or type name.

use super::descriptor::{TypeDescriptor, TypeRef};
use super::scalar;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Arc<DashMap<Arc<str>, TypeRef>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with the scalar built-ins under their type names.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for ty in [
            scalar::boolean(),
            scalar::int(),
            scalar::uint(),
            scalar::int64(),
            scalar::uint64(),
            scalar::float(),
            scalar::double(),
            scalar::string(),
            scalar::blob(),
        ] {
            registry.types.insert(Arc::from(ty.name()), ty);
        }
        registry
    }

    /// Register under the descriptor's own name. Fails if the name is taken.
    pub fn register(&self, ty: TypeRef) -> Result<()> {
        let name: Arc<str> = Arc::from(ty.name());
        match self.types.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(Error::DuplicateType(entry.key().to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                log::debug!("[registry] registered type '{}'", entry.key());
                entry.insert(ty);
                Ok(())
            }
        }
    }

    /// Share and register a freshly built descriptor.
    pub fn define(&self, descriptor: TypeDescriptor) -> Result<TypeRef> {
        let ty = TypeRef::new(descriptor);
        self.register(ty.clone())?;
        Ok(ty)
    }

    /// Insert or overwrite, returning the previous entry.
    pub fn replace(&self, ty: TypeRef) -> Option<TypeRef> {
        self.types.insert(Arc::from(ty.name()), ty)
    }

    pub fn get(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<TypeRef> {
        self.types.remove(name).map(|(_, ty)| ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|e| e.key().to_string()).collect();
        names.sort();
        names
    }
}
