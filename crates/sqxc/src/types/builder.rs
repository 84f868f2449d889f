// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder for type descriptors.

use super::descriptor::{Lifetime, TypeDescriptor, TypeKind, TypeRef};
use super::field::{FieldAccessor, FieldDescriptor, FieldFlags};
use super::handler::TypeHandler;
use super::record::{DynamicRecord, RecordHandler};
use super::sequence::{DynamicSequence, SequenceHandler};
use crate::error::{Error, Result};
use std::any::Any;
use std::borrow::Cow;
use std::collections::HashSet;

/// Builder for record and sequence descriptors.
///
/// # Example
///
/// ```
/// use sqxc::types::{scalar, FieldFlags, TypeDescriptorBuilder, TypeRef};
///
/// let user = TypeRef::new(
///     TypeDescriptorBuilder::dynamic("User")
///         .slot_field("id", scalar::int(), FieldFlags::PRIMARY)
///         .slot_field("name", scalar::string(), FieldFlags::NONE)
///         .build()
///         .unwrap(),
/// );
/// assert_eq!(user.find_field("name").unwrap().offset(), 1);
/// ```
pub struct TypeDescriptorBuilder {
    name: Cow<'static, str>,
    kind: TypeKind,
    size: usize,
    fields: Vec<FieldDescriptor>,
    element: Option<TypeRef>,
    max_length: Option<usize>,
    handler: Box<dyn TypeHandler>,
    next_slot: usize,
}

impl TypeDescriptorBuilder {
    fn new(
        name: impl Into<Cow<'static, str>>,
        kind: TypeKind,
        size: usize,
        handler: Box<dyn TypeHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
            fields: Vec::new(),
            element: None,
            max_length: None,
            handler,
            next_slot: 0,
        }
    }

    /// Record backed by the concrete struct `T`.
    pub fn record<T: Default + Any + Send>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(
            name,
            TypeKind::Record,
            std::mem::size_of::<T>(),
            Box::new(RecordHandler::typed::<T>()),
        )
    }

    /// Record backed by a [`DynamicRecord`].
    pub fn dynamic(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(
            name,
            TypeKind::Record,
            std::mem::size_of::<DynamicRecord>(),
            Box::new(RecordHandler::dynamic()),
        )
    }

    /// Sequence stored as `Vec<T>`.
    pub fn vec_of<T: Default + Any + Send>(
        name: impl Into<Cow<'static, str>>,
        element: TypeRef,
    ) -> Self {
        let mut builder = Self::new(
            name,
            TypeKind::Sequence,
            std::mem::size_of::<Vec<T>>(),
            Box::new(SequenceHandler::of_vec::<T>()),
        );
        builder.element = Some(element);
        builder
    }

    /// Sequence stored as a [`DynamicSequence`]. Set the element with [`Self::element`].
    pub fn dynamic_sequence(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(
            name,
            TypeKind::Sequence,
            std::mem::size_of::<DynamicSequence>(),
            Box::new(SequenceHandler::dynamic()),
        )
    }

    /// Custom handler, for types the built-in handlers do not cover.
    pub fn custom(
        name: impl Into<Cow<'static, str>>,
        kind: TypeKind,
        size: usize,
        handler: Box<dyn TypeHandler>,
    ) -> Self {
        Self::new(name, kind, size, handler)
    }

    pub fn element(mut self, element: TypeRef) -> Self {
        self.element = Some(element);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        if let super::field::FieldAccess::Slot(slot) = field.access() {
            self.next_slot = self.next_slot.max(slot + 1);
        }
        self.fields.push(field);
        self
    }

    /// Struct field reached through generated accessors.
    pub fn accessor_field(
        self,
        name: impl Into<Cow<'static, str>>,
        type_ref: TypeRef,
        offset: usize,
        flags: FieldFlags,
        accessor: FieldAccessor,
    ) -> Self {
        self.field(FieldDescriptor::with_accessor(
            name, type_ref, offset, flags, accessor,
        ))
    }

    /// Dynamic record field in the next free slot.
    pub fn slot_field(
        self,
        name: impl Into<Cow<'static, str>>,
        type_ref: TypeRef,
        flags: FieldFlags,
    ) -> Self {
        let slot = self.next_slot;
        self.field(FieldDescriptor::slot(name, type_ref, slot, flags))
    }

    fn finish(self, lifetime: Lifetime) -> TypeDescriptor {
        TypeDescriptor::from_parts(
            self.name,
            self.kind,
            self.size,
            lifetime,
            self.fields,
            self.element,
            self.max_length,
            self.handler,
        )
    }

    /// Reference-counted descriptor. Rejects duplicate field names.
    pub fn build(self) -> Result<TypeDescriptor> {
        let duplicate = {
            let mut seen = HashSet::new();
            self.fields
                .iter()
                .find(|f| !seen.insert(f.name()))
                .map(|f| f.name().to_owned())
        };
        if let Some(name) = duplicate {
            return Err(Error::DuplicateField(name));
        }
        Ok(self.finish(Lifetime::Dynamic))
    }

    /// Descriptor meant to live in a `static`.
    ///
    /// Duplicate names keep their first declaration.
    pub fn build_static(mut self) -> TypeDescriptor {
        let mut seen = HashSet::new();
        let name = self.name.clone();
        self.fields.retain(|f| {
            let fresh = seen.insert(f.name().to_owned());
            if !fresh {
                log::warn!("[types] '{}': dropping duplicate field '{}'", name, f.name());
            }
            fresh
        });
        self.finish(Lifetime::Static)
    }
}

/// One column of a relational table definition.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: Cow<'static, str>,
    pub type_ref: TypeRef,
    /// Slot number in the resulting [`DynamicRecord`].
    pub offset: usize,
    pub flags: FieldFlags,
}

impl ColumnDef {
    pub fn new(name: impl Into<Cow<'static, str>>, type_ref: TypeRef, offset: usize) -> Self {
        Self {
            name: name.into(),
            type_ref,
            offset,
            flags: FieldFlags::NONE,
        }
    }

    pub fn flags(mut self, flags: FieldFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl TypeDescriptor {
    /// Dynamic record type from a column list.
    ///
    /// Column names and slot numbers must both be unique.
    pub fn from_columns(
        name: impl Into<Cow<'static, str>>,
        columns: &[ColumnDef],
    ) -> Result<TypeDescriptor> {
        let mut slots = HashSet::new();
        if let Some(col) = columns.iter().find(|col| !slots.insert(col.offset)) {
            log::error!("[types] column '{}' reuses slot {}", col.name, col.offset);
            return Err(Error::DuplicateField(col.name.to_string()));
        }
        columns
            .iter()
            .fold(TypeDescriptorBuilder::dynamic(name), |builder, col| {
                builder.field(FieldDescriptor::slot(
                    col.name.clone(),
                    col.type_ref.clone(),
                    col.offset,
                    col.flags,
                ))
            })
            .build()
    }
}
