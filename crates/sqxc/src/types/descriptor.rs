// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptors and shared type references.

use super::field::FieldDescriptor;
use super::handler::{Member, TypeHandler};
use crate::context::{ParseContext, WriteContext};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::nested::Step;
use parking_lot::RwLock;
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Owned, type-erased value instance.
pub type Instance = Box<dyn Any + Send>;

/// Scalar kinds with built-in descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Int64,
    UInt64,
    Float,
    Double,
    Str,
    Blob,
}

/// Shape of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar(ScalarKind),
    Record,
    Sequence,
}

/// Storage class of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Defined once, lives for the whole program.
    Static,
    /// Heap allocated and reference counted.
    Dynamic,
}

/// Name-sorted permutation of the declaration order.
#[derive(Debug, Default)]
struct FieldIndex {
    sorted: bool,
    order: Vec<usize>,
}

/// Runtime description of how to create, reset, parse and write a value.
pub struct TypeDescriptor {
    name: Cow<'static, str>,
    kind: TypeKind,
    size: usize,
    lifetime: Lifetime,
    fields: Vec<FieldDescriptor>,
    index: RwLock<FieldIndex>,
    element: Option<TypeRef>,
    max_length: Option<usize>,
    handler: Box<dyn TypeHandler>,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("lifetime", &self.lifetime)
            .field("fields", &self.fields)
            .field("element", &self.element.as_ref().map(|e| e.name()))
            .finish()
    }
}

impl TypeDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        name: Cow<'static, str>,
        kind: TypeKind,
        size: usize,
        lifetime: Lifetime,
        fields: Vec<FieldDescriptor>,
        element: Option<TypeRef>,
        max_length: Option<usize>,
        handler: Box<dyn TypeHandler>,
    ) -> Self {
        let ty = Self {
            name,
            kind,
            size,
            lifetime,
            fields,
            index: RwLock::new(FieldIndex::default()),
            element,
            max_length,
            handler,
        };
        ty.index.write().rebuild(&ty.fields);
        ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// In-memory footprint of one instance.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn is_record(&self) -> bool {
        self.kind == TypeKind::Record
    }

    pub fn is_sequence(&self) -> bool {
        self.kind == TypeKind::Sequence
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn element(&self) -> Option<&TypeRef> {
        self.element.as_ref()
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    pub fn handler(&self) -> &dyn TypeHandler {
        self.handler.as_ref()
    }

    /// Whether the name index is current.
    pub fn is_sorted(&self) -> bool {
        self.index.read().sorted
    }

    /// Declaration index of the field called `name`.
    ///
    /// Binary search over the name index. A stale index is rebuilt once under
    /// the write lock, so concurrent first lookups are safe.
    pub fn find_field_index(&self, name: &str) -> Option<usize> {
        {
            let index = self.index.read();
            if index.sorted {
                return index.search(&self.fields, name);
            }
        }
        let mut index = self.index.write();
        if !index.sorted {
            log::trace!("[types] re-sorting field index of '{}'", self.name);
            index.rebuild(&self.fields);
        }
        index.search(&self.fields, name)
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.find_field_index(name).map(|i| &self.fields[i])
    }

    /// Append a field. The index goes stale until the next lookup.
    pub fn add_field(&mut self, field: FieldDescriptor) -> Result<()> {
        if self.kind != TypeKind::Record {
            return Err(Error::NotSupported(format!(
                "'{}' is not a record type",
                self.name
            )));
        }
        if self.fields.iter().any(|f| f.name() == field.name()) {
            return Err(Error::DuplicateField(field.name().to_owned()));
        }
        self.fields.push(field);
        self.index.get_mut().sorted = false;
        Ok(())
    }

    pub fn remove_field(&mut self, name: &str) -> Option<FieldDescriptor> {
        let pos = self.fields.iter().position(|f| f.name() == name)?;
        let field = self.fields.remove(pos);
        self.index.get_mut().sorted = false;
        Some(field)
    }

    /// Rebuild the name index eagerly.
    pub fn sort_fields(&self) {
        self.index.write().rebuild(&self.fields);
    }

    /// New zero-valued instance.
    pub fn create(&self) -> Instance {
        self.handler.create(self)
    }

    /// Return `instance` to its zero value, releasing what it owns.
    ///
    /// The instance's own storage stays with the caller.
    pub fn reset(&self, instance: &mut dyn Any) -> Result<()> {
        self.handler.reset(self, instance)
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        self.handler.accepts(self, kind)
    }

    /// Instance reached by one path step, `None` when absent.
    pub fn descend<'i>(&self, instance: &'i dyn Any, step: Step) -> Option<&'i dyn Any> {
        match step {
            Step::Field(i) => self.fields.get(i)?.instance(instance),
            Step::Element(i) => self.handler.sequence()?.element(instance, i),
        }
    }

    pub fn descend_mut<'i>(&self, instance: &'i mut dyn Any, step: Step) -> Option<&'i mut dyn Any> {
        match step {
            Step::Field(i) => self.fields.get(i)?.instance_mut(instance),
            Step::Element(i) => self.handler.sequence()?.element_mut(instance, i),
        }
    }

    /// Typed read of a record member.
    pub fn get<'i, T: Any>(&self, instance: &'i dyn Any, name: &str) -> Option<&'i T> {
        self.find_field(name)?.instance(instance)?.downcast_ref()
    }

    pub fn get_mut<'i, T: Any>(&self, instance: &'i mut dyn Any, name: &str) -> Option<&'i mut T> {
        self.find_field(name)?.instance_mut(instance)?.downcast_mut()
    }
}

impl FieldIndex {
    fn rebuild(&mut self, fields: &[FieldDescriptor]) {
        self.order.clear();
        self.order.extend(0..fields.len());
        self.order.sort_by(|&a, &b| fields[a].name().cmp(fields[b].name()));
        self.sorted = true;
    }

    fn search(&self, fields: &[FieldDescriptor], name: &str) -> Option<usize> {
        self.order
            .binary_search_by(|&i| fields[i].name().cmp(name))
            .ok()
            .map(|pos| self.order[pos])
    }
}

impl Drop for TypeDescriptor {
    fn drop(&mut self) {
        if self.lifetime == Lifetime::Dynamic {
            log::trace!("[types] releasing dynamic type '{}'", self.name);
        }
    }
}

/// Shared reference to a type descriptor.
///
/// Cloning takes a reference and dropping releases it. Static descriptors are
/// never counted; dynamic ones are freed when the last holder goes away.
#[derive(Clone)]
pub enum TypeRef {
    Static(&'static TypeDescriptor),
    Dynamic(Arc<TypeDescriptor>),
}

impl TypeRef {
    /// Share a freshly built dynamic descriptor.
    pub fn new(descriptor: TypeDescriptor) -> Self {
        TypeRef::Dynamic(Arc::new(descriptor))
    }

    pub fn from_static(descriptor: &'static TypeDescriptor) -> Self {
        TypeRef::Static(descriptor)
    }

    /// Number of holders of a dynamic descriptor, `None` for static ones.
    pub fn ref_count(&self) -> Option<usize> {
        match self {
            TypeRef::Static(_) => None,
            TypeRef::Dynamic(arc) => Some(Arc::strong_count(arc)),
        }
    }

    /// Non-owning handle, for back references that must not keep the type alive.
    pub fn downgrade(&self) -> Option<Weak<TypeDescriptor>> {
        match self {
            TypeRef::Static(_) => None,
            TypeRef::Dynamic(arc) => Some(Arc::downgrade(arc)),
        }
    }

    pub fn ptr_eq(&self, other: &TypeRef) -> bool {
        std::ptr::eq::<TypeDescriptor>(&**self, &**other)
    }

    /// Feed one event into `instance` through this type's handler.
    pub fn parse(
        &self,
        instance: &mut dyn Any,
        cx: &mut ParseContext<'_>,
        event: &Event<'_>,
    ) -> Result<()> {
        self.handler.parse(self, instance, cx, event)
    }

    /// Emit the events describing `instance`.
    pub fn write(
        &self,
        instance: &dyn Any,
        cx: &mut WriteContext<'_>,
        member: Member<'_>,
    ) -> Result<()> {
        self.handler.write(self, instance, cx, member)
    }
}

impl Deref for TypeRef {
    type Target = TypeDescriptor;

    fn deref(&self) -> &TypeDescriptor {
        match self {
            TypeRef::Static(descriptor) => descriptor,
            TypeRef::Dynamic(arc) => arc,
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Static(d) => write!(f, "TypeRef::Static({})", d.name()),
            TypeRef::Dynamic(d) => write!(f, "TypeRef::Dynamic({})", d.name()),
        }
    }
}
