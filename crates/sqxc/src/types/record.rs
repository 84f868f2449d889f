// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record types: concrete structs and runtime-defined [`DynamicRecord`]s.

use super::descriptor::{Instance, TypeDescriptor, TypeRef};
use super::field::{FieldDescriptor, FieldFlags};
use super::handler::{Member, TypeHandler};
use crate::context::{ParseContext, WriteContext};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, Value};
use crate::nested::{Container, FrameState, Step};
use std::any::Any;

/// Record whose fields live in numbered slots.
///
/// Used for types defined at run time, e.g. from a column list. Field
/// offsets are slot numbers.
#[derive(Default)]
pub struct DynamicRecord {
    slots: Vec<Option<Instance>>,
}

impl DynamicRecord {
    pub fn with_slots(count: usize) -> Self {
        let mut slots = Vec::with_capacity(count);
        slots.resize_with(count, || None);
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&(dyn Any + Send)> {
        self.slots.get(index)?.as_deref()
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut (dyn Any + Send)> {
        self.slots.get_mut(index)?.as_deref_mut()
    }

    pub fn set_slot(&mut self, index: usize, value: Option<Instance>) {
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = value;
    }

    pub fn take_slot(&mut self, index: usize) -> Option<Instance> {
        self.slots.get_mut(index)?.take()
    }
}

impl std::fmt::Debug for DynamicRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(Option::is_some))
            .finish()
    }
}

fn create_typed<T: Default + Any + Send>(_ty: &TypeDescriptor) -> Instance {
    Box::new(T::default())
}

fn reset_typed<T: Default + Any + Send>(_ty: &TypeDescriptor, instance: &mut dyn Any) -> Result<()> {
    let value = instance
        .downcast_mut::<T>()
        .ok_or(Error::InvalidState("record instance has the wrong type"))?;
    *value = T::default();
    Ok(())
}

fn is_typed<T: Any>(instance: &dyn Any) -> bool {
    instance.is::<T>()
}

/// Slot layout of a dynamic record: every non-nullable field is created up front.
fn create_dynamic(ty: &TypeDescriptor) -> Instance {
    let count = ty.fields().iter().map(|f| f.offset() + 1).max().unwrap_or(0);
    let mut record = DynamicRecord::with_slots(count);
    for field in ty.fields() {
        if !field.is_nullable() {
            record.set_slot(field.offset(), Some(field.type_ref().create()));
        }
    }
    Box::new(record)
}

fn reset_dynamic(ty: &TypeDescriptor, instance: &mut dyn Any) -> Result<()> {
    let record = instance
        .downcast_mut::<DynamicRecord>()
        .ok_or(Error::InvalidState("record instance is not a dynamic record"))?;
    for field in ty.fields() {
        let slot = field.offset();
        if field.is_nullable() {
            record.set_slot(slot, None);
        } else if let Some(value) = record.slot_mut(slot) {
            field.type_ref().reset(value)?;
        } else {
            record.set_slot(slot, Some(field.type_ref().create()));
        }
    }
    Ok(())
}

/// Handler of record types.
pub struct RecordHandler {
    create: fn(&TypeDescriptor) -> Instance,
    reset: fn(&TypeDescriptor, &mut dyn Any) -> Result<()>,
    is_owner: fn(&dyn Any) -> bool,
}

impl RecordHandler {
    /// Handler for the concrete struct `T`.
    pub fn typed<T: Default + Any + Send>() -> Self {
        Self {
            create: create_typed::<T>,
            reset: reset_typed::<T>,
            is_owner: is_typed::<T>,
        }
    }

    /// Handler for [`DynamicRecord`] instances.
    pub fn dynamic() -> Self {
        Self {
            create: create_dynamic,
            reset: reset_dynamic,
            is_owner: is_typed::<DynamicRecord>,
        }
    }
}

impl TypeHandler for RecordHandler {
    fn create(&self, ty: &TypeDescriptor) -> Instance {
        (self.create)(ty)
    }

    fn reset(&self, ty: &TypeDescriptor, instance: &mut dyn Any) -> Result<()> {
        (self.reset)(ty, instance)
    }

    fn accepts(&self, _ty: &TypeDescriptor, kind: EventKind) -> bool {
        matches!(kind, EventKind::RecordBegin | EventKind::Null)
    }

    fn parse(
        &self,
        ty: &TypeRef,
        instance: &mut dyn Any,
        cx: &mut ParseContext<'_>,
        event: &Event<'_>,
    ) -> Result<()> {
        if !(self.is_owner)(instance) {
            return Err(Error::mismatch(ty.name(), event.kind()).at(event.position()));
        }
        match cx.state() {
            FrameState::Unmatched => match event.value {
                Value::RecordBegin => cx.open(Container::Record, ty),
                Value::Null => ty.reset(instance),
                _ => Err(Error::mismatch(ty.name(), event.kind()).at(event.position())),
            },
            FrameState::Matched | FrameState::Closed => match event.value {
                Value::RecordEnd => cx.close(Container::Record).map(drop),
                Value::SequenceEnd => {
                    Err(Error::mismatch(ty.name(), event.kind()).at(event.position()))
                }
                _ => {
                    let name = event
                        .name
                        .ok_or_else(|| Error::EntryNotFound(String::from("<unnamed>")))?;
                    let index = ty
                        .find_field_index(name)
                        .ok_or_else(|| Error::EntryNotFound(name.to_owned()))?;
                    dispatch(&ty.fields()[index], index, instance, cx, event)?;
                    cx.count_member();
                    Ok(())
                }
            },
        }
    }

    fn write(
        &self,
        ty: &TypeRef,
        instance: &dyn Any,
        cx: &mut WriteContext<'_>,
        member: Member<'_>,
    ) -> Result<()> {
        if !(self.is_owner)(instance) {
            return Err(Error::InvalidState("record instance has the wrong type"));
        }
        cx.enter()?;
        cx.emit(member.name, Value::RecordBegin, member.field)?;
        for field in ty.fields() {
            if field.flags().contains(FieldFlags::HIDDEN) {
                continue;
            }
            match field.instance(instance) {
                Some(value) => field.type_ref().write(value, cx, Member::of(field))?,
                None if field.flags().contains(FieldFlags::HIDDEN_NULL) => {}
                None => cx.emit(Some(field.name()), Value::Null, Some(field))?,
            }
        }
        cx.emit(member.name, Value::RecordEnd, member.field)?;
        cx.leave();
        Ok(())
    }
}

/// Route a member event into its field.
///
/// The child type is asked first whether it takes the event kind, so a
/// refused event leaves the record untouched. Existing out-of-line values
/// are updated in place; absent ones are created, installed, then parsed.
fn dispatch(
    field: &FieldDescriptor,
    index: usize,
    instance: &mut dyn Any,
    cx: &mut ParseContext<'_>,
    event: &Event<'_>,
) -> Result<()> {
    let kind = event.kind();
    if kind == EventKind::Null && field.is_nullable() {
        return field.clear(instance);
    }
    let child_ty = field.type_ref();
    if !child_ty.accepts(kind) {
        return Err(Error::mismatch(child_ty.name(), kind).at(field.name()));
    }

    let fresh = field.instance_mut(instance).is_none();
    if fresh {
        field.install(instance, child_ty.create())?;
    }
    let child = field
        .instance_mut(instance)
        .ok_or(Error::InvalidState("field vanished after install"))?;
    let result = child_ty.parse(child, &mut cx.child(Step::Field(index)), event);
    if fresh && result.is_err() {
        field.clear(instance)?;
    }
    result
}
