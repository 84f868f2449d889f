// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sequence types.

use super::descriptor::{Instance, TypeDescriptor, TypeRef};
use super::handler::{Member, TypeHandler};
use crate::context::{ParseContext, WriteContext};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, Value};
use crate::nested::{Container, FrameState, Step};
use std::any::Any;
use std::marker::PhantomData;

/// Element storage behind a sequence type.
pub trait SequenceStore: Send + Sync {
    fn create(&self) -> Instance;

    fn len(&self, instance: &dyn Any) -> Option<usize>;

    fn element<'i>(&self, instance: &'i dyn Any, index: usize) -> Option<&'i dyn Any>;

    fn element_mut<'i>(&self, instance: &'i mut dyn Any, index: usize) -> Option<&'i mut dyn Any>;

    /// Append a zero-valued element, returning its index.
    fn push(&self, instance: &mut dyn Any, element: &TypeDescriptor) -> Option<usize>;

    fn truncate(&self, instance: &mut dyn Any, len: usize);
}

/// `Vec<T>` storage.
pub struct VecStore<T>(PhantomData<fn() -> T>);

impl<T> Default for VecStore<T> {
    fn default() -> Self {
        VecStore(PhantomData)
    }
}

impl<T: Default + Any + Send> SequenceStore for VecStore<T> {
    fn create(&self) -> Instance {
        Box::new(Vec::<T>::new())
    }

    fn len(&self, instance: &dyn Any) -> Option<usize> {
        instance.downcast_ref::<Vec<T>>().map(Vec::len)
    }

    fn element<'i>(&self, instance: &'i dyn Any, index: usize) -> Option<&'i dyn Any> {
        let item = instance.downcast_ref::<Vec<T>>()?.get(index)?;
        Some(item as &dyn Any)
    }

    fn element_mut<'i>(&self, instance: &'i mut dyn Any, index: usize) -> Option<&'i mut dyn Any> {
        let item = instance.downcast_mut::<Vec<T>>()?.get_mut(index)?;
        Some(item as &mut dyn Any)
    }

    fn push(&self, instance: &mut dyn Any, _element: &TypeDescriptor) -> Option<usize> {
        let vec = instance.downcast_mut::<Vec<T>>()?;
        vec.push(T::default());
        Some(vec.len() - 1)
    }

    fn truncate(&self, instance: &mut dyn Any, len: usize) {
        if let Some(vec) = instance.downcast_mut::<Vec<T>>() {
            vec.truncate(len);
        }
    }
}

/// Elements of a runtime-defined sequence, each created by the element type.
#[derive(Debug, Default)]
pub struct DynamicSequence {
    items: Vec<Instance>,
}

impl DynamicSequence {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&(dyn Any + Send)> {
        self.items.get(index).map(|b| &**b)
    }

    pub fn push(&mut self, item: Instance) {
        self.items.push(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Any + Send)> {
        self.items.iter().map(|b| &**b)
    }
}

#[derive(Default)]
pub struct DynamicStore;

impl SequenceStore for DynamicStore {
    fn create(&self) -> Instance {
        Box::new(DynamicSequence::default())
    }

    fn len(&self, instance: &dyn Any) -> Option<usize> {
        instance.downcast_ref::<DynamicSequence>().map(DynamicSequence::len)
    }

    fn element<'i>(&self, instance: &'i dyn Any, index: usize) -> Option<&'i dyn Any> {
        let item = instance.downcast_ref::<DynamicSequence>()?.items.get(index)?;
        Some(&**item as &dyn Any)
    }

    fn element_mut<'i>(&self, instance: &'i mut dyn Any, index: usize) -> Option<&'i mut dyn Any> {
        let item = instance.downcast_mut::<DynamicSequence>()?.items.get_mut(index)?;
        Some(&mut **item as &mut dyn Any)
    }

    fn push(&self, instance: &mut dyn Any, element: &TypeDescriptor) -> Option<usize> {
        let seq = instance.downcast_mut::<DynamicSequence>()?;
        seq.items.push(element.create());
        Some(seq.items.len() - 1)
    }

    fn truncate(&self, instance: &mut dyn Any, len: usize) {
        if let Some(seq) = instance.downcast_mut::<DynamicSequence>() {
            seq.items.truncate(len);
        }
    }
}

/// Handler of sequence types.
pub struct SequenceHandler {
    store: Box<dyn SequenceStore>,
}

impl SequenceHandler {
    pub fn new(store: Box<dyn SequenceStore>) -> Self {
        Self { store }
    }

    pub fn of_vec<T: Default + Any + Send>() -> Self {
        Self::new(Box::new(VecStore::<T>::default()))
    }

    pub fn dynamic() -> Self {
        Self::new(Box::new(DynamicStore))
    }
}

impl TypeHandler for SequenceHandler {
    fn create(&self, _ty: &TypeDescriptor) -> Instance {
        self.store.create()
    }

    fn reset(&self, _ty: &TypeDescriptor, instance: &mut dyn Any) -> Result<()> {
        if self.store.len(instance).is_none() {
            return Err(Error::InvalidState("sequence instance has the wrong type"));
        }
        self.store.truncate(instance, 0);
        Ok(())
    }

    fn accepts(&self, _ty: &TypeDescriptor, kind: EventKind) -> bool {
        matches!(kind, EventKind::SequenceBegin | EventKind::Null)
    }

    fn parse(
        &self,
        ty: &TypeRef,
        instance: &mut dyn Any,
        cx: &mut ParseContext<'_>,
        event: &Event<'_>,
    ) -> Result<()> {
        let Some(len) = self.store.len(instance) else {
            return Err(Error::mismatch(ty.name(), event.kind()).at(event.position()));
        };
        match cx.state() {
            FrameState::Unmatched => match event.value {
                Value::SequenceBegin => {
                    if ty.element().is_none() {
                        log::error!("[types] sequence '{}' has no element type", ty.name());
                        return Err(Error::NoElementType(ty.name().to_owned()));
                    }
                    cx.open(Container::Sequence, ty)
                }
                Value::Null => self.reset(ty, instance),
                _ => Err(Error::mismatch(ty.name(), event.kind()).at(event.position())),
            },
            FrameState::Matched | FrameState::Closed => {
                if let Value::SequenceEnd = event.value {
                    return cx.close(Container::Sequence).map(drop);
                }
                let element = ty
                    .element()
                    .ok_or_else(|| Error::NoElementType(ty.name().to_owned()))?;
                let kind = event.kind();
                if kind == EventKind::RecordEnd || !element.accepts(kind) {
                    return Err(Error::mismatch(element.name(), kind).at(event.position()));
                }
                if let Some(max) = ty.max_length() {
                    if len >= max {
                        return Err(Error::SequenceTooLong {
                            max,
                            at: event.position().to_owned(),
                        });
                    }
                }
                let index = self
                    .store
                    .push(instance, element)
                    .ok_or(Error::InvalidState("sequence refused a new element"))?;
                let item = self
                    .store
                    .element_mut(instance, index)
                    .ok_or(Error::InvalidState("sequence element vanished after push"))?;
                let result = element.parse(item, &mut cx.child(Step::Element(index)), event);
                if result.is_err() {
                    self.store.truncate(instance, index);
                } else {
                    cx.count_member();
                }
                result
            }
        }
    }

    fn write(
        &self,
        ty: &TypeRef,
        instance: &dyn Any,
        cx: &mut WriteContext<'_>,
        member: Member<'_>,
    ) -> Result<()> {
        let len = self
            .store
            .len(instance)
            .ok_or(Error::InvalidState("sequence instance has the wrong type"))?;
        let element = ty
            .element()
            .ok_or_else(|| Error::NoElementType(ty.name().to_owned()))?;
        cx.enter()?;
        cx.emit(member.name, Value::SequenceBegin, member.field)?;
        for index in 0..len {
            let item = self
                .store
                .element(instance, index)
                .ok_or(Error::InvalidState("sequence element vanished while writing"))?;
            element.write(item, cx, Member::default())?;
        }
        cx.emit(member.name, Value::SequenceEnd, member.field)?;
        cx.leave();
        Ok(())
    }

    fn sequence(&self) -> Option<&dyn SequenceStore> {
        Some(self.store.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nested::NestedStack;
    use crate::types::{scalar, TypeDescriptorBuilder};

    fn run(ty: &TypeRef, instance: &mut dyn Any, events: &[Event<'_>]) -> Result<()> {
        let mut nested = NestedStack::default();
        for event in events {
            let depth = nested.len().saturating_sub(1);
            let mut cx = ParseContext::new(&mut nested, depth, None);
            ty.parse(instance, &mut cx, event)?;
        }
        assert!(nested.is_empty());
        Ok(())
    }

    #[test]
    fn test_vec_of_ints() {
        let ty = TypeRef::new(TypeDescriptorBuilder::vec_of::<i32>("ints", scalar::int()).build().unwrap());
        let mut values: Vec<i32> = Vec::new();
        run(
            &ty,
            &mut values,
            &[
                Event::new(Value::SequenceBegin),
                Event::new(Value::Int(1)),
                Event::new(Value::str("2")),
                Event::new(Value::Int64(3)),
                Event::new(Value::SequenceEnd),
            ],
        )
        .unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_failed_element_is_removed() {
        let ty = TypeRef::new(TypeDescriptorBuilder::vec_of::<i32>("ints", scalar::int()).build().unwrap());
        let mut values: Vec<i32> = Vec::new();
        let mut nested = NestedStack::default();
        let mut cx = ParseContext::new(&mut nested, 0, None);
        ty.parse(&mut values, &mut cx, &Event::new(Value::SequenceBegin))
            .unwrap();
        let mut cx = ParseContext::new(&mut nested, 0, None);
        let err = ty
            .parse(&mut values, &mut cx, &Event::new(Value::str("nope")))
            .unwrap_err();
        assert!(err.is_mismatch());
        assert!(values.is_empty());
    }

    #[test]
    fn test_bounded_sequence() {
        let ty = TypeRef::new(
            TypeDescriptorBuilder::vec_of::<i32>("pair", scalar::int())
                .max_length(2)
                .build()
                .unwrap(),
        );
        let mut values: Vec<i32> = Vec::new();
        let err = run(
            &ty,
            &mut values,
            &[
                Event::new(Value::SequenceBegin),
                Event::new(Value::Int(1)),
                Event::new(Value::Int(2)),
                Event::new(Value::Int(3)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::SequenceTooLong { max: 2, .. }));
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_missing_element_type() {
        let ty = TypeRef::new(TypeDescriptorBuilder::dynamic_sequence("broken").build().unwrap());
        let mut instance = ty.create();
        let mut nested = NestedStack::default();
        let mut cx = ParseContext::new(&mut nested, 0, None);
        let err = ty
            .parse(&mut *instance, &mut cx, &Event::new(Value::SequenceBegin))
            .unwrap_err();
        assert!(matches!(err, Error::NoElementType(_)));
        assert!(nested.is_empty());
    }
}
