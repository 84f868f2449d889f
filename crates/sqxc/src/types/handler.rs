// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-type behaviour behind a [`TypeDescriptor`].

use super::descriptor::{Instance, TypeDescriptor, TypeRef};
use super::field::FieldDescriptor;
use super::sequence::SequenceStore;
use crate::context::{ParseContext, WriteContext};
use crate::error::Result;
use crate::event::{Event, EventKind};
use std::any::Any;

/// Name and descriptor under which a value is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct Member<'a> {
    pub name: Option<&'a str>,
    pub field: Option<&'a FieldDescriptor>,
}

impl<'a> Member<'a> {
    pub const ROOT: Member<'static> = Member {
        name: None,
        field: None,
    };

    pub fn of(field: &'a FieldDescriptor) -> Self {
        Self {
            name: Some(field.name()),
            field: Some(field),
        }
    }
}

/// Construction, reset, parse and write hooks of one type.
///
/// `parse` receives events one at a time. A container handler looks at the
/// frame state at `cx.depth()`: without a frame it only probes for its begin
/// event, with a frame it dispatches members. A handler that cannot take an
/// event returns `TypeMismatch` without touching `instance`.
pub trait TypeHandler: Send + Sync {
    fn create(&self, ty: &TypeDescriptor) -> Instance;

    fn reset(&self, ty: &TypeDescriptor, instance: &mut dyn Any) -> Result<()>;

    /// Whether an event of `kind` may start a value of this type.
    fn accepts(&self, ty: &TypeDescriptor, kind: EventKind) -> bool;

    fn parse(
        &self,
        ty: &TypeRef,
        instance: &mut dyn Any,
        cx: &mut ParseContext<'_>,
        event: &Event<'_>,
    ) -> Result<()>;

    fn write(
        &self,
        ty: &TypeRef,
        instance: &dyn Any,
        cx: &mut WriteContext<'_>,
        member: Member<'_>,
    ) -> Result<()>;

    /// Element storage of sequence types.
    fn sequence(&self) -> Option<&dyn SequenceStore> {
        None
    }
}
