// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field descriptors.

use super::descriptor::{Instance, TypeRef};
use super::record::DynamicRecord;
use crate::error::{Error, Result};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Attribute flags of a field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldFlags(u32);

impl FieldFlags {
    pub const NONE: FieldFlags = FieldFlags(0);
    /// Field may be absent; a `Null` event clears it.
    pub const NULLABLE: FieldFlags = FieldFlags(1 << 0);
    /// Never written.
    pub const HIDDEN: FieldFlags = FieldFlags(1 << 1);
    /// Not written while absent.
    pub const HIDDEN_NULL: FieldFlags = FieldFlags(1 << 2);
    /// Primary key column.
    pub const PRIMARY: FieldFlags = FieldFlags(1 << 3);
    /// Stored out of line (`Option<Box<T>>`).
    pub const POINTER: FieldFlags = FieldFlags(1 << 4);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        FieldFlags(bits)
    }

    pub const fn contains(self, other: FieldFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FieldFlags {
    type Output = FieldFlags;

    fn bitor(self, rhs: FieldFlags) -> FieldFlags {
        FieldFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FieldFlags {
    fn bitor_assign(&mut self, rhs: FieldFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FieldFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(FieldFlags, &str); 5] = [
            (FieldFlags::NULLABLE, "NULLABLE"),
            (FieldFlags::HIDDEN, "HIDDEN"),
            (FieldFlags::HIDDEN_NULL, "HIDDEN_NULL"),
            (FieldFlags::PRIMARY, "PRIMARY"),
            (FieldFlags::POINTER, "POINTER"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "FieldFlags({})", set.join(" | "))
    }
}

/// Typed access to one field of a concrete record struct.
///
/// Generated by `#[derive(Record)]`. `get`/`get_mut` return `None` when the
/// field is absent (`Option` fields) or the owner is of another type.
#[derive(Clone, Copy)]
pub struct FieldAccessor {
    pub get: fn(&dyn Any) -> Option<&dyn Any>,
    pub get_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
    /// Store a freshly created instance into an absent field.
    pub install: Option<fn(&mut dyn Any, Instance) -> bool>,
    /// Make the field absent.
    pub clear: Option<fn(&mut dyn Any)>,
}

/// How a field's value is reached from its owner.
#[derive(Clone, Copy)]
pub enum FieldAccess {
    Accessor(FieldAccessor),
    /// Slot of a [`DynamicRecord`].
    Slot(usize),
}

/// Named member of a record type.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: Cow<'static, str>,
    type_ref: TypeRef,
    offset: usize,
    flags: FieldFlags,
    access: FieldAccess,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("type", &self.type_ref.name())
            .field("offset", &self.offset)
            .field("flags", &self.flags)
            .finish()
    }
}

impl FieldDescriptor {
    /// Field of a concrete struct. `offset` is the byte offset within the struct.
    pub fn with_accessor(
        name: impl Into<Cow<'static, str>>,
        type_ref: TypeRef,
        offset: usize,
        flags: FieldFlags,
        accessor: FieldAccessor,
    ) -> Self {
        Self {
            name: name.into(),
            type_ref,
            offset,
            flags,
            access: FieldAccess::Accessor(accessor),
        }
    }

    /// Field of a [`DynamicRecord`]. `slot` doubles as the offset.
    pub fn slot(
        name: impl Into<Cow<'static, str>>,
        type_ref: TypeRef,
        slot: usize,
        flags: FieldFlags,
    ) -> Self {
        Self {
            name: name.into(),
            type_ref,
            offset: slot,
            flags,
            access: FieldAccess::Slot(slot),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    pub fn access(&self) -> &FieldAccess {
        &self.access
    }

    pub fn is_nullable(&self) -> bool {
        self.flags.contains(FieldFlags::NULLABLE)
    }

    pub fn is_pointer(&self) -> bool {
        self.flags.contains(FieldFlags::POINTER)
    }

    /// Borrow the field's value inside `owner`, `None` when absent.
    pub fn instance<'i>(&self, owner: &'i dyn Any) -> Option<&'i dyn Any> {
        match self.access {
            FieldAccess::Accessor(acc) => (acc.get)(owner),
            FieldAccess::Slot(slot) => owner
                .downcast_ref::<DynamicRecord>()?
                .slot(slot)
                .map(|v| v as &dyn Any),
        }
    }

    pub fn instance_mut<'i>(&self, owner: &'i mut dyn Any) -> Option<&'i mut dyn Any> {
        match self.access {
            FieldAccess::Accessor(acc) => (acc.get_mut)(owner),
            FieldAccess::Slot(slot) => owner
                .downcast_mut::<DynamicRecord>()?
                .slot_mut(slot)
                .map(|v| v as &mut dyn Any),
        }
    }

    /// Store `value` into the field, replacing nothing but an absent value.
    pub fn install(&self, owner: &mut dyn Any, value: Instance) -> Result<()> {
        let done = match self.access {
            FieldAccess::Accessor(acc) => acc.install.is_some_and(|install| install(owner, value)),
            FieldAccess::Slot(slot) => match owner.downcast_mut::<DynamicRecord>() {
                Some(record) => {
                    record.set_slot(slot, Some(value));
                    true
                }
                None => false,
            },
        };
        if done {
            Ok(())
        } else {
            Err(Error::InvalidState("field cannot hold an out-of-line value"))
        }
    }

    /// Make the field absent. Non-nullable inline fields are reset instead.
    pub fn clear(&self, owner: &mut dyn Any) -> Result<()> {
        match self.access {
            FieldAccess::Accessor(acc) => match acc.clear {
                Some(clear) => clear(owner),
                None => {
                    let value = self
                        .instance_mut(owner)
                        .ok_or(Error::InvalidState("field owner has the wrong type"))?;
                    self.type_ref.reset(value)?;
                }
            },
            FieldAccess::Slot(slot) => {
                let record = owner
                    .downcast_mut::<DynamicRecord>()
                    .ok_or(Error::InvalidState("field owner is not a dynamic record"))?;
                record.set_slot(slot, None);
            }
        }
        Ok(())
    }
}
