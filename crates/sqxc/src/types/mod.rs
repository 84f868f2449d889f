// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptor system
//!
//! Runtime description of scalar, record and sequence values, used by every
//! chain node to create, reset, parse and write instances it knows nothing
//! about at compile time.
//!
//! # Features
//!
//! - **TypeDescriptor**: construction, reset, parse and write hooks plus fields
//! - **FieldDescriptor**: named member with offset, flags and typed access
//! - **TypeRef**: static or reference-counted shared descriptor
//! - **Builder API**: fluent construction, column lists, derive support
//!
//! # Example
//!
//! ```
//! use sqxc::types::{scalar, ColumnDef, FieldFlags, TypeDescriptor, TypeRef};
//!
//! let accounts = TypeRef::new(TypeDescriptor::from_columns(
//!     "accounts",
//!     &[
//!         ColumnDef::new("id", scalar::int64(), 0).flags(FieldFlags::PRIMARY),
//!         ColumnDef::new("owner", scalar::string(), 1),
//!     ],
//! ).unwrap());
//!
//! let mut row = accounts.create();
//! *accounts.get_mut::<i64>(&mut *row, "id").unwrap() = 7;
//! assert_eq!(accounts.get::<i64>(&*row, "id"), Some(&7));
//! ```

mod builder;
mod descriptor;
mod field;
mod handler;
mod record;
mod reflect;
mod registry;
pub mod scalar;
mod sequence;

pub use builder::{ColumnDef, TypeDescriptorBuilder};
pub use descriptor::{Instance, Lifetime, ScalarKind, TypeDescriptor, TypeKind, TypeRef};
pub use field::{FieldAccess, FieldAccessor, FieldDescriptor, FieldFlags};
pub use handler::{Member, TypeHandler};
pub use record::{DynamicRecord, RecordHandler};
pub use reflect::{Record, Reflect};
pub use registry::TypeRegistry;
pub use scalar::{Blob, ScalarHandler, ScalarValue};
pub use sequence::{DynamicSequence, DynamicStore, SequenceHandler, SequenceStore, VecStore};
