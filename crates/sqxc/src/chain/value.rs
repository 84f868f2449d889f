// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Terminal node building a typed value from events.

use super::{ChainNode, Ctrl, Forward, NodeInfo, Product};
use crate::config::UnknownFieldPolicy;
use crate::context::ParseContext;
use crate::error::{Error, Result};
use crate::event::{Event, KindSet};
use crate::nested::{Frame, NestedStack};
use crate::types::{Instance, Reflect, TypeRef};
use std::any::Any;

/// Materializes events into an instance of one type.
///
/// Each event goes to the handler of the innermost open container, found by
/// walking the frame path down from the root instance. Unknown fields are
/// skipped (with their whole subtree) or abort the run, per
/// [`UnknownFieldPolicy`]. Events a handler refuses are declined with
/// `TypeMismatch` so another node may take them. A run that finishes with
/// open containers discards the partial value, including one supplied
/// through [`ValueMaterializer::with_instance`].
pub struct ValueMaterializer {
    type_ref: TypeRef,
    instance: Option<Instance>,
    nested: NestedStack,
    policy: UnknownFieldPolicy,
    skip_depth: usize,
    warnings: Vec<Error>,
    complete: bool,
    poisoned: bool,
}

impl ValueMaterializer {
    pub fn new(type_ref: TypeRef) -> Self {
        Self {
            type_ref,
            instance: None,
            nested: NestedStack::default(),
            policy: UnknownFieldPolicy::default(),
            skip_depth: 0,
            warnings: Vec::new(),
            complete: false,
            poisoned: false,
        }
    }

    pub fn of<T: Reflect>() -> Self {
        Self::new(T::type_ref())
    }

    /// Update an existing instance instead of creating a fresh one.
    pub fn with_instance(type_ref: TypeRef, instance: Instance) -> Self {
        let mut node = Self::new(type_ref);
        node.instance = Some(instance);
        node
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    /// Containers currently open.
    pub fn depth(&self) -> usize {
        self.nested.len()
    }

    pub fn nested(&self) -> &NestedStack {
        &self.nested
    }

    /// A whole root value has been received.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Recoverable problems seen during the run.
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    /// The finished value, if complete and of type `T`.
    pub fn value<T: Any>(&self) -> Option<&T> {
        if !self.complete {
            return None;
        }
        self.instance.as_ref()?.downcast_ref::<T>()
    }

    /// Take the finished value.
    pub fn take<T: Any>(&mut self) -> Result<T> {
        let instance = self.take_instance()?;
        match instance.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(instance) => {
                self.instance = Some(instance);
                self.complete = true;
                Err(Error::InvalidState("materialized value has a different type"))
            }
        }
    }

    /// Take the finished value as an untyped instance.
    pub fn take_instance(&mut self) -> Result<Instance> {
        if !self.complete {
            return Err(Error::InvalidState("value is incomplete"));
        }
        let instance = self
            .instance
            .take()
            .ok_or(Error::InvalidState("value already taken"))?;
        self.complete = false;
        Ok(instance)
    }

    fn reset_run(&mut self) {
        self.nested.clear();
        self.skip_depth = 0;
        self.poisoned = false;
    }

    fn skip(&mut self, event: &Event<'_>) -> Result<()> {
        let kind = event.kind();
        if kind.is_begin() {
            if self.nested.len() + self.skip_depth >= self.nested.max_depth() {
                return Err(Error::TooManyNested {
                    limit: self.nested.max_depth(),
                });
            }
            self.skip_depth += 1;
        } else if kind.is_end() {
            self.skip_depth -= 1;
            if self.skip_depth == 0 && self.nested.is_empty() {
                self.complete = true;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, event: &Event<'_>) -> Result<()> {
        let root: &mut dyn Any = &mut **self
            .instance
            .get_or_insert_with(|| self.type_ref.create());
        let (ty, depth, step, target) = match self.nested.frames() {
            [] => (self.type_ref.clone(), 0, None, root),
            frames => {
                let top = &frames[frames.len() - 1];
                let ty = top
                    .type_ref
                    .clone()
                    .ok_or(Error::InvalidState("open container without a type"))?;
                (ty, frames.len() - 1, top.step, resolve(root, frames)?)
            }
        };
        let mut cx = ParseContext::new(&mut self.nested, depth, step);
        ty.parse(target, &mut cx, event)
    }
}

/// Instance of the innermost frame, reached from the root through each frame's step.
fn resolve<'i>(root: &'i mut dyn Any, frames: &[Frame]) -> Result<&'i mut dyn Any> {
    let mut current = root;
    for pair in frames.windows(2) {
        let parent = pair[0]
            .type_ref
            .as_ref()
            .ok_or(Error::InvalidState("open container without a type"))?;
        let step = pair[1]
            .step
            .ok_or(Error::InvalidState("nested frame without a path step"))?;
        current = parent
            .descend_mut(current, step)
            .ok_or(Error::InvalidState("open container vanished"))?;
    }
    Ok(current)
}

impl ChainNode for ValueMaterializer {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "value",
            accepts: KindSet::ALL,
            emits: KindSet::EMPTY,
            product: Product::Value,
        }
    }

    fn ctrl(&mut self, ctrl: Ctrl<'_>) -> Result<()> {
        match ctrl {
            Ctrl::Ready(cx) => {
                self.policy = cx.config.unknown_field;
                self.nested.set_max_depth(cx.config.max_depth);
                self.reset_run();
                self.warnings.clear();
                self.complete = false;
                if self.instance.is_none() {
                    self.instance = Some(self.type_ref.create());
                }
                log::debug!("[value] ready for '{}'", self.type_ref.name());
                Ok(())
            }
            Ctrl::Finish => {
                if !self.nested.is_empty() || self.skip_depth > 0 {
                    log::debug!(
                        "[value] '{}' finished with {} open container(s), discarding partial value",
                        self.type_ref.name(),
                        self.nested.len() + self.skip_depth
                    );
                    self.complete = false;
                    self.instance = None;
                }
                self.reset_run();
                Ok(())
            }
            other => Err(other.unsupported("value")),
        }
    }

    fn send(&mut self, event: &Event<'_>, _out: &mut Forward<'_>) -> Result<()> {
        if self.poisoned {
            return Err(Error::Aborted);
        }
        if self.skip_depth > 0 {
            return self.skip(event).inspect_err(|_| self.poisoned = true);
        }

        let starts_root = self.nested.is_empty();
        match self.dispatch(event) {
            Ok(()) => {
                if self.nested.is_empty() {
                    self.complete = true;
                } else if starts_root {
                    self.complete = false;
                }
                Ok(())
            }
            Err(e) if e.is_mismatch() => Err(e),
            Err(e) if e.is_warning() && self.policy == UnknownFieldPolicy::Skip => {
                log::warn!("[value] '{}': {}", self.type_ref.name(), e);
                if matches!(e, Error::EntryNotFound(_)) && event.kind().is_begin() {
                    self.skip_depth = 1;
                }
                self.warnings.push(e);
                Ok(())
            }
            Err(e) => {
                log::error!("[value] '{}': {}", self.type_ref.name(), e);
                self.poisoned = true;
                Err(e)
            }
        }
    }

    fn is_capturing(&self) -> bool {
        self.skip_depth > 0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::config::ChainConfig;
    use crate::event::Value;
    use crate::types::{scalar, DynamicRecord, FieldFlags, TypeDescriptorBuilder};

    fn user_type() -> TypeRef {
        TypeRef::new(
            TypeDescriptorBuilder::dynamic("User")
                .slot_field("id", scalar::int(), FieldFlags::NONE)
                .slot_field("name", scalar::string(), FieldFlags::NONE)
                .slot_field("tags", Vec::<String>::type_ref(), FieldFlags::NULLABLE)
                .build()
                .unwrap(),
        )
    }

    fn send_all(chain: &mut Chain, events: &[Event<'_>]) -> Result<()> {
        events.iter().try_for_each(|e| chain.send(e))
    }

    #[test]
    fn test_materializes_dynamic_record() {
        let mut chain = Chain::new().with(ValueMaterializer::new(user_type()));
        chain.ready().unwrap();
        send_all(
            &mut chain,
            &[
                Event::new(Value::RecordBegin),
                Event::named("id", Value::Int(7)),
                Event::named("tags", Value::SequenceBegin),
                Event::new(Value::str("a")),
                Event::new(Value::str("b")),
                Event::named("tags", Value::SequenceEnd),
                Event::named("name", Value::str("Ada")),
                Event::new(Value::RecordEnd),
            ],
        )
        .unwrap();
        chain.finish().unwrap();

        let node = chain.node_mut::<ValueMaterializer>().unwrap();
        let ty = node.type_ref().clone();
        let record = node.take::<DynamicRecord>().unwrap();
        assert_eq!(ty.get::<i32>(&record, "id"), Some(&7));
        assert_eq!(ty.get::<String>(&record, "name").unwrap(), "Ada");
        assert_eq!(
            ty.get::<Vec<String>>(&record, "tags").unwrap(),
            &vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_unknown_subtree_is_skipped() {
        let mut chain = Chain::new().with(ValueMaterializer::new(user_type()));
        chain.ready().unwrap();
        send_all(
            &mut chain,
            &[
                Event::new(Value::RecordBegin),
                Event::named("extra", Value::RecordBegin),
                Event::named("id", Value::Int(99)),
                Event::named("deep", Value::SequenceBegin),
                Event::new(Value::Int(1)),
                Event::named("deep", Value::SequenceEnd),
                Event::named("extra", Value::RecordEnd),
                Event::named("ghost", Value::Bool(true)),
                Event::named("id", Value::Int(1)),
                Event::new(Value::RecordEnd),
            ],
        )
        .unwrap();

        let node = chain.node::<ValueMaterializer>().unwrap();
        assert!(node.is_complete());
        assert_eq!(node.warnings().len(), 2);
        let record = node.value::<DynamicRecord>().unwrap();
        assert_eq!(node.type_ref().get::<i32>(record, "id"), Some(&1));
    }

    #[test]
    fn test_abort_policy_poisons_until_finish() {
        let config = ChainConfig::default().with_unknown_field(UnknownFieldPolicy::Abort);
        let mut chain = Chain::with_config(config).with(ValueMaterializer::new(user_type()));
        chain.ready().unwrap();
        chain.send(&Event::new(Value::RecordBegin)).unwrap();
        let err = chain.send(&Event::named("ghost", Value::Int(1))).unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(_)));
        let err = chain.send(&Event::named("id", Value::Int(1))).unwrap_err();
        assert!(matches!(err, Error::Aborted));

        chain.finish().unwrap();
        let node = chain.node::<ValueMaterializer>().unwrap();
        assert!(!node.is_complete());
        assert!(node.nested().is_empty());
    }

    #[test]
    fn test_incomplete_value_is_not_exposed() {
        let mut chain = Chain::new().with(ValueMaterializer::new(user_type()));
        chain.ready().unwrap();
        chain.send(&Event::new(Value::RecordBegin)).unwrap();
        chain.send(&Event::named("id", Value::Int(3))).unwrap();
        chain.finish().unwrap();

        let node = chain.node_mut::<ValueMaterializer>().unwrap();
        assert!(node.value::<DynamicRecord>().is_none());
        assert!(matches!(
            node.take::<DynamicRecord>(),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_wrong_take_type_keeps_value() {
        let mut chain = Chain::new().with(ValueMaterializer::of::<i64>());
        chain.ready().unwrap();
        chain.send(&Event::new(Value::Int64(5))).unwrap();
        let node = chain.node_mut::<ValueMaterializer>().unwrap();
        assert!(node.take::<String>().is_err());
        assert_eq!(node.take::<i64>().unwrap(), 5);
    }
}
