// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Terminal node keeping a copy of every event.

use super::{ChainNode, Ctrl, Forward, NodeInfo, Product};
use crate::error::Result;
use crate::event::{Event, KindSet, Value};
use crate::types::FieldFlags;
use std::any::Any;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub name: Option<String>,
    pub value: Value<'static>,
    /// Flags of the originating field, `NONE` when absent.
    pub flags: FieldFlags,
}

/// Records events, for tests and for replaying a stream later.
#[derive(Debug)]
pub struct EventRecorder {
    accepts: KindSet,
    product: Product,
    events: Vec<RecordedEvent>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            accepts: KindSet::ALL,
            product: Product::Events,
            events: Vec::new(),
        }
    }

    /// Only take `accepts`, declining the rest at routing time.
    pub fn accepting(mut self, accepts: KindSet) -> Self {
        self.accepts = accepts;
        self
    }

    /// Advertise another product, e.g. to steer a blob codec.
    pub fn with_product(mut self, product: Product) -> Self {
        self.product = product;
        self
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Feed the recorded events into another chain.
    pub fn replay<S: crate::context::EventSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        self.events.iter().try_for_each(|e| {
            sink.send(&Event {
                name: e.name.as_deref(),
                value: e.value.clone(),
                field: None,
            })
        })
    }
}

impl ChainNode for EventRecorder {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "recorder",
            accepts: self.accepts,
            emits: KindSet::EMPTY,
            product: self.product,
        }
    }

    fn ctrl(&mut self, ctrl: Ctrl<'_>) -> Result<()> {
        match ctrl {
            Ctrl::Ready(_) => {
                self.events.clear();
                Ok(())
            }
            Ctrl::Finish => Ok(()),
            other => Err(other.unsupported("recorder")),
        }
    }

    fn send(&mut self, event: &Event<'_>, _out: &mut Forward<'_>) -> Result<()> {
        self.events.push(RecordedEvent {
            name: event.name.map(str::to_owned),
            value: event.value.clone().into_owned(),
            flags: event.field.map_or(FieldFlags::NONE, |f| f.flags()),
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
