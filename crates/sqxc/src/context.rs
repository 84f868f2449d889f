// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Contexts threaded through type handlers.

use crate::error::{Error, Result};
use crate::event::{Event, Value};
use crate::nested::{Container, Frame, FrameState, NestedStack, Step};
use crate::types::{FieldDescriptor, TypeRef};

/// Anything that takes events.
pub trait EventSink {
    fn send(&mut self, event: &Event<'_>) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn send(&mut self, event: &Event<'_>) -> Result<()> {
        (**self).send(event)
    }
}

/// Position of a handler inside the frame stack while parsing.
pub struct ParseContext<'n> {
    nested: &'n mut NestedStack,
    depth: usize,
    step: Option<Step>,
}

impl<'n> ParseContext<'n> {
    pub fn new(nested: &'n mut NestedStack, depth: usize, step: Option<Step>) -> Self {
        Self {
            nested,
            depth,
            step,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn step(&self) -> Option<Step> {
        self.step
    }

    pub fn state(&self) -> FrameState {
        self.nested.state_at(self.depth)
    }

    /// Enter `Matched` for the container at this depth.
    pub fn open(&mut self, container: Container, ty: &TypeRef) -> Result<()> {
        if self.nested.len() != self.depth {
            return Err(Error::InvalidState("container opened above the innermost frame"));
        }
        self.nested.push(container, Some(ty.clone()), self.step)
    }

    /// Close the container at this depth.
    pub fn close(&mut self, container: Container) -> Result<Frame> {
        match self.nested.top() {
            Some(frame) if self.nested.len() == self.depth + 1 && frame.container == container => {}
            _ => return Err(Error::InvalidState("container closed out of order")),
        }
        self.nested
            .pop()
            .ok_or(Error::InvalidState("no open container"))
    }

    /// Count one more member in the container at this depth.
    pub fn count_member(&mut self) {
        if let Some(frame) = self.nested.top_mut() {
            frame.members += 1;
        }
    }

    /// Context for a member one level down.
    pub fn child(&mut self, step: Step) -> ParseContext<'_> {
        ParseContext {
            nested: &mut *self.nested,
            depth: self.depth + 1,
            step: Some(step),
        }
    }
}

/// Destination and depth bookkeeping while writing.
pub struct WriteContext<'s> {
    sink: &'s mut dyn EventSink,
    depth: usize,
    max_depth: usize,
}

impl<'s> WriteContext<'s> {
    pub fn new(sink: &'s mut dyn EventSink, max_depth: usize) -> Self {
        Self {
            sink,
            depth: 0,
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn emit(
        &mut self,
        name: Option<&str>,
        value: Value<'_>,
        field: Option<&FieldDescriptor>,
    ) -> Result<()> {
        self.sink.send(&Event { name, value, field })
    }

    /// Open a container level.
    pub fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::TooManyNested {
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
