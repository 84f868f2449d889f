// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nested-frame stack.
//!
//! One frame per container currently open. A handler running at depth `d`
//! asks the stack for the state at `d`: no frame means the handler is still
//! probing (`Unmatched`), a frame means it is dispatching members (`Matched`).
//! Popping yields the frame in its `Closed` state.

use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::{Error, Result};
use crate::types::TypeRef;

/// Probe/dispatch state of one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Unmatched,
    Matched,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Record,
    Sequence,
}

/// How to reach a frame's instance from the enclosing frame's instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Declaration index of a record field.
    Field(usize),
    /// Index of a sequence element.
    Element(usize),
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub container: Container,
    pub state: FrameState,
    /// Type governing the frame's instance. Sinks that only track shape leave it empty.
    pub type_ref: Option<TypeRef>,
    /// Path step from the parent instance, `None` for the root.
    pub step: Option<Step>,
    /// Members seen so far.
    pub members: usize,
}

/// Bounded stack of open containers.
#[derive(Debug)]
pub struct NestedStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl Default for NestedStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl NestedStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// State of the container handled at `depth`.
    pub fn state_at(&self, depth: usize) -> FrameState {
        self.frames
            .get(depth)
            .map_or(FrameState::Unmatched, |frame| frame.state)
    }

    /// Open a container. Fails with `TooManyNested` past the depth limit.
    pub fn push(
        &mut self,
        container: Container,
        type_ref: Option<TypeRef>,
        step: Option<Step>,
    ) -> Result<()> {
        if self.frames.len() >= self.max_depth {
            log::error!(
                "[nested] depth limit {} reached, refusing {:?}",
                self.max_depth,
                container
            );
            return Err(Error::TooManyNested {
                limit: self.max_depth,
            });
        }
        self.frames.push(Frame {
            container,
            state: FrameState::Matched,
            type_ref,
            step,
            members: 0,
        });
        Ok(())
    }

    /// Close the innermost container.
    pub fn pop(&mut self) -> Option<Frame> {
        let mut frame = self.frames.pop()?;
        frame.state = FrameState::Closed;
        Some(frame)
    }

    /// Drop every open frame. Safe to call any number of times.
    pub fn clear(&mut self) {
        if !self.frames.is_empty() {
            log::debug!("[nested] unwinding {} open frame(s)", self.frames.len());
        }
        self.frames.clear();
    }
}
