// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chain of push-event nodes.
//!
//! A [`Chain`] is an ordered list of [`ChainNode`]s. READY computes, once per
//! run, where each node forwards its output: the first other node (in
//! cyclic order after it) that accepts any kind the node emits, preferring
//! nodes that produce something over pass-through nodes. A node that
//! cannot take an event declines with `TypeMismatch` and the next accepting
//! node is tried. FINISH ends the run and makes every node drop open frames.
//!
//! # Example
//!
//! ```
//! use sqxc::chain::{Chain, JsonWriter};
//! use sqxc::{Event, Value};
//!
//! let mut chain = Chain::new().with(JsonWriter::new());
//! chain.ready().unwrap();
//! chain.send(&Event::new(Value::SequenceBegin)).unwrap();
//! chain.send(&Event::new(Value::Int(1))).unwrap();
//! chain.send(&Event::new(Value::SequenceEnd)).unwrap();
//! chain.finish().unwrap();
//!
//! let writer = chain.node::<JsonWriter>().unwrap();
//! assert_eq!(writer.text().unwrap(), "[1]");
//! ```

pub mod blob;
mod json_reader;
mod json_writer;
mod recorder;
mod row;
mod statement;
mod value;

pub use blob::{BlobCodec, BlobEncoding};
pub use json_reader::{JsonParser, JsonReader};
pub use json_writer::JsonWriter;
pub use recorder::{EventRecorder, RecordedEvent};
pub use row::{feed_row, feed_rows, Cell, RowSource};
pub use statement::{Dialect, Statement, StatementWriter};
pub use value::ValueMaterializer;

use crate::config::{ChainConfig, SharedConfig};
use crate::context::{EventSink, WriteContext};
use crate::error::{Error, Result};
use crate::event::{Event, KindSet};
use crate::types::{Member, Reflect, TypeRef};
use std::any::Any;

/// What a terminal node produces, used to pick wire encodings upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    None,
    /// In-memory value.
    Value,
    /// JSON text.
    Json,
    /// Relational statement fragments.
    Sql(Dialect),
    /// Recorded events.
    Events,
}

impl Product {
    /// Textual byte encoding this product wants, if it cannot carry raw bytes.
    pub fn blob_encoding(self) -> Option<BlobEncoding> {
        match self {
            Product::Json => Some(BlobEncoding::Base64),
            _ => None,
        }
    }
}

/// Static description of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: &'static str,
    /// Kinds the node takes.
    pub accepts: KindSet,
    /// Kinds the node forwards. Empty for terminal nodes.
    pub emits: KindSet,
    pub product: Product,
}

/// Handed to each node on READY.
#[derive(Debug)]
pub struct ReadyContext<'a> {
    pub config: &'a ChainConfig,
    /// The node's destination for this run.
    pub dest: Option<NodeInfo>,
}

/// Control calls.
#[derive(Debug)]
pub enum Ctrl<'a> {
    Ready(&'a ReadyContext<'a>),
    Finish,
    /// Node-specific operation.
    Custom(u32),
}

impl Ctrl<'_> {
    pub fn unsupported(&self, node: &str) -> Error {
        match self {
            Ctrl::Custom(id) => Error::NotSupported(format!("{node}: control {id}")),
            other => Error::NotSupported(format!("{node}: {other:?}")),
        }
    }
}

/// One unit of the push pipeline.
pub trait ChainNode: Send + 'static {
    fn info(&self) -> NodeInfo;

    fn ctrl(&mut self, ctrl: Ctrl<'_>) -> Result<()>;

    /// Consume, transform and forward through `out`, or decline with `TypeMismatch`.
    fn send(&mut self, event: &Event<'_>, out: &mut Forward<'_>) -> Result<()>;

    /// While true, the chain starts delivery at this node.
    fn is_capturing(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Slot {
    /// `None` while the node runs.
    node: Option<Box<dyn ChainNode>>,
    info: NodeInfo,
    dest: Option<usize>,
}

/// Handle a running node forwards through.
pub struct Forward<'c> {
    slots: &'c mut [Slot],
    origin: usize,
}

impl Forward<'_> {
    /// Destination pinned at READY.
    pub fn dest(&self) -> Option<NodeInfo> {
        let dest = self.slots.get(self.origin)?.dest?;
        Some(self.slots[dest].info)
    }

    /// Deliver to the destination, falling back to other accepting nodes.
    pub fn forward(&mut self, event: &Event<'_>) -> Result<()> {
        let dest = self.slots[self.origin]
            .dest
            .ok_or(Error::InvalidState("node has no destination"))?;
        deliver(&mut *self.slots, dest, Some(self.origin), event)
    }
}

impl EventSink for Forward<'_> {
    fn send(&mut self, event: &Event<'_>) -> Result<()> {
        self.forward(event)
    }
}

/// Offer `event` to nodes in cyclic order from `start`.
///
/// Busy nodes (already on the call stack) and nodes that do not accept the
/// kind are skipped. A `TypeMismatch` moves on to the next node; anything
/// else ends delivery.
fn deliver(slots: &mut [Slot], start: usize, skip: Option<usize>, event: &Event<'_>) -> Result<()> {
    let kind = event.kind();
    let count = slots.len();
    let mut outcome = Err(Error::TypeNotSupported(kind));
    for offset in 0..count {
        let index = (start + offset) % count;
        if Some(index) == skip || !slots[index].info.accepts.contains(kind) {
            continue;
        }
        let Some(mut node) = slots[index].node.take() else {
            continue;
        };
        let result = node.send(
            event,
            &mut Forward {
                slots: &mut *slots,
                origin: index,
            },
        );
        slots[index].node = Some(node);
        match result {
            Err(e) if e.is_mismatch() => {
                log::trace!("[chain] {} declined {}: {}", slots[index].info.name, kind, e);
                outcome = Err(e);
            }
            other => return other,
        }
    }
    outcome
}

/// Nearest other node in cyclic order accepting anything `from` emits.
///
/// Nodes with a product win over pass-through nodes, so a node at the tail
/// resolves toward the terminal rather than wrapping back onto a source.
fn route(infos: &[NodeInfo], from: usize) -> Option<usize> {
    let emits = infos[from].emits;
    if emits.is_empty() {
        return None;
    }
    let count = infos.len();
    let accepting = || {
        (1..count)
            .map(move |offset| (from + offset) % count)
            .filter(move |&to| infos[to].accepts.intersects(emits))
    };
    accepting()
        .find(|&to| infos[to].product != Product::None)
        .or_else(|| accepting().next())
}

/// Ordered list of nodes serving one operation at a time.
pub struct Chain {
    slots: Vec<Slot>,
    links: Vec<(usize, usize)>,
    config: ChainConfig,
    /// Defaults re-read at every READY.
    shared: Option<SharedConfig>,
    capture: Option<usize>,
    ready: bool,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self::with_config(ChainConfig::default())
    }

    pub fn with_config(config: ChainConfig) -> Self {
        Self {
            slots: Vec::new(),
            links: Vec::new(),
            config,
            shared: None,
            capture: None,
            ready: false,
        }
    }

    /// Chain taking a snapshot of `shared` at every READY.
    ///
    /// Swapping the shared config never affects a run already started.
    pub fn with_shared(shared: &SharedConfig) -> Self {
        let mut chain = Self::with_config(ChainConfig::clone(&shared.load()));
        chain.shared = Some(shared.clone());
        chain
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Takes effect at the next READY and detaches the chain from shared defaults.
    pub fn set_config(&mut self, config: ChainConfig) {
        self.config = config;
        self.shared = None;
    }

    /// Append a node, returning its index.
    pub fn push<N: ChainNode>(&mut self, node: N) -> usize {
        let info = node.info();
        self.slots.push(Slot {
            node: Some(Box::new(node)),
            info,
            dest: None,
        });
        self.slots.len() - 1
    }

    pub fn with<N: ChainNode>(mut self, node: N) -> Self {
        self.push(node);
        self
    }

    /// Pin `from`'s destination instead of computing it at READY.
    pub fn link(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.slots.len() || to >= self.slots.len() || from == to {
            return Err(Error::InvalidState("link outside the chain"));
        }
        self.links.retain(|&(f, _)| f != from);
        self.links.push((from, to));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Destination of node `index` for the current run.
    pub fn dest_of(&self, index: usize) -> Option<usize> {
        self.slots.get(index)?.dest
    }

    /// Index of the node currently capturing delivery.
    pub fn capture(&self) -> Option<usize> {
        self.capture
    }

    pub fn info(&self, index: usize) -> Option<NodeInfo> {
        self.slots.get(index).map(|slot| slot.info)
    }

    /// First node of type `N`.
    pub fn node<N: ChainNode>(&self) -> Option<&N> {
        self.slots
            .iter()
            .find_map(|slot| slot.node.as_ref()?.as_any().downcast_ref::<N>())
    }

    pub fn node_mut<N: ChainNode>(&mut self) -> Option<&mut N> {
        self.slots
            .iter_mut()
            .find_map(|slot| slot.node.as_mut()?.as_any_mut().downcast_mut::<N>())
    }

    pub fn node_at<N: ChainNode>(&self, index: usize) -> Option<&N> {
        self.slots
            .get(index)?
            .node
            .as_ref()?
            .as_any()
            .downcast_ref::<N>()
    }

    /// Pin routes and prepare every node for a run.
    pub fn ready(&mut self) -> Result<()> {
        if let Some(shared) = &self.shared {
            self.config = ChainConfig::clone(&shared.load());
        }
        self.config.validate()?;
        if self.slots.is_empty() {
            return Err(Error::InvalidState("chain has no nodes"));
        }
        if self.ready {
            log::debug!("[chain] READY while running, finishing previous run");
            self.finish()?;
        }

        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_ref() {
                slot.info = node.info();
            }
        }
        let infos: Vec<NodeInfo> = self.slots.iter().map(|slot| slot.info).collect();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.dest = self
                .links
                .iter()
                .find(|&&(from, _)| from == index)
                .map(|&(_, to)| to)
                .or_else(|| route(&infos, index));
        }

        for index in 0..self.slots.len() {
            let dest = self.slots[index].dest.map(|d| infos[d]);
            let cx = ReadyContext {
                config: &self.config,
                dest,
            };
            let Some(node) = self.slots[index].node.as_mut() else {
                continue;
            };
            if let Err(e) = node.ctrl(Ctrl::Ready(&cx)) {
                log::error!("[chain] {} failed READY: {}", infos[index].name, e);
                self.unwind_ready(index);
                return Err(e);
            }
        }

        self.capture = None;
        self.ready = true;
        log::debug!(
            "[chain] ready: {}",
            self.slots
                .iter()
                .map(|slot| match slot.dest {
                    Some(dest) => format!("{}->{}", slot.info.name, infos[dest].name),
                    None => slot.info.name.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    /// FINISH the nodes readied before node `failed` refused READY.
    fn unwind_ready(&mut self, failed: usize) {
        for slot in &mut self.slots[..failed] {
            if let Some(node) = slot.node.as_mut() {
                if let Err(e) = node.ctrl(Ctrl::Finish) {
                    log::warn!("[chain] {} failed to finish: {}", slot.info.name, e);
                }
            }
        }
        self.capture = None;
    }

    /// End the run. Every node unwinds its open frames; safe to repeat.
    pub fn finish(&mut self) -> Result<()> {
        let mut first_error = None;
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                if let Err(e) = node.ctrl(Ctrl::Finish) {
                    log::warn!("[chain] {} failed to finish: {}", slot.info.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        self.ready = false;
        self.capture = None;
        first_error.map_or(Ok(()), Err)
    }

    /// Node-specific control call.
    pub fn ctrl(&mut self, index: usize, id: u32) -> Result<()> {
        let node = self
            .slots
            .get_mut(index)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::InvalidState("no node at this index"))?;
        node.ctrl(Ctrl::Custom(id))
    }

    /// Push one event into the chain.
    pub fn send(&mut self, event: &Event<'_>) -> Result<()> {
        if !self.ready {
            return Err(Error::InvalidState("chain used before READY"));
        }
        let start = self.capture.unwrap_or(0);
        log::trace!(
            "[chain] {} '{}' from node {}",
            event.kind(),
            event.position(),
            start
        );
        let result = deliver(&mut self.slots, start, None, event);
        self.capture = self
            .slots
            .iter()
            .position(|slot| slot.node.as_ref().is_some_and(|node| node.is_capturing()));
        result
    }

    /// Emit the events describing `instance`.
    pub fn write(&mut self, ty: &TypeRef, instance: &dyn Any) -> Result<()> {
        let max_depth = self.config.max_depth;
        let mut cx = WriteContext::new(self, max_depth);
        ty.write(instance, &mut cx, Member::ROOT)
    }

    pub fn write_value<T: Reflect>(&mut self, value: &T) -> Result<()> {
        self.write(&T::type_ref(), value)
    }
}

impl EventSink for Chain {
    fn send(&mut self, event: &Event<'_>) -> Result<()> {
        Chain::send(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn recorder(accepts: KindSet) -> EventRecorder {
        EventRecorder::new().accepting(accepts)
    }

    /// Terminal that can refuse READY and counts FINISH calls.
    struct Gate {
        refuse: bool,
        finishes: Arc<AtomicUsize>,
    }

    impl Gate {
        fn new(refuse: bool) -> (Self, Arc<AtomicUsize>) {
            let finishes = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    refuse,
                    finishes: finishes.clone(),
                },
                finishes,
            )
        }
    }

    impl ChainNode for Gate {
        fn info(&self) -> NodeInfo {
            NodeInfo {
                name: "gate",
                accepts: KindSet::ALL,
                emits: KindSet::EMPTY,
                product: Product::Events,
            }
        }

        fn ctrl(&mut self, ctrl: Ctrl<'_>) -> Result<()> {
            match ctrl {
                Ctrl::Ready(_) if self.refuse => Err(Error::Config("gate closed".into())),
                Ctrl::Ready(_) => Ok(()),
                Ctrl::Finish => {
                    self.finishes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                other => Err(other.unsupported("gate")),
            }
        }

        fn send(&mut self, _event: &Event<'_>, _out: &mut Forward<'_>) -> Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_routes_follow_kind_negotiation() {
        let infos = [
            NodeInfo {
                name: "source",
                accepts: KindSet::ALL,
                emits: KindSet::EMPTY.with(EventKind::Str),
                product: Product::None,
            },
            NodeInfo {
                name: "ints",
                accepts: KindSet::EMPTY.with(EventKind::Int),
                emits: KindSet::EMPTY,
                product: Product::Events,
            },
            NodeInfo {
                name: "text",
                accepts: KindSet::EMPTY.with(EventKind::Str),
                emits: KindSet::EMPTY.with(EventKind::Int),
                product: Product::Events,
            },
        ];
        assert_eq!(route(&infos, 0), Some(2));
        assert_eq!(route(&infos, 1), None);
        assert_eq!(route(&infos, 2), Some(1));
    }

    #[test]
    fn test_tail_node_routes_to_terminal() {
        let mut chain = Chain::new()
            .with(JsonParser::new())
            .with(JsonWriter::new())
            .with(BlobCodec::new());
        chain.ready().unwrap();
        assert_eq!(chain.dest_of(0), Some(1));
        assert_eq!(chain.dest_of(2), Some(1));
        assert_eq!(chain.node::<BlobCodec>().unwrap().active(), BlobEncoding::Base64);

        // Only pass-through nodes accept: wrap onto them.
        let mut chain = Chain::new()
            .with(ValueMaterializer::of::<i32>())
            .with(JsonParser::new());
        chain.ready().unwrap();
        assert_eq!(chain.dest_of(1), Some(0));
    }

    #[test]
    fn test_failed_ready_finishes_readied_nodes() {
        let (first, first_finishes) = Gate::new(false);
        let (second, second_finishes) = Gate::new(true);
        let (third, third_finishes) = Gate::new(false);
        let mut chain = Chain::new().with(first).with(second).with(third);

        let err = chain.ready().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!chain.is_ready());
        assert_eq!(first_finishes.load(Ordering::SeqCst), 1);
        assert_eq!(second_finishes.load(Ordering::SeqCst), 0);
        assert_eq!(third_finishes.load(Ordering::SeqCst), 0);
        assert!(matches!(
            chain.send(&Event::new(Value::Null)),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_shared_config_snapshot_per_run() {
        let shared = SharedConfig::default();
        let mut chain = Chain::with_shared(&shared).with(JsonWriter::new());
        chain.ready().unwrap();
        chain.write_value(&vec![1i32, 2]).unwrap();
        shared.update(|cfg| cfg.json.pretty = true).unwrap();
        chain.write_value(&vec![3i32]).unwrap();
        chain.finish().unwrap();
        assert!(!chain.config().json.pretty);

        chain.ready().unwrap();
        assert!(chain.config().json.pretty);
        chain.write_value(&vec![4i32]).unwrap();
        chain.finish().unwrap();
        assert_eq!(
            chain.node_mut::<JsonWriter>().unwrap().take_text().unwrap(),
            "[1,2]\n[3]\n[\n  4\n]"
        );

        // Invalid updates are refused; stores land at the next READY.
        assert!(shared.update(|cfg| cfg.max_depth = 0).is_err());
        shared.store(ChainConfig::default().with_max_depth(1)).unwrap();
        chain.ready().unwrap();
        assert_eq!(chain.config().max_depth, 1);
        chain.set_config(ChainConfig::default());
        chain.ready().unwrap();
        assert_eq!(chain.config().max_depth, ChainConfig::default().max_depth);
    }

    #[test]
    fn test_send_before_ready_fails() {
        let mut chain = Chain::new().with(recorder(KindSet::ALL));
        let err = chain.send(&Event::new(Value::Null)).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_delivery_falls_through_to_accepting_node() {
        let mut chain = Chain::new()
            .with(recorder(KindSet::EMPTY.with(EventKind::Int)))
            .with(recorder(KindSet::ALL));
        chain.ready().unwrap();
        chain.send(&Event::new(Value::Int(1))).unwrap();
        chain.send(&Event::named("s", Value::str("x"))).unwrap();

        let first = chain.node_at::<EventRecorder>(0).unwrap();
        let second = chain.node_at::<EventRecorder>(1).unwrap();
        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
        assert_eq!(second.events()[0].name.as_deref(), Some("s"));
    }

    #[test]
    fn test_no_accepting_node() {
        let mut chain = Chain::new().with(recorder(KindSet::EMPTY.with(EventKind::Int)));
        chain.ready().unwrap();
        let err = chain.send(&Event::new(Value::Bool(true))).unwrap_err();
        assert!(matches!(err, Error::TypeNotSupported(EventKind::Bool)));
    }

    #[test]
    fn test_custom_ctrl_not_supported() {
        let mut chain = Chain::new().with(recorder(KindSet::ALL));
        let err = chain.ctrl(0, 42).unwrap_err();
        assert_eq!(err.code(), crate::error::code::NOT_SUPPORTED);
    }

    #[test]
    fn test_link_overrides_route() {
        let mut chain = Chain::new()
            .with(BlobCodec::new())
            .with(recorder(KindSet::ALL))
            .with(recorder(KindSet::ALL));
        chain.link(0, 2).unwrap();
        chain.ready().unwrap();
        assert_eq!(chain.dest_of(0), Some(2));
        assert!(chain.link(0, 9).is_err());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut chain = Chain::new().with(recorder(KindSet::ALL));
        chain.ready().unwrap();
        chain.finish().unwrap();
        chain.finish().unwrap();
        assert!(!chain.is_ready());
    }
}
