// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::divider::Divider;
use crate::gate::Gate;
use crate::mux::Mux;
use crate::node::{
    Behavior, ClockFlags, ClockId, ClockKey, ClockNode, Composite, GateSpec, MuxSpec, NodeKind,
    NodeSpec,
};
use crate::register::{RegisterIo, RegisterMap};
use crate::{ClockError, ClockResult};
use clktree_config::GateLayout;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Collects nodes in dependency order. A node may only refer to nodes that are
/// already registered, which keeps the parent graph a forest.
///
/// A rejected registration is remembered: [`ClockTreeBuilder::build`] then
/// fails with that error instead of yielding a partially wired tree.
#[derive(Debug)]
pub struct ClockTreeBuilder {
    nodes: Vec<ClockNode>,
    index: HashMap<ClockKey, ClockId>,
    registers: RegisterMap,
    layout: GateLayout,
    first_error: Option<ClockError>,
}

impl ClockTreeBuilder {
    pub fn new(io: Arc<dyn RegisterIo>, layout: GateLayout) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            registers: RegisterMap::new(io),
            layout,
            first_error: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: &ClockKey) -> bool {
        self.index.contains_key(key)
    }

    fn resolve(&self, clock: &ClockKey, target: &ClockKey) -> ClockResult<ClockId> {
        self.index
            .get(target)
            .copied()
            .ok_or_else(|| ClockError::UnresolvedParent {
                clock: clock.clone(),
                parent: target.clone(),
            })
    }

    fn resolve_mux(&self, clock: &ClockKey, spec: MuxSpec) -> ClockResult<Mux> {
        let sources = spec
            .sources
            .iter()
            .map(|slot| slot.as_ref().map(|s| self.resolve(clock, s)).transpose())
            .collect::<ClockResult<Vec<_>>>()?;
        Ok(Mux::new(spec.field, sources))
    }

    fn gate(&mut self, spec: GateSpec) -> Gate {
        self.registers.ensure(self.layout.offset(spec.bank));
        Gate::new(spec.bank, spec.mask)
    }

    /// Adds a node. On error the node is not added and earlier registrations
    /// stay in place, but the builder can no longer produce a tree.
    pub fn register(&mut self, spec: NodeSpec) -> ClockResult<ClockId> {
        let result = self.insert(spec);
        if let Err(err) = &result {
            if self.first_error.is_none() {
                self.first_error = Some(err.clone());
            }
        }
        result
    }

    /// First registration error, if any.
    pub fn error(&self) -> Option<&ClockError> {
        self.first_error.as_ref()
    }

    fn insert(&mut self, spec: NodeSpec) -> ClockResult<ClockId> {
        let NodeSpec {
            key,
            parent,
            flags,
            kind,
        } = spec;
        if self.index.contains_key(&key) {
            return Err(ClockError::DuplicateClock(key));
        }
        let parent = parent
            .as_ref()
            .map(|p| self.resolve(&key, p))
            .transpose()?;

        let behavior = match kind {
            NodeKind::Fixed { rate } => Behavior::fixed(rate),
            NodeKind::Gate(g) => Behavior::Gate(self.gate(g)),
            NodeKind::Mux(m) => {
                let mux = self.resolve_mux(&key, m)?;
                self.registers.ensure(mux.field().reg());
                Behavior::Mux(mux)
            }
            NodeKind::Divider(field) => {
                self.registers.ensure(field.reg());
                Behavior::Divider(Divider::new(field))
            }
            NodeKind::Composite { mux, divider, gate } => {
                let mux = mux.map(|m| self.resolve_mux(&key, m)).transpose()?;
                if let Some(m) = &mux {
                    self.registers.ensure(m.field().reg());
                }
                if let Some(field) = &divider {
                    self.registers.ensure(field.reg());
                }
                Behavior::Composite(Composite {
                    mux,
                    divider: divider.map(Divider::new),
                    gate: gate.map(|g| self.gate(g)),
                })
            }
            NodeKind::Custom(ops) => {
                for offset in ops.registers() {
                    self.registers.ensure(offset);
                }
                Behavior::Custom(ops)
            }
        };

        let id = ClockId(self.nodes.len());
        tracing::debug!("registered clock {} as {}", key, behavior.kind());
        self.index.insert(key.clone(), id);
        self.nodes.push(ClockNode::new(key, parent, behavior, flags));
        Ok(id)
    }

    /// Finishes construction: latches mux parents from hardware, brings gate
    /// counts in line with the boot state and records initial rates.
    ///
    /// Fails with the first registration error if any `register` call failed.
    pub fn build(self) -> ClockResult<ClockTree> {
        if let Some(err) = self.first_error {
            return Err(err);
        }
        let mut tree = ClockTree {
            nodes: self.nodes,
            index: self.index,
            registers: self.registers,
            layout: self.layout,
        };
        tree.sync_parents()?;
        for node in &tree.nodes {
            if let Some(gate) = node.behavior().gate() {
                let ctrl = tree.registers.get(tree.layout.offset(gate.bank()))?;
                gate.adopt(ctrl, node.flags().contains(ClockFlags::INIT_OFF))?;
            }
        }
        tree.refresh_cached_rates();
        tracing::debug!(
            "clock tree ready: {} clocks, {} registers",
            tree.nodes.len(),
            tree.registers.len()
        );
        Ok(tree)
    }
}

/// The clock tree of one chip.
///
/// Rate queries, rate changes and enable/disable take `&self` and may run
/// concurrently; each register read-modify-write is serialized per register.
/// Reparenting takes `&mut self`, so callers must exclude concurrent users
/// of the tree while a mux is switched.
#[derive(Debug)]
pub struct ClockTree {
    nodes: Vec<ClockNode>,
    index: HashMap<ClockKey, ClockId>,
    registers: RegisterMap,
    layout: GateLayout,
}

impl ClockTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All clocks, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = ClockId> {
        (0..self.nodes.len()).map(ClockId)
    }

    pub fn registers(&self) -> &RegisterMap {
        &self.registers
    }

    pub fn layout(&self) -> &GateLayout {
        &self.layout
    }

    pub fn node(&self, id: ClockId) -> ClockResult<&ClockNode> {
        self.nodes.get(id.0).ok_or(ClockError::InvalidHandle(id.0))
    }

    pub fn key(&self, id: ClockId) -> ClockResult<&ClockKey> {
        Ok(self.node(id)?.key())
    }

    pub fn lookup(&self, name: &str, instance: Option<u8>) -> ClockResult<ClockId> {
        let key = ClockKey::new(name, instance);
        self.index
            .get(&key)
            .copied()
            .ok_or(ClockError::NotFound(key))
    }

    /// Like [`ClockTree::lookup`], but a device instance with no dedicated
    /// clock falls back to the shared clock registered without an instance.
    pub fn lookup_for_device(&self, name: &str, instance: Option<u8>) -> ClockResult<ClockId> {
        match self.lookup(name, instance) {
            Err(err) if instance.is_some() => self.lookup(name, None).map_err(|_| err),
            other => other,
        }
    }

    /// Logical parent. For muxes this is the source latched at build or by
    /// the last `set_parent`/`sync_parents`.
    pub fn parent(&self, id: ClockId) -> ClockResult<Option<ClockId>> {
        Ok(self.node(id)?.parent())
    }

    /// Clock feeding `node`: the hardware-selected source for muxes, the
    /// parent otherwise.
    fn input(&self, node: &ClockNode) -> ClockResult<Option<ClockId>> {
        match node.behavior().mux() {
            Some(mux) => mux.selected(&self.registers, node.key()).map(Some),
            None => Ok(node.parent()),
        }
    }

    fn input_rate(&self, node: &ClockNode) -> ClockResult<u64> {
        match self.input(node)? {
            Some(id) => self.get_rate(id),
            None => Ok(0),
        }
    }

    fn rate_of(&self, node: &ClockNode) -> ClockResult<u64> {
        match node.behavior() {
            Behavior::Fixed { rate } => Ok(rate.load(Ordering::Relaxed)),
            Behavior::Custom(ops) => ops.get_rate(self.input_rate(node)?, &self.registers),
            behavior => {
                let rate = self.input_rate(node)?;
                match behavior.divider() {
                    Some(div) => div.recalc(rate, &self.registers),
                    None => Ok(rate),
                }
            }
        }
    }

    /// Recomputes the cached rate of every node. Nodes whose rate cannot be
    /// computed keep their previous value.
    fn refresh_cached_rates(&self) {
        for node in &self.nodes {
            if let Ok(rate) = self.rate_of(node) {
                node.set_cached_rate(rate);
            }
        }
    }

    /// Current rate in Hz, recomputed from the hardware up the parent chain.
    pub fn get_rate(&self, id: ClockId) -> ClockResult<u64> {
        self.rate_of(self.node(id)?)
    }

    /// Rate `set_rate(id, rate)` would produce, without touching hardware.
    /// Clocks without rate control report their current rate.
    pub fn round_rate(&self, id: ClockId, rate: u64) -> ClockResult<u64> {
        let node = self.node(id)?;
        match node.behavior() {
            Behavior::Custom(ops) => ops.round_rate(self.input_rate(node)?, rate, &self.registers),
            behavior => match behavior.divider() {
                Some(div) => Ok(div.round_rate(self.input_rate(node)?, rate)),
                None => self.rate_of(node),
            },
        }
    }

    /// Programs the closest rate not above what `round_rate` reports and
    /// returns it. Children are not notified; their rates follow on the next query.
    pub fn set_rate(&self, id: ClockId, rate: u64) -> ClockResult<u64> {
        let node = self.node(id)?;
        let new_rate = match node.behavior() {
            Behavior::Custom(ops) => {
                ops.set_rate(node.key(), self.input_rate(node)?, rate, &self.registers)?
            }
            behavior => match behavior.divider() {
                Some(div) => {
                    div.set_rate(node.key(), self.input_rate(node)?, rate, &self.registers)?
                }
                None => return Err(ClockError::RateNotSettable(node.key().clone())),
            },
        };
        node.set_cached_rate(new_rate);
        Ok(new_rate)
    }

    /// Assigns the rate of an external input such as an audio codec clock pin.
    pub fn set_external_rate(&self, id: ClockId, rate: u64) -> ClockResult<()> {
        let node = self.node(id)?;
        match node.behavior() {
            Behavior::Fixed { rate: stored } if node.flags().contains(ClockFlags::EXTERNAL) => {
                stored.store(rate, Ordering::Relaxed);
                node.set_cached_rate(rate);
                Ok(())
            }
            _ => Err(ClockError::RateNotSettable(node.key().clone())),
        }
    }

    /// Takes an enable reference. Clocks without a gate accept and ignore it.
    pub fn enable(&self, id: ClockId) -> ClockResult<()> {
        let node = self.node(id)?;
        let Some(gate) = node.behavior().gate() else {
            return Ok(());
        };
        let count = gate.enable(self.registers.get(self.layout.offset(gate.bank()))?)?;
        tracing::trace!("{} enabled, count {}", node.key(), count);
        Ok(())
    }

    /// Drops an enable reference. Dropping more references than were taken is
    /// reported as [`ClockError::AlreadyDisabled`].
    pub fn disable(&self, id: ClockId) -> ClockResult<()> {
        let node = self.node(id)?;
        let Some(gate) = node.behavior().gate() else {
            return Ok(());
        };
        let ctrl = self.registers.get(self.layout.offset(gate.bank()))?;
        let count = gate.disable(ctrl, node.key())?;
        tracing::trace!("{} disabled, count {}", node.key(), count);
        Ok(())
    }

    /// Outstanding enable references, `None` for clocks without a gate.
    pub fn enable_count(&self, id: ClockId) -> ClockResult<Option<u32>> {
        Ok(self.node(id)?.behavior().gate().map(Gate::enable_count))
    }

    pub fn is_enabled(&self, id: ClockId) -> ClockResult<bool> {
        Ok(self.enable_count(id)?.map_or(true, |count| count > 0))
    }

    /// Switches a mux to `candidate`. The gate and divider are left alone.
    /// Cached rates of the whole tree are refreshed afterwards.
    pub fn set_parent(&mut self, id: ClockId, candidate: ClockId) -> ClockResult<()> {
        let node = self.node(id)?;
        let candidate_key = self.key(candidate)?;
        let invalid = || ClockError::InvalidSource {
            clock: node.key().clone(),
            candidate: candidate_key.clone(),
        };
        let mux = node.behavior().mux().ok_or_else(invalid)?;
        let slot = mux.slot_of(candidate).ok_or_else(invalid)?;
        mux.select(&self.registers, slot)?;
        tracing::debug!("{} reparented to {}", node.key(), candidate_key);

        self.nodes[id.0].parent = Some(candidate);
        self.refresh_cached_rates();
        Ok(())
    }

    /// Re-reads every mux selector and updates the logical parents, e.g. after
    /// resume when firmware may have changed the selection. A selector on a
    /// reserved slot leaves the node without a parent; its rate query reports
    /// the reserved slot.
    pub fn sync_parents(&mut self) -> ClockResult<()> {
        for idx in 0..self.nodes.len() {
            let node = &self.nodes[idx];
            let Some(mux) = node.behavior().mux() else {
                continue;
            };
            let value = self.registers.read_field(mux.field())?;
            let parent = match mux.source_at(value, node.key()) {
                Ok(source) => Some(source),
                Err(err) => {
                    tracing::warn!("{}", err);
                    None
                }
            };
            self.nodes[idx].parent = parent;
        }
        self.refresh_cached_rates();
        Ok(())
    }
}
