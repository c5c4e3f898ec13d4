// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::custom::RateOps;
use crate::divider::Divider;
use crate::gate::Gate;
use crate::mux::Mux;
use crate::register::RegisterField;
use clktree_config::{ClockRef, GateBank};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a node in a [`crate::ClockTree`]. Stable for the life of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ClockId(pub(crate) usize);

impl ClockId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Clock identity: name plus an instance index for repeated peripherals (`uart:0..3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ClockKey {
    pub name: String,
    pub instance: Option<u8>,
}

impl ClockKey {
    pub fn new(name: impl Into<String>, instance: Option<u8>) -> Self {
        Self {
            name: name.into(),
            instance,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }
}

impl fmt::Display for ClockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance {
            Some(i) => write!(f, "{}:{}", self.name, i),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&ClockRef> for ClockKey {
    fn from(r: &ClockRef) -> Self {
        Self::new(r.name.clone(), r.instance)
    }
}

impl From<&str> for ClockKey {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClockFlags: u8 {
        /// Gate cleared at registration regardless of boot state.
        const INIT_OFF = 1 << 0;
        /// Rate supplied at runtime from outside the chip.
        const EXTERNAL = 1 << 1;
    }
}

/// What a node does. Each variant carries only the state its behavior needs.
#[derive(Debug)]
pub enum Behavior {
    Fixed { rate: AtomicU64 },
    Gate(Gate),
    Mux(Mux),
    Divider(Divider),
    Composite(Composite),
    Custom(Box<dyn RateOps>),
}

impl Behavior {
    pub fn fixed(rate: u64) -> Self {
        Behavior::Fixed {
            rate: AtomicU64::new(rate),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Behavior::Fixed { .. } => "fixed",
            Behavior::Gate(_) => "gate",
            Behavior::Mux(_) => "mux",
            Behavior::Divider(_) => "divider",
            Behavior::Composite(c) if c.is_passthrough() => "passthrough",
            Behavior::Composite(_) => "composite",
            Behavior::Custom(ops) => ops.kind(),
        }
    }

    pub fn gate(&self) -> Option<&Gate> {
        match self {
            Behavior::Gate(g) => Some(g),
            Behavior::Composite(c) => c.gate.as_ref(),
            _ => None,
        }
    }

    pub fn mux(&self) -> Option<&Mux> {
        match self {
            Behavior::Mux(m) => Some(m),
            Behavior::Composite(c) => c.mux.as_ref(),
            _ => None,
        }
    }

    pub fn divider(&self) -> Option<&Divider> {
        match self {
            Behavior::Divider(d) => Some(d),
            Behavior::Composite(c) => c.divider.as_ref(),
            _ => None,
        }
    }
}

/// Source select, divide and gate stages folded into one clock.
/// Without a mux the parent is fixed; with no stages at all it forwards the parent.
#[derive(Debug, Default)]
pub struct Composite {
    pub mux: Option<Mux>,
    pub divider: Option<Divider>,
    pub gate: Option<Gate>,
}

impl Composite {
    pub fn is_passthrough(&self) -> bool {
        self.mux.is_none() && self.divider.is_none() && self.gate.is_none()
    }
}

#[derive(Debug)]
pub struct ClockNode {
    key: ClockKey,
    pub(crate) parent: Option<ClockId>,
    behavior: Behavior,
    flags: ClockFlags,
    cached_rate: AtomicU64,
}

impl ClockNode {
    pub(crate) fn new(
        key: ClockKey,
        parent: Option<ClockId>,
        behavior: Behavior,
        flags: ClockFlags,
    ) -> Self {
        Self {
            key,
            parent,
            behavior,
            flags,
            cached_rate: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> &ClockKey {
        &self.key
    }

    pub fn parent(&self) -> Option<ClockId> {
        self.parent
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub fn flags(&self) -> ClockFlags {
        self.flags
    }

    /// Rate recorded at the last build, reparent or resync, or programmed by a
    /// rate change on this node (0 = unknown). A rate change does not update
    /// the cached rates of descendants; use `ClockTree::get_rate` for a live value.
    pub fn cached_rate(&self) -> u64 {
        self.cached_rate.load(Ordering::Relaxed)
    }

    pub(crate) fn set_cached_rate(&self, rate: u64) {
        self.cached_rate.store(rate, Ordering::Relaxed);
    }
}

/// Gate hardware of a node: bank and enable-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSpec {
    pub bank: GateBank,
    pub mask: u32,
}

/// Mux hardware of a node: selector field and sources by slot, `None` for reserved slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxSpec {
    pub field: RegisterField,
    pub sources: Vec<Option<ClockKey>>,
}

/// Behavior of a node before registration, with clocks referred to by key.
#[derive(Debug)]
pub enum NodeKind {
    Fixed {
        rate: u64,
    },
    Gate(GateSpec),
    Mux(MuxSpec),
    Divider(RegisterField),
    Composite {
        mux: Option<MuxSpec>,
        divider: Option<RegisterField>,
        gate: Option<GateSpec>,
    },
    Custom(Box<dyn RateOps>),
}

impl NodeKind {
    pub fn passthrough() -> Self {
        NodeKind::Composite {
            mux: None,
            divider: None,
            gate: None,
        }
    }
}

/// A node as handed to [`crate::ClockTreeBuilder::register`].
#[derive(Debug)]
pub struct NodeSpec {
    pub key: ClockKey,
    pub parent: Option<ClockKey>,
    pub flags: ClockFlags,
    pub kind: NodeKind,
}

impl NodeSpec {
    pub fn new(key: impl Into<ClockKey>, kind: NodeKind) -> Self {
        Self {
            key: key.into(),
            parent: None,
            flags: ClockFlags::empty(),
            kind,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<ClockKey>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_flags(mut self, flags: ClockFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn fixed(key: impl Into<ClockKey>, rate: u64) -> Self {
        Self::new(key, NodeKind::Fixed { rate })
    }

    pub fn gate(key: impl Into<ClockKey>, parent: impl Into<ClockKey>, bank: GateBank, bit: u8) -> Self {
        Self::new(
            key,
            NodeKind::Gate(GateSpec {
                bank,
                mask: 1 << bit,
            }),
        )
        .with_parent(parent)
    }

    pub fn mux(key: impl Into<ClockKey>, field: RegisterField, sources: Vec<Option<ClockKey>>) -> Self {
        Self::new(key, NodeKind::Mux(MuxSpec { field, sources }))
    }

    pub fn divider(key: impl Into<ClockKey>, parent: impl Into<ClockKey>, field: RegisterField) -> Self {
        Self::new(key, NodeKind::Divider(field)).with_parent(parent)
    }

    /// Every clock this node refers to: its parent and all mux sources.
    pub fn references(&self) -> Vec<&ClockKey> {
        let mut refs: Vec<&ClockKey> = self.parent.iter().collect();
        let mux = match &self.kind {
            NodeKind::Mux(m) => Some(m),
            NodeKind::Composite { mux, .. } => mux.as_ref(),
            _ => None,
        };
        if let Some(m) = mux {
            refs.extend(m.sources.iter().flatten());
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(ClockKey::new("uart", Some(2)).to_string(), "uart:2");
        assert_eq!(ClockKey::named("armclk").to_string(), "armclk");
        let r = ClockRef::new("hsmmc", Some(1));
        assert_eq!(ClockKey::from(&r), ClockKey::new("hsmmc", Some(1)));
    }

    #[test]
    fn test_spec_references() {
        let field = RegisterField::new(0x1C, 18, 2).unwrap();
        let spec = NodeSpec::mux(
            ClockKey::new("mmc_bus", Some(0)),
            field,
            vec![Some("mout_epll".into()), None, Some("clk_27m".into())],
        )
        .with_parent("mout_epll");
        let refs: Vec<String> = spec.references().iter().map(|k| k.to_string()).collect();
        assert_eq!(refs, vec!["mout_epll", "mout_epll", "clk_27m"]);
    }

    #[test]
    fn test_flags_accumulate() {
        let spec = NodeSpec::fixed("iis_cdclk0", 0)
            .with_flags(ClockFlags::EXTERNAL)
            .with_flags(ClockFlags::INIT_OFF);
        assert!(spec.flags.contains(ClockFlags::EXTERNAL | ClockFlags::INIT_OFF));
    }
}
