// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Builds a [`ClockTree`] from a declarative clock table.

use crate::core_clock::CoreClock;
use crate::custom::{PllClock, PllFormulas};
use crate::node::{ClockFlags, ClockKey, GateSpec, MuxSpec, NodeKind, NodeSpec};
use crate::register::{RegisterField, RegisterIo};
use crate::tree::{ClockTree, ClockTreeBuilder};
use crate::{ClockError, ClockResult};
use clktree_config::{
    ClockDescriptor, ClockFlag, ClockKind, ClockRef, ClockTable, FieldDescriptor, GateDescriptor,
    GateLayout, InitGroup,
};
use std::sync::Arc;

/// Registers every clock of `table` group by group and finishes the tree.
///
/// Clocks keep their table order within a group. `xtal_hz` feeds oscillator
/// clocks and `armclk_mask` limits processor-clock divisors; both override the
/// table settings so a board can differ from the reference table.
pub fn build_tree(
    xtal_hz: u64,
    armclk_mask: u32,
    table: &ClockTable,
    io: Arc<dyn RegisterIo>,
    formulas: &dyn PllFormulas,
) -> ClockResult<ClockTree> {
    let mut ordered: Vec<&ClockDescriptor> = table.clocks.iter().collect();
    ordered.sort_by_key(|c| c.group);

    tracing::debug!(
        "building clock tree '{}' ({} clocks, xtal {} Hz, armclk mask {:#x})",
        table.name,
        ordered.len(),
        xtal_hz,
        armclk_mask
    );

    let mut builder = ClockTreeBuilder::new(io, table.gate_layout);
    for desc in ordered {
        builder.register(node_spec(desc, xtal_hz, armclk_mask, &table.gate_layout, formulas)?)?;
    }
    builder.build()
}

fn node_spec(
    desc: &ClockDescriptor,
    xtal_hz: u64,
    armclk_mask: u32,
    layout: &GateLayout,
    formulas: &dyn PllFormulas,
) -> ClockResult<NodeSpec> {
    let gate_spec = |gate: &GateDescriptor| -> ClockResult<GateSpec> {
        // A one-bit field at the bit position validates it.
        let bit = RegisterField::new(layout.offset(gate.bank), gate.bit, 1)?;
        Ok(GateSpec {
            bank: gate.bank,
            mask: bit.mask(),
        })
    };

    let kind = match &desc.kind {
        ClockKind::Oscillator => NodeKind::Fixed { rate: xtal_hz },
        ClockKind::Fixed { rate } => NodeKind::Fixed { rate: *rate },
        ClockKind::Pll { formula, control } => {
            let calc = formulas
                .formula(formula)
                .ok_or_else(|| ClockError::UnknownPllFormula(formula.clone()))?;
            NodeKind::Custom(Box::new(PllClock::new(formula.clone(), calc, control.clone())))
        }
        ClockKind::Passthrough => NodeKind::passthrough(),
        ClockKind::Gate(gate) => NodeKind::Gate(gate_spec(gate)?),
        ClockKind::Mux { select, sources } => NodeKind::Mux(mux_spec(select, sources)?),
        ClockKind::Divider { divider } => NodeKind::Divider(RegisterField::try_from(divider)?),
        ClockKind::Composite {
            select,
            sources,
            divider,
            gate,
        } => NodeKind::Composite {
            mux: select.as_ref().map(|s| mux_spec(s, sources)).transpose()?,
            divider: divider.as_ref().map(RegisterField::try_from).transpose()?,
            gate: gate.as_ref().map(gate_spec).transpose()?,
        },
        ClockKind::CoreClock { divider } => NodeKind::Custom(Box::new(CoreClock::new(
            RegisterField::try_from(divider)?,
            armclk_mask,
        ))),
    };

    let mut flags = ClockFlags::empty();
    if desc.group == InitGroup::GatedOff || desc.has_flag(ClockFlag::InitOff) {
        flags |= ClockFlags::INIT_OFF;
    }
    if desc.has_flag(ClockFlag::External) {
        flags |= ClockFlags::EXTERNAL;
    }

    let mut spec = NodeSpec::new(ClockKey::new(desc.name.clone(), desc.instance), kind)
        .with_flags(flags);
    if let Some(parent) = &desc.parent {
        spec = spec.with_parent(ClockKey::from(parent));
    }
    Ok(spec)
}

fn mux_spec(select: &FieldDescriptor, sources: &[Option<ClockRef>]) -> ClockResult<MuxSpec> {
    Ok(MuxSpec {
        field: RegisterField::try_from(select)?,
        sources: sources
            .iter()
            .map(|s| s.as_ref().map(ClockKey::from))
            .collect(),
    })
}
