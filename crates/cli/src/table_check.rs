// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clktree_config::{ClockDescriptor, ClockKind, ClockRef, ClockTable, FieldDescriptor, GateDescriptor};
use clktree_core::ClockTree;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub context: String,
}

impl CheckReport {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            context: context.into(),
        }
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.valid = false;
        self.errors.push(msg.into());
    }

    pub fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Bits of one register a clock drives.
struct Claim {
    clock: ClockRef,
    what: &'static str,
    reg: u64,
    mask: u32,
}

fn field_mask(field: &FieldDescriptor) -> Option<u32> {
    let end = u32::from(field.shift) + u32::from(field.width);
    if field.width == 0 || end > 32 {
        return None;
    }
    let value = if field.width == 32 {
        u32::MAX
    } else {
        (1u32 << field.width) - 1
    };
    Some(value << field.shift)
}

fn claims_of(desc: &ClockDescriptor, table: &ClockTable, report: &mut CheckReport) -> Vec<Claim> {
    let gate = |g: &GateDescriptor| FieldDescriptor {
        reg: table.gate_layout.offset(g.bank),
        shift: g.bit,
        width: 1,
    };
    let fields: Vec<(&'static str, FieldDescriptor)> = match &desc.kind {
        ClockKind::Gate(g) => vec![("gate", gate(g))],
        ClockKind::Mux { select, .. } => vec![("select", *select)],
        ClockKind::Divider { divider } | ClockKind::CoreClock { divider } => {
            vec![("divider", *divider)]
        }
        ClockKind::Composite {
            select,
            divider,
            gate: g,
            ..
        } => select
            .map(|f| ("select", f))
            .into_iter()
            .chain(divider.map(|f| ("divider", f)))
            .chain(g.as_ref().map(|g| ("gate", gate(g))))
            .collect(),
        ClockKind::Oscillator
        | ClockKind::Fixed { .. }
        | ClockKind::Pll { .. }
        | ClockKind::Passthrough => Vec::new(),
    };

    let clock = desc.clock_ref();
    let mut out = Vec::with_capacity(fields.len());
    for (what, f) in fields {
        match field_mask(&f) {
            Some(mask) => out.push(Claim {
                clock: clock.clone(),
                what,
                reg: f.reg,
                mask,
            }),
            None => report.error(format!(
                "{}: {} field at {:#x} (shift {}, width {}) does not fit a 32-bit register",
                clock, what, f.reg, f.shift, f.width
            )),
        }
    }
    out
}

fn check_sources(desc: &ClockDescriptor, table: &ClockTable, report: &mut CheckReport) {
    let (select, sources) = match &desc.kind {
        ClockKind::Mux { select, sources } => (Some(select), sources),
        ClockKind::Composite { select, sources, .. } => (select.as_ref(), sources),
        _ => return,
    };
    let clock = desc.clock_ref();

    match select {
        Some(select) => {
            if sources.is_empty() {
                report.error(format!("{}: selector without sources", clock));
            }
            let slots = 1usize.checked_shl(u32::from(select.width)).unwrap_or(usize::MAX);
            for (slot, source) in sources.iter().enumerate().skip(slots) {
                if let Some(source) = source {
                    report.warning(format!(
                        "{}: source {} in slot {} can never be selected by a {}-bit field",
                        clock, source, slot, select.width
                    ));
                }
            }
        }
        None if !sources.is_empty() => {
            report.error(format!("{}: sources listed without a selector field", clock));
        }
        None => {}
    }

    for source in desc.kind.sources() {
        if table.find(source).is_none() {
            report.error(format!("{}: source {} is not in the table", clock, source));
        }
    }
}

/// Static checks over the table: unique clocks, sane selectors and
/// no two clocks driving the same register bits.
pub fn check_table(table: &ClockTable, report: &mut CheckReport) {
    let mut seen: HashMap<ClockRef, usize> = HashMap::new();
    let mut claims = Vec::new();

    for (idx, desc) in table.clocks.iter().enumerate() {
        let clock = desc.clock_ref();
        if let Some(first) = seen.insert(clock.clone(), idx) {
            report.error(format!(
                "{} is declared twice (entries {} and {})",
                clock, first, idx
            ));
        }
        if let Some(parent) = &desc.parent {
            if table.find(parent).is_none() {
                report.error(format!("{}: parent {} is not in the table", clock, parent));
            }
        }
        check_sources(desc, table, report);
        claims.extend(claims_of(desc, table, report));
    }

    for (i, a) in claims.iter().enumerate() {
        for b in &claims[i + 1..] {
            if a.reg == b.reg && a.mask & b.mask != 0 {
                report.error(format!(
                    "{} {} and {} {} both drive bits {:#010x} of register {:#x}",
                    a.clock,
                    a.what,
                    b.clock,
                    b.what,
                    a.mask & b.mask,
                    a.reg
                ));
            }
        }
    }
}

/// Checks that need the built tree: every clock must report a rate.
pub fn check_tree(tree: &ClockTree, report: &mut CheckReport) {
    for entry in tree.summary() {
        if let Some(err) = &entry.error {
            report.error(format!("{}: {}", entry.label(), err));
        } else if entry.rate_hz == Some(0) && !entry.flags.iter().any(|f| f == "external") {
            report.warning(format!("{} runs at 0 Hz", entry.label()));
        }
    }
}
