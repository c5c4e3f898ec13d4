// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::node::{ClockId, ClockKey};
use crate::register::{RegisterField, RegisterMap};
use crate::{ClockError, ClockResult};

/// Parent selector: the field value indexes `sources`, `None` slots are reserved.
#[derive(Debug)]
pub struct Mux {
    field: RegisterField,
    sources: Vec<Option<ClockId>>,
}

impl Mux {
    pub(crate) fn new(field: RegisterField, sources: Vec<Option<ClockId>>) -> Self {
        Self { field, sources }
    }

    pub fn field(&self) -> &RegisterField {
        &self.field
    }

    pub fn sources(&self) -> &[Option<ClockId>] {
        &self.sources
    }

    /// Source in slot `value`. Holes and values past the list are reserved.
    pub fn source_at(&self, value: u32, clock: &ClockKey) -> ClockResult<ClockId> {
        self.sources
            .get(value as usize)
            .copied()
            .flatten()
            .ok_or_else(|| ClockError::ReservedSource {
                clock: clock.clone(),
                value,
            })
    }

    /// Slot value selecting `candidate`, if it is a selectable source.
    pub fn slot_of(&self, candidate: ClockId) -> Option<u32> {
        self.sources
            .iter()
            .position(|s| *s == Some(candidate))
            .and_then(|idx| u32::try_from(idx).ok())
            .filter(|v| *v <= self.field.max_value())
    }

    /// Source currently latched in hardware.
    pub fn selected(&self, regs: &RegisterMap, clock: &ClockKey) -> ClockResult<ClockId> {
        let value = regs.read_field(&self.field)?;
        self.source_at(value, clock)
    }

    pub fn select(&self, regs: &RegisterMap, value: u32) -> ClockResult<()> {
        regs.for_field(&self.field)?.write_field(&self.field, value)
    }
}
