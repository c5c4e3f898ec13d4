// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{ClockError, ClockResult};
use clktree_config::FieldDescriptor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Access to the 32-bit registers of a clock controller, addressed by offset.
pub trait RegisterIo: std::fmt::Debug + Send + Sync {
    fn read(&self, offset: u64) -> ClockResult<u32>;
    fn write(&self, offset: u64, value: u32) -> ClockResult<()>;
}

/// A `width`-bit field starting at bit `shift` of register `reg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct RegisterField {
    reg: u64,
    shift: u8,
    width: u8,
}

impl RegisterField {
    pub fn new(reg: u64, shift: u8, width: u8) -> ClockResult<Self> {
        if width == 0 || u32::from(shift) + u32::from(width) > 32 {
            return Err(ClockError::InvalidField { reg, shift, width });
        }
        Ok(Self { reg, shift, width })
    }

    pub fn reg(&self) -> u64 {
        self.reg
    }

    pub fn shift(&self) -> u8 {
        self.shift
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Largest value the field can hold.
    pub fn max_value(&self) -> u32 {
        if self.width == 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    /// Field bits in register position.
    pub fn mask(&self) -> u32 {
        self.max_value() << self.shift
    }

    pub fn extract(&self, reg_val: u32) -> u32 {
        (reg_val & self.mask()) >> self.shift
    }

    pub fn insert(&self, reg_val: u32, value: u32) -> u32 {
        (reg_val & !self.mask()) | ((value << self.shift) & self.mask())
    }
}

impl TryFrom<&FieldDescriptor> for RegisterField {
    type Error = ClockError;

    fn try_from(desc: &FieldDescriptor) -> Result<Self, Self::Error> {
        Self::new(desc.reg, desc.shift, desc.width)
    }
}

/// One physical register. Every read-modify-write goes through [`RegisterController::lock`],
/// so clocks sharing the register word never interleave their updates.
#[derive(Debug)]
pub struct RegisterController {
    offset: u64,
    io: Arc<dyn RegisterIo>,
    lock: Mutex<()>,
}

impl RegisterController {
    pub fn new(offset: u64, io: Arc<dyn RegisterIo>) -> Self {
        Self {
            offset,
            io,
            lock: Mutex::new(()),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Unlocked single read, for rate queries.
    pub fn read(&self) -> ClockResult<u32> {
        self.io.read(self.offset)
    }

    pub fn read_field(&self, field: &RegisterField) -> ClockResult<u32> {
        debug_assert_eq!(field.reg(), self.offset);
        Ok(field.extract(self.read()?))
    }

    pub fn lock(&self) -> ClockResult<RegisterGuard<'_>> {
        let guard = self.lock.lock().map_err(|_| ClockError::HardwareFault {
            offset: self.offset,
            reason: "register lock poisoned".to_string(),
        })?;
        Ok(RegisterGuard {
            ctrl: self,
            _guard: guard,
        })
    }

    /// Writes `value` into `field`, preserving the other bits of the register.
    pub fn write_field(&self, field: &RegisterField, value: u32) -> ClockResult<()> {
        self.lock()?.modify_field(field, value)
    }
}

/// Exclusive access to a register for the duration of a read-modify-write.
pub struct RegisterGuard<'a> {
    ctrl: &'a RegisterController,
    _guard: MutexGuard<'a, ()>,
}

impl RegisterGuard<'_> {
    pub fn read(&self) -> ClockResult<u32> {
        self.ctrl.io.read(self.ctrl.offset)
    }

    pub fn write(&mut self, value: u32) -> ClockResult<()> {
        tracing::trace!("reg {:#x} <= {:#010x}", self.ctrl.offset, value);
        self.ctrl.io.write(self.ctrl.offset, value)
    }

    pub fn modify_field(&mut self, field: &RegisterField, value: u32) -> ClockResult<()> {
        let val = self.read()?;
        self.write(field.insert(val, value))
    }
}

/// The set of register controllers a clock tree touches, keyed by offset.
#[derive(Debug)]
pub struct RegisterMap {
    io: Arc<dyn RegisterIo>,
    controllers: HashMap<u64, RegisterController>,
}

impl RegisterMap {
    pub fn new(io: Arc<dyn RegisterIo>) -> Self {
        Self {
            io,
            controllers: HashMap::new(),
        }
    }

    /// Creates the controller for `offset` if it does not exist yet.
    pub fn ensure(&mut self, offset: u64) {
        let io = &self.io;
        self.controllers
            .entry(offset)
            .or_insert_with(|| RegisterController::new(offset, io.clone()));
    }

    pub fn get(&self, offset: u64) -> ClockResult<&RegisterController> {
        self.controllers
            .get(&offset)
            .ok_or_else(|| ClockError::HardwareFault {
                offset,
                reason: "register is not mapped".to_string(),
            })
    }

    pub fn for_field(&self, field: &RegisterField) -> ClockResult<&RegisterController> {
        self.get(field.reg())
    }

    pub fn read_field(&self, field: &RegisterField) -> ClockResult<u32> {
        self.for_field(field)?.read_field(field)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// In-memory register file, used to simulate a clock controller.
#[derive(Debug, Default)]
pub struct RegisterBlock {
    regs: Mutex<HashMap<u64, u32>>,
    writes: AtomicU64,
}

impl RegisterBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: impl IntoIterator<Item = (u64, u32)>) -> Self {
        Self {
            regs: Mutex::new(values.into_iter().collect()),
            writes: AtomicU64::new(0),
        }
    }

    /// Current value, bypassing the write counter.
    pub fn peek(&self, offset: u64) -> u32 {
        self.regs
            .lock()
            .ok()
            .and_then(|m| m.get(&offset).copied())
            .unwrap_or(0)
    }

    /// Sets a value as if hardware changed it, bypassing the write counter.
    pub fn poke(&self, offset: u64, value: u32) {
        if let Ok(mut m) = self.regs.lock() {
            m.insert(offset, value);
        }
    }

    /// Number of writes made through [`RegisterIo::write`].
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Every register ever set, sorted by offset.
    pub fn snapshot(&self) -> Vec<(u64, u32)> {
        let mut regs: Vec<(u64, u32)> = self
            .regs
            .lock()
            .map(|m| m.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default();
        regs.sort_unstable();
        regs
    }
}

impl RegisterIo for RegisterBlock {
    fn read(&self, offset: u64) -> ClockResult<u32> {
        let regs = self.regs.lock().map_err(|_| ClockError::HardwareFault {
            offset,
            reason: "register block poisoned".to_string(),
        })?;
        Ok(regs.get(&offset).copied().unwrap_or(0))
    }

    fn write(&self, offset: u64, value: u32) -> ClockResult<()> {
        let mut regs = self.regs.lock().map_err(|_| ClockError::HardwareFault {
            offset,
            reason: "register block poisoned".to_string(),
        })?;
        regs.insert(offset, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
