// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default schema version for YAML clock tables
fn default_schema_version() -> String {
    "1.0".to_string()
}

/// Reference to a clock by name and optional instance index.
///
/// Written as `name` or `name:instance` in YAML, e.g. `uart:0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockRef {
    pub name: String,
    pub instance: Option<u8>,
}

impl ClockRef {
    pub fn new(name: impl Into<String>, instance: Option<u8>) -> Self {
        Self {
            name: name.into(),
            instance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockRefParseError {
    #[error("empty clock name")]
    EmptyName,
    #[error("invalid instance '{instance}' in clock reference '{value}'")]
    InvalidInstance { value: String, instance: String },
}

impl FromStr for ClockRef {
    type Err = ClockRefParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim();
        let (name, instance) = match v.rsplit_once(':') {
            Some((name, idx)) => {
                let instance =
                    idx.trim()
                        .parse::<u8>()
                        .map_err(|_| ClockRefParseError::InvalidInstance {
                            value: value.to_string(),
                            instance: idx.to_string(),
                        })?;
                (name.trim(), Some(instance))
            }
            None => (v, None),
        };
        if name.is_empty() {
            return Err(ClockRefParseError::EmptyName);
        }
        Ok(Self::new(name, instance))
    }
}

impl TryFrom<String> for ClockRef {
    type Error = ClockRefParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockRef> for String {
    fn from(r: ClockRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for ClockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance {
            Some(i) => write!(f, "{}:{}", self.name, i),
            None => f.write_str(&self.name),
        }
    }
}

/// Gate register banks. Unrelated peripherals share enable bits in each of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateBank {
    /// Peripheral (APB) bus gate register.
    Pclk,
    /// AHB bus gate register.
    Hclk,
    /// Special-function clock gate register.
    Sclk,
    /// Memory-controller gate register.
    Mem0,
    /// Miscellaneous system register that also carries a clock enable.
    Others,
}

impl GateBank {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateBank::Pclk => "pclk",
            GateBank::Hclk => "hclk",
            GateBank::Sclk => "sclk",
            GateBank::Mem0 => "mem0",
            GateBank::Others => "others",
        }
    }
}

/// Register offsets of the gate banks within the clock controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateLayout {
    pub pclk: u64,
    pub hclk: u64,
    pub sclk: u64,
    pub mem0: u64,
    pub others: u64,
}

impl GateLayout {
    pub fn offset(&self, bank: GateBank) -> u64 {
        match bank {
            GateBank::Pclk => self.pclk,
            GateBank::Hclk => self.hclk,
            GateBank::Sclk => self.sclk,
            GateBank::Mem0 => self.mem0,
            GateBank::Others => self.others,
        }
    }
}

impl Default for GateLayout {
    fn default() -> Self {
        // S3C64xx system controller
        Self {
            hclk: 0x30,
            pclk: 0x34,
            sclk: 0x38,
            mem0: 0x3C,
            others: 0x900,
        }
    }
}

/// A bit field within a 32-bit register: `reg` offset, `shift`, `width` in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub reg: u64,
    pub shift: u8,
    pub width: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDescriptor {
    pub bank: GateBank,
    pub bit: u8,
}

/// Registration groups, registered in declaration order.
///
/// A clock may only refer to clocks in the same or an earlier group
/// (and, within a group, to clocks listed before it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitGroup {
    /// Oscillators and external inputs.
    Roots,
    /// PLL outputs.
    Plls,
    /// PLL-or-crystal selectors.
    Selectors,
    /// Processor and bus-rate dividers.
    Buses,
    /// Ordinary peripheral gates, left as the bootloader configured them.
    #[default]
    Ordinary,
    /// Peripheral gates switched off at registration.
    GatedOff,
    /// Composite mux/divider/gate clock sources.
    Sources,
    /// Clocks fed by a clock source registered in an earlier group.
    Dependent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockFlag {
    /// Gate is cleared at registration regardless of boot state.
    InitOff,
    /// Rate is supplied at runtime by something outside the chip.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClockKind {
    /// Crystal feeding the PLLs; rate is supplied when the tree is built.
    Oscillator,
    /// Constant rate (0 = unknown until assigned).
    Fixed { rate: u64 },
    /// Output of a PLL, computed by a chip-family formula from control registers.
    Pll { formula: String, control: Vec<u64> },
    /// Forwards its parent's rate, no hardware control.
    Passthrough,
    Gate(GateDescriptor),
    Mux {
        select: FieldDescriptor,
        sources: Vec<Option<ClockRef>>,
    },
    Divider { divider: FieldDescriptor },
    Composite {
        #[serde(default)]
        select: Option<FieldDescriptor>,
        #[serde(default)]
        sources: Vec<Option<ClockRef>>,
        #[serde(default)]
        divider: Option<FieldDescriptor>,
        #[serde(default)]
        gate: Option<GateDescriptor>,
    },
    /// Processor clock: divisor in the low bits, limited by the variant mask.
    CoreClock { divider: FieldDescriptor },
}

impl ClockKind {
    /// Every clock this kind references other than the declared parent.
    pub fn sources(&self) -> impl Iterator<Item = &ClockRef> {
        let sources: &[Option<ClockRef>] = match self {
            ClockKind::Mux { sources, .. } | ClockKind::Composite { sources, .. } => sources,
            _ => &[],
        };
        sources.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDescriptor {
    pub name: String,
    #[serde(default)]
    pub instance: Option<u8>,
    #[serde(default)]
    pub parent: Option<ClockRef>,
    #[serde(default)]
    pub group: InitGroup,
    #[serde(default)]
    pub flags: Vec<ClockFlag>,
    pub kind: ClockKind,
}

impl ClockDescriptor {
    pub fn clock_ref(&self) -> ClockRef {
        ClockRef::new(self.name.clone(), self.instance)
    }

    pub fn has_flag(&self, flag: ClockFlag) -> bool {
        self.flags.contains(&flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterInit {
    pub offset: u64,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSettings {
    /// Crystal rate in Hz.
    pub xtal_hz: u64,
    /// Processor clock divisor mask for this SoC variant.
    pub armclk_mask: u32,
}

/// A chip's clock table: settings, gate layout, register boot values and clocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTable {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub settings: TreeSettings,
    #[serde(default)]
    pub gate_layout: GateLayout,
    /// Register contents at boot, used to seed simulated register blocks.
    #[serde(default)]
    pub registers: Vec<RegisterInit>,
    pub clocks: Vec<ClockDescriptor>,
}

impl ClockTable {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read clock table {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid clock table {:?}", path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let table: ClockTable =
            serde_yaml::from_str(yaml).context("Failed to parse Clock Table YAML")?;
        if table.schema_version != default_schema_version() {
            tracing::warn!(
                "Clock table '{}' uses schema version {}, expected {}",
                table.name,
                table.schema_version,
                default_schema_version()
            );
        }
        Ok(table)
    }

    pub fn find(&self, clock: &ClockRef) -> Option<&ClockDescriptor> {
        self.clocks
            .iter()
            .find(|c| c.name == clock.name && c.instance == clock.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_ref_parse() {
        let r: ClockRef = "uart:3".parse().unwrap();
        assert_eq!(r, ClockRef::new("uart", Some(3)));
        assert_eq!(r.to_string(), "uart:3");

        let r: ClockRef = "usb-bus-host".parse().unwrap();
        assert_eq!(r.instance, None);
        assert_eq!(r.to_string(), "usb-bus-host");
    }

    #[test]
    fn test_clock_ref_rejects_bad_instance() {
        assert!(matches!(
            "uart:x".parse::<ClockRef>(),
            Err(ClockRefParseError::InvalidInstance { .. })
        ));
        assert_eq!("".parse::<ClockRef>(), Err(ClockRefParseError::EmptyName));
        assert_eq!(":1".parse::<ClockRef>(), Err(ClockRefParseError::EmptyName));
    }

    #[test]
    fn test_init_group_order() {
        assert!(InitGroup::Roots < InitGroup::Plls);
        assert!(InitGroup::Buses < InitGroup::Ordinary);
        assert!(InitGroup::GatedOff < InitGroup::Sources);
        assert!(InitGroup::Sources < InitGroup::Dependent);
    }

    #[test]
    fn test_gate_layout_offsets() {
        let layout = GateLayout::default();
        assert_eq!(layout.offset(GateBank::Hclk), 0x30);
        assert_eq!(layout.offset(GateBank::Pclk), 0x34);
        assert_eq!(layout.offset(GateBank::Others), 0x900);
    }
}
