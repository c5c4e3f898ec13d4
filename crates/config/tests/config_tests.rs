// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clktree_config::{
    ClockFlag, ClockKind, ClockRef, ClockTable, FieldDescriptor, GateBank, GateDescriptor,
    InitGroup,
};
use std::path::PathBuf;

#[test]
fn test_minimal_table_parses() {
    let yaml = r#"
name: "test-chip"
settings:
  xtal_hz: 12000000
  armclk_mask: 0x3
clocks:
  - name: xtal
    group: roots
    kind: { type: oscillator }
  - name: uart
    instance: 0
    parent: xtal
    kind: { type: gate, bank: pclk, bit: 1 }
"#;
    let table = ClockTable::from_yaml(yaml).unwrap();
    assert_eq!(table.schema_version, "1.0");
    assert_eq!(table.settings.xtal_hz, 12_000_000);
    assert_eq!(table.settings.armclk_mask, 3);
    assert_eq!(table.gate_layout.pclk, 0x34);
    assert!(table.registers.is_empty());

    let uart = table.find(&ClockRef::new("uart", Some(0))).unwrap();
    assert_eq!(uart.group, InitGroup::Ordinary);
    assert_eq!(uart.parent, Some(ClockRef::new("xtal", None)));
    assert_eq!(
        uart.kind,
        ClockKind::Gate(GateDescriptor {
            bank: GateBank::Pclk,
            bit: 1
        })
    );
}

#[test]
fn test_mux_sources_allow_holes() {
    let yaml = r#"
name: "holes"
settings: { xtal_hz: 12000000, armclk_mask: 0x7 }
clocks:
  - name: irda-bus
    group: sources
    flags: [init_off]
    kind:
      type: composite
      select: { reg: 0x1c, shift: 24, width: 2 }
      sources: [mout_epll, "dout_mpll", ~, clk_27m]
      divider: { reg: 0x28, shift: 20, width: 4 }
      gate: { bank: sclk, bit: 6 }
"#;
    let table = ClockTable::from_yaml(yaml).unwrap();
    let irda = &table.clocks[0];
    assert!(irda.has_flag(ClockFlag::InitOff));
    match &irda.kind {
        ClockKind::Composite {
            select,
            sources,
            divider,
            gate,
        } => {
            assert_eq!(
                *select,
                Some(FieldDescriptor {
                    reg: 0x1c,
                    shift: 24,
                    width: 2
                })
            );
            assert_eq!(sources.len(), 4);
            assert!(sources[2].is_none());
            assert_eq!(divider.map(|d| d.width), Some(4));
            assert_eq!(gate.map(|g| g.bank), Some(GateBank::Sclk));
        }
        other => panic!("unexpected kind {:?}", other),
    }
    let names: Vec<String> = irda.kind.sources().map(|s| s.to_string()).collect();
    assert_eq!(names, vec!["mout_epll", "dout_mpll", "clk_27m"]);
}

#[test]
fn test_bad_clock_reference_is_rejected() {
    let yaml = r#"
name: "bad"
settings: { xtal_hz: 12000000, armclk_mask: 0x7 }
clocks:
  - name: uart
    parent: "pclk:one"
    kind: { type: passthrough }
"#;
    assert!(ClockTable::from_yaml(yaml).is_err());
}

#[test]
fn test_unknown_kind_is_rejected() {
    let yaml = r#"
name: "bad"
settings: { xtal_hz: 12000000, armclk_mask: 0x7 }
clocks:
  - name: foo
    kind: { type: fractional }
"#;
    assert!(ClockTable::from_yaml(yaml).is_err());
}

#[test]
fn test_shipped_s3c6410_table_parses() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let path = manifest_dir
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("configs/clocks/s3c6410.yaml");
    let table = ClockTable::from_file(&path).unwrap();

    assert_eq!(table.name, "s3c6410");
    assert_eq!(table.settings.armclk_mask, 0x7);
    for (i, clock) in table.clocks.iter().enumerate() {
        let duplicates = table.clocks[i + 1..]
            .iter()
            .filter(|c| c.name == clock.name && c.instance == clock.instance)
            .count();
        assert_eq!(duplicates, 0, "duplicate clock {}", clock.clock_ref());
    }
    assert!(table.find(&ClockRef::new("armclk", None)).is_some());
    assert!(table.find(&ClockRef::new("uart", Some(3))).is_some());
}
