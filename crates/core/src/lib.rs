// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod build;
pub mod core_clock;
pub mod custom;
pub mod divider;
pub mod gate;
pub mod mux;
pub mod node;
pub mod register;
pub mod soc;
pub mod summary;
pub mod tree;


pub use build::build_tree;
pub use clktree_config::{GateBank, GateLayout};
pub use core_clock::CoreClock;
pub use custom::{PllClock, PllFormulas, PllRateFn, RateOps};
pub use divider::Divider;
pub use gate::Gate;
pub use mux::Mux;
pub use node::{
    Behavior, ClockFlags, ClockId, ClockKey, ClockNode, Composite, GateSpec, MuxSpec, NodeKind,
    NodeSpec,
};
pub use register::{RegisterBlock, RegisterController, RegisterField, RegisterIo, RegisterMap};
pub use summary::ClockSummary;
pub use tree::{ClockTree, ClockTreeBuilder};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    #[error("clock {0} not found")]
    NotFound(ClockKey),
    #[error("clock {0} is already registered")]
    DuplicateClock(ClockKey),
    #[error("clock {clock} refers to {parent}, which is not registered yet")]
    UnresolvedParent { clock: ClockKey, parent: ClockKey },
    #[error("{candidate} is not a selectable source of {clock}")]
    InvalidSource { clock: ClockKey, candidate: ClockKey },
    #[error("{clock} selector holds reserved source slot {value}")]
    ReservedSource { clock: ClockKey, value: u32 },
    #[error("{clock}: {requested} Hz is below the minimum achievable {minimum} Hz")]
    RateTooLow {
        clock: ClockKey,
        requested: u64,
        minimum: u64,
    },
    #[error("{0} has no rate control")]
    RateNotSettable(ClockKey),
    #[error("{0} is already disabled")]
    AlreadyDisabled(ClockKey),
    #[error("register access failed at {offset:#x}: {reason}")]
    HardwareFault { offset: u64, reason: String },
    #[error("unknown PLL formula '{0}'")]
    UnknownPllFormula(String),
    #[error("invalid register field at {reg:#x}: shift {shift}, width {width}")]
    InvalidField { reg: u64, shift: u8, width: u8 },
    #[error("invalid clock handle {0}")]
    InvalidHandle(usize),
}

pub type ClockResult<T> = Result<T, ClockError>;
