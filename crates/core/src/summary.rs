// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::node::{ClockFlags, ClockId};
use crate::tree::ClockTree;
use serde::Serialize;

/// One line of a clock tree dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockSummary {
    pub name: String,
    pub instance: Option<u8>,
    pub kind: String,
    pub parent: Option<String>,
    /// Distance from the root of its subtree.
    pub depth: usize,
    pub rate_hz: Option<u64>,
    /// Why the rate could not be computed, e.g. a reserved mux slot.
    pub error: Option<String>,
    pub enable_count: Option<u32>,
    pub flags: Vec<String>,
}

impl ClockSummary {
    pub fn label(&self) -> String {
        match self.instance {
            Some(i) => format!("{}:{}", self.name, i),
            None => self.name.clone(),
        }
    }
}

fn flag_names(flags: ClockFlags) -> Vec<String> {
    flags
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect()
}

impl ClockTree {
    /// Every clock in depth-first order from the roots, children in
    /// registration order.
    pub fn summary(&self) -> Vec<ClockSummary> {
        let mut children: Vec<Vec<ClockId>> = vec![Vec::new(); self.len()];
        let mut roots = Vec::new();
        for id in self.ids() {
            match self.parent(id).ok().flatten() {
                Some(parent) => children[parent.index()].push(id),
                None => roots.push(id),
            }
        }

        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<(ClockId, usize)> = roots.into_iter().rev().map(|id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            if let Some(entry) = self.entry(id, depth) {
                out.push(entry);
            }
            stack.extend(children[id.index()].iter().rev().map(|c| (*c, depth + 1)));
        }
        out
    }

    fn entry(&self, id: ClockId, depth: usize) -> Option<ClockSummary> {
        let node = self.node(id).ok()?;
        let (rate_hz, error) = match self.get_rate(id) {
            Ok(rate) => (Some(rate), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Some(ClockSummary {
            name: node.key().name.clone(),
            instance: node.key().instance,
            kind: node.behavior().kind().to_string(),
            parent: node
                .parent()
                .and_then(|p| self.key(p).ok())
                .map(|k| k.to_string()),
            depth,
            rate_hz,
            error,
            enable_count: node.behavior().gate().map(|g| g.enable_count()),
            flags: flag_names(node.flags()),
        })
    }

    /// Summary as a JSON value, for tooling.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self.summary()).unwrap_or(serde_json::Value::Null)
    }
}
