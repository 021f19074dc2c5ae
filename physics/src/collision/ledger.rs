//! Creation/destruction bookkeeping for engine resources.
//!
//! Rapier owns its bodies and colliders in arenas, so nothing leaks in the C++ sense. What
//! can still go wrong is the pairing: removing a handle twice, or forgetting to remove a
//! ghost before a reset. Every add/remove in `CollisionWorld` and `SensorSystem` goes
//! through this ledger so those mistakes show up in logs and tests.

use std::fmt;

use log::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Body,
    Collider,
    Ghost,
    Shape,
}

impl ResourceKind {
    const ALL: [ResourceKind; 4] = [
        ResourceKind::Body,
        ResourceKind::Collider,
        ResourceKind::Ghost,
        ResourceKind::Shape,
    ];

    fn index(self) -> usize {
        match self {
            ResourceKind::Body => 0,
            ResourceKind::Collider => 1,
            ResourceKind::Ghost => 2,
            ResourceKind::Shape => 3,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Body => "body",
            ResourceKind::Collider => "collider",
            ResourceKind::Ghost => "ghost",
            ResourceKind::Shape => "shape",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub created: u64,
    pub destroyed: u64,
    /// Destroy attempts on resources that were already gone.
    pub failed: u64,
}

impl LedgerCounts {
    pub fn live(&self) -> u64 {
        self.created.saturating_sub(self.destroyed)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResourceLedger {
    counts: [LedgerCounts; 4],
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&mut self, kind: ResourceKind) {
        self.counts[kind.index()].created += 1;
    }

    pub fn destroyed(&mut self, kind: ResourceKind) {
        let counts = &mut self.counts[kind.index()];
        if counts.destroyed >= counts.created {
            warn!("ledger: more {kind} destructions than creations");
        }
        counts.destroyed += 1;
    }

    /// Record a failed destroy. Logged with the owning mesh name when known.
    pub fn failed(&mut self, kind: ResourceKind, owner: Option<&str>) {
        self.counts[kind.index()].failed += 1;
        match owner {
            Some(owner) => warn!("failed to destroy {kind} of `{owner}`: already removed"),
            None => warn!("failed to destroy {kind}: already removed"),
        }
    }

    pub fn counts(&self, kind: ResourceKind) -> LedgerCounts {
        self.counts[kind.index()]
    }

    pub fn live(&self, kind: ResourceKind) -> u64 {
        self.counts(kind).live()
    }

    /// Every created resource was destroyed exactly once.
    pub fn is_balanced(&self) -> bool {
        self.counts.iter().all(|c| c.created == c.destroyed)
    }
}

impl fmt::Display for ResourceLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            let c = self.counts(*kind);
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}: {}/{} ({} failed)", c.destroyed, c.created, c.failed)?;
        }
        Ok(())
    }
}
