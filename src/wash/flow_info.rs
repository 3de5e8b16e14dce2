//! Flow values - reachability plus definite and possible assignment
//!
//! A `FlowInfo` is immutable in spirit: every structural merge produces a new
//! value (`merged_with`, `copy`), and the analyzer threads values through the
//! tree by move. Bit `i` stands for local `LocalId(i)` of the method being
//! analyzed.

use crate::ast::LocalId;
use fixedbitset::FixedBitSet;

/// Reachability mode of a flow value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Reachable,
    /// Silently unreachable (`if (false)` bodies, code after a reported dead end)
    Unreachable,
    /// Just after a jump; the next statement entered is reported unreachable
    DeadEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowInfo {
    reach: Reachability,
    definite: FixedBitSet,
    possible: FixedBitSet,
}

impl FlowInfo {
    /// Method entry: reachable, nothing assigned
    pub fn initial(locals: usize) -> Self {
        Self {
            reach: Reachability::Reachable,
            definite: FixedBitSet::with_capacity(locals),
            possible: FixedBitSet::with_capacity(locals),
        }
    }

    pub fn reach(&self) -> Reachability {
        self.reach
    }

    pub fn is_reachable(&self) -> bool {
        self.reach == Reachability::Reachable
    }

    pub fn is_dead_end(&self) -> bool {
        self.reach == Reachability::DeadEnd
    }

    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Flow after a completed jump. Already unreachable flow stays silent.
    pub fn dead_end(&self) -> Self {
        let mut next = self.clone();
        if next.reach == Reachability::Reachable {
            next.reach = Reachability::DeadEnd;
        }
        next
    }

    pub fn unreachable(&self) -> Self {
        let mut next = self.clone();
        next.reach = Reachability::Unreachable;
        next
    }

    pub fn with_reach(mut self, reach: Reachability) -> Self {
        self.reach = reach;
        self
    }

    // ========================================================================
    // ASSIGNMENT STATE
    // ========================================================================

    pub fn is_definitely_assigned(&self, local: LocalId) -> bool {
        self.definite.contains(local.index())
    }

    pub fn is_possibly_assigned(&self, local: LocalId) -> bool {
        self.possible.contains(local.index())
    }

    pub fn mark_assigned(&mut self, local: LocalId) {
        self.grow(local.index() + 1);
        self.definite.insert(local.index());
        self.possible.insert(local.index());
    }

    /// Forget a local whose scope closed
    pub fn reset(&mut self, local: LocalId) {
        if local.index() < self.definite.len() {
            self.definite.set(local.index(), false);
            self.possible.set(local.index(), false);
        }
    }

    pub fn assigned_locals(&self) -> Vec<LocalId> {
        self.definite.ones().map(|i| LocalId(i as u32)).collect()
    }

    fn grow(&mut self, len: usize) {
        if self.definite.len() < len {
            self.definite.grow(len);
            self.possible.grow(len);
        }
    }

    // ========================================================================
    // MERGES
    // ========================================================================

    /// Join of two control paths.
    ///
    /// Reachable wins; two unreachable paths stay a dead end if either was one.
    /// Definite bits come from the live side when only one side is live.
    /// Possible bits always accumulate.
    pub fn merged_with(&self, other: &FlowInfo) -> FlowInfo {
        let mut merged = match (self.is_reachable(), other.is_reachable()) {
            (true, false) => self.clone(),
            (false, true) => other.clone(),
            _ => {
                let mut both = self.clone();
                both.grow(other.definite.len());
                let mut rhs = other.definite.clone();
                rhs.grow(both.definite.len());
                both.definite.intersect_with(&rhs);
                both
            }
        };
        merged.grow(other.possible.len().max(self.possible.len()));
        merged.possible.union_with(&self.possible);
        merged.possible.union_with(&other.possible);
        merged.reach = match (self.reach, other.reach) {
            (Reachability::Reachable, _) | (_, Reachability::Reachable) => Reachability::Reachable,
            (Reachability::DeadEnd, _) | (_, Reachability::DeadEnd) => Reachability::DeadEnd,
            _ => Reachability::Unreachable,
        };
        merged
    }

    /// Accumulate the possible bits of another path
    pub fn add_possible_from(&mut self, other: &FlowInfo) {
        self.grow(other.possible.len());
        self.possible.union_with(&other.possible);
    }

    /// Accumulate everything another path definitely assigned
    pub fn add_definite_from(&mut self, other: &FlowInfo) {
        self.grow(other.definite.len());
        self.definite.union_with(&other.definite);
        self.possible.union_with(&other.definite);
    }

    /// Keep only the definite bits of `base`, leaving possible bits untouched
    pub fn restrict_definite_to(&mut self, base: &FlowInfo) {
        let mut mask = base.definite.clone();
        mask.grow(self.definite.len());
        self.definite.grow(mask.len());
        self.definite.intersect_with(&mask);
    }
}

/// Split flow after a boolean condition
#[derive(Debug, Clone)]
pub struct ConditionalFlow {
    pub when_true: FlowInfo,
    pub when_false: FlowInfo,
}

impl ConditionalFlow {
    pub fn both(flow: FlowInfo) -> Self {
        Self {
            when_true: flow.copy(),
            when_false: flow,
        }
    }

    /// Flow after the condition regardless of its outcome
    pub fn unconditional_inits(&self) -> FlowInfo {
        self.when_true.merged_with(&self.when_false)
    }

    pub fn swapped(self) -> Self {
        Self {
            when_true: self.when_false,
            when_false: self.when_true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: LocalId = LocalId(0);
    const Y: LocalId = LocalId(1);

    #[test]
    fn merge_keeps_common_assignments() {
        let base = FlowInfo::initial(2);
        let mut left = base.copy();
        left.mark_assigned(X);
        left.mark_assigned(Y);
        let mut right = base.copy();
        right.mark_assigned(X);

        let merged = left.merged_with(&right);
        assert!(merged.is_definitely_assigned(X));
        assert!(!merged.is_definitely_assigned(Y));
        assert!(merged.is_possibly_assigned(Y));
    }

    #[test]
    fn live_side_wins_definite_bits() {
        let base = FlowInfo::initial(2);
        let mut returned = base.copy();
        returned.mark_assigned(Y);
        let returned = returned.dead_end();
        let mut fell_through = base.copy();
        fell_through.mark_assigned(X);

        let merged = returned.merged_with(&fell_through);
        assert!(merged.is_reachable());
        assert!(merged.is_definitely_assigned(X));
        assert!(!merged.is_definitely_assigned(Y));
    }

    #[test]
    fn reachability_merge_rule() {
        let live = FlowInfo::initial(0);
        let dead = live.dead_end();
        let silent = live.unreachable();
        assert_eq!(dead.merged_with(&silent).reach(), Reachability::DeadEnd);
        assert_eq!(silent.merged_with(&silent).reach(), Reachability::Unreachable);
        assert_eq!(dead.merged_with(&live).reach(), Reachability::Reachable);
        assert_eq!(silent.dead_end().reach(), Reachability::Unreachable);
    }

    #[test]
    fn reset_clears_both_bits() {
        let mut flow = FlowInfo::initial(1);
        flow.mark_assigned(X);
        flow.reset(X);
        assert!(!flow.is_definitely_assigned(X));
        assert!(!flow.is_possibly_assigned(X));
    }
}
