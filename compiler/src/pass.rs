// pass.rs — Stage descriptor module: metadata, dependency resolution, certificates
//
// Declares the fusion pass's five stages (graph loading is outside the
// runner), their dependency edges, and the artifacts they produce. Used by
// the pipeline runner to compute minimal stage subsets for each --emit
// target.

use std::collections::HashSet;

// ── Stage and Artifact identifiers ─────────────────────────────────────────

/// Identifies each fusion stage (graph loading excluded — handled before the runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Collect,
    Check,
    Split,
    Fuse,
    Refresh,
}

/// Machine-readable artifact identifiers. Each maps to a concrete field
/// of the fusion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Context,  // ScopeContext
    Stripped, // stripped-node audit trail
    Report,   // EligibilityReport
    Splits,   // Vec<SplitRecord>
    Fused,    // Vec<FusionOutcome> + rewritten graph
    TopoIds,  // dense topological ids
}

// ── Stage descriptor ───────────────────────────────────────────────────────

/// Static metadata about a fusion stage.
pub struct StageDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Stage dependencies (other stages whose outputs this stage consumes).
    pub inputs: &'static [StageId],
    /// Artifacts this stage produces.
    pub outputs: &'static [ArtifactId],
    /// What invalidates this stage's output.
    pub invalidation_key: &'static str,
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given stage.
pub fn descriptor(id: StageId) -> StageDescriptor {
    match id {
        StageId::Collect => StageDescriptor {
            name: "collect",
            inputs: &[],
            outputs: &[ArtifactId::Context, ArtifactId::Stripped],
            invalidation_key: "graph",
            invariants: "non-fusable members stripped, sync nodes indexed by event",
        },
        StageId::Check => StageDescriptor {
            name: "check",
            inputs: &[StageId::Collect],
            outputs: &[ArtifactId::Report],
            invalidation_key: "graph + context",
            invariants: "every scope fusable or listed with sorted cut points",
        },
        StageId::Split => StageDescriptor {
            name: "split",
            inputs: &[StageId::Check],
            outputs: &[ArtifactId::Splits],
            invalidation_key: "graph + context + report",
            invariants: "C1: no scope reaching the engine has a cut point",
        },
        StageId::Fuse => StageDescriptor {
            name: "fuse",
            inputs: &[StageId::Split],
            outputs: &[ArtifactId::Fused],
            invalidation_key: "graph + context + event_base",
            invariants: "F1-F4: pairs one-to-one, members re-hosted, boundary intact",
        },
        StageId::Refresh => StageDescriptor {
            name: "refresh",
            inputs: &[StageId::Fuse],
            outputs: &[ArtifactId::TopoIds],
            invalidation_key: "graph",
            invariants: "T1: topological ids dense over root and nested graphs",
        },
    }
}

// ── Certificates ───────────────────────────────────────────────────────────

/// Machine-checkable evidence for a stage's postconditions.
pub trait StageCert {
    /// True when every obligation holds.
    fn all_pass(&self) -> bool;

    /// Named obligations with their outcome, in declaration order.
    fn obligations(&self) -> Vec<(&'static str, bool)>;

    /// Names of the obligations that failed.
    fn failed(&self) -> Vec<&'static str> {
        self.obligations()
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect()
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All 5 stage IDs in declaration order (used for iteration).
pub const ALL_STAGES: [StageId; 5] = [
    StageId::Collect,
    StageId::Check,
    StageId::Split,
    StageId::Fuse,
    StageId::Refresh,
];

/// Compute the minimal ordered set of stages needed to produce `terminal`.
/// Returns stages in topological (execution) order.
pub fn required_stages(terminal: StageId) -> Vec<StageId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: StageId, visited: &mut HashSet<StageId>, order: &mut Vec<StageId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_stages_split_skips_fuse_and_refresh() {
        let stages = required_stages(StageId::Split);
        assert_eq!(
            stages,
            vec![StageId::Collect, StageId::Check, StageId::Split]
        );
        assert!(!stages.contains(&StageId::Fuse));
        assert!(!stages.contains(&StageId::Refresh));
    }

    #[test]
    fn required_stages_refresh_includes_all() {
        let stages = required_stages(StageId::Refresh);
        assert_eq!(stages.len(), 5);
        assert_eq!(stages, ALL_STAGES.to_vec());
    }

    #[test]
    fn required_stages_collect_is_minimal() {
        assert_eq!(required_stages(StageId::Collect), vec![StageId::Collect]);
    }

    #[test]
    fn no_load_in_stage_id() {
        // Loading is handled outside the runner; StageId has no Load variant.
        for stage in &ALL_STAGES {
            assert_ne!(descriptor(*stage).name, "load");
        }
    }

    #[test]
    fn all_descriptors_have_outputs() {
        for stage in &ALL_STAGES {
            let desc = descriptor(*stage);
            assert!(
                !desc.outputs.is_empty(),
                "stage {:?} has no outputs declared",
                stage
            );
        }
    }

    #[test]
    fn dependency_edges_are_consistent() {
        for stage in &ALL_STAGES {
            let desc = descriptor(*stage);
            for dep in desc.inputs {
                let order = required_stages(*stage);
                let dep_pos = order.iter().position(|s| s == dep);
                let self_pos = order.iter().position(|s| s == stage);
                assert!(
                    dep_pos.unwrap() < self_pos.unwrap(),
                    "{:?} depends on {:?} but it comes later in topological order",
                    stage,
                    dep
                );
            }
        }
    }

    #[test]
    fn failed_lists_only_false_obligations() {
        struct Two(bool, bool);
        impl StageCert for Two {
            fn all_pass(&self) -> bool {
                self.0 && self.1
            }
            fn obligations(&self) -> Vec<(&'static str, bool)> {
                vec![("A", self.0), ("B", self.1)]
            }
        }
        assert_eq!(Two(true, false).failed(), vec!["B"]);
        assert!(Two(true, true).failed().is_empty());
    }
}
