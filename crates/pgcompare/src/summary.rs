//! Aggregation of a run's outcomes.

use crate::orchestrator::TargetOutcome;
use crate::{DifferenceKind, EndpointRef, ErrorKind, Severity};
use std::collections::BTreeMap;

/// Number of differences per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.warning + self.info
    }
}

/// Per-target line of a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSummary {
    pub target: EndpointRef,
    pub success: bool,
    pub difference_count: usize,
    pub severities: SeverityCounts,
}

/// A target that could not be compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTarget {
    pub target: EndpointRef,
    pub kind: ErrorKind,
    pub cause: String,
}

/// A successfully compared target with at least one difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemTarget {
    pub target: EndpointRef,
    pub difference_count: usize,
    pub severities: SeverityCounts,
}

/// Counts and rankings over every target of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_differences: usize,
    pub severities: SeverityCounts,
    /// Only kinds that occurred at least once.
    pub by_kind: BTreeMap<DifferenceKind, usize>,
    /// One entry per target, in target order.
    pub targets: Vec<TargetSummary>,
    pub failures: Vec<FailedTarget>,
    /// Ranked by difference count, highest first. Ties keep target order.
    pub problem_targets: Vec<ProblemTarget>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[TargetOutcome]) -> Self {
        let mut summary = RunSummary {
            total: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            let result = &outcome.result;
            let mut severities = SeverityCounts::default();
            for difference in &outcome.differences {
                severities.add(difference.severity());
                *summary.by_kind.entry(difference.kind).or_default() += 1;
            }

            if result.success {
                summary.succeeded += 1;
                summary.total_differences += result.difference_count;
                summary.severities.critical += severities.critical;
                summary.severities.warning += severities.warning;
                summary.severities.info += severities.info;
                if result.difference_count > 0 {
                    summary.problem_targets.push(ProblemTarget {
                        target: result.target.clone(),
                        difference_count: result.difference_count,
                        severities,
                    });
                }
            } else {
                summary.failed += 1;
                let (kind, cause) = match &result.error {
                    Some(error) => (error.kind(), error.to_string()),
                    None => (ErrorKind::Internal, "unknown error".to_string()),
                };
                summary.failures.push(FailedTarget {
                    target: result.target.clone(),
                    kind,
                    cause,
                });
            }

            summary.targets.push(TargetSummary {
                target: result.target.clone(),
                success: result.success,
                difference_count: result.difference_count,
                severities,
            });
        }

        // sort_by is stable, so equal counts keep target order
        summary
            .problem_targets
            .sort_by(|a, b| b.difference_count.cmp(&a.difference_count));

        summary
    }

    /// The `n` targets with the most differences.
    pub fn top_problems(&self, n: usize) -> &[ProblemTarget] {
        &self.problem_targets[..n.min(self.problem_targets.len())]
    }

    pub fn kind_count(&self, kind: DifferenceKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
