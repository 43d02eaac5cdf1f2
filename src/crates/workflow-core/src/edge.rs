//! The edge model: typed connectors between executors controlling routing.
//!
//! An [`Edge`] is an immutable record of `{source_id, target_id, kind}` plus
//! whatever predicate/selector closures its `kind` needs. [`EdgeKind::Fanin`]
//! edges are grouped by `group_id` rather than carrying a single target so
//! the barrier ledger in `crate::context` can track "has every source in
//! this group fired since the last barrier cycle" per group.

use serde_json::Value as Json;
use std::fmt;
use std::sync::Arc;

/// A predicate evaluated against a decoded envelope payload.
pub type Predicate = Arc<dyn Fn(&Json) -> bool + Send + Sync>;

/// A selector used by multi-selection edges: given the payload and the full
/// set of declared target IDs, returns the subset to deliver to.
pub type Selector = Arc<dyn Fn(&Json, &[String]) -> Vec<String> + Send + Sync>;

/// The routing behavior of an [`Edge`]. See `spec.md` §4.3.
#[derive(Clone)]
pub enum EdgeKind {
    /// Unconditional delivery to a single target.
    Direct,
    /// Delivered only if `predicate(payload)` is true.
    Conditional(Predicate),
    /// First-match-wins among an ordered list of `(predicate, target)`
    /// pairs sharing a `group_id`, falling back to `default_target` if none
    /// match. Represented here as one `Edge` per case; the router groups
    /// them by `group_id` and evaluates in registration order.
    SwitchCase {
        predicate: Predicate,
        group_id: String,
        is_default: bool,
    },
    /// Source → set of targets, each target gets a copy. Represented as one
    /// `Edge` per target, so this variant carries no extra data.
    FanOut,
    /// Source → set of targets with a `selector(payload, target_ids)`
    /// choosing the subset to deliver to. All edges in the group share
    /// `group_id`; the selector is evaluated once per group per payload.
    MultiSelection { selector: Selector, group_id: String },
    /// Many sources → one target, gathered behind a barrier keyed by
    /// `group_id`. The target is invoked with a list once every source in
    /// the group has delivered ≥1 message since the group's last fire.
    FanIn { group_id: String },
    /// A back-edge. Loops are not structurally distinguished from `Direct`
    /// at dispatch time; `group_id` here doubles as the loop's identity for
    /// `max_iterations` bookkeeping in the scheduler.
    Loop,
}

impl fmt::Debug for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Direct => write!(f, "Direct"),
            EdgeKind::Conditional(_) => write!(f, "Conditional(..)"),
            EdgeKind::SwitchCase {
                group_id,
                is_default,
                ..
            } => write!(f, "SwitchCase{{group_id: {group_id:?}, is_default: {is_default}}}"),
            EdgeKind::FanOut => write!(f, "FanOut"),
            EdgeKind::MultiSelection { group_id, .. } => {
                write!(f, "MultiSelection{{group_id: {group_id:?}}}")
            }
            EdgeKind::FanIn { group_id } => write!(f, "FanIn{{group_id: {group_id:?}}}"),
            EdgeKind::Loop => write!(f, "Loop"),
        }
    }
}

/// An immutable directed edge between two executor IDs.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    pub labels: Vec<String>,
}

impl Edge {
    pub fn direct(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: EdgeKind::Direct,
            labels: Vec::new(),
        }
    }

    pub fn conditional(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: EdgeKind::Conditional(predicate),
            labels: Vec::new(),
        }
    }

    pub fn fan_out(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: EdgeKind::FanOut,
            labels: Vec::new(),
        }
    }

    pub fn fan_in(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: EdgeKind::FanIn {
                group_id: group_id.into(),
            },
            labels: Vec::new(),
        }
    }

    pub fn loop_back(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: EdgeKind::Loop,
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Whether this edge participates in a fan-in barrier, and if so, under
    /// which group id.
    pub fn fan_in_group(&self) -> Option<&str> {
        match &self.kind {
            EdgeKind::FanIn { group_id } => Some(group_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_edge_evaluates_predicate() {
        let edge = Edge::conditional(
            "a",
            "b",
            Arc::new(|v: &Json| v.as_i64().map(|n| n > 0).unwrap_or(false)),
        );
        let EdgeKind::Conditional(pred) = &edge.kind else {
            panic!("expected conditional");
        };
        assert!(pred(&serde_json::json!(5)));
        assert!(!pred(&serde_json::json!(-5)));
    }

    #[test]
    fn fan_in_group_reports_correctly() {
        let fi = Edge::fan_in("a", "t", "group-1");
        assert_eq!(fi.fan_in_group(), Some("group-1"));
        let direct = Edge::direct("a", "b");
        assert_eq!(direct.fan_in_group(), None);
    }
}
