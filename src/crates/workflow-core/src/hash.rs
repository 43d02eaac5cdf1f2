//! Computes the stable `workflow_hash` used to gate checkpoint reuse
//! (`spec.md` §4.7): "a stable hash over sorted executor IDs, edge tuples,
//! and edge kinds."

use crate::edge::{Edge, EdgeKind};
use sha2_free_hash::stable_hash;

/// A coarse, stable discriminant string for an [`EdgeKind`], independent of
/// any predicate/selector closures it carries (closures aren't hashable;
/// only the *shape* of the graph determines compatibility).
fn edge_kind_tag(kind: &EdgeKind) -> String {
    match kind {
        EdgeKind::Direct => "direct".to_string(),
        EdgeKind::Conditional(_) => "conditional".to_string(),
        EdgeKind::SwitchCase {
            group_id,
            is_default,
            ..
        } => format!("switch_case:{group_id}:{is_default}"),
        EdgeKind::FanOut => "fan_out".to_string(),
        EdgeKind::MultiSelection { group_id, .. } => format!("multi_selection:{group_id}"),
        EdgeKind::FanIn { group_id } => format!("fan_in:{group_id}"),
        EdgeKind::Loop => "loop".to_string(),
    }
}

/// Compute the workflow hash over sorted executor IDs and sorted
/// `(source, target, kind_tag)` edge tuples. Sorting makes the hash
/// independent of registration order, so a workflow rebuilt identically but
/// with executors registered in a different sequence still hashes the same.
pub fn compute_workflow_hash(executor_ids: &[String], edges: &[Edge]) -> String {
    let mut ids: Vec<&str> = executor_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();

    let mut edge_tuples: Vec<String> = edges
        .iter()
        .map(|e| format!("{}->{}:{}", e.source_id, e.target_id, edge_kind_tag(&e.kind)))
        .collect();
    edge_tuples.sort_unstable();

    let mut buf = String::new();
    for id in ids {
        buf.push_str(id);
        buf.push('\n');
    }
    for tuple in edge_tuples {
        buf.push_str(&tuple);
        buf.push('\n');
    }
    stable_hash(&buf)
}

/// Minimal dependency-free stable string hash (FNV-1a), kept local rather
/// than pulling in a hashing crate the rest of the workspace doesn't
/// otherwise need — `workflow_hash` only has to be stable and collision
/// resistant enough to gate checkpoint compatibility, not cryptographically
/// secure.
mod sha2_free_hash {
    pub fn stable_hash(input: &str) -> String {
        const FNV_OFFSET: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x100000001b3;
        let mut hash = FNV_OFFSET;
        for byte in input.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        format!("{hash:016x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn hash_is_stable_regardless_of_registration_order() {
        let edges_a = vec![Edge::direct("a", "b"), Edge::direct("b", "c")];
        let edges_b = vec![Edge::direct("b", "c"), Edge::direct("a", "b")];
        let ids_a = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ids_b = vec!["c".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(
            compute_workflow_hash(&ids_a, &edges_a),
            compute_workflow_hash(&ids_b, &edges_b)
        );
    }

    #[test]
    fn hash_changes_when_an_edge_kind_changes() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let direct = compute_workflow_hash(&ids, &[Edge::direct("a", "b")]);
        let predicate = Arc::new(|_: &serde_json::Value| true);
        let conditional =
            compute_workflow_hash(&ids, &[Edge::conditional("a", "b", predicate)]);
        assert_ne!(direct, conditional);
    }
}
