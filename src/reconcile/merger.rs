//! Keyed merge of graph and indexed records.
//!
//! Graph records are authoritative for `full_name` and `request_count`.
//! Indexed records only ever contribute `seen_count`, unless the email is
//! unknown to the graph, in which case the indexed record is taken as-is.

use crate::models::UserRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Merge the two source sequences into one record per email.
///
/// Iteration order of the result carries no meaning.
pub fn reconcile(graph: &[UserRecord], indexed: &[UserRecord]) -> HashMap<String, UserRecord> {
    let mut merged: HashMap<String, UserRecord> =
        HashMap::with_capacity(graph.len() + indexed.len());

    for user in graph {
        merged.insert(user.email.clone(), user.clone());
    }

    for user in indexed {
        merged
            .entry(user.email.clone())
            .and_modify(|existing| {
                existing.seen_count = existing.seen_count.saturating_add(user.seen_count)
            })
            .or_insert_with(|| user.clone());
    }

    merged
}

/// How the two sources overlapped in one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Distinct emails in the merged collection.
    pub total: usize,
    /// Emails seen only in the graph source.
    pub graph_only: usize,
    /// Emails seen only in the indexed source.
    pub indexed_only: usize,
    /// Emails present in both sources.
    pub matched: usize,
    /// Merged records with no display name.
    pub missing_name: usize,
}

impl MergeStats {
    /// Compute overlap statistics for a merge of `graph` and `indexed`.
    pub fn compute(
        graph: &[UserRecord],
        indexed: &[UserRecord],
        merged: &HashMap<String, UserRecord>,
    ) -> Self {
        let graph_emails: HashSet<&str> = graph.iter().map(|u| u.email.as_str()).collect();
        let indexed_emails: HashSet<&str> = indexed.iter().map(|u| u.email.as_str()).collect();

        Self {
            total: merged.len(),
            graph_only: graph_emails.difference(&indexed_emails).count(),
            indexed_only: indexed_emails.difference(&graph_emails).count(),
            matched: graph_emails.intersection(&indexed_emails).count(),
            missing_name: merged.values().filter(|u| !u.has_display_name()).count(),
        }
    }
}

/// Emails of merged records that would be notified without a display name.
pub fn nameless_recipients(merged: &HashMap<String, UserRecord>) -> Vec<&str> {
    let mut emails: Vec<&str> = merged
        .values()
        .filter(|u| !u.has_display_name())
        .map(|u| u.email.as_str())
        .collect();
    emails.sort_unstable();
    emails
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(email: &str, seen: u32) -> UserRecord {
        UserRecord {
            email: email.to_string(),
            seen_count: seen,
            ..Default::default()
        }
    }

    #[test]
    fn test_reconcile_scenario() {
        let graph = vec![UserRecord::from_graph("alice@x.com", "Alice", 3)];
        let idx = vec![indexed("alice@x.com", 2), indexed("bob@x.com", 1)];

        let merged = reconcile(&graph, &idx);

        assert_eq!(merged.len(), 2);
        let alice = &merged["alice@x.com"];
        assert_eq!(
            (alice.full_name.as_str(), alice.request_count, alice.seen_count),
            ("Alice", 3, 2)
        );
        let bob = &merged["bob@x.com"];
        assert_eq!(
            (bob.full_name.as_str(), bob.request_count, bob.seen_count),
            ("", 0, 1)
        );
    }

    #[test]
    fn test_disjoint_sources_keep_fields() {
        let graph = vec![
            UserRecord::from_graph("a@x.com", "A", 1),
            UserRecord::from_graph("b@x.com", "B", 2),
        ];
        let idx = vec![indexed("c@x.com", 4), indexed("d@x.com", 5)];

        let merged = reconcile(&graph, &idx);

        assert_eq!(merged.len(), 4);
        for user in graph.iter().chain(idx.iter()) {
            assert_eq!(merged.get(&user.email), Some(user));
        }
    }

    #[test]
    fn test_seen_counts_accumulate_and_graph_wins() {
        let graph = vec![UserRecord::from_graph("a@x.com", "A", 7)];
        let idx = vec![
            UserRecord {
                email: "a@x.com".to_string(),
                full_name: "Other".to_string(),
                request_count: 99,
                seen_count: 1,
            },
            indexed("a@x.com", 2),
            indexed("a@x.com", 3),
        ];

        let merged = reconcile(&graph, &idx);

        let a = &merged["a@x.com"];
        assert_eq!(a.full_name, "A");
        assert_eq!(a.request_count, 7);
        assert_eq!(a.seen_count, 6);
    }

    #[test]
    fn test_indexed_only_duplicates_accumulate() {
        let idx = vec![indexed("z@x.com", 1), indexed("z@x.com", 1)];
        let merged = reconcile(&[], &idx);
        assert_eq!(merged["z@x.com"].seen_count, 2);
    }

    #[test]
    fn test_email_case_is_preserved() {
        let graph = vec![UserRecord::from_graph("Alice@x.com", "Alice", 1)];
        let idx = vec![indexed("alice@x.com", 1)];
        let merged = reconcile(&graph, &idx);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(reconcile(&[], &[]).is_empty());

        let graph = vec![UserRecord::from_graph("a@x.com", "A", 1)];
        let merged = reconcile(&graph, &[]);
        assert_eq!(merged.get("a@x.com"), Some(&graph[0]));

        let idx = vec![indexed("b@x.com", 2)];
        let merged = reconcile(&[], &idx);
        assert_eq!(merged.get("b@x.com"), Some(&idx[0]));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let graph = vec![
            UserRecord::from_graph("a@x.com", "A", 1),
            UserRecord::from_graph("b@x.com", "B", 2),
        ];
        let idx = vec![indexed("a@x.com", 3), indexed("c@x.com", 1)];

        assert_eq!(reconcile(&graph, &idx), reconcile(&graph, &idx));
    }

    #[test]
    fn test_seen_count_saturates() {
        let idx = vec![indexed("a@x.com", u32::MAX), indexed("a@x.com", 5)];
        let merged = reconcile(&[], &idx);
        assert_eq!(merged["a@x.com"].seen_count, u32::MAX);
    }

    #[test]
    fn test_merge_stats() {
        let graph = vec![
            UserRecord::from_graph("alice@x.com", "Alice", 3),
            UserRecord::from_graph("carol@x.com", "Carol", 1),
        ];
        let idx = vec![indexed("alice@x.com", 2), indexed("bob@x.com", 1)];
        let merged = reconcile(&graph, &idx);

        let stats = MergeStats::compute(&graph, &idx, &merged);
        assert_eq!(
            stats,
            MergeStats {
                total: 3,
                graph_only: 1,
                indexed_only: 1,
                matched: 1,
                missing_name: 1,
            }
        );
        assert_eq!(nameless_recipients(&merged), vec!["bob@x.com"]);
    }
}
