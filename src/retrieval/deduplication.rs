//! Result deduplication by time window

use std::collections::HashMap;

/// Start times closer than this (seconds) are treated as the same span
pub const DEFAULT_DEDUP_EPSILON: f64 = 0.001;

/// Collapse candidates that point at effectively the same time in the same
/// document, keeping the highest-scored instance of each cluster
///
/// Within a document, candidates are walked in start-time order; one is a
/// duplicate of the last kept candidate when their start times differ by at
/// most `epsilon`. Candidates from different documents never merge.
///
/// # Returns
/// Per-document groups in first-seen document order, each sorted by start
/// time ascending. The output is not sorted by score.
pub fn deduplicate<T, K, S>(candidates: Vec<T>, key_fn: K, score_fn: S, epsilon: f64) -> Vec<T>
where
    K: Fn(&T) -> (&str, f64),
    S: Fn(&T) -> f64,
{
    let total = candidates.len();
    let mut document_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<T>> = HashMap::new();

    for candidate in candidates {
        let document_id = key_fn(&candidate).0;
        match groups.get_mut(document_id) {
            Some(group) => group.push(candidate),
            None => {
                let document_id = document_id.to_string();
                document_order.push(document_id.clone());
                groups.insert(document_id, vec![candidate]);
            }
        }
    }

    let mut deduplicated = Vec::with_capacity(total);

    for document_id in document_order {
        let Some(mut group) = groups.remove(&document_id) else {
            continue;
        };

        group.sort_by(|a, b| key_fn(a).1.total_cmp(&key_fn(b).1));

        let mut kept: Vec<T> = Vec::with_capacity(group.len());
        for candidate in group {
            if let Some(last) = kept.last_mut() {
                if (key_fn(&candidate).1 - key_fn(last).1).abs() <= epsilon {
                    if score_fn(&candidate) > score_fn(last) {
                        *last = candidate;
                    }
                    continue;
                }
            }
            kept.push(candidate);
        }

        deduplicated.extend(kept);
    }

    deduplicated
}
