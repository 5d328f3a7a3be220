//! Content addressing for Snapshots.
//!
//! A Snapshot's identity is the SHA-256 of the canonical JSON encoding of its
//! component pairs, sorted by (name, image). Two component lists describing
//! the same set therefore produce the same digest and the same name.

use snapgate_state::{ContentDigest, SnapshotComponent};

/// Canonical JSON of `components`: pairs sorted, compact encoding.
pub fn canonical_components(components: &[SnapshotComponent]) -> String {
    let mut sorted: Vec<&SnapshotComponent> = components.iter().collect();
    sorted.sort();
    sorted.dedup();
    let pairs: Vec<serde_json::Value> = sorted
        .into_iter()
        .map(|c| serde_json::json!([c.name, c.container_image]))
        .collect();
    serde_json::Value::Array(pairs).to_string()
}

/// Digest identifying the component combination.
pub fn snapshot_digest(components: &[SnapshotComponent]) -> ContentDigest {
    ContentDigest::from_bytes(canonical_components(components).as_bytes())
}

/// Deterministic Snapshot name: `<application>-<short digest>`.
pub fn snapshot_name(application: &str, digest: &ContentDigest) -> String {
    format!("{}-{}", application, digest.short())
}
