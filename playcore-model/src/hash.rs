use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Serializes `value` to JSON with keys sorted at every object level,
/// so that two structurally-identical values always produce
/// byte-identical output regardless of field declaration order or
/// hash-map iteration order.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let raw = serde_json::to_value(value)?;
    let sorted = sort_value(raw);
    serde_json::to_string(&sorted)
}

fn sort_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_value).collect())
        }
        other => other,
    }
}

/// SHA-256 of `value`'s [`canonical_json`] encoding, hex-encoded.
///
/// Used for the Play content hash and any other artifact that needs a
/// reproducible identity derived from its logical content rather than
/// its serialized byte layout.
pub fn content_hash<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let canonical = canonical_json(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(hex::encode(digest))
}

/// A short, stable identifier derived from the hashes/strings of a
/// run's defining inputs: `short_hash(play_hash || window || symbol)`.
pub fn short_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
