use xxhash_rust::xxh3::xxh3_128;

/// Number of hex characters kept from the full digest.
pub const DIGEST_LEN: usize = 8;

/// Full-width xxh3-128 digest, hex encoded (32 chars).
pub fn compute_hash(data: &[u8]) -> String {
    format!("{:032x}", xxh3_128(data))
}

/// Short content digest of a component source and its colocated script.
///
/// An empty colocated script hashes the same as no colocated script.
pub fn compute_digest(source: &str, colocated_script: Option<&str>) -> String {
    let mut hash = match colocated_script {
        Some(script) if !script.is_empty() => {
            let mut bytes = Vec::with_capacity(source.len() + script.len());
            bytes.extend_from_slice(source.as_bytes());
            bytes.extend_from_slice(script.as_bytes());
            compute_hash(&bytes)
        }
        _ => compute_hash(source.as_bytes()),
    };
    hash.truncate(DIGEST_LEN);
    hash
}

/// Integrity signature over a process secret and a props snapshot.
pub fn signature(secret: &str, snapshot: &str) -> String {
    let mut bytes = Vec::with_capacity(secret.len() + snapshot.len());
    bytes.extend_from_slice(secret.as_bytes());
    bytes.extend_from_slice(snapshot.as_bytes());
    compute_hash(&bytes)
}
