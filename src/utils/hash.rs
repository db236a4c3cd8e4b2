use xxhash_rust::xxh3::Xxh3;

/// Content checksum for a chunk payload. Used to detect corrupted or
/// duplicate transmissions, not as a cryptographic digest.
pub fn chunk_checksum(data: &[u8]) -> String {
    let mut hasher = Xxh3::new();
    hasher.update(data);
    format!("{:032x}", hasher.digest128())
}
