use std::path::{Path, PathBuf};

/// Deterministic pseudo-random bytes; the same seed gives the same output.
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;
    for chunk in data.chunks_mut(8) {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let bytes = state.to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
    data
}

/// Write a chunk file named `name` into `dir` and return its path.
pub async fn write_chunk(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    tokio::fs::create_dir_all(dir).await.unwrap();
    let path = dir.join(name);
    tokio::fs::write(&path, body).await.unwrap();
    path
}
