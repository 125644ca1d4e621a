//! Payload sources.

use crate::error::ClientError;
use rand::rngs::OsRng;
use rand::TryRngCore;
use std::path::Path;

/// Generates `len` bytes from the operating system's secure random source.
pub fn random_payload(len: usize) -> Result<Vec<u8>, ClientError> {
    let mut payload = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut payload)
        .map_err(|e| ClientError::Entropy(e.to_string()))?;
    Ok(payload)
}

/// Reads a whole file from disk as one payload.
pub async fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>, ClientError> {
    let path = path.as_ref();
    let payload = tokio::fs::read(path).await?;
    tracing::debug!("Loaded {} bytes from {}", payload.len(), path.display());
    Ok(payload)
}
