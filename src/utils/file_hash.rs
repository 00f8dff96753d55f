use crate::model::error::Error;
use crate::model::error::io::IOError;
use crate::model::error::system::SystemError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Streaming SHA-256 of a file, hex-encoded. Runs on the blocking pool so
/// large artifacts do not stall the scheduler.
pub async fn sha256(path: &Path) -> Result<String, Error> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = File::open(&path).map_err(|err| IOError::ReadFileFailed {
            path: path.clone(),
            source: err,
        })?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 65536];
        loop {
            let bytes_read = file.read(&mut buffer).map_err(|err| IOError::ReadFileFailed {
                path: path.clone(),
                source: err,
            })?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(SystemError::ThreadPanic)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"abc").unwrap();
        let digest = sha256(&path).await.unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = sha256(&dir.path().join("absent")).await;
        assert!(result.is_err());
    }
}
