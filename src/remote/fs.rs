//! File-system operations over the channel's transfer session.

use crate::error::Result;
use crate::transport::FileTransfer;

/// Thin file-system adapter bound to one open channel.
///
/// Every operation can fail with a `Transport` error, which callers must
/// treat as "cannot determine state" — never as "file absent".
pub struct RemoteFileSystem {
    transfer: Box<dyn FileTransfer>,
}

impl RemoteFileSystem {
    pub fn new(transfer: Box<dyn FileTransfer>) -> Self {
        Self { transfer }
    }

    /// Read an entire remote file.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        tracing::trace!("remote read {}", path);
        self.transfer.read(path)
    }

    /// Create or overwrite a remote file.
    pub fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        tracing::trace!("remote write {} ({} bytes)", path, bytes.len());
        self.transfer.write(path, bytes)
    }

    /// Whether a remote path exists.
    pub fn exists(&self, path: &str) -> Result<bool> {
        self.transfer.exists(path)
    }

    /// List the entries of a remote directory.
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        self.transfer.list(path)
    }

    /// Create a remote directory and any missing parents.
    pub fn mkdir_all(&self, path: &str) -> Result<()> {
        tracing::trace!("remote mkdir -p {}", path);
        self.transfer.mkdir_all(path)
    }
}
