//! Install payload resolution and integrity.
//!
//! The default payload ships inside the sherpa binary; alternatives come
//! from a local file or a URL fetched at startup. Resolved payloads carry
//! their SHA-256 digest, which the installer checks after upload.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use include_dir::{include_dir, Dir};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Payload files compiled into the binary.
static PAYLOAD_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/payload");

/// Name of the embedded installer script.
const EMBEDDED_FILE: &str = "install.sh";

/// Where the install payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// The payload compiled into the sherpa binary.
    Embedded,

    /// A local file shipped as-is.
    File(PathBuf),

    /// A payload fetched over HTTP(S) at startup.
    Url(String),
}

impl PayloadSource {
    /// Resolve the source into payload bytes.
    pub fn resolve(&self) -> Result<Payload> {
        match self {
            PayloadSource::Embedded => {
                let file = PAYLOAD_DIR
                    .get_file(EMBEDDED_FILE)
                    .ok_or_else(|| anyhow!("embedded payload '{}' missing", EMBEDDED_FILE))?;
                Ok(Payload {
                    file_name: EMBEDDED_FILE.to_string(),
                    bytes: file.contents().to_vec(),
                })
            }
            PayloadSource::File(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("reading payload file {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "payload".to_string());
                Ok(Payload { file_name, bytes })
            }
            PayloadSource::Url(url) => {
                let response = reqwest::blocking::get(url)
                    .with_context(|| format!("fetching payload from {}", url))?;
                if !response.status().is_success() {
                    return Err(anyhow!("HTTP {} fetching {}", response.status(), url).into());
                }
                let bytes = response
                    .bytes()
                    .with_context(|| format!("reading payload body from {}", url))?
                    .to_vec();
                Ok(Payload {
                    file_name: url_file_name(url),
                    bytes,
                })
            }
        }
    }
}

/// A resolved install payload.
#[derive(Debug, Clone)]
pub struct Payload {
    /// File name the payload is uploaded under.
    pub file_name: String,

    /// Payload contents.
    pub bytes: Vec<u8>,
}

impl Payload {
    /// Hex-encoded SHA-256 digest of the payload bytes.
    pub fn digest(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

/// Hex-encoded SHA-256 digest of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn url_file_name(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("payload")
        .to_string()
}
