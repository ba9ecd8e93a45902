//! Chef authentication protocol (version 1.3) request signing.
//!
//! Every request to the Chef Infra Server carries a set of `X-Ops-*` headers.
//! The canonical request is:
//!
//! ```text
//! Method:GET
//! Path:/organizations/acme/nodes
//! X-Ops-Content-Hash:<base64(sha256(body))>
//! X-Ops-Sign:version=1.3
//! X-Ops-Timestamp:2024-01-01T00:00:00Z
//! X-Ops-UserId:<client name>
//! X-Ops-Server-API-Version:1
//! ```
//!
//! signed with RSA PKCS#1 v1.5 over SHA-256, base64-encoded and split across
//! numbered `X-Ops-Authorization-N` headers of at most 60 characters.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};

use super::ClientError;

/// Protocol version advertised in `X-Ops-Sign`.
const SIGN_VERSION: &str = "1.3";

/// Chef server API version sent with every request.
pub const SERVER_API_VERSION: &str = "1";

/// Width of each `X-Ops-Authorization-N` header value.
const AUTH_CHUNK: usize = 60;

/// Read key material from `path_or_inline`.
///
/// A value containing `-----BEGIN` is taken as inline PEM; anything else is
/// treated as a filesystem path.
pub fn load_key_material(path_or_inline: &str) -> Result<String, ClientError> {
    if path_or_inline.contains("-----BEGIN") {
        tracing::debug!("using inline key material");
        return Ok(path_or_inline.to_string());
    }
    let pem = std::fs::read_to_string(path_or_inline)
        .map_err(|e| ClientError::Key(format!("read key file '{path_or_inline}': {e}")))?;
    tracing::debug!(path = %path_or_inline, "loaded key file");
    Ok(pem)
}

/// Signs requests on behalf of one Chef client identity.
#[derive(Clone)]
pub struct RequestSigner {
    user: String,
    key: SigningKey<Sha256>,
}

impl RequestSigner {
    /// Build a signer from a PEM-encoded RSA key (PKCS#1 or PKCS#8).
    pub fn from_pem(user: &str, pem: &str) -> Result<Self, ClientError> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| ClientError::Key(format!("parse private key: {e}")))?;
        Ok(Self {
            user: user.to_string(),
            key: SigningKey::<Sha256>::new(key),
        })
    }

    /// The client name placed in `X-Ops-Userid`.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Produce the full set of authentication headers for one request.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let content_hash = BASE64.encode(Sha256::digest(body));
        let timestamp = timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let canonical =
            canonical_request(method, path, &content_hash, &timestamp, &self.user);
        let signature = BASE64.encode(self.key.sign(canonical.as_bytes()).to_bytes());

        let mut headers = vec![
            (
                "X-Ops-Sign".to_string(),
                format!("algorithm=sha256;version={SIGN_VERSION}"),
            ),
            ("X-Ops-Userid".to_string(), self.user.clone()),
            ("X-Ops-Timestamp".to_string(), timestamp),
            ("X-Ops-Content-Hash".to_string(), content_hash),
            (
                "X-Ops-Server-API-Version".to_string(),
                SERVER_API_VERSION.to_string(),
            ),
        ];
        for (i, chunk) in signature.as_bytes().chunks(AUTH_CHUNK).enumerate() {
            headers.push((
                format!("X-Ops-Authorization-{}", i + 1),
                String::from_utf8_lossy(chunk).into_owned(),
            ));
        }
        headers
    }
}

/// The newline-joined string that gets signed.
pub fn canonical_request(
    method: &str,
    path: &str,
    content_hash: &str,
    timestamp: &str,
    user: &str,
) -> String {
    format!(
        "Method:{}\nPath:{}\nX-Ops-Content-Hash:{}\nX-Ops-Sign:version={}\nX-Ops-Timestamp:{}\nX-Ops-UserId:{}\nX-Ops-Server-API-Version:{}",
        method.to_ascii_uppercase(),
        path,
        content_hash,
        SIGN_VERSION,
        timestamp,
        user,
        SERVER_API_VERSION,
    )
}

#[cfg(test)]
pub(crate) const TEST_KEY_PEM: &str = include_str!("testdata/client.pem");
