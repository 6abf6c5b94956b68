//! Shared auth and signing helpers for the listening transports.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Checks a client-supplied credential against the configured token.
/// An empty configured token disables authentication. Clients may send
/// the token as `Authorization: Bearer <t>` / `Authorization: Token
/// <t>` or as an `access_token` query parameter.
pub fn token_allows(required: &str, header: Option<&str>, query: Option<&str>) -> bool {
    if required.is_empty() {
        return true;
    }
    if let Some(header) = header {
        let provided = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("Token "))
            .unwrap_or(header);
        if provided == required {
            return true;
        }
    }
    matches!(query, Some(provided) if provided == required)
}

/// HMAC-SHA256 signature header value for an outbound webhook body.
pub fn sign_payload(secret: &str, body: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .context("failed to initialize webhook signer")?;
    mac.update(body.as_bytes());
    Ok(format!("sha256={}", hex_lower(&mac.finalize().into_bytes())))
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
