//! Secret redaction for signing keys and RPC endpoints.
//!
//! Use [`Redacted`] to wrap values that must never appear in logs, error messages,
//! or serialized output. Hosted RPC endpoints frequently embed an API key in the
//! path or query string; log them through [`mask_url`], which keeps only the
//! scheme and host.

use std::fmt::{self, Debug, Display};

use url::Url;

/// Wrapper that redacts its inner value when formatted or serialized.
///
/// # Example
///
/// ```ignore
/// use helix_chain::redact::Redacted;
///
/// let signer = Redacted(std::env::var("SIGNER")?);
/// tracing::debug!(signer = %signer, "Loaded signer");
/// // Logs: signer = <redacted>
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Access the wrapped secret.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}

/// Reduce an endpoint URL to `scheme://host[:port]`, appending `/...` when a
/// path or query was dropped. Unparseable input is fully redacted.
pub fn mask_url(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return "<redacted>".to_string();
    };
    let Some(host) = url.host_str() else {
        return "<redacted>".to_string();
    };

    let mut masked = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        masked.push_str(&format!(":{}", port));
    }
    let has_path = !matches!(url.path(), "" | "/");
    if has_path || url.query().is_some() {
        masked.push_str("/...");
    }
    masked
}
