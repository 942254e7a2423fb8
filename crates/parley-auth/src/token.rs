use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Issued tokens expire 30 days after issuance.
pub const TOKEN_TTL_DAYS: i64 = 30;

/// Fixed header segment; the wire format is the compact JWS form the legacy
/// backend mints, so tokens are interchangeable between the two.
const HEADER_JSON: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

/// Claim set carried by a token. Entirely self-contained: signature plus
/// clock decide validity, no session table involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub exp: i64,
}

/// Uniform verification failure. Malformed, tampered and expired tokens all
/// collapse to this one value so callers cannot build an oracle out of the
/// distinction.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid token")]
pub struct InvalidToken;

/// Signs and verifies the three-segment bearer credential:
/// `base64url(header).base64url(claims).base64url(hmac_sha256)`, each segment
/// encoded without padding.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Issue a token for the given identity, expiring [`TOKEN_TTL_DAYS`]
    /// from now.
    pub fn issue(&self, user_id: i64, username: &str) -> anyhow::Result<String> {
        let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp();
        self.issue_at(user_id, username, exp)
    }

    fn issue_at(&self, user_id: i64, username: &str, exp: i64) -> anyhow::Result<String> {
        let claims = Claims {
            user_id,
            username: username.to_string(),
            exp,
        };

        let header = B64.encode(HEADER_JSON);
        let payload = B64.encode(serde_json::to_vec(&claims)?);
        let signature = B64.encode(self.sign(&header, &payload)?.finalize().into_bytes());

        Ok(format!("{header}.{payload}.{signature}"))
    }

    /// Check signature and expiry, returning the embedded claims.
    ///
    /// The signature is recomputed over the received header and payload
    /// segments exactly as transmitted, then compared in constant time.
    pub fn verify(&self, token: &str) -> Result<Claims, InvalidToken> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(InvalidToken);
        };

        let sig_bytes = B64.decode(signature).map_err(|_| InvalidToken)?;
        self.sign(header, payload)
            .map_err(|_| InvalidToken)?
            .verify_slice(&sig_bytes)
            .map_err(|_| InvalidToken)?;

        let payload_bytes = B64.decode(payload).map_err(|_| InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&payload_bytes).map_err(|_| InvalidToken)?;

        if claims.exp < Utc::now().timestamp() {
            return Err(InvalidToken);
        }

        Ok(claims)
    }

    fn sign(&self, header: &str, payload: &str) -> anyhow::Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}
