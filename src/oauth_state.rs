//! OAuth state token codec
//!
//! The `state` round-tripped through the vendor authorize redirect is an
//! HMAC-SHA256 authenticated token. The signed payload is
//! `provider:platform:user_id:nonce`; the wire format is
//! `base64url(payload).base64url(tag)`. A state that fails the signature
//! check, or whose payload has fewer than four colon-separated segments, is
//! rejected before anything else happens with the callback.

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::providers::ProviderKind;

type HmacSha256 = Hmac<Sha256>;

/// Client platform that initiated the OAuth flow, inferred from the redirect
/// target: custom (non-HTTP) schemes are app deep links, so they mark mobile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Mobile,
}

impl Platform {
    pub fn from_redirect_url(redirect_url: Option<&str>) -> Self {
        let Some(raw) = redirect_url else {
            return Self::Web;
        };

        match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Self::Web,
            Ok(_) => Self::Mobile,
            Err(_) => Self::Web,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Mobile => "mobile",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = StateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "web" => Ok(Self::Web),
            "mobile" => Ok(Self::Mobile),
            other => Err(StateError::MalformedPayload {
                message: format!("unknown platform '{}'", other),
            }),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from state encoding or decoding.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state token is malformed")]
    MalformedToken,
    #[error("state token signature mismatch")]
    SignatureMismatch,
    #[error("state payload is malformed: {message}")]
    MalformedPayload { message: String },
}

/// Decoded contents of a state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    pub provider: ProviderKind,
    pub platform: Platform,
    pub user_id: Uuid,
    pub nonce: String,
}

/// Encoder/decoder for authenticated state tokens, keyed with the
/// `CALAPI_STATE_SIGNING_KEY` secret.
#[derive(Clone)]
pub struct OAuthStateCodec {
    signing_key: Vec<u8>,
}

impl std::fmt::Debug for OAuthStateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthStateCodec")
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

impl OAuthStateCodec {
    pub fn new(signing_key: &str) -> Self {
        Self {
            signing_key: signing_key.as_bytes().to_vec(),
        }
    }

    /// Encodes a fresh state token for the given flow.
    pub fn encode(
        &self,
        provider: ProviderKind,
        platform: Platform,
        user_id: &Uuid,
    ) -> Result<String, StateError> {
        let nonce = generate_nonce();
        let payload = format!("{}:{}:{}:{}", provider, platform, user_id, nonce);
        let tag = self.sign(payload.as_bytes())?;

        Ok(format!(
            "{}.{}",
            base64_url::encode(payload.as_bytes()),
            base64_url::encode(&tag)
        ))
    }

    /// Decodes and authenticates a state token.
    pub fn decode(&self, token: &str) -> Result<OAuthState, StateError> {
        let (payload_part, tag_part) = token.split_once('.').ok_or(StateError::MalformedToken)?;

        let payload = base64_url::decode(payload_part).map_err(|_| StateError::MalformedToken)?;
        let provided_tag = base64_url::decode(tag_part).map_err(|_| StateError::MalformedToken)?;

        let expected_tag = self.sign(&payload)?;
        let expected_bytes: &[u8] = expected_tag.as_ref();
        let authentic: bool =
            subtle::ConstantTimeEq::ct_eq(expected_bytes, &provided_tag[..]).into();
        if !authentic {
            return Err(StateError::SignatureMismatch);
        }

        let payload = String::from_utf8(payload).map_err(|_| StateError::MalformedToken)?;
        Self::parse_payload(&payload)
    }

    fn parse_payload(payload: &str) -> Result<OAuthState, StateError> {
        let segments: Vec<&str> = payload.splitn(4, ':').collect();
        if segments.len() < 4 {
            return Err(StateError::MalformedPayload {
                message: format!("expected 4 segments, got {}", segments.len()),
            });
        }

        let provider: ProviderKind =
            segments[0]
                .parse()
                .map_err(|_| StateError::MalformedPayload {
                    message: format!("unknown provider '{}'", segments[0]),
                })?;
        let platform: Platform = segments[1].parse()?;
        let user_id: Uuid = segments[2]
            .parse()
            .map_err(|_| StateError::MalformedPayload {
                message: "user_id is not a valid UUID".to_string(),
            })?;

        Ok(OAuthState {
            provider,
            platform,
            user_id,
            nonce: segments[3].to_string(),
        })
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, StateError> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|_| StateError::SignatureMismatch)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
