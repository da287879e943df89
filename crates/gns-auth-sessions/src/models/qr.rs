//! QR Payload
//!
//! A pairing request travels to the approver inside a QR code, either as a
//! versioned JSON object or as a deep link such as
//! `gns://pair?session=...&challenge=...&browser=...&expires=...`.
//! Scanners accept both.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

/// Value of the `type` field of a pairing QR payload.
pub const PAIRING_REQUEST_TYPE: &str = "pairing-request";

/// Current payload version.
pub const QR_PAYLOAD_VERSION: u32 = 1;

/// Versions this build can read.
pub const SUPPORTED_QR_VERSIONS: &[u32] = &[1];

/// JSON form of the QR payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub session_id: String,
    pub challenge: String,
    #[serde(default)]
    pub requester_info: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl QrPayload {
    pub fn new(
        session_id: &str,
        challenge: &str,
        requester_info: &str,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: PAIRING_REQUEST_TYPE.to_string(),
            version: QR_PAYLOAD_VERSION,
            session_id: session_id.to_string(),
            challenge: challenge.to_string(),
            requester_info: Some(requester_info.to_string()),
            expires_at: Some(expires_at),
        }
    }

    /// Serialized JSON, the `qrData` string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Equivalent deep link under `scheme`.
    pub fn to_deep_link(&self, scheme: &str) -> Result<String> {
        let mut link = Url::parse(&format!("{scheme}://pair"))?;
        {
            let mut query = link.query_pairs_mut();
            query
                .append_pair("session", &self.session_id)
                .append_pair("challenge", &self.challenge);
            if let Some(browser) = &self.requester_info {
                query.append_pair("browser", browser);
            }
            if let Some(expires) = self.expires_at {
                query.append_pair("expires", &expires.timestamp_millis().to_string());
            }
        }
        Ok(link.into())
    }
}

/// What a scanner recovers from a QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRequest {
    pub session_id: String,
    pub challenge: String,
    pub requester_info: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PairingRequest {
    /// Whether the embedded expiry, if any, has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Result of parsing scanned QR text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedQr {
    Json(PairingRequest),
    UrlEncoded(PairingRequest),
    Unrecognized,
}

impl ScannedQr {
    pub fn request(&self) -> Option<&PairingRequest> {
        match self {
            ScannedQr::Json(r) | ScannedQr::UrlEncoded(r) => Some(r),
            ScannedQr::Unrecognized => None,
        }
    }

    pub fn into_request(self) -> Option<PairingRequest> {
        match self {
            ScannedQr::Json(r) | ScannedQr::UrlEncoded(r) => Some(r),
            ScannedQr::Unrecognized => None,
        }
    }
}

/// Classify scanned text as a JSON payload, a deep link, or neither.
pub fn parse_scanned(text: &str) -> ScannedQr {
    let text = text.trim();
    if text.starts_with('{') {
        return parse_json(text).map_or(ScannedQr::Unrecognized, ScannedQr::Json);
    }
    parse_url(text).map_or(ScannedQr::Unrecognized, ScannedQr::UrlEncoded)
}

fn parse_json(text: &str) -> Option<PairingRequest> {
    let payload: QrPayload = serde_json::from_str(text).ok()?;
    if payload.kind != PAIRING_REQUEST_TYPE || !SUPPORTED_QR_VERSIONS.contains(&payload.version) {
        return None;
    }
    non_empty(&payload.session_id)?;
    non_empty(&payload.challenge)?;
    Some(PairingRequest {
        session_id: payload.session_id,
        challenge: payload.challenge,
        requester_info: payload.requester_info,
        expires_at: payload.expires_at,
    })
}

fn parse_url(text: &str) -> Option<PairingRequest> {
    let url = Url::parse(text).ok()?;
    let is_pair = url.host_str() == Some("pair")
        || url.path().trim_matches('/').rsplit('/').next() == Some("pair");
    if !is_pair {
        return None;
    }

    let mut session_id = None;
    let mut challenge = None;
    let mut requester_info = None;
    let mut expires_at = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "session" => session_id = Some(value.into_owned()),
            "challenge" => challenge = Some(value.into_owned()),
            "browser" => requester_info = Some(value.into_owned()),
            "expires" => {
                expires_at = value
                    .parse::<i64>()
                    .ok()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            }
            _ => {}
        }
    }

    let session_id = session_id.filter(|s| non_empty(s).is_some())?;
    let challenge = challenge.filter(|s| non_empty(s).is_some())?;
    Some(PairingRequest {
        session_id,
        challenge,
        requester_info,
        expires_at,
    })
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}
