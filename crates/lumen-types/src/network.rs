//! Network capture model.
//!
//! A [`NetworkRecord`] is one request observed during a pass, assembled from
//! the `Network.*` event stream by the gather scheduler. Timestamps are in
//! seconds on the wire-protocol monotonic clock; sizes are bytes on the wire
//! (post-compression transfer size, not resource size).

use serde::{Deserialize, Serialize};

/// Coarse resource classification, derived from the protocol's `type` field
/// on `Network.responseReceived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Script,
    Image,
    Font,
    Xhr,
    Fetch,
    Other,
}

impl ResourceType {
    /// Parse the protocol's `type` string. Unknown kinds fold into `Other`.
    pub fn from_protocol(kind: &str) -> Self {
        match kind {
            "Document" => ResourceType::Document,
            "Stylesheet" => ResourceType::Stylesheet,
            "Script" => ResourceType::Script,
            "Image" => ResourceType::Image,
            "Font" => ResourceType::Font,
            "XHR" => ResourceType::Xhr,
            "Fetch" => ResourceType::Fetch,
            _ => ResourceType::Other,
        }
    }
}

/// Network loading priority as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourcePriority {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ResourcePriority {
    pub fn from_protocol(priority: &str) -> Self {
        match priority {
            "VeryHigh" => ResourcePriority::VeryHigh,
            "High" => ResourcePriority::High,
            "Medium" => ResourcePriority::Medium,
            "VeryLow" => ResourcePriority::VeryLow,
            _ => ResourcePriority::Low,
        }
    }
}

/// One observed network request, from `requestWillBeSent` through
/// `loadingFinished`/`loadingFailed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub request_id: String,
    pub url: String,
    /// URL scheme (`https`, `http`, `data`, ...), split out once so
    /// consumers don't re-parse the URL.
    pub scheme: String,
    pub resource_type: ResourceType,
    pub priority: ResourcePriority,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Bytes on the wire. Zero for cache hits.
    pub transfer_size: u64,
    pub start_time: f64,
    #[serde(default)]
    pub response_received_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    pub finished: bool,
    pub failed: bool,
    pub from_cache: bool,
    /// Request id of the initiating request, when the browser reported one.
    /// Links records into dependency chains.
    #[serde(default)]
    pub initiator_id: Option<String>,
}

impl NetworkRecord {
    /// Whether this record carries measurable transfer activity: finished
    /// successfully over a real scheme with bytes on the wire.
    pub fn is_measurable(&self) -> bool {
        self.finished
            && !self.failed
            && self.scheme != "data"
            && self.status_code.map_or(true, |code| code <= 300)
            && self.transfer_size > 0
    }

    /// Whether the request used a secure transport.
    pub fn is_secure(&self) -> bool {
        matches!(self.scheme.as_str(), "https" | "wss" | "data")
    }
}

/// Extract the scheme from a URL without pulling in a full URL parser.
pub fn url_scheme(url: &str) -> &str {
    url.split_once(':').map(|(scheme, _)| scheme).unwrap_or("")
}
