//! Blocklist of tracking and cosmetic resources.
//!
//! The rules are plain data so the table can be inspected and extended
//! independently of the matcher. Matching is case-insensitive throughout;
//! callers hand in a [`RequestTarget`] whose fields are already lowercased.

use url::Url;

use crate::classifier::ClassificationReason;
use crate::RequestDescriptor;

/// A single blocklist rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRule {
    /// The request host is this domain or one of its subdomains.
    DomainSuffix(&'static str),
    /// The URL contains this tracking script name or path fragment.
    ScriptName(&'static str),
    /// The URL path ends with `.<ext>`.
    Extension(&'static str),
    /// The request's content type equals this value.
    ContentType(&'static str),
}

/// Analytics, click-tracking and heat-mapping hosts.
pub const TRACKING_DOMAINS: &[&str] = &[
    "google-analytics.com",
    "getclicky.com",
    "statcounter.com",
    "mxpnl.com",
    "mixpanel.com",
    "foxmetrics.com",
    "kissmetrics.com",
    "woopra.com",
    "reinvigorate.net",
    "webtrendslive.com",
    "webtrends.com",
    "chartbeat.com",
];

/// Self-hosted tracker scripts that can live on any host.
pub const TRACKING_SCRIPTS: &[&str] = &[
    "webtrends.js",
    "owa.tracker-combined-min.js",
    "/mint/?js",
    "piwik.js",
    "chartbeat.js",
];

pub const COSMETIC_EXTENSIONS: &[&str] = &["css", "jpg", "png", "gif"];

pub const COSMETIC_CONTENT_TYPES: &[&str] = &["text/css"];

/// The default rule table, in evaluation order.
pub const DEFAULT_RULES: &[ResourceRule] = &[
    ResourceRule::DomainSuffix("google-analytics.com"),
    ResourceRule::DomainSuffix("getclicky.com"),
    ResourceRule::DomainSuffix("statcounter.com"),
    ResourceRule::DomainSuffix("mxpnl.com"),
    ResourceRule::DomainSuffix("mixpanel.com"),
    ResourceRule::DomainSuffix("foxmetrics.com"),
    ResourceRule::DomainSuffix("kissmetrics.com"),
    ResourceRule::DomainSuffix("woopra.com"),
    ResourceRule::DomainSuffix("reinvigorate.net"),
    ResourceRule::DomainSuffix("webtrendslive.com"),
    ResourceRule::DomainSuffix("webtrends.com"),
    ResourceRule::DomainSuffix("chartbeat.com"),
    ResourceRule::ScriptName("webtrends.js"),
    ResourceRule::ScriptName("owa.tracker-combined-min.js"),
    ResourceRule::ScriptName("/mint/?js"),
    ResourceRule::ScriptName("piwik.js"),
    ResourceRule::ScriptName("chartbeat.js"),
    ResourceRule::Extension("css"),
    ResourceRule::Extension("jpg"),
    ResourceRule::Extension("png"),
    ResourceRule::Extension("gif"),
    ResourceRule::ContentType("text/css"),
];

/// Lowercased view of the parts of a request the rules look at.
#[derive(Debug, Clone)]
pub struct RequestTarget {
    pub url: String,
    pub host: Option<String>,
    pub path: String,
    pub content_type: Option<String>,
}

impl RequestTarget {
    pub fn from_request(req: &RequestDescriptor) -> Self {
        let url = req.url.to_ascii_lowercase();
        let (host, path) = match Url::parse(&url) {
            Ok(parsed) => (
                parsed.host_str().map(|h| h.trim_end_matches('.').to_string()),
                parsed.path().to_string(),
            ),
            // Relative or otherwise unparsable: no host, path is everything
            // before the query/fragment.
            Err(_) => (None, strip_query_fragment(&url).to_string()),
        };
        // Compare the media type only; parameters like charset are dropped.
        let content_type = req
            .content_type()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());
        Self {
            url,
            host,
            path,
            content_type,
        }
    }

    /// Extension of the last path segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let segment = self.path.rsplit('/').next().unwrap_or("");
        segment.rsplit_once('.').map(|(_, ext)| ext)
    }
}

fn strip_query_fragment(s: &str) -> &str {
    match s.find(|c| c == '?' || c == '#') {
        Some(idx) => &s[..idx],
        None => s,
    }
}

impl ResourceRule {
    pub fn matches(&self, target: &RequestTarget) -> bool {
        match *self {
            ResourceRule::DomainSuffix(domain) => target.host.as_deref().is_some_and(|host| {
                host == domain
                    || (host.ends_with(domain)
                        && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
            }),
            ResourceRule::ScriptName(name) => target.url.contains(name),
            ResourceRule::Extension(ext) => target.extension() == Some(ext),
            ResourceRule::ContentType(ct) => target.content_type.as_deref() == Some(ct),
        }
    }

    pub fn reason(&self) -> ClassificationReason {
        match self {
            ResourceRule::DomainSuffix(_) => ClassificationReason::TrackingDomain,
            ResourceRule::ScriptName(_) => ClassificationReason::TrackingScript,
            ResourceRule::Extension(_) => ClassificationReason::CosmeticExtension,
            ResourceRule::ContentType(_) => ClassificationReason::CosmeticContentType,
        }
    }
}
