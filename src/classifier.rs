//! Request classification: abort-or-allow plus report-or-suppress.

use serde::Serialize;

use crate::pattern::{RequestTarget, ResourceRule, DEFAULT_RULES};
use crate::RequestDescriptor;

/// Why a request was blocked or suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationReason {
    None,
    TrackingDomain,
    TrackingScript,
    CosmeticExtension,
    CosmeticContentType,
    DataUri,
}

/// Verdict for a single outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationDecision {
    /// Whether the engine may proceed with the request
    pub allow: bool,
    /// Whether the request is emitted as a reported event
    pub report: bool,
    pub reason: ClassificationReason,
}

/// Applies an ordered rule table to outbound requests.
///
/// `classify` is total and pure: the same descriptor always yields the same
/// decision and nothing is emitted from here.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    rules: Vec<ResourceRule>,
}

impl Default for RequestClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl RequestClassifier {
    pub fn new(rules: Vec<ResourceRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ResourceRule] {
        &self.rules
    }

    pub fn classify(&self, req: &RequestDescriptor) -> ClassificationDecision {
        let target = RequestTarget::from_request(req);

        // Any "data" substring suppresses reporting, not only the data: scheme.
        let report = !target.url.contains("data");

        match self.rules.iter().find(|rule| rule.matches(&target)) {
            Some(rule) => ClassificationDecision {
                allow: false,
                report,
                reason: rule.reason(),
            },
            None => ClassificationDecision {
                allow: true,
                report,
                reason: if report {
                    ClassificationReason::None
                } else {
                    ClassificationReason::DataUri
                },
            },
        }
    }
}
