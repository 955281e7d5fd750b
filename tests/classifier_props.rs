//! Classification behavior over the default rule table

use rfextract::pattern::{COSMETIC_EXTENSIONS, TRACKING_DOMAINS, TRACKING_SCRIPTS};
use rfextract::{ClassificationReason, RequestClassifier, RequestDescriptor};

fn get(url: &str) -> RequestDescriptor {
    RequestDescriptor::new("GET", url)
}

const SAMPLE_URLS: &[&str] = &[
    "",
    "not a url",
    "http://example.com/",
    "https://example.com/api/items.json",
    "http://www.google-analytics.com/ga.js",
    "https://cdn.example.com/piwik.js?x=1",
    "http://example.com/a/b/c.PNG#top",
    "http://example.com/style.css?v=1",
    "data:image/png;base64,iVBORw0KGgo=",
    "http://example.com/DATA/feed",
    "http://example.com/cssfile",
    "http://example.com/image.png/view",
];

#[test]
fn classification_is_total_and_repeatable() {
    let classifier = RequestClassifier::default();
    for url in SAMPLE_URLS {
        let req = get(url);
        let first = classifier.classify(&req);
        let second = classifier.classify(&req);
        assert_eq!(first, second, "{}", url);
    }
}

#[test]
fn every_tracking_domain_is_blocked_on_both_schemes() {
    let classifier = RequestClassifier::default();
    for domain in TRACKING_DOMAINS {
        for url in [
            format!("http://{}/collect", domain),
            format!("https://www.{}/collect", domain),
            format!("HTTP://STATIC.{}/x", domain.to_uppercase()),
        ] {
            let d = classifier.classify(&get(&url));
            assert!(!d.allow, "{}", url);
            assert!(d.report, "{}", url);
            assert_eq!(d.reason, ClassificationReason::TrackingDomain, "{}", url);
        }
    }
}

#[test]
fn lookalike_hosts_are_not_tracking_domains() {
    let classifier = RequestClassifier::default();
    for url in [
        "http://notgoogle-analytics.com/x",
        "http://google-analytics.com.example.org/x",
        "http://example.com/google-analytics.com",
    ] {
        let d = classifier.classify(&get(url));
        assert!(d.allow, "{}", url);
    }
}

#[test]
fn tracking_scripts_are_blocked_on_any_host() {
    let classifier = RequestClassifier::default();
    for script in TRACKING_SCRIPTS {
        let url = format!("https://first-party.example/static{}{}", if script.starts_with('/') { "" } else { "/" }, script);
        let d = classifier.classify(&get(&url));
        assert!(!d.allow, "{}", url);
        assert_eq!(d.reason, ClassificationReason::TrackingScript, "{}", url);
    }
}

#[test]
fn cosmetic_extensions_are_blocked_regardless_of_case_and_query() {
    let classifier = RequestClassifier::default();
    for ext in COSMETIC_EXTENSIONS {
        for url in [
            format!("http://example.com/asset.{}", ext),
            format!("http://example.com/asset.{}?v=3", ext.to_uppercase()),
            format!("http://example.com/dir/asset.{}#frag", ext),
        ] {
            let d = classifier.classify(&get(&url));
            assert!(!d.allow, "{}", url);
            assert!(d.report, "{}", url);
            assert_eq!(d.reason, ClassificationReason::CosmeticExtension, "{}", url);
        }
    }
}

#[test]
fn extension_must_end_the_path() {
    let classifier = RequestClassifier::default();
    for url in ["http://example.com/cssfile", "http://example.com/image.png/view", "http://example.com/x?file=a.png"] {
        assert!(classifier.classify(&get(url)).allow, "{}", url);
    }
}

#[test]
fn css_content_type_is_blocked() {
    let classifier = RequestClassifier::default();
    let mut req = get("http://example.com/theme");
    req.declared_content_type = Some("TEXT/CSS".into());
    let d = classifier.classify(&req);
    assert!(!d.allow);
    assert_eq!(d.reason, ClassificationReason::CosmeticContentType);

    let header_only = get("http://example.com/theme").with_header("Content-Type", "text/css");
    assert!(!classifier.classify(&header_only).allow);
}

#[test]
fn data_substring_only_suppresses_reporting() {
    let classifier = RequestClassifier::default();

    let d = classifier.classify(&get("http://example.com/api/metadata"));
    assert!(d.allow);
    assert!(!d.report);

    let d = classifier.classify(&get("http://example.com/DATA/feed"));
    assert!(d.allow && !d.report);

    // Blocked and suppressed are independent.
    let d = classifier.classify(&get("data:image/png;base64,iVBORw0KGgo="));
    assert!(!d.report);

    let d = classifier.classify(&get("http://www.google-analytics.com/data/collect"));
    assert!(!d.allow);
    assert!(!d.report);
}

#[test]
fn unmatched_requests_pass_and_report() {
    let classifier = RequestClassifier::default();
    for url in ["http://example.com/", "https://example.com/api/items.json", "http://example.com/app.js"] {
        let d = classifier.classify(&get(url));
        assert!(d.allow && d.report, "{}", url);
        assert_eq!(d.reason, ClassificationReason::None);
    }
}
