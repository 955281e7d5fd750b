//! RFEngine: lightweight pure-Rust backend.
//!
//! Fetches the document with a blocking HTTP client, walks it for the
//! subresources a browser would request (stylesheets, scripts, images,
//! frames) and runs page scripts in an embedded Boa context whose prelude
//! records `XMLHttpRequest`, `fetch` and `Image` traffic. Every request,
//! the document included, goes through the `on_request` hook before it is
//! sent; aborted requests never reach the network.

use crate::{
    Engine, EngineConfig, Error, LoadStatus, RequestAction, RequestDescriptor, ResponseInfo,
    Result, ScriptResult,
};
use log::debug;
use reqwest::blocking::{Client, Response};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use url::Url;

type OnRequestHandler = Arc<dyn Fn(&RequestDescriptor) -> RequestAction + Send + Sync>;
type OnResponseHandler = Arc<dyn Fn(&ResponseInfo) + Send + Sync>;

const PRELUDE: &str = include_str!("rf_prelude.js");

/// A resource the document asks for, in document order.
#[derive(Debug, Clone, PartialEq)]
enum PageItem {
    InlineScript(String),
    ExternalScript {
        url: String,
        declared_type: Option<String>,
    },
    Resource {
        url: String,
        kind: &'static str,
        declared_type: Option<String>,
    },
}

/// What a document asks for, plus the base its relative URLs resolve against.
#[derive(Debug)]
struct PageLayout {
    base: Url,
    items: Vec<PageItem>,
}

/// A request recorded by the script prelude.
#[derive(Debug, Deserialize)]
struct RecordedRequest {
    method: String,
    url: String,
    #[serde(rename = "type")]
    kind: String,
}

/// One Boa context per page.
struct ScriptHost {
    ctx: boa_engine::Context,
}

impl ScriptHost {
    fn new(user_agent: &str, page_url: &str, loop_limit: u64) -> Result<Self> {
        let mut ctx = boa_engine::Context::default();
        if loop_limit > 0 {
            ctx.runtime_limits_mut().set_loop_iteration_limit(loop_limit);
        }

        let prelude = PRELUDE
            .replace("__RFOX_UA__", &serde_json::to_string(user_agent)?)
            .replace("__RFOX_URL__", &serde_json::to_string(page_url)?);
        ctx.eval(boa_engine::Source::from_bytes(prelude.as_bytes()))
            .map_err(|e| Error::ScriptError(format!("Failed to install script prelude: {}", e)))?;

        Ok(Self { ctx })
    }

    fn run(&mut self, code: &str) -> ScriptResult {
        match self.ctx.eval(boa_engine::Source::from_bytes(code.as_bytes())) {
            Ok(val) => ScriptResult {
                value: format!("{}", val.display()),
                is_error: false,
            },
            Err(e) => ScriptResult {
                value: format!("Script thrown: {}", e),
                is_error: true,
            },
        }
    }

    /// Drain the requests recorded since the last call.
    fn take_requests(&mut self) -> Vec<RecordedRequest> {
        let raw = match self
            .ctx
            .eval(boa_engine::Source::from_bytes("__rfox_take()".as_bytes()))
        {
            Ok(val) => val
                .as_string()
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_default(),
            Err(e) => {
                debug!("Failed to read recorded requests: {}", e);
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            debug!("Malformed recorded requests: {}", e);
            Vec::new()
        })
    }

    /// Run queued timers and load listeners.
    fn flush_deferred(&mut self) {
        let res = self.run("document.readyState = 'complete'; __rfox_flush();");
        if res.is_error {
            debug!("{}", res.value);
        }
    }
}

// Job sent to the script worker thread
enum ScriptJob {
    /// Replace the current host with a fresh one for a new page.
    Reset {
        user_agent: String,
        page_url: String,
        loop_limit: u64,
        resp: Sender<Result<()>>,
    },
    Run {
        code: String,
        resp: Sender<ScriptResult>,
    },
    TakeRequests {
        resp: Sender<Vec<RecordedRequest>>,
    },
    Flush {
        resp: Sender<()>,
    },
}

/// Handle to the thread that owns the page's Boa context.
///
/// The context is not `Send`, so it lives on its own thread for the life of
/// the engine and every script of a page, `evaluate_script` included, runs
/// in the same global scope. Dropping the handle stops the worker.
struct ScriptWorker {
    tx: Sender<ScriptJob>,
}

impl ScriptWorker {
    fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<ScriptJob>();
        thread::Builder::new()
            .name("rfextract-script".into())
            .spawn(move || {
                let mut host: Option<ScriptHost> = None;
                while let Ok(job) = rx.recv() {
                    match job {
                        ScriptJob::Reset {
                            user_agent,
                            page_url,
                            loop_limit,
                            resp,
                        } => {
                            host = None;
                            let res = ScriptHost::new(&user_agent, &page_url, loop_limit).map(|h| {
                                host = Some(h);
                            });
                            let _ = resp.send(res);
                        }
                        ScriptJob::Run { code, resp } => {
                            let res = match host.as_mut() {
                                Some(h) => h.run(&code),
                                None => ScriptResult {
                                    value: "No page loaded".to_string(),
                                    is_error: true,
                                },
                            };
                            let _ = resp.send(res);
                        }
                        ScriptJob::TakeRequests { resp } => {
                            let _ = resp.send(host.as_mut().map(ScriptHost::take_requests).unwrap_or_default());
                        }
                        ScriptJob::Flush { resp } => {
                            if let Some(h) = host.as_mut() {
                                h.flush_deferred();
                            }
                            let _ = resp.send(());
                        }
                    }
                }
            })?;
        Ok(Self { tx })
    }

    fn call<T>(&self, job: impl FnOnce(Sender<T>) -> ScriptJob) -> Result<T> {
        let (resp_tx, resp_rx) = mpsc::channel::<T>();
        self.tx
            .send(job(resp_tx))
            .map_err(|_| Error::ScriptError("script worker has stopped".to_string()))?;
        resp_rx
            .recv()
            .map_err(|_| Error::ScriptError("script worker dropped the job".to_string()))
    }

    fn reset(&self, user_agent: &str, page_url: &str, loop_limit: u64) -> Result<()> {
        self.call(|resp| ScriptJob::Reset {
            user_agent: user_agent.to_string(),
            page_url: page_url.to_string(),
            loop_limit,
            resp,
        })?
    }

    fn run(&self, code: &str) -> Result<ScriptResult> {
        self.call(|resp| ScriptJob::Run {
            code: code.to_string(),
            resp,
        })
    }

    fn take_requests(&self) -> Result<Vec<RecordedRequest>> {
        self.call(|resp| ScriptJob::TakeRequests { resp })
    }

    fn flush(&self) -> Result<()> {
        self.call(|resp| ScriptJob::Flush { resp })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::LoadError(format!("Invalid selector {}: {:?}", css, e)))
}

fn is_script_type(declared: &str) -> bool {
    declared.is_empty()
        || declared.contains("javascript")
        || declared.contains("ecmascript")
        || declared.contains("jscript")
        || declared == "module"
}

fn is_fetchable(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Walk the document for the subresources a browser would request.
fn discover_subresources(html: &str, page_url: &Url) -> Result<PageLayout> {
    let document = Html::parse_document(html);

    let base = document
        .select(&selector("base[href]")?)
        .next()
        .and_then(|b| b.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone());

    let declared = |el: &scraper::node::Element| el.attr("type").map(|t| t.trim().to_ascii_lowercase());

    let mut items = Vec::new();
    for el in document.select(&selector("script, link, img, iframe")?) {
        let node = el.value();
        let resolve = |attr: &str| {
            node.attr(attr)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .and_then(|v| base.join(v).ok())
                .map(|u| u.to_string())
        };

        match node.name() {
            "script" => {
                let declared_type = declared(node);
                if !declared_type.as_deref().map_or(true, is_script_type) {
                    continue;
                }
                if node.attr("src").is_some() {
                    if let Some(url) = resolve("src") {
                        items.push(PageItem::ExternalScript { url, declared_type });
                    }
                } else {
                    let code = el.text().collect::<String>();
                    if !code.trim().is_empty() {
                        items.push(PageItem::InlineScript(code));
                    }
                }
            }
            "link" => {
                let rel = node.attr("rel").unwrap_or_default();
                if rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")) {
                    if let Some(url) = resolve("href") {
                        items.push(PageItem::Resource {
                            url,
                            kind: "Stylesheet",
                            declared_type: declared(node),
                        });
                    }
                }
            }
            "img" => {
                if let Some(url) = resolve("src") {
                    items.push(PageItem::Resource {
                        url,
                        kind: "Image",
                        declared_type: None,
                    });
                }
            }
            "iframe" => {
                if let Some(url) = resolve("src") {
                    items.push(PageItem::Resource {
                        url,
                        kind: "Document",
                        declared_type: None,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(PageLayout { base, items })
}

/// Pure-Rust engine
pub struct RFEngine {
    client: Client,
    config: EngineConfig,
    user_agent: String,
    /// Base URL of the loaded page; script-issued URLs resolve against it.
    base_url: Option<Url>,
    /// Present when JavaScript is enabled.
    scripts: Option<ScriptWorker>,
    /// Whether the worker holds a context for `evaluate_script` to use.
    script_ready: bool,
    on_request: Option<OnRequestHandler>,
    on_response: Option<OnResponseHandler>,
}

impl RFEngine {
    fn describe(
        &self,
        method: &str,
        url: &str,
        kind: &str,
        declared_type: Option<String>,
    ) -> RequestDescriptor {
        let mut req = RequestDescriptor::new(method, url)
            .with_resource_type(kind)
            .with_header("User-Agent", self.user_agent.clone());
        for (name, value) in &self.config.headers {
            req = req.with_header(name.clone(), value.clone());
        }
        req.declared_content_type = declared_type;
        req
    }

    fn route(&self, req: &RequestDescriptor) -> RequestAction {
        match &self.on_request {
            Some(cb) => cb(req),
            None => RequestAction::Continue,
        }
    }

    fn send(&self, req: &RequestDescriptor) -> std::result::Result<Response, reqwest::Error> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes()).unwrap_or(reqwest::Method::GET);
        let mut builder = self.client.request(method, &req.url);
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }
        let resp = builder.send()?;

        if let Some(cb) = &self.on_response {
            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            cb(&ResponseInfo {
                url: resp.url().to_string(),
                status: resp.status().as_u16(),
                content_type,
            });
        }

        Ok(resp)
    }

    /// Route a subresource request and, when allowed, fetch it.
    fn load(&self, req: &RequestDescriptor) -> Option<Response> {
        if self.route(req) == RequestAction::Abort {
            debug!("Aborted {}", req.url);
            return None;
        }
        if !is_fetchable(&req.url) {
            return None;
        }
        match self.send(req) {
            Ok(resp) => Some(resp),
            Err(e) => {
                debug!("Failed to fetch {}: {}", req.url, e);
                None
            }
        }
    }

    fn run_script(&self, scripts: &ScriptWorker, code: &str, base: &Url) -> Result<()> {
        let res = scripts.run(code)?;
        if res.is_error {
            debug!("{}", res.value);
        }
        self.dispatch_recorded(scripts, base)
    }

    /// Send the requests page scripts made since the last dispatch.
    fn dispatch_recorded(&self, scripts: &ScriptWorker, base: &Url) -> Result<()> {
        for recorded in scripts.take_requests()? {
            let url = match base.join(&recorded.url) {
                Ok(u) => u,
                Err(e) => {
                    debug!("Skipping unresolvable request {}: {}", recorded.url, e);
                    continue;
                }
            };
            let req = self.describe(&recorded.method, url.as_str(), &recorded.kind, None);
            let _ = self.load(&req);
        }
        Ok(())
    }
}

impl Engine for RFEngine {
    fn new(config: EngineConfig) -> Result<Self>
    where
        Self: Sized,
    {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        let scripts = if config.enable_javascript {
            Some(ScriptWorker::spawn()?)
        } else {
            None
        };

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            config,
            base_url: None,
            scripts,
            script_ready: false,
            on_request: None,
            on_response: None,
        })
    }

    fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        self.user_agent = user_agent.to_string();
        Ok(())
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn on_request<F>(&mut self, cb: F) -> Result<()>
    where
        F: Fn(&RequestDescriptor) -> RequestAction + Send + Sync + 'static,
    {
        self.on_request = Some(Arc::new(cb));
        Ok(())
    }

    fn on_response<F>(&mut self, cb: F)
    where
        F: Fn(&ResponseInfo) + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(cb));
    }

    fn open(&mut self, url: &str) -> Result<LoadStatus> {
        let page_url = Url::parse(url).map_err(|e| Error::LoadError(format!("Invalid URL {}: {}", url, e)))?;

        let doc_req = self.describe("GET", page_url.as_str(), "Document", None);
        if self.route(&doc_req) == RequestAction::Abort {
            debug!("Document request aborted: {}", page_url);
            return Ok(LoadStatus::Fail);
        }

        // HTTP error statuses still load a page; only transport failures fail.
        let resp = match self.send(&doc_req) {
            Ok(resp) => resp,
            Err(e) => {
                debug!("Failed to fetch {}: {}", page_url, e);
                return Ok(LoadStatus::Fail);
            }
        };
        let final_url = resp.url().clone();
        let body = match resp.text() {
            Ok(body) => body,
            Err(e) => {
                debug!("Failed to read response body: {}", e);
                return Ok(LoadStatus::Fail);
            }
        };
        let PageLayout { base, items } = discover_subresources(&body, &final_url)?;
        self.base_url = Some(base.clone());

        let scripts = self.scripts.as_ref();
        if let Some(scripts) = scripts {
            scripts.reset(
                &self.user_agent,
                final_url.as_str(),
                self.config.script_loop_iteration_limit,
            )?;
            self.script_ready = true;
        }

        for item in items {
            match item {
                PageItem::Resource {
                    url,
                    kind,
                    declared_type,
                } => {
                    let req = self.describe("GET", &url, kind, declared_type);
                    let _ = self.load(&req);
                }
                PageItem::InlineScript(code) => {
                    if let Some(scripts) = scripts {
                        self.run_script(scripts, &code, &base)?;
                    }
                }
                PageItem::ExternalScript { url, declared_type } => {
                    let Some(scripts) = scripts else { continue };
                    let req = self.describe("GET", &url, "Script", declared_type);
                    let code = self.load(&req).and_then(|resp| match resp.text() {
                        Ok(code) => Some(code),
                        Err(e) => {
                            debug!("Failed to read script {}: {}", url, e);
                            None
                        }
                    });
                    if let Some(code) = code {
                        self.run_script(scripts, &code, &base)?;
                    }
                }
            }
        }

        if let Some(scripts) = scripts {
            scripts.flush()?;
            self.dispatch_recorded(scripts, &base)?;
        }

        Ok(LoadStatus::Success)
    }

    fn evaluate_script(&mut self, script: &str) -> Result<ScriptResult> {
        let scripts = self
            .scripts
            .as_ref()
            .ok_or_else(|| Error::ScriptError("JavaScript is disabled".to_string()))?;

        if !self.script_ready {
            scripts.reset(&self.user_agent, "about:blank", self.config.script_loop_iteration_limit)?;
            self.script_ready = true;
        }

        let res = scripts.run(script)?;
        if let Some(base) = &self.base_url {
            self.dispatch_recorded(scripts, base)?;
        }
        Ok(res)
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn page_url() -> Url {
        Url::parse("http://example.com/dir/page.html").unwrap()
    }

    #[test]
    fn discovers_subresources_in_document_order() {
        let html = r#"<html><head>
            <link rel="icon" href="/favicon.ico">
            <link rel="Stylesheet" type="text/css" href="site.css">
            <script src="/app.js"></script>
            <script type="application/ld+json">{"a":1}</script>
            </head><body>
            <img src="img/logo.png">
            <script>var a = 1;</script>
            <iframe src="https://other.example/frame"></iframe>
            <img>
            </body></html>"#;

        let layout = discover_subresources(html, &page_url()).unwrap();
        assert_eq!(layout.base, page_url());
        assert_eq!(
            layout.items,
            vec![
                PageItem::Resource {
                    url: "http://example.com/dir/site.css".into(),
                    kind: "Stylesheet",
                    declared_type: Some("text/css".into()),
                },
                PageItem::ExternalScript {
                    url: "http://example.com/app.js".into(),
                    declared_type: None,
                },
                PageItem::Resource {
                    url: "http://example.com/dir/img/logo.png".into(),
                    kind: "Image",
                    declared_type: None,
                },
                PageItem::InlineScript("var a = 1;".into()),
                PageItem::Resource {
                    url: "https://other.example/frame".into(),
                    kind: "Document",
                    declared_type: None,
                },
            ]
        );
    }

    #[test]
    fn base_href_changes_resolution() {
        let html = r#"<html><head><base href="http://cdn.example.net/assets/"></head>
            <body><img src="a.gif"></body></html>"#;
        let layout = discover_subresources(html, &page_url()).unwrap();
        assert_eq!(layout.base.as_str(), "http://cdn.example.net/assets/");
        assert_eq!(
            layout.items,
            vec![PageItem::Resource {
                url: "http://cdn.example.net/assets/a.gif".into(),
                kind: "Image",
                declared_type: None,
            }]
        );
    }

    #[test]
    fn script_host_records_network_activity() {
        let mut host = ScriptHost::new("RFOX/1.0", "http://example.com/", 10_000).unwrap();
        let res = host.run(
            "var x = new XMLHttpRequest(); x.open('post', '/api/items'); x.send('{}');
             fetch('/api/more');
             var img = new Image(); img.src = '/pixel.gif';
             setTimeout(function () { fetch('/later'); }, 10);
             navigator.userAgent",
        );
        assert!(!res.is_error, "{}", res.value);
        assert!(res.value.contains("RFOX/1.0"));

        let recorded = host.take_requests();
        let seen: Vec<_> = recorded
            .iter()
            .map(|r| (r.method.as_str(), r.url.as_str(), r.kind.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("POST", "/api/items", "XHR"),
                ("GET", "/api/more", "Fetch"),
                ("GET", "/pixel.gif", "Image"),
            ]
        );
        assert!(host.take_requests().is_empty());

        host.flush_deferred();
        let later = host.take_requests();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].url, "/later");
    }

    #[test]
    fn evaluate_script_reports_values_and_errors() {
        let mut engine = RFEngine::new(EngineConfig::default()).unwrap();
        let ok = engine.evaluate_script("1 + 2").unwrap();
        assert!(!ok.is_error);
        assert_eq!(ok.value, "3");

        let img = engine
            .evaluate_script("(function(){ var a = new Image(); return true; })()")
            .unwrap();
        assert_eq!(img.value, "true");

        let err = engine.evaluate_script("throw new Error('boom')").unwrap();
        assert!(err.is_error);
        assert!(err.value.contains("boom"));
    }

    #[test]
    fn evaluate_script_requires_javascript() {
        let cfg = EngineConfig {
            enable_javascript: false,
            ..Default::default()
        };
        let mut engine = RFEngine::new(cfg).unwrap();
        assert!(matches!(engine.evaluate_script("1"), Err(Error::ScriptError(_))));
    }

    fn serve(routes: fn(&str) -> (&'static str, &'static str)) -> (String, Arc<Mutex<Vec<String>>>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let hits_srv = hits.clone();

        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let path = request.url().to_string();
                hits_srv.lock().unwrap().push(path.clone());
                let (content_type, body) = routes(&path);
                let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap();
                let _ = request.respond(tiny_http::Response::from_string(body).with_header(header));
            }
        });

        (format!("http://{}", addr), hits)
    }

    fn page_routes(path: &str) -> (&'static str, &'static str) {
        match path {
            "/" => (
                "text/html",
                r#"<html><head>
                <link rel="stylesheet" href="/site.css">
                <script src="/app.js"></script>
                </head><body>
                <img src="/logo.png">
                <script>var x = new XMLHttpRequest(); x.open('GET', '/api/items.json'); x.send();</script>
                </body></html>"#,
            ),
            "/app.js" => (
                "application/javascript",
                "setTimeout(function () { fetch('/late.json'); }, 10);",
            ),
            "/site.css" => ("text/css", "body { color: red }"),
            _ => ("application/json", "{}"),
        }
    }

    #[test]
    fn open_routes_every_request_through_the_hook() {
        let (base, hits) = serve(page_routes);

        let mut engine = RFEngine::new(EngineConfig::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        engine
            .on_request(move |req| {
                seen_cb.lock().unwrap().push(req.url.clone());
                if req.url.ends_with(".css") || req.url.ends_with(".png") {
                    RequestAction::Abort
                } else {
                    RequestAction::Continue
                }
            })
            .unwrap();

        let status = engine.open(&format!("{}/", base)).unwrap();
        assert_eq!(status, LoadStatus::Success);

        let expected: Vec<String> = ["/", "/site.css", "/app.js", "/logo.png", "/api/items.json", "/late.json"]
            .iter()
            .map(|p| format!("{}{}", base, p))
            .collect();
        assert_eq!(*seen.lock().unwrap(), expected);

        let hits = hits.lock().unwrap();
        assert_eq!(*hits, vec!["/", "/app.js", "/api/items.json", "/late.json"]);
    }

    #[test]
    fn open_reports_responses() {
        let (base, _hits) = serve(page_routes);

        let mut engine = RFEngine::new(EngineConfig::default()).unwrap();
        let responses = Arc::new(Mutex::new(Vec::new()));
        let responses_cb = responses.clone();
        engine.on_response(move |resp| {
            responses_cb.lock().unwrap().push((resp.status, resp.content_type.clone()));
        });

        engine.open(&format!("{}/", base)).unwrap();
        let responses = responses.lock().unwrap();
        assert_eq!(responses[0], (200, Some("text/html".to_string())));
        assert!(responses.len() >= 5);
    }

    fn based_page_routes(path: &str) -> (&'static str, &'static str) {
        match path {
            "/" => (
                "text/html",
                r#"<html><head><base href="/app/"></head><body>
                <script>var pageMarker = 42; fetch('items.json');</script>
                </body></html>"#,
            ),
            _ => ("application/json", "{}"),
        }
    }

    fn recording_engine() -> (RFEngine, Arc<Mutex<Vec<String>>>) {
        let mut engine = RFEngine::new(EngineConfig::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        engine
            .on_request(move |req| {
                seen_cb.lock().unwrap().push(req.url.clone());
                RequestAction::Continue
            })
            .unwrap();
        (engine, seen)
    }

    #[test]
    fn script_requests_resolve_against_base_href() {
        let (base, hits) = serve(based_page_routes);
        let (mut engine, seen) = recording_engine();

        assert_eq!(engine.open(&format!("{}/", base)).unwrap(), LoadStatus::Success);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![format!("{}/", base), format!("{}/app/items.json", base)]
        );
        assert_eq!(*hits.lock().unwrap(), vec!["/", "/app/items.json"]);

        engine.evaluate_script("fetch('more.json')").unwrap();
        assert_eq!(seen.lock().unwrap().last().unwrap(), &format!("{}/app/more.json", base));
    }

    #[test]
    fn evaluate_script_sees_the_loaded_page() {
        let (base, _hits) = serve(based_page_routes);
        let (mut engine, _seen) = recording_engine();

        engine.open(&format!("{}/", base)).unwrap();
        let res = engine.evaluate_script("pageMarker").unwrap();
        assert!(!res.is_error, "{}", res.value);
        assert_eq!(res.value, "42");

        let res = engine.evaluate_script("document.readyState").unwrap();
        assert!(res.value.contains("complete"), "{}", res.value);
    }

    #[test]
    fn each_open_starts_a_fresh_script_context() {
        let (base, _hits) = serve(based_page_routes);
        let (mut engine, _seen) = recording_engine();

        engine.evaluate_script("var leftover = 1;").unwrap();
        engine.open(&format!("{}/", base)).unwrap();
        let res = engine.evaluate_script("typeof leftover").unwrap();
        assert!(res.value.contains("undefined"), "{}", res.value);
    }

    #[test]
    fn aborted_document_fails_the_load() {
        let (base, hits) = serve(page_routes);

        let mut engine = RFEngine::new(EngineConfig::default()).unwrap();
        engine.on_request(|_| RequestAction::Abort).unwrap();
        assert_eq!(engine.open(&format!("{}/", base)).unwrap(), LoadStatus::Fail);
        assert!(hits.lock().unwrap().is_empty());
    }

    /// Collects every log record emitted by the test binary.
    struct RecordingLog(Mutex<Vec<(log::Level, String)>>);

    impl log::Log for RecordingLog {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            self.0.lock().unwrap().push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    fn recording_log() -> &'static RecordingLog {
        static LOG: std::sync::OnceLock<&'static RecordingLog> = std::sync::OnceLock::new();
        LOG.get_or_init(|| {
            let log: &'static RecordingLog = Box::leak(Box::new(RecordingLog(Mutex::new(Vec::new()))));
            let _ = log::set_logger(log);
            log::set_max_level(log::LevelFilter::Trace);
            log
        })
    }

    #[test]
    fn unreachable_host_fails_the_load() {
        let log = recording_log();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut engine = RFEngine::new(EngineConfig::default()).unwrap();
        let status = engine.open(&format!("http://{}/", addr)).unwrap();
        assert_eq!(status, LoadStatus::Fail);

        // The fetch error is a diagnostic, not a warning.
        let records = log.0.lock().unwrap();
        let ours: Vec<_> = records.iter().filter(|(_, msg)| msg.contains(&addr.to_string())).collect();
        assert!(!ours.is_empty());
        assert!(ours.iter().all(|(level, _)| *level == log::Level::Debug), "{:?}", ours);
    }

    #[test]
    fn invalid_url_is_an_error() {
        let mut engine = RFEngine::new(EngineConfig::default()).unwrap();
        assert!(engine.open("not a url").is_err());
    }
}
