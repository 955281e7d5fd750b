//! Chrome DevTools Protocol adapter implementation

use crate::{
    Engine, EngineConfig, Error, LoadStatus, RequestAction, RequestDescriptor, ResponseInfo,
    Result, ScriptResult,
};
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision, Tab};
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::FailRequest;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::Network::GetResponseBodyReturnObject;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const RESPONSE_LISTENER: &str = "rfextract-responses";

/// CDP-based headless engine implementation (uses the `headless_chrome` crate)
///
/// Launches a headless Chrome instance and drives a single tab. Request
/// interception goes through the Fetch domain: every paused request is
/// described to the `on_request` hook and then continued or failed with
/// `Aborted`.
pub struct CdpEngine {
    browser: Browser,
    tab: Arc<Tab>,
    config: EngineConfig,
    user_agent: String,
}

/// Flatten the protocol's header object into name/value pairs.
fn headers_of(request: &Network::Request) -> HashMap<String, String> {
    match serde_json::to_value(&request.headers) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect(),
        _ => HashMap::new(),
    }
}

fn describe(event: &RequestPausedEvent) -> RequestDescriptor {
    let req = &event.params.request;
    let mut descriptor = RequestDescriptor::new(req.method.clone(), req.url.clone())
        .with_resource_type(format!("{:?}", event.params.resource_type));
    descriptor.headers = headers_of(req);
    descriptor
}

impl Engine for CdpEngine {
    fn new(config: EngineConfig) -> Result<Self>
    where
        Self: Sized,
    {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| Error::InitializationError(format!("Failed to set user agent: {}", e)))?;

        if !config.headers.is_empty() {
            let headers: HashMap<&str, &str> = config
                .headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();

            tab.set_extra_http_headers(headers)
                .map_err(|e| Error::InitializationError(format!("Failed to set headers: {}", e)))?;
        }

        if !config.enable_javascript {
            tab.call_method(Emulation::SetScriptExecutionDisabled { value: true })
                .map_err(|e| Error::InitializationError(format!("Failed to disable scripts: {}", e)))?;
        }

        Ok(Self {
            browser,
            tab,
            user_agent: config.user_agent.clone(),
            config,
        })
    }

    fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        self.tab
            .set_user_agent(user_agent, None, None)
            .map_err(|e| Error::CdpError(format!("Failed to set user agent: {}", e)))?;
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
        let handler = Arc::new(cb);

        self.tab
            .enable_fetch(None, Some(false))
            .map_err(|e| Error::CdpError(format!("Failed to enable fetch domain: {}", e)))?;

        let interceptor: Arc<dyn RequestInterceptor + Send + Sync> = Arc::new(
            move |_transport, _session_id, event: RequestPausedEvent| match handler(&describe(&event)) {
                RequestAction::Continue => RequestPausedDecision::Continue(None),
                RequestAction::Abort => RequestPausedDecision::Fail(FailRequest {
                    request_id: event.params.request_id.clone(),
                    error_reason: Network::ErrorReason::Aborted,
                }),
            },
        );

        self.tab
            .enable_request_interception(interceptor)
            .map_err(|e| Error::CdpError(format!("Failed to enable request interception: {}", e)))?;
        Ok(())
    }

    fn on_response<F>(&mut self, cb: F)
    where
        F: Fn(&ResponseInfo) + Send + Sync + 'static,
    {
        let res = self.tab.register_response_handling(
            RESPONSE_LISTENER,
            Box::new(
                move |params: ResponseReceivedEventParams,
                      _fetch_body: &dyn Fn() -> anyhow::Result<GetResponseBodyReturnObject>| {
                    let response = &params.response;
                    cb(&ResponseInfo {
                        url: response.url.clone(),
                        status: response.status as u16,
                        content_type: Some(response.mime_type.clone()).filter(|m| !m.is_empty()),
                    });
                },
            ),
        );
        if let Err(e) = res {
            debug!("Failed to register response handling: {}", e);
        }
    }

    fn open(&mut self, url: &str) -> Result<LoadStatus> {
        if let Err(e) = self.tab.navigate_to(url) {
            debug!("Navigation failed: {}", e);
            return Ok(LoadStatus::Fail);
        }
        if let Err(e) = self.tab.wait_until_navigated() {
            debug!("Wait for navigation failed: {}", e);
            return Ok(LoadStatus::Fail);
        }

        // Chrome swaps in its own error page when the document never loads.
        let landed = self.tab.get_url();
        if landed.starts_with("chrome-error://") {
            debug!("Navigation to {} ended on {}", url, landed);
            return Ok(LoadStatus::Fail);
        }

        Ok(LoadStatus::Success)
    }

    fn evaluate_script(&mut self, script: &str) -> Result<ScriptResult> {
        if !self.config.enable_javascript {
            return Err(Error::ScriptError("JavaScript is disabled".to_string()));
        }

        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::ScriptError(format!("Evaluation failed: {}", e)))?;

        let is_error = result.subtype.as_ref().map_or(false, |s| format!("{:?}", s) == "Error");
        let value = result
            .value
            .map(|v| v.to_string())
            .or(result.description)
            .unwrap_or_else(|| "null".to_string());

        Ok(ScriptResult { value, is_error })
    }

    fn close(self) -> Result<()> {
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}
