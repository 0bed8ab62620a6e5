//! Thin WebDriver client over the geckodriver HTTP endpoint.
//!
//! Only the handful of commands the browser probes need: navigate, element
//! lookup, keystrokes, synchronous script execution, screenshot, quit.

use super::{DriverError, DriverHandle};
use base64::Engine;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// W3C WebDriver element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque reference to a located page element.
#[derive(Debug, Clone)]
pub struct ElementRef(String);

/// One live browser session. Owns the driver process; quitting the session
/// also terminates geckodriver.
pub struct BrowserSession {
    client: reqwest::Client,
    session_url: String,
    driver: DriverHandle,
}

impl BrowserSession {
    /// Create a Firefox session on a freshly spawned driver. The option set
    /// mirrors what works reliably in Termux: headless, no sandbox, fixed
    /// window size, Termux user agent.
    pub async fn new(mut driver: DriverHandle, headless: bool) -> Result<Self, DriverError> {
        let client = reqwest::Client::builder().timeout(COMMAND_TIMEOUT).build()?;

        let mut args = vec!["--no-sandbox", "--disable-gpu", "--window-size=1920,1080"];
        if headless {
            args.insert(0, "--headless");
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "acceptInsecureCerts": true,
                    "moz:firefoxOptions": {
                        "args": args,
                        "prefs": {
                            "general.useragent.override": crate::TERMUX_USER_AGENT,
                        },
                    },
                },
            },
        });

        let endpoint = format!("{}/session", driver.base_url());
        let response = client.post(&endpoint).json(&capabilities).send().await;
        let value = match response {
            Ok(resp) => match Self::unwrap_value(resp).await {
                Ok(v) => v,
                Err(e) => {
                    driver.terminate().await;
                    return Err(DriverError::SessionFailed(e.to_string()));
                }
            },
            Err(e) => {
                driver.terminate().await;
                return Err(DriverError::SessionFailed(e.to_string()));
            }
        };

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let Some(session_id) = session_id else {
            driver.terminate().await;
            return Err(DriverError::SessionFailed(
                "response carried no sessionId".to_string(),
            ));
        };

        debug!(%session_id, "WebDriver session established");
        let session_url = format!("{}/session/{}", driver.base_url(), session_id);
        Ok(Self {
            client,
            session_url,
            driver,
        })
    }

    pub async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    pub async fn title(&self) -> Result<String, DriverError> {
        self.string_command(Method::GET, "title").await
    }

    pub async fn current_url(&self) -> Result<String, DriverError> {
        self.string_command(Method::GET, "url").await
    }

    pub async fn page_source(&self) -> Result<String, DriverError> {
        self.string_command(Method::GET, "source").await
    }

    /// Locate one element by CSS selector.
    pub async fn find_element(&self, selector: &str) -> Result<ElementRef, DriverError> {
        let value = self
            .command(
                Method::POST,
                "element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
            .ok_or_else(|| DriverError::Command(format!("no element matched '{selector}'")))
    }

    /// Locate every element matching a CSS selector.
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<ElementRef>, DriverError> {
        let value = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        let refs = value
            .as_array()
            .ok_or_else(|| DriverError::Command("expected element array".to_string()))?
            .iter()
            .filter_map(|entry| entry.get(ELEMENT_KEY).and_then(Value::as_str))
            .map(|id| ElementRef(id.to_string()))
            .collect();
        Ok(refs)
    }

    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        let path = format!("element/{}/value", element.0);
        self.command(Method::POST, &path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    /// Submit the form the element belongs to by sending it the Enter key,
    /// the same mechanism Selenium's submit uses under W3C WebDriver.
    pub async fn submit(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.send_keys(element, "\u{E007}").await
    }

    /// Read a DOM property (e.g. an input's live "value").
    pub async fn element_property(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Value, DriverError> {
        let path = format!("element/{}/property/{}", element.0, name);
        self.command(Method::GET, &path, None).await
    }

    /// Execute synchronous JavaScript and return its value.
    pub async fn execute_script(&self, script: &str) -> Result<Value, DriverError> {
        self.command(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .await
    }

    /// Capture the viewport as PNG bytes.
    pub async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let encoded = self.string_command(Method::GET, "screenshot").await?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| DriverError::Command(format!("screenshot payload not base64: {e}")))
    }

    /// End the session and terminate the driver process.
    pub async fn quit(mut self) {
        if let Err(e) = self.client.delete(&self.session_url).send().await {
            warn!(error = %e, "failed to delete WebDriver session");
        }
        self.driver.terminate().await;
    }

    async fn string_command(&self, method: Method, path: &str) -> Result<String, DriverError> {
        let value = self.command(method, path, None).await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| DriverError::Command(format!("expected string value from /{path}")))
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let endpoint = format!("{}/{}", self.session_url, path);
        let mut request = self.client.request(method, &endpoint);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        Self::unwrap_value(response).await
    }

    /// Every WebDriver response wraps its result in {"value": ...}; error
    /// responses carry {"value": {"error", "message"}} with a non-2xx status.
    async fn unwrap_value(response: reqwest::Response) -> Result<Value, DriverError> {
        let status = response.status();
        let mut body: Value = response.json().await?;
        let value = body
            .as_object_mut()
            .and_then(|o| o.remove("value"))
            .unwrap_or(Value::Null);

        if !status.is_success() {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown WebDriver error")
                .to_string();
            return Err(DriverError::Command(message));
        }
        Ok(value)
    }
}
