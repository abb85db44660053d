//! Retrieval and rendering collaborators.
//!
//! [`BrowserSession`] drives one headless Chromium: every page is rendered
//! in the same tab, and the cookies it collects are handed to the plain HTTP
//! client used for images. [`HttpSession`] does the same without a browser.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use colored::*;
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use crate::error::{FetchError, RenderError};

/// `render_page(url) -> html_text | failure`
#[async_trait]
pub trait PageSource {
    async fn render_page(&self, url: &str) -> Result<String, FetchError>;
}

/// `fetch_bytes(url) -> bytes | failure`
#[async_trait]
pub trait AssetSource {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// `render_to_paginated_artifact(html_text) -> file | failure`
#[async_trait]
pub trait PdfRenderer {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Applies to every navigation, asset download and PDF print.
    pub timeout: Duration,
    /// Delay after navigation so client-side scripts can finish.
    pub settle: Duration,
    pub headful: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            settle: Duration::from_millis(3000),
            headful: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub scale: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            scale: 0.9,
            margin_top: 0.4,
            margin_right: 0.4,
            margin_bottom: 0.4,
            margin_left: 0.4,
        }
    }
}

impl PdfOptions {
    fn params(&self) -> PrintToPdfParams {
        PrintToPdfParams {
            scale: Some(self.scale),
            margin_top: Some(self.margin_top),
            margin_right: Some(self.margin_right),
            margin_bottom: Some(self.margin_bottom),
            margin_left: Some(self.margin_left),
            print_background: Some(true),
            ..Default::default()
        }
    }
}

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    jar: Arc<Jar>,
    client: reqwest::Client,
    config: SessionConfig,
    pdf_options: PdfOptions,
}

impl BrowserSession {
    /// Starts Chromium. Failing here means no retrieval capability at all.
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        info!("Starting browser...");

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .window_size(1920, 1080);
        if config.headful {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("Failed to create browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(err) = h {
                    let err_str = err.to_string();
                    if !err_str.contains("data did not match any variant")
                        && !err_str.contains("untagged enum Message")
                    {
                        error!("Browser handler error: {}", err);
                    } else {
                        debug!("Chrome protocol message ignored: {}", err);
                    }
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to create new page: {}", e))?;

        let user_agent = page
            .evaluate("navigator.userAgent")
            .await
            .ok()
            .and_then(|value| value.into_value::<String>().ok());
        debug!(?user_agent, "Browser user agent");

        let jar = Arc::new(Jar::default());
        let mut client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.timeout);
        if let Some(agent) = user_agent {
            client = client.user_agent(agent);
        }
        let client = client
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        info!("Browser ready");
        Ok(Self {
            browser,
            handler: handle,
            page,
            jar,
            client,
            config,
            pdf_options: PdfOptions::default(),
        })
    }

    pub fn with_pdf_options(mut self, pdf_options: PdfOptions) -> Self {
        self.pdf_options = pdf_options;
        self
    }

    pub async fn close(mut self) {
        info!("Closing browser");
        self.browser.close().await.ok();
        self.handler.abort();
    }

    async fn sync_cookies(&self, url: &Url) {
        let cookies = match self.page.get_cookies().await {
            Ok(cookies) => cookies,
            Err(e) => {
                debug!("Cannot read browser cookies: {}", e);
                return;
            }
        };
        for cookie in &cookies {
            let (line, origin) = cookie_entry(
                &cookie.name,
                &cookie.value,
                &cookie.domain,
                &cookie.path,
                cookie.secure,
                url,
            );
            self.jar.add_cookie_str(&line, &origin);
        }
        debug!(count = cookies.len(), "Copied browser cookies");
    }

    async fn navigate(&self, url: &str) -> Result<String, FetchError> {
        let browser_err = |e: chromiumoxide::error::CdpError| FetchError::Browser {
            url: url.to_string(),
            message: e.to_string(),
        };
        self.page.goto(url).await.map_err(browser_err)?;
        tokio::time::sleep(self.config.settle).await;
        self.page.content().await.map_err(browser_err)
    }
}

#[async_trait]
impl PageSource for BrowserSession {
    async fn render_page(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        info!("Fetching page via browser: {}", url.green());

        let html = tokio::time::timeout(self.config.timeout + self.config.settle, self.navigate(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                seconds: self.config.timeout.as_secs_f64(),
            })??;

        self.sync_cookies(&parsed).await;
        Ok(html)
    }
}

#[async_trait]
impl AssetSource for BrowserSession {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        http_get(&self.client, url, self.config.timeout).await
    }
}

#[async_trait]
impl PdfRenderer for BrowserSession {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let print = async {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Browser(format!("Failed to create page: {}", e)))?;
            page.set_content(html)
                .await
                .map_err(|e| RenderError::Browser(format!("Failed to set content: {}", e)))?;
            let pdf = page
                .pdf(self.pdf_options.params())
                .await
                .map_err(|e| RenderError::Browser(format!("Failed to generate PDF: {}", e)));
            page.close().await.ok();
            pdf
        };

        tokio::time::timeout(self.config.timeout * 3, print)
            .await
            .map_err(|_| RenderError::Browser("timed out printing PDF".to_string()))?
    }
}

/// Plain HTTP retrieval without script execution.
pub struct HttpSession {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSession {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(concat!("manual2book/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PageSource for HttpSession {
    async fn render_page(&self, url: &str) -> Result<String, FetchError> {
        info!("Fetching page: {}", url.green());
        let bytes = http_get(&self.client, url, self.timeout).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl AssetSource for HttpSession {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        http_get(&self.client, url, self.timeout).await
    }
}

/// `Set-Cookie` line for a browser cookie and the URL to file it under.
///
/// The URL is built from the cookie's own domain: the jar rejects cookies
/// whose domain does not match the URL they arrive with, and image hosts
/// often differ from the page host. A leading dot marks a domain cookie;
/// anything else is host-only.
fn cookie_entry(
    name: &str,
    value: &str,
    domain: &str,
    path: &str,
    secure: bool,
    page_url: &Url,
) -> (String, Url) {
    let path = if path.starts_with('/') { path } else { "/" };
    let mut line = format!("{}={}; Path={}", name, value, path);
    if secure {
        line.push_str("; Secure");
    }

    let host = domain.trim_start_matches('.');
    if host.is_empty() {
        return (line, page_url.clone());
    }
    if domain.starts_with('.') {
        line.push_str(&format!("; Domain={}", host));
    }
    let scheme = if secure { "https" } else { page_url.scheme() };
    let origin = Url::parse(&format!("{}://{}{}", scheme, host, path))
        .unwrap_or_else(|_| page_url.clone());
    (line, origin)
}

async fn http_get(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let classify = |source: reqwest::Error| {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                seconds: timeout.as_secs_f64(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                source,
            }
        }
    };

    let response = client.get(url).send().await.map_err(classify)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = response.bytes().await.map_err(classify)?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn http_session_reports_status_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let session = HttpSession::new(Duration::from_secs(5)).unwrap();
        let err = session
            .fetch_bytes(&format!("{}/missing.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn http_session_times_out_per_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let session = HttpSession::new(Duration::from_millis(200)).unwrap();
        let err = session
            .render_page(&format!("{}/slow", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[test]
    fn cookies_are_filed_under_their_own_domain() {
        use reqwest::cookie::CookieStore;

        let page = Url::parse("https://wiki.example.org/Manual:Intro").unwrap();
        let jar = Jar::default();
        for (name, domain, secure) in [
            ("session", "wiki.example.org", true),
            ("edge", ".cdn.example.net", false),
        ] {
            let (line, origin) = cookie_entry(name, "1", domain, "/", secure, &page);
            jar.add_cookie_str(&line, &origin);
        }

        let cookie = |url: &str| {
            jar.cookies(&Url::parse(url).unwrap())
                .map(|value| value.to_str().unwrap().to_string())
        };
        assert_eq!(cookie("https://img.cdn.example.net/a.png").as_deref(), Some("edge=1"));
        assert_eq!(cookie("https://wiki.example.org/images/a.png").as_deref(), Some("session=1"));
        assert_eq!(cookie("https://other.example.com/"), None);
    }

    #[test]
    fn cookie_without_domain_falls_back_to_the_page() {
        let page = Url::parse("http://127.0.0.1:8080/Manual:Intro").unwrap();
        let (line, origin) = cookie_entry("a", "b", "", "", false, &page);
        assert_eq!(line, "a=b; Path=/");
        assert_eq!(origin, page);

        let (line, origin) = cookie_entry("a", "b", "127.0.0.1", "/w", false, &page);
        assert_eq!(line, "a=b; Path=/w");
        assert_eq!(origin.as_str(), "http://127.0.0.1/w");
    }
}
