//! Browser-automation sessions against the case-search form.
//!
//! The form is only reachable through a real browser. [`SessionFactory`] opens
//! one [`SearchSession`] per extraction; [`WebDriverSessions`] is the
//! production implementation backed by a WebDriver endpoint (chromedriver).

use std::time::Duration;

use async_trait::async_trait;
use docketrace_shared::SearchConfig;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tracing::{debug, warn};

/// Region text input on the search form.
pub const REGION_INPUT_ID: &str = "ctl00_ContentPlaceHolder1_txtCityTown";
/// Search submit button.
pub const SUBMIT_BUTTON_ID: &str = "ctl00_ContentPlaceHolder1_btnSubmit";
/// Results grid rendered after a search.
pub const RESULTS_TABLE_ID: &str = "ctl00_ContentPlaceHolder1_gvPropertyResults";
/// Status label shown instead of the grid (no results, errors).
pub const STATUS_MESSAGE_ID: &str = "ctl00_ContentPlaceHolder1_lblMessage";

/// Polling interval while waiting for results to render.
const RENDER_POLL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a session could not produce a results page.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The browser or the search source could not be reached.
    #[error("search source unreachable: {0}")]
    Unreachable(String),

    /// The source answered but the form no longer looks as expected.
    #[error("search form not recognised: {0}")]
    MarkupDrift(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// One open browser session.
#[async_trait]
pub trait SearchSession: Send {
    /// Submit `region` on the search form and return the rendered page source.
    async fn search(&mut self, region: &str) -> Result<String, SessionError>;

    /// Release the browser. Called on every exit path.
    async fn close(self: Box<Self>);
}

/// Opens search sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn SearchSession>, SessionError>;
}

// ---------------------------------------------------------------------------
// WebDriver implementation
// ---------------------------------------------------------------------------

/// Sessions driven through a WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverSessions {
    webdriver_url: String,
    search_url: String,
    render_wait: Duration,
    headless: bool,
}

impl WebDriverSessions {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            search_url: config.search_url.clone(),
            render_wait: Duration::from_secs(config.render_wait_secs),
            headless: config.headless,
        }
    }
}

#[async_trait]
impl SessionFactory for WebDriverSessions {
    async fn open(&self) -> Result<Box<dyn SearchSession>, SessionError> {
        let mut caps = DesiredCapabilities::chrome();
        if self.headless {
            caps.set_headless()
                .map_err(|e| SessionError::Unreachable(format!("capabilities: {e}")))?;
        }
        for arg in ["--no-sandbox", "--disable-dev-shm-usage"] {
            caps.add_arg(arg)
                .map_err(|e| SessionError::Unreachable(format!("capabilities: {e}")))?;
        }

        let driver = WebDriver::new(self.webdriver_url.as_str(), caps)
            .await
            .map_err(|e| SessionError::Unreachable(format!("{}: {e}", self.webdriver_url)))?;
        debug!(webdriver = %self.webdriver_url, "browser session started");

        Ok(Box::new(WebDriverSession {
            driver: Some(driver),
            search_url: self.search_url.clone(),
            render_wait: self.render_wait,
        }))
    }
}

struct WebDriverSession {
    /// Taken by `close`; still present on drop means the session leaked.
    driver: Option<WebDriver>,
    search_url: String,
    render_wait: Duration,
}

#[async_trait]
impl SearchSession for WebDriverSession {
    async fn search(&mut self, region: &str) -> Result<String, SessionError> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| SessionError::Unreachable("session already closed".into()))?;

        driver
            .goto(self.search_url.as_str())
            .await
            .map_err(|e| SessionError::Unreachable(format!("{}: {e}", self.search_url)))?;

        let input = driver
            .find(By::Id(REGION_INPUT_ID))
            .await
            .map_err(|e| SessionError::MarkupDrift(format!("region input: {e}")))?;
        input
            .send_keys(region)
            .await
            .map_err(|e| SessionError::MarkupDrift(format!("region input: {e}")))?;

        driver
            .find(By::Id(SUBMIT_BUTTON_ID))
            .await
            .map_err(|e| SessionError::MarkupDrift(format!("submit button: {e}")))?
            .click()
            .await
            .map_err(|e| SessionError::MarkupDrift(format!("submit button: {e}")))?;

        let settled = driver
            .query(By::Id(RESULTS_TABLE_ID))
            .or(By::Id(STATUS_MESSAGE_ID))
            .wait(self.render_wait, RENDER_POLL)
            .first()
            .await;
        if let Err(e) = settled {
            warn!(region, error = %e, "results did not render before the wait ceiling");
        }

        driver
            .source()
            .await
            .map_err(|e| SessionError::Unreachable(format!("page source: {e}")))
    }

    async fn close(mut self: Box<Self>) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.quit().await {
                warn!(error = %e, "failed to quit browser session");
            }
        }
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        warn!("browser session dropped without close, quitting");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = driver.quit().await;
            });
        }
    }
}
