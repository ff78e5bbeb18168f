use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thirtyfour::{
    error::WebDriverError, By, ChromiumLikeCapabilities, DesiredCapabilities, Key, WebDriver,
};

use crate::domain::{site::SiteId, workflow::PageSnapshot};

use super::browser_session::{BrowserSession, SessionError, SessionProvider};

/// Messages from chromedriver meaning the browser itself is gone.
const SESSION_GONE: [&str; 5] = [
    "invalid session id",
    "no such window",
    "session not created",
    "chrome not reachable",
    "disconnected",
];

/// A Chrome window driven over WebDriver.
pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn new(webdriver_url: &str, headless: bool) -> Result<Self, WebDriverError> {
        let mut caps = DesiredCapabilities::chrome();
        if headless {
            caps.add_arg("--headless=new")?;
        }

        // http://chrome:4444/wd/hub
        let driver = WebDriver::new(webdriver_url, caps).await?;
        driver.maximize_window().await?;

        Ok(Droid { driver })
    }
}

fn classify(e: WebDriverError) -> SessionError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    match SESSION_GONE.iter().any(|m| lowered.contains(m)) {
        true => SessionError::Unavailable(message),
        false => SessionError::Step(message),
    }
}

#[async_trait]
impl BrowserSession for Droid {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.driver.goto(url).await.map_err(classify)
    }

    async fn scroll_by(&mut self, pixels: u32) -> Result<(), SessionError> {
        self.driver
            .execute("window.scrollBy(0, arguments[0]);", vec![json!(pixels)])
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn wait(&mut self, duration: Duration) -> Result<(), SessionError> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn type_into(&mut self, selector: &str, text: &str) -> Result<(), SessionError> {
        let element = self.driver.find(By::Css(selector)).await.map_err(classify)?;
        element.clear().await.map_err(classify)?;
        element.send_keys(text).await.map_err(classify)
    }

    async fn press_key(&mut self, key: &str) -> Result<(), SessionError> {
        let element = self.driver.active_element().await.map_err(classify)?;
        let result = match key {
            "Enter" => element.send_keys(Key::Enter).await,
            "Tab" => element.send_keys(Key::Tab).await,
            "Escape" => element.send_keys(Key::Escape).await,
            other => element.send_keys(other).await,
        };
        result.map_err(classify)
    }

    async fn query_all(&mut self, selector: &str) -> Result<usize, SessionError> {
        self.driver
            .find_all(By::Css(selector))
            .await
            .map(|elements| elements.len())
            .map_err(classify)
    }

    async fn page_snapshot(&mut self) -> Result<PageSnapshot, SessionError> {
        let html = self.driver.source().await.map_err(classify)?;
        Ok(PageSnapshot::new(html))
    }

    async fn accept_dialog(&mut self) -> Result<bool, SessionError> {
        match self.driver.accept_alert().await {
            Ok(()) => Ok(true),
            // "no such alert" and friends: nothing was open.
            Err(e) => match classify(e) {
                SessionError::Step(_) => Ok(false),
                lost => Err(lost),
            },
        }
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.driver.quit().await.map_err(classify)
    }
}

/// Starts one Chrome session per site against a running chromedriver.
pub struct WebDriverProvider {
    webdriver_url: String,
    headless: bool,
}

impl WebDriverProvider {
    pub fn new(webdriver_url: String, headless: bool) -> Self {
        WebDriverProvider {
            webdriver_url,
            headless,
        }
    }
}

#[async_trait]
impl SessionProvider for WebDriverProvider {
    async fn open(&self, site: &SiteId) -> Result<Box<dyn BrowserSession>, SessionError> {
        log::debug!("Opening browser session for {}", site);
        match Droid::new(&self.webdriver_url, self.headless).await {
            Ok(droid) => Ok(Box::new(droid)),
            Err(e) => Err(SessionError::Unavailable(format!(
                "could not start browser at {}: {}",
                self.webdriver_url, e
            ))),
        }
    }
}
