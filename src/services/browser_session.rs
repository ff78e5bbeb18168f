use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{site::SiteId, workflow::PageSnapshot};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// The primitive failed but the session is still usable (element not found,
    /// navigation timeout, ...).
    #[error("{0}")]
    Step(String),
    /// The session is closed or crashed. Nothing else can run on it.
    #[error("session unavailable: {0}")]
    Unavailable(String),
}

impl SessionError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SessionError::Unavailable(_))
    }
}

/// One live browser page. Not safe for concurrent use, so every method takes
/// `&mut self`.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;
    async fn scroll_by(&mut self, pixels: u32) -> Result<(), SessionError>;
    async fn wait(&mut self, duration: Duration) -> Result<(), SessionError>;
    async fn type_into(&mut self, selector: &str, text: &str) -> Result<(), SessionError>;
    async fn press_key(&mut self, key: &str) -> Result<(), SessionError>;
    /// Number of elements currently matching `selector`.
    async fn query_all(&mut self, selector: &str) -> Result<usize, SessionError>;
    /// Accepts an open alert, confirm or prompt. `Ok(false)` when none is open.
    async fn accept_dialog(&mut self) -> Result<bool, SessionError>;
    async fn page_snapshot(&mut self) -> Result<PageSnapshot, SessionError>;
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// Opens a fresh session for one site's pipeline.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self, site: &SiteId) -> Result<Box<dyn BrowserSession>, SessionError>;
}
