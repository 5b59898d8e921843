//! # Browse Sessions
//!
//! Paged embeds delivered to a user by direct message. Every session owns a
//! [`Paginator`] task; navigation requests from the operator API reach it
//! through the session's input channel. A session ends when dismissed or
//! after the configured idle timeout.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::paginator::{PageInput, Paginator};
use crate::platform::{ChatPlatform, Embed, PlatformError, UserId};

const INPUT_BUFFER: usize = 8;

#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("nothing to browse")]
    Empty,
    #[error("browse session {0} not found")]
    UnknownSession(Uuid),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Navigation request for a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseAction {
    Next,
    Previous,
    Dismiss,
}

impl From<BrowseAction> for PageInput {
    fn from(action: BrowseAction) -> Self {
        match action {
            BrowseAction::Next => PageInput::Next,
            BrowseAction::Previous => PageInput::Previous,
            BrowseAction::Dismiss => PageInput::Dismiss,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BrowseSession {
    pub session_id: Uuid,
    pub user_id: UserId,
    pub pages: usize,
    pub idle_timeout_seconds: u64,
}

/// Notified after each page is delivered.
#[async_trait]
pub trait PageObserver: Send + Sync {
    async fn page_shown(&self, index: usize);
}

#[derive(Clone)]
pub struct BrowseSessions {
    platform: Arc<dyn ChatPlatform>,
    idle_timeout: Duration,
    inputs: Arc<Mutex<HashMap<Uuid, mpsc::Sender<PageInput>>>>,
}

impl BrowseSessions {
    pub fn new(platform: Arc<dyn ChatPlatform>, idle_timeout: Duration) -> Self {
        Self {
            platform,
            idle_timeout,
            inputs: Arc::default(),
        }
    }

    /// Delivers the first page to `user_id` and keeps the session open for
    /// navigation. Fails without opening a session if that delivery fails.
    pub async fn start(
        &self,
        user_id: UserId,
        pages: Vec<Embed>,
        observer: Option<Arc<dyn PageObserver>>,
    ) -> Result<BrowseSession, BrowseError> {
        let mut paginator = Paginator::new(pages, self.idle_timeout).ok_or(BrowseError::Empty)?;

        self.platform.send_direct(user_id, paginator.current()).await?;
        if let Some(observer) = &observer {
            observer.page_shown(paginator.index()).await;
        }

        let session_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(INPUT_BUFFER);
        self.inputs.lock().await.insert(session_id, tx);

        let session = BrowseSession {
            session_id,
            user_id,
            pages: paginator.len(),
            idle_timeout_seconds: paginator.idle_timeout().as_secs(),
        };
        info!(%session_id, user_id, pages = session.pages, "Browse session started");

        let platform = Arc::clone(&self.platform);
        let inputs = Arc::clone(&self.inputs);
        tokio::spawn(async move {
            let exit = paginator
                .follow(&mut rx, |index, page| {
                    let platform = Arc::clone(&platform);
                    let observer = observer.clone();
                    let page = page.clone();
                    async move {
                        match platform.send_direct(user_id, &page).await {
                            Ok(()) => {
                                if let Some(observer) = observer {
                                    observer.page_shown(index).await;
                                }
                            }
                            Err(err) => {
                                warn!(%session_id, user_id, error = %err, "Failed to deliver page")
                            }
                        }
                    }
                })
                .await;
            inputs.lock().await.remove(&session_id);
            debug!(%session_id, ?exit, "Browse session ended");
        });

        Ok(session)
    }

    pub async fn navigate(&self, session_id: Uuid, action: BrowseAction) -> Result<(), BrowseError> {
        let sender = self
            .inputs
            .lock()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(BrowseError::UnknownSession(session_id))?;
        sender
            .send(action.into())
            .await
            .map_err(|_| BrowseError::UnknownSession(session_id))
    }

    /// Number of sessions still accepting input.
    pub async fn active(&self) -> usize {
        self.inputs.lock().await.len()
    }
}
