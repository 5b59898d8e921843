//! Bounded-timeout page navigation.
//!
//! Inputs arrive on a channel (typically translated from reactions or button
//! presses). Navigation wraps around at both ends. The session ends on
//! dismissal, when the input channel closes, or after an idle timeout.

use std::{future::Future, time::Duration};

use tokio::{sync::mpsc, time::timeout};
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageInput {
    Next,
    Previous,
    Dismiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginatorExit {
    Dismissed,
    TimedOut,
    InputClosed,
}

#[derive(Debug)]
pub struct Paginator<P> {
    pages: Vec<P>,
    index: usize,
    idle_timeout: Duration,
}

impl<P> Paginator<P> {
    /// Returns `None` for an empty page list. The timeout is capped at
    /// [`MAX_TIMEOUT`].
    pub fn new(pages: Vec<P>, idle_timeout: Duration) -> Option<Self> {
        if pages.is_empty() {
            return None;
        }
        Some(Self {
            pages,
            index: 0,
            idle_timeout: idle_timeout.min(MAX_TIMEOUT),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn current(&self) -> &P {
        &self.pages[self.index]
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.pages.len();
    }

    pub fn retreat(&mut self) {
        self.index = (self.index + self.pages.len() - 1) % self.pages.len();
    }

    /// Renders the first page, then re-renders after every navigation input
    /// until the session ends.
    pub async fn drive<F, Fut>(
        &mut self,
        inputs: &mut mpsc::Receiver<PageInput>,
        mut render: F,
    ) -> PaginatorExit
    where
        F: FnMut(usize, &P) -> Fut,
        Fut: Future<Output = ()>,
    {
        render(self.index, self.current()).await;
        self.follow(inputs, render).await
    }

    /// Like [`Paginator::drive`] but assumes the current page is already
    /// shown, so only navigation inputs trigger a render.
    pub async fn follow<F, Fut>(
        &mut self,
        inputs: &mut mpsc::Receiver<PageInput>,
        mut render: F,
    ) -> PaginatorExit
    where
        F: FnMut(usize, &P) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            let input = match timeout(self.idle_timeout, inputs.recv()).await {
                Err(_) => {
                    debug!(page = self.index, "Paginator idle timeout");
                    return PaginatorExit::TimedOut;
                }
                Ok(None) => return PaginatorExit::InputClosed,
                Ok(Some(input)) => input,
            };

            match input {
                PageInput::Next => self.advance(),
                PageInput::Previous => self.retreat(),
                PageInput::Dismiss => return PaginatorExit::Dismissed,
            }
            render(self.index, self.current()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pages_rejected() {
        assert!(Paginator::<u8>::new(Vec::new(), DEFAULT_TIMEOUT).is_none());
    }

    #[test]
    fn test_navigation_wraps_both_ways() {
        let mut paginator = Paginator::new(vec!['a', 'b', 'c'], DEFAULT_TIMEOUT).unwrap();
        paginator.retreat();
        assert_eq!(*paginator.current(), 'c');
        paginator.advance();
        paginator.advance();
        assert_eq!(*paginator.current(), 'b');
    }

    #[test]
    fn test_timeout_is_capped() {
        let paginator = Paginator::new(vec![1], Duration::from_secs(600)).unwrap();
        assert_eq!(paginator.idle_timeout(), MAX_TIMEOUT);
    }

    #[tokio::test]
    async fn test_drive_renders_each_step_until_dismissed() {
        let (tx, mut rx) = mpsc::channel(8);
        for input in [PageInput::Next, PageInput::Next, PageInput::Next, PageInput::Dismiss] {
            tx.send(input).await.unwrap();
        }

        let mut paginator = Paginator::new(vec!["one", "two", "three"], DEFAULT_TIMEOUT).unwrap();
        let mut rendered = Vec::new();
        let exit = paginator
            .drive(&mut rx, |index, _| {
                rendered.push(index);
                async {}
            })
            .await;

        assert_eq!(exit, PaginatorExit::Dismissed);
        assert_eq!(rendered, vec![0, 1, 2, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_times_out_when_idle() {
        let (_tx, mut rx) = mpsc::channel::<PageInput>(1);
        let mut paginator = Paginator::new(vec![1, 2], DEFAULT_TIMEOUT).unwrap();

        let exit = paginator.drive(&mut rx, |_, _| async {}).await;
        assert_eq!(exit, PaginatorExit::TimedOut);
    }

    #[tokio::test]
    async fn test_follow_skips_initial_render() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(PageInput::Previous).await.unwrap();
        drop(tx);

        let mut paginator = Paginator::new(vec!["one", "two"], DEFAULT_TIMEOUT).unwrap();
        let mut rendered = Vec::new();
        let exit = paginator
            .follow(&mut rx, |index, _| {
                rendered.push(index);
                async {}
            })
            .await;

        assert_eq!(exit, PaginatorExit::InputClosed);
        assert_eq!(rendered, vec![1]);
    }

    #[tokio::test]
    async fn test_drive_ends_when_input_closes() {
        let (tx, mut rx) = mpsc::channel::<PageInput>(1);
        drop(tx);
        let mut paginator = Paginator::new(vec![1], DEFAULT_TIMEOUT).unwrap();

        let exit = paginator.drive(&mut rx, |_, _| async {}).await;
        assert_eq!(exit, PaginatorExit::InputClosed);
    }
}
