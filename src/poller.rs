//! Chat Poller
//!
//! Keeps a local copy of a chat's messages fresh by re-fetching the chat on
//! a fixed interval. The latest messages are published on a
//! `tokio::sync::watch` channel.
//!
//! One fetch is in flight at a time. A tick that comes due while a fetch is
//! running is delayed rather than bunched up, so responses are published in
//! request order.
//!
//! ```text
//!   spawn ─▶ fetch ─▶ publish ─▶ wait interval ─▶ fetch ─▶ ...
//!                 ╲
//!                  cancel ─▶ abandon fetch, publish nothing
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::model::{Chat, ChatMessage};

/// Source of chat documents
#[async_trait]
pub trait ChatFetcher: Send + Sync {
    async fn fetch_chat(&self, chat_id: &str) -> Result<Chat, ClientError>;
}

/// Poller configuration
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between fetches in milliseconds
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval_ms: 3000 }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Handle to a running poll loop for one chat.
///
/// Dropping the handle cancels the loop.
pub struct ChatPoller {
    chat_id: String,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    messages: watch::Receiver<Option<Vec<ChatMessage>>>,
}

impl ChatPoller {
    /// Start polling `chat_id`. Returns `None` for an empty chat id.
    ///
    /// The loop stops when `parent` or the poller's own token is cancelled.
    pub fn spawn(
        fetcher: Arc<dyn ChatFetcher>,
        chat_id: impl Into<String>,
        config: &PollerConfig,
        parent: &CancellationToken,
    ) -> Option<Self> {
        let chat_id = chat_id.into();
        if chat_id.is_empty() {
            return None;
        }

        let token = parent.child_token();
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(poll_loop(
            fetcher,
            chat_id.clone(),
            config.interval(),
            token.clone(),
            tx,
        ));

        tracing::debug!(chat_id = %chat_id, interval_ms = config.interval_ms, "Chat poller started");

        Some(Self {
            chat_id,
            token,
            handle: Some(handle),
            messages: rx,
        })
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// A receiver that sees every published message list
    pub fn subscribe(&self) -> watch::Receiver<Option<Vec<ChatMessage>>> {
        self.messages.clone()
    }

    /// Most recently published messages, `None` before the first success
    pub fn latest(&self) -> Option<Vec<ChatMessage>> {
        self.messages.borrow().clone()
    }

    /// Cancel the loop and wait for it to exit
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(chat_id = %self.chat_id, error = %e, "Chat poller task failed");
            }
        }
    }
}

impl Drop for ChatPoller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn poll_loop(
    fetcher: Arc<dyn ChatFetcher>,
    chat_id: String,
    period: Duration,
    token: CancellationToken,
    tx: watch::Sender<Option<Vec<ChatMessage>>>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = fetcher.fetch_chat(&chat_id) => result,
        };

        match result {
            Ok(chat) => {
                tx.send_replace(Some(chat.messages));
            }
            Err(e) => {
                tracing::debug!(chat_id = %chat_id, error = %e, "Chat poll failed");
            }
        }
    }

    tracing::debug!(chat_id = %chat_id, "Chat poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Returns one message per call, tagged with the call number
    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        fail_first: bool,
        /// Calls from this number on wait for `release`
        hold_from: Option<usize>,
        release: Notify,
    }

    impl FakeFetcher {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatFetcher for FakeFetcher {
        async fn fetch_chat(&self, chat_id: &str) -> Result<Chat, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.hold_from.map_or(false, |from| n >= from) {
                self.release.notified().await;
            }
            if self.fail_first && n == 1 {
                return Err(ClientError::FetchChat);
            }
            Ok(Chat {
                chat_id: Some(chat_id.to_string()),
                messages: vec![ChatMessage::new("u1", format!("m{}", n), n as i64)],
                ..Default::default()
            })
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_chat_id_spawns_nothing() {
        let fetcher = Arc::new(FakeFetcher::default());
        let poller = ChatPoller::spawn(
            fetcher.clone(),
            "",
            &PollerConfig::default(),
            &CancellationToken::new(),
        );
        assert!(poller.is_none());

        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_then_every_interval() {
        let fetcher = Arc::new(FakeFetcher::default());
        let poller = ChatPoller::spawn(
            fetcher.clone(),
            "c1",
            &PollerConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        tokio::time::sleep(ms(1)).await;
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(poller.latest().unwrap()[0].text, "m1");

        tokio::time::sleep(ms(2_998)).await;
        assert_eq!(fetcher.calls(), 1);

        tokio::time::sleep(ms(2)).await;
        assert_eq!(fetcher.calls(), 2);

        tokio::time::sleep(ms(6_000)).await;
        assert_eq!(fetcher.calls(), 4);
        assert_eq!(poller.latest().unwrap()[0].text, "m4");

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_swallowed() {
        let fetcher = Arc::new(FakeFetcher {
            fail_first: true,
            ..Default::default()
        });
        let poller = ChatPoller::spawn(
            fetcher.clone(),
            "c1",
            &PollerConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let mut rx = poller.subscribe();

        tokio::time::sleep(ms(1)).await;
        assert_eq!(fetcher.calls(), 1);
        assert!(poller.latest().is_none());

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap()[0].text, "m2");

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_polling() {
        let fetcher = Arc::new(FakeFetcher::default());
        let poller = ChatPoller::spawn(
            fetcher.clone(),
            "c1",
            &PollerConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let rx = poller.subscribe();

        tokio::time::sleep(ms(3_001)).await;
        assert_eq!(fetcher.calls(), 2);

        poller.stop().await;
        tokio::time::sleep(ms(30_000)).await;
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(rx.borrow().as_ref().unwrap()[0].text, "m2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_fetch_is_not_published_after_stop() {
        let fetcher = Arc::new(FakeFetcher {
            hold_from: Some(2),
            ..Default::default()
        });
        let poller = ChatPoller::spawn(
            fetcher.clone(),
            "c1",
            &PollerConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let rx = poller.subscribe();

        // Second fetch starts at 3000 ms and hangs
        tokio::time::sleep(ms(3_001)).await;
        assert_eq!(fetcher.calls(), 2);

        poller.stop().await;
        fetcher.release.notify_waiters();
        tokio::time::sleep(ms(10)).await;

        assert_eq!(rx.borrow().as_ref().unwrap()[0].text, "m1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_token_cancels() {
        let fetcher = Arc::new(FakeFetcher::default());
        let parent = CancellationToken::new();
        let poller =
            ChatPoller::spawn(fetcher.clone(), "c1", &PollerConfig::default(), &parent).unwrap();

        tokio::time::sleep(ms(1)).await;
        parent.cancel();
        tokio::time::sleep(ms(9_000)).await;

        assert_eq!(fetcher.calls(), 1);
        drop(poller);
    }
}
