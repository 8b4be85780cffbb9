//! Token lifecycle notifications.
//!
//! Listeners are registered on the [`Authorizer`](crate::Authorizer) at
//! construction and run synchronously, before the record is persisted.

use std::sync::mpsc;

use crate::token::TokenRecord;

/// Emitted after a successful access token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGenerated {
    /// Record with the freshly assigned credentials.
    pub record: TokenRecord,
}

/// Receives token lifecycle events.
///
/// Implemented for any `Fn(&TokenGenerated) + Send + Sync` closure.
pub trait TokenListener: Send + Sync {
    fn on_token_generated(&self, event: &TokenGenerated);
}

impl<F> TokenListener for F
where
    F: Fn(&TokenGenerated) + Send + Sync,
{
    fn on_token_generated(&self, event: &TokenGenerated) {
        self(event);
    }
}

/// Audit listener writing one `info` event per generated token.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl TokenListener for TracingListener {
    fn on_token_generated(&self, event: &TokenGenerated) {
        let record = &event.record;
        tracing::info!(
            consumer_key = record.consumer_key(),
            base_url = record.base_url(),
            id = record.id().map(ToString::to_string),
            expires_at = record.expires_at().map(|at| at.to_rfc3339()),
            "OAuth token generated"
        );
    }
}

/// Channel-based delivery of token events.
pub struct TokenEvents;

impl TokenEvents {
    /// Create a connected listener and receiver pair.
    ///
    /// Events sent after the receiver is dropped are discarded.
    #[must_use]
    pub fn channel() -> (ChannelListener, TokenEventReceiver) {
        let (tx, rx) = mpsc::channel();
        (ChannelListener { tx }, TokenEventReceiver { rx })
    }
}

/// Listener half of [`TokenEvents::channel`].
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::Sender<TokenGenerated>,
}

impl TokenListener for ChannelListener {
    fn on_token_generated(&self, event: &TokenGenerated) {
        let _ = self.tx.send(event.clone());
    }
}

/// Receiver for token events.
///
/// Wraps a [`std::sync::mpsc::Receiver`]. Poll with [`recv()`](Self::recv)
/// or [`try_recv()`](Self::try_recv), or iterate with [`iter()`](Self::iter).
#[derive(Debug)]
pub struct TokenEventReceiver {
    rx: mpsc::Receiver<TokenGenerated>,
}

impl TokenEventReceiver {
    /// Wait for the next event (blocking).
    ///
    /// Returns `None` when every listener half is dropped.
    #[must_use]
    pub fn recv(&self) -> Option<TokenGenerated> {
        self.rx.recv().ok()
    }

    /// Try to receive an event without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<TokenGenerated> {
        self.rx.try_recv().ok()
    }

    /// Returns an iterator over events.
    ///
    /// Blocks until an event is available. Stops when every listener half
    /// is dropped.
    pub fn iter(&self) -> impl Iterator<Item = TokenGenerated> + '_ {
        self.rx.iter()
    }
}
