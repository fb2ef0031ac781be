//! In-process watch event delivery.
//!
//! Backends publish [`HostWatchEvent`]s into a [`WatchHub`]. Each call to
//! `watch` subscribes a fresh receiver, so subscribers only observe events
//! emitted after they subscribed. A [`WatchStream`] ends when it is
//! cancelled, dropped, or when every publisher is gone.

use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::path::HostPath;

/// Default broadcast buffer per hub.
pub const DEFAULT_WATCH_CAPACITY: usize = 256;

/// Kind of change reported by a watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostWatchEventKind {
    /// Existing file content was replaced.
    Changed,
    /// A new file appeared.
    Created,
    /// A file was removed.
    Deleted,
    /// A file moved; the event carries its destination.
    Renamed,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostWatchEvent {
    /// Change kind.
    pub kind: HostWatchEventKind,
    /// Affected path (the source path for renames).
    pub path: HostPath,
    /// Destination path, for renames only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<HostPath>,
    /// When the change happened.
    pub time: SystemTime,
}

impl HostWatchEvent {
    /// Create a non-rename event stamped with the current time.
    pub fn new(kind: HostWatchEventKind, path: HostPath) -> Self {
        Self {
            kind,
            path,
            destination: None,
            time: SystemTime::now(),
        }
    }

    /// Create a rename event.
    pub fn renamed(from: HostPath, to: HostPath) -> Self {
        Self {
            kind: HostWatchEventKind::Renamed,
            path: from,
            destination: Some(to),
            time: SystemTime::now(),
        }
    }

    /// Check whether this event falls inside a watch scope.
    ///
    /// Recursive scopes match the path itself and everything under it;
    /// non-recursive scopes match the path and its direct children. Rename
    /// events match if either end does.
    pub fn matches(&self, scope: &HostPath, recursive: bool) -> bool {
        let hit = |p: &HostPath| {
            if p == scope {
                true
            } else if recursive {
                scope.is_ancestor_of(p)
            } else {
                p.parent().as_ref() == Some(scope)
            }
        };
        hit(&self.path) || self.destination.as_ref().is_some_and(hit)
    }
}

/// Options for `watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Include events for the whole sub-tree, not only direct children.
    pub recursive: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { recursive: true }
    }
}

impl WatchOptions {
    /// Only direct children of the watched path.
    pub fn shallow() -> Self {
        Self { recursive: false }
    }
}

/// Fan-out point for watch events.
///
/// Cloning a hub shares its channel.
#[derive(Debug, Clone)]
pub struct WatchHub {
    tx: broadcast::Sender<HostWatchEvent>,
}

impl Default for WatchHub {
    fn default() -> Self {
        Self::new(DEFAULT_WATCH_CAPACITY)
    }
}

impl WatchHub {
    /// Create a hub with the given broadcast buffer.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish(&self, event: HostWatchEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Returns true if anyone is listening.
    pub fn has_subscribers(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Subscribe to events under `scope`.
    pub fn subscribe(&self, scope: HostPath, options: WatchOptions) -> WatchStream {
        WatchStream::from_receiver(self.tx.subscribe(), scope, options)
    }
}

/// Cancels a watch stream from outside the task consuming it.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    token: CancellationToken,
}

impl WatchHandle {
    /// Stop delivery. The stream yields `None` at its next poll.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Live, cancellable stream of watch events.
pub struct WatchStream {
    inner: BoxStream<'static, HostWatchEvent>,
    token: CancellationToken,
    scope: HostPath,
    // Keeps backend resources (e.g. an OS watcher) alive for the stream's lifetime.
    _guard: Option<Box<dyn Any + Send>>,
}

struct ReceiverState {
    rx: broadcast::Receiver<HostWatchEvent>,
    token: CancellationToken,
    scope: HostPath,
    recursive: bool,
}

impl WatchStream {
    fn from_receiver(
        rx: broadcast::Receiver<HostWatchEvent>,
        scope: HostPath,
        options: WatchOptions,
    ) -> Self {
        let token = CancellationToken::new();
        let state = ReceiverState {
            rx,
            token: token.clone(),
            scope: scope.clone(),
            recursive: options.recursive,
        };

        let inner = futures::stream::unfold(state, |mut st| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = st.token.cancelled() => return None,
                    msg = st.rx.recv() => match msg {
                        Ok(event) => {
                            if event.matches(&st.scope, st.recursive) {
                                return Some((event, st));
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(
                                scope = %st.scope,
                                lagged = n,
                                "Watch subscription lagged behind"
                            );
                        }
                    },
                }
            }
        })
        .boxed();

        Self {
            inner,
            token,
            scope,
            _guard: None,
        }
    }

    /// Tie a backend resource to this stream; it is dropped with the stream.
    pub fn with_guard(mut self, guard: impl Any + Send) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    /// Map every event through `f`, keeping cancellation and guards.
    ///
    /// Events for which `f` returns `None` are skipped.
    pub fn filter_map_events<F>(self, f: F) -> Self
    where
        F: Fn(HostWatchEvent) -> Option<HostWatchEvent> + Send + 'static,
    {
        let Self {
            inner,
            token,
            scope,
            _guard,
        } = self;
        Self {
            inner: inner.filter_map(move |ev| futures::future::ready(f(ev))).boxed(),
            token,
            scope,
            _guard,
        }
    }

    /// Replace the reported scope, e.g. after mapping event paths.
    pub fn with_scope(mut self, scope: HostPath) -> Self {
        self.scope = scope;
        self
    }

    /// The watched path.
    pub fn scope(&self) -> &HostPath {
        &self.scope
    }

    /// A handle that can cancel this stream.
    pub fn handle(&self) -> WatchHandle {
        WatchHandle {
            token: self.token.clone(),
        }
    }

    /// Cancel this stream.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Stream for WatchStream {
    type Item = HostWatchEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStream")
            .field("scope", &self.scope)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}
