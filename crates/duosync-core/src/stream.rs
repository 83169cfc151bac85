// ── Status streams ──
//
// Async, latest-value view of the state store for consumers that would
// rather await changes than register a callback.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::StatusSnapshot;

/// A subscription to the status map.
///
/// Intermediate commits may be skipped if the consumer is slow; only the
/// latest snapshot is ever observed.
pub struct StatusStream {
    current: StatusSnapshot,
    receiver: watch::Receiver<StatusSnapshot>,
}

impl StatusStream {
    pub(crate) fn new(receiver: watch::Receiver<StatusSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot as of creation or the last [`changed`](Self::changed).
    pub fn current(&self) -> &StatusSnapshot {
        &self.current
    }

    /// Latest snapshot (may be newer than `current`).
    pub fn latest(&self) -> StatusSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next commit and return its snapshot.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<StatusSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream`. The first item is the current snapshot.
    pub fn into_stream(self) -> StatusWatchStream {
        StatusWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StatusWatchStream {
    inner: WatchStream<StatusSnapshot>,
}

impl Stream for StatusWatchStream {
    type Item = StatusSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_stream::StreamExt;

    use crate::model::{PowerState, StatusPatch};
    use crate::store::StateStore;

    #[tokio::test]
    async fn changed_yields_committed_snapshot() {
        let store = StateStore::new();
        let mut stream = store.watch();
        assert!(stream.current().is_empty());

        store.update("a", &StatusPatch::default().with_state(PowerState::On));

        let snap = stream.changed().await.unwrap();
        assert!(snap["a"].is_on());
        assert_eq!(stream.current().len(), 1);
    }

    #[tokio::test]
    async fn into_stream_starts_with_current_view() {
        let store = StateStore::new();
        store.update("a", &StatusPatch::default());

        let mut stream = store.watch().into_stream();
        let first = stream.next().await.unwrap();
        assert!(first.contains_key("a"));

        store.update("b", &StatusPatch::default());
        let second = stream.next().await.unwrap();
        assert_eq!(second.len(), 2);
    }
}
