//! Event handler table
//!
//! A concurrent registry that routes each decoded event to every handler
//! whose declared payload type matches the event's runtime kind. Handlers
//! registered over [`Event`] itself carry the universal tag and see every
//! event. Two primitives are derived on top: a one-shot predicate wait and a
//! filtered subscription channel.

use chat_proto::{Event, EventKind, EventPayload};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffer size of channels returned by [`Handler::chan_for`]
///
/// If a subscriber lags this far behind, further matching events are dropped
/// with a debug log until the channel drains.
pub const CHAN_BUFFER: usize = 1;

/// Errors from dynamic handler registration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The boxed value passed to `add_handler_check` was not a handler
    #[error("given interface is not a function")]
    NotAFunction,
}

struct Entry {
    /// `None` is the universal tag: the entry fires for every event.
    kind: Option<EventKind>,
    invoke: Box<dyn Fn(&Event) + Send + Sync>,
}

#[derive(Default)]
struct HandlerInner {
    entries: RwLock<HashMap<u64, Entry>>,
    next_id: AtomicU64,
}

/// Type-indexed event handler registry
///
/// Cheap to clone; clones share the same table. Registration, removal, and
/// dispatch may be interleaved freely from any thread. Handlers run
/// synchronously on the dispatching task, in no particular order; a handler
/// that blocks delays every handler after it for that event.
#[derive(Clone, Default)]
pub struct Handler {
    inner: Arc<HandlerInner>,
}

impl Handler {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler
    ///
    /// The payload type selects which events the handler sees:
    ///
    /// ```ignore
    /// // Only MESSAGE_CREATE:
    /// let rm = handler.add_handler(|msg: &MessageCreateEvent| { /* ... */ });
    /// // Every event:
    /// let rm = handler.add_handler(|event: &Event| { /* ... */ });
    /// rm.remove();
    /// ```
    ///
    /// The returned [`Removal`] deletes the entry; removing twice is a
    /// no-op.
    pub fn add_handler<E, F>(&self, handler: F) -> Removal
    where
        E: EventPayload,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.attach(Entry {
            kind: E::KIND,
            invoke: Box::new(move |event| {
                if let Some(payload) = E::from_event(event) {
                    handler(payload);
                }
            }),
        })
    }

    /// Register a type-erased handler checked at runtime
    ///
    /// Accepts only a boxed [`ErasedHandler`]; any other value is rejected
    /// with [`HandlerError::NotAFunction`].
    pub fn add_handler_check(&self, value: Box<dyn Any>) -> Result<Removal, HandlerError> {
        match value.downcast::<ErasedHandler>() {
            Ok(handler) => Ok(self.attach(handler.entry)),
            Err(_) => Err(HandlerError::NotAFunction),
        }
    }

    /// Dispatch one event to every matching handler
    pub fn call(&self, event: &Event) {
        let entries = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let kind = event.kind();
        for entry in entries.values() {
            if entry.kind.is_none() || entry.kind == Some(kind) {
                (entry.invoke)(event);
            }
        }
    }

    /// Wait for the first event the predicate accepts
    ///
    /// The predicate runs on the dispatching task and must be quick. The
    /// temporary handler is removed when this future completes *or is
    /// dropped* - wrap the call in [`tokio::time::timeout`] for a deadline;
    /// an elapsed timeout cancels the wait cleanly. Returns `None` only if
    /// the registry disappears while waiting.
    pub async fn wait_for<F>(&self, predicate: F) -> Option<Event>
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::channel(1);

        let removal = self.add_handler(move |event: &Event| {
            if predicate(event) {
                let _ = tx.try_send(event.clone());
            }
        });
        let _guard = RemoveOnDrop(removal);

        rx.recv().await
    }

    /// Stream every event the predicate accepts
    ///
    /// The channel is buffered with [`CHAN_BUFFER`] slots; a full buffer
    /// drops the event. The returned [`Removal`] cancels the subscription.
    pub fn chan_for<F>(&self, predicate: F) -> (mpsc::Receiver<Event>, Removal)
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(CHAN_BUFFER);

        let removal = self.add_handler(move |event: &Event| {
            if predicate(event) && tx.try_send(event.clone()).is_err() {
                tracing::debug!(event = %event.name(), "subscription channel full, dropping event");
            }
        });

        (rx, removal)
    }

    fn attach(&self, entry: Entry) -> Removal {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, entry);

        Removal {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Handler")
            .field("handlers", &entries.len())
            .finish()
    }
}

/// Token that deletes a registered handler
///
/// Removal is idempotent, and harmless after the registry itself is gone.
pub struct Removal {
    inner: Weak<HandlerInner>,
    id: u64,
}

impl Removal {
    /// Delete the handler this token was returned for
    pub fn remove(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Removal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Removal").field("id", &self.id).finish()
    }
}

struct RemoveOnDrop(Removal);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        self.0.remove();
    }
}

/// A pre-erased handler for dynamic registration via
/// [`Handler::add_handler_check`]
pub struct ErasedHandler {
    entry: Entry,
}

impl ErasedHandler {
    /// Erase a typed handler
    pub fn new<E, F>(handler: F) -> Self
    where
        E: EventPayload,
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self {
            entry: Entry {
                kind: E::KIND,
                invoke: Box::new(move |event| {
                    if let Some(payload) = E::from_event(event) {
                        handler(payload);
                    }
                }),
            },
        }
    }
}

impl std::fmt::Debug for ErasedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedHandler")
            .field("kind", &self.entry.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_proto::{
        ChannelDeleteEvent, MessageCreateEvent, Snowflake, TypingStartEvent,
    };
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    fn message(content: &str) -> Event {
        Event::MessageCreate(MessageCreateEvent {
            content: content.to_string(),
            ..Default::default()
        })
    }

    fn typing(channel_id: i64) -> Event {
        Event::TypingStart(TypingStartEvent {
            channel_id: Snowflake::new(channel_id),
            ..Default::default()
        })
    }

    #[test]
    fn test_add_call_remove() {
        let (results_tx, results_rx) = std_mpsc::channel();

        let h = Handler::new();
        let rm = h.add_handler(move |msg: &MessageCreateEvent| {
            results_tx.send(msg.content.clone()).unwrap();
        });

        h.call(&message("test"));
        assert_eq!(results_rx.recv().unwrap(), "test");

        rm.remove();
        h.call(&message("test"));
        assert!(results_rx
            .recv_timeout(Duration::from_millis(1))
            .is_err());
    }

    #[test]
    fn test_removal_is_idempotent() {
        let h = Handler::new();
        let rm = h.add_handler(|_: &MessageCreateEvent| {});
        assert_eq!(h.len(), 1);

        rm.remove();
        rm.remove();
        rm.remove();
        assert_eq!(h.len(), 0);
    }

    #[test]
    fn test_type_mismatch_not_invoked() {
        let (results_tx, results_rx) = std_mpsc::channel();

        let h = Handler::new();
        let _rm = h.add_handler(move |msg: &MessageCreateEvent| {
            results_tx.send(msg.content.clone()).unwrap();
        });

        h.call(&typing(1));
        assert!(results_rx
            .recv_timeout(Duration::from_millis(1))
            .is_err());
    }

    #[test]
    fn test_any_event_handler() {
        let (results_tx, results_rx) = std_mpsc::channel();

        let h = Handler::new();
        let _rm = h.add_handler(move |event: &Event| {
            results_tx.send(event.clone()).unwrap();
        });

        h.call(&typing(42));

        // The concrete kind is recoverable from the delivered event.
        let received = results_rx.recv().unwrap();
        assert_eq!(received.kind(), EventKind::TypingStart);
        let payload = TypingStartEvent::from_event(&received).unwrap();
        assert_eq!(payload.channel_id, Snowflake::new(42));
    }

    #[test]
    fn test_add_handler_check_rejects_non_handlers() {
        let h = Handler::new();

        let err = h
            .add_handler_check(Box::new("this should be rejected"))
            .unwrap_err();
        assert_eq!(err, HandlerError::NotAFunction);
        assert!(err
            .to_string()
            .contains("given interface is not a function"));
        assert_eq!(h.len(), 0);
    }

    #[test]
    fn test_add_handler_check_accepts_erased_handlers() {
        let (results_tx, results_rx) = std_mpsc::channel();

        let h = Handler::new();
        let rm = h
            .add_handler_check(Box::new(ErasedHandler::new(
                move |msg: &MessageCreateEvent| {
                    results_tx.send(msg.content.clone()).unwrap();
                },
            )))
            .unwrap();

        h.call(&message("dynamic dispatch"));
        assert_eq!(results_rx.recv().unwrap(), "dynamic dispatch");
        rm.remove();
    }

    fn wanted_predicate(event: &Event) -> bool {
        match event {
            Event::TypingStart(typing) => typing.channel_id == Snowflake::new(123456),
            _ => false,
        }
    }

    #[tokio::test]
    async fn test_wait_for_first_match() {
        let h = Handler::new();

        let waiter = {
            let h = h.clone();
            tokio::spawn(async move { h.wait_for(wanted_predicate).await })
        };

        // Give the waiter a chance to register before dispatching.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let events = [
            typing(0),
            message("nope"),
            Event::ChannelDelete(ChannelDeleteEvent::default()),
            typing(123456),
        ];
        for event in &events {
            h.call(event);
        }

        let received = waiter.await.unwrap().expect("waiter should get an event");
        assert_eq!(received, typing(123456));

        // The one-shot handler is gone once the wait resolves.
        assert_eq!(h.len(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let h = Handler::new();

        let result =
            tokio::time::timeout(Duration::from_millis(1), h.wait_for(|_| false)).await;
        assert!(result.is_err(), "predicate never matches, so the wait times out");

        // Dropping the timed-out future removed the temporary handler.
        assert_eq!(h.len(), 0);
    }

    #[tokio::test]
    async fn test_chan_for_streams_matches() {
        let h = Handler::new();
        let (mut rx, cancel) = h.chan_for(wanted_predicate);

        let events = [
            typing(0),
            message("nope"),
            Event::ChannelDelete(ChannelDeleteEvent::default()),
            typing(123456),
        ];
        for event in &events {
            h.call(event);
        }

        let received = rx.recv().await.expect("channel should yield the match");
        assert_eq!(received, typing(123456));
        assert!(rx.try_recv().is_err(), "only the matching event is delivered");

        cancel.remove();
        assert_eq!(h.len(), 0);
    }

    #[test]
    fn test_call_with_no_handlers() {
        let h = Handler::new();
        h.call(&message("nobody listening"));
    }
}
