//! Realtime hub — session registry and notification fan-out.
//!
//! Every connected client holds one long-lived session bound to exactly one
//! thing. The hub never writes to a transport: it enqueues onto a per-session
//! unbounded queue whose single writer is the transport task, so concurrent
//! notifications can never interleave partial frames. Publish calls return as
//! soon as the message is queued; a slow consumer blocks neither the mutation
//! nor any other consumer.
//!
//! Publishers invoke the hub from inside the owning thing's critical section,
//! which keeps the per-thing wire order identical to the mutation order.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use thinghub_domain::event::Event;
use thinghub_domain::id::{SessionId, ThingId};

/// Outbound realtime frame, serialized as `{"messageType": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "messageType", content = "data", rename_all = "camelCase")]
pub enum OutboundFrame {
    /// Sent once when a session binds to its thing.
    Connected(bool),
    /// Changed property name → value (a full snapshot on bind).
    PropertyStatus(Value),
    /// Action wire form keyed by name.
    ActionStatus(Value),
    /// Event wire form keyed by name.
    Event(Value),
    /// `{status, message, request?}`.
    Error(Value),
}

/// Message pushed onto a session's outbound queue.
#[derive(Debug, Clone)]
pub enum SessionMessage {
    Frame(OutboundFrame),
    /// Force-close signal. The transport must deliver a close to the peer;
    /// nothing is enqueued after it.
    Close,
}

struct Session {
    thing_id: ThingId,
    tx: mpsc::UnboundedSender<SessionMessage>,
    all_events: bool,
    event_names: HashSet<String>,
}

struct EventStream {
    thing_id: ThingId,
    event_name: Option<String>,
    tx: mpsc::UnboundedSender<Event>,
}

/// Session registry and fan-out engine.
///
/// Interior mutability is `std::sync::Mutex`: every operation only moves
/// messages onto unbounded queues and never awaits while holding a lock.
#[derive(Default)]
pub struct RealtimeHub {
    sessions: Mutex<HashMap<SessionId, Session>>,
    event_streams: Mutex<HashMap<SessionId, EventStream>>,
    discovery: Mutex<HashMap<SessionId, mpsc::UnboundedSender<Value>>>,
}

impl RealtimeHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session bound to `thing_id`. The caller is responsible for
    /// checking that the thing exists *before* binding.
    ///
    /// Returns the session id and the receiving end of the outbound queue;
    /// the transport task draining it is the session's single writer.
    pub fn open_session(
        &self,
        thing_id: ThingId,
    ) -> (SessionId, mpsc::UnboundedReceiver<SessionMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = SessionId::new();
        self.sessions.lock().unwrap().insert(
            session_id,
            Session {
                thing_id,
                tx,
                all_events: false,
                event_names: HashSet::new(),
            },
        );
        (session_id, rx)
    }

    /// Drop a session. Queued messages already handed to the transport task
    /// are unaffected.
    pub fn close_session(&self, session_id: SessionId) {
        self.sessions.lock().unwrap().remove(&session_id);
    }

    /// Add event subscriptions to a session. An empty name list subscribes to
    /// every event on the bound thing. Names that match no declared event are
    /// accepted — they simply never fire.
    pub fn subscribe_events<I, S>(&self, session_id: SessionId, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sessions = self.sessions.lock().unwrap();
        let Some(session) = sessions.get_mut(&session_id) else {
            return;
        };
        let mut added = false;
        for name in names {
            session.event_names.insert(name.into());
            added = true;
        }
        if !added {
            session.all_events = true;
        }
    }

    /// Open a one-shot stream for a single `(thing, event)` pair, or every
    /// event on the thing when `event_name` is `None`. The caller validates
    /// existence of both before subscribing.
    pub fn open_event_stream(
        &self,
        thing_id: ThingId,
        event_name: Option<String>,
    ) -> (SessionId, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream_id = SessionId::new();
        self.event_streams.lock().unwrap().insert(
            stream_id,
            EventStream {
                thing_id,
                event_name,
                tx,
            },
        );
        (stream_id, rx)
    }

    /// Drop a one-shot event stream.
    pub fn close_event_stream(&self, stream_id: SessionId) {
        self.event_streams.lock().unwrap().remove(&stream_id);
    }

    /// Subscribe to the global discovery stream of newly staged descriptors.
    pub fn open_discovery(&self) -> (SessionId, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream_id = SessionId::new();
        self.discovery.lock().unwrap().insert(stream_id, tx);
        (stream_id, rx)
    }

    /// Drop a discovery stream subscriber.
    pub fn close_discovery(&self, stream_id: SessionId) {
        self.discovery.lock().unwrap().remove(&stream_id);
    }

    /// Enqueue a frame on every session bound to `thing_id`, including the
    /// session that triggered the change.
    fn send_to_thing(&self, thing_id: &ThingId, frame: &OutboundFrame) {
        let sessions = self.sessions.lock().unwrap();
        for session in sessions.values() {
            if session.thing_id == *thing_id {
                let _ = session.tx.send(SessionMessage::Frame(frame.clone()));
            }
        }
    }

    /// Fan a changed property out to every session bound to the thing,
    /// including the session that triggered the change.
    pub fn publish_property(&self, thing_id: &ThingId, name: &str, value: &Value) {
        self.send_to_thing(
            thing_id,
            &OutboundFrame::PropertyStatus(json!({ name: value })),
        );
    }

    /// Fan an action status out: to the owning thing's sessions, or to every
    /// session for gateway-scoped actions.
    pub fn publish_action(&self, thing_id: Option<&ThingId>, wire: Value) {
        let frame = OutboundFrame::ActionStatus(wire);
        match thing_id {
            Some(thing_id) => self.send_to_thing(thing_id, &frame),
            None => {
                let sessions = self.sessions.lock().unwrap();
                for session in sessions.values() {
                    let _ = session.tx.send(SessionMessage::Frame(frame.clone()));
                }
            }
        }
    }

    /// Fan an event out to matching session subscriptions and one-shot
    /// streams.
    pub fn publish_event(&self, thing_id: &ThingId, event: &Event) {
        let frame = OutboundFrame::Event(event.to_wire());
        {
            let sessions = self.sessions.lock().unwrap();
            for session in sessions.values() {
                if session.thing_id == *thing_id
                    && (session.all_events || session.event_names.contains(&event.name))
                {
                    let _ = session.tx.send(SessionMessage::Frame(frame.clone()));
                }
            }
        }
        let streams = self.event_streams.lock().unwrap();
        for stream in streams.values() {
            if stream.thing_id == *thing_id
                && stream
                    .event_name
                    .as_ref()
                    .is_none_or(|name| *name == event.name)
            {
                let _ = stream.tx.send(event.clone());
            }
        }
    }

    /// Fan a newly staged descriptor out to discovery subscribers.
    pub fn publish_discovery(&self, description: &Value) {
        let subscribers = self.discovery.lock().unwrap();
        for tx in subscribers.values() {
            let _ = tx.send(description.clone());
        }
    }

    /// Force-close every session and one-shot stream bound to the thing.
    ///
    /// The close signal is the last message each session receives; dropping
    /// the stream senders ends their transports, so closure is observed by
    /// the peers rather than silently dropped.
    pub fn close_thing_sessions(&self, thing_id: &ThingId) {
        self.sessions.lock().unwrap().retain(|_, session| {
            if session.thing_id == *thing_id {
                let _ = session.tx.send(SessionMessage::Close);
                false
            } else {
                true
            }
        });
        self.event_streams
            .lock()
            .unwrap()
            .retain(|_, stream| stream.thing_id != *thing_id);
    }

    /// Enqueue an error frame on a single session.
    pub fn send_error(&self, session_id: SessionId, data: Value) {
        let sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get(&session_id) {
            let _ = session
                .tx
                .send(SessionMessage::Frame(OutboundFrame::Error(data)));
        }
    }

    /// Enqueue an arbitrary frame on a single session (bind-time snapshot).
    pub fn send_frame(&self, session_id: SessionId, frame: OutboundFrame) {
        let sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get(&session_id) {
            let _ = session.tx.send(SessionMessage::Frame(frame));
        }
    }

    /// Number of live sessions bound to the thing.
    #[must_use]
    pub fn session_count(&self, thing_id: &ThingId) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|session| session.thing_id == *thing_id)
            .count()
    }
}
