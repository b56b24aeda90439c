//! Receiver builder and control handle.

use crate::dispatcher::{DEFAULT_DISPATCH_INTERVAL, DispatchLoop, HandlerRegistry};
use crate::error::ServerError;
use crate::receiver::{DEFAULT_POLL_INTERVAL, StreamPoller};
use crate::registry::{ClientStreamRegistry, Routes, SenderToClientMap};
use crate::state::{Counters, LoopState, ReceiverStats, StateCell};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use switchyard_core::{JsonCodec, Message, MessageCodec, PriorityMap};
use switchyard_queue::PriorityQueue;
use switchyard_transport::Framer;
use switchyard_transport::framing::DEFAULT_MAX_FRAME_SIZE;

/// What happens to queued messages when the receiver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownMode {
    /// The termination signal jumps the queue; anything behind it is discarded.
    #[default]
    Immediate,
    /// The termination signal queues behind everything already received.
    Drain,
}

impl ShutdownMode {
    fn termination_priority(self) -> i32 {
        match self {
            Self::Immediate => PriorityMap::TERMINATION,
            Self::Drain => i32::MIN,
        }
    }
}

/// Builder for configuring and starting a receiver.
pub struct ReceiverBuilder {
    streams: Option<Arc<ClientStreamRegistry>>,
    sender_map: Option<Arc<SenderToClientMap>>,
    handlers: HandlerRegistry,
    priorities: PriorityMap,
    codec: Arc<dyn MessageCodec>,
    max_frame_size: usize,
    poll_interval: Duration,
    dispatch_interval: Duration,
    shutdown_mode: ShutdownMode,
}

impl ReceiverBuilder {
    /// Creates a new receiver builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: None,
            sender_map: None,
            handlers: HandlerRegistry::new(),
            priorities: PriorityMap::new(),
            codec: Arc::new(JsonCodec),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            dispatch_interval: DEFAULT_DISPATCH_INTERVAL,
            shutdown_mode: ShutdownMode::default(),
        }
    }

    /// Sets the client stream registry.
    #[must_use]
    pub fn streams(mut self, streams: Arc<ClientStreamRegistry>) -> Self {
        self.streams = Some(streams);
        self
    }

    /// Sets the sender to client map.
    #[must_use]
    pub fn sender_map(mut self, sender_map: Arc<SenderToClientMap>) -> Self {
        self.sender_map = Some(sender_map);
        self
    }

    /// Sets the handler registry.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Sets the event priority mapping.
    #[must_use]
    pub fn priorities(mut self, priorities: PriorityMap) -> Self {
        self.priorities = priorities;
        self
    }

    /// Sets the payload codec.
    #[must_use]
    pub fn codec<C: MessageCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets the poller's idle sleep.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the dispatch loop's idle sleep.
    #[must_use]
    pub fn dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    /// Sets the shutdown mode.
    #[must_use]
    pub fn shutdown_mode(mut self, mode: ShutdownMode) -> Self {
        self.shutdown_mode = mode;
        self
    }

    /// Spawns the poller and dispatch threads.
    ///
    /// # Errors
    /// Returns `ServerError::Io` if a thread cannot be spawned.
    pub fn start(self) -> Result<Receiver, ServerError> {
        let framer = Framer::new(self.codec).with_max_frame_size(self.max_frame_size);
        let routes = Routes::with_framer(
            self.streams.unwrap_or_default(),
            self.sender_map.unwrap_or_default(),
            framer,
        );
        let queue = Arc::new(PriorityQueue::new());
        let stop = Arc::new(AtomicBool::new(false));
        let poller_state = Arc::new(StateCell::new(LoopState::Running));
        let dispatcher_state = Arc::new(StateCell::new(LoopState::Running));
        let counters = Arc::new(Counters::default());

        let dispatch = DispatchLoop {
            queue: Arc::clone(&queue),
            handlers: self.handlers,
            routes: routes.clone(),
            interval: self.dispatch_interval,
            state: Arc::clone(&dispatcher_state),
            counters: Arc::clone(&counters),
        };
        let dispatcher = thread::Builder::new()
            .name("switchyard-dispatch".into())
            .spawn(move || dispatch.run())?;

        let poller = StreamPoller {
            routes: routes.clone(),
            queue: Arc::clone(&queue),
            priorities: self.priorities,
            interval: self.poll_interval,
            stop: Arc::clone(&stop),
            state: Arc::clone(&poller_state),
            counters: Arc::clone(&counters),
        };
        let mut receiver = Receiver {
            routes,
            queue,
            stop,
            poller: None,
            dispatcher: Some(dispatcher),
            poller_state,
            dispatcher_state,
            counters,
            shutdown_mode: self.shutdown_mode,
        };

        // On failure the receiver drops here and its Drop stops the dispatcher.
        let poller = thread::Builder::new()
            .name("switchyard-poller".into())
            .spawn(move || poller.run())?;
        receiver.poller = Some(poller);

        tracing::info!(mode = ?receiver.shutdown_mode, "receiver started");
        Ok(receiver)
    }
}

impl Default for ReceiverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary returned by [`Receiver::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Counters at the moment both loops had exited.
    pub stats: ReceiverStats,
    /// Messages left in the queue behind the termination signal.
    pub discarded: usize,
    /// Wall time spent in stop.
    pub elapsed: Duration,
}

/// Running receiver: a stream poller and a dispatch loop joined by a
/// priority queue.
///
/// Dropping the receiver stops it.
pub struct Receiver {
    routes: Routes,
    queue: Arc<PriorityQueue<Message>>,
    stop: Arc<AtomicBool>,
    poller: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
    poller_state: Arc<StateCell>,
    dispatcher_state: Arc<StateCell>,
    counters: Arc<Counters>,
    shutdown_mode: ShutdownMode,
}

impl Receiver {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> ReceiverBuilder {
        ReceiverBuilder::new()
    }

    /// Returns the routing tables shared with the loops.
    #[must_use]
    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Returns the number of messages waiting for dispatch.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns the poller's lifecycle state.
    #[must_use]
    pub fn poller_state(&self) -> LoopState {
        self.poller_state.get()
    }

    /// Returns the dispatch loop's lifecycle state.
    #[must_use]
    pub fn dispatcher_state(&self) -> LoopState {
        self.dispatcher_state.get()
    }

    /// Returns current counters.
    #[must_use]
    pub fn stats(&self) -> ReceiverStats {
        self.counters.snapshot()
    }

    /// Stops both loops and waits for them to exit.
    ///
    /// The poller is joined first, so nothing is enqueued after the
    /// termination signal. Returns within one poll interval plus one
    /// dispatch interval of both loops being idle.
    ///
    /// # Errors
    /// Returns `ServerError::LoopPanicked` if either loop thread panicked.
    pub fn stop(mut self) -> Result<ShutdownReport, ServerError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<ShutdownReport, ServerError> {
        let started = Instant::now();
        tracing::info!("receiver stopping");

        self.stop.store(true, Ordering::Release);
        if self.poller_state.get() == LoopState::Running {
            self.poller_state.set(LoopState::Stopping);
        }
        let poller = join(self.poller.take(), "poller", &self.poller_state);

        self.queue
            .enqueue(Message::termination(), self.shutdown_mode.termination_priority());
        if self.dispatcher_state.get() == LoopState::Running {
            self.dispatcher_state.set(LoopState::Stopping);
        }
        let dispatcher = join(self.dispatcher.take(), "dispatch", &self.dispatcher_state);

        let discarded = self
            .queue
            .drain()
            .into_iter()
            .filter(|m| !m.is_termination())
            .count();
        if discarded > 0 {
            tracing::warn!(discarded, "messages discarded at shutdown");
        }

        poller?;
        dispatcher?;

        let report = ShutdownReport {
            stats: self.counters.snapshot(),
            discarded,
            elapsed: started.elapsed(),
        };
        tracing::info!(elapsed = ?report.elapsed, "receiver stopped");
        Ok(report)
    }
}

fn join(
    handle: Option<JoinHandle<()>>,
    name: &'static str,
    state: &StateCell,
) -> Result<(), ServerError> {
    let Some(handle) = handle else {
        return Ok(());
    };
    let result = handle.join().map_err(|_| {
        tracing::error!(loop_name = name, "loop thread panicked");
        ServerError::LoopPanicked { name }
    });
    state.set(LoopState::Stopped);
    result
}

impl Drop for Receiver {
    fn drop(&mut self) {
        if (self.poller.is_some() || self.dispatcher.is_some())
            && let Err(e) = self.shutdown()
        {
            tracing::error!(error = %e, "receiver shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::{EventHandler, HandlerTable};
    use parking_lot::Mutex;
    use std::io::{Cursor, Write};
    use std::net::{TcpListener, TcpStream};
    use switchyard_core::EventType;

    const FAST: Duration = Duration::from_millis(10);

    fn wire(messages: &[Message]) -> Vec<u8> {
        let framer = Framer::new(JsonCodec);
        let mut out = Vec::new();
        for msg in messages {
            framer.write_message(&mut out, msg).unwrap();
        }
        out
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Records every Chat payload and maps senders on registration.
    struct Lobby {
        chats: Mutex<Vec<String>>,
    }

    impl Lobby {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                chats: Mutex::new(Vec::new()),
            })
        }
    }

    impl EventHandler for Lobby {
        fn handler_table(self: Arc<Self>) -> HandlerTable {
            HandlerTable::new()
                .on("Chat", move |msg| {
                    self.chats.lock().push(msg.data.clone());
                    Ok(())
                })
                .on_client_registration(|msg, routes| {
                    let sender = msg
                        .sender_id
                        .clone()
                        .ok_or_else(|| HandlerError::new("registration without sender"))?;
                    routes.senders().register(sender, msg.data.clone());
                    Ok(())
                })
        }
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ReceiverBuilder::default();
        assert_eq!(builder.poll_interval, Duration::from_millis(200));
        assert_eq!(builder.dispatch_interval, Duration::from_millis(500));
        assert_eq!(builder.max_frame_size, 64 * 1024);
        assert_eq!(builder.shutdown_mode, ShutdownMode::Immediate);
    }

    #[test]
    fn test_start_and_stop_idle() {
        let receiver = Receiver::builder()
            .poll_interval(FAST)
            .dispatch_interval(FAST)
            .start()
            .unwrap();
        assert_eq!(receiver.poller_state(), LoopState::Running);
        assert_eq!(receiver.dispatcher_state(), LoopState::Running);

        let report = receiver.stop().unwrap();
        assert_eq!(report.discarded, 0);
        assert_eq!(report.stats, ReceiverStats::default());
    }

    #[test]
    fn test_stop_latency_bound_with_default_intervals() {
        let receiver = Receiver::builder().start().unwrap();
        thread::sleep(Duration::from_millis(50));

        let report = receiver.stop().unwrap();
        let bound = DEFAULT_POLL_INTERVAL + DEFAULT_DISPATCH_INTERVAL + Duration::from_millis(300);
        assert!(report.elapsed < bound, "stop took {:?}", report.elapsed);
    }

    #[test]
    fn test_registration_maps_sender_to_stream_id() {
        let streams = Arc::new(ClientStreamRegistry::new());
        let senders = Arc::new(SenderToClientMap::new());
        let registration =
            Message::new(EventType::client_registration(), "forged-id").with_sender("alice");
        streams
            .insert("client-1", Cursor::new(wire(&[registration])))
            .unwrap();

        let mut handlers = HandlerRegistry::new();
        handlers.register("lobby", Lobby::new());

        let receiver = Receiver::builder()
            .streams(Arc::clone(&streams))
            .sender_map(Arc::clone(&senders))
            .handlers(handlers)
            .poll_interval(FAST)
            .dispatch_interval(FAST)
            .start()
            .unwrap();

        assert!(wait_until(|| senders.client_for("alice").is_some()));
        assert_eq!(senders.client_for("alice").as_deref(), Some("client-1"));
        receiver.stop().unwrap();
    }

    #[test]
    fn test_bad_stream_does_not_stop_others() {
        let streams = Arc::new(ClientStreamRegistry::new());
        let mut truncated = wire(&[Message::new("Chat", "lost")]);
        truncated.truncate(6);
        streams.insert("a-broken", Cursor::new(truncated)).unwrap();
        streams
            .insert(
                "b-healthy",
                Cursor::new(wire(&[Message::new("Chat", "one"), Message::new("Chat", "two")])),
            )
            .unwrap();

        let lobby = Lobby::new();
        let mut handlers = HandlerRegistry::new();
        handlers.register("lobby", Arc::clone(&lobby));

        let receiver = Receiver::builder()
            .streams(Arc::clone(&streams))
            .handlers(handlers)
            .poll_interval(FAST)
            .dispatch_interval(FAST)
            .start()
            .unwrap();

        assert!(wait_until(|| lobby.chats.lock().len() == 2));
        assert_eq!(*lobby.chats.lock(), vec!["one", "two"]);
        assert_eq!(streams.is_faulted("a-broken"), Some(true));

        let report = receiver.stop().unwrap();
        assert_eq!(report.stats.faulted_streams, 1);
        assert_eq!(report.stats.received, 2);
    }

    #[test]
    fn test_drain_mode_delivers_everything_queued() {
        let streams = Arc::new(ClientStreamRegistry::new());
        let messages: Vec<_> = (0..20).map(|i| Message::new("Chat", i.to_string())).collect();
        streams.insert("a", Cursor::new(wire(&messages))).unwrap();

        let lobby = Lobby::new();
        let mut handlers = HandlerRegistry::new();
        handlers.register("lobby", Arc::clone(&lobby));

        let receiver = Receiver::builder()
            .streams(streams)
            .handlers(handlers)
            .poll_interval(FAST)
            .dispatch_interval(Duration::from_secs(1))
            .shutdown_mode(ShutdownMode::Drain)
            .start()
            .unwrap();

        assert!(wait_until(|| receiver.stats().received == 20));
        let report = receiver.stop().unwrap();

        assert_eq!(report.discarded, 0);
        assert_eq!(report.stats.dispatched, 20);
        let expected: Vec<_> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(*lobby.chats.lock(), expected);
    }

    #[test]
    fn test_stop_from_drop() {
        let lobby = Lobby::new();
        let mut handlers = HandlerRegistry::new();
        handlers.register("lobby", Arc::clone(&lobby));

        let receiver = Receiver::builder()
            .handlers(handlers)
            .poll_interval(FAST)
            .dispatch_interval(FAST)
            .start()
            .unwrap();
        drop(receiver);

        // The lobby table was owned by the dispatch thread; once it has
        // exited only this reference remains.
        assert_eq!(Arc::strong_count(&lobby), 1);
    }

    #[test]
    fn test_tcp_round_trip_with_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        let streams = Arc::new(ClientStreamRegistry::new());
        streams.insert("tcp-1", accepted).unwrap();

        let replies: Arc<Mutex<Option<Routes>>> = Arc::new(Mutex::new(None));
        let replies_clone = Arc::clone(&replies);
        let mut handlers = HandlerRegistry::new();
        handlers.register_table(
            "echo",
            HandlerTable::new()
                .on_client_registration(move |msg, routes| {
                    if let Some(sender) = &msg.sender_id {
                        routes.senders().register(sender.clone(), msg.data.clone());
                    }
                    *replies_clone.lock() = Some(routes.clone());
                    Ok(())
                })
                .on("Chat", {
                    let replies = Arc::clone(&replies);
                    move |msg: &Message| {
                        let routes = replies
                            .lock()
                            .clone()
                            .ok_or_else(|| HandlerError::new("not registered"))?;
                        let sender = msg.sender_id.as_deref().unwrap_or_default();
                        let reply = Message::new("Echo", msg.data.clone());
                        routes.send_to_sender(sender, &reply)?;
                        Ok(())
                    }
                }),
        );

        let receiver = Receiver::builder()
            .streams(streams)
            .handlers(handlers)
            .priorities(PriorityMap::new().with(EventType::client_registration(), 10))
            .poll_interval(FAST)
            .dispatch_interval(FAST)
            .start()
            .unwrap();

        let framer = Framer::new(JsonCodec);
        framer
            .write_message(
                &mut client,
                &Message::new(EventType::client_registration(), "").with_sender("zed"),
            )
            .unwrap();
        framer
            .write_message(&mut client, &Message::new("Chat", "ping").with_sender("zed"))
            .unwrap();
        client.flush().unwrap();

        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reply = framer.read_message(&mut client).unwrap();
        assert_eq!(reply.event_type.as_str(), "Echo");
        assert_eq!(reply.data, "ping");
        assert_eq!(
            receiver.routes().senders().client_for("zed").as_deref(),
            Some("tcp-1")
        );

        receiver.stop().unwrap();
    }

    fn tcp_pair(listener: &TcpListener) -> (TcpStream, TcpStream) {
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        (client, accepted)
    }

    #[test]
    fn test_reply_not_blocked_by_partial_frame_from_same_client() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let (mut slow, slow_accepted) = tcp_pair(&listener);
        let (mut fast, fast_accepted) = tcp_pair(&listener);

        let streams = Arc::new(ClientStreamRegistry::new());
        streams.insert("a-slow", slow_accepted).unwrap();
        streams.insert("b-fast", fast_accepted).unwrap();

        let slot: Arc<Mutex<Option<Routes>>> = Arc::new(Mutex::new(None));
        let handler_slot = Arc::clone(&slot);
        let mut handlers = HandlerRegistry::new();
        handlers.register_table(
            "pinger",
            HandlerTable::new().on("Ping", move |_msg: &Message| {
                thread::sleep(Duration::from_millis(200));
                let routes = handler_slot
                    .lock()
                    .clone()
                    .ok_or_else(|| HandlerError::new("routes not ready"))?;
                routes.send_to_client("a-slow", &Message::new("Pong", "for a"))?;
                Ok(())
            }),
        );

        let receiver = Receiver::builder()
            .streams(streams)
            .handlers(handlers)
            .poll_interval(FAST)
            .dispatch_interval(FAST)
            .start()
            .unwrap();
        *slot.lock() = Some(receiver.routes().clone());

        let framer = Framer::new(JsonCodec);
        framer
            .write_message(&mut fast, &Message::new("Ping", ""))
            .unwrap();
        assert!(wait_until(|| receiver.stats().received == 1));

        // The poller now blocks inside this client's frame.
        let frame = wire(&[Message::new("Chat", "eventually")]);
        slow.write_all(&frame[..2]).unwrap();
        slow.flush().unwrap();

        slow.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let reply = framer.read_message(&mut slow).unwrap();
        assert_eq!(reply.event_type.as_str(), "Pong");
        assert_eq!(reply.data, "for a");

        slow.write_all(&frame[2..]).unwrap();
        slow.flush().unwrap();
        assert!(wait_until(|| receiver.stats().received == 2));

        let report = receiver.stop().unwrap();
        assert_eq!(report.stats.handler_failures, 0);
        assert_eq!(report.stats.faulted_streams, 0);
    }

    #[test]
    fn test_tcp_peer_dropped_mid_frame_others_keep_flowing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let (mut dropped, dropped_accepted) = tcp_pair(&listener);
        let (mut healthy, healthy_accepted) = tcp_pair(&listener);

        let streams = Arc::new(ClientStreamRegistry::new());
        streams.insert("a-dropped", dropped_accepted).unwrap();
        streams.insert("b-healthy", healthy_accepted).unwrap();

        let lobby = Lobby::new();
        let mut handlers = HandlerRegistry::new();
        handlers.register("lobby", Arc::clone(&lobby));

        let receiver = Receiver::builder()
            .streams(Arc::clone(&streams))
            .handlers(handlers)
            .poll_interval(FAST)
            .dispatch_interval(FAST)
            .start()
            .unwrap();

        let frame = wire(&[Message::new("Chat", "never arrives")]);
        dropped.write_all(&frame[..6]).unwrap();
        dropped.flush().unwrap();
        drop(dropped);

        let framer = Framer::new(JsonCodec);
        for text in ["one", "two"] {
            framer
                .write_message(&mut healthy, &Message::new("Chat", text))
                .unwrap();
        }

        assert!(wait_until(|| streams.is_faulted("a-dropped") == Some(true)));
        assert!(wait_until(|| lobby.chats.lock().len() == 2));

        framer
            .write_message(&mut healthy, &Message::new("Chat", "three"))
            .unwrap();
        assert!(wait_until(|| lobby.chats.lock().len() == 3));
        assert_eq!(*lobby.chats.lock(), vec!["one", "two", "three"]);
        assert_eq!(streams.is_faulted("b-healthy"), Some(false));

        let report = receiver.stop().unwrap();
        assert_eq!(report.stats.faulted_streams, 1);
        assert_eq!(report.stats.closed_streams, 0);
    }

    #[test]
    fn test_tcp_clean_disconnect_counted_as_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let (mut client, accepted) = tcp_pair(&listener);

        let streams = Arc::new(ClientStreamRegistry::new());
        streams.insert("c-leaving", accepted).unwrap();

        let lobby = Lobby::new();
        let mut handlers = HandlerRegistry::new();
        handlers.register("lobby", Arc::clone(&lobby));

        let receiver = Receiver::builder()
            .streams(Arc::clone(&streams))
            .handlers(handlers)
            .poll_interval(FAST)
            .dispatch_interval(FAST)
            .start()
            .unwrap();

        Framer::new(JsonCodec)
            .write_message(&mut client, &Message::new("Chat", "bye"))
            .unwrap();
        drop(client);

        assert!(wait_until(|| receiver.stats().closed_streams == 1));
        assert!(wait_until(|| lobby.chats.lock().len() == 1));
        assert_eq!(streams.is_faulted("c-leaving"), Some(true));

        let report = receiver.stop().unwrap();
        assert_eq!(report.stats.faulted_streams, 0);
        assert_eq!(report.stats.received, 1);
    }
}
