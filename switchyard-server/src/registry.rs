//! Routing tables: client streams and sender identities.

use crate::error::ServerError;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use switchyard_core::{ClientId, JsonCodec, Message, MessageCodec};
use switchyard_transport::{ClientStream, Framer};

/// A registered stream and its health flag.
///
/// Reads and writes are locked separately so a reply never waits on the
/// poller's blocking read of the same client.
pub(crate) struct StreamEntry {
    reader: Mutex<Box<dyn ClientStream>>,
    writer: Mutex<Box<dyn Write + Send>>,
    faulted: AtomicBool,
}

impl StreamEntry {
    fn new(stream: Box<dyn ClientStream>) -> io::Result<Self> {
        let writer = stream.try_clone_writer()?;
        Ok(Self {
            reader: Mutex::new(stream),
            writer: Mutex::new(writer),
            faulted: AtomicBool::new(false),
        })
    }

    pub(crate) fn reader(&self) -> MutexGuard<'_, Box<dyn ClientStream>> {
        self.reader.lock()
    }

    pub(crate) fn writer(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.writer.lock()
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Returns true if this call flipped the flag.
    pub(crate) fn mark_faulted(&self) -> bool {
        !self.faulted.swap(true, Ordering::AcqRel)
    }
}

/// Maps client identifiers to their duplex streams.
///
/// Entries are added by whoever accepts connections and are never removed
/// by the receiver. A stream that closes, or fails to frame or read, is
/// marked faulted and skipped from then on.
pub struct ClientStreamRegistry {
    streams: RwLock<HashMap<ClientId, Arc<StreamEntry>>>,
}

impl ClientStreamRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Registers the stream of a newly connected client.
    ///
    /// # Errors
    /// Returns [`ServerError::DuplicateClient`] if the identifier is taken, or
    /// [`ServerError::Io`] if no write handle can be cloned from the stream.
    pub fn insert<S: ClientStream + 'static>(
        &self,
        client_id: impl Into<ClientId>,
        stream: S,
    ) -> Result<(), ServerError> {
        let client_id = client_id.into();
        let mut streams = self.streams.write();
        if streams.contains_key(&client_id) {
            return Err(ServerError::DuplicateClient { client_id });
        }
        let entry = StreamEntry::new(Box::new(stream))?;
        tracing::debug!(client = %client_id, "stream registered");
        streams.insert(client_id, Arc::new(entry));
        Ok(())
    }

    /// Returns true if a stream is registered for the client.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.streams.read().contains_key(client_id)
    }

    /// Returns all client identifiers in sorted order.
    #[must_use]
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<_> = self.streams.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns whether the client's stream is faulted, or `None` if unknown.
    #[must_use]
    pub fn is_faulted(&self, client_id: &str) -> Option<bool> {
        self.streams.read().get(client_id).map(|e| e.is_faulted())
    }

    /// Marks a client's stream as unusable.
    ///
    /// Returns true if the stream was healthy before this call.
    pub fn mark_faulted(&self, client_id: &str) -> bool {
        self.streams
            .read()
            .get(client_id)
            .is_some_and(|e| e.mark_faulted())
    }

    /// Returns the number of registered streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    /// Returns true if no streams are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }

    /// Entries in poll order. The registry lock is released on return so
    /// blocking reads never hold it.
    pub(crate) fn snapshot(&self) -> Vec<(ClientId, Arc<StreamEntry>)> {
        let mut entries: Vec<_> = self
            .streams
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn entry(&self, client_id: &str) -> Result<Arc<StreamEntry>, ServerError> {
        self.streams
            .read()
            .get(client_id)
            .cloned()
            .ok_or_else(|| ServerError::UnknownClient {
                client_id: client_id.to_string(),
            })
    }
}

impl Default for ClientStreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps application-level sender identifiers to client identifiers.
///
/// Written by client registration handlers, read by any handler that
/// needs to address a reply.
pub struct SenderToClientMap {
    senders: RwLock<HashMap<String, ClientId>>,
}

impl SenderToClientMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    /// Records which client a sender talks through.
    ///
    /// Returns the previous client for this sender, if any.
    pub fn register(
        &self,
        sender_id: impl Into<String>,
        client_id: impl Into<ClientId>,
    ) -> Option<ClientId> {
        self.senders.write().insert(sender_id.into(), client_id.into())
    }

    /// Returns the client a sender is registered on.
    #[must_use]
    pub fn client_for(&self, sender_id: &str) -> Option<ClientId> {
        self.senders.read().get(sender_id).cloned()
    }

    /// Forgets a sender.
    pub fn remove(&self, sender_id: &str) -> Option<ClientId> {
        self.senders.write().remove(sender_id)
    }

    /// Returns the number of known senders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.read().len()
    }

    /// Returns true if no senders are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.read().is_empty()
    }
}

impl Default for SenderToClientMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Both routing tables plus the framer used to write replies.
///
/// Cheap to clone; handlers may keep a copy to reply outside of
/// registration.
#[derive(Clone)]
pub struct Routes {
    streams: Arc<ClientStreamRegistry>,
    senders: Arc<SenderToClientMap>,
    framer: Framer<Arc<dyn MessageCodec>>,
}

impl Routes {
    /// Creates routes using the JSON codec.
    #[must_use]
    pub fn new(streams: Arc<ClientStreamRegistry>, senders: Arc<SenderToClientMap>) -> Self {
        let codec: Arc<dyn MessageCodec> = Arc::new(JsonCodec);
        Self::with_framer(streams, senders, Framer::new(codec))
    }

    /// Creates routes with an explicit framer.
    #[must_use]
    pub fn with_framer(
        streams: Arc<ClientStreamRegistry>,
        senders: Arc<SenderToClientMap>,
        framer: Framer<Arc<dyn MessageCodec>>,
    ) -> Self {
        Self {
            streams,
            senders,
            framer,
        }
    }

    /// Returns the client stream registry.
    #[must_use]
    pub fn streams(&self) -> &Arc<ClientStreamRegistry> {
        &self.streams
    }

    /// Returns the sender to client map.
    #[must_use]
    pub fn senders(&self) -> &Arc<SenderToClientMap> {
        &self.senders
    }

    /// Returns the framer shared by the poller and replies.
    #[must_use]
    pub fn framer(&self) -> &Framer<Arc<dyn MessageCodec>> {
        &self.framer
    }

    /// Writes a message to a client's stream.
    ///
    /// # Errors
    /// Returns error if the client is unknown or the write fails.
    pub fn send_to_client(&self, client_id: &str, message: &Message) -> Result<(), ServerError> {
        let entry = self.streams.entry(client_id)?;
        let mut writer = entry.writer();
        self.framer.write_message(&mut **writer, message)?;
        Ok(())
    }

    /// Writes a message to whichever client a sender registered on.
    ///
    /// # Errors
    /// Returns error if the sender or its client is unknown, or the write fails.
    pub fn send_to_sender(&self, sender_id: &str, message: &Message) -> Result<(), ServerError> {
        let client_id =
            self.senders
                .client_for(sender_id)
                .ok_or_else(|| ServerError::UnknownSender {
                    sender_id: sender_id.to_string(),
                })?;
        self.send_to_client(&client_id, message)
    }
}
