//! Client byte streams polled by the receiver.

use crate::error::{Result, TransportError};
use std::io::{self, Cursor, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Read timeout used while probing a TCP stream for pending bytes.
const PROBE_TIMEOUT: Duration = Duration::from_millis(1);

/// Duplex byte stream belonging to one connected client.
///
/// The receiver only reads from a stream after [`poll_available`]
/// reports pending bytes, so a blocking read never parks the poller on an
/// idle connection. Replies go through a separate handle obtained from
/// [`try_clone_writer`], so writing never waits on a read in progress.
///
/// [`poll_available`]: ClientStream::poll_available
/// [`try_clone_writer`]: ClientStream::try_clone_writer
pub trait ClientStream: Read + Send {
    /// Returns true if at least one byte can be read without blocking.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the peer closed the
    /// stream, or [`TransportError::Io`] if the probe failed.
    fn poll_available(&mut self) -> Result<bool>;

    /// Returns a write handle usable while another thread reads.
    ///
    /// # Errors
    /// Returns error if the underlying handle cannot be duplicated.
    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>>;
}

impl ClientStream for TcpStream {
    /// Peeks one byte under a short read timeout.
    ///
    /// The blocking flag is left alone: it is shared with the write handle,
    /// and a read timeout only affects reads.
    fn poll_available(&mut self) -> Result<bool> {
        let mut probe = [0u8; 1];
        self.set_read_timeout(Some(PROBE_TIMEOUT))?;
        let peeked = self.peek(&mut probe);
        self.set_read_timeout(None)?;

        let available = probe_outcome(peeked);
        if matches!(available, Err(TransportError::ConnectionClosed)) {
            tracing::debug!(peer = ?self.peer_addr().ok(), "peer closed the connection");
        }
        available
    }

    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.try_clone()?))
    }
}

/// Maps the result of a one-byte peek to stream availability.
fn probe_outcome(peeked: io::Result<usize>) -> Result<bool> {
    match peeked {
        Ok(0) => Err(TransportError::ConnectionClosed),
        Ok(_) => Ok(true),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ) =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// In-memory stream replaying pre-recorded bytes. Replies are discarded.
impl ClientStream for Cursor<Vec<u8>> {
    fn poll_available(&mut self) -> Result<bool> {
        Ok((self.position() as usize) < self.get_ref().len())
    }

    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(io::sink()))
    }
}
