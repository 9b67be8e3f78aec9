//! The synchronized stream that mediates every read and write for the
//! lifetime of a connection.

use crate::codec::{FrameCodec, HandshakeMessage};
use crate::functional_traits::{DefaultThreadAdapter, ThreadAdapter};
use crate::handshake;
use crate::stream::Transport;
use crate::util::unwrap_poison;
use crate::wsio_error::{WsioError, WsioResult};
use crate::{debug_log, warn_log};
use std::io;
use std::io::ErrorKind;
use std::io::Read;
use std::sync::{Arc, Mutex};

/// Outcome of a synchronous frame read.
///
/// All three non-frame cases mean the same thing to a data phase loop: stop
/// trusting this connection. [`FrameOutcome::into_frame`] collapses them for
/// callers that do not care why.
#[derive(Debug)]
pub enum FrameOutcome<F> {
  /// A complete frame was decoded.
  Frame(F),
  /// The peer disconnected before or while the frame was read.
  Closed,
  /// The frame could not be decoded, or the read failed for a reason other
  /// than disconnection.
  Failed(WsioError),
}

impl<F> FrameOutcome<F> {
  /// The frame, or `None` for both failure cases.
  pub fn into_frame(self) -> Option<F> {
    match self {
      FrameOutcome::Frame(frame) => Some(frame),
      FrameOutcome::Closed | FrameOutcome::Failed(_) => None,
    }
  }

  /// True if a frame was decoded.
  pub fn is_frame(&self) -> bool {
    matches!(self, FrameOutcome::Frame(_))
  }
}

/// A transport plus the per-connection exclusion that makes it safe to drive
/// from a connection setup path and a frame exchange path at once.
///
/// Two independent tokens serialize access: all write operations share one,
/// all read operations (synchronous and asynchronous) share the other. One
/// reader and one writer can therefore proceed concurrently, while two
/// readers (or two writers) take turns. The tokens are scoped to this
/// instance; connections never contend with each other.
///
/// Cloning yields another handle to the same connection. Dropping the last
/// handle releases the transport.
pub struct WsStream<C: FrameCodec> {
  inner: Arc<WsStreamInner<C>>,
}

impl<C: FrameCodec> Clone for WsStream<C> {
  fn clone(&self) -> Self {
    Self { inner: Arc::clone(&self.inner) }
  }
}

struct WsStreamInner<C: FrameCodec> {
  transport: Box<dyn Transport>,
  codec: C,
  thread_adapter: Arc<dyn ThreadAdapter>,
  read_lock: Mutex<()>,
  write_lock: Mutex<()>,
}

/// `&mut dyn Read` view of a transport, for the codec and the handshake
/// scanner. Must only be constructed while the read token is held.
struct TransportReader<'a>(&'a dyn Transport);

impl Read for TransportReader<'_> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.read(buf)
  }
}

impl<C: FrameCodec + 'static> WsStream<C> {
  /// Takes sole ownership of `transport`. Asynchronous frame reads complete
  /// on threads from `thread::Builder::new().spawn`.
  pub fn new(transport: Box<dyn Transport>, codec: C) -> Self {
    Self::with_thread_adapter(transport, codec, Arc::new(DefaultThreadAdapter))
  }

  /// [`WsStream::new`] with asynchronous frame reads routed through the
  /// given adapter.
  pub fn with_thread_adapter(
    transport: Box<dyn Transport>,
    codec: C,
    thread_adapter: Arc<dyn ThreadAdapter>,
  ) -> Self {
    Self {
      inner: Arc::new(WsStreamInner {
        transport,
        codec,
        thread_adapter,
        read_lock: Mutex::new(()),
        write_lock: Mutex::new(()),
      }),
    }
  }

  /// Whether the underlying transport is TLS secured. Fixed for the
  /// connection's lifetime.
  pub fn is_secure(&self) -> bool {
    self.inner.transport.is_secure()
  }

  /// Whether the transport reports bytes ready to read. Best effort, see
  /// [`Transport::data_available`].
  pub fn data_available(&self) -> bool {
    self.inner.transport.data_available()
  }

  /// The address of the remote end of the connection.
  pub fn peer_addr(&self) -> WsioResult<String> {
    Ok(self.inner.transport.peer_addr()?)
  }

  /// The local address of the connection.
  pub fn local_addr(&self) -> WsioResult<String> {
    Ok(self.inner.transport.local_addr()?)
  }

  /// Writes all of `data` under the write token and flushes.
  ///
  /// Any failure is reported as `false`; the cause does not cross this
  /// boundary (it is logged at warn level). Callers in the data phase treat
  /// `false` as "stop trusting this connection". Blocks until the token is
  /// free and the write completed.
  pub fn write(&self, data: &[u8]) -> bool {
    match self.write_exclusive(data) {
      Ok(()) => true,
      Err(err) => {
        warn_log!("write: suppressed transport failure: {}", err);
        false
      }
    }
  }

  fn write_exclusive(&self, data: &[u8]) -> WsioResult<()> {
    let _guard = unwrap_poison(self.inner.write_lock.lock())?;
    self.inner.transport.write_all(data)?;
    self.inner.transport.flush()?;
    Ok(())
  }

  /// Encodes `frame` and writes it. Same contract as [`WsStream::write`].
  pub fn write_frame(&self, frame: &C::Frame) -> bool {
    self.write(&self.inner.codec.encode(frame))
  }

  /// Serializes `message` and writes it. Same contract as [`WsStream::write`].
  pub fn write_handshake(&self, message: &dyn HandshakeMessage) -> bool {
    self.write(&message.to_bytes())
  }

  /// Decodes the next frame under the read token.
  ///
  /// Mid-connection failures are deliberately downgraded: disconnection
  /// becomes [`FrameOutcome::Closed`], everything else
  /// [`FrameOutcome::Failed`]. Nothing is raised across this boundary.
  pub fn read_frame(&self) -> FrameOutcome<C::Frame> {
    let guard = match unwrap_poison(self.inner.read_lock.lock()) {
      Ok(guard) => guard,
      Err(err) => return FrameOutcome::Failed(err.into()),
    };

    let mut reader = TransportReader(self.inner.transport.as_ref());
    let outcome = match self.inner.codec.decode(&mut reader) {
      Ok(frame) => FrameOutcome::Frame(frame),
      Err(err) if is_disconnect(&err) => {
        debug_log!("read_frame: peer disconnected: {}", err);
        FrameOutcome::Closed
      }
      Err(err) => {
        debug_log!("read_frame: decode failed: {}", err);
        FrameOutcome::Failed(err)
      }
    };
    drop(guard);
    outcome
  }

  /// Initiates a frame read that completes on another thread and returns
  /// immediately. `on_complete` is invoked exactly once, on an unspecified
  /// thread, with the same outcome a synchronous [`WsStream::read_frame`]
  /// would have produced.
  ///
  /// The background read acquires the same read token as the synchronous
  /// operations, so it cannot interleave with a concurrent `read_frame` or
  /// `read_handshake` on the wire; it waits its turn instead.
  pub fn read_frame_async<F>(&self, on_complete: F) -> WsioResult<()>
  where
    F: FnOnce(FrameOutcome<C::Frame>) + Send + 'static,
  {
    let stream = self.clone();
    self.inner.thread_adapter.spawn(Box::new(move || {
      on_complete(stream.read_frame());
    }))
  }

  /// Captures and normalizes the raw handshake header block under the read
  /// token. See [`crate::handshake::read_handshake`] for the algorithm and
  /// failure modes. Setup failures here are fatal and propagate; they are
  /// not downgraded the way data phase failures are. The write token is not
  /// touched, so a concurrent writer is unaffected.
  pub fn read_handshake(&self) -> WsioResult<Vec<String>> {
    let _guard = unwrap_poison(self.inner.read_lock.lock())?;
    let mut reader = TransportReader(self.inner.transport.as_ref());
    handshake::read_handshake(&mut reader)
  }

  /// Shuts the transport down. Reads and writes in flight or issued later
  /// fail. Calling this twice is allowed; the second call has no further
  /// effect.
  pub fn close(&self) {
    self.inner.transport.close()
  }
}

fn is_disconnect(err: &WsioError) -> bool {
  matches!(
    err.kind(),
    ErrorKind::UnexpectedEof
      | ErrorKind::ConnectionReset
      | ErrorKind::ConnectionAborted
      | ErrorKind::BrokenPipe
  )
}
