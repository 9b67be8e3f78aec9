//! The byte level transport boundary that connection setup and frame exchange
//! both run on top of.

use std::fmt::Debug;
use std::io;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// A byte oriented, bidirectional, closable connection.
///
/// Exactly one [`crate::ws_stream::WsStream`] ever owns a given transport and
/// mediates all access to it. The transport itself only promises that one
/// concurrent reader and one concurrent writer are safe; it does not serialize
/// multiple readers or multiple writers against each other.
///
/// Whether the transport is TLS secured is decided when it is constructed and
/// never changes afterwards.
pub trait Transport: Debug + Send + Sync {
  /// Reads up to `buf.len()` bytes, blocking until at least one byte is
  /// available or the peer has closed the connection (`Ok(0)`).
  fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

  /// Reads exactly `buf.len()` bytes or fails with `UnexpectedEof`.
  fn read_exact(&self, buf: &mut [u8]) -> io::Result<()>;

  /// Writes the entire buffer. Data may linger in an internal buffer until
  /// [`Transport::flush`] is called.
  fn write_all(&self, buf: &[u8]) -> io::Result<()>;

  /// Flushes buffered writes down to the socket.
  fn flush(&self) -> io::Result<()>;

  /// Returns true if at least one byte can be read without blocking.
  ///
  /// This is a best effort signal. Implementations that cannot probe the
  /// underlying socket only report bytes that are already buffered.
  fn data_available(&self) -> bool;

  /// Whether this transport carries TLS. Fixed for the transport's lifetime.
  fn is_secure(&self) -> bool;

  /// Shuts the underlying connection down. Ongoing and future reads and
  /// writes are expected to fail afterwards. Calling this twice is allowed;
  /// the second call has no further effect.
  fn close(&self);

  /// Sets the timeout applied to blocking reads. Timeouts are a property of
  /// the transport; the synchronized stream on top has no timeout of its own.
  fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

  /// The currently configured read timeout.
  fn read_timeout(&self) -> io::Result<Option<Duration>>;

  /// Sets the timeout applied to blocking writes.
  fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

  /// The currently configured write timeout.
  fn write_timeout(&self) -> io::Result<Option<Duration>>;

  /// The address of the remote end of this transport.
  fn peer_addr(&self) -> io::Result<String>;

  /// The local address of this transport.
  fn local_addr(&self) -> io::Result<String>;
}

/// Conversion of raw connections into boxed transports.
pub trait IntoTransport {
  /// Consumes the value and wraps it into a transport.
  fn into_transport(self) -> Box<dyn Transport>;
}

impl IntoTransport for TcpStream {
  fn into_transport(self) -> Box<dyn Transport> {
    tcp::new(self)
  }
}

impl IntoTransport for Box<dyn Transport> {
  fn into_transport(self) -> Box<dyn Transport> {
    self
  }
}

/// Read half, write half and the pre-determined security flag of a connection
/// whose setup already happened elsewhere.
impl IntoTransport for (Box<dyn Read + Send>, Box<dyn Write + Send>, bool) {
  fn into_transport(self) -> Box<dyn Transport> {
    boxed::new(self.0, self.1, self.2)
  }
}

mod tcp {
  use crate::stream::Transport;
  use crate::util::unwrap_poison;
  use std::io;
  use std::net::{Shutdown, TcpStream};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;
  use unowned_buf::{UnownedReadBuffer, UnownedWriteBuffer};

  pub fn new(stream: TcpStream) -> Box<dyn Transport> {
    Box::new(TcpTransport(Arc::new(TcpTransportInner {
      read_mutex: Mutex::new(UnownedReadBuffer::new()),
      write_mutex: Mutex::new(UnownedWriteBuffer::new()),
      stream,
    })))
  }

  #[derive(Debug, Clone)]
  struct TcpTransport(Arc<TcpTransportInner>);

  #[derive(Debug)]
  struct TcpTransportInner {
    read_mutex: Mutex<UnownedReadBuffer<0x4000>>,
    write_mutex: Mutex<UnownedWriteBuffer<0x4000>>,
    stream: TcpStream,
  }

  impl Transport for TcpTransport {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
      unwrap_poison(self.0.read_mutex.lock())?.read(&mut &self.0.stream, buf)
    }

    fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
      unwrap_poison(self.0.read_mutex.lock())?.read_exact(&mut &self.0.stream, buf)
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
      unwrap_poison(self.0.write_mutex.lock())?.write_all(&mut &self.0.stream, buf)
    }

    fn flush(&self) -> io::Result<()> {
      unwrap_poison(self.0.write_mutex.lock())?.flush(&mut &self.0.stream)
    }

    fn data_available(&self) -> bool {
      // The whole probe holds the read mutex, so the temporary timeout below
      // cannot race a blocking read on the same socket. A probe issued while
      // a read is in flight parks until that read returns.
      let Ok(guard) = unwrap_poison(self.0.read_mutex.lock()) else {
        return false;
      };
      if guard.available() > 0 {
        return true;
      }

      // Nothing buffered, peek the socket with a minimal read timeout.
      // SO_RCVTIMEO only affects the read direction; a concurrent writer
      // never observes it.
      let Ok(previous) = self.0.stream.read_timeout() else {
        return false;
      };
      if self.0.stream.set_read_timeout(Some(Duration::from_millis(1))).is_err() {
        return false;
      }
      let mut probe = [0u8; 1];
      let pending = matches!(self.0.stream.peek(&mut probe), Ok(n) if n > 0);
      _ = self.0.stream.set_read_timeout(previous);
      drop(guard);
      pending
    }

    fn is_secure(&self) -> bool {
      false
    }

    fn close(&self) {
      _ = self.0.stream.shutdown(Shutdown::Both);
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
      self.0.stream.set_read_timeout(dur)
    }

    fn read_timeout(&self) -> io::Result<Option<Duration>> {
      self.0.stream.read_timeout()
    }

    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
      self.0.stream.set_write_timeout(dur)
    }

    fn write_timeout(&self) -> io::Result<Option<Duration>> {
      self.0.stream.write_timeout()
    }

    fn peer_addr(&self) -> io::Result<String> {
      Ok(format!("{}", self.0.stream.peer_addr()?))
    }

    fn local_addr(&self) -> io::Result<String> {
      Ok(format!("{}", self.0.stream.local_addr()?))
    }
  }
}

mod boxed {
  use crate::stream::Transport;
  use crate::util::unwrap_poison;
  use std::fmt::{Debug, Formatter};
  use std::io;
  use std::io::{BufWriter, Read, Write};
  use std::ops::DerefMut;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;
  use unowned_buf::UnownedReadBuffer;

  pub fn new(
    read: Box<dyn Read + Send>,
    write: Box<dyn Write + Send>,
    secure: bool,
  ) -> Box<dyn Transport> {
    Box::new(BoxTransport(Arc::new(BoxTransportInner {
      read_mutex: Mutex::new((UnownedReadBuffer::default(), read)),
      write_mutex: Mutex::new(BufWriter::new(write)),
      secure,
      closed: AtomicBool::new(false),
    })))
  }

  #[derive(Debug, Clone)]
  struct BoxTransport(Arc<BoxTransportInner>);

  struct BoxTransportInner {
    read_mutex: Mutex<(UnownedReadBuffer<0x4000>, Box<dyn Read + Send>)>,
    write_mutex: Mutex<BufWriter<Box<dyn Write + Send>>>,
    secure: bool,
    closed: AtomicBool,
  }

  impl Debug for BoxTransportInner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
      f.write_str("BoxTransportInner")
    }
  }

  impl BoxTransport {
    fn ensure_open(&self) -> io::Result<()> {
      if self.0.closed.load(Ordering::SeqCst) {
        return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
      }
      Ok(())
    }
  }

  impl Transport for BoxTransport {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
      self.ensure_open()?;
      let mut guard = unwrap_poison(self.0.read_mutex.lock())?;
      let (buffer, stream) = guard.deref_mut();
      buffer.read(stream, buf)
    }

    fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
      self.ensure_open()?;
      let mut guard = unwrap_poison(self.0.read_mutex.lock())?;
      let (buffer, stream) = guard.deref_mut();
      buffer.read_exact(stream, buf)
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
      self.ensure_open()?;
      unwrap_poison(self.0.write_mutex.lock())?.write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
      self.ensure_open()?;
      unwrap_poison(self.0.write_mutex.lock())?.flush()
    }

    fn data_available(&self) -> bool {
      if self.0.closed.load(Ordering::SeqCst) {
        return false;
      }
      // A boxed read half cannot be probed, so only buffered bytes count.
      unwrap_poison(self.0.read_mutex.lock()).map(|g| g.0.available() > 0).unwrap_or_default()
    }

    fn is_secure(&self) -> bool {
      self.0.secure
    }

    fn close(&self) {
      if self.0.closed.swap(true, Ordering::SeqCst) {
        return;
      }
      // There is no socket to shut down behind a boxed pair; buffered writes
      // are pushed out and the closed flag fails everything that comes later.
      _ = unwrap_poison(self.0.write_mutex.lock()).and_then(|mut guard| guard.flush());
    }

    fn set_read_timeout(&self, _dur: Option<Duration>) -> io::Result<()> {
      Ok(())
    }

    fn read_timeout(&self) -> io::Result<Option<Duration>> {
      Ok(None)
    }

    fn set_write_timeout(&self, _dur: Option<Duration>) -> io::Result<()> {
      Ok(())
    }

    fn write_timeout(&self) -> io::Result<Option<Duration>> {
      Ok(None)
    }

    fn peer_addr(&self) -> io::Result<String> {
      Ok("Box".to_string())
    }

    fn local_addr(&self) -> io::Result<String> {
      Ok("Box".to_string())
    }
  }
}
