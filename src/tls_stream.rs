//! TLS variant of the transport, pumped through RustTls by background threads.

use crate::functional_traits::{DefaultThreadAdapter, ThreadAdapter};
use crate::stream::Transport;
use crate::util::unwrap_poison;
use crate::wsio_error::WsioResult;
use rust_tls_duplex_stream::RustTlsDuplexStream;
use rustls::client::ClientConnectionData;
use rustls::server::ServerConnectionData;
use rustls::{ClientConnection, ServerConnection};
use std::fmt::Debug;
use std::io;
use std::io::{Read, Write};
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unowned_buf::{UnownedReadBuffer, UnownedWriteBuffer};

/// Raw connections that can carry TLS through wsio's RustTls wrapper need to
/// provide these functions. Implemented for `TcpStream` out of the box.
pub trait TlsCapableStream: Debug + Sync + Send {
  /// io::Read &T
  fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

  /// io::Write &T
  fn write(&self, buf: &[u8]) -> io::Result<usize>;

  /// io::Write &T
  fn flush(&self) -> io::Result<()>;

  /// This fn must cancel all concurrent read operations and prevent any new
  /// read+write operations from blocking. All ongoing and future operations
  /// are expected to return Err immediately after this fn was called.
  fn shutdown(&self);

  /// The address of the remote end of this stream.
  fn peer_addr(&self) -> io::Result<String>;

  /// The local address of this stream.
  fn local_addr(&self) -> io::Result<String>;
}

mod tcp {
  use crate::tls_stream::TlsCapableStream;
  use std::io;
  use std::net::{Shutdown, TcpStream};

  impl TlsCapableStream for TcpStream {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
      io::Read::read(&mut &*self, buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
      io::Write::write(&mut &*self, buf)
    }

    fn flush(&self) -> io::Result<()> {
      io::Write::flush(&mut &*self)
    }

    fn shutdown(&self) {
      _ = TcpStream::shutdown(self, Shutdown::Both);
    }

    fn peer_addr(&self) -> io::Result<String> {
      Ok(format!("{}", TcpStream::peer_addr(self)?))
    }

    fn local_addr(&self) -> io::Result<String> {
      Ok(format!("{}", TcpStream::local_addr(self)?))
    }
  }
}

#[derive(Debug)]
#[repr(transparent)]
struct StreamWrapper<T: TlsCapableStream + ?Sized>(Arc<T>);

impl<T: TlsCapableStream + ?Sized> Clone for StreamWrapper<T> {
  fn clone(&self) -> Self {
    Self(self.0.clone())
  }
}

impl<T: TlsCapableStream + ?Sized> Read for StreamWrapper<T> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.deref().read(buf)
  }
}

impl<T: TlsCapableStream + ?Sized> Write for StreamWrapper<T> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.deref().write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.0.deref().flush()
  }
}

/// Object safe view of the two concrete RustTls duplex types (client role and
/// server role), so the transport does not need to be generic over the side.
trait TlsDuplex: Debug + Send + Sync {
  fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
  fn write(&self, buf: &[u8]) -> io::Result<usize>;
  fn flush(&self) -> io::Result<()>;
  fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;
  fn read_timeout(&self) -> io::Result<Option<Duration>>;
  fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()>;
  fn write_timeout(&self) -> io::Result<Option<Duration>>;
}

impl TlsDuplex for RustTlsDuplexStream<ServerConnection, ServerConnectionData> {
  fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
    io::Read::read(&mut &*self, buf)
  }

  fn write(&self, buf: &[u8]) -> io::Result<usize> {
    io::Write::write(&mut &*self, buf)
  }

  fn flush(&self) -> io::Result<()> {
    io::Write::flush(&mut &*self)
  }

  fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
    RustTlsDuplexStream::set_read_timeout(self, dur)
  }

  fn read_timeout(&self) -> io::Result<Option<Duration>> {
    RustTlsDuplexStream::read_timeout(self)
  }

  fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
    RustTlsDuplexStream::set_write_timeout(self, dur)
  }

  fn write_timeout(&self) -> io::Result<Option<Duration>> {
    RustTlsDuplexStream::write_timeout(self)
  }
}

impl TlsDuplex for RustTlsDuplexStream<ClientConnection, ClientConnectionData> {
  fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
    io::Read::read(&mut &*self, buf)
  }

  fn write(&self, buf: &[u8]) -> io::Result<usize> {
    io::Write::write(&mut &*self, buf)
  }

  fn flush(&self) -> io::Result<()> {
    io::Write::flush(&mut &*self)
  }

  fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
    RustTlsDuplexStream::set_read_timeout(self, dur)
  }

  fn read_timeout(&self) -> io::Result<Option<Duration>> {
    RustTlsDuplexStream::read_timeout(self)
  }

  fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
    RustTlsDuplexStream::set_write_timeout(self, dur)
  }

  fn write_timeout(&self) -> io::Result<Option<Duration>> {
    RustTlsDuplexStream::write_timeout(self)
  }
}

/// `&mut R: Read` / `&mut W: Write` adapter over the boxed duplex, for the
/// unowned buffers.
struct DuplexIo<'a>(&'a dyn TlsDuplex);

impl Read for DuplexIo<'_> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.read(buf)
  }
}

impl Write for DuplexIo<'_> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.0.flush()
  }
}

/// Transport over a TLS session in either role.
///
/// Wraps a RustTls engine together with read and write buffers. Creating one
/// starts 2 background threads through the given [`ThreadAdapter`]; they stop
/// automatically once the transport is dropped.
#[derive(Debug, Clone)]
pub struct TlsTransport(Arc<TlsTransportInner>);

impl TlsTransport {
  /// Server role handshake on `stream`, threads via `thread::Builder::new().spawn`.
  pub fn create_server_unpooled<S: TlsCapableStream + 'static>(
    stream: S,
    tls: ServerConnection,
  ) -> WsioResult<Box<dyn Transport>> {
    Self::create_server(stream, tls, &DefaultThreadAdapter)
  }

  /// Server role handshake on `stream`, threads via the given spawner.
  pub fn create_server<S: TlsCapableStream + 'static>(
    stream: S,
    tls: ServerConnection,
    spawner: &dyn ThreadAdapter,
  ) -> WsioResult<Box<dyn Transport>> {
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    let stream_wrapper = StreamWrapper(Arc::new(stream));
    let tls =
      RustTlsDuplexStream::new(tls, stream_wrapper.clone(), stream_wrapper.clone(), move |task| {
        spawner.spawn(task)?;
        Ok(())
      })?;

    Ok(Self::assemble(stream_wrapper.0 as Arc<_>, Box::new(tls), peer, local))
  }

  /// Client role handshake on `stream`, threads via `thread::Builder::new().spawn`.
  pub fn create_client_unpooled<S: TlsCapableStream + 'static>(
    stream: S,
    tls: ClientConnection,
  ) -> WsioResult<Box<dyn Transport>> {
    Self::create_client(stream, tls, &DefaultThreadAdapter)
  }

  /// Client role handshake on `stream`, threads via the given spawner.
  pub fn create_client<S: TlsCapableStream + 'static>(
    stream: S,
    tls: ClientConnection,
    spawner: &dyn ThreadAdapter,
  ) -> WsioResult<Box<dyn Transport>> {
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    let stream_wrapper = StreamWrapper(Arc::new(stream));
    let tls =
      RustTlsDuplexStream::new(tls, stream_wrapper.clone(), stream_wrapper.clone(), move |task| {
        spawner.spawn(task)?;
        Ok(())
      })?;

    Ok(Self::assemble(stream_wrapper.0 as Arc<_>, Box::new(tls), peer, local))
  }

  fn assemble(
    stream_ref: Arc<dyn TlsCapableStream>,
    tls: Box<dyn TlsDuplex>,
    peer: String,
    local: String,
  ) -> Box<dyn Transport> {
    Box::new(TlsTransport(Arc::new(TlsTransportInner {
      stream_ref,
      tls,
      read: Mutex::new(UnownedReadBuffer::new()),
      write: Mutex::new(UnownedWriteBuffer::new()),
      peer,
      local,
    }))) as Box<dyn Transport>
  }
}

#[derive(Debug)]
struct TlsTransportInner {
  stream_ref: Arc<dyn TlsCapableStream>,
  tls: Box<dyn TlsDuplex>,
  read: Mutex<UnownedReadBuffer<0x4000>>,
  write: Mutex<UnownedWriteBuffer<0x4000>>,
  peer: String,
  local: String,
}

impl Drop for TlsTransportInner {
  fn drop(&mut self) {
    self.stream_ref.shutdown()
  }
}

impl Transport for TlsTransport {
  fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
    unwrap_poison(self.0.read.lock())?.read(&mut DuplexIo(self.0.tls.as_ref()), buf)
  }

  fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
    unwrap_poison(self.0.read.lock())?.read_exact(&mut DuplexIo(self.0.tls.as_ref()), buf)
  }

  fn write_all(&self, buf: &[u8]) -> io::Result<()> {
    unwrap_poison(self.0.write.lock())?.write_all(&mut DuplexIo(self.0.tls.as_ref()), buf)
  }

  fn flush(&self) -> io::Result<()> {
    unwrap_poison(self.0.write.lock())?.flush(&mut DuplexIo(self.0.tls.as_ref()))
  }

  fn data_available(&self) -> bool {
    // Only decrypted bytes that already sit in the read buffer count here;
    // the TLS engine cannot be probed without blocking.
    unwrap_poison(self.0.read.lock()).map(|g| g.available() > 0).unwrap_or_default()
  }

  fn is_secure(&self) -> bool {
    true
  }

  fn close(&self) {
    self.0.stream_ref.shutdown()
  }

  fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
    self.0.tls.set_read_timeout(dur)
  }

  fn read_timeout(&self) -> io::Result<Option<Duration>> {
    self.0.tls.read_timeout()
  }

  fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
    self.0.tls.set_write_timeout(dur)
  }

  fn write_timeout(&self) -> io::Result<Option<Duration>> {
    self.0.tls.write_timeout()
  }

  fn peer_addr(&self) -> io::Result<String> {
    Ok(self.0.peer.clone())
  }

  fn local_addr(&self) -> io::Result<String> {
    Ok(self.0.local.clone())
  }
}
