use std::collections::VecDeque;
use std::io;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use wsio::codec::FrameCodec;
use wsio::wsio_error::WsioResult;
use wsio::{IntoTransport, Transport};

/// In-memory connection half pair for driving a WsStream in tests.
#[derive(Debug, Clone)]
pub struct MockStream {
  read_data: Arc<Mutex<VecDeque<u8>>>,
  write_data: Arc<Mutex<Vec<u8>>>,
  fail_writes: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockStream {
  pub fn with_data(data: &[u8]) -> Self {
    Self {
      read_data: Arc::new(Mutex::new(data.iter().copied().collect())),
      write_data: Arc::new(Mutex::new(Vec::new())),
      fail_writes: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn empty() -> Self {
    Self::with_data(&[])
  }

  pub fn copy_written_data(&self) -> Vec<u8> {
    self.write_data.lock().unwrap().clone()
  }

  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  pub fn to_transport(&self, secure: bool) -> Box<dyn Transport> {
    let read = self.clone();
    let write = self.clone();
    (Box::new(read) as Box<dyn Read + Send>, Box::new(write) as Box<dyn Write + Send>, secure)
      .into_transport()
  }
}

impl Read for MockStream {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let mut data = self.read_data.lock().unwrap();
    let mut count: usize = 0;

    for byte in buf {
      if let Some(next) = data.pop_front() {
        *byte = next;
        count += 1;
      } else {
        break;
      }
    }

    Ok(count)
  }
}

impl Write for MockStream {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
    }
    self.write_data.lock().unwrap().write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
    }
    Ok(())
  }
}

/// Minimal length-prefixed codec: one length byte, then the payload.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct LenCodec;

impl FrameCodec for LenCodec {
  type Frame = Vec<u8>;

  fn decode(&self, stream: &mut dyn Read) -> WsioResult<Vec<u8>> {
    let mut len = [0u8; 1];
    stream.read_exact(&mut len)?;
    let mut payload = vec![0u8; usize::from(len[0])];
    stream.read_exact(&mut payload)?;
    Ok(payload)
  }

  fn encode(&self, frame: &Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() + 1);
    out.push(frame.len() as u8);
    out.extend_from_slice(frame);
    out
  }
}

/// Codec whose decode always reports a parse failure. Encode passes the
/// payload through unchanged.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct BrokenCodec;

#[allow(dead_code)]
impl BrokenCodec {
  pub fn new() -> Self {
    BrokenCodec
  }
}

impl FrameCodec for BrokenCodec {
  type Frame = Vec<u8>;

  fn decode(&self, _stream: &mut dyn Read) -> WsioResult<Vec<u8>> {
    Err(wsio::WsioError::new_io(io::ErrorKind::InvalidData, "mock decode failure"))
  }

  fn encode(&self, frame: &Vec<u8>) -> Vec<u8> {
    frame.clone()
  }
}
