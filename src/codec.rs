//! The external boundaries of the stream layer: the opaque frame codec and
//! the handshake message shape.

use crate::wsio_error::WsioResult;
use std::io::Read;

/// Encodes and decodes protocol frames.
///
/// This crate never looks inside a frame; it only moves frames to and from
/// bytes. Decoding errors cross this boundary as [`crate::WsioError`] and are
/// downgraded to a [`crate::ws_stream::FrameOutcome`] by the synchronized
/// stream.
pub trait FrameCodec: Send + Sync {
  /// One protocol message unit. Opaque to this crate.
  type Frame: Send;

  /// Reads and decodes the next frame from the stream, blocking until the
  /// frame is complete.
  fn decode(&self, stream: &mut dyn Read) -> WsioResult<Self::Frame>;

  /// Encodes the frame into the byte sequence to put on the wire.
  fn encode(&self, frame: &Self::Frame) -> Vec<u8>;
}

/// Anything that can serialize itself into the bytes of a handshake message.
pub trait HandshakeMessage {
  /// The wire bytes of this message.
  fn to_bytes(&self) -> Vec<u8>;
}

impl HandshakeMessage for [u8] {
  fn to_bytes(&self) -> Vec<u8> {
    self.to_vec()
  }
}

impl HandshakeMessage for Vec<u8> {
  fn to_bytes(&self) -> Vec<u8> {
    self.clone()
  }
}

impl HandshakeMessage for str {
  fn to_bytes(&self) -> Vec<u8> {
    self.as_bytes().to_vec()
  }
}

impl HandshakeMessage for String {
  fn to_bytes(&self) -> Vec<u8> {
    self.as_bytes().to_vec()
  }
}
