mod mock_stream;

use crate::mock_stream::{BrokenCodec, LenCodec, MockStream};
use log::LevelFilter;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use wsio::ws_stream::FrameOutcome;
use wsio::{WsStream, WsioError};

#[test]
fn write_reaches_the_transport() {
  let mock = MockStream::empty();
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  assert!(stream.write(b"hello"));
  assert_eq!(mock.copy_written_data(), b"hello");
}

#[test]
fn write_failure_is_reported_as_false() {
  trivial_log::init_stdout(LevelFilter::Trace).unwrap();

  let mock = MockStream::empty();
  let stream = WsStream::new(mock.to_transport(false), LenCodec);
  mock.set_fail_writes(true);

  // The cause is swallowed at this boundary, nothing must propagate.
  assert!(!stream.write(b"hello"));
  assert_eq!(mock.copy_written_data(), b"");

  trivial_log::free();
}

#[test]
fn write_frame_encodes_through_the_codec() {
  let mock = MockStream::empty();
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  assert!(stream.write_frame(&b"abc".to_vec()));
  assert_eq!(mock.copy_written_data(), vec![3, b'a', b'b', b'c']);
}

#[test]
fn write_handshake_serializes_the_message() {
  let mock = MockStream::empty();
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  let message = "GET / HTTP/1.1\r\nHost: example.com\r\n\r\n".to_string();
  assert!(stream.write_handshake(&message));
  assert_eq!(mock.copy_written_data(), message.as_bytes());
}

#[test]
fn read_frame_decodes_a_frame() {
  let mock = MockStream::with_data(&[5, b'h', b'e', b'l', b'l', b'o']);
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  match stream.read_frame() {
    FrameOutcome::Frame(payload) => assert_eq!(payload, b"hello"),
    other => panic!("expected frame, got {other:?}"),
  }
}

#[test]
fn read_frame_on_disconnect_is_closed() {
  let mock = MockStream::empty();
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  assert!(matches!(stream.read_frame(), FrameOutcome::Closed));
}

#[test]
fn read_frame_decode_failure_is_failed_not_thrown() {
  let mock = MockStream::with_data(&[1, 2, 3]);
  let stream = WsStream::new(mock.to_transport(false), BrokenCodec);

  match stream.read_frame() {
    FrameOutcome::Failed(WsioError::IO(err)) => {
      assert_eq!(err.kind(), std::io::ErrorKind::InvalidData)
    }
    other => panic!("expected failure, got {other:?}"),
  }
}

#[test]
fn into_frame_collapses_all_failures() {
  let mock = MockStream::empty();
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  assert!(stream.read_frame().into_frame().is_none());
}

#[test]
fn handshake_then_frames_on_the_same_connection() {
  let mut bytes = b"GET /chat HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec();
  bytes.extend_from_slice(&[2, b'h', b'i']);
  let mock = MockStream::with_data(&bytes);
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  let lines = stream.read_handshake().unwrap();
  assert_eq!(lines, vec!["GET /chat HTTP/1.1", "Host: example.com"]);

  // The frame bytes behind the terminator are buffered and pending by now.
  assert!(stream.data_available());

  match stream.read_frame() {
    FrameOutcome::Frame(payload) => assert_eq!(payload, b"hi"),
    other => panic!("expected frame, got {other:?}"),
  }
}

#[test]
fn is_secure_reflects_the_transport_flag() {
  let mock = MockStream::empty();
  assert!(!WsStream::new(mock.to_transport(false), LenCodec).is_secure());

  let mock = MockStream::empty();
  assert!(WsStream::new(mock.to_transport(true), LenCodec).is_secure());
}

#[test]
fn concurrent_writes_are_not_interleaved() {
  const WRITERS: u8 = 8;
  const PAYLOAD_LEN: usize = 300;

  let mock = MockStream::empty();
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  let mut handles = Vec::new();
  for id in 0..WRITERS {
    let stream = stream.clone();
    handles.push(thread::spawn(move || {
      assert!(stream.write(&vec![id; PAYLOAD_LEN]));
    }));
  }
  for handle in handles {
    handle.join().unwrap();
  }

  let written = mock.copy_written_data();
  assert_eq!(written.len(), usize::from(WRITERS) * PAYLOAD_LEN);

  // Each payload must appear as one contiguous run.
  let mut seen = Vec::new();
  for chunk in written.chunks(PAYLOAD_LEN) {
    let id = chunk[0];
    assert!(chunk.iter().all(|b| *b == id), "payload {id} was interleaved");
    seen.push(id);
  }
  seen.sort_unstable();
  let mut expected = (0..WRITERS).collect::<Vec<u8>>();
  expected.sort_unstable();
  assert_eq!(seen, expected);
}

#[test]
fn one_reader_and_one_writer_proceed_concurrently() {
  let mock = MockStream::with_data(&[3, b'a', b'b', b'c']);
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  let reader = {
    let stream = stream.clone();
    thread::spawn(move || stream.read_frame().into_frame())
  };
  let writer = {
    let stream = stream.clone();
    thread::spawn(move || stream.write(b"pong"))
  };

  assert_eq!(reader.join().unwrap(), Some(b"abc".to_vec()));
  assert!(writer.join().unwrap());
  assert_eq!(mock.copy_written_data(), b"pong");
}

#[test]
fn read_frame_async_delivers_exactly_once() {
  let mock = MockStream::with_data(&[2, b'o', b'k']);
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  let (tx, rx) = mpsc::channel();
  stream
    .read_frame_async(move |outcome| {
      tx.send(outcome.into_frame()).unwrap();
    })
    .unwrap();

  assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Some(b"ok".to_vec()));
  // The callback ran once; the sender is gone now.
  assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn async_and_sync_reads_share_the_exclusion() {
  let mock = MockStream::with_data(&[5, b'h', b'e', b'l', b'l', b'o', 5, b'w', b'o', b'r', b'l', b'd']);
  let stream = WsStream::new(mock.to_transport(false), LenCodec);

  let (tx, rx) = mpsc::channel();
  stream
    .read_frame_async(move |outcome| {
      tx.send(outcome.into_frame()).unwrap();
    })
    .unwrap();

  let sync_frame = stream.read_frame().into_frame().unwrap();
  let async_frame = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

  // Both paths went through the same read token, so each frame comes out
  // intact regardless of which one won the race.
  let mut frames = vec![sync_frame, async_frame];
  frames.sort();
  assert_eq!(frames, vec![b"hello".to_vec(), b"world".to_vec()]);
}
