//! Capture of the raw HTTP style header block that precedes the protocol
//! upgrade.
//!
//! The byte consumption here is wire compatible with the scanner this crate
//! descends from: every attempt at the 4 byte terminator `\r\n\r\n` starts
//! fresh with whatever byte comes next, and a failed expectation ends the
//! attempt without re-examining the bytes it already consumed. A terminator
//! that overlaps a failed attempt is therefore found later (or not at all)
//! compared to a textbook streaming matcher. See the unit tests for the
//! pinned behavior.

use crate::wsio_error::{HandshakeError, WsioResult};
use std::io;
use std::io::Read;

/// Hard upper bound on the captured handshake, in bytes. Not configurable.
pub const HANDSHAKE_LIMIT: usize = 8192;

/// Reads raw bytes from `stream` until the terminator `\r\n\r\n` is found,
/// then normalizes the captured bytes into logical header lines in wire
/// order, with HTTP style continuation lines folded into their predecessor.
///
/// Fails with [`HandshakeError::TooLarge`] once [`HANDSHAKE_LIMIT`] bytes
/// were consumed without finding the terminator. An EOF before the
/// terminator surfaces as the underlying `UnexpectedEof` io error.
pub fn read_handshake(stream: &mut dyn Read) -> WsioResult<Vec<String>> {
  let mut buffer: Vec<u8> = Vec::with_capacity(512);
  let mut found = false;

  // The limit is only checked between attempts, so a single attempt may push
  // the buffer up to 3 bytes past it. Wire compatible, kept.
  while buffer.len() < HANDSHAKE_LIMIT {
    if next_byte_is(stream, &mut buffer, b'\r')?
      && next_byte_is(stream, &mut buffer, b'\n')?
      && next_byte_is(stream, &mut buffer, b'\r')?
      && next_byte_is(stream, &mut buffer, b'\n')?
    {
      found = true;
      break;
    }
  }

  if !found {
    return Err(HandshakeError::TooLarge(buffer.len()).into());
  }

  Ok(normalize(&buffer))
}

/// Reads one byte, appends it to the capture buffer, reports whether it was
/// the expected one. Short-circuits the terminator check in the caller.
fn next_byte_is(stream: &mut dyn Read, buffer: &mut Vec<u8>, expected: u8) -> io::Result<bool> {
  let mut byte = [0u8; 1];
  stream.read_exact(&mut byte)?;
  buffer.push(byte[0]);
  Ok(byte[0] == expected)
}

/// CRLF to LF, continuation folding (LF + space / LF + tab become a single
/// space), trailing LFs stripped, then split into lines.
fn normalize(raw: &[u8]) -> Vec<String> {
  String::from_utf8_lossy(raw)
    .replace("\r\n", "\n")
    .replace("\n ", " ")
    .replace("\n\t", " ")
    .trim_end_matches('\n')
    .split('\n')
    .map(str::to_owned)
    .collect()
}

#[cfg(test)]
mod test {
  use crate::handshake::{read_handshake, HANDSHAKE_LIMIT};
  use crate::wsio_error::{HandshakeError, WsioError};
  use std::io::Read;

  fn scan(input: &[u8]) -> (Result<Vec<String>, WsioError>, usize) {
    let mut cursor = input;
    let before = cursor.len();
    let result = read_handshake(&mut cursor);
    (result, before - cursor.len())
  }

  #[test]
  fn minimal_handshake() {
    let (result, _) = scan(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
    assert_eq!(result.unwrap(), vec!["GET / HTTP/1.1", "Host: example.com"]);
  }

  #[test]
  fn continuation_folding_space() {
    let (result, _) = scan(b"GET / HTTP/1.1\r\nX-A: foo\r\n bar\r\n\r\n");
    assert_eq!(result.unwrap(), vec!["GET / HTTP/1.1", "X-A: foo bar"]);
  }

  #[test]
  fn continuation_folding_tab() {
    let (result, _) = scan(b"GET / HTTP/1.1\r\nX-A: foo\r\n\tbar\r\n\r\n");
    assert_eq!(result.unwrap(), vec!["GET / HTTP/1.1", "X-A: foo bar"]);
  }

  #[test]
  fn empty_header_block() {
    let (result, consumed) = scan(b"\r\n\r\nrest");
    assert_eq!(result.unwrap(), vec![""]);
    assert_eq!(consumed, 4);
  }

  #[test]
  fn wire_order_is_preserved() {
    let (result, _) = scan(b"GET / HTTP/1.1\r\nB: 2\r\nA: 1\r\nC: 3\r\n\r\n");
    assert_eq!(result.unwrap(), vec!["GET / HTTP/1.1", "B: 2", "A: 1", "C: 3"]);
  }

  #[test]
  fn stops_at_terminator_and_leaves_the_rest() {
    let mut cursor: &[u8] = b"GET / HTTP/1.1\r\n\r\n\x81\x05hello";
    let lines = read_handshake(&mut cursor).unwrap();
    assert_eq!(lines, vec!["GET / HTTP/1.1"]);

    // Frame bytes after the terminator must still be readable.
    let mut rest = Vec::new();
    cursor.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, b"\x81\x05hello");
  }

  #[test]
  fn too_large_fails_and_consumes_no_further_bytes() {
    let mut input = vec![b'a'; HANDSHAKE_LIMIT];
    input.extend_from_slice(b"\r\n\r\n");
    let (result, consumed) = scan(&input);
    match result {
      Err(WsioError::Handshake(HandshakeError::TooLarge(seen))) => {
        assert_eq!(seen, HANDSHAKE_LIMIT)
      }
      other => panic!("expected TooLarge, got {other:?}"),
    }
    // The terminator after the limit was never touched.
    assert_eq!(consumed, HANDSHAKE_LIMIT);
  }

  #[test]
  fn attempt_may_overrun_the_limit_by_three_bytes() {
    // Limit minus one filler byte, then an attempt that reads "\r\n\r" and a
    // mismatch. The buffer ends up 3 bytes past the limit before the scan
    // gives up.
    let mut input = vec![b'a'; HANDSHAKE_LIMIT - 1];
    input.extend_from_slice(b"\r\n\rX");
    input.extend_from_slice(b"\r\n\r\n");
    let (result, consumed) = scan(&input);
    match result {
      Err(WsioError::Handshake(HandshakeError::TooLarge(seen))) => {
        assert_eq!(seen, HANDSHAKE_LIMIT + 3)
      }
      other => panic!("expected TooLarge, got {other:?}"),
    }
    assert_eq!(consumed, HANDSHAKE_LIMIT + 3);
  }

  #[test]
  fn eof_before_terminator_is_an_io_error() {
    let (result, _) = scan(b"GET / HTTP/1.1\r\nHost: exa");
    match result {
      Err(WsioError::IO(err)) => assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof),
      other => panic!("expected io error, got {other:?}"),
    }
  }

  #[test]
  fn invalid_utf8_is_substituted_not_fatal() {
    let (result, _) = scan(b"GET / HTTP/1.1\r\nX-Bin: \xff\xfe\r\n\r\n");
    let lines = result.unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines.get(1).unwrap().starts_with("X-Bin: "));
    assert!(lines.get(1).unwrap().contains('\u{fffd}'));
  }

  /// Pins the non-overlap-aware scan: a terminator whose leading `\r\n`
  /// was already consumed by a failed attempt is not seen where a textbook
  /// matcher would see it; the scan locks onto the following one and
  /// consumes two extra bytes.
  #[test]
  fn partial_overlap_is_not_rescanned() {
    // Bytes: X \r \n \r \r \n \r \n \r \n
    // An overlap aware matcher finds the terminator at offsets 4..=7 and
    // would stop after 8 bytes. This scan fails its second attempt on the
    // double \r (consuming "\r\n\r\r"), fails the next one on the lone \n,
    // then matches at offsets 6..=9, consuming 10 bytes in total.
    let mut cursor: &[u8] = b"X\r\n\r\r\n\r\n\r\nTAIL";
    let lines = read_handshake(&mut cursor).unwrap();
    assert_eq!(lines, vec!["X", "\r"]);

    let mut rest = Vec::new();
    cursor.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, b"TAIL");
  }
}
