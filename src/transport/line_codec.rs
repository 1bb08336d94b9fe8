//! Delimiter-framed codec for wire lines.
//!
//! Shaped after `tokio_util::codec::LinesCodec`, with one difference: a line
//! that is too long or not valid UTF-8 is reported as a per-line
//! [`ParseFailure`] item instead of a decoder error, so the stream keeps
//! going. Only I/O errors end the stream.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::ParseFailure;
use crate::protocol::DELIMITER;

/// One received line, or the reason it was rejected
pub type Arrival = Result<String, ParseFailure>;

#[derive(Debug, Clone)]
pub struct WireLineCodec {
    /// Longest accepted line, excluding the delimiter
    max_length: usize,
    /// Where the next delimiter search resumes within the buffer
    next_index: usize,
    /// Dropping bytes of an oversized line until its delimiter shows up
    discarding: bool,
}

impl WireLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self { max_length, next_index: 0, discarding: false }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn oversized(&self) -> ParseFailure {
        ParseFailure::new("", format!("line exceeded {} bytes", self.max_length))
    }
}

fn to_line(bytes: &[u8]) -> Arrival {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        ParseFailure::new(String::from_utf8_lossy(bytes), format!("invalid UTF-8: {}", e))
    })
}

impl Decoder for WireLineCodec {
    type Item = Arrival;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Arrival>, io::Error> {
        loop {
            let read_to = self.max_length.saturating_add(1).min(buf.len());
            let offset = buf[self.next_index..read_to].iter().position(|b| *b == DELIMITER);

            match (self.discarding, offset) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                    return Ok(Some(Err(self.oversized())));
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    return Ok(Some(to_line(&line[..end])));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Arrival>, io::Error> {
        if let Some(arrival) = self.decode(buf)? {
            return Ok(Some(arrival));
        }
        if self.discarding {
            buf.clear();
            self.discarding = false;
            self.next_index = 0;
            return Ok(Some(Err(self.oversized())));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        // Bytes after the last delimiter never formed a complete message
        let rest = buf.split();
        self.next_index = 0;
        let raw = String::from_utf8_lossy(&rest).into_owned();
        Ok(Some(Err(ParseFailure::new(raw, "stream ended before line delimiter"))))
    }
}

impl Encoder<String> for WireLineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), io::Error> {
        let body = line.strip_suffix(DELIMITER as char).unwrap_or(&line);
        if body.as_bytes().contains(&DELIMITER) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "wire line contains an embedded delimiter",
            ));
        }
        buf.reserve(body.len() + 1);
        buf.put_slice(body.as_bytes());
        buf.put_u8(DELIMITER);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut WireLineCodec, buf: &mut BytesMut) -> Vec<Arrival> {
        let mut out = Vec::new();
        while let Some(arrival) = codec.decode(buf).unwrap() {
            out.push(arrival);
        }
        out
    }

    #[test]
    fn splits_multiple_lines_in_one_read() {
        let mut codec = WireLineCodec::new(64);
        let mut buf = BytesMut::from(&b"one\ntwo\r\nthree"[..]);

        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(lines, vec![Ok("one".to_string()), Ok("two".to_string())]);
        assert_eq!(&buf[..], b"three");
    }

    #[test]
    fn buffers_partial_lines_across_reads() {
        let mut codec = WireLineCodec::new(64);
        let mut buf = BytesMut::new();

        buf.extend_from_slice(b"{\"frame_id\"");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b":1}");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\n{");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Ok("{\"frame_id\":1}".to_string())));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_lines_are_discarded_and_reported() {
        let mut codec = WireLineCodec::new(4);
        let mut buf = BytesMut::from(&b"abcdefgh"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"ij\nok\n");
        let lines = decode_all(&mut codec, &mut buf);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_ref().unwrap_err().reason, "line exceeded 4 bytes");
        assert_eq!(lines[1], Ok("ok".to_string()));
    }

    #[test]
    fn invalid_utf8_is_a_line_failure() {
        let mut codec = WireLineCodec::new(64);
        let mut buf = BytesMut::from(&b"\xff\xfe\nnext\n"[..]);

        let lines = decode_all(&mut codec, &mut buf);
        assert!(lines[0].as_ref().unwrap_err().reason.starts_with("invalid UTF-8"));
        assert_eq!(lines[1], Ok("next".to_string()));
    }

    #[test]
    fn unterminated_tail_is_reported_at_eof() {
        let mut codec = WireLineCodec::new(64);
        let mut buf = BytesMut::from(&b"done\npartial"[..]);

        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(Ok("done".to_string())));
        let tail = codec.decode_eof(&mut buf).unwrap().unwrap().unwrap_err();
        assert_eq!(tail.raw_line, "partial");
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn encoder_appends_exactly_one_delimiter() {
        let mut codec = WireLineCodec::new(64);
        let mut buf = BytesMut::new();

        codec.encode("a".to_string(), &mut buf).unwrap();
        codec.encode("b\n".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"a\nb\n");

        assert!(codec.encode("c\nd".to_string(), &mut buf).is_err());
    }
}
