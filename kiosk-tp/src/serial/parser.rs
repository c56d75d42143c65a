//! Tag stream parser
//!
//! Chunks are parsed independently. A record whose payload is split across
//! two reads is dropped rather than reassembled; the read buffer size bounds
//! how much of a message one read can see.

use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Marker preceding a tag identifier
pub const UID_MARKER: &str = "UID Value:";

const RECORD_TERMINATOR: &str = "\r\n";

/// A parsed tag-scan event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagScan {
    pub uid: String,
}

impl TagScan {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Extract every complete scan record from one read chunk, in order
///
/// A record counts as complete when its CRLF terminator appears in the same
/// chunk before any following marker. Incomplete records and empty
/// identifiers are dropped.
pub fn parse_chunk(chunk: &[u8]) -> Vec<TagScan> {
    let text = String::from_utf8_lossy(chunk);
    let mut scans = Vec::new();
    let mut rest: &str = &text;

    while let Some(start) = rest.find(UID_MARKER) {
        let after = &rest[start + UID_MARKER.len()..];
        let end = match after.find(RECORD_TERMINATOR) {
            Some(end) => end,
            None => break,
        };

        match after.find(UID_MARKER) {
            // Another record starts before this one terminates
            Some(next) if next < end => {
                rest = &after[next..];
            }
            _ => {
                let uid = after[..end].trim();
                if !uid.is_empty() {
                    scans.push(TagScan::new(uid));
                }
                rest = &after[end + RECORD_TERMINATOR.len()..];
            }
        }
    }

    scans
}

/// Reads fixed-size chunks off a byte stream and yields scans in arrival order
pub struct TagReader<R> {
    inner: R,
    buf: Vec<u8>,
    pending: VecDeque<TagScan>,
}

impl<R: AsyncRead + Unpin> TagReader<R> {
    pub fn new(inner: R, buffer_size: usize) -> Self {
        Self {
            inner,
            buf: vec![0; buffer_size.max(1)],
            pending: VecDeque::new(),
        }
    }

    /// Next scan, or `None` once the stream reports end of file
    pub async fn next_scan(&mut self) -> std::io::Result<Option<TagScan>> {
        loop {
            if let Some(scan) = self.pending.pop_front() {
                return Ok(Some(scan));
            }

            let n = self.inner.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.pending.extend(parse_chunk(&self.buf[..n]));
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uids(chunk: &[u8]) -> Vec<String> {
        parse_chunk(chunk).into_iter().map(|s| s.uid).collect()
    }

    #[test]
    fn test_single_record() {
        assert_eq!(uids(b"UID Value: 04 A3 1B 22\r\n"), vec!["04 A3 1B 22"]);
    }

    #[test]
    fn test_record_surrounded_by_noise() {
        let chunk = b"Found chip PN532\r\nUID Length: 4 bytes\r\nUID Value:  0x04 0xA3  \r\n\r\n";
        assert_eq!(uids(chunk), vec!["0x04 0xA3"]);
    }

    #[test]
    fn test_multiple_records_in_one_chunk() {
        let chunk = b"UID Value: AAA\r\nUID Value: BBB\r\n";
        assert_eq!(uids(chunk), vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_unterminated_record_dropped() {
        assert!(uids(b"UID Value: 04 A3").is_empty());
        assert_eq!(uids(b"UID Value: AAA\r\nUID Value: BB"), vec!["AAA"]);
    }

    #[test]
    fn test_record_interrupted_by_marker_dropped() {
        assert_eq!(uids(b"UID Value: AA UID Value: BBB\r\n"), vec!["BBB"]);
    }

    #[test]
    fn test_empty_uid_dropped() {
        assert!(uids(b"UID Value:   \r\n").is_empty());
    }

    #[test]
    fn test_chunk_without_marker() {
        assert!(uids(b"Waiting for an ISO14443A card\r\n").is_empty());
        assert!(uids(b"").is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        assert_eq!(uids(b"\xff\xfeUID Value: C0FFEE\r\n"), vec!["C0FFEE"]);
    }

    #[tokio::test]
    async fn test_reader_yields_scans_then_eof() {
        let stream: &[u8] = b"UID Value: AAA\r\nnoise\r\nUID Value: BBB\r\n";
        let mut reader = TagReader::new(stream, 100);

        assert_eq!(reader.next_scan().await.unwrap(), Some(TagScan::new("AAA")));
        assert_eq!(reader.next_scan().await.unwrap(), Some(TagScan::new("BBB")));
        assert_eq!(reader.next_scan().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_drops_record_split_across_reads() {
        // 16-byte reads split the second record's payload
        let stream: &[u8] = b"UID Value: A1\r\n.UID Value: B22222\r\n";
        let mut reader = TagReader::new(stream, 16);

        assert_eq!(reader.next_scan().await.unwrap(), Some(TagScan::new("A1")));
        assert_eq!(reader.next_scan().await.unwrap(), None);
    }
}
