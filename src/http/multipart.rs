//! Multipart body decoding from a non-seekable stream.
//!
//! A network stream cannot be rewound, and every byte could belong to a
//! boundary token or to part data, so decoding works one byte at a time
//! against an incremental boundary scanner.

use crate::{errors::Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Stateful decoder for a `multipart/*` body.
///
/// Bound at construction to one input stream and the boundary token from
/// the `Content-Type` header's `boundary=` attribute. Construction
/// consumes the opening delimiter, leaving the stream at the first
/// part's headers.
///
/// Decoding a body is a loop of
/// [`skip_to_data`](MultipartReader::skip_to_data) (or explicit
/// [`read_header_line`](MultipartReader::read_header_line) calls) and
/// [`read_data`](MultipartReader::read_data); after each part,
/// `read_header_line` returns `""` when another part follows and `"--"`
/// at the closing delimiter:
///
/// ```no_run
/// # async fn decode<R: tokio::io::AsyncRead + Unpin>(stream: R) -> bare_http::Result<()> {
/// let mut parts = bare_http::MultipartReader::new(
///     "multipart/form-data; boundary=sep",
///     stream,
/// ).await?;
///
/// while parts.has_data() {
///     parts.skip_to_data().await;
///     let mut payload = Vec::new();
///     parts.read_data(|chunk| payload.extend_from_slice(chunk)).await;
///
///     // `payload` holds one part now
///     if parts.read_header_line().await.as_deref() != Some("") {
///         break; // closing delimiter
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct MultipartReader<R> {
    stream: R,
    boundary: Vec<u8>,
    chunk_size: usize,
    has_data: bool,
}

enum ScanState {
    EmittingData,
    ScanningBoundary(usize),
}

impl<R: AsyncRead + Unpin> MultipartReader<R> {
    /// Creates a reader over `stream` for the boundary declared in
    /// `content_type`, then skips the opening delimiter.
    ///
    /// Fails with [`Error::NoBoundary`] when the content type carries no
    /// usable `boundary=` attribute.
    pub async fn new(content_type: &str, stream: R) -> Result<Self> {
        Self::with_chunk_size(content_type, stream, DEFAULT_CHUNK_SIZE).await
    }

    /// Like [`new`](MultipartReader::new) with an explicit data chunk
    /// size. Chunking is internal; the bytes delivered to
    /// [`read_data`](MultipartReader::read_data) consumers are identical
    /// for every chunk size.
    pub async fn with_chunk_size(content_type: &str, stream: R, chunk_size: usize) -> Result<Self> {
        debug_assert!(chunk_size >= 4, "chunk size too small to make progress");

        let boundary = extract_boundary(content_type).ok_or(Error::NoBoundary)?;
        let mut reader = Self {
            stream,
            boundary,
            chunk_size,
            has_data: true,
        };

        // position the stream at the first part's headers
        reader.skip_boundary().await;
        Ok(reader)
    }

    /// Whether another read may succeed.
    ///
    /// `false` is authoritative: the stream is exhausted or failed and
    /// nothing more can be read. `true` is only a hint.
    pub fn has_data(&self) -> bool {
        self.has_data
    }

    /// Advances the stream for the length of a boundary field plus its
    /// trailing CRLF. Returns `false` when the stream ended first.
    pub async fn skip_boundary(&mut self) -> bool {
        for _ in 0..self.boundary.len() + 2 {
            if self.next_byte().await.is_none() {
                return false;
            }
        }
        true
    }

    /// Reads one CRLF-terminated line, with the CR trimmed. Returns
    /// `None` on premature end of stream. Bare line feeds are dropped.
    pub async fn read_header_line(&mut self) -> Option<String> {
        let mut line: Vec<u8> = Vec::new();

        loop {
            let byte = self.next_byte().await?;
            match byte {
                b'\n' if line.last() == Some(&b'\r') => {
                    line.pop();
                    break;
                }
                b'\n' => {}
                _ => line.push(byte),
            }
        }

        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Discards part headers until the blank line that starts the data
    /// section.
    pub async fn skip_to_data(&mut self) {
        while matches!(self.read_header_line().await.as_deref(), Some(line) if !line.is_empty()) {}
    }

    /// Streams the current part's payload to `consume` in chunks,
    /// stopping once the boundary token has been matched in full.
    ///
    /// The scanner keeps a match counter against the boundary: a byte
    /// that continues the partial match advances it; any other byte
    /// flushes the matched prefix plus that byte back as ordinary data
    /// and resets the counter. The CRLF that precedes the boundary is
    /// trimmed from the final chunk. On natural stream end the
    /// no-more-data flag is set instead.
    pub async fn read_data<F: FnMut(&[u8])>(&mut self, mut consume: F) {
        let mut buffer = vec![0u8; self.chunk_size + self.boundary.len()];
        let mut fill = 0;
        let mut state = ScanState::EmittingData;

        loop {
            let Some(byte) = self.next_byte().await else {
                break;
            };

            state = match state {
                ScanState::EmittingData => {
                    if byte == self.boundary[0] {
                        ScanState::ScanningBoundary(1)
                    } else {
                        buffer[fill] = byte;
                        fill += 1;
                        ScanState::EmittingData
                    }
                }
                ScanState::ScanningBoundary(matched) => {
                    if byte == self.boundary[matched] {
                        if matched + 1 == self.boundary.len() {
                            break;
                        }
                        ScanState::ScanningBoundary(matched + 1)
                    } else {
                        // failed partial match: spill the matched prefix
                        // and the current byte back as data
                        buffer[fill..fill + matched].copy_from_slice(&self.boundary[..matched]);
                        fill += matched;
                        buffer[fill] = byte;
                        fill += 1;
                        ScanState::EmittingData
                    }
                }
            };

            if fill >= self.chunk_size && matches!(state, ScanState::EmittingData) {
                // hold the last two bytes back so the CRLF preceding the
                // boundary can always be trimmed from the final chunk
                consume(&buffer[..fill - 2]);
                buffer.copy_within(fill - 2..fill, 0);
                fill = 2;
            }
        }

        if fill > 0 {
            consume(&buffer[..fill.saturating_sub(2)]);
        }
    }

    async fn next_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte).await {
            Ok(0) | Err(_) => {
                self.has_data = false;
                None
            }
            Ok(_) => Some(byte[0]),
        }
    }
}

fn extract_boundary(content_type: &str) -> Option<Vec<u8>> {
    for argument in content_type.split(';') {
        let argument = argument.trim();
        if !argument.starts_with("boundary") {
            continue;
        }

        let (_, token) = argument.split_once('=')?;
        let mut boundary = Vec::with_capacity(token.len() + 2);
        boundary.extend_from_slice(b"--");
        boundary.extend_from_slice(token.as_bytes());
        return Some(boundary);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT_TYPE: &str = "multipart/form-data; boundary=XYZ";

    fn body(parts: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            data.extend_from_slice(b"--XYZ\r\n");
            data.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"part{index}\"\r\n").as_bytes(),
            );
            data.extend_from_slice(b"\r\n");
            data.extend_from_slice(part);
            data.extend_from_slice(b"\r\n");
        }
        data.extend_from_slice(b"--XYZ--\r\n");
        data
    }

    async fn decode_all(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
        let mut reader = MultipartReader::with_chunk_size(CONTENT_TYPE, data, chunk_size)
            .await
            .unwrap();
        let mut parts = Vec::new();

        while reader.has_data() {
            reader.skip_to_data().await;
            let mut payload = Vec::new();
            reader
                .read_data(|chunk| payload.extend_from_slice(chunk))
                .await;
            parts.push(payload);

            if reader.read_header_line().await.as_deref() != Some("") {
                break;
            }
        }

        parts
    }

    #[tokio::test]
    async fn missing_boundary_fails_construction() {
        let cases = [
            "multipart/form-data",
            "multipart/form-data; charset=utf-8",
            "multipart/form-data; boundary",
        ];

        for content_type in cases {
            let result = MultipartReader::new(content_type, b"".as_slice()).await;
            assert!(matches!(result, Err(Error::NoBoundary)), "{content_type}");
        }
    }

    #[tokio::test]
    async fn boundary_extraction_tolerates_spacing() {
        let data = body(&[b"hello".as_slice()]);
        let mut reader =
            MultipartReader::new("multipart/form-data ; boundary=XYZ", data.as_slice())
                .await
                .unwrap();

        reader.skip_to_data().await;
        let mut payload = Vec::new();
        reader
            .read_data(|chunk| payload.extend_from_slice(chunk))
            .await;
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn part_headers_are_readable() {
        let data = body(&[b"payload".as_slice()]);
        let mut reader = MultipartReader::new(CONTENT_TYPE, data.as_slice())
            .await
            .unwrap();

        assert_eq!(
            reader.read_header_line().await.as_deref(),
            Some("Content-Disposition: form-data; name=\"part0\"")
        );
        assert_eq!(reader.read_header_line().await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn two_parts_reconstructed_byte_identical() {
        let small: Vec<u8> = (0..10u32).map(|i| (i % 251) as u8).collect();
        let large: Vec<u8> = (0..4096u32 + 50).map(|i| (i % 251) as u8).collect();
        let data = body(&[small.as_slice(), large.as_slice()]);

        // identical payloads regardless of the internal chunk size,
        // including boundaries straddling a flush point
        for chunk_size in [7, 16, 64, 1024, 4096] {
            let parts = decode_all(&data, chunk_size).await;

            assert_eq!(parts.len(), 2, "chunk size {chunk_size}");
            assert_eq!(parts[0], small, "chunk size {chunk_size}");
            assert_eq!(parts[1], large, "chunk size {chunk_size}");
        }
    }

    #[tokio::test]
    async fn part_data_may_contain_boundary_prefixes() {
        let tricky = b"dashes -- and --XY almost-boundaries - everywhere --X".as_slice();
        let data = body(&[tricky]);

        for chunk_size in [8, 4096] {
            let parts = decode_all(&data, chunk_size).await;
            assert_eq!(parts.len(), 1);
            assert_eq!(parts[0], tricky);
        }
    }

    #[tokio::test]
    async fn empty_part_yields_empty_payload() {
        let data = body(&[b"".as_slice(), b"after".as_slice()]);
        let parts = decode_all(&data, 4096).await;

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], b"");
        assert_eq!(parts[1], b"after");
    }

    #[tokio::test]
    async fn flush_aligned_boundary_still_trimmed() {
        // part sized so data plus CRLF lands exactly on a flush point
        for payload_len in [6usize, 8, 14, 16] {
            let payload: Vec<u8> = (0..payload_len).map(|i| b'a' + (i % 26) as u8).collect();
            let data = body(&[payload.as_slice()]);

            let parts = decode_all(&data, 8).await;
            assert_eq!(parts[0], payload, "payload length {payload_len}");
        }
    }

    #[tokio::test]
    async fn premature_end_clears_has_data() {
        // truncated: opening boundary and headers, data cut off mid-part
        let mut data = Vec::new();
        data.extend_from_slice(b"--XYZ\r\nContent-Disposition: form-data\r\n\r\nhalf of the");

        let mut reader = MultipartReader::new(CONTENT_TYPE, data.as_slice())
            .await
            .unwrap();
        assert!(reader.has_data());

        reader.skip_to_data().await;
        let mut payload = Vec::new();
        reader
            .read_data(|chunk| payload.extend_from_slice(chunk))
            .await;

        assert!(!reader.has_data());
        // once false, stays false
        assert!(!reader.skip_boundary().await);
        assert!(!reader.has_data());
    }

    #[tokio::test]
    async fn truncated_opening_boundary() {
        let mut reader = MultipartReader::new(CONTENT_TYPE, b"--X".as_slice())
            .await
            .unwrap();
        assert!(!reader.has_data());
        assert_eq!(reader.read_header_line().await, None);
    }

    #[tokio::test]
    async fn bare_line_feeds_dropped_in_header_lines() {
        let data = b"--XYZ\r\nodd\nheader\r\n".as_slice();
        let mut reader = MultipartReader::new(CONTENT_TYPE, data).await.unwrap();

        assert_eq!(reader.read_header_line().await.as_deref(), Some("oddheader"));
    }
}
