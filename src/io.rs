use crate::codec::Transcoder;
use crate::{CsvResult, ImportError};
use futures::StreamExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio_util::codec::FramedRead;
use tracing::debug;

/// Hard cap on accepted document size: 10 MiB.
pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// A fully decoded source document, ready for parsing.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// File name the document was selected under.
    pub name: String,
    /// Bytes consumed from the source.
    pub size_bytes: u64,
    /// Decoded text: UTF-8, malformed input replaced with U+FFFD.
    pub content: String,
}

/// Reads and decodes candidate documents.
///
/// Only `.csv` names (case-insensitive) are accepted, and anything past the
/// byte cap fails with [`ImportError::FileTooLarge`] before parsing starts.
#[derive(Debug, Clone)]
pub struct DocumentReader {
    max_bytes: u64,
    charset: &'static encoding_rs::Encoding,
}

impl Default for DocumentReader {
    fn default() -> Self {
        Self {
            max_bytes: MAX_DOCUMENT_BYTES,
            charset: encoding_rs::UTF_8,
        }
    }
}

impl DocumentReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the size cap (bytes of encoded input, not decoded text).
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Expect a character encoding other than UTF-8.
    pub fn with_charset(mut self, charset: &'static encoding_rs::Encoding) -> Self {
        self.charset = charset;
        self
    }

    /// Read a document from a local file.
    ///
    /// The size check runs against file metadata first, so a multi-gigabyte
    /// file is refused without reading a byte of it.
    pub async fn read_path(&self, path: &Path) -> CsvResult<RawDocument> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        check_extension(&name)?;

        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        if size > self.max_bytes {
            return Err(ImportError::FileTooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        // Metadata can lag a concurrent writer; the streaming cap stays on.
        self.decode(file, name).await
    }

    /// Read a document from any async byte source under the same name gate
    /// and size cap as [`read_path`](Self::read_path).
    pub async fn read_from<R>(&self, reader: R, name: &str) -> CsvResult<RawDocument>
    where
        R: AsyncRead + Unpin + Send,
    {
        check_extension(name)?;
        self.decode(reader, name.to_string()).await
    }

    async fn decode<R>(&self, reader: R, name: String) -> CsvResult<RawDocument>
    where
        R: AsyncRead + Unpin + Send,
    {
        // Take one byte past the cap so "exactly at the limit" and "over it"
        // are distinguishable without buffering the whole overage.
        let buffered = BufReader::with_capacity(1 << 20, reader);
        let capped = buffered.take(self.max_bytes + 1);
        let mut frames = FramedRead::new(capped, Transcoder::new(self.charset));

        let mut content = String::new();
        while let Some(frame) = frames.next().await {
            content.push_str(&frame?);
        }

        let consumed = self.max_bytes + 1 - frames.get_ref().limit();
        if consumed > self.max_bytes {
            return Err(ImportError::FileTooLarge {
                size: consumed,
                limit: self.max_bytes,
            });
        }

        debug!(name = %name, bytes = consumed, "document decoded");
        Ok(RawDocument {
            name,
            size_bytes: consumed,
            content,
        })
    }
}

fn check_extension(name: &str) -> CsvResult<()> {
    if name.to_ascii_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(ImportError::UnsupportedFormat(name.to_string()))
    }
}
