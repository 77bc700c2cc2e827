use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Incremental charset decoder emitting UTF-8 `String` frames.
///
/// Malformed input turns into U+FFFD, the same policy a browser `FileReader`
/// applies. Incomplete multi-byte sequences at a chunk boundary stay pending
/// in the decoder state until more input arrives.
pub struct Transcoder {
    decoder: encoding_rs::Decoder,
    finished: bool,
}

impl Transcoder {
    pub fn new(encoding: &'static encoding_rs::Encoding) -> Self {
        Self {
            decoder: encoding.new_decoder(),
            finished: false,
        }
    }

    fn frame_for(&self, input_len: usize) -> String {
        // `max_utf8_buffer_length` capacity guarantees a single call drains
        // the input, so the decode loops below never see `OutputFull`.
        String::with_capacity(
            self.decoder
                .max_utf8_buffer_length(input_len)
                .unwrap_or(input_len * 3 + 16),
        )
    }
}

impl Decoder for Transcoder {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut out = self.frame_for(src.len());
        let (_result, bytes_read, _had_errors) =
            self.decoder.decode_to_string(src, &mut out, false);
        src.advance(bytes_read);

        if out.is_empty() {
            return Ok(None);
        }
        Ok(Some(out))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.finished {
            return Ok(None);
        }

        // Last call even when the buffer is empty: a pending partial
        // sequence still has to flush as U+FFFD.
        let mut out = self.frame_for(buf.len());
        let (_result, bytes_read, _had_errors) =
            self.decoder.decode_to_string(buf, &mut out, true);
        buf.advance(bytes_read);
        self.finished = true;

        if out.is_empty() {
            return Ok(None);
        }
        Ok(Some(out))
    }
}
