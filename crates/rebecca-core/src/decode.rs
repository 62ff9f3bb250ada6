use encoding_rs::{Decoder, DecoderResult, UTF_8};

/// Incremental UTF-8 decoder for a chunked byte stream.
///
/// A multi-byte character split across two chunks is held back until the
/// rest of it arrives. Malformed bytes decode to U+FFFD instead of failing.
pub struct Utf8StreamDecoder {
    inner: Decoder,
    malformed: usize,
}

impl Default for Utf8StreamDecoder {
    fn default() -> Self {
        Self {
            // A leading U+FEFF is reply text, not a byte order mark
            inner: UTF_8.new_decoder_without_bom_handling(),
            malformed: 0,
        }
    }
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning every complete character available so far
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.run(chunk, false)
    }

    /// Flush at end of stream. A dangling partial character becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        self.run(&[], true)
    }

    /// Number of malformed sequences replaced so far
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    fn run(&mut self, mut src: &[u8], last: bool) -> String {
        let mut out = String::new();

        loop {
            let needed = self
                .inner
                .max_utf8_buffer_length_without_replacement(src.len())
                .unwrap_or(src.len() * 3 + 4);
            out.reserve(needed);

            let (result, read) = self
                .inner
                .decode_to_string_without_replacement(src, &mut out, last);
            src = &src[read..];

            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => continue,
                DecoderResult::Malformed(_, _) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.malformed += 1;
                }
            }
        }

        out
    }
}
