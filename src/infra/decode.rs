//! # Incremental Output Decoding / 增量输出解码
//!
//! Child processes write raw bytes and pipe reads can split a multi-byte UTF-8
//! character in two. The decoder in this module keeps such a truncated trailing
//! fragment and prefixes it to the next chunk, so the captured text is never
//! corrupted at read boundaries.
//!
//! 子进程写入原始字节，管道读取可能会把一个多字节 UTF-8 字符拆成两半。
//! 此模块中的解码器会保留被截断的尾部片段，并将其添加到下一个数据块之前，
//! 因此捕获的文本不会在读取边界处损坏。

/// Stateful UTF-8 decoder for a single byte stream.
/// 用于单个字节流的有状态 UTF-8 解码器。
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Bytes of an incomplete trailing sequence held over from the last chunk.
    /// 上一个数据块遗留下来的不完整尾部序列的字节。
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the next chunk of the stream.
    ///
    /// Complete characters are returned. A truncated sequence at the end of the
    /// chunk is held over; invalid bytes in the middle of the stream are replaced
    /// by `U+FFFD` so a single bad byte cannot stall the stream.
    ///
    /// 解码流的下一个数据块。完整的字符会被返回；数据块末尾被截断的序列会被保留；
    /// 流中间的无效字节会被替换为 `U+FFFD`。
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        // Unexpected end of input: the sequence may continue in the next read.
                        None => {
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes the held-over fragment at end of stream, lossily.
    /// 在流结束时以有损方式刷新保留的片段。
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    /// Number of bytes currently held over.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
