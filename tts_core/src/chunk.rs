//! Splitting a finished audio buffer into wire-sized chunks.

/// Default chunk payload size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// One bounded slice of an audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioChunk<'a> {
    /// 1-based position within the request.
    pub index: u32,
    pub data: &'a [u8],
    /// Bytes yielded so far, including this chunk.
    pub running_total: usize,
    pub is_final: bool,
}

/// Iterator over the chunks of `audio`, in order.
#[derive(Debug, Clone)]
pub struct AudioChunks<'a> {
    rest: &'a [u8],
    chunk_size: usize,
    index: u32,
    running_total: usize,
}

impl<'a> AudioChunks<'a> {
    /// `chunk_size` of zero falls back to [`DEFAULT_CHUNK_SIZE`].
    pub fn new(audio: &'a [u8], chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        Self {
            rest: audio,
            chunk_size,
            index: 0,
            running_total: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl<'a> Iterator for AudioChunks<'a> {
    type Item = AudioChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let take = self.chunk_size.min(self.rest.len());
        let (data, rest) = self.rest.split_at(take);
        self.rest = rest;
        self.index += 1;
        self.running_total += data.len();
        Some(AudioChunk {
            index: self.index,
            data,
            running_total: self.running_total,
            is_final: rest.is_empty(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rest.len().div_ceil(self.chunk_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for AudioChunks<'_> {}
