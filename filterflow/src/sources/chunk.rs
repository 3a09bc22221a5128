use super::Source;
use crate::core::{Packet, Unit};
use crate::errors::{FilterError, FilterResult};
use crate::pipeline::ShutdownToken;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use tracing::debug;

/// Reads fixed-size byte chunks from a reader.
///
/// The read position (`offset`, `chunk_index`) is held between pulls and
/// stamped on every packet as the `source_offset` and `chunk_index`
/// attributes. The reader is owned exclusively and dropped on close.
#[derive(Debug)]
pub struct ChunkSource<R> {
    reader: Option<R>,
    chunk_size: usize,
    offset: u64,
    chunk_index: u64,
}

impl<R: Read + Send> ChunkSource<R> {
    /// Creates a source reading `chunk_size` bytes per packet.
    pub fn new(reader: R, chunk_size: usize) -> FilterResult<Self> {
        if chunk_size == 0 {
            return Err(FilterError::logic("Chunk size must be positive"));
        }
        Ok(Self {
            reader: Some(reader),
            chunk_size,
            offset: 0,
            chunk_index: 0,
        })
    }

    /// Bytes read so far.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Chunks produced so far.
    #[must_use]
    pub fn chunk_index(&self) -> u64 {
        self.chunk_index
    }

    fn read_chunk(reader: &mut R, size: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0; size];
        let mut filled = 0;
        while filled < size {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

impl ChunkSource<BufReader<File>> {
    /// Opens a file for reading in chunks.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> FilterResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file), chunk_size)
    }
}

impl<R: Read + Send> Source for ChunkSource<R> {
    fn pull(&mut self, shutdown: &ShutdownToken) -> FilterResult<Option<Unit>> {
        if shutdown.is_shutting_down() {
            return Ok(None);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let chunk = Self::read_chunk(reader, self.chunk_size)?;
        if chunk.is_empty() {
            debug!(offset = self.offset, chunks = self.chunk_index, "Chunk source exhausted");
            return Ok(None);
        }

        let packet = Packet::new(chunk)
            .with_attr("source_offset", self.offset)
            .with_attr("chunk_index", self.chunk_index);
        self.offset += packet.payload_len() as u64;
        self.chunk_index += 1;
        Ok(Some(packet.into()))
    }

    fn close_source(&mut self) -> FilterResult<()> {
        self.reader = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Payload;
    use std::io::{Cursor, Write};

    fn packet(unit: Unit) -> Packet {
        unit.as_packet().cloned().unwrap()
    }

    #[test]
    fn test_chunks_and_resumable_state() {
        let mut source = ChunkSource::new(Cursor::new(b"abcdefg".to_vec()), 3).unwrap();
        let token = ShutdownToken::new();

        let first = packet(source.pull(&token).unwrap().unwrap());
        assert_eq!(first.payload(), Payload::from(b"abc".to_vec()));
        assert_eq!(first.get_i64("source_offset").unwrap(), 0);
        assert_eq!(source.offset(), 3);

        let _ = source.pull(&token).unwrap().unwrap();
        let last = packet(source.pull(&token).unwrap().unwrap());
        assert_eq!(last.payload(), Payload::from(b"g".to_vec()));
        assert_eq!(last.get_i64("chunk_index").unwrap(), 2);
        assert_eq!(last.get_i64("source_offset").unwrap(), 6);

        assert!(source.pull(&token).unwrap().is_none());
    }

    #[test]
    fn test_stops_on_shutdown_and_close() {
        let mut source = ChunkSource::new(Cursor::new(b"abcdef".to_vec()), 2).unwrap();
        let token = ShutdownToken::new();
        assert!(source.pull(&token).unwrap().is_some());

        token.shut_down("enough");
        assert!(source.pull(&token).unwrap().is_none());

        source.close_source().unwrap();
        source.close_source().unwrap();
        assert!(source.pull(&ShutdownToken::new()).unwrap().is_none());
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let mut source = ChunkSource::open(file.path(), 4).unwrap();
        let token = ShutdownToken::new();
        let mut sizes = Vec::new();
        while let Some(unit) = source.pull(&token).unwrap() {
            sizes.push(packet(unit).payload_len());
        }
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(ChunkSource::new(Cursor::new(Vec::new()), 0).is_err());
    }
}
