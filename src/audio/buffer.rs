use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, TransformError};

/// Growable in-memory byte store for raw PCM with a read/write cursor.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    cursor: Cursor<Vec<u8>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Bytes between the cursor and the end of the store.
    pub fn bytes_available(&self) -> usize {
        self.len().saturating_sub(self.cursor.position() as usize)
    }

    pub fn rewind(&mut self) {
        self.cursor.set_position(0);
    }

    /// Drop all content and reset the cursor.
    pub fn clear(&mut self) {
        self.cursor.get_mut().clear();
        self.cursor.set_position(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }
}

impl Read for SampleBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Write for SampleBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SampleBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

#[derive(Debug, Default)]
struct SharedBuffer {
    buffer: Mutex<SampleBuffer>,
    locked: AtomicBool,
}

/// Shared handle to the controller's sample buffer.
///
/// Decoders append through this handle while the controller is idle. Writes
/// fail with [`TransformError::BufferLocked`] while a run is reading.
#[derive(Clone, Debug, Default)]
pub struct DataSink {
    inner: Arc<SharedBuffer>,
}

impl DataSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, SampleBuffer> {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy bytes starting at `offset` into `buf`. Returns the count copied,
    /// zero at or past the end.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let buffer = self.buffer();
        let bytes = buffer.as_bytes();
        let start = offset.min(bytes.len());
        let count = buf.len().min(bytes.len() - start);
        buf[..count].copy_from_slice(&bytes[start..start + count]);
        count
    }

    /// Append raw PCM bytes at the cursor.
    pub fn append(&self, bytes: &[u8]) -> Result<()> {
        if self.is_locked() {
            return Err(TransformError::BufferLocked);
        }
        let mut buffer = self.buffer();
        buffer.seek(SeekFrom::End(0)).map_err(io_to_format)?;
        buffer.write_all(bytes).map_err(io_to_format)
    }

    pub fn append_i16(&self, samples: &[i16]) -> Result<()> {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.append(&bytes)
    }

    pub fn truncate(&self) -> Result<()> {
        if self.is_locked() {
            return Err(TransformError::BufferLocked);
        }
        self.buffer().clear();
        Ok(())
    }

    /// Lock the buffer against writes, rewind it and copy out its content.
    ///
    /// The lock is held until the returned guard is dropped.
    pub(crate) fn begin_read(&self) -> Result<(ReadLock, Vec<u8>)> {
        if self
            .inner
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TransformError::BufferLocked);
        }
        let guard = ReadLock { sink: self.clone() };

        let mut buffer = self.buffer();
        buffer.rewind();
        let mut bytes = Vec::with_capacity(buffer.bytes_available());
        buffer.read_to_end(&mut bytes).map_err(io_to_format)?;
        drop(buffer);

        Ok((guard, bytes))
    }
}

impl Write for DataSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)
            .map(|_| buf.len())
            .map_err(|e| io::Error::new(io::ErrorKind::WouldBlock, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps the sample buffer read-only until dropped.
#[derive(Debug)]
pub(crate) struct ReadLock {
    sink: DataSink,
}

impl Drop for ReadLock {
    fn drop(&mut self) {
        self.sink.inner.locked.store(false, Ordering::Release);
    }
}

fn io_to_format(e: io::Error) -> TransformError {
    TransformError::UnsupportedFormat(format!("sample buffer I/O: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_seek_and_clear() {
        let mut buffer = SampleBuffer::new();
        buffer.write_all(&[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.bytes_available(), 0);

        buffer.seek(SeekFrom::Start(1)).unwrap();
        assert_eq!(buffer.bytes_available(), 3);

        buffer.rewind();
        let mut out = [0u8; 4];
        buffer.read_exact(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.position(), 0);
    }

    #[test]
    fn appends_after_partial_read() {
        let sink = DataSink::new();
        sink.append_i16(&[1, 2]).unwrap();
        {
            let (_lock, bytes) = sink.begin_read().unwrap();
            assert_eq!(bytes.len(), 4);
        }
        sink.append_i16(&[3]).unwrap();
        let (_lock, bytes) = sink.begin_read().unwrap();
        assert_eq!(bytes, vec![1, 0, 2, 0, 3, 0]);
    }

    #[test]
    fn writes_rejected_while_reading() {
        let sink = DataSink::new();
        sink.append(&[0, 1]).unwrap();

        let (lock, _) = sink.begin_read().unwrap();
        assert!(sink.is_locked());
        assert_eq!(sink.append(&[2]), Err(TransformError::BufferLocked));
        assert_eq!(sink.truncate(), Err(TransformError::BufferLocked));
        assert!(sink.begin_read().is_err());

        drop(lock);
        assert!(!sink.is_locked());
        sink.truncate().unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn random_read_at_offsets() {
        let sink = DataSink::new();
        sink.append(&[10, 11, 12, 13, 14]).unwrap();

        let mut out = [0u8; 3];
        assert_eq!(sink.read_at(1, &mut out), 3);
        assert_eq!(out, [11, 12, 13]);
        assert_eq!(sink.read_at(3, &mut out), 2);
        assert_eq!(&out[..2], &[13, 14]);
        assert_eq!(sink.read_at(9, &mut out), 0);

        // Reads stay available while a run holds the buffer.
        let (_lock, _) = sink.begin_read().unwrap();
        assert_eq!(sink.read_at(0, &mut out), 3);
        assert_eq!(out, [10, 11, 12]);
    }

    #[test]
    fn io_write_adapter() {
        let mut sink = DataSink::new();
        sink.write_all(&[9, 8, 7]).unwrap();
        assert_eq!(sink.len(), 3);
    }
}
