//! Fixed-slot circular buffer over a [`SharedRegion`]
//!
//! One side owns the write index, the other owns the read index. A producer
//! copies the payload into the slot first and only then publishes the advanced
//! write index (release store). A consumer loads the write index (acquire) and
//! never looks at a slot the index has not moved past.
//!
//! There are no sequence numbers on the wire: if the producer laps the
//! consumer, unread slots are overwritten and the consumer cannot tell. With
//! equal indices meaning "empty", a ring holds at most `slot_count - 1` unread
//! records.

use std::path::Path;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

use super::region::{ChannelError, SharedRegion};

pub const SLOT_COUNT: usize = 256;

/// Trailing control block: four u32 words
pub const CONTROL_BLOCK_SIZE: usize = 16;

/// "TAUW" stamped by the producers into control word 2
pub const CONTROL_SENTINEL: u32 = 0x5441_5557;

const WRITE_INDEX_WORD: usize = 0;
const READ_INDEX_WORD: usize = 1;
const SENTINEL_WORD: usize = 2;

#[derive(Debug)]
pub struct RingBufferChannel {
    region: SharedRegion,
    slot_size: usize,
    slot_count: usize,
    // local cursors, mirrored into the control block when they move
    write_cursor: u32,
    read_cursor: u32,
}

impl RingBufferChannel {
    /// Bytes needed for `slot_count` slots plus the control block
    pub fn region_size(slot_size: usize, slot_count: usize) -> usize {
        slot_size * slot_count + CONTROL_BLOCK_SIZE
    }

    /// Maps an existing ring created by the other process
    pub fn open(path: &Path, slot_size: usize, slot_count: usize) -> Result<Self, ChannelError> {
        check_geometry(slot_size, slot_count)?;
        let region = SharedRegion::open(path, Self::region_size(slot_size, slot_count))?;
        let channel = Self::attach(region, slot_size, slot_count);

        let sentinel = channel.control_word(SENTINEL_WORD).load(Ordering::Acquire);
        if sentinel != CONTROL_SENTINEL {
            warn!(
                "Ring {:?} carries sentinel {:#010x}, expected {:#010x}; continuing",
                path, sentinel, CONTROL_SENTINEL
            );
        }

        info!(
            "Opened ring {:?}: {} slots × {} bytes (write={}, read={})",
            path, slot_count, slot_size, channel.write_cursor, channel.read_cursor
        );
        Ok(channel)
    }

    /// Creates and stamps a fresh ring, used when this process is the side
    /// that owns the region's lifetime
    pub fn create(path: &Path, slot_size: usize, slot_count: usize) -> Result<Self, ChannelError> {
        check_geometry(slot_size, slot_count)?;
        let region = SharedRegion::create(path, Self::region_size(slot_size, slot_count))?;
        let channel = Self::attach(region, slot_size, slot_count);
        channel
            .control_word(SENTINEL_WORD)
            .store(CONTROL_SENTINEL, Ordering::Release);

        debug!("Created ring {:?}: {} slots × {} bytes", path, slot_count, slot_size);
        Ok(channel)
    }

    fn attach(region: SharedRegion, slot_size: usize, slot_count: usize) -> Self {
        let mut channel = Self {
            region,
            slot_size,
            slot_count,
            write_cursor: 0,
            read_cursor: 0,
        };
        // Resume where both sides left off; a restarted consumer must not
        // replay the whole ring.
        channel.write_cursor = channel.load_index(WRITE_INDEX_WORD, Ordering::Acquire);
        channel.read_cursor = channel.load_index(READ_INDEX_WORD, Ordering::Acquire);
        channel
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn path(&self) -> &Path {
        self.region.path()
    }

    /// Producer side: payload first, then publish the advanced index
    pub fn write(&mut self, record: &[u8]) -> Result<(), ChannelError> {
        if record.len() != self.slot_size {
            return Err(ChannelError::RecordSize {
                expected: self.slot_size,
                actual: record.len(),
            });
        }

        let offset = self.write_cursor as usize * self.slot_size;
        self.region.write_bytes(offset, record);

        self.write_cursor = self.advance(self.write_cursor);
        self.control_word(WRITE_INDEX_WORD)
            .store(self.write_cursor, Ordering::Release);
        Ok(())
    }

    /// Consumer side: every slot between the read cursor and the published
    /// write index, in write order. The read index is persisted once per batch.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        let write_index = self.load_index(WRITE_INDEX_WORD, Ordering::Acquire);
        let mut records = Vec::new();

        while self.read_cursor != write_index {
            let mut slot = vec![0u8; self.slot_size];
            self.region
                .read_bytes(self.read_cursor as usize * self.slot_size, &mut slot);
            records.push(slot);
            self.read_cursor = self.advance(self.read_cursor);
        }

        if !records.is_empty() {
            self.control_word(READ_INDEX_WORD)
                .store(self.read_cursor, Ordering::Release);
        }
        records
    }

    /// Records published but not yet drained
    pub fn pending(&self) -> usize {
        let write_index = self.load_index(WRITE_INDEX_WORD, Ordering::Acquire) as usize;
        let read_index = self.read_cursor as usize;
        (write_index + self.slot_count - read_index) % self.slot_count
    }

    pub fn close(self) -> Result<(), ChannelError> {
        self.region.close()
    }

    fn advance(&self, index: u32) -> u32 {
        ((index as usize + 1) % self.slot_count) as u32
    }

    // The other side may have left anything in the control block; indices are
    // always reduced modulo the slot count before use.
    fn load_index(&self, word: usize, order: Ordering) -> u32 {
        let raw = self.control_word(word).load(order);
        (raw as usize % self.slot_count) as u32
    }

    fn control_word(&self, word: usize) -> &std::sync::atomic::AtomicU32 {
        self.region
            .word(self.slot_size * self.slot_count + word * 4)
    }
}

fn check_geometry(slot_size: usize, slot_count: usize) -> Result<(), ChannelError> {
    if slot_size == 0 || slot_count < 2 {
        return Err(ChannelError::Geometry(format!(
            "need a non-empty slot and at least two slots, got {} × {}",
            slot_count, slot_size
        )));
    }
    if (slot_size * slot_count) % 4 != 0 {
        return Err(ChannelError::Geometry(format!(
            "control block at {} is not word aligned",
            slot_size * slot_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn record(n: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; 8];
        bytes[..4].copy_from_slice(&n.to_ne_bytes());
        bytes[4..].copy_from_slice(&(!n).to_ne_bytes());
        bytes
    }

    fn pair(slot_count: usize) -> (TempDir, PathBuf, RingBufferChannel, RingBufferChannel) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let producer = RingBufferChannel::create(&path, 8, slot_count).unwrap();
        let consumer = RingBufferChannel::open(&path, 8, slot_count).unwrap();
        (dir, path, producer, consumer)
    }

    #[test]
    fn drain_returns_records_in_write_order() {
        let (_dir, _path, mut producer, mut consumer) = pair(16);

        for n in 0..15 {
            producer.write(&record(n)).unwrap();
        }
        assert_eq!(consumer.pending(), 15);

        let drained = consumer.drain();
        let expected: Vec<Vec<u8>> = (0..15).map(record).collect();
        assert_eq!(drained, expected);
        assert!(consumer.drain().is_empty());
    }

    #[test]
    fn order_survives_wraparound() {
        let (_dir, _path, mut producer, mut consumer) = pair(8);

        for n in 0..5 {
            producer.write(&record(n)).unwrap();
        }
        assert_eq!(consumer.drain().len(), 5);

        // indices wrap past the end of the ring here
        for n in 5..12 {
            producer.write(&record(n)).unwrap();
        }
        let expected: Vec<Vec<u8>> = (5..12).map(record).collect();
        assert_eq!(consumer.drain(), expected);
    }

    #[test]
    fn overrun_loses_overwritten_records() {
        let (_dir, _path, mut producer, mut consumer) = pair(SLOT_COUNT);

        for n in 0..260 {
            producer.write(&record(n)).unwrap();
        }

        // The producer lapped the reader: only the slots past the
        // consumer's cursor are visible, and those hold the newest writes.
        let drained = consumer.drain();
        let expected: Vec<Vec<u8>> = (256..260).map(record).collect();
        assert_eq!(drained, expected);
        assert!(!drained.contains(&record(0)));
    }

    #[test]
    fn read_index_persists_across_reopen() {
        let (_dir, path, mut producer, mut consumer) = pair(8);

        for n in 0..3 {
            producer.write(&record(n)).unwrap();
        }
        assert_eq!(consumer.drain().len(), 3);
        consumer.close().unwrap();

        producer.write(&record(3)).unwrap();
        let mut reopened = RingBufferChannel::open(&path, 8, 8).unwrap();
        assert_eq!(reopened.drain(), vec![record(3)]);
    }

    #[test]
    fn wrong_record_size_is_rejected() {
        let (_dir, _path, mut producer, _consumer) = pair(8);
        let err = producer.write(&[0u8; 3]).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::RecordSize {
                expected: 8,
                actual: 3
            }
        ));
    }

    #[test]
    fn opening_without_producer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = RingBufferChannel::open(&dir.path().join("nope"), 16, SLOT_COUNT).unwrap_err();
        assert!(matches!(err, ChannelError::NotFound(_)));
    }
}
