use crate::{LogBuffer, PushError, Written, WriteMode};

/// One member of a [`ShardGroup`](crate::ShardGroup): a leaf region plus the
/// write protocol its group was built with.
///
/// Shards in a group are independent - a sealed shard never blocks appends to
/// its peers.
#[derive(Debug)]
pub struct Shard {
    buffer: LogBuffer,
    mode: WriteMode,
}

impl Shard {
    /// Creates a shard of the given capacity and write mode.
    pub fn new(capacity: usize, mode: WriteMode) -> Self {
        Self {
            buffer: LogBuffer::new(capacity),
            mode,
        }
    }

    /// Appends a record via the shard's write protocol.
    #[inline]
    pub fn push(&self, record: &[u8]) -> Result<Written, PushError> {
        self.buffer.push_with(self.mode, record)
    }

    /// Returns the shard's write mode.
    #[inline]
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// The underlying region, for drain-side operations.
    #[inline]
    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.buffer.has_data()
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.buffer.is_sealed()
    }

    #[inline]
    pub fn seal(&self) {
        self.buffer.seal();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_dispatches_mode() {
        for mode in [WriteMode::Cas, WriteMode::Locked] {
            let shard = Shard::new(32, mode);
            shard.push(b"record").unwrap();
            assert_eq!(shard.mode(), mode);
            assert!(shard.has_data());
            assert_eq!(shard.len(), 7);
        }
    }

    #[test]
    fn test_sealed_shard_rejects() {
        let shard = Shard::new(8, WriteMode::Cas);
        shard.seal();
        assert_eq!(shard.push(b"x"), Err(PushError::Sealed));
    }
}
