//! Deterministic round-robin partitioning of a record stream into shards

use std::path::{Path, PathBuf};

use crate::error::SinkError;
use crate::framing::Compression;
use crate::record::Encode;
use crate::sink::RecordSink;

/// Shard receiving the record at `index` (0-based)
pub const fn shard_for(index: usize, num_shards: usize) -> usize {
    index % num_shards
}

/// Output path of shard `idx`: `<dir>/<prefix>-<idx>.tfrecord[.gz]`
pub fn shard_path(dir: &Path, prefix: &str, idx: usize, compression: Compression) -> PathBuf {
    dir.join(format!("{prefix}-{idx}.tfrecord{}", compression.suffix()))
}

/// N sinks fed by record index modulo N
pub struct ShardWriter {
    sinks: Vec<RecordSink>,
    next_index: usize,
}

impl ShardWriter {
    pub fn create(
        dir: &Path,
        prefix: &str,
        num_shards: usize,
        compression: Compression,
    ) -> Result<Self, SinkError> {
        if num_shards == 0 {
            return Err(SinkError::InvalidShardCount);
        }
        let sinks = (0..num_shards)
            .map(|i| RecordSink::with_compression(shard_path(dir, prefix, i, compression), compression))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sinks,
            next_index: 0,
        })
    }

    /// Route the next record to its shard
    pub fn write<R: Encode + ?Sized>(&mut self, record: &R) -> Result<(), SinkError> {
        let shard = shard_for(self.next_index, self.sinks.len());
        self.sinks[shard].write(record)?;
        self.next_index += 1;
        Ok(())
    }

    pub fn num_shards(&self) -> usize {
        self.sinks.len()
    }

    /// Finalize every shard; returns records per shard
    pub fn finalize(self) -> Result<Vec<usize>, SinkError> {
        let mut counts = Vec::with_capacity(self.sinks.len());
        for sink in self.sinks {
            let path = sink.path().to_path_buf();
            let n = sink.finalize()?;
            log::info!("Finished writing shard to {} ({n} records)", path.display());
            counts.push(n);
        }
        Ok(counts)
    }
}

/// Partition `records` into `num_shards` files under `dir`
pub fn split_records<I>(
    records: I,
    dir: &Path,
    prefix: &str,
    num_shards: usize,
    compression: Compression,
) -> Result<Vec<usize>, SinkError>
where
    I: IntoIterator,
    I::Item: Encode,
{
    let mut writer = ShardWriter::create(dir, prefix, num_shards, compression)?;
    for record in records {
        writer.write(&record)?;
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::FileRecords;
    use tempfile::TempDir;

    fn read_strings(path: &Path) -> Vec<String> {
        FileRecords::open(path, true)
            .unwrap()
            .map(|r| String::from_utf8(r.unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn shard_for_is_modulo() {
        assert_eq!(shard_for(0, 3), 0);
        assert_eq!(shard_for(4, 3), 1);
        assert_eq!(shard_for(5, 1), 0);
    }

    #[test]
    fn shard_path_naming() {
        let p = shard_path(Path::new("/out"), "dataset", 3, Compression::None);
        assert_eq!(p, PathBuf::from("/out/dataset-3.tfrecord"));
        let p = shard_path(Path::new("/out"), "dataset", 0, Compression::Gzip);
        assert_eq!(p, PathBuf::from("/out/dataset-0.tfrecord.gz"));
    }

    #[test]
    fn round_robin_partition() {
        let dir = TempDir::new().unwrap();
        let records: Vec<String> = (0..7).map(|i| format!("r{i}")).collect();
        let counts =
            split_records(&records, dir.path(), "dataset", 3, Compression::None).unwrap();
        assert_eq!(counts, vec![3, 2, 2]);
        assert_eq!(
            read_strings(&dir.path().join("dataset-0.tfrecord")),
            vec!["r0", "r3", "r6"]
        );
        assert_eq!(
            read_strings(&dir.path().join("dataset-1.tfrecord")),
            vec!["r1", "r4"]
        );
        assert_eq!(
            read_strings(&dir.path().join("dataset-2.tfrecord")),
            vec!["r2", "r5"]
        );
    }

    #[test]
    fn more_shards_than_records_leaves_empty_files() {
        let dir = TempDir::new().unwrap();
        let counts = split_records(["only"], dir.path(), "s", 3, Compression::None).unwrap();
        assert_eq!(counts, vec![1, 0, 0]);
        assert!(dir.path().join("s-2.tfrecord").exists());
    }

    #[test]
    fn rerun_is_byte_identical() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let records: Vec<String> = (0..50).map(|i| format!("block {i}")).collect();
        split_records(&records, a.path(), "d", 4, Compression::None).unwrap();
        split_records(&records, b.path(), "d", 4, Compression::None).unwrap();
        for i in 0..4 {
            let name = format!("d-{i}.tfrecord");
            assert_eq!(
                std::fs::read(a.path().join(&name)).unwrap(),
                std::fs::read(b.path().join(&name)).unwrap()
            );
        }
    }

    #[test]
    fn zero_shards_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ShardWriter::create(dir.path(), "d", 0, Compression::None),
            Err(SinkError::InvalidShardCount)
        ));
    }
}
