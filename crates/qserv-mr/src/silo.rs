//! A `Silo` is one map-worker thread's hashed holding area: records are
//! bucketed by key hash in memory and spilled, sorted, to a run file once a
//! bucket grows past its budget. After the map phase each bucket's run
//! files are handed to the shuffle's external merge.

use std::path::{Path, PathBuf};

use qserv_part::{Record, RecordKey};

use crate::error::Result;
use crate::runfile::BufferedAppender;

pub struct Silo<K: RecordKey> {
    dir: PathBuf,
    tag: String,
    num_buckets: usize,
    spill_threshold: usize,
    buckets: Vec<Vec<Record<K>>>,
    run_files: Vec<Vec<PathBuf>>,
    spill_seq: usize,
}

impl<K: RecordKey> Silo<K> {
    pub fn new(dir: &Path, tag: impl Into<String>, num_buckets: usize, spill_threshold: usize) -> Self {
        let num_buckets = num_buckets.max(1);
        Silo {
            dir: dir.to_path_buf(),
            tag: tag.into(),
            num_buckets,
            spill_threshold: spill_threshold.max(1),
            buckets: (0..num_buckets).map(|_| Vec::new()).collect(),
            run_files: (0..num_buckets).map(|_| Vec::new()).collect(),
            spill_seq: 0,
        }
    }

    pub fn add(&mut self, record: Record<K>) -> Result<()> {
        let bucket = record.bucket(self.num_buckets);
        self.buckets[bucket].push(record);
        if self.buckets[bucket].len() >= self.spill_threshold {
            self.spill(bucket)?;
        }
        Ok(())
    }

    fn spill(&mut self, bucket: usize) -> Result<()> {
        if self.buckets[bucket].is_empty() {
            return Ok(());
        }
        self.buckets[bucket].sort_by(|a, b| a.key.cmp(&b.key));
        let path = self.dir.join(format!(
            "{}-bucket{:05}-run{:05}.bin",
            self.tag, bucket, self.spill_seq
        ));
        self.spill_seq += 1;
        let mut writer = BufferedAppender::create(&path)?;
        for record in &self.buckets[bucket] {
            writer.append(record)?;
        }
        writer.flush()?;
        self.run_files[bucket].push(path);
        self.buckets[bucket].clear();
        Ok(())
    }

    /// Spill every remaining bucket and hand back the run files produced,
    /// indexed by bucket number.
    pub fn finish(mut self) -> Result<Vec<Vec<PathBuf>>> {
        for bucket in 0..self.num_buckets {
            self.spill(bucket)?;
        }
        Ok(self.run_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runfile::RunFileReader;
    use qserv_part::HtmKey;

    fn key(htm_id: u32) -> HtmKey {
        HtmKey { id: 0, htm_id }
    }

    #[test]
    fn spills_a_bucket_once_it_crosses_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut silo: Silo<HtmKey> = Silo::new(dir.path(), "t", 4, 2);
        for i in 0..5u32 {
            silo.add(Record::new(key(i * 4), vec![i as u8])).unwrap();
        }
        let run_files = silo.finish().unwrap();
        let total: usize = run_files
            .iter()
            .flatten()
            .map(|p| RunFileReader::<HtmKey>::open(p).unwrap().count())
            .sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn records_land_in_the_bucket_their_key_hashes_to() {
        let dir = tempfile::tempdir().unwrap();
        let mut silo: Silo<HtmKey> = Silo::new(dir.path(), "t", 8, 1000);
        let r = Record::new(key(123), vec![1]);
        let expected_bucket = r.bucket(8);
        silo.add(r).unwrap();
        let run_files = silo.finish().unwrap();
        assert!(!run_files[expected_bucket].is_empty());
        for (i, files) in run_files.iter().enumerate() {
            if i != expected_bucket {
                assert!(files.is_empty());
            }
        }
    }

    #[test]
    fn bucket_run_files_are_sorted_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut silo: Silo<HtmKey> = Silo::new(dir.path(), "t", 1, 2);
        silo.add(Record::new(key(5), vec![])).unwrap();
        silo.add(Record::new(key(1), vec![])).unwrap();
        let run_files = silo.finish().unwrap();
        let ids: Vec<u32> = RunFileReader::<HtmKey>::open(&run_files[0][0])
            .unwrap()
            .map(|r| r.unwrap().key.htm_id)
            .collect();
        assert_eq!(ids, vec![1, 5]);
    }
}
