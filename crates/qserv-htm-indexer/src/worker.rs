//! `HtmIndexerWorker`: extracts an id and a (lon, lat) position from each
//! CSV row, computes the row's HTM id at a configured level, and partitions
//! rows into per-triangle files sharded across node directories.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use qserv_geom::cartesian;
use qserv_mr::Worker;
use qserv_part::csv::{self, CsvConfig};
use qserv_part::record::hash_u32;
use qserv_part::{HtmIndex, HtmKey, Record};

use crate::error::{IndexerError, Result};

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub id_field: usize,
    pub lon_field: usize,
    pub lat_field: usize,
    pub level: i32,
    pub out_dir: PathBuf,
    pub num_nodes: u32,
    pub csv: CsvConfig,
    /// `mr.block-size`, in bytes. Sizes the `_records`/`_ids` output
    /// buffers each reduce call writes through, so their memory footprint
    /// tracks the same knob the map-reduce engine's input split uses
    /// (spec §4.4/§4.5, §5's bounded-memory model).
    pub block_size_bytes: usize,
}

impl IndexerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0..=13).contains(&self.level) {
            return Err(IndexerError::InvalidConfig(format!(
                "htm level {} out of range [0, 13]",
                self.level
            )));
        }
        if !(1..=99_999).contains(&self.num_nodes) {
            return Err(IndexerError::InvalidConfig(format!(
                "out.num-nodes {} out of range [1, 99999]",
                self.num_nodes
            )));
        }
        Ok(())
    }
}

/// One thread's indexer state: its configuration (shared, read-only) and
/// the local HTM count index it accumulates while reducing.
pub struct HtmIndexerWorker {
    config: IndexerConfig,
    index: HtmIndex,
}

impl HtmIndexerWorker {
    pub fn new(config: IndexerConfig) -> Self {
        let level = config.level;
        HtmIndexerWorker {
            config,
            index: HtmIndex::new(level),
        }
    }

    fn map_row(&self, line: &[u8]) -> Result<Record<HtmKey>> {
        let row = csv::read_record(line, &self.config.csv)?;
        let id = row.get_i64(self.config.id_field)?;
        let lon = row.get_f64(self.config.lon_field)?;
        let lat = row.get_f64(self.config.lat_field)?;
        let htm_id = qserv_geom::htm_id(&cartesian(lon, lat), self.config.level)?;
        let mut out = Vec::with_capacity(line.len() + 1);
        row.write(&self.config.csv, &mut out);
        Ok(Record::new(HtmKey { id, htm_id }, out))
    }

    fn reduce_group(&mut self, htm_id: u32, records: &[Record<HtmKey>]) -> Result<()> {
        let node_dir = qserv_core::paths::node_dir(&self.config.out_dir, hash_u32(htm_id) as u64, self.config.num_nodes);
        std::fs::create_dir_all(&node_dir)?;
        let capacity = self.config.block_size_bytes.max(1);
        let mut txt = BufWriter::with_capacity(
            capacity,
            File::create(node_dir.join(qserv_core::paths::htm_records_file(htm_id)))?,
        );
        let mut ids = BufWriter::with_capacity(
            capacity,
            File::create(node_dir.join(qserv_core::paths::htm_ids_file(htm_id)))?,
        );
        for record in records {
            txt.write_all(&record.data)?;
            ids.write_all(&(record.key.id as u64).to_be_bytes())?;
        }
        txt.flush()?;
        ids.flush()?;
        self.index.add(htm_id, records.len() as u64);
        Ok(())
    }
}

impl Worker<HtmKey> for HtmIndexerWorker {
    type Output = HtmIndex;

    fn map(&mut self, line: &[u8], emit: &mut dyn FnMut(Record<HtmKey>)) -> qserv_mr::Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        let record = self.map_row(line)?;
        emit(record);
        Ok(())
    }

    fn reduce(&mut self, key: &HtmKey, records: &[Record<HtmKey>]) -> qserv_mr::Result<()> {
        self.reduce_group(key.htm_id, records)?;
        Ok(())
    }

    fn finish(self) -> qserv_mr::Result<HtmIndex> {
        Ok(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> IndexerConfig {
        IndexerConfig {
            id_field: 0,
            lon_field: 1,
            lat_field: 2,
            level: 4,
            out_dir: dir.to_path_buf(),
            num_nodes: 3,
            csv: CsvConfig::default(),
            block_size_bytes: 16 * 1024 * 1024,
        }
    }

    #[test]
    fn rejects_htm_level_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.level = 14;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.num_nodes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn map_row_computes_an_htm_id_from_the_position_fields() {
        let dir = tempfile::tempdir().unwrap();
        let worker = HtmIndexerWorker::new(config(dir.path()));
        let record = worker.map_row(b"42,10.0,20.0").unwrap();
        assert_eq!(record.key.id, 42);
        assert_eq!(qserv_geom::htm_level(record.key.htm_id), 4);
    }

    #[test]
    fn reduce_writes_triangle_files_and_counts_them() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = HtmIndexerWorker::new(config(dir.path()));
        let rows = [
            worker.map_row(b"1,10.0,20.0").unwrap(),
            worker.map_row(b"2,10.0,20.0").unwrap(),
        ];
        let htm_id = rows[0].key.htm_id;
        worker.reduce_group(htm_id, &rows).unwrap();
        let index = worker.finish().unwrap();
        assert_eq!(index.get(htm_id), 2);

        let node_dir = qserv_core::paths::node_dir(dir.path(), hash_u32(htm_id) as u64, 3);
        let ids = std::fs::read(node_dir.join(qserv_core::paths::htm_ids_file(htm_id))).unwrap();
        assert_eq!(ids.len(), 16);
        assert_eq!(u64::from_be_bytes(ids[0..8].try_into().unwrap()), 1);
    }

    /// At the default `--out.num-nodes 1`, output must land flat in
    /// `out_dir` (no `node_00000` subdirectory) since
    /// `qserv_core::paths::node_dir` flattens single-node layouts and the
    /// duplicator reads triangle files straight from the index's parent
    /// directory with no node sharding of its own.
    #[test]
    fn single_node_output_is_flat_not_node_00000() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.num_nodes = 1;
        let mut worker = HtmIndexerWorker::new(cfg);
        let rows = [worker.map_row(b"1,10.0,20.0").unwrap()];
        let htm_id = rows[0].key.htm_id;
        worker.reduce_group(htm_id, &rows).unwrap();

        assert!(dir.path().join(qserv_core::paths::htm_records_file(htm_id)).exists());
        assert!(dir.path().join(qserv_core::paths::htm_ids_file(htm_id)).exists());
        assert!(!dir.path().join("node_00000").exists());
    }
}
