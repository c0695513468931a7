//! The on-disk format the shuffle phase spills and merges: a flat sequence
//! of [`Record`] encodings, written in key order within any one file.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use qserv_part::{Record, RecordKey};

use crate::error::Result;

/// Appends records to a run file, flat-encoding each one as it arrives.
/// Buckets spill through this when they outgrow their in-memory budget; the
/// shuffle's merge pass also writes its merged output through one.
pub struct BufferedAppender {
    writer: BufWriter<File>,
    buf: Vec<u8>,
}

impl BufferedAppender {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(BufferedAppender {
            writer: BufWriter::new(File::create(path)?),
            buf: Vec::new(),
        })
    }

    /// Like [`Self::create`], but with an explicit writer buffer capacity
    /// (bytes) instead of `BufWriter`'s default. Callers size this from
    /// `mr.block-size` so the appender's memory footprint tracks the same
    /// knob the input-block split does, per spec §4.4/§5's bounded-memory
    /// model.
    pub fn create_with_capacity(path: &Path, capacity: usize) -> Result<Self> {
        Ok(BufferedAppender {
            writer: BufWriter::with_capacity(capacity.max(1), File::create(path)?),
            buf: Vec::new(),
        })
    }

    pub fn append<K: RecordKey>(&mut self, record: &Record<K>) -> Result<()> {
        self.buf.clear();
        record.encode(&mut self.buf);
        self.writer.write_all(&self.buf)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Streams the records of one run file back out in the order they were
/// written.
pub struct RunFileReader<K> {
    reader: BufReader<File>,
    _marker: std::marker::PhantomData<K>,
}

impl<K: RecordKey> RunFileReader<K> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(RunFileReader {
            reader: BufReader::new(File::open(path)?),
            _marker: std::marker::PhantomData,
        })
    }

    fn read_record(&mut self) -> Result<Option<Record<K>>> {
        let mut header = [0u8; 4];
        match read_exact_or_eof(&mut self.reader, &mut header)? {
            0 => return Ok(None),
            4 => {}
            n => {
                return Err(crate::error::MrError::CorruptRunFile(format!(
                    "key-length header truncated at {n} of 4 bytes"
                )))
            }
        }
        let key_len = u32::from_le_bytes(header) as usize;
        let mut key_buf = vec![0u8; key_len];
        self.reader.read_exact(&mut key_buf)?;
        let key = K::decode(&key_buf);

        let mut overlap_byte = [0u8; 1];
        self.reader.read_exact(&mut overlap_byte)?;
        let overlap = overlap_byte[0] != 0;

        let mut data_len_buf = [0u8; 4];
        self.reader.read_exact(&mut data_len_buf)?;
        let data_len = u32::from_le_bytes(data_len_buf) as usize;
        let mut data = vec![0u8; data_len];
        self.reader.read_exact(&mut data)?;

        Ok(Some(Record { key, data, overlap }))
    }
}

impl<K: RecordKey> Iterator for RunFileReader<K> {
    type Item = Result<Record<K>>;

    fn next(&mut self) -> Option<Result<Record<K>>> {
        self.read_record().transpose()
    }
}

fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Merge already-sorted `inputs` into one sorted run file at `output`, via a
/// k-way merge over a min-heap keyed on the next record of each input. The
/// merged output's write buffer defaults to `BufWriter`'s own capacity; use
/// [`merge_runs_with_capacity`] to size it from `mr.block-size` instead.
pub fn merge_runs<K: RecordKey>(inputs: &[std::path::PathBuf], output: &Path) -> Result<()> {
    merge_runs_impl::<K>(inputs, BufferedAppender::create(output)?)
}

/// Like [`merge_runs`], but with an explicit output buffer capacity in
/// bytes (`mr.block-size`), matching the size the input-block split uses.
pub fn merge_runs_with_capacity<K: RecordKey>(
    inputs: &[std::path::PathBuf],
    output: &Path,
    capacity: usize,
) -> Result<()> {
    merge_runs_impl::<K>(inputs, BufferedAppender::create_with_capacity(output, capacity)?)
}

fn merge_runs_impl<K: RecordKey>(inputs: &[std::path::PathBuf], mut out: BufferedAppender) -> Result<()> {
    let mut readers: Vec<RunFileReader<K>> = inputs
        .iter()
        .map(|p| RunFileReader::open(p))
        .collect::<Result<_>>()?;

    let mut fronts: Vec<Option<Record<K>>> = Vec::with_capacity(readers.len());
    let mut heap: BinaryHeap<Reverse<(K, usize)>> = BinaryHeap::new();
    for (i, r) in readers.iter_mut().enumerate() {
        let front = r.next().transpose()?;
        if let Some(rec) = &front {
            heap.push(Reverse((rec.key.clone(), i)));
        }
        fronts.push(front);
    }

    while let Some(Reverse((_, i))) = heap.pop() {
        let record = fronts[i].take().expect("heap entry without a pending record");
        out.append(&record)?;
        if let Some(next) = readers[i].next().transpose()? {
            heap.push(Reverse((next.key.clone(), i)));
            fronts[i] = Some(next);
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qserv_part::HtmKey;

    fn key(htm_id: u32, id: i64) -> HtmKey {
        HtmKey { id, htm_id }
    }

    #[test]
    fn appender_and_reader_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.bin");
        let mut w = BufferedAppender::create(&path).unwrap();
        w.append(&Record::new(key(1, 10), b"a".to_vec())).unwrap();
        w.append(&Record::new(key(2, 20), b"bb".to_vec())).unwrap();
        w.flush().unwrap();

        let read: Vec<_> = RunFileReader::<HtmKey>::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].key, key(1, 10));
        assert_eq!(read[1].data, b"bb");
    }

    #[test]
    fn merge_runs_interleaves_by_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let mut wa = BufferedAppender::create(&a).unwrap();
        wa.append(&Record::new(key(1, 1), b"x".to_vec())).unwrap();
        wa.append(&Record::new(key(3, 1), b"x".to_vec())).unwrap();
        wa.flush().unwrap();
        let mut wb = BufferedAppender::create(&b).unwrap();
        wb.append(&Record::new(key(2, 1), b"y".to_vec())).unwrap();
        wb.append(&Record::new(key(4, 1), b"y".to_vec())).unwrap();
        wb.flush().unwrap();

        let out = dir.path().join("merged.bin");
        merge_runs::<HtmKey>(&[a, b], &out).unwrap();
        let merged: Vec<_> = RunFileReader::<HtmKey>::open(&out)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let htm_ids: Vec<u32> = merged.iter().map(|r| r.key.htm_id).collect();
        assert_eq!(htm_ids, vec![1, 2, 3, 4]);
    }
}
