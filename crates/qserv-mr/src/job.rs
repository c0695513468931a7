//! Ties [`crate::input`], [`crate::silo`] and [`crate::runfile`] together
//! into a full map / external-sort-shuffle / reduce job, run across a
//! thread pool draining a shared, mutex-guarded work queue.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use qserv_part::{Record, RecordKey};

use crate::error::{MrError, Result};
use crate::input::split_into_blocks;
use crate::runfile::{merge_runs_with_capacity, RunFileReader};
use crate::silo::Silo;
use crate::worker::Worker;

/// Tunables for one [`run`] call.
#[derive(Debug, Clone)]
pub struct MrConfig {
    pub num_map_workers: usize,
    pub num_reduce_workers: usize,
    pub num_buckets: usize,
    /// Records held per bucket before a [`Silo`] spills it to a run file.
    pub spill_threshold: usize,
    /// Target size, in bytes, of the line-aligned input blocks each input
    /// file is split into (`mr.block-size`, spec §4.4 step 1), and of the
    /// write buffer backing the shuffle's merged bucket output. Worker
    /// implementations size their own reduce-side output buffers (the
    /// indexer's per-triangle files, the duplicator's per-chunk files)
    /// from the same value, so the whole pipeline's steady-state memory
    /// tracks one knob instead of several independent defaults.
    pub block_size_bytes: usize,
    /// Scratch directory for intermediate run files. Removed in full once
    /// the job finishes, successfully or not.
    pub run_dir: PathBuf,
}

/// Default `mr.block-size`, in MiB (spec §6.5).
pub const DEFAULT_BLOCK_SIZE_MIB: usize = 16;

impl MrConfig {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        let parallelism = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        MrConfig {
            num_map_workers: parallelism,
            num_reduce_workers: parallelism,
            num_buckets: (parallelism * 4).max(1),
            spill_threshold: 100_000,
            block_size_bytes: DEFAULT_BLOCK_SIZE_MIB * 1024 * 1024,
            run_dir: run_dir.into(),
        }
    }
}

struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> WorkQueue<T> {
    fn new(items: Vec<T>) -> Self {
        WorkQueue {
            items: Mutex::new(items.into()),
        }
    }

    fn pop(&self) -> Option<T> {
        self.items.lock().unwrap().pop_front()
    }
}

/// Run a full map / shuffle / reduce job over `inputs`, constructing one
/// `W` per thread via `make_worker`. Every map thread owns its own `Silo`;
/// the shuffle externally merge-sorts each hash bucket's spilled run files
/// into one sorted run; each reduce thread streams the buckets it is
/// handed, grouping consecutive same-key records (the files are sorted, so
/// a group is always contiguous) before calling [`Worker::reduce`].
///
/// Returns one `W::Output` per reduce thread that did work; callers whose
/// `Output` is itself mergeable (an `HtmIndex`, a `ChunkIndex`, ...) fold
/// them with its own `merge`.
///
/// Any worker error or panic aborts the job: every other thread stops at
/// its next block or bucket boundary, the entire run directory is removed,
/// and the first error observed is returned.
pub fn run<K, W, F>(inputs: &[PathBuf], config: &MrConfig, make_worker: F) -> Result<Vec<W::Output>>
where
    K: RecordKey,
    W: Worker<K> + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    std::fs::create_dir_all(&config.run_dir)?;
    let make_worker = Arc::new(make_worker);
    let aborted = Arc::new(AtomicBool::new(false));
    let num_buckets = config.num_buckets.max(1);

    let mut blocks = Vec::new();
    for path in inputs {
        blocks.extend(split_into_blocks(path, config.block_size_bytes as u64)?);
    }
    let block_queue = Arc::new(WorkQueue::new(blocks));
    let map_runs: Arc<Mutex<Vec<Vec<PathBuf>>>> =
        Arc::new(Mutex::new((0..num_buckets).map(|_| Vec::new()).collect()));

    let mut handles = Vec::new();
    for thread_idx in 0..config.num_map_workers.max(1) {
        let block_queue = Arc::clone(&block_queue);
        let make_worker = Arc::clone(&make_worker);
        let aborted = Arc::clone(&aborted);
        let map_runs = Arc::clone(&map_runs);
        let run_dir = config.run_dir.clone();
        let spill_threshold = config.spill_threshold;
        handles.push(thread::spawn(move || -> Result<()> {
            let mut worker = make_worker();
            let mut silo: Silo<K> = Silo::new(&run_dir, format!("map{thread_idx}"), num_buckets, spill_threshold);
            while let Some(block) = block_queue.pop() {
                if aborted.load(Ordering::Relaxed) {
                    return Err(MrError::Cancelled);
                }
                for line in block.lines()? {
                    let line = line?;
                    let mut emitted = Vec::new();
                    worker.map(&line, &mut |r| emitted.push(r))?;
                    for record in emitted {
                        silo.add(record)?;
                    }
                }
            }
            let run_files = silo.finish()?;
            let mut guard = map_runs.lock().unwrap();
            for (bucket, files) in run_files.into_iter().enumerate() {
                guard[bucket].extend(files);
            }
            Ok(())
        }));
    }
    if let Err(e) = join_all(handles, &aborted) {
        cleanup(&config.run_dir);
        return Err(e);
    }

    let bucket_runs = Arc::try_unwrap(map_runs)
        .expect("all map threads joined, no other Arc clone outstanding")
        .into_inner()
        .unwrap();
    let mut merged = Vec::with_capacity(num_buckets);
    for (bucket, files) in bucket_runs.into_iter().enumerate() {
        if files.is_empty() {
            continue;
        }
        let out = config.run_dir.join(format!("merged-bucket{bucket:05}.bin"));
        if let Err(e) = merge_runs_with_capacity::<K>(&files, &out, config.block_size_bytes) {
            cleanup(&config.run_dir);
            return Err(e);
        }
        for f in &files {
            let _ = std::fs::remove_file(f);
        }
        merged.push(out);
    }

    let bucket_queue = Arc::new(WorkQueue::new(merged));
    let results: Arc<Mutex<Vec<W::Output>>> = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for _ in 0..config.num_reduce_workers.max(1) {
        let bucket_queue = Arc::clone(&bucket_queue);
        let make_worker = Arc::clone(&make_worker);
        let aborted = Arc::clone(&aborted);
        let results = Arc::clone(&results);
        handles.push(thread::spawn(move || -> Result<()> {
            let mut worker = make_worker();
            let mut ran = false;
            while let Some(path) = bucket_queue.pop() {
                if aborted.load(Ordering::Relaxed) {
                    return Err(MrError::Cancelled);
                }
                ran = true;
                reduce_one_bucket(&mut worker, &path)?;
            }
            if ran {
                results.lock().unwrap().push(worker.finish()?);
            }
            Ok(())
        }));
    }
    let reduce_outcome = join_all(handles, &aborted);
    cleanup(&config.run_dir);
    reduce_outcome?;

    Ok(Arc::try_unwrap(results)
        .expect("all reduce threads joined, no other Arc clone outstanding")
        .into_inner()
        .unwrap())
}

fn reduce_one_bucket<K, W>(worker: &mut W, path: &PathBuf) -> Result<()>
where
    K: RecordKey,
    W: Worker<K>,
{
    let mut group_key: Option<K> = None;
    let mut group: Vec<Record<K>> = Vec::new();
    for record in RunFileReader::<K>::open(path)? {
        let record = record?;
        match &group_key {
            Some(k) if k.same_group(&record.key) => group.push(record),
            _ => {
                if let Some(k) = group_key.replace(record.key.clone()) {
                    worker.reduce(&k, &group)?;
                }
                group = vec![record];
            }
        }
    }
    if let Some(k) = group_key {
        worker.reduce(&k, &group)?;
    }
    Ok(())
}

fn join_all(handles: Vec<thread::JoinHandle<Result<()>>>, aborted: &AtomicBool) -> Result<()> {
    let mut first_err = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                aborted.store(true, Ordering::Relaxed);
                first_err.get_or_insert(e);
            }
            Err(_) => {
                aborted.store(true, Ordering::Relaxed);
                first_err.get_or_insert(MrError::Worker("worker thread panicked".into()));
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn cleanup(run_dir: &std::path::Path) {
    let _ = std::fs::remove_dir_all(run_dir);
}

#[cfg(test)]
mod tests {
    use super::*;
    use qserv_part::HtmKey;
    use std::io::Write;

    struct CountingWorker {
        seen: Mutex<Vec<(u32, usize)>>,
    }

    impl CountingWorker {
        fn new() -> Self {
            CountingWorker {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Worker<HtmKey> for CountingWorker {
        type Output = usize;

        fn map(&mut self, line: &[u8], emit: &mut dyn FnMut(Record<HtmKey>)) -> Result<()> {
            let n: u32 = std::str::from_utf8(line).unwrap().trim().parse().unwrap();
            emit(Record::new(HtmKey { id: n as i64, htm_id: n % 4 }, line.to_vec()));
            Ok(())
        }

        fn reduce(&mut self, key: &HtmKey, records: &[Record<HtmKey>]) -> Result<()> {
            self.seen.lock().unwrap().push((key.htm_id, records.len()));
            Ok(())
        }

        fn finish(self) -> Result<usize> {
            Ok(self.seen.into_inner().unwrap().iter().map(|(_, n)| n).sum())
        }
    }

    #[test]
    fn map_shuffle_reduce_accounts_for_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.txt");
        let mut f = std::fs::File::create(&input_path).unwrap();
        for i in 0..200u32 {
            writeln!(f, "{i}").unwrap();
        }
        drop(f);

        let config = MrConfig {
            num_map_workers: 3,
            num_reduce_workers: 2,
            num_buckets: 4,
            spill_threshold: 7,
            block_size_bytes: 64,
            run_dir: dir.path().join("runs"),
        };
        let outputs = run::<HtmKey, _, _>(&[input_path], &config, CountingWorker::new).unwrap();
        let total: usize = outputs.into_iter().sum();
        assert_eq!(total, 200);
        assert!(!dir.path().join("runs").exists());
    }

    struct FailingWorker;

    impl Worker<HtmKey> for FailingWorker {
        type Output = ();

        fn map(&mut self, _line: &[u8], _emit: &mut dyn FnMut(Record<HtmKey>)) -> Result<()> {
            Err(MrError::Worker("boom".into()))
        }

        fn reduce(&mut self, _key: &HtmKey, _records: &[Record<HtmKey>]) -> Result<()> {
            Ok(())
        }

        fn finish(self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn a_failing_worker_aborts_the_job_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.txt");
        let mut f = std::fs::File::create(&input_path).unwrap();
        writeln!(f, "1").unwrap();
        drop(f);

        let config = MrConfig {
            num_map_workers: 1,
            num_reduce_workers: 1,
            num_buckets: 1,
            spill_threshold: 10,
            block_size_bytes: 4096,
            run_dir: dir.path().join("runs"),
        };
        let result = run::<HtmKey, _, _>(&[input_path], &config, || FailingWorker);
        assert!(result.is_err());
        assert!(!dir.path().join("runs").exists());
    }
}
