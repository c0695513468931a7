//! Splits an input file into roughly-equal, line-aligned byte ranges so a
//! thread pool can map over them without two threads ever seeing the same
//! line (or half a line).

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A `[start, end)` byte range of `path`, aligned so that `start` is either
/// `0` or the byte right after a `'\n'`.
#[derive(Debug, Clone)]
pub struct InputBlock {
    pub path: PathBuf,
    pub start: u64,
    pub end: u64,
}

impl InputBlock {
    /// Iterate the complete lines starting in this block. A line that
    /// straddles `end` is read in full by whichever block it starts in, so
    /// the iterator may read slightly past `end` before stopping.
    pub fn lines(&self) -> Result<InputLines> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.start))?;
        Ok(InputLines {
            reader: BufReader::new(file),
            pos: self.start,
            end: self.end,
            done: self.start >= self.end,
        })
    }
}

/// Iterator over the `'\n'`-delimited lines (terminator stripped) of one
/// [`InputBlock`].
pub struct InputLines {
    reader: BufReader<File>,
    pos: u64,
    end: u64,
    done: bool,
}

impl Iterator for InputLines {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Result<Vec<u8>>> {
        if self.done {
            return None;
        }
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                self.pos += n as u64;
                if self.pos >= self.end {
                    self.done = true;
                }
                if line.last() == Some(&b'\n') {
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                }
                Some(Ok(line))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

/// Divide `path` into line-aligned ranges of approximately `target_size`
/// bytes each (the `mr.block-size` MiB flag, spec §4.4 step 1 and §6.5),
/// so a file's worth of work is split into a number of blocks determined
/// by its size rather than by worker count; a pool of `mr.num-workers`
/// threads then steals blocks off the resulting queue in arrival order.
/// Seeks forward from each candidate boundary to the next newline so no
/// block starts mid-line; the last block absorbs whatever remains.
pub fn split_into_blocks(path: &Path, target_size: u64) -> Result<Vec<InputBlock>> {
    let target = target_size.max(1);
    let size = std::fs::metadata(path)?.len();
    if size == 0 {
        return Ok(Vec::new());
    }

    let mut file = File::open(path)?;
    let mut bounds = vec![0u64];
    let mut candidate = target;
    while candidate < size {
        let aligned = align_to_next_newline(&mut file, candidate, size)?;
        if aligned > *bounds.last().unwrap() && aligned < size {
            bounds.push(aligned);
        }
        candidate = aligned.max(candidate + 1) + target;
    }
    bounds.push(size);
    bounds.dedup();

    Ok(bounds
        .windows(2)
        .map(|w| InputBlock {
            path: path.to_path_buf(),
            start: w[0],
            end: w[1],
        })
        .collect())
}

/// Read forward from `offset` until the byte right after the next `'\n'`,
/// or `limit` if no newline is found first.
fn align_to_next_newline(file: &mut File, offset: u64, limit: u64) -> Result<u64> {
    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(&mut *file);
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)? as u64;
    Ok((offset + n).min(limit))
}
