//! `qserv-layout` — prints chunk bounds (and, with `--chunk2worker`, a
//! round-robin worker assignment) for a given partitioning scheme. A
//! read-only diagnostic: it never writes to `--out.dir`.

use clap::Parser;
use qserv_core::config::SharedFlags;
use qserv_part::Chunker;

use qserv_layout::error::{LayoutError, Result};
use qserv_layout::{rows_for_chunks, ChunkLayoutRow};

#[derive(Debug, Parser)]
#[command(name = "qserv-layout", about = "Enumerate chunk bounds and worker assignment")]
struct Cli {
    #[command(flatten)]
    shared: SharedFlags,

    #[arg(long = "part.num-stripes", default_value_t = 18)]
    num_stripes: i32,

    #[arg(long = "part.num-sub-stripes", default_value_t = 3)]
    num_sub_stripes: i32,

    #[arg(long = "part.overlap", default_value_t = 0.01667)]
    overlap: f64,

    /// Number of workers to round-robin chunks over. Omit to print bounds
    /// only.
    #[arg(long = "chunk2worker")]
    chunk2worker: Option<u32>,

    /// Explicit chunk ids to print. Overrides `--min-chunk`/`--max-chunk`.
    #[arg(long = "chunk")]
    chunk: Vec<u32>,

    #[arg(long = "min-chunk", default_value_t = 0)]
    min_chunk: u32,

    #[arg(long = "max-chunk")]
    max_chunk: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    qserv_core::logging::init(cli.shared.verbose).map_err(|e| LayoutError::InvalidConfig(e.to_string()))?;
    cli.shared.validate().map_err(|e| LayoutError::InvalidConfig(e.to_string()))?;

    let chunker = Chunker::new(cli.overlap, cli.num_stripes, cli.num_sub_stripes)?;

    let rows = if cli.chunk.is_empty() {
        let max_chunk = cli.max_chunk.unwrap_or_else(|| chunker.num_chunks().saturating_sub(1));
        qserv_layout::enumerate(&chunker, cli.min_chunk, max_chunk, cli.chunk2worker)?
    } else {
        rows_for_chunks(&chunker, &cli.chunk, cli.chunk2worker)?
    };

    tracing::info!(num_chunks = chunker.num_chunks(), rows = rows.len(), "enumerated chunk layout");
    for row in &rows {
        print_row(row);
    }
    Ok(())
}

fn print_row(row: &ChunkLayoutRow) {
    match row.worker {
        Some(worker) => println!(
            "chunk={} lon=[{:.6},{:.6}] lat=[{:.6},{:.6}] worker={}",
            row.chunk_id,
            row.bounds.get_lon_min(),
            row.bounds.get_lon_max(),
            row.bounds.get_lat_min(),
            row.bounds.get_lat_max(),
            worker,
        ),
        None => println!(
            "chunk={} lon=[{:.6},{:.6}] lat=[{:.6},{:.6}]",
            row.chunk_id,
            row.bounds.get_lon_min(),
            row.bounds.get_lon_max(),
            row.bounds.get_lat_min(),
            row.bounds.get_lat_max(),
        ),
    }
}
