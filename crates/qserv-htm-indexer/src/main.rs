//! `qserv-htm-indexer` — partitions catalog CSV rows into per-HTM-triangle
//! files keyed by the triangle each row's position falls in.

use std::path::PathBuf;

use clap::Parser;
use qserv_core::config::SharedFlags;
use qserv_mr::MrConfig;
use qserv_part::csv::CsvConfig;

use qserv_htm_indexer::error::{IndexerError, Result};
use qserv_htm_indexer::worker::{HtmIndexerWorker, IndexerConfig};

#[derive(Debug, Parser)]
#[command(name = "qserv-htm-indexer", about = "Partition CSV rows by HTM triangle")]
struct Cli {
    #[command(flatten)]
    shared: SharedFlags,

    /// HTM subdivision level, in [0, 13].
    #[arg(long = "htm.level")]
    level: i32,

    /// Input CSV files to partition.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    qserv_core::logging::init(cli.shared.verbose).map_err(|e| IndexerError::InvalidConfig(e.to_string()))?;
    cli.shared
        .validate()
        .map_err(|e| IndexerError::InvalidConfig(e.to_string()))?;

    let fields = cli
        .shared
        .part_pos
        .as_deref()
        .ok_or_else(|| IndexerError::InvalidConfig("--part.pos is required".into()))?;
    let (lon_field, lat_field) = parse_pos_fields(fields)?;
    let id_field: usize = cli
        .shared
        .id_field
        .as_deref()
        .ok_or_else(|| IndexerError::InvalidConfig("--id is required".into()))?
        .parse()
        .map_err(|_| IndexerError::InvalidConfig("--id must be a field index".into()))?;

    let block_size_bytes = block_size_bytes(cli.shared.mr_block_size);
    let config = IndexerConfig {
        id_field,
        lon_field,
        lat_field,
        level: cli.level,
        out_dir: cli.shared.out_dir.clone(),
        num_nodes: cli.shared.out_num_nodes,
        csv: CsvConfig::default(),
        block_size_bytes,
    };
    config.validate()?;

    std::fs::create_dir_all(&config.out_dir)?;
    let mr_config = MrConfig {
        num_map_workers: auto_parallelism(cli.shared.mr_num_workers),
        num_reduce_workers: auto_parallelism(cli.shared.mr_num_workers),
        num_buckets: auto_parallelism(cli.shared.mr_num_workers) * 4,
        spill_threshold: 100_000,
        block_size_bytes,
        run_dir: config.out_dir.join(".qserv-htm-indexer-runs"),
    };

    let outputs = qserv_mr::run(&cli.inputs, &mr_config, move || HtmIndexerWorker::new(config.clone()))
        .map_err(|e| IndexerError::InvalidConfig(e.to_string()))?;

    let level = cli.level;
    let mut merged = qserv_part::HtmIndex::new(level);
    for index in outputs {
        merged.merge(&index);
    }
    let index_path = cli.shared.out_dir.join(qserv_core::paths::HTM_INDEX_FILE);
    let file = std::fs::File::create(&index_path)?;
    merged.write(std::io::BufWriter::new(file))?;

    tracing::info!(triangles = merged.len(), path = %index_path.display(), "wrote htm index");
    Ok(())
}

fn parse_pos_fields(spec: &str) -> Result<(usize, usize)> {
    let mut parts = spec.split(',');
    let lon = parts
        .next()
        .ok_or_else(|| IndexerError::InvalidConfig("--part.pos must be \"lonField,latField\"".into()))?;
    let lat = parts
        .next()
        .ok_or_else(|| IndexerError::InvalidConfig("--part.pos must be \"lonField,latField\"".into()))?;
    let lon: usize = lon
        .trim()
        .parse()
        .map_err(|_| IndexerError::InvalidConfig("part.pos lon field must be a field index".into()))?;
    let lat: usize = lat
        .trim()
        .parse()
        .map_err(|_| IndexerError::InvalidConfig("part.pos lat field must be a field index".into()))?;
    Ok((lon, lat))
}

fn auto_parallelism(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
}

/// `--mr.block-size` is given in MiB; convert to bytes, flooring at 1 MiB
/// so a misconfigured `0` doesn't collapse the input split into one block
/// per line.
fn block_size_bytes(mr_block_size_mib: usize) -> usize {
    mr_block_size_mib.max(1) * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_pos_fields() {
        assert_eq!(parse_pos_fields("1,2").unwrap(), (1, 2));
    }

    #[test]
    fn rejects_malformed_pos_fields() {
        assert!(parse_pos_fields("1").is_err());
        assert!(parse_pos_fields("a,b").is_err());
    }

    #[test]
    fn block_size_converts_mib_to_bytes() {
        assert_eq!(block_size_bytes(16), 16 * 1024 * 1024);
    }

    #[test]
    fn block_size_floors_zero_at_one_mib() {
        assert_eq!(block_size_bytes(0), 1024 * 1024);
    }
}
