//! `qserv-duplicator` — copies rows from non-empty HTM triangles into empty
//! ones so the chunks produced by a partitioning run are fully populated.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use qserv_core::config::SharedFlags;
use qserv_geom::SphericalBox;
use qserv_mr::MrConfig;
use qserv_part::csv::CsvConfig;
use qserv_part::{ChunkIndex, Chunker, HtmIndex};

use qserv_duplicator::context::DuplicatorContext;
use qserv_duplicator::error::{DuplicatorError, Result};
use qserv_duplicator::worker::{DuplicatorConfig, DuplicatorWorker};

#[derive(Debug, Parser)]
#[command(name = "qserv-duplicator", about = "Duplicate rows into empty HTM triangles and chunks")]
struct Cli {
    #[command(flatten)]
    shared: SharedFlags,

    /// Data-set binary HTM index (`htm_index.bin`). Falls back to
    /// `--part.index` if omitted.
    #[arg(long = "index")]
    index: Option<PathBuf>,

    /// Partitioning-position binary HTM index. Falls back to `--index`.
    #[arg(long = "part.index")]
    part_index: Option<PathBuf>,

    /// Partitioning id field index, remapped per the data-set index.
    #[arg(long = "part.id")]
    part_id_field: Option<usize>,

    /// Secondary `lonField,latField` pairs transformed alongside `--part.pos`.
    #[arg(long = "pos")]
    pos: Vec<String>,

    #[arg(long = "part.chunk", default_value_t = 3)]
    chunk_id_field: usize,

    #[arg(long = "part.sub-chunk", default_value_t = 4)]
    sub_chunk_id_field: usize,

    #[arg(long = "sample.seed", default_value_t = 0)]
    sample_seed: u64,

    #[arg(long = "sample.fraction", default_value_t = 1.0)]
    sample_fraction: f64,

    #[arg(long = "lon-min", default_value_t = 0.0)]
    lon_min: f64,

    #[arg(long = "lon-max", default_value_t = 360.0)]
    lon_max: f64,

    #[arg(long = "lat-min", default_value_t = -90.0)]
    lat_min: f64,

    #[arg(long = "lat-max", default_value_t = 90.0)]
    lat_max: f64,

    /// Explicit chunk ids to duplicate. Overrides the lon/lat region filter.
    #[arg(long = "chunk-id")]
    chunk_ids: Vec<u32>,

    /// Restrict to chunks hashing to this output node.
    #[arg(long = "out.node")]
    out_node: Option<u32>,

    #[arg(long = "part.num-stripes", default_value_t = 18)]
    num_stripes: i32,

    #[arg(long = "part.num-sub-stripes", default_value_t = 3)]
    num_sub_stripes: i32,

    #[arg(long = "part.overlap", default_value_t = 0.01667)]
    overlap: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    qserv_core::logging::init(cli.shared.verbose).map_err(|e| DuplicatorError::InvalidConfig(e.to_string()))?;
    cli.shared
        .validate()
        .map_err(|e| DuplicatorError::InvalidConfig(e.to_string()))?;

    let index_path = cli
        .index
        .clone()
        .or_else(|| cli.part_index.clone())
        .ok_or_else(|| DuplicatorError::InvalidConfig("one of --index or --part.index is required".into()))?;
    let part_index_path = cli.part_index.clone().unwrap_or_else(|| index_path.clone());

    let data_index = HtmIndex::read_inferring_level(BufReader::new(File::open(&index_path)?))?;
    let part_index = if part_index_path == index_path {
        data_index.clone()
    } else {
        HtmIndex::read_inferring_level(BufReader::new(File::open(&part_index_path)?))?
    };
    let data_index_dir = index_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let part_index_dir = part_index_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    let chunker = Chunker::new(cli.overlap, cli.num_stripes, cli.num_sub_stripes)?;

    let chunk_ids = if !cli.chunk_ids.is_empty() {
        cli.chunk_ids.clone()
    } else {
        let region = SphericalBox::new(cli.lon_min, cli.lon_max, cli.lat_min, cli.lat_max)?;
        let mut ids = chunker.chunks_in_box(&region, false)?;
        if let Some(node) = cli.out_node {
            ids.retain(|&id| (qserv_part::record::hash_u32(id) % cli.shared.out_num_nodes as u64) as u32 == node);
        }
        ids
    };

    let mut ctx = DuplicatorContext::new(chunker, part_index, data_index, part_index_dir, data_index_dir)?;
    ctx.build_targets(&chunk_ids)?;
    let inputs = ctx.input_paths();
    let ctx = Arc::new(ctx);

    let part_pos = cli
        .shared
        .part_pos
        .as_deref()
        .ok_or_else(|| DuplicatorError::InvalidConfig("--part.pos is required".into()))?;
    let (part_pos_lon, part_pos_lat) = parse_pos_pair(part_pos)?;
    let secondary_pos = cli
        .pos
        .iter()
        .map(|s| parse_pos_pair(s))
        .collect::<Result<Vec<_>>>()?;
    let id_field = cli
        .shared
        .id_field
        .as_deref()
        .map(|s| s.parse::<usize>().map_err(|_| DuplicatorError::InvalidConfig("--id must be a field index".into())))
        .transpose()?;

    let block_size_bytes = block_size_bytes(cli.shared.mr_block_size);
    let config = DuplicatorConfig {
        part_pos_lon,
        part_pos_lat,
        secondary_pos,
        part_id_field: cli.part_id_field,
        id_field,
        chunk_id_field: cli.chunk_id_field,
        sub_chunk_id_field: cli.sub_chunk_id_field,
        seed: cli.sample_seed,
        fraction: cli.sample_fraction,
        csv: CsvConfig::default(),
        out_dir: cli.shared.out_dir.clone(),
        num_nodes: cli.shared.out_num_nodes,
        block_size_bytes,
    };
    config.validate()?;

    std::fs::create_dir_all(&config.out_dir)?;
    let parallelism = auto_parallelism(cli.shared.mr_num_workers);
    let mr_config = MrConfig {
        num_map_workers: parallelism,
        num_reduce_workers: parallelism,
        num_buckets: parallelism * 4,
        spill_threshold: 100_000,
        block_size_bytes,
        run_dir: config.out_dir.join(".qserv-duplicator-runs"),
    };

    let ctx_for_worker = ctx.clone();
    let config_for_worker = config.clone();
    let outputs = qserv_mr::run(&inputs, &mr_config, move || {
        DuplicatorWorker::new(ctx_for_worker.clone(), config_for_worker.clone())
    })
    .map_err(|e| DuplicatorError::InvalidConfig(e.to_string()))?;

    let mut merged = ChunkIndex::new();
    for index in outputs {
        merged.merge(&index);
    }
    let index_path_out = config.out_dir.join(qserv_core::paths::CHUNK_INDEX_FILE);
    merged.write(BufWriter::new(File::create(&index_path_out)?))?;

    tracing::info!(chunks = merged.keys().count(), path = %index_path_out.display(), "wrote chunk index");
    Ok(())
}

fn parse_pos_pair(spec: &str) -> Result<(usize, usize)> {
    let mut parts = spec.split(',');
    let lon = parts
        .next()
        .ok_or_else(|| DuplicatorError::InvalidConfig(format!("malformed position field pair: {spec}")))?;
    let lat = parts
        .next()
        .ok_or_else(|| DuplicatorError::InvalidConfig(format!("malformed position field pair: {spec}")))?;
    let lon: usize = lon
        .trim()
        .parse()
        .map_err(|_| DuplicatorError::InvalidConfig(format!("lon field must be a field index: {spec}")))?;
    let lat: usize = lat
        .trim()
        .parse()
        .map_err(|_| DuplicatorError::InvalidConfig(format!("lat field must be a field index: {spec}")))?;
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
        assert_eq!(parse_pos_pair("5,6").unwrap(), (5, 6));
    }

    #[test]
    fn rejects_malformed_pos_fields() {
        assert!(parse_pos_pair("5").is_err());
        assert!(parse_pos_pair("a,b").is_err());
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
