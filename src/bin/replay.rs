//! tskv Replay Binary
//!
//! Feeds `timestamp,value` lines through a memtable and prints one
//! aggregation over a time range.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::thread;

use clap::Parser;
use crossbeam::channel;
use tracing_subscriber::{fmt, EnvFilter};

use tskv::{AggregationKind, Duration, Engine, Options, TimeRange, TimeRecord};

/// tskv replay harness
#[derive(Parser, Debug)]
#[command(name = "tskv-replay")]
#[command(about = "Replay timestamp,value samples through a tskv memtable")]
#[command(version)]
struct Args {
    /// Input file with `timestamp,value` lines (stdin if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Bucket interval in milliseconds
    #[arg(long, default_value = "1000")]
    interval_ms: i64,

    /// Byte cap on the memtable footprint
    #[arg(long)]
    max_bytes: Option<usize>,

    /// Age cap in milliseconds
    #[arg(long)]
    max_age_ms: Option<i64>,

    /// Keep raw samples next to the aggregates
    #[arg(long)]
    store_raw: bool,

    /// Aggregations to maintain
    #[arg(short, long, value_delimiter = ',', default_value = "sum,count")]
    kinds: Vec<AggregationKind>,

    /// Records per write batch
    #[arg(short, long, default_value = "1000")]
    batch_size: usize,

    /// Aggregation to print (`none` prints raw values)
    #[arg(short, long, default_value = "avg")]
    query: AggregationKind,

    /// Query range start (defaults to the oldest retained bucket)
    #[arg(long)]
    from: Option<i64>,

    /// Query range end (defaults to the end of the newest bucket)
    #[arg(long)]
    to: Option<i64>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tskv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!("tskv replay v{}", tskv::VERSION);

    let mut builder = Options::builder()
        .interval(Duration::milliseconds(args.interval_ms))
        .store_raw(args.store_raw);
    if let Some(max_bytes) = args.max_bytes {
        builder = builder.max_bytes_size(max_bytes);
    }
    if let Some(max_age) = args.max_age_ms {
        builder = builder.max_age(Duration::milliseconds(max_age));
    }

    let engine = match Engine::open(builder.build(), &args.kinds) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let reader: Box<dyn BufRead + Send> = match &args.input {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                tracing::error!("Failed to open {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Box::new(BufReader::new(io::stdin())),
    };

    // Parse on one thread, ingest on this one
    let (tx, rx) = channel::bounded::<Vec<TimeRecord>>(4);
    let batch_size = args.batch_size.max(1);
    let parser = thread::spawn(move || parse_batches(reader, batch_size, tx));

    let mut written = 0usize;
    for batch in rx {
        written += batch.len();
        if let Err(e) = engine.write(&batch) {
            tracing::error!("Write failed: {}", e);
            std::process::exit(1);
        }
    }

    match parser.join() {
        Ok(Ok(skipped)) if skipped > 0 => tracing::warn!("Skipped {} malformed lines", skipped),
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::error!("Failed to read input: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            tracing::error!("Parser thread panicked");
            std::process::exit(1);
        }
    }

    let stats = match engine.stats() {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Failed to read stats: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        written,
        buckets = stats.buckets,
        bytes = stats.bytes,
        evicted = stats.evicted_buckets,
        "Replay finished"
    );

    let range = TimeRange::new(
        args.from.unwrap_or(stats.time_range.start),
        args.to.unwrap_or(stats.time_range.end),
    );

    match engine.read_detailed(&range, args.query) {
        Ok(result) => {
            for (start, value) in result.bucket_starts.iter().zip(&result.values) {
                println!("{}\t{}", start, value);
            }
            if let Some(missing) = result.not_found {
                tracing::info!("Not held in memory: [{}, {})", missing.start, missing.end);
            }
        }
        Err(e) => {
            tracing::error!("Read failed: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = engine.finish() {
        tracing::error!("Finish failed: {}", e);
    }
}

/// Parse `timestamp,value` lines into batches; returns the number of skipped lines
fn parse_batches(
    reader: Box<dyn BufRead + Send>,
    batch_size: usize,
    tx: channel::Sender<Vec<TimeRecord>>,
) -> tskv::Result<usize> {
    let mut batch = Vec::with_capacity(batch_size);
    let mut skipped = 0;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_record(line) {
            Some(record) => batch.push(record),
            None => {
                tracing::debug!("Skipping malformed line: {}", line);
                skipped += 1;
                continue;
            }
        }

        if batch.len() == batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            if tx.send(full).is_err() {
                return Ok(skipped);
            }
        }
    }

    if !batch.is_empty() {
        let _ = tx.send(batch);
    }
    Ok(skipped)
}

fn parse_record(line: &str) -> Option<TimeRecord> {
    let (timestamp, value) = line.split_once(',')?;
    Some(TimeRecord::new(
        timestamp.trim().parse().ok()?,
        value.trim().parse().ok()?,
    ))
}
