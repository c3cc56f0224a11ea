use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use xxhash_rust::xxh3::xxh3_64;

use rabf_codecs::Compressor;
use rabf_core::{
    BlockAddressIndex, CompressionInfo, DataSource, FileSink, FileSource, MmapSource, Reader,
    ReaderOptions, Writer,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "rabf",
    about = "Random-Access Block Format: compress, inspect, and randomly read RABF files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a RABF data/info pair
    Compress {
        /// Source file to compress ("-" reads stdin)
        input: PathBuf,
        /// Destination data file; the info stream goes to "<output>.info"
        output: PathBuf,
        /// Compressor: lz4 | lz4hc | snappy | zlib | zlib_default | zstd
        #[arg(short, long, default_value = "zstd")]
        codec: String,
        /// Raw bytes per block (default: 65536 = 64 KB)
        #[arg(short, long, default_value_t = 64 * 1024)]
        block_size: u64,
        /// Write the legacy single-stream snappy layout instead
        #[arg(long)]
        legacy: bool,
    },
    /// Fully decompress a RABF file back to raw bytes
    Decompress {
        /// Source data file
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Print compression info and block index statistics
    Inspect {
        /// RABF data file to inspect
        file: PathBuf,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
    },
    /// Read an arbitrary (offset, length) range
    Read {
        /// RABF data file
        file: PathBuf,
        /// Uncompressed byte offset to read from
        #[arg(short, long)]
        offset: u64,
        /// Number of bytes to read
        #[arg(short, long)]
        len: usize,
        /// Memory-map the data file (integrated strategy)
        #[arg(long)]
        mmap: bool,
        /// Write raw bytes to a file instead of printing a hex dump
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Benchmark random-access reads at N randomly chosen offsets
    Bench {
        /// RABF data file
        file: PathBuf,
        /// Number of random reads
        #[arg(short, long, default_value_t = 1000)]
        count: u64,
        /// Bytes per read
        #[arg(long, default_value_t = 4096)]
        read_len: usize,
        /// Memory-map the data file (integrated strategy)
        #[arg(long)]
        mmap: bool,
        /// Fixed random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn info_path_of(data_path: &Path) -> PathBuf {
    let mut os = data_path.as_os_str().to_owned();
    os.push(".info");
    PathBuf::from(os)
}

/// Open a reader over `path`, auto-detecting the layout: a sibling
/// "<path>.info" stream means the primary two-stream format, otherwise the
/// file is treated as a legacy single-stream trailer file.
fn open_reader(path: &Path, mmap: bool) -> anyhow::Result<Reader> {
    let source: Arc<dyn DataSource> = if mmap {
        Arc::new(MmapSource::open(path).with_context(|| format!("mapping {path:?}"))?)
    } else {
        Arc::new(FileSource::open(path).with_context(|| format!("opening {path:?}"))?)
    };
    let opts = ReaderOptions {
        cache: None,
        file_id: xxh3_64(path.as_os_str().as_encoded_bytes()),
    };

    let info_path = info_path_of(path);
    if info_path.exists() {
        let (info, index) = load_info(&info_path)?;
        Ok(Reader::open(source, info, index, opts)?)
    } else {
        Ok(Reader::open_legacy(source, opts)?)
    }
}

fn load_info(info_path: &Path) -> anyhow::Result<(CompressionInfo, BlockAddressIndex)> {
    let bytes =
        std::fs::read(info_path).with_context(|| format!("reading info stream {info_path:?}"))?;
    Ok(CompressionInfo::decode(&bytes)?)
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn hex_dump(bytes: &[u8], shown: usize) {
    let preview = &bytes[..bytes.len().min(shown)];
    for (i, chunk) in preview.chunks(16).enumerate() {
        print!("  {:04x}  ", i * 16);
        for b in chunk {
            print!("{:02x} ", b);
        }
        for _ in chunk.len()..16 {
            print!("   ");
        }
        print!("  |");
        for b in chunk {
            if b.is_ascii_graphic() || *b == b' ' {
                print!("{}", *b as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
    if bytes.len() > shown {
        println!("  ... ({} bytes remaining not shown)", bytes.len() - shown);
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    codec_name: &str,
    block_size: u64,
    legacy: bool,
) -> anyhow::Result<()> {
    let data_sink = FileSink::create(&output)
        .with_context(|| format!("creating output file {output:?}"))?;
    let mut writer = if legacy {
        Writer::new_legacy(Box::new(data_sink), block_size)?
    } else {
        let info_sink = FileSink::create(info_path_of(&output))?;
        Writer::new(Box::new(data_sink), Box::new(info_sink), codec_name, block_size)?
    };
    let codec_display = writer.compressor().name();

    let t0 = Instant::now();
    let mut src: Box<dyn Read> = if input.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(&input).with_context(|| format!("opening input file {input:?}"))?,
        ))
    };
    let mut buf = vec![0u8; (block_size as usize).clamp(4096, 8 * 1024 * 1024)];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write(&buf[..n])?;
    }

    let info = writer.finish()?;
    let elapsed = t0.elapsed();
    let ratio = if info.compressed_file_length > 0 {
        info.uncompressed_file_length as f64 / info.compressed_file_length as f64
    } else {
        1.0
    };

    eprintln!("  codec       : {}", codec_display);
    eprintln!("  layout      : {}", if legacy { "legacy single-stream" } else { "data + info" });
    eprintln!("  block size  : {}", human_bytes(info.block_size));
    eprintln!("  blocks      : {}", info.block_count);
    eprintln!("  raw size    : {}", human_bytes(info.uncompressed_file_length));
    eprintln!("  compressed  : {}", human_bytes(info.compressed_file_length));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((info.uncompressed_file_length as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let mut reader = open_reader(&input, false)?;

    let is_stdout = output.to_str() == Some("-");
    let mut dst: Box<dyn Write> = if is_stdout {
        Box::new(io::stdout())
    } else {
        Box::new(
            File::create(&output).with_context(|| format!("creating output file {output:?}"))?,
        )
    };

    let t0 = Instant::now();
    let total = reader.uncompressed_len();
    let mut buf = vec![0u8; 1 << 20];
    let mut at = 0u64;
    while at < total {
        let n = reader.read_at(&mut buf, at)?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])?;
        at += n as u64;
    }
    dst.flush()?;

    let elapsed = t0.elapsed();
    eprintln!("  blocks      : {}", reader.info().block_count);
    eprintln!("  raw size    : {}", human_bytes(at));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((at as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let reader = open_reader(&file, false)?;
    let info = reader.info();
    let compressor = Compressor::from_name(&info.compressor)?;
    let file_size = std::fs::metadata(&file)?.len();
    let ratio = if info.compressed_file_length > 0 {
        info.uncompressed_file_length as f64 / info.compressed_file_length as f64
    } else {
        1.0
    };

    println!("=== RABF file: {:?} ===", file);
    println!();
    println!("  codec          : {}", compressor.name());
    println!("  block size     : {}", human_bytes(info.block_size));
    println!("  block count    : {}", info.block_count);
    println!("  raw size       : {}", human_bytes(info.uncompressed_file_length));
    println!("  compressed     : {}", human_bytes(info.compressed_file_length));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  ratio          : {:.2}x", ratio);
    println!(
        "  largest block  : {}",
        human_bytes(reader.index().max_compressed_block_size())
    );

    if show_blocks {
        println!();
        println!(
            "  {:>8}  {:>14}  {:>12}  {:>12}",
            "block", "file offset", "compressed", "raw"
        );
        println!("  {}", "-".repeat(52));
        let index = reader.index();
        for i in 0..index.block_count() {
            println!(
                "  {:>8}  {:>14}  {:>12}  {:>12}",
                i,
                index.compressed_block_address(i),
                human_bytes(index.compressed_block_length(i)),
                human_bytes(index.raw_block_length(i)),
            );
        }
    }

    Ok(())
}

fn run_read(
    file: PathBuf,
    offset: u64,
    len: usize,
    mmap: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut reader = open_reader(&file, mmap)?;

    let t0 = Instant::now();
    let bytes = reader.read_range(offset, len)?;
    let elapsed = t0.elapsed();

    eprintln!(
        "  strategy    : {} ({} block loads)",
        reader.strategy().name(),
        reader.blocks_loaded()
    );
    eprintln!(
        "  read {} at offset {} in {:.3}ms",
        human_bytes(bytes.len() as u64),
        offset,
        elapsed.as_secs_f64() * 1000.0
    );

    match output {
        Some(path) => {
            std::fs::write(&path, &bytes)?;
            eprintln!("  written to {:?}", path);
        }
        None => {
            println!(
                "--- {} bytes at offset {} (first {} shown) ---",
                bytes.len(),
                offset,
                bytes.len().min(256)
            );
            hex_dump(&bytes, 256);
        }
    }
    Ok(())
}

fn run_bench(
    file: PathBuf,
    count: u64,
    read_len: usize,
    mmap: bool,
    seed: u64,
) -> anyhow::Result<()> {
    let mut reader = open_reader(&file, mmap)?;
    let total = reader.uncompressed_len();
    if total == 0 {
        anyhow::bail!("file has no data");
    }

    // Simple LCG for reproducible random offsets (no external dep)
    let offsets: Vec<u64> = {
        let mut rng = seed;
        (0..count)
            .map(|_| {
                rng = rng
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (rng >> 33) % total
            })
            .collect()
    };

    eprintln!(
        "benchmarking {} random {} reads across {} ({} strategy)...",
        count,
        human_bytes(read_len as u64),
        human_bytes(total),
        reader.strategy().name()
    );

    let t0 = Instant::now();
    let mut total_read = 0u64;
    let mut latencies_us: Vec<u64> = Vec::with_capacity(count as usize);
    let mut buf = vec![0u8; read_len];

    for &offset in &offsets {
        let t = Instant::now();
        let n = reader.read_at(&mut buf, offset)?;
        latencies_us.push(t.elapsed().as_micros() as u64);
        total_read += n as u64;
    }

    let elapsed = t0.elapsed();
    latencies_us.sort_unstable();

    let p50 = latencies_us[latencies_us.len() / 2];
    let p95 = latencies_us[(latencies_us.len() as f64 * 0.95) as usize];
    let p99 = latencies_us[(latencies_us.len() as f64 * 0.99) as usize];

    println!();
    println!("=== Random Access Benchmark ===");
    println!("  reads       : {}", count);
    println!("  block loads : {}", reader.blocks_loaded());
    println!("  total raw   : {}", human_bytes(total_read));
    println!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    println!(
        "  throughput  : {}/s",
        human_bytes((total_read as f64 / elapsed.as_secs_f64()) as u64)
    );
    println!("  latency:");
    println!("    min  : {} µs", latencies_us[0]);
    println!("    p50  : {} µs", p50);
    println!("    p95  : {} µs", p95);
    println!("    p99  : {} µs", p99);
    println!("    max  : {} µs", latencies_us[latencies_us.len() - 1]);

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compress {
            input,
            output,
            codec,
            block_size,
            legacy,
        } => run_compress(input, output, &codec, block_size, legacy),
        Commands::Decompress { input, output } => run_decompress(input, output),
        Commands::Inspect { file, blocks } => run_inspect(file, blocks),
        Commands::Read {
            file,
            offset,
            len,
            mmap,
            output,
        } => run_read(file, offset, len, mmap, output),
        Commands::Bench {
            file,
            count,
            read_len,
            mmap,
            seed,
        } => run_bench(file, count, read_len, mmap, seed),
    }
}
