//! TileVault CLI
//!
//! Diagnostics for a pyramid store: print or regenerate split indexes, print
//! stitched job plans, print pyramid metadata.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilevault::{Bounds, Config, PyramidStore, Result, TileBounds};
use tracing_subscriber::{fmt, EnvFilter};

/// TileVault CLI
#[derive(Parser, Debug)]
#[command(name = "tilevault")]
#[command(about = "Inspect tiled raster pyramid storage")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./tilevault_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the split index of each level (max zoom first)
    Splits {
        /// Pyramids to print
        #[arg(required = true)]
        pyramids: Vec<String>,

        /// Only this zoom level
        #[arg(short, long)]
        zoom: Option<u32>,

        /// Regenerate each index from its segments before printing
        #[arg(short, long)]
        regenerate: bool,
    },

    /// Print the stitched partitions of a multi-pyramid job
    Plan {
        /// Pyramids in priority order (earliest wins overlaps)
        #[arg(required = true)]
        pyramids: Vec<String>,

        /// Zoom level to plan at
        #[arg(short, long)]
        zoom: u32,

        /// Tile rectangle to crop to: minCol,minRow,maxCol,maxRow
        #[arg(long, conflicts_with = "bbox")]
        crop: Option<String>,

        /// Geographic rectangle to crop to: west,south,east,north
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<String>,
    },

    /// Print a pyramid's metadata record
    Metadata {
        pyramid: String,
    },
}

fn main() {
    // Logs go to stderr so command output stays pipeable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tilevault=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("TileVault v{}", tilevault::VERSION);
    tracing::debug!("Data directory: {}", args.data_dir.display());

    let config = Config::builder().data_dir(&args.data_dir).build();
    let store = match PyramidStore::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Commands::Splits {
            pyramids,
            zoom,
            regenerate,
        } => print_splits(&store, &pyramids, zoom, regenerate),
        Commands::Plan {
            pyramids,
            zoom,
            crop,
            bbox,
        } => print_plan(&store, &pyramids, zoom, crop.as_deref(), bbox.as_deref()),
        Commands::Metadata { pyramid } => print_metadata(&store, &pyramid),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// One line per entry: `min\tmax\tname\t\tpartition`
fn print_splits(
    store: &PyramidStore,
    pyramids: &[String],
    zoom: Option<u32>,
    regenerate: bool,
) -> Result<()> {
    for pyramid in pyramids {
        let mut zooms = match zoom {
            Some(z) => vec![z],
            None => store.levels(pyramid)?,
        };
        zooms.sort_unstable_by(|a, b| b.cmp(a));

        if zooms.is_empty() {
            tracing::warn!(pyramid = %pyramid, "No levels found");
        }

        for z in zooms {
            let index = if regenerate {
                store.regenerate_index(pyramid, z)?
            } else {
                store.load_index(pyramid, z)?
            };

            println!("{} zoom {} ({} splits)", pyramid, z, index.len());
            for entry in index.iter() {
                println!(
                    "{}\t{}\t{}\t\t{}",
                    entry.start, entry.end, entry.segment, entry.partition
                );
            }
        }
    }
    Ok(())
}

fn print_plan(
    store: &PyramidStore,
    pyramids: &[String],
    zoom: u32,
    crop: Option<&str>,
    bbox: Option<&str>,
) -> Result<()> {
    let crop = match (crop, bbox) {
        (Some(c), _) => Some(TileBounds::parse(zoom, c)?),
        (None, Some(b)) => Some(TileBounds::from_geographic(&b.parse::<Bounds>()?, zoom)?),
        (None, None) => None,
    };
    let inputs: Vec<&str> = pyramids.iter().map(String::as_str).collect();

    let partitions = store.plan(&inputs, zoom, crop.as_ref())?;

    println!("input\tpyramid\tpartition\tstart\tend\tsegment\towned");
    for p in &partitions {
        let owned: u64 = p.owned_ranges().iter().map(|r| r.tile_count()).sum();
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            p.input_index(),
            p.input_name(),
            p.entry().partition,
            p.entry().start,
            p.entry().end,
            p.entry().segment,
            owned
        );
    }
    Ok(())
}

fn print_metadata(store: &PyramidStore, pyramid: &str) -> Result<()> {
    let metadata = store.read_metadata(pyramid)?;

    println!("name:           {}", metadata.name);
    println!("max zoom:       {}", metadata.max_zoom);
    println!("bounds:         {}", metadata.bounds);
    println!("bands:          {}", metadata.bands);
    println!("classification: {}", metadata.classification);
    println!("tile size:      {}", metadata.tile_size);
    println!("default values: {:?}", metadata.default_values);
    for (zoom, bounds) in &metadata.tile_bounds {
        println!("tile bounds {:>2}: {}", zoom, bounds);
    }
    for (zoom, bounds) in &metadata.pixel_bounds {
        println!("pixel bounds {:>2}: {}", zoom, bounds);
    }
    for (zoom, image) in &metadata.image_names {
        println!("image {:>2}:       {}", zoom, image);
    }
    Ok(())
}
