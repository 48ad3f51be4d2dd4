//! shape_dump: print a procedural or remotely generated point cloud as JSON.
//!
//! ```text
//! shape_dump --shape bottle --count 500 --seed 3 > bottle.json
//! shape_dump --describe "a rubber duck" --count 1200
//! ```

use clap::Parser;
use morph_shapes::{generate, Shape, ShapeClient, ShapeClientConfig, PROCEDURAL_POINT_COUNT};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "shape_dump")]
#[command(about = "Dump a morph target point cloud as JSON", long_about = None)]
struct Cli {
    /// Procedural shape: sphere, cube or bottle
    #[arg(short, long, default_value = "sphere")]
    shape: String,

    /// Number of points
    #[arg(short, long, default_value_t = PROCEDURAL_POINT_COUNT)]
    count: usize,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Ask the remote shape service instead of a procedural generator
    #[arg(short, long)]
    describe: Option<String>,

    /// Shape service endpoint (remote mode)
    #[arg(long)]
    endpoint: Option<String>,
}

#[derive(Serialize)]
struct Dump {
    points: Vec<[f32; 3]>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let points = match cli.describe {
        Some(description) => {
            let mut config = ShapeClientConfig::default();
            if let Some(endpoint) = cli.endpoint {
                config.endpoint = endpoint;
            }
            ShapeClient::new(config)?.generate(&description, cli.count)?
        }
        None => {
            let shape = Shape::from_name(&cli.shape)
                .ok_or_else(|| format!("unknown shape '{}' (sphere, cube, bottle)", cli.shape))?;
            let mut rng = match cli.seed {
                Some(s) => StdRng::seed_from_u64(s),
                None    => StdRng::from_entropy(),
            };
            generate(shape, cli.count, &mut rng)
        }
    };

    let dump = Dump { points: points.iter().map(|p| p.to_array()).collect() };
    println!("{}", serde_json::to_string(&dump)?);
    Ok(())
}
