//! faultmesh CLI - reservoir PEBI mesh generation.
//!
//! Usage: faultmesh <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `faultmesh --help` for available commands. Set `RUST_LOG=info` to see
//! per-stage progress.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use faultmesh::{ArtifactExporter, ReservoirMeshPipeline};

#[derive(Parser)]
#[command(name = "faultmesh")]
#[command(author, version, about = "Fault-conforming PEBI reservoir meshing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a mesh artifact from a JSON configuration
    Generate {
        /// Reservoir configuration (JSON)
        config: PathBuf,

        /// Output artifact (JSON)
        output: PathBuf,

        /// Pretty-print the artifact
        #[arg(long)]
        pretty: bool,
    },

    /// Print statistics and validation record of an artifact
    Inspect {
        /// Mesh artifact (JSON)
        artifact: PathBuf,

        /// Also list the faces claimed by each fault
        #[arg(long)]
        faults: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Generate { config, output, pretty } => {
            let artifact = ReservoirMeshPipeline::from_json_file(&config)?.run_to_file(&output, pretty)?;
            println!("{}", artifact.validation.summary);
            println!("Wrote {}", output.display());
        }
        Commands::Inspect { artifact, faults } => cmd_inspect(&artifact, faults)?,
    }
    Ok(())
}

fn cmd_inspect(path: &PathBuf, show_faults: bool) -> Result<(), Box<dyn std::error::Error>> {
    let artifact = ArtifactExporter::read_json(path)?;
    let stats = &artifact.statistics;
    let layers = &artifact.mesh.layers;

    println!("Artifact: {}", path.display());
    println!("  Cells:       {}", stats.total_cells);
    println!("  Faces:       {}", stats.total_faces);
    println!("  Nodes:       {}", stats.total_nodes);
    println!("  Fault faces: {}", stats.fault_faces);
    println!("  Removed:     {}", stats.removed_cells);
    println!(
        "  Layers:      {} x {:.3} m ({} to {} m)",
        layers.n_layers, layers.thickness, layers.top_depth, layers.base_depth
    );
    println!(
        "  Volume:      min {:.3e}, max {:.3e}, mean {:.3e}, total {:.6e} m3",
        stats.volume.min, stats.volume.max, stats.volume.mean, stats.volume.sum
    );

    let record = &artifact.validation;
    println!("Validation ({})", record.timestamp);
    println!("  Integrity:        {}", record.integrity_ok);
    println!("  Geometry:         {}", record.geometry_ok);
    println!("  Fault properties: {}", record.fault_properties_present);
    println!("  {}", record.summary);

    if show_faults {
        println!("Faults");
        for map in &artifact.mesh.fault_faces {
            println!(
                "  [{}] {}: {} faces, multiplier {}",
                map.fault_index,
                map.fault_name,
                map.len(),
                map.transmissibility_multiplier
            );
        }
    }
    Ok(())
}
