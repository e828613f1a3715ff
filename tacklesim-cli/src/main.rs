mod scene;
mod viewer;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tacklesim")]
#[command(about = "TackleSim - fixed-step physics for fishing tackle", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene and print the final state of every mass
    Run {
        /// Path to the scene JSON file
        file: PathBuf,
        /// Frames to simulate, overriding the scene
        #[arg(long)]
        frames: Option<usize>,
        /// Frame delta in seconds, overriding the scene
        #[arg(long)]
        dt: Option<f32>,
    },
    /// Print the system potential energy after every frame
    Energy {
        file: PathBuf,
        #[arg(long)]
        frames: Option<usize>,
    },
    /// Open the interactive side view
    View { file: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { file, frames, dt } => run_file(&file, frames, dt),
        Commands::Energy { file, frames } => energy_file(&file, frames),
        Commands::View { file } => view_file(file),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_file(file: &Path, frames: Option<usize>, dt: Option<f32>) -> Result<(), Box<dyn std::error::Error>> {
    let mut loaded = scene::load(file)?;
    let frames = frames.unwrap_or(loaded.frames);
    let dt = dt.unwrap_or(loaded.dt);
    for _ in 0..frames {
        loaded.sim.update(dt);
    }

    for key in &loaded.masses {
        let Some(mass) = loaded.sim.mass(*key) else {
            continue;
        };
        let (p, v) = (mass.position(), mass.velocity());
        println!(
            "{:?}-{} pos=({:.4}, {:.4}, {:.4}) vel=({:.4}, {:.4}, {:.4})",
            mass.mass_type(),
            mass.uid().0,
            p.x,
            p.y,
            p.z,
            v.x,
            v.y,
            v.z
        );
    }
    Ok(())
}

fn energy_file(file: &Path, frames: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let mut loaded = scene::load(file)?;
    let frames = frames.unwrap_or(loaded.frames);
    println!("0 {}", loaded.sim.system_potential_energy());
    for frame in 1..=frames {
        loaded.sim.update(loaded.dt);
        println!("{} {}", frame, loaded.sim.system_potential_energy());
    }
    Ok(())
}

fn view_file(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "TackleSim",
        options,
        Box::new(move |cc| Ok(Box::new(viewer::ViewerApp::new(file, cc)))),
    )
    .map_err(|e| format!("viewer failed: {}", e))?;
    Ok(())
}
