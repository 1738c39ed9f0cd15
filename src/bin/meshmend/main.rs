//! meshmend CLI - mesh repair command-line tool.
//!
//! Usage: meshmend <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `meshmend --help` for available commands. Set `RUST_LOG=debug` for
//! per-stage timings.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};

use meshmend::algo::clean::{clean_with_report, CleanOptions};
use meshmend::algo::curvature::{compute_curvature, CurvatureStats};
use meshmend::algo::decimate::{decimate_with_progress, DecimateOptions};
use meshmend::algo::reconstruct::{reconstruct, ReconstructOptions};
use meshmend::algo::smooth::{smooth_with_progress, SmoothOptions};
use meshmend::algo::Progress;
use meshmend::io;
use meshmend::mesh::topology::{boundary_loop_count, component_count, non_manifold_edges};
use meshmend::mesh::Mesh;
use meshmend::pipeline::{repair_with_progress, RepairConfig};

#[derive(Parser)]
#[command(name = "meshmend")]
#[command(author, version, about = "Mesh repair CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full repair pipeline
    Repair(RepairArgs),

    /// Display mesh information
    Info {
        /// Input mesh file
        input: PathBuf,

        /// Show curvature statistics
        #[arg(long)]
        curvature: bool,
    },

    /// Merge coincident points and drop degenerate cells
    Clean {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Merge distance
        #[arg(short, long, default_value = "0")]
        tolerance: f64,
    },

    /// Smooth a mesh with the windowed-sinc filter
    Smooth {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Number of filter terms
        #[arg(short, long, default_value = "20")]
        iterations: usize,

        /// Pass band, in (0, 2)
        #[arg(short, long, default_value = "0.1")]
        pass_band: f64,

        /// Feature angle in degrees
        #[arg(short, long, default_value = "45")]
        feature_angle: f64,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },

    /// Decimate (simplify) a mesh without changing its topology
    Decimate {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Fraction of triangles to remove, in [0, 1)
        #[arg(short, long, default_value = "0.5")]
        reduction: f64,

        /// Allow boundary edges to be collapsed
        #[arg(long)]
        collapse_boundary: bool,
    },

    /// Reconstruct a closed surface from the mesh's points
    Reconstruct {
        /// Input mesh or point cloud
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Lattice cells along the longest axis
        #[arg(short, long, default_value = "32")]
        resolution: usize,

        /// Neighbours per tangent plane
        #[arg(short, long, default_value = "12")]
        neighbors: usize,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Args)]
struct RepairArgs {
    /// Input mesh file
    input: PathBuf,

    /// Output mesh file
    output: PathBuf,

    /// Largest hole extent to fill
    #[arg(long, default_value = "100")]
    hole_size: f64,

    /// Smoothing filter terms
    #[arg(long, default_value = "3")]
    smooth_iterations: usize,

    /// Smoothing pass band, in (0, 2)
    #[arg(long, default_value = "0.5")]
    pass_band: f64,

    /// Smoothing feature angle in degrees
    #[arg(long, default_value = "60")]
    feature_angle: f64,

    /// Fraction of triangles removed by decimation
    #[arg(long, default_value = "0.05")]
    decimate_reduction: f64,

    /// Deformation factor; the mesh is scaled by 1 + factor * 0.1
    #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
    deform_factor: f64,

    /// Components with at most this many points are removed
    #[arg(long, default_value = "50")]
    denoise_threshold: f64,

    /// Merge distance used when cleaning
    #[arg(long, default_value = "0")]
    merge_tolerance: f64,

    /// Reconstruction lattice resolution
    #[arg(long, default_value = "32")]
    resolution: usize,

    /// Neighbours per tangent plane during reconstruction
    #[arg(long, default_value = "12")]
    neighbors: usize,

    /// Stop before the next stage once this many seconds have passed
    #[arg(long)]
    time_budget: Option<f64>,

    /// Use rayon inside the stages that support it
    #[arg(long)]
    parallel: bool,

    /// Progress display
    #[arg(long, value_enum, default_value = "bar")]
    progress: ProgressStyle,
}

impl RepairArgs {
    fn config(&self) -> RepairConfig {
        RepairConfig {
            hole_size: self.hole_size,
            smooth_iterations: self.smooth_iterations,
            pass_band: self.pass_band,
            feature_angle: self.feature_angle,
            decimate_reduction: self.decimate_reduction,
            deform_factor: self.deform_factor,
            denoise_area_threshold: self.denoise_threshold,
            merge_tolerance: self.merge_tolerance,
            reconstruct_resolution: self.resolution,
            reconstruct_neighbors: self.neighbors,
            parallel: self.parallel,
            time_budget: self
                .time_budget
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64),
            ..RepairConfig::default()
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ProgressStyle {
    /// Terminal progress bar
    Bar,
    /// No progress output
    None,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Repair(args) => cmd_repair(&args)?,

        Commands::Info {
            input,
            curvature: show_curvature,
        } => {
            cmd_info(&input, show_curvature)?;
        }

        Commands::Clean {
            input,
            output,
            tolerance,
        } => {
            cmd_clean(&input, &output, tolerance)?;
        }

        Commands::Smooth {
            input,
            output,
            iterations,
            pass_band,
            feature_angle,
            sequential,
        } => {
            let options = SmoothOptions::default()
                .with_iterations(iterations)
                .with_pass_band(pass_band)
                .with_feature_angle(feature_angle)
                .with_parallel(!sequential);
            cmd_smooth(&input, &output, &options)?;
        }

        Commands::Decimate {
            input,
            output,
            reduction,
            collapse_boundary,
        } => {
            let options =
                DecimateOptions::with_reduction(reduction).with_preserve_boundary(!collapse_boundary);
            cmd_decimate(&input, &output, &options)?;
        }

        Commands::Reconstruct {
            input,
            output,
            resolution,
            neighbors,
            sequential,
        } => {
            let options = ReconstructOptions::default()
                .with_resolution(resolution)
                .with_neighbors(neighbors)
                .with_parallel(!sequential);
            cmd_reconstruct(&input, &output, &options)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // Only ever move forward.
        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        let percent = previous.max(raw_percent);
        if percent == previous && percent != 100 && current != 0 {
            return;
        }

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);

        // Pad the message so a shorter one clears the previous.
        eprint!("\r[{}{}] {:3}% {:<20}", bar, space, percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn load(input: &Path) -> Result<Mesh, Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;
    println!(
        "Loaded: {} points, {} polygons, {} lines",
        mesh.num_points(),
        mesh.num_polygons(),
        mesh.lines.len()
    );
    Ok(mesh)
}

fn save(mesh: &Mesh, output: &Path, elapsed: Duration) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Result: {} points, {} polygons, {} lines",
        mesh.num_points(),
        mesh.num_polygons(),
        mesh.lines.len()
    );
    io::save(mesh, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);
    Ok(())
}

fn cmd_repair(args: &RepairArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = load(&args.input)?;
    let config = args.config();
    let progress = match args.progress {
        ProgressStyle::Bar => create_progress(),
        ProgressStyle::None => Progress::none(),
    };

    let start = Instant::now();
    let repaired = repair_with_progress(&mesh, &config, &progress)?;
    save(&repaired, &args.output, start.elapsed())
}

fn cmd_info(input: &Path, show_curvature: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    println!("File: {}", input.display());
    println!("Points: {}", mesh.num_points());
    println!("Polygons: {}", mesh.num_polygons());
    println!("Lines: {}", mesh.lines.len());

    if mesh.num_polygons() > 0 {
        let areas: Vec<f64> = (0..mesh.num_polygons())
            .map(|i| mesh.polygon_area(i))
            .collect();
        let min_area = areas.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_area = areas.iter().cloned().fold(0.0_f64, f64::max);
        println!("Surface area: {:.6}", mesh.surface_area());
        println!("Polygon area range: [{:.6}, {:.6}]", min_area, max_area);
    }

    if let Some((min, max)) = mesh.bounding_box() {
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
        let diag = max - min;
        println!("Dimensions: {:.3} x {:.3} x {:.3}", diag.x, diag.y, diag.z);
    }

    if mesh.num_polygons() == 0 {
        println!("Mesh type: Point cloud");
    } else if mesh.is_triangle_mesh() {
        println!("Mesh type: Triangle mesh");
    } else {
        println!("Mesh type: Polygon mesh");
    }

    println!("Components: {}", component_count(&mesh));
    let loops = boundary_loop_count(&mesh);
    let non_manifold = non_manifold_edges(&mesh).len();
    if loops == 0 && non_manifold == 0 {
        println!("Topology: Closed (volume {:.6})", mesh.signed_volume());
    } else {
        println!(
            "Topology: Open ({} boundary loops, {} non-manifold edges)",
            loops, non_manifold
        );
    }

    if show_curvature {
        println!("\nCurvature:");
        let curv = compute_curvature(&mesh);

        if let Some(stats) = CurvatureStats::of(curv.gaussian_values()) {
            println!(
                "  Gaussian: min={:.4}, max={:.4}, avg={:.4}",
                stats.min, stats.max, stats.mean
            );
        }
        if let Some(stats) = CurvatureStats::of(curv.mean_values()) {
            println!(
                "  Mean:     min={:.4}, max={:.4}, avg={:.4}",
                stats.min, stats.max, stats.mean
            );
        }

        // Gauss-Bonnet check
        let total_gaussian: f64 = curv.gaussian_values().iter().sum();
        let euler_from_curv = total_gaussian / (2.0 * std::f64::consts::PI);
        println!("  Gauss-Bonnet Euler characteristic: {:.2}", euler_from_curv);
    }

    Ok(())
}

fn cmd_clean(input: &Path, output: &Path, tolerance: f64) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = load(input)?;

    let start = Instant::now();
    let (cleaned, report) = clean_with_report(&mesh, &CleanOptions::default().with_tolerance(tolerance));
    println!(
        "Merged {} points, removed {} polygons, {} lines, {} unused points",
        report.merged_points, report.removed_polygons, report.removed_lines, report.removed_points
    );
    save(&cleaned, output, start.elapsed())
}

fn cmd_smooth(
    input: &Path,
    output: &Path,
    options: &SmoothOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = load(input)?;

    let mode = if options.parallel { "parallel" } else { "sequential" };
    println!(
        "Applying windowed-sinc smoothing ({} terms, pass band {}, {})...",
        options.iterations, options.pass_band, mode
    );
    let progress = create_progress();

    let start = Instant::now();
    let smoothed = smooth_with_progress(&mesh, options, &progress)?;
    save(&smoothed, output, start.elapsed())
}

fn cmd_decimate(
    input: &Path,
    output: &Path,
    options: &DecimateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = load(input)?;

    println!("Removing {:.0}% of triangles...", options.reduction * 100.0);
    let progress = create_progress();

    let start = Instant::now();
    let decimated = decimate_with_progress(&mesh, options, &progress)?;
    save(&decimated, output, start.elapsed())
}

fn cmd_reconstruct(
    input: &Path,
    output: &Path,
    options: &ReconstructOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = load(input)?;

    println!(
        "Reconstructing ({}^3 lattice, {} neighbours)...",
        options.resolution, options.neighbors
    );

    let start = Instant::now();
    let surface = reconstruct(&mesh, options)?;
    save(&surface, output, start.elapsed())
}
