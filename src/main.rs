// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use acoustic_fdtd::config::BackendPreference;
use acoustic_fdtd::io::{self, JobFile};
use acoustic_fdtd::{
    Dimensionality, Material, Mesh, SampleSession, Simulation, SimulationConfig, SimulationEvent,
    SimulationResult, WaveType,
};

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WaveArg {
    P,
    S,
    /// P then S on the same sample session
    Both,
}

#[derive(Parser)]
#[command(
    name = "acoustic-fdtd",
    about = "Synthetic ultrasonic P/S velocity measurement with an FDTD wave solver"
)]
struct Cli {
    /// JSON job file with material, mesh and config (overrides sample flags)
    #[arg(long)]
    job: Option<PathBuf>,

    /// Material name, matched against the rock-type table
    #[arg(short = 'm', long, default_value = "sandstone")]
    material: String,

    /// Material density (kg/m^3)
    #[arg(long, default_value = "2400")]
    density: f64,

    /// Sample size in metres: "w,h" for a flat slab or "x,y,z" for a box
    #[arg(short = 's', long, default_value = "0.05,0.05")]
    size: String,

    /// Wave type to measure
    #[arg(short = 'w', long, value_enum)]
    wave: Option<WaveArg>,

    /// Number of time steps
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Source frequency (kHz)
    #[arg(short = 'f', long)]
    frequency: Option<f64>,

    /// Source amplitude
    #[arg(long)]
    amplitude: Option<f64>,

    /// Source energy (echoed in results)
    #[arg(long)]
    energy: Option<f64>,

    /// Confining pressure (MPa)
    #[arg(long)]
    pressure: Option<f64>,

    /// Test axis, comma-separated (e.g. 1,0,0)
    #[arg(long)]
    axis: Option<String>,

    /// Integrator dimensionality (1 or 3)
    #[arg(short = 'd', long)]
    dim: Option<usize>,

    /// Number of Rayon worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Use the single-threaded backend
    #[arg(long)]
    serial: bool,

    /// Fail instead of falling back to the serial backend
    #[arg(long)]
    no_fallback: bool,

    /// Extend the run to cover twice the slowest travel time
    #[arg(long)]
    extended_time: bool,

    /// Print progress events to stderr
    #[arg(long)]
    progress: bool,

    /// Write the plain-text diagnostic dump here
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Write the result key/value map as JSON here
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn parse_floats(s: &str, what: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid --{}: expected comma-separated numbers", what))
}

fn build_mesh(size: &str) -> Result<Mesh> {
    let parts = parse_floats(size, "size")?;
    match parts.as_slice() {
        [w, h] => Ok(Mesh::rectangle(*w, *h)),
        [x, y, z] => Ok(Mesh::cuboid([*x, *y, *z])),
        _ => bail!("--size needs 2 or 3 components, got {}", parts.len()),
    }
}

/// Apply command-line overrides on top of `config`.
fn apply_flags(cli: &Cli, mut config: SimulationConfig) -> Result<SimulationConfig> {
    if let Some(steps) = cli.steps {
        config.time_steps = steps;
    }
    if let Some(f) = cli.frequency {
        config.frequency_khz = f;
    }
    if let Some(a) = cli.amplitude {
        config.amplitude = a;
    }
    if let Some(e) = cli.energy {
        config.energy = e;
    }
    if let Some(p) = cli.pressure {
        config.confining_pressure = p;
    }
    if let Some(axis) = &cli.axis {
        match parse_floats(axis, "axis")?.as_slice() {
            [x, y, z] => config.test_axis = [*x, *y, *z],
            other => bail!("--axis needs 3 components, got {}", other.len()),
        }
    }
    match cli.dim {
        None => {}
        Some(1) => config.dimensionality = Dimensionality::One,
        Some(3) => config.dimensionality = Dimensionality::Three,
        Some(d) => bail!("--dim must be 1 or 3, got {}", d),
    }
    if cli.threads.is_some() {
        config.threads = cli.threads;
    }
    if cli.serial {
        config.backend = BackendPreference::Serial;
    }
    if cli.no_fallback {
        config.allow_cpu_fallback = false;
    }
    if cli.extended_time {
        config.extended_time = true;
    }
    Ok(config)
}

/// `out.json` -> `out-p.json` when more than one run writes files.
fn suffixed(path: &Path, wave: WaveType, multiple: bool) -> PathBuf {
    if !multiple {
        return path.to_path_buf();
    }
    let tag = match wave {
        WaveType::P => "p",
        WaveType::S => "s",
    };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, tag, ext.to_string_lossy()),
        None => format!("{}-{}", stem, tag),
    };
    path.with_file_name(name)
}

fn run_one(
    sim: Simulation,
    session: SampleSession,
    progress: bool,
) -> Result<(Arc<SimulationResult>, SampleSession)> {
    let handle = sim.spawn(session).context("failed to start simulation thread")?;
    for event in handle.events().iter() {
        match event {
            SimulationEvent::Progress { percent, message } => {
                if progress {
                    eprintln!("[{:5.1}%] {}", percent, message);
                }
            }
            SimulationEvent::Completed { message, .. } => {
                if progress {
                    eprintln!("{}", message);
                }
            }
        }
    }
    let (result, session) = handle.join();
    let result = result.map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok((result, session))
}

fn print_summary(result: &SimulationResult) {
    let p = &result.properties;
    println!(
        "{} ({}): Vp={:.1} m/s Vs={:.1} m/s Vp/Vs={:.3} [theoretical Vp={:.1} Vs={:.1}] {}",
        result.wave_type,
        p.rock_type,
        result.p_wave_velocity,
        result.s_wave_velocity,
        result.vp_vs_ratio,
        p.vp,
        p.vs,
        if result.arrival_measured {
            "picked"
        } else {
            "fallback"
        }
    );
    println!(
        "  arrivals: P={:.4e} s S={:.4e} s, {} steps in {:.2}s on {}",
        result.p_arrival_time,
        result.s_arrival_time,
        result.time_steps,
        result.duration.as_secs_f64(),
        result.backend
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let (material, mesh, base) = match &cli.job {
        Some(path) => JobFile::load(path)
            .and_then(JobFile::into_parts)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("failed to load job {}", path.display()))?,
        None => (
            Material::new(cli.material.clone(), cli.density),
            build_mesh(&cli.size)?,
            SimulationConfig::default(),
        ),
    };
    let config = apply_flags(&cli, base)?;

    let waves: Vec<WaveType> = match cli.wave {
        None => vec![config.wave_type],
        Some(WaveArg::P) => vec![WaveType::P],
        Some(WaveArg::S) => vec![WaveType::S],
        Some(WaveArg::Both) => vec![WaveType::P, WaveType::S],
    };
    let multiple = waves.len() > 1;

    let mut session = SampleSession::new();
    for wave in waves {
        let config = SimulationConfig {
            wave_type: wave,
            ..config.clone()
        };
        let sim = Simulation::new(material.clone(), mesh.clone(), config, &session);
        let (result, returned) = run_one(sim, session, cli.progress)?;
        session = returned;

        print_summary(&result);
        if let Some(path) = &cli.diagnostics {
            let path = suffixed(path, wave, multiple);
            io::save_diagnostics(&path, &material, &result)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        if let Some(path) = &cli.output {
            let path = suffixed(path, wave, multiple);
            io::save_result_json(&path, &result)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }

    Ok(())
}
