use std::process;

use clap::Parser;
use log::{ error, info };

use heliotrace::consts::DEFAULT_SEED;
use heliotrace::error::{ KernelError, Result };
use heliotrace::parallel::Tracer;
use heliotrace::registry::Registry;
use heliotrace::scene::{ save_rays, world_bounds, Scene };
use heliotrace::source::SunSource;

mod cli;
mod logger;

use cli::Args;
use logger::init_logger;

const DEFAULT_RAYS: usize = 10_000;

fn run(args: &Args) -> Result<()> {
    let registry = Registry::with_builtins();
    let mut scene = Scene::load(&args.config, &registry)?;

    let sun = scene.sun;
    let snapshot = scene.step(&sun)?;
    let bounds = world_bounds(&snapshot).ok_or_else(|| KernelError::InvalidConfiguration(
        "scene has no elements to aim at".to_string()
    ))?;

    let source = SunSource::new(&sun, &bounds)?;
    let rays = args.rays.or(scene.rays).unwrap_or(DEFAULT_RAYS);
    let seed = args.seed.or(scene.seed).unwrap_or(DEFAULT_SEED);

    info!("sun direction {:?}", source.sun().xyz());
    info!("tracing {} rays (seed {}) on {} threads", rays, seed, args.threads);

    let tracer = Tracer::new(args.threads, snapshot)?;
    let report = tracer.trace_batch(&source, rays, seed)?;

    info!(
        "missed {}, absorbed {}, reflected {} ({:.4} of traced)",
        report.missed, report.absorbed, report.reflected.len(), report.reflected_fraction()
    );
    info!("power per ray: {:.6} (source area {:.6})", source.area() / rays.max(1) as f64, source.area());

    if let Some(path) = &args.output {
        save_rays(path, &report)?;
        info!("wrote {} reflected rays to {}", report.reflected.len(), path.display());
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(args.log_level.into());

    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}
