use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use clap::Parser;
use cloud_sim_core::{CloudConfig, CloudSim, WeatherSample};

/// Cloud shading demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "cloud-sim-demo")]
#[command(about = "Procedural cloud-shading field demo", long_about = None)]
struct Args {
    /// Simulation duration in hours
    #[arg(short, long, default_value_t = 12.0)]
    duration: f64,

    /// Tick length in seconds
    #[arg(long, default_value_t = 60.0)]
    tick: f64,

    /// Site latitude in degrees
    #[arg(long, default_value_t = 35.0)]
    latitude: f64,

    /// Site longitude in degrees
    #[arg(long, default_value_t = -120.0)]
    longitude: f64,

    /// Opaque sky cover fraction (0-1)
    #[arg(short, long, default_value_t = 0.3)]
    sky_cover: f64,

    /// Wind speed in m/s
    #[arg(short, long, default_value_t = 8.0)]
    wind_speed: f64,

    /// Wind direction in compass degrees (0=North, 90=East)
    #[arg(long, default_value_t = 270.0)]
    wind_direction: f64,

    /// Cloud pattern tile size in pixels (rounded to a power of two)
    #[arg(long, default_value_t = 128)]
    tile_size: usize,

    /// Ground resolution in meters per pixel
    #[arg(long, default_value_t = 30.0)]
    resolution: f64,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Report interval in minutes
    #[arg(short, long, default_value_t = 30.0)]
    report_interval: f64,

    /// Write the final fuzzy opacity grid to a CSV file
    #[arg(long)]
    dump_csv: Option<String>,
}

/// Crude daily solar arc: zenith sweeps from 110° before dawn through 15°
/// at noon and back. Good enough to drive the demo's day/night gating.
fn zenith_rad(hour: f64) -> f64 {
    let arc = ((hour - 12.0) / 12.0 * std::f64::consts::PI).cos();
    let zenith_deg = 15.0 + (1.0 - arc) / 2.0 * 110.0;
    zenith_deg.to_radians()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    println!("=== Cloud Shading Demo ===\n");

    let config = CloudConfig {
        tile_size: args.tile_size,
        ground_resolution_m: args.resolution,
        seed: args.seed,
        ..CloudConfig::default()
    };
    let sim = CloudSim::new(config, [(args.latitude, args.longitude)]);
    let mut sim = match sim {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("failed to initialize cloud field: {err}");
            return ExitCode::FAILURE;
        }
    };
    let site = match sim.sites().next() {
        Some(site) => site.id,
        None => {
            eprintln!("no site registered");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Cloud field: {0}x{0} cells, {1} tiles/side of {2}px at {3:.0} m/px",
        sim.field().size(),
        sim.field().tiles_per_side(),
        sim.field().tile_size(),
        sim.field().resolution_m()
    );
    println!(
        "Wind: {:.1} m/s from {:.0}°, sky cover {:.2}\n",
        args.wind_speed, args.wind_direction, args.sky_cover
    );

    let total_s = args.duration * 3600.0;
    let report_s = args.report_interval * 60.0;
    let mut elapsed = 0.0;
    let mut next_report = 0.0;

    while elapsed < total_s {
        let hour = 6.0 + elapsed / 3600.0;
        let weather = WeatherSample {
            wind_speed: args.wind_speed,
            wind_direction_deg: args.wind_direction,
            opaque_sky_cover: args.sky_cover,
            solar_zenith_rad: zenith_rad(hour % 24.0),
            etrn: 1367.0,
            pressure_mbar: 1013.0,
            diffuse_horizontal: 90.0,
        };
        let tick = sim.step(args.tick, &weather);
        elapsed += args.tick;

        if elapsed >= next_report {
            let opacity = sim.opacity_at(args.latitude, args.longitude).unwrap_or(0.0);
            let irradiance = sim.irradiance_at(site).unwrap_or_default();
            let coverage = tick
                .classifier
                .or(sim.cut_result())
                .map_or(0.0, |cut| cut.measured);
            println!(
                "t={:>6.1} min  shift=({:+},{:+})  coverage={:.3}  opacity={:.3}  direct={:>6.1} W/m²  global={:>6.1} W/m²",
                elapsed / 60.0,
                tick.advection.row_shift,
                tick.advection.col_shift,
                coverage,
                opacity,
                irradiance.direct,
                irradiance.global
            );
            next_report += report_s;
        }
    }

    let stats = sim.stats();
    println!(
        "\nRan {} ticks: {} shifted, {} tiles rebuilt, {} reclassifications ({} classifier misses)",
        stats.ticks,
        stats.ticks_shifted,
        stats.tiles_rebuilt,
        stats.reclassifications,
        stats.classifier_failures
    );

    if let Some(path) = &args.dump_csv {
        match sim.fuzzy_pattern() {
            Some(pattern) => {
                let result = File::create(path)
                    .map(BufWriter::new)
                    .and_then(|mut writer| pattern.write_csv(&mut writer));
                match result {
                    Ok(()) => println!("Wrote fuzzy opacity grid to {path}"),
                    Err(err) => {
                        eprintln!("failed to write {path}: {err}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            None => println!("No classification ran; nothing to dump"),
        }
    }

    ExitCode::SUCCESS
}
