//! End-to-end tick cycle: advection, reclassification, opacity and
//! irradiance queries on a small three-by-three tile domain.

use cloud_sim_core::{CloudConfig, CloudSim, WeatherSample};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn toy_config() -> CloudConfig {
    CloudConfig {
        tile_size: 4,
        ground_resolution_m: 30.0,
        seed: 99,
        ..CloudConfig::default()
    }
}

/// Due-east airflow moving the pattern exactly one pixel per tick:
/// 30 m/s over 1 s at 30 m/pixel, wind measured from compass 90°.
fn easterly_tick() -> WeatherSample {
    WeatherSample {
        wind_speed: 30.0,
        wind_direction_deg: 90.0,
        opaque_sky_cover: 0.4,
        solar_zenith_rad: 0.5,
        etrn: 1367.0,
        pressure_mbar: 1013.0,
        diffuse_horizontal: 100.0,
    }
}

#[test]
fn test_single_site_domain_is_three_tiles_wide() {
    let sim = CloudSim::new(toy_config(), [(35.0, -120.0)]).unwrap();
    // One on-screen tile plus a one-tile buffer on each side
    assert_eq!(sim.field().tiles_per_side(), 3);
    assert_eq!(sim.field().size(), 3 * 4 + 1);
    assert!(sim.field().fully_populated());
}

#[test]
fn test_five_tick_advection_cycle() {
    let mut sim = CloudSim::new(toy_config(), [(35.0, -120.0)]).unwrap();
    let weather = easterly_tick();
    let initial = sim.field().clone();

    for tick_no in 0..5 {
        let tick = sim.step(1.0, &weather);

        assert_eq!(
            (tick.advection.row_shift, tick.advection.col_shift),
            (0, -1),
            "tick {tick_no} should shift one column"
        );
        assert!(
            sim.field().fully_populated(),
            "tick {tick_no} left holes in the buffer"
        );
        assert!(tick.reclassified, "a shifted tick must reclassify");

        // Sky cover 0.4 doubles to a 0.8 coverage target
        let cut = tick.classifier.unwrap();
        assert!(
            (cut.measured - 0.8).abs() <= 0.005,
            "tick {tick_no}: measured coverage {} missed the 0.8 target",
            cut.measured
        );

        let opacity = sim.opacity_at(35.0, -120.0).unwrap();
        assert!((0.0..=1.0).contains(&opacity));
        let mask = sim.binary_opacity_at(35.0, -120.0).unwrap();
        assert!(mask == 0.0 || mask == 1.0);
    }

    // After 5 one-pixel ticks every surviving column sits 5 pixels to the
    // left of where it started; the exposed right-hand columns are fresh.
    let size = sim.field().size();
    for row in 0..size {
        for col in 0..size - 5 {
            assert_eq!(sim.field().cell(row, col), initial.cell(row, col + 5));
        }
        for col in size - 5..size {
            assert!(sim.field().cell(row, col).is_some());
        }
    }

    let stats = sim.stats();
    assert_eq!(stats.ticks, 5);
    assert_eq!(stats.ticks_shifted, 5);
    assert_eq!(stats.reclassifications, 5);
}

#[test]
fn test_irradiance_follows_opacity() {
    let mut sim = CloudSim::new(toy_config(), [(35.0, -120.0)]).unwrap();
    let site = sim.sites().next().unwrap().id;
    let weather = easterly_tick();
    sim.step(1.0, &weather);

    let opacity = sim.opacity_at(35.0, -120.0).unwrap();
    let irradiance = sim.irradiance_at(site).unwrap();

    assert!(irradiance.direct >= 0.0);
    assert_eq!(irradiance.diffuse, weather.diffuse_horizontal);
    if opacity >= 1.0 {
        assert_eq!(irradiance.direct, 0.0);
    } else {
        assert!(irradiance.direct < weather.etrn);
    }
    assert!(irradiance.global >= irradiance.diffuse - 1e-9);
}

#[test]
fn test_identical_runs_are_deterministic() {
    let weather = easterly_tick();

    let run = || {
        let mut sim = CloudSim::new(toy_config(), [(35.0, -120.0)]).unwrap();
        let mut series = Vec::new();
        for _ in 0..5 {
            sim.step(1.0, &weather);
            series.push(sim.opacity_at(35.0, -120.0).unwrap());
        }
        (series, sim.fuzzy_pattern().cloned())
    };

    let (series_a, fuzzy_a) = run();
    let (series_b, fuzzy_b) = run();
    assert_eq!(series_a, series_b);
    assert_eq!(fuzzy_a, fuzzy_b);
}
