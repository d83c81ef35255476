// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use acoustic_fdtd::config::BackendPreference;
use acoustic_fdtd::grid::{plan, GridLimits};
use acoustic_fdtd::material::{estimate, ROCK_TYPES};
use acoustic_fdtd::{
    AcousticError, Dimensionality, Material, Mesh, SampleSession, Simulation, SimulationConfig,
    SimulationEvent, Status, WaveType,
};

fn slab() -> Mesh {
    Mesh::rectangle(0.05, 0.05)
}

fn sandstone() -> Material {
    Material::new("Sandstone", 2400.0)
}

fn relative_error(measured: f64, expected: f64) -> f64 {
    (measured - expected).abs() / expected
}

/// Test 1: Two-triangle slabs, 1D P-wave path, across rock types and
/// frequencies. The picked velocity should match the theoretical Vp within 20%.
#[test]
fn slab_p_wave_velocity_matches_theory() {
    let cases = [
        ("Sandstone", 2400.0, 0.05, 500.0),
        ("Granite", 2650.0, 0.1, 300.0),
    ];
    for (name, density, size, khz) in cases {
        let config = SimulationConfig {
            frequency_khz: khz,
            ..SimulationConfig::default()
        };
        let mut session = SampleSession::new();
        let sim = Simulation::new(
            Material::new(name, density),
            Mesh::rectangle(size, size),
            config,
            &session,
        );
        let result = sim.run(&mut session).unwrap();

        assert_eq!(sim.status().get(), Status::Completed);
        assert!(result.arrival_measured, "{}: P arrival fell back to theory", name);
        let theory = result.properties.vp;
        let err = relative_error(result.p_wave_velocity, theory);
        assert!(
            err < 0.2,
            "{} at {} kHz: Vp measured={} theoretical={} (error {:.1}%)",
            name,
            khz,
            result.p_wave_velocity,
            theory,
            100.0 * err
        );

        // the measurement is stored for later runs on the same sample
        let prior = session.prior(WaveType::P).unwrap();
        assert_eq!(prior.velocity, result.p_wave_velocity);
        assert_eq!(prior.arrival_time, result.p_arrival_time);
    }
}

/// Test 2: Same slab, 1D S-wave path.
#[test]
fn slab_s_wave_velocity_matches_theory() {
    let config = SimulationConfig {
        wave_type: WaveType::S,
        ..SimulationConfig::default()
    };
    let mut session = SampleSession::new();
    let sim = Simulation::new(sandstone(), slab(), config, &session);
    let result = sim.run(&mut session).unwrap();

    assert!(result.arrival_measured, "S arrival fell back to theory");
    let theory = result.properties.vs;
    let err = relative_error(result.s_wave_velocity, theory);
    assert!(
        err < 0.25,
        "Vs measured={} theoretical={} (error {:.1}%)",
        result.s_wave_velocity,
        theory,
        100.0 * err
    );
    // no P measurement yet: Vp is the theoretical value
    assert_eq!(result.p_wave_velocity, result.properties.vp);
}

/// Test 3: A P run followed by an S run on one session.
/// The S run reports the P run's measured Vp and a measured Vp/Vs ratio.
#[test]
fn p_then_s_reuses_session() {
    let mut session = SampleSession::new();

    let p_sim = Simulation::new(sandstone(), slab(), SimulationConfig::default(), &session);
    let p = p_sim.run(&mut session).unwrap();

    let s_config = SimulationConfig {
        wave_type: WaveType::S,
        ..SimulationConfig::default()
    };
    let s_sim = Simulation::new(sandstone(), slab(), s_config, &session);
    let s = s_sim.run(&mut session).unwrap();

    assert_eq!(s.p_wave_velocity, p.p_wave_velocity);
    assert_eq!(s.p_arrival_time, p.p_arrival_time);
    assert!(s.s_arrival_time > s.p_arrival_time);
    assert!((s.vp_vs_ratio - s.p_wave_velocity / s.s_wave_velocity).abs() < 1e-12);
    assert!(s.vp_vs_ratio > 1.0);
    assert!(session.prior(WaveType::S).is_some());
}

/// Test 4: Cancellation from another thread halts within one batch boundary.
#[test]
fn cancellation_stops_within_one_batch() {
    let config = SimulationConfig {
        time_steps: 200_000,
        ..SimulationConfig::default()
    };
    let sim = Simulation::new(sandstone(), slab(), config, &SampleSession::new());
    let handle = sim.spawn_with_capacity(SampleSession::new(), 0).unwrap();

    let first = handle.events().recv().unwrap();
    assert!(matches!(first, SimulationEvent::Progress { .. }));
    handle.cancel();

    let mut progress = 1;
    let mut completion = None;
    for event in handle.events().iter() {
        match event {
            SimulationEvent::Progress { .. } => progress += 1,
            SimulationEvent::Completed { success, .. } => completion = Some(success),
        }
    }
    assert!(progress <= 2, "{} progress events after cancel", progress);
    assert_eq!(completion, Some(false));
    assert_eq!(handle.status(), Status::Cancelled);

    let (result, _) = handle.join();
    match result {
        Err(AcousticError::Cancelled { step }) => assert!(step <= 50, "step {}", step),
        other => panic!("expected cancellation, got {:?}", other.map(|_| ())),
    }
}

/// Test 5: Validation failures end in Failed and never reach Running.
#[test]
fn validation_failure_never_runs() {
    let cases = [
        SimulationConfig {
            frequency_khz: 0.0,
            ..SimulationConfig::default()
        },
        SimulationConfig {
            amplitude: -1.0,
            ..SimulationConfig::default()
        },
        SimulationConfig {
            test_axis: [0.0, 0.0, 0.0],
            ..SimulationConfig::default()
        },
    ];
    for config in cases {
        let sim = Simulation::new(sandstone(), slab(), config, &SampleSession::new());
        let handle = sim.spawn(SampleSession::new()).unwrap();
        let events: Vec<_> = handle.events().iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            SimulationEvent::Completed {
                success: false,
                result: None,
                ..
            }
        ));
        let (result, session) = handle.join();
        assert!(result.unwrap_err().is_validation());
        assert!(session.is_empty());
    }
}

/// Test 6: A disabled fallback with a working pool still runs; the serial
/// backend produces the same trace as the parallel one.
#[test]
fn backends_agree() {
    let run = |backend: BackendPreference| {
        let config = SimulationConfig {
            time_steps: 300,
            backend,
            threads: Some(2),
            allow_cpu_fallback: false,
            ..SimulationConfig::default()
        };
        let sim = Simulation::new(sandstone(), slab(), config, &SampleSession::new());
        sim.run(&mut SampleSession::new()).unwrap()
    };
    let serial = run(BackendPreference::Serial);
    let parallel = run(BackendPreference::Parallel);
    assert_eq!(serial.backend, "serial");
    assert!(parallel.backend.starts_with("parallel"));
    assert_eq!(serial.trace, parallel.trace);
}

/// Test 7: 3D isotropic S-wave run on a small box completes with finite output
/// and archives displacement lines along the test axis.
#[test]
fn isotropic_box_run() {
    let config = SimulationConfig {
        wave_type: WaveType::S,
        dimensionality: Dimensionality::Three,
        time_steps: 80,
        test_axis: [0.0, 0.0, 2.0],
        snapshot_interval: 5,
        ..SimulationConfig::default()
    };
    let limits = GridLimits {
        max_dim: 20,
        ..GridLimits::default()
    };
    let sim = Simulation::new(
        Material::new("granite", 2650.0),
        Mesh::cuboid([0.02, 0.02, 0.02]),
        config,
        &SampleSession::new(),
    )
    .with_limits(limits);
    let result = sim.run(&mut SampleSession::new()).unwrap();

    assert_eq!(result.grid_shape, [20, 20, 20]);
    assert_eq!(result.trace.len(), 80);
    assert_eq!(result.snapshots.len(), 16);
    assert!(result.snapshots.iter().all(|s| s.displacement.len() == 20));
    assert!(result.trace.iter().all(|v| v.is_finite()));
}

/// Test 8: Vp/Vs recomputed from K, G and density matches the reported ratio
/// whenever no velocity clamp applies.
#[test]
fn vp_vs_ratio_matches_moduli() {
    for rock in ROCK_TYPES.iter() {
        let props = estimate(rock.name, rock.reference_density, 0.0, None).unwrap();
        let k = props.bulk_modulus * 1e9;
        let g = props.shear_modulus * 1e9;
        let vp = ((k + 4.0 * g / 3.0) / props.density).sqrt();
        let vs = (g / props.density).sqrt();
        let clamped = !(1500.0..=8000.0).contains(&vp) || !(600.0..=4500.0).contains(&vs);
        if clamped {
            continue;
        }
        assert!(
            relative_error(props.vp_vs_ratio(), vp / vs) < 1e-9,
            "{}: {} vs {}",
            rock.name,
            props.vp_vs_ratio(),
            vp / vs
        );
    }
}

/// Test 9: Planned grids respect the size invariants for every rock type,
/// sample shape and frequency.
#[test]
fn planned_grids_respect_limits() {
    let limits = GridLimits::default();
    let meshes = [
        Mesh::rectangle(0.05, 0.05),
        Mesh::cuboid([0.1, 0.05, 0.025]),
        Mesh::cuboid([0.3, 0.3, 0.3]),
    ];
    for rock in ROCK_TYPES.iter() {
        let props = estimate(rock.name, rock.reference_density, 10.0, None).unwrap();
        for mesh in &meshes {
            let bounds = mesh.bounds().unwrap();
            for khz in [50.0, 500.0, 2000.0] {
                let grid = plan(&bounds, [0.0, 1.0, 0.0], props.vp, props.vs, khz * 1e3, &limits)
                    .unwrap();
                let shape = grid.shape();
                for n in shape {
                    assert!(n % 2 == 0 && (8..=128).contains(&n), "{:?}", shape);
                }
                assert!(shape.iter().product::<usize>() <= 8_388_608);
                assert!(grid.spacing() >= grid.initial_spacing() * (1.0 - 1e-12));
                let [sx, sy, sz] = grid.source();
                assert_eq!(sy, shape[1] / 4);
                assert_eq!((sx, sz), (shape[0] / 2, shape[2] / 2));
            }
        }
    }
}

/// Test 10: A line too short to separate the arrival from the noise window
/// reports the theoretical velocity and leaves the session untouched, so a
/// following S run does not inherit a bogus Vp.
#[test]
fn short_line_falls_back_without_recording() {
    let granite = || Material::new("Granite", 2650.0);
    let mesh = || Mesh::rectangle(0.02, 0.02);
    let mut session = SampleSession::new();

    let p_config = SimulationConfig {
        frequency_khz: 100.0,
        ..SimulationConfig::default()
    };
    let p = Simulation::new(granite(), mesh(), p_config.clone(), &session)
        .run(&mut session)
        .unwrap();
    assert!(!p.arrival_measured);
    assert_eq!(p.p_wave_velocity, p.properties.vp);
    assert_eq!(p.p_arrival_time, p.distance / p.properties.vp);
    assert!(session.prior(WaveType::P).is_none());

    let s_config = SimulationConfig {
        wave_type: WaveType::S,
        ..p_config
    };
    let s = Simulation::new(granite(), mesh(), s_config, &session)
        .run(&mut session)
        .unwrap();
    assert_eq!(s.p_wave_velocity, s.properties.vp);
}
