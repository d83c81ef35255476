// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Run driver: validation, setup, batched stepping, arrival picking and result
//! assembly, with a shared status, cooperative cancellation and progress events.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::config::{Dimensionality, Material, SimulationConfig, WaveType};
use crate::device::{select_device, ComputeDevice};
use crate::error::{AcousticError, Result};
use crate::grid::{plan, GridLimits, SimulationGrid};
use crate::material::{estimate, ElasticProperties};
use crate::mesh::Mesh;
use crate::model::{ModelSummary, VelocityModel};
use crate::picker::{Arrival, ArrivalPicker};
use crate::result::{SimulationResult, Snapshot};
use crate::session::{PriorMeasurement, SampleSession};
use crate::solver::{IsotropicIntegrator, LineIntegrator, WaveIntegrator};
use crate::wavelet::SourceWavelet;

/// Lifecycle of a run.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// Constructed, not yet started.
    NotInitialized = 0,
    /// Validating inputs and building the grid.
    Initializing = 1,
    /// Set up and about to step.
    Ready = 2,
    /// Stepping.
    Running = 3,
    /// Finished with a result.
    Completed = 4,
    /// Stopped by an error.
    Failed = 5,
    /// Stopped by the caller.
    Cancelled = 6,
}

impl Status {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (NotInitialized, Initializing)
                | (Initializing, Ready)
                | (Initializing, Failed)
                | (Ready, Running)
                | (Ready, Failed)
                | (Ready, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    fn from_u8(raw: u8) -> Status {
        match raw {
            0 => Status::NotInitialized,
            1 => Status::Initializing,
            2 => Status::Ready,
            3 => Status::Running,
            4 => Status::Completed,
            5 => Status::Failed,
            _ => Status::Cancelled,
        }
    }
}

/// Shared, thread-safe view of a run's [`Status`].
#[derive(Debug, Clone)]
pub struct StatusHandle(Arc<AtomicU8>);

impl StatusHandle {
    fn new() -> Self {
        StatusHandle(Arc::new(AtomicU8::new(Status::NotInitialized as u8)))
    }

    /// Current status.
    pub fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` if the lifecycle allows it from the current status.
    ///
    /// # Errors
    /// Returns [`AcousticError::InvalidTransition`] otherwise, leaving the status
    /// unchanged. Terminal states never transition.
    pub fn transition(&self, to: Status) -> Result<()> {
        let mut current = self.get();
        loop {
            if !current.can_transition_to(to) {
                return Err(AcousticError::InvalidTransition { from: current, to });
            }
            match self
                .0
                .compare_exchange(current as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(()),
                Err(actual) => current = Status::from_u8(actual),
            }
        }
    }
}

/// Cooperative cancellation flag, checked once per time step.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`CancellationToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Notifications sent while a run progresses.
#[derive(Debug, Clone)]
pub enum SimulationEvent {
    /// Sent after every batch of steps.
    Progress {
        /// Completed fraction, 0 to 100.
        percent: f64,
        /// Human-readable progress line.
        message: String,
    },
    /// Sent exactly once when the run ends, whatever the outcome.
    Completed {
        /// True if the run produced a result.
        success: bool,
        /// Summary or error text.
        message: String,
        /// The result on success.
        result: Option<Arc<SimulationResult>>,
    },
}

/// Receiver trace and snapshots collected during stepping.
struct Recording {
    trace: Vec<f64>,
    snapshots: Vec<Snapshot>,
}

/// One synthetic velocity measurement on one sample.
///
/// A `Simulation` runs once. Measurements from earlier runs on the same sample
/// are read from the [`SampleSession`] passed to [`Simulation::new`]; on success
/// the run's own measurement is written back to the session passed to
/// [`Simulation::run`].
pub struct Simulation {
    material: Material,
    mesh: Mesh,
    config: SimulationConfig,
    limits: GridLimits,
    prior_p: Option<PriorMeasurement>,
    prior_s: Option<PriorMeasurement>,
    status: StatusHandle,
    cancel: CancellationToken,
    events: Option<Sender<SimulationEvent>>,
}

impl Simulation {
    /// Create a run. Inputs are validated when the run starts.
    pub fn new(
        material: Material,
        mesh: Mesh,
        config: SimulationConfig,
        session: &SampleSession,
    ) -> Self {
        Simulation {
            material,
            mesh,
            config,
            limits: GridLimits::default(),
            prior_p: session.prior(WaveType::P),
            prior_s: session.prior(WaveType::S),
            status: StatusHandle::new(),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Override the grid sizing limits (builder method).
    pub fn with_limits(mut self, limits: GridLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Send progress and completion events to `sender` (builder method).
    pub fn with_events(mut self, sender: Sender<SimulationEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Use an externally owned cancellation token (builder method).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Shared handle to this run's status.
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Token that cancels this run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The configuration this run was built with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run to completion on the calling thread.
    ///
    /// # Errors
    /// Returns the validation, backend, divergence or cancellation error that
    /// ended the run. The status is `Failed` or `Cancelled` accordingly, and a
    /// completion event is sent either way.
    pub fn run(&self, session: &mut SampleSession) -> Result<Arc<SimulationResult>> {
        self.status.transition(Status::Initializing)?;

        match self.execute() {
            Ok(result) => {
                let result = Arc::new(result);
                if result.arrival_measured {
                    let wave = result.wave_type;
                    session.record(
                        wave,
                        PriorMeasurement {
                            velocity: result.velocity(wave),
                            arrival_time: result.arrival_time(wave),
                        },
                    );
                }
                self.status.transition(Status::Completed)?;
                let message = format!(
                    "{} run completed: Vp={:.1} m/s Vs={:.1} m/s Vp/Vs={:.3}",
                    result.wave_type,
                    result.p_wave_velocity,
                    result.s_wave_velocity,
                    result.vp_vs_ratio
                );
                log::info!("{}", message);
                self.emit(SimulationEvent::Completed {
                    success: true,
                    message,
                    result: Some(Arc::clone(&result)),
                });
                Ok(result)
            }
            Err(e) => {
                let terminal = match e {
                    AcousticError::Cancelled { .. } => Status::Cancelled,
                    _ => Status::Failed,
                };
                if let Err(t) = self.status.transition(terminal) {
                    log::error!("{}", t);
                }
                match terminal {
                    Status::Cancelled => log::info!("{}", e),
                    _ => log::error!("simulation failed: {}", e),
                }
                self.emit(SimulationEvent::Completed {
                    success: false,
                    message: e.to_string(),
                    result: None,
                });
                Err(e)
            }
        }
    }

    /// Run on a background thread with an unbounded event channel.
    ///
    /// The session is moved into the thread and handed back by
    /// [`RunHandle::join`].
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self, session: SampleSession) -> Result<RunHandle> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.spawn_on(tx, rx, session)
    }

    /// Like [`Simulation::spawn`] with a bounded event channel, so the run blocks
    /// on each event until the caller receives it.
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn_with_capacity(self, session: SampleSession, capacity: usize) -> Result<RunHandle> {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        self.spawn_on(tx, rx, session)
    }

    fn spawn_on(
        mut self,
        tx: Sender<SimulationEvent>,
        rx: Receiver<SimulationEvent>,
        mut session: SampleSession,
    ) -> Result<RunHandle> {
        self.events = Some(tx);
        let cancel = self.cancel.clone();
        let status = self.status.clone();
        let thread = std::thread::Builder::new()
            .name("fdtd-run".to_string())
            .spawn(move || {
                let result = self.run(&mut session);
                (result, session)
            })?;
        Ok(RunHandle {
            events: rx,
            cancel,
            status,
            thread,
        })
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        let rho = self.material.density;
        if !rho.is_finite() || rho <= 0.0 {
            return Err(AcousticError::InvalidDensity(rho));
        }
        self.mesh.validate()
    }

    fn execute(&self) -> Result<SimulationResult> {
        let started = Instant::now();
        self.validate()?;

        let cfg = &self.config;
        let props = estimate(
            &self.material.name,
            self.material.density,
            cfg.effective_confining_pressure(),
            cfg.triaxial.as_ref(),
        )?;
        let bounds = self.mesh.bounds()?;
        let grid = plan(
            &bounds,
            cfg.test_axis,
            props.vp,
            props.vs,
            cfg.frequency_hz(),
            &self.limits,
        )?;
        let device = select_device(cfg.backend, cfg.threads, cfg.allow_cpu_fallback)?;

        // viscous loss rate from the quality factor at the source frequency
        let damping = PI * cfg.frequency_hz() * props.attenuation;
        let (mut integrator, model) = self.integrator(&grid, &props, damping)?;
        let dt = integrator.dt();
        let distance = grid.source_receiver_distance();
        let steps = self.step_count(dt, distance, &props);
        let wavelet = SourceWavelet::ricker(
            dt,
            cfg.frequency_khz,
            SourceWavelet::natural_len(dt, cfg.frequency_khz, steps),
            cfg.amplitude,
        );

        self.status.transition(Status::Ready)?;
        log::info!(
            "{} run on '{}' ({}): {} integrator, {} backend, dt={:.3e} s, {} steps, wavelet {} samples",
            cfg.wave_type,
            self.material.name,
            props.rock_type,
            integrator.name(),
            device.name(),
            dt,
            steps,
            wavelet.len()
        );

        self.status.transition(Status::Running)?;
        let recording = self.step_all(integrator.as_mut(), device.as_ref(), &wavelet, steps)?;

        let picker = ArrivalPicker::new(dt, distance);
        Ok(self.assemble(
            recording,
            &picker,
            &grid,
            props,
            model,
            device.name(),
            dt,
            started,
        ))
    }

    fn integrator(
        &self,
        grid: &SimulationGrid,
        props: &ElasticProperties,
        damping: f64,
    ) -> Result<(Box<dyn WaveIntegrator>, Option<ModelSummary>)> {
        let wave = self.config.wave_type;
        match self.config.dimensionality {
            Dimensionality::One => {
                let line = LineIntegrator::for_grid(grid, wave, props.velocity(wave), damping)?;
                Ok((Box::new(line), None))
            }
            Dimensionality::Three => {
                let breaking = self
                    .config
                    .triaxial
                    .as_ref()
                    .and_then(|t| t.breaking_pressure());
                let model = VelocityModel::build(grid, &self.mesh, props.vp, props.density, breaking);
                let summary = model.summary();
                log::info!(
                    "model: {} of {} cells rock, mean density {:.0} kg/m^3",
                    summary.rock_cells,
                    summary.total_cells,
                    summary.mean_rock_density
                );
                let integrator =
                    IsotropicIntegrator::new(grid, &model, wave, props.vs / props.vp, damping)?;
                Ok((Box::new(integrator), Some(summary)))
            }
        }
    }

    /// Configured step count, raised in extended-time mode to cover twice the
    /// slowest travel time plus the source pulse.
    fn step_count(&self, dt: f64, distance: f64, props: &ElasticProperties) -> usize {
        let steps = self.config.time_steps;
        if !self.config.extended_time {
            return steps;
        }
        let slowest = props.vp.min(props.vs);
        let pulse = SourceWavelet::natural_len(dt, self.config.frequency_khz, usize::MAX);
        let travel = (2.0 * distance / slowest / dt).ceil();
        let required = if travel.is_finite() {
            travel as usize + pulse
        } else {
            steps
        };
        if required > steps {
            log::info!("extended time: {} -> {} steps", steps, required);
        }
        steps.max(required)
    }

    fn step_all(
        &self,
        integrator: &mut dyn WaveIntegrator,
        device: &dyn ComputeDevice,
        wavelet: &SourceWavelet,
        steps: usize,
    ) -> Result<Recording> {
        let batch = self.config.batch_size;
        let interval = self.config.snapshot_interval;
        let dt = integrator.dt();
        let mut trace = Vec::with_capacity(steps);
        let mut snapshots = Vec::with_capacity(steps / interval);

        let mut done = 0;
        while done < steps {
            let end = (done + batch).min(steps);
            for step in done..end {
                if self.cancel.is_cancelled() {
                    return Err(AcousticError::Cancelled { step });
                }
                if step < wavelet.len() {
                    integrator.inject(wavelet.at(step));
                }
                integrator.step(device);

                let sample = integrator.sample();
                if !sample.is_finite() {
                    return Err(AcousticError::NonFiniteField { step });
                }
                trace.push(sample);

                let completed = step + 1;
                if completed % interval == 0 {
                    snapshots.push(Snapshot {
                        step: completed,
                        time: completed as f64 * dt,
                        displacement: integrator.axis_line(),
                    });
                }
            }
            if integrator.field().iter().any(|v| !v.is_finite()) {
                return Err(AcousticError::NonFiniteField { step: end });
            }
            done = end;

            let percent = 100.0 * done as f64 / steps as f64;
            let message = format!("{} step {}/{}", self.config.wave_type, done, steps);
            log::debug!("{} ({:.0}%)", message, percent);
            self.emit(SimulationEvent::Progress { percent, message });
        }

        Ok(Recording { trace, snapshots })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        recording: Recording,
        picker: &ArrivalPicker,
        grid: &SimulationGrid,
        props: ElasticProperties,
        model: Option<ModelSummary>,
        backend: &str,
        dt: f64,
        started: Instant,
    ) -> SimulationResult {
        let cfg = &self.config;
        let distance = grid.source_receiver_distance();
        let trace = recording.trace;

        let (p, s, measured) = match cfg.wave_type {
            WaveType::P => {
                let arrival = picker.pick_p(&trace, props.vp);
                let p = reported(&arrival, self.prior_p);
                let s = self
                    .prior_s
                    .map(|m| (m.velocity, m.arrival_time))
                    .unwrap_or((props.vs, distance / props.vs));
                (p, s, arrival.is_measured())
            }
            WaveType::S => {
                let p = self
                    .prior_p
                    .map(|m| (m.velocity, m.arrival_time))
                    .unwrap_or((props.vp, distance / props.vp));
                let arrival = picker.pick_s(&trace, p.1, props.vs);
                let s = reported(&arrival, self.prior_s);
                (p, s, arrival.is_measured())
            }
        };

        let max_displacement = trace.iter().fold(0.0_f64, |m, a| m.max(a.abs()));
        let times = (0..trace.len()).map(|n| picker.sample_time(n)).collect();

        SimulationResult {
            wave_type: cfg.wave_type,
            dimensionality: cfg.dimensionality,
            backend: backend.to_string(),
            p_wave_velocity: p.0,
            s_wave_velocity: s.0,
            vp_vs_ratio: p.0 / s.0,
            p_arrival_time: p.1,
            s_arrival_time: s.1,
            arrival_measured: measured,
            properties: props,
            max_displacement,
            distance,
            grid_shape: grid.shape(),
            grid_spacing: grid.spacing(),
            dt,
            time_steps: trace.len(),
            frequency_khz: cfg.frequency_khz,
            amplitude: cfg.amplitude,
            energy: cfg.energy,
            confining_pressure: cfg.effective_confining_pressure(),
            model,
            trace,
            times,
            snapshots: recording.snapshots,
            duration: started.elapsed(),
        }
    }

    fn emit(&self, event: SimulationEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                log::debug!("event receiver dropped");
            }
        }
    }
}

/// Velocity and arrival time to report: the pick if measured, else the
/// session's earlier measurement, else the theoretical fallback.
fn reported(arrival: &Arrival, prior: Option<PriorMeasurement>) -> (f64, f64) {
    match prior {
        Some(m) if !arrival.is_measured() => (m.velocity, m.arrival_time),
        _ => (arrival.velocity, arrival.time),
    }
}

/// A run executing on a background thread.
pub struct RunHandle {
    events: Receiver<SimulationEvent>,
    cancel: CancellationToken,
    status: StatusHandle,
    thread: JoinHandle<(Result<Arc<SimulationResult>>, SampleSession)>,
}

impl RunHandle {
    /// Progress and completion events. The channel closes when the run ends.
    pub fn events(&self) -> &Receiver<SimulationEvent> {
        &self.events
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current status of the run.
    pub fn status(&self) -> Status {
        self.status.get()
    }

    /// True once the background thread has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run and take back the session.
    ///
    /// If the run thread panicked the session is lost and an empty one is
    /// returned alongside the error.
    pub fn join(self) -> (Result<Arc<SimulationResult>>, SampleSession) {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(_) => (
                Err(AcousticError::Other("simulation thread panicked".to_string())),
                SampleSession::new(),
            ),
        }
    }
}
