use crate::control::{AttitudeAltitudeController, ControlStep};
use crate::error::Result;
use nalgebra::{Matrix3, Vector3};

/// Tick count of the smoke-test mode: the loop stops once it has taken more
/// than 100 steps.
pub const SMOKE_TEST_TICKS: u64 = 101;

/// World-frame pose of a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Body-to-world rotation matrix
    pub rotation: Matrix3<f64>,
    /// Center of mass in world coordinates (m, z up)
    pub com: Vector3<f64>,
}

impl Pose {
    /// Level pose (identity rotation) at the given center of mass.
    ///
    /// # Arguments
    ///
    /// * `com` - Center of mass in world coordinates (m)
    ///
    /// # Example
    ///
    /// let pose = Pose::level(Vector3::new(0.0, 0.0, 0.5));
    /// assert_eq!(state_vector(&pose), Vector4::new(0.5, 0.0, 0.0, 0.0));
    pub fn level(com: Vector3<f64>) -> Self {
        Self {
            rotation: Matrix3::identity(),
            com,
        }
    }
}

/// A rigid-body world the controller can fly.
///
/// The physics engine is an external collaborator reached only through this
/// trait: a pose query, an actuator sink, `step` and `render`.
pub trait Simulator {
    /// Current pose of the named body.
    fn body_pose(&self, body: &str) -> Result<Pose>;

    /// Writes the four rotor commands. The simulator owns range limiting.
    fn set_controls(&mut self, controls: &[f64; 4]) -> Result<()>;

    /// Advances simulated time by [`Simulator::timestep`].
    fn step(&mut self) -> Result<()>;

    /// Presents the current frame.
    fn render(&mut self) -> Result<()>;

    fn timestep(&self) -> f64;
}

/// Emitted once per tick, after the control computation and before the
/// commands reach the simulator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickEvent {
    /// Zero-based tick index
    pub tick: u64,
    pub step: ControlStep,
}

/// Per-tick diagnostics hook.
pub trait TickObserver {
    fn on_tick(&mut self, event: &TickEvent);
}

impl<F> TickObserver for F
where
    F: FnMut(&TickEvent),
{
    fn on_tick(&mut self, event: &TickEvent) {
        self(event)
    }
}

/// Logs the error vector of every tick through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TickObserver for LogObserver {
    fn on_tick(&mut self, event: &TickEvent) {
        let e = &event.step.error;
        tracing::info!(
            tick = event.tick,
            "error [z, roll, pitch, yaw] = [{:+.6}, {:+.6}, {:+.6}, {:+.6}]",
            e[0],
            e[1],
            e[2],
            e[3]
        );
        tracing::debug!(tick = event.tick, thrusts = ?event.step.thrusts.as_slice());
    }
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl TickObserver for Silent {
    fn on_tick(&mut self, _event: &TickEvent) {}
}

/// Outcome of a loop that stopped on its own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    /// Number of completed ticks (each one stepped and rendered)
    pub ticks: u64,
    /// Control computed on the last tick, if any ran
    pub last_step: Option<ControlStep>,
}

/// Runs the control loop.
///
/// Each tick runs pose, controller, observer, actuators, step and render in
/// strict sequence on the calling thread. A simulator whose timestep differs
/// from the controller's `dt` is flown anyway, with a warning, and the
/// derivative keeps using the controller's `dt`.
///
/// # Arguments
///
/// * `controller` - PD controller, its previous error carries across calls
/// * `simulator` - World being flown
/// * `body` - Name of the controlled body
/// * `observer` - Receives one [`TickEvent`] per tick
/// * `max_ticks` - `Some(n)` stops after exactly `n` ticks, `None` runs until an error
///
/// # Returns
///
/// * `Ok(RunSummary)` - The tick budget was used up
/// * `Err(Error)` - First error from the simulator or the controller; the loop
///   does not retry
///
/// # Example
///
/// ```no_run
/// use quad_pid::config::Config;
/// use quad_pid::control::AttitudeAltitudeController;
/// use quad_pid::dynamics::{PlantParams, QuadrotorPlant};
/// use quad_pid::sim::{run, LogObserver, SMOKE_TEST_TICKS};
///
/// let config = Config::default();
/// let mut controller = AttitudeAltitudeController::from_config(&config)?;
/// let mut plant = QuadrotorPlant::new(PlantParams::from_config(&config));
///
/// let summary = run(
///     &mut controller,
///     &mut plant,
///     &config.body,
///     &mut LogObserver,
///     Some(SMOKE_TEST_TICKS),
/// )?;
/// assert_eq!(summary.ticks, SMOKE_TEST_TICKS);
/// # Ok::<(), quad_pid::Error>(())
/// ```
pub fn run<S, O>(
    controller: &mut AttitudeAltitudeController,
    simulator: &mut S,
    body: &str,
    observer: &mut O,
    max_ticks: Option<u64>,
) -> Result<RunSummary>
where
    S: Simulator + ?Sized,
    O: TickObserver + ?Sized,
{
    let sim_dt = simulator.timestep();
    if (sim_dt - controller.dt()).abs() > f64::EPSILON * sim_dt.abs().max(1.0) {
        tracing::warn!(
            "controller dt {} differs from simulator timestep {}; derivative will be mis-scaled",
            controller.dt(),
            sim_dt
        );
    }

    let mut ticks = 0;
    let mut last_step = None;

    loop {
        if let Some(max) = max_ticks {
            if ticks >= max {
                return Ok(RunSummary { ticks, last_step });
            }
        }

        let pose = simulator.body_pose(body)?;
        let step = controller.update(&pose)?;
        observer.on_tick(&TickEvent { tick: ticks, step });

        let f = &step.thrusts;
        simulator.set_controls(&[f[0], f[1], f[2], f[3]])?;
        simulator.step()?;
        simulator.render()?;

        ticks += 1;
        last_step = Some(step);
    }
}
