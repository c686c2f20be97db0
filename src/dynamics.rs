use crate::attitude::rotation_from_euler;
use crate::config::{Config, DEFAULT_BODY, DEFAULT_DT, DEFAULT_GRAVITY, DEFAULT_MASS};
use crate::error::{Error, Result};
use crate::sim::{Pose, Simulator};
use nalgebra::Vector3;

/// Complete state of the vehicle.
///
/// # Fields
///
/// * `position_x`, `position_y`, `position_z` - Position in the inertial frame (m)
/// * `velocity_x`, `velocity_y`, `velocity_z` - Linear velocity in the inertial frame (m/s)
/// * `roll`, `pitch`, `yaw` - ZYX Euler angles (rad)
/// * `roll_rate`, `pitch_rate`, `yaw_rate` - Body angular rates p, q, r (rad/s)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct State {
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub velocity_z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll_rate: f64,
    pub pitch_rate: f64,
    pub yaw_rate: f64,
}

impl State {
    /// Order: [pos xyz, vel xyz, roll, pitch, yaw, p, q, r]
    pub fn to_array(&self) -> [f64; 12] {
        [
            self.position_x,
            self.position_y,
            self.position_z,
            self.velocity_x,
            self.velocity_y,
            self.velocity_z,
            self.roll,
            self.pitch,
            self.yaw,
            self.roll_rate,
            self.pitch_rate,
            self.yaw_rate,
        ]
    }

    pub fn from_array(arr: &[f64; 12]) -> Self {
        State {
            position_x: arr[0],
            position_y: arr[1],
            position_z: arr[2],
            velocity_x: arr[3],
            velocity_y: arr[4],
            velocity_z: arr[5],
            roll: arr[6],
            pitch: arr[7],
            yaw: arr[8],
            roll_rate: arr[9],
            pitch_rate: arr[10],
            yaw_rate: arr[11],
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.position_x, self.position_y, self.position_z)
    }
}

/// Physical constants of the vehicle.
///
/// * `g` - Gravitational acceleration (m/s²)
/// * `mass` - Total mass (kg)
/// * `ixx`, `iyy`, `izz` - Principal moments of inertia (kg⋅m²)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Consts {
    pub g: f64,
    pub mass: f64,
    pub ixx: f64,
    pub iyy: f64,
    pub izz: f64,
}

/// Equations of motion with constant body-frame force and torque over one
/// integration interval.
///
/// * `forces` - Applied force in the body frame (N)
/// * `torques` - Applied torque about body axes (N⋅m)
pub struct DroneODE {
    pub consts: Consts,
    pub forces: Vector3<f64>,
    pub torques: Vector3<f64>,
}

impl fast_ode::DifferentialEquation<12> for DroneODE {
    /// Newton's law for translation with gravity along -z, Euler's equations
    /// for rotation and the ZYX Euler-rate kinematics. The yaw rate is held
    /// at zero at θ = ±π/2 where the kinematics are singular.
    fn ode_dot_y(&self, _t: f64, y: &fast_ode::Coord<12>) -> (fast_ode::Coord<12>, bool) {
        let state = y.0;

        let phi = state[6];
        let theta = state[7];
        let psi = state[8];
        let p = state[9];
        let q = state[10];
        let r = state[11];

        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_theta, cos_theta) = theta.sin_cos();
        let (sin_psi, cos_psi) = psi.sin_cos();
        let tan_theta = theta.tan();

        let fx_body = self.forces.x;
        let fy_body = self.forces.y;
        let fz_body = self.forces.z;

        // R = Rz(ψ) * Ry(θ) * Rx(φ)
        let fx_inertial = (cos_theta * cos_psi) * fx_body
            + (sin_phi * sin_theta * cos_psi - cos_phi * sin_psi) * fy_body
            + (cos_phi * sin_theta * cos_psi + sin_phi * sin_psi) * fz_body;

        let fy_inertial = (cos_theta * sin_psi) * fx_body
            + (sin_phi * sin_theta * sin_psi + cos_phi * cos_psi) * fy_body
            + (cos_phi * sin_theta * sin_psi - sin_phi * cos_psi) * fz_body;

        let fz_inertial = (-sin_theta) * fx_body
            + (sin_phi * cos_theta) * fy_body
            + (cos_phi * cos_theta) * fz_body;

        let mut dot_y = [0.0; 12];

        dot_y[0] = state[3];
        dot_y[1] = state[4];
        dot_y[2] = state[5];

        dot_y[3] = fx_inertial / self.consts.mass;
        dot_y[4] = fy_inertial / self.consts.mass;
        dot_y[5] = fz_inertial / self.consts.mass - self.consts.g;

        dot_y[6] = p + q * sin_phi * tan_theta + r * cos_phi * tan_theta;
        dot_y[7] = q * cos_phi - r * sin_phi;
        dot_y[8] = if cos_theta.abs() > 1e-6 {
            q * sin_phi / cos_theta + r * cos_phi / cos_theta
        } else {
            0.0
        };

        let Consts { ixx, iyy, izz, .. } = self.consts;
        dot_y[9] = (self.torques.x + (iyy - izz) * q * r) / ixx;
        dot_y[10] = (self.torques.y + (izz - ixx) * r * p) / iyy;
        dot_y[11] = (self.torques.z + (ixx - iyy) * p * q) / izz;

        (fast_ode::Coord(dot_y), true)
    }
}

/// Integrates the dynamics over `time_span` with constant inputs.
///
/// # Arguments
///
/// * `initial_state` - Starting state
/// * `consts` - Physical parameters
/// * `forces` - Body-frame force (N), positive z is upward thrust
/// * `torques` - Body-frame torque (N⋅m)
/// * `time_span` - (t_start, t_end) in seconds
/// * `tolerance` - Absolute tolerance for the adaptive integrator
///
/// # Returns
///
/// * `Ok(State)` - State at `t_end`
/// * `Err(Error::Integration)` - The solver did not reach `t_end`
pub fn simulate_drone(
    initial_state: State,
    consts: Consts,
    forces: Vector3<f64>,
    torques: Vector3<f64>,
    time_span: (f64, f64),
    tolerance: f64,
) -> Result<State> {
    let ode = DroneODE {
        consts,
        forces,
        torques,
    };

    let initial_coord = fast_ode::Coord(initial_state.to_array());

    let result = fast_ode::solve_ivp(
        &ode,
        time_span,
        initial_coord,
        |_, _| true,
        tolerance,
        tolerance * 10.0,
    );

    match result {
        fast_ode::IvpResult::FinalTimeReached(final_coord) => Ok(State::from_array(&final_coord.0)),
        _ => Err(Error::Integration { time: time_span.0 }),
    }
}

/// Parameters of [`QuadrotorPlant`].
#[derive(Clone, Debug, PartialEq)]
pub struct PlantParams {
    pub consts: Consts,
    /// Name answered by `body_pose`
    pub body: String,
    /// Rotor offset along both body x and y (m)
    pub rotor_offset: f64,
    /// Yaw reaction torque per unit rotor thrust
    pub yaw_drag: f64,
    /// Inclusive actuator range applied to every command
    pub ctrl_range: (f64, f64),
    /// Step length (s)
    pub dt: f64,
    pub tolerance: f64,
    /// Initial state
    pub initial: State,
}

impl Default for PlantParams {
    /// The stock airframe: 0.3 kg, rotors at (±0.1, ±0.1) m, commands in [0, 10],
    /// resting on the floor.
    fn default() -> Self {
        Self {
            consts: Consts {
                g: DEFAULT_GRAVITY,
                mass: DEFAULT_MASS,
                ixx: 1.6e-3,
                iyy: 1.6e-3,
                izz: 3.1e-3,
            },
            body: DEFAULT_BODY.to_string(),
            rotor_offset: 0.1,
            yaw_drag: 0.1,
            ctrl_range: (0.0, 10.0),
            dt: DEFAULT_DT,
            tolerance: 1e-8,
            initial: State::default(),
        }
    }
}

impl PlantParams {
    /// Stock airframe with mass, gravity, timestep and body name taken from
    /// the controller configuration.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            consts: Consts {
                g: config.gravity,
                mass: config.mass,
                ..defaults.consts
            },
            body: config.body.clone(),
            dt: config.dt,
            ..defaults
        }
    }
}

/// Quadrotor resting on a floor, driven by four rotor commands.
///
/// A small stand-in for the external physics engine so the controller can be
/// flown without one: 6-DOF dynamics integrated with `fast_ode`, rotors
/// pushing along body +z, and a flat floor at `z = 0`. There are no contacts
/// or collisions beyond that floor.
///
/// Rotor `i` sits at the motor site `(±offset, ±offset)` and produces thrust
/// `Fᵢ` along body +z:
///
/// | rotor | x | y | yaw reaction |
/// |-------|---|---|--------------|
/// | 0     | + | + | -            |
/// | 1     | + | - | +            |
/// | 2     | - | - | -            |
/// | 3     | - | + | +            |
pub struct QuadrotorPlant {
    params: PlantParams,
    state: State,
    controls: [f64; 4],
    time: f64,
    frames: u64,
}

impl QuadrotorPlant {
    pub fn new(params: PlantParams) -> Self {
        let state = params.initial;
        Self {
            params,
            state,
            controls: [0.0; 4],
            time: 0.0,
            frames: 0,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Commands after range limiting.
    pub fn controls(&self) -> [f64; 4] {
        self.controls
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Body-frame force and torque produced by the current commands.
    pub fn wrench(&self) -> (Vector3<f64>, Vector3<f64>) {
        let [f0, f1, f2, f3] = self.controls;
        let l = self.params.rotor_offset;

        let thrust = f0 + f1 + f2 + f3;
        // τ = Σ rᵢ × (0, 0, Fᵢ) = (yᵢ Fᵢ, -xᵢ Fᵢ, 0)
        let roll = l * (f0 - f1 - f2 + f3);
        let pitch = -l * (f0 + f1 - f2 - f3);
        let yaw = self.params.yaw_drag * (-f0 + f1 - f2 + f3);

        (Vector3::new(0.0, 0.0, thrust), Vector3::new(roll, pitch, yaw))
    }

    fn enforce_floor(&mut self) {
        if self.state.position_z < 0.0 {
            self.state.position_z = 0.0;
            self.state.velocity_z = self.state.velocity_z.max(0.0);
        }
    }
}

impl Simulator for QuadrotorPlant {
    fn body_pose(&self, body: &str) -> Result<Pose> {
        if body != self.params.body {
            return Err(Error::UnknownBody(body.to_string()));
        }
        Ok(Pose {
            rotation: rotation_from_euler(self.state.roll, self.state.pitch, self.state.yaw),
            com: self.state.position(),
        })
    }

    fn set_controls(&mut self, controls: &[f64; 4]) -> Result<()> {
        if controls.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteCommand {
                commands: *controls,
            });
        }

        let (lo, hi) = self.params.ctrl_range;
        for (slot, value) in self.controls.iter_mut().zip(controls) {
            *slot = value.clamp(lo, hi);
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let (forces, torques) = self.wrench();
        let t0 = self.time;
        let t1 = t0 + self.params.dt;

        let next = simulate_drone(
            self.state,
            self.params.consts,
            forces,
            torques,
            (t0, t1),
            self.params.tolerance,
        )?;

        self.state = next;
        self.time = t1;
        self.enforce_floor();
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        self.frames += 1;
        tracing::trace!(
            frame = self.frames,
            t = self.time,
            z = self.state.position_z,
            roll = self.state.roll,
            pitch = self.state.pitch,
            yaw = self.state.yaw,
            "render"
        );
        Ok(())
    }

    fn timestep(&self) -> f64 {
        self.params.dt
    }
}
