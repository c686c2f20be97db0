use crate::attitude::euler_from_rotation;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sim::Pose;
use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

/// Index of each channel in the state, error and control vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Altitude = 0,
    Roll = 1,
    Pitch = 2,
    Yaw = 3,
}

/// How the weight of the vehicle is folded into the altitude channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AltitudeCompensation {
    /// `u0 = u0 + (u0 + m * g)`: the PD term is counted twice on top of the
    /// weight. This is the tuning the stock gains were chosen against.
    #[default]
    Doubled,
    /// `u0 = u0 + m * g`: plain feed-forward weight compensation.
    WeightOnly,
}

impl AltitudeCompensation {
    fn apply(self, u0: f64, weight: f64) -> f64 {
        match self {
            AltitudeCompensation::Doubled => u0 + (u0 + weight),
            AltitudeCompensation::WeightOnly => u0 + weight,
        }
    }
}

/// Diagonal PD gains, one entry per [altitude, roll, pitch, yaw].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gains {
    pub kp: [f64; 4],
    pub kd: [f64; 4],
}

impl Gains {
    /// All-zero gains. The controller then outputs the weight compensation
    /// alone, whatever the pose.
    pub fn zero() -> Self {
        Self {
            kp: [0.0; 4],
            kd: [0.0; 4],
        }
    }

    /// Proportional gain matrix.
    ///
    /// # Returns
    ///
    /// `K_p = diag(kp)`, zero off the diagonal so each channel only sees its
    /// own error.
    ///
    /// # Example
    ///
    /// let gains = Gains { kp: [1.5, 0.1, 0.1, 0.1], kd: [0.0; 4] };
    /// assert_eq!(gains.kp_matrix()[(0, 0)], 1.5);
    /// assert_eq!(gains.kp_matrix()[(0, 1)], 0.0);
    pub fn kp_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_diagonal(&Vector4::from(self.kp))
    }

    /// Derivative gain matrix `K_d = diag(kd)`.
    pub fn kd_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_diagonal(&Vector4::from(self.kd))
    }
}

/// Builds the rotor mixing matrix `C_R` for an X-frame quadrotor.
///
/// Maps `u = [thrust, roll torque, pitch torque, yaw torque]` to the four
/// rotor thrusts `F = C_R * u`. Rotor order matches the motor sites:
///
/// ```text
///   F3 (-,+)     F0 (+,+)
///          \    /
///           \  /   +X
///           /  \
///          /    \
///   F2 (-,-)     F1 (+,-)
/// ```
///
/// # Arguments
///
/// * `arm_length` - Moment arm L of each rotor about the roll and pitch axes (m)
/// * `yaw_drag` - Reaction torque per unit thrust C
pub fn rotor_mixing_matrix(arm_length: f64, yaw_drag: f64) -> Matrix4<f64> {
    let a = 0.25;
    let b = 1.0 / (4.0 * arm_length);
    let c = 1.0 / (4.0 * yaw_drag);

    Matrix4::new(
        a, b, -b, -c, //
        a, -b, -b, c, //
        a, -b, b, -c, //
        a, b, b, c,
    )
}

/// PD control law with weight compensation on the altitude channel.
///
/// `u = K_p * e + K_d * e_dot`, then `u[0]` is adjusted by `compensation`.
///
/// # Arguments
///
/// * `weight` - Static weight `m * g` of the vehicle (N)
pub fn control_law(
    kp: &Matrix4<f64>,
    kd: &Matrix4<f64>,
    error: &Vector4<f64>,
    error_rate: &Vector4<f64>,
    weight: f64,
    compensation: AltitudeCompensation,
) -> Vector4<f64> {
    let mut u = kp * error + kd * error_rate;
    u[Axis::Altitude as usize] = compensation.apply(u[Axis::Altitude as usize], weight);
    u
}

/// Forms `[altitude, roll, pitch, yaw]` from a body pose.
pub fn state_vector(pose: &Pose) -> Vector4<f64> {
    let angles = euler_from_rotation(&pose.rotation);
    Vector4::new(pose.com.z, angles.roll, angles.pitch, angles.yaw)
}

/// Everything computed during one control tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlStep {
    /// Measured [altitude, roll, pitch, yaw]
    pub state: Vector4<f64>,
    /// `setpoint - state`
    pub error: Vector4<f64>,
    /// Backward difference of the error over one tick
    pub error_rate: Vector4<f64>,
    /// Control vector `u` before mixing
    pub control: Vector4<f64>,
    /// Rotor thrust commands `F = C_R * u`
    pub thrusts: Vector4<f64>,
}

/// Fixed-gain PD controller holding a quadrotor at a constant altitude and
/// level attitude.
///
/// The only state carried between ticks is the previous error, used for the
/// backward-difference derivative. It starts at zero, so the first tick sees
/// `e_dot = e / dt`. That kick is expected and not treated as a fault.
pub struct AttitudeAltitudeController {
    /// Control loop time step (seconds)
    dt: f64,
    /// Mass used for weight compensation (kg)
    mass: f64,
    /// Gravitational acceleration (m/s²)
    gravity: f64,
    /// Desired [altitude, roll, pitch, yaw]
    setpoint: Vector4<f64>,
    kp: Matrix4<f64>,
    kd: Matrix4<f64>,
    /// Rotor mixing matrix C_R
    mixer: Matrix4<f64>,
    compensation: AltitudeCompensation,
    last_error: Vector4<f64>,
}

impl AttitudeAltitudeController {
    /// Creates a controller.
    ///
    /// # Arguments
    ///
    /// * `dt` - Control loop time step in seconds, equal to the simulator step
    /// * `mass` - Vehicle mass in kg
    /// * `gravity` - Gravitational acceleration in m/s²
    /// * `setpoint` - Desired [altitude, roll, pitch, yaw]
    /// * `gains` - Diagonal PD gains
    /// * `mixer` - Rotor mixing matrix, usually from [`rotor_mixing_matrix`]
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if `dt` is not a positive finite number. The
    /// derivative divides by it.
    pub fn new(
        dt: f64,
        mass: f64,
        gravity: f64,
        setpoint: Vector4<f64>,
        gains: Gains,
        mixer: Matrix4<f64>,
    ) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "controller dt must be positive, got {}",
                dt
            )));
        }

        Ok(Self {
            dt,
            mass,
            gravity,
            setpoint,
            kp: gains.kp_matrix(),
            kd: gains.kd_matrix(),
            mixer,
            compensation: AltitudeCompensation::default(),
            last_error: Vector4::zeros(),
        })
    }

    /// Builds the controller from a loaded [`Config`], mixing matrix included.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.dt,
            config.mass,
            config.gravity,
            Vector4::from(config.setpoint),
            Gains {
                kp: config.kp,
                kd: config.kd,
            },
            rotor_mixing_matrix(config.arm_length, config.yaw_drag),
        )?
        .with_compensation(config.altitude_compensation))
    }

    pub fn with_compensation(mut self, compensation: AltitudeCompensation) -> Self {
        self.compensation = compensation;
        self
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn setpoint(&self) -> Vector4<f64> {
        self.setpoint
    }

    pub fn mixer(&self) -> &Matrix4<f64> {
        &self.mixer
    }

    pub fn last_error(&self) -> Vector4<f64> {
        self.last_error
    }

    /// Static weight `m * g` added on the altitude channel.
    pub fn weight(&self) -> f64 {
        self.mass * self.gravity
    }

    /// Forgets the previous error, so the next tick is a cold start again.
    pub fn reset(&mut self) {
        self.last_error = Vector4::zeros();
    }

    /// Runs one control tick against the current body pose.
    ///
    /// 1. Decompose orientation into roll/pitch/yaw and form the state vector
    /// 2. `e = setpoint - state`, `e_dot = (e - e_last) / dt`
    /// 3. `u = K_p * e + K_d * e_dot` with weight compensation on `u[0]`
    /// 4. `F = C_R * u`
    ///
    /// # Returns
    ///
    /// The full [`ControlStep`]; `thrusts` are the four actuator commands in
    /// rotor index order. Range limiting is left to the actuator sink.
    ///
    /// # Errors
    ///
    /// [`Error::NonFiniteState`] if the pose produces NaN or infinite angles
    /// or altitude. [`Error::NonFiniteCommand`] if the gains or mixer turn a
    /// finite state into NaN or infinite thrusts. The previous error is left
    /// untouched in both cases.
    pub fn update(&mut self, pose: &Pose) -> Result<ControlStep> {
        let state = state_vector(pose);
        if state.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteState {
                state: [state[0], state[1], state[2], state[3]],
            });
        }

        let error = self.setpoint - state;
        let error_rate = (error - self.last_error) / self.dt;

        let control = control_law(
            &self.kp,
            &self.kd,
            &error,
            &error_rate,
            self.weight(),
            self.compensation,
        );
        let thrusts = self.mixer * control;
        if control.iter().chain(thrusts.iter()).any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteCommand {
                commands: [thrusts[0], thrusts[1], thrusts[2], thrusts[3]],
            });
        }
        self.last_error = error;

        Ok(ControlStep {
            state,
            error,
            error_rate,
            control,
            thrusts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attitude::rotation_from_euler;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};

    fn level_pose(z: f64) -> Pose {
        Pose {
            rotation: Matrix3::identity(),
            com: Vector3::new(0.0, 0.0, z),
        }
    }

    fn default_controller() -> AttitudeAltitudeController {
        AttitudeAltitudeController::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_controller_creation() {
        let controller = default_controller();
        assert_eq!(controller.dt(), 0.001);
        assert_eq!(controller.setpoint(), Vector4::new(0.5, 0.0, 0.0, 0.0));
        assert_eq!(controller.last_error(), Vector4::zeros());
        assert_relative_eq!(controller.weight(), 0.3 * 9.81);
    }

    #[test]
    fn test_mixing_matrix_layout() {
        let controller = default_controller();
        let c_r = controller.mixer();
        assert_eq!(*c_r, rotor_mixing_matrix(0.1, 0.1));

        let expected = Matrix4::new(
            0.25, 2.5, -2.5, -2.5, //
            0.25, -2.5, -2.5, 2.5, //
            0.25, -2.5, 2.5, -2.5, //
            0.25, 2.5, 2.5, 2.5,
        );
        assert_relative_eq!(*c_r, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_pure_thrust_is_shared_equally() {
        let c_r = rotor_mixing_matrix(0.1, 0.1);
        let f = c_r * Vector4::new(2.0, 0.0, 0.0, 0.0);
        assert_eq!(f, Vector4::repeat(0.5));
    }

    #[test]
    fn test_at_setpoint_gives_weight_compensation_only() {
        let mut controller = default_controller();
        let step = controller.update(&level_pose(0.5)).unwrap();

        assert_eq!(step.error, Vector4::zeros());
        assert_eq!(step.error_rate, Vector4::zeros());
        assert_relative_eq!(step.control, Vector4::new(0.3 * 9.81, 0.0, 0.0, 0.0));
        assert_relative_eq!(
            step.thrusts,
            Vector4::repeat(0.25 * 0.3 * 9.81),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_first_tick_derivative_is_error_over_dt() {
        let mut controller = default_controller();
        let step = controller.update(&level_pose(0.0)).unwrap();

        assert_eq!(step.error, Vector4::new(0.5, 0.0, 0.0, 0.0));
        assert_eq!(step.error_rate, step.error / 0.001);
    }

    #[test]
    fn test_derivative_uses_previous_error() {
        let mut controller = default_controller();
        let pose_1 = Pose {
            rotation: rotation_from_euler(0.02, -0.01, 0.1),
            com: Vector3::new(0.0, 0.0, 0.1),
        };
        let pose_2 = Pose {
            rotation: rotation_from_euler(0.015, -0.012, 0.09),
            com: Vector3::new(0.0, 0.0, 0.12),
        };

        let e1 = controller.update(&pose_1).unwrap().error;
        let step = controller.update(&pose_2).unwrap();

        assert_eq!(step.error_rate, (step.error - e1) / 0.001);
        assert_eq!(controller.last_error(), step.error);
    }

    #[test]
    fn test_thrusts_follow_control_law() {
        let config = Config::default();
        let mut controller = default_controller();
        let pose = Pose {
            rotation: rotation_from_euler(0.05, 0.02, -0.3),
            com: Vector3::new(0.1, -0.2, 0.42),
        };

        let step = controller.update(&pose).unwrap();

        let gains = Gains {
            kp: config.kp,
            kd: config.kd,
        };
        let expected_u = control_law(
            &gains.kp_matrix(),
            &gains.kd_matrix(),
            &step.error,
            &step.error_rate,
            0.3 * 9.81,
            AltitudeCompensation::Doubled,
        );
        assert_eq!(step.control, expected_u);
        assert_eq!(step.thrusts, rotor_mixing_matrix(0.1, 0.1) * expected_u);
    }

    #[test]
    fn test_doubled_altitude_compensation() {
        let kp = Gains {
            kp: [4.0, 0.0, 0.0, 0.0],
            kd: [0.0; 4],
        }
        .kp_matrix();
        let e = Vector4::new(0.5, 0.0, 0.0, 0.0);
        let kd = Matrix4::zeros();
        let e_dot = Vector4::zeros();

        let doubled = control_law(&kp, &kd, &e, &e_dot, 3.0, AltitudeCompensation::Doubled);
        assert_relative_eq!(doubled[0], 2.0 * 2.0 + 3.0);

        let weight_only = control_law(&kp, &kd, &e, &e_dot, 3.0, AltitudeCompensation::WeightOnly);
        assert_relative_eq!(weight_only[0], 2.0 + 3.0);
    }

    #[test]
    fn test_zero_gains_give_fixed_point() {
        let mut controller = AttitudeAltitudeController::new(
            0.001,
            0.3,
            9.81,
            Vector4::new(0.5, 0.0, 0.0, 0.0),
            Gains::zero(),
            rotor_mixing_matrix(0.1, 0.1),
        )
        .unwrap();
        let expected = rotor_mixing_matrix(0.1, 0.1) * Vector4::new(0.3 * 9.81, 0.0, 0.0, 0.0);

        let poses = [
            level_pose(0.0),
            level_pose(2.0),
            Pose {
                rotation: rotation_from_euler(0.4, -0.3, 1.2),
                com: Vector3::new(1.0, 1.0, 0.7),
            },
        ];
        for pose in &poses {
            let step = controller.update(pose).unwrap();
            assert_eq!(step.control, Vector4::new(0.3 * 9.81, 0.0, 0.0, 0.0));
            assert_eq!(step.thrusts, expected);
        }
    }

    #[test]
    fn test_roll_error_produces_differential_thrust() {
        let mut controller = default_controller();
        let pose = Pose {
            rotation: rotation_from_euler(0.1, 0.0, 0.0),
            com: Vector3::new(0.0, 0.0, 0.5),
        };

        let step = controller.update(&pose).unwrap();

        // Positive roll: negative error, so the +y rotors (0 and 3) lose thrust.
        assert!(step.control[Axis::Roll as usize] < 0.0);
        assert!(step.thrusts[0] < step.thrusts[1]);
        assert!(step.thrusts[3] < step.thrusts[2]);
    }

    #[test]
    fn test_non_finite_pose_is_rejected() {
        let mut controller = default_controller();
        controller.update(&level_pose(0.2)).unwrap();
        let before = controller.last_error();

        let mut rotation = Matrix3::identity();
        rotation[(2, 1)] = f64::NAN;
        let err = controller
            .update(&Pose {
                rotation,
                com: Vector3::new(0.0, 0.0, 0.5),
            })
            .unwrap_err();

        assert!(matches!(err, Error::NonFiniteState { .. }));
        assert_eq!(controller.last_error(), before);
    }

    #[test]
    fn test_non_positive_dt_is_rejected() {
        for dt in [0.0, -0.001, f64::NAN] {
            let result = AttitudeAltitudeController::new(
                dt,
                0.3,
                9.81,
                Vector4::new(0.5, 0.0, 0.0, 0.0),
                Gains::zero(),
                rotor_mixing_matrix(0.1, 0.1),
            );
            assert!(
                matches!(result, Err(Error::InvalidConfig(_))),
                "dt = {} was accepted",
                dt
            );
        }
    }

    #[test]
    fn test_non_finite_command_is_rejected() {
        // inf * 0 at the setpoint makes u[0] NaN from a perfectly finite pose.
        let mut controller = AttitudeAltitudeController::new(
            0.001,
            0.3,
            9.81,
            Vector4::new(0.5, 0.0, 0.0, 0.0),
            Gains {
                kp: [f64::INFINITY, 0.0, 0.0, 0.0],
                kd: [0.0; 4],
            },
            rotor_mixing_matrix(0.1, 0.1),
        )
        .unwrap();
        let before = controller.last_error();

        let err = controller.update(&level_pose(0.5)).unwrap_err();

        match err {
            Error::NonFiniteCommand { commands } => {
                assert!(commands.iter().any(|f| f.is_nan()), "commands: {:?}", commands)
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(controller.last_error(), before);
    }

    #[test]
    fn test_reset_restores_cold_start() {
        let mut controller = default_controller();
        let first = controller.update(&level_pose(0.1)).unwrap();
        controller.update(&level_pose(0.2)).unwrap();

        controller.reset();
        let again = controller.update(&level_pose(0.1)).unwrap();
        assert_eq!(again, first);
    }
}
