use nalgebra::{Matrix3, Rotation3};

/// Roll, pitch and yaw in radians (aerospace ZYX convention).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Decomposes a body-to-world rotation matrix into roll, pitch and yaw.
///
/// The matrix is assumed to be `R = Rz(yaw) * Ry(pitch) * Rx(roll)`:
///
/// - yaw   = atan2(R10, R00)
/// - pitch = atan2(-R20, sqrt(R21² + R22²))
/// - roll  = atan2(R21, R22)
///
/// Pitch stays within [-π/2, π/2]. At pitch = ±π/2 (gimbal lock) roll and yaw
/// are no longer separable and the returned split between them is arbitrary.
/// A matrix holding NaN yields NaN angles; they are not checked here.
pub fn euler_from_rotation(r: &Matrix3<f64>) -> EulerAngles {
    let yaw = r[(1, 0)].atan2(r[(0, 0)]);
    let pitch = (-r[(2, 0)]).atan2((r[(2, 1)].powi(2) + r[(2, 2)].powi(2)).sqrt());
    let roll = r[(2, 1)].atan2(r[(2, 2)]);

    EulerAngles { roll, pitch, yaw }
}

/// Builds `Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn rotation_from_euler(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    Rotation3::from_euler_angles(roll, pitch, yaw).into_inner()
}
