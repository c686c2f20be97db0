/// Renders the MJCF scene with the given timestep (s) and gravity (m/s², pointing down).
///
/// The `quadrotor` body carries a core box, four arms, four thruster discs and
/// four motor sites at `(±0.1, ±0.1, 0.01)`. Each site drives a motor
/// actuator limited to `[0, 10]` whose gear points along the site z axis.
/// Actuator `i` is the rotor `i` of the mixing matrix.
pub fn quadrotor_mjcf(timestep: f64, gravity: f64) -> String {
    format!(
        r#"<mujoco model="quadrotor0">
    <compiler inertiafromgeom="true" coordinate="local"/>
    <option timestep="{timestep}" gravity="0 0 -{gravity}" density="1" viscosity="1e-5"/>
    <worldbody>
        <geom name="floor" pos="0 0 0" size="2 2 .2" type="plane" conaffinity="1" rgba="1 1 1 1" condim="3"/>
        <body name="quadrotor" pos="0 0 0">
            <geom name="core" type="box" pos="0 0 0" quat="1 0 0 0" size="0.06 0.035 0.025" rgba="0.3 0.3 0.8 1" mass=".1"/>

            <geom name="a00" type="box" pos=".071 0.071 0.0" size="0.05 0.01 0.0025" quat=".924 0.0 0.0 0.383" rgba="0.3 0.3 0.8 1" mass=".025"/>
            <geom name="a10" type="box" pos=".071 -0.071 0.0" size="0.05 0.01 0.0025" quat=".383 0.0 0.0 0.924" rgba="0.3 0.3 0.8 1" mass=".025"/>
            <geom name="a20" type="box" pos="-0.071 -0.071 0.0" size="0.05 0.01 0.0025" quat="-.383 0.0 0.0 0.924" rgba="0.3 0.3 0.8 1" mass=".025"/>
            <geom name="a30" type="box" pos="-.071 0.071 0.0" size="0.05 0.01 0.0025" quat=".924 0.0 0.0 -0.383" rgba="0.3 0.3 0.8 1" mass=".025"/>

            <joint name="root" type="free" damping="0" armature="0" pos="0 0 0"/>

            <site name="motor0" type="cylinder" pos=" 0.1  0.1 0.01" size="0.01 0.0025" quat="1 0 0 0" rgba="0.3 0.8 0.3 1"/>
            <site name="motor1" type="cylinder" pos=" 0.1 -0.1 0.01" size="0.01 0.0025" quat="1 0 0 0" rgba="0.3 0.8 0.3 1"/>
            <site name="motor2" type="cylinder" pos="-0.1 -0.1 0.01" size="0.01 0.0025" quat="1 0 0 0" rgba="0.3 0.8 0.3 1"/>
            <site name="motor3" type="cylinder" pos="-0.1  0.1 0.01" size="0.01 0.0025" quat="1 0 0 0" rgba="0.3 0.8 0.3 1"/>

            <geom name="thruster0" type="cylinder" pos=" 0.1  0.1 0.01" size="0.05 0.0025" quat="1 0 0 0" rgba="0.3 0.8 0.3 1" mass=".025"/>
            <geom name="thruster1" type="cylinder" pos=" 0.1 -0.1 0.01" size="0.05 0.0025" quat="1 0 0 0" rgba="0.3 0.8 0.3 1" mass=".025"/>
            <geom name="thruster2" type="cylinder" pos="-0.1 -0.1 0.01" size="0.05 0.0025" quat="1 0 0 0" rgba="0.3 0.8 0.3 1" mass=".025"/>
            <geom name="thruster3" type="cylinder" pos="-0.1  0.1 0.01" size="0.05 0.0025" quat="1 0 0 0" rgba="0.3 0.8 0.3 1" mass=".025"/>

            <site name="qcX" type="box" pos="0.1 0.0 0.0" size="0.1 0.005 0.005" quat="1 0 0 0" rgba="1 0 0 1"/>
            <site name="qcY" type="box" pos="0.0 0.1 0.0" size="0.1 0.005 0.005" quat="0.707 0 0 0.707" rgba="0 1 0 1"/>
            <site name="qcZ" type="box" pos="0.0 0.0 0.1" size="0.1 0.005 0.005" quat="-0.707 0 0.707 0" rgba="0 0 1 1"/>
        </body>
    </worldbody>
    <actuator>
        <motor ctrllimited="true" ctrlrange="0.0 10.0" gear="0 0 1 0 0 0" site="motor0"/>
        <motor ctrllimited="true" ctrlrange="0.0 10.0" gear="0 0 1 0 0 0" site="motor1"/>
        <motor ctrllimited="true" ctrlrange="0.0 10.0" gear="0 0 1 0 0 0" site="motor2"/>
        <motor ctrllimited="true" ctrlrange="0.0 10.0" gear="0 0 1 0 0 0" site="motor3"/>
    </actuator>
</mujoco>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestep_and_gravity_are_substituted() {
        let xml = quadrotor_mjcf(0.001, 9.81);
        assert!(xml.contains(r#"timestep="0.001""#));
        assert!(xml.contains(r#"gravity="0 0 -9.81""#));
    }

    #[test]
    fn test_four_limited_motors() {
        let xml = quadrotor_mjcf(0.001, 9.81);
        assert_eq!(xml.matches("<motor ").count(), 4);
        assert_eq!(xml.matches(r#"ctrlrange="0.0 10.0""#).count(), 4);
        for i in 0..4 {
            assert!(xml.contains(&format!(r#"site="motor{}""#, i)));
        }
        assert!(xml.contains(r#"<body name="quadrotor""#));
    }
}
