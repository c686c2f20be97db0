use clap::Parser;
use quad_pid::config::Config;
use quad_pid::control::AttitudeAltitudeController;
use quad_pid::dynamics::{PlantParams, QuadrotorPlant};
use quad_pid::scene::quadrotor_mjcf;
use quad_pid::sim::{run, LogObserver, SMOKE_TEST_TICKS};
use std::path::PathBuf;
use std::process::ExitCode;

/// Environment flag that turns the endless loop into a short smoke test.
const TESTING_ENV: &str = "TESTING";

/// Hover a quadrotor at a fixed altitude with a PD controller.
///
/// Runs until interrupted. With `TESTING` set in the environment it stops
/// after 101 ticks.
#[derive(Parser, Debug)]
#[command(name = "quad-pid", version, about)]
struct Cli {
    /// TOML file overriding the default gains and constants
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop after this many ticks (takes precedence over TESTING)
    #[arg(long, value_name = "N")]
    max_ticks: Option<u64>,

    /// Print the MJCF scene for an external engine and exit
    #[arg(long)]
    emit_scene: bool,
}

fn tick_budget(cli_max: Option<u64>, testing: bool) -> Option<u64> {
    cli_max.or(testing.then_some(SMOKE_TEST_TICKS))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quad_pid=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match fly(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn fly(cli: &Cli) -> quad_pid::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if cli.emit_scene {
        print!("{}", quadrotor_mjcf(config.dt, config.gravity));
        return Ok(());
    }

    let max_ticks = tick_budget(cli.max_ticks, std::env::var_os(TESTING_ENV).is_some());
    tracing::info!(
        dt = config.dt,
        mass = config.mass,
        setpoint = ?config.setpoint,
        compensation = ?config.altitude_compensation,
        "starting control loop ({})",
        match max_ticks {
            Some(n) => format!("{} ticks", n),
            None => "until interrupted".to_string(),
        }
    );

    let mut controller = AttitudeAltitudeController::from_config(&config)?;
    let mut plant = QuadrotorPlant::new(PlantParams::from_config(&config));

    let summary = run(
        &mut controller,
        &mut plant,
        &config.body,
        &mut LogObserver,
        max_ticks,
    )?;

    let state = plant.state();
    tracing::info!(
        ticks = summary.ticks,
        t = plant.time(),
        z = state.position_z,
        "control loop finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_budget() {
        assert_eq!(tick_budget(None, false), None);
        assert_eq!(tick_budget(None, true), Some(SMOKE_TEST_TICKS));
        assert_eq!(tick_budget(Some(5), true), Some(5));
        assert_eq!(tick_budget(Some(5), false), Some(5));
    }

    #[test]
    fn test_cli_parses() {
        let cli =
            Cli::try_parse_from(["quad-pid", "--max-ticks", "10", "-c", "gains.toml"]).unwrap();
        assert_eq!(cli.max_ticks, Some(10));
        assert_eq!(cli.config, Some(PathBuf::from("gains.toml")));
        assert!(!cli.emit_scene);
    }
}
