// Tachometer motor with an optional gear train
//
// All positions and speeds are expressed at the gear train output, in degrees
// and degrees per second. The gear ratio is the gear-down factor:
//
//              teeth on the output gear
// gear_ratio = ------------------------------
//              teeth on the gear on the motor
//
// so output degrees = motor degrees / gear_ratio. Reads divide by the ratio,
// writes multiply by it.

use std::fmt;

use tracing::{debug, info};

use crate::config::MotorConfig;
use crate::device::{Access, AttributeChannel, Device, DeviceBus, DeviceClass};
use crate::error::{Error, Result};
use crate::wait::{Wait, WaitOutcome};

/// Values accepted by the `command` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    RunForever,
    RunDirect,
    RunToAbsPos,
    Stop,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Reset => "reset",
            Command::RunForever => "run-forever",
            Command::RunDirect => "run-direct",
            Command::RunToAbsPos => "run-to-abs-pos",
            Command::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
    Inversed,
}

impl Polarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Normal => "normal",
            Polarity::Inversed => "inversed",
        }
    }
}

/// Flags reported by the `state` attribute, e.g. `running stalled`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotorState {
    flags: Vec<String>,
}

impl MotorState {
    pub fn parse(raw: &str) -> Self {
        let flags = raw
            .split_whitespace()
            .filter(|flag| *flag != "n/a")
            .map(str::to_string)
            .collect();
        Self { flags }
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn is_running(&self) -> bool {
        self.contains("running")
    }

    pub fn is_stalled(&self) -> bool {
        self.contains("stalled")
    }

    pub fn is_holding(&self) -> bool {
        self.contains("holding")
    }

    pub fn is_ramping(&self) -> bool {
        self.contains("ramping")
    }

    pub fn is_overloaded(&self) -> bool {
        self.contains("overloaded")
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }
}

#[derive(Debug)]
pub struct Motor {
    device: Device,
    position: AttributeChannel,
    speed: AttributeChannel,
    speed_sp: AttributeChannel,
    duty_cycle_sp: AttributeChannel,
    position_sp: AttributeChannel,
    polarity: AttributeChannel,
    command: AttributeChannel,
    state: AttributeChannel,
    gear_ratio: f64,
    setpoint_tolerance: f64,
    rated_max_speed: i64,
    // Output frame, deg/s
    max_speed: f64,
}

impl Motor {
    /// Open the motor on `port`, reset it and apply `config`
    pub fn new(bus: &dyn DeviceBus, port: &str, config: &MotorConfig) -> Result<Self> {
        if !(config.gear_ratio.is_finite() && config.gear_ratio > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "gear ratio must be positive, got {}",
                config.gear_ratio
            )));
        }
        if !(config.setpoint_tolerance >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "setpoint tolerance must not be negative, got {}",
                config.setpoint_tolerance
            )));
        }
        if let Some(max) = config.max_speed {
            if !(max > 0.0) {
                return Err(Error::InvalidParameter(format!(
                    "max speed must be positive, got {}",
                    max
                )));
            }
        }

        let device = Device::new(bus, DeviceClass::TachoMotor, port)?;

        // Open files once for fast reading and writing
        let mut motor = Self {
            position: device.open(bus, "position", Access::ReadWrite)?,
            speed: device.open(bus, "speed", Access::Read)?,
            speed_sp: device.open(bus, "speed_sp", Access::Write)?,
            duty_cycle_sp: device.open(bus, "duty_cycle_sp", Access::Write)?,
            position_sp: device.open(bus, "position_sp", Access::Write)?,
            polarity: device.open(bus, "polarity", Access::Write)?,
            command: device.open(bus, "command", Access::Write)?,
            state: device.open(bus, "state", Access::Read)?,
            device,
            gear_ratio: config.gear_ratio,
            setpoint_tolerance: config.setpoint_tolerance,
            rated_max_speed: 0,
            max_speed: 0.0,
        };

        motor.reset_all_settings()?;
        let polarity = if config.inverse_polarity {
            Polarity::Inversed
        } else {
            Polarity::Normal
        };
        motor.set_polarity(polarity)?;

        motor.rated_max_speed = motor
            .device
            .open(bus, "max_speed", Access::Read)?
            .read_int()?;
        if motor.rated_max_speed <= 0 {
            return Err(Error::InvalidParameter(format!(
                "driver reports max speed {} on {}",
                motor.rated_max_speed, port
            )));
        }
        motor.max_speed = motor.rated_max_speed as f64 / motor.gear_ratio;
        if let Some(user_max) = config.max_speed {
            motor.max_speed = motor.max_speed.min(user_max);
        }

        info!(
            "Motor on {} ready: gear ratio {}, max speed {:.1} deg/s, polarity {}",
            port,
            motor.gear_ratio,
            motor.max_speed,
            polarity.as_str()
        );
        Ok(motor)
    }

    /// Output position in degrees
    pub fn position(&mut self) -> Result<f64> {
        Ok(self.position.read_int()? as f64 / self.gear_ratio)
    }

    /// Estimated output speed in degrees per second
    pub fn speed(&mut self) -> Result<f64> {
        Ok(self.speed.read_int()? as f64 / self.gear_ratio)
    }

    /// Clamp an output speed to ±max_speed
    pub fn limit(&self, speed: f64) -> f64 {
        speed.clamp(-self.max_speed, self.max_speed)
    }

    /// Run at `speed` deg/s until told otherwise
    pub fn run(&mut self, speed: f64) -> Result<()> {
        let raw = self.speed_to_raw(self.limit(speed));
        debug!("Motor {} run at {} (raw)", self.port(), raw);
        self.speed_sp.write_int(raw)?;
        self.send(Command::RunForever)
    }

    /// Set the duty cycle in percent. Takes effect once duty mode is active.
    pub fn duty(&mut self, duty: i64) -> Result<()> {
        self.duty_cycle_sp.write_duty(duty)
    }

    pub fn activate_duty_mode(&mut self) -> Result<()> {
        self.send(Command::RunDirect)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Restore driver defaults; also zeroes the encoder
    pub fn reset_all_settings(&mut self) -> Result<()> {
        self.send(Command::Reset)
    }

    pub fn set_polarity(&mut self, polarity: Polarity) -> Result<()> {
        self.polarity.write_str(polarity.as_str())
    }

    /// Overwrite the encoder so the output currently reads `degrees`
    pub fn set_position(&mut self, degrees: f64) -> Result<()> {
        let raw = self.position_to_raw(degrees);
        info!("Motor {} position set to {} deg", self.port(), degrees);
        self.position.write_int(raw)
    }

    /// Fresh state snapshot; never cached since the firmware changes it
    pub fn state(&mut self) -> Result<MotorState> {
        Ok(MotorState::parse(&self.state.read_str()?))
    }

    pub fn running(&mut self) -> Result<bool> {
        Ok(self.state()?.is_running())
    }

    pub fn stalled(&mut self) -> Result<bool> {
        Ok(self.state()?.is_stalled())
    }

    /// True when the output is within ±tolerance of `target` (inclusive)
    pub fn at_target(&mut self, target: f64) -> Result<bool> {
        let position = self.position()?;
        let tolerance = self.setpoint_tolerance;
        Ok((target - tolerance..=target + tolerance).contains(&position))
    }

    /// Move to `target` degrees at `speed` deg/s.
    ///
    /// Does nothing if the motor is already running or already at the target,
    /// so calling it repeatedly while a move is in flight is harmless.
    /// Returns whether a move was started.
    pub fn go_to(&mut self, target: f64, speed: f64, wait: bool) -> Result<bool> {
        if self.running()? || self.at_target(target)? {
            return Ok(false);
        }

        let position_raw = self.position_to_raw(target);
        let speed_raw = self.speed_to_raw(self.limit(speed).abs());
        debug!(
            "Motor {} go to {} deg (raw {}) at raw speed {}",
            self.port(),
            target,
            position_raw,
            speed_raw
        );
        self.position_sp.write_int(position_raw)?;
        self.speed_sp.write_int(speed_raw)?;
        self.send(Command::RunToAbsPos)?;

        if wait {
            self.wait_while_running()?;
        }
        Ok(true)
    }

    pub fn wait_for_stalled(&mut self) -> Result<()> {
        self.wait_for_stalled_with(&Wait::forever()).map(|_| ())
    }

    pub fn wait_for_stalled_with(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        wait.poll_until(|| self.stalled())
    }

    /// Block until the motor reports it has started running
    pub fn wait_for_running(&mut self) -> Result<()> {
        self.wait_for_running_with(&Wait::forever()).map(|_| ())
    }

    pub fn wait_for_running_with(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        wait.poll_until(|| self.running())
    }

    /// Block until the `running` flag clears
    pub fn wait_while_running(&mut self) -> Result<()> {
        self.wait_while_running_with(&Wait::forever()).map(|_| ())
    }

    pub fn wait_while_running_with(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        wait.poll_until(|| Ok(!self.running()?))
    }

    pub fn port(&self) -> &str {
        self.device.port()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn gear_ratio(&self) -> f64 {
        self.gear_ratio
    }

    pub fn setpoint_tolerance(&self) -> f64 {
        self.setpoint_tolerance
    }

    /// Rated speed of the bare motor in motor deg/s, as reported by the driver
    pub fn rated_max_speed(&self) -> i64 {
        self.rated_max_speed
    }

    /// Speed limit at the output in deg/s
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    fn send(&mut self, command: Command) -> Result<()> {
        self.command.write_str(command.as_str())
    }

    // Truncates toward zero so a clamped speed never grows past the limit
    fn speed_to_raw(&self, speed: f64) -> i64 {
        (speed * self.gear_ratio) as i64
    }

    fn position_to_raw(&self, degrees: f64) -> i64 {
        (degrees * self.gear_ratio).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedBus;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn motor_with(bus: &SimulatedBus, gear_ratio: f64, max_speed: Option<f64>) -> Motor {
        let config = MotorConfig {
            gear_ratio,
            max_speed,
            ..Default::default()
        };
        Motor::new(bus, "outA", &config).unwrap()
    }

    fn raw(bus: &SimulatedBus, attribute: &str) -> i64 {
        bus.value("outA", attribute).unwrap().parse().unwrap()
    }

    #[test]
    fn test_construction_resets_and_sets_polarity() {
        let bus = SimulatedBus::ev3();
        let config = MotorConfig {
            inverse_polarity: true,
            ..Default::default()
        };
        let motor = Motor::new(&bus, "outA", &config).unwrap();
        assert_eq!(bus.writes("outA", "command"), vec!["reset"]);
        assert_eq!(bus.writes("outA", "polarity"), vec!["inversed"]);
        assert_eq!(motor.rated_max_speed(), 1560);
        assert_eq!(motor.port(), "outA");
    }

    #[test]
    fn test_missing_motor_not_attached() {
        let bus = SimulatedBus::new();
        let result = Motor::new(&bus, "outA", &MotorConfig::default());
        assert!(matches!(result, Err(Error::NotAttached { .. })));
    }

    #[test]
    fn test_rejects_non_positive_gear_ratio() {
        let bus = SimulatedBus::ev3();
        for gear_ratio in [0.0, -2.0, f64::NAN] {
            let config = MotorConfig {
                gear_ratio,
                ..Default::default()
            };
            assert!(matches!(
                Motor::new(&bus, "outA", &config),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_rejects_non_positive_rated_speed() {
        let bus = SimulatedBus::ev3();
        for rated in ["0", "-1560"] {
            bus.set("outA", "max_speed", rated);
            assert!(matches!(
                Motor::new(&bus, "outA", &MotorConfig::default()),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_max_speed_is_min_of_rated_and_user() {
        let bus = SimulatedBus::ev3();
        assert_relative_eq!(motor_with(&bus, 3.0, None).max_speed(), 520.0);
        assert_relative_eq!(motor_with(&bus, 3.0, Some(200.0)).max_speed(), 200.0);
        assert_relative_eq!(motor_with(&bus, 3.0, Some(900.0)).max_speed(), 520.0);
        assert_relative_eq!(motor_with(&bus, 0.5, None).max_speed(), 3120.0);
    }

    #[test]
    fn test_run_clamps_setpoint() {
        let bus = SimulatedBus::ev3();
        for gear_ratio in [0.5, 1.0, 3.0, 7.0] {
            let mut motor = motor_with(&bus, gear_ratio, Some(400.0));
            let limit = motor.max_speed() * gear_ratio;
            for speed in [-1.0e6, -401.0, -12.5, 0.0, 99.9, 400.0, 1.0e6] {
                motor.run(speed).unwrap();
                let written = raw(&bus, "speed_sp");
                assert!(
                    (written.abs() as f64) <= limit,
                    "ratio {} speed {} wrote {}",
                    gear_ratio,
                    speed,
                    written
                );
            }
        }
        assert_eq!(bus.value("outA", "command").unwrap(), "run-forever");
    }

    #[test]
    fn test_run_scales_by_gear_ratio() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 3.0, None);
        motor.run(-100.0).unwrap();
        assert_eq!(raw(&bus, "speed_sp"), -300);
    }

    #[test]
    fn test_position_round_trip() {
        let bus = SimulatedBus::ev3();
        for gear_ratio in [0.5, 1.0, 2.0, 3.0, 12.0] {
            let mut motor = motor_with(&bus, gear_ratio, None);
            for target in [-720.0, -90.0, 0.0, 36.0, 250.0] {
                bus.set("outA", "state", "");
                bus.set("outA", "position", "100000");
                assert!(motor.go_to(target, 100.0, false).unwrap());
                // Firmware reaches the setpoint
                let reached = bus.value("outA", "position_sp").unwrap();
                bus.set("outA", "position", &reached);
                assert_relative_eq!(motor.position().unwrap(), target);
            }
        }
    }

    #[test]
    fn test_speed_reading_scaled() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 4.0, None);
        bus.set("outA", "speed", "-600");
        assert_relative_eq!(motor.speed().unwrap(), -150.0);
    }

    #[test]
    fn test_at_target_inclusive_bounds() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 1.0, None);
        for (position, expected) in [
            ("95", true),
            ("105", true),
            ("100", true),
            ("94", false),
            ("106", false),
        ] {
            bus.set("outA", "position", position);
            assert_eq!(motor.at_target(100.0).unwrap(), expected, "position {}", position);
        }
    }

    #[test]
    fn test_go_to_writes_setpoints() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 2.0, None);
        assert!(motor.go_to(90.0, -150.0, false).unwrap());
        assert_eq!(raw(&bus, "position_sp"), 180);
        assert_eq!(raw(&bus, "speed_sp"), 300);
        assert_eq!(bus.value("outA", "command").unwrap(), "run-to-abs-pos");
    }

    #[test]
    fn test_go_to_ignored_while_running() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 1.0, None);
        assert!(motor.go_to(360.0, 200.0, false).unwrap());
        bus.set("outA", "state", "running");
        assert!(!motor.go_to(-360.0, 500.0, false).unwrap());

        assert_eq!(bus.writes("outA", "position_sp"), vec!["360"]);
        assert_eq!(bus.writes("outA", "speed_sp"), vec!["200"]);
    }

    #[test]
    fn test_go_to_skipped_at_target() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 1.0, None);
        bus.set("outA", "position", "3");
        assert!(!motor.go_to(0.0, 200.0, false).unwrap());
        assert!(bus.writes("outA", "position_sp").is_empty());
    }

    #[test]
    fn test_go_to_wait_polls_until_idle() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 1.0, None);
        // not running, then running for a while, then holding
        bus.script("outA", "state", &["", "running", "running", "running", "holding"]);
        assert!(motor.go_to(45.0, 100.0, true).unwrap());
        assert!(!motor.running().unwrap());
        assert!(motor.state().unwrap().is_holding());
    }

    #[test]
    fn test_duty_mode() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 1.0, None);
        motor.activate_duty_mode().unwrap();
        motor.duty(55).unwrap();
        motor.duty(-300).unwrap();
        assert_eq!(bus.writes("outA", "duty_cycle_sp"), vec!["55", "-100"]);
        assert_eq!(bus.value("outA", "command").unwrap(), "run-direct");
    }

    #[test]
    fn test_wait_for_stalled() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 1.0, None);
        bus.script("outA", "state", &["running", "running", "running stalled"]);
        motor.wait_for_stalled().unwrap();
        assert!(motor.stalled().unwrap());
    }

    #[test]
    fn test_wait_for_stalled_times_out() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 1.0, None);
        bus.set("outA", "state", "running");
        let wait = Wait::forever().with_timeout(Duration::from_millis(5));
        assert_eq!(
            motor.wait_for_stalled_with(&wait).unwrap(),
            WaitOutcome::TimedOut
        );
    }

    #[test]
    fn test_set_position_scaled() {
        let bus = SimulatedBus::ev3();
        let mut motor = motor_with(&bus, 5.0, None);
        motor.set_position(-30.0).unwrap();
        assert_eq!(raw(&bus, "position"), -150);
        assert_relative_eq!(motor.position().unwrap(), -30.0);
    }

    #[test]
    fn test_state_parsing() {
        assert_eq!(MotorState::parse("n/a"), MotorState::default());
        let state = MotorState::parse("running stalled\n");
        assert!(state.is_running() && state.is_stalled());
        assert!(!state.is_holding());
        assert_eq!(state.flags(), ["running", "stalled"]);
    }
}
