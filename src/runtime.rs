// 50 Hz teleop loop with watchdog
// Note: if the command source dies and stops sending, the watchdog brings the
// drive base to a halt instead of driving on with the last command.

use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{CMD_TIMEOUT, LOOP_HZ};
use crate::error::Result;
use crate::messages::{DriveCommand, RuntimeHealth};
use crate::motor::DriveBase;
use crate::wait::CancelToken;

pub struct Runtime {
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: DriveCommand) {
        self.on_command_at(cmd, Instant::now());
    }

    fn on_command_at(&mut self, cmd: DriveCommand, received_at: Instant) {
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = received_at;
    }

    /// Command to apply now, based on watchdog state
    pub fn compute_command(&mut self) -> DriveCommand {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            DriveCommand::halt()
        } else if let Some(cmd) = self.latest_cmd {
            if self.health != RuntimeHealth::Ok {
                info!("Receiving commands");
            }
            self.health = RuntimeHealth::Ok;
            cmd
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            DriveCommand::halt()
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }
}

/// Drive `base` from `commands` until `cancel` fires, then stop it
pub fn run(
    base: &mut DriveBase,
    commands: &Receiver<DriveCommand>,
    cancel: &CancelToken,
) -> Result<()> {
    let period = Duration::from_millis(1000 / LOOP_HZ);
    let mut runtime = Runtime::new();

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );

    while !cancel.is_cancelled() {
        let tick = Instant::now();

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(cmd) = commands.try_recv() {
            runtime.on_command(cmd);
        }

        // 2. Compute command (includes watchdog logic)
        let cmd = runtime.compute_command();

        // 3. Apply to the wheels
        base.drive_and_turn(cmd.speed, cmd.turn_rate)?;

        if let Some(rest) = period.checked_sub(tick.elapsed()) {
            thread::sleep(rest);
        }
    }

    info!("Runtime cancelled, stopping drive base");
    base.stop()
}
