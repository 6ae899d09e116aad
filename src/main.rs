use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ev3light::config::RobotConfig;
use ev3light::device::{Access, DeviceBus, DeviceClass, SimulatedBus, SysfsBus, virtual_hardware};
use ev3light::messages::DriveCommand;
use ev3light::motor::{DriveBase, Mechanism};
use ev3light::runtime;
use ev3light::wait::{CancelToken, Wait};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const SPEEDS: [f64; 3] = [10.0, 25.0, 50.0]; // cm/s
const TURN_RATES: [f64; 3] = [30.0, 90.0, 180.0]; // deg/s
const INPUT_TIMEOUT_MS: u64 = 100; // Reset velocities after this much time with no input

#[derive(Parser)]
#[command(name = "ev3light", about = "Drive and inspect sysfs motors and sensors")]
struct Cli {
    /// Use a sysfs-shaped directory tree instead of /sys/class
    #[arg(long, global = true, conflicts_with = "simulated")]
    root: Option<PathBuf>,

    /// Use in-memory simulated hardware
    #[arg(long, global = true)]
    simulated: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic device tree (4 motors, 4 sensors) into DIR
    Virtual { dir: PathBuf },

    /// List attached devices
    Status,

    /// Drive the base with the keyboard: W/S drive, A/D turn, R/F speed, Q quit
    Teleop {
        #[arg(long)]
        config: PathBuf,
    },

    /// Home a mechanism, then optionally move it to a named target
    Home {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        mechanism: String,
        /// Give up homing after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Target to go to once homed
        #[arg(long)]
        then: Option<String>,
        /// Speed for the move to --then, deg/s
        #[arg(long)]
        speed: Option<f64>,
    },

    /// Move a mechanism to a named target without homing it first
    Goto {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        mechanism: String,
        #[arg(long)]
        target: String,
        /// deg/s, defaults to the mechanism's speed
        #[arg(long)]
        speed: Option<f64>,
    },
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), BoxError> {
    let bus: Box<dyn DeviceBus> = if cli.simulated {
        info!("Using simulated hardware");
        Box::new(SimulatedBus::ev3())
    } else if let Some(root) = &cli.root {
        info!("Using device tree at {}", root.display());
        Box::new(SysfsBus::with_root(root))
    } else {
        Box::new(SysfsBus::system())
    };

    match cli.command {
        Commands::Virtual { dir } => {
            virtual_hardware::populate(&dir)?;
            println!("Synthetic hardware written to {}", dir.display());
            Ok(())
        }
        Commands::Status => status(bus.as_ref()),
        Commands::Teleop { config } => {
            let config = RobotConfig::from_file(config)?;
            let base = DriveBase::new(bus.as_ref(), config.drive_base()?)?;
            teleop(base)
        }
        Commands::Home {
            config,
            mechanism,
            timeout_ms,
            then,
            speed,
        } => {
            let config = RobotConfig::from_file(config)?;
            let mut mech = Mechanism::new(bus.as_ref(), config.mechanism(&mechanism)?)?;

            let mut wait = Wait::forever();
            if let Some(ms) = timeout_ms {
                wait = wait.with_timeout(Duration::from_millis(ms));
            }
            let outcome = mech.reset_with(&wait)?;
            if !outcome.is_met() {
                return Err(format!("homing '{}' did not finish: {:?}", mechanism, outcome).into());
            }
            println!("'{}' homed", mechanism);

            match then {
                Some(target) => go_to(&mut mech, &mechanism, &target, speed),
                None => Ok(()),
            }
        }
        Commands::Goto {
            config,
            mechanism,
            target,
            speed,
        } => {
            let config = RobotConfig::from_file(config)?;
            let mut mech = Mechanism::new(bus.as_ref(), config.mechanism(&mechanism)?)?;
            go_to(&mut mech, &mechanism, &target, speed)
        }
    }
}

fn go_to(
    mech: &mut Mechanism,
    name: &str,
    target: &str,
    speed: Option<f64>,
) -> Result<(), BoxError> {
    mech.go_to_target(target, speed, true)?;
    let position = mech.motor().position()?;
    println!("'{}' at '{}' ({:.1} deg)", name, target, position);
    Ok(())
}

fn status(bus: &dyn DeviceBus) -> Result<(), BoxError> {
    for (class, attribute) in [
        (DeviceClass::TachoMotor, "state"),
        (DeviceClass::LegoSensor, "mode"),
    ] {
        let devices = bus.devices(class)?;
        println!("{} ({} attached)", class, devices.len());
        for handle in devices {
            let value = bus.open(&handle, attribute, Access::Read)?.read_str()?;
            println!("  {:<10} {:<16} {}={}", handle.name, handle.address, attribute, value);
        }
    }
    Ok(())
}

fn teleop(mut base: DriveBase) -> Result<(), BoxError> {
    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::new();

    let runtime_cancel = cancel.clone();
    let worker = thread::spawn(move || runtime::run(&mut base, &rx, &runtime_cancel));

    info!("Controls: W/S=drive, A/D=turn, R/F=speed, Q=quit");
    print_speed(0);

    enable_raw_mode()?;
    let result = read_keys(&tx);
    disable_raw_mode()?;

    cancel.cancel();
    let runtime_result = worker
        .join()
        .map_err(|_| "runtime thread panicked".to_string())?;
    result?;
    runtime_result?;
    Ok(())
}

fn read_keys(tx: &Sender<DriveCommand>) -> Result<(), BoxError> {
    let mut speed_idx: usize = 0;

    // Persistent command state
    let mut speed = 0.0;
    let mut turn_rate = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        speed = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        speed = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        turn_rate = -TURN_RATES[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        turn_rate = TURN_RATES[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(SPEEDS.len() - 1);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset command if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            speed = 0.0;
            turn_rate = 0.0;
        }

        if tx.send(DriveCommand::new(speed, turn_rate)).is_err() {
            // Runtime stopped on its own, most likely a device error
            break;
        }
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!(
        "Speed: {} ({} cm/s, {} deg/s)",
        label, SPEEDS[idx], TURN_RATES[idx]
    );
}
