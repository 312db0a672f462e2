mod sim;

use std::{
    io::BufRead,
    path::PathBuf,
    sync::{atomic::Ordering, Arc},
};

use clap::Parser;
use embassy_executor::Executor;
use rover_core::mk_static;
use rover_core::utils::{
    config::RoverConfig,
    connection::{Command, CommandChannel, CommandReceiver, CommandSlot, PeerAddress},
    controllers::{MotorActuator, PwmDriveLines, RangingEngine, RoverController},
    Instant,
};
use sim::{ConsoleRadio, LoggedPwm, ObstacleCm, SimBattery, SimEcho, SimTrigger};
use static_cell::StaticCell;
use tracing::{error, info, warn};

type SimRover = RoverController<'static, SimTrigger, SimEcho, PwmDriveLines<LoggedPwm>, ConsoleRadio, SimBattery>;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// JSON file with rover tunables
    #[clap(long)]
    config: Option<PathBuf>,
    /// joystick deadzone around center
    #[clap(long)]
    deadzone: Option<i32>,
    /// link timeout in milliseconds
    #[clap(long)]
    link_timeout_ms: Option<u64>,
    /// drive at a single speed (percent) instead of proportional
    #[clap(long)]
    fixed_speed: Option<u8>,
    /// refuse to drive forward closer than this (cm)
    #[clap(long)]
    obstacle_stop_cm: Option<u16>,
    /// remote peer address
    #[clap(long, default_value = "FF:FF:FF:FF:FF:FF")]
    peer: String,
    /// initial distance to the simulated obstacle (cm), negative for none
    #[clap(long, default_value_t = 120)]
    obstacle: i32,
    /// simulated battery voltage
    #[clap(long, default_value_t = 7.4)]
    battery: f32,
}

fn load_config(opts: &Opts) -> Result<RoverConfig, String> {
    let mut config = match &opts.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
            serde_json::from_str(&raw).map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => RoverConfig::default(),
    };
    if let Some(d) = opts.deadzone {
        config.deadzone = d;
    }
    if let Some(t) = opts.link_timeout_ms {
        config.link_timeout_ms = t;
    }
    if opts.fixed_speed.is_some() {
        config.fixed_speed = opts.fixed_speed;
    }
    if opts.obstacle_stop_cm.is_some() {
        config.obstacle_stop_cm = opts.obstacle_stop_cm;
    }
    config.validate().map_err(|e| format!("invalid config: {e:?}"))?;
    Ok(config)
}

/// Stand-in for the radio driver: reads remote keys from stdin and delivers
/// packets on its own thread, like the ESP-NOW receive callback.
///
/// `F`/`B`/`L`/`R`/`S` drive like the handheld remote, `<x> <y>` sends raw
/// axes, `d <cm>` moves the obstacle (`d -` removes it), `junk` sends a short
/// packet.
fn remote_thread(
    rx: CommandReceiver<'static>,
    obstacle: ObstacleCm,
) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        let command = match line {
            "" => continue,
            "F" => Command { x: 2048, y: 4095 },
            "B" => Command { x: 2048, y: 0 },
            "L" => Command { x: 0, y: 2048 },
            "R" => Command { x: 4095, y: 2048 },
            "S" => Command::CENTER,
            "junk" => {
                let _ = rx.on_receive(&[0xAB; 3], Instant::now());
                continue;
            }
            _ if line.starts_with("d ") => {
                let cm = line[2..].trim().parse::<i32>().unwrap_or(-1);
                obstacle.store(cm, Ordering::Relaxed);
                info!(cm, "obstacle moved");
                continue;
            }
            _ => {
                let mut axes = line.split_whitespace().map(str::parse::<i32>);
                match (axes.next(), axes.next()) {
                    (Some(Ok(x)), Some(Ok(y))) => Command { x, y },
                    _ => {
                        warn!(line, "unrecognised remote input");
                        continue;
                    }
                }
            }
        };
        if let Err(e) = rx.on_receive(&command.encode(), Instant::now()) {
            warn!(?e, "remote packet rejected");
        }
    }
    info!("remote input closed; link will time out");
}

#[embassy_executor::task]
async fn control_task(rover: &'static mut SimRover) {
    let err = rover.run().await;
    error!(line = ?err.line, error = ?err.error, "actuation fault, halting");
    std::process::exit(1);
}

#[embassy_executor::task]
async fn main_task(
    spawner: embassy_executor::Spawner,
    config: RoverConfig,
    peer: PeerAddress,
    obstacle: ObstacleCm,
    battery: f32,
) {
    let slot: &'static CommandSlot = mk_static!(CommandSlot, CommandSlot::new());
    let channel = CommandChannel::initialize(slot, ConsoleRadio, peer);

    let rx = channel.receiver();
    let remote_obstacle = obstacle.clone();
    std::thread::spawn(move || remote_thread(rx, remote_obstacle));

    let (trigger, echo) = sim::ultrasonic(obstacle);
    let rover = match RoverController::new(
        RangingEngine::new(trigger, echo),
        channel,
        MotorActuator::new(PwmDriveLines::new(LoggedPwm::bank())),
        SimBattery::new(battery),
        Some(config),
    ) {
        Ok(rover) => mk_static!(SimRover, rover),
        Err(e) => {
            error!(?e, "invalid config");
            std::process::exit(2);
        }
    };
    if let Err(err) = rover.initialize() {
        error!(line = ?err.line, error = ?err.error, "motor init failed");
        std::process::exit(1);
    }

    info!("rover control loop running");
    spawner.spawn(control_task(rover)).unwrap();
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts: Opts = Opts::parse();
    let config = match load_config(&opts) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };
    let peer: PeerAddress = match opts.peer.parse() {
        Ok(peer) => peer,
        Err(e) => {
            error!(?e, peer = %opts.peer, "bad peer address");
            std::process::exit(2);
        }
    };
    info!(config = %serde_json::to_string(&config).unwrap_or_default(), "starting mock rover");

    let obstacle: ObstacleCm = Arc::new(opts.obstacle.into());
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner
            .spawn(main_task(spawner, config, peer, obstacle, opts.battery))
            .unwrap();
    });
}
