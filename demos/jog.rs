// Keyboard jog: A/D step, W/S change step size, Space stop, Q quit
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use stepper_bridge::config::{DEFAULT_BAUDRATE, DEFAULT_PORT};
use stepper_bridge::{InterfaceKind, StepperClient, StepperConfig};

const STEP_SIZES: [i32; 4] = [10, 100, 400, 1600]; // steps per key press
const MAX_SPEED: f32 = 1000.0; // steps/s
const ACCELERATION: f32 = 2000.0; // steps/s^2
const STATUS_PERIOD_MS: u64 = 500;

#[derive(Parser)]
#[command(about = "Jog one stepper slot from the keyboard")]
struct JogArgs {
    #[arg(long, default_value = DEFAULT_PORT)]
    port: String,

    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    baud: u32,

    /// Slot to create and drive
    #[arg(long, default_value_t = 0)]
    slot: u8,

    /// Step and direction pins
    #[arg(long, num_args = 2, default_values_t = [2, 3])]
    pins: Vec<u8>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = JogArgs::parse();
    let slot = args.slot;

    info!("Connecting to {} @ {} baud", args.port, args.baud);
    let mut client = StepperClient::open(&args.port, args.baud)?;

    let config = StepperConfig {
        interface: InterfaceKind::Driver,
        pins: [args.pins[0], args.pins[1], 0, 0],
        enable_invert: false,
    };
    client.create(slot, config)?;
    client.set_max_speed(slot, MAX_SPEED)?;
    client.set_acceleration(slot, ACCELERATION)?;
    client.start_run(slot)?;

    info!("Controls: A/D=jog, W/S=step size, Space=stop, Z=zero, Q=quit");
    info!("Step size: {}", STEP_SIZES[0]);

    enable_raw_mode()?;
    let result = run_jog(&mut client, slot);
    disable_raw_mode()?;

    // Leave the slot free for the next session
    if let Err(e) = client.delete(slot) {
        warn!("Failed to release slot {}: {}", slot, e);
    }

    result
}

fn run_jog(client: &mut StepperClient, slot: u8) -> Result<(), Box<dyn std::error::Error>> {
    let mut size_idx: usize = 0;
    let mut last_status = Instant::now();

    loop {
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('a') | KeyCode::Left if pressed => {
                        client.move_by(slot, -STEP_SIZES[size_idx])?;
                    }
                    KeyCode::Char('d') | KeyCode::Right if pressed => {
                        client.move_by(slot, STEP_SIZES[size_idx])?;
                    }

                    KeyCode::Char('w') | KeyCode::Up if pressed => {
                        size_idx = (size_idx + 1).min(STEP_SIZES.len() - 1);
                        info!("Step size: {}", STEP_SIZES[size_idx]);
                    }
                    KeyCode::Char('s') | KeyCode::Down if pressed => {
                        size_idx = size_idx.saturating_sub(1);
                        info!("Step size: {}", STEP_SIZES[size_idx]);
                    }

                    // Decelerate to rest
                    KeyCode::Char(' ') if pressed => client.stop(slot)?,

                    KeyCode::Char('z') if pressed => {
                        client.set_current_position(slot, 0)?;
                        info!("Position zeroed");
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if last_status.elapsed() >= Duration::from_millis(STATUS_PERIOD_MS) {
            last_status = Instant::now();
            if client.is_running(slot)? {
                info!(
                    "pos={} target={} speed={:.1}",
                    client.current_position(slot)?,
                    client.target_position(slot)?,
                    client.speed(slot)?
                );
            }
        }
    }

    Ok(())
}
