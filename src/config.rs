// Slot capacity, wire constants, serial defaults and CLI arguments
use clap::Parser;

// Number of addressable motor slots
pub const CAPACITY: usize = 4;

// Serial link defaults
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;
pub const MAX_LINK_ERRORS: u32 = 50; // consecutive failed loop passes before giving up

// Zenoh telemetry
pub const TOPIC_STATE: &str = "stepper/state"; // slot snapshots
pub const DEFAULT_TELEMETRY_HZ: u32 = 10;

/// Command line arguments for the bridge binary
#[derive(Debug, Clone, Parser)]
#[command(name = "stepper-bridge", about = "Binary command bridge for stepper motor slots")]
pub struct Args {
    /// Serial port the controller is attached to
    #[arg(long, default_value = DEFAULT_PORT)]
    pub port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    pub baud: u32,

    /// Publish slot snapshots over zenoh
    #[arg(long)]
    pub telemetry: bool,

    /// Telemetry publish rate
    #[arg(long, default_value_t = DEFAULT_TELEMETRY_HZ)]
    pub telemetry_hz: u32,
}
