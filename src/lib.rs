pub mod client;
pub mod config;
pub mod dispatcher;
pub mod motor;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod telemetry;
pub mod transport;

pub use client::{ClientError, StepperClient};
pub use dispatcher::{dispatch, execute, DispatchError};
pub use motor::{EngineFactory, InterfaceKind, MotionEngine, StepperConfig, VirtualStepper};
pub use protocol::{Command, CommandId, Reply, Response};
pub use registry::{RegistryError, RunMode, SlotRegistry};
