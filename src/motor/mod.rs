// Motion engine seam
//
// Provides:
// - The `MotionEngine` trait every slot drives (step generation lives behind it)
// - `EngineFactory` used by the registry to build engines on Create
// - A software `VirtualStepper` for hosts without step/dir hardware

pub mod virtual_stepper;

#[cfg(test)]
pub(crate) mod mock;

pub use virtual_stepper::{VirtualStepper, VirtualStepperFactory};

use serde::Serialize;

/// Pin interface of a stepper driver. Values match the wire byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Driver = 1,    // step + direction
    Full2Wire = 2, // 2 coil pins
    Full3Wire = 3,
    Full4Wire = 4,
    Half3Wire = 6,
    Half4Wire = 8,
}

impl InterfaceKind {
    /// Number of pins the interface actually uses
    pub fn pin_count(self) -> usize {
        match self {
            InterfaceKind::Driver | InterfaceKind::Full2Wire => 2,
            InterfaceKind::Full3Wire | InterfaceKind::Half3Wire => 3,
            InterfaceKind::Full4Wire | InterfaceKind::Half4Wire => 4,
        }
    }
}

impl TryFrom<u8> for InterfaceKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(InterfaceKind::Driver),
            2 => Ok(InterfaceKind::Full2Wire),
            3 => Ok(InterfaceKind::Full3Wire),
            4 => Ok(InterfaceKind::Full4Wire),
            6 => Ok(InterfaceKind::Half3Wire),
            8 => Ok(InterfaceKind::Half4Wire),
            other => Err(other),
        }
    }
}

/// Everything needed to construct one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperConfig {
    pub interface: InterfaceKind,
    pub pins: [u8; 4],
    pub enable_invert: bool,
}

/// One motor's motion control. Implementations must not block.
pub trait MotionEngine {
    /// Set an absolute target position in steps
    fn move_to(&mut self, absolute: i32);
    /// Set a target relative to the current position
    fn move_by(&mut self, relative: i32);

    fn set_max_speed(&mut self, speed: f32);
    fn max_speed(&self) -> f32;
    fn set_acceleration(&mut self, acceleration: f32);
    fn acceleration(&self) -> f32;
    /// Constant speed used by `run_speed`, in steps per second
    fn set_speed(&mut self, speed: f32);
    fn speed(&self) -> f32;

    fn distance_to_go(&self) -> i32;
    fn target_position(&self) -> i32;
    fn current_position(&self) -> i32;
    /// Redefine the current position; also clears the target and speed
    fn set_current_position(&mut self, position: i32);

    /// Decelerate to a halt as quickly as the acceleration allows
    fn stop(&mut self);
    fn disable_outputs(&mut self);
    fn enable_outputs(&mut self);
    fn is_running(&self) -> bool;

    /// One acceleration-aware step attempt. Returns true while still moving.
    fn run(&mut self) -> bool;
    /// One constant-speed step attempt. Returns true if a step was taken.
    fn run_speed(&mut self) -> bool;
}

/// Builds engines for the registry
pub trait EngineFactory {
    type Engine: MotionEngine;

    fn create(&mut self, config: &StepperConfig) -> Self::Engine;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_from_wire() {
        assert_eq!(InterfaceKind::try_from(1), Ok(InterfaceKind::Driver));
        assert_eq!(InterfaceKind::try_from(8), Ok(InterfaceKind::Half4Wire));
        // 0 is the function-callback interface, which cannot be built from a byte
        assert_eq!(InterfaceKind::try_from(0), Err(0));
        assert_eq!(InterfaceKind::try_from(5), Err(5));
    }

    #[test]
    fn test_pin_count() {
        assert_eq!(InterfaceKind::Driver.pin_count(), 2);
        assert_eq!(InterfaceKind::Half3Wire.pin_count(), 3);
        assert_eq!(InterfaceKind::Full4Wire.pin_count(), 4);
    }
}
