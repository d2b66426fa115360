// Per-tick motion advance
//
// Called by the host loop as often as it can. Step timing depends on how often
// this runs, so it stays O(CAPACITY): no logging, no allocation, no I/O.

use crate::motor::{EngineFactory, MotionEngine};
use crate::registry::{RunMode, SlotRegistry};

/// Give every active slot exactly one step attempt, in ascending slot order
pub fn tick<F: EngineFactory>(registry: &mut SlotRegistry<F>) {
    for slot in registry.slots_mut().iter_mut() {
        match slot.parts_mut() {
            (Some(engine), RunMode::Run) => {
                engine.run();
            }
            (Some(engine), RunMode::RunSpeed) => {
                engine.run_speed();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CAPACITY;
    use crate::motor::mock::MockFactory;
    use crate::motor::{InterfaceKind, StepperConfig};

    const CONFIG: StepperConfig = StepperConfig {
        interface: InterfaceKind::Full4Wire,
        pins: [8, 9, 10, 11],
        enable_invert: false,
    };

    #[test]
    fn test_idle_tick_makes_no_engine_calls() {
        let (factory, calls) = MockFactory::new();
        let mut reg = SlotRegistry::new(factory);
        for id in 0..CAPACITY as u8 {
            reg.create(id, &CONFIG).unwrap();
        }
        for _ in 0..100 {
            tick(&mut reg);
        }
        assert_eq!(calls.borrow().engine_calls(), 0);
    }

    #[test]
    fn test_empty_registry_tick() {
        let (factory, calls) = MockFactory::new();
        let mut reg = SlotRegistry::new(factory);
        tick(&mut reg);
        assert_eq!(calls.borrow().engine_calls(), 0);
    }

    #[test]
    fn test_routes_by_run_mode() {
        let (factory, calls) = MockFactory::new();
        let mut reg = SlotRegistry::new(factory);
        reg.create(0, &CONFIG).unwrap();
        reg.create(1, &CONFIG).unwrap();
        reg.create(2, &CONFIG).unwrap();
        reg.set_run_mode(0, RunMode::Run).unwrap();
        reg.set_run_mode(2, RunMode::RunSpeed).unwrap();

        tick(&mut reg);
        tick(&mut reg);

        let c = calls.borrow();
        assert_eq!(c.run, 2);
        assert_eq!(c.run_speed, 2);
        assert_eq!(c.other, 0);
    }

    #[test]
    fn test_one_step_attempt_per_tick() {
        let (factory, _) = MockFactory::new();
        let mut reg = SlotRegistry::new(factory);
        reg.create(1, &CONFIG).unwrap();
        reg.get_mut(1).unwrap().move_to(3);
        reg.set_run_mode(1, RunMode::Run).unwrap();

        tick(&mut reg);
        assert_eq!(reg.get(1).unwrap().current, 1);
        tick(&mut reg);
        tick(&mut reg);
        tick(&mut reg);
        assert_eq!(reg.get(1).unwrap().current, 3);
    }

    #[test]
    fn test_stopped_slot_is_skipped() {
        let (factory, calls) = MockFactory::new();
        let mut reg = SlotRegistry::new(factory);
        reg.create(0, &CONFIG).unwrap();
        reg.set_run_mode(0, RunMode::Run).unwrap();
        tick(&mut reg);
        reg.set_run_mode(0, RunMode::Disabled).unwrap();
        tick(&mut reg);
        assert_eq!(calls.borrow().run, 1);
    }
}
