// Fixed-capacity table of motor slots
//
// Each slot owns at most one engine plus its run mode. Create drops any engine
// already in the slot before installing the new one; Delete moves it out and
// drops it. The dispatcher and the scheduler both go through `&mut` access to
// this table, so on a multi-threaded host it belongs behind one mutex shared by
// both paths.

use serde::Serialize;
use tracing::debug;

use crate::config::CAPACITY;
use crate::motor::{EngineFactory, StepperConfig};

/// Participation of a slot in the per-tick scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Disabled,
    Run,
    RunSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("slot {0} is out of range (capacity {cap})", cap = CAPACITY)]
    InvalidSlot(u8),

    #[error("slot {0} has no engine")]
    EngineAbsent(u8),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug)]
pub struct Slot<E> {
    engine: Option<E>,
    run_mode: RunMode,
}

impl<E> Slot<E> {
    const fn empty() -> Self {
        Self {
            engine: None,
            run_mode: RunMode::Disabled,
        }
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Engine and run mode, split so the scheduler can borrow both
    pub(crate) fn parts_mut(&mut self) -> (Option<&mut E>, RunMode) {
        (self.engine.as_mut(), self.run_mode)
    }
}

pub struct SlotRegistry<F: EngineFactory> {
    factory: F,
    slots: [Slot<F::Engine>; CAPACITY],
}

impl<F: EngineFactory> SlotRegistry<F> {
    /// All slots start empty and disabled
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            slots: std::array::from_fn(|_| Slot::empty()),
        }
    }

    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    fn slot(&self, id: u8) -> Result<&Slot<F::Engine>> {
        self.slots
            .get(id as usize)
            .ok_or(RegistryError::InvalidSlot(id))
    }

    fn slot_mut(&mut self, id: u8) -> Result<&mut Slot<F::Engine>> {
        self.slots
            .get_mut(id as usize)
            .ok_or(RegistryError::InvalidSlot(id))
    }

    /// Build a new engine in `id`, releasing any previous one first
    pub fn create(&mut self, id: u8, config: &StepperConfig) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(RegistryError::InvalidSlot(id))?;
        if slot.engine.take().is_some() {
            debug!(slot = id, "releasing previous engine");
        }
        slot.run_mode = RunMode::Disabled;
        slot.engine = Some(self.factory.create(config));
        Ok(())
    }

    /// Drop the engine in `id`. Destroying an empty slot is a no-op.
    pub fn destroy(&mut self, id: u8) -> Result<()> {
        let slot = self.slot_mut(id)?;
        drop(slot.engine.take());
        slot.run_mode = RunMode::Disabled;
        Ok(())
    }

    pub fn get(&self, id: u8) -> Result<&F::Engine> {
        self.slot(id)?
            .engine
            .as_ref()
            .ok_or(RegistryError::EngineAbsent(id))
    }

    pub fn get_mut(&mut self, id: u8) -> Result<&mut F::Engine> {
        self.slot_mut(id)?
            .engine
            .as_mut()
            .ok_or(RegistryError::EngineAbsent(id))
    }

    /// Select the run mode; one mode replaces the other two.
    /// Only `Disabled` is accepted for a slot without an engine.
    pub fn set_run_mode(&mut self, id: u8, mode: RunMode) -> Result<()> {
        let slot = self.slot_mut(id)?;
        if slot.engine.is_none() && mode != RunMode::Disabled {
            return Err(RegistryError::EngineAbsent(id));
        }
        slot.run_mode = mode;
        Ok(())
    }

    pub fn run_mode(&self, id: u8) -> Result<RunMode> {
        Ok(self.slot(id)?.run_mode)
    }

    /// Slots in ascending id order
    pub fn slots(&self) -> impl Iterator<Item = (u8, &Slot<F::Engine>)> {
        self.slots.iter().enumerate().map(|(i, s)| (i as u8, s))
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot<F::Engine>; CAPACITY] {
        &mut self.slots
    }
}

impl<F: EngineFactory + Default> Default for SlotRegistry<F> {
    fn default() -> Self {
        Self::new(F::default())
    }
}
