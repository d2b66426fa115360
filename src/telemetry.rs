// Slot state snapshots published over zenoh

use serde::Serialize;
use tracing::info;

use crate::config::TOPIC_STATE;
use crate::motor::{EngineFactory, MotionEngine};
use crate::registry::{RunMode, SlotRegistry};

/// State of one slot that holds an engine
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotSnapshot {
    pub id: u8,
    pub run_mode: RunMode,
    pub current_position: i32,
    pub target_position: i32,
    pub speed: f32,
    pub running: bool,
}

/// Snapshot every created slot, in ascending id order
pub fn snapshot<F: EngineFactory>(registry: &SlotRegistry<F>) -> Vec<SlotSnapshot> {
    registry
        .slots()
        .filter_map(|(id, slot)| {
            slot.engine().map(|engine| SlotSnapshot {
                id,
                run_mode: slot.run_mode(),
                current_position: engine.current_position(),
                target_position: engine.target_position(),
                speed: engine.speed(),
                running: engine.is_running(),
            })
        })
        .collect()
}

/// Zenoh publisher for slot snapshots
pub struct Telemetry {
    // Dropping the session undeclares the publisher
    _session: zenoh::Session,
    publisher: zenoh::pubsub::Publisher<'static>,
}

impl Telemetry {
    pub async fn open() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        info!("Opening Zenoh session...");
        let session = zenoh::open(zenoh::Config::default()).await?;
        let publisher = session.declare_publisher(TOPIC_STATE).await?;
        info!("Publishing slot state to: {}", TOPIC_STATE);
        Ok(Self {
            _session: session,
            publisher,
        })
    }

    pub async fn publish(
        &self,
        slots: &[SlotSnapshot],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let json = serde_json::to_string(slots)?;
        self.publisher.put(json).await?;
        Ok(())
    }
}
