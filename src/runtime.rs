// Device loop: serial commands in, responses out, one scheduler tick per pass
//
// Dispatch and tick share the registry on one task and never overlap. The loop
// yields to tokio every pass so Ctrl+C and telemetry still get serviced, but it
// never sleeps: step timing depends on how often `tick` runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{Args, CAPACITY, MAX_LINK_ERRORS};
use crate::dispatcher::dispatch;
use crate::motor::{EngineFactory, VirtualStepperFactory};
use crate::protocol::encode_response;
use crate::registry::SlotRegistry;
use crate::scheduler;
use crate::telemetry::{snapshot, Telemetry};
use crate::transport::{ByteChannel, LinkError, SerialLink};

pub struct Runtime<F: EngineFactory> {
    registry: SlotRegistry<F>,
    frames_handled: u64,
}

impl<F: EngineFactory> Runtime<F> {
    pub fn new(factory: F) -> Self {
        Self {
            registry: SlotRegistry::new(factory),
            frames_handled: 0,
        }
    }

    /// Process one inbound frame body, returning the response body to send
    pub fn on_frame(&mut self, body: &[u8]) -> Option<Vec<u8>> {
        let (&command_id, data) = body.split_first()?;
        self.frames_handled += 1;
        dispatch(&mut self.registry, command_id, data).map(|r| encode_response(&r))
    }

    /// Drain every complete frame waiting on the link and answer each one
    pub fn service<C: ByteChannel>(&mut self, link: &mut SerialLink<C>) -> Result<(), LinkError> {
        link.poll()?;
        while let Some(body) = link.next_frame() {
            if let Some(response) = self.on_frame(&body) {
                link.send(&response)?;
            }
        }
        Ok(())
    }

    pub fn tick(&mut self) {
        scheduler::tick(&mut self.registry);
    }

    pub fn registry(&self) -> &SlotRegistry<F> {
        &self.registry
    }

    pub fn frames_handled(&self) -> u64 {
        self.frames_handled
    }
}

/// Counts consecutive link failures; the loop only gives up on a persistent one
#[derive(Debug, Default)]
pub struct LinkErrorBudget {
    consecutive: u32,
}

impl LinkErrorBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swallow a transient failure with a warning, or return it once the
    /// budget is spent
    pub fn check(&mut self, result: Result<(), LinkError>) -> Result<(), LinkError> {
        match result {
            Ok(()) => {
                self.consecutive = 0;
                Ok(())
            }
            Err(e) => {
                self.consecutive += 1;
                if self.consecutive >= MAX_LINK_ERRORS {
                    return Err(e);
                }
                warn!(
                    "Serial link error ({}/{}): {}",
                    self.consecutive, MAX_LINK_ERRORS, e
                );
                Ok(())
            }
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening serial link on {} @ {} baud", args.port, args.baud);
    let mut link = SerialLink::open(&args.port, args.baud)?;

    let telemetry = if args.telemetry {
        Some(Telemetry::open().await?)
    } else {
        None
    };
    let telemetry_period = Duration::from_millis(1000 / u64::from(args.telemetry_hz.max(1)));

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    let mut runtime = Runtime::new(VirtualStepperFactory);
    let mut last_publish = Instant::now();
    let mut link_errors = LinkErrorBudget::new();

    info!("Runtime started: {} slots, virtual steppers", CAPACITY);

    while !shutdown.load(Ordering::Relaxed) {
        // 1. Answer all complete commands (non-blocking)
        link_errors.check(runtime.service(&mut link))?;

        // 2. One step attempt for every running slot
        runtime.tick();

        // 3. Publish state at the telemetry rate
        if let Some(ref telemetry) = telemetry {
            if last_publish.elapsed() >= telemetry_period {
                last_publish = Instant::now();
                if let Err(e) = telemetry.publish(&snapshot(runtime.registry())).await {
                    warn!("Failed to publish telemetry: {}", e);
                }
            }
        }

        tokio::task::yield_now().await;
    }

    debug!("Handled {} frames", runtime.frames_handled());
    info!("Shutting down");
    Ok(())
}
