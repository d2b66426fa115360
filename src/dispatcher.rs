// Command dispatch
//
// Every command is one independent transition: decode, check the slot, apply
// the engine call or registry change, answer. The route table below is the
// single place that says what each command id does.

use tracing::{debug, warn};

use crate::motor::{EngineFactory, MotionEngine};
use crate::protocol::{
    decode_command, Argument, Command, CommandId, DecodeError, Rejection, Reply, Response,
};
use crate::registry::{RegistryError, RunMode, SlotRegistry};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("argument {argument:?} does not fit command {id:?}")]
    ArgumentMismatch { id: CommandId, argument: Argument },
}

impl DispatchError {
    /// Wire rejection to send back, if the failure is answerable
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            DispatchError::Decode(e) => e.rejection(),
            DispatchError::Registry(RegistryError::InvalidSlot(_)) => Some(Rejection::InvalidSlot),
            DispatchError::Registry(RegistryError::EngineAbsent(_)) => {
                Some(Rejection::EngineAbsent)
            }
            DispatchError::ArgumentMismatch { .. } => None,
        }
    }
}

/// What a command does once its slot has been checked
#[derive(Clone, Copy)]
enum Action {
    Create,
    Delete,
    SetRunMode(RunMode),
    Call(fn(&mut dyn MotionEngine)),
    SetI32(fn(&mut dyn MotionEngine, i32)),
    SetF32(fn(&mut dyn MotionEngine, f32)),
    GetI32(fn(&dyn MotionEngine) -> i32),
    GetF32(fn(&dyn MotionEngine) -> f32),
    GetBool(fn(&dyn MotionEngine) -> bool),
}

struct Route {
    id: CommandId,
    name: &'static str,
    action: Action,
}

/// Indexed by `CommandId as u8 - 1`
static ROUTES: [Route; 21] = [
    Route {
        id: CommandId::Create,
        name: "create",
        action: Action::Create,
    },
    Route {
        id: CommandId::Delete,
        name: "delete",
        action: Action::Delete,
    },
    Route {
        id: CommandId::MoveTo,
        name: "move_to",
        action: Action::SetI32(|e, v| e.move_to(v)),
    },
    Route {
        id: CommandId::Move,
        name: "move",
        action: Action::SetI32(|e, v| e.move_by(v)),
    },
    Route {
        id: CommandId::SetMaxSpeed,
        name: "set_max_speed",
        action: Action::SetF32(|e, v| e.set_max_speed(v)),
    },
    Route {
        id: CommandId::MaxSpeed,
        name: "max_speed",
        action: Action::GetF32(|e| e.max_speed()),
    },
    Route {
        id: CommandId::SetAcceleration,
        name: "set_acceleration",
        action: Action::SetF32(|e, v| e.set_acceleration(v)),
    },
    Route {
        id: CommandId::Acceleration,
        name: "acceleration",
        action: Action::GetF32(|e| e.acceleration()),
    },
    Route {
        id: CommandId::SetSpeed,
        name: "set_speed",
        action: Action::SetF32(|e, v| e.set_speed(v)),
    },
    Route {
        id: CommandId::Speed,
        name: "speed",
        action: Action::GetF32(|e| e.speed()),
    },
    Route {
        id: CommandId::DistanceToGo,
        name: "distance_to_go",
        action: Action::GetI32(|e| e.distance_to_go()),
    },
    Route {
        id: CommandId::TargetPosition,
        name: "target_position",
        action: Action::GetI32(|e| e.target_position()),
    },
    Route {
        id: CommandId::CurrentPosition,
        name: "current_position",
        action: Action::GetI32(|e| e.current_position()),
    },
    Route {
        id: CommandId::SetCurrentPosition,
        name: "set_current_position",
        action: Action::SetI32(|e, v| e.set_current_position(v)),
    },
    Route {
        id: CommandId::Stop,
        name: "stop",
        action: Action::Call(|e| e.stop()),
    },
    Route {
        id: CommandId::DisableOutputs,
        name: "disable_outputs",
        action: Action::Call(|e| e.disable_outputs()),
    },
    Route {
        id: CommandId::EnableOutputs,
        name: "enable_outputs",
        action: Action::Call(|e| e.enable_outputs()),
    },
    Route {
        id: CommandId::IsRunning,
        name: "is_running",
        action: Action::GetBool(|e| e.is_running()),
    },
    Route {
        id: CommandId::StartRun,
        name: "start_run",
        action: Action::SetRunMode(RunMode::Run),
    },
    Route {
        id: CommandId::StartRunSpeed,
        name: "start_run_speed",
        action: Action::SetRunMode(RunMode::RunSpeed),
    },
    Route {
        id: CommandId::StopRun,
        name: "stop_run",
        action: Action::SetRunMode(RunMode::Disabled),
    },
];

fn route(id: CommandId) -> &'static Route {
    &ROUTES[id as usize - 1]
}

/// Handle one raw request. `data` starts at the slot id byte.
///
/// Returns the response to send, or `None` for unknown command ids, which
/// are only logged.
pub fn dispatch<F: EngineFactory>(
    registry: &mut SlotRegistry<F>,
    command_id: u8,
    data: &[u8],
) -> Option<Response> {
    let Ok(id) = CommandId::try_from(command_id) else {
        warn!(
            "Unknown command 0x{:02X} for slot {:?}",
            command_id,
            data.first()
        );
        return None;
    };

    let result = decode_command(command_id, data)
        .map_err(DispatchError::from)
        .and_then(|command| execute(registry, &command));

    match result {
        Ok(reply) => Some(Response::Ok { id, reply }),
        Err(e) => {
            warn!("Rejected {}: {}", route(id).name, e);
            e.rejection()
                .map(|reason| Response::Rejected { id, reason })
        }
    }
}

/// Apply a decoded command to the registry
pub fn execute<F: EngineFactory>(
    registry: &mut SlotRegistry<F>,
    command: &Command,
) -> Result<Reply, DispatchError> {
    let route = route(command.id);
    let slot = command.slot;

    let reply = match (route.action, command.argument) {
        (Action::Create, Argument::Create(config)) => {
            registry.create(slot, &config)?;
            debug!(
                "STEPPER[{}] = {:?} on pins {:?}, enable_invert={}",
                slot,
                config.interface,
                &config.pins[..config.interface.pin_count()],
                config.enable_invert
            );
            Reply::None
        }
        (Action::Delete, _) => {
            registry.get(slot)?;
            registry.destroy(slot)?;
            Reply::None
        }
        (Action::SetRunMode(mode), _) => {
            registry.get(slot)?;
            registry.set_run_mode(slot, mode)?;
            Reply::None
        }
        (Action::Call(f), _) => {
            f(registry.get_mut(slot)?);
            Reply::None
        }
        (Action::SetI32(f), Argument::I32(v)) => {
            f(registry.get_mut(slot)?, v);
            Reply::None
        }
        (Action::SetF32(f), Argument::F32(v)) => {
            f(registry.get_mut(slot)?, v);
            Reply::None
        }
        (Action::GetI32(f), _) => Reply::I32(f(registry.get(slot)?)),
        (Action::GetF32(f), _) => Reply::F32(f(registry.get(slot)?)),
        (Action::GetBool(f), _) => Reply::Bool(f(registry.get(slot)?)),
        (_, argument) => {
            return Err(DispatchError::ArgumentMismatch {
                id: command.id,
                argument,
            });
        }
    };

    debug!(
        "STEPPER[{}]->{}({:?}) --> {:?}",
        slot, route.name, command.argument, reply
    );
    Ok(reply)
}
