// Controller-side client
//
// Issues one framed request at a time and waits for the correlated response.

use std::time::Duration;

use serialport::SerialPort;
use tracing::debug;

use crate::config::DEFAULT_TIMEOUT_MS;
use crate::motor::StepperConfig;
use crate::protocol::{
    decode_response, encode_command, Argument, Command, CommandId, DecodeError, Rejection, Reply,
    Response,
};
use crate::transport::{ByteChannel, LinkError, SerialLink};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Invalid response: {0}")]
    Decode(#[from] DecodeError),

    #[error("{id:?} rejected: {reason:?}")]
    Rejected { id: CommandId, reason: Rejection },

    #[error("Response for {got:?} while waiting for {expected:?}")]
    Mismatch { expected: CommandId, got: CommandId },

    #[error("Unexpected reply {reply:?} to {id:?}")]
    UnexpectedReply { id: CommandId, reply: Reply },
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub struct StepperClient<C: ByteChannel = Box<dyn SerialPort>> {
    link: SerialLink<C>,
    timeout: Duration,
}

impl StepperClient {
    /// Connect to a bridge on a serial port
    pub fn open(port: &str, baudrate: u32) -> Result<Self> {
        Ok(Self::new(SerialLink::open(port, baudrate)?))
    }
}

impl<C: ByteChannel> StepperClient<C> {
    pub fn new(link: SerialLink<C>) -> Self {
        Self {
            link,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one command and wait for its reply
    pub fn request(&mut self, command: Command) -> Result<Reply> {
        self.link.send(&encode_command(&command))?;
        let body = self.link.recv(self.timeout)?;
        let response = decode_response(&body)?;
        debug!("Slot {} {:?} --> {:?}", command.slot, command.id, response);

        match response {
            Response::Ok { id, reply } if id == command.id => Ok(reply),
            Response::Rejected { id, reason } if id == command.id => {
                Err(ClientError::Rejected { id, reason })
            }
            other => Err(ClientError::Mismatch {
                expected: command.id,
                got: other.id(),
            }),
        }
    }

    fn call(&mut self, id: CommandId, slot: u8, argument: Argument) -> Result<()> {
        self.request(Command { id, slot, argument }).map(|_| ())
    }

    fn query_i32(&mut self, id: CommandId, slot: u8) -> Result<i32> {
        match self.request(Command {
            id,
            slot,
            argument: Argument::None,
        })? {
            Reply::I32(v) => Ok(v),
            reply => Err(ClientError::UnexpectedReply { id, reply }),
        }
    }

    fn query_f32(&mut self, id: CommandId, slot: u8) -> Result<f32> {
        match self.request(Command {
            id,
            slot,
            argument: Argument::None,
        })? {
            Reply::F32(v) => Ok(v),
            reply => Err(ClientError::UnexpectedReply { id, reply }),
        }
    }

    pub fn create(&mut self, slot: u8, config: StepperConfig) -> Result<()> {
        self.call(CommandId::Create, slot, Argument::Create(config))
    }

    pub fn delete(&mut self, slot: u8) -> Result<()> {
        self.call(CommandId::Delete, slot, Argument::None)
    }

    pub fn move_to(&mut self, slot: u8, absolute: i32) -> Result<()> {
        self.call(CommandId::MoveTo, slot, Argument::I32(absolute))
    }

    pub fn move_by(&mut self, slot: u8, relative: i32) -> Result<()> {
        self.call(CommandId::Move, slot, Argument::I32(relative))
    }

    pub fn set_max_speed(&mut self, slot: u8, speed: f32) -> Result<()> {
        self.call(CommandId::SetMaxSpeed, slot, Argument::F32(speed))
    }

    pub fn max_speed(&mut self, slot: u8) -> Result<f32> {
        self.query_f32(CommandId::MaxSpeed, slot)
    }

    pub fn set_acceleration(&mut self, slot: u8, acceleration: f32) -> Result<()> {
        self.call(CommandId::SetAcceleration, slot, Argument::F32(acceleration))
    }

    pub fn acceleration(&mut self, slot: u8) -> Result<f32> {
        self.query_f32(CommandId::Acceleration, slot)
    }

    pub fn set_speed(&mut self, slot: u8, speed: f32) -> Result<()> {
        self.call(CommandId::SetSpeed, slot, Argument::F32(speed))
    }

    pub fn speed(&mut self, slot: u8) -> Result<f32> {
        self.query_f32(CommandId::Speed, slot)
    }

    pub fn distance_to_go(&mut self, slot: u8) -> Result<i32> {
        self.query_i32(CommandId::DistanceToGo, slot)
    }

    pub fn target_position(&mut self, slot: u8) -> Result<i32> {
        self.query_i32(CommandId::TargetPosition, slot)
    }

    pub fn current_position(&mut self, slot: u8) -> Result<i32> {
        self.query_i32(CommandId::CurrentPosition, slot)
    }

    pub fn set_current_position(&mut self, slot: u8, position: i32) -> Result<()> {
        self.call(CommandId::SetCurrentPosition, slot, Argument::I32(position))
    }

    pub fn stop(&mut self, slot: u8) -> Result<()> {
        self.call(CommandId::Stop, slot, Argument::None)
    }

    pub fn disable_outputs(&mut self, slot: u8) -> Result<()> {
        self.call(CommandId::DisableOutputs, slot, Argument::None)
    }

    pub fn enable_outputs(&mut self, slot: u8) -> Result<()> {
        self.call(CommandId::EnableOutputs, slot, Argument::None)
    }

    pub fn is_running(&mut self, slot: u8) -> Result<bool> {
        let id = CommandId::IsRunning;
        match self.request(Command {
            id,
            slot,
            argument: Argument::None,
        })? {
            Reply::Bool(v) => Ok(v),
            reply => Err(ClientError::UnexpectedReply { id, reply }),
        }
    }

    pub fn start_run(&mut self, slot: u8) -> Result<()> {
        self.call(CommandId::StartRun, slot, Argument::None)
    }

    pub fn start_run_speed(&mut self, slot: u8) -> Result<()> {
        self.call(CommandId::StartRunSpeed, slot, Argument::None)
    }

    pub fn stop_run(&mut self, slot: u8) -> Result<()> {
        self.call(CommandId::StopRun, slot, Argument::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CAPACITY;
    use crate::dispatcher::dispatch;
    use crate::motor::mock::MockFactory;
    use crate::motor::InterfaceKind;
    use crate::protocol::encode_response;
    use crate::registry::{RunMode, SlotRegistry};
    use crate::transport::{encode_frame, FrameDecoder};
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};

    /// In-memory device: requests written to it are dispatched immediately
    struct Loopback {
        registry: SlotRegistry<MockFactory>,
        inbound: FrameDecoder,
        outbound: VecDeque<u8>,
    }

    impl Loopback {
        fn new() -> Self {
            Self {
                registry: SlotRegistry::new(MockFactory::new().0),
                inbound: FrameDecoder::new(),
                outbound: VecDeque::new(),
            }
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inbound.push(buf);
            while let Some(Ok(body)) = self.inbound.next_frame() {
                if let Some(response) = dispatch(&mut self.registry, body[0], &body[1..]) {
                    let frame = encode_frame(&encode_response(&response))
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    self.outbound.extend(frame);
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.outbound.is_empty() {
                return Err(io::ErrorKind::TimedOut.into());
            }
            let n = buf.len().min(self.outbound.len());
            for (dst, src) in buf.iter_mut().zip(self.outbound.drain(..n)) {
                *dst = src;
            }
            Ok(n)
        }
    }

    impl ByteChannel for Loopback {
        fn bytes_available(&mut self) -> io::Result<usize> {
            Ok(self.outbound.len())
        }
    }

    fn client() -> StepperClient<Loopback> {
        StepperClient::new(SerialLink::new(Loopback::new()))
            .with_timeout(Duration::from_millis(20))
    }

    const CONFIG: StepperConfig = StepperConfig {
        interface: InterfaceKind::Driver,
        pins: [2, 5, 0, 0],
        enable_invert: true,
    };

    #[test]
    fn test_full_command_cycle() {
        let mut c = client();
        c.create(2, CONFIG).unwrap();
        c.set_max_speed(2, 800.0).unwrap();
        c.set_acceleration(2, 400.0).unwrap();
        c.set_speed(2, 100.0).unwrap();
        assert_eq!(c.max_speed(2).unwrap(), 800.0);
        assert_eq!(c.acceleration(2).unwrap(), 400.0);
        assert_eq!(c.speed(2).unwrap(), 100.0);

        c.move_to(2, 1000).unwrap();
        assert_eq!(c.distance_to_go(2).unwrap(), 1000);
        assert_eq!(c.target_position(2).unwrap(), 1000);
        assert!(c.is_running(2).unwrap());

        c.set_current_position(2, 1000).unwrap();
        assert_eq!(c.current_position(2).unwrap(), 1000);
        c.move_by(2, -10).unwrap();
        assert_eq!(c.target_position(2).unwrap(), 990);

        c.stop(2).unwrap();
        c.disable_outputs(2).unwrap();
        c.enable_outputs(2).unwrap();

        c.start_run(2).unwrap();
        c.start_run_speed(2).unwrap();
        let registry = &c.link.channel_mut().registry;
        assert_eq!(registry.run_mode(2), Ok(RunMode::RunSpeed));
        c.stop_run(2).unwrap();

        c.delete(2).unwrap();
        assert!(matches!(
            c.distance_to_go(2),
            Err(ClientError::Rejected {
                reason: Rejection::EngineAbsent,
                ..
            })
        ));
    }

    #[test]
    fn test_rejections_surface_as_errors() {
        let mut c = client();
        assert!(matches!(
            c.create(CAPACITY as u8, CONFIG),
            Err(ClientError::Rejected {
                id: CommandId::Create,
                reason: Rejection::InvalidSlot
            })
        ));
        assert!(matches!(
            c.speed(0),
            Err(ClientError::Rejected {
                reason: Rejection::EngineAbsent,
                ..
            })
        ));
    }
}
