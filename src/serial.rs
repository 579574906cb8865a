// Serial sink: a single blocking writer owns the port and every caller
// reaches it through a channel, so commands from HTTP and MQTT are written
// one after another and never interleave on the wire.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::Write;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info};

pub const BAUD_RATE: u32 = 19_200;
pub const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;
pub const PARITY: serialport::Parity = serialport::Parity::None;
pub const STOP_BITS: serialport::StopBits = serialport::StopBits::One;
pub const FLOW_CONTROL: serialport::FlowControl = serialport::FlowControl::None;
// serialport needs a non-zero timeout or writes fail immediately.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },
    #[error("failed to write to serial port: {0}")]
    Write(#[from] std::io::Error),
    #[error("serial writer is closed")]
    Closed,
}

/// Result of a successful `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Written,
    Skipped,
}

enum SerialCommand {
    Write(Vec<u8>),
    Shutdown,
}

struct SerialJob {
    command: SerialCommand,
    response: oneshot::Sender<Result<(), SerialError>>,
}

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct SerialSink {
    tx: Sender<SerialJob>,
}

impl SerialSink {
    fn new(tx: Sender<SerialJob>) -> Self {
        SerialSink { tx }
    }

    /// Write `command` to the device. An empty command is skipped and
    /// never reaches the port.
    pub async fn send(&self, command: &str) -> Result<Delivery, SerialError> {
        self.enqueue(command)?.wait().await
    }

    /// Queue `command` behind any writes already waiting and return without
    /// blocking. Writes reach the port in the order they were enqueued.
    pub fn enqueue(&self, command: &str) -> Result<PendingWrite, SerialError> {
        if command.is_empty() {
            info!("Skipping empty command");
            return Ok(PendingWrite { response: None });
        }
        let rx = self.submit(SerialCommand::Write(command.as_bytes().to_vec()))?;
        Ok(PendingWrite { response: Some(rx) })
    }

    /// Ask the writer to release the port and stop. Later sends fail with
    /// `SerialError::Closed`.
    pub async fn shutdown(&self) -> Result<(), SerialError> {
        let rx = self.submit(SerialCommand::Shutdown)?;
        rx.await.map_err(|_| SerialError::Closed)?
    }

    fn submit(&self, command: SerialCommand) -> Result<oneshot::Receiver<Result<(), SerialError>>, SerialError> {
        let (tx, rx) = oneshot::channel();
        let job = SerialJob { command, response: tx };
        self.tx.send(job).map_err(|_| SerialError::Closed)?;
        Ok(rx)
    }
}

/// A queued write. `wait` resolves once the writer has dealt with it.
pub struct PendingWrite {
    response: Option<oneshot::Receiver<Result<(), SerialError>>>,
}

impl PendingWrite {
    pub async fn wait(self) -> Result<Delivery, SerialError> {
        match self.response {
            None => Ok(Delivery::Skipped),
            Some(rx) => {
                rx.await.map_err(|_| SerialError::Closed)??;
                Ok(Delivery::Written)
            }
        }
    }
}

/// Open the switcher's serial device with the fixed 19200-8-N-1 framing.
pub fn open_port(path: &str) -> Result<Box<dyn serialport::SerialPort>, SerialError> {
    serialport::new(path, BAUD_RATE)
        .data_bits(DATA_BITS)
        .parity(PARITY)
        .stop_bits(STOP_BITS)
        .flow_control(FLOW_CONTROL)
        .timeout(WRITE_TIMEOUT)
        .open()
        .map_err(|source| SerialError::Open { path: path.to_string(), source })
}

/// Start the writer thread which owns `port` and executes jobs in arrival
/// order. The thread exits on `shutdown` or once every handle is dropped.
pub fn start_serial_writer<W>(port: W) -> (SerialSink, JoinHandle<()>)
where
    W: Write + Send + 'static,
{
    let (tx, rx): (Sender<SerialJob>, Receiver<SerialJob>) = unbounded();
    let sink = SerialSink::new(tx);

    let join = task::spawn_blocking(move || {
        let mut port = port;
        while let Ok(job) = rx.recv() {
            match job.command {
                SerialCommand::Write(bytes) => {
                    let res = port.write_all(&bytes).and_then(|_| port.flush());
                    let _ = job.response.send(res.map_err(SerialError::from));
                }
                SerialCommand::Shutdown => {
                    drop(port);
                    debug!("Serial port released");
                    let _ = job.response.send(Ok(()));
                    break;
                }
            }
        }
    });

    (sink, join)
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingPort, GatedPort, RecordingPort};
    use super::*;

    #[tokio::test]
    async fn test_empty_command_is_not_written() {
        let port = RecordingPort::default();
        let (sink, _join) = start_serial_writer(port.clone());

        let res = sink.send("").await.expect("empty send should succeed");
        assert_eq!(res, Delivery::Skipped);
        assert!(port.writes().is_empty(), "no bytes should reach the device");
    }

    #[tokio::test]
    async fn test_command_is_written_once() {
        let port = RecordingPort::default();
        let (sink, _join) = start_serial_writer(port.clone());

        let res = sink.send("sw i02\r\n").await.expect("send should succeed");
        assert_eq!(res, Delivery::Written);
        assert_eq!(port.writes(), vec![b"sw i02\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_and_writer_survives() {
        let (sink, join) = start_serial_writer(FailingPort);

        let err = sink.send("sw i01\r\n").await.expect_err("write should fail");
        assert!(matches!(err, SerialError::Write(_)), "unexpected error: {err}");

        // The writer keeps the port open after a failed write.
        let err = sink.send("sw i03\r\n").await.expect_err("write should fail again");
        assert!(matches!(err, SerialError::Write(_)));
        assert!(!join.is_finished());
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_interleave() {
        let port = RecordingPort::default();
        let (sink, _join) = start_serial_writer(port.clone());

        let a = sink.clone();
        let b = sink.clone();
        let (ra, rb) = tokio::join!(a.send("sw i01\r\n"), b.send("sw i03\r\n"));
        assert!(ra.is_ok() && rb.is_ok());

        let mut writes = port.writes();
        writes.sort();
        assert_eq!(writes, vec![b"sw i01\r\n".to_vec(), b"sw i03\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_enqueue_does_not_wait_for_stalled_device() {
        let port = RecordingPort::default();
        let (gated, release) = GatedPort::new(port.clone());
        let (sink, _join) = start_serial_writer(gated);

        // Both calls return while the device is still blocked.
        let first = sink.enqueue("sw i04\r\n").expect("enqueue first");
        let second = sink.enqueue("sw i01\r\n").expect("enqueue second");
        assert!(port.writes().is_empty());

        release.send(()).unwrap();
        release.send(()).unwrap();
        assert_eq!(first.wait().await.unwrap(), Delivery::Written);
        assert_eq!(second.wait().await.unwrap(), Delivery::Written);
        assert_eq!(port.writes(), vec![b"sw i04\r\n".to_vec(), b"sw i01\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_enqueue_empty_command_is_skipped() {
        let port = RecordingPort::default();
        let (sink, _join) = start_serial_writer(port.clone());

        let pending = sink.enqueue("").expect("enqueue");
        assert_eq!(pending.wait().await.unwrap(), Delivery::Skipped);
        assert!(port.writes().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_writer() {
        let port = RecordingPort::default();
        let (sink, join) = start_serial_writer(port.clone());

        sink.shutdown().await.expect("shutdown should succeed");
        join.await.expect("writer thread should exit cleanly");

        let err = sink.send("sw i04\r\n").await.expect_err("send after shutdown should fail");
        assert!(matches!(err, SerialError::Closed));
        assert!(port.writes().is_empty());
    }
}
