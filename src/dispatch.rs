// Shared path from a received input id to the serial sink. HTTP awaits
// `dispatch`; MQTT uses `dispatch_detached` so the event loop never waits on
// the device. Neither sees the outcome: failures end up in the log and the
// metrics, never in a response.
use crate::command::input_to_command;
use crate::metrics::Metrics;
use crate::serial::{Delivery, PendingWrite, SerialError, SerialSink};
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Http,
    Mqtt,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Http => "http",
            Source::Mqtt => "mqtt",
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    sink: SerialSink,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(sink: SerialSink, metrics: Metrics) -> Self {
        Dispatcher { sink, metrics }
    }

    pub async fn dispatch(&self, source: Source, input: &str) {
        let (command, pending) = self.enqueue(source, input);
        self.settle(command, pending).await;
    }

    /// Like `dispatch`, but returns as soon as the command is queued. The
    /// write result is logged from a separate task.
    pub fn dispatch_detached(&self, source: Source, input: &str) -> JoinHandle<()> {
        let (command, pending) = self.enqueue(source, input);
        let this = self.clone();
        tokio::spawn(async move { this.settle(command, pending).await })
    }

    fn enqueue(&self, source: Source, input: &str) -> (&'static str, Result<PendingWrite, SerialError>) {
        info!(source = source.as_str(), input = %input, "Received input");
        self.metrics.inputs_received.with_label_values(&[source.as_str()]).inc();

        let command = input_to_command(input);
        (command, self.sink.enqueue(command))
    }

    async fn settle(&self, command: &'static str, pending: Result<PendingWrite, SerialError>) {
        let res = match pending {
            Ok(pending) => pending.wait().await,
            Err(e) => Err(e),
        };
        match res {
            Ok(Delivery::Written) => {
                self.metrics.commands_sent.inc();
                info!(command = ?command, "Command sent successfully");
            }
            Ok(Delivery::Skipped) => self.metrics.commands_skipped.inc(),
            Err(e) => {
                self.metrics.serial_write_errors.inc();
                error!(command = ?command, error = %e, "Failed to send command");
            }
        }
    }
}
