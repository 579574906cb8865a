// Prometheus counters shared by the HTTP and MQTT paths.
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

#[derive(Clone)]
pub struct Metrics {
    pub inputs_received: IntCounterVec,
    pub commands_sent: IntCounter,
    pub commands_skipped: IntCounter,
    pub serial_write_errors: IntCounter,
}

impl Metrics {
    /// Create the counters and register them with `registry`.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let inputs_received = IntCounterVec::new(
            Opts::new("inputs_received_total", "Input selections received, by source"),
            &["source"],
        )?;
        let commands_sent = IntCounter::new("commands_sent_total", "Commands written to the switcher")?;
        let commands_skipped = IntCounter::new("commands_skipped_total", "Invalid inputs that produced no command")?;
        let serial_write_errors = IntCounter::new("serial_write_errors_total", "Failed writes to the serial port")?;

        registry.register(Box::new(inputs_received.clone()))?;
        registry.register(Box::new(commands_sent.clone()))?;
        registry.register(Box::new(commands_skipped.clone()))?;
        registry.register(Box::new(serial_write_errors.clone()))?;

        Ok(Metrics {
            inputs_received,
            commands_sent,
            commands_skipped,
            serial_write_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_fails() {
        let registry = Registry::new();
        Metrics::register(&registry).expect("first registration");
        assert!(Metrics::register(&registry).is_err(), "duplicate counters must be rejected");
    }
}
