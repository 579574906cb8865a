// Command line configuration. Every flag can also come from the
// environment so the service drops into a systemd unit or a container
// without a wrapper script.
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "hdmi-switch-bridge")]
#[command(author, version, about = "Bridge HTTP and MQTT input selection to a serial HDMI switcher", long_about = None)]
pub struct Args {
    /// Path to the serial port.
    #[arg(long, env = "SERIAL_PATH", default_value = "/dev/ttyUSB0")]
    pub serial_path: String,

    /// Connection string for the MQTT broker, including protocol and port.
    #[arg(long, env = "MQTT_BROKER", default_value = "tcp://10.0.89.54:1883")]
    pub mqtt_broker: String,

    /// MQTT topic to subscribe to for HDMI input switching.
    #[arg(long, env = "MQTT_TOPIC", default_value = "hdmi-switch/input")]
    pub mqtt_topic: String,

    /// MQTT client id.
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "hdmi-switcher")]
    pub mqtt_client_id: String,

    /// MQTT user name. Only used together with `--mqtt-pass`.
    #[arg(long, env = "MQTT_USER")]
    pub mqtt_user: Option<String>,

    /// MQTT password.
    #[arg(long, env = "MQTT_PASS", hide_env_values = true)]
    pub mqtt_pass: Option<String>,

    /// Port for the HTTP server to listen on.
    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,
}
