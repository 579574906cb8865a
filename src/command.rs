// Input id → switcher command table. The switcher takes line-oriented
// ASCII commands, so every entry carries its own CR-LF terminator.
use tracing::warn;

/// Map an input id to the command that selects it on the switcher.
///
/// Ids outside `"1"..="4"` yield the empty string, which the serial sink
/// treats as "nothing to send".
pub fn input_to_command(input: &str) -> &'static str {
    match input {
        "1" => "sw i01\r\n",
        "2" => "sw i02\r\n",
        "3" => "sw i03\r\n",
        "4" => "sw i04\r\n",
        _ => {
            warn!(input = %input, "Invalid input received");
            ""
        }
    }
}
