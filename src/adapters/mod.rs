//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                  |
//! |---------------|---------------------|------------------------------|
//! | `config_file` | ConfigPort          | JSON file on disk            |
//! | `console`     | (intent producer)   | stdin remote command lines   |
//! | `gpio`        | OutputPin           | `/sys/class/gpio` outputs    |
//! |               | ButtonPort          | `/sys/class/gpio` inputs     |
//! | `host`        | HostPowerPort       | `systemctl poweroff/reboot`  |
//! | `lcd`         | DisplayPort         | Serial 20×4 character LCD    |
//! | `log_sink`    | DisplayPort         | Log output (virtual screen)  |
//! |               | StatusSink          | In-memory key/value store    |
//! | `time`        | ClockPort           | Host clocks / manual clock   |
//!
//! The one-wire [`TemperatureBus`](crate::app::ports::TemperatureBus)
//! backends live with the sampler in [`crate::sensors::onewire`].

pub mod config_file;
pub mod console;
pub mod gpio;
pub mod host;
pub mod lcd;
pub mod log_sink;
pub mod time;
