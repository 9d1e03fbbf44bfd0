//! Fuzz target: `RemoteCommand::from_str`
//!
//! Feeds arbitrary text to the remote command parser.  It must never
//! panic, and any run length it accepts must be the one in the line.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use poolctl::app::commands::RemoteCommand;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(RemoteCommand::PumpOn { hours: Some(h) } | RemoteCommand::SpaOn { hours: Some(h) }) =
        line.parse::<RemoteCommand>()
    {
        assert!(
            line.split_whitespace().any(|w| w.parse::<u8>() == Ok(h)),
            "hours {h} not present in {line:?}"
        );
    }
});
