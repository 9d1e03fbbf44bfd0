//! Line-oriented remote command reader.
//!
//! Each input line is parsed as a [`RemoteCommand`] and queued.  Bad
//! lines are logged and skipped.  `#` starts a comment.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};

use crate::app::commands::{Intent, RemoteCommand};
use crate::events::IntentQueue;
use crate::runtime::ShutdownSignal;

/// Feed commands from `reader` into the queue until end of input or
/// shutdown.  Returns how many commands were accepted.
pub fn read_commands<R: BufRead>(reader: R, queue: &IntentQueue, shutdown: &ShutdownSignal) -> usize {
    let mut accepted = 0;
    for line in reader.lines() {
        if shutdown.is_triggered() {
            break;
        }
        let Ok(line) = line else {
            warn!("REMOTE | input error, reader stopping");
            break;
        };
        let text = line.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        match text.parse::<RemoteCommand>() {
            Ok(cmd) => {
                info!("REMOTE | {:?}", cmd);
                if queue.submit(Intent::Remote(cmd)).is_ok() {
                    accepted += 1;
                }
            }
            Err(e) => warn!("REMOTE | '{}': {}", text, e),
        }
    }
    accepted
}

/// Read commands from stdin on a background thread.
///
/// A blocked stdin read cannot be interrupted; the thread is left to end
/// with the process.
pub fn spawn_console(queue: Arc<IntentQueue>, shutdown: ShutdownSignal) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("remote-console".into()).spawn(move || {
        let stdin = std::io::stdin();
        let n = read_commands(stdin.lock(), &queue, &shutdown);
        info!("REMOTE | console closed after {} command(s)", n);
    })
}
