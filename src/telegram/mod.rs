//! Telegram harness: long-polling loop, Bot API client, message routing.
//!
//! Images stay in memory from download to upload; nothing is written to disk.

mod client;
mod handler;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;

pub use client::{unwrap_envelope, FileTooLarge, TelegramClient};
pub use handler::{
    BotHandler, Messenger, Route, FAILURE_REPLY, FALLBACK_REPLY, START_REPLY, TOO_LARGE_REPLY,
};

/// Back-off after a failed `getUpdates`.
pub const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Poll for updates and dispatch messages until `shutdown` is set.
///
/// Updates are handled one at a time, in order.
pub fn run_polling(
    client: &mut TelegramClient,
    handler: &BotHandler,
    shutdown: &AtomicBool,
) -> Result<()> {
    let mut offset = 0i64;
    let mut handled = 0u64;

    while !shutdown.load(Ordering::SeqCst) {
        let updates = match client.get_updates(offset) {
            Ok(updates) => updates,
            Err(e) => {
                log::warn!("getUpdates failed: {:#}; retrying in {:?}", e, POLL_RETRY_DELAY);
                sleep_unless_shutdown(POLL_RETRY_DELAY, shutdown);
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            if let Err(e) = handler.handle(client, &message) {
                log::error!(
                    "failed to answer message {} in chat {}: {:#}",
                    message.message_id,
                    message.chat.id,
                    e
                );
            }
            handled += 1;
        }
    }

    log::info!("polling stopped after {} messages", handled);
    Ok(())
}

fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) {
    let step = Duration::from_millis(250);
    let mut slept = Duration::ZERO;
    while slept < total && !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(step);
        slept += step;
    }
}
