//! Long-polling loop that turns platform updates into queued jobs.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::admin::AdminCommand;
use crate::telegram::{TelegramClient, Update};
use crate::worker::{Job, PipelineQueue};

/// Maps an update to a job. Admin commands are honoured only from direct
/// messages and, when `admin_ids` is non-empty, only from listed users.
pub fn route_update(update: Update, admin_ids: &[i64]) -> Option<Job> {
    if let Some(message) = &update.message {
        if let Some(command) = message.text.as_deref().and_then(AdminCommand::parse) {
            let sender = message.from.as_ref().map(|u| u.id);
            let allowed =
                admin_ids.is_empty() || sender.is_some_and(|id| admin_ids.contains(&id));
            if !allowed {
                warn!(?sender, "Admin command from unauthorized user ignored");
                return None;
            }
            return Some(Job::Admin {
                chat_id: message.chat.id,
                command,
            });
        }
    }

    let message = update.into_message()?;
    Some(Job::Message(message.into_inbound()))
}

/// Polls forever. Transport failures are logged and retried after `backoff`.
pub async fn run(
    client: &TelegramClient,
    queue: &PipelineQueue,
    admin_ids: &[i64],
    poll_timeout_secs: u64,
    backoff: Duration,
) -> anyhow::Result<()> {
    let mut offset = 0i64;
    info!("Bot started polling");
    loop {
        let updates = match client.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, backoff_secs = backoff.as_secs(), "Polling failed; retrying");
                sleep(backoff).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            debug!(update_id = update.update_id, "Update received");
            if let Some(job) = route_update(update, admin_ids) {
                queue.submit(job).await?;
            }
        }
    }
}
