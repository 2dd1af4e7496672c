use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::admin::AdminCommand;
use crate::message::{InboundMessage, Replier};
use crate::pipeline::Pipeline;
use crate::rules::RuleStore;

#[derive(Debug)]
pub enum Job {
    Message(InboundMessage),
    Admin { chat_id: i64, command: AdminCommand },
}

/// Sending half of the single-worker queue. Jobs run strictly one at a time
/// in submission order.
#[derive(Clone)]
pub struct PipelineQueue {
    sender: mpsc::Sender<Job>,
}

impl PipelineQueue {
    /// Spawns the worker task. It exits once every queue handle is dropped
    /// and the remaining jobs are drained.
    pub fn spawn(
        pipeline: Arc<Pipeline>,
        rules: Arc<dyn RuleStore>,
        replier: Arc<dyn Replier>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let worker = Worker {
            pipeline,
            rules,
            replier,
        };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender }, handle)
    }

    /// Closes the queue, waits for the worker to drain it and reports whether
    /// the worker ended cleanly. A worker panic is logged here.
    pub async fn shutdown(self, worker: JoinHandle<()>) -> bool {
        drop(self);
        match worker.await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Pipeline worker ended abnormally");
                false
            }
        }
    }

    /// Waits for queue space; fails only if the worker has stopped.
    pub async fn submit(&self, job: Job) -> anyhow::Result<()> {
        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("pipeline worker has stopped"))
    }
}

struct Worker {
    pipeline: Arc<Pipeline>,
    rules: Arc<dyn RuleStore>,
    replier: Arc<dyn Replier>,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<Job>) {
        info!("Pipeline worker started");
        while let Some(job) = receiver.recv().await {
            self.handle(job).await;
        }
        info!("Pipeline worker stopped");
    }

    async fn handle(&self, job: Job) {
        match job {
            Job::Message(message) => {
                let report = self.pipeline.process(&message).await;
                info!(
                    chat_id = message.chat_id,
                    deliveries = report.deliveries().len(),
                    "Message processed"
                );
            }
            Job::Admin { chat_id, command } => {
                let rules = Arc::clone(&self.rules);
                let cmd = command.clone();
                let reply = match tokio::task::spawn_blocking(move || cmd.execute(rules.as_ref())).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!(error = %e, "Admin command task failed");
                        return;
                    }
                };
                if let Err(e) = self.replier.reply(chat_id, &reply).await {
                    warn!(chat_id, error = %e, ?command, "Failed to send admin reply");
                }
            }
        }
    }
}
