//! Inbound dispatch loop.
//!
//! Reads the transport stream in order and hands each message to a bounded
//! pool of tasks. Messages from one sender are chained so they are handled in
//! arrival order; different senders run in parallel. Delivery failures and
//! transport errors are logged and the loop keeps going; it ends when the
//! stream closes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chatrelay_core::channel::{Channel, InboundMessage, UserId};
use chatrelay_core::error::ChannelError;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::router::MessageRouter;

pub struct Dispatcher {
    router: Arc<MessageRouter>,
    channel: Arc<dyn Channel>,
    workers: Arc<Semaphore>,
    worker_count: usize,
}

impl Dispatcher {
    /// `workers` bounds how many messages are handled at once (minimum 1).
    pub fn new(router: Arc<MessageRouter>, channel: Arc<dyn Channel>, workers: usize) -> Self {
        let worker_count = workers.max(1);
        Self {
            router,
            channel,
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
        }
    }

    /// Consume `inbound` until it closes, then wait for in-flight messages.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Result<InboundMessage, ChannelError>>) {
        info!(workers = self.worker_count, channel = self.channel.name(), "Dispatcher started");
        let mut tasks = JoinSet::new();
        // Completion signal of each sender's most recent message.
        let mut tails: HashMap<UserId, oneshot::Receiver<()>> = HashMap::new();

        while let Some(item) = inbound.recv().await {
            let message = match item {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Transport error");
                    continue;
                }
            };

            let Ok(permit) = self.workers.clone().acquire_owned().await else {
                break;
            };

            tails.retain(|_, done| matches!(done.try_recv(), Err(TryRecvError::Empty)));
            let (finished, done) = oneshot::channel();
            let previous = tails.insert(message.sender_id, done);

            let router = self.router.clone();
            let channel = self.channel.clone();
            tasks.spawn(async move {
                // Resolves on completion, or with an error if that task panicked.
                if let Some(previous) = previous {
                    let _ = previous.await;
                }
                handle_one(&router, channel.as_ref(), message).await;
                drop(permit);
                let _ = finished.send(());
            });

            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    error!(error = %e, "Message task panicked");
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!(error = %e, "Message task panicked");
            }
        }
        info!("Dispatcher stopped");
    }
}

async fn handle_one(router: &MessageRouter, channel: &dyn Channel, message: InboundMessage) {
    let started = Instant::now();

    if let Some(reply) = router.handle(&message).await {
        if let Err(e) = channel.send(&reply).await {
            error!(
                chat_id = reply.chat_id,
                channel = channel.name(),
                error = %e,
                "Failed to deliver reply"
            );
        }
    }

    chatrelay_telemetry::record_response_time(started.elapsed());
}
