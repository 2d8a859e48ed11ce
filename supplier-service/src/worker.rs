use std::sync::Arc;
use std::time::Duration;
use supplier_core::{
    ChannelError, Delivery, Lane, LaneSubscriber, LaneSubscription, MutationCommand, StoreError,
    SupplierFields, SupplierRepository,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::metrics::ConsumerMetrics;

/// How a single delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Applied to the store and acknowledged.
    Applied,
    /// Store write failed; message handed back for redelivery.
    Requeued,
    /// Undecodable or on the wrong lane; acknowledged without applying.
    Poison,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Requeued => "requeued",
            Outcome::Poison => "poison",
        }
    }
}

/// Drains the three command lanes into the record store.
///
/// Each lane gets its own loop; within a lane messages are handled strictly one at a
/// time, and a message is acknowledged only after its statement has succeeded.
pub struct MutationConsumer {
    repo: Arc<dyn SupplierRepository>,
    subscriber: Arc<dyn LaneSubscriber>,
    metrics: Option<ConsumerMetrics>,
    retry_backoff: Duration,
}

impl MutationConsumer {
    pub fn new(
        repo: Arc<dyn SupplierRepository>,
        subscriber: Arc<dyn LaneSubscriber>,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            repo,
            subscriber,
            metrics: None,
            retry_backoff,
        }
    }

    pub fn with_metrics(mut self, metrics: ConsumerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start one task per lane. Tasks exit once `shutdown` flips to `true`.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        Lane::ALL
            .into_iter()
            .map(|lane| {
                let consumer = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { consumer.run_lane(lane, shutdown).await })
            })
            .collect()
    }

    pub async fn run_lane(&self, lane: Lane, mut shutdown: watch::Receiver<bool>) {
        while let Some(mut subscription) = self.subscribe(lane, &mut shutdown).await {
            info!("Mutation consumer listening on lane {}", lane);
            if !self.drain(subscription.as_mut(), &mut shutdown).await {
                break;
            }
            // Dropping the subscription gives up its position; the next one resumes from
            // the last acknowledged message
            warn!("Resubscribing to lane {}", lane);
        }

        info!("Mutation consumer on lane {} stopped", lane);
    }

    /// Consume until shutdown or until the subscription can no longer be trusted.
    ///
    /// Returns `true` when the caller must resubscribe.
    async fn drain(
        &self,
        subscription: &mut dyn LaneSubscription,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let lane = subscription.lane();
        loop {
            if *shutdown.borrow() {
                return false;
            }

            let delivery = tokio::select! {
                biased;
                _ = shutdown.changed() => return false,
                delivery = subscription.next() => delivery,
            };

            match delivery {
                Ok(delivery) => match self.handle(subscription, delivery).await {
                    Ok(Outcome::Requeued) => {
                        if !self.backoff(shutdown).await {
                            return false;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Acking anything later would commit past the failed message
                        error!("Nack failed on lane {}, abandoning subscription: {}", lane, e);
                        return true;
                    }
                },
                Err(ChannelError::Closed(_)) => {
                    warn!("Lane {} closed by the broker", lane);
                    return false;
                }
                Err(e) => {
                    error!("Receive failed on lane {}: {}", lane, e);
                    if !self.backoff(shutdown).await {
                        return false;
                    }
                }
            }
        }
    }

    /// Wait out the retry backoff. Returns `false` if shutdown fired first.
    async fn backoff(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = shutdown.changed() => false,
            _ = sleep(self.retry_backoff) => true,
        }
    }

    async fn subscribe(
        &self,
        lane: Lane,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Box<dyn LaneSubscription>> {
        loop {
            if *shutdown.borrow() {
                return None;
            }
            match self.subscriber.subscribe(lane).await {
                Ok(subscription) => return Some(subscription),
                Err(e) => {
                    error!("Cannot subscribe to lane {}: {}", lane, e);
                    if !self.backoff(shutdown).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Settle one delivery: apply then ack, or nack on store failure.
    ///
    /// Fails only when a nack could not be delivered, in which case the message is still
    /// outstanding on this subscription.
    pub async fn handle(
        &self,
        subscription: &mut dyn LaneSubscription,
        delivery: Delivery,
    ) -> Result<Outcome, ChannelError> {
        let lane = subscription.lane();
        let tag = delivery.tag;

        let outcome = match MutationCommand::decode_for_lane(&delivery.payload, lane) {
            Err(e) => {
                // Would fail forever; ack so the lane keeps moving
                error!(
                    "Dropping poison message on lane {} at offset {}: {}",
                    lane, tag.offset, e
                );
                if let Err(e) = subscription.ack(tag).await {
                    warn!("Ack of poison message failed on lane {}: {}", lane, e);
                }
                Outcome::Poison
            }
            Ok(command) => match self.apply(&command).await {
                Ok(()) => {
                    if let Err(e) = subscription.ack(tag).await {
                        // Applied but not acked: it may be delivered again
                        warn!("Ack failed on lane {} at offset {}: {}", lane, tag.offset, e);
                    }
                    Outcome::Applied
                }
                Err(e) => {
                    warn!(
                        "Store write failed on lane {} at offset {}, requeueing: {}",
                        lane, tag.offset, e
                    );
                    subscription.nack(tag).await?;
                    Outcome::Requeued
                }
            },
        };

        if let Some(metrics) = &self.metrics {
            metrics.record(lane, outcome);
        }
        Ok(outcome)
    }

    /// Run the single statement a command maps to.
    pub async fn apply(&self, command: &MutationCommand) -> Result<(), StoreError> {
        match command {
            MutationCommand::Create {
                company_name,
                contact_person,
                phone,
            } => {
                let fields = SupplierFields::new(company_name, contact_person, phone);
                let id = self.repo.insert_supplier(&fields).await?;
                info!("Supplier created: {}", id);
            }
            MutationCommand::Update {
                id,
                company_name,
                contact_person,
                phone,
            } => {
                let fields = SupplierFields::new(company_name, contact_person, phone);
                let rows = self.repo.update_supplier(*id, &fields).await?;
                if rows == 0 {
                    debug!("Update for missing supplier {} matched no rows", id);
                }
                info!("Supplier updated: {}", id);
            }
            MutationCommand::Delete { id } => {
                let rows = self.repo.delete_supplier(*id).await?;
                if rows == 0 {
                    debug!("Delete for missing supplier {} matched no rows", id);
                }
                info!("Supplier deleted: {}", id);
            }
        }
        Ok(())
    }
}
