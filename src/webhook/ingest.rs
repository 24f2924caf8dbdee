use crate::queue::{enqueue_json, EnqueueOptions, EnqueueOutcome, JobQueue, WEBHOOK_QUEUE};
use crate::webhook::translate::{translate, GatewayId};
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub received: usize,
    pub enqueued: usize,
    pub duplicates: usize,
    pub dropped: usize,
}

/// Pulls payment items out of a raw callback: the `pix` array, or the body
/// itself when it is a single flat payment record.
pub fn extract_items(gateway: GatewayId, body: &Value) -> Vec<Value> {
    if let Some(items) = body.get("pix").and_then(|p| p.as_array()) {
        return items.clone();
    }
    if body.is_object() && gateway.looks_like_payment(body) {
        return vec![body.clone()];
    }
    Vec::new()
}

#[derive(Clone)]
pub struct WebhookIngestor {
    pub queue: Arc<dyn JobQueue>,
}

impl WebhookIngestor {
    /// Only a queue failure is an error; anything unparseable is counted as
    /// dropped so the gateway gets its 200 and stops retrying.
    pub async fn ingest(&self, gateway: &str, body: &Value) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        let gateway_id = match GatewayId::parse(gateway) {
            Ok(g) => g,
            Err(e) => {
                tracing::error!("webhook for unconfigured gateway dropped: {}", e);
                summary.dropped = 1;
                return Ok(summary);
            }
        };

        let items = extract_items(gateway_id, body);
        if items.is_empty() {
            tracing::warn!(
                "webhook from {} has no pix list or payment record, acknowledged and dropped",
                gateway_id.as_str()
            );
            summary.dropped = 1;
            return Ok(summary);
        }

        summary.received = items.len();
        for item in items {
            let event = match translate(gateway_id.as_str(), &item) {
                Ok(ev) => ev,
                Err(e) => {
                    tracing::warn!("webhook item from {} dropped: {}", gateway_id.as_str(), e);
                    summary.dropped += 1;
                    continue;
                }
            };

            let opts = EnqueueOptions::for_queue(WEBHOOK_QUEUE).dedup(event.dedup_key());
            match enqueue_json(self.queue.as_ref(), WEBHOOK_QUEUE, &event, opts).await? {
                EnqueueOutcome::Enqueued(job_id) => {
                    tracing::info!(
                        "queued payment txid={} e2e={:?} job={}",
                        event.gateway_transaction_id,
                        event.end_to_end_id,
                        job_id
                    );
                    summary.enqueued += 1;
                }
                EnqueueOutcome::Duplicate => {
                    tracing::debug!("duplicate webhook for {}", event.dedup_key());
                    summary.duplicates += 1;
                }
            }
        }

        Ok(summary)
    }
}
