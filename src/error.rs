use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown payment gateway: {0}")]
    UnknownGateway(String),
    #[error("malformed payment payload: {0}")]
    MalformedPayload(String),
    #[error("job queue unavailable: {0}")]
    QueueUnavailable(String),
    #[error("provider call timed out after {0:?}")]
    ProviderTimeout(Duration),
}

impl PipelineError {
    pub fn is_queue_unavailable(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::QueueUnavailable(_)))
    }
}
