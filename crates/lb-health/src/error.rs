/// Surfaces only as a failed probe for the current tick; never escapes the
/// checker's own task.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("probe request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("probe body missing the literal substring \"healthy\"")]
    NotHealthy,
}
