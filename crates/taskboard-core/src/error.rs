use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} lock poisoned by a panicked writer")]
    Poisoned(&'static str),
    #[error("invalid store config: {0}")]
    InvalidConfig(String),
    #[error("reaper task failed: {0}")]
    Reaper(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Reaper(e.to_string())
    }
}
