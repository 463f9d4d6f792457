use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub max_sessions: usize,
    pub transcription_lease_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            transcription_lease_timeout: Duration::from_secs(5),
        }
    }
}
