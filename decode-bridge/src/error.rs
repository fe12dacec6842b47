/// Errors surfaced to the owner of a decode session.
///
/// Per-frame problems (a rejected input buffer, a sample that could not be
/// pulled or mapped) never show up here: `exchange()` logs them and reports
/// "no frame yet" so one bad frame cannot wedge the session.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("decode pipeline construction failed: {0:#}")]
    Construction(anyhow::Error),
    #[error("decode session already stopped")]
    Stopped,
}

impl BridgeError {
    pub fn construction(err: impl Into<anyhow::Error>) -> Self {
        BridgeError::Construction(err.into())
    }
}
