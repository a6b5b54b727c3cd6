use crate::caching::ResolveError;

/// Phase of an image resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPhase {
    /// No work has started yet.
    Idle,
    /// A candidate URL is being attempted.
    Loading,
    /// All candidates failed; waiting out the backoff before the next pass.
    Retrying,
    /// A candidate rendered successfully.
    Loaded,
    /// The resolution gave up.
    Failed,
}

impl ResolutionPhase {
    /// Terminal phases are only left via a manual retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolutionPhase::Loaded | ResolutionPhase::Failed)
    }
}

/// Observable snapshot of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionState {
    pub phase: ResolutionPhase,
    /// Position of the current attempt in the candidate list.
    pub attempt_index: usize,
    /// Completed full passes over the candidate list.
    pub retry_count: u32,
    /// The URL that rendered, set only in `Loaded`.
    pub resolved_url: Option<String>,
    /// The terminal failure, set only in `Failed`.
    pub error: Option<ResolveError>,
}

impl ResolutionState {
    pub(crate) fn idle() -> Self {
        Self {
            phase: ResolutionPhase::Idle,
            attempt_index: 0,
            retry_count: 0,
            resolved_url: None,
            error: None,
        }
    }

    pub(crate) fn loading(attempt_index: usize, retry_count: u32) -> Self {
        Self {
            phase: ResolutionPhase::Loading,
            attempt_index,
            retry_count,
            ..Self::idle()
        }
    }

    pub(crate) fn retrying(retry_count: u32) -> Self {
        Self {
            phase: ResolutionPhase::Retrying,
            retry_count,
            ..Self::idle()
        }
    }

    pub(crate) fn loaded(url: String) -> Self {
        Self {
            phase: ResolutionPhase::Loaded,
            resolved_url: Some(url),
            ..Self::idle()
        }
    }

    pub(crate) fn failed(error: ResolveError) -> Self {
        Self {
            phase: ResolutionPhase::Failed,
            error: Some(error),
            ..Self::idle()
        }
    }
}
