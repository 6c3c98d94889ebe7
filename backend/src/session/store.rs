use shared::{PipelineEvent, PipelineState, RunId, TransitionError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::preprocess::NormalizedImage;

#[derive(Default)]
struct Session {
    state: PipelineState,
    image: Option<Arc<NormalizedImage>>,
}

/// Per-user pipeline sessions.
///
/// Every method takes the lock for the duration of one state change only, so
/// callers must not hold results across an upstream call and expect them to
/// still be current.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new run for `user_id`, superseding whatever was in flight.
    pub fn begin_run(&self, user_id: Uuid) -> RunId {
        let run_id = RunId::new();
        let mut sessions = self.lock();
        let session = sessions.entry(user_id).or_default();
        if let Some(previous) = session.state.run_id() {
            log::info!("Run {} for user {} superseded by {}", previous, user_id, run_id);
        }
        session.image = None;
        match session.state.apply(PipelineEvent::ImageSelected { run_id }) {
            Ok(state) => session.state = state,
            Err(e) => log::error!("Image selection rejected for user {}: {}", user_id, e),
        }
        run_id
    }

    pub fn apply(
        &self,
        user_id: Uuid,
        event: PipelineEvent,
    ) -> Result<PipelineState, TransitionError> {
        let mut sessions = self.lock();
        let session = sessions.entry(user_id).or_default();
        let event_name = event.name();

        match session.state.apply(event) {
            Ok(next) => {
                log::info!(
                    "User {} pipeline: {} --{}--> {}",
                    user_id,
                    session.state.name(),
                    event_name,
                    next.name()
                );
                session.state = next.clone();
                if !next.holds_image() {
                    session.image = None;
                }
                Ok(next)
            }
            Err(e @ TransitionError::Stale { .. }) => {
                log::warn!("Dropping stale {} for user {}: {}", event_name, user_id, e);
                Err(e)
            }
            Err(e) => {
                log::warn!("Rejected {} for user {}: {}", event_name, user_id, e);
                Err(e)
            }
        }
    }

    /// Keeps the normalized image for the current run.
    pub fn attach_image(
        &self,
        user_id: Uuid,
        run_id: RunId,
        image: Arc<NormalizedImage>,
    ) -> Result<(), TransitionError> {
        let mut sessions = self.lock();
        let session = sessions.entry(user_id).or_default();
        let current = session.state.run_id();
        if current != Some(run_id) {
            return Err(TransitionError::Stale {
                current,
                received: run_id,
            });
        }
        if session.state.holds_image() {
            session.image = Some(image);
        }
        Ok(())
    }

    pub fn image_for(&self, user_id: Uuid, run_id: RunId) -> Option<Arc<NormalizedImage>> {
        let sessions = self.lock();
        let session = sessions.get(&user_id)?;
        if session.state.run_id() != Some(run_id) {
            return None;
        }
        session.image.clone()
    }

    pub fn state(&self, user_id: Uuid) -> PipelineState {
        self.lock()
            .get(&user_id)
            .map(|session| session.state.clone())
            .unwrap_or_default()
    }

    /// State of `run_id` if it is still the user's current run.
    pub fn snapshot(&self, user_id: Uuid, run_id: RunId) -> Option<PipelineState> {
        let state = self.state(user_id);
        (state.run_id() == Some(run_id)).then_some(state)
    }

    pub fn reset(&self, user_id: Uuid) {
        if let Some(session) = self.lock().remove(&user_id) {
            if let Some(run_id) = session.state.run_id() {
                log::info!("User {} reset run {}", user_id, run_id);
            }
        }
    }
}
