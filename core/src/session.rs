use serde::{Deserialize, Serialize};
use web_time::{Duration, Instant};

use crate::*;

/// Delay between taking the selfie and showing the grid.
pub const SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Delay between a verification request and its verdict.
pub const EVALUATION_DELAY: Duration = Duration::from_millis(400);

/// Interval of the mask repositioning over the camera preview.
pub const MASK_INTERVAL: Duration = Duration::from_millis(250);

/// Valid transitions:
/// - Loading -> Ready
/// - Ready -> TakingSelfie
/// - TakingSelfie -> SelfieCompleted
/// - SelfieCompleted -> SelectingGrid
/// - SelfieCompleted | SelectingGrid -> Verifying
/// - SelfieCompleted | SelectingGrid -> UserBlocked
/// - Verifying -> Verified
/// - Verifying -> VerificationFailed
/// - VerificationFailed -> Loading
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptchaState {
    /// Initial state, waiting for a camera stream
    Loading,
    /// Camera preview is live
    Ready,
    /// Selfie taken, grid about to be shown
    TakingSelfie,
    /// Grid shown, nothing selected yet
    SelfieCompleted,
    /// At least one cell was toggled
    SelectingGrid,
    /// Waiting for the verdict
    Verifying,
    /// Operator passed, no further moves
    Verified,
    /// Operator failed, may regenerate
    VerificationFailed,
    /// Too many attempts, no further moves
    UserBlocked,
}

impl CaptchaState {
    /// Indicates the session has ended and no intents are accepted anymore
    pub const fn is_final(self) -> bool {
        use CaptchaState::*;
        match self {
            Loading => false,
            Ready => false,
            TakingSelfie => false,
            SelfieCompleted => false,
            SelectingGrid => false,
            Verifying => false,
            Verified => true,
            VerificationFailed => false,
            UserBlocked => true,
        }
    }

    /// Whether the grid accepts toggles and verification
    pub const fn accepts_selection(self) -> bool {
        matches!(self, Self::SelfieCompleted | Self::SelectingGrid)
    }

    /// Whether the preview mask keeps moving
    pub const fn moves_mask(self) -> bool {
        matches!(self, Self::Ready | Self::TakingSelfie)
    }
}

impl Default for CaptchaState {
    fn default() -> Self {
        Self::Loading
    }
}

/// Requests the presentation layer forwards into the session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    ConnectCamera,
    Continue,
    ToggleCell(CellIndex),
    Verify,
    Regenerate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SessionTimer {
    MaskShuffle,
    SelfieSettled,
    VerdictReady,
}

/// Read-only projection of a session for rendering.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct CaptchaView<'a> {
    pub state: CaptchaState,
    pub target: Option<Shape>,
    #[serde(skip)]
    pub photo: Option<&'a PhotoData>,
    pub photo_len: Option<usize>,
    pub cells: Option<&'a [GridCell]>,
    pub theme: Option<MaskTheme>,
    pub mask_offset: MaskOffset,
    pub attempts: u32,
    pub attempts_left: u32,
    pub verdict: Option<Verdict>,
    pub error: Option<CaptchaError>,
}

/// Drives one captcha from camera preview to verdict.
///
/// All changes happen either in an intent method or in [`CaptchaSession::poll`], which
/// fires the timers that became due on the session clock.
pub struct CaptchaSession<C: Camera, R: RandomSource, K: Clock = SystemClock> {
    camera: C,
    stream: Option<C::Stream>,
    rng: R,
    clock: K,
    policy: Policy,
    state: CaptchaState,
    challenge: Option<Challenge>,
    photo: Option<PhotoData>,
    attempts: u32,
    pending_verdict: Option<Verdict>,
    verdict: Option<Verdict>,
    last_error: Option<CaptchaError>,
    mask_offset: MaskOffset,
    mask_timer: Option<TimerHandle>,
    scheduler: Scheduler<SessionTimer>,
    closed: bool,
}

impl<C: Camera, R: RandomSource> CaptchaSession<C, R, SystemClock> {
    pub fn new(camera: C, policy: Policy, rng: R) -> Result<Self> {
        Self::with_clock(camera, policy, rng, SystemClock)
    }
}

impl<C: Camera, R: RandomSource, K: Clock> CaptchaSession<C, R, K> {
    /// Creates the session in `Loading` and immediately asks the camera for a stream.
    ///
    /// A camera failure does not fail construction, it is kept as [`Self::last_error`]
    /// and the session stays in `Loading` until [`Self::connect_camera`] succeeds.
    pub fn with_clock(camera: C, policy: Policy, rng: R, clock: K) -> Result<Self> {
        policy.validate()?;
        let mut session = Self {
            camera,
            stream: None,
            rng,
            clock,
            policy,
            state: Default::default(),
            challenge: None,
            photo: None,
            attempts: 0,
            pending_verdict: None,
            verdict: None,
            last_error: None,
            mask_offset: Default::default(),
            mask_timer: None,
            scheduler: Scheduler::new(),
            closed: false,
        };
        // failure is recorded in last_error
        let _ = session.enter_loading();
        Ok(session)
    }

    pub fn state(&self) -> CaptchaState {
        self.state
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn photo(&self) -> Option<&PhotoData> {
        self.photo.as_ref()
    }

    /// Completed verification attempts.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Verifications that can still be requested before the lockout.
    pub fn attempts_left(&self) -> u32 {
        self.policy.max_tries.saturating_sub(self.attempts + 1)
    }

    pub fn mask_offset(&self) -> MaskOffset {
        self.mask_offset
    }

    /// Verdict of the last finished verification.
    pub fn last_verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    /// Last problem reported to the presentation layer, cleared by the next success.
    pub fn last_error(&self) -> Option<&CaptchaError> {
        self.last_error.as_ref()
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    /// When [`Self::poll`] next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn view(&self) -> CaptchaView<'_> {
        CaptchaView {
            state: self.state,
            target: self.challenge.as_ref().map(Challenge::target),
            photo: self.photo.as_ref(),
            photo_len: self.photo.as_ref().map(PhotoData::len),
            cells: self.challenge.as_ref().map(Challenge::as_slice),
            theme: self.challenge.as_ref().map(Challenge::theme),
            mask_offset: self.mask_offset,
            attempts: self.attempts,
            attempts_left: self.attempts_left(),
            verdict: self.verdict,
            error: self.last_error,
        }
    }

    /// Retries the camera while still in `Loading`.
    pub fn connect_camera(&mut self) -> Result<CaptchaState> {
        self.check(Intent::ConnectCamera, |state| {
            matches!(state, CaptchaState::Loading)
        })?;
        self.enter_loading()?;
        Ok(self.state)
    }

    /// Takes the selfie and prepares a new challenge.
    pub fn proceed(&mut self) -> Result<CaptchaState> {
        use CaptchaState::*;

        self.check(Intent::Continue, |state| matches!(state, Ready))?;
        let Some(stream) = self.stream.take() else {
            log::error!("Ready without a camera stream");
            return Err(self.report(CapabilityError::Unavailable.into()));
        };

        self.set_state(TakingSelfie);
        let photo = self.camera.capture_frame(&stream);
        self.camera.release_stream(stream);
        log::debug!("Captured {:?}, camera released", photo);
        self.photo = Some(photo);
        self.challenge = Some(self.rng.generate());

        let due = self.clock.now() + SETTLE_DELAY;
        self.scheduler.once(SessionTimer::SelfieSettled, due);
        Ok(self.state)
    }

    /// Flips the mark of a cell, cells without a shape are ignored.
    pub fn toggle_cell(&mut self, index: CellIndex) -> Result<MarkOutcome> {
        self.check(Intent::ToggleCell(index), CaptchaState::accepts_selection)?;
        let Some(challenge) = self.challenge.as_mut() else {
            return Err(self.reject(Intent::ToggleCell(index)));
        };

        let outcome = match challenge.toggle(index) {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.report(err)),
        };
        log::debug!("toggle cell {}: {:?}", index, outcome);
        if outcome.has_update() {
            self.set_state(CaptchaState::SelectingGrid);
        }
        Ok(outcome)
    }

    /// Scores the grid, or blocks the operator once the attempt limit is reached.
    ///
    /// The verdict only becomes visible when [`EVALUATION_DELAY`] has passed.
    pub fn verify(&mut self) -> Result<CaptchaState> {
        use CaptchaState::*;

        self.check(Intent::Verify, CaptchaState::accepts_selection)?;

        if self.attempts + 1 >= self.policy.max_tries {
            log::info!(
                "Blocking operator after {} attempts, limit {}",
                self.attempts,
                self.policy.max_tries
            );
            self.last_error = Some(CaptchaError::LockedOut {
                attempts: self.attempts,
            });
            self.set_state(UserBlocked);
            return Ok(self.state);
        }

        let Some(challenge) = self.challenge.as_ref() else {
            return Err(self.reject(Intent::Verify));
        };
        let verdict = score(challenge, self.attempts, &self.policy);
        self.attempts += 1;
        self.pending_verdict = Some(verdict);

        let due = self.clock.now() + EVALUATION_DELAY;
        self.scheduler.once(SessionTimer::VerdictReady, due);
        self.set_state(Verifying);
        Ok(self.state)
    }

    /// Throws the failed round away and starts over from the camera.
    pub fn regenerate(&mut self) -> Result<CaptchaState> {
        use CaptchaState::*;

        self.check(Intent::Regenerate, |state| {
            matches!(state, VerificationFailed)
        })?;
        self.scheduler.cancel_all();
        self.challenge = None;
        self.photo = None;
        self.verdict = None;
        self.set_state(Loading);
        // failure is recorded in last_error, the session stays in Loading
        let _ = self.enter_loading();
        Ok(self.state)
    }

    /// Fires every timer due at the current clock time, returning how many fired.
    pub fn poll(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while let Some(task) = self.scheduler.pop_due(now) {
            log::trace!("timer fired: {:?}", task);
            self.run_timer(task);
            fired += 1;
        }
        fired
    }

    /// Cancels every timer and releases the camera. Intents are rejected afterwards.
    pub fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let cancelled = self.scheduler.cancel_all();
        self.mask_timer = None;
        self.pending_verdict = None;
        let released = match self.stream.take() {
            Some(stream) => {
                self.camera.release_stream(stream);
                true
            }
            None => false,
        };
        log::debug!(
            "Torn down in {:?}, cancelled {} timers, released camera: {}",
            self.state,
            cancelled,
            released
        );
    }

    fn run_timer(&mut self, task: SessionTimer) {
        use CaptchaState::*;
        match (task, self.state) {
            (SessionTimer::MaskShuffle, state) if state.moves_mask() => {
                self.mask_offset = MaskOffset {
                    top: self.rng.below(u32::from(MaskOffset::MAX_TOP) + 1) as u16,
                    left: self.rng.below(u32::from(MaskOffset::MAX_LEFT) + 1) as u16,
                };
                log::trace!("mask moved to {:?}", self.mask_offset);
            }
            (SessionTimer::SelfieSettled, TakingSelfie) => {
                self.set_state(SelfieCompleted);
            }
            (SessionTimer::VerdictReady, Verifying) => {
                let Some(verdict) = self.pending_verdict.take() else {
                    log::error!("Verdict timer fired without a verdict");
                    return;
                };
                log::debug!("verdict: {:?}", verdict);
                self.verdict = Some(verdict);
                self.set_state(if verdict.pass {
                    Verified
                } else {
                    VerificationFailed
                });
            }
            (task, state) => {
                log::warn!("Ignoring stale timer {:?} in {:?}", task, state);
            }
        }
    }

    /// Entry action of `Loading`: acquire the camera unless a stream is already held.
    fn enter_loading(&mut self) -> Result<()> {
        if self.stream.is_none() {
            match self.camera.acquire_stream(CaptureRequest::PREVIEW) {
                Ok(stream) => self.stream = Some(stream),
                Err(err) => {
                    log::warn!("Could not acquire camera: {}", err);
                    return Err(self.report(err.into()));
                }
            }
        }
        self.last_error = None;
        self.set_state(CaptchaState::Ready);
        Ok(())
    }

    fn set_state(&mut self, next: CaptchaState) {
        if self.state == next {
            return;
        }
        log::debug!("state: {:?} -> {:?}", self.state, next);
        let was_moving = self.state.moves_mask();
        self.state = next;

        match (was_moving, next.moves_mask()) {
            (false, true) => {
                let first_due = self.clock.now() + MASK_INTERVAL;
                let handle = self
                    .scheduler
                    .every(SessionTimer::MaskShuffle, first_due, MASK_INTERVAL);
                self.mask_timer = Some(handle);
            }
            (true, false) => {
                if let Some(handle) = self.mask_timer.take() {
                    self.scheduler.cancel(handle);
                }
            }
            _ => {}
        }

        if next.is_final() {
            log::info!("Session finished: {:?} after {} attempts", next, self.attempts);
        }
    }

    fn check(&mut self, intent: Intent, allowed: impl FnOnce(CaptchaState) -> bool) -> Result<()> {
        if !self.closed && allowed(self.state) {
            Ok(())
        } else {
            Err(self.reject(intent))
        }
    }

    fn reject(&mut self, intent: Intent) -> CaptchaError {
        log::warn!("Rejected {:?} while {:?}", intent, self.state);
        self.report(CaptchaError::InvalidTransition {
            state: self.state,
            intent,
        })
    }

    fn report(&mut self, err: CaptchaError) -> CaptchaError {
        self.last_error = Some(err);
        err
    }
}

impl<C: Camera, R: RandomSource, K: Clock> Drop for CaptchaSession<C, R, K> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct CameraLog {
        acquired: u32,
        released: u32,
        captured: u32,
        fail_next: Option<CapabilityError>,
    }

    #[derive(Clone, Default)]
    struct FakeCamera(Rc<RefCell<CameraLog>>);

    impl Camera for FakeCamera {
        type Stream = u32;

        fn acquire_stream(
            &mut self,
            _: CaptureRequest,
        ) -> core::result::Result<u32, CapabilityError> {
            let mut log = self.0.borrow_mut();
            if let Some(err) = log.fail_next.take() {
                return Err(err);
            }
            log.acquired += 1;
            Ok(log.acquired)
        }

        fn capture_frame(&mut self, stream: &u32) -> PhotoData {
            self.0.borrow_mut().captured += 1;
            PhotoData::new("image/png", vec![*stream as u8; 4])
        }

        fn release_stream(&mut self, _: u32) {
            self.0.borrow_mut().released += 1;
        }
    }

    type Session = CaptchaSession<FakeCamera, SeededSource, ManualClock>;

    fn session(max_tries: u32) -> (Session, FakeCamera, ManualClock) {
        let camera = FakeCamera::default();
        let clock = ManualClock::new();
        let policy = Policy::new(max_tries, 5., 70.).unwrap();
        let session =
            CaptchaSession::with_clock(camera.clone(), policy, SeededSource::new(1), clock.clone())
                .unwrap();
        (session, camera, clock)
    }

    fn to_grid(session: &mut Session, clock: &ManualClock) {
        session.proceed().unwrap();
        clock.advance(SETTLE_DELAY);
        session.poll();
        assert_eq!(session.state(), CaptchaState::SelfieCompleted);
    }

    fn shaped_and_empty(session: &Session) -> (CellIndex, CellIndex) {
        let challenge = session.challenge().unwrap();
        let shaped = challenge.shaped_cells().next().unwrap().index;
        let empty = challenge.cells().find(|cell| cell.is_empty()).unwrap().index;
        (shaped, empty)
    }

    #[test]
    fn camera_is_acquired_on_creation() {
        let (session, camera, _) = session(3);

        assert_eq!(session.state(), CaptchaState::Ready);
        assert!(session.has_stream());
        assert_eq!(camera.0.borrow().acquired, 1);
        assert_eq!(session.pending_timers(), 1);
    }

    #[test]
    fn camera_failure_stays_loading_until_retry() {
        let camera = FakeCamera::default();
        camera.0.borrow_mut().fail_next = Some(CapabilityError::Denied);
        let policy = Policy::new(3, 5., 70.).unwrap();
        let mut session =
            CaptchaSession::with_clock(camera.clone(), policy, SeededSource::new(1), ManualClock::new())
                .unwrap();

        assert_eq!(session.state(), CaptchaState::Loading);
        assert_eq!(
            session.last_error(),
            Some(&CaptchaError::Capability(CapabilityError::Denied))
        );
        assert_eq!(session.pending_timers(), 0);

        assert_eq!(session.connect_camera(), Ok(CaptchaState::Ready));
        assert_eq!(session.last_error(), None);
        assert_eq!(
            session.connect_camera(),
            Err(CaptchaError::InvalidTransition {
                state: CaptchaState::Ready,
                intent: Intent::ConnectCamera,
            })
        );
        assert_eq!(camera.0.borrow().acquired, 1);
    }

    #[test]
    fn selfie_releases_camera_and_settles() {
        let (mut session, camera, clock) = session(3);

        assert_eq!(session.proceed(), Ok(CaptchaState::TakingSelfie));
        assert!(!session.has_stream());
        assert_eq!(camera.0.borrow().released, 1);
        assert!(session.photo().is_some());
        assert!(session.challenge().is_some());

        clock.advance(SETTLE_DELAY - Duration::from_millis(1));
        session.poll();
        assert_eq!(session.state(), CaptchaState::TakingSelfie);

        clock.advance(Duration::from_millis(1));
        session.poll();
        assert_eq!(session.state(), CaptchaState::SelfieCompleted);
        assert_eq!(session.pending_timers(), 0);
    }

    #[test]
    fn mask_moves_only_while_previewing() {
        let (mut session, _, clock) = session(3);

        let mut offsets = Vec::new();
        for _ in 0..8 {
            clock.advance(MASK_INTERVAL);
            assert_eq!(session.poll(), 1);
            offsets.push(session.mask_offset());
        }
        assert!(offsets.iter().all(|offset| {
            offset.top <= MaskOffset::MAX_TOP && offset.left <= MaskOffset::MAX_LEFT
        }));
        assert!(offsets.windows(2).any(|pair| pair[0] != pair[1]));

        to_grid(&mut session, &clock);
        let settled = session.mask_offset();
        clock.advance(MASK_INTERVAL * 4);
        assert_eq!(session.poll(), 0);
        assert_eq!(session.mask_offset(), settled);
    }

    #[test]
    fn toggling_empty_cell_changes_nothing() {
        let (mut session, _, clock) = session(3);
        to_grid(&mut session, &clock);
        let (_, empty) = shaped_and_empty(&session);

        assert_eq!(session.toggle_cell(empty), Ok(MarkOutcome::NoChange));
        assert_eq!(session.state(), CaptchaState::SelfieCompleted);
        assert_eq!(session.challenge().unwrap().marked_count(), 0);
    }

    #[test]
    fn toggling_twice_restores_mark_and_keeps_selecting() {
        let (mut session, _, clock) = session(3);
        to_grid(&mut session, &clock);
        let (shaped, _) = shaped_and_empty(&session);

        assert_eq!(session.toggle_cell(shaped), Ok(MarkOutcome::Changed));
        assert_eq!(session.state(), CaptchaState::SelectingGrid);
        assert!(session.challenge().unwrap().cell(shaped).unwrap().marked);

        assert_eq!(session.toggle_cell(shaped), Ok(MarkOutcome::Changed));
        assert_eq!(session.state(), CaptchaState::SelectingGrid);
        assert!(!session.challenge().unwrap().cell(shaped).unwrap().marked);
    }

    #[test]
    fn out_of_range_toggle_is_reported() {
        let (mut session, _, clock) = session(3);
        to_grid(&mut session, &clock);

        assert_eq!(session.toggle_cell(30), Err(CaptchaError::InvalidCell(30)));
        assert_eq!(session.state(), CaptchaState::SelfieCompleted);
        assert_eq!(session.last_error(), Some(&CaptchaError::InvalidCell(30)));
    }

    #[test]
    fn invalid_intents_do_not_change_state() {
        let (mut session, _, _) = session(3);

        assert!(matches!(
            session.verify(),
            Err(CaptchaError::InvalidTransition { intent: Intent::Verify, .. })
        ));
        assert!(session.toggle_cell(0).is_err());
        assert!(session.regenerate().is_err());
        assert_eq!(session.state(), CaptchaState::Ready);
        assert_eq!(session.attempts(), 0);
    }

    #[test]
    fn verdict_is_hidden_until_evaluation_delay() {
        let (mut session, _, clock) = session(3);
        to_grid(&mut session, &clock);

        assert_eq!(session.verify(), Ok(CaptchaState::Verifying));
        assert_eq!(session.attempts(), 1);
        assert_eq!(session.last_verdict(), None);

        clock.advance(EVALUATION_DELAY);
        session.poll();
        assert!(session.last_verdict().is_some());
        assert!(matches!(
            session.state(),
            CaptchaState::Verified | CaptchaState::VerificationFailed
        ));
    }

    #[test]
    fn teardown_cancels_timers_and_releases_camera() {
        let (mut session, camera, _) = session(3);
        assert!(session.pending_timers() > 0);

        session.teardown();
        session.teardown();

        assert_eq!(session.pending_timers(), 0);
        assert_eq!(camera.0.borrow().released, 1);
        assert!(session.proceed().is_err());
    }

    #[test]
    fn dropping_session_releases_camera() {
        let (session, camera, _) = session(3);

        drop(session);

        assert_eq!(camera.0.borrow().released, 1);
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let policy = Policy {
            max_tries: 0,
            retry_penalty_rate: 5.,
            base_accepted_score_percent: 70.,
        };
        let result = CaptchaSession::new(FakeCamera::default(), policy, SeededSource::new(1));

        assert!(matches!(result, Err(CaptchaError::InvalidPolicy(_))));
    }
}
