use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::lock::challenge::{self, ChallengeSet};
use crate::lock::config::{ConfigStore, OVERRIDE_DURATION_MINUTES};
use crate::lock::deadline::{Deadline, DeadlineArbiter, DeadlineTag};
use crate::lock::override_code::{derive_override_code, HintCode, OverrideCode};
use crate::lock::surface::LockSurface;

/// Time source seam. Production uses the system clock; tests drive a
/// manual one.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Session state. Owned exclusively by [`LockSession`] and mutated only
/// through its event-handling entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The gate is up; the surface must stay frontmost
    Locked,
    /// Time-boxed normal use after a correct challenge
    GracePeriod,
    /// Guardian override window; lock presentations are suspended
    OverrideActive,
}

/// Screen power transition delivered by the external power-event source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    Off,
    On,
}

/// The lock enforcement state machine.
///
/// Composes the challenge generator, the override-code scheme and the
/// single-slot deadline arbiter. All entry points are synchronous and
/// non-blocking; the caller serializes events onto one logical queue so
/// no two transitions ever run concurrently.
pub struct LockSession {
    state: SessionState,
    store: Box<dyn ConfigStore + Send>,
    surface: Box<dyn LockSurface + Send>,
    clock: Box<dyn Clock + Send>,
    arbiter: DeadlineArbiter,
    rng: StdRng,
    challenge_set: Option<ChallengeSet>,
    expected_override: Option<OverrideCode>,
    shut_down: bool,
}

impl LockSession {
    /// Create a session, starting `Locked` unless a persisted override
    /// window is still open, in which case the remaining window is
    /// resumed. An expired persisted flag is cleared immediately.
    pub fn new(
        store: Box<dyn ConfigStore + Send>,
        surface: Box<dyn LockSurface + Send>,
        clock: Box<dyn Clock + Send>,
        rng: StdRng,
    ) -> Result<Self> {
        let mut session = Self {
            state: SessionState::Locked,
            store,
            surface,
            clock,
            arbiter: DeadlineArbiter::new(),
            rng,
            challenge_set: None,
            expected_override: None,
            shut_down: false,
        };

        let config = session.store.load().context("Failed to load configuration")?;
        if config.override_flag.active {
            let now = session.clock.now();
            match config.override_flag.remaining_minutes(now) {
                Some(remaining) => {
                    info!("Resuming override window, {} minutes remaining", remaining);
                    session.state = SessionState::OverrideActive;
                    session
                        .arbiter
                        .arm(now + Duration::minutes(remaining), DeadlineTag::OverrideExpiry);
                }
                None => {
                    info!("Persisted override window has expired, clearing flag");
                    session.store.set_override_active(false, None)?;
                }
            }
        }

        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The currently armed deadline, if any. The event loop uses this to
    /// schedule its wakeup.
    pub fn pending_deadline(&self) -> Option<Deadline> {
        self.arbiter.pending()
    }

    /// Generate a fresh challenge set from a configuration snapshot and
    /// retain it for the next submission.
    pub fn request_challenge_set(&mut self) -> Result<&ChallengeSet> {
        let config = self.store.load().context("Failed to load configuration")?;
        let set = challenge::generate(&config.challenge.generation_params(), &mut self.rng);
        debug!("Generated challenge set of {}", set.len());
        Ok(self.challenge_set.insert(set))
    }

    /// Submit answers for the current challenge set.
    ///
    /// Correct: transition to `GracePeriod`, arm the auto-lock deadline
    /// and dismiss the surface. Incorrect (including a missing or
    /// mis-sized submission): stay `Locked` with a freshly regenerated
    /// set.
    pub fn submit_challenge_answers(&mut self, answers: &[i32]) -> Result<bool> {
        if self.state != SessionState::Locked {
            debug!("Ignoring challenge submission in state {:?}", self.state);
            return Ok(false);
        }

        let correct = self
            .challenge_set
            .as_ref()
            .map(|set| set.check(answers))
            .unwrap_or(false);

        if correct {
            let config = self.store.load().context("Failed to load configuration")?;
            let now = self.clock.now();
            let fire_at = now + Duration::minutes(config.windows.grace_minutes);

            info!(
                "Challenge solved, granting {} minute grace window",
                config.windows.grace_minutes
            );
            self.state = SessionState::GracePeriod;
            self.challenge_set = None;
            self.arbiter.arm(fire_at, DeadlineTag::AutoLockExpiry);
            self.surface.dismiss()?;
            Ok(true)
        } else {
            info!("Incorrect challenge submission, regenerating");
            self.request_challenge_set()?;
            Ok(false)
        }
    }

    /// Generate an override hint and retain the derived code for the
    /// next [`submit_override_code`](Self::submit_override_code) call.
    pub fn generate_override_hint(&mut self) -> HintCode {
        let hint = HintCode::generate(&mut self.rng);
        self.expected_override = Some(derive_override_code(hint));
        hint
    }

    /// Submit a guardian override code.
    ///
    /// Malformed input and mismatches are incorrect outcomes, never
    /// faults; the surface stays up and the state is unchanged.
    pub fn submit_override_code(&mut self, input: &str) -> Result<bool> {
        if self.state != SessionState::Locked {
            debug!("Ignoring override submission in state {:?}", self.state);
            return Ok(false);
        }

        let matches = match (OverrideCode::parse(input), self.expected_override) {
            (Some(code), Some(expected)) => code == expected,
            _ => false,
        };

        if !matches {
            info!("Incorrect override code");
            return Ok(false);
        }

        let now = self.clock.now();
        info!(
            "Override code accepted, suspending lock for {} minutes",
            OVERRIDE_DURATION_MINUTES
        );
        self.state = SessionState::OverrideActive;
        self.challenge_set = None;
        self.expected_override = None;
        self.arbiter
            .arm(now + Duration::minutes(OVERRIDE_DURATION_MINUTES), DeadlineTag::OverrideExpiry);
        self.store.set_override_active(true, Some(now))?;
        self.surface.dismiss()?;
        Ok(true)
    }

    /// React to a screen power transition.
    ///
    /// While `Locked` with enforcement enabled, either transition
    /// re-asserts the surface (idempotent). While a grace or override
    /// window is open the event is suppressed.
    pub fn handle_screen_event(&mut self, event: ScreenEvent) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }

        if self.state != SessionState::Locked {
            debug!("Screen {:?} suppressed while {:?}", event, self.state);
            return Ok(());
        }

        let config = self.store.load().context("Failed to load configuration")?;
        if !config.enforcement.enabled {
            debug!("Screen {:?} ignored, enforcement disabled", event);
            return Ok(());
        }

        debug!("Screen {:?} while locked, asserting surface", event);
        self.surface.assert_lock()
    }

    /// Fire the armed deadline if it is due, applying the matching
    /// transition. Returns the tag that fired, if any.
    ///
    /// Re-entering `Locked` here is deliberately dormant: the surface is
    /// re-asserted only on the next external trigger, never at the exact
    /// expiry instant.
    pub fn fire_due_deadline(&mut self) -> Result<Option<DeadlineTag>> {
        let now = self.clock.now();
        let Some(tag) = self.arbiter.take_due(now) else {
            return Ok(None);
        };

        match tag {
            DeadlineTag::AutoLockExpiry => {
                if self.state != SessionState::GracePeriod {
                    warn!("Auto-lock expiry fired in state {:?}", self.state);
                }
                info!("Grace window expired, re-entering locked state");
                self.state = SessionState::Locked;
            }
            DeadlineTag::OverrideExpiry => {
                if self.state != SessionState::OverrideActive {
                    warn!("Override expiry fired in state {:?}", self.state);
                }
                info!("Override window expired, re-entering locked state");
                self.state = SessionState::Locked;
                // future sessions must start fresh
                self.store.set_override_active(false, None)?;
            }
        }

        Ok(Some(tag))
    }

    /// Monitor entry point: while `Locked`, re-assert the surface if it
    /// has lost foreground focus. A failing focus query counts as "not
    /// foreground" so the engine over-locks rather than under-locks.
    pub fn reassert_if_backgrounded(&mut self) -> Result<()> {
        if self.shut_down || self.state != SessionState::Locked {
            return Ok(());
        }

        let foreground = match self.surface.is_foreground() {
            Ok(foreground) => foreground,
            Err(e) => {
                warn!("Focus query failed, assuming not foreground: {:#}", e);
                false
            }
        };

        if !foreground {
            debug!("Lock surface lost focus, re-asserting");
            self.surface.assert_lock()?;
        }

        Ok(())
    }

    /// Tear the session down: cancel any pending deadline and stop
    /// issuing commands. The lifecycle owner must call this so no
    /// callback fires into a destroyed session.
    pub fn shutdown(&mut self) {
        info!("Shutting down lock session");
        self.arbiter.cancel();
        self.shut_down = true;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;
    use crate::lock::challenge::Operation;
    use crate::lock::config::{LockConfig, MemoryConfigStore, OverrideFlag};
    use crate::lock::surface::testing::RecordingSurface;
    use rand::SeedableRng;

    fn t0() -> DateTime<Utc> {
        "2026-02-01T08:00:00Z".parse().unwrap()
    }

    struct Fixture {
        session: LockSession,
        store: MemoryConfigStore,
        surface: RecordingSurface,
        clock: ManualClock,
    }

    fn fixture_with(config: LockConfig) -> Fixture {
        let store = MemoryConfigStore::new(config);
        let surface = RecordingSurface::new();
        let clock = ManualClock::at(t0());
        let session = LockSession::new(
            Box::new(store.clone()),
            Box::new(surface.clone()),
            Box::new(clock.clone()),
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        Fixture {
            session,
            store,
            surface,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(LockConfig::default())
    }

    fn correct_answers(session: &mut LockSession) -> Vec<i32> {
        session
            .request_challenge_set()
            .unwrap()
            .challenges()
            .iter()
            .map(|c| c.answer)
            .collect()
    }

    #[test]
    fn starts_locked_by_default() {
        let f = fixture();
        assert_eq!(f.session.state(), SessionState::Locked);
        assert_eq!(f.session.pending_deadline(), None);
    }

    #[test]
    fn correct_submission_enters_grace_period_with_deadline() {
        let mut f = fixture();
        let answers = correct_answers(&mut f.session);

        assert!(f.session.submit_challenge_answers(&answers).unwrap());
        assert_eq!(f.session.state(), SessionState::GracePeriod);
        assert_eq!(f.surface.dismissals(), 1);

        let deadline = f.session.pending_deadline().unwrap();
        assert_eq!(deadline.tag, DeadlineTag::AutoLockExpiry);
        assert_eq!(deadline.fire_at, t0() + Duration::minutes(5));
    }

    #[test]
    fn incorrect_submission_stays_locked_and_regenerates() {
        let mut f = fixture();
        let before = f.session.request_challenge_set().unwrap().clone();
        let wrong = vec![-1; before.len()];

        assert!(!f.session.submit_challenge_answers(&wrong).unwrap());
        assert_eq!(f.session.state(), SessionState::Locked);
        assert_eq!(f.surface.dismissals(), 0);
        assert_eq!(f.session.pending_deadline(), None);

        let after = f.session.challenge_set.as_ref().unwrap();
        assert_ne!(*after, before);
    }

    #[test]
    fn submission_without_requested_set_is_incorrect() {
        let mut f = fixture();
        assert!(!f.session.submit_challenge_answers(&[1, 2, 3]).unwrap());
        assert_eq!(f.session.state(), SessionState::Locked);
    }

    #[test]
    fn correct_override_code_enters_override_window() {
        let mut f = fixture();
        let hint = f.session.generate_override_hint();
        let code = derive_override_code(hint).to_string();

        assert!(f.session.submit_override_code(&code).unwrap());
        assert_eq!(f.session.state(), SessionState::OverrideActive);
        assert_eq!(f.surface.dismissals(), 1);

        let deadline = f.session.pending_deadline().unwrap();
        assert_eq!(deadline.tag, DeadlineTag::OverrideExpiry);
        assert_eq!(deadline.fire_at, t0() + Duration::minutes(30));

        let flag = f.store.snapshot().override_flag;
        assert!(flag.active);
        assert_eq!(flag.activated_at, Some(t0()));
    }

    #[test]
    fn wrong_or_malformed_override_code_stays_locked() {
        let mut f = fixture();
        f.session.generate_override_hint();

        assert!(!f.session.submit_override_code("0000").unwrap());
        assert!(!f.session.submit_override_code("12a4").unwrap());
        assert!(!f.session.submit_override_code("").unwrap());
        assert_eq!(f.session.state(), SessionState::Locked);
        assert_eq!(f.surface.dismissals(), 0);
        assert!(!f.store.snapshot().override_flag.active);
    }

    #[test]
    fn override_code_without_hint_is_incorrect() {
        let mut f = fixture();
        assert!(!f.session.submit_override_code("1234").unwrap());
        assert_eq!(f.session.state(), SessionState::Locked);
    }

    #[test]
    fn grace_expiry_relocks_dormantly() {
        let mut f = fixture();
        let answers = correct_answers(&mut f.session);
        f.session.submit_challenge_answers(&answers).unwrap();

        // not yet due
        assert_eq!(f.session.fire_due_deadline().unwrap(), None);

        f.clock.advance(Duration::minutes(5));
        assert_eq!(
            f.session.fire_due_deadline().unwrap(),
            Some(DeadlineTag::AutoLockExpiry)
        );
        assert_eq!(f.session.state(), SessionState::Locked);
        // dormant re-entry: no assert at the expiry instant
        assert_eq!(f.surface.asserts(), 0);

        // the next external trigger re-asserts
        f.session.handle_screen_event(ScreenEvent::On).unwrap();
        assert_eq!(f.surface.asserts(), 1);
    }

    #[test]
    fn override_expiry_clears_persisted_flag() {
        let mut f = fixture();
        let hint = f.session.generate_override_hint();
        let code = derive_override_code(hint).to_string();
        f.session.submit_override_code(&code).unwrap();

        f.clock.advance(Duration::minutes(30));
        assert_eq!(
            f.session.fire_due_deadline().unwrap(),
            Some(DeadlineTag::OverrideExpiry)
        );
        assert_eq!(f.session.state(), SessionState::Locked);
        assert!(!f.store.snapshot().override_flag.active);
        assert_eq!(f.store.snapshot().override_flag.activated_at, None);
    }

    #[test]
    fn screen_events_suppressed_while_window_open() {
        let mut f = fixture();
        let answers = correct_answers(&mut f.session);
        f.session.submit_challenge_answers(&answers).unwrap();

        f.session.handle_screen_event(ScreenEvent::Off).unwrap();
        f.session.handle_screen_event(ScreenEvent::On).unwrap();
        assert_eq!(f.surface.asserts(), 0);
        assert_eq!(f.session.state(), SessionState::GracePeriod);
    }

    #[test]
    fn screen_events_assert_surface_while_locked() {
        let mut f = fixture();
        f.session.handle_screen_event(ScreenEvent::Off).unwrap();
        f.session.handle_screen_event(ScreenEvent::On).unwrap();
        assert_eq!(f.surface.asserts(), 2);
        assert_eq!(f.session.state(), SessionState::Locked);
    }

    #[test]
    fn screen_events_ignored_when_enforcement_disabled() {
        let mut config = LockConfig::default();
        config.enforcement.enabled = false;
        let mut f = fixture_with(config);

        f.session.handle_screen_event(ScreenEvent::On).unwrap();
        assert_eq!(f.surface.asserts(), 0);
    }

    #[test]
    fn reassert_only_when_surface_lost_focus() {
        let mut f = fixture();
        f.surface.set_foreground(true);
        f.session.reassert_if_backgrounded().unwrap();
        assert_eq!(f.surface.asserts(), 0);

        f.surface.set_foreground(false);
        f.session.reassert_if_backgrounded().unwrap();
        assert_eq!(f.surface.asserts(), 1);
    }

    #[test]
    fn failed_focus_query_counts_as_backgrounded() {
        let mut f = fixture();
        f.surface.fail_foreground_query();
        f.session.reassert_if_backgrounded().unwrap();
        assert_eq!(f.surface.asserts(), 1);
    }

    #[test]
    fn reassert_is_noop_outside_locked_state() {
        let mut f = fixture();
        let answers = correct_answers(&mut f.session);
        f.session.submit_challenge_answers(&answers).unwrap();

        f.surface.set_foreground(false);
        f.session.reassert_if_backgrounded().unwrap();
        assert_eq!(f.surface.asserts(), 0);
    }

    #[test]
    fn submissions_ignored_outside_locked_state() {
        let mut f = fixture();
        let answers = correct_answers(&mut f.session);
        f.session.submit_challenge_answers(&answers).unwrap();
        assert_eq!(f.session.state(), SessionState::GracePeriod);

        assert!(!f.session.submit_challenge_answers(&answers).unwrap());
        assert!(!f.session.submit_override_code("1234").unwrap());
        assert_eq!(f.session.state(), SessionState::GracePeriod);
    }

    #[test]
    fn warm_start_resumes_open_override_window() {
        let mut config = LockConfig::default();
        config.override_flag = OverrideFlag {
            active: true,
            activated_at: Some(t0() - Duration::minutes(10)),
        };
        let f = fixture_with(config);

        assert_eq!(f.session.state(), SessionState::OverrideActive);
        let deadline = f.session.pending_deadline().unwrap();
        assert_eq!(deadline.tag, DeadlineTag::OverrideExpiry);
        assert_eq!(deadline.fire_at, t0() + Duration::minutes(20));
    }

    #[test]
    fn warm_start_clears_expired_override_flag() {
        let mut config = LockConfig::default();
        config.override_flag = OverrideFlag {
            active: true,
            activated_at: Some(t0() - Duration::minutes(45)),
        };
        let f = fixture_with(config);

        assert_eq!(f.session.state(), SessionState::Locked);
        assert_eq!(f.session.pending_deadline(), None);
        assert!(!f.store.snapshot().override_flag.active);
    }

    #[test]
    fn shutdown_cancels_deadline_and_silences_events() {
        let mut f = fixture();
        let answers = correct_answers(&mut f.session);
        f.session.submit_challenge_answers(&answers).unwrap();
        assert!(f.session.pending_deadline().is_some());

        f.session.shutdown();
        assert_eq!(f.session.pending_deadline(), None);

        f.clock.advance(Duration::hours(1));
        assert_eq!(f.session.fire_due_deadline().unwrap(), None);

        f.session.handle_screen_event(ScreenEvent::On).unwrap();
        f.session.reassert_if_backgrounded().unwrap();
        assert_eq!(f.surface.asserts(), 0);
    }

    #[test]
    fn end_to_end_addition_scenario() {
        let mut config = LockConfig::default();
        config.challenge.question_count = 3;
        config.challenge.operations = vec![Operation::Addition];
        config.challenge.max_addition = 20;
        config.windows.grace_minutes = 5;
        let mut f = fixture_with(config);

        let set = f.session.request_challenge_set().unwrap();
        assert_eq!(set.len(), 3);
        for c in set.challenges() {
            assert_eq!(c.operation, Operation::Addition);
            assert!((1..=20).contains(&c.operand1));
            assert!((1..=20).contains(&c.operand2));
        }
        let sums: Vec<i32> = set.challenges().iter().map(|c| c.answer).collect();

        assert!(f.session.submit_challenge_answers(&sums).unwrap());
        assert_eq!(f.session.state(), SessionState::GracePeriod);

        f.clock.advance(Duration::minutes(5));
        assert_eq!(
            f.session.fire_due_deadline().unwrap(),
            Some(DeadlineTag::AutoLockExpiry)
        );
        assert_eq!(f.session.state(), SessionState::Locked);
        assert_eq!(f.surface.asserts(), 0);
    }
}
