//! Visit lifecycle orchestrator.
//!
//! Sequences the whole telemedicine session:
//! create (gateway) → join (builder → media start) → active → end | failure
//!
//! All collaborators are injected via constructor. One instance covers one
//! visit attempt; once it reaches Ended or Failed a new instance is needed.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::hook::{MeetingEndedHook, MeetingEndedReport};
use super::state::{SessionState, VisitStatus};
use crate::auth::AuthHandle;
use crate::error::VisitError;
use crate::gateway::{AttendeeCredentials, CredentialGateway, MeetingDescriptor, Role};
use crate::media::{
    MediaEngine, MediaEvent, MediaEventReceiver, MediaSession, RenderTargets, SessionBuilder,
    StopReason,
};

/// Tunables for a visit.
#[derive(Debug, Clone)]
pub struct VisitOptions {
    /// Upper bound on device permission prompts plus the media handshake.
    pub join_timeout: Duration,
    pub start_muted: bool,
    pub start_video_enabled: bool,
}

impl Default for VisitOptions {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(120),
            start_muted: false,
            start_video_enabled: true,
        }
    }
}

/// Result of ending a meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOutcome {
    pub meeting_id: String,
    /// Set when local media stopped but the gateway could not be told.
    pub notify_warning: Option<String>,
}

#[derive(Default)]
struct Slot {
    appointment_id: Option<String>,
    meeting: Option<MeetingDescriptor>,
    attendees: Option<AttendeeCredentials>,
    role: Option<Role>,
    session: Option<Arc<dyn MediaSession>>,
    microphone_muted: bool,
    video_enabled: bool,
    started_at: Option<chrono::DateTime<Utc>>,
    last_error: Option<String>,
    last_warning: Option<String>,
    hook_fired: bool,
    disposed: bool,
}

impl Slot {
    fn clear_credentials(&mut self) {
        if self.attendees.take().is_some() {
            debug!("Attendee credentials cleared");
        }
    }
}

/// State shared with the media event pump.
struct Shared {
    state: watch::Sender<SessionState>,
    slot: Mutex<Slot>,
    busy: AtomicBool,
    hook: Option<Arc<dyn MeetingEndedHook>>,
}

/// Clears the busy flag when a lifecycle operation returns.
struct OperationGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Puts a create back to Idle if its future is dropped while the gateway
/// call is pending.
struct CreateRollback<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl CreateRollback<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CreateRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.shared.lock();
        if self.shared.current() == SessionState::Creating {
            warn!("Meeting creation abandoned; back to idle");
            slot.appointment_id = None;
            self.shared.transition(SessionState::Idle);
        }
    }
}

/// Stops the half-built session and returns to Created if a join future is
/// dropped before media reports Started.
struct JoinRollback<'a> {
    shared: &'a Shared,
    session: Arc<dyn MediaSession>,
    armed: bool,
}

impl JoinRollback<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for JoinRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.session.stop(StopReason::Left);

        let mut slot = self.shared.lock();
        if self.shared.current() == SessionState::Joining {
            warn!("Join abandoned before media started; back to created");
            slot.session = None;
            slot.role = None;
            self.shared.transition(SessionState::Created);
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Move to `next` unless the current state is terminal.
    /// Callers hold the slot lock so state and slot change together.
    fn transition(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            debug!("Session state {} -> {}", current, next);
            *current = next;
            true
        })
    }

    fn begin(&self, operation: &'static str) -> Result<OperationGuard<'_>, VisitError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejected {}: another lifecycle operation is pending", operation);
            return Err(VisitError::OperationInProgress(operation));
        }
        Ok(OperationGuard { busy: &self.busy })
    }

    fn fail(&self, slot: &mut Slot, err: &VisitError) {
        slot.last_error = Some(err.user_message());
        slot.clear_credentials();
        self.transition(SessionState::Failed);
    }

    /// Apply one media event received after the session went live.
    /// Returns a report when the meeting-ended hook should run.
    fn apply_event(&self, event: MediaEvent) -> Option<MeetingEndedReport> {
        let mut slot = self.lock();
        let state = self.current();

        match event {
            MediaEvent::Started => {
                debug!("Ignoring started event in state {}", state);
                None
            }
            MediaEvent::Failed(message) => {
                if state == SessionState::Active {
                    let err = VisitError::MediaFailure(message);
                    error!("Media session failed while active: {}", err);
                    self.fail(&mut slot, &err);
                    if let Some(session) = slot.session.take() {
                        session.stop(StopReason::Other("media-failure".to_string()));
                    }
                }
                None
            }
            MediaEvent::Stopped(reason) => {
                if state == SessionState::Active {
                    if let Some(session) = slot.session.take() {
                        session.stop(reason.clone());
                    }
                    if reason.is_graceful() {
                        info!("Media session ended ({})", reason.code());
                        slot.clear_credentials();
                        self.transition(SessionState::Ended);
                    } else {
                        let err = VisitError::MediaFailure(format!(
                            "media session stopped abnormally ({})",
                            reason.code()
                        ));
                        error!("{}", err);
                        self.fail(&mut slot, &err);
                    }
                }
                self.take_report(&mut slot, reason)
            }
        }
    }

    fn take_report(&self, slot: &mut Slot, reason: StopReason) -> Option<MeetingEndedReport> {
        let started_at = slot.started_at?;
        if slot.hook_fired || self.hook.is_none() {
            return None;
        }
        slot.hook_fired = true;

        let outcome = match self.current() {
            SessionState::Failed => SessionState::Failed,
            _ => SessionState::Ended,
        };
        Some(MeetingEndedReport {
            meeting_id: slot
                .meeting
                .as_ref()
                .map(|m| m.meeting_id.clone())
                .unwrap_or_default(),
            appointment_id: slot.appointment_id.clone().unwrap_or_default(),
            role: slot.role,
            reason,
            outcome,
            duration_seconds: (Utc::now() - started_at).num_seconds().max(0) as u64,
        })
    }
}

async fn pump_events(shared: Arc<Shared>, mut events: MediaEventReceiver) {
    while let Some(event) = events.recv().await {
        let stopped = matches!(event, MediaEvent::Stopped(_));

        if let Some(report) = shared.apply_event(event) {
            if let Some(hook) = &shared.hook {
                if let Err(e) = hook.execute(&report).await {
                    warn!("Meeting-ended hook failed: {}", e);
                }
            }
        }

        if stopped {
            break;
        }
    }
    debug!("Media event pump finished");
}

pub struct VisitOrchestrator {
    shared: Arc<Shared>,
    gateway: Arc<dyn CredentialGateway>,
    builder: SessionBuilder,
    auth: AuthHandle,
    options: VisitOptions,
}

impl VisitOrchestrator {
    pub fn new(
        gateway: Arc<dyn CredentialGateway>,
        engine: Arc<dyn MediaEngine>,
        auth: AuthHandle,
        hook: Option<Arc<dyn MeetingEndedHook>>,
        options: VisitOptions,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let slot = Slot {
            microphone_muted: options.start_muted,
            video_enabled: options.start_video_enabled,
            ..Slot::default()
        };

        Self {
            shared: Arc::new(Shared {
                state,
                slot: Mutex::new(slot),
                busy: AtomicBool::new(false),
                hook,
            }),
            gateway,
            builder: SessionBuilder::new(engine),
            auth,
            options,
        }
    }

    /// Provision a meeting for an appointment and hold both attendees' credentials.
    pub async fn create_meeting(&self, appointment_id: &str) -> Result<MeetingDescriptor, VisitError> {
        let _op = self.shared.begin("create")?;

        let state = self.shared.current();
        if state != SessionState::Idle {
            let err = VisitError::invalid_state("create a meeting", state);
            error!("{}", err);
            return Err(err);
        }

        let bearer = self.auth.current().ok_or(VisitError::AuthRequired)?;

        {
            let mut slot = self.shared.lock();
            slot.appointment_id = Some(appointment_id.to_string());
            self.shared.transition(SessionState::Creating);
        }

        let rollback = CreateRollback {
            shared: &self.shared,
            armed: true,
        };
        info!("Creating meeting for appointment {}", appointment_id);
        let result = self.gateway.create_meeting(&bearer, appointment_id).await;
        rollback.disarm();

        let mut slot = self.shared.lock();
        if slot.disposed {
            warn!("Visit disposed while creating meeting; discarding gateway response");
            return Err(VisitError::invalid_state("create a meeting", self.shared.current()));
        }

        match result {
            Ok(grant) => {
                if grant.attendees.is_empty() {
                    warn!("Gateway returned meeting {} without attendee credentials", grant.meeting.meeting_id);
                }
                let descriptor = grant.meeting.clone();
                slot.meeting = Some(grant.meeting);
                slot.attendees = Some(grant.attendees);
                slot.last_error = None;
                self.shared.transition(SessionState::Created);

                info!(
                    "Meeting {} created (region: {}, expires: {})",
                    descriptor.meeting_id, descriptor.region, descriptor.expires_at
                );
                Ok(descriptor)
            }
            Err(e) => {
                let err = VisitError::Gateway(e);
                error!("Failed to create meeting for appointment {}: {}", appointment_id, err);
                self.shared.fail(&mut slot, &err);
                Err(err)
            }
        }
    }

    /// Start local media in the held meeting as `role`.
    ///
    /// Resolves once the media session reports `Started`. Any failure before
    /// that tears the session down and leaves the visit at Created (or
    /// Failed for a malformed descriptor).
    pub async fn join_meeting(
        &self,
        meeting_id: &str,
        role: Role,
        targets: RenderTargets,
    ) -> Result<(), VisitError> {
        let _op = self.shared.begin("join")?;

        let (meeting, credential, appointment_id) = {
            let slot = self.shared.lock();
            match self.shared.current() {
                SessionState::Idle => {
                    return Err(VisitError::CredentialsUnavailable(
                        "no meeting has been created for this visit".to_string(),
                    ));
                }
                SessionState::Created => {}
                other => {
                    let err = VisitError::invalid_state("join the meeting", other);
                    error!("{}", err);
                    return Err(err);
                }
            }

            let meeting = slot
                .meeting
                .as_ref()
                .filter(|m| m.meeting_id == meeting_id)
                .cloned()
                .ok_or_else(|| {
                    VisitError::CredentialsUnavailable(format!(
                        "no meeting descriptor held for {}",
                        meeting_id
                    ))
                })?;

            if meeting.is_expired_at(Utc::now()) {
                return Err(VisitError::CredentialsUnavailable(format!(
                    "credentials for meeting {} expired at {}",
                    meeting_id, meeting.expires_at
                )));
            }

            let credential = slot
                .attendees
                .as_ref()
                .and_then(|a| a.for_role(role))
                .cloned()
                .ok_or_else(|| {
                    VisitError::CredentialsUnavailable(format!(
                        "gateway issued no {} credential for meeting {}",
                        role, meeting_id
                    ))
                })?;

            (meeting, credential, slot.appointment_id.clone().unwrap_or_default())
        };

        let bearer = self.auth.current().ok_or(VisitError::AuthRequired)?;

        let built = match self.builder.build(&meeting, &credential, targets) {
            Ok(built) => built,
            Err(err) => {
                error!("Cannot build media session for meeting {}: {}", meeting_id, err);
                if matches!(err, VisitError::Configuration(_)) {
                    let mut slot = self.shared.lock();
                    self.shared.fail(&mut slot, &err);
                }
                return Err(err);
            }
        };
        drop(credential);

        let rollback = JoinRollback {
            shared: &self.shared,
            session: built.session.clone(),
            armed: true,
        };

        if let Err(e) = self
            .gateway
            .join_meeting(&bearer, meeting_id, &appointment_id, role)
            .await
        {
            rollback.disarm();
            built.session.stop(StopReason::Left);
            let err = VisitError::Gateway(e);
            warn!("Gateway rejected join for meeting {}: {}", meeting_id, err);
            self.shared.lock().last_error = Some(err.user_message());
            return Err(err);
        }

        {
            let mut slot = self.shared.lock();
            if slot.disposed {
                drop(slot);
                rollback.disarm();
                built.session.stop(StopReason::Left);
                return Err(VisitError::invalid_state("join the meeting", self.shared.current()));
            }
            slot.session = Some(built.session.clone());
            slot.role = Some(role);
            self.shared.transition(SessionState::Joining);
        }

        info!(
            "Joining meeting {} as {} ({} media)",
            meeting_id,
            role,
            self.builder.engine_name()
        );

        let session = built.session;
        let mut events = built.events;
        let join_timeout = self.options.join_timeout;
        let outcome = tokio::time::timeout(join_timeout, async {
            session
                .start()
                .await
                .map_err(|e| VisitError::MediaFailure(e.to_string()))?;

            match events.recv().await {
                Some(MediaEvent::Started) => Ok(()),
                Some(MediaEvent::Stopped(reason)) => Err(VisitError::MediaFailure(format!(
                    "media session stopped before starting ({})",
                    reason.code()
                ))),
                Some(MediaEvent::Failed(message)) => Err(VisitError::MediaFailure(message)),
                None => Err(VisitError::MediaFailure(
                    "media session closed its event channel".to_string(),
                )),
            }
        })
        .await
        .unwrap_or_else(|_| {
            Err(VisitError::MediaFailure(format!(
                "media session did not start within {}s",
                join_timeout.as_secs()
            )))
        });
        rollback.disarm();

        let mut slot = self.shared.lock();
        if slot.disposed {
            session.stop(StopReason::Left);
            return Err(VisitError::invalid_state("join the meeting", self.shared.current()));
        }

        match outcome {
            Ok(()) => {
                session.set_microphone_muted(slot.microphone_muted);
                session.set_video_enabled(slot.video_enabled);
                slot.started_at = Some(Utc::now());
                slot.last_error = None;
                self.shared.transition(SessionState::Active);
                drop(slot);

                tokio::spawn(pump_events(self.shared.clone(), events));
                info!("Meeting {} is live", meeting_id);
                Ok(())
            }
            Err(err) => {
                session.stop(StopReason::Left);
                slot.session = None;
                slot.role = None;
                slot.last_error = Some(err.user_message());
                self.shared.transition(SessionState::Created);
                warn!("Join failed for meeting {}: {}", meeting_id, err);
                Err(err)
            }
        }
    }

    /// Stop local media, then tell the gateway the meeting is over.
    ///
    /// The local stop always happens first and is never undone by a failed
    /// notification; that failure comes back as `notify_warning`.
    pub async fn end_meeting(&self, meeting_id: &str) -> Result<EndOutcome, VisitError> {
        let _op = self.shared.begin("end")?;

        let (session, appointment_id) = {
            let mut slot = self.shared.lock();
            let state = self.shared.current();
            let already_ended = state == SessionState::Ended
                || (state == SessionState::Failed && slot.meeting.is_none());
            if already_ended {
                slot.clear_credentials();
                debug!("end_meeting on an already ended visit");
                return Ok(EndOutcome {
                    meeting_id: meeting_id.to_string(),
                    notify_warning: None,
                });
            }

            if !matches!(
                state,
                SessionState::Created | SessionState::Active | SessionState::Failed
            ) {
                let err = VisitError::invalid_state("end the meeting", state);
                error!("{}", err);
                return Err(err);
            }

            if slot.meeting.as_ref().map(|m| m.meeting_id.as_str()) != Some(meeting_id) {
                return Err(VisitError::CredentialsUnavailable(format!(
                    "meeting {} is not held by this visit",
                    meeting_id
                )));
            }

            self.shared.transition(SessionState::Ending);
            (slot.session.take(), slot.appointment_id.clone().unwrap_or_default())
        };

        if let Some(session) = session {
            session.stop(StopReason::Left);
            info!("Local media stopped for meeting {}", meeting_id);
        }

        let notify_warning = match self.auth.current() {
            None => Some(VisitError::AuthRequired.to_string()),
            Some(bearer) => self
                .gateway
                .end_meeting(&bearer, meeting_id, &appointment_id)
                .await
                .err()
                .map(|e| VisitError::Gateway(e).to_string()),
        };

        let mut slot = self.shared.lock();
        slot.clear_credentials();
        slot.meeting = None;
        slot.last_warning = notify_warning.clone();
        self.shared.transition(SessionState::Ended);

        match &notify_warning {
            Some(warning) => warn!(
                "Meeting {} ended locally but the gateway was not notified: {}",
                meeting_id, warning
            ),
            None => info!("Meeting {} ended", meeting_id),
        }

        Ok(EndOutcome {
            meeting_id: meeting_id.to_string(),
            notify_warning,
        })
    }

    /// Flip microphone mute. Returns the new muted flag, or `None` when no
    /// session is live.
    pub fn toggle_microphone(&self) -> Option<bool> {
        let mut slot = self.shared.lock();
        if self.shared.current() != SessionState::Active {
            debug!("toggle_microphone ignored: no active session");
            return None;
        }
        let session = slot.session.clone()?;
        slot.microphone_muted = !slot.microphone_muted;
        session.set_microphone_muted(slot.microphone_muted);
        info!("Microphone muted: {}", slot.microphone_muted);
        Some(slot.microphone_muted)
    }

    /// Flip camera. Returns the new enabled flag, or `None` when no session
    /// is live.
    pub fn toggle_video(&self) -> Option<bool> {
        let mut slot = self.shared.lock();
        if self.shared.current() != SessionState::Active {
            debug!("toggle_video ignored: no active session");
            return None;
        }
        let session = slot.session.clone()?;
        slot.video_enabled = !slot.video_enabled;
        session.set_video_enabled(slot.video_enabled);
        info!("Video enabled: {}", slot.video_enabled);
        Some(slot.video_enabled)
    }

    /// Point live video at new render targets (e.g. the host recreated its
    /// window). Returns false when no session is live.
    pub fn rebind_video(&self, targets: RenderTargets) -> bool {
        let slot = self.shared.lock();
        match (&slot.session, self.shared.current()) {
            (Some(session), SessionState::Active) => {
                session.bind_video(targets);
                true
            }
            _ => false,
        }
    }

    /// Unconditional teardown for when the owning host goes away.
    ///
    /// Stops media, drops credentials and settles any non-terminal state on
    /// Ended, without waiting for pending operations. Safe to call more than
    /// once; also runs on drop.
    pub fn dispose(&self) {
        let mut slot = self.shared.lock();
        if slot.disposed {
            return;
        }
        slot.disposed = true;

        let state = self.shared.current();
        if let Some(session) = slot.session.take() {
            session.stop(StopReason::Left);
        }
        slot.clear_credentials();
        self.shared.transition(SessionState::Ended);

        info!("Visit disposed (was {})", state);
    }

    pub fn state(&self) -> SessionState {
        self.shared.current()
    }

    /// Watch state changes, e.g. to re-render a host UI.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn is_meeting_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Whether any attendee credential is still held in memory.
    pub fn has_credentials(&self) -> bool {
        self.shared.lock().attendees.is_some()
    }

    pub fn meeting(&self) -> Option<MeetingDescriptor> {
        self.shared.lock().meeting.clone()
    }

    pub fn status(&self) -> VisitStatus {
        let slot = self.shared.lock();
        VisitStatus {
            state: self.shared.current(),
            appointment_id: slot.appointment_id.clone(),
            meeting_id: slot.meeting.as_ref().map(|m| m.meeting_id.clone()),
            role: slot.role,
            microphone_muted: slot.microphone_muted,
            video_enabled: slot.video_enabled,
            started_at: slot.started_at,
            last_error: slot.last_error.clone(),
            last_warning: slot.last_warning.clone(),
        }
    }
}

impl Drop for VisitOrchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}
