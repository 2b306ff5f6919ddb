//! Scriptable fakes shared by the visit integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

use televisit::auth::{AuthHandle, BearerCredential};
use televisit::gateway::{
    AttendeeCredentials, CredentialGateway, MeetingDescriptor, MeetingGrant, Role,
    TransportPlacement,
};
use televisit::media::{
    DeviceController, DeviceKind, MediaEngine, MediaEvent, MediaEventSender, MediaSession,
    RenderTargets, SessionConfiguration, StopReason,
};
use televisit::visit::{MeetingEndedHook, MeetingEndedReport, VisitOptions, VisitOrchestrator};
use televisit::GatewayError;

pub const MEETING_ID: &str = "m-1";
pub const APPOINTMENT_ID: &str = "appt-42";
pub const BEARER_TOKEN: &str = "caller-bearer-secret";
pub const DOCTOR_TOKEN: &str = "doctor-join-secret";
pub const PATIENT_TOKEN: &str = "patient-join-secret";

pub fn descriptor(expires_at: DateTime<Utc>) -> MeetingDescriptor {
    MeetingDescriptor {
        meeting_id: MEETING_ID.to_string(),
        transport: TransportPlacement {
            signaling_url: Some("wss://signal.example.com/control".to_string()),
            audio_host_url: Some("https://audio.example.com:3478".to_string()),
            turn_control_url: None,
        },
        region: "us-east-1".to_string(),
        expires_at,
    }
}

pub fn both_attendees() -> AttendeeCredentials {
    serde_json::from_value(serde_json::json!({
        "doctor": { "attendee_id": "a-doc", "join_token": DOCTOR_TOKEN, "external_user_id": "dr-7" },
        "patient": { "attendee_id": "a-pat", "join_token": PATIENT_TOKEN, "external_user_id": "pt-9" }
    }))
    .unwrap()
}

pub fn doctor_only() -> AttendeeCredentials {
    serde_json::from_value(serde_json::json!({
        "doctor": { "attendee_id": "a-doc", "join_token": DOCTOR_TOKEN }
    }))
    .unwrap()
}

/// Gateway with call counters and switchable failures.
pub struct FakeGateway {
    meeting: MeetingDescriptor,
    attendees: AttendeeCredentials,
    pub create_calls: AtomicUsize,
    pub join_calls: AtomicUsize,
    pub end_calls: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_join: AtomicBool,
    pub fail_end: AtomicBool,
    create_gate: Option<Arc<Notify>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::with_grant(descriptor(Utc::now() + ChronoDuration::hours(1)), both_attendees())
    }

    pub fn with_grant(meeting: MeetingDescriptor, attendees: AttendeeCredentials) -> Self {
        Self {
            meeting,
            attendees,
            create_calls: AtomicUsize::new(0),
            join_calls: AtomicUsize::new(0),
            end_calls: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            fail_join: AtomicBool::new(false),
            fail_end: AtomicBool::new(false),
            create_gate: None,
        }
    }

    /// Hold create_meeting until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.create_gate = Some(gate);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
            + self.join_calls.load(Ordering::SeqCst)
            + self.end_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialGateway for FakeGateway {
    async fn create_meeting(
        &self,
        _bearer: &BearerCredential,
        _appointment_id: &str,
    ) -> Result<MeetingGrant, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.create_gate {
            gate.notified().await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(GatewayError::status(503, "Service unavailable"));
        }
        Ok(MeetingGrant {
            meeting: self.meeting.clone(),
            attendees: self.attendees.clone(),
        })
    }

    async fn join_meeting(
        &self,
        _bearer: &BearerCredential,
        _meeting_id: &str,
        _appointment_id: &str,
        _role: Role,
    ) -> Result<(), GatewayError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(GatewayError::status(409, "Appointment is not open yet"));
        }
        Ok(())
    }

    async fn end_meeting(
        &self,
        _bearer: &BearerCredential,
        _meeting_id: &str,
        _appointment_id: &str,
    ) -> Result<(), GatewayError> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(GatewayError::network("connection reset by peer"));
        }
        Ok(())
    }
}

/// How a fake media session behaves when started.
#[derive(Clone)]
pub enum StartMode {
    /// Report Started right away.
    Immediate,
    /// Report Started once the gate is notified, or give up when stopped.
    Gated(Arc<Notify>),
    /// Fail as if a device permission was denied.
    Fail,
    /// Stop with the given reason instead of starting.
    StopInstead(StopReason),
}

pub struct FakeEngine {
    mode: StartMode,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeEngine {
    pub fn new(mode: StartMode) -> Self {
        Self {
            mode,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self, index: usize) -> Arc<FakeSession> {
        self.sessions.lock().unwrap()[index].clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl MediaEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn create_session(
        &self,
        config: SessionConfiguration,
        devices: DeviceController,
        events: MediaEventSender,
    ) -> Result<Arc<dyn MediaSession>> {
        let session = Arc::new(FakeSession {
            config,
            mode: self.mode.clone(),
            devices,
            events,
            stopped: AtomicBool::new(false),
            stop_calls: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            muted: AtomicBool::new(false),
            video: AtomicBool::new(true),
            wake: Notify::new(),
        });
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

pub struct FakeSession {
    pub config: SessionConfiguration,
    mode: StartMode,
    pub devices: DeviceController,
    events: MediaEventSender,
    stopped: AtomicBool,
    pub stop_calls: AtomicUsize,
    pub releases: AtomicUsize,
    pub muted: AtomicBool,
    pub video: AtomicBool,
    wake: Notify,
}

impl FakeSession {
    /// Push an event as if the media SDK raised it.
    pub fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSession for FakeSession {
    async fn start(&self) -> Result<()> {
        match &self.mode {
            StartMode::Immediate => {
                self.devices.acquire(DeviceKind::Microphone, "fake-mic")?;
                self.devices.acquire(DeviceKind::Camera, "fake-cam")?;
                self.emit(MediaEvent::Started);
            }
            StartMode::Gated(gate) => {
                self.devices.acquire(DeviceKind::Microphone, "fake-mic")?;
                self.devices.acquire(DeviceKind::Camera, "fake-cam")?;
                tokio::select! {
                    _ = gate.notified() => self.emit(MediaEvent::Started),
                    _ = self.wake.notified() => {}
                }
            }
            StartMode::Fail => bail!("camera permission denied"),
            StartMode::StopInstead(reason) => self.stop(reason.clone()),
        }
        Ok(())
    }

    fn stop(&self, reason: StopReason) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.devices.release() {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
        self.emit(MediaEvent::Stopped(reason));
        self.wake.notify_one();
    }

    fn set_microphone_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn set_video_enabled(&self, enabled: bool) {
        self.video.store(enabled, Ordering::SeqCst);
    }

    fn bind_video(&self, targets: RenderTargets) {
        self.devices.bind(targets);
    }
}

/// Hook that forwards every report to the test.
pub struct RecordingHook {
    tx: mpsc::UnboundedSender<MeetingEndedReport>,
}

impl RecordingHook {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MeetingEndedReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl MeetingEndedHook for RecordingHook {
    async fn execute(&self, report: &MeetingEndedReport) -> Result<()> {
        let _ = self.tx.send(report.clone());
        Ok(())
    }
}

pub fn signed_in() -> AuthHandle {
    AuthHandle::new(Some(BearerCredential::new(BEARER_TOKEN)))
}

pub struct Harness {
    pub visit: Arc<VisitOrchestrator>,
    pub gateway: Arc<FakeGateway>,
    pub engine: Arc<FakeEngine>,
}

impl Harness {
    pub fn new(gateway: FakeGateway, mode: StartMode) -> Self {
        Self::build(gateway, mode, signed_in(), None, VisitOptions::default())
    }

    pub fn build(
        gateway: FakeGateway,
        mode: StartMode,
        auth: AuthHandle,
        hook: Option<Arc<dyn MeetingEndedHook>>,
        options: VisitOptions,
    ) -> Self {
        let gateway = Arc::new(gateway);
        let engine = Arc::new(FakeEngine::new(mode));
        let visit = Arc::new(VisitOrchestrator::new(
            gateway.clone(),
            engine.clone(),
            auth,
            hook,
            options,
        ));
        Self {
            visit,
            gateway,
            engine,
        }
    }

    /// Create and join as the doctor.
    pub async fn go_live(&self) {
        self.visit.create_meeting(APPOINTMENT_ID).await.unwrap();
        self.visit
            .join_meeting(MEETING_ID, Role::Doctor, RenderTargets::default())
            .await
            .unwrap();
    }
}
