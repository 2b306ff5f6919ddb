//! Loopback media engine.
//!
//! Opens logical device handles and reports `Started` as soon as it is
//! asked to, without any vendor SDK. Lets a host exercise the gateway,
//! credential and teardown flow end to end.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::builder::SessionConfiguration;
use super::devices::{DeviceController, DeviceKind, RenderTargets};
use super::session::{MediaEngine, MediaEvent, MediaEventSender, MediaSession, StopReason};

pub struct LoopbackEngine;

impl MediaEngine for LoopbackEngine {
    fn name(&self) -> &str {
        "loopback"
    }

    fn create_session(
        &self,
        config: SessionConfiguration,
        devices: DeviceController,
        events: MediaEventSender,
    ) -> Result<Arc<dyn MediaSession>> {
        Ok(Arc::new(LoopbackSession {
            meeting_id: config.meeting_id,
            devices,
            events,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }))
    }
}

pub struct LoopbackSession {
    meeting_id: String,
    devices: DeviceController,
    events: MediaEventSender,
    started: AtomicBool,
    stopped: AtomicBool,
}

#[async_trait]
impl MediaSession for LoopbackSession {
    async fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            bail!("Loopback session for meeting {} was already stopped", self.meeting_id);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            bail!("Loopback session for meeting {} already started", self.meeting_id);
        }

        self.devices.acquire(DeviceKind::Microphone, "loopback-microphone")?;
        self.devices.acquire(DeviceKind::Camera, "loopback-camera")?;

        info!("Loopback media session started for meeting {}", self.meeting_id);
        let _ = self.events.send(MediaEvent::Started);
        Ok(())
    }

    fn stop(&self, reason: StopReason) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.devices.release();
        info!(
            "Loopback media session stopped for meeting {} ({})",
            self.meeting_id,
            reason.code()
        );
        let _ = self.events.send(MediaEvent::Stopped(reason));
    }

    fn set_microphone_muted(&self, muted: bool) {
        debug!("Loopback microphone muted: {}", muted);
    }

    fn set_video_enabled(&self, enabled: bool) {
        debug!("Loopback video enabled: {}", enabled);
    }

    fn bind_video(&self, targets: RenderTargets) {
        self.devices.bind(targets);
    }
}
