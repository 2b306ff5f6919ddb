//! Media session abstraction over the vendor audio/video SDK.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::builder::SessionConfiguration;
use super::devices::{DeviceController, RenderTargets};

/// Why a media session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The local participant left on purpose.
    Left,
    /// The meeting was ended for everyone.
    MeetingEnded,
    ConnectivityLost,
    Other(String),
}

impl StopReason {
    /// Normal endings, as opposed to failures.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::Left | Self::MeetingEnded)
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Left => "left",
            Self::MeetingEnded => "meeting-ended",
            Self::ConnectivityLost => "connectivity-lost",
            Self::Other(code) => code,
        }
    }
}

/// Lifecycle events a media session reports on its single event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    Started,
    Stopped(StopReason),
    Failed(String),
}

pub type MediaEventSender = mpsc::UnboundedSender<MediaEvent>;
pub type MediaEventReceiver = mpsc::UnboundedReceiver<MediaEvent>;

/// A live audio/video pipeline.
///
/// Implementations own their [`DeviceController`] and must release it when
/// stopped, whatever the reason.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Negotiate device permissions and connect. May take as long as the
    /// user needs to answer a permission prompt. Success is reported by a
    /// `Started` event, not by the return value alone.
    async fn start(&self) -> Result<()>;

    /// Stop the pipeline and release devices. Idempotent; the first call
    /// emits `Stopped(reason)`.
    fn stop(&self, reason: StopReason);

    fn set_microphone_muted(&self, muted: bool);

    fn set_video_enabled(&self, enabled: bool);

    /// Bind live frames to the host's render targets.
    fn bind_video(&self, targets: RenderTargets);
}

/// Factory for media sessions; the seam where a vendor SDK plugs in.
pub trait MediaEngine: Send + Sync {
    fn name(&self) -> &str;

    fn create_session(
        &self,
        config: SessionConfiguration,
        devices: DeviceController,
        events: MediaEventSender,
    ) -> Result<Arc<dyn MediaSession>>;
}
