//! Camera/microphone handles and render-target bindings for one session.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque identifier of a surface the host renders video into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderTarget(String);

impl RenderTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local preview and remote peer targets supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTargets {
    pub local: Option<RenderTarget>,
    pub remote: Option<RenderTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Camera,
    Microphone,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Microphone => "microphone",
        }
    }
}

/// An open device stream.
#[derive(Debug)]
pub struct DeviceStream {
    pub id: Uuid,
    pub kind: DeviceKind,
    pub label: String,
}

#[derive(Debug, Default)]
struct MediaHandles {
    camera: Option<DeviceStream>,
    microphone: Option<DeviceStream>,
    targets: RenderTargets,
    released: bool,
}

/// Owns the device streams and render bindings of one media session.
///
/// Clones share the same handles. Once released, nothing can be acquired or
/// bound again; a new session gets a new controller.
#[derive(Clone, Debug, Default)]
pub struct DeviceController {
    inner: Arc<Mutex<MediaHandles>>,
}

impl DeviceController {
    pub fn new(targets: RenderTargets) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MediaHandles {
                targets,
                ..MediaHandles::default()
            })),
        }
    }

    fn handles(&self) -> MutexGuard<'_, MediaHandles> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an opened device stream.
    pub fn acquire(&self, kind: DeviceKind, label: impl Into<String>) -> Result<()> {
        let mut handles = self.handles();
        if handles.released {
            bail!("Cannot open {} after media handles were released", kind.as_str());
        }

        let stream = DeviceStream {
            id: Uuid::new_v4(),
            kind,
            label: label.into(),
        };
        debug!("Opened {} stream: {}", kind.as_str(), stream.label);

        let slot = match kind {
            DeviceKind::Camera => &mut handles.camera,
            DeviceKind::Microphone => &mut handles.microphone,
        };
        *slot = Some(stream);
        Ok(())
    }

    /// Rebind render targets. Ignored after release.
    pub fn bind(&self, targets: RenderTargets) {
        let mut handles = self.handles();
        if !handles.released {
            handles.targets = targets;
        }
    }

    pub fn targets(&self) -> RenderTargets {
        self.handles().targets.clone()
    }

    pub fn is_held(&self, kind: DeviceKind) -> bool {
        let handles = self.handles();
        match kind {
            DeviceKind::Camera => handles.camera.is_some(),
            DeviceKind::Microphone => handles.microphone.is_some(),
        }
    }

    pub fn is_released(&self) -> bool {
        self.handles().released
    }

    /// Stop every stream and unbind both targets.
    ///
    /// Returns `true` only for the call that actually released; later calls
    /// are no-ops.
    pub fn release(&self) -> bool {
        let mut handles = self.handles();
        if handles.released {
            return false;
        }

        let camera = handles.camera.take();
        let microphone = handles.microphone.take();
        handles.targets = RenderTargets::default();
        handles.released = true;

        info!(
            "Released media handles (camera: {}, microphone: {})",
            camera.is_some(),
            microphone.is_some()
        );
        true
    }
}
