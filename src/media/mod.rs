//! Media side of a visit: session construction, the media SDK seam and the
//! device handles it owns.

pub mod builder;
pub mod devices;
pub mod loopback;
pub mod session;

pub use builder::{BuiltSession, SessionBuilder, SessionConfiguration};
pub use devices::{DeviceController, DeviceKind, RenderTarget, RenderTargets};
pub use loopback::LoopbackEngine;
pub use session::{
    MediaEngine, MediaEvent, MediaEventReceiver, MediaEventSender, MediaSession, StopReason,
};
