//! Platform abstraction layer
//!
//! The engine never touches the DOM or sensors directly. Hosts implement
//! these traits for:
//! - Display refresh requests
//! - Placing and releasing marble visuals
//! - Loading avatar images
//! - Sensor permission prompts
//! - Debug overlays

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::system::Diagnostics;
use crate::SimError;

/// Opaque reference to a host-owned visual element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualHandle(pub u64);

/// Places marble visuals; the engine never reads anything back
pub trait Renderer {
    /// Move a visual so its top-left corner sits at `(left, top)`
    fn place(&mut self, visual: VisualHandle, left: f32, top: f32, radius: f32);
    /// Detach a visual whose marble was removed
    fn release(&mut self, visual: VisualHandle);
}

/// Resolves an avatar URL into a ready-to-render visual
pub trait ImageLoader {
    /// Fails with [`SimError::ImageLoadFailed`] when the image is unavailable
    fn load(&self, url: &str) -> impl Future<Output = Result<VisualHandle, SimError>>;
}

/// Id of a pending display refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest(pub u64);

/// Source of display refresh callbacks (requestAnimationFrame on web)
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameRequest;
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Sensor permission capability, resolved once per platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorPermission {
    /// No prompt exists; access is implicitly granted
    NotRequired,
    /// A prompt must be shown (needs a user gesture)
    Requestable,
    /// Sensor missing or blocked by policy
    Denied,
}

/// Outcome of a permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionResponse {
    Granted,
    Denied,
}

/// Platform sensor permission API
pub trait PermissionProvider {
    fn capability(&self) -> SensorPermission;
    fn request_permission(&self) -> impl Future<Output = PermissionResponse>;
}

/// Resolve a permission according to the provider's capability
pub async fn resolve_permission<P: PermissionProvider>(provider: &P) -> PermissionResponse {
    match provider.capability() {
        SensorPermission::NotRequired => PermissionResponse::Granted,
        SensorPermission::Requestable => provider.request_permission().await,
        SensorPermission::Denied => PermissionResponse::Denied,
    }
}

/// Optional debug overlay fed by the orchestrator
pub trait DebugOverlay {
    fn resize(&mut self, width: f32, height: f32);
    fn show(&mut self, diagnostics: &Diagnostics);
}

/// Frame scheduler for hosts that pump frames themselves (native, tests)
///
/// Tracks at most one outstanding request, like requestAnimationFrame.
#[derive(Debug, Default)]
pub struct ManualFrames {
    next_id: u64,
    pending: Option<FrameRequest>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a frame has been requested and not cancelled
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Consume the pending request (the host is about to deliver the frame)
    pub fn take_pending(&mut self) -> Option<FrameRequest> {
        self.pending.take()
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }
}
