//! External force sources
//!
//! Each source owns its input state (pointer, tilt, acceleration) and turns
//! it into velocity changes. Sources are fed by the host through plain event
//! values and never see the DOM.

pub mod motion;
pub mod orientation;
pub mod pointer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::platform::{PermissionProvider, PermissionResponse, SensorPermission, resolve_permission};
use crate::sim::Marble;

pub use motion::{MotionConfigPatch, MotionDebug, MotionInteraction, MotionReading};
pub use orientation::{
    OrientationConfigPatch, OrientationDebug, OrientationInteraction, OrientationReading,
};
pub use pointer::{PointerConfigPatch, PointerEvent, PointerInteraction};

/// A source of external acceleration applied before each physics step
pub trait ForceSource {
    /// Whether the source would change anything right now
    fn is_active(&self) -> bool;
    /// Add this source's velocity change for a step of `dt` seconds
    fn apply_force(&mut self, marbles: &mut [Marble], dt: f32);
}

/// Device sensors that sit behind a permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Orientation,
    Motion,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Orientation => write!(f, "device orientation"),
            SensorKind::Motion => write!(f, "device motion"),
        }
    }
}

/// Permission state of one sensor source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SensorGate {
    /// Not requested yet
    #[default]
    Idle,
    /// Granted; readings are accepted
    Active,
    /// Refused for this session; only an explicit new request may retry
    Denied,
}

impl SensorGate {
    /// Gate after a permission prompt resolved
    pub fn after(response: PermissionResponse) -> Self {
        match response {
            PermissionResponse::Granted => SensorGate::Active,
            PermissionResponse::Denied => SensorGate::Denied,
        }
    }

    #[inline]
    pub fn is_open(self) -> bool {
        self == SensorGate::Active
    }
}

/// Ask the platform for a sensor, mapping denial to [`SimError::PermissionDenied`]
///
/// Must be started from a user gesture on platforms with a prompt.
pub async fn request_sensor<P: PermissionProvider>(provider: &P, kind: SensorKind) -> Result<(), SimError> {
    if provider.capability() == SensorPermission::Denied {
        log::warn!("{} not available on this platform", kind);
    }
    match resolve_permission(provider).await {
        PermissionResponse::Granted => {
            log::info!("{} permission granted", kind);
            Ok(())
        }
        PermissionResponse::Denied => Err(SimError::PermissionDenied(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prompt(PermissionResponse);

    impl PermissionProvider for Prompt {
        fn capability(&self) -> SensorPermission {
            SensorPermission::Requestable
        }

        async fn request_permission(&self) -> PermissionResponse {
            self.0
        }
    }

    #[test]
    fn test_denied_prompt_is_permission_error() {
        let result = pollster::block_on(request_sensor(
            &Prompt(PermissionResponse::Denied),
            SensorKind::Motion,
        ));
        assert!(matches!(result, Err(SimError::PermissionDenied(SensorKind::Motion))));
    }

    #[test]
    fn test_granted_prompt() {
        let result = pollster::block_on(request_sensor(
            &Prompt(PermissionResponse::Granted),
            SensorKind::Orientation,
        ));
        assert!(result.is_ok());
    }

    #[test]
    fn test_gate_after_response() {
        assert_eq!(SensorGate::after(PermissionResponse::Granted), SensorGate::Active);
        assert_eq!(SensorGate::after(PermissionResponse::Denied), SensorGate::Denied);
        assert!(!SensorGate::Denied.is_open());
    }

    #[test]
    fn test_error_message_names_sensor() {
        let err = SimError::PermissionDenied(SensorKind::Orientation);
        assert_eq!(err.to_string(), "device orientation permission denied");
    }
}
