use std::fmt;

use crate::cloud::{PropagationStatus, VersionedConfig};
use crate::error::PreviewError;

/// Lifecycle of a distribution as seen by this tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionState {
    Absent,
    Creating,
    Enabled,
    Disabling,
    Disabled,
    Deleting,
}

impl fmt::Display for DistributionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DistributionState::Absent => "Absent",
            DistributionState::Creating => "Creating",
            DistributionState::Enabled => "Enabled",
            DistributionState::Disabling => "Disabling",
            DistributionState::Disabled => "Disabled",
            DistributionState::Deleting => "Deleting",
        };
        write!(f, "{}", s)
    }
}

/// Derive the state from the enabled flag and the propagation status
pub fn observed_state(config: &VersionedConfig, status: PropagationStatus) -> DistributionState {
    match (config.enabled, status) {
        (true, _) => DistributionState::Enabled,
        (false, PropagationStatus::InProgress) => DistributionState::Disabling,
        (false, PropagationStatus::Deployed) => DistributionState::Disabled,
    }
}

/// Only a disabled distribution whose change has fully propagated may be deleted
pub fn can_delete(state: DistributionState) -> bool {
    state == DistributionState::Disabled
}

/// Check if a state transition is valid
pub fn is_valid_transition(from: DistributionState, to: DistributionState) -> bool {
    use DistributionState::*;

    matches!(
        (from, to),
        (Absent, Creating)
            | (Creating, Enabled)
            | (Enabled, Disabling)
            | (Disabling, Disabled)
            | (Disabled, Deleting)
            | (Deleting, Absent)
    )
}

/// Validate a state transition and return an error if invalid
pub fn validate_transition(
    from: DistributionState,
    to: DistributionState,
) -> Result<(), PreviewError> {
    if !is_valid_transition(from, to) {
        return Err(PreviewError::InvalidTransition { from, to });
    }
    Ok(())
}
