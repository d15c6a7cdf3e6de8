// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller's finite state machine: what states exist,
//! which transitions are legal, and which terminal states allow cleanup.

/// A controller run's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Init,
    RunningGlobalSetup,
    RunningWorkloads,
    RunningGlobalTeardown,
    StopArmed,
    StoppingInterruptSetup,
    StoppingWaitRunners,
    StoppingTeardown,
    StoppingInterruptTeardown,
    Finished,
    Aborted,
    StopFailed,
    Failed,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Init => "INIT",
            Self::RunningGlobalSetup => "RUNNING_GLOBAL_SETUP",
            Self::RunningWorkloads => "RUNNING_WORKLOADS",
            Self::RunningGlobalTeardown => "RUNNING_GLOBAL_TEARDOWN",
            Self::StopArmed => "STOP_ARMED",
            Self::StoppingInterruptSetup => "STOPPING_INTERRUPT_SETUP",
            Self::StoppingWaitRunners => "STOPPING_WAIT_RUNNERS",
            Self::StoppingTeardown => "STOPPING_TEARDOWN",
            Self::StoppingInterruptTeardown => "STOPPING_INTERRUPT_TEARDOWN",
            Self::Finished => "FINISHED",
            Self::Aborted => "ABORTED",
            Self::StopFailed => "STOP_FAILED",
            Self::Failed => "FAILED",
        })
    }
}

impl ControllerState {
    /// Terminal states are immutable: no transition out of them is legal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted | Self::StopFailed | Self::Failed)
    }

    /// Only `FINISHED`/`ABORTED` leave provisioned resources safe to reclaim;
    /// `STOP_FAILED`/`FAILED` preserve them for post-mortem inspection.
    pub fn cleanup_allowed(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    /// Whether a stop request arms the FSM from this state (only while a
    /// phase is actively running).
    pub fn is_running_phase(self) -> bool {
        matches!(self, Self::RunningGlobalSetup | Self::RunningWorkloads | Self::RunningGlobalTeardown)
    }

    /// The stopping sub-state a stop arms into, chosen by the phase
    /// currently running. `None` if stop cannot be armed from `self`.
    pub fn stopping_counterpart(self) -> Option<Self> {
        match self {
            Self::RunningGlobalSetup => Some(Self::StoppingInterruptSetup),
            Self::RunningWorkloads => Some(Self::StoppingWaitRunners),
            Self::RunningGlobalTeardown => Some(Self::StoppingInterruptTeardown),
            _ => None,
        }
    }

    /// Validate `self -> next`. Terminal states reject every transition,
    /// including into themselves (they are reached exactly once).
    pub fn validate_transition(self, next: Self) -> Result<(), InvalidControllerTransition> {
        if self.is_terminal() {
            return Err(InvalidControllerTransition { from: self, to: next });
        }
        let legal = matches!(
            (self, next),
            (Self::Init, Self::RunningGlobalSetup)
                | (Self::RunningGlobalSetup, Self::RunningWorkloads)
                | (Self::RunningGlobalSetup, Self::Failed)
                | (Self::RunningWorkloads, Self::RunningGlobalTeardown)
                | (Self::RunningWorkloads, Self::Failed)
                | (Self::RunningGlobalTeardown, Self::Finished)
                | (Self::RunningGlobalTeardown, Self::Failed)
                | (Self::RunningGlobalSetup, Self::StoppingInterruptSetup)
                | (Self::RunningWorkloads, Self::StoppingWaitRunners)
                | (Self::RunningGlobalTeardown, Self::StoppingInterruptTeardown)
                | (Self::StoppingInterruptSetup, Self::StoppingTeardown)
                | (Self::StoppingInterruptSetup, Self::StopFailed)
                | (Self::StoppingWaitRunners, Self::StoppingTeardown)
                | (Self::StoppingWaitRunners, Self::StopFailed)
                | (Self::StoppingTeardown, Self::Aborted)
                | (Self::StoppingTeardown, Self::StopFailed)
                | (Self::StoppingInterruptTeardown, Self::StopFailed)
                | (Self::StoppingInterruptTeardown, Self::Aborted)
        );
        if legal {
            Ok(())
        } else {
            Err(InvalidControllerTransition { from: self, to: next })
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid controller transition: {from} -> {to}")]
pub struct InvalidControllerTransition {
    pub from: ControllerState,
    pub to: ControllerState,
}

/// Owns the current [`ControllerState`] and enforces transition legality.
#[derive(Debug, Clone)]
pub struct ControllerStateMachine {
    state: ControllerState,
}

impl Default for ControllerStateMachine {
    fn default() -> Self {
        Self { state: ControllerState::Init }
    }
}

impl ControllerStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn transition(&mut self, next: ControllerState) -> Result<(), InvalidControllerTransition> {
        self.state.validate_transition(next)?;
        self.state = next;
        Ok(())
    }

    /// Arm a stop from the current running phase, if one is active.
    /// Returns the state reached, or `None` if there is no running phase
    /// to arm a stop from (e.g. already stopping, or terminal).
    pub fn arm_stop(&mut self) -> Option<ControllerState> {
        let next = self.state.stopping_counterpart()?;
        self.transition(next).ok()?;
        Some(next)
    }
}

#[cfg(test)]
#[path = "controller_state_tests.rs"]
mod tests;
