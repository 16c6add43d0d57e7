//! Session state machine
//!
//! All lifecycle rules live in [`SessionMachine::step`]. It performs no I/O:
//! each accepted input yields the effects the controller must carry out, in
//! order. This keeps timer and device behaviour deterministic under test.

use super::state::RecordingState;
use thiserror::Error;

/// Inputs driving the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// User pressed start. `capture_ready` reports whether a live stream
    /// with no running encoder is bound.
    Start { capture_ready: bool },
    /// User pressed stop
    Stop,
    /// One timer period elapsed
    Tick,
    /// Upload of the held clip requested
    Upload,
    UploadSucceeded,
    UploadFailed(String),
    /// Encoder or device failure while recording or finalizing
    Fault(String),
    /// Retry / record again
    Reset,
    /// External disable signal
    Disable,
    Enable,
}

/// Work the controller performs after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    BeginEncoding,
    StartTimer,
    CancelTimer,
    FinalizeClip,
    /// Max duration reached; tell the caller recording completed on its own
    NotifyComplete,
    DiscardClip,
}

/// Result of an accepted input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: RecordingState,
    pub to: RecordingState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: RecordingState) -> Self {
        Self {
            from: state,
            to: state,
            effects: Vec::new(),
        }
    }

    fn to(from: RecordingState, to: RecordingState, effects: Vec<Effect>) -> Self {
        Self { from, to, effects }
    }

    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    pub fn is_noop(&self) -> bool {
        !self.changed() && self.effects.is_empty()
    }
}

/// Inputs the machine refuses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: RecordingState,
        action: &'static str,
    },

    #[error("Camera is not ready yet")]
    CaptureNotReady,

    #[error("Recorder is disabled")]
    Disabled,
}

/// Lifecycle state, elapsed time and flags of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMachine {
    state: RecordingState,
    elapsed_secs: u32,
    max_secs: u32,
    disabled: bool,
    timer_attached: bool,
    last_error: Option<String>,
}

impl SessionMachine {
    pub fn new(max_secs: u32) -> Self {
        Self {
            state: RecordingState::Idle,
            elapsed_secs: 0,
            max_secs: max_secs.max(1),
            disabled: false,
            timer_attached: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn max_secs(&self) -> u32 {
        self.max_secs
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn timer_attached(&self) -> bool {
        self.timer_attached
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply one input
    pub fn step(&mut self, input: Input) -> Result<Transition, TransitionError> {
        use RecordingState::*;

        let from = self.state;
        let transition = match (from, input) {
            (Recording, Input::Start { .. }) => Transition::stay(from),
            (Idle, Input::Start { capture_ready }) => {
                if self.disabled {
                    return Err(TransitionError::Disabled);
                }
                if !capture_ready {
                    return Err(TransitionError::CaptureNotReady);
                }
                self.elapsed_secs = 0;
                self.timer_attached = true;
                self.last_error = None;
                Transition::to(from, Recording, vec![Effect::BeginEncoding, Effect::StartTimer])
            }
            (_, Input::Start { .. }) => return Err(invalid(from, "start recording")),

            (Recording, Input::Stop) => {
                let mut effects = Vec::new();
                if self.timer_attached {
                    self.timer_attached = false;
                    effects.push(Effect::CancelTimer);
                }
                effects.push(Effect::FinalizeClip);
                Transition::to(from, Stopped, effects)
            }
            (_, Input::Stop) => Transition::stay(from),

            (Recording, Input::Tick) if self.timer_attached => {
                self.elapsed_secs = (self.elapsed_secs + 1).min(self.max_secs);
                if self.elapsed_secs >= self.max_secs {
                    self.timer_attached = false;
                    Transition::to(
                        from,
                        Stopped,
                        vec![Effect::CancelTimer, Effect::FinalizeClip, Effect::NotifyComplete],
                    )
                } else {
                    Transition::stay(from)
                }
            }
            (_, Input::Tick) => Transition::stay(from),

            (Stopped, Input::Upload) => {
                self.last_error = None;
                Transition::to(from, Uploading, Vec::new())
            }
            (_, Input::Upload) => return Err(invalid(from, "upload")),

            (Uploading, Input::UploadSucceeded) => Transition::to(from, Uploaded, Vec::new()),
            (Uploading, Input::UploadFailed(message)) => {
                self.last_error = Some(message);
                Transition::to(from, Error, Vec::new())
            }
            (_, Input::UploadSucceeded) | (_, Input::UploadFailed(_)) => {
                return Err(invalid(from, "complete an upload"))
            }

            (Idle, Input::Fault(message)) => {
                self.last_error = Some(message);
                Transition::stay(from)
            }
            (_, Input::Fault(message)) => {
                let mut effects = Vec::new();
                if self.timer_attached {
                    self.timer_attached = false;
                    effects.push(Effect::CancelTimer);
                }
                self.last_error = Some(message);
                Transition::to(from, Error, effects)
            }

            (Idle, Input::Reset) => Transition::stay(from),
            (state, Input::Reset) if state.is_resettable() => {
                self.elapsed_secs = 0;
                self.last_error = None;
                Transition::to(from, Idle, vec![Effect::DiscardClip])
            }
            (_, Input::Reset) => return Err(invalid(from, "reset")),

            (_, Input::Disable) => {
                self.disabled = true;
                let mut effects = Vec::new();
                // Disabling only detaches the timer; a running encoder keeps
                // capturing until the user stops it.
                if from != Idle {
                    self.elapsed_secs = 0;
                    if self.timer_attached {
                        self.timer_attached = false;
                        effects.push(Effect::CancelTimer);
                    }
                }
                Transition::stay(from).with_effects(effects)
            }
            (_, Input::Enable) => {
                self.disabled = false;
                Transition::stay(from)
            }
        };

        self.state = transition.to;
        if transition.changed() {
            tracing::debug!("Recording state {} -> {}", transition.from, transition.to);
        }
        Ok(transition)
    }
}

impl Transition {
    fn with_effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }
}

fn invalid(state: RecordingState, action: &'static str) -> TransitionError {
    TransitionError::InvalidTransition { state, action }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RecordingState::*;

    fn recording(max_secs: u32) -> SessionMachine {
        let mut machine = SessionMachine::new(max_secs);
        machine.step(Input::Start { capture_ready: true }).unwrap();
        machine
    }

    #[test]
    fn test_start_begins_encoding_and_timer() {
        let mut machine = SessionMachine::new(120);
        let t = machine.step(Input::Start { capture_ready: true }).unwrap();
        assert_eq!(t.to, Recording);
        assert_eq!(t.effects, vec![Effect::BeginEncoding, Effect::StartTimer]);
        assert_eq!(machine.elapsed_secs(), 0);
        assert!(machine.timer_attached());
    }

    #[test]
    fn test_start_requires_ready_capture() {
        let mut machine = SessionMachine::new(120);
        assert_eq!(
            machine.step(Input::Start { capture_ready: false }),
            Err(TransitionError::CaptureNotReady)
        );
        assert_eq!(machine.state(), Idle);
    }

    #[test]
    fn test_start_refused_while_disabled() {
        let mut machine = SessionMachine::new(120);
        machine.step(Input::Disable).unwrap();
        assert_eq!(
            machine.step(Input::Start { capture_ready: true }),
            Err(TransitionError::Disabled)
        );
        machine.step(Input::Enable).unwrap();
        assert!(machine.step(Input::Start { capture_ready: true }).is_ok());
    }

    #[test]
    fn test_start_while_recording_is_noop() {
        let mut machine = recording(120);
        machine.step(Input::Tick).unwrap();
        let before = machine.clone();

        let t = machine.step(Input::Start { capture_ready: false }).unwrap();
        assert!(t.is_noop());
        assert_eq!(machine, before);
    }

    #[test]
    fn test_stop_while_not_recording_is_noop() {
        for state_input in [None, Some(Input::Start { capture_ready: true })] {
            let mut machine = SessionMachine::new(10);
            if let Some(input) = state_input {
                machine.step(input).unwrap();
                machine.step(Input::Stop).unwrap();
            }
            let before = machine.clone();
            assert!(machine.step(Input::Stop).unwrap().is_noop());
            assert_eq!(machine, before);
        }
    }

    #[test]
    fn test_user_stop_cancels_timer_and_finalizes() {
        let mut machine = recording(120);
        let t = machine.step(Input::Stop).unwrap();
        assert_eq!(t.to, Stopped);
        assert_eq!(t.effects, vec![Effect::CancelTimer, Effect::FinalizeClip]);
    }

    #[test]
    fn test_timeout_after_exactly_max_ticks() {
        let mut machine = recording(5);
        for second in 1..5 {
            let t = machine.step(Input::Tick).unwrap();
            assert_eq!(t.to, Recording);
            assert_eq!(machine.elapsed_secs(), second);
        }
        let t = machine.step(Input::Tick).unwrap();
        assert_eq!(t.to, Stopped);
        assert_eq!(
            t.effects,
            vec![Effect::CancelTimer, Effect::FinalizeClip, Effect::NotifyComplete]
        );
        assert_eq!(machine.elapsed_secs(), 5);

        // A late sixth tick changes nothing
        assert!(machine.step(Input::Tick).unwrap().is_noop());
        assert_eq!(machine.elapsed_secs(), 5);
    }

    #[test]
    fn test_elapsed_never_exceeds_max_for_any_interleaving() {
        // Exhaustive over short sequences of start/stop/tick/reset
        let inputs = [
            Input::Start { capture_ready: true },
            Input::Stop,
            Input::Tick,
            Input::Reset,
        ];
        let max = 3;
        let mut sequences: Vec<Vec<usize>> = vec![vec![]];
        for _ in 0..7 {
            let mut next = Vec::new();
            for seq in &sequences {
                for i in 0..inputs.len() {
                    let mut s = seq.clone();
                    s.push(i);
                    next.push(s);
                }
            }
            sequences = next;
        }

        for seq in sequences {
            let mut machine = SessionMachine::new(max);
            for &i in &seq {
                let _ = machine.step(inputs[i].clone());
                assert!(machine.elapsed_secs() <= max);
                if machine.elapsed_secs() == max {
                    assert_ne!(machine.state(), Recording);
                }
            }
        }
    }

    #[test]
    fn test_upload_only_from_stopped() {
        let mut machine = SessionMachine::new(10);
        assert!(matches!(
            machine.step(Input::Upload),
            Err(TransitionError::InvalidTransition { state: Idle, .. })
        ));

        machine.step(Input::Start { capture_ready: true }).unwrap();
        assert!(machine.step(Input::Upload).is_err());

        machine.step(Input::Stop).unwrap();
        let t = machine.step(Input::Upload).unwrap();
        assert_eq!(t.to, Uploading);
        assert!(t.effects.is_empty());

        // One upload in flight per session
        assert!(machine.step(Input::Upload).is_err());
    }

    #[test]
    fn test_upload_outcomes() {
        let mut ok = recording(10);
        ok.step(Input::Stop).unwrap();
        ok.step(Input::Upload).unwrap();
        assert_eq!(ok.step(Input::UploadSucceeded).unwrap().to, Uploaded);

        let mut failed = recording(10);
        failed.step(Input::Stop).unwrap();
        failed.step(Input::Upload).unwrap();
        let t = failed.step(Input::UploadFailed("HTTP 500".into())).unwrap();
        assert_eq!(t.to, Error);
        assert_eq!(failed.last_error(), Some("HTTP 500"));
    }

    #[test]
    fn test_reset_from_terminal_states_yields_clean_idle() {
        let mut uploaded = recording(10);
        uploaded.step(Input::Tick).unwrap();
        uploaded.step(Input::Stop).unwrap();
        uploaded.step(Input::Upload).unwrap();
        uploaded.step(Input::UploadSucceeded).unwrap();

        let mut errored = recording(10);
        errored.step(Input::Tick).unwrap();
        errored.step(Input::Stop).unwrap();
        errored.step(Input::Upload).unwrap();
        errored.step(Input::UploadFailed("boom".into())).unwrap();

        for mut machine in [uploaded, errored] {
            let t = machine.step(Input::Reset).unwrap();
            assert_eq!(t.to, Idle);
            assert_eq!(t.effects, vec![Effect::DiscardClip]);
            assert_eq!(machine.elapsed_secs(), 0);
            assert_eq!(machine.last_error(), None);
        }
    }

    #[test]
    fn test_reset_refused_mid_flight() {
        let mut machine = recording(10);
        assert!(machine.step(Input::Reset).is_err());
        machine.step(Input::Stop).unwrap();
        machine.step(Input::Upload).unwrap();
        assert!(machine.step(Input::Reset).is_err());
    }

    #[test]
    fn test_record_again_from_stopped() {
        let mut machine = recording(10);
        machine.step(Input::Stop).unwrap();
        assert_eq!(machine.step(Input::Reset).unwrap().to, Idle);
    }

    #[test]
    fn test_disable_while_recording_detaches_timer_only() {
        let mut machine = recording(10);
        machine.step(Input::Tick).unwrap();
        machine.step(Input::Tick).unwrap();

        let t = machine.step(Input::Disable).unwrap();
        assert_eq!(t.to, Recording);
        assert_eq!(t.effects, vec![Effect::CancelTimer]);
        assert_eq!(machine.elapsed_secs(), 0);
        assert!(!machine.timer_attached());

        // Ticks no longer advance, the session is still recording
        machine.step(Input::Tick).unwrap();
        assert_eq!(machine.elapsed_secs(), 0);
        assert_eq!(machine.state(), Recording);

        // Stop still works and no timer is cancelled twice
        let t = machine.step(Input::Stop).unwrap();
        assert_eq!(t.effects, vec![Effect::FinalizeClip]);
    }

    #[test]
    fn test_disable_after_stop_zeroes_elapsed() {
        let mut machine = recording(10);
        machine.step(Input::Tick).unwrap();
        machine.step(Input::Stop).unwrap();
        let t = machine.step(Input::Disable).unwrap();
        assert!(t.effects.is_empty());
        assert_eq!(machine.elapsed_secs(), 0);
        assert_eq!(machine.state(), Stopped);
    }

    #[test]
    fn test_fault_while_recording_moves_to_error() {
        let mut machine = recording(10);
        let t = machine.step(Input::Fault("encoder died".into())).unwrap();
        assert_eq!(t.to, Error);
        assert_eq!(t.effects, vec![Effect::CancelTimer]);
        assert_eq!(machine.last_error(), Some("encoder died"));
    }
}
