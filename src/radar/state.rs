//! Acquisition gating for the single reusable sample block.

/// Lifecycle of the sample block.
///
/// The hardware may only write the block while `Acquiring`, the pipeline
/// may only read it while `Processing`. The transitions below are the
/// ownership hand-over; there is never a concurrent reader and writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum State {
    /// No acquisition armed.
    Idle,
    /// Hardware is filling the block.
    Acquiring,
    /// Block complete, awaiting the pipeline.
    Ready,
    /// Pipeline has claimed the block, hardware must stay stopped.
    Processing,
}

pub struct Controller {
    state: State,
}

impl Controller {
    pub const fn new() -> Controller {
        Controller { state: State::Idle }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Arm acquisition: `Idle` -> `Acquiring`.
    pub fn arm(&mut self) -> bool {
        self.step(State::Idle, State::Acquiring)
    }

    /// Completion signal: `Acquiring` -> `Ready`.
    ///
    /// In any other state the signal has no matching armed acquisition
    /// (spurious or duplicate interrupt) and is dropped.
    pub fn complete(&mut self) -> bool {
        self.step(State::Acquiring, State::Ready)
    }

    /// Claim the completed block for read-only access: `Ready` -> `Processing`.
    pub fn claim(&mut self) -> bool {
        self.step(State::Ready, State::Processing)
    }

    /// Release the block back to the hardware: `Processing` -> `Acquiring`.
    /// Overwriting the block is permitted again from here on.
    pub fn rearm(&mut self) -> bool {
        self.step(State::Processing, State::Acquiring)
    }

    fn step(&mut self, from: State, to: State) -> bool {
        if self.state == from {
            self.state = to;
            true
        } else {
            defmt::trace!("ignoring {:?} -> {:?} in state {:?}", from, to, self.state);
            false
        }
    }
}
