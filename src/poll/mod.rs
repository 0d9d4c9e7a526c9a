mod poller;
mod record;
mod state;

pub use poller::{PollConfig, PollObserver, PollOutcome, PollSnapshot, PollTick, Poller};
pub use record::{PollRecord, RetryConfig};
pub use state::{PollPhase, PollStateMachine, StateVocabulary, Transition};
