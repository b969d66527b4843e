mod controller;
mod state;
mod timer;

pub use controller::{GenerationController, PollSettings, TrackerUpdate};
pub use state::{
    failure_message, GenerateRejected, GenerationSession, GenerationTracker, Observation, Phase,
    Ticket, NO_TEXT_MESSAGE, SUBMIT_FAILED_MESSAGE,
};
pub use timer::{PollTimer, TickFlow};
