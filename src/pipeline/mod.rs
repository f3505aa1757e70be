//! Push-to-talk orchestration: the state machine and the event loop that
//! wires key events, the recorder, the transcriber and text delivery
//! together.

pub mod orchestrator;
pub mod state;

pub use orchestrator::PttOrchestrator;
pub use state::{new_shared_state, PttState, SharedState};
