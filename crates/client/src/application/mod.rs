//! Application layer: the `TutorClient` facade and the helpers it builds on.

pub mod accumulator;
pub mod prompt;
pub mod tutor_client;

pub use accumulator::{AccumulatorSubscription, ResponseAccumulator};
pub use prompt::build_hint_prompt;
pub use tutor_client::TutorClient;
