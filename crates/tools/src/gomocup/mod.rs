pub mod engine;
pub mod game;
pub mod jobs;
pub mod openings;
pub mod options;
pub mod types;
pub mod worker;

pub use engine::{EngineAdapter, ThinkOutcome};
pub use game::Game;
pub use jobs::{Job, JobQueue, PairResult};
pub use openings::Openings;
pub use options::{EngineOptions, Options, SampleFormat, SampleParams};
pub use types::{GameState, Info, Sample};
pub use worker::{spawn_supervisor, Deadline, Worker};
