//! Action execution layer of the Mentor chat engine.
//!
//! ACTION messages routed out of the model stream land here: the
//! [`ActionExecutor`] dispatches them to [`ActionHandler`]s by kind, records
//! a serializable undo step per executed action, and can reverse any of them
//! later. The built-in handlers mutate the in-memory [`PlannerBoard`].

pub mod builtin;
pub mod executor;
pub mod handler;
pub mod planner;

pub use builtin::{builtin_handlers, CreateTaskHandler, RecordNoteHandler, SetGoalStatusHandler};
pub use executor::ActionExecutor;
pub use handler::ActionHandler;
pub use planner::{BoardSnapshot, PlannerBoard, PlannerNote, PlannerTask};
