// Host-facing plumbing: UI-thread dispatch, frame sink, lifecycle events.

pub mod events;
pub mod executor;
pub mod sink;
