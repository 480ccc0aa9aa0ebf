// Pipeline health counters.

pub mod stats;
