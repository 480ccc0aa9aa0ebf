// Camera domain: platform abstraction, size selection and the simulated device.

pub mod backend;
pub mod dummy;
pub mod error;
pub mod selector;
pub mod types;
