// Preview pipeline: session lifecycle, frame queue, encoding and dispatch.

pub mod capture;
pub mod commands;
pub mod compress;
pub mod session;
