pub mod service;
pub mod sync;
