pub mod config;
pub mod error;
pub mod session;
pub mod transcript;
pub mod types;

// Keep the public surface small and intentional.
pub use config::*;
pub use error::*;
pub use session::*;
pub use transcript::*;
pub use types::*;
