pub mod chat_history;
pub mod config_store;
pub mod convai;
pub mod fs;
pub mod secrets;
