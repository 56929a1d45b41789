pub mod chat_history;
pub mod convai;
pub mod events;
pub mod parse;
pub mod request;
pub mod runtime;
