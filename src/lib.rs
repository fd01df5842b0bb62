pub mod chats;
pub mod core;
pub mod documents;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod qa;
pub mod server;
pub mod state;
pub mod storage;
