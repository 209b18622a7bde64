pub mod api;
pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod llm;
pub mod storage;
