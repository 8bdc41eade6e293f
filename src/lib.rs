// src/lib.rs

pub mod chat;
pub mod config;
pub mod replay;
pub mod stream;
