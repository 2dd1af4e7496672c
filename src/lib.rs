pub mod admin;
pub mod args;
pub mod audio;
pub mod bot;
pub mod clock;
pub mod config;
pub mod error;
pub mod keep_alive;
pub mod message;
pub mod pipeline;
pub mod rules;
pub mod telegram;
pub mod text;
pub mod tts;
pub mod upload;
pub mod worker;
pub mod workspace;
