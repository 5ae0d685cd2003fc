mod channel;
mod config;
