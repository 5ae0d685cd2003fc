mod browsing_context;
mod codec;
mod config;
mod message_channel;
mod retry;
mod transition;
