pub mod channel;
pub mod config;

pub use channel::ChannelError;
pub use config::ConfigError;
