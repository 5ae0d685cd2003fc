mod handshake;
mod helpers;
mod ordering;
mod origin;
mod reconnect;
mod retry;
mod supersede;
