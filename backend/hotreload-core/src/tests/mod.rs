mod config;
mod connection_state;
mod dispatcher;
