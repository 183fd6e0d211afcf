//! Account, save-data and daily-run backend for a roguelike monster-collecting game.

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod store;

pub mod crypto {
    pub mod kdf;
    pub mod token;
}

pub mod models {
    pub mod account;
    pub mod ranking;
    pub mod savedata;
    pub mod session;
}

pub mod repositories {
    pub mod account;
    pub mod blob;
    pub mod cache;
    pub mod memory;
    pub mod ranking;
}

pub mod services {
    pub mod account;
    pub mod auth;
    pub mod daily;
    pub mod ranking;
    pub mod savedata;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
    pub mod savedata;
}
