#![allow(async_fn_in_trait)]

pub mod bank;
pub mod commands;
pub mod context;
pub mod duel;
pub mod logs;
pub mod royale;
pub mod time;
