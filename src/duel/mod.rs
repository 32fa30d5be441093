//! The duel mini-game: two members wager credits on a real Clash Royale
//! battle, which the bot finds in the api once both sides have agreed.

pub mod correlate;
pub mod elo;
pub mod hub;
pub mod record;
pub mod session;
pub mod settings;
pub mod settle;
