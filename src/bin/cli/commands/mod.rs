pub mod battles;
pub mod leaderboard;
