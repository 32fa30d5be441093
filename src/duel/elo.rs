/// K-factor applied to every duel.
pub const K_FACTOR: f64 = 32.0;

/// Probability of `own` beating `opponent` under the logistic model.
#[inline]
pub fn expected_score(own: u64, opponent: u64) -> f64 {
	1.0 / (1.0 + 10f64.powf((opponent as f64 - own as f64) / 400.0))
}

/// Computes the rating of a player after a single game.
///
/// `actual` is `1.0` for a win and `0.0` for a loss. Ratings never go below zero.
pub fn updated_rating(own: u64, opponent: u64, actual: f64, k: f64) -> u64 {
	let expected = expected_score(own, opponent);
	let rating = (own as f64 + k * (actual - expected)).round();
	rating.max(0.0) as u64
}

/// Ratings of `(winner, loser)` after the winner beats the loser.
#[inline]
pub fn after_win(winner: u64, loser: u64) -> (u64, u64) {
	(
		updated_rating(winner, loser, 1.0, K_FACTOR),
		updated_rating(loser, winner, 0.0, K_FACTOR),
	)
}

// {{{ Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn equal_ratings_split_the_k_factor() {
		assert_eq!(expected_score(1200, 1200), 0.5);
		assert_eq!(after_win(1200, 1200), (1216, 1184));
	}

	#[test]
	fn zero_sum_away_from_the_floor() {
		for (a, b) in [(1200, 1200), (1500, 1300), (900, 1700), (2400, 400)] {
			let (new_a, new_b) = after_win(a, b);
			assert_eq!(
				new_a + new_b,
				a + b,
				"ratings ({a}, {b}) should be conserved, got ({new_a}, {new_b})"
			);

			// Swapping roles is a mirror image
			let (new_b2, new_a2) = after_win(b, a);
			assert_eq!(new_a2 + new_b2, a + b);
		}
	}

	#[test]
	fn lopsided_ratings_near_the_floor() {
		// The favourite barely moves, and the underdog can't drop below 0.
		assert_eq!(after_win(2000, 10), (2000, 10));

		// An upset moves both players by (almost) the whole k-factor.
		assert_eq!(after_win(10, 2000), (42, 1968));
	}

	#[test]
	fn floor_breaks_conservation() {
		let (winner, loser) = after_win(10, 10);
		assert_eq!((winner, loser), (26, 0));
		assert!(winner + loser > 20);
	}

	#[test]
	fn fresh_players() {
		assert_eq!(after_win(0, 0), (16, 0));
	}
}
// }}}
