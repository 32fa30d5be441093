//! Monospace tables for leaderboards.

use std::fmt::Write as _;

/// Rows of `rank. label  value`, with the columns aligned.
/// Meant to be rendered inside a code block.
#[derive(Default)]
pub struct RankedList(Vec<(String, String)>);

impl RankedList {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a row, ranked right after the previous one.
	pub fn push(&mut self, label: String, value: String) {
		self.0.push((label, value));
	}

	/// Convert the list into a string with aligned columns
	pub fn into_string(self) -> String {
		let rank_width = self.0.len().to_string().len();
		let label_width = self.0.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
		let value_width = self.0.iter().map(|(_, value)| value.chars().count()).max().unwrap_or(0);

		let mut text = String::new();
		for (i, (label, value)) in self.0.into_iter().enumerate() {
			let _ = writeln!(
				text,
				"{:>rank_width$}. {:<label_width$}   {:>value_width$}",
				i + 1,
				label,
				value,
			);
		}

		text
	}
}
