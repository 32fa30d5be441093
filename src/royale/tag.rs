use std::fmt::Display;
use std::str::FromStr;

use anyhow::bail;

/// Characters the game uses when generating player tags.
const TAG_ALPHABET: &str = "0289PYLQGRJCUV";

/// A normalized Clash Royale player tag, stored without the leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct PlayerTag(String);

impl PlayerTag {
	/// The tag without its leading `#`.
	#[inline]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Whether a raw tag returned by the api refers to this player.
	pub fn matches(&self, raw: &str) -> bool {
		raw.parse::<PlayerTag>().is_ok_and(|other| &other == self)
	}
}

impl FromStr for PlayerTag {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed);
		let normalized: String = trimmed
			.chars()
			.map(|c| match c.to_ascii_uppercase() {
				'O' => '0',
				c => c,
			})
			.collect();

		if !(3..=14).contains(&normalized.len()) {
			bail!("`{s}` is not a valid player tag: tags are between 3 and 14 characters long");
		}

		if let Some(bad) = normalized.chars().find(|c| !TAG_ALPHABET.contains(*c)) {
			bail!("`{s}` is not a valid player tag: `{bad}` never appears in player tags");
		}

		Ok(Self(normalized))
	}
}

impl Display for PlayerTag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

// {{{ Sql
impl rusqlite::ToSql for PlayerTag {
	fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
		self.0.to_sql()
	}
}

impl rusqlite::types::FromSql for PlayerTag {
	fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
		let raw = value.as_str()?;
		raw.parse()
			.map_err(|e: anyhow::Error| rusqlite::types::FromSqlError::Other(e.into()))
	}
}
// }}}
// {{{ Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_prefix_case_and_letter_o() {
		let tag: PlayerTag = " #2pyo8lq ".parse().unwrap();
		assert_eq!(tag.as_str(), "2PY08LQ");
		assert_eq!(tag.to_string(), "#2PY08LQ");
	}

	#[test]
	fn rejects_characters_outside_the_alphabet() {
		assert!("#ABCDEF".parse::<PlayerTag>().is_err());
		assert!("#2PY 8LQ".parse::<PlayerTag>().is_err());
	}

	#[test]
	fn rejects_bad_lengths() {
		assert!("#".parse::<PlayerTag>().is_err());
		assert!("#22".parse::<PlayerTag>().is_err());
		assert!("#222222222222222".parse::<PlayerTag>().is_err());
	}

	#[test]
	fn matches_raw_api_tags() {
		let tag: PlayerTag = "9QJCUV".parse().unwrap();
		assert!(tag.matches("#9QJCUV"));
		assert!(!tag.matches("#9QJCUY"));
		assert!(!tag.matches("garbage"));
	}
}
// }}}
