use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Format used by the api for `battleTime`, eg. `20240115T181203.000Z`.
pub const BATTLE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.fZ";

// {{{ Battle types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleSide {
	pub tag: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub crowns: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Battle {
	#[serde(rename = "type", default)]
	pub kind: String,
	#[serde(deserialize_with = "deserialize_battle_time")]
	pub battle_time: DateTime<Utc>,
	#[serde(default)]
	pub team: Vec<BattleSide>,
	#[serde(default)]
	pub opponent: Vec<BattleSide>,
}

impl Battle {
	/// Crowns taken by the side whose battle log this came from.
	#[inline]
	pub fn team_crowns(&self) -> u32 {
		self.team.first().map_or(0, |side| side.crowns)
	}

	#[inline]
	pub fn opponent_crowns(&self) -> u32 {
		self.opponent.first().map_or(0, |side| side.crowns)
	}
}
// }}}
// {{{ Battle time
pub fn parse_battle_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
	NaiveDateTime::parse_from_str(raw, BATTLE_TIME_FORMAT).map(|time| time.and_utc())
}

fn deserialize_battle_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;
	parse_battle_time(&raw).map_err(serde::de::Error::custom)
}
// }}}
// {{{ Tests
#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Timelike};

	use super::*;

	#[test]
	fn parses_api_timestamps_as_utc() {
		let time = parse_battle_time("20240115T181203.000Z").unwrap();
		assert_eq!(time, Utc.with_ymd_and_hms(2024, 1, 15, 18, 12, 3).unwrap());

		let time = parse_battle_time("20240115T181203.250Z").unwrap();
		assert_eq!(time.nanosecond(), 250_000_000);
	}

	#[test]
	fn rejects_other_formats() {
		assert!(parse_battle_time("2024-01-15T18:12:03Z").is_err());
	}

	#[test]
	fn deserializes_api_payload() {
		let raw = r##"[{
			"type": "PvP",
			"battleTime": "20240115T181203.000Z",
			"team": [{"tag": "#2PY08LQ", "name": "alice", "crowns": 3, "cards": []}],
			"opponent": [{"tag": "#9QJCUV", "name": "bob"}]
		}]"##;

		let battles: Vec<Battle> = serde_json::from_str(raw).unwrap();
		assert_eq!(battles.len(), 1);
		assert_eq!(battles[0].kind, "PvP");
		assert_eq!(battles[0].team_crowns(), 3);
		assert_eq!(battles[0].opponent_crowns(), 0);
		assert_eq!(battles[0].opponent[0].tag, "#9QJCUV");
	}
}
// }}}
