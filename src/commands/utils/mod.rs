pub mod ranked_list;

/// Formats a member id as a discord mention.
#[inline]
pub fn mention(member_id: u64) -> String {
	format!("<@{member_id}>")
}

/// Formats a role id as a discord mention.
#[inline]
pub fn mention_role(role_id: u64) -> String {
	format!("<@&{role_id}>")
}

/// Renders a duration in whole minutes and seconds, eg. `3m` or `1m 30s`.
pub fn format_secs(secs: u64) -> String {
	match (secs / 60, secs % 60) {
		(0, s) => format!("{s}s"),
		(m, 0) => format!("{m}m"),
		(m, s) => format!("{m}m {s}s"),
	}
}
