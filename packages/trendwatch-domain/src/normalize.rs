const TRAILING_PUNCTUATION: [char; 4] = ['?', '!', '.', ','];

/// Canonical form used to group query variants.
///
/// Lowercases, collapses whitespace runs to single spaces, trims, then strips any run of
/// trailing `?`, `!`, `.` or `,`.
pub fn normalize_query(raw: &str) -> String {
	let lowered = raw.to_lowercase();
	let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

	// Stripping may expose whitespace that preceded the punctuation ("what ?").
	let mut out = collapsed.as_str();

	loop {
		let stripped = out.trim_end_matches(TRAILING_PUNCTUATION).trim_end();

		if stripped.len() == out.len() {
			break;
		}

		out = stripped;
	}

	out.to_string()
}
