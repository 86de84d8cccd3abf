pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

/// Splits rendered SQL into non-empty statements.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_search_query_history.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_search_query_history.sql")),
				"tables/002_trending_searches.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_trending_searches.sql")),
				"tables/003_embedded_items.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_embedded_items.sql")),
				"tables/004_query_stats_view.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_query_stats_view.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
