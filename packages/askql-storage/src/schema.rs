pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_projects.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_projects.sql")),
				"tables/002_knowledge_items.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_knowledge_items.sql")),
				"tables/003_chats.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_chats.sql")),
				"tables/004_query_turns.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_query_turns.sql")),
				"tables/005_item_embeddings.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_item_embeddings.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expands_every_include_and_dimension() {
		let sql = render_schema(1_536);

		assert!(!sql.contains("\\ir "));
		assert!(!sql.contains("<VECTOR_DIM>"));
		assert!(sql.contains("vector(1536)"));

		for table in ["projects", "knowledge_items", "chats", "query_turns", "item_embeddings"] {
			assert!(
				sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
				"Missing table {table}."
			);
		}
	}
}
