//! Isolates the SQL statement(s) in a free-form completion.

use regex::Regex;

const KEYWORDS: &[&str] = &[
	"SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE", "MERGE",
	"REPLACE", "EXPLAIN", "SHOW", "DESCRIBE", "VALUES", "GRANT", "REVOKE", "PRAGMA",
];
const CLAUSES: &[&str] = &[
	"FROM", "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER", "ON", "USING",
	"AND", "OR", "NOT", "IN", "IS", "LIKE", "BETWEEN", "EXISTS", "GROUP", "ORDER", "BY", "HAVING",
	"LIMIT", "OFFSET", "FETCH", "UNION", "INTERSECT", "EXCEPT", "AS", "CASE", "WHEN", "THEN",
	"ELSE", "END", "SET", "INTO", "RETURNING", "DISTINCT", "ASC", "DESC", "OVER", "PARTITION",
	"WINDOW", "NULL",
];
const FENCE: &str = "```";

/// Returns the normalized SQL found in `text`, ending with exactly one `;`.
///
/// Fenced code blocks win over surrounding prose. Returns `None` when nothing resembling SQL is
/// present.
pub fn extract_sql(text: &str) -> Option<String> {
	let fenced = Regex::new(r"(?s)```[^\n`]*\n(.*?)```").ok()?;

	for captures in fenced.captures_iter(text) {
		if let Some(sql) = captures.get(1).and_then(|body| extract_from(body.as_str())) {
			return Some(sql);
		}
	}

	extract_from(&text.replace(FENCE, "\n"))
}

fn extract_from(text: &str) -> Option<String> {
	let start = find_start(text)?;
	let lines = collect_statements(&text[start..]);

	normalize(&lines)
}

fn find_start(text: &str) -> Option<usize> {
	let mut offset = 0;

	for line in text.split_inclusive('\n') {
		let trimmed = line.trim_start();
		let (body, skipped) = strip_label(trimmed);

		if starts_with_keyword(body) {
			return Some(offset + (line.len() - trimmed.len()) + skipped);
		}

		offset += line.len();
	}

	let anywhere = Regex::new(&format!(r"\b(?:{})\b", KEYWORDS.join("|"))).ok()?;

	anywhere.find(text).map(|found| found.start())
}

fn collect_statements(text: &str) -> Vec<&str> {
	let mut out = Vec::new();
	let mut lines = text.lines();
	let mut in_literal = false;

	while let Some(line) = lines.next() {
		if !in_literal {
			if line.trim().is_empty() {
				if next_starts_statement(lines.clone()) {
					out.push("");

					continue;
				}

				break;
			}
			if !out.is_empty() && is_prose(line) {
				break;
			}
		}

		let (body, _) = strip_label(line.trim_start());
		let line = if starts_with_keyword(body) { body } else { line };

		if let Some(cut) = cut_after_statement(line, &mut in_literal) {
			out.push(&line[..cut]);

			break;
		}

		out.push(line);

		if !in_literal && line.trim_end().ends_with(';') && !next_starts_statement(lines.clone()) {
			break;
		}
	}

	out
}

fn next_starts_statement<'a>(mut lines: impl Iterator<Item = &'a str>) -> bool {
	lines
		.find(|line| !line.trim().is_empty())
		.is_some_and(|line| starts_with_keyword(strip_label(line.trim_start()).0))
}

/// Byte offset just past the `;` that is followed by non-SQL text on the same line.
///
/// `in_literal` carries the single-quote state across lines; `''` escapes toggle it twice.
fn cut_after_statement(line: &str, in_literal: &mut bool) -> Option<usize> {
	for (idx, c) in line.char_indices() {
		match c {
			'\'' => *in_literal = !*in_literal,
			';' if !*in_literal => {
				let rest = line[idx + 1..].trim_start();

				if rest.is_empty() {
					return None;
				}
				if !rest.starts_with(';') && starts_with_keyword(rest) {
					continue;
				}

				return Some(idx + 1);
			},
			_ => {},
		}
	}

	None
}

/// A line that explains the query rather than continuing it.
fn is_prose(line: &str) -> bool {
	let text = line.trim();

	if starts_with_keyword(text) {
		return false;
	}

	let word = leading_word(text);
	let title_case = word.len() > 1
		&& word.starts_with(|c: char| c.is_ascii_uppercase())
		&& word.bytes().skip(1).all(|b| b.is_ascii_lowercase());
	let clause = CLAUSES.iter().any(|clause| clause.eq_ignore_ascii_case(word));
	let sentence = text.ends_with(['.', ':', '!', '?'])
		&& !text.contains(['=', '<', '>', '(', ')', ',', '\'', '*']);

	(title_case && !clause && !text.ends_with(',')) || sentence
}

fn leading_word(text: &str) -> &str {
	let end = text.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(text.len());

	&text[..end]
}

fn strip_label(line: &str) -> (&str, usize) {
	match line.get(..4) {
		Some(label) if label.eq_ignore_ascii_case("sql:") => {
			let rest = &line[4..];
			let body = rest.trim_start();

			(body, 4 + rest.len() - body.len())
		},
		_ => (line, 0),
	}
}

/// Prose sentences start in title case, so only all-upper or all-lower keywords count.
fn starts_with_keyword(text: &str) -> bool {
	let word = leading_word(text);

	if word.is_empty() {
		return false;
	}

	let uniform = word.bytes().all(|b| b.is_ascii_uppercase())
		|| word.bytes().all(|b| b.is_ascii_lowercase());

	uniform && KEYWORDS.iter().any(|keyword| keyword.eq_ignore_ascii_case(word))
}

fn normalize(lines: &[&str]) -> Option<String> {
	let joined = lines.iter().map(|line| line.trim_end()).collect::<Vec<_>>().join("\n");
	let body = joined.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());

	if body.is_empty() {
		return None;
	}

	Some(format!("{body};"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plain_statement_gets_single_semicolon() {
		assert_eq!(extract_sql("SELECT * FROM users"), Some("SELECT * FROM users;".to_string()));
		assert_eq!(extract_sql("SELECT 1;;  "), Some("SELECT 1;".to_string()));
	}

	#[test]
	fn prefers_fenced_block() {
		let text = "Here you go:\n```sql\nSELECT *\nFROM users   \n```\nThis lists every user.";

		assert_eq!(extract_sql(text), Some("SELECT *\nFROM users;".to_string()));
	}

	#[test]
	fn skips_fences_without_sql() {
		let text = "```text\nno query here\n```\n\nSELECT id FROM orders;";

		assert_eq!(extract_sql(text), Some("SELECT id FROM orders;".to_string()));
	}

	#[test]
	fn drops_surrounding_prose() {
		let text = "Sure! Here is the query:\nSELECT id FROM users WHERE id = 1;\nIt returns user 1.";

		assert_eq!(extract_sql(text), Some("SELECT id FROM users WHERE id = 1;".to_string()));
	}

	#[test]
	fn stops_at_blank_line_before_prose() {
		let text = "SELECT *\nFROM users\n\nThis returns all rows.";

		assert_eq!(extract_sql(text), Some("SELECT *\nFROM users;".to_string()));
	}

	#[test]
	fn strips_sql_label() {
		assert_eq!(extract_sql("SQL: SELECT 1"), Some("SELECT 1;".to_string()));
	}

	#[test]
	fn cuts_trailing_text_after_semicolon() {
		assert_eq!(
			extract_sql("SELECT name FROM users; this gives names"),
			Some("SELECT name FROM users;".to_string())
		);
	}

	#[test]
	fn keeps_consecutive_statements() {
		let text = "CREATE TABLE t(id INT);\n\nINSERT INTO t VALUES (1);\n\nThis creates a table.";

		assert_eq!(
			extract_sql(text),
			Some("CREATE TABLE t(id INT);\n\nINSERT INTO t VALUES (1);".to_string())
		);
	}

	#[test]
	fn title_case_prose_is_not_sql() {
		let text = "Select the right table first.\nselect name from users";

		assert_eq!(extract_sql(text), Some("select name from users;".to_string()));
	}

	#[test]
	fn falls_back_to_uppercase_keyword_anywhere() {
		assert_eq!(
			extract_sql("The query is SELECT name FROM users"),
			Some("SELECT name FROM users;".to_string())
		);
	}

	#[test]
	fn stops_at_explanation_right_after_the_query() {
		assert_eq!(
			extract_sql("SELECT * FROM users\nThis query returns every user."),
			Some("SELECT * FROM users;".to_string())
		);
		assert_eq!(
			extract_sql("SELECT name\nFROM users\nIt lists every name"),
			Some("SELECT name\nFROM users;".to_string())
		);
		assert_eq!(
			extract_sql("select id from users\nreturns the ids of all users."),
			Some("select id from users;".to_string())
		);
	}

	#[test]
	fn keeps_title_case_clause_lines() {
		let text = "SELECT u.id, u.name\nFrom users u\nWhere u.active = true\nOrder By u.name";

		assert_eq!(extract_sql(text), Some(format!("{text};")));
	}

	#[test]
	fn semicolons_inside_literals_do_not_end_the_statement() {
		assert_eq!(
			extract_sql("SELECT id FROM notes WHERE body = 'a;b';"),
			Some("SELECT id FROM notes WHERE body = 'a;b';".to_string())
		);
		assert_eq!(
			extract_sql("SELECT id FROM notes WHERE body = 'it''s; fine' LIMIT 1; Done."),
			Some("SELECT id FROM notes WHERE body = 'it''s; fine' LIMIT 1;".to_string())
		);
	}

	#[test]
	fn no_sql_yields_none() {
		assert_eq!(extract_sql("I cannot answer that question."), None);
		assert_eq!(extract_sql("   "), None);
	}
}
