pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut prev = '\0';

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote && prev != '\\' => {
                in_single_quote = !in_single_quote;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
            }
            ';' if !in_single_quote && !in_double_quote => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
                prev = ch;
                continue;
            }
            _ => {}
        }

        current.push(ch);
        prev = ch;
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_unquoted_semicolons_only() {
        let statements = split_sql_statements("SELECT 'a;b'; SELECT \";\" ; SELECT 1");
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[2], "SELECT 1");
    }

    #[test]
    fn bundled_schema_has_all_tables() {
        let joined = split_sql_statements(SCHEMA_SQL).join("\n");
        for table in ["users", "sessions", "flashcard_sets", "cards"] {
            assert!(joined.contains(&format!("\"{table}\"")));
        }
    }
}
