use rusqlite::params;

use crate::{errors::UndoGraphError, graph::UndoGraph, record::GraphRecord};

/// Optional string prefix index for autocomplete. Records opt in from
/// within `save_related`; labels are upserted so re-saving is cheap.
impl UndoGraph {
    pub fn index_completion<R: GraphRecord>(
        &self,
        property: &str,
        label: &str,
    ) -> Result<(), UndoGraphError> {
        self.store().execute(
            "INSERT OR REPLACE INTO completions(type_name, property, label) VALUES(?1, ?2, ?3)",
            params![R::type_name(), property, label],
        )?;
        Ok(())
    }

    /// All indexed labels starting with `prefix`, sorted. `%` and `_` in
    /// the prefix match literally.
    pub fn completions<R: GraphRecord>(
        &self,
        property: &str,
        prefix: &str,
    ) -> Result<Vec<String>, UndoGraphError> {
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt = self
            .conn()
            .prepare_cached(
                "SELECT label FROM completions \
                 WHERE type_name=?1 AND property=?2 AND label LIKE ?3 ESCAPE '\\' \
                 ORDER BY label",
            )
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![R::type_name(), property, pattern], |row| {
                row.get(0)
            })
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let mut labels = Vec::new();
        for label in rows {
            labels.push(label.map_err(|e| UndoGraphError::query(e.to_string()))?);
        }
        Ok(labels)
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn test_escape_like_passes_plain_text() {
        assert_eq!(escape_like("budget i"), "budget i");
    }

    #[test]
    fn test_escape_like_quotes_wildcards() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
