//! Text normalization applied before any pattern matching

use regex::Regex;
use std::sync::LazyLock;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:sql)?\s*").expect("fence pattern is valid"));
static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("fence pattern is valid"));
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("comment pattern is valid"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)--.*?$").expect("comment pattern is valid"));

/// Strip Markdown code fences, block comments and line comments
///
/// Returns the trimmed remainder; an empty string means there was no SQL.
pub fn normalize_sql(sql: &str) -> String {
    let s = sql.trim();
    if s.is_empty() {
        return String::new();
    }

    let s = FENCE_OPEN.replace(s, "");
    let s = FENCE_CLOSE.replace(&s, "");
    let s = BLOCK_COMMENT.replace_all(&s, " ");
    let s = LINE_COMMENT.replace_all(&s, "");

    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_code_fence() {
        assert_eq!(normalize_sql("```sql\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(normalize_sql("```SELECT 1```"), "SELECT 1");
    }

    #[test]
    fn test_strips_comments() {
        let sql = "/* header\n spanning lines */ SELECT A -- trailing\nFROM T";
        assert_eq!(normalize_sql(sql), "SELECT A \nFROM T");
    }

    #[test]
    fn test_block_comment_separates_tokens() {
        assert_eq!(normalize_sql("SELECT A/**/FROM T"), "SELECT A FROM T");
    }

    #[test]
    fn test_comment_only_is_empty() {
        assert_eq!(normalize_sql("-- nothing here"), "");
        assert_eq!(normalize_sql("/* */"), "");
        assert_eq!(normalize_sql("   "), "");
    }
}
