//! Seed script for the `stacks` lookup table (integration slug -> label).

use std::collections::HashSet;
use std::fmt::Write;

/// One label per line, as shipped with the crate.
pub const BUNDLED_LABELS: &str = include_str!("../data/stack_labels.txt");

/// Lowercase, with every run of non-alphanumerics turned into a single `-`
/// and no leading or trailing dash.
pub fn make_slug(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// `(slug, label)` pairs for every non-blank line, first occurrence order,
/// exact duplicates removed.
pub fn stack_pairs(labels: &str) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    labels
        .lines()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(|label| (make_slug(label), label.to_string()))
        .filter(|pair| seen.insert(pair.clone()))
        .collect()
}

pub fn render_stacks_sql(pairs: &[(String, String)]) -> String {
    let mut sql = String::from("INSERT INTO public.stacks (slug, label)\nVALUES\n");
    for (index, (slug, label)) in pairs.iter().enumerate() {
        let comma = if index + 1 < pairs.len() { "," } else { "" };
        let _ = writeln!(
            sql,
            "  ('{}', '{}'){}",
            slug.replace('\'', "''"),
            label.replace('\'', "''"),
            comma
        );
    }
    sql.push_str("ON CONFLICT (slug) DO NOTHING;\n");
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(make_slug("Google Sheets - integration"), "google-sheets-integration");
        assert_eq!(make_slug("  1Shot API "), "1shot-api");
        assert_eq!(make_slug("AWS S3 (legacy)"), "aws-s3-legacy");
        assert_eq!(make_slug("Ünicode"), "nicode");
        assert_eq!(make_slug("---"), "");
    }

    #[test]
    fn duplicate_pairs_are_dropped_but_case_variants_kept() {
        let pairs = stack_pairs("Slack\n\nSlack\nGitHub\nGithub\n");
        assert_eq!(
            pairs,
            vec![
                ("slack".to_string(), "Slack".to_string()),
                ("github".to_string(), "GitHub".to_string()),
                ("github".to_string(), "Github".to_string()),
            ]
        );
    }

    #[test]
    fn sql_escapes_quotes_and_ends_with_conflict_clause() {
        let sql = render_stacks_sql(&stack_pairs("Bob's Tools\nZoom"));
        assert_eq!(
            sql,
            "INSERT INTO public.stacks (slug, label)\nVALUES\n  ('bob-s-tools', 'Bob''s Tools'),\n  ('zoom', 'Zoom')\nON CONFLICT (slug) DO NOTHING;\n"
        );
    }

    #[test]
    fn bundled_labels_pair_plain_and_integration_entries() {
        let pairs = stack_pairs(BUNDLED_LABELS);
        assert!(pairs.len() > 1000);
        assert_eq!(pairs[0], ("google-sheets".to_string(), "Google Sheets".to_string()));
        assert_eq!(
            pairs[1],
            ("google-sheets-integration".to_string(), "Google Sheets - integration".to_string())
        );
    }
}
