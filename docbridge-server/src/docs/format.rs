//! Text rendering of search results

use super::SearchResult;

const RESULT_SEPARATOR: &str = "\n\n--------------------\n\n";

fn format_search_result(result: &SearchResult) -> String {
    format!(
        "Title: {}\n\nContext7-compatible library ID: {}\n\nDescription: {}",
        result.title, result.id, result.description
    )
}

/// Render search results as the text block returned by `resolve-library-id`
pub fn format_search_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(format_search_result)
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, title: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{} docs", title),
        }
    }

    #[test]
    fn test_single_result() {
        let text = format_search_results(&[result("/vercel/nextjs", "Next.js")]);
        assert_eq!(
            text,
            "Title: Next.js\n\nContext7-compatible library ID: /vercel/nextjs\n\nDescription: Next.js docs"
        );
    }

    #[test]
    fn test_results_are_separated_by_rule() {
        let text = format_search_results(&[
            result("/mongodb/docs", "MongoDB"),
            result("/vercel/nextjs", "Next.js"),
        ]);
        let parts: Vec<&str> = text.split(RESULT_SEPARATOR).collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("Title: MongoDB"));
        assert!(parts[1].starts_with("Title: Next.js"));
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(format_search_results(&[]), "");
    }
}
