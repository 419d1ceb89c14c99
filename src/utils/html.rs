// src/utils/html.rs

/// Sanitizes admin-authored lesson HTML.
///
/// Safe markup (headings, lists, `<pre>`/`<code>`) survives; scripts,
/// iframes and event-handler attributes are stripped. Code samples meant
/// to show raw tags must be entity-escaped by the author.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_removed_code_kept() {
        let cleaned = clean_html("<p onclick=\"x()\">Big-O</p><script>alert(1)</script><pre><code>O(n)</code></pre>");
        assert!(!cleaned.contains("script"));
        assert!(!cleaned.contains("onclick"));
        assert!(cleaned.contains("<pre><code>O(n)</code></pre>"));
    }
}
