//! Common-indentation removal for excerpts.

/// Strip the longest leading whitespace shared by every non-blank line.
///
/// Tabs and spaces are compared literally, so a tab never matches a space.
/// Blank lines don't constrain the prefix and come out empty.
pub fn dedent(lines: &[&str]) -> String {
    let mut prefix: Option<&str> = None;
    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        let indent = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];
        prefix = Some(match prefix {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let prefix = prefix.unwrap_or("");

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[prefix.len()..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}
