pub const ANALYSIS: &str = include_str!("../data/prompts/analysis.txt");
pub const STORY: &str = include_str!("../data/prompts/story.txt");

/// Replace `{{key}}` placeholders in a template string.
///
/// Substituted values are never scanned again, so a value containing
/// `{{key}}` is kept verbatim. Unknown placeholders are left as they are.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };

        let key = &after[..end];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => result.push_str(value),
            None => result.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }

    result.push_str(rest);
    result
}
