use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("valid placeholder pattern"))
}

/// `{{ var }}` template. Unknown placeholders render as empty strings.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        placeholder_pattern()
            .replace_all(self.template, |caps: &regex::Captures| {
                vars.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

/// Shorthand for building the variable map.
#[macro_export]
macro_rules! prompt_vars {
    ($($key:literal => $value:expr),* $(,)?) => {{
        let mut vars = std::collections::HashMap::new();
        $(vars.insert($key, $value.to_string());)*
        vars
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_placeholders_and_blanks_unknown() {
        let template = PromptTemplate::new("Research {{topic}} using {{ missing }} sources.");
        let rendered = template.render(&prompt_vars! {"topic" => "tariffs"});
        assert_eq!(rendered, "Research tariffs using  sources.");
    }
}
