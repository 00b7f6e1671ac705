use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// `-j` wins; otherwise the `default_format` config setting.
    pub fn resolve(json_flag: bool, configured: &str) -> Self {
        if json_flag || configured.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
    pub verbose: bool,
}

impl OutputOptions {
    pub fn to_json<T: serde::Serialize>(&self, value: &T) -> serde_json::Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }
}

/// Colors are on unless `--no-color`, `color = "never"`, `NO_COLOR`, or a
/// non-terminal stdout says otherwise. `color = "always"` skips the terminal check.
pub fn detect_color(color_flag: bool, setting: &str) -> bool {
    if !color_flag || setting == "never" {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    setting == "always" || std::io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_overrides_config() {
        assert_eq!(OutputFormat::resolve(true, "text"), OutputFormat::Json);
        assert_eq!(OutputFormat::resolve(false, "JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::resolve(false, "text"), OutputFormat::Text);
    }

    #[test]
    fn no_color_flag_and_never_disable_color() {
        assert!(!detect_color(false, "always"));
        assert!(!detect_color(true, "never"));
    }

    #[test]
    fn pretty_json_is_indented() {
        let opts = OutputOptions {
            format: OutputFormat::Json,
            pretty: true,
            use_color: false,
            verbose: false,
        };
        let json = opts.to_json(&serde_json::json!({"a": 1})).unwrap();
        assert!(json.contains("\n  \"a\": 1"));
    }
}
