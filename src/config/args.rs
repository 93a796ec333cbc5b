use dashmap::DashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Parsed command-line arguments
///
/// Keys are case-insensitive. Accepted forms:
///
/// ```text
/// --key=value   --key value   -k value   /key:value   --flag   positional
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppArgs {
    values: Arc<DashMap<String, String>>,
    positional: Arc<Vec<String>>,
}

impl AppArgs {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = DashMap::new();
        let mut positional = Vec::new();
        let mut tokens = args.into_iter().map(Into::into).peekable();

        while let Some(token) = tokens.next() {
            if let Some((key, value)) = slash_pair(&token) {
                values.insert(key.to_ascii_lowercase(), value.to_string());
                continue;
            }

            let Some(name) = option_name(&token) else {
                positional.push(token);
                continue;
            };

            if let Some((key, value)) = name.split_once('=') {
                values.insert(key.to_ascii_lowercase(), value.to_string());
                continue;
            }

            let key = name.to_ascii_lowercase();
            let value = match tokens.peek() {
                Some(next) if option_name(next).is_none() && slash_pair(next).is_none() => {
                    tokens.next().unwrap_or_default()
                }
                _ => "true".to_string(),
            };
            values.insert(key, value);
        }

        Self {
            values: Arc::new(values),
            positional: Arc::new(positional),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(|v| v.clone())
    }

    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<Result<T, T::Err>> {
        self.get(key).map(|v| v.parse())
    }

    /// `true` for a bare `--flag` or an explicit truthy value.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .insert(key.to_ascii_lowercase(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_ascii_lowercase())
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.positional.is_empty()
    }
}

/// `--name` / `-n` (but not negative numbers or a lone dash).
fn option_name(token: &str) -> Option<&str> {
    if let Some(rest) = token.strip_prefix("--") {
        return (!rest.is_empty()).then_some(rest);
    }
    let rest = token.strip_prefix('-')?;
    let first = rest.chars().next()?;
    (!first.is_ascii_digit()).then_some(rest)
}

/// `/key:value` with a plain identifier key, so paths stay positional.
fn slash_pair(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.strip_prefix('/')?.split_once(':')?;
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_forms() {
        let args = AppArgs::parse([
            "run",
            "--Environment=Staging",
            "--port",
            "8080",
            "-v",
            "--verbose",
            "/mode:batch",
            "/usr/share/data",
            "-3",
        ]);

        assert_eq!(args.get("environment").as_deref(), Some("Staging"));
        assert_eq!(args.get_parsed::<u16>("PORT").unwrap().unwrap(), 8080);
        assert!(args.flag("v"));
        assert!(args.flag("verbose"));
        assert_eq!(args.get("mode").as_deref(), Some("batch"));
        assert_eq!(args.positional(), &["run", "/usr/share/data", "-3"]);
    }

    #[test]
    fn test_flag_followed_by_option() {
        let args = AppArgs::parse(["--dry-run", "--level=2"]);
        assert!(args.flag("dry-run"));
        assert_eq!(args.get("level").as_deref(), Some("2"));
    }

    #[test]
    fn test_set_is_visible_to_clones() {
        let args = AppArgs::parse(Vec::<String>::new());
        assert!(args.is_empty());
        let clone = args.clone();
        args.set("Tenant", "acme");
        assert_eq!(clone.get("tenant").as_deref(), Some("acme"));
        assert!(!clone.flag("tenant"));
    }
}
