//! Inline `style` attribute declarations.
//!
//! `InlineStyle` keeps declarations in source order so that a restore which
//! replaces a handful of properties leaves every other declaration exactly
//! where it was.

use std::fmt;

/// An ordered list of `property: value` declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    /// Parse a style attribute value.
    ///
    /// Splits on `;` outside quotes and parentheses so that
    /// `url("data:image/png;base64,...")` stays one value. Declarations
    /// without a colon are dropped; property names are lowercased.
    pub fn parse(s: &str) -> Self {
        let mut declarations = Vec::new();
        for chunk in split_top_level(s, ';') {
            let Some((name, value)) = split_once_top_level(chunk, ':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }
            declarations.push((name, value.to_string()));
        }
        Self { declarations }
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Value of the last declaration for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set `name`, replacing an existing declaration in place or appending.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut found = false;
        self.declarations.retain_mut(|(n, v)| {
            if n != name {
                return true;
            }
            if found {
                return false;
            }
            found = true;
            *v = value.clone();
            true
        });
        if !found {
            self.declarations.push((name.to_string(), value));
        }
    }

    /// Append a declaration after removing any earlier one with the same name.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.declarations.push((name.to_string(), value.into()));
    }

    /// Remove every declaration for `name`. Returns true if any was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.declarations.len();
        self.declarations.retain(|(n, _)| n != name);
        before != self.declarations.len()
    }

    /// Remove every declaration whose name is in `names`.
    pub fn remove_all<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        let names: Vec<&str> = names.into_iter().collect();
        self.declarations.retain(|(n, _)| !names.contains(&n.as_str()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.declarations
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.declarations.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {};", name, value)?;
        }
        Ok(())
    }
}

/// Split `s` on `sep` wherever it is not inside quotes or parentheses.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn split_once_top_level(s: &str, sep: char) -> Option<(&str, &str)> {
    let parts = split_top_level(s, sep);
    if parts.len() < 2 {
        return None;
    }
    let first = parts[0];
    Some((first, &s[first.len() + sep.len_utf8()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let style = InlineStyle::parse("left: 10px; TOP:20px;;color : red");
        assert_eq!(style.len(), 3);
        assert_eq!(style.get("left"), Some("10px"));
        assert_eq!(style.get("top"), Some("20px"));
        assert_eq!(style.get("color"), Some("red"));
    }

    #[test]
    fn test_parse_data_uri_keeps_semicolons() {
        let style =
            InlineStyle::parse(r#"background-image: url("data:image/png;base64,AAA="); opacity: 0.5"#);
        assert_eq!(
            style.get("background-image"),
            Some(r#"url("data:image/png;base64,AAA=")"#)
        );
        assert_eq!(style.get("opacity"), Some("0.5"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut style = InlineStyle::parse("left: 1px; top: 2px");
        style.set("left", "5px");
        assert_eq!(style.to_string(), "left: 5px; top: 2px;");
    }

    #[test]
    fn test_append_moves_to_end() {
        let mut style = InlineStyle::parse("left: 1px; top: 2px");
        style.append("left", "5px");
        assert_eq!(style.to_string(), "top: 2px; left: 5px;");
    }

    #[test]
    fn test_remove_all_keeps_others() {
        let mut style = InlineStyle::parse("left: 1px; cursor: move; width: 3px");
        style.remove_all(["left", "width"]);
        assert_eq!(style.to_string(), "cursor: move;");
    }

    #[test]
    fn test_colon_inside_value() {
        let style = InlineStyle::parse("background-image: url(http://x/a.png)");
        assert_eq!(style.get("background-image"), Some("url(http://x/a.png)"));
    }
}
