//! Attribute paths locating a value in a resource tree

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathStep {
    Attr(String),
    Index(usize),
}

/// Dotted path such as `private_network.0.static_config`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributePath(Vec<PathStep>);

impl AttributePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn attr(name: impl Into<String>) -> Self {
        Self(vec![PathStep::Attr(name.into())])
    }

    pub fn join(&self, name: impl Into<String>) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Attr(name.into()));
        Self(steps)
    }

    pub fn index(&self, i: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Index(i));
        Self(steps)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// First attribute name, if any
    pub fn top(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathStep::Attr(a)) => Some(a),
            _ => None,
        }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match step {
                PathStep::Attr(a) => f.write_str(a)?,
                PathStep::Index(n) => write!(f, "{n}")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for AttributePath {
    fn from(s: &str) -> Self {
        Self(
            s.split('.')
                .filter(|p| !p.is_empty())
                .map(|p| match p.parse::<usize>() {
                    Ok(n) => PathStep::Index(n),
                    Err(_) => PathStep::Attr(p.to_string()),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let p = AttributePath::attr("private_network")
            .index(0)
            .join("static_config");
        assert_eq!(p.to_string(), "private_network.0.static_config");
        assert_eq!(AttributePath::from("private_network.0.static_config"), p);
        assert_eq!(p.top(), Some("private_network"));
        assert!(AttributePath::root().is_root());
    }

    #[test]
    fn test_serde_shape() {
        let p = AttributePath::attr("rule").index(1);
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"["rule",1]"#);
    }
}
