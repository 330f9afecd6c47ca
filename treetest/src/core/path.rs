//! Addressable paths through the describe/test hierarchy.

use std::fmt;
use std::rc::Rc;

/// Full ancestry of a describe block, root first.
///
/// Cloning is cheap: parents are shared, so every nested describe holds a
/// reference to the same chain instead of copying it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DescribePath {
    name: Rc<str>,
    parent: Option<Rc<DescribePath>>,
}

impl DescribePath {
    /// Root segment for a top-level suite.
    pub fn root(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            parent: None,
        }
    }

    /// Child segment owned by `self`.
    pub fn child(&self, name: &str) -> Self {
        Self {
            name: Rc::from(name),
            parent: Some(Rc::new(self.clone())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&DescribePath> {
        self.parent.as_deref()
    }

    /// Name of the top-level suite this describe belongs to.
    pub fn root_name(&self) -> &str {
        match &self.parent {
            Some(parent) => parent.root_name(),
            None => &self.name,
        }
    }

    /// Segment names ordered from the root down to `self`.
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = Some(self);
        while let Some(path) = current {
            segments.push(path.name());
            current = path.parent();
        }
        segments.reverse();
        segments
    }

    pub fn depth(&self) -> usize {
        self.parent.as_ref().map_or(0, |parent| parent.depth() + 1)
    }
}

impl fmt::Display for DescribePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join(" > "))
    }
}

impl fmt::Debug for DescribePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DescribePath({self})")
    }
}

/// A test name paired with the describe that declared it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TestPath {
    pub describe: DescribePath,
    pub name: Rc<str>,
}

impl TestPath {
    pub fn new(describe: &DescribePath, name: &str) -> Self {
        Self {
            describe: describe.clone(),
            name: Rc::from(name),
        }
    }

    /// Title segments: every describe name followed by the test name.
    pub fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self
            .describe
            .segments()
            .into_iter()
            .map(str::to_string)
            .collect();
        titles.push(self.name.to_string());
        titles
    }
}

impl fmt::Display for TestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.describe, self.name)
    }
}

impl fmt::Debug for TestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestPath({self})")
    }
}
