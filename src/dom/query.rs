use std::fmt;

use kuchiki::{ElementData, NodeRef};

use super::class_list;

/// An attribute test inside a compound query. A missing value means presence
/// only. Names are stored lowercased, as the HTML parser stores them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrMatch {
    pub name: String,
    pub value: Option<String>,
}

/// Classes and attributes that must all hold on one element, optionally
/// scoped to elements with an ancestor carrying the `within` class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Compound {
    pub classes: Vec<String>,
    pub attributes: Vec<AttrMatch>,
    pub within: Option<String>,
}

/// A selector group: an element matches when any alternative matches.
///
/// Queries are deliberately small so the raw backend can evaluate them by
/// hand while the selector backend renders them to CSS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query {
    alternatives: Vec<Compound>,
}

impl Compound {
    pub fn class(name: &str) -> Self {
        Self {
            classes: vec![name.to_string()],
            ..Self::default()
        }
    }

    pub fn attr(name: &str, value: Option<&str>) -> Self {
        Self::default().with_attr(name, value)
    }

    pub fn with_class(mut self, name: &str) -> Self {
        self.classes.push(name.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: Option<&str>) -> Self {
        self.attributes.push(AttrMatch {
            name: name.to_ascii_lowercase(),
            value: value.map(str::to_string),
        });
        self
    }

    pub fn within(mut self, class: Option<&str>) -> Self {
        self.within = class.map(str::to_string);
        self
    }

    fn matches_element(&self, element: &ElementData) -> bool {
        let attributes = element.attributes.borrow();
        let class_attr = attributes.get("class").unwrap_or("");
        if !self
            .classes
            .iter()
            .all(|class| class_list::contains(class_attr, class))
        {
            return false;
        }
        self.attributes.iter().all(|attr| match &attr.value {
            Some(expected) => attributes.get(attr.name.as_str()) == Some(expected.as_str()),
            None => attributes.contains(attr.name.as_str()),
        })
    }

    fn matches(&self, node: &NodeRef) -> bool {
        let Some(element) = node.as_element() else {
            return false;
        };
        if !self.matches_element(element) {
            return false;
        }
        match &self.within {
            Some(scope) => node.ancestors().any(|ancestor| {
                ancestor.as_element().is_some_and(|el| {
                    class_list::contains(
                        el.attributes.borrow().get("class").unwrap_or(""),
                        scope,
                    )
                })
            }),
            None => true,
        }
    }

    fn write_css(&self, out: &mut String) {
        if let Some(scope) = &self.within {
            out.push('.');
            out.push_str(scope);
            out.push(' ');
        }
        if self.classes.is_empty() && self.attributes.is_empty() {
            out.push('*');
        }
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        for attr in &self.attributes {
            out.push('[');
            out.push_str(&attr.name);
            if let Some(value) = &attr.value {
                out.push_str("=\"");
                for ch in value.chars() {
                    if ch == '"' || ch == '\\' {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push('"');
            }
            out.push(']');
        }
    }
}

impl Query {
    pub fn new(alternatives: Vec<Compound>) -> Self {
        Self { alternatives }
    }

    pub fn class(name: &str) -> Self {
        Self::new(vec![Compound::class(name)])
    }

    pub fn classes(names: &[&str]) -> Self {
        let compound = names
            .iter()
            .fold(Compound::default(), |compound, name| compound.with_class(name));
        Self::new(vec![compound])
    }

    /// Union of two queries.
    pub fn or(mut self, other: Query) -> Self {
        self.alternatives.extend(other.alternatives);
        self
    }

    /// Add the same attribute test to every alternative.
    pub fn with_attr(self, name: &str, value: Option<&str>) -> Self {
        Self::new(
            self.alternatives
                .into_iter()
                .map(|compound| compound.with_attr(name, value))
                .collect(),
        )
    }

    /// Add the same class to every alternative.
    pub fn with_class(self, name: &str) -> Self {
        Self::new(
            self.alternatives
                .into_iter()
                .map(|compound| compound.with_class(name))
                .collect(),
        )
    }

    /// Evaluate the query against one node by walking the tree directly.
    pub fn matches(&self, node: &NodeRef) -> bool {
        self.alternatives
            .iter()
            .any(|compound| compound.matches(node))
    }

    /// Render as a CSS selector group.
    pub fn to_css(&self) -> String {
        let mut out = String::new();
        for (index, compound) in self.alternatives.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            compound.write_css(&mut out);
        }
        out
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}
