//! Post-load DOM fixes applied before PDF export.
//!
//! The utility-class framework used by callers ships minimum-height rules
//! that leave blank trailing pages in print. Rather than hard-coding the fix
//! in the pipeline, the fixes are expressed as [`CleanupRule`]s and shipped to
//! the page as JSON, where a small interpreter applies them.

use serde::Serialize;

/// Inline style declaration forced onto matching elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleOverride {
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl StyleOverride {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            important: false,
        }
    }

    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }
}

/// One selector and the changes applied to every element it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRule {
    pub selector: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<StyleOverride>,
    /// JavaScript regular expression; matching class names are removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_class_pattern: Option<String>,
}

impl CleanupRule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            styles: Vec::new(),
            strip_class_pattern: None,
        }
    }

    pub fn style(mut self, style: StyleOverride) -> Self {
        self.styles.push(style);
        self
    }

    pub fn strip_classes(mut self, pattern: impl Into<String>) -> Self {
        self.strip_class_pattern = Some(pattern.into());
        self
    }
}

/// Ordered rule set; rules run in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupRules {
    rules: Vec<CleanupRule>,
}

impl CleanupRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules for the utility-class conventions this service targets.
    pub fn print_defaults() -> Self {
        Self::empty()
            .with_rule(
                CleanupRule::new("*")
                    .style(StyleOverride::new("min-height", "0").important()),
            )
            .with_rule(
                CleanupRule::new("[class*=\"min-h-[\"]").strip_classes(r"^min-h-\[[^\]]*\]$"),
            )
            .with_rule(
                CleanupRule::new(".avoid-break, .break-inside-avoid, [data-avoid-break]")
                    .style(StyleOverride::new("page-break-inside", "avoid"))
                    .style(StyleOverride::new("break-inside", "avoid")),
            )
    }

    pub fn with_rule(mut self, rule: CleanupRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[CleanupRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Build the expression evaluated in the page. It resolves to the number of
    /// element visits performed.
    pub fn script(&self) -> Result<String, serde_json::Error> {
        let rules = serde_json::to_string(&self.rules)?;
        Ok(format!("({CLEANUP_INTERPRETER})({rules})"))
    }
}

const CLEANUP_INTERPRETER: &str = r#"(rules) => {
  let visited = 0;
  for (const rule of rules) {
    const pattern = rule.stripClassPattern ? new RegExp(rule.stripClassPattern) : null;
    for (const element of document.querySelectorAll(rule.selector)) {
      for (const style of rule.styles || []) {
        element.style.setProperty(style.property, style.value, style.important ? "important" : "");
      }
      if (pattern) {
        for (const name of Array.from(element.classList)) {
          if (pattern.test(name)) {
            element.classList.remove(name);
          }
        }
      }
      visited += 1;
    }
  }
  return visited;
}"#;
