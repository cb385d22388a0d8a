//! Coverage counters and their XML form.
//!
//! Every `<metrics>` element written to the merged report is computed from
//! the merged line set. Input metrics are only kept for classes, where they
//! are carried through as a first-seen snapshot.
use crate::warnings::Warnings;
use crate::xml::{Attributes, Element};

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Which element a `<metrics>` block belongs to. Decides which counters
/// are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsScope {
    Class,
    File,
    Package,
    Project,
}

/// Accumulable bag of coverage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    pub statements: u64,
    pub covered_statements: u64,
    pub conditionals: u64,
    pub covered_conditionals: u64,
    pub methods: u64,
    pub covered_methods: u64,
    pub classes: u64,
    pub files: u64,
    pub packages: u64,
    /// Attributes of an input `<metrics>` element that are not counters
    /// (`complexity`, `loc`, ...). Written back verbatim.
    pub extra: Attributes,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every counter of `other` into `self`, saturating at `u64::MAX`.
    pub fn merge(&mut self, other: &Metrics) {
        self.statements = self.statements.saturating_add(other.statements);
        self.covered_statements = self
            .covered_statements
            .saturating_add(other.covered_statements);
        self.conditionals = self.conditionals.saturating_add(other.conditionals);
        self.covered_conditionals = self
            .covered_conditionals
            .saturating_add(other.covered_conditionals);
        self.methods = self.methods.saturating_add(other.methods);
        self.covered_methods = self.covered_methods.saturating_add(other.covered_methods);
        self.classes = self.classes.saturating_add(other.classes);
        self.files = self.files.saturating_add(other.files);
        self.packages = self.packages.saturating_add(other.packages);
    }

    #[must_use]
    pub fn element_count(&self) -> u64 {
        self.statements
            .saturating_add(self.conditionals)
            .saturating_add(self.methods)
    }

    #[must_use]
    pub fn covered_element_count(&self) -> u64 {
        self.covered_statements
            .saturating_add(self.covered_conditionals)
            .saturating_add(self.covered_methods)
    }

    /// Covered elements as a fraction of all elements, 0.0 when there are none.
    #[must_use]
    pub fn coverage_rate(&self) -> f64 {
        rate(self.covered_element_count(), self.element_count())
    }

    /// Coverage as a percentage in `0.0..=100.0`.
    #[must_use]
    pub fn coverage_percentage(&self) -> f64 {
        self.coverage_rate() * 100.0
    }

    /// Read counters from a `<metrics>` element. Derived attributes
    /// (`elements`, `coveredelements`) are dropped; unknown ones are kept in
    /// `extra`.
    pub fn from_element(element: &Element, warnings: &mut Warnings) -> Self {
        let mut metrics = Metrics::new();
        for (key, value) in element.attributes.iter() {
            let slot = match key {
                "statements" => &mut metrics.statements,
                "coveredstatements" => &mut metrics.covered_statements,
                "conditionals" => &mut metrics.conditionals,
                "coveredconditionals" => &mut metrics.covered_conditionals,
                "methods" => &mut metrics.methods,
                "coveredmethods" => &mut metrics.covered_methods,
                "classes" => &mut metrics.classes,
                "files" => &mut metrics.files,
                "packages" => &mut metrics.packages,
                "elements" | "coveredelements" => continue,
                _ => {
                    metrics.extra.insert(key, value);
                    continue;
                }
            };
            match value.trim().parse::<u64>() {
                Ok(n) => *slot = n,
                Err(_) => warnings.push(format!(
                    "Ignoring invalid metrics value: {key}=\"{value}\"."
                )),
            }
        }
        metrics
    }

    /// Build the `<metrics>` element for the given scope.
    pub fn to_element(&self, scope: MetricsScope) -> Element {
        let mut element = Element::new("metrics");
        let attrs = &mut element.attributes;

        if scope == MetricsScope::Class {
            attrs.fill_missing(&self.extra);
        }
        if scope == MetricsScope::Project {
            attrs.insert("packages", self.packages.to_string());
        }
        if matches!(scope, MetricsScope::Package | MetricsScope::Project) {
            attrs.insert("files", self.files.to_string());
        }
        if scope != MetricsScope::Class {
            attrs.insert("classes", self.classes.to_string());
        }

        attrs.insert("methods", self.methods.to_string());
        attrs.insert("coveredmethods", self.covered_methods.to_string());
        attrs.insert("conditionals", self.conditionals.to_string());
        attrs.insert("coveredconditionals", self.covered_conditionals.to_string());
        attrs.insert("statements", self.statements.to_string());
        attrs.insert("coveredstatements", self.covered_statements.to_string());
        attrs.insert("elements", self.element_count().to_string());
        attrs.insert("coveredelements", self.covered_element_count().to_string());
        element
    }
}
