//! Merge context: ingests parsed coverage documents in order and produces
//! the merged report.
//!
//! Document order matters. In exclusive mode the first document seeds the
//! candidate file set and every later one narrows it; in additive mode the
//! first document fixes the file and line set for good.
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::metrics::{Metrics, MetricsScope};
use crate::model::{File, MergeMode};
use crate::warnings::Warnings;
use crate::xml::{self, Element, ElementKind};

/// A serialised merge.
#[derive(Debug)]
pub struct MergedReport {
    pub xml: String,
    /// Project-level counters, as written to the report.
    pub metrics: Metrics,
    /// Problems found while serialising (lines of unknown type).
    pub warnings: Warnings,
}

#[derive(Debug)]
pub struct Accumulator {
    merge_mode: MergeMode,
    /// Files keyed by their declared path. Sorted, which is also the output order.
    files: BTreeMap<String, File>,
    /// Set once a document has been ingested in additive mode.
    lock_lines: bool,
    seen_any_document: bool,
    warnings: Warnings,
}

impl Accumulator {
    pub fn new(merge_mode: MergeMode) -> Self {
        Self {
            merge_mode,
            files: BTreeMap::new(),
            lock_lines: false,
            seen_any_document: false,
            warnings: Warnings::new(),
        }
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    pub fn files(&self) -> &BTreeMap<String, File> {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Ingest each document in order.
    pub fn parse_all<'a, I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = &'a Element>,
    {
        for document in documents {
            self.parse_document(document);
        }
    }

    /// Ingest one document and apply the mode's end-of-document rule.
    pub fn parse_document(&mut self, document: &Element) {
        if document.kind() != ElementKind::Coverage {
            self.warnings
                .push(format!("Ignoring unexpected element: {}.", document.name));
            return;
        }

        let preexisting: BTreeSet<String> = self.files.keys().cloned().collect();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for project in &document.children {
            match project.kind() {
                ElementKind::Project => self.parse_items(&project.children, None, &mut seen),
                _ => self
                    .warnings
                    .push(format!("Ignoring unexpected element: {}.", project.name)),
            }
        }

        match self.merge_mode {
            MergeMode::Additive => self.lock_lines = true,
            MergeMode::Exclusive if self.seen_any_document => {
                self.files
                    .retain(|path, _| preexisting.contains(path) && seen.contains(path));
            }
            _ => {}
        }

        self.seen_any_document = true;
        tracing::debug!(
            files = self.files.len(),
            mode = %self.merge_mode,
            "document merged"
        );
    }

    fn parse_items(
        &mut self,
        items: &[Element],
        package_name: Option<&str>,
        seen: &mut BTreeSet<String>,
    ) {
        for item in items {
            match item.kind() {
                ElementKind::Package => {
                    let name = item.attr("name");
                    if name.is_none() {
                        // The package's files are still ingested, just unpackaged.
                        self.warnings.push("Ignoring package with no name.");
                    }
                    self.parse_items(&item.children, name, seen);
                }
                ElementKind::File => self.parse_file(item, package_name, seen),
                // Recomputed at serialisation time.
                ElementKind::Metrics => {}
                _ => self
                    .warnings
                    .push(format!("Ignoring unexpected element: {}.", item.name)),
            }
        }
    }

    fn parse_file(
        &mut self,
        element: &Element,
        package_name: Option<&str>,
        seen: &mut BTreeSet<String>,
    ) {
        let Some(path) = element.attr("name") else {
            self.warnings.push("Ignoring file with no name.");
            return;
        };

        let file = File::from_element(element, package_name, &mut self.warnings);
        seen.insert(path.to_string());

        if let Some(existing) = self.files.remove(path) {
            let merged = existing.merge(file, self.merge_mode, self.lock_lines);
            self.files.insert(path.to_string(), merged);
        } else if !self.lock_lines {
            self.files.insert(path.to_string(), file);
        }
    }

    /// Serialise the merged report, stamped with the current time.
    pub fn to_xml(&self) -> Result<MergedReport> {
        self.to_xml_at(chrono::Utc::now().timestamp())
    }

    /// Serialise the merged report with an explicit `generated` timestamp.
    pub fn to_xml_at(&self, timestamp: i64) -> Result<MergedReport> {
        let mut warnings = Warnings::new();
        let (root, metrics) = self.build_tree(timestamp, &mut warnings);
        let xml = xml::write_document(&root)?;
        Ok(MergedReport {
            xml,
            metrics,
            warnings,
        })
    }

    fn build_tree(&self, timestamp: i64, warnings: &mut Warnings) -> (Element, Metrics) {
        let timestamp = timestamp.to_string();
        let mut project = Element::new("project").with_attr("timestamp", timestamp.as_str());

        // (name, index into project.children, accumulated metrics)
        let mut packages: Vec<(&str, usize, Metrics)> = Vec::new();
        let mut project_metrics = Metrics::new();

        for (path, file) in &self.files {
            let file_metrics = file.metrics(warnings);
            let file_element = file_to_element(path, file, &file_metrics);

            let Some(package_name) = file.package_name() else {
                project_metrics.merge(&file_metrics);
                project.children.push(file_element);
                continue;
            };

            match packages.iter().position(|(name, _, _)| *name == package_name) {
                Some(pos) => {
                    let (_, idx, metrics) = &mut packages[pos];
                    metrics.merge(&file_metrics);
                    project.children[*idx].children.push(file_element);
                }
                None => {
                    let package = Element::new("package")
                        .with_attr("name", package_name)
                        .with_child(file_element);
                    let mut metrics = file_metrics;
                    metrics.packages = 1;
                    packages.push((package_name, project.children.len(), metrics));
                    project.children.push(package);
                }
            }
        }

        for (_, idx, metrics) in &packages {
            project.children[*idx]
                .children
                .push(metrics.to_element(MetricsScope::Package));
            project_metrics.merge(metrics);
        }

        project
            .children
            .push(project_metrics.to_element(MetricsScope::Project));

        let coverage = Element::new("coverage")
            .with_attr("generated", timestamp.as_str())
            .with_child(project);
        (coverage, project_metrics)
    }
}

fn file_to_element(path: &str, file: &File, metrics: &Metrics) -> Element {
    let mut element = Element::new("file").with_attr("name", path);
    for (name, class) in file.classes() {
        element.children.push(class.to_element(name));
    }
    for (number, line) in file.lines() {
        element.children.push(line.to_element(*number));
    }
    element.children.push(metrics.to_element(MetricsScope::File));
    element
}
