//! In-memory model of a Clover report: files, their classes and lines, and
//! the rules for folding a second record of the same file into the first.
use std::collections::BTreeMap;

use crate::error::{CloverMergeError, Result};
use crate::metrics::Metrics;
use crate::warnings::Warnings;
use crate::xml::{Attributes, Element, ElementKind};

/// How files and lines from successive documents combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Union of all files and lines; hit counts sum.
    #[default]
    Inclusive,
    /// Only files and lines present in every document survive.
    Exclusive,
    /// The first document fixes the file and line set; later documents only
    /// add hits.
    Additive,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Inclusive => "inclusive",
            MergeMode::Exclusive => "exclusive",
            MergeMode::Additive => "additive",
        }
    }
}

impl std::str::FromStr for MergeMode {
    type Err = CloverMergeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "inclusive" => Ok(MergeMode::Inclusive),
            "exclusive" => Ok(MergeMode::Exclusive),
            "additive" => Ok(MergeMode::Additive),
            _ => Err(CloverMergeError::Config(
                "Merge option must be one of: additive, exclusive or inclusive.".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for MergeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The metrics bucket a line counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    Method,
    Stmt,
    Cond,
}

impl LineType {
    /// A missing `type` means `stmt`. Unknown types yield `None`.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("stmt") => Some(LineType::Stmt),
            Some("method") => Some(LineType::Method),
            Some("cond") => Some(LineType::Cond),
            Some(_) => None,
        }
    }
}

/// Hit count for one source line plus its other attributes
/// (`type`, `name`, `complexity`, `crap`, `truecount`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub count: u64,
    /// Every attribute except `num` and `count`, in document order.
    pub properties: Attributes,
}

impl Line {
    pub fn new(count: u64, properties: Attributes) -> Self {
        Self { count, properties }
    }

    /// Build a line from a `<line>` element. The line number is the caller's
    /// business; `count` is required.
    pub fn from_element(element: &Element) -> Result<Self> {
        let mut properties = element.attributes.clone();
        properties.remove("num");
        let count = properties.remove("count").ok_or_else(|| {
            CloverMergeError::Parse("Unable to parse line, missing count attribute.".to_string())
        })?;
        let count = count.trim().parse::<u64>().map_err(|_| {
            CloverMergeError::Parse(format!(
                "Unable to parse line, invalid count attribute: {count}."
            ))
        })?;
        Ok(Self { count, properties })
    }

    pub fn line_type(&self) -> Option<&str> {
        self.properties.get("type")
    }

    /// Fold `other` into this line: counts sum (saturating), and properties
    /// already set here keep their values while missing ones are taken from
    /// `other`.
    #[must_use]
    pub fn merge(mut self, other: &Line) -> Line {
        self.count = self.count.saturating_add(other.count);
        self.properties.fill_missing(&other.properties);
        self
    }

    /// Serialise as `<line num=.. [properties..] count=..>`.
    pub fn to_element(&self, number: u32) -> Element {
        let mut element = Element::new("line").with_attr("num", number.to_string());
        for (key, value) in self.properties.iter() {
            element.attributes.insert(key, value);
        }
        element.attributes.insert("count", self.count.to_string());
        element
    }
}

/// A class declared in a file, as first reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassT {
    pub namespace: Option<String>,
    pub metrics: Option<Metrics>,
}

impl ClassT {
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace,
            metrics: None,
        }
    }

    /// Build from a `<class>` element. The class name is read by the caller.
    pub fn from_element(element: &Element, warnings: &mut Warnings) -> Self {
        let mut class = ClassT::new(element.attr("namespace").map(str::to_string));
        for child in &element.children {
            match child.kind() {
                ElementKind::Metrics => {
                    class.merge_metrics(Metrics::from_element(child, warnings));
                }
                _ => warnings.push(format!("Ignoring unexpected element: {}.", child.name)),
            }
        }
        class
    }

    /// Attach `metrics` unless a snapshot is already held.
    pub fn merge_metrics(&mut self, metrics: Metrics) {
        if self.metrics.is_none() {
            self.metrics = Some(metrics);
        }
    }

    pub fn to_element(&self, name: &str) -> Element {
        let mut element = Element::new("class").with_attr("name", name);
        if let Some(namespace) = &self.namespace {
            element.attributes.insert("namespace", namespace.as_str());
        }
        if let Some(metrics) = &self.metrics {
            element
                .children
                .push(metrics.to_element(crate::metrics::MetricsScope::Class));
        }
        element
    }
}

/// Coverage for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    /// Classes by name, in discovery order.
    classes: Vec<(String, ClassT)>,
    lines: BTreeMap<u32, Line>,
    package_name: Option<String>,
}

impl File {
    pub fn new(package_name: Option<String>) -> Self {
        Self {
            package_name,
            ..Default::default()
        }
    }

    /// Build from a `<file>` element. Malformed children are skipped with a
    /// warning; nothing here aborts the parse.
    pub fn from_element(
        element: &Element,
        package_name: Option<&str>,
        warnings: &mut Warnings,
    ) -> Self {
        let mut file = File::new(package_name.map(str::to_string));
        for child in &element.children {
            match child.kind() {
                ElementKind::Class => {
                    let Some(name) = child.attr("name") else {
                        warnings.push("Ignoring class with no name.");
                        continue;
                    };
                    file.add_class(name, ClassT::from_element(child, warnings));
                }
                ElementKind::Line => {
                    let num = child
                        .attr("num")
                        .and_then(|n| n.trim().parse::<u32>().ok())
                        .filter(|n| *n > 0 && child.attributes.contains_key("count"));
                    let Some(num) = num else {
                        warnings.push("Ignoring line with no num or count.");
                        continue;
                    };
                    match Line::from_element(child) {
                        Ok(line) => file.add_line(num, line, false),
                        Err(e) => warnings.push(format!("Ignoring line {num}: {e}")),
                    }
                }
                // Recomputed at serialisation time.
                ElementKind::Metrics => {}
                _ => warnings.push(format!("Ignoring unexpected element: {}.", child.name)),
            }
        }
        file
    }

    /// Register a class unless one with that name is already known.
    pub fn add_class(&mut self, name: &str, class: ClassT) {
        if self.class(name).is_none() {
            self.classes.push((name.to_string(), class));
        }
    }

    /// Merge `line` into an existing line with that number, or insert it
    /// when `lock_lines` is false.
    pub fn add_line(&mut self, number: u32, line: Line, lock_lines: bool) {
        if let Some(existing) = self.lines.remove(&number) {
            self.lines.insert(number, existing.merge(&line));
        } else if !lock_lines {
            self.lines.insert(number, line);
        }
    }

    /// Fold another record of the same file into this one.
    ///
    /// Classes and package name are first-wins. In exclusive mode both line
    /// sets are first cut down to the line numbers they share. With
    /// `lock_lines` only lines already present here are updated.
    #[must_use]
    pub fn merge(mut self, other: File, mode: MergeMode, lock_lines: bool) -> File {
        for (name, class) in other.classes {
            self.add_class(&name, class);
        }
        if self.package_name.is_none() {
            self.package_name = other.package_name;
        }

        let mut other_lines = other.lines;
        if mode == MergeMode::Exclusive {
            self.lines.retain(|num, _| other_lines.contains_key(num));
            other_lines.retain(|num, _| self.lines.contains_key(num));
        }

        for (number, line) in other_lines {
            self.add_line(number, line, lock_lines);
        }
        self
    }

    /// Counters derived from the current line set. Lines with an unknown
    /// `type` are reported and left out.
    pub fn metrics(&self, warnings: &mut Warnings) -> Metrics {
        let mut metrics = Metrics {
            classes: self.classes.len() as u64,
            files: 1,
            ..Default::default()
        };
        for line in self.lines.values() {
            let covered = u64::from(line.count > 0);
            match LineType::parse(line.line_type()) {
                Some(LineType::Method) => {
                    metrics.methods += 1;
                    metrics.covered_methods += covered;
                }
                Some(LineType::Stmt) => {
                    metrics.statements += 1;
                    metrics.covered_statements += covered;
                }
                Some(LineType::Cond) => {
                    metrics.conditionals += 1;
                    metrics.covered_conditionals += covered;
                }
                None => warnings.push(format!(
                    "Ignoring unexpected line type: {}.",
                    line.line_type().unwrap_or_default()
                )),
            }
        }
        metrics
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassT)> {
        self.classes.iter().map(|(name, class)| (name.as_str(), class))
    }

    pub fn class(&self, name: &str) -> Option<&ClassT> {
        self.classes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, class)| class)
    }

    pub fn lines(&self) -> &BTreeMap<u32, Line> {
        &self.lines
    }

    pub fn line(&self, number: u32) -> Option<&Line> {
        self.lines.get(&number)
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn file_from(xml: &str, package: Option<&str>) -> (File, Warnings) {
        let element = parse_document(xml.as_bytes()).unwrap();
        let mut warnings = Warnings::new();
        let file = File::from_element(&element, package, &mut warnings);
        (file, warnings)
    }

    fn counts(file: &File) -> Vec<(u32, u64)> {
        file.lines().iter().map(|(n, l)| (*n, l.count)).collect()
    }

    const CLASS_FILE: &str = r#"
        <file name="/src/Example/Namespace/Class.php">
            <class name="Example\Namespace\Class" namespace="Example\Namespace">
                <metrics bar="foo" fred="baz"/>
            </class>
            <line num="22" type="method" name="__construct" count="1"/>
            <line num="28" type="stmt" count="1"/>
            <line num="29" type="stmt" count="0"/>
            <metrics foo="bar" baz="fred"/>
        </file>"#;

    #[test]
    fn test_merge_mode_from_str() {
        assert_eq!("inclusive".parse::<MergeMode>().unwrap(), MergeMode::Inclusive);
        assert_eq!("exclusive".parse::<MergeMode>().unwrap(), MergeMode::Exclusive);
        assert_eq!("additive".parse::<MergeMode>().unwrap(), MergeMode::Additive);

        let err = "bogus".parse::<MergeMode>().unwrap_err();
        assert!(matches!(err, CloverMergeError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Merge option must be one of: additive, exclusive or inclusive."
        );
        assert!("Inclusive".parse::<MergeMode>().is_err());
        assert_eq!(MergeMode::default(), MergeMode::Inclusive);
    }

    #[test]
    fn test_line_type_parse() {
        assert_eq!(LineType::parse(None), Some(LineType::Stmt));
        assert_eq!(LineType::parse(Some("stmt")), Some(LineType::Stmt));
        assert_eq!(LineType::parse(Some("method")), Some(LineType::Method));
        assert_eq!(LineType::parse(Some("cond")), Some(LineType::Cond));
        assert_eq!(LineType::parse(Some("branch")), None);
    }

    #[test]
    fn test_line_from_element() {
        let el = parse_document(br#"<line num="4" foo="bar" baz="fred" count="2"/>"#).unwrap();
        let line = Line::from_element(&el).unwrap();
        assert_eq!(line.count, 2);
        let props: Vec<_> = line.properties.iter().collect();
        assert_eq!(props, [("foo", "bar"), ("baz", "fred")]);
    }

    #[test]
    fn test_line_from_element_missing_count() {
        let el = parse_document(br#"<line foo="bar" baz="fred"/>"#).unwrap();
        let err = Line::from_element(&el).unwrap_err();
        assert!(matches!(err, CloverMergeError::Parse(_)));
        assert!(err.to_string().contains("missing count attribute"));
    }

    #[test]
    fn test_line_from_element_invalid_count() {
        let el = parse_document(br#"<line num="1" count="-3"/>"#).unwrap();
        assert!(Line::from_element(&el).is_err());
    }

    #[test]
    fn test_line_merge_first_properties_win() {
        let first = Line::new(2, [("type", "stmt"), ("crap", "1")].into_iter().collect());
        let second = Line::new(
            3,
            [("type", "method"), ("name", "run")].into_iter().collect(),
        );

        let merged = first.merge(&second);
        assert_eq!(merged.count, 5);
        assert_eq!(merged.properties.get("type"), Some("stmt"));
        assert_eq!(merged.properties.get("crap"), Some("1"));
        assert_eq!(merged.properties.get("name"), Some("run"));
    }

    #[test]
    fn test_line_merge_saturates() {
        let line = Line::new(u64::MAX, Attributes::default());
        let merged = line.clone().merge(&line);
        assert_eq!(merged.count, u64::MAX);
        assert_eq!(Line::new(1, Attributes::default()).merge(&merged).count, u64::MAX);
    }

    #[test]
    fn test_file_line_with_invalid_count() {
        let (file, warnings) = file_from(
            r#"<file name="a.php">
                 <line num="3" count="lots"/>
                 <line num="4" count="1"/>
               </file>"#,
            None,
        );
        assert_eq!(counts(&file), [(4, 1)]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings.messages()[0].starts_with("Ignoring line 3:"));
    }

    #[test]
    fn test_line_to_element_attribute_order() {
        let line = Line::new(7, [("type", "cond"), ("truecount", "1")].into_iter().collect());
        let el = line.to_element(12);
        let keys: Vec<_> = el.attributes.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["num", "type", "truecount", "count"]);
        assert_eq!(el.attr("num"), Some("12"));
        assert_eq!(el.attr("count"), Some("7"));
    }

    #[test]
    fn test_class_from_element() {
        let el = parse_document(
            br#"<class name="Example\Namespace\Class" namespace="Example\Namespace">
                  <metrics methods="2" coveredmethods="1"/>
                  <metrics methods="9"/>
                </class>"#,
        )
        .unwrap();
        let mut warnings = Warnings::new();
        let class = ClassT::from_element(&el, &mut warnings);
        assert_eq!(class.namespace.as_deref(), Some("Example\\Namespace"));
        assert_eq!(class.metrics.as_ref().map(|m| m.methods), Some(2));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_class_without_namespace_or_metrics() {
        let el = parse_document(br#"<class name="Foo"/>"#).unwrap();
        let class = ClassT::from_element(&el, &mut Warnings::new());
        assert_eq!(class, ClassT::default());

        let out = class.to_element("Foo");
        assert_eq!(out.attr("name"), Some("Foo"));
        assert_eq!(out.attr("namespace"), None);
        assert!(out.children.is_empty());
    }

    #[test]
    fn test_class_merge_metrics_first_wins() {
        let mut class = ClassT::new(None);
        class.merge_metrics(Metrics {
            statements: 1,
            ..Default::default()
        });
        class.merge_metrics(Metrics {
            statements: 5,
            ..Default::default()
        });
        assert_eq!(class.metrics.unwrap().statements, 1);
    }

    #[test]
    fn test_file_from_element() {
        let (file, warnings) = file_from(CLASS_FILE, Some("package_name"));
        assert!(warnings.is_empty());
        assert_eq!(file.package_name(), Some("package_name"));

        let classes: Vec<_> = file.classes().collect();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].0, "Example\\Namespace\\Class");
        assert_eq!(classes[0].1.namespace.as_deref(), Some("Example\\Namespace"));

        assert_eq!(counts(&file), [(22, 1), (28, 1), (29, 0)]);
        assert_eq!(file.line(22).unwrap().line_type(), Some("method"));
    }

    #[test]
    fn test_file_from_element_with_errors() {
        let (file, warnings) = file_from(
            r#"
            <file name="/src/Example/Namespace/Class.php">
                <class namespace="Example\Namespace">
                    <metrics bar="foo" fred="baz"/>
                </class>
                <line num="22" type="method" name="__construct" count="1"/>
                <line type="stmt" count="1"/>
                <line num="28" type="stmt"/>
                <line num="29" type="stmt" count="0"/>
                <metrics foo="bar" baz="fred"/>
                <banana/>
            </file>"#,
            None,
        );

        assert!(warnings.contains("Ignoring class with no name."));
        assert!(warnings.contains("Ignoring line with no num or count."));
        assert!(warnings.contains("Ignoring unexpected element: banana."));
        let skipped = warnings
            .messages()
            .iter()
            .filter(|m| *m == "Ignoring line with no num or count.")
            .count();
        assert_eq!(skipped, 2);
        assert_eq!(warnings.len(), 4);

        assert_eq!(file.classes().count(), 0);
        assert_eq!(counts(&file), [(22, 1), (29, 0)]);
    }

    #[test]
    fn test_file_duplicate_lines_within_element_sum() {
        let (file, _) = file_from(
            r#"<file name="a.php">
                 <line num="3" count="1"/>
                 <line num="3" count="4"/>
               </file>"#,
            None,
        );
        assert_eq!(counts(&file), [(3, 5)]);
    }

    #[test]
    fn test_file_merge_inclusive() {
        let (first, _) = file_from(CLASS_FILE, Some("package_name"));
        let (second, _) = file_from(
            r#"
            <file name="/src/Example/Namespace/Class.php">
                <class name="Example\Namespace\OtherClass" namespace="Example\OtherNamespace"/>
                <class name="Example\Namespace\Class" namespace="Somewhere\Else"/>
                <line num="28" type="stmt" count="1"/>
                <line num="29" type="stmt" count="0"/>
                <line num="30" type="stmt" count="2"/>
            </file>"#,
            Some("other_package_name"),
        );

        let merged = first.merge(second, MergeMode::Inclusive, false);
        assert_eq!(merged.package_name(), Some("package_name"));

        let names: Vec<_> = merged.classes().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["Example\\Namespace\\Class", "Example\\Namespace\\OtherClass"]
        );
        assert_eq!(
            merged
                .class("Example\\Namespace\\Class")
                .and_then(|c| c.namespace.as_deref()),
            Some("Example\\Namespace")
        );
        assert_eq!(
            merged
                .class("Example\\Namespace\\OtherClass")
                .and_then(|c| c.namespace.as_deref()),
            Some("Example\\OtherNamespace")
        );

        assert_eq!(counts(&merged), [(22, 1), (28, 2), (29, 0), (30, 2)]);
    }

    #[test]
    fn test_file_merge_adopts_package_when_unset() {
        let merged = File::new(None).merge(
            File::new(Some("pkg".to_string())),
            MergeMode::Inclusive,
            false,
        );
        assert_eq!(merged.package_name(), Some("pkg"));
    }

    #[test]
    fn test_file_merge_exclusive_intersects_lines() {
        let (first, _) = file_from(
            r#"<file name="a.php">
                 <line num="1" count="1"/><line num="2" count="1"/><line num="3" count="1"/>
               </file>"#,
            None,
        );
        let (second, _) = file_from(
            r#"<file name="a.php">
                 <line num="2" count="5"/><line num="3" count="0"/><line num="4" count="7"/>
               </file>"#,
            None,
        );
        let merged = first.merge(second, MergeMode::Exclusive, false);
        assert_eq!(counts(&merged), [(2, 6), (3, 1)]);
    }

    #[test]
    fn test_file_merge_locked_lines() {
        let (first, _) = file_from(
            r#"<file name="a.php"><line num="1" count="1"/><line num="2" count="0"/></file>"#,
            None,
        );
        let (second, _) = file_from(
            r#"<file name="a.php"><line num="2" count="3"/><line num="9" count="3"/></file>"#,
            None,
        );
        let merged = first.merge(second, MergeMode::Additive, true);
        assert_eq!(counts(&merged), [(1, 1), (2, 3)]);
    }

    #[test]
    fn test_file_metrics() {
        let (file, _) = file_from(
            r#"<file name="a.php">
                 <class name="A"/>
                 <line num="1" type="method" count="1"/>
                 <line num="2" type="stmt" count="1"/>
                 <line num="3" count="0"/>
                 <line num="4" type="cond" count="0"/>
                 <line num="5" type="cond" count="2"/>
                 <line num="6" type="weird" count="2"/>
               </file>"#,
            None,
        );
        let mut warnings = Warnings::new();
        let m = file.metrics(&mut warnings);

        assert_eq!((m.methods, m.covered_methods), (1, 1));
        assert_eq!((m.statements, m.covered_statements), (2, 1));
        assert_eq!((m.conditionals, m.covered_conditionals), (2, 1));
        assert_eq!(m.classes, 1);
        assert_eq!(m.files, 1);
        assert_eq!(m.packages, 0);
        assert_eq!(warnings.messages(), ["Ignoring unexpected line type: weird."]);
    }
}
