// Matrix Reporter
// Renders a session as JSON, YAML, JUnit XML, or a terminal tree

use crate::error::ServiceResult;
use crate::report::{LeafSnapshot, MatrixSnapshot};
use crate::session::Session;
use crate::tree::{Node, Status, ROOT_ID};

use std::fmt;

/// Output format for matrix reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Full snapshot as JSON
    Json,
    /// Full snapshot as YAML
    Yaml,
    /// JUnit XML format (for CI systems)
    JUnit,
    /// Human-readable tree of visible nodes
    Terminal,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Yaml => write!(f, "yaml"),
            ReportFormat::JUnit => write!(f, "junit"),
            ReportFormat::Terminal => write!(f, "terminal"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            "junit" | "junit-xml" | "xml" => Ok(ReportFormat::JUnit),
            "terminal" | "text" | "console" => Ok(ReportFormat::Terminal),
            _ => Err(format!(
                "Unknown report format '{}'. Valid formats: json, yaml, junit, terminal",
                s
            )),
        }
    }
}

/// Matrix reporter that generates output in various formats
pub struct Reporter;

impl Reporter {
    /// Generate a report in the specified format
    pub fn report(session: &Session, format: ReportFormat) -> ServiceResult<String> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(&session.snapshot())?),
            ReportFormat::Yaml => Ok(serde_yaml::to_string(&session.snapshot())?),
            ReportFormat::JUnit => Ok(Self::to_junit_xml(&session.snapshot())),
            ReportFormat::Terminal => Ok(Self::to_terminal(session)),
        }
    }

    /// Generate JUnit XML output: one testcase per leaf and result key.
    ///
    /// Failed results carry a `<failure>`; anything not yet passed or
    /// failed is reported as skipped.
    pub fn to_junit_xml(snapshot: &MatrixSnapshot) -> String {
        let cases: Vec<(&LeafSnapshot, &str, Status)> = snapshot
            .leaves
            .iter()
            .flat_map(|leaf| {
                leaf.results
                    .iter()
                    .map(move |(key, status)| (leaf, key.as_str(), *status))
            })
            .collect();
        let multi_key = snapshot.result_dimensions.len() > 1;

        let failures = cases.iter().filter(|(_, _, s)| *s == Status::Fail).count();
        let skipped = cases.iter().filter(|(_, _, s)| !s.is_terminal()).count();
        let time: f64 = snapshot.leaves.iter().map(LeafSnapshot::duration_secs).sum();

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        xml.push_str(&format!(
            "<testsuites tests=\"{}\" failures=\"{}\" skipped=\"{}\" errors=\"0\" time=\"{:.3}\">\n",
            cases.len(),
            failures,
            skipped,
            time
        ));

        xml.push_str(&format!(
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" errors=\"0\" time=\"{:.3}\">\n",
            xml_escape(&snapshot.name),
            cases.len(),
            failures,
            skipped,
            time
        ));

        for (leaf, key, status) in cases {
            let name = if multi_key {
                format!("{} [{}]", leaf.id, key)
            } else {
                leaf.id.to_string()
            };
            xml.push_str(&format!(
                "    <testcase classname=\"{}\" name=\"{}\" time=\"{:.3}\"",
                xml_escape(&snapshot.name),
                xml_escape(&name),
                leaf.duration_secs()
            ));

            match status {
                Status::Pass => xml.push_str(" />\n"),
                Status::Fail => {
                    xml.push_str(">\n");
                    let message = if leaf.remark.is_empty() {
                        format!("{} failed", leaf.path.join(" › "))
                    } else {
                        leaf.remark.clone()
                    };
                    xml.push_str(&format!(
                        "      <failure message=\"{}\" />\n",
                        xml_escape(&message)
                    ));
                    xml.push_str("    </testcase>\n");
                }
                other => {
                    xml.push_str(">\n");
                    xml.push_str(&format!(
                        "      <skipped message=\"{}\" />\n",
                        other.as_str()
                    ));
                    xml.push_str("    </testcase>\n");
                }
            }
        }

        xml.push_str("  </testsuite>\n");
        xml.push_str("</testsuites>\n");
        xml
    }

    /// Generate human-readable terminal output.
    ///
    /// Only nodes visible under the session's filter are listed.
    pub fn to_terminal(session: &Session) -> String {
        let tree = session.tree();
        let mut out = String::new();

        // Header
        out.push_str(&format!("\nMatrix: {}\n", session.name()));
        out.push_str(&"=".repeat(60));
        out.push('\n');

        let mut stack: Vec<&Node> = vec![tree.root()];
        while let Some(node) = stack.pop() {
            let id = node.id().as_str();
            if !session.is_visible(id) {
                continue;
            }

            let status = session.aggregate_status(id).unwrap_or_default();
            let indent = "  ".repeat(node.depth());
            let label = if id == ROOT_ID {
                session.name()
            } else {
                node.label()
            };

            match node {
                Node::Leaf(leaf) => {
                    out.push_str(&format!("{}{} {}", indent, status.symbol(), label));
                    if tree.result_keys().len() > 1 {
                        let results: Vec<String> = leaf
                            .results
                            .iter()
                            .map(|(key, s)| format!("{}:{}", key, s.symbol()))
                            .collect();
                        out.push_str(&format!("  [{}]", results.join(" ")));
                    }
                    if !leaf.remark.is_empty() {
                        out.push_str(&format!("  # {}", leaf.remark));
                    }
                    out.push('\n');
                }
                Node::Internal(_) => {
                    let badge = session
                        .node_counts(id)
                        .map(|counts| counts.badge())
                        .unwrap_or_default();
                    out.push_str(&format!("{}{} {} ({})\n", indent, status.symbol(), label, badge));
                    let children: Vec<&Node> = tree.children(id).collect();
                    stack.extend(children.into_iter().rev());
                }
            }
        }

        // Summary
        let summary = session.summary();
        out.push_str(&"-".repeat(60));
        out.push('\n');
        out.push_str(&format!(
            "  {} leaves: {} passed, {} failed, {} skipped, {} untested ({}% done)\n",
            summary.total,
            summary.pass,
            summary.fail,
            summary.skipped,
            summary.untested,
            summary.percent_done()
        ));
        if session.filter().is_filtering() {
            out.push_str(&format!(
                "  {} of {} leaves visible\n",
                session.filter().visible_leaf_count(tree),
                summary.total
            ));
        }

        out.push('\n');
        out
    }
}

/// Escape special XML characters
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Dimension, DimensionSchema, ResultDimension};

    fn make_session() -> Session {
        let schema = DimensionSchema::new(vec![
            Dimension::new("Env", "env", ["local", "remote"]),
            Dimension::new("Platform", "platform", ["native", "docker"]),
        ]);
        let mut session = Session::new(schema).unwrap().with_name("Integration <Matrix>");
        session.mark_status("local.native", Status::Pass).unwrap();
        session.mark_status("local.docker", Status::Fail).unwrap();
        session.set_remark("local.docker", "connection timeout").unwrap();
        session.skip_subtree("remote.docker").unwrap();
        session
    }

    #[test]
    fn test_junit_xml_output() {
        let session = make_session();
        let xml = Reporter::to_junit_xml(&session.snapshot());

        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<testsuites tests=\"4\" failures=\"1\" skipped=\"2\""));
        assert!(xml.contains("name=\"Integration &lt;Matrix&gt;\""));
        assert!(xml.contains("name=\"local.native\" time=\"0.000\" />"));
        assert!(xml.contains("<failure message=\"connection timeout\" />"));
        assert!(xml.contains("<skipped message=\"skipped\" />"));
        assert!(xml.contains("<skipped message=\"untested\" />"));
    }

    #[test]
    fn test_junit_one_case_per_result_key() {
        let mut session = make_session();
        session
            .set_result_dimensions(vec![
                ResultDimension::new("Backend", "backend").unwrap(),
                ResultDimension::new("Frontend", "frontend").unwrap(),
            ])
            .unwrap();

        let xml = Reporter::to_junit_xml(&session.snapshot());
        assert!(xml.contains("tests=\"8\""));
        assert!(xml.contains("name=\"local.native [backend]\""));
        assert!(xml.contains("name=\"local.native [frontend]\""));
    }

    #[test]
    fn test_terminal_output() {
        let session = make_session();
        let terminal = Reporter::to_terminal(&session);

        assert!(terminal.contains("Matrix: Integration <Matrix>"));
        assert!(terminal.contains("✗ local (1✗ 1✓)"));
        assert!(terminal.contains("    ✓ native"));
        assert!(terminal.contains("✗ docker  # connection timeout"));
        assert!(terminal.contains("4 leaves: 1 passed, 1 failed, 1 skipped, 1 untested (75% done)"));
        assert!(!terminal.contains("visible"));
    }

    #[test]
    fn test_terminal_hides_filtered_nodes() {
        let mut session = make_session();
        session.set_filter_value("env", "remote", false).unwrap();

        let terminal = Reporter::to_terminal(&session);
        assert!(terminal.contains("local"));
        assert!(!terminal.contains("remote"));
        assert!(terminal.contains("2 of 4 leaves visible"));
    }

    #[test]
    fn test_xml_escaping() {
        assert_eq!(xml_escape("<test>"), "&lt;test&gt;");
        assert_eq!(xml_escape("a & b"), "a &amp; b");
        assert_eq!(xml_escape("\"quoted\""), "&quot;quoted&quot;");
    }

    #[test]
    fn test_report_format_parsing() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("yml".parse::<ReportFormat>().unwrap(), ReportFormat::Yaml);
        assert_eq!("xml".parse::<ReportFormat>().unwrap(), ReportFormat::JUnit);
        assert_eq!(
            "terminal".parse::<ReportFormat>().unwrap(),
            ReportFormat::Terminal
        );
        assert!("tap".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::JUnit.to_string(), "junit");
    }

    #[test]
    fn test_report_dispatches_correctly() {
        let session = make_session();

        let json = Reporter::report(&session, ReportFormat::Json).unwrap();
        assert!(json.contains("\"local.docker\""));

        let yaml = Reporter::report(&session, ReportFormat::Yaml).unwrap();
        assert!(yaml.contains("local.docker"));

        let junit = Reporter::report(&session, ReportFormat::JUnit).unwrap();
        assert!(junit.contains("<?xml"));

        let terminal = Reporter::report(&session, ReportFormat::Terminal).unwrap();
        assert!(terminal.contains("Matrix:"));
    }
}
