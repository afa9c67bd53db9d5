//! Console rendering of a finished run.

use owo_colors::{OwoColorize, Style};
use pgcompare::{Difference, RunReport, RunSummary, Severity, SeverityCounts};
use std::fmt::{Display, Write};

pub struct Renderer {
    color: bool,
    top: usize,
    details: bool,
}

impl Renderer {
    pub fn new(color: bool, top: usize, details: bool) -> Self {
        Self {
            color,
            top,
            details,
        }
    }

    fn paint(&self, text: impl Display, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn severity_style(severity: Severity) -> Style {
        match severity {
            Severity::Critical => Style::new().red().bold(),
            Severity::Warning => Style::new().yellow(),
            Severity::Info => Style::new().dimmed(),
        }
    }

    fn counts(&self, counts: &SeverityCounts) -> String {
        Severity::ALL
            .iter()
            .map(|severity| {
                let n = counts.get(*severity);
                let text = format!("{} {}", severity, n);
                if n == 0 {
                    text
                } else {
                    self.paint(text, Self::severity_style(*severity))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn difference(&self, difference: &Difference) -> String {
        let severity = difference.severity();
        format!(
            "{} {} {}",
            self.paint(
                format!("[{}]", severity.as_str().to_uppercase()),
                Self::severity_style(severity)
            ),
            difference.kind,
            difference
        )
    }

    pub fn render(&self, report: &RunReport) -> String {
        let summary = report.summary();
        let mut out = String::new();

        let _ = writeln!(
            out,
            "{} {} (schema {}, {} tables)",
            self.paint("base", Style::new().bold()),
            report.base,
            report.base.schema,
            report.base_tables
        );
        let _ = writeln!(out);

        let width = summary
            .targets
            .iter()
            .map(|t| t.target.display_name.len())
            .max()
            .unwrap_or(0);

        for (outcome, target) in report.outcomes.iter().zip(&summary.targets) {
            let name = format!("{:width$}", target.target.display_name, width = width);
            if target.success {
                let status = if target.difference_count == 0 {
                    self.paint("ok  ", Style::new().green())
                } else {
                    self.paint("diff", Style::new().yellow())
                };
                let _ = writeln!(
                    out,
                    "  {} {}  {} differences ({})",
                    status,
                    name,
                    target.difference_count,
                    self.counts(&target.severities)
                );
                if self.details {
                    for difference in &outcome.differences {
                        let _ = writeln!(out, "         {}", self.difference(difference));
                    }
                }
            } else {
                let cause = outcome
                    .result
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                let _ = writeln!(
                    out,
                    "  {} {}  {}",
                    self.paint("FAIL", Style::new().red().bold()),
                    name,
                    cause
                );
            }
        }

        self.render_summary(&mut out, &summary, report);
        out
    }

    fn render_summary(&self, out: &mut String, summary: &RunSummary, report: &RunReport) {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} {} targets, {} succeeded, {} failed, {} differences ({}) in {:.1}s",
            self.paint("summary", Style::new().bold()),
            summary.total,
            summary.succeeded,
            summary.failed,
            summary.total_differences,
            self.counts(&summary.severities),
            report.elapsed.as_secs_f64()
        );

        if !summary.by_kind.is_empty() {
            let kinds = summary
                .by_kind
                .iter()
                .map(|(kind, n)| format!("{} {}", kind, n))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "  by kind: {}", kinds);
        }

        if !summary.failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", self.paint("failed targets", Style::new().bold()));
            for failure in &summary.failures {
                let _ = writeln!(out, "  {} [{}] {}", failure.target, failure.kind, failure.cause);
            }
        }

        let top = summary.top_problems(self.top);
        if !top.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{}",
                self.paint(
                    format!("top {} problem targets", top.len()),
                    Style::new().bold()
                )
            );
            for (rank, problem) in top.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {:>2}. {}  {} ({})",
                    rank + 1,
                    problem.target,
                    problem.difference_count,
                    self.counts(&problem.severities)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcompare::{
        Credentials, DatabaseEndpoint, DifferenceKind, Error, RunResult, TargetOutcome,
    };
    use std::time::Duration;

    fn endpoint(name: &str, host: &str) -> DatabaseEndpoint {
        DatabaseEndpoint::new(
            name,
            format!("postgres://{}:5432/app", host),
            Credentials::new("app", None),
            None,
        )
        .unwrap()
    }

    fn difference(
        base: &DatabaseEndpoint,
        target: &DatabaseEndpoint,
        kind: DifferenceKind,
        table: &str,
        item: &str,
        description: &str,
    ) -> Difference {
        Difference {
            kind,
            base: base.identity(),
            target: target.identity(),
            schema_name: "public".to_string(),
            table_name: table.to_string(),
            item_name: item.to_string(),
            description: description.to_string(),
            base_value: None,
            target_value: None,
        }
    }

    fn report() -> RunReport {
        let base = endpoint("prod", "prod-db");
        let staging = endpoint("staging", "staging-db");
        let replica = endpoint("replica", "10.0.0.7");
        let qa = endpoint("qa", "qa-db");

        let differences = vec![
            difference(
                &base,
                &staging,
                DifferenceKind::MissingTable,
                "orders",
                "orders",
                "table 'orders' is missing in target 'staging(staging-db:5432)'",
            ),
            difference(
                &base,
                &staging,
                DifferenceKind::ExtraIndex,
                "users",
                "users_tmp_idx",
                "index 'users_tmp_idx' on table 'users' exists only in target 'staging(staging-db:5432)' (columns: email, method: btree, unique: no)",
            ),
        ];

        let outcomes = vec![
            TargetOutcome {
                result: RunResult::succeeded(qa.identity(), 0, Duration::from_millis(40)),
                endpoint: qa,
                differences: Vec::new(),
            },
            TargetOutcome {
                result: RunResult::succeeded(staging.identity(), 2, Duration::from_millis(80)),
                endpoint: staging,
                differences,
            },
            TargetOutcome {
                result: RunResult::failed(
                    replica.identity(),
                    Error::Timeout {
                        endpoint: replica.display_name().to_string(),
                        after: Duration::from_secs(300),
                    },
                    Duration::from_secs(300),
                ),
                endpoint: replica,
                differences: Vec::new(),
            },
        ];

        RunReport {
            base: base.identity(),
            base_tables: 12,
            outcomes,
            elapsed: Duration::from_millis(2500),
        }
    }

    #[test]
    fn test_render_plain() {
        let out = Renderer::new(false, 10, false).render(&report());
        insta::assert_snapshot!(out, @r"
        base prod(prod-db:5432) (schema public, 12 tables)

          ok   qa(qa-db:5432)            0 differences (critical 0, warning 0, info 0)
          diff staging(staging-db:5432)  2 differences (critical 1, warning 0, info 1)
          FAIL replica(10.0.0.7:5432)    replica(10.0.0.7:5432) did not complete within 300s

        summary 3 targets, 2 succeeded, 1 failed, 2 differences (critical 1, warning 0, info 1) in 2.5s
          by kind: MISSING_TABLE 1, EXTRA_INDEX 1

        failed targets
          replica(10.0.0.7:5432) [timeout] replica(10.0.0.7:5432) did not complete within 300s

        top 1 problem targets
           1. staging(staging-db:5432)  2 (critical 1, warning 0, info 1)
        ");
    }

    #[test]
    fn test_render_details() {
        let out = Renderer::new(false, 10, true).render(&report());
        let detail_lines: Vec<_> = out
            .lines()
            .filter(|l| l.starts_with("         "))
            .map(str::trim)
            .collect();
        insta::assert_snapshot!(detail_lines.join("\n"), @r"
        [CRITICAL] MISSING_TABLE orders.orders - table 'orders' is missing in target 'staging(staging-db:5432)'
        [INFO] EXTRA_INDEX users.users_tmp_idx - index 'users_tmp_idx' on table 'users' exists only in target 'staging(staging-db:5432)' (columns: email, method: btree, unique: no)
        ");
    }

    #[test]
    fn test_render_top_limit() {
        let out = Renderer::new(false, 0, false).render(&report());
        assert!(!out.contains("problem targets"));
    }

    #[test]
    fn test_render_color() {
        let out = Renderer::new(true, 10, false).render(&report());
        assert!(out.contains("\u{1b}["));
    }
}
