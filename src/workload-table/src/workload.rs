//! Workload variants described as data for the generic table engine.

use std::fmt;

use crate::orchestrator::PrimaryRow;
use crate::query::QueryTemplate;
use crate::series::{SecondaryResults, label_equals, label_of, value_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    DaemonSet,
    Job,
    StatefulSet,
}

impl WorkloadKind {
    pub fn all() -> [WorkloadKind; 3] {
        [Self::DaemonSet, Self::Job, Self::StatefulSet]
    }

    pub fn spec(self) -> WorkloadSpec {
        match self {
            Self::DaemonSet => WorkloadSpec::daemon_sets(),
            Self::Job => WorkloadSpec::jobs(),
            Self::StatefulSet => WorkloadSpec::stateful_sets(),
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DaemonSet => write!(f, "DaemonSet"),
            Self::Job => write!(f, "Job"),
            Self::StatefulSet => write!(f, "StatefulSet"),
        }
    }
}

/// A derived cell value, projected from the secondary results at render time.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Replicas { ready: u64, total: u64 },
    Flag(bool),
    Owner { kind: String, name: String },
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replicas { ready, total } => write!(f, "{ready}/{total}"),
            Self::Flag(true) => write!(f, "Yes"),
            Self::Flag(false) => write!(f, "No"),
            Self::Owner { kind, name } if kind.is_empty() && name.is_empty() => Ok(()),
            Self::Owner { kind, name } => write!(f, "{kind} - {name}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Extracts one derived field for a row. The last argument is the
/// workload's identity label, the join key into the secondary results.
pub type Extractor = fn(&SecondaryResults, &PrimaryRow, &str) -> FieldValue;

#[derive(Clone, Copy)]
pub struct DerivedField {
    pub name: &'static str,
    pub extract: Extractor,
}

impl fmt::Debug for DerivedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedField")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    Identity,
    Namespace,
    Cluster,
    /// Named derived field
    Derived(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub header: &'static str,
    pub source: ColumnSource,
    /// Percentage of the table width
    pub width: u16,
}

impl ColumnSpec {
    pub const fn new(header: &'static str, source: ColumnSource, width: u16) -> Self {
        Self {
            header,
            source,
            width,
        }
    }
}

/// One panel of the expanded detail view. The query may reference
/// `$identity`, `$namespace` and `$cluster`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelTemplate {
    pub title: &'static str,
    pub query: QueryTemplate,
}

/// Everything that distinguishes one workload table from another.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub kind: WorkloadKind,
    pub title: &'static str,
    /// Label holding the row identity in both primary and secondary results
    pub identity_label: &'static str,
    pub link_segment: &'static str,
    pub primary: QueryTemplate,
    pub row_queries: Vec<QueryTemplate>,
    pub columns: Vec<ColumnSpec>,
    pub derived: Vec<DerivedField>,
    pub panels: Vec<PanelTemplate>,
}

impl WorkloadSpec {
    pub fn daemon_sets() -> Self {
        Self {
            kind: WorkloadKind::DaemonSet,
            title: "DaemonSets",
            identity_label: "daemonset",
            link_segment: "daemonsets",
            primary: QueryTemplate::instant(
                "daemonsets",
                r#"group(kube_daemonset_created{cluster="$cluster", namespace=~"$namespace", daemonset=~".*$search.*"}) by (daemonset, namespace)"#,
            ),
            row_queries: vec![
                QueryTemplate::instant(
                    "replicas",
                    r#"max(kube_daemonset_status_desired_number_scheduled{daemonset=~"$ids", cluster="$cluster"}) by (daemonset)"#,
                ),
                QueryTemplate::instant(
                    "replicas_ready",
                    r#"max(kube_daemonset_status_number_ready{daemonset=~"$ids", cluster="$cluster"}) by (daemonset)"#,
                ),
            ],
            columns: vec![
                ColumnSpec::new("DAEMONSET", ColumnSource::Identity, 40),
                ColumnSpec::new("NAMESPACE", ColumnSource::Namespace, 35),
                ColumnSpec::new("REPLICAS", ColumnSource::Derived("replicas"), 25),
            ],
            derived: vec![DerivedField {
                name: "replicas",
                extract: replicas,
            }],
            panels: vec![
                PanelTemplate {
                    title: "Desired",
                    query: QueryTemplate::instant(
                        "desired",
                        r#"max(kube_daemonset_status_desired_number_scheduled{daemonset="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
                PanelTemplate {
                    title: "Ready",
                    query: QueryTemplate::instant(
                        "ready",
                        r#"max(kube_daemonset_status_number_ready{daemonset="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
                PanelTemplate {
                    title: "Unavailable",
                    query: QueryTemplate::instant(
                        "unavailable",
                        r#"max(kube_daemonset_status_number_unavailable{daemonset="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
                PanelTemplate {
                    title: "Misscheduled",
                    query: QueryTemplate::instant(
                        "misscheduled",
                        r#"max(kube_daemonset_status_number_misscheduled{daemonset="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
            ],
        }
    }

    pub fn jobs() -> Self {
        Self {
            kind: WorkloadKind::Job,
            title: "Jobs",
            identity_label: "job_name",
            link_segment: "jobs",
            primary: QueryTemplate::instant(
                "jobs",
                r#"kube_job_info{cluster="$cluster", namespace=~"$namespace", job_name=~".*$search.*"}"#,
            ),
            row_queries: vec![
                QueryTemplate::instant(
                    "completed",
                    r#"max(kube_job_complete{job_name=~"$ids", condition="true", cluster="$cluster"}) by (job_name)"#,
                ),
                QueryTemplate::instant(
                    "owner",
                    r#"max(kube_job_owner{job_name=~"$ids", cluster="$cluster"}) by (job_name, owner_kind, owner_name)"#,
                ),
            ],
            columns: vec![
                ColumnSpec::new("JOB", ColumnSource::Identity, 35),
                ColumnSpec::new("NAMESPACE", ColumnSource::Namespace, 20),
                ColumnSpec::new("OWNER", ColumnSource::Derived("owner"), 30),
                ColumnSpec::new("COMPLETE", ColumnSource::Derived("complete"), 15),
            ],
            derived: vec![
                DerivedField {
                    name: "complete",
                    extract: completed,
                },
                DerivedField {
                    name: "owner",
                    extract: owner,
                },
            ],
            panels: vec![
                PanelTemplate {
                    title: "Active",
                    query: QueryTemplate::instant(
                        "active",
                        r#"max(kube_job_status_active{job_name="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
                PanelTemplate {
                    title: "Succeeded",
                    query: QueryTemplate::instant(
                        "succeeded",
                        r#"max(kube_job_status_succeeded{job_name="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
                PanelTemplate {
                    title: "Failed",
                    query: QueryTemplate::instant(
                        "failed",
                        r#"max(kube_job_status_failed{job_name="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
            ],
        }
    }

    pub fn stateful_sets() -> Self {
        Self {
            kind: WorkloadKind::StatefulSet,
            title: "StatefulSets",
            identity_label: "statefulset",
            link_segment: "statefulsets",
            primary: QueryTemplate::instant(
                "statefulsets",
                r#"group(kube_statefulset_created{cluster="$cluster", namespace=~"$namespace", statefulset=~".*$search.*"}) by (statefulset, namespace)"#,
            ),
            row_queries: vec![
                QueryTemplate::instant(
                    "replicas",
                    r#"max(kube_statefulset_status_replicas{statefulset=~"$ids", cluster="$cluster"}) by (statefulset)"#,
                ),
                QueryTemplate::instant(
                    "replicas_ready",
                    r#"max(kube_statefulset_status_replicas_ready{statefulset=~"$ids", cluster="$cluster"}) by (statefulset)"#,
                ),
            ],
            columns: vec![
                ColumnSpec::new("STATEFULSET", ColumnSource::Identity, 40),
                ColumnSpec::new("NAMESPACE", ColumnSource::Namespace, 35),
                ColumnSpec::new("REPLICAS", ColumnSource::Derived("replicas"), 25),
            ],
            derived: vec![DerivedField {
                name: "replicas",
                extract: replicas,
            }],
            panels: vec![
                PanelTemplate {
                    title: "Replicas",
                    query: QueryTemplate::instant(
                        "replicas",
                        r#"max(kube_statefulset_replicas{statefulset="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
                PanelTemplate {
                    title: "Ready",
                    query: QueryTemplate::instant(
                        "ready",
                        r#"max(kube_statefulset_status_replicas_ready{statefulset="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
                PanelTemplate {
                    title: "Current",
                    query: QueryTemplate::instant(
                        "current",
                        r#"max(kube_statefulset_status_replicas_current{statefulset="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
                PanelTemplate {
                    title: "Updated",
                    query: QueryTemplate::instant(
                        "updated",
                        r#"max(kube_statefulset_status_replicas_updated{statefulset="$identity", namespace="$namespace", cluster="$cluster"})"#,
                    ),
                },
            ],
        }
    }

    /// Detail-page path for a row: `<segment>/<namespace>/<identity>`.
    pub fn link_path(&self, row: &PrimaryRow) -> String {
        format!("{}/{}/{}", self.link_segment, row.namespace, row.identity)
    }

    pub fn derived_field(&self, name: &str) -> Option<&DerivedField> {
        self.derived.iter().find(|field| field.name == name)
    }
}

/// Missing and unparsable samples count as zero.
fn count(value: Option<f64>) -> u64 {
    value.filter(|v| v.is_finite() && *v > 0.0).map_or(0, |v| v as u64)
}

fn replicas(cache: &SecondaryResults, row: &PrimaryRow, key: &str) -> FieldValue {
    let matches = label_equals(key, &row.identity);
    FieldValue::Replicas {
        total: count(value_of(cache, "replicas", &matches)),
        ready: count(value_of(cache, "replicas_ready", &matches)),
    }
}

fn completed(cache: &SecondaryResults, row: &PrimaryRow, key: &str) -> FieldValue {
    let value = value_of(cache, "completed", label_equals(key, &row.identity));
    FieldValue::Flag(count(value) > 0)
}

fn owner(cache: &SecondaryResults, row: &PrimaryRow, key: &str) -> FieldValue {
    let matches = label_equals(key, &row.identity);
    FieldValue::Owner {
        kind: label_of(cache, "owner", &matches, "owner_kind")
            .unwrap_or_default()
            .to_string(),
        name: label_of(cache, "owner", &matches, "owner_name")
            .unwrap_or_default()
            .to_string(),
    }
}
