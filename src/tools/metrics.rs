//! OpenSearch domain tools: ARN parsing and metric listing

use super::{Tool, ToolError};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// Pattern for domain ARNs: arn:aws:es:region:account:domain/name
static DOMAIN_ARN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^arn:aws:es:(.*?):(.*?):domain/(.*)$").expect("Invalid domain ARN regex"));

/// Components of an OpenSearch domain ARN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDetails {
    pub domain_name: String,
    pub domain_arn: String,
    pub region: String,
    pub account_id: String,
}

/// Parse `arn:aws:es:<region>:<account_id>:domain/<domain_name>`
pub fn parse_domain_arn(domain_arn: &str) -> Result<DomainDetails, ToolError> {
    let invalid = || {
        ToolError::InvalidInput(format!(
            "The ARN '{domain_arn}' does not match the expected format: \
             arn:aws:es:<region>:<account_id>:domain/<domain_name>"
        ))
    };
    let caps = DOMAIN_ARN.captures(domain_arn).ok_or_else(invalid)?;
    let group = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_string();

    let details = DomainDetails {
        domain_name: group(3),
        domain_arn: domain_arn.to_string(),
        region: group(1),
        account_id: group(2),
    };
    if details.domain_name.is_empty() {
        return Err(invalid());
    }
    Ok(details)
}

/// Source of metric names for a domain
pub trait MetricCatalog: Send + Sync {
    fn list_metrics(&self, domain: &DomainDetails) -> Result<Vec<String>, ToolError>;
}

/// Metric names held in memory, keyed by domain name.
///
/// Domains without their own entry fall back to the default list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticMetricCatalog {
    #[serde(default)]
    pub default: Vec<String>,
    #[serde(default)]
    pub domains: BTreeMap<String, Vec<String>>,
}

impl StaticMetricCatalog {
    /// Namespace-wide metrics every domain publishes
    pub fn standard() -> Self {
        let default = [
            "ClusterStatus.green",
            "ClusterStatus.yellow",
            "ClusterStatus.red",
            "CPUUtilization",
            "FreeStorageSpace",
            "JVMMemoryPressure",
            "SearchableDocuments",
            "SearchLatency",
            "IndexingLatency",
            "Nodes",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
        Self {
            default,
            domains: BTreeMap::new(),
        }
    }

    /// Load a catalog from a JSON file of the form
    /// `{"default": [...], "domains": {"name": [...]}}`
    pub fn from_file(path: &Path) -> Result<Self, ToolError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ToolError::Execution(format!("Failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ToolError::Execution(format!("Invalid metric catalog {}: {e}", path.display())))
    }
}

impl MetricCatalog for StaticMetricCatalog {
    fn list_metrics(&self, domain: &DomainDetails) -> Result<Vec<String>, ToolError> {
        Ok(self
            .domains
            .get(&domain.domain_name)
            .unwrap_or(&self.default)
            .clone())
    }
}

fn domain_arn_arg(args: &Map<String, Value>) -> Result<&str, ToolError> {
    args.get("domain_arn")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidInput("missing required argument 'domain_arn'".to_string()))
}

fn domain_arn_schema() -> Value {
    json!({
        "type": "object",
        "required": ["domain_arn"],
        "properties": {
            "domain_arn": {
                "type": "string",
                "description": "The full Amazon ARN of the domain."
            }
        }
    })
}

/// Lists metric names for a domain as a sorted, comma-separated string
pub struct ListMetricsTool {
    catalog: Arc<dyn MetricCatalog>,
}

impl ListMetricsTool {
    pub fn new(catalog: Arc<dyn MetricCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ListMetricsTool {
    fn name(&self) -> &str {
        "ListMetricsForOpenSearchDomain"
    }

    fn description(&self) -> String {
        "Lists the metric names for an Amazon OpenSearch Service domain as a comma-separated string.".to_string()
    }

    fn input_schema(&self) -> Value {
        domain_arn_schema()
    }

    async fn run(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let domain = parse_domain_arn(domain_arn_arg(&args)?)?;
        tracing::info!(domain = %domain.domain_name, region = %domain.region, "Listing domain metrics");

        let mut names = self.catalog.list_metrics(&domain)?;
        names.sort();
        Ok(names.join(", "))
    }
}

/// Breaks a domain ARN into region, account and domain name
pub struct DescribeDomainArnTool;

#[async_trait]
impl Tool for DescribeDomainArnTool {
    fn name(&self) -> &str {
        "DescribeDomainArn"
    }

    fn description(&self) -> String {
        "Parses an Amazon OpenSearch Service domain ARN into its region, account id and domain name.".to_string()
    }

    fn input_schema(&self) -> Value {
        domain_arn_schema()
    }

    async fn run(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let domain = parse_domain_arn(domain_arn_arg(&args)?)?;
        serde_json::to_string(&domain).map_err(|e| ToolError::Execution(e.to_string()))
    }
}
