//! Dashboard creation, the one operation that requires human approval

use super::metrics::parse_domain_arn;
use super::{Tool, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Deserialize)]
struct CreateDashboardInput {
    dashboard_name: String,
    domain_arn: String,
    metrics: Vec<String>,
}

/// Writes a CloudWatch-style dashboard definition into a directory
pub struct CreateDashboardTool {
    dir: PathBuf,
}

impl CreateDashboardTool {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

fn validate_name(name: &str) -> Result<(), ToolError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ToolError::InvalidInput(format!(
            "dashboard_name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ToolError::InvalidInput(format!(
            "dashboard_name '{name}' may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

#[async_trait]
impl Tool for CreateDashboardTool {
    fn name(&self) -> &str {
        "CreateDashboard"
    }

    fn description(&self) -> String {
        "Creates a CloudWatch dashboard graphing the given metrics for an Amazon OpenSearch Service domain. \
         Requires approval from the human operator before it runs."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["dashboard_name", "domain_arn", "metrics"],
            "properties": {
                "dashboard_name": {
                    "type": "string",
                    "description": "Name of the dashboard (letters, digits, '-' and '_')"
                },
                "domain_arn": {
                    "type": "string",
                    "description": "The full Amazon ARN of the domain."
                },
                "metrics": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Metric names to graph, one widget each"
                }
            }
        })
    }

    async fn run(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let input: CreateDashboardInput =
            serde_json::from_value(Value::Object(args)).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        validate_name(&input.dashboard_name)?;
        if input.metrics.is_empty() {
            return Err(ToolError::InvalidInput("metrics must not be empty".to_string()));
        }
        let domain = parse_domain_arn(&input.domain_arn)?;

        let widgets: Vec<Value> = input
            .metrics
            .iter()
            .map(|metric| {
                json!({
                    "type": "metric",
                    "properties": {
                        "title": metric,
                        "region": domain.region,
                        "metrics": [["AWS/ES", metric, "DomainName", domain.domain_name, "ClientId", domain.account_id]]
                    }
                })
            })
            .collect();
        let body = json!({
            "name": input.dashboard_name,
            "domain_arn": domain.domain_arn,
            "created_at": chrono::Utc::now().to_rfc3339(),
            "widgets": widgets,
        });

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ToolError::Execution(format!("Failed to create {}: {e}", self.dir.display())))?;
        let path = self.dir.join(format!("{}.json", input.dashboard_name));
        let rendered = serde_json::to_string_pretty(&body).map_err(|e| ToolError::Execution(e.to_string()))?;
        tokio::fs::write(&path, rendered)
            .await
            .map_err(|e| ToolError::Execution(format!("Failed to write {}: {e}", path.display())))?;

        tracing::info!(dashboard = %input.dashboard_name, path = %path.display(), "Dashboard created");
        Ok(format!(
            "Created dashboard '{}' with {} widget(s) at {}",
            input.dashboard_name,
            input.metrics.len(),
            path.display()
        ))
    }
}
