//! Deployment requests and the helpers that read a finished deployment.

use serde_json::{json, Map, Value};

const NO_STORAGE: &str = "no_storage";

/// What to deploy a design or artifact as.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploySpec {
    pub api_name: String,
    pub blockchain: String,
    pub storage: String,
    pub display_name: Option<String>,
    /// Constructor arguments
    pub args: Option<Map<String, Value>>,
}

impl DeploySpec {
    /// Deploy under `api_name` on `blockchain` without off-chain storage.
    pub fn new(api_name: impl Into<String>, blockchain: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            blockchain: blockchain.into(),
            storage: NO_STORAGE.to_string(),
            display_name: None,
            args: None,
        }
    }

    pub fn storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = storage.into();
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn args(mut self, args: Map<String, Value>) -> Self {
        self.args = Some(args);
        self
    }

    /// Request body for deploying into `app`. Empty display names and
    /// argument maps are left out.
    pub(crate) fn body(&self, app: &str) -> Value {
        let mut body = json!({
            "blockchain": self.blockchain,
            "storage": self.storage,
            "api_name": self.api_name,
            "app_name": app,
        });
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            body["display_name"] = json!(name);
        }
        if let Some(args) = self.args.as_ref().filter(|a| !a.is_empty()) {
            body["args"] = Value::Object(args.clone());
        }
        body
    }

    pub(crate) fn artifact_body(&self, app: &str, artifact_id: &str) -> Value {
        let mut body = self.body(app);
        body["artifact_id"] = json!(artifact_id);
        body
    }
}

/// A completed deployment and the primary contract it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployedContract {
    pub address: Option<String>,
    pub artifact_id: Option<String>,
    pub deployment: Value,
}

impl From<Value> for DeployedContract {
    fn from(deployment: Value) -> Self {
        Self {
            address: get_address(&deployment).map(str::to_string),
            artifact_id: get_deployed_artifact_id(&deployment).map(str::to_string),
            deployment,
        }
    }
}

/// Id of a deployment started from a design.
pub(crate) fn design_deployment_id(response: &Value) -> Option<&str> {
    response.get("deployment_id")?.as_str()
}

/// Id of a deployment started from an artifact.
pub(crate) fn artifact_deployment_id(response: &Value) -> Option<&str> {
    response.get("id")?.as_str()
}

/// Address of the primary contract in a deployment.
pub fn get_address(deployment: &Value) -> Option<&str> {
    deployment.get("primary")?.get("address")?.as_str()
}

/// Address of the contract called `name`, checking the primary contract
/// first and then the deployment's library and dependency list.
pub fn get_address_by_name<'v>(deployment: &'v Value, name: &str) -> Option<&'v str> {
    let has_name = |entry: &&Value| entry.get("name").and_then(Value::as_str) == Some(name);

    if let Some(primary) = deployment.get("primary").filter(has_name) {
        return primary.get("address")?.as_str();
    }
    deployment
        .get("deployment")?
        .as_array()?
        .iter()
        .find(has_name)?
        .get("address")?
        .as_str()
}

/// Artifact id of the primary contract in a deployment.
pub fn get_deployed_artifact_id(deployment: &Value) -> Option<&str> {
    deployment.get("primary")?.get("deployed_artifact_id")?.as_str()
}
