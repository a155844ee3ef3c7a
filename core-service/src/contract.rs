//! # Contract Clients
//!
//! [`SimbaContract`] and [`SimbaContractBlocking`] bind a facade client to one
//! contract of one application. The contract metadata is fetched once when
//! the client is built, and every call or submission is checked against it
//! before anything is sent.
//!
//! ```ignore
//! let contract = simba.smart_contract_client("my_app", "my_api", &opts).await?;
//! let person = contract.call_method("getPerson", &args, &opts).await?;
//! ```

use futures::stream::BoxStream;
use serde_json::{Map, Value};
use std::path::Path;

use crate::client::{CallOptions, ContractSubmission, Simba, SimbaBlocking};
use crate::error::Result;
use crate::filter::SearchFilter;
use crate::pager::PageIter;
use crate::params::ParamChecker;

/// Async client for a single contract.
#[derive(Debug, Clone)]
pub struct SimbaContract {
    simba: Simba,
    app: String,
    contract: String,
    checker: ParamChecker,
}

impl SimbaContract {
    /// Bind `simba` to `contract` in `app`, fetching the contract metadata.
    pub async fn new(
        simba: Simba,
        app: impl Into<String>,
        contract: impl Into<String>,
        opts: &CallOptions,
    ) -> Result<Self> {
        let app = app.into();
        let contract = contract.into();
        let checker = simba.param_checker(&app, &contract, opts).await?;
        Ok(Self::with_checker(simba, app, contract, checker))
    }

    /// Bind with metadata that is already at hand.
    pub fn with_checker(
        simba: Simba,
        app: impl Into<String>,
        contract: impl Into<String>,
        checker: ParamChecker,
    ) -> Self {
        Self {
            simba,
            app: app.into(),
            contract: contract.into(),
            checker,
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn checker(&self) -> &ParamChecker {
        &self.checker
    }

    /// Validate `args` and query the getter `method`.
    pub async fn call_method(
        &self,
        method: &str,
        args: &Map<String, Value>,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.checker.validate_params(method, args)?;
        self.simba
            .call_contract_method(&self.app, &self.contract, method, args, opts)
            .await
    }

    /// Validate the inputs and submit a transaction to `method`.
    pub async fn submit_method(
        &self,
        method: &str,
        submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        let submission = submission.validated_with(self.checker.clone());
        self.simba
            .submit_contract_method(&self.app, &self.contract, method, submission, opts)
            .await
    }

    /// Like [`submit_method`](Self::submit_method), responding once the
    /// transaction is mined.
    pub async fn submit_method_sync(
        &self,
        method: &str,
        submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        let submission = submission.validated_with(self.checker.clone());
        self.simba
            .submit_contract_method_sync(&self.app, &self.contract, method, submission, opts)
            .await
    }

    pub fn list_method_transactions(
        &self,
        method: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<BoxStream<'_, Result<Vec<Value>>>> {
        self.simba
            .list_method_transactions(&self.app, &self.contract, method, filter, opts)
    }

    pub async fn get_method_transactions(
        &self,
        method: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.simba
            .get_method_transactions(&self.app, &self.contract, method, filter, opts)
            .await
    }

    pub fn list_events(
        &self,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<BoxStream<'_, Result<Vec<Value>>>> {
        self.simba.list_events(&self.app, &self.contract, filter, opts)
    }

    pub async fn validate_bundle_hash(
        &self,
        bundle_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.simba
            .validate_bundle(&self.app, &self.contract, bundle_hash, opts)
            .await
    }

    pub async fn get_bundle(
        &self,
        bundle_hash: &str,
        location: impl AsRef<Path>,
        opts: &CallOptions,
    ) -> Result<u64> {
        self.simba
            .get_bundle(&self.app, &self.contract, bundle_hash, location, opts)
            .await
    }

    pub async fn get_bundle_manifest(
        &self,
        bundle_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.simba
            .get_manifest_for_bundle_from_bundle_hash(&self.app, &self.contract, bundle_hash, opts)
            .await
    }

    pub async fn get_bundle_file(
        &self,
        bundle_hash: &str,
        file_name: &str,
        location: impl AsRef<Path>,
        opts: &CallOptions,
    ) -> Result<u64> {
        self.simba
            .get_bundle_file(&self.app, &self.contract, bundle_hash, file_name, location, opts)
            .await
    }
}

/// Blocking client for a single contract.
#[derive(Debug, Clone)]
pub struct SimbaContractBlocking {
    simba: SimbaBlocking,
    app: String,
    contract: String,
    checker: ParamChecker,
}

impl SimbaContractBlocking {
    pub fn new(
        simba: SimbaBlocking,
        app: impl Into<String>,
        contract: impl Into<String>,
        opts: &CallOptions,
    ) -> Result<Self> {
        let app = app.into();
        let contract = contract.into();
        let checker = simba.param_checker(&app, &contract, opts)?;
        Ok(Self::with_checker(simba, app, contract, checker))
    }

    pub fn with_checker(
        simba: SimbaBlocking,
        app: impl Into<String>,
        contract: impl Into<String>,
        checker: ParamChecker,
    ) -> Self {
        Self {
            simba,
            app: app.into(),
            contract: contract.into(),
            checker,
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn checker(&self) -> &ParamChecker {
        &self.checker
    }

    pub fn call_method(
        &self,
        method: &str,
        args: &Map<String, Value>,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.checker.validate_params(method, args)?;
        self.simba
            .call_contract_method(&self.app, &self.contract, method, args, opts)
    }

    pub fn submit_method(
        &self,
        method: &str,
        submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        let submission = submission.validated_with(self.checker.clone());
        self.simba
            .submit_contract_method(&self.app, &self.contract, method, submission, opts)
    }

    pub fn submit_method_sync(
        &self,
        method: &str,
        submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        let submission = submission.validated_with(self.checker.clone());
        self.simba
            .submit_contract_method_sync(&self.app, &self.contract, method, submission, opts)
    }

    pub fn list_method_transactions(
        &self,
        method: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<PageIter<'_>> {
        self.simba
            .list_method_transactions(&self.app, &self.contract, method, filter, opts)
    }

    pub fn get_method_transactions(
        &self,
        method: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.simba
            .get_method_transactions(&self.app, &self.contract, method, filter, opts)
    }

    pub fn list_events(
        &self,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<PageIter<'_>> {
        self.simba.list_events(&self.app, &self.contract, filter, opts)
    }

    pub fn validate_bundle_hash(&self, bundle_hash: &str, opts: &CallOptions) -> Result<Value> {
        self.simba
            .validate_bundle(&self.app, &self.contract, bundle_hash, opts)
    }

    pub fn get_bundle(
        &self,
        bundle_hash: &str,
        location: impl AsRef<Path>,
        opts: &CallOptions,
    ) -> Result<u64> {
        self.simba
            .get_bundle(&self.app, &self.contract, bundle_hash, location, opts)
    }

    pub fn get_bundle_manifest(&self, bundle_hash: &str, opts: &CallOptions) -> Result<Value> {
        self.simba
            .get_manifest_for_bundle_from_bundle_hash(&self.app, &self.contract, bundle_hash, opts)
    }

    pub fn get_bundle_file(
        &self,
        bundle_hash: &str,
        file_name: &str,
        location: impl AsRef<Path>,
        opts: &CallOptions,
    ) -> Result<u64> {
        self.simba
            .get_bundle_file(&self.app, &self.contract, bundle_hash, file_name, location, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimbaError;
    use crate::filter::FilterOp;
    use crate::params::ParamError;
    use crate::test_support::{context, StubTransport};
    use futures::TryStreamExt;
    use serde_json::json;

    const CONTRACT_PATH: &str = "/v2/apps/app/contract/c/";

    fn metadata_response() -> String {
        json!({
            "name": "c",
            "metadata": {
                "contract": {
                    "methods": {
                        "store": {"params": [{"name": "value", "type": "uint256"}]},
                        "getValue": {"params": [{"name": "key", "type": "bytes32"}]}
                    }
                }
            }
        })
        .to_string()
    }

    fn inputs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("inputs must be an object"),
        }
    }

    async fn contract(stub: &StubTransport) -> SimbaContract {
        stub.route(CONTRACT_PATH, 200, &metadata_response());
        Simba::new(context(stub))
            .smart_contract_client("app", "c", &CallOptions::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_metadata_is_fetched_once() {
        let stub = StubTransport::new();
        stub.route("/v2/apps/app/contract/c/store/", 200, r#"{"id":"t1"}"#);
        let contract = contract(&stub).await;

        for value in [1, 2] {
            let submission = ContractSubmission::new(inputs(json!({"value": value})));
            contract
                .submit_method("store", submission, &CallOptions::new())
                .await
                .unwrap();
        }

        assert_eq!(contract.app(), "app");
        assert_eq!(stub.requests_to(CONTRACT_PATH).len(), 1);
        assert_eq!(stub.requests_to("/v2/apps/app/contract/c/store/").len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_submission_is_not_sent() {
        let stub = StubTransport::new();
        stub.route("/v2/apps/app/sync/contract/c/store/", 200, r#"{"id":"t1"}"#);
        let contract = contract(&stub).await;

        let err = contract
            .submit_method_sync(
                "store",
                ContractSubmission::new(inputs(json!({"value": -1}))),
                &CallOptions::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SimbaError::Validation(ParamError::Negative { .. })
        ));
        assert!(stub
            .requests_to("/v2/apps/app/sync/contract/c/store/")
            .is_empty());

        contract
            .submit_method_sync(
                "store",
                ContractSubmission::new(inputs(json!({"value": 1}))),
                &CallOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            stub.requests_to("/v2/apps/app/sync/contract/c/store/").len(),
            1
        );
    }

    #[tokio::test]
    async fn test_call_method_checks_args() {
        let stub = StubTransport::new();
        stub.route("/v2/apps/app/contract/c/getValue/", 200, r#"{"value":"x"}"#);
        let contract = contract(&stub).await;

        let err = contract
            .call_method("getValue", &inputs(json!({"key": "plain"})), &CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SimbaError::Validation(ParamError::NotHex { .. })));

        let value = contract
            .call_method("getValue", &inputs(json!({"key": "0x01"})), &CallOptions::new())
            .await
            .unwrap();
        assert_eq!(value["value"], "x");
        assert_eq!(stub.requests_to("/v2/apps/app/contract/c/getValue/").len(), 1);
    }

    #[tokio::test]
    async fn test_events_and_method_transactions() {
        let stub = StubTransport::new();
        stub.route(
            "/v2/apps/app/contract/c/events/",
            200,
            r#"{"results":[{"event_name":"Stored"}],"next":null}"#,
        );
        stub.route(
            "/v2/apps/app/contract/c/store/",
            200,
            r#"{"results":[{"id":"t1"},{"id":"t2"}],"next":null}"#,
        );
        let contract = contract(&stub).await;
        let filter = SearchFilter::new().filter("event_name", FilterOp::Eq, "Stored");

        let pages: Vec<Vec<Value>> = contract
            .list_events(Some(&filter), &CallOptions::new())
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(pages[0][0]["event_name"], "Stored");

        let txns = contract
            .get_method_transactions("store", None, &CallOptions::new())
            .await
            .unwrap();
        assert_eq!(txns.len(), 2);
    }

    #[tokio::test]
    async fn test_bundle_operations() {
        let stub = StubTransport::new();
        stub.route("/v2/apps/app/validate/c/h1/", 200, r#"{"errors":[]}"#);
        stub.route("/v2/apps/app/contract/c/bundle/h1/filename/a.txt/", 200, "hello");
        stub.route(
            "/v2/apps/app/contract/c/bundle/h1/manifest/",
            200,
            r#"{"files":[{"name":"a.txt"}]}"#,
        );
        let contract = contract(&stub).await;
        let opts = CallOptions::new();

        let report = contract.validate_bundle_hash("h1", &opts).await.unwrap();
        assert_eq!(report["errors"], json!([]));

        let manifest = contract.get_bundle_manifest("h1", &opts).await.unwrap();
        assert_eq!(manifest["files"][0]["name"], "a.txt");

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.txt");
        let written = contract
            .get_bundle_file("h1", "a.txt", &target, &opts)
            .await
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
    }

    #[test]
    fn test_blocking_contract_client() {
        let stub = StubTransport::new();
        stub.route(CONTRACT_PATH, 200, &metadata_response());
        stub.route("/v2/apps/app/contract/c/store/", 200, r#"{"id":"t1"}"#);
        let contract = SimbaBlocking::new(context(&stub))
            .smart_contract_client("app", "c", &CallOptions::new())
            .unwrap();

        let err = contract
            .submit_method(
                "store",
                ContractSubmission::new(Map::new()),
                &CallOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SimbaError::Validation(ParamError::MissingParam(_))
        ));

        let result = contract
            .submit_method(
                "store",
                ContractSubmission::new(inputs(json!({"value": "42"}))),
                &CallOptions::new(),
            )
            .unwrap();
        assert_eq!(result["id"], "t1");
        assert_eq!(stub.requests_to(CONTRACT_PATH).len(), 1);
    }
}
