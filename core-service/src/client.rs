//! # Facade Clients
//!
//! [`Simba`] and [`SimbaBlocking`] wrap a shared [`SimbaContext`] and expose
//! the platform operations applications use most: identity, organisations,
//! applications, transactions, contract methods, bundles and deployments.
//!
//! Every operation takes [`CallOptions`] to override the login or the
//! connection settings for that call only.
//!
//! ```ignore
//! use core_service::{CallOptions, Simba};
//!
//! let simba = Simba::from_env()?;
//! let me = simba.whoami(&CallOptions::default()).await?;
//! ```

use bridge_traits::{connection::ConnectionConfig, http::HttpMethod};
use core_auth::Login;
use futures::stream::BoxStream;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::context::SimbaContext;
use crate::contract::{SimbaContract, SimbaContractBlocking};
use crate::deploy::{
    artifact_deployment_id, design_deployment_id, DeploySpec, DeployedContract,
};
use crate::error::{Result, SimbaError};
use crate::files::{FileSet, TxnHeaders};
use crate::filter::SearchFilter;
use crate::pager::PageIter;
use crate::params::ParamChecker;
use crate::paths::ApiPath;
use crate::poll::{
    wait_for, wait_for_blocking, PollTracker, DEFAULT_DEPLOYMENT_WAIT, DEFAULT_TRANSACTION_WAIT,
};
use crate::request::{RequestOptions, SimbaRequest};

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub login: Option<Login>,
    pub config: Option<ConnectionConfig>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(mut self, login: Login) -> Self {
        self.login = Some(login);
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn request_options(&self) -> RequestOptions {
        RequestOptions {
            config: self.config.clone(),
            ..RequestOptions::default()
        }
    }
}

/// Inputs for a contract method transaction.
#[derive(Debug, Clone, Default)]
pub struct ContractSubmission {
    pub inputs: Map<String, Value>,
    pub files: Option<FileSet>,
    pub txn_headers: Option<TxnHeaders>,
    validate: bool,
    checker: Option<ParamChecker>,
}

impl ContractSubmission {
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self {
            inputs,
            ..Self::default()
        }
    }

    pub fn files(mut self, files: FileSet) -> Self {
        self.files = Some(files);
        self
    }

    pub fn txn_headers(mut self, headers: TxnHeaders) -> Self {
        self.txn_headers = Some(headers);
        self
    }

    /// Check the inputs against the contract metadata before sending,
    /// fetching the metadata first.
    pub fn validated(mut self) -> Self {
        self.validate = true;
        self
    }

    /// Check the inputs with already fetched metadata.
    pub fn validated_with(mut self, checker: ParamChecker) -> Self {
        self.validate = true;
        self.checker = Some(checker);
        self
    }

    fn request_options(self, call: &CallOptions) -> RequestOptions {
        let mut options = call
            .request_options()
            .json(Value::Object(self.inputs));
        if let Some(headers) = self.txn_headers {
            options = options.headers(headers.as_headers());
        }
        if let Some(files) = self.files {
            options = options.files(files);
        }
        options
    }
}

fn named(name: &str, display_name: &str) -> Value {
    json!({"name": name, "display_name": display_name})
}

/// Async client.
#[derive(Debug, Clone)]
pub struct Simba {
    ctx: Arc<SimbaContext>,
}

impl Simba {
    pub fn new(ctx: SimbaContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn from_shared(ctx: Arc<SimbaContext>) -> Self {
        Self { ctx }
    }

    /// Client configured from the environment with the default transport.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(SimbaContext::from_env()?))
    }

    pub fn context(&self) -> &SimbaContext {
        &self.ctx
    }

    fn request(&self, method: HttpMethod, endpoint: String, opts: &CallOptions) -> SimbaRequest<'_> {
        SimbaRequest::new(&self.ctx, method, endpoint).with_login(opts.login.clone())
    }

    fn listing(
        &self,
        endpoint: String,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> SimbaRequest<'_> {
        let request = self.request(HttpMethod::Get, endpoint, opts);
        match filter {
            Some(filter) => request.with_filter(filter),
            None => request,
        }
    }

    async fn get(&self, endpoint: String, opts: &CallOptions) -> Result<Value> {
        self.request(HttpMethod::Get, endpoint, opts)
            .send(opts.request_options())
            .await
    }

    pub async fn whoami(&self, opts: &CallOptions) -> Result<Value> {
        self.get(ApiPath::Whoami.create(&[])?, opts).await
    }

    pub async fn get_organisation(&self, org: &str, opts: &CallOptions) -> Result<Value> {
        self.get(ApiPath::Organisation.create(&[org])?, opts).await
    }

    /// Return the organisation `name`, creating it when it does not exist.
    #[instrument(skip(self, opts))]
    pub async fn create_org(
        &self,
        name: &str,
        display_name: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        match self.get_organisation(name, opts).await {
            Err(err) if err.is_not_found() => {
                info!(org = name, "Creating organisation");
                self.request(HttpMethod::Post, ApiPath::Organisations.create(&[])?, opts)
                    .send(opts.request_options().json(named(name, display_name)))
                    .await
            }
            other => other,
        }
    }

    pub fn list_applications(
        &self,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<BoxStream<'_, Result<Vec<Value>>>> {
        Ok(self
            .listing(ApiPath::Apps.create(&[])?, filter, opts)
            .retrieve_iter(opts.request_options()))
    }

    pub async fn get_applications(
        &self,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::Apps.create(&[])?, filter, opts)
            .retrieve(opts.request_options())
            .await
    }

    pub async fn get_application(&self, org: &str, app: &str, opts: &CallOptions) -> Result<Value> {
        self.get(ApiPath::App.create(&[org, app])?, opts).await
    }

    /// Return the application `name` in `org`, creating it when it does not
    /// exist.
    #[instrument(skip(self, opts))]
    pub async fn create_app(
        &self,
        org: &str,
        name: &str,
        display_name: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        match self.get(ApiPath::OrgApp.create(&[org, name])?, opts).await {
            Err(err) if err.is_not_found() => {
                info!(org, app = name, "Creating application");
                self.request(HttpMethod::Post, ApiPath::OrgApps.create(&[org])?, opts)
                    .send(opts.request_options().json(named(name, display_name)))
                    .await
            }
            other => other,
        }
    }

    pub fn list_application_transactions(
        &self,
        app: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<BoxStream<'_, Result<Vec<Value>>>> {
        Ok(self
            .listing(ApiPath::AppTxns.create(&[app])?, filter, opts)
            .retrieve_iter(opts.request_options()))
    }

    pub async fn get_application_transactions(
        &self,
        app: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::AppTxns.create(&[app])?, filter, opts)
            .retrieve(opts.request_options())
            .await
    }

    pub fn list_contract_transactions(
        &self,
        app: &str,
        contract: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<BoxStream<'_, Result<Vec<Value>>>> {
        Ok(self
            .listing(ApiPath::ContractTxns.create(&[app, contract])?, filter, opts)
            .retrieve_iter(opts.request_options()))
    }

    pub async fn get_contract_transactions(
        &self,
        app: &str,
        contract: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::ContractTxns.create(&[app, contract])?, filter, opts)
            .retrieve(opts.request_options())
            .await
    }

    pub async fn get_transaction(
        &self,
        app: &str,
        contract: &str,
        transaction_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(
            ApiPath::ContractTxn.create(&[app, contract, transaction_hash])?,
            opts,
        )
        .await
    }

    /// Transactions submitted to `method`, one page at a time.
    pub fn list_method_transactions(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<BoxStream<'_, Result<Vec<Value>>>> {
        Ok(self
            .listing(ApiPath::ContractMethod.create(&[app, contract, method])?, filter, opts)
            .retrieve_iter(opts.request_options()))
    }

    pub async fn get_method_transactions(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::ContractMethod.create(&[app, contract, method])?, filter, opts)
            .retrieve(opts.request_options())
            .await
    }

    /// Contract events, one page at a time. Narrow by event name through
    /// the filter.
    pub fn list_events(
        &self,
        app: &str,
        contract: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<BoxStream<'_, Result<Vec<Value>>>> {
        Ok(self
            .listing(ApiPath::ContractEvents.create(&[app, contract])?, filter, opts)
            .retrieve_iter(opts.request_options()))
    }

    pub async fn get_events(
        &self,
        app: &str,
        contract: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::ContractEvents.create(&[app, contract])?, filter, opts)
            .retrieve(opts.request_options())
            .await
    }

    pub async fn get_receipt(
        &self,
        app: &str,
        contract: &str,
        receipt_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(
            ApiPath::ContractReceipt.create(&[app, contract, receipt_hash])?,
            opts,
        )
        .await
    }

    pub async fn get_contract_info(
        &self,
        app: &str,
        contract: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(ApiPath::ContractInfo.create(&[app, contract])?, opts)
            .await
    }

    /// Metadata checker for `contract` in `app`.
    pub async fn param_checker(
        &self,
        app: &str,
        contract: &str,
        opts: &CallOptions,
    ) -> Result<ParamChecker> {
        ParamChecker::fetch(&self.ctx, app, contract, opts.login.clone()).await
    }

    /// Submit a transaction for a contract method.
    #[instrument(skip(self, submission, opts))]
    pub async fn submit_contract_method(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.submit_to(ApiPath::ContractMethod, app, contract, method, submission, opts)
            .await
    }

    /// Submit a transaction and wait for the platform to mine it before
    /// responding.
    #[instrument(skip(self, submission, opts))]
    pub async fn submit_contract_method_sync(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.submit_to(ApiPath::SyncContractMethod, app, contract, method, submission, opts)
            .await
    }

    async fn submit_to(
        &self,
        path: ApiPath,
        app: &str,
        contract: &str,
        method: &str,
        mut submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        if submission.validate {
            let checker = match submission.checker.take() {
                Some(checker) => checker,
                None => self.param_checker(app, contract, opts).await?,
            };
            checker.validate_params(method, &submission.inputs)?;
        }

        let endpoint = path.create(&[app, contract, method])?;
        self.request(HttpMethod::Post, endpoint, opts)
            .send(submission.request_options(opts))
            .await
    }

    /// Query a contract getter.
    pub async fn call_contract_method(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        args: &Map<String, Value>,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::ContractMethod.create(&[app, contract, method])?;
        self.request(HttpMethod::Get, endpoint, opts)
            .call(args, opts.request_options())
            .await
    }

    /// Download a bundle archive to `location`.
    pub async fn get_bundle(
        &self,
        app: &str,
        contract: &str,
        bundle_hash: &str,
        location: impl AsRef<Path>,
        opts: &CallOptions,
    ) -> Result<u64> {
        let endpoint = ApiPath::Bundle.create(&[app, contract, bundle_hash])?;
        self.request(HttpMethod::Get, endpoint, opts)
            .download(location, opts.request_options())
            .await
    }

    /// Download one file of a bundle to `location`.
    pub async fn get_bundle_file(
        &self,
        app: &str,
        contract: &str,
        bundle_hash: &str,
        file_name: &str,
        location: impl AsRef<Path>,
        opts: &CallOptions,
    ) -> Result<u64> {
        let endpoint = ApiPath::BundleFile.create(&[app, contract, bundle_hash, file_name])?;
        self.request(HttpMethod::Get, endpoint, opts)
            .download(location, opts.request_options())
            .await
    }

    /// Check the files of a bundle against the hashes in its manifest. The
    /// `errors` field of the response lists any mismatch.
    pub async fn validate_bundle(
        &self,
        app: &str,
        contract: &str,
        bundle_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(
            ApiPath::ValidateBundle.create(&[app, contract, bundle_hash])?,
            opts,
        )
        .await
    }

    pub async fn get_manifest_for_bundle_from_bundle_hash(
        &self,
        app: &str,
        contract: &str,
        bundle_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(
            ApiPath::BundleManifest.create(&[app, contract, bundle_hash])?,
            opts,
        )
        .await
    }

    /// Poll a deployment until it completes. `max_wait` defaults to eight
    /// minutes.
    #[instrument(skip(self, opts))]
    pub async fn wait_for_deployment(
        &self,
        org: &str,
        uid: &str,
        max_wait: Option<Duration>,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::Deployment.create(&[org, uid])?;
        let tracker = PollTracker::new(
            format!("deployment {}", uid),
            max_wait.unwrap_or(DEFAULT_DEPLOYMENT_WAIT),
        );
        wait_for(tracker, || self.get(endpoint.clone(), opts)).await
    }

    /// Poll an organisation transaction until it completes. `max_wait`
    /// defaults to forty seconds.
    #[instrument(skip(self, opts))]
    pub async fn wait_for_org_transaction(
        &self,
        org: &str,
        uid: &str,
        max_wait: Option<Duration>,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::OrgTxn.create(&[org, uid])?;
        let tracker = PollTracker::new(
            format!("transaction {}", uid),
            max_wait.unwrap_or(DEFAULT_TRANSACTION_WAIT),
        );
        wait_for(tracker, || self.get(endpoint.clone(), opts)).await
    }

    /// Start deploying the contract design `design_id` into `app`.
    #[instrument(skip(self, spec, opts), fields(api_name = %spec.api_name))]
    pub async fn deploy_design(
        &self,
        org: &str,
        app: &str,
        design_id: &str,
        spec: &DeploySpec,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::DesignDeploy.create(&[org, design_id])?;
        self.request(HttpMethod::Post, endpoint, opts)
            .send(opts.request_options().json(spec.body(app)))
            .await
    }

    /// Start deploying the compiled artifact `artifact_id` into `app`.
    #[instrument(skip(self, spec, opts), fields(api_name = %spec.api_name))]
    pub async fn deploy_artifact(
        &self,
        org: &str,
        app: &str,
        artifact_id: &str,
        spec: &DeploySpec,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::Deployments.create(&[org])?;
        self.request(HttpMethod::Post, endpoint, opts)
            .send(opts.request_options().json(spec.artifact_body(app, artifact_id)))
            .await
    }

    /// Deploy a design and wait for the deployment to complete.
    pub async fn wait_for_deploy_design(
        &self,
        org: &str,
        app: &str,
        design_id: &str,
        spec: &DeploySpec,
        max_wait: Option<Duration>,
        opts: &CallOptions,
    ) -> Result<DeployedContract> {
        let response = self.deploy_design(org, app, design_id, spec, opts).await?;
        let id = design_deployment_id(&response).ok_or_else(|| missing_deployment(&response))?;
        let deployment = self.wait_for_deployment(org, id, max_wait, opts).await?;
        Ok(DeployedContract::from(deployment))
    }

    /// Deploy an artifact and wait for the deployment to complete.
    pub async fn wait_for_deploy_artifact(
        &self,
        org: &str,
        app: &str,
        artifact_id: &str,
        spec: &DeploySpec,
        max_wait: Option<Duration>,
        opts: &CallOptions,
    ) -> Result<DeployedContract> {
        let response = self.deploy_artifact(org, app, artifact_id, spec, opts).await?;
        let id = artifact_deployment_id(&response).ok_or_else(|| missing_deployment(&response))?;
        let deployment = self.wait_for_deployment(org, id, max_wait, opts).await?;
        Ok(DeployedContract::from(deployment))
    }

    /// Client bound to one contract, with its metadata loaded for
    /// validation.
    pub async fn smart_contract_client(
        &self,
        app: &str,
        contract: &str,
        opts: &CallOptions,
    ) -> Result<SimbaContract> {
        SimbaContract::new(self.clone(), app, contract, opts).await
    }
}

/// Blocking client.
///
/// Uses `reqwest::blocking` underneath, so it must not be used from inside a
/// tokio runtime.
#[derive(Debug, Clone)]
pub struct SimbaBlocking {
    ctx: Arc<SimbaContext>,
}

impl SimbaBlocking {
    pub fn new(ctx: SimbaContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn from_shared(ctx: Arc<SimbaContext>) -> Self {
        Self { ctx }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(SimbaContext::from_env()?))
    }

    pub fn context(&self) -> &SimbaContext {
        &self.ctx
    }

    fn request(&self, method: HttpMethod, endpoint: String, opts: &CallOptions) -> SimbaRequest<'_> {
        SimbaRequest::new(&self.ctx, method, endpoint).with_login(opts.login.clone())
    }

    fn listing(
        &self,
        endpoint: String,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> SimbaRequest<'_> {
        let request = self.request(HttpMethod::Get, endpoint, opts);
        match filter {
            Some(filter) => request.with_filter(filter),
            None => request,
        }
    }

    fn get(&self, endpoint: String, opts: &CallOptions) -> Result<Value> {
        self.request(HttpMethod::Get, endpoint, opts)
            .send_blocking(opts.request_options())
    }

    pub fn whoami(&self, opts: &CallOptions) -> Result<Value> {
        self.get(ApiPath::Whoami.create(&[])?, opts)
    }

    pub fn get_organisation(&self, org: &str, opts: &CallOptions) -> Result<Value> {
        self.get(ApiPath::Organisation.create(&[org])?, opts)
    }

    #[instrument(skip(self, opts))]
    pub fn create_org(
        &self,
        name: &str,
        display_name: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        match self.get_organisation(name, opts) {
            Err(err) if err.is_not_found() => {
                info!(org = name, "Creating organisation");
                self.request(HttpMethod::Post, ApiPath::Organisations.create(&[])?, opts)
                    .send_blocking(opts.request_options().json(named(name, display_name)))
            }
            other => other,
        }
    }

    pub fn list_applications(
        &self,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<PageIter<'_>> {
        Ok(self
            .listing(ApiPath::Apps.create(&[])?, filter, opts)
            .retrieve_iter_blocking(opts.request_options()))
    }

    pub fn get_applications(
        &self,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::Apps.create(&[])?, filter, opts)
            .retrieve_blocking(opts.request_options())
    }

    pub fn get_application(&self, org: &str, app: &str, opts: &CallOptions) -> Result<Value> {
        self.get(ApiPath::App.create(&[org, app])?, opts)
    }

    #[instrument(skip(self, opts))]
    pub fn create_app(
        &self,
        org: &str,
        name: &str,
        display_name: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        match self.get(ApiPath::OrgApp.create(&[org, name])?, opts) {
            Err(err) if err.is_not_found() => {
                info!(org, app = name, "Creating application");
                self.request(HttpMethod::Post, ApiPath::OrgApps.create(&[org])?, opts)
                    .send_blocking(opts.request_options().json(named(name, display_name)))
            }
            other => other,
        }
    }

    pub fn list_application_transactions(
        &self,
        app: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<PageIter<'_>> {
        Ok(self
            .listing(ApiPath::AppTxns.create(&[app])?, filter, opts)
            .retrieve_iter_blocking(opts.request_options()))
    }

    pub fn get_application_transactions(
        &self,
        app: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::AppTxns.create(&[app])?, filter, opts)
            .retrieve_blocking(opts.request_options())
    }

    pub fn list_contract_transactions(
        &self,
        app: &str,
        contract: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<PageIter<'_>> {
        Ok(self
            .listing(ApiPath::ContractTxns.create(&[app, contract])?, filter, opts)
            .retrieve_iter_blocking(opts.request_options()))
    }

    pub fn get_contract_transactions(
        &self,
        app: &str,
        contract: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::ContractTxns.create(&[app, contract])?, filter, opts)
            .retrieve_blocking(opts.request_options())
    }

    pub fn get_transaction(
        &self,
        app: &str,
        contract: &str,
        transaction_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(
            ApiPath::ContractTxn.create(&[app, contract, transaction_hash])?,
            opts,
        )
    }

    pub fn list_method_transactions(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<PageIter<'_>> {
        Ok(self
            .listing(ApiPath::ContractMethod.create(&[app, contract, method])?, filter, opts)
            .retrieve_iter_blocking(opts.request_options()))
    }

    pub fn get_method_transactions(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::ContractMethod.create(&[app, contract, method])?, filter, opts)
            .retrieve_blocking(opts.request_options())
    }

    pub fn list_events(
        &self,
        app: &str,
        contract: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<PageIter<'_>> {
        Ok(self
            .listing(ApiPath::ContractEvents.create(&[app, contract])?, filter, opts)
            .retrieve_iter_blocking(opts.request_options()))
    }

    pub fn get_events(
        &self,
        app: &str,
        contract: &str,
        filter: Option<&SearchFilter>,
        opts: &CallOptions,
    ) -> Result<Vec<Value>> {
        self.listing(ApiPath::ContractEvents.create(&[app, contract])?, filter, opts)
            .retrieve_blocking(opts.request_options())
    }

    pub fn get_receipt(
        &self,
        app: &str,
        contract: &str,
        receipt_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(
            ApiPath::ContractReceipt.create(&[app, contract, receipt_hash])?,
            opts,
        )
    }

    pub fn get_contract_info(&self, app: &str, contract: &str, opts: &CallOptions) -> Result<Value> {
        self.get(ApiPath::ContractInfo.create(&[app, contract])?, opts)
    }

    pub fn param_checker(
        &self,
        app: &str,
        contract: &str,
        opts: &CallOptions,
    ) -> Result<ParamChecker> {
        ParamChecker::fetch_blocking(&self.ctx, app, contract, opts.login.clone())
    }

    #[instrument(skip(self, submission, opts))]
    pub fn submit_contract_method(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.submit_to(ApiPath::ContractMethod, app, contract, method, submission, opts)
    }

    #[instrument(skip(self, submission, opts))]
    pub fn submit_contract_method_sync(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.submit_to(ApiPath::SyncContractMethod, app, contract, method, submission, opts)
    }

    fn submit_to(
        &self,
        path: ApiPath,
        app: &str,
        contract: &str,
        method: &str,
        mut submission: ContractSubmission,
        opts: &CallOptions,
    ) -> Result<Value> {
        if submission.validate {
            let checker = match submission.checker.take() {
                Some(checker) => checker,
                None => self.param_checker(app, contract, opts)?,
            };
            checker.validate_params(method, &submission.inputs)?;
        }

        let endpoint = path.create(&[app, contract, method])?;
        self.request(HttpMethod::Post, endpoint, opts)
            .send_blocking(submission.request_options(opts))
    }

    pub fn call_contract_method(
        &self,
        app: &str,
        contract: &str,
        method: &str,
        args: &Map<String, Value>,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::ContractMethod.create(&[app, contract, method])?;
        self.request(HttpMethod::Get, endpoint, opts)
            .call_blocking(args, opts.request_options())
    }

    pub fn get_bundle(
        &self,
        app: &str,
        contract: &str,
        bundle_hash: &str,
        location: impl AsRef<Path>,
        opts: &CallOptions,
    ) -> Result<u64> {
        let endpoint = ApiPath::Bundle.create(&[app, contract, bundle_hash])?;
        self.request(HttpMethod::Get, endpoint, opts)
            .download_blocking(location, opts.request_options())
    }

    pub fn get_bundle_file(
        &self,
        app: &str,
        contract: &str,
        bundle_hash: &str,
        file_name: &str,
        location: impl AsRef<Path>,
        opts: &CallOptions,
    ) -> Result<u64> {
        let endpoint = ApiPath::BundleFile.create(&[app, contract, bundle_hash, file_name])?;
        self.request(HttpMethod::Get, endpoint, opts)
            .download_blocking(location, opts.request_options())
    }

    pub fn validate_bundle(
        &self,
        app: &str,
        contract: &str,
        bundle_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(
            ApiPath::ValidateBundle.create(&[app, contract, bundle_hash])?,
            opts,
        )
    }

    pub fn get_manifest_for_bundle_from_bundle_hash(
        &self,
        app: &str,
        contract: &str,
        bundle_hash: &str,
        opts: &CallOptions,
    ) -> Result<Value> {
        self.get(
            ApiPath::BundleManifest.create(&[app, contract, bundle_hash])?,
            opts,
        )
    }

    #[instrument(skip(self, opts))]
    pub fn wait_for_deployment(
        &self,
        org: &str,
        uid: &str,
        max_wait: Option<Duration>,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::Deployment.create(&[org, uid])?;
        let tracker = PollTracker::new(
            format!("deployment {}", uid),
            max_wait.unwrap_or(DEFAULT_DEPLOYMENT_WAIT),
        );
        wait_for_blocking(tracker, || self.get(endpoint.clone(), opts))
    }

    #[instrument(skip(self, opts))]
    pub fn wait_for_org_transaction(
        &self,
        org: &str,
        uid: &str,
        max_wait: Option<Duration>,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::OrgTxn.create(&[org, uid])?;
        let tracker = PollTracker::new(
            format!("transaction {}", uid),
            max_wait.unwrap_or(DEFAULT_TRANSACTION_WAIT),
        );
        wait_for_blocking(tracker, || self.get(endpoint.clone(), opts))
    }

    #[instrument(skip(self, spec, opts), fields(api_name = %spec.api_name))]
    pub fn deploy_design(
        &self,
        org: &str,
        app: &str,
        design_id: &str,
        spec: &DeploySpec,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::DesignDeploy.create(&[org, design_id])?;
        self.request(HttpMethod::Post, endpoint, opts)
            .send_blocking(opts.request_options().json(spec.body(app)))
    }

    #[instrument(skip(self, spec, opts), fields(api_name = %spec.api_name))]
    pub fn deploy_artifact(
        &self,
        org: &str,
        app: &str,
        artifact_id: &str,
        spec: &DeploySpec,
        opts: &CallOptions,
    ) -> Result<Value> {
        let endpoint = ApiPath::Deployments.create(&[org])?;
        self.request(HttpMethod::Post, endpoint, opts)
            .send_blocking(opts.request_options().json(spec.artifact_body(app, artifact_id)))
    }

    pub fn wait_for_deploy_design(
        &self,
        org: &str,
        app: &str,
        design_id: &str,
        spec: &DeploySpec,
        max_wait: Option<Duration>,
        opts: &CallOptions,
    ) -> Result<DeployedContract> {
        let response = self.deploy_design(org, app, design_id, spec, opts)?;
        let id = design_deployment_id(&response).ok_or_else(|| missing_deployment(&response))?;
        let deployment = self.wait_for_deployment(org, id, max_wait, opts)?;
        Ok(DeployedContract::from(deployment))
    }

    pub fn wait_for_deploy_artifact(
        &self,
        org: &str,
        app: &str,
        artifact_id: &str,
        spec: &DeploySpec,
        max_wait: Option<Duration>,
        opts: &CallOptions,
    ) -> Result<DeployedContract> {
        let response = self.deploy_artifact(org, app, artifact_id, spec, opts)?;
        let id = artifact_deployment_id(&response).ok_or_else(|| missing_deployment(&response))?;
        let deployment = self.wait_for_deployment(org, id, max_wait, opts)?;
        Ok(DeployedContract::from(deployment))
    }

    pub fn smart_contract_client(
        &self,
        app: &str,
        contract: &str,
        opts: &CallOptions,
    ) -> Result<SimbaContractBlocking> {
        SimbaContractBlocking::new(self.clone(), app, contract, opts)
    }
}

fn missing_deployment(response: &Value) -> SimbaError {
    SimbaError::Unknown(format!("Deployment response carries no id: {}", response))
}
