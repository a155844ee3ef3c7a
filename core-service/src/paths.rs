//! Endpoint templates
//!
//! Each template holds `{}` placeholders that [`ApiPath::create`] fills
//! positionally.

use crate::error::{Result, SimbaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiPath {
    Whoami,
    Apps,
    App,
    AppTxns,
    AppContract,
    ContractTxns,
    ContractTxn,
    ValidateBundle,
    Bundle,
    BundleFile,
    BundleManifest,
    ContractInfo,
    ContractEvents,
    ContractReceipt,
    ContractMethod,
    SyncContractMethod,
    Organisation,
    Organisations,
    OrgApp,
    OrgApps,
    OrgTxn,
    DesignDeploy,
    Deployment,
    Deployments,
}

impl ApiPath {
    pub fn template(&self) -> &'static str {
        match self {
            ApiPath::Whoami => "/user/whoami/",
            ApiPath::Apps => "/v2/apps/",
            ApiPath::App => "/v2/organisations/{}/applications/{}/",
            ApiPath::AppTxns => "/v2/apps/{}/transactions/",
            ApiPath::AppContract => "/v2/apps/{}/contract/{}/",
            ApiPath::ContractTxns => "/v2/apps/{}/contract/{}/transactions/",
            ApiPath::ContractTxn => "/v2/apps/{}/contract/{}/transactions/{}/",
            ApiPath::ValidateBundle => "/v2/apps/{}/validate/{}/{}/",
            ApiPath::Bundle => "/v2/apps/{}/contract/{}/bundle/{}/",
            ApiPath::BundleFile => "/v2/apps/{}/contract/{}/bundle/{}/filename/{}/",
            ApiPath::BundleManifest => "/v2/apps/{}/contract/{}/bundle/{}/manifest/",
            ApiPath::ContractInfo => "/v2/apps/{}/contract/{}/info",
            ApiPath::ContractEvents => "/v2/apps/{}/contract/{}/events/",
            ApiPath::ContractReceipt => "/v2/apps/{}/contract/{}/receipt/{}/",
            ApiPath::ContractMethod => "/v2/apps/{}/contract/{}/{}/",
            ApiPath::SyncContractMethod => "/v2/apps/{}/sync/contract/{}/{}/",
            ApiPath::Organisation => "/v2/organisations/{}/",
            ApiPath::Organisations => "/v2/organisations/",
            ApiPath::OrgApp => "/v2/organisations/{}/applications/{}/",
            ApiPath::OrgApps => "/v2/organisations/{}/applications/",
            ApiPath::OrgTxn => "/v2/organisations/{}/transactions/{}/",
            ApiPath::DesignDeploy => "/v2/organisations/{}/contract_designs/{}/deploy/",
            ApiPath::Deployment => "/v2/organisations/{}/deployments/{}/",
            ApiPath::Deployments => "/v2/organisations/{}/deployments/",
        }
    }

    /// Number of placeholders in the template.
    pub fn slots(&self) -> usize {
        self.template().matches("{}").count()
    }

    /// Substitute `args` into the template in order.
    ///
    /// # Errors
    ///
    /// Returns [`SimbaError::Path`] unless exactly one argument is supplied
    /// per placeholder.
    pub fn create(&self, args: &[&str]) -> Result<String> {
        let template = self.template();
        let expected = self.slots();
        if args.len() != expected {
            return Err(SimbaError::Path {
                template,
                expected,
                actual: args.len(),
            });
        }

        let mut path = String::with_capacity(template.len());
        let mut pieces = template.split("{}");
        if let Some(first) = pieces.next() {
            path.push_str(first);
        }
        for (piece, arg) in pieces.zip(args) {
            path.push_str(arg);
            path.push_str(piece);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_substitutes_in_order() {
        assert_eq!(ApiPath::Whoami.create(&[]).unwrap(), "/user/whoami/");
        assert_eq!(
            ApiPath::ContractMethod
                .create(&["app", "contract", "method"])
                .unwrap(),
            "/v2/apps/app/contract/contract/method/"
        );
        assert_eq!(
            ApiPath::ContractInfo.create(&["a", "c"]).unwrap(),
            "/v2/apps/a/contract/c/info"
        );
    }

    #[test]
    fn test_create_rejects_wrong_arity() {
        let err = ApiPath::OrgApp.create(&["org"]).unwrap_err();
        match err {
            SimbaError::Path {
                expected, actual, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ApiPath::Apps.create(&["extra"]).is_err());
    }
}
