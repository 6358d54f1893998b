use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

use super::{BackendClient, ClientError};
use crate::auth::Credential;

/// Compliance artifacts exposed by the backend as plain CRUD collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceResource {
    Organizations,
    Audits,
    Dpia,
    DataBreaches,
    RightsRequests,
    TrainingModules,
    DataSubjects,
    NotificationTemplates,
    ComplianceScores,
}

impl ComplianceResource {
    pub const ALL: [ComplianceResource; 9] = [
        ComplianceResource::Organizations,
        ComplianceResource::Audits,
        ComplianceResource::Dpia,
        ComplianceResource::DataBreaches,
        ComplianceResource::RightsRequests,
        ComplianceResource::TrainingModules,
        ComplianceResource::DataSubjects,
        ComplianceResource::NotificationTemplates,
        ComplianceResource::ComplianceScores,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ComplianceResource::Organizations => "organizations",
            ComplianceResource::Audits => "audits",
            ComplianceResource::Dpia => "dpia",
            ComplianceResource::DataBreaches => "data-breaches",
            ComplianceResource::RightsRequests => "rights-requests",
            ComplianceResource::TrainingModules => "training-modules",
            ComplianceResource::DataSubjects => "data-subjects",
            ComplianceResource::NotificationTemplates => "notification-templates",
            ComplianceResource::ComplianceScores => "compliance-scores",
        }
    }

}

impl FromStr for ComplianceResource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|resource| resource.slug() == s)
            .ok_or_else(|| format!("Unknown compliance resource '{}'", s))
    }
}

/// Records are relayed verbatim; the portal adds no business rules.
impl BackendClient {
    pub async fn list_records(
        &self,
        credential: &Credential,
        resource: ComplianceResource,
        query: &[(String, String)],
    ) -> Result<Value, ClientError> {
        self.get_json_with_query(credential, &[resource.slug()], query)
            .await
    }

    pub async fn get_record(
        &self,
        credential: &Credential,
        resource: ComplianceResource,
        id: &str,
    ) -> Result<Value, ClientError> {
        self.get_json(credential, &[resource.slug(), id]).await
    }

    pub async fn create_record(
        &self,
        credential: &Credential,
        resource: ComplianceResource,
        body: &Value,
    ) -> Result<Value, ClientError> {
        self.post_json(credential, &[resource.slug()], body)
            .await
    }

    pub async fn update_record(
        &self,
        credential: &Credential,
        resource: ComplianceResource,
        id: &str,
        body: &Value,
    ) -> Result<Value, ClientError> {
        self.patch_json(credential, &[resource.slug(), id], body)
            .await
    }

    pub async fn delete_record(
        &self,
        credential: &Credential,
        resource: ComplianceResource,
        id: &str,
    ) -> Result<(), ClientError> {
        self.delete(credential, &[resource.slug(), id]).await
    }
}
