use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::curl::Auth;
use super::curl::CurlClient;
use crate::error::Error;
use crate::error::Result;
use crate::models::Issue;
use crate::models::IssueSpec;
use crate::models::IssueStatus;
use crate::models::IssueType;
use crate::ops::tracker::IssueTracker;
use crate::ops::tracker::anchored_key_pattern;

// -----------------------------------------------------------------------------
// Types

/// Client to interact with the Jira REST API (v2).
pub struct JiraClient {
    base_url: String,
    key_pattern: Regex,
    http_client: CurlClient,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Deserialize)]
struct JiraFields {
    summary: String,
    issuetype: Named,
    status: Named,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
struct Transitions {
    transitions: Vec<Transition>,
}

#[derive(Debug, Deserialize)]
struct Transition {
    id: String,
    to: Named,
}

/// Jira Cloud identifies users by account id, Jira Server by name.
#[derive(Debug, Deserialize)]
struct Myself {
    #[serde(rename = "accountId")]
    account_id: Option<String>,
    name: Option<String>,
}

// -----------------------------------------------------------------------------
// JiraClient impl

impl JiraClient {
    pub fn new(base_url: &str, user: String, token: String, key_pattern: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key_pattern: anchored_key_pattern(key_pattern)?,
            http_client: CurlClient::new("Jira", Auth::Basic { user, token }, "application/json"),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{}", self.base_url, path)
    }

    #[instrument(skip_all)]
    async fn assignee_for_current_user(&self) -> Result<serde_json::Value> {
        let response = self.http_client.get(&self.url("myself")).await?;
        let myself: Myself = serde_json::from_str(&response)?;
        match (myself.account_id, myself.name) {
            (Some(account_id), _) => Ok(json!({ "accountId": account_id })),
            (None, Some(name)) => Ok(json!({ "name": name })),
            (None, None) => Err(Error::Api {
                service: "Jira",
                status: 200,
                message: "could not determine the current user".to_string(),
            }),
        }
    }
}

impl IssueTracker for JiraClient {
    #[instrument(skip_all)]
    async fn get_issue(&self, key: &str) -> Result<Issue> {
        let url = self.url(&format!("issue/{key}?fields=summary,issuetype,status"));
        let response = match self.http_client.get(&url).await {
            Ok(response) => response,
            Err(Error::Api { status: 404, .. }) => return Err(Error::IssueNotFound(key.to_string())),
            Err(err) => return Err(err),
        };
        let issue: JiraIssue = serde_json::from_str(&response)?;
        Ok(issue.into())
    }

    #[instrument(skip_all)]
    async fn create_issue_for_current_user(&self, spec: &IssueSpec) -> Result<Issue> {
        let assignee = self.assignee_for_current_user().await?;
        let request_body = json!({
            "fields": {
                "project": { "key": spec.project },
                "summary": spec.title,
                "description": spec.description,
                "issuetype": { "name": jira_type_name(spec.issue_type) },
                "assignee": assignee,
            }
        });

        let response = self
            .http_client
            .post(&self.url("issue"), &request_body.to_string())
            .await?;
        let created: CreatedIssue = serde_json::from_str(&response)?;

        Ok(Issue {
            key: created.key,
            title: spec.title.clone(),
            issue_type: spec.issue_type,
            status: IssueStatus::Open,
        })
    }

    #[instrument(skip_all)]
    async fn set_issue_status(&self, status: IssueStatus, key: &str) -> Result<()> {
        let issue = self.get_issue(key).await?;
        if issue.status == status {
            return Ok(());
        }
        if issue.status == IssueStatus::Released {
            return Err(Error::IssueReleased(key.to_string()));
        }

        let transitions_url = self.url(&format!("issue/{key}/transitions"));
        let response = self.http_client.get(&transitions_url).await?;
        let Transitions { transitions } = serde_json::from_str(&response)?;
        let transition = transitions
            .into_iter()
            .find(|t| status_from_jira(&t.to.name) == status)
            .ok_or_else(|| Error::Api {
                service: "Jira",
                status: 409,
                message: format!("no workflow transition moves {key} to '{status}'"),
            })?;

        let request_body = json!({ "transition": { "id": transition.id } });
        self.http_client
            .post(&transitions_url, &request_body.to_string())
            .await?;
        Ok(())
    }

    fn is_valid_issue_name(&self, key: &str) -> bool {
        self.key_pattern.is_match(key)
    }
}

// -----------------------------------------------------------------------------
// Mapping

impl From<JiraIssue> for Issue {
    fn from(issue: JiraIssue) -> Self {
        Issue {
            key: issue.key,
            title: issue.fields.summary,
            issue_type: type_from_jira(&issue.fields.issuetype.name),
            status: status_from_jira(&issue.fields.status.name),
        }
    }
}

fn type_from_jira(name: &str) -> IssueType {
    match name.to_lowercase().as_str() {
        "bug" => IssueType::Bug,
        "task" | "sub-task" | "subtask" | "chore" => IssueType::Chore,
        _ => IssueType::Feature,
    }
}

fn jira_type_name(issue_type: IssueType) -> &'static str {
    match issue_type {
        IssueType::Feature => "Story",
        IssueType::Bug => "Bug",
        IssueType::Chore => "Task",
    }
}

fn status_from_jira(name: &str) -> IssueStatus {
    match name.to_lowercase().as_str() {
        "in progress" | "in review" => IssueStatus::InProgress,
        "resolved" | "done" => IssueStatus::Resolved,
        "released" | "closed" => IssueStatus::Released,
        _ => IssueStatus::Open,
    }
}
