use std::collections::BTreeMap;

use regex::Regex;

use crate::error::Error;
use crate::error::Result;
use crate::vcs::GitConfig;

/// A configuration setting, stored in git config under `jig.*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigKey {
    TrackerUrl,
    TrackerUser,
    TrackerToken,
    Project,
    GithubToken,
    Remote,
    BaseBranch,
    BranchTemplate,
    IssueKeyPattern,
    ReferencePattern,
    CacheTtl,
}

/// Keys every command needs.
pub const TRACKER_KEYS: &[ConfigKey] = &[
    ConfigKey::TrackerUrl,
    ConfigKey::TrackerUser,
    ConfigKey::TrackerToken,
    ConfigKey::Project,
];

/// Keys for commands that talk to the code host as well.
pub const HOST_KEYS: &[ConfigKey] = &[
    ConfigKey::TrackerUrl,
    ConfigKey::TrackerUser,
    ConfigKey::TrackerToken,
    ConfigKey::Project,
    ConfigKey::GithubToken,
];

impl ConfigKey {
    pub const ALL: [ConfigKey; 11] = [
        ConfigKey::TrackerUrl,
        ConfigKey::TrackerUser,
        ConfigKey::TrackerToken,
        ConfigKey::Project,
        ConfigKey::GithubToken,
        ConfigKey::Remote,
        ConfigKey::BaseBranch,
        ConfigKey::BranchTemplate,
        ConfigKey::IssueKeyPattern,
        ConfigKey::ReferencePattern,
        ConfigKey::CacheTtl,
    ];

    /// Name of the key in git config.
    pub fn git_name(&self) -> &'static str {
        match self {
            ConfigKey::TrackerUrl => "jig.trackerUrl",
            ConfigKey::TrackerUser => "jig.trackerUser",
            ConfigKey::TrackerToken => "jig.trackerToken",
            ConfigKey::Project => "jig.project",
            ConfigKey::GithubToken => "jig.githubToken",
            ConfigKey::Remote => "jig.remote",
            ConfigKey::BaseBranch => "jig.baseBranch",
            ConfigKey::BranchTemplate => "jig.branchTemplate",
            ConfigKey::IssueKeyPattern => "jig.issueKeyPattern",
            ConfigKey::ReferencePattern => "jig.referencePattern",
            ConfigKey::CacheTtl => "jig.cacheTtl",
        }
    }

    /// Environment variable overriding the git config value.
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigKey::TrackerUrl => "JIG_TRACKER_URL",
            ConfigKey::TrackerUser => "JIG_TRACKER_USER",
            ConfigKey::TrackerToken => "JIG_TRACKER_TOKEN",
            ConfigKey::Project => "JIG_PROJECT",
            ConfigKey::GithubToken => "JIG_GITHUB_TOKEN",
            ConfigKey::Remote => "JIG_REMOTE",
            ConfigKey::BaseBranch => "JIG_BASE_BRANCH",
            ConfigKey::BranchTemplate => "JIG_BRANCH_TEMPLATE",
            ConfigKey::IssueKeyPattern => "JIG_ISSUE_KEY_PATTERN",
            ConfigKey::ReferencePattern => "JIG_REFERENCE_PATTERN",
            ConfigKey::CacheTtl => "JIG_CACHE_TTL",
        }
    }

    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            ConfigKey::Remote => Some("origin"),
            ConfigKey::BaseBranch => Some("main"),
            ConfigKey::BranchTemplate => Some("{key}"),
            ConfigKey::IssueKeyPattern => Some(r"[A-Z][A-Z0-9]+-\d+"),
            ConfigKey::ReferencePattern => Some(r"(?i)\bfixes\s+#?([a-z][a-z0-9]*-\d+)"),
            ConfigKey::CacheTtl => Some("300"),
            _ => None,
        }
    }

    /// Prompt shown when asking the user for a value.
    pub fn prompt(&self) -> &'static str {
        match self {
            ConfigKey::TrackerUrl => "Jira base URL",
            ConfigKey::TrackerUser => "Jira user (email)",
            ConfigKey::TrackerToken => "Jira API token",
            ConfigKey::Project => "Jira project key",
            ConfigKey::GithubToken => "GitHub Personal Access Token",
            ConfigKey::Remote => "Git remote",
            ConfigKey::BaseBranch => "Base branch",
            ConfigKey::BranchTemplate => "Branch name template",
            ConfigKey::IssueKeyPattern => "Issue key pattern",
            ConfigKey::ReferencePattern => "Commit reference pattern",
            ConfigKey::CacheTtl => "Cache TTL (seconds)",
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::TrackerToken | ConfigKey::GithubToken)
    }

    /// git reports config names lower-cased.
    pub fn from_git_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.git_name().eq_ignore_ascii_case(name))
    }
}

/// Values from one configuration source.
pub type Layer = BTreeMap<ConfigKey, String>;

/// Values given on the command line; the highest-precedence layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub remote: Option<String>,
    pub base_branch: Option<String>,
    pub branch_template: Option<String>,
}

impl Overrides {
    fn layer(&self) -> Layer {
        [
            (ConfigKey::Remote, &self.remote),
            (ConfigKey::BaseBranch, &self.base_branch),
            (ConfigKey::BranchTemplate, &self.branch_template),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|value| (key, value)))
        .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tracker_url: String,
    pub tracker_user: String,
    pub tracker_token: String,
    pub project: String,
    pub github_token: Option<String>,
    pub remote: String,
    pub base_branch: String,
    pub branch_template: String,
    pub issue_key_pattern: String,
    pub reference_pattern: String,
    pub cache_ttl_secs: i64,
}

impl Config {
    /// Load config from flags, environment and git config, in that order of
    /// precedence. Fails with [`Error::ConfigIncomplete`] if any of
    /// `required` has no value.
    pub fn load(overrides: &Overrides, required: &[ConfigKey]) -> Result<Self> {
        let git = Self::git_layer()?;
        let env = Self::env_layer();
        Self::resolve(&[&overrides.layer(), &env, &git], required)
    }

    /// Merge `layers` (highest precedence first) over the defaults.
    pub fn resolve(layers: &[&Layer], required: &[ConfigKey]) -> Result<Self> {
        let mut merged = Layer::new();
        for key in ConfigKey::ALL {
            let value = layers
                .iter()
                .find_map(|layer| layer.get(&key).filter(|v| !v.is_empty()).cloned())
                .or_else(|| key.default_value().map(str::to_string));
            if let Some(value) = value {
                merged.insert(key, value);
            }
        }

        let missing: Vec<String> = required
            .iter()
            .filter(|key| !merged.contains_key(*key))
            .map(|key| key.git_name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::ConfigIncomplete(missing));
        }

        let mut take = |key: ConfigKey| merged.remove(&key).unwrap_or_default();
        let cache_ttl = take(ConfigKey::CacheTtl);
        let cache_ttl_secs = cache_ttl.parse::<i64>().map_err(|_| {
            Error::ValidationFailed(format!(
                "{} must be a number of seconds, got '{}'",
                ConfigKey::CacheTtl.git_name(),
                cache_ttl
            ))
        })?;
        let github_token = Some(take(ConfigKey::GithubToken)).filter(|t| !t.is_empty());

        Ok(Self {
            tracker_url: take(ConfigKey::TrackerUrl),
            tracker_user: take(ConfigKey::TrackerUser),
            tracker_token: take(ConfigKey::TrackerToken),
            project: take(ConfigKey::Project),
            github_token,
            remote: take(ConfigKey::Remote),
            base_branch: take(ConfigKey::BaseBranch),
            branch_template: take(ConfigKey::BranchTemplate),
            issue_key_pattern: take(ConfigKey::IssueKeyPattern),
            reference_pattern: take(ConfigKey::ReferencePattern),
            cache_ttl_secs,
        })
    }

    /// Git settings with the reference pattern compiled.
    pub fn git_config(&self) -> Result<GitConfig> {
        Ok(GitConfig {
            remote: self.remote.clone(),
            base_branch: self.base_branch.clone(),
            branch_template: self.branch_template.clone(),
            reference_pattern: Regex::new(&self.reference_pattern)?,
        })
    }

    /// Read all `jig.*` keys visible to git (system, global and repo).
    pub fn git_layer() -> Result<Layer> {
        let args = ["config", "--get-regexp", r"^jig\."];
        let output = std::process::Command::new("git").args(args).output()?;

        // Exit code 1 means no matching keys
        match output.status.code() {
            Some(0) => Ok(parse_git_layer(&String::from_utf8_lossy(&output.stdout))),
            Some(1) => Ok(Layer::new()),
            _ => Err(Error::from_git_failure(&args, &output.stderr)),
        }
    }

    pub fn env_layer() -> Layer {
        ConfigKey::ALL
            .into_iter()
            .filter_map(|key| std::env::var(key.env_var()).ok().map(|value| (key, value)))
            .collect()
    }

    /// Save a value to the repository's git config
    pub fn save(key: ConfigKey, value: &str) -> Result<()> {
        let args = ["config", key.git_name(), value];
        let output = std::process::Command::new("git").args(args).output()?;

        if !output.status.success() {
            return Err(Error::from_git_failure(&args, &output.stderr));
        }

        Ok(())
    }

    /// Default config for tests
    #[cfg(test)]
    pub(crate) fn default_for_tests() -> Self {
        let layer: Layer = [
            (ConfigKey::TrackerUrl, "https://acme.atlassian.net".to_string()),
            (ConfigKey::TrackerUser, "ada@example.com".to_string()),
            (ConfigKey::TrackerToken, "secret".to_string()),
            (ConfigKey::Project, "ABC".to_string()),
            (ConfigKey::GithubToken, "ghp_secret".to_string()),
        ]
        .into_iter()
        .collect();
        Self::resolve(&[&layer], HOST_KEYS).unwrap()
    }
}

/// Parse `git config --get-regexp` output: one `name value` pair per line.
fn parse_git_layer(output: &str) -> Layer {
    output
        .lines()
        .filter_map(|line| {
            let (name, value) = line.split_once(' ').unwrap_or((line, ""));
            ConfigKey::from_git_name(name).map(|key| (key, value.to_string()))
        })
        .collect()
}
