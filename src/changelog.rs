use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::models::Commit;
use crate::models::Issue;
use crate::models::IssueType;
use crate::models::LocalChanges;

/// Changelog section. Sections are rendered in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeType {
    Feature,
    Fix,
    Chore,
}

impl ChangeType {
    pub const ALL: [ChangeType; 3] = [ChangeType::Feature, ChangeType::Fix, ChangeType::Chore];

    /// Type from a conventional-commit prefix like `feat:`, `fix(ui):` or
    /// `refactor!:`. None if the subject has no recognised prefix.
    pub fn from_message(message: &str) -> Option<Self> {
        let subject = message.lines().next()?;
        let (prefix, _) = subject.split_once(':')?;
        let prefix = prefix.trim().trim_end_matches('!');
        let prefix = match prefix.split_once('(') {
            Some((kind, scope)) if scope.ends_with(')') => kind,
            Some(_) => return None,
            None => prefix,
        };
        match prefix.to_lowercase().as_str() {
            "feat" | "feature" => Some(ChangeType::Feature),
            "fix" | "bugfix" => Some(ChangeType::Fix),
            "chore" | "refactor" | "docs" | "style" | "test" | "build" | "ci" | "perf" => {
                Some(ChangeType::Chore)
            }
            _ => None,
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            ChangeType::Feature => "Features",
            ChangeType::Fix => "Bug Fixes",
            ChangeType::Chore => "Chores",
        }
    }
}

impl From<IssueType> for ChangeType {
    fn from(issue_type: IssueType) -> Self {
        match issue_type {
            IssueType::Feature => ChangeType::Feature,
            IssueType::Bug => ChangeType::Fix,
            IssueType::Chore => ChangeType::Chore,
        }
    }
}

/// Issues of a release grouped into sections.
#[derive(Debug, Default)]
pub struct Changelog {
    sections: Vec<(ChangeType, Vec<Issue>)>,
}

impl Changelog {
    /// Group the resolved issues of `changes`.
    ///
    /// An issue's section comes from the prefix of the first commit that
    /// references it, falling back to the tracker's issue type. Within a
    /// section issues keep commit order. `keys_of` lists the issue keys a
    /// commit references.
    pub fn build(changes: &LocalChanges, keys_of: impl Fn(&Commit) -> Vec<String>) -> Self {
        let mut grouped: Vec<(ChangeType, &Issue)> = Vec::new();
        for commit in &changes.branch.commits {
            for key in keys_of(commit) {
                if grouped.iter().any(|(_, issue)| issue.key == key) {
                    continue;
                }
                let Some(issue) = changes.issue(&key) else {
                    continue;
                };
                let change_type = ChangeType::from_message(&commit.message)
                    .unwrap_or_else(|| issue.issue_type.into());
                grouped.push((change_type, issue));
            }
        }

        let sections = ChangeType::ALL
            .into_iter()
            .map(|change_type| {
                let issues: Vec<Issue> = grouped
                    .iter()
                    .filter(|(t, _)| *t == change_type)
                    .map(|(_, issue)| (*issue).clone())
                    .collect();
                (change_type, issues)
            })
            .filter(|(_, issues)| !issues.is_empty())
            .collect();

        Self { sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// All issues, in rendering order.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.sections.iter().flat_map(|(_, issues)| issues.iter())
    }

    /// Render as Markdown.
    pub fn render(&self, version: &str, date: NaiveDate) -> String {
        let mut out = format!("## {} ({})\n", version, date.format("%Y-%m-%d"));
        if self.is_empty() {
            out.push_str("\nNo tracked issues in this release.\n");
            return out;
        }
        for (change_type, issues) in &self.sections {
            let _ = write!(out, "\n### {}\n\n", change_type.heading());
            for issue in issues {
                let _ = writeln!(out, "- {} {}", issue.key, issue.title);
            }
        }
        out
    }
}
