use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::Result;
use clap::ArgAction;
use clap::Parser;
use clap::Subcommand;
use colored::Colorize;
use jig::App;
use jig::Config;
use jig::Error;
use jig::cache::FileStore;
use jig::cache::MemoryStore;
use jig::cache::SharedStore;
use jig::clients::cached::CachedTracker;
use jig::clients::git::GitClient;
use jig::clients::github::GithubClient;
use jig::clients::jira::JiraClient;
use jig::commands::cache::cmd_cache_clear;
use jig::commands::init::cmd_init;
use jig::commands::init::prompt_for;
use jig::commands::start::IssueRef;
use jig::commands::start::StartWork;
use jig::config::ConfigKey;
use jig::config::HOST_KEYS;
use jig::config::Overrides;
use jig::config::TRACKER_KEYS;
use jig::models::IssueSpec;
use jig::models::IssueType;
use log::warn;

#[derive(Parser)]
#[command(name = "jig", version)]
#[command(about = "Issue-driven git workflow: start work on a ticket, open a review, cut a release", long_about = None)]
pub struct Cli {
    /// More output (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Git remote to use (defaults to jig.remote, then "origin")
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// Branch new work starts from (defaults to jig.baseBranch, then "main")
    #[arg(long, global = true)]
    pub base_branch: Option<String>,

    /// Branch name template with {key}, {type} and {title} placeholders
    #[arg(long, global = true)]
    pub branch_template: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start work on an issue: mark it in progress and create its branch
    Start {
        /// Issue key, e.g. ABC-123
        #[arg(required_unless_present = "new", conflicts_with = "new")]
        key: Option<String>,
        /// Create a new issue assigned to you instead
        #[arg(long, requires = "title")]
        new: bool,
        /// Title of the new issue
        #[arg(long, requires = "new")]
        title: Option<String>,
        /// Description of the new issue
        #[arg(long, requires = "new")]
        description: Option<String>,
        /// Type of the new issue
        #[arg(long = "type", value_enum, default_value_t = IssueType::Feature)]
        issue_type: IssueType,
        /// Project of the new issue (defaults to jig.project)
        #[arg(long, requires = "new")]
        project: Option<String>,
        /// Only update the issue, don't create a branch
        #[arg(long)]
        no_branch: bool,
    },
    /// Push the current branch and open a pull request
    Review {
        /// Show the pull request without pushing or opening it
        #[arg(long)]
        dry_run: bool,
    },
    /// Release the issues fixed since the last tag
    Release {
        /// Version to tag, e.g. v1.2.0
        version: String,
        /// Show the changelog without changing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Configure jig for this repository
    Init,
    /// Manage the local cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Delete all cached entries
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    jig::logging::setup_logging(cli.verbose)?;
    let stdout = &mut std::io::stdout();

    let required = match &cli.command {
        Commands::Init => return cmd_init(stdout),
        Commands::Cache {
            command: CacheCommands::Clear,
        } => {
            let store = open_store();
            cmd_cache_clear(&store, stdout)?;
            return Ok(store.borrow_mut().flush()?);
        }
        Commands::Start { .. } => TRACKER_KEYS,
        Commands::Review { .. } | Commands::Release { .. } => HOST_KEYS,
    };

    let overrides = Overrides {
        remote: cli.remote,
        base_branch: cli.base_branch,
        branch_template: cli.branch_template,
    };
    let config = load_config(&overrides, required)?;

    let store = open_store();
    let tracker = CachedTracker::new(
        JiraClient::new(
            &config.tracker_url,
            config.tracker_user.clone(),
            config.tracker_token.clone(),
            &config.issue_key_pattern,
        )?,
        store.clone(),
        chrono::Duration::seconds(config.cache_ttl_secs),
    );
    let host = GithubClient::new(config.github_token.clone().unwrap_or_default());
    let git = GitClient::new(std::env::current_dir()?);
    let default_project = config.project.clone();
    let app = App::new(config, git, tracker, host)?;

    let result = match cli.command {
        Commands::Start {
            key,
            new,
            title,
            description,
            issue_type,
            project,
            no_branch,
        } => {
            let issue = match key {
                Some(key) if !new => IssueRef::Key(key),
                _ => IssueRef::New(IssueSpec {
                    title: title.unwrap_or_default(),
                    description: description.unwrap_or_default(),
                    issue_type,
                    project: project.unwrap_or(default_project),
                }),
            };
            let work = StartWork {
                issue,
                create_branch: !no_branch,
            };
            app.cmd_start(&work, stdout).await.map(|_| ())
        }
        Commands::Review { dry_run } => app.cmd_review(dry_run, stdout).await,
        Commands::Release { version, dry_run } => {
            app.cmd_release(&version, dry_run, stdout).await
        }
        Commands::Init | Commands::Cache { .. } => Ok(()),
    };

    if let Err(err) = store.borrow_mut().flush() {
        warn!("Failed to write cache: {}", err);
    }
    result
}

/// Load config, asking for and saving any missing required settings first.
fn load_config(overrides: &Overrides, required: &[ConfigKey]) -> Result<Config> {
    match Config::load(overrides, required) {
        Err(Error::ConfigIncomplete(missing)) => {
            eprintln!("jig is not fully configured; answers are saved to git config");
            let keys: Vec<ConfigKey> = missing
                .iter()
                .filter_map(|name| ConfigKey::from_git_name(name))
                .collect();
            prompt_for(&keys, &Config::git_layer()?)?;
            Ok(Config::load(overrides, required)?)
        }
        result => Ok(result?),
    }
}

/// The on-disk cache, or an in-memory one if it can't be opened.
fn open_store() -> SharedStore {
    match FileStore::default_path().map(FileStore::open) {
        Some(Ok(store)) => Rc::new(RefCell::new(store)),
        Some(Err(err)) => {
            warn!("Cache unavailable, continuing without it: {}", err);
            Rc::new(RefCell::new(MemoryStore::new()))
        }
        None => Rc::new(RefCell::new(MemoryStore::new())),
    }
}
