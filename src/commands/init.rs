use anyhow::Result;
use dialoguer::Input;
use dialoguer::Password;

use crate::config::Config;
use crate::config::ConfigKey;
use crate::config::Layer;

/// Prompt for every setting, offering the current values as defaults, and
/// save the answers to git config.
pub fn cmd_init(stdout: &mut impl std::io::Write) -> Result<()> {
    let current = Config::git_layer()?;

    writeln!(stdout, "Create a Jira API token at:")?;
    writeln!(
        stdout,
        "https://id.atlassian.com/manage-profile/security/api-tokens"
    )?;
    writeln!(stdout)?;
    writeln!(
        stdout,
        "Create a fine-grained personal access token for this repository at:"
    )?;
    writeln!(
        stdout,
        "https://github.com/settings/personal-access-tokens/new"
    )?;
    writeln!(stdout)?;
    writeln!(stdout, "Required permissions:")?;
    writeln!(stdout, "  - Contents: Read and write")?;
    writeln!(stdout, "  - Pull requests: Read and write")?;
    writeln!(stdout)?;

    prompt_for(&ConfigKey::ALL, &current)?;

    writeln!(stdout, "Configuration saved to git config")?;

    Ok(())
}

/// Ask for each of `keys` and save the answers to git config.
///
/// A secret left blank keeps its current value.
pub fn prompt_for(keys: &[ConfigKey], current: &Layer) -> Result<()> {
    for key in keys {
        let existing = current.get(key).filter(|value| !value.is_empty());

        let value = if key.is_secret() {
            let prompt = match existing {
                Some(_) => format!("{} (leave blank to keep)", key.prompt()),
                None => key.prompt().to_string(),
            };
            Password::new()
                .with_prompt(prompt)
                .allow_empty_password(existing.is_some())
                .interact()?
        } else {
            let mut input = Input::<String>::new().with_prompt(key.prompt());
            let default = existing
                .cloned()
                .or_else(|| key.default_value().map(str::to_string));
            if let Some(default) = default {
                input = input.default(default);
            }
            input.interact_text()?
        };

        if value.is_empty() {
            continue;
        }
        Config::save(*key, &value)?;
    }

    Ok(())
}
