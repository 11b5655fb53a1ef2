//! The `stamp profile` command for saved watermark profiles.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use stamp_core::{BatchProcessConfig, Config, WatermarkProfile};

use super::watermark_args::WatermarkArgs;

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Save the given watermark flags as a named profile
    New {
        /// Profile name
        name: String,

        /// Short description
        #[arg(short, long)]
        description: Option<String>,

        /// Overwrite an existing profile with the same name
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        watermark: WatermarkArgs,
    },

    /// Print a profile as JSON
    Show {
        /// Profile name or path to a profile file
        profile: String,
    },

    /// Validate a profile file
    Check {
        /// Profile name or path to a profile file
        profile: String,
    },

    /// List saved profiles
    List,
}

/// Execute the profile command.
pub fn execute(args: ProfileArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ProfileCommand::New {
            name,
            description,
            force,
            watermark,
        } => {
            let mut profile = WatermarkProfile::new(name, watermark.merge_into(BatchProcessConfig::default()));
            profile.description = description;

            let path = profile.path_in(&config.profile_dir());
            if path.exists() && !force {
                anyhow::bail!(
                    "Profile already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            profile.save(&path)?;
            println!("Profile saved to: {}", path.display());
        }

        ProfileCommand::Show { profile } => {
            let path = resolve_profile_path(&profile, config);
            let profile = WatermarkProfile::load(&path)?;
            println!("{}", profile.to_json()?);
        }

        ProfileCommand::Check { profile } => {
            let path = resolve_profile_path(&profile, config);
            let profile = WatermarkProfile::load(&path)?;
            println!(
                "{}: ok ({} text, {} logo watermark(s))",
                path.display(),
                profile.config.text_watermarks.len(),
                profile.config.image_watermarks.len()
            );
        }

        ProfileCommand::List => {
            let dir = config.profile_dir();
            let Ok(entries) = std::fs::read_dir(&dir) else {
                tracing::info!("No profile directory at {:?}", dir);
                return Ok(());
            };
            let mut paths: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            paths.sort();
            for path in paths {
                match WatermarkProfile::load(&path) {
                    Ok(profile) => println!(
                        "{:<24} {}",
                        profile.name,
                        profile.description.unwrap_or_default()
                    ),
                    Err(e) => tracing::warn!("Skipping {:?}: {e}", path),
                }
            }
        }
    }

    Ok(())
}

/// An existing path is used as-is; anything else is a name in the profile directory.
pub fn resolve_profile_path(profile: &str, config: &Config) -> PathBuf {
    let as_path = PathBuf::from(profile);
    if as_path.exists() {
        return as_path;
    }
    WatermarkProfile::new(profile, BatchProcessConfig::default()).path_in(&config.profile_dir())
}
