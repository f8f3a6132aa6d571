use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use scout_core::{ListingSite, ScriptId, SiteGroup};

use super::config::DEFAULT_CONFIG_FILE;

/// Open today's product launches from the listing sites.
#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(about = "Scrape launch listings and open every product in a tab", long_about = None)]
pub struct Cli {
    /// RON configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    /// Write the log to this file instead of ./scout.log.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Also log to the terminal.
    #[arg(long, global = true, default_value_t = false)]
    pub log_to_terminal: bool,

    /// Log debug output.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List listing sites, today's pages and the scripts bound to them.
    Sites,
    /// Run a static extractor on a saved page and print the links.
    Extract {
        /// Script id, e.g. `uneed` or `fazier-detail`.
        #[arg(long)]
        script: ScriptId,
        /// Saved HTML file.
        #[arg(long)]
        html: PathBuf,
        /// URL the page was saved from, used for the listing check.
        #[arg(long)]
        url: Option<String>,
    },
    /// Turn the scraper on or off.
    Toggle {
        #[arg(value_enum)]
        state: SwitchState,
    },
    /// Manage the premium license.
    License {
        #[command(subcommand)]
        action: LicenseAction,
    },
    /// Manage the free trial.
    Trial {
        #[command(subcommand)]
        action: TrialAction,
    },
    /// Show the switch, license and trial state.
    Status,
    /// Open listing pages and every product on them.
    Launch(LaunchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    pub fn enabled(self) -> bool {
        self == SwitchState::On
    }
}

#[derive(Subcommand, Debug)]
pub enum LicenseAction {
    /// Activate a license key on this device.
    Activate { key: String },
    /// Show the stored activation and validate it online.
    Status,
    /// Release the activation on this device.
    Deactivate,
}

#[derive(Subcommand, Debug)]
pub enum TrialAction {
    /// Start the free trial on this device.
    Start,
    /// Show the days left in the trial.
    Status,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LaunchArgs {
    /// Listing sites to open, e.g. `--site uneed --site fazier`.
    #[arg(long = "site")]
    pub sites: Vec<ListingSite>,

    /// Open every site of a group.
    #[arg(long, conflicts_with = "sites")]
    pub group: Option<SiteGroup>,

    /// Only record tab requests; no browser is involved.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Exit once every script has finished instead of waiting for tabs to close.
    #[arg(long, default_value_t = false)]
    pub no_wait: bool,
}

impl LaunchArgs {
    /// Sites to open; the daily group when nothing was chosen.
    pub fn selected_sites(&self) -> Vec<ListingSite> {
        if !self.sites.is_empty() {
            let mut sites = Vec::new();
            for site in &self.sites {
                if !sites.contains(site) {
                    sites.push(*site);
                }
            }
            return sites;
        }
        ListingSite::in_group(self.group.unwrap_or(SiteGroup::Daily))
    }
}
