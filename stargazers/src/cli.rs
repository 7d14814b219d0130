use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch a GitHub repository's stargazers", long_about = None)]
pub struct Args {
    /// Configuration file (default: ./config.toml, then the user config directory)
    #[arg(short, long, global = true, env = "STARGAZERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Watch the repository and send notifications (default)
    Watch,

    /// List stargazers ordered by follower count
    Kol {
        /// Only show the top N stargazers
        #[arg(long)]
        top: Option<usize>,

        /// Concurrent user lookups
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Send a test message through every configured channel
    TestChannels,
}

impl Args {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Watch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_watch() {
        let args = Args::parse_from(["stargazers"]);
        assert_eq!(args.command(), Commands::Watch);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_kol_flags() {
        let args = Args::parse_from(["stargazers", "-v", "kol", "--top", "20"]);
        assert!(args.verbose);
        assert_eq!(
            args.command(),
            Commands::Kol {
                top: Some(20),
                concurrency: 4
            }
        );
    }

    #[test]
    fn test_global_config_flag() {
        let args = Args::parse_from(["stargazers", "test-channels", "--config", "/tmp/s.toml"]);
        assert_eq!(args.command(), Commands::TestChannels);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/s.toml")));
    }
}
