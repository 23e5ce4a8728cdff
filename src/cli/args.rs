//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Twitter/X Spaces downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "spaces-dl",
    version,
    about = "Download recorded Twitter/X Spaces as MP3",
    long_about = "Logs in to X, resolves a recorded Space, downloads its audio segments \
                  (resuming an interrupted download) and encodes them into a single MP3 with ffmpeg."
)]
pub struct Args {
    /// Space ID or space URL (https://x.com/i/spaces/<id>).
    #[arg(short, long)]
    pub id: String,

    /// Directory for the finished file and the task working directory.
    #[arg(short, long, env = "SPACES_DL_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Account username, email or phone number.
    #[arg(long, env = "TWITTER_USERNAME")]
    pub username: Option<String>,

    /// Account password.
    #[arg(long, env = "TWITTER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Phone number for the login verification challenge.
    #[arg(long = "phone-number", env = "TWITTER_PHONE_NUMBER", hide_env_values = true)]
    pub phone_number: Option<String>,

    /// Log in through a browser instead of the API login flow.
    #[arg(short, long)]
    pub browser_login: bool,

    /// Never fall back to browser login.
    #[arg(short, long)]
    pub disable_browser_login: bool,

    /// Path to configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Retries per segment after the first attempt.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Keep the task working directory instead of cleaning it up.
    #[arg(long)]
    pub keep_workdir: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(self, config: &mut Config) {
        // Override account settings if provided
        if let Some(username) = self.username {
            config.account.username = username;
        }

        if let Some(password) = self.password {
            config.account.password = password;
        }

        if let Some(phone_number) = self.phone_number {
            config.account.phone_number = Some(phone_number);
        }

        // Override options if provided
        if let Some(dir) = self.output {
            config.options.output_directory = Some(dir);
        }

        if let Some(retries) = self.max_retries {
            config.options.max_retries = retries;
        }

        // Boolean flags (only override if set to non-default)
        if self.browser_login {
            config.options.browser_login = true;
        }

        if self.disable_browser_login {
            config.options.disable_browser_login = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "spaces-dl",
            "-i",
            "https://x.com/i/spaces/1YqKDqDXAbwKV",
            "-o",
            "/srv/spaces",
            "-d",
            "--max-retries",
            "3",
        ])
        .unwrap();

        assert_eq!(args.id, "https://x.com/i/spaces/1YqKDqDXAbwKV");
        assert!(args.disable_browser_login);
        assert!(!args.keep_workdir);
    }

    #[test]
    fn test_id_is_required() {
        assert!(Args::try_parse_from(["spaces-dl"]).is_err());
    }

    #[test]
    fn test_merge_overrides_config() {
        let mut config = Config::default();
        config.account.username = "from_file".into();
        config.options.max_retries = 10;

        let args = Args::try_parse_from([
            "spaces-dl",
            "--id",
            "1YqKDqDXAbwKV",
            "--username",
            "from_cli",
            "--max-retries",
            "2",
            "-b",
        ])
        .unwrap();
        args.merge_into_config(&mut config);

        assert_eq!(config.account.username, "from_cli");
        assert_eq!(config.options.max_retries, 2);
        assert!(config.options.browser_login);
        assert!(!config.options.disable_browser_login);
    }
}
