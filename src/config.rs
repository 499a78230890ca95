//! Configuration management for the blog client.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `BLOG_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use blog_client::config::Cli;
//!
//! let cli = Cli::parse();
//! println!("API base: {}", cli.config.base_url());
//! ```
//!
//! # Environment Variables
//!
//! - `BLOG_API_URL` - API base address override
//! - `BLOG_ENV` - `production` or `development` (default: development)
//! - `BLOG_SITE_NAME` - Display name of the site (default: My Blog)
//! - `BLOG_STATE_FILE` - Where the token and session id are persisted

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// =============================================================================
// Default Values
// =============================================================================

/// Base address used by development builds when no override is given.
pub const DEVELOPMENT_API_URL: &str = "http://localhost:5000";

/// Base address used by production builds: relative to the serving origin.
pub const PRODUCTION_API_URL: &str = "";

/// Fixed timeout applied to every API request (10 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default display name of the site.
pub const DEFAULT_SITE_NAME: &str = "My Blog";

/// File name of the persisted client state inside the data directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// Which default base address applies when no override is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BuildProfile {
    Production,
    #[default]
    Development,
}

/// Resolve the API base address.
///
/// An explicit, non-empty override always wins. Otherwise production builds
/// use a relative (empty) base and development builds use the local loopback
/// server. Trailing slashes are trimmed so paths can be appended directly.
pub fn resolve_base_url(override_url: Option<&str>, profile: BuildProfile) -> String {
    let base = match override_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => url,
        None => match profile {
            BuildProfile::Production => PRODUCTION_API_URL,
            BuildProfile::Development => DEVELOPMENT_API_URL,
        },
    };
    base.trim_end_matches('/').to_string()
}

/// Default location of the persisted client state.
pub fn default_state_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("blog-client").join(STATE_FILE_NAME))
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Blog Client - talk to a blog API from the command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "blog-client")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// API base address. Overrides the profile default.
    #[arg(long, global = true, env = "BLOG_API_URL")]
    pub api_url: Option<String>,

    /// Build profile that selects the default base address.
    #[arg(long = "env", value_enum, global = true, default_value_t = BuildProfile::Development, env = "BLOG_ENV")]
    pub profile: BuildProfile,

    /// Display name of the site.
    #[arg(long, global = true, default_value = DEFAULT_SITE_NAME, env = "BLOG_SITE_NAME")]
    pub site_name: String,

    /// File holding the persisted token and session identifier.
    #[arg(long, global = true, env = "BLOG_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url().is_empty() {
            return Err(
                "No API base address. Production builds use a relative base; \
                 set --api-url or BLOG_API_URL"
                    .to_string(),
            );
        }

        if self.site_name.trim().is_empty() {
            return Err("site_name must not be empty".to_string());
        }

        if self.state_path().is_none() {
            return Err(
                "No data directory available. Set --state-file or BLOG_STATE_FILE".to_string(),
            );
        }

        Ok(())
    }

    /// The resolved API base address.
    pub fn base_url(&self) -> String {
        resolve_base_url(self.api_url.as_deref(), self.profile)
    }

    /// Where persisted client state lives.
    pub fn state_path(&self) -> Option<PathBuf> {
        self.state_file.clone().or_else(default_state_file)
    }
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List published posts.
    Posts(PostsArgs),

    /// Show a post with its comments.
    Show { id: String },

    /// List the comments on a post.
    Comments { post_id: String },

    /// Add a comment to a post.
    Comment(CommentArgs),

    /// Toggle the like on a post.
    Like { post_id: String },

    /// Toggle the like on a comment.
    LikeComment { comment_id: String },

    /// Log in and persist the token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BLOG_PASSWORD")]
        password: String,
    },

    /// Create an account and persist the token.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BLOG_PASSWORD")]
        password: String,
    },

    /// Forget the persisted token.
    Logout,

    /// Show the logged-in user.
    Whoami,

    /// Print this profile's session identifier.
    SessionId,

    /// Resolve a stored image reference into a fetchable URL.
    ImageUrl {
        reference: String,
        /// Check the URL and print the placeholder if it does not load.
        #[arg(long)]
        check: bool,
    },

    /// Admin operations (requires an admin token).
    #[command(subcommand)]
    Admin(AdminCommand),
}

/// Filters for `posts`.
#[derive(Args, Debug, Clone, Default)]
pub struct PostsArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = 9)]
    pub limit: u32,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// newest, oldest, popular
    #[arg(long, default_value = "newest")]
    pub sort: String,
}

/// Arguments for `comment`.
#[derive(Args, Debug, Clone)]
pub struct CommentArgs {
    pub post_id: String,
    #[arg(long)]
    pub text: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
}

/// Admin subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommand {
    /// Show dashboard statistics.
    Dashboard,

    /// List all posts including drafts.
    Posts {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },

    /// Toggle a post between draft and published.
    Publish { id: String },

    /// Create a post.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "")]
        excerpt: String,
        #[arg(long, default_value = "Other")]
        category: String,
        /// Comma-separated tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        draft: bool,
    },

    /// Edit a post, optionally uploading a new featured image.
    Edit(EditArgs),

    /// Delete a post.
    Delete { id: String },
}

/// Arguments for `admin edit`. Omitted fields keep the post's current value.
#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub excerpt: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// Comma-separated tags; replaces the current set.
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,
    #[arg(long)]
    pub meta_description: Option<String>,
    /// Local image file uploaded as the new featured image.
    #[arg(long)]
    pub image_file: Option<PathBuf>,
    #[arg(long, conflicts_with = "draft")]
    pub publish: bool,
    #[arg(long)]
    pub draft: bool,
}

impl EditArgs {
    /// Requested publish state, if either flag was given.
    pub fn published(&self) -> Option<bool> {
        match (self.publish, self.draft) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
