//! Blog Client - command-line front end for the blog API.
//!
//! This binary wires storage, session identity and the request pipeline
//! together, runs one command, and plays the role of the application layer:
//! it listens for auth-expired events and sends the user back to `login`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blog_client::{
    api::{
        ApiClient, AuthEvent, Credentials, ImageUpload, NewComment, PostDraft, PostEdit, PostQuery,
        Registration,
    },
    config::{AdminCommand, Cli, Command, Config, EditArgs, PostsArgs},
    image::{fallback_image, is_image_accessible, ImageResolver},
    interaction::{ApiLikeTarget, LikeController, ToggleOutcome},
    session::{AuthSession, SessionIdentity, SessionStore},
    storage::FileStore,
    ApiError, AuthError, LikeKind, Post,
};

/// Exit code used when the server rejected our credentials.
const EXIT_AUTH_REQUIRED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.config.verbose);

    if let Err(e) = cli.config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let app = match App::build(&cli.config) {
        Ok(app) => app,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut events = app.client.subscribe();
    let result = app.run(cli.command).await;

    if session_expired(&mut events) {
        eprintln!();
        eprintln!("Your session has expired or is not valid.");
        eprintln!("Log in again with: blog-client login --email <email>");
        return ExitCode::from(EXIT_AUTH_REQUIRED);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "blog_client=debug"
    } else {
        "blog_client=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Drain pending events; true if any request hit a 401.
fn session_expired(events: &mut broadcast::Receiver<AuthEvent>) -> bool {
    let mut expired = false;
    while let Ok(event) = events.try_recv() {
        match event {
            AuthEvent::Expired { path } => {
                debug!(path = %path, "Received auth expiry");
                expired = true;
            }
        }
    }
    expired
}

fn describe(error: ApiError) -> String {
    error.user_message()
}

fn or_default<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.is_empty() {
        fallback
    } else {
        message
    }
}

fn describe_auth(error: AuthError) -> String {
    match error {
        AuthError::Api(e) => e.user_message(),
        other => other.to_string(),
    }
}

// =============================================================================
// Application
// =============================================================================

struct App {
    client: ApiClient,
    auth: Arc<AuthSession>,
    images: ImageResolver,
    site_name: String,
}

impl App {
    fn build(config: &Config) -> Result<Self, String> {
        let path = config
            .state_path()
            .ok_or_else(|| "No state file location available".to_string())?;
        debug!(path = %path.display(), "Using client state file");

        let storage = Arc::new(FileStore::new(path));
        let identity = Arc::new(SessionIdentity::new(storage.clone()));
        let session = SessionStore::new(storage);

        let base_url = config.base_url();
        let client = ApiClient::new(&base_url, session, identity).map_err(|e| e.to_string())?;
        let auth = Arc::new(AuthSession::new(client.clone()));

        Ok(Self {
            client,
            auth,
            images: ImageResolver::new(Some(&base_url)),
            site_name: config.site_name.clone(),
        })
    }

    async fn run(&self, command: Command) -> Result<(), String> {
        match command {
            Command::Posts(args) => self.posts(args).await,
            Command::Show { id } => self.show(&id).await,
            Command::Comments { post_id } => self.comments(&post_id).await,
            Command::Comment(args) => {
                let comment = NewComment {
                    text: args.text,
                    username: args.name,
                    email: args.email,
                };
                let saved = self
                    .client
                    .add_comment(&args.post_id, &comment)
                    .await
                    .map_err(describe)?;
                match saved.comment {
                    Some(created) => println!("Comment added ({})", created.id),
                    None => println!("{}", or_default(&saved.message, "Comment added")),
                }
                Ok(())
            }
            Command::Like { post_id } => self.like(LikeKind::Post, &post_id).await,
            Command::LikeComment { comment_id } => {
                self.like(LikeKind::Comment, &comment_id).await
            }
            Command::Login { email, password } => {
                let user = self
                    .auth
                    .login(&Credentials { email, password })
                    .await
                    .map_err(describe_auth)?;
                println!("Logged in as {} ({})", user.username, user.role);
                Ok(())
            }
            Command::Register {
                username,
                email,
                password,
            } => {
                let user = self
                    .auth
                    .register(&Registration {
                        username,
                        email,
                        password,
                    })
                    .await
                    .map_err(describe_auth)?;
                println!("Welcome to {}, {}!", self.site_name, user.username);
                Ok(())
            }
            Command::Logout => {
                self.auth.logout();
                println!("Logged out");
                Ok(())
            }
            Command::Whoami => match self.auth.restore().await.map_err(describe_auth)? {
                Some(user) => {
                    println!("{} <{}> role={}", user.username, user.email, user.role);
                    Ok(())
                }
                None => {
                    println!("Not logged in");
                    Ok(())
                }
            },
            Command::SessionId => {
                println!("{}", self.client.identity().session_id());
                Ok(())
            }
            Command::ImageUrl { reference, check } => {
                let url = self
                    .images
                    .resolve(&reference)
                    .ok_or_else(|| "Empty image reference".to_string())?;
                if check && !is_image_accessible(self.client.http(), &url).await {
                    println!("{}", fallback_image(&url, None));
                } else {
                    println!("{}", url);
                }
                Ok(())
            }
            Command::Admin(admin) => self.admin(admin).await,
        }
    }

    async fn posts(&self, args: PostsArgs) -> Result<(), String> {
        let query = PostQuery {
            page: Some(args.page),
            limit: Some(args.limit),
            search: args.search,
            category: args.category,
            sort: Some(args.sort),
            status: None,
        };
        let list = self.client.list_posts(&query).await.map_err(describe)?;

        println!("{}", self.site_name);
        println!("{}", "─".repeat(self.site_name.chars().count().max(8)));
        if list.posts.is_empty() {
            println!("  (no posts found)");
        }
        for post in &list.posts {
            self.print_post_line(post);
        }
        let pages = &list.pagination;
        if pages.total_pages > 0 {
            println!();
            println!(
                "Page {} of {} ({} posts)",
                pages.current_page, pages.total_pages, pages.total_posts
            );
        }
        Ok(())
    }

    fn print_post_line(&self, post: &Post) {
        println!(
            "  {}  {}  [{}] ♥ {}  by {}",
            post.id, post.title, post.category, post.likes_count, post.author.username
        );
    }

    async fn show(&self, id: &str) -> Result<(), String> {
        let detail = self.client.get_post(id).await.map_err(describe)?;
        let post = &detail.post;

        println!("{}", post.title);
        println!("by {} · {} ♥", post.author.username, post.likes_count);
        if let Some(url) = self.images.resolve_opt(post.featured_image.as_deref()) {
            println!("image: {}", url);
        }
        if !post.tags.is_empty() {
            println!("tags: {}", post.tags.join(", "));
        }
        println!();
        println!("{}", post.content);

        self.comments(id).await?;

        if !detail.related_posts.is_empty() {
            println!();
            println!("Related:");
            for related in &detail.related_posts {
                self.print_post_line(related);
            }
        }
        Ok(())
    }

    async fn comments(&self, post_id: &str) -> Result<(), String> {
        let comments = self.client.list_comments(post_id).await.map_err(describe)?;
        println!();
        println!("Comments ({})", comments.len());
        if comments.is_empty() {
            println!("  No comments yet. Be the first to comment!");
        }
        for comment in &comments {
            println!(
                "  [{}] {}: {} ♥ {}",
                comment.id, comment.username, comment.text, comment.likes_count
            );
        }
        Ok(())
    }

    async fn like(&self, kind: LikeKind, id: &str) -> Result<(), String> {
        let controller = LikeController::new(
            ApiLikeTarget::new(self.client.clone(), kind, id),
            Default::default(),
        );
        let _ = controller.mount().await;

        match controller.toggle().await {
            ToggleOutcome::Confirmed(state) => {
                let verb = if state.liked { "Liked" } else { "Unliked" };
                println!("{} {} {} ({} likes)", verb, kind, id, state.likes_count);
                Ok(())
            }
            ToggleOutcome::RolledBack { error, .. } => Err(describe(error)),
            other => Err(format!("Toggle not sent: {:?}", other)),
        }
    }

    async fn admin(&self, command: AdminCommand) -> Result<(), String> {
        match command {
            AdminCommand::Dashboard => {
                let stats = self.client.dashboard().await.map_err(describe)?;
                println!(
                    "Posts:     {} ({} published, {} drafts)",
                    stats.total_posts, stats.published_posts, stats.draft_posts
                );
                println!("Comments:  {}", stats.total_comments);
                println!("Views:     {}", stats.total_views);
                Ok(())
            }
            AdminCommand::Posts {
                status,
                category,
                search,
            } => {
                let query = PostQuery {
                    status,
                    category,
                    search,
                    ..Default::default()
                };
                let list = self.client.admin_posts(&query).await.map_err(describe)?;
                for post in &list.posts {
                    let state = if post.published { "published" } else { "draft" };
                    println!("  {}  {:<9}  {}", post.id, state, post.title);
                }
                Ok(())
            }
            AdminCommand::Publish { id } => {
                let message = self.client.toggle_publish(&id).await.map_err(describe)?;
                println!("{}", or_default(&message, "Updated"));
                Ok(())
            }
            AdminCommand::Create {
                title,
                content,
                excerpt,
                category,
                tags,
                image,
                draft,
            } => {
                let draft = PostDraft {
                    title,
                    content,
                    excerpt,
                    category,
                    tags,
                    meta_description: None,
                    status: if draft { "draft" } else { "published" }.to_string(),
                    featured_image: image,
                };
                let saved = self.client.create_post(&draft).await.map_err(describe)?;
                match saved.post {
                    Some(post) => println!("Created post {}", post.id),
                    None => println!("{}", or_default(&saved.message, "Post created")),
                }
                Ok(())
            }
            AdminCommand::Edit(args) => self.edit(args).await,
            AdminCommand::Delete { id } => {
                self.client.delete_post(&id).await.map_err(describe)?;
                println!("Deleted post {}", id);
                Ok(())
            }
        }
    }

    /// Load the post, overlay the given fields and send the multipart edit.
    async fn edit(&self, args: EditArgs) -> Result<(), String> {
        let published = args.published();
        let current = self.client.get_post(&args.id).await.map_err(describe)?.post;

        let image = match args.image_file {
            Some(ref path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".to_string());
                debug!(file = %file_name, size = bytes.len(), "Uploading featured image");
                Some(ImageUpload::new(file_name, bytes))
            }
            None => None,
        };

        let edit = PostEdit {
            title: args.title.unwrap_or(current.title),
            content: args.content.unwrap_or(current.content),
            excerpt: args.excerpt.unwrap_or(current.excerpt),
            category: args.category.unwrap_or(current.category),
            tags: args.tags.unwrap_or(current.tags),
            meta_description: args.meta_description.or(current.meta_description),
            published: published.unwrap_or(current.published),
        };

        let saved = self
            .client
            .edit_post(&args.id, &edit, image)
            .await
            .map_err(describe)?;
        println!("{}", or_default(&saved.message, "Post updated"));
        Ok(())
    }
}
