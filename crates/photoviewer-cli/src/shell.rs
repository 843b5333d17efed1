//! Interactive shell. Each screen (login, feed) is a foreground surface for
//! as long as it is shown.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use photoviewer_core::api::ApiError;
use photoviewer_core::auth::AuthError;
use photoviewer_core::models::{FeedItem, NewPost, PostImage, PostUpdate};
use photoviewer_core::{App, Route};

const FEED_HELP: &str = "\
Commands:
  list                  refresh the feed
  show <id>             show one post
  upload <image-path>   create a post
  edit <id> [image]     edit a post, optionally replacing its image
  delete <id>           delete a post
  logout                forget the login
  quit                  exit";

#[derive(Debug, PartialEq, Eq)]
enum Next {
    Continue,
    Quit,
}

pub async fn run(app: &mut App) -> Result<()> {
    loop {
        let next = match app.route() {
            Route::Login => login_screen(app).await?,
            Route::Feed => feed_screen(app).await?,
        };
        if next == Next::Quit {
            return Ok(());
        }
    }
}

/// Print `label` and read one trimmed line; `None` on end of input
fn prompt(label: &str) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn confirm(label: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    let answer = prompt(&format!("{} {} ", label, hint))?.unwrap_or_default();
    Ok(match answer.to_ascii_lowercase().as_str() {
        "" => default_yes,
        "y" | "yes" => true,
        _ => false,
    })
}

// ============================================================================
// Login Screen
// ============================================================================

async fn login_screen(app: &mut App) -> Result<Next> {
    let _surface = app.tracker().enter("login");
    println!("\n== Log in ==  (type 'quit' as username to exit)");

    let remembered = app.login_flow().remembered_username();

    loop {
        let label = match remembered {
            Some(ref name) => format!("Username [{}]: ", name),
            None => "Username: ".to_string(),
        };
        let Some(mut username) = prompt(&label)? else {
            return Ok(Next::Quit);
        };
        if username == "quit" {
            return Ok(Next::Quit);
        }
        if username.is_empty() {
            username = remembered.clone().unwrap_or_default();
        }

        let password = rpassword::prompt_password("Password: ")?;
        let remember = confirm("Remember username?", remembered.is_some())?;

        println!("Logging in...");
        match app.login(&username, &password, remember).await {
            Ok(()) => return Ok(Next::Continue),
            // A store that cannot be written is not a user mistake.
            Err(AuthError::Store(e)) => return Err(e.into()),
            Err(e) => eprintln!("{}", e),
        }
    }
}

// ============================================================================
// Feed Screen
// ============================================================================

async fn feed_screen(app: &mut App) -> Result<Next> {
    let _surface = app.tracker().enter("feed");
    println!("\n== Feed ==");
    println!("{}", FEED_HELP);

    let mut feed: Vec<FeedItem> = Vec::new();
    refresh(app, &mut feed).await;

    loop {
        let Some(line) = prompt("> ")? else {
            return Ok(Next::Quit);
        };
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let result = match command {
            "" => Ok(()),
            "help" => {
                println!("{}", FEED_HELP);
                Ok(())
            }
            "list" => {
                refresh(app, &mut feed).await;
                Ok(())
            }
            "show" => show(&feed, &args),
            "upload" => upload(app, &mut feed, &args).await,
            "edit" => edit(app, &mut feed, &args).await,
            "delete" => delete(app, &mut feed, &args).await,
            "logout" => {
                app.logout()?;
                println!("Logged out.");
                return Ok(Next::Continue);
            }
            "quit" | "exit" => return Ok(Next::Quit),
            other => {
                println!("Unknown command '{}'. Type 'help'.", other);
                Ok(())
            }
        };

        if let Err(e) = result {
            eprintln!("Error: {}", e);
            if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)) {
                warn!("Backend rejected the token");
                eprintln!("The server no longer accepts this login; use 'logout' and sign in again.");
            }
        }
    }
}

async fn refresh(app: &App, feed: &mut Vec<FeedItem>) {
    println!("Syncing posts...");
    match app.api().fetch_feed().await {
        Ok(items) => {
            *feed = items;
            for item in feed.iter() {
                println!(
                    "  #{:<4} {}  ({} KB)",
                    item.post.id,
                    item.post.title,
                    item.image.len().div_ceil(1024)
                );
            }
            println!("Loaded {} posts.", feed.len());
        }
        Err(e) => eprintln!("Could not load posts: {}", e),
    }
}

fn parse_id(args: &[&str]) -> Result<i64> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("A post id is required"))?;
    let id: i64 = raw
        .parse()
        .map_err(|_| anyhow::anyhow!("'{}' is not a post id", raw))?;
    if id < 0 {
        anyhow::bail!("'{}' is not a post id", raw);
    }
    Ok(id)
}

fn show(feed: &[FeedItem], args: &[&str]) -> Result<()> {
    let id = parse_id(args)?;
    let item = feed
        .iter()
        .find(|item| item.post.id == id)
        .ok_or_else(|| anyhow::anyhow!("Post {} is not in the feed; try 'list'", id))?;

    println!("#{} {}", item.post.id, item.post.title);
    println!("{}", item.post.text);
    if let Some(url) = item.post.image_url() {
        println!("image: {} ({} bytes)", url, item.image.len());
    }
    Ok(())
}

async fn upload(app: &App, feed: &mut Vec<FeedItem>, args: &[&str]) -> Result<()> {
    let path = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("An image path is required"))?;
    let image = PostImage::from_path(Path::new(path))?;

    let title = prompt("Title: ")?.unwrap_or_default();
    let text = prompt("Text: ")?.unwrap_or_default();
    let post = NewPost::new(&title, &text, image)?;

    app.api().create_post(&post).await?;
    println!("Post uploaded.");
    refresh(app, feed).await;
    Ok(())
}

async fn edit(app: &App, feed: &mut Vec<FeedItem>, args: &[&str]) -> Result<()> {
    let id = parse_id(args)?;
    let current = feed
        .iter()
        .find(|item| item.post.id == id)
        .map(|item| item.post.clone());

    let image = match args.get(1) {
        Some(path) => Some(PostImage::from_path(Path::new(path))?),
        None => None,
    };

    let (title_label, text_label) = match &current {
        Some(post) => (format!("Title [{}]: ", post.title), format!("Text [{}]: ", post.text)),
        None => ("Title: ".to_string(), "Text: ".to_string()),
    };
    let mut title = prompt(&title_label)?.unwrap_or_default();
    let mut text = prompt(&text_label)?.unwrap_or_default();
    if let Some(post) = current {
        if title.is_empty() {
            title = post.title;
        }
        if text.is_empty() {
            text = post.text;
        }
    }

    let update = PostUpdate::new(&title, &text, image)?;
    app.api().update_post(id, &update).await?;
    debug!(id, "Edit saved");
    println!("Post {} updated.", id);
    refresh(app, feed).await;
    Ok(())
}

async fn delete(app: &App, feed: &mut Vec<FeedItem>, args: &[&str]) -> Result<()> {
    let id = parse_id(args)?;
    if !confirm(&format!("Delete post {}?", id), false)? {
        return Ok(());
    }
    remove(app, feed, id).await
}

async fn remove(app: &App, feed: &mut Vec<FeedItem>, id: i64) -> Result<()> {
    app.api().delete_post(id).await?;
    println!("Post {} deleted.", id);
    refresh(app, feed).await;
    Ok(())
}
