//! API client for the photo backend.
//!
//! This module provides the `ApiClient` struct for logging in and for
//! listing, uploading, editing and deleting posts.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{FeedItem, NewPost, Post, PostImage, PostUpdate};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/api/auth/login/";

const POSTS_PATH: &str = "/api_root/Post/";

/// Maximum concurrent image downloads when loading the feed.
const MAX_CONCURRENT_DOWNLOADS: usize = 4;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// API client for the photo backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against `base_url` (e.g. `http://127.0.0.1:8000`)
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post_url(&self, id: i64) -> String {
        format!("{}{}{}/", self.base_url, POSTS_PATH, id)
    }

    // ===== Authentication =====

    /// Exchange username and password for a token.
    ///
    /// A non-200 answer becomes [`ApiError::LoginFailed`] carrying the
    /// backend's `error` message, or "Login failed" when it has none.
    pub async fn login(&self, username: &str, password: &str) -> std::result::Result<String, ApiError> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Login rejected");
            return Err(ApiError::login_failed(&body));
        }

        let body = response.text().await?;
        let parsed: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;
        Ok(parsed.token)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Token {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    // ===== Posts =====

    /// Fetch every post
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let url = self.url(POSTS_PATH);
        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;
        let posts: Vec<Post> = response
            .json()
            .await
            .context("Failed to parse post list")?;
        debug!(count = posts.len(), "Posts received");
        Ok(posts)
    }

    /// Upload a new post with its image
    pub async fn create_post(&self, post: &NewPost) -> Result<()> {
        let form = Form::new()
            .text("title", post.title.clone())
            .text("text", post.text.clone())
            .part("image", image_part(&post.image)?);

        let url = self.url(POSTS_PATH);
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload post")?;

        Self::check_response(response).await?;
        debug!(title = %post.title, "Post created");
        Ok(())
    }

    /// Replace a post's title and text, and its image when one is given
    pub async fn update_post(&self, id: i64, update: &PostUpdate) -> Result<()> {
        let mut form = Form::new()
            .text("title", update.title.clone())
            .text("text", update.text.clone());
        if let Some(ref image) = update.image {
            form = form.part("image", image_part(image)?);
        }

        let response = self
            .client
            .put(self.post_url(id))
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to update post {}", id))?;

        Self::check_response(response).await?;
        debug!(id, "Post updated");
        Ok(())
    }

    pub async fn delete_post(&self, id: i64) -> Result<()> {
        let response = self
            .client
            .delete(self.post_url(id))
            .headers(self.auth_headers()?)
            .send()
            .await
            .with_context(|| format!("Failed to delete post {}", id))?;

        Self::check_response(response).await?;
        debug!(id, "Post deleted");
        Ok(())
    }

    // ===== Images =====

    /// Download an image by absolute URL
    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download image {}", url))?;

        let response = Self::check_response(response).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read image body {}", url))?;
        Ok(bytes.to_vec())
    }

    /// Fetch the post list and download every image.
    ///
    /// Posts without an image, or whose image cannot be downloaded, are left
    /// out of the feed. Order of the post list is kept.
    pub async fn fetch_feed(&self) -> Result<Vec<FeedItem>> {
        let posts = self.list_posts().await?;

        let items: Vec<Option<FeedItem>> = stream::iter(posts)
            .map(|post| async move {
                let Some(url) = post.image_url().map(str::to_string) else {
                    warn!(id = post.id, "Post has no image");
                    return None;
                };
                match self.fetch_image(&url).await {
                    Ok(image) => Some(FeedItem { post, image }),
                    Err(e) => {
                        warn!(id = post.id, error = %e, "Image download failed");
                        None
                    }
                }
            })
            .buffered(MAX_CONCURRENT_DOWNLOADS)
            .collect()
            .await;

        let feed: Vec<FeedItem> = items.into_iter().flatten().collect();
        debug!(count = feed.len(), "Feed loaded");
        Ok(feed)
    }
}

fn image_part(image: &PostImage) -> Result<Part> {
    Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.mime_type)
        .context("Invalid image mime type")
}
