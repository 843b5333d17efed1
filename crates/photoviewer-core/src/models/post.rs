use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Shown when the backend sends a post without a title
const DEFAULT_TITLE: &str = "No title";

/// A post in the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPost")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub image: Option<String>,
}

/// Wire shape; every field may be missing or null.
#[derive(Debug, Deserialize)]
struct RawPost {
    id: Option<i64>,
    title: Option<String>,
    text: Option<String>,
    image: Option<String>,
}

impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Self {
        Self {
            id: raw.id.unwrap_or(-1),
            title: raw.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            text: raw.text.unwrap_or_default(),
            image: raw.image,
        }
    }
}

impl Post {
    /// The image URL, if the post has a usable one
    pub fn image_url(&self) -> Option<&str> {
        self.image
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty() && *url != "null")
    }

    /// Posts the backend could not give an id cannot be edited or deleted
    pub fn has_valid_id(&self) -> bool {
        self.id >= 0
    }
}

/// An image file attached to an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct PostImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PostImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for(&file_name).to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub text: String,
    pub image: PostImage,
}

impl NewPost {
    /// Trims both fields; either one empty is an error
    pub fn new(title: &str, text: &str, image: PostImage) -> Result<Self> {
        Ok(Self {
            title: required("Title", title)?,
            text: required("Text", text)?,
            image,
        })
    }
}

/// Edit of an existing post. The image is only replaced when one is given.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub title: String,
    pub text: String,
    pub image: Option<PostImage>,
}

impl PostUpdate {
    pub fn new(title: &str, text: &str, image: Option<PostImage>) -> Result<Self> {
        Ok(Self {
            title: required("Title", title)?,
            text: required("Text", text)?,
            image,
        })
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        anyhow::bail!("{} is required", field);
    }
    Ok(value.to_string())
}

/// A post whose image has been downloaded.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub post: Post,
    pub image: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_list() {
        let json = r#"[
            {"id": 1, "title": "Sunset", "text": "At the beach", "image": "http://localhost/media/1.jpg"},
            {"id": 2, "title": null, "text": null, "image": null},
            {"title": "Orphan", "image": ""}
        ]"#;

        let posts: Vec<Post> = serde_json::from_str(json).expect("Failed to parse post list JSON");
        assert_eq!(posts.len(), 3);

        assert_eq!(posts[0].title, "Sunset");
        assert_eq!(posts[0].image_url(), Some("http://localhost/media/1.jpg"));

        assert_eq!(posts[1].title, "No title");
        assert_eq!(posts[1].text, "");
        assert_eq!(posts[1].image_url(), None);

        assert_eq!(posts[2].id, -1);
        assert!(!posts[2].has_valid_id());
        assert_eq!(posts[2].image_url(), None);
    }

    #[test]
    fn test_literal_null_image_is_ignored() {
        let post: Post = serde_json::from_str(r#"{"id": 3, "image": "null"}"#).unwrap();
        assert_eq!(post.image_url(), None);
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(PostImage::new("a.JPG", vec![]).mime_type, "image/jpeg");
        assert_eq!(PostImage::new("a.png", vec![]).mime_type, "image/png");
        assert_eq!(PostImage::new("noext", vec![]).mime_type, "application/octet-stream");
    }

    #[test]
    fn test_upload_fields_required() {
        let image = PostImage::new("a.png", vec![1]);
        let post = NewPost::new("  Sunset ", " warm ", image.clone()).unwrap();
        assert_eq!(post.title, "Sunset");
        assert_eq!(post.text, "warm");

        let err = NewPost::new("", "text", image).unwrap_err();
        assert_eq!(err.to_string(), "Title is required");

        let err = PostUpdate::new("Title", "   ", None).unwrap_err();
        assert_eq!(err.to_string(), "Text is required");
    }

    #[test]
    fn test_image_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.jpeg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let image = PostImage::from_path(&path).unwrap();
        assert_eq!(image.file_name, "cat.jpeg");
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.bytes, vec![0xFF, 0xD8, 0xFF]);

        assert!(PostImage::from_path(&dir.path().join("missing.png")).is_err());
    }
}
