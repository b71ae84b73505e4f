use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info};

use super::tools::{ToolHandler, ToolKind};
use super::types::Tool;
use crate::{
    apify::{ActorError, ActorRun, ActorRunner},
    config::ResultMode,
};

pub const FACEBOOK_POSTS_ACTOR: &str = "apify/facebook-posts-scraper";
pub const FACEBOOK_COMMENTS_ACTOR: &str = "apify/facebook-comments-scraper";

const MIN_RESULTS: i64 = 1;
const MAX_RESULTS: i64 = 1000;

const SUMMARY_POSTS: usize = 5;
const SUMMARY_POST_TEXT_CHARS: usize = 200;
const SUMMARY_COMMENTS: usize = 10;
const SUMMARY_COMMENT_TEXT_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Actor(#[from] ActorError),

    #[error("Actor run failed with status: {0}")]
    RunFailed(String),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments(_) => "InvalidArguments",
            ToolError::Actor(err) => err.kind(),
            ToolError::RunFailed(_) => "RunFailed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewOption {
    #[default]
    RankedUnfiltered,
    Top,
    MostRecent,
}

impl ViewOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewOption::RankedUnfiltered => "RANKED_UNFILTERED",
            ViewOption::Top => "TOP",
            ViewOption::MostRecent => "MOST_RECENT",
        }
    }
}

impl std::str::FromStr for ViewOption {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RANKED_UNFILTERED" => Ok(ViewOption::RankedUnfiltered),
            "TOP" => Ok(ViewOption::Top),
            "MOST_RECENT" => Ok(ViewOption::MostRecent),
            other => Err(ToolError::InvalidArguments(format!(
                "Invalid view_option '{}'. Valid options: RANKED_UNFILTERED, TOP, MOST_RECENT",
                other
            ))),
        }
    }
}

/// Arguments of `scrape_facebook_posts`. Each option may arrive in camelCase
/// or snake_case; a present, non-empty camelCase value wins.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostsArguments {
    #[serde(rename = "startUrls")]
    pub start_urls_camel: Option<Value>,
    pub start_urls: Option<Value>,
    #[serde(rename = "resultsLimit")]
    pub results_limit_camel: Option<f64>,
    pub results_limit: Option<f64>,
    #[serde(rename = "captionText")]
    pub caption_text_camel: Option<bool>,
    pub caption_text: Option<bool>,
    #[serde(rename = "onlyPostsNewerThan")]
    pub only_posts_newer_than_camel: Option<String>,
    pub only_posts_newer_than: Option<String>,
    #[serde(rename = "onlyPostsOlderThan")]
    pub only_posts_older_than_camel: Option<String>,
    pub only_posts_older_than: Option<String>,
}

/// Arguments of `scrape_facebook_comments`, with the same precedence rules
/// as [`PostsArguments`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentsArguments {
    #[serde(rename = "startUrls")]
    pub start_urls_camel: Option<Value>,
    pub start_urls: Option<Value>,
    #[serde(rename = "resultsLimit")]
    pub results_limit_camel: Option<f64>,
    pub results_limit: Option<f64>,
    #[serde(rename = "includeNestedComments")]
    pub include_nested_comments_camel: Option<bool>,
    pub include_nested_comments: Option<bool>,
    #[serde(rename = "viewOption")]
    pub view_option_camel: Option<String>,
    pub view_option: Option<String>,
}

fn parse_arguments<T: DeserializeOwned>(arguments: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ToolError::InvalidArguments(format!("Invalid arguments: {}", e)))
}

/// Null, empty strings, empty lists and empty objects count as absent.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn pick_urls<'a>(camel: Option<&'a Value>, snake: Option<&'a Value>) -> Option<&'a Value> {
    camel
        .filter(|v| !is_blank(v))
        .or(snake.filter(|v| !is_blank(v)))
}

fn pick_text(camel: Option<String>, snake: Option<String>) -> Option<String> {
    camel
        .filter(|s| !s.is_empty())
        .or(snake.filter(|s| !s.is_empty()))
}

/// A zero limit counts as absent and falls back to `default`.
fn pick_limit(camel: Option<f64>, snake: Option<f64>, default: i64) -> f64 {
    camel
        .filter(|n| *n != 0.0)
        .or(snake.filter(|n| *n != 0.0))
        .unwrap_or(default as f64)
}

/// Coerce the accepted `start_urls` shapes into `[{"url": ...}, ...]`.
///
/// Accepts a single URL string, a list of URL strings, a list of objects with
/// a `url` key, or any mix of the two list forms.
pub fn normalize_start_urls(start_urls: Option<&Value>) -> Result<Vec<Value>, ToolError> {
    let invalid = |message: &str| -> Result<Vec<Value>, ToolError> {
        Err(ToolError::InvalidArguments(message.to_string()))
    };

    match start_urls {
        None | Some(Value::Null) => invalid("start_urls or startUrls is required"),
        Some(Value::String(url)) if url.is_empty() => invalid("start_urls or startUrls is required"),
        Some(Value::String(url)) => Ok(vec![json!({ "url": url })]),
        Some(Value::Array(items)) if items.is_empty() => invalid("start_urls cannot be empty"),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(url) => Ok(json!({ "url": url })),
                Value::Object(entry) if entry.contains_key("url") => Ok(item.clone()),
                other => Err(ToolError::InvalidArguments(format!(
                    "Invalid start_urls item: {}. Must be string or dict with 'url' key",
                    other
                ))),
            })
            .collect(),
        Some(_) => invalid("start_urls must be a string or list"),
    }
}

fn validate_results_limit(limit: f64) -> Result<i64, ToolError> {
    if !(MIN_RESULTS as f64..=MAX_RESULTS as f64).contains(&limit) {
        return Err(ToolError::InvalidArguments(
            "results_limit must be between 1 and 1000".to_string(),
        ));
    }
    if limit.fract() != 0.0 {
        return Err(ToolError::InvalidArguments(
            "results_limit must be a whole number".to_string(),
        ));
    }
    Ok(limit as i64)
}

fn input_urls(normalized: &[Value]) -> Vec<Value> {
    normalized
        .iter()
        .map(|entry| entry.get("url").cloned().unwrap_or(Value::Null))
        .collect()
}

/// Truncate to `max_chars` characters, marking the cut with `...`.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut truncated: String = text.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    } else {
        text.to_string()
    }
}

fn field_or(item: &Value, key: &str, fallback: Value) -> Value {
    item.get(key).cloned().unwrap_or(fallback)
}

fn text_field(item: &Value, max_chars: usize) -> Value {
    let text = item.get("text").and_then(Value::as_str).unwrap_or("");
    Value::String(truncate_text(text, max_chars))
}

async fn run_actor(
    actor: &dyn ActorRunner,
    actor_id: &str,
    input: Value,
) -> Result<(ActorRun, Vec<Value>), ToolError> {
    let run = actor.call(actor_id, input).await?;

    if !run.succeeded() {
        return Err(ToolError::RunFailed(run.status));
    }

    let items = actor.list_items(&run.default_dataset_id).await?;
    Ok((run, items))
}

fn full_result(run: &ActorRun, items: Vec<Value>, normalized: &[Value]) -> Value {
    json!({
        "success": true,
        "totalResults": items.len(),
        "data": items,
        "runInfo": {
            "actorRunId": run.id,
            "status": run.status,
            "startedAt": run.started_at,
            "finishedAt": run.finished_at
        },
        "inputUrls": input_urls(normalized)
    })
}

fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn render_failure(tool: ToolKind, err: ToolError) -> String {
    error!("Error in {}: {}", tool.name(), err);
    render(&json!({
        "success": false,
        "error": err.to_string(),
        "details": err.kind()
    }))
}

pub struct FacebookPostsTool {
    actor: Arc<dyn ActorRunner>,
    mode: ResultMode,
}

impl FacebookPostsTool {
    pub fn new(actor: Arc<dyn ActorRunner>, mode: ResultMode) -> Self {
        Self { actor, mode }
    }

    async fn scrape(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let args: PostsArguments = parse_arguments(arguments)?;
        let normalized = normalize_start_urls(pick_urls(
            args.start_urls_camel.as_ref(),
            args.start_urls.as_ref(),
        ))?;
        let limit = validate_results_limit(pick_limit(
            args.results_limit_camel,
            args.results_limit,
            20,
        ))?;
        let caption = args
            .caption_text_camel
            .or(args.caption_text)
            .unwrap_or(false);

        let mut input = json!({
            "startUrls": normalized,
            "resultsLimit": limit,
            "captionText": caption
        });
        if let Some(newer) = pick_text(args.only_posts_newer_than_camel, args.only_posts_newer_than)
        {
            input["onlyPostsNewerThan"] = Value::String(newer);
        }
        if let Some(older) = pick_text(args.only_posts_older_than_camel, args.only_posts_older_than)
        {
            input["onlyPostsOlderThan"] = Value::String(older);
        }

        info!(
            "Starting Facebook posts scraping for {} URL(s): {:?}",
            normalized.len(),
            input_urls(&normalized)
        );

        let (run, items) = run_actor(self.actor.as_ref(), FACEBOOK_POSTS_ACTOR, input).await?;
        info!("Retrieved {} posts", items.len());

        Ok(match self.mode {
            ResultMode::Full => full_result(&run, items, &normalized),
            ResultMode::Summary => {
                let posts: Vec<Value> = items
                    .iter()
                    .take(SUMMARY_POSTS)
                    .map(|item| {
                        json!({
                            "url": field_or(item, "url", json!("")),
                            "text": text_field(item, SUMMARY_POST_TEXT_CHARS),
                            "publishedTime": field_or(item, "publishedTime", json!("")),
                            "likesCount": field_or(item, "likesCount", json!(0)),
                            "commentsCount": field_or(item, "commentsCount", json!(0))
                        })
                    })
                    .collect();

                json!({
                    "success": true,
                    "total": items.len(),
                    "posts": posts
                })
            }
        })
    }
}

#[async_trait]
impl ToolHandler for FacebookPostsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::FacebookPosts
    }

    fn definition(&self) -> Tool {
        Tool {
            name: self.kind().name().to_string(),
            description: "Scrape posts from Facebook pages using Apify Actor".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_urls": {
                        "type": "string",
                        "description": "Facebook page URLs (REQUIRED) - Example: https://www.facebook.com/pagename"
                    },
                    "results_limit": {
                        "type": "integer",
                        "description": "Maximum posts (1-1000), default: 20",
                        "default": 20
                    },
                    "caption_text": {
                        "type": "boolean",
                        "description": "Include caption text",
                        "default": false
                    },
                    "only_posts_newer_than": {
                        "type": "string",
                        "description": "Filter newer than date"
                    },
                    "only_posts_older_than": {
                        "type": "string",
                        "description": "Filter older than date"
                    }
                },
                "required": ["start_urls"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> String {
        match self.scrape(arguments).await {
            Ok(result) => render(&result),
            Err(err) => render_failure(self.kind(), err),
        }
    }
}

pub struct FacebookCommentsTool {
    actor: Arc<dyn ActorRunner>,
    mode: ResultMode,
}

impl FacebookCommentsTool {
    pub fn new(actor: Arc<dyn ActorRunner>, mode: ResultMode) -> Self {
        Self { actor, mode }
    }

    async fn scrape(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let args: CommentsArguments = parse_arguments(arguments)?;
        let normalized = normalize_start_urls(pick_urls(
            args.start_urls_camel.as_ref(),
            args.start_urls.as_ref(),
        ))?;
        let limit = validate_results_limit(pick_limit(
            args.results_limit_camel,
            args.results_limit,
            50,
        ))?;
        let nested = args
            .include_nested_comments_camel
            .or(args.include_nested_comments)
            .unwrap_or(false);
        let view_option = match pick_text(args.view_option_camel, args.view_option) {
            Some(view) => view.parse::<ViewOption>()?,
            None => ViewOption::default(),
        };

        let input = json!({
            "startUrls": normalized,
            "resultsLimit": limit,
            "includeNestedComments": nested,
            "viewOption": view_option.as_str()
        });

        info!(
            "Starting Facebook comments scraping for {} URL(s): {:?}",
            normalized.len(),
            input_urls(&normalized)
        );

        let (run, items) = run_actor(self.actor.as_ref(), FACEBOOK_COMMENTS_ACTOR, input).await?;
        info!("Retrieved {} comments", items.len());

        Ok(match self.mode {
            ResultMode::Full => full_result(&run, items, &normalized),
            ResultMode::Summary => {
                let comments: Vec<Value> = items
                    .iter()
                    .take(SUMMARY_COMMENTS)
                    .map(|item| {
                        json!({
                            "url": field_or(item, "url", json!("")),
                            "text": text_field(item, SUMMARY_COMMENT_TEXT_CHARS),
                            "publishedTime": field_or(item, "publishedTime", json!("")),
                            "likesCount": field_or(item, "likesCount", json!(0)),
                            "authorName": field_or(item, "authorName", json!(""))
                        })
                    })
                    .collect();

                json!({
                    "success": true,
                    "total": items.len(),
                    "comments": comments
                })
            }
        })
    }
}

#[async_trait]
impl ToolHandler for FacebookCommentsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::FacebookComments
    }

    fn definition(&self) -> Tool {
        Tool {
            name: self.kind().name().to_string(),
            description: "Scrape comments from Facebook posts using Apify Actor".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_urls": {
                        "type": "string",
                        "description": "Facebook post URLs (REQUIRED) - Example: https://www.facebook.com/page/posts/123456"
                    },
                    "results_limit": {
                        "type": "integer",
                        "description": "Maximum comments (1-1000), default: 50",
                        "default": 50
                    },
                    "include_nested_comments": {
                        "type": "boolean",
                        "description": "Include nested comments",
                        "default": false
                    },
                    "view_option": {
                        "type": "string",
                        "description": "Comment sort option: RANKED_UNFILTERED, TOP, or MOST_RECENT (default: RANKED_UNFILTERED)",
                        "default": "RANKED_UNFILTERED",
                        "enum": ["RANKED_UNFILTERED", "TOP", "MOST_RECENT"]
                    }
                },
                "required": ["start_urls"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> String {
        match self.scrape(arguments).await {
            Ok(result) => render(&result),
            Err(err) => render_failure(self.kind(), err),
        }
    }
}
