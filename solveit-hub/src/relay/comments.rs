use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

use super::{Feed, Relay, Relays, SubscribeQuery};
use crate::error::Result;
use crate::topic::Topic;

/// Public profile attached to comments and chat messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub user_id: String,
    pub task_id: String,
    #[serde(default)]
    pub owner: PublicUser,
}

pub struct CommentsFeed;

impl Feed for CommentsFeed {
    const NAME: &'static str = "comments";

    type Message = Comment;

    fn subscription_topic(query: &SubscribeQuery) -> Result<Topic> {
        Ok(Topic::comments(query.task_id()?))
    }

    fn route(comment: &Comment) -> Vec<Topic> {
        if comment.task_id.is_empty() {
            return Vec::new();
        }
        vec![Topic::comments(&comment.task_id)]
    }

    fn select(relays: &Relays) -> &Arc<Relay<Self>> {
        &relays.comments
    }
}

pub type CommentsRelay = Relay<CommentsFeed>;

impl Relay<CommentsFeed> {
    pub async fn send_to_task(&self, task_id: impl Display, comment: &Comment) -> Result<usize> {
        self.broadcast(&Topic::comments(task_id), comment).await
    }
}
