//! Reply channel back to the invoker of a command.
//!
//! Guards and handlers never talk to the platform directly; they get a
//! `&dyn InvocationChannel` scoped to one invocation. [`BufferedChannel`]
//! collects replies in memory; the console front-end prints them and
//! tests inspect them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::error::AppError;

/// A boxed, borrowed future returned by [`InvocationChannel::reply`].
pub type ReplyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplyOptions {
    /// Visible only to the invoker.
    pub private: bool,
}

impl ReplyOptions {
    pub const PRIVATE: ReplyOptions = ReplyOptions { private: true };
}

pub trait InvocationChannel: Send + Sync {
    fn reply<'a>(&'a self, text: &'a str, options: ReplyOptions) -> ReplyFuture<'a>;

    /// Whether anything has been sent back for this invocation yet.
    fn has_replied(&self) -> bool;
}

/// A sent reply, as recorded by [`BufferedChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub private: bool,
}

#[derive(Default)]
pub struct BufferedChannel {
    replies: Mutex<Vec<Reply>>,
}

impl BufferedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every reply recorded so far.
    pub fn drain(&self) -> Vec<Reply> {
        match self.replies.lock() {
            Ok(mut replies) => std::mem::take(&mut *replies),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        match self.replies.lock() {
            Ok(replies) => replies.iter().map(|r| r.text.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl InvocationChannel for BufferedChannel {
    fn reply<'a>(&'a self, text: &'a str, options: ReplyOptions) -> ReplyFuture<'a> {
        Box::pin(async move {
            let mut replies = self
                .replies
                .lock()
                .map_err(|_| AppError::Upstream("reply buffer lock poisoned".into()))?;
            replies.push(Reply { text: text.to_string(), private: options.private });
            Ok(())
        })
    }

    fn has_replied(&self) -> bool {
        self.replies.lock().map(|r| !r.is_empty()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_drains_replies() {
        let channel = BufferedChannel::new();
        assert!(!channel.has_replied());

        channel.reply("hello", ReplyOptions::PRIVATE).await.unwrap();
        channel.reply("world", ReplyOptions::default()).await.unwrap();
        assert!(channel.has_replied());
        assert_eq!(channel.texts(), vec!["hello", "world"]);

        let drained = channel.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained[0].private);
        assert!(!drained[1].private);
        assert!(!channel.has_replied());
    }
}
