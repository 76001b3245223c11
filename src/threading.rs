use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Comment, CommentThread},
};

/// Body shown in place of a deleted root that still anchors replies.
pub const DELETED_PLACEHOLDER: &str = "[deleted]";

/// Where a new comment is stored and who it mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyPlacement {
    pub parent_id: Option<Uuid>,
    pub mentioned_user_id: Option<Uuid>,
}

/// place_reply
///
/// Resolves the stored position of a comment written by `author_id` on
/// `blog_id` in response to `target`. Threads are one level deep, so answering
/// a reply attaches the new comment to that reply's root and mentions the
/// reply's author instead.
pub fn place_reply(
    author_id: Uuid,
    blog_id: Uuid,
    target: Option<&Comment>,
) -> Result<ReplyPlacement, AppError> {
    let Some(target) = target else {
        return Ok(ReplyPlacement {
            parent_id: None,
            mentioned_user_id: None,
        });
    };

    if target.is_deleted {
        return Err(AppError::NotFound("parent comment"));
    }
    if target.blog_id != blog_id {
        return Err(AppError::validation("parent comment belongs to another post"));
    }

    match target.parent_id {
        None => Ok(ReplyPlacement {
            parent_id: Some(target.id),
            mentioned_user_id: None,
        }),
        Some(root_id) => Ok(ReplyPlacement {
            parent_id: Some(root_id),
            mentioned_user_id: (target.user_id != author_id).then_some(target.user_id),
        }),
    }
}

/// assemble_threads
///
/// Groups `replies` under their `roots`, keeping the order of both inputs.
/// Deleted roots are redacted; replies whose root is not in `roots` are dropped.
pub fn assemble_threads(roots: Vec<Comment>, replies: Vec<Comment>) -> Vec<CommentThread> {
    let mut by_root: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    for reply in replies.into_iter().filter(|r| !r.is_deleted) {
        if let Some(root_id) = reply.parent_id {
            by_root.entry(root_id).or_default().push(reply);
        }
    }

    roots
        .into_iter()
        .map(|mut root| {
            let replies = by_root.remove(&root.id).unwrap_or_default();
            if root.is_deleted {
                redact(&mut root);
            }
            CommentThread {
                comment: root,
                replies,
            }
        })
        .collect()
}

/// Strips the body and every trace of the author from a deleted root.
fn redact(comment: &mut Comment) {
    comment.content = DELETED_PLACEHOLDER.to_string();
    comment.user_id = Uuid::nil();
    comment.author_name = DELETED_PLACEHOLDER.to_string();
    comment.author_avatar_url = None;
    comment.mentioned_user_id = None;
    comment.mentioned_user_name = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(blog_id: Uuid, user_id: Uuid, parent_id: Option<Uuid>) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            blog_id,
            user_id,
            parent_id,
            content: "hello".into(),
            ..Comment::default()
        }
    }

    #[test]
    fn top_level_comment_has_no_parent() {
        let placement = place_reply(Uuid::new_v4(), Uuid::new_v4(), None).unwrap();
        assert_eq!(placement.parent_id, None);
        assert_eq!(placement.mentioned_user_id, None);
    }

    #[test]
    fn reply_to_root_attaches_without_mention() {
        let blog = Uuid::new_v4();
        let root = comment(blog, Uuid::new_v4(), None);
        let placement = place_reply(Uuid::new_v4(), blog, Some(&root)).unwrap();
        assert_eq!(placement.parent_id, Some(root.id));
        assert_eq!(placement.mentioned_user_id, None);
    }

    #[test]
    fn reply_to_reply_is_flattened_with_mention() {
        let blog = Uuid::new_v4();
        let root = comment(blog, Uuid::new_v4(), None);
        let bob = Uuid::new_v4();
        let reply = comment(blog, bob, Some(root.id));

        let placement = place_reply(Uuid::new_v4(), blog, Some(&reply)).unwrap();
        assert_eq!(placement.parent_id, Some(root.id));
        assert_eq!(placement.mentioned_user_id, Some(bob));
    }

    #[test]
    fn answering_own_reply_does_not_mention_self() {
        let blog = Uuid::new_v4();
        let me = Uuid::new_v4();
        let root = comment(blog, Uuid::new_v4(), None);
        let reply = comment(blog, me, Some(root.id));

        let placement = place_reply(me, blog, Some(&reply)).unwrap();
        assert_eq!(placement.parent_id, Some(root.id));
        assert_eq!(placement.mentioned_user_id, None);
    }

    #[test]
    fn deleted_or_foreign_parents_are_rejected() {
        let blog = Uuid::new_v4();
        let mut deleted = comment(blog, Uuid::new_v4(), None);
        deleted.is_deleted = true;
        assert!(matches!(
            place_reply(Uuid::new_v4(), blog, Some(&deleted)),
            Err(AppError::NotFound(_))
        ));

        let foreign = comment(Uuid::new_v4(), Uuid::new_v4(), None);
        assert!(matches!(
            place_reply(Uuid::new_v4(), blog, Some(&foreign)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn threads_group_replies_and_redact_deleted_roots() {
        let blog = Uuid::new_v4();
        let live_root = comment(blog, Uuid::new_v4(), None);
        let mut dead_root = comment(blog, Uuid::new_v4(), None);
        dead_root.is_deleted = true;

        let r1 = comment(blog, Uuid::new_v4(), Some(live_root.id));
        let r2 = comment(blog, Uuid::new_v4(), Some(dead_root.id));
        let mut r3 = comment(blog, Uuid::new_v4(), Some(live_root.id));
        r3.is_deleted = true;

        let threads = assemble_threads(
            vec![live_root.clone(), dead_root.clone()],
            vec![r1.clone(), r2.clone(), r3],
        );

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, live_root.id);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].id, r1.id);
        assert_eq!(threads[1].comment.content, DELETED_PLACEHOLDER);
        assert_eq!(threads[1].replies[0].id, r2.id);
    }

    #[test]
    fn deleted_roots_do_not_reveal_their_author() {
        let blog = Uuid::new_v4();
        let mut root = comment(blog, Uuid::new_v4(), None);
        root.author_name = "Ada".into();
        root.author_avatar_url = Some("https://cdn.example.com/ada.png".into());
        root.is_deleted = true;
        let reply = comment(blog, Uuid::new_v4(), Some(root.id));

        let threads = assemble_threads(vec![root.clone()], vec![reply]);
        let redacted = &threads[0].comment;

        assert_eq!(redacted.id, root.id);
        assert_eq!(redacted.user_id, Uuid::nil());
        assert_eq!(redacted.author_name, DELETED_PLACEHOLDER);
        assert_eq!(redacted.author_avatar_url, None);
        assert_eq!(threads[0].replies.len(), 1);
    }
}
