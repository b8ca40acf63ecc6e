//! Optimistic transforms for each engagement action.
//!
//! Every counter adjustment saturates: a decrement at zero stays at zero.

use crate::models::{Club, Comment, Post, RideEvent};

pub fn like(post: &mut Post) {
    if !post.user_interaction.is_liked {
        post.user_interaction.is_liked = true;
        post.engagement.like_count = post.engagement.like_count.saturating_add(1);
    }
}

pub fn unlike(post: &mut Post) {
    if post.user_interaction.is_liked {
        post.user_interaction.is_liked = false;
        post.engagement.like_count = post.engagement.like_count.saturating_sub(1);
    }
}

pub fn toggle_like(post: &mut Post) {
    if post.user_interaction.is_liked {
        unlike(post);
    } else {
        like(post);
    }
}

pub fn bookmark(post: &mut Post) {
    if !post.user_interaction.is_bookmarked {
        post.user_interaction.is_bookmarked = true;
        post.engagement.bookmark_count = post.engagement.bookmark_count.saturating_add(1);
    }
}

pub fn unbookmark(post: &mut Post) {
    if post.user_interaction.is_bookmarked {
        post.user_interaction.is_bookmarked = false;
        post.engagement.bookmark_count = post.engagement.bookmark_count.saturating_sub(1);
    }
}

pub fn toggle_bookmark(post: &mut Post) {
    if post.user_interaction.is_bookmarked {
        unbookmark(post);
    } else {
        bookmark(post);
    }
}

/// Record a vote, moving it if the rider already voted for another option.
pub fn cast_vote(post: &mut Post, option_id: &str) {
    let previous = post.user_interaction.voted_option_id.clone();
    if previous.as_deref() == Some(option_id) {
        return;
    }
    if let Some(poll) = post.poll.as_mut() {
        if let Some(old) = previous.as_deref().and_then(|id| poll.option_mut(id)) {
            old.votes = old.votes.saturating_sub(1);
        }
        if let Some(new) = poll.option_mut(option_id) {
            new.votes = new.votes.saturating_add(1);
        }
    }
    post.user_interaction.voted_option_id = Some(option_id.to_string());
}

pub fn remove_comment_from_count(post: &mut Post) {
    post.engagement.comment_count = post.engagement.comment_count.saturating_sub(1);
}

pub fn join_club(club: &mut Club) {
    if !club.is_member {
        club.is_member = true;
        club.member_count = club.member_count.saturating_add(1);
    }
}

pub fn leave_club(club: &mut Club) {
    if club.is_member {
        club.is_member = false;
        club.member_count = club.member_count.saturating_sub(1);
    }
}

pub fn join_event(event: &mut RideEvent) {
    if !event.is_attending {
        event.is_attending = true;
        event.attendee_count = event.attendee_count.saturating_add(1);
    }
}

pub fn leave_event(event: &mut RideEvent) {
    if event.is_attending {
        event.is_attending = false;
        event.attendee_count = event.attendee_count.saturating_sub(1);
    }
}

pub fn mark_deleted(comment: &mut Comment) {
    comment.is_deleted = true;
}
