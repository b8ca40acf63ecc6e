pub mod club;
pub mod comment;
pub mod event;
pub mod page;
pub mod post;
pub mod query;

pub use club::Club;
pub use comment::Comment;
pub use event::RideEvent;
pub use page::FeedPage;
pub use post::{Engagement, Poll, PollOption, Post, UserInteraction};
pub use query::{FeedDomain, FeedParams};
