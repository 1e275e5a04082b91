//! Domain models for feeds, folders and stories

mod feed;
mod feed_set;
mod story;

pub use feed::{Feed, FeedFolderMapping, FeedId, Folder, ROOT_FOLDER, SocialFeed};
pub use feed_set::{FeedSet, ReadFilter, StoryOrder};
pub use story::{Intelligence, Story, StoryBuilder, StoryHash};
