pub mod feed;

pub use feed::Entity as FeedEntity;
pub use feed::FeedState;
