pub mod events;
pub mod lenient;
pub mod post;
pub mod source;
pub mod synthetic;

pub use events::{ActionKind, ActionLogEvent, FeedbackEvent, Sentiment};
pub use post::{dedupe_posts, PostCategory, PostRecord};
pub use source::{is_valid_user_id, JsonRecordSource, RecordSource, MAX_USER_ID_LEN};
pub use synthetic::{generate_synthetic_dataset, write_dataset, SyntheticDataset};
