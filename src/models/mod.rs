pub mod audit;
pub mod common;
pub mod notification;
pub mod pagination;
pub mod submission;
pub mod submitter;
pub mod winning_entry;

pub use audit::*;
pub use common::*;
pub use notification::*;
pub use pagination::*;
pub use submission::*;
pub use submitter::*;
pub use winning_entry::*;
