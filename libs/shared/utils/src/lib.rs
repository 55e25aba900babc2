pub mod extractor;
pub mod jwt;
pub mod storage;
pub mod test_utils;

pub use extractor::{auth_middleware, require_role};
pub use storage::LocalFileStorage;
