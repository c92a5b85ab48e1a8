pub mod bucket_page;
pub mod directory_page;
pub mod error;
pub mod table;

pub use bucket_page::{bucket_capacity, HashBucketPage, SlotCodec};
pub use directory_page::{HashDirectoryPage, DIRECTORY_ARRAY_SIZE, MAX_DEPTH};
pub use error::HashIndexError;
pub use table::ExtendibleHashTable;
