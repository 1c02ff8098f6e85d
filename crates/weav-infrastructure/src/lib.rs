pub mod paths;
pub mod preference_storage;

pub use paths::WeavPaths;
pub use preference_storage::FilePreferenceStorage;
