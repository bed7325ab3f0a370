pub mod types;
pub mod merge;
pub mod loader;
pub mod validator;

pub use types::*;
pub use merge::*;
pub use loader::*;
pub use validator::*;
