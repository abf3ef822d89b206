pub mod http;
pub mod journal;
pub mod traits;
