pub mod contract;
pub mod message;
pub mod ownership;
pub mod pipeline;
pub mod receipt;
pub mod validator;
