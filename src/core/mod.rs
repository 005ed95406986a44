pub mod endpoint;
pub mod error;
pub mod jwt;
pub mod object;
pub mod session;
pub mod util;
