pub mod rest;
pub mod token;

pub use rest::{ImageUpload, RestClient};
pub use token::username_from_token;
