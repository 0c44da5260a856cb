pub mod error;
pub mod models;
pub mod naming;
pub mod orm;
pub mod serialize;
pub mod settings;

pub use error::{Error, Result, ValidationError};
pub use models::{Activity, Camper, Signup};
pub use orm::Db;
