pub mod activity;
pub mod camper;
pub mod signup;

pub use activity::{Activity, CreateActivityRequest, UpdateActivityRequest};
pub use camper::{Camper, CreateCamperRequest, UpdateCamperRequest, validate_age, validate_name};
pub use signup::{CreateSignupRequest, ParentColumn, Signup, UpdateSignupRequest, validate_time};
