pub mod admin;
pub mod public;

pub use admin::{AdminState, UpcomingAdminController, UpcomingMealForm};
pub use public::{UpcomingMealsController, UpcomingState};
