//! REST contract of the hostel backend.

use async_trait::async_trait;

pub mod client;
pub mod dto;
#[cfg(test)]
pub(crate) mod fake;

use crate::error::ApiResult;
use dto::{
    Ack, DashboardStats, Meal, MealPage, MealQuery, NewMealRequest, NewReview, NewUpcomingMeal,
    PublishRequest, RequestPage, Review, UserProfile,
};

pub use client::HttpBackend;

/// Every endpoint the client consumes. `token` is the caller's bearer token,
/// sent only when present.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_meals(&self, query: &MealQuery, token: Option<&str>) -> ApiResult<MealPage>;
    async fn get_meal(&self, id: &str) -> ApiResult<Meal>;
    async fn like_meal(&self, id: &str, user_email: &str) -> ApiResult<Ack>;

    async fn list_reviews(&self, meal_id: &str) -> ApiResult<Vec<Review>>;
    async fn create_review(&self, review: &NewReview) -> ApiResult<Ack>;

    async fn list_user_requests(&self, email: &str, page: u32, limit: u32)
        -> ApiResult<RequestPage>;
    async fn create_meal_request(&self, request: &NewMealRequest) -> ApiResult<Ack>;

    async fn get_user(&self, email: &str) -> ApiResult<UserProfile>;

    async fn list_upcoming(&self, token: Option<&str>) -> ApiResult<Vec<Meal>>;
    async fn like_upcoming(&self, id: &str, user_email: &str, token: &str) -> ApiResult<Ack>;
    async fn create_upcoming(&self, meal: &NewUpcomingMeal) -> ApiResult<Ack>;
    async fn publish_upcoming(&self, request: &PublishRequest) -> ApiResult<Ack>;

    async fn overview_stats(&self) -> ApiResult<DashboardStats>;
}
