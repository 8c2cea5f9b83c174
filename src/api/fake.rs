//! In-memory backend for controller tests. Records every call it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::dto::{
    Ack, DashboardStats, Meal, MealPage, MealQuery, NewMealRequest, NewReview, NewUpcomingMeal,
    PublishRequest, RequestPage, Review, UserProfile,
};
use super::Backend;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListMeals(MealQuery, Option<String>),
    GetMeal(String),
    LikeMeal(String, String),
    ListReviews(String),
    CreateReview(String, String),
    ListUserRequests(String, u32, u32),
    CreateMealRequest(String, String),
    GetUser(String),
    ListUpcoming(Option<String>),
    LikeUpcoming(String, String),
    CreateUpcoming(String),
    PublishUpcoming(String, String),
    OverviewStats,
}

#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<Call>>,
    pub meal_pages: Mutex<VecDeque<ApiResult<MealPage>>>,
    /// Pages handed out only when the test sends them, ahead of `meal_pages`.
    pub held_pages: Mutex<VecDeque<oneshot::Receiver<ApiResult<MealPage>>>>,
    pub meals: Mutex<HashMap<String, Meal>>,
    pub reviews: Mutex<Vec<Review>>,
    pub fail_review_list: Mutex<bool>,
    pub requests: Mutex<RequestPage>,
    pub profile: Mutex<Option<UserProfile>>,
    pub upcoming: Mutex<Vec<Meal>>,
    pub stats: Mutex<Option<DashboardStats>>,
    pub fail_mutations: Mutex<Option<(u16, Option<String>)>>,
    pub ack: Mutex<Ack>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            ack: Mutex::new(Ack::ok()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    pub fn push_page(&self, page: ApiResult<MealPage>) {
        lock(&self.meal_pages).push_back(page);
    }

    /// The next `list_meals` call waits for the returned sender.
    pub fn hold_page(&self) -> oneshot::Sender<ApiResult<MealPage>> {
        let (tx, rx) = oneshot::channel();
        lock(&self.held_pages).push_back(rx);
        tx
    }

    pub fn insert_meal(&self, meal: Meal) {
        lock(&self.meals).insert(meal.id.clone(), meal);
    }

    pub fn set_profile(&self, profile: UserProfile) {
        *lock(&self.profile) = Some(profile);
    }

    pub fn fail_mutations(&self, status: u16, message: Option<&str>) {
        *lock(&self.fail_mutations) = Some((status, message.map(str::to_string)));
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    fn mutation(&self) -> ApiResult<Ack> {
        match lock(&self.fail_mutations).clone() {
            Some((status, message)) => Err(ApiError::Status { status, message }),
            None => Ok(lock(&self.ack).clone()),
        }
    }
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: 404,
        message: Some("Not found".into()),
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn list_meals(&self, query: &MealQuery, token: Option<&str>) -> ApiResult<MealPage> {
        self.record(Call::ListMeals(query.clone(), token.map(str::to_string)));
        let held = lock(&self.held_pages).pop_front();
        if let Some(rx) = held {
            return rx.await.unwrap_or(Err(ApiError::Timeout));
        }
        lock(&self.meal_pages)
            .pop_front()
            .unwrap_or_else(|| Ok(MealPage::default()))
    }

    async fn get_meal(&self, id: &str) -> ApiResult<Meal> {
        self.record(Call::GetMeal(id.to_string()));
        lock(&self.meals).get(id).cloned().ok_or_else(not_found)
    }

    async fn like_meal(&self, id: &str, user_email: &str) -> ApiResult<Ack> {
        self.record(Call::LikeMeal(id.to_string(), user_email.to_string()));
        self.mutation()
    }

    async fn list_reviews(&self, meal_id: &str) -> ApiResult<Vec<Review>> {
        self.record(Call::ListReviews(meal_id.to_string()));
        if *lock(&self.fail_review_list) {
            return Err(ApiError::Timeout);
        }
        Ok(lock(&self.reviews)
            .iter()
            .filter(|r| r.meal_id.as_deref() == Some(meal_id))
            .cloned()
            .collect())
    }

    async fn create_review(&self, review: &NewReview) -> ApiResult<Ack> {
        self.record(Call::CreateReview(
            review.meal_id.clone(),
            review.comment.clone(),
        ));
        let ack = self.mutation()?;
        let mut reviews = lock(&self.reviews);
        let id = format!("r{}", reviews.len() + 1);
        reviews.push(Review {
            id,
            meal_id: Some(review.meal_id.clone()),
            user_email: Some(review.user_email.clone()),
            user_name: review.user_name.clone(),
            comment: review.comment.clone(),
            created_at: Some("2026-10-18T12:00:00Z".into()),
        });
        Ok(ack)
    }

    async fn list_user_requests(
        &self,
        email: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<RequestPage> {
        self.record(Call::ListUserRequests(email.to_string(), page, limit));
        Ok(lock(&self.requests).clone())
    }

    async fn create_meal_request(&self, request: &NewMealRequest) -> ApiResult<Ack> {
        self.record(Call::CreateMealRequest(
            request.meal_id.clone(),
            request.user_email.clone(),
        ));
        self.mutation()
    }

    async fn get_user(&self, email: &str) -> ApiResult<UserProfile> {
        self.record(Call::GetUser(email.to_string()));
        lock(&self.profile).clone().ok_or_else(not_found)
    }

    async fn list_upcoming(&self, token: Option<&str>) -> ApiResult<Vec<Meal>> {
        self.record(Call::ListUpcoming(token.map(str::to_string)));
        Ok(lock(&self.upcoming).clone())
    }

    async fn like_upcoming(&self, id: &str, user_email: &str, _token: &str) -> ApiResult<Ack> {
        self.record(Call::LikeUpcoming(id.to_string(), user_email.to_string()));
        self.mutation()
    }

    async fn create_upcoming(&self, meal: &NewUpcomingMeal) -> ApiResult<Ack> {
        self.record(Call::CreateUpcoming(meal.title.clone()));
        self.mutation()
    }

    async fn publish_upcoming(&self, request: &PublishRequest) -> ApiResult<Ack> {
        self.record(Call::PublishUpcoming(
            request.meal_id.clone(),
            request.added_by_email.clone(),
        ));
        let ack = self.mutation()?;
        if ack.success {
            lock(&self.upcoming).retain(|m| m.id != request.meal_id);
        }
        Ok(ack)
    }

    async fn overview_stats(&self) -> ApiResult<DashboardStats> {
        self.record(Call::OverviewStats);
        lock(&self.stats).clone().ok_or_else(not_found)
    }
}

/// Minimal meal for fixtures.
pub fn meal(id: &str, likes: u64, liked_by: &[&str]) -> Meal {
    Meal {
        id: id.to_string(),
        title: format!("Meal {id}"),
        description: None,
        ingredients: None,
        category: None,
        price: 5.0,
        image: None,
        likes,
        liked_by: liked_by.iter().map(|s| s.to_string()).collect(),
        rating: 0.0,
        distributor: None,
        distributor_name: None,
        created_at: None,
        posted_at: None,
        publish_date: None,
    }
}
