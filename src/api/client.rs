use anyhow::Context;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, RequestBuilder, Url,
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, instrument, warn};

use super::dto::{
    Ack, DashboardStats, LikeBody, Meal, MealPage, MealQuery, NewMealRequest, NewReview,
    NewUpcomingMeal, PublishRequest, RequestPage, Review, UserProfile,
};
use super::Backend;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// `Backend` over HTTPS with a client-wide timeout and JSON headers.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .context("build http client")?;
        let base = Url::parse(&config.base_url)
            .with_context(|| format!("parse API_BASE_URL {:?}", config.base_url))?;
        anyhow::ensure!(!base.cannot_be_a_base(), "API_BASE_URL must be a base url");

        Ok(Self { client, base })
    }

    /// Joins percent-encoded path segments onto the base url.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(&self, req: RequestBuilder) -> ApiResult<Vec<u8>> {
        let res = req.send().await?;
        let status = res.status();
        let body = res.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            warn!(%status, message = ?message, "backend rejected request");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        debug!(%status, bytes = body.len(), "backend response");
        Ok(body.to_vec())
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let body = self.execute(req).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Mutation endpoints answer with assorted shapes; anything that is not a
    /// `{ success, message }` object reads as an empty ack.
    async fn send_ack(&self, req: RequestBuilder) -> ApiResult<Ack> {
        let body = self.execute(req).await?;
        Ok(serde_json::from_slice::<Ack>(&body).unwrap_or_default())
    }
}

fn authorize(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(t) => req.bearer_auth(t),
        None => req,
    }
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self, token), fields(authed = token.is_some()))]
    async fn list_meals(&self, query: &MealQuery, token: Option<&str>) -> ApiResult<MealPage> {
        let url = self.url(&["meals"])?;
        self.send(authorize(self.client.get(url).query(query), token))
            .await
    }

    #[instrument(skip(self))]
    async fn get_meal(&self, id: &str) -> ApiResult<Meal> {
        let url = self.url(&["meals", id])?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self))]
    async fn like_meal(&self, id: &str, user_email: &str) -> ApiResult<Ack> {
        let url = self.url(&["meals", id, "like"])?;
        let body = LikeBody {
            user_email: user_email.to_string(),
        };
        self.send_ack(self.client.patch(url).json(&body)).await
    }

    #[instrument(skip(self))]
    async fn list_reviews(&self, meal_id: &str) -> ApiResult<Vec<Review>> {
        let url = self.url(&["reviews", meal_id])?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self, review), fields(meal_id = %review.meal_id))]
    async fn create_review(&self, review: &NewReview) -> ApiResult<Ack> {
        let url = self.url(&["reviews"])?;
        self.send_ack(self.client.post(url).json(review)).await
    }

    #[instrument(skip(self))]
    async fn list_user_requests(
        &self,
        email: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<RequestPage> {
        let url = self.url(&["requested-meals", email])?;
        self.send(self.client.get(url).query(&[("page", page), ("limit", limit)]))
            .await
    }

    #[instrument(skip(self, request), fields(meal_id = %request.meal_id))]
    async fn create_meal_request(&self, request: &NewMealRequest) -> ApiResult<Ack> {
        let url = self.url(&["meal-requests"])?;
        self.send_ack(self.client.post(url).json(request)).await
    }

    #[instrument(skip(self))]
    async fn get_user(&self, email: &str) -> ApiResult<UserProfile> {
        let url = self.url(&["users", email])?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self, token), fields(authed = token.is_some()))]
    async fn list_upcoming(&self, token: Option<&str>) -> ApiResult<Vec<Meal>> {
        let url = self.url(&["upcoming-meals"])?;
        self.send(authorize(self.client.get(url), token)).await
    }

    #[instrument(skip(self, token))]
    async fn like_upcoming(&self, id: &str, user_email: &str, token: &str) -> ApiResult<Ack> {
        let url = self.url(&["upcoming-meals", id, "like"])?;
        let body = LikeBody {
            user_email: user_email.to_string(),
        };
        self.send_ack(self.client.patch(url).bearer_auth(token).json(&body))
            .await
    }

    #[instrument(skip(self, meal), fields(title = %meal.title))]
    async fn create_upcoming(&self, meal: &NewUpcomingMeal) -> ApiResult<Ack> {
        let url = self.url(&["upcoming-meals"])?;
        self.send_ack(self.client.post(url).json(meal)).await
    }

    #[instrument(skip(self, request), fields(meal_id = %request.meal_id))]
    async fn publish_upcoming(&self, request: &PublishRequest) -> ApiResult<Ack> {
        let url = self.url(&["upcoming-meals", "publish"])?;
        self.send_ack(self.client.post(url).json(request)).await
    }

    #[instrument(skip(self))]
    async fn overview_stats(&self) -> ApiResult<DashboardStats> {
        let url = self.url(&["dashboard", "overview-stats"])?;
        self.send(self.client.get(url)).await
    }
}
