//! Admin view of upcoming meals: ranked list, create form, publish.

use std::sync::{Arc, Mutex};

use tracing::{error, info, instrument};

use crate::api::dto::{Meal, NewUpcomingMeal, PublishRequest};
use crate::api::Backend;
use crate::auth::AuthContext;
use crate::error::{ApiError, ValidationError};
use crate::notice::Notice;
use crate::state::{lock, AppState};

/// Raw form input. Every field is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpcomingMealForm {
    pub title: String,
    pub category: String,
    pub image: String,
    pub ingredients: String,
    pub description: String,
    pub price: String,
    pub publish_date: String,
    pub distributor_name: String,
}

impl UpcomingMealForm {
    fn fields(&self) -> [(&'static str, &str); 8] {
        [
            ("title", self.title.as_str()),
            ("category", self.category.as_str()),
            ("image", self.image.as_str()),
            ("ingredients", self.ingredients.as_str()),
            ("description", self.description.as_str()),
            ("price", self.price.as_str()),
            ("publishDate", self.publish_date.as_str()),
            ("distributorName", self.distributor_name.as_str()),
        ]
    }

    /// First empty field wins; then the price must be a positive number.
    pub fn validate(&self) -> Result<NewUpcomingMeal, ValidationError> {
        if let Some((name, _)) = self.fields().into_iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ValidationError::MissingField(name));
        }
        let price: f64 = self
            .price
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidPrice)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }

        Ok(NewUpcomingMeal {
            title: self.title.trim().to_string(),
            category: self.category.trim().to_string(),
            image: self.image.trim().to_string(),
            ingredients: self.ingredients.trim().to_string(),
            description: self.description.trim().to_string(),
            price,
            publish_date: self.publish_date.trim().to_string(),
            distributor_name: self.distributor_name.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdminState {
    pub meals: Vec<Meal>,
    pub loading: bool,
    pub adding: bool,
    pub publishing_id: Option<String>,
    pub form: UpcomingMealForm,
}

pub struct UpcomingAdminController {
    api: Arc<dyn Backend>,
    auth: AuthContext,
    admin_email: String,
    state: Mutex<AdminState>,
}

impl UpcomingAdminController {
    pub fn new(app: &AppState) -> Self {
        Self {
            api: app.api.clone(),
            auth: app.auth.clone(),
            admin_email: app.config.admin_email.clone(),
            state: Mutex::new(AdminState::default()),
        }
    }

    pub fn snapshot(&self) -> AdminState {
        lock(&self.state).clone()
    }

    pub fn set_form(&self, form: UpcomingMealForm) {
        lock(&self.state).form = form;
    }

    /// Most liked first.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Option<Notice> {
        lock(&self.state).loading = true;
        let token = self.auth.token();
        let result = self.api.list_upcoming(token.as_deref()).await;

        let mut state = lock(&self.state);
        state.loading = false;
        match result {
            Ok(mut meals) => {
                meals.sort_by(|a, b| b.likes.cmp(&a.likes));
                state.meals = meals;
                None
            }
            Err(ApiError::Decode(e)) => {
                error!(error = %e, "upcoming meals payload was not a list");
                Some(Notice::error("Error", "Unexpected data from server"))
            }
            Err(e) => {
                error!(error = %e, "fetch upcoming meals failed");
                Some(Notice::error("Error", "Failed to fetch meals"))
            }
        }
    }

    /// Validates the current form, posts it, and on success resets the
    /// form and reloads the list.
    #[instrument(skip(self))]
    pub async fn create(&self) -> Option<Notice> {
        let meal = {
            let mut state = lock(&self.state);
            if state.adding {
                return None;
            }
            let meal = match state.form.validate() {
                Ok(m) => m,
                Err(e) => return Some(e.into()),
            };
            state.adding = true;
            meal
        };

        let result = self.api.create_upcoming(&meal).await;
        let added = {
            let mut state = lock(&self.state);
            state.adding = false;
            match &result {
                Ok(ack) if ack.success => {
                    state.form = UpcomingMealForm::default();
                    true
                }
                _ => false,
            }
        };

        match result {
            Ok(_) if added => {
                info!(title = %meal.title, "upcoming meal added");
                match self.load().await {
                    Some(reload_failed) => Some(reload_failed),
                    None => Some(Notice::success("Meal added", "")),
                }
            }
            Ok(_) => Some(Notice::error("Failed", "Could not add meal")),
            Err(e) => {
                error!(error = %e, "create upcoming meal failed");
                Some(Notice::error("Server Error", "Could not add meal"))
            }
        }
    }

    /// One publish at a time; the issuing email is the session's, or the
    /// configured admin address when nobody is signed in.
    #[instrument(skip(self))]
    pub async fn publish(&self, meal_id: &str) -> Option<Notice> {
        {
            let mut state = lock(&self.state);
            if state.publishing_id.is_some() {
                return None;
            }
            state.publishing_id = Some(meal_id.to_string());
        }

        let added_by_email = self
            .auth
            .current()
            .map(|s| s.email)
            .unwrap_or_else(|| self.admin_email.clone());
        let request = PublishRequest {
            meal_id: meal_id.to_string(),
            added_by_email,
        };
        let result = self.api.publish_upcoming(&request).await;
        lock(&self.state).publishing_id = None;

        match result {
            Ok(ack) if ack.success => {
                info!(meal_id, "upcoming meal published");
                match self.load().await {
                    Some(reload_failed) => Some(reload_failed),
                    None => Some(Notice::success("Published!", "")),
                }
            }
            Ok(ack) => Some(Notice::error(
                "Failed",
                ack.message.unwrap_or_else(|| "Could not publish meal".into()),
            )),
            Err(e) => {
                error!(error = %e, meal_id, "publish upcoming meal failed");
                Some(Notice::from_api("Failed", &e, "Server error"))
            }
        }
    }
}
