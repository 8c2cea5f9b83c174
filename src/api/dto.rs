use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Breakfast,
    Lunch,
    Dinner,
    #[serde(other)]
    Other,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Breakfast, Category::Lunch, Category::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Breakfast => "Breakfast",
            Category::Lunch => "Lunch",
            Category::Dinner => "Dinner",
            Category::Other => "Other",
        }
    }

    /// Parses a tab label. "All" and unknown labels mean no category filter.
    pub fn from_tab(label: &str) -> Option<Category> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

/// Subscription tier. Ordering follows the upgrade path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Badge {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Badge {
    /// Lowest tier allowed to request meals and like upcoming meals.
    pub const MIN_PREMIUM: Badge = Badge::Silver;

    pub fn is_premium(badge: Option<Badge>) -> bool {
        badge.is_some_and(|b| b >= Self::MIN_PREMIUM)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub liked_by: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating: f64,
    #[serde(default)]
    pub distributor: Option<String>,
    #[serde(default)]
    pub distributor_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub posted_at: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
}

impl Meal {
    pub fn is_liked_by(&self, user: &str) -> bool {
        self.liked_by.iter().any(|u| u == user)
    }

    /// Local projection of a like the server accepted. Repeated calls for the
    /// same user leave the meal unchanged.
    pub fn apply_like(&mut self, user: &str) -> bool {
        if self.is_liked_by(user) {
            return false;
        }
        self.liked_by.push(user.to_string());
        self.likes += 1;
        true
    }

    pub fn posted(&self) -> Option<&str> {
        self.posted_at.as_deref().or(self.created_at.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub meals: Vec<Meal>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Query string for `GET /meals`. `None` fields are left out of the URL.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MealQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by_price: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub meal_id: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub meal_id: String,
    pub user_email: String,
    pub user_name: String,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedMeal {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
}

/// The `mealId` of a request comes back either as the raw id or, when the
/// backend populated it, as the meal document itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MealRef {
    Raw(String),
    Embedded(EmbeddedMeal),
}

impl MealRef {
    pub fn meal_id(&self) -> Option<&str> {
        match self {
            MealRef::Raw(id) => Some(id.as_str()),
            MealRef::Embedded(m) => m.id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MealRequest {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub meal_id: Option<MealRef>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl MealRequest {
    pub fn references(&self, meal_id: &str) -> bool {
        self.meal_id
            .as_ref()
            .and_then(MealRef::meal_id)
            .is_some_and(|id| id == meal_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub requests: Vec<MealRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMealRequest {
    pub meal_id: String,
    pub user_email: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_badge")]
    pub badge: Option<Badge>,
}

/// Explicit `null` reads the same as a missing key.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Option::unwrap_or_default)
}

/// Unknown or empty badge strings count as no badge at all.
fn lenient_badge<'de, D>(de: D) -> Result<Option<Badge>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(de)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeBody {
    pub user_email: String,
}

/// `{ success, message }` envelope returned by mutation endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewUpcomingMeal {
    pub title: String,
    pub category: String,
    pub image: String,
    pub ingredients: String,
    pub description: String,
    pub price: f64,
    pub publish_date: String,
    pub distributor_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub meal_id: String,
    pub added_by_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealLikes {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyRequests {
    #[serde(default, deserialize_with = "null_as_default")]
    pub month: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requests: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_meals: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_requests: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_reviews: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meal_likes: Vec<MealLikes>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_requests: Vec<MonthlyRequests>,
}
