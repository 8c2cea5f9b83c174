//! Single meal page: likes, meal requests and reviews.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info, instrument, warn};

use crate::api::dto::{Badge, Meal, NewMealRequest, NewReview, Review};
use crate::api::Backend;
use crate::auth::{AuthContext, Session};
use crate::error::ValidationError;
use crate::notice::Notice;
use crate::state::{lock, AppState};

#[derive(Debug, Clone, Default)]
pub struct MealDetailState {
    pub meal: Option<Meal>,
    pub loading: bool,
    pub like_count: u64,
    pub liked: bool,
    pub liking: bool,
    pub requested: bool,
    pub requesting: bool,
    pub reviews: Vec<Review>,
    pub draft: String,
    pub posting_review: bool,
    /// A like accepted by the server that the last fetched meal did not yet show.
    pending_like: bool,
}

impl MealDetailState {
    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }

    fn show_meal(&mut self, mut meal: Meal, session: Option<&Session>) {
        match session {
            Some(s) if self.pending_like => {
                if !meal.apply_like(s.user_id()) {
                    self.pending_like = false;
                }
            }
            _ => self.pending_like = false,
        }
        self.like_count = meal.likes;
        self.liked = session.is_some_and(|s| meal.is_liked_by(s.user_id()));
        self.meal = Some(meal);
    }
}

type Flag = fn(&mut MealDetailState) -> &mut bool;

fn liking(s: &mut MealDetailState) -> &mut bool {
    &mut s.liking
}

fn requesting(s: &mut MealDetailState) -> &mut bool {
    &mut s.requesting
}

fn posting_review(s: &mut MealDetailState) -> &mut bool {
    &mut s.posting_review
}

/// Clears an in-flight flag on every exit path of an action.
struct InFlight<'a> {
    state: &'a Mutex<MealDetailState>,
    flag: Flag,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *(self.flag)(&mut *lock(self.state)) = false;
    }
}

pub struct MealDetailController {
    meal_id: String,
    api: Arc<dyn Backend>,
    auth: AuthContext,
    requests_limit: u32,
    state: Mutex<MealDetailState>,
    mounted: AtomicBool,
}

impl MealDetailController {
    pub fn new(app: &AppState, meal_id: impl Into<String>) -> Self {
        Self {
            meal_id: meal_id.into(),
            api: app.api.clone(),
            auth: app.auth.clone(),
            requests_limit: app.config.requests_check_limit,
            state: Mutex::new(MealDetailState::default()),
            mounted: AtomicBool::new(true),
        }
    }

    pub fn meal_id(&self) -> &str {
        &self.meal_id
    }

    pub fn snapshot(&self) -> MealDetailState {
        lock(&self.state).clone()
    }

    /// After this, results of calls still in flight are dropped.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    fn update(&self, f: impl FnOnce(&mut MealDetailState)) -> bool {
        if !self.mounted.load(Ordering::SeqCst) {
            return false;
        }
        f(&mut *lock(&self.state));
        true
    }

    fn claim(&self, flag: Flag) -> Option<InFlight<'_>> {
        let mut state = lock(&self.state);
        let slot = flag(&mut *state);
        if *slot {
            return None;
        }
        *slot = true;
        Some(InFlight {
            state: &self.state,
            flag,
        })
    }

    /// Meal and reviews in parallel, then whether the user already requested it.
    pub async fn load(&self) -> Vec<Notice> {
        let (meal, reviews) = tokio::join!(self.load_meal(), self.load_reviews());
        self.check_requested().await;
        meal.into_iter().chain(reviews).collect()
    }

    #[instrument(skip(self), fields(meal_id = %self.meal_id))]
    pub async fn load_meal(&self) -> Option<Notice> {
        self.update(|s| s.loading = true);
        let result = self.api.get_meal(&self.meal_id).await;
        let session = self.auth.current();

        match result {
            Ok(meal) => {
                self.update(|s| {
                    s.loading = false;
                    s.show_meal(meal, session.as_ref());
                });
                None
            }
            Err(e) => {
                error!(error = %e, "fetch meal failed");
                self.update(|s| s.loading = false)
                    .then(|| Notice::error("Error", "Failed to fetch meal details."))
            }
        }
    }

    #[instrument(skip(self), fields(meal_id = %self.meal_id))]
    pub async fn load_reviews(&self) -> Option<Notice> {
        match self.api.list_reviews(&self.meal_id).await {
            Ok(reviews) => {
                self.update(|s| s.reviews = reviews);
                None
            }
            Err(e) => {
                error!(error = %e, "fetch reviews failed");
                self.mounted
                    .load(Ordering::SeqCst)
                    .then(|| Notice::error("Error", "Failed to load reviews."))
            }
        }
    }

    /// Scans the user's own requests for this meal. Failures leave the flag as is.
    #[instrument(skip(self), fields(meal_id = %self.meal_id))]
    pub async fn check_requested(&self) {
        let Some(session) = self.auth.current() else {
            self.update(|s| s.requested = false);
            return;
        };
        match self
            .api
            .list_user_requests(session.user_id(), 1, self.requests_limit)
            .await
        {
            Ok(page) => {
                let found = page.requests.iter().any(|r| r.references(&self.meal_id));
                self.update(|s| s.requested = found);
            }
            Err(e) => warn!(error = %e, "could not check existing meal requests"),
        }
    }

    #[instrument(skip(self), fields(meal_id = %self.meal_id))]
    pub async fn like(&self) -> Option<Notice> {
        let Some(session) = self.auth.current() else {
            return Some(Notice::login_required("like meals"));
        };
        if lock(&self.state).liked {
            return None;
        }
        let _guard = self.claim(liking)?;

        match self.api.like_meal(&self.meal_id, session.user_id()).await {
            Ok(_) => {
                let landed = self.update(|s| {
                    if s.liked {
                        return;
                    }
                    s.liked = true;
                    s.like_count += 1;
                    s.pending_like = true;
                    if let Some(meal) = s.meal.as_mut() {
                        meal.apply_like(session.user_id());
                    }
                });
                landed.then(|| Notice::success("Liked!", "You liked the meal."))
            }
            Err(e) => {
                error!(error = %e, "like meal failed");
                Some(Notice::from_api("Error", &e, "Failed to like the meal."))
            }
        }
    }

    /// Gated on login, tier, a prior request, and a request already running.
    #[instrument(skip(self), fields(meal_id = %self.meal_id))]
    pub async fn request_meal(&self) -> Option<Notice> {
        let Some(session) = self.auth.current() else {
            return Some(Notice::login_required("request meals"));
        };
        if lock(&self.state).requested {
            return Some(Notice::info(
                "Already Requested",
                "You have already requested this meal.",
            ));
        }
        let _guard = self.claim(requesting)?;

        let profile = match self.api.get_user(session.user_id()).await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "fetch user profile failed");
                return Some(Notice::from_api("Error", &e, "Failed to request meal."));
            }
        };
        if !Badge::is_premium(profile.badge) {
            info!(badge = ?profile.badge, "meal request blocked by tier");
            return Some(Notice::info(
                "Upgrade Required",
                "Only Silver, Gold, or Platinum users can request meals.",
            ));
        }

        let request = NewMealRequest {
            meal_id: self.meal_id.clone(),
            user_email: session.email.clone(),
            user_name: session.display_name_or_email().to_string(),
        };
        match self.api.create_meal_request(&request).await {
            Ok(_) => self
                .update(|s| s.requested = true)
                .then(|| Notice::success("Success!", "Meal request submitted successfully.")),
            Err(e) => {
                error!(error = %e, "create meal request failed");
                Some(Notice::from_api("Error", &e, "Failed to request meal."))
            }
        }
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        lock(&self.state).draft = text.into();
    }

    /// Posts the trimmed draft, then reloads the review list.
    #[instrument(skip(self), fields(meal_id = %self.meal_id))]
    pub async fn post_review(&self) -> Option<Notice> {
        let Some(session) = self.auth.current() else {
            return Some(Notice::login_required("post reviews"));
        };
        let comment = lock(&self.state).draft.trim().to_string();
        if comment.is_empty() {
            return Some(ValidationError::EmptyComment.into());
        }
        let _guard = self.claim(posting_review)?;

        let review = NewReview {
            meal_id: self.meal_id.clone(),
            user_email: session.email.clone(),
            user_name: session.display_name_or_email().to_string(),
            comment,
        };
        if let Err(e) = self.api.create_review(&review).await {
            error!(error = %e, "post review failed");
            return Some(Notice::from_api("Error", &e, "Failed to post review."));
        }
        self.update(|s| s.draft.clear());

        match self.api.list_reviews(&self.meal_id).await {
            Ok(reviews) => self
                .update(|s| s.reviews = reviews)
                .then(|| Notice::success("Success!", "Review posted successfully.")),
            Err(e) => {
                warn!(error = %e, "review posted but list reload failed");
                Some(Notice::warning(
                    "Review Posted",
                    "Your review was saved but the list could not be refreshed.",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{MealRef, MealRequest, RequestPage, UserProfile};
    use crate::api::fake::{meal, Call, FakeBackend};
    use crate::notice::Level;

    const ME: &str = "me@hostel.edu";

    fn signed_in() -> AuthContext {
        AuthContext::signed_in(
            Session::new(ME, "tok")
                .unwrap()
                .with_display_name("Me"),
        )
    }

    fn setup(auth: AuthContext) -> (MealDetailController, Arc<FakeBackend>) {
        let (app, fake) = AppState::fake(auth);
        fake.insert_meal(meal("m1", 3, &["other@x.io"]));
        (MealDetailController::new(&app, "m1"), fake)
    }

    fn profile(badge: Option<Badge>) -> UserProfile {
        UserProfile {
            email: Some(ME.into()),
            name: None,
            role: None,
            badge,
        }
    }

    #[tokio::test]
    async fn load_derives_like_state_and_request_flag() {
        let (ctl, fake) = setup(signed_in());
        *fake.requests.lock().unwrap() = RequestPage {
            requests: vec![MealRequest {
                id: "q1".into(),
                meal_id: Some(MealRef::Raw("m1".into())),
                user_email: Some(ME.into()),
                user_name: None,
                status: None,
            }],
        };

        assert!(ctl.load().await.is_empty());
        let s = ctl.snapshot();
        assert_eq!(s.like_count, 3);
        assert!(!s.liked);
        assert!(s.requested);
        assert!(fake.calls().contains(&Call::ListUserRequests(ME.into(), 1, 100)));
    }

    #[tokio::test]
    async fn missing_meal_reports_failure() {
        let (app, _fake) = AppState::fake(AuthContext::anonymous());
        let ctl = MealDetailController::new(&app, "nope");
        let notices = ctl.load().await;
        assert_eq!(notices[0].text, "Failed to fetch meal details.");
        assert!(ctl.snapshot().meal.is_none());
    }

    #[tokio::test]
    async fn like_requires_session() {
        let (ctl, fake) = setup(AuthContext::anonymous());
        ctl.load().await;
        let n = ctl.like().await.unwrap();
        assert_eq!(n.title, "Login Required");
        assert_eq!(fake.count(|c| matches!(c, Call::LikeMeal(..))), 0);
    }

    #[tokio::test]
    async fn like_is_idempotent_per_user() {
        let (ctl, fake) = setup(signed_in());
        ctl.load().await;

        let n = ctl.like().await.unwrap();
        assert_eq!(n.title, "Liked!");
        assert!(ctl.like().await.is_none());

        let s = ctl.snapshot();
        assert_eq!(s.like_count, 4);
        assert!(s.liked);
        assert_eq!(fake.count(|c| matches!(c, Call::LikeMeal(..))), 1);
    }

    #[tokio::test]
    async fn local_like_survives_a_lagging_refetch() {
        let (ctl, _fake) = setup(signed_in());
        ctl.load().await;
        ctl.like().await;

        ctl.load_meal().await;
        let s = ctl.snapshot();
        assert_eq!(s.like_count, 4);
        assert!(s.liked);
    }

    #[tokio::test]
    async fn failed_like_changes_nothing() {
        let (ctl, fake) = setup(signed_in());
        ctl.load().await;
        fake.fail_mutations(500, None);

        let n = ctl.like().await.unwrap();
        assert!(n.is_error());
        let s = ctl.snapshot();
        assert_eq!(s.like_count, 3);
        assert!(!s.liked);
        assert!(!s.liking);
    }

    #[tokio::test]
    async fn bronze_user_cannot_request() {
        let (ctl, fake) = setup(signed_in());
        fake.set_profile(profile(Some(Badge::Bronze)));
        ctl.load().await;

        let n = ctl.request_meal().await.unwrap();
        assert_eq!(n.level, Level::Info);
        assert_eq!(n.title, "Upgrade Required");
        assert_eq!(fake.count(|c| matches!(c, Call::CreateMealRequest(..))), 0);
        assert!(!ctl.snapshot().requested);
    }

    #[tokio::test]
    async fn missing_badge_counts_as_below_minimum() {
        let (ctl, fake) = setup(signed_in());
        fake.set_profile(profile(None));
        let n = ctl.request_meal().await.unwrap();
        assert_eq!(n.title, "Upgrade Required");
    }

    #[tokio::test]
    async fn silver_user_requests_once() {
        let (ctl, fake) = setup(signed_in());
        fake.set_profile(profile(Some(Badge::Silver)));
        ctl.load().await;

        let n = ctl.request_meal().await.unwrap();
        assert_eq!(n.text, "Meal request submitted successfully.");
        assert!(ctl.snapshot().requested);
        assert!(!ctl.snapshot().requesting);

        let again = ctl.request_meal().await.unwrap();
        assert_eq!(again.title, "Already Requested");
        assert_eq!(fake.count(|c| matches!(c, Call::CreateMealRequest(..))), 1);
    }

    #[tokio::test]
    async fn request_failure_surfaces_server_message() {
        let (ctl, fake) = setup(signed_in());
        fake.set_profile(profile(Some(Badge::Gold)));
        fake.fail_mutations(409, Some("Duplicate request"));

        let n = ctl.request_meal().await.unwrap();
        assert_eq!(n.text, "Duplicate request");
        assert!(!ctl.snapshot().requested);
    }

    #[tokio::test]
    async fn in_flight_request_ignores_second_call() {
        let (ctl, fake) = setup(signed_in());
        fake.set_profile(profile(Some(Badge::Platinum)));
        let guard = ctl.claim(requesting).unwrap();
        assert!(ctl.request_meal().await.is_none());
        drop(guard);
        assert_eq!(fake.count(|c| matches!(c, Call::GetUser(_))), 0);
    }

    #[tokio::test]
    async fn in_flight_review_ignores_second_call() {
        let (ctl, fake) = setup(signed_in());
        ctl.set_draft("second helping");
        let guard = ctl.claim(posting_review).unwrap();
        assert!(ctl.post_review().await.is_none());
        drop(guard);

        assert_eq!(fake.count(|c| matches!(c, Call::CreateReview(..))), 0);
        let s = ctl.snapshot();
        assert_eq!(s.draft, "second helping");
        assert!(!s.posting_review);
    }

    #[tokio::test]
    async fn review_saved_but_reload_failed_warns() {
        let (ctl, fake) = setup(signed_in());
        *fake.fail_review_list.lock().unwrap() = true;
        ctl.set_draft("crispy");

        let n = ctl.post_review().await.unwrap();
        assert_eq!(n.level, Level::Warning);
        assert_eq!(n.title, "Review Posted");

        let s = ctl.snapshot();
        assert_eq!(s.draft, "");
        assert!(!s.posting_review);
        assert_eq!(fake.count(|c| matches!(c, Call::CreateReview(..))), 1);
    }

    #[tokio::test]
    async fn blank_review_is_rejected_locally() {
        let (ctl, fake) = setup(signed_in());
        ctl.set_draft("   ");
        let n = ctl.post_review().await.unwrap();
        assert_eq!(n.title, "Empty Comment");
        assert_eq!(fake.count(|c| matches!(c, Call::CreateReview(..))), 0);
    }

    #[tokio::test]
    async fn posting_review_trims_clears_and_reloads() {
        let (ctl, fake) = setup(signed_in());
        ctl.load().await;
        assert_eq!(ctl.snapshot().review_count(), 0);

        ctl.set_draft("  Great soup  ");
        let n = ctl.post_review().await.unwrap();
        assert_eq!(n.text, "Review posted successfully.");

        let s = ctl.snapshot();
        assert_eq!(s.draft, "");
        assert_eq!(s.review_count(), 1);
        assert_eq!(s.reviews[0].comment, "Great soup");
        assert_eq!(s.reviews[0].user_name, "Me");
        assert!(fake
            .calls()
            .contains(&Call::CreateReview("m1".into(), "Great soup".into())));
    }

    #[tokio::test]
    async fn failed_review_keeps_draft() {
        let (ctl, fake) = setup(signed_in());
        fake.fail_mutations(500, None);
        ctl.set_draft("tasty");
        let n = ctl.post_review().await.unwrap();
        assert_eq!(n.text, "Failed to post review.");
        assert_eq!(ctl.snapshot().draft, "tasty");
        assert!(!ctl.snapshot().posting_review);
    }

    #[tokio::test]
    async fn results_after_unmount_are_dropped() {
        let (ctl, _fake) = setup(signed_in());
        ctl.unmount();
        ctl.load().await;
        assert!(ctl.snapshot().meal.is_none());
    }
}
