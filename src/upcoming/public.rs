//! Upcoming meals as members see them. Only elevated tiers may like.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::api::dto::{Badge, Meal};
use crate::api::Backend;
use crate::auth::{AuthContext, Session};
use crate::notice::Notice;
use crate::state::{lock, AppState};

#[derive(Debug, Clone, Default)]
pub struct UpcomingState {
    pub meals: Vec<Meal>,
    pub badge: Option<Badge>,
    pub loading: bool,
    liking: HashSet<String>,
    /// Meals liked here that the last fetched list did not yet show.
    pending_likes: HashSet<String>,
}

impl UpcomingState {
    pub fn can_like(&self, session: Option<&Session>, meal: &Meal) -> bool {
        match session {
            Some(s) => Badge::is_premium(self.badge) && !meal.is_liked_by(s.user_id()),
            None => false,
        }
    }

    fn show(&mut self, mut meals: Vec<Meal>, session: Option<&Session>) {
        match session {
            Some(s) => {
                for meal in meals.iter_mut() {
                    if self.pending_likes.contains(&meal.id) && !meal.apply_like(s.user_id()) {
                        self.pending_likes.remove(&meal.id);
                    }
                }
            }
            None => self.pending_likes.clear(),
        }
        self.meals = meals;
    }
}

pub struct UpcomingMealsController {
    api: Arc<dyn Backend>,
    auth: AuthContext,
    state: Mutex<UpcomingState>,
}

impl UpcomingMealsController {
    pub fn new(app: &AppState) -> Self {
        Self {
            api: app.api.clone(),
            auth: app.auth.clone(),
            state: Mutex::new(UpcomingState::default()),
        }
    }

    pub fn snapshot(&self) -> UpcomingState {
        lock(&self.state).clone()
    }

    /// Whether the current user may like `meal_id` right now.
    pub fn can_like(&self, meal_id: &str) -> bool {
        let session = self.auth.current();
        let state = lock(&self.state);
        state
            .meals
            .iter()
            .find(|m| m.id == meal_id)
            .is_some_and(|m| state.can_like(session.as_ref(), m))
    }

    /// Badge (when signed in) and the list, fetched side by side.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Vec<Notice> {
        lock(&self.state).loading = true;
        let session = self.auth.current();
        let (badge, meals) = tokio::join!(
            self.fetch_badge(session.as_ref()),
            self.api.list_upcoming(session.as_ref().map(|s| s.token.as_str())),
        );

        let mut notices = Vec::new();
        let mut state = lock(&self.state);
        state.loading = false;
        match badge {
            Ok(b) => state.badge = b,
            Err(n) => {
                state.badge = None;
                notices.push(n);
            }
        }
        match meals {
            Ok(meals) => state.show(meals, session.as_ref()),
            Err(e) => {
                error!(error = %e, "fetch upcoming meals failed");
                state.meals.clear();
                notices.push(Notice::error("Error", "Failed to fetch upcoming meals"));
            }
        }
        notices
    }

    /// Reloads badge and list on every sign-in or sign-out.
    pub async fn follow_session(&self, mut changes: watch::Receiver<Option<Session>>) {
        while changes.changed().await.is_ok() {
            self.load().await;
        }
    }

    async fn fetch_badge(&self, session: Option<&Session>) -> Result<Option<Badge>, Notice> {
        let Some(session) = session else {
            return Ok(None);
        };
        match self.api.get_user(session.user_id()).await {
            Ok(profile) => Ok(profile.badge),
            Err(e) => {
                error!(error = %e, "fetch user badge failed");
                Err(Notice::error("Error", "Failed to fetch user badge"))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn like(&self, meal_id: &str) -> Option<Notice> {
        let Some(session) = self.auth.current() else {
            return Some(Notice::login_required("like meals"));
        };
        {
            let mut state = lock(&self.state);
            if !Badge::is_premium(state.badge) {
                return Some(Notice::error("Upgrade Required", "Only premium users can like meals"));
            }
            let meal = state.meals.iter().find(|m| m.id == meal_id)?;
            if meal.is_liked_by(session.user_id()) {
                return Some(Notice::error("Already Liked", "You already liked this meal"));
            }
            if !state.liking.insert(meal_id.to_string()) {
                return None;
            }
        }

        let result = self
            .api
            .like_upcoming(meal_id, session.user_id(), &session.token)
            .await;

        let mut state = lock(&self.state);
        state.liking.remove(meal_id);
        match result {
            Ok(ack) if ack.success => {
                if let Some(meal) = state.meals.iter_mut().find(|m| m.id == meal_id) {
                    meal.apply_like(session.user_id());
                }
                state.pending_likes.insert(meal_id.to_string());
                info!(meal_id, "upcoming meal liked");
                Some(Notice::success("Liked!", "Liked the meal!"))
            }
            Ok(ack) => Some(Notice::error(
                "Error",
                ack.message.unwrap_or_else(|| "Failed to like meal".into()),
            )),
            Err(e) => {
                error!(error = %e, meal_id, "like upcoming meal failed");
                Some(Notice::from_api("Error", &e, "Failed to like meal"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::UserProfile;
    use crate::api::fake::{meal, Call, FakeBackend};

    const ME: &str = "me@hostel.edu";

    fn setup(
        auth: AuthContext,
        badge: Option<Badge>,
    ) -> (UpcomingMealsController, Arc<FakeBackend>) {
        let (app, fake) = AppState::fake(auth);
        *fake.upcoming.lock().unwrap() = vec![meal("u1", 2, &[]), meal("u2", 5, &[ME])];
        fake.set_profile(UserProfile {
            email: Some(ME.into()),
            name: None,
            role: None,
            badge,
        });
        (UpcomingMealsController::new(&app), fake)
    }

    fn me() -> AuthContext {
        AuthContext::signed_in(Session::new(ME, "tok").unwrap())
    }

    #[tokio::test]
    async fn load_sends_bearer_and_reads_badge() {
        let (ctl, fake) = setup(me(), Some(Badge::Gold));
        assert!(ctl.load().await.is_empty());
        let s = ctl.snapshot();
        assert_eq!(s.meals.len(), 2);
        assert_eq!(s.badge, Some(Badge::Gold));
        assert!(fake.calls().contains(&Call::ListUpcoming(Some("tok".into()))));
    }

    #[tokio::test]
    async fn anonymous_load_skips_badge() {
        let (ctl, fake) = setup(AuthContext::anonymous(), None);
        ctl.load().await;
        assert_eq!(fake.count(|c| matches!(c, Call::GetUser(_))), 0);
        assert!(!ctl.can_like("u1"));
        assert_eq!(ctl.like("u1").await.unwrap().title, "Login Required");
    }

    #[tokio::test]
    async fn bronze_cannot_like() {
        let (ctl, fake) = setup(me(), Some(Badge::Bronze));
        ctl.load().await;
        assert!(!ctl.can_like("u1"));
        let n = ctl.like("u1").await.unwrap();
        assert_eq!(n.text, "Only premium users can like meals");
        assert_eq!(fake.count(|c| matches!(c, Call::LikeUpcoming(..))), 0);
    }

    #[tokio::test]
    async fn premium_like_updates_locally_once() {
        let (ctl, fake) = setup(me(), Some(Badge::Silver));
        ctl.load().await;
        assert!(ctl.can_like("u1"));

        assert_eq!(ctl.like("u1").await.unwrap().text, "Liked the meal!");
        let u1 = ctl.snapshot().meals.into_iter().find(|m| m.id == "u1").unwrap();
        assert_eq!(u1.likes, 3);
        assert!(u1.is_liked_by(ME));

        let n = ctl.like("u1").await.unwrap();
        assert_eq!(n.text, "You already liked this meal");
        assert_eq!(fake.count(|c| matches!(c, Call::LikeUpcoming(..))), 1);

        ctl.load().await;
        let u1 = ctl.snapshot().meals.into_iter().find(|m| m.id == "u1").unwrap();
        assert_eq!(u1.likes, 3);
    }

    #[tokio::test]
    async fn like_survives_refetch_until_server_catches_up() {
        let (ctl, fake) = setup(me(), Some(Badge::Gold));
        ctl.load().await;
        ctl.like("u1").await;

        ctl.load().await;
        let s = ctl.snapshot();
        let u1 = s.meals.iter().find(|m| m.id == "u1").unwrap();
        assert_eq!(u1.likes, 3);
        assert!(u1.is_liked_by(ME));
        assert!(s.pending_likes.contains("u1"));
        assert!(!ctl.can_like("u1"));

        *fake.upcoming.lock().unwrap() = vec![meal("u1", 3, &[ME]), meal("u2", 5, &[ME])];
        ctl.load().await;
        let s = ctl.snapshot();
        let u1 = s.meals.iter().find(|m| m.id == "u1").unwrap();
        assert_eq!(u1.likes, 3);
        assert!(s.pending_likes.is_empty());
    }

    #[tokio::test]
    async fn session_change_reloads_with_new_token() {
        let auth = AuthContext::anonymous();
        let (ctl, fake) = setup(auth.clone(), Some(Badge::Gold));
        let ctl = Arc::new(ctl);

        let follower = {
            let ctl = Arc::clone(&ctl);
            let rx = auth.watch();
            tokio::spawn(async move { ctl.follow_session(rx).await })
        };

        auth.sign_in(Session::new(ME, "tok-2").unwrap());
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while ctl.snapshot().badge.is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reloaded after sign-in");
        assert!(fake.calls().contains(&Call::ListUpcoming(Some("tok-2".into()))));
        follower.abort();
    }

    #[tokio::test]
    async fn already_liked_on_server_is_rejected() {
        let (ctl, _fake) = setup(me(), Some(Badge::Platinum));
        ctl.load().await;
        assert!(!ctl.can_like("u2"));
        assert_eq!(ctl.like("u2").await.unwrap().title, "Already Liked");
    }

    #[tokio::test]
    async fn unknown_meal_is_a_silent_no_op() {
        let (ctl, _fake) = setup(me(), Some(Badge::Gold));
        ctl.load().await;
        assert!(ctl.like("missing").await.is_none());
    }

    #[tokio::test]
    async fn server_rejection_message_is_shown() {
        let (ctl, fake) = setup(me(), Some(Badge::Gold));
        ctl.load().await;
        fake.fail_mutations(403, Some("Forbidden tier"));
        assert_eq!(ctl.like("u1").await.unwrap().text, "Forbidden tier");
        let u1 = ctl.snapshot().meals.into_iter().find(|m| m.id == "u1").unwrap();
        assert_eq!(u1.likes, 2);
    }
}
