use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::db::DownloadStore;
use crate::errors::{AppError, AppResult};
use crate::models::download::Download;
use crate::models::relations::{DOWNLOAD_VIEW, VIDEO_MEDIA, VIEW_VIDEO};
use crate::models::user::User;
use crate::utils::utc_now;

use super::ability::{Action, PermissionSet, RuleBuilder, Subject};
use super::authorizer::{AuthorizationContext, Authorizer};
use super::media::{AccessPolicy, MediaAccessPolicy};
use super::predicate::{all, eq, related, Predicate};

/// Path parameter naming the download a request acts on.
pub const DOWNLOAD_ID_PARAM: &str = "downloadId";

pub const DEFAULT_GRACE_PERIOD_SECS: i64 = 24 * 60 * 60;

const RESTRICTED_REASON: &str = "User is not authorised to access the Download resource";

/// How long after creation a download stays actionable.
///
/// Reads `DOWNLOAD_GRACE_PERIOD_SECS`, defaulting to 24 hours.
pub fn grace_period_from_env() -> Result<Duration, AppError> {
    parse_grace_period(std::env::var("DOWNLOAD_GRACE_PERIOD_SECS").ok().as_deref())
}

fn parse_grace_period(raw: Option<&str>) -> Result<Duration, AppError> {
    let secs = match raw {
        Some(val) => val
            .parse::<i64>()
            .map_err(|_| AppError::configuration("DOWNLOAD_GRACE_PERIOD_SECS must be a valid integer"))?,
        None => DEFAULT_GRACE_PERIOD_SECS,
    };

    if secs <= 0 {
        return Err(AppError::configuration("DOWNLOAD_GRACE_PERIOD_SECS must be positive"));
    }

    Duration::try_seconds(secs).ok_or_else(|| AppError::configuration("DOWNLOAD_GRACE_PERIOD_SECS is out of range"))
}

pub struct DownloadsAuthorizer {
    store: Arc<dyn DownloadStore>,
    media: Arc<dyn MediaAccessPolicy>,
    grace_period: Duration,
}

impl DownloadsAuthorizer {
    pub fn new(store: Arc<dyn DownloadStore>, media: Arc<dyn MediaAccessPolicy>, grace_period: Duration) -> Self {
        Self {
            store,
            media,
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// download.view.video.media must be readable by `actor`.
    fn readable_media(&self, actor: &User) -> Predicate {
        related(DOWNLOAD_VIEW, self.readable_video(actor))
    }

    fn readable_video(&self, actor: &User) -> Predicate {
        let media = self.media.predicate(actor, AccessPolicy::Read);
        related(VIEW_VIDEO, related(VIDEO_MEDIA, media))
    }

    /// The download's view must belong to `actor` and show readable media.
    fn own_readable_view(&self, actor: &User) -> Predicate {
        related(DOWNLOAD_VIEW, all([eq("user_id", actor.id), self.readable_video(actor)]))
    }

    /// [`Authorizer::authorize`] with an explicit clock.
    pub async fn authorize_at(
        &self,
        ctx: &mut AuthorizationContext,
        ability: &PermissionSet,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        if ctx.is_socket() {
            return Ok(true);
        }

        let Some(download_id) = ctx.param(DOWNLOAD_ID_PARAM).map(str::to_owned) else {
            return Ok(true);
        };

        let lookup = all([
            eq("location", download_id.as_str()),
            ability.accessible_by(Action::Read, Subject::Download),
        ]);

        let download = self
            .store
            .find_first(&lookup)
            .await
            .map_err(|err| {
                tracing::error!(download = %download_id, error = %err, "failed to retrieve download");
                AppError::retrieval("failed to retrieve download")
            })?
            .ok_or_else(|| AppError::not_found("download not found"))?;

        if !download.within_grace(now, self.grace_period) {
            tracing::debug!(
                download = %download_id,
                created_at = %download.created_at,
                "download past grace period"
            );
            return Err(AppError::not_found("download not found"));
        }

        ctx.attach::<Download>(download);
        Ok(true)
    }
}

#[async_trait]
impl Authorizer for DownloadsAuthorizer {
    fn for_user(&self, actor: &User, rules: &mut RuleBuilder) {
        if actor.is_restricted() {
            rules
                .cannot(Action::Manage, Subject::Download)
                .because(RESTRICTED_REASON);
            return;
        }

        let owned = eq("user_id", actor.id);
        let media = self.readable_media(actor);

        rules
            .can(Action::Read, Subject::Download)
            .when(all([owned.clone(), media.clone()]));

        rules
            .can(Action::Create, Subject::Download)
            .when(all([owned.clone(), self.own_readable_view(actor)]));

        rules
            .can(Action::Update, Subject::Download)
            .when(all([owned, media]));
    }

    async fn authorize(&self, ctx: &mut AuthorizationContext, ability: &PermissionSet) -> AppResult<bool> {
        self.authorize_at(ctx, ability, utc_now()).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use axum::http::Extensions;
    use serde_json::{json, Value};
    use uuid::Uuid;

    use super::*;
    use crate::authz::media::DefaultMediaAccessPolicy;
    use crate::models::media::View;
    use crate::models::user::{fixtures, Role};

    /// Evaluates lookups in memory against each download's closure.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<(Download, Value)>>,
        broken: bool,
    }

    impl MemoryStore {
        fn add(&self, download: Download, media_available: bool) {
            let mut closure = serde_json::to_value(&download).unwrap();
            closure["view"] = json!({
                "id": download.view_id,
                "user_id": download.user_id,
                "video": {
                    "id": Uuid::new_v4(),
                    "media": {"id": Uuid::new_v4(), "available": media_available}
                }
            });
            self.rows.lock().unwrap().push((download, closure));
        }
    }

    #[async_trait]
    impl DownloadStore for MemoryStore {
        async fn find_first(&self, predicate: &Predicate) -> AppResult<Option<Download>> {
            if self.broken {
                return Err(AppError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|(_, closure)| predicate.evaluate(closure))
                .map(|(d, _)| d.clone()))
        }

        async fn find_all(&self, predicate: &Predicate) -> AppResult<Vec<Download>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, closure)| predicate.evaluate(closure))
                .map(|(d, _)| d.clone())
                .collect())
        }

        async fn view_closure(&self, _view_id: Uuid) -> AppResult<Option<View>> {
            Ok(None)
        }

        async fn insert(&self, _download: &Download) -> AppResult<()> {
            Ok(())
        }
    }

    fn authorizer(store: Arc<MemoryStore>) -> DownloadsAuthorizer {
        DownloadsAuthorizer::new(store, Arc::new(DefaultMediaAccessPolicy::new()), Duration::hours(24))
    }

    fn rules_for(authorizer: &DownloadsAuthorizer, actor: &User) -> PermissionSet {
        let mut builder = RuleBuilder::new();
        authorizer.for_user(actor, &mut builder);
        builder.build()
    }

    fn request_for(location: &str) -> AuthorizationContext {
        let mut params = HashMap::new();
        params.insert(DOWNLOAD_ID_PARAM.to_string(), location.to_string());
        AuthorizationContext::http(params, Extensions::new())
    }

    fn closure(owner: Uuid, media_available: bool) -> Value {
        json!({
            "user_id": owner,
            "view": {"user_id": owner, "video": {"media": {"available": media_available}}}
        })
    }

    #[test]
    fn grace_period_parsing_rejects_bad_values() {
        assert_eq!(parse_grace_period(None).unwrap(), Duration::hours(24));
        assert_eq!(parse_grace_period(Some("90")).unwrap(), Duration::seconds(90));

        let too_large = i64::MAX.to_string();
        for raw in ["0", "-5", "soon", too_large.as_str()] {
            let err = parse_grace_period(Some(raw)).unwrap_err();
            assert!(matches!(err, AppError::Configuration(_)), "{raw}");
        }
    }

    #[test]
    fn restricted_actors_get_no_grants() {
        let auth = authorizer(Arc::new(MemoryStore::default()));

        let guest = fixtures::user(Role::Guest);
        let mut revoked = fixtures::user(Role::User);
        revoked.revoked = true;
        let mut unconfirmed = fixtures::user(Role::Admin);
        unconfirmed.confirmed_email = false;

        for actor in [guest, revoked, unconfirmed] {
            let set = rules_for(&auth, &actor);
            assert_eq!(set.rules().len(), 1);
            for action in [Action::Manage, Action::Create, Action::Read, Action::Update, Action::Delete] {
                assert!(!set.can_any(action, Subject::Download));
                assert!(!set.can(action, Subject::Download, &closure(actor.id, true)));
            }
            let rule = set.relevant_rule(Action::Read, Subject::Download).unwrap();
            assert_eq!(rule.reason.as_deref(), Some(RESTRICTED_REASON));
        }
    }

    #[test]
    fn members_act_on_their_own_readable_downloads() {
        let auth = authorizer(Arc::new(MemoryStore::default()));
        let actor = fixtures::user(Role::User);
        let set = rules_for(&auth, &actor);

        for action in [Action::Read, Action::Update, Action::Create] {
            assert!(set.can_any(action, Subject::Download));
            assert!(set.can(action, Subject::Download, &closure(actor.id, true)));
            assert!(!set.can(action, Subject::Download, &closure(Uuid::new_v4(), true)));
            assert!(!set.can(action, Subject::Download, &closure(actor.id, false)));
            assert!(!set.can(action, Subject::Download, &json!({"user_id": actor.id})));
        }

        // creating from someone else's view is refused even when the download names the actor
        let mut foreign_view = closure(actor.id, true);
        foreign_view["view"]["user_id"] = json!(Uuid::new_v4());
        assert!(!set.can(Action::Create, Subject::Download, &foreign_view));

        assert!(!set.can_any(Action::Delete, Subject::Download));
        assert!(!set.can(Action::Delete, Subject::Download, &closure(actor.id, true)));
        assert!(!set.can(Action::Manage, Subject::Download, &closure(actor.id, true)));
    }

    #[tokio::test]
    async fn socket_and_identifierless_requests_pass() {
        let auth = authorizer(Arc::new(MemoryStore::default()));
        let empty = RuleBuilder::new().build();

        let mut socket = AuthorizationContext::socket();
        assert!(auth.authorize(&mut socket, &empty).await.unwrap());

        let mut no_id = AuthorizationContext::http(HashMap::new(), Extensions::new());
        assert!(auth.authorize(&mut no_id, &empty).await.unwrap());
        assert!(no_id.get::<Download>().is_none());
    }

    #[tokio::test]
    async fn grace_window_bounds_access() {
        let store = Arc::new(MemoryStore::default());
        let auth = authorizer(store.clone());
        let actor = fixtures::user(Role::User);
        let set = rules_for(&auth, &actor);

        let t0 = Utc::now() - Duration::days(3);
        let download = Download::new(actor.id, Uuid::new_v4(), t0);
        store.add(download.clone(), true);

        let just_inside = t0 + auth.grace_period() - Duration::milliseconds(1);
        let mut ctx = request_for(&download.location);
        assert!(auth.authorize_at(&mut ctx, &set, just_inside).await.unwrap());
        assert_eq!(ctx.get::<Download>(), Some(&download));

        let at_boundary = t0 + auth.grace_period();
        let mut ctx = request_for(&download.location);
        let err = auth.authorize_at(&mut ctx, &set, at_boundary).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let just_outside = t0 + auth.grace_period() + Duration::milliseconds(1);
        let mut ctx = request_for(&download.location);
        let err = auth.authorize_at(&mut ctx, &set, just_outside).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(ctx.get::<Download>().is_none());
    }

    #[tokio::test]
    async fn foreign_downloads_look_like_missing_ones() {
        let store = Arc::new(MemoryStore::default());
        let auth = authorizer(store.clone());
        let owner = fixtures::user(Role::User);
        let intruder = fixtures::user(Role::User);

        let download = Download::new(owner.id, Uuid::new_v4(), Utc::now());
        store.add(download.clone(), true);

        let set = rules_for(&auth, &intruder);
        let mut ctx = request_for(&download.location);
        let foreign = auth.authorize(&mut ctx, &set).await.unwrap_err();

        let mut ctx = request_for(&Uuid::new_v4().to_string());
        let missing = auth.authorize(&mut ctx, &set).await.unwrap_err();

        assert!(matches!(foreign, AppError::NotFound(_)));
        assert_eq!(foreign.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn restricted_actor_cannot_resolve_own_download() {
        let store = Arc::new(MemoryStore::default());
        let auth = authorizer(store.clone());
        let mut actor = fixtures::user(Role::User);
        let download = Download::new(actor.id, Uuid::new_v4(), Utc::now());
        store.add(download.clone(), true);

        actor.revoked = true;
        let set = rules_for(&auth, &actor);
        let mut ctx = request_for(&download.location);
        let err = auth.authorize(&mut ctx, &set).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn store_failures_are_not_not_found() {
        let store = Arc::new(MemoryStore {
            broken: true,
            ..Default::default()
        });
        let auth = authorizer(store);
        let actor = fixtures::user(Role::User);
        let set = rules_for(&auth, &actor);

        let mut ctx = request_for("anything");
        let err = auth.authorize(&mut ctx, &set).await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval(_)));
    }
}
