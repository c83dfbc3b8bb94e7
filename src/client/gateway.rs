//! HTTP access to a running backend: the [`MatchStore`] facade and the session coordinator.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{
            CreateOutcome, GradeIncrement, GradeTallyEntity, LineupEntity, MatchEntity,
            PlayerEntity, PlayerReasonIncrement, PlayerReasonTallyEntity, ReasonIncrement,
            ReasonTallyEntity, RotationTallyEntity,
        },
        storage::{StorageError, StorageResult},
    },
    dto::{
        health::HealthResponse,
        matches::{
            AppendLineupRequest, CreateMatchRequest, CreateMatchResponse, GradeIncrementRequest,
            GradeTallyRecord, LineupRecord, MatchRecord, PlayerReasonIncrementRequest,
            PlayerReasonTallyRecord, ReasonIncrementRequest, ReasonTallyRecord,
            RotationTallyRecord, RotationUpsertRequest, UpdateMatchRequest,
        },
        roster::{CreatePlayerRequest, PlayerRecord, RenamePlayerRequest},
        session::{ActiveSessionResponse, AckResponse, NextSetRequest, NextSetResponse},
    },
    error::ServiceError,
    services::session_service,
    state::SharedState,
};

/// Convenient result alias returning [`GatewayError`] failures.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures raised while talking to the backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or its body could not be read.
    #[error("request to `{path}` failed")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with an error status.
    #[error("`{path}` answered {status}: {message}")]
    Status {
        path: String,
        status: StatusCode,
        message: String,
    },
    /// The backend answered with a body we cannot use.
    #[error("unexpected payload from `{path}`: {message}")]
    InvalidPayload { path: String, message: String },
    /// In-process coordinator failure.
    #[error(transparent)]
    Local(#[from] ServiceError),
}

impl From<GatewayError> for StorageError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Status {
                status, message, ..
            } if status.is_client_error() => StorageError::Rejected(message),
            GatewayError::Local(ServiceError::Unavailable(source)) => source,
            other => StorageError::unavailable("match gateway request failed".into(), other),
        }
    }
}

/// Read side of the session coordinator, as seen by a scoring client.
pub trait SessionSource: Send + Sync {
    /// Current shared session code.
    fn active_session(&self) -> BoxFuture<'static, GatewayResult<String>>;
    /// Keep the shared session alive.
    fn report_activity(&self) -> BoxFuture<'static, GatewayResult<()>>;
    /// Ask for the set after `current`.
    fn next_set(&self, current: String) -> BoxFuture<'static, GatewayResult<NextSetResponse>>;
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Talks to the REST surface of a running backend.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Arc<str>,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> GatewayResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| GatewayError::ClientBuilder { source })?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    /// Send a request. `Ok(None)` on 404.
    async fn call<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> GatewayResult<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(|source| GatewayError::Transport {
            path: path.to_string(),
            source,
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response.json::<T>().await.map(Some).map_err(|source| {
                GatewayError::Transport {
                    path: path.to_string(),
                    source,
                }
            }),
            status => {
                let message = response
                    .json::<ErrorBody>()
                    .await
                    .map(|body| body.message)
                    .unwrap_or_else(|_| status.to_string());
                Err(GatewayError::Status {
                    path: path.to_string(),
                    status,
                    message,
                })
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<Option<T>> {
        self.call::<(), T>(Method::GET, path, None).await
    }

    /// Like [`Self::call`] but a 404 is an error.
    async fn required<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(method, path, body)
            .await?
            .ok_or_else(|| GatewayError::Status {
                path: path.to_string(),
                status: StatusCode::NOT_FOUND,
                message: "not found".into(),
            })
    }

    async fn list<R, T>(&self, path: &str) -> GatewayResult<Vec<T>>
    where
        R: DeserializeOwned,
        T: From<R>,
    {
        let rows: Vec<R> = self.get(path).await?.unwrap_or_default();
        Ok(rows.into_iter().map(T::from).collect())
    }

    async fn create_match(&self, record: MatchEntity) -> GatewayResult<CreateOutcome> {
        let request = CreateMatchRequest::from(&record);
        let response: CreateMatchResponse = self
            .required(Method::POST, "/api/matches", Some(&request))
            .await?;
        Ok(if response.created {
            CreateOutcome::Created
        } else {
            CreateOutcome::AlreadyExists
        })
    }

    async fn find_match(&self, match_id: String) -> GatewayResult<Option<MatchEntity>> {
        let path = format!("/api/matches/{match_id}");
        let Some(record) = self.get::<MatchRecord>(&path).await? else {
            return Ok(None);
        };
        let entity = MatchEntity::try_from(record).map_err(|err| GatewayError::InvalidPayload {
            path,
            message: err.to_string(),
        })?;
        Ok(Some(entity))
    }

    async fn update_match(&self, record: MatchEntity) -> GatewayResult<bool> {
        let path = format!("/api/matches/{}", record.match_id);
        let request = UpdateMatchRequest::from(&record);
        let updated: Option<MatchRecord> = self.call(Method::PUT, &path, Some(&request)).await?;
        Ok(updated.is_some())
    }

    async fn list_matches(&self) -> GatewayResult<Vec<MatchEntity>> {
        let path = "/api/matches-history";
        let records: Vec<MatchRecord> = self.get(path).await?.unwrap_or_default();
        records
            .into_iter()
            .map(|record| {
                MatchEntity::try_from(record).map_err(|err| GatewayError::InvalidPayload {
                    path: path.to_string(),
                    message: err.to_string(),
                })
            })
            .collect()
    }

    async fn delete(&self, path: &str) -> GatewayResult<bool> {
        let ack: Option<AckResponse> = self.call::<(), _>(Method::DELETE, path, None).await?;
        Ok(ack.is_some_and(|ack| ack.success))
    }

    async fn append_lineup(&self, entry: LineupEntity) -> GatewayResult<()> {
        let request = AppendLineupRequest::from(entry);
        let _: LineupRecord = self
            .required(Method::POST, "/api/match-lineups", Some(&request))
            .await?;
        Ok(())
    }

    async fn upsert_rotation(&self, tally: RotationTallyEntity) -> GatewayResult<()> {
        let path = format!("/api/rotation-stats/{}", tally.match_id);
        let request = RotationUpsertRequest {
            slot: tally.slot,
            serve: tally.counter.serve,
            receive: tally.counter.receive,
        };
        let _: RotationTallyRecord = self.required(Method::PUT, &path, Some(&request)).await?;
        Ok(())
    }

    async fn list_players(&self) -> GatewayResult<Vec<PlayerEntity>> {
        let path = "/api/our-players";
        let records: Vec<PlayerRecord> = self.get(path).await?.unwrap_or_default();
        records
            .into_iter()
            .map(|record| {
                PlayerEntity::try_from(record).map_err(|err| GatewayError::InvalidPayload {
                    path: path.to_string(),
                    message: err.to_string(),
                })
            })
            .collect()
    }

    async fn create_player(&self, player: PlayerEntity) -> GatewayResult<()> {
        let request = CreatePlayerRequest {
            id: Some(player.id),
            name: player.name,
        };
        let _: PlayerRecord = self
            .required(Method::POST, "/api/our-players", Some(&request))
            .await?;
        Ok(())
    }

    async fn rename_player(&self, id: Uuid, name: String) -> GatewayResult<Option<PlayerEntity>> {
        let path = format!("/api/our-players/{id}");
        let request = RenamePlayerRequest { name };
        let Some(record) = self
            .call::<_, PlayerRecord>(Method::PUT, &path, Some(&request))
            .await?
        else {
            return Ok(None);
        };
        PlayerEntity::try_from(record)
            .map(Some)
            .map_err(|err| GatewayError::InvalidPayload {
                path,
                message: err.to_string(),
            })
    }

    async fn health(&self) -> GatewayResult<()> {
        let path = "/api/health";
        let health: HealthResponse = self.required::<(), _>(Method::GET, path, None).await?;
        if health.status == "ok" {
            Ok(())
        } else {
            Err(GatewayError::Status {
                path: path.to_string(),
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: format!("backend reports `{}`", health.status),
            })
        }
    }
}

impl MatchStore for HttpGateway {
    fn create_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.create_match(record).await.map_err(Into::into) })
    }

    fn find_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.find_match(match_id).await.map_err(Into::into) })
    }

    fn update_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.update_match(record).await.map_err(Into::into) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.list_matches().await.map_err(Into::into) })
    }

    fn delete_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway
                .delete(&format!("/api/matches/{match_id}"))
                .await
                .map_err(Into::into)
        })
    }

    fn list_lineup(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<LineupEntity>>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway
                .list::<LineupRecord, _>(&format!("/api/match-lineups/{match_id}"))
                .await
                .map_err(Into::into)
        })
    }

    fn append_lineup(&self, entry: LineupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.append_lineup(entry).await.map_err(Into::into) })
    }

    fn remove_lineup(&self, match_id: String, entry_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway
                .delete(&format!("/api/match-lineups/{match_id}/{entry_id}"))
                .await
                .map_err(Into::into)
        })
    }

    fn list_grades(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<GradeTallyEntity>>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway
                .list::<GradeTallyRecord, _>(&format!("/api/match-stats/{match_id}"))
                .await
                .map_err(Into::into)
        })
    }

    fn increment_grade(&self, increment: GradeIncrement) -> BoxFuture<'static, StorageResult<GradeTallyEntity>> {
        let gateway = self.clone();
        Box::pin(async move {
            let request = GradeIncrementRequest::from(increment);
            gateway
                .required::<_, GradeTallyRecord>(Method::POST, "/api/match-stats", Some(&request))
                .await
                .map(Into::into)
                .map_err(Into::into)
        })
    }

    fn list_reasons(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<ReasonTallyEntity>>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway
                .list::<ReasonTallyRecord, _>(&format!("/api/reason-stats/{match_id}"))
                .await
                .map_err(Into::into)
        })
    }

    fn increment_reason(&self, increment: ReasonIncrement) -> BoxFuture<'static, StorageResult<ReasonTallyEntity>> {
        let gateway = self.clone();
        Box::pin(async move {
            let request = ReasonIncrementRequest::from(increment);
            gateway
                .required::<_, ReasonTallyRecord>(Method::POST, "/api/reason-stats", Some(&request))
                .await
                .map(Into::into)
                .map_err(Into::into)
        })
    }

    fn list_player_reasons(
        &self,
        match_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerReasonTallyEntity>>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway
                .list::<PlayerReasonTallyRecord, _>(&format!("/api/player-reason-stats/{match_id}"))
                .await
                .map_err(Into::into)
        })
    }

    fn increment_player_reason(
        &self,
        increment: PlayerReasonIncrement,
    ) -> BoxFuture<'static, StorageResult<PlayerReasonTallyEntity>> {
        let gateway = self.clone();
        Box::pin(async move {
            let request = PlayerReasonIncrementRequest::from(increment);
            gateway
                .required::<_, PlayerReasonTallyRecord>(
                    Method::POST,
                    "/api/player-reason-stats",
                    Some(&request),
                )
                .await
                .map(Into::into)
                .map_err(Into::into)
        })
    }

    fn list_rotations(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<RotationTallyEntity>>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway
                .list::<RotationTallyRecord, _>(&format!("/api/rotation-stats/{match_id}"))
                .await
                .map_err(Into::into)
        })
    }

    fn upsert_rotation(&self, tally: RotationTallyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.upsert_rotation(tally).await.map_err(Into::into) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.list_players().await.map_err(Into::into) })
    }

    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.create_player(player).await.map_err(Into::into) })
    }

    fn rename_player(&self, id: Uuid, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.rename_player(id, name).await.map_err(Into::into) })
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway
                .delete(&format!("/api/our-players/{id}"))
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.health().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.health().await.map_err(Into::into) })
    }
}

impl SessionSource for HttpGateway {
    fn active_session(&self) -> BoxFuture<'static, GatewayResult<String>> {
        let gateway = self.clone();
        Box::pin(async move {
            let response: ActiveSessionResponse = gateway
                .required::<(), _>(Method::GET, "/api/active-match", None)
                .await?;
            Ok(response.session_id)
        })
    }

    fn report_activity(&self) -> BoxFuture<'static, GatewayResult<()>> {
        let gateway = self.clone();
        Box::pin(async move {
            let _: AckResponse = gateway
                .required::<(), _>(Method::POST, "/api/report-activity", None)
                .await?;
            Ok(())
        })
    }

    fn next_set(&self, current: String) -> BoxFuture<'static, GatewayResult<NextSetResponse>> {
        let gateway = self.clone();
        Box::pin(async move {
            let request = NextSetRequest {
                session_id: current,
            };
            gateway
                .required(Method::POST, "/api/active-match/next-set", Some(&request))
                .await
        })
    }
}

/// In-process coordinator access, for clients embedded in the server process.
impl SessionSource for SharedState {
    fn active_session(&self) -> BoxFuture<'static, GatewayResult<String>> {
        let state = self.clone();
        Box::pin(async move {
            let response = session_service::active_session(&state).await?;
            Ok(response.session_id)
        })
    }

    fn report_activity(&self) -> BoxFuture<'static, GatewayResult<()>> {
        let state = self.clone();
        Box::pin(async move {
            session_service::report_activity(&state);
            Ok(())
        })
    }

    fn next_set(&self, current: String) -> BoxFuture<'static, GatewayResult<NextSetResponse>> {
        let state = self.clone();
        Box::pin(async move {
            let request = NextSetRequest {
                session_id: current,
            };
            Ok(session_service::next_set(&state, request).await?)
        })
    }
}
