use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use tracing::debug;

use crate::dao::{
    models::{GameSettingEntity, NewGameSetting},
    settings_store::{ChangeStream, SettingsStore},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchSettingDocument, END_SUFFIX, SETTING_PREFIX,
        setting_doc_id,
    },
};

const ALL_DOCS: &str = "_all_docs";
const CHANGES: &str = "_changes";
/// How long CouchDB keeps a long-poll request open before answering with no results.
const LONGPOLL_TIMEOUT_MS: &str = "30000";

/// [`SettingsStore`] backed by one CouchDB database over HTTP.
#[derive(Clone)]
pub struct CouchSettingsStore {
    client: Client,
    base_url: Url,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchSettingsStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let trimmed = config.base_url.trim_end_matches('/');
        let base_url = Url::parse(trimmed).map_err(|_| CouchDaoError::InvalidBaseUrl {
            url: config.base_url.clone(),
        })?;
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    /// URL of the database itself, optionally extended with extra path segments.
    fn url(&self, segments: &[&str]) -> CouchResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CouchDaoError::InvalidBaseUrl {
                url: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .push(&self.database)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, path: &str) -> CouchResult<reqwest::RequestBuilder> {
        let url = if path.is_empty() {
            self.url(&[])?
        } else {
            self.url(&[path])?
        };
        let builder = self.client.request(method, url);
        Ok(if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let response = self
            .request(Method::GET, "")?
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .request(Method::PUT, "")?
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means another instance created it between our GET and PUT.
                if create.status().is_success()
                    || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)?
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)?
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: doc_id.to_string(),
            }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let encode = |key: String| {
            serde_json::to_string(&key).map_err(|source| CouchDaoError::DeserializeValue {
                path: ALL_DOCS.to_string(),
                source,
            })
        };
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", encode(prefix.to_string())?),
            ("endkey", encode(format!("{prefix}{END_SUFFIX}"))?),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)?
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: row.id,
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    /// Fetch one page of the `_changes` feed after `since`, waiting for new changes when `wait` is set.
    async fn poll_changes(&self, since: &Value, wait: bool) -> CouchResult<ChangesResponse> {
        let since = match since {
            Value::String(seq) => seq.clone(),
            other => other.to_string(),
        };
        let mut query = vec![("since", since), ("include_docs", "true".to_string())];
        if wait {
            query.push(("feed", "longpoll".to_string()));
            query.push(("timeout", LONGPOLL_TIMEOUT_MS.to_string()));
        }

        let response = self
            .request(Method::GET, CHANGES)?
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: CHANGES.to_string(),
                source,
            })
    }
}

impl SettingsStore for CouchSettingsStore {
    fn list_settings(&self) -> BoxFuture<'static, StorageResult<Vec<GameSettingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchSettingDocument>(SETTING_PREFIX)
                .await?;
            Ok(docs.into_iter().map(CouchSettingDocument::into_entity).collect())
        })
    }

    fn update_setting(
        &self,
        game_name: String,
        is_enabled: bool,
        updated_at: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSettingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = setting_doc_id(&game_name);
            let Some(mut doc) = store.get_document::<CouchSettingDocument>(&doc_id).await? else {
                return Ok(Vec::new());
            };

            doc.setting.is_enabled = is_enabled;
            doc.setting.updated_at = updated_at;
            store.put_document(&doc_id, &doc).await?;
            Ok(vec![doc.into_entity()])
        })
    }

    fn insert_setting(
        &self,
        setting: NewGameSetting,
    ) -> BoxFuture<'static, StorageResult<GameSettingEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = CouchSettingDocument::from_new(setting);
            store.put_document(&doc.doc_id, &doc).await?;
            Ok(doc.into_entity())
        })
    }

    fn changes(&self) -> BoxFuture<'static, StorageResult<ChangeStream>> {
        let store = self.clone();
        Box::pin(async move {
            let head = store.poll_changes(&Value::from("now"), false).await?;
            let stream = async_stream::try_stream! {
                let mut since = head.last_seq;
                loop {
                    let page = store
                        .poll_changes(&since, true)
                        .await
                        .map_err(StorageError::from)?;
                    since = page.last_seq;
                    for row in page.results {
                        let doc_id = row.id.clone();
                        let event = row.into_event().map_err(|source| {
                            StorageError::from(CouchDaoError::DeserializeValue {
                                path: doc_id,
                                source,
                            })
                        })?;
                        if let Some(event) = event {
                            debug!(?event, "received CouchDB change");
                            yield event;
                        }
                    }
                }
            };
            Ok(Box::pin(stream) as ChangeStream)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let path = store.database.to_string();
            let response = store
                .request(Method::GET, "")?
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: path.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
