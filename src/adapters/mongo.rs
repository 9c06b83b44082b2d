use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection,
    bson::{self, Bson, doc},
};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    config::MongoConfig,
    error::{GatewayError, external_service},
    ports::UnstructuredLogPort,
    types::Document,
};

pub struct MongoUnstructuredLog {
    config: MongoConfig,
    collection: Mutex<Option<Collection<bson::Document>>>,
}

impl MongoUnstructuredLog {
    pub fn new(config: &MongoConfig) -> Self {
        Self {
            config: config.clone(),
            collection: Mutex::new(None),
        }
    }

    async fn collection(&self) -> Result<Collection<bson::Document>, GatewayError> {
        let mut guard = self.collection.lock().await;
        if let Some(collection) = guard.as_ref() {
            return Ok(collection.clone());
        }

        let client = Client::with_uri_str(&self.config.url)
            .await
            .map_err(|err| external_service(format!("mongodb client setup failed: {err}")))?;
        let collection = client
            .database(&self.config.database)
            .collection::<bson::Document>(&self.config.collection);
        *guard = Some(collection.clone());
        Ok(collection)
    }
}

#[async_trait]
impl UnstructuredLogPort for MongoUnstructuredLog {
    async fn append(&self, document: Document) -> Result<(), GatewayError> {
        let document = bson::to_document(&Value::Object(document))
            .map_err(|err| external_service(format!("document is not bson encodable: {err}")))?;
        let collection = self.collection().await?;
        collection
            .insert_one(document)
            .await
            .map_err(|err| external_service(format!("mongodb insert failed: {err}")))?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Document>, GatewayError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let collection = self.collection().await?;
        let cursor = collection
            .find(doc! {})
            .sort(doc! { "_id": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|err| external_service(format!("mongodb find failed: {err}")))?;
        let documents: Vec<bson::Document> = cursor
            .try_collect()
            .await
            .map_err(|err| external_service(format!("mongodb cursor failed: {err}")))?;

        Ok(documents
            .into_iter()
            .filter_map(|document| match Bson::Document(document).into_relaxed_extjson() {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }
}
