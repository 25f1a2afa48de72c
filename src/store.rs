use crate::config::StoreConfig;
use log::{error, info, warn};
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tokio::sync::OnceCell;
#[cfg(feature = "trace")]
use tracing::instrument;

/// Outcome of a profile record lookup. Missing and Unavailable both degrade
/// to the default name, but only Missing triggers the write-back, so the
/// distinction is kept explicit instead of being folded into one error path.
#[derive(Debug)]
pub enum NameLookup {
    Found(String),
    Missing,
    Unavailable(String),
}

impl NameLookup {
    /// Decides the name to serve and whether the default must be written
    /// back. Only a missing record seeds; an unreachable store never
    /// triggers writes.
    pub fn resolve(self, default: &str) -> (String, bool) {
        match self {
            NameLookup::Found(value) => (value, false),
            NameLookup::Missing => (default.to_string(), true),
            NameLookup::Unavailable(_) => (default.to_string(), false),
        }
    }
}

/// Lazily-initialized handle to the document store. The client is established
/// on first use and reused afterwards; if establishment fails the next call
/// retries from scratch. The handle is never mutated once set, so sharing it
/// across connections needs no locking beyond the init cell.
pub struct ProfileStore {
    config: StoreConfig,
    default_name: String,
    client: OnceCell<Client>,
}

impl ProfileStore {
    pub fn new(config: StoreConfig, default_name: String) -> Self {
        ProfileStore {
            config,
            default_name,
            client: OnceCell::new(),
        }
    }

    #[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
    async fn client(&self) -> Result<&Client, mongodb::error::Error> {
        self.client
            .get_or_try_init(|| async {
                let mut options = ClientOptions::parse(&self.config.url).await?;
                options.server_selection_timeout = Some(self.config.timeout);
                options.connect_timeout = Some(self.config.timeout);
                let client = Client::with_options(options)?;
                info!("store client initialized for {}", self.config.url);
                Ok(client)
            })
            .await
    }

    fn collection(&self, client: &Client) -> Collection<Document> {
        client
            .database(&self.config.database)
            .collection(&self.config.collection)
    }

    #[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
    pub async fn lookup_name(&self) -> NameLookup {
        let client = match self.client().await {
            Ok(client) => client,
            Err(err) => return NameLookup::Unavailable(err.to_string()),
        };

        let filter = doc! { "key": self.config.name_key.as_str() };
        match self.collection(client).find_one(filter).await {
            Ok(Some(record)) => match record_value(&record) {
                Some(value) => NameLookup::Found(value),
                None => NameLookup::Missing,
            },
            Ok(None) => NameLookup::Missing,
            Err(err) => NameLookup::Unavailable(err.to_string()),
        }
    }

    /// The degradation policy behind `/api/name`: found value wins, a missing
    /// record seeds the default back into the store, an unreachable store
    /// falls back without writing. Never fails the request.
    #[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
    pub async fn name_or_default(&self) -> String {
        let lookup = self.lookup_name().await;
        if let NameLookup::Unavailable(details) = &lookup {
            error!("store unavailable, using default name: {}", details);
        }

        let (name, seed) = lookup.resolve(&self.default_name);
        if seed {
            warn!("profile record not found, seeding default name: {}", name);
            if let Err(err) = self.seed_default().await {
                warn!("failed to seed default name: {}", err);
            }
        }
        name
    }

    #[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
    async fn seed_default(&self) -> Result<(), mongodb::error::Error> {
        let client = self.client().await?;
        let key = self.config.name_key.as_str();
        self.collection(client)
            .update_one(
                doc! { "key": key },
                doc! { "$set": { "key": key, "value": self.default_name.as_str() } },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    /// Lightweight connectivity probe for `/health`.
    #[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
    pub async fn ping(&self) -> Result<(), mongodb::error::Error> {
        let client = self.client().await?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}

/// Extracts the name from the canonical record shape `{key, value}`.
/// A record with the right key but no usable string value counts as missing.
fn record_value(record: &Document) -> Option<String> {
    record.get_str("value").ok().map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::{record_value, NameLookup, ProfileStore};
    use crate::config::StoreConfig;
    use mongodb::bson::doc;
    use std::time::Duration;

    fn unreachable_store() -> ProfileStore {
        // Nothing listens on port 9; the selection timeout keeps tests fast.
        let config = StoreConfig {
            url: "mongodb://127.0.0.1:9/?directConnection=true".to_string(),
            database: "fkdb".to_string(),
            collection: "profile".to_string(),
            name_key: "name".to_string(),
            timeout: Duration::from_millis(200),
        };
        ProfileStore::new(config, "Test Default".to_string())
    }

    #[test]
    fn test_record_value_canonical_shape() {
        let record = doc! { "key": "name", "value": "Frank Koch" };
        assert_eq!(record_value(&record).as_deref(), Some("Frank Koch"));
    }

    #[test]
    fn test_record_value_missing_or_wrong_type() {
        assert!(record_value(&doc! { "key": "name" }).is_none());
        assert!(record_value(&doc! { "key": "name", "value": 42 }).is_none());
    }

    #[test]
    fn test_resolve_found_value_wins() {
        let (name, seed) = NameLookup::Found("Stored Name".to_string()).resolve("Default");
        assert_eq!(name, "Stored Name");
        assert!(!seed);
    }

    #[test]
    fn test_resolve_missing_seeds_default() {
        let (name, seed) = NameLookup::Missing.resolve("Default");
        assert_eq!(name, "Default");
        assert!(seed);
    }

    #[test]
    fn test_resolve_unavailable_does_not_seed() {
        let (name, seed) =
            NameLookup::Unavailable("connection refused".to_string()).resolve("Default");
        assert_eq!(name, "Default");
        assert!(!seed);
    }

    #[tokio::test]
    async fn test_lookup_unreachable_store() {
        let store = unreachable_store();
        match store.lookup_name().await {
            NameLookup::Unavailable(_) => {}
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_name_falls_back_to_default() {
        let store = unreachable_store();
        assert_eq!(store.name_or_default().await, "Test Default");
    }

    #[tokio::test]
    async fn test_ping_unreachable_store() {
        let store = unreachable_store();
        assert!(store.ping().await.is_err());
    }
}
