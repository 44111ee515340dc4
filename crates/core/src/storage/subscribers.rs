use anyhow::Context;

/// Set of Telegram user ids that receive the daily digest.
///
/// `add` and `remove` are idempotent: adding a present id or removing an
/// absent one succeeds without changing anything.
#[async_trait::async_trait]
pub trait SubscriberStore: Send + Sync {
    async fn add(&self, user_id: i64) -> anyhow::Result<()>;

    async fn remove(&self, user_id: i64) -> anyhow::Result<()>;

    async fn exists(&self, user_id: i64) -> anyhow::Result<bool>;

    async fn list_all(&self) -> anyhow::Result<Vec<i64>>;
}

#[derive(Debug, Clone)]
pub struct PgSubscriberStore {
    pool: sqlx::PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriberStore for PgSubscriberStore {
    async fn add(&self, user_id: i64) -> anyhow::Result<()> {
        let res = sqlx::query(
            "INSERT INTO subscribers (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert subscriber failed (user_id={user_id})"))?;

        tracing::info!(user_id, inserted = res.rows_affected(), "subscriber added");
        Ok(())
    }

    async fn remove(&self, user_id: i64) -> anyhow::Result<()> {
        let res = sqlx::query("DELETE FROM subscribers WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("delete subscriber failed (user_id={user_id})"))?;

        tracing::info!(user_id, deleted = res.rows_affected(), "subscriber removed");
        Ok(())
    }

    async fn exists(&self, user_id: i64) -> anyhow::Result<bool> {
        let found: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM subscribers WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("subscriber lookup failed (user_id={user_id})"))?;
        Ok(found.0)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<i64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT user_id FROM subscribers ORDER BY created_at ASC, user_id ASC")
                .fetch_all(&self.pool)
                .await
                .context("list subscribers failed")?;
        Ok(ids)
    }
}

/// In-memory test double; ids list in ascending order.
#[cfg(any(test, feature = "testkit"))]
#[derive(Debug, Default)]
pub struct MemorySubscriberStore {
    ids: tokio::sync::Mutex<std::collections::BTreeSet<i64>>,
}

#[cfg(any(test, feature = "testkit"))]
impl MemorySubscriberStore {
    pub fn with_subscribers(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: tokio::sync::Mutex::new(ids.into_iter().collect()),
        }
    }

    pub async fn count(&self) -> usize {
        self.ids.lock().await.len()
    }
}

#[cfg(any(test, feature = "testkit"))]
#[async_trait::async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn add(&self, user_id: i64) -> anyhow::Result<()> {
        self.ids.lock().await.insert(user_id);
        Ok(())
    }

    async fn remove(&self, user_id: i64) -> anyhow::Result<()> {
        self.ids.lock().await.remove(&user_id);
        Ok(())
    }

    async fn exists(&self, user_id: i64) -> anyhow::Result<bool> {
        Ok(self.ids.lock().await.contains(&user_id))
    }

    async fn list_all(&self) -> anyhow::Result<Vec<i64>> {
        Ok(self.ids.lock().await.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_remove_are_idempotent() {
        let store = MemorySubscriberStore::default();

        store.add(42).await.unwrap();
        store.add(42).await.unwrap();
        assert_eq!(store.count().await, 1);
        assert!(store.exists(42).await.unwrap());

        store.remove(42).await.unwrap();
        store.remove(42).await.unwrap();
        assert_eq!(store.count().await, 0);
        assert!(!store.exists(42).await.unwrap());
    }

    #[tokio::test]
    async fn lists_every_subscriber() {
        let store = MemorySubscriberStore::with_subscribers([3, 1, 2]);
        assert_eq!(store.list_all().await.unwrap(), vec![1, 2, 3]);
    }
}
