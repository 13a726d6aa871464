use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use models::{
    Associated, AssociatedView, DeletePolicy, Deletion, Document, Draft, Record, RecordId, Schema,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{errors::ServiceError, storage::json_document::JsonDocumentFile};

/// The document of a schema: both of its collections.
pub type SchemaDocument<S> = Document<<S as Schema>::Primary, <S as Schema>::Secondary>;

/// A secondary record of a schema with its primary record embedded.
pub type SchemaView<S> = AssociatedView<<S as Schema>::Secondary, <S as Schema>::Primary>;

#[derive(Debug, Default)]
struct Gate {
    closed: bool,
}

impl Gate {
    fn check(&self) -> Result<(), ServiceError> {
        if self.closed {
            return Err(ServiceError::Storage("store is closed".into()));
        }
        Ok(())
    }
}

/// File-backed store for the two collections of one [`Schema`].
///
/// Every operation loads the whole document from disk, and every mutation
/// writes the whole document back. All operations pass through one async
/// read/write gate: mutations hold it exclusively from load to persist, reads
/// share it. Two mutations therefore never interleave, and a read started
/// after a mutation returned sees its effect.
pub struct RecordStore<S: Schema> {
    file: JsonDocumentFile,
    gate: RwLock<Gate>,
    policy: DeletePolicy,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> RecordStore<S> {
    /// Open the store at `path`, creating an empty document if the file is
    /// missing. An existing file must parse and satisfy the reference
    /// invariants, otherwise opening fails.
    pub async fn open<P: Into<PathBuf>>(
        path: P,
        policy: DeletePolicy,
    ) -> Result<Arc<Self>, ServiceError> {
        let file = JsonDocumentFile::open_or_init(path, &SchemaDocument::<S>::default()).await?;
        let store = Self { file, gate: RwLock::new(Gate::default()), policy, _schema: PhantomData };

        let doc = store.read_document().await?;
        info!(
            schema = S::NAME,
            path = %store.path().display(),
            primary = doc.primary.len(),
            secondary = doc.secondary.len(),
            %policy,
            "record store opened"
        );
        Ok(Arc::new(store))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub const fn delete_policy(&self) -> DeletePolicy {
        self.policy
    }

    fn primary_kind() -> &'static str {
        <S::Primary as Record>::KIND
    }

    fn secondary_kind() -> &'static str {
        <S::Secondary as Record>::KIND
    }

    async fn read_document(&self) -> Result<SchemaDocument<S>, ServiceError> {
        let doc: SchemaDocument<S> = self.file.read().await?;
        doc.verify()?;
        Ok(doc)
    }

    /// Run `f` on a freshly loaded document while holding the gate
    /// exclusively, then persist the result. Nothing is written if `f` or
    /// the invariant check fails.
    async fn mutate<T, F>(&self, op: &'static str, f: F) -> Result<T, ServiceError>
    where
        T: Send,
        F: FnOnce(&mut SchemaDocument<S>) -> Result<T, ServiceError> + Send,
    {
        let gate = self.gate.write().await;
        gate.check()?;

        let mut doc = self.read_document().await?;
        let out = f(&mut doc)?;
        doc.verify()?;
        self.file.replace(&doc).await?;

        debug!(schema = S::NAME, op, "mutation persisted");
        Ok(out)
    }

    /// Load the current document.
    pub async fn load(&self) -> Result<SchemaDocument<S>, ServiceError> {
        let gate = self.gate.read().await;
        gate.check()?;
        self.read_document().await
    }

    /// Create a primary record. When `assign` names a secondary record, that
    /// record is attached to the new primary in the same write.
    pub async fn create_primary(
        &self,
        draft: S::NewPrimary,
        assign: Option<RecordId>,
    ) -> Result<S::Primary, ServiceError> {
        let record = draft.into_record(RecordId::generate())?;
        let id = record.id();

        let created = self
            .mutate("create_primary", move |doc| {
                if let Some(target) = assign {
                    doc.secondary_mut(target)
                        .ok_or_else(|| {
                            ServiceError::reference_not_found(Self::secondary_kind(), target)
                        })?
                        .set_primary_ref(Some(id));
                }
                doc.primary.push(record.clone());
                Ok(record)
            })
            .await?;

        info!(schema = S::NAME, kind = Self::primary_kind(), %id, assigned = ?assign, "record created");
        Ok(created)
    }

    /// Create a secondary record, optionally associated with an existing
    /// primary record. The reference is checked against the same snapshot
    /// that receives the new record.
    pub async fn create_secondary(
        &self,
        draft: S::NewSecondary,
        primary_ref: Option<RecordId>,
    ) -> Result<S::Secondary, ServiceError> {
        let mut record = draft.into_record(RecordId::generate())?;
        let id = record.id();

        let created = self
            .mutate("create_secondary", move |doc| {
                if let Some(target) = primary_ref {
                    if doc.primary(target).is_none() {
                        return Err(ServiceError::reference_not_found(Self::primary_kind(), target));
                    }
                }
                record.set_primary_ref(primary_ref);
                doc.secondary.push(record.clone());
                Ok(record)
            })
            .await?;

        info!(schema = S::NAME, kind = Self::secondary_kind(), %id, primary = ?primary_ref, "record created");
        Ok(created)
    }

    pub async fn list_primary(&self) -> Result<Vec<S::Primary>, ServiceError> {
        Ok(self.load().await?.primary)
    }

    pub async fn list_secondary(&self) -> Result<Vec<S::Secondary>, ServiceError> {
        Ok(self.load().await?.secondary)
    }

    pub async fn get_primary(&self, id: RecordId) -> Result<S::Primary, ServiceError> {
        let doc = self.load().await?;
        doc.primary(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(Self::primary_kind(), id))
    }

    /// The secondary record with its primary record resolved (or null).
    pub async fn get_secondary_with_association(
        &self,
        id: RecordId,
    ) -> Result<SchemaView<S>, ServiceError> {
        let doc = self.load().await?;
        let secondary = doc
            .secondary(id)
            .ok_or_else(|| ServiceError::not_found(Self::secondary_kind(), id))?;
        Ok(doc.view(secondary))
    }

    /// Point a secondary record at a primary record. A missing secondary is
    /// reported before a missing primary.
    pub async fn associate(
        &self,
        secondary_id: RecordId,
        primary_id: RecordId,
    ) -> Result<SchemaView<S>, ServiceError> {
        let view = self
            .mutate("associate", move |doc| {
                let primary = doc.primary(primary_id).cloned();
                let secondary = doc
                    .secondary_mut(secondary_id)
                    .ok_or_else(|| ServiceError::not_found(Self::secondary_kind(), secondary_id))?;
                let primary = primary
                    .ok_or_else(|| ServiceError::not_found(Self::primary_kind(), primary_id))?;
                secondary.set_primary_ref(Some(primary_id));
                Ok(AssociatedView { record: secondary.clone(), primary: Some(primary) })
            })
            .await?;

        info!(schema = S::NAME, secondary = %secondary_id, primary = %primary_id, "association set");
        Ok(view)
    }

    /// Clear the association of a secondary record. Succeeds when it was
    /// already clear.
    pub async fn clear_association(&self, secondary_id: RecordId) -> Result<SchemaView<S>, ServiceError> {
        let view = self
            .mutate("clear_association", move |doc| {
                let secondary = doc
                    .secondary_mut(secondary_id)
                    .ok_or_else(|| ServiceError::not_found(Self::secondary_kind(), secondary_id))?;
                secondary.set_primary_ref(None);
                Ok(AssociatedView { record: secondary.clone(), primary: None })
            })
            .await?;

        info!(schema = S::NAME, secondary = %secondary_id, "association cleared");
        Ok(view)
    }

    /// Delete a primary record, handling secondary records that reference it
    /// according to the store's [`DeletePolicy`].
    pub async fn delete_primary(&self, id: RecordId) -> Result<Deletion, ServiceError> {
        let policy = self.policy;
        let deletion = self
            .mutate("delete_primary", move |doc| {
                let index = doc
                    .primary
                    .iter()
                    .position(|p| p.id() == id)
                    .ok_or_else(|| ServiceError::not_found(Self::primary_kind(), id))?;

                let count = doc.referrers(id).count();
                if count > 0 && policy == DeletePolicy::Restrict {
                    return Err(ServiceError::ReferenceConflict {
                        kind: Self::primary_kind(),
                        id: id.to_string(),
                        referrer: Self::secondary_kind(),
                        count,
                    });
                }

                for secondary in &mut doc.secondary {
                    if secondary.primary_ref() == Some(id) {
                        secondary.set_primary_ref(None);
                    }
                }
                doc.primary.remove(index);
                Ok(Deletion::new(Self::primary_kind(), id, count))
            })
            .await?;

        info!(
            schema = S::NAME,
            kind = Self::primary_kind(),
            %id,
            cleared = deletion.cleared_references,
            "record deleted"
        );
        Ok(deletion)
    }

    pub async fn delete_secondary(&self, id: RecordId) -> Result<Deletion, ServiceError> {
        let deletion = self
            .mutate("delete_secondary", move |doc| {
                let index = doc
                    .secondary
                    .iter()
                    .position(|s| s.id() == id)
                    .ok_or_else(|| ServiceError::not_found(Self::secondary_kind(), id))?;
                doc.secondary.remove(index);
                Ok(Deletion::new(Self::secondary_kind(), id, 0))
            })
            .await?;

        info!(schema = S::NAME, kind = Self::secondary_kind(), %id, "record deleted");
        Ok(deletion)
    }

    /// Wait for in-flight operations and refuse all later ones. Every
    /// completed mutation is already on disk, so there is nothing to flush.
    pub async fn close(&self) {
        let mut gate = self.gate.write().await;
        if !gate.closed {
            gate.closed = true;
            info!(schema = S::NAME, path = %self.path().display(), "record store closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use models::{
        catalog::{Catalog, NewCategory, NewProduct},
        fleet::{Bus, Driver, Fleet, NewBus, NewDriver},
    };
    use uuid::Uuid;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("record_store_{}", Uuid::new_v4())).join(name)
    }

    async fn fleet_store(policy: DeletePolicy) -> Result<Arc<RecordStore<Fleet>>, ServiceError> {
        RecordStore::<Fleet>::open(temp_path("fleet.json"), policy).await
    }

    async fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    fn alice() -> NewDriver {
        NewDriver {
            name: Some("Alice".into()),
            birth_date: Some("1988-02-17".into()),
            license_number: Some("SP-0042".into()),
        }
    }

    fn bus(plate: &str) -> NewBus {
        NewBus {
            plate: Some(plate.into()),
            model: Some("Marcopolo Torino".into()),
            manufacture_year: Some(2018),
            capacity: Some(42),
        }
    }

    #[tokio::test]
    async fn open_creates_an_empty_document() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let raw: serde_json::Value = serde_json::from_slice(&tokio::fs::read(store.path()).await?)?;
        assert_eq!(raw, serde_json::json!({"primaryEntities": [], "secondaryEntities": []}));
        assert!(store.list_primary().await?.is_empty());
        assert!(store.list_secondary().await?.is_empty());
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn driver_and_bus_scenario() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;

        let driver = store.create_primary(alice(), None).await?;
        let created = store.create_secondary(bus("ABC123"), Some(driver.id)).await?;
        assert_eq!(created.driver_id, Some(driver.id));

        let view = store.get_secondary_with_association(created.id).await?;
        assert_eq!(view.record.plate, "ABC123");
        assert_eq!(view.primary.as_ref(), Some(&driver));
        let json = serde_json::to_value(&view)?;
        assert_eq!(json["driver"]["name"], "Alice");
        assert_eq!(json["driver_id"], driver.id.to_string());

        let cleared = store.clear_association(created.id).await?;
        assert_eq!(cleared.record.driver_id, None);
        assert_eq!(cleared.primary, None);
        let json = serde_json::to_value(&cleared)?;
        assert!(json["driver"].is_null());
        assert!(json["driver_id"].is_null());

        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn ids_are_unique_and_order_is_kept() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(store.create_secondary(bus(&format!("BUS{i:03}")), None).await?.id);
        }
        let listed: Vec<RecordId> = store.list_secondary().await?.iter().map(|b| b.id).collect();
        assert_eq!(listed, ids);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn missing_attribute_is_rejected_without_writing() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let before = tokio::fs::read(store.path()).await?;

        let mut draft = alice();
        draft.license_number = Some(String::new());
        let err = store.create_primary(draft, None).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        assert_eq!(tokio::fs::read(store.path()).await?, before);
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn unknown_reference_never_appends() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        store.create_primary(alice(), None).await?;

        let ghost = RecordId::generate();
        let err = store.create_secondary(bus("ABC123"), Some(ghost)).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReferenceNotFound { kind: "driver", .. }));
        assert!(store.list_secondary().await?.is_empty());
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn create_driver_assigning_a_bus() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let b = store.create_secondary(bus("ABC123"), None).await?;

        let driver = store.create_primary(alice(), Some(b.id)).await?;
        let view = store.get_secondary_with_association(b.id).await?;
        assert_eq!(view.primary, Some(driver));

        // a bad bus id blocks the whole create
        let err = store.create_primary(alice(), Some(RecordId::generate())).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReferenceNotFound { kind: "bus", .. }));
        assert_eq!(store.list_primary().await?.len(), 1);
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn associate_then_read_back() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let first = store.create_primary(alice(), None).await?;
        let mut other = alice();
        other.name = Some("Bruno".into());
        let second = store.create_primary(other, None).await?;
        let b = store.create_secondary(bus("ABC123"), Some(first.id)).await?;

        let view = store.associate(b.id, second.id).await?;
        assert_eq!(view.primary.as_ref(), Some(&second));

        let read = store.get_secondary_with_association(b.id).await?;
        assert_eq!(read.primary, Some(second));
        assert_eq!(read.record.driver_id, read.primary.as_ref().map(|d| d.id));
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn associate_reports_which_side_is_missing() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let driver = store.create_primary(alice(), None).await?;
        let b = store.create_secondary(bus("ABC123"), None).await?;

        let err = store.associate(RecordId::generate(), driver.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { kind: "bus", .. }));
        let err = store.associate(b.id, RecordId::generate()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { kind: "driver", .. }));

        assert_eq!(store.get_secondary_with_association(b.id).await?.primary, None);
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn clear_association_is_idempotent() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let driver = store.create_primary(alice(), None).await?;
        let b = store.create_secondary(bus("ABC123"), Some(driver.id)).await?;

        let once = store.clear_association(b.id).await?;
        let twice = store.clear_association(b.id).await?;
        assert_eq!(once, twice);
        assert_eq!(twice.record.driver_id, None);

        let err = store.clear_association(RecordId::generate()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_lose_nothing() -> Result<(), anyhow::Error> {
        const N: usize = 32;
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let driver = store.create_primary(alice(), None).await?;

        let mut tasks = Vec::with_capacity(N);
        for i in 0..N {
            let store = Arc::clone(&store);
            let driver_id = (i % 2 == 0).then_some(driver.id);
            tasks.push(tokio::spawn(async move {
                store.create_secondary(bus(&format!("CON{i:03}")), driver_id).await
            }));
        }
        for task in tasks {
            task.await??;
        }

        let buses = store.list_secondary().await?;
        assert_eq!(buses.len(), N);
        assert_eq!(buses.iter().map(|b| b.id).collect::<HashSet<_>>().len(), N);
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn disk_matches_the_written_document() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let driver = store.create_primary(alice(), None).await?;
        store.create_secondary(bus("ABC123"), Some(driver.id)).await?;

        let raw = tokio::fs::read(store.path()).await?;
        let on_disk: Document<Driver, Bus> = serde_json::from_slice(&raw)?;
        assert_eq!(on_disk, store.load().await?);
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn malformed_file_is_storage_unavailable() -> Result<(), anyhow::Error> {
        let path = temp_path("fleet.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await?;
        tokio::fs::write(&path, br#"{"primaryEntities": "#).await?;
        let err = RecordStore::<Fleet>::open(&path, DeletePolicy::Restrict).await.err().unwrap();
        assert_eq!(err.kind(), "storage_unavailable");

        // corruption after opening fails the next operation
        tokio::fs::write(&path, br#"{"primaryEntities": [], "secondaryEntities": []}"#).await?;
        let store = RecordStore::<Fleet>::open(&path, DeletePolicy::Restrict).await?;
        tokio::fs::write(&path, b"[]").await?;
        let err = store.create_primary(alice(), None).await.unwrap_err();
        assert_eq!(err.kind(), "storage_unavailable");
        assert_eq!(tokio::fs::read(&path).await?, b"[]");
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn dangling_reference_on_disk_is_refused() -> Result<(), anyhow::Error> {
        let path = temp_path("fleet.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await?;
        let doc = serde_json::json!({
            "primaryEntities": [],
            "secondaryEntities": [{
                "id": Uuid::new_v4(),
                "plate": "ABC123",
                "model": "Marcopolo",
                "manufacture_year": 2018,
                "capacity": 42,
                "driver_id": Uuid::new_v4(),
            }],
        });
        tokio::fs::write(&path, serde_json::to_vec(&doc)?).await?;
        let err = RecordStore::<Fleet>::open(&path, DeletePolicy::Restrict).await.err().unwrap();
        assert!(matches!(err, ServiceError::Storage(_)));
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn restrict_policy_keeps_referenced_primary() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        let driver = store.create_primary(alice(), None).await?;
        let b = store.create_secondary(bus("ABC123"), Some(driver.id)).await?;

        let err = store.delete_primary(driver.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReferenceConflict { count: 1, .. }));
        assert_eq!(store.list_primary().await?.len(), 1);

        store.clear_association(b.id).await?;
        let deletion = store.delete_primary(driver.id).await?;
        assert_eq!(deletion.cleared_references, 0);
        assert!(store.list_primary().await?.is_empty());

        let err = store.delete_primary(driver.id).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn nullify_policy_clears_references() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Nullify).await?;
        let driver = store.create_primary(alice(), None).await?;
        let a = store.create_secondary(bus("AAA111"), Some(driver.id)).await?;
        let b = store.create_secondary(bus("BBB222"), Some(driver.id)).await?;

        let deletion = store.delete_primary(driver.id).await?;
        assert_eq!(deletion.cleared_references, 2);
        assert_eq!(deletion.message, "driver deleted successfully");
        for id in [a.id, b.id] {
            let view = store.get_secondary_with_association(id).await?;
            assert_eq!(view.record.primary_ref(), None);
        }
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn catalog_products_can_be_deleted() -> Result<(), anyhow::Error> {
        let store = RecordStore::<Catalog>::open(temp_path("catalog.json"), DeletePolicy::Restrict).await?;
        let category = store.create_primary(NewCategory { name: Some("Books".into()) }, None).await?;
        let product = store
            .create_secondary(
                NewProduct { name: Some("Dune".into()), price: Some(39.9) },
                Some(category.id),
            )
            .await?;
        assert_eq!(store.get_primary(category.id).await?, category);

        let deletion = store.delete_secondary(product.id).await?;
        assert_eq!(deletion.message, "product deleted successfully");
        assert!(store.list_secondary().await?.is_empty());
        let err = store.get_secondary_with_association(product.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { kind: "product", .. }));

        // nothing references the category any more
        store.delete_primary(category.id).await?;
        cleanup(store.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn closed_store_refuses_operations() -> Result<(), anyhow::Error> {
        let store = fleet_store(DeletePolicy::Restrict).await?;
        store.create_primary(alice(), None).await?;
        store.close().await;
        store.close().await;

        assert_eq!(store.list_primary().await.unwrap_err().kind(), "storage_unavailable");
        assert!(store.create_primary(alice(), None).await.is_err());
        cleanup(store.path()).await;
        Ok(())
    }
}
