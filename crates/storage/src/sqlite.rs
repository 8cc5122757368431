use std::collections::BTreeSet;

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use tracing::{debug, warn};

use lexmodel_core::{ConcreteType, EntityId, FieldData};

use crate::error::StorageError;
use crate::traits::{EntityRecord, InsertPosition, OwnerRef, OwnerSlot, ReferenceEdge, Store};

const ENTITY_COLUMNS: &str = "entity_id, type_name, owner_id, owner_field, ord";

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn to_entity_id(bytes: Vec<u8>, label: &str) -> Result<EntityId, StorageError> {
    Ok(EntityId::from_bytes(to_array::<16>(bytes, label)?))
}

type RawEntity = (Vec<u8>, String, Option<Vec<u8>>, Option<String>, Option<i64>);

fn read_raw_entity(row: &rusqlite::Row) -> rusqlite::Result<RawEntity> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn entity_from_raw(raw: RawEntity) -> Result<EntityRecord, StorageError> {
    let (id_bytes, type_name, owner_bytes, owner_field, ord) = raw;
    let entity_id = to_entity_id(id_bytes, "entity_id")?;
    let ty = ConcreteType::parse(&type_name)?;
    let owner = match (owner_bytes, owner_field) {
        (Some(bytes), Some(field)) => Some(OwnerRef {
            owner: to_entity_id(bytes, "owner_id")?,
            field,
            ordinal: ord.unwrap_or_default(),
        }),
        _ => None,
    };
    Ok(EntityRecord {
        entity_id,
        ty,
        owner,
    })
}

/// SQLite-backed store. Units of work map onto `BEGIN IMMEDIATE` / `COMMIT` /
/// `ROLLBACK`; mutations outside a unit of work run in their own transaction.
pub struct SqliteStore {
    conn: Connection,
    writable: bool,
    in_unit_of_work: bool,
    factories: BTreeSet<ConcreteType>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::from_connection(conn, true))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::from_connection(conn, true))
    }

    /// Open an existing project file without write access.
    pub fn open_read_only(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn, false))
    }

    fn from_connection(conn: Connection, writable: bool) -> Self {
        Self {
            conn,
            writable,
            in_unit_of_work: false,
            factories: ConcreteType::ALL.iter().copied().collect(),
        }
    }

    /// Restrict the factory to the given types.
    pub fn with_factories(mut self, types: impl IntoIterator<Item = ConcreteType>) -> Self {
        self.set_factories(types);
        self
    }

    pub fn set_factories(&mut self, types: impl IntoIterator<Item = ConcreteType>) {
        self.factories = types.into_iter().collect();
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.writable = !read_only;
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn entity_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn require_writable(&self) -> Result<(), StorageError> {
        if self.writable {
            Ok(())
        } else {
            Err(StorageError::ReadOnly)
        }
    }

    /// Run `f` inside the current unit of work, or inside a transaction of its
    /// own when none is open.
    fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        if self.in_unit_of_work {
            return f(self);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    if !self.conn.is_autocommit() {
                        let _ = self.conn.execute_batch("ROLLBACK");
                    }
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Pick the ordinal for a new member of `owner.field`, shifting later
    /// members when inserting in the middle.
    fn claim_ordinal(
        &self,
        owner: EntityId,
        field: &str,
        position: InsertPosition,
    ) -> Result<i64, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT ord FROM entities WHERE owner_id = ?1 AND owner_field = ?2 ORDER BY ord, rowid",
        )?;
        let ords: Vec<i64> = stmt
            .query_map(rusqlite::params![owner.as_bytes().as_slice(), field], |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        match position {
            InsertPosition::At(index) if index < ords.len() => {
                let at = ords[index];
                self.conn.execute(
                    "UPDATE entities SET ord = ord + 1 WHERE owner_id = ?1 AND owner_field = ?2 AND ord >= ?3",
                    rusqlite::params![owner.as_bytes().as_slice(), field, at],
                )?;
                Ok(at)
            }
            _ => Ok(ords.last().map_or(0, |last| last + 1)),
        }
    }

    fn subtree_ids(&self, root: EntityId) -> Result<Vec<EntityId>, StorageError> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE subtree(id) AS (
                SELECT entity_id FROM entities WHERE entity_id = ?1
                UNION
                SELECT e.entity_id FROM entities e JOIN subtree s ON e.owner_id = s.id
            )
            SELECT id FROM subtree",
        )?;
        let rows = stmt.query_map(rusqlite::params![root.as_bytes().as_slice()], |row| {
            row.get::<_, Vec<u8>>(0)
        })?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(to_entity_id(row?, "entity_id")?);
        }
        Ok(ids)
    }

    fn read_edges(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ReferenceEdge>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, Vec<u8>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut edges = Vec::new();
        for row in rows {
            let (source, field, target, ordinal) = row?;
            edges.push(ReferenceEdge {
                source: to_entity_id(source, "source_id")?,
                field,
                target: to_entity_id(target, "target_id")?,
                ordinal,
            });
        }
        Ok(edges)
    }
}

impl Store for SqliteStore {
    fn is_writable(&self) -> bool {
        self.writable
    }

    fn begin_unit_of_work(&mut self) -> Result<(), StorageError> {
        self.require_writable()?;
        if self.in_unit_of_work {
            return Err(StorageError::UnitOfWorkActive);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_unit_of_work = true;
        debug!("unit of work started");
        Ok(())
    }

    fn commit_unit_of_work(&mut self) -> Result<(), StorageError> {
        if !self.in_unit_of_work {
            return Err(StorageError::NoUnitOfWork);
        }
        self.in_unit_of_work = false;
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            // A failed COMMIT can leave the transaction open.
            warn!("commit failed, rolling back: {}", e);
            if !self.conn.is_autocommit() {
                self.conn.execute_batch("ROLLBACK")?;
            }
            return Err(e.into());
        }
        debug!("unit of work committed");
        Ok(())
    }

    fn rollback_unit_of_work(&mut self) -> Result<(), StorageError> {
        if !self.in_unit_of_work {
            return Err(StorageError::NoUnitOfWork);
        }
        self.in_unit_of_work = false;
        self.conn.execute_batch("ROLLBACK")?;
        debug!("unit of work rolled back");
        Ok(())
    }

    fn in_unit_of_work(&self) -> bool {
        self.in_unit_of_work
    }

    fn has_factory(&self, ty: ConcreteType) -> bool {
        self.factories.contains(&ty)
    }

    fn create_instance(
        &mut self,
        ty: ConcreteType,
        slot: Option<OwnerSlot<'_>>,
    ) -> Result<EntityId, StorageError> {
        self.require_writable()?;
        if !self.has_factory(ty) {
            return Err(StorageError::NoFactory(ty));
        }
        let entity_id = EntityId::new();

        self.atomically(|store| {
            let (owner_id, owner_field, ord) = match slot {
                None => (None, None, None),
                Some(slot) => {
                    if store.get_entity(slot.owner)?.is_none() {
                        return Err(StorageError::NotFound(format!("owner {}", slot.owner)));
                    }
                    let ord = store.claim_ordinal(slot.owner, slot.field, slot.position)?;
                    (
                        Some(slot.owner.as_bytes().to_vec()),
                        Some(slot.field.to_string()),
                        Some(ord),
                    )
                }
            };
            store.conn.execute(
                "INSERT INTO entities (entity_id, type_name, owner_id, owner_field, ord) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    entity_id.as_bytes().as_slice(),
                    ty.as_str(),
                    owner_id,
                    owner_field,
                    ord,
                ],
            )?;
            Ok(())
        })?;

        Ok(entity_id)
    }

    fn get_entity(&self, entity_id: EntityId) -> Result<Option<EntityRecord>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ?1"),
                rusqlite::params![entity_id.as_bytes().as_slice()],
                read_raw_entity,
            )
            .optional()?;
        raw.map(entity_from_raw).transpose()
    }

    fn delete_entity(&mut self, entity_id: EntityId) -> Result<Vec<EntityId>, StorageError> {
        self.require_writable()?;
        let removed = self.atomically(|store| {
            let ids = store.subtree_ids(entity_id)?;
            if ids.is_empty() {
                return Err(StorageError::NotFound(format!("entity {entity_id}")));
            }
            for id in &ids {
                let blob = id.as_bytes().as_slice();
                store.conn.execute(
                    "DELETE FROM fields WHERE entity_id = ?1",
                    rusqlite::params![blob],
                )?;
                store.conn.execute(
                    "DELETE FROM refs WHERE source_id = ?1 OR target_id = ?1",
                    rusqlite::params![blob],
                )?;
                store.conn.execute(
                    "DELETE FROM entities WHERE entity_id = ?1",
                    rusqlite::params![blob],
                )?;
            }
            Ok(ids)
        })?;
        debug!("deleted {} with {} owned descendants", entity_id, removed.len() - 1);
        Ok(removed)
    }

    fn live_entities(&self) -> Result<Vec<EntityRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ENTITY_COLUMNS} FROM entities ORDER BY rowid"))?;
        let rows = stmt.query_map([], read_raw_entity)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(entity_from_raw(row?)?);
        }
        Ok(result)
    }

    fn get_value(
        &self,
        entity_id: EntityId,
        field: &str,
    ) -> Result<Option<FieldData>, StorageError> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT value FROM fields WHERE entity_id = ?1 AND field_key = ?2",
                rusqlite::params![entity_id.as_bytes().as_slice(), field],
                |row| row.get(0),
            )
            .optional()?;
        match bytes {
            Some(bytes) => Ok(Some(FieldData::from_msgpack(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_value(
        &mut self,
        entity_id: EntityId,
        field: &str,
        value: &FieldData,
    ) -> Result<(), StorageError> {
        self.require_writable()?;
        let value_bytes = value.to_msgpack()?;
        self.conn.execute(
            "INSERT INTO fields (entity_id, field_key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(entity_id, field_key) DO UPDATE SET value = excluded.value",
            rusqlite::params![entity_id.as_bytes().as_slice(), field, value_bytes],
        )?;
        Ok(())
    }

    fn clear_value(&mut self, entity_id: EntityId, field: &str) -> Result<(), StorageError> {
        self.require_writable()?;
        self.conn.execute(
            "DELETE FROM fields WHERE entity_id = ?1 AND field_key = ?2",
            rusqlite::params![entity_id.as_bytes().as_slice(), field],
        )?;
        Ok(())
    }

    fn owned_children(&self, owner: EntityId, field: &str) -> Result<Vec<EntityId>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id FROM entities WHERE owner_id = ?1 AND owner_field = ?2 ORDER BY ord, rowid",
        )?;
        let rows = stmt.query_map(rusqlite::params![owner.as_bytes().as_slice(), field], |row| {
            row.get::<_, Vec<u8>>(0)
        })?;
        let mut children = Vec::new();
        for row in rows {
            children.push(to_entity_id(row?, "entity_id")?);
        }
        Ok(children)
    }

    fn get_references(
        &self,
        source: EntityId,
        field: &str,
    ) -> Result<Vec<EntityId>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT target_id FROM refs WHERE source_id = ?1 AND field_key = ?2 ORDER BY ord",
        )?;
        let rows = stmt.query_map(rusqlite::params![source.as_bytes().as_slice(), field], |row| {
            row.get::<_, Vec<u8>>(0)
        })?;
        let mut targets = Vec::new();
        for row in rows {
            targets.push(to_entity_id(row?, "target_id")?);
        }
        Ok(targets)
    }

    fn set_references(
        &mut self,
        source: EntityId,
        field: &str,
        targets: &[EntityId],
    ) -> Result<(), StorageError> {
        self.require_writable()?;
        self.atomically(|store| {
            store.conn.execute(
                "DELETE FROM refs WHERE source_id = ?1 AND field_key = ?2",
                rusqlite::params![source.as_bytes().as_slice(), field],
            )?;
            for (ord, target) in targets.iter().enumerate() {
                store.conn.execute(
                    "INSERT INTO refs (source_id, field_key, ord, target_id) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        source.as_bytes().as_slice(),
                        field,
                        ord as i64,
                        target.as_bytes().as_slice(),
                    ],
                )?;
            }
            Ok(())
        })
    }

    fn referrers(&self, target: EntityId) -> Result<Vec<ReferenceEdge>, StorageError> {
        self.read_edges(
            "SELECT source_id, field_key, target_id, ord FROM refs WHERE target_id = ?1 ORDER BY rowid",
            rusqlite::params![target.as_bytes().as_slice()],
        )
    }

    fn retarget_references(
        &mut self,
        from: EntityId,
        to: EntityId,
    ) -> Result<Vec<ReferenceEdge>, StorageError> {
        self.require_writable()?;
        self.atomically(|store| {
            let mut edges = store.referrers(from)?;
            store.conn.execute(
                "UPDATE refs SET target_id = ?2 WHERE target_id = ?1",
                rusqlite::params![from.as_bytes().as_slice(), to.as_bytes().as_slice()],
            )?;
            for edge in &mut edges {
                edge.target = to;
            }
            Ok(edges)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexmodel_core::{FieldValue, MultiString, RichText};

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn positional_insert_shifts_later_members() {
        let mut store = store();
        let list = store.create_instance(ConcreteType::CmPossibilityList, None).unwrap();
        let a = store
            .create_instance(
                ConcreteType::CmCustomItem,
                Some(OwnerSlot::append(list, "possibilities")),
            )
            .unwrap();
        let c = store
            .create_instance(
                ConcreteType::CmCustomItem,
                Some(OwnerSlot::append(list, "possibilities")),
            )
            .unwrap();
        let b = store
            .create_instance(
                ConcreteType::CmCustomItem,
                Some(OwnerSlot::at(list, "possibilities", 1)),
            )
            .unwrap();

        assert_eq!(store.owned_children(list, "possibilities").unwrap(), vec![a, b, c]);
        let owner = store.get_entity(b).unwrap().unwrap().owner.unwrap();
        assert_eq!(owner.owner, list);
        assert_eq!(owner.field, "possibilities");
    }

    #[test]
    fn delete_cascades_over_ownership_and_drops_edges() {
        let mut store = store();
        let entry = store.create_instance(ConcreteType::LexEntry, None).unwrap();
        let sense = store
            .create_instance(ConcreteType::LexSense, Some(OwnerSlot::append(entry, "senses")))
            .unwrap();
        let domain = store.create_instance(ConcreteType::CmSemanticDomain, None).unwrap();
        let bundle = store.create_instance(ConcreteType::WfiMorphBundle, None).unwrap();
        store.set_references(sense, "semantic_domains", &[domain]).unwrap();
        store.set_references(bundle, "sense", &[sense]).unwrap();

        let removed = store.delete_entity(entry).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(store.get_entity(sense).unwrap().is_none());
        // Referenced entity survives, the edge into the removed sense does not.
        assert!(store.get_entity(domain).unwrap().is_some());
        assert!(store.get_references(bundle, "sense").unwrap().is_empty());
        assert!(store.referrers(domain).unwrap().is_empty());
    }

    #[test]
    fn typed_getters_reject_other_kinds() {
        let mut store = store();
        let para = store.create_instance(ConcreteType::StTxtPara, None).unwrap();
        store
            .set_rich(para, "contents", &RichText::new("In the beginning", "en"))
            .unwrap();

        assert!(store.get_rich(para, "contents").unwrap().is_some());
        let err = store.get_localized(para, "contents").unwrap_err();
        assert!(matches!(err, StorageError::KindMismatch { .. }));
    }

    #[test]
    fn rollback_discards_unit_of_work() {
        let mut store = store();
        let entry = store.create_instance(ConcreteType::LexEntry, None).unwrap();

        store.begin_unit_of_work().unwrap();
        store
            .set_localized(entry, "citation_form", &MultiString::new().with("en", "run"))
            .unwrap();
        store.create_instance(ConcreteType::LexEntry, None).unwrap();
        store.rollback_unit_of_work().unwrap();

        assert_eq!(store.entity_count().unwrap(), 1);
        assert!(store.get_localized(entry, "citation_form").unwrap().is_none());
        assert!(matches!(
            store.commit_unit_of_work(),
            Err(StorageError::NoUnitOfWork)
        ));
    }

    #[test]
    fn failed_commit_ends_the_unit_of_work() {
        let mut store = store();
        store
            .conn
            .execute_batch(
                "PRAGMA foreign_keys = ON;
                 CREATE TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TABLE child (
                     parent_id INTEGER REFERENCES parent (id) DEFERRABLE INITIALLY DEFERRED
                 );",
            )
            .unwrap();

        store.begin_unit_of_work().unwrap();
        store.create_instance(ConcreteType::LexEntry, None).unwrap();
        store
            .conn
            .execute("INSERT INTO child (parent_id) VALUES (42)", [])
            .unwrap();
        assert!(matches!(store.commit_unit_of_work(), Err(StorageError::Sqlite(_))));

        assert!(!store.in_unit_of_work());
        assert_eq!(store.entity_count().unwrap(), 0);
        store.begin_unit_of_work().unwrap();
        store.create_instance(ConcreteType::LexEntry, None).unwrap();
        store.commit_unit_of_work().unwrap();
        assert_eq!(store.entity_count().unwrap(), 1);
    }

    #[test]
    fn missing_factory_is_reported() {
        let mut store = store().with_factories([ConcreteType::LexEntry]);
        assert!(matches!(
            store.create_instance(ConcreteType::LexSense, None),
            Err(StorageError::NoFactory(ConcreteType::LexSense))
        ));
    }

    #[test]
    fn read_only_file_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.db");
        let path = path.to_str().unwrap();
        let entry = {
            let mut store = SqliteStore::open(path).unwrap();
            let entry = store.create_instance(ConcreteType::LexEntry, None).unwrap();
            store
                .set_scalar(entry, "homograph_number", FieldValue::Integer(2))
                .unwrap();
            entry
        };

        let mut store = SqliteStore::open_read_only(path).unwrap();
        assert!(!store.is_writable());
        assert_eq!(
            store.get_scalar(entry, "homograph_number").unwrap(),
            Some(FieldValue::Integer(2))
        );
        assert!(matches!(
            store.create_instance(ConcreteType::LexEntry, None),
            Err(StorageError::ReadOnly)
        ));
        assert!(matches!(store.begin_unit_of_work(), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn retarget_rewrites_every_incoming_edge() {
        let mut store = store();
        let old = store.create_instance(ConcreteType::PartOfSpeech, None).unwrap();
        let new = store.create_instance(ConcreteType::PartOfSpeech, None).unwrap();
        let sense = store.create_instance(ConcreteType::LexSense, None).unwrap();
        let analysis = store.create_instance(ConcreteType::WfiAnalysis, None).unwrap();
        store.set_references(sense, "part_of_speech", &[old]).unwrap();
        store.set_references(analysis, "category", &[old]).unwrap();

        let edges = store.retarget_references(old, new).unwrap();

        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.target == new));
        assert_eq!(store.get_references(sense, "part_of_speech").unwrap(), vec![new]);
        assert_eq!(store.get_references(analysis, "category").unwrap(), vec![new]);
        assert!(store.referrers(old).unwrap().is_empty());
    }
}
