use crate::models::{CharacterRow, GiftRow, ItemRow, LinkRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};

const CHARACTER_COLUMNS: &str = "id, name, image_url, has_pin, pin_hash";

impl Database {
    // -- Characters --

    pub fn list_characters(&self) -> Result<Vec<CharacterRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHARACTER_COLUMNS} FROM characters ORDER BY sort_order, name"
            ))?;
            let rows = stmt
                .query_map([], character_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_character(&self, id: &str) -> Result<Option<CharacterRow>> {
        self.with_conn(|conn| query_character(conn, "id", id))
    }

    pub fn get_character_by_name(&self, name: &str) -> Result<Option<CharacterRow>> {
        self.with_conn(|conn| query_character(conn, "name", name))
    }

    /// Store a PIN hash and flag the character as having a PIN.
    /// Returns false if no such character exists.
    pub fn set_pin_hash(&self, id: &str, pin_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE characters SET pin_hash = ?1, has_pin = 1 WHERE id = ?2",
                (pin_hash, id),
            )?;
            Ok(changed > 0)
        })
    }

    // -- Gifts --

    pub fn get_gift(&self, id: &str) -> Result<Option<GiftRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, uses_per_short_rest, uses_per_long_rest
                 FROM gifts WHERE id = ?1",
                [id],
                |row| gift_from_row(row, 0),
            )
            .optional()
        })
    }

    /// Gifts linked to a character, in link order.
    pub fn gift_roster(&self, character_id: &str) -> Result<Vec<LinkRow<GiftRow>>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cg.id, g.id, g.name, g.description, g.uses_per_short_rest, g.uses_per_long_rest
                 FROM character_gifts cg
                 JOIN gifts g ON cg.gift_id = g.id
                 WHERE cg.character_id = ?1
                 ORDER BY cg.created_at, cg.rowid",
            )?;
            let rows = stmt
                .query_map([character_id], |row| {
                    Ok(LinkRow {
                        id: row.get(0)?,
                        target: gift_from_row(row, 1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert a gift and link it to a character in one transaction.
    /// Returns false (and writes nothing) if the character does not exist.
    pub fn create_gift_and_link(
        &self,
        link_id: &str,
        character_id: &str,
        gift: &GiftRow,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !character_exists(&tx, character_id)? {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO gifts (id, name, description, uses_per_short_rest, uses_per_long_rest)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    gift.id,
                    gift.name,
                    gift.description,
                    gift.uses_per_short_rest,
                    gift.uses_per_long_rest
                ],
            )?;
            tx.execute(
                "INSERT INTO character_gifts (id, character_id, gift_id) VALUES (?1, ?2, ?3)",
                (link_id, character_id, &gift.id),
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    // -- Items --

    pub fn get_item(&self, id: &str) -> Result<Option<ItemRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, image_url FROM items WHERE id = ?1",
                [id],
                |row| item_from_row(row, 0),
            )
            .optional()
        })
    }

    /// Items linked to a character, in link order.
    pub fn item_roster(&self, character_id: &str) -> Result<Vec<LinkRow<ItemRow>>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ci.id, i.id, i.name, i.description, i.image_url
                 FROM character_items ci
                 JOIN items i ON ci.item_id = i.id
                 WHERE ci.character_id = ?1
                 ORDER BY ci.created_at, ci.rowid",
            )?;
            let rows = stmt
                .query_map([character_id], |row| {
                    Ok(LinkRow {
                        id: row.get(0)?,
                        target: item_from_row(row, 1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert an item and link it to a character in one transaction.
    /// Returns false (and writes nothing) if the character does not exist.
    pub fn create_item_and_link(
        &self,
        link_id: &str,
        character_id: &str,
        item: &ItemRow,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !character_exists(&tx, character_id)? {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO items (id, name, description, image_url) VALUES (?1, ?2, ?3, ?4)",
                (&item.id, &item.name, &item.description, &item.image_url),
            )?;
            tx.execute(
                "INSERT INTO character_items (id, character_id, item_id) VALUES (?1, ?2, ?3)",
                (link_id, character_id, &item.id),
            )?;

            tx.commit()?;
            Ok(true)
        })
    }
}

fn query_character(conn: &Connection, column: &str, value: &str) -> Result<Option<CharacterRow>> {
    conn.query_row(
        &format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE {column} = ?1"),
        [value],
        character_from_row,
    )
    .optional()
}

fn character_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM characters WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn character_from_row(row: &Row<'_>) -> rusqlite::Result<CharacterRow> {
    Ok(CharacterRow {
        id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
        has_pin: row.get(3)?,
        pin_hash: row.get(4)?,
    })
}

/// Reads the five gift columns starting at `offset`.
fn gift_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<GiftRow> {
    Ok(GiftRow {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        uses_per_short_rest: row.get(offset + 3)?,
        uses_per_long_rest: row.get(offset + 4)?,
    })
}

fn item_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        image_url: row.get(offset + 3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEBRYAN: &str = "00000000-0000-0000-0000-000000000001";
    const MISSING: &str = "99999999-0000-0000-0000-000000000000";

    fn gift(id: &str, name: &str) -> GiftRow {
        GiftRow {
            id: id.to_string(),
            name: name.to_string(),
            description: "<p>Burns bright</p>".to_string(),
            uses_per_short_rest: 1,
            uses_per_long_rest: 3,
        }
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn seeds_the_character_roster() {
        let db = Database::open_in_memory().unwrap();
        let names: Vec<String> = db
            .list_characters()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Thebryan", "Thytus", "Toji", "Talik", "Danstão", "???"]);

        let gm = db.get_character_by_name("???").unwrap().unwrap();
        assert!(!gm.has_pin);
        assert!(gm.pin_hash.is_none());
    }

    #[test]
    fn set_pin_hash_flags_character() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.set_pin_hash(THEBRYAN, "$argon2id$fake").unwrap());

        let row = db.get_character(THEBRYAN).unwrap().unwrap();
        assert!(row.has_pin);
        assert_eq!(row.pin_hash.as_deref(), Some("$argon2id$fake"));

        assert!(!db.set_pin_hash(MISSING, "$argon2id$fake").unwrap());
    }

    #[test]
    fn create_gift_and_link_appears_in_roster() {
        let db = Database::open_in_memory().unwrap();
        let gift_id = "10000000-0000-0000-0000-000000000001";
        let link_id = "20000000-0000-0000-0000-000000000001";
        assert!(db.create_gift_and_link(link_id, THEBRYAN, &gift(gift_id, "Ember")).unwrap());

        let roster = db.gift_roster(THEBRYAN).unwrap();
        assert_eq!(roster.len(), 1);
        let entry = roster.into_iter().next().unwrap().into_model().unwrap();
        assert_eq!(entry.id.to_string(), link_id);
        assert_eq!(entry.gift.name, "Ember");
        assert_eq!(entry.gift.uses_per_short_rest, 1);
        assert_eq!(entry.gift.uses_per_long_rest, 3);

        assert!(db.gift_roster("00000000-0000-0000-0000-000000000002").unwrap().is_empty());
    }

    #[test]
    fn missing_character_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let created = db
            .create_gift_and_link(
                "20000000-0000-0000-0000-000000000001",
                MISSING,
                &gift("10000000-0000-0000-0000-000000000001", "Ember"),
            )
            .unwrap();
        assert!(!created);
        assert_eq!(count(&db, "gifts"), 0);
        assert_eq!(count(&db, "character_gifts"), 0);
    }

    #[test]
    fn failed_link_rolls_back_parent() {
        let db = Database::open_in_memory().unwrap();
        let link_id = "20000000-0000-0000-0000-000000000001";
        db.create_gift_and_link(link_id, THEBRYAN, &gift("10000000-0000-0000-0000-000000000001", "Ember"))
            .unwrap();

        // Reusing the join id makes the second insert fail after the parent insert.
        let result = db.create_gift_and_link(
            link_id,
            THEBRYAN,
            &gift("10000000-0000-0000-0000-000000000002", "Aether"),
        );
        assert!(result.is_err());
        assert_eq!(count(&db, "gifts"), 1);
        assert!(db.get_gift("10000000-0000-0000-0000-000000000002").unwrap().is_none());
    }

    #[test]
    fn create_item_and_link_appears_in_roster() {
        let db = Database::open_in_memory().unwrap();
        let item = ItemRow {
            id: "30000000-0000-0000-0000-000000000001".to_string(),
            name: "Lantern of Hours".to_string(),
            description: "<p>Never goes out</p>".to_string(),
            image_url: "https://example.org/lantern.png".to_string(),
        };
        assert!(db
            .create_item_and_link("40000000-0000-0000-0000-000000000001", THEBRYAN, &item)
            .unwrap());

        let roster = db.item_roster(THEBRYAN).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].target.name, "Lantern of Hours");

        let fetched = db.get_item(&item.id).unwrap().unwrap();
        assert_eq!(fetched.image_url, item.image_url);
    }
}
