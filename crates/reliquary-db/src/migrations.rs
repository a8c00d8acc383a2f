use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE characters (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                image_url   TEXT,
                has_pin     INTEGER NOT NULL DEFAULT 0,
                pin_hash    TEXT,
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE gifts (
                id                   TEXT PRIMARY KEY,
                name                 TEXT NOT NULL,
                description          TEXT NOT NULL,
                uses_per_short_rest  INTEGER NOT NULL,
                uses_per_long_rest   INTEGER NOT NULL,
                created_at           TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE items (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                description TEXT NOT NULL,
                image_url   TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE character_gifts (
                id            TEXT PRIMARY KEY,
                character_id  TEXT NOT NULL REFERENCES characters(id),
                gift_id       TEXT NOT NULL REFERENCES gifts(id),
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_character_gifts_character
                ON character_gifts(character_id);

            CREATE TABLE character_items (
                id            TEXT PRIMARY KEY,
                character_id  TEXT NOT NULL REFERENCES characters(id),
                item_id       TEXT NOT NULL REFERENCES items(id),
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_character_items_character
                ON character_items(character_id);

            -- The selectable roster; '???' is the game master
            INSERT INTO characters (id, name, image_url, sort_order) VALUES
                ('00000000-0000-0000-0000-000000000001', 'Thebryan', '/characters/thebryan.png', 1),
                ('00000000-0000-0000-0000-000000000002', 'Thytus',   '/characters/thytus.png',   2),
                ('00000000-0000-0000-0000-000000000003', 'Toji',     '/characters/toji.png',     3),
                ('00000000-0000-0000-0000-000000000004', 'Talik',    '/characters/talik.png',    4),
                ('00000000-0000-0000-0000-000000000005', 'Danstão',  '/characters/danstao.png',  5),
                ('00000000-0000-0000-0000-000000000006', '???',      '/characters/unknown.png',  6);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
