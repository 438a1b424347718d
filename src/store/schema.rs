//! SQLite schema definition

/// SQL schema for the index database
pub const SCHEMA_SQL: &str = r#"
-- Sites: one row per configured site, recreated on every full run
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    status_time TEXT NOT NULL,
    last_error TEXT
);

-- Pages: fetched documents, code 102 while the fetch is in flight
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    code INTEGER NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    UNIQUE(site_id, path)
);

-- Lemmas: normal forms per site, frequency = number of pages containing it
CREATE TABLE IF NOT EXISTS lemmas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    lemma TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    UNIQUE(site_id, lemma)
);

-- Inverted index: weighted occurrences of a lemma on a page
CREATE TABLE IF NOT EXISTS indexes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    lemma_id INTEGER NOT NULL REFERENCES lemmas(id) ON DELETE CASCADE,
    rank REAL NOT NULL,
    UNIQUE(page_id, lemma_id)
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id);
CREATE INDEX IF NOT EXISTS idx_lemmas_site ON lemmas(site_id);
CREATE INDEX IF NOT EXISTS idx_indexes_page ON indexes(page_id);
CREATE INDEX IF NOT EXISTS idx_indexes_lemma ON indexes(lemma_id);
"#;
