//! Database schema definitions

pub const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS visitors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    ip_address TEXT NOT NULL,
    country TEXT,
    country_code TEXT,
    city TEXT,
    region TEXT,
    latitude REAL,
    longitude REAL,
    timezone TEXT,
    user_agent TEXT NOT NULL,
    referrer TEXT,
    page_visited TEXT,
    device_type TEXT NOT NULL,
    browser TEXT NOT NULL,
    os TEXT NOT NULL,
    visited_at BIGINT NOT NULL      -- Unix milliseconds, UTC
)
"#;

pub const CREATE_INDEX_VISITED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_visitors_visited_at ON visitors(visited_at DESC)";

pub const CREATE_INDEX_COUNTRY: &str =
    "CREATE INDEX IF NOT EXISTS idx_visitors_country ON visitors(country_code, country)";

pub const CREATE_INDEX_SESSION: &str =
    "CREATE INDEX IF NOT EXISTS idx_visitors_session ON visitors(session_id)";

// === AGGREGATE VIEWS ===

// Single-row overview
pub const CREATE_VIEW_STATS: &str = r#"
CREATE VIEW IF NOT EXISTS visitor_stats AS
SELECT
    COUNT(*) AS total_visits,
    COUNT(DISTINCT session_id) AS unique_sessions,
    COUNT(DISTINCT country_code) AS unique_countries,
    COALESCE(SUM(CASE WHEN device_type = 'mobile' THEN 1 ELSE 0 END), 0) AS mobile_visits,
    COALESCE(SUM(CASE WHEN device_type = 'tablet' THEN 1 ELSE 0 END), 0) AS tablet_visits,
    COALESCE(SUM(CASE WHEN device_type = 'desktop' THEN 1 ELSE 0 END), 0) AS desktop_visits,
    COALESCE(SUM(CASE WHEN visited_at >= CAST(strftime('%s', 'now', 'start of day') AS INTEGER) * 1000
        THEN 1 ELSE 0 END), 0) AS visits_today,
    COALESCE(SUM(CASE WHEN visited_at >= CAST(strftime('%s', 'now', '-7 days') AS INTEGER) * 1000
        THEN 1 ELSE 0 END), 0) AS visits_last_7_days
FROM visitors
"#;

// Visits per country (only rows that were geolocated)
pub const CREATE_VIEW_COUNTRIES: &str = r#"
CREATE VIEW IF NOT EXISTS visitor_countries AS
SELECT
    country,
    country_code,
    COUNT(*) AS visits,
    COUNT(DISTINCT session_id) AS unique_sessions
FROM visitors
WHERE country_code IS NOT NULL
GROUP BY country_code, country
"#;

// Visits per UTC calendar day
pub const CREATE_VIEW_DAILY: &str = r#"
CREATE VIEW IF NOT EXISTS visitor_daily AS
SELECT
    date(visited_at / 1000, 'unixepoch') AS day,
    COUNT(*) AS visits,
    COUNT(DISTINCT session_id) AS unique_sessions
FROM visitors
GROUP BY date(visited_at / 1000, 'unixepoch')
"#;
