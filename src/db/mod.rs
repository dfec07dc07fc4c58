//! Database module
//!
//! Visitor rows are written once and never updated. The read side serves four
//! fixed projections: the `visitor_stats`, `visitor_countries` and
//! `visitor_daily` views, plus a scan of the newest raw rows.

mod schema;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Pool, Sqlite};
use strum_macros::EnumString;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::geoip::GeoLocation;
use crate::request::ClientRequest;
use crate::user_agent::{Browser, ClientInfo, DeviceType, Os};

pub const RECENT_LIMIT: i64 = 20;
pub const COUNTRY_LIMIT: i64 = 10;
pub const DAILY_LIMIT: i64 = 30;

const MEMORY_URL: &str = ":memory:";

const VISITOR_COLUMNS: &str = "id, session_id, ip_address, country, country_code, city, region, \
     latitude, longitude, timezone, user_agent, referrer, page_visited, device_type, browser, os, \
     visited_at";

/// One tracked page view, as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorRecord {
    pub id: i64,
    pub session_id: Option<String>,
    pub ip_address: String,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub page_visited: Option<String>,
    pub device_type: DeviceType,
    pub browser: Browser,
    pub os: Os,
    pub visited_at: DateTime<Utc>,
}

/// A page view ready to be inserted
#[derive(Debug, Clone)]
pub struct NewVisitor {
    pub session_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub page_visited: Option<String>,
    pub client: ClientInfo,
    pub geo: Option<GeoLocation>,
    pub visited_at: DateTime<Utc>,
}

impl NewVisitor {
    pub fn new(request: ClientRequest, client: ClientInfo) -> Self {
        Self {
            session_id: request.session_id,
            ip_address: request.ip,
            user_agent: request.user_agent,
            referrer: request.referrer,
            page_visited: request.page,
            client,
            geo: None,
            visited_at: Utc::now(),
        }
    }

    pub fn with_geo(mut self, geo: Option<GeoLocation>) -> Self {
        self.geo = geo;
        self
    }
}

#[derive(FromRow)]
struct VisitorRow {
    id: i64,
    session_id: Option<String>,
    ip_address: String,
    country: Option<String>,
    country_code: Option<String>,
    city: Option<String>,
    region: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
    user_agent: String,
    referrer: Option<String>,
    page_visited: Option<String>,
    device_type: String,
    browser: String,
    os: String,
    visited_at: i64,
}

impl From<VisitorRow> for VisitorRecord {
    fn from(row: VisitorRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            ip_address: row.ip_address,
            country: row.country,
            country_code: row.country_code,
            city: row.city,
            region: row.region,
            latitude: row.latitude,
            longitude: row.longitude,
            timezone: row.timezone,
            user_agent: row.user_agent,
            referrer: row.referrer,
            page_visited: row.page_visited,
            device_type: row.device_type.parse().unwrap_or(DeviceType::Desktop),
            browser: row.browser.parse().unwrap_or(Browser::Unknown),
            os: row.os.parse().unwrap_or(Os::Unknown),
            visited_at: visited_at_from_millis(row.id, row.visited_at),
        }
    }
}

/// Stored timestamps are Unix milliseconds. An out-of-range value is reported
/// and replaced by the epoch so the row still renders.
fn visited_at_from_millis(id: i64, millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(|| {
        warn!("Visitor {} has invalid visited_at {}", id, millis);
        DateTime::UNIX_EPOCH
    })
}

/// Accepts a bare file path or a full `sqlite:` URL
fn connect_url(url: &str) -> String {
    if url.starts_with("sqlite:") {
        url.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", url)
    }
}

/// Selector for the read endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AnalyticsView {
    Stats,
    Countries,
    Daily,
    Recent,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VisitorStats {
    pub total_visits: i64,
    pub unique_sessions: i64,
    pub unique_countries: i64,
    pub mobile_visits: i64,
    pub tablet_visits: i64,
    pub desktop_visits: i64,
    pub visits_today: i64,
    pub visits_last_7_days: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CountryStat {
    pub country: Option<String>,
    pub country_code: String,
    pub visits: i64,
    pub unique_sessions: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyStat {
    pub day: String,
    pub visits: i64,
    pub unique_sessions: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = if config.url == MEMORY_URL {
            // Every connection to :memory: opens its own database, so pin a
            // single connection for the lifetime of the pool.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&connect_url(&config.url))
                .await?
        };
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        for statement in [
            schema::CREATE_TABLE,
            schema::CREATE_INDEX_VISITED_AT,
            schema::CREATE_INDEX_COUNTRY,
            schema::CREATE_INDEX_SESSION,
            schema::CREATE_VIEW_STATS,
            schema::CREATE_VIEW_COUNTRIES,
            schema::CREATE_VIEW_DAILY,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert one page view and return the stored row
    pub async fn insert_visitor(&self, visit: &NewVisitor) -> Result<VisitorRecord> {
        let geo = visit.geo.as_ref();

        let row: VisitorRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO visitors (session_id, ip_address, country, country_code, city, region, latitude, longitude, timezone, user_agent, referrer, page_visited, device_type, browser, os, visited_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {VISITOR_COLUMNS}
            "#
        ))
        .bind(&visit.session_id)
        .bind(&visit.ip_address)
        .bind(geo.map(|g| g.country.as_str()))
        .bind(geo.map(|g| g.country_code.as_str()))
        .bind(geo.map(|g| g.city.as_str()))
        .bind(geo.map(|g| g.region.as_str()))
        .bind(geo.map(|g| g.latitude))
        .bind(geo.map(|g| g.longitude))
        .bind(geo.map(|g| g.timezone.as_str()))
        .bind(&visit.user_agent)
        .bind(&visit.referrer)
        .bind(&visit.page_visited)
        .bind(visit.client.device_type.as_ref())
        .bind(visit.client.browser.as_ref())
        .bind(visit.client.os.as_ref())
        .bind(visit.visited_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    pub async fn get_stats(&self) -> Result<VisitorStats> {
        let stats = sqlx::query_as("SELECT * FROM visitor_stats")
            .fetch_one(&self.pool)
            .await?;
        Ok(stats)
    }

    pub async fn get_country_stats(&self) -> Result<Vec<CountryStat>> {
        let rows = sqlx::query_as(
            r#"
            SELECT country, country_code, visits, unique_sessions
            FROM visitor_countries
            ORDER BY visits DESC, country_code ASC
            LIMIT ?
            "#,
        )
        .bind(COUNTRY_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_daily_stats(&self) -> Result<Vec<DailyStat>> {
        let rows = sqlx::query_as(
            r#"
            SELECT day, visits, unique_sessions
            FROM visitor_daily
            ORDER BY day DESC
            LIMIT ?
            "#,
        )
        .bind(DAILY_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_recent_visitors(&self) -> Result<Vec<VisitorRecord>> {
        let rows: Vec<VisitorRow> = sqlx::query_as(&format!(
            "SELECT {VISITOR_COLUMNS} FROM visitors ORDER BY visited_at DESC, id DESC LIMIT ?"
        ))
        .bind(RECENT_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(VisitorRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_url_accepts_paths_and_urls() {
        assert_eq!(connect_url("visitors.db"), "sqlite:visitors.db?mode=rwc");
        assert_eq!(
            connect_url("sqlite:///var/lib/analytics/visitors.db"),
            "sqlite:///var/lib/analytics/visitors.db"
        );
        assert_eq!(connect_url("sqlite:data.db?mode=ro"), "sqlite:data.db?mode=ro");
    }

    #[test]
    fn invalid_timestamp_falls_back_to_epoch() {
        assert_eq!(visited_at_from_millis(1, i64::MAX), DateTime::UNIX_EPOCH);

        let millis = 1_760_000_000_123;
        assert_eq!(visited_at_from_millis(1, millis).timestamp_millis(), millis);
    }
}
