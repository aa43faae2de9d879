use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{fs, path::Path, str::FromStr};
use uuid::Uuid;

use shared::domain::{Member, MemberId, MembershipStatus};

/// Whole-roster persistence: the roster is always read and written as one ordered set.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn load_members(&self) -> Result<Vec<Member>>;
    async fn replace_members(&self, members: &[Member]) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        if let Some(dir) = database_file(database_url).and_then(Path::parent) {
            fs::create_dir_all(dir).with_context(|| {
                format!("failed to create database directory '{}'", dir.display())
            })?;
        }

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url '{database_url}'"))?
            .create_if_missing(true);
        // every connection to an in-memory url opens its own private database
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn load_members(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query(
            "SELECT id, first_name, last_name, email, phone, status, joined_at
             FROM members
             ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load members")?;

        rows.iter().map(member_from_row).collect()
    }

    /// Overwrites the stored roster with `members`, keeping their order.
    pub async fn replace_members(&self, members: &[Member]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM members")
            .execute(&mut *tx)
            .await
            .context("failed to clear members")?;

        for (position, member) in members.iter().enumerate() {
            sqlx::query(
                "INSERT INTO members (id, position, first_name, last_name, email, phone, status, joined_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(member.id.to_string())
            .bind(position as i64)
            .bind(&member.first_name)
            .bind(&member.last_name)
            .bind(&member.email)
            .bind(&member.phone)
            .bind(member.status.as_str())
            .bind(member.joined_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to store member {}", member.id))?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn member_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

fn member_from_row(row: &SqliteRow) -> Result<Member> {
    let raw_id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&raw_id)
        .map(MemberId)
        .with_context(|| format!("corrupt member id '{raw_id}'"))?;
    let status: String = row.try_get("status")?;

    Ok(Member {
        id,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        status: MembershipStatus::from_str(&status)?,
        joined_at: row.try_get::<DateTime<Utc>, _>("joined_at")?,
    })
}

/// On-disk file behind a sqlite url, without any `?query`; `None` for in-memory urls.
pub fn database_file(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let file = rest.split_once('?').map_or(rest, |(file, _)| file);
    (!file.is_empty() && file != ":memory:").then(|| Path::new(file))
}

#[async_trait]
impl MemberRepository for Storage {
    async fn load_members(&self) -> Result<Vec<Member>> {
        Storage::load_members(self).await
    }

    async fn replace_members(&self, members: &[Member]) -> Result<()> {
        Storage::replace_members(self, members).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
