use crate::db::models::{LinkedUser, UserRecord};
use crate::db::schema::SQLITE_INIT;
use crate::error::LinkerError;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use std::str::FromStr;
use tracing::{debug, warn};

pub type SqlitePool = Pool<Sqlite>;

const USER_COLUMNS: &str = "id, github_username, linkedin_id, github_token, linkedin_token, \
                            github_profileurl, created_at";

#[derive(Clone)]
pub struct UsersStorage {
    pool: SqlitePool,
}

impl UsersStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, LinkerError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), LinkerError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn find_by_github_username(
        &self,
        github_username: &str,
    ) -> Result<Option<UserRecord>, LinkerError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE github_username = ?"
        ))
        .bind(github_username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    pub async fn find_by_linkedin_id(
        &self,
        linkedin_id: &str,
    ) -> Result<Option<UserRecord>, LinkerError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE linkedin_id = ?"
        ))
        .bind(linkedin_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    /// Overwrite the GitHub token and avatar of an existing row and return the
    /// post-update row image.
    pub async fn refresh_github_credentials(
        &self,
        github_username: &str,
        github_token: &str,
        github_profileurl: &str,
    ) -> Result<UserRecord, LinkerError> {
        let username = github_username.to_owned();
        let token = github_token.to_owned();
        let profile_url = github_profileurl.to_owned();

        self.update_then_reselect(move |conn| {
            Box::pin(async move {
                sqlx::query(
                    "UPDATE users SET github_token = ?, github_profileurl = ? WHERE github_username = ?",
                )
                .bind(token)
                .bind(profile_url)
                .bind(&username)
                .execute(&mut *conn)
                .await?;

                let row = sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE github_username = ?"
                ))
                .bind(&username)
                .fetch_one(&mut *conn)
                .await?;
                Self::row_to_model(row)
            })
        })
        .await
    }

    /// Overwrite the LinkedIn token of an existing row and return the
    /// post-update row image.
    pub async fn refresh_linkedin_token(
        &self,
        linkedin_id: &str,
        linkedin_token: &str,
    ) -> Result<UserRecord, LinkerError> {
        let linkedin_id = linkedin_id.to_owned();
        let token = linkedin_token.to_owned();

        self.update_then_reselect(move |conn| {
            Box::pin(async move {
                sqlx::query("UPDATE users SET linkedin_token = ? WHERE linkedin_id = ?")
                    .bind(token)
                    .bind(&linkedin_id)
                    .execute(&mut *conn)
                    .await?;

                let row = sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE linkedin_id = ?"
                ))
                .bind(&linkedin_id)
                .fetch_one(&mut *conn)
                .await?;
                Self::row_to_model(row)
            })
        })
        .await
    }

    /// Insert a fully linked row. A conflict on either unique identity turns
    /// the insert into an update of the tokens and avatar (and fills in a
    /// missing identity), so concurrent completions converge on one row.
    pub async fn upsert_linked(&self, user: LinkedUser) -> Result<UserRecord, LinkerError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (
                github_username, linkedin_id, github_token, linkedin_token,
                github_profileurl, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT DO UPDATE SET
                github_username = COALESCE(users.github_username, excluded.github_username),
                linkedin_id = COALESCE(users.linkedin_id, excluded.linkedin_id),
                github_token = excluded.github_token,
                linkedin_token = excluded.linkedin_token,
                github_profileurl = excluded.github_profileurl
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.github_username)
        .bind(user.linkedin_id)
        .bind(user.github_token)
        .bind(user.linkedin_token)
        .bind(user.github_profileurl)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_model(row)
    }

    /// Run `op` inside a transaction on a dedicated pooled connection.
    ///
    /// Commits when `op` succeeds, rolls back otherwise. The connection goes
    /// back to the pool on every path.
    async fn update_then_reselect<F>(&self, op: F) -> Result<UserRecord, LinkerError>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<UserRecord, LinkerError>>,
    {
        let mut conn = self.pool.acquire().await?;
        let mut tx = sqlx::Connection::begin(&mut *conn).await?;

        let outcome = op(&mut *tx).await;
        let result = match outcome {
            Ok(user) => match tx.commit().await {
                Ok(()) => Ok(user),
                Err(e) => Err(e.into()),
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "transaction rollback failed");
                }
                warn!(error = %e, "transaction rolled back");
                Err(e)
            }
        };

        drop(conn);
        debug!("pooled connection released");
        result
    }

    fn row_to_model(row: SqliteRow) -> Result<UserRecord, LinkerError> {
        let id: i64 = row.try_get("id")?;
        let github_username: Option<String> = row.try_get("github_username")?;
        let linkedin_id: Option<String> = row.try_get("linkedin_id")?;
        let github_token: Option<String> = row.try_get("github_token")?;
        let linkedin_token: Option<String> = row.try_get("linkedin_token")?;
        let github_profileurl: Option<String> = row.try_get("github_profileurl")?;
        let created_at_str: String = row.try_get("created_at")?;

        let created_at: DateTime<Utc> = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);

        Ok(UserRecord {
            id,
            github_username,
            linkedin_id,
            github_token,
            linkedin_token,
            github_profileurl,
            created_at,
        })
    }
}
