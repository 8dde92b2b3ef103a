//! Versioned SQL migration runner, applied at boot before traffic is
//! accepted — worker-zero only.
//!
//! A single linear sequence tracked in a `schema_migrations` table; no
//! pluggable migration-source registry, since the schema here is fixed and
//! known at compile time.

use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};

struct SqlMigration {
    version: i64,
    name: &'static str,
    up_sql: &'static str,
}

/// The full schema, applied in order. `http_codes` is pre-seeded with
/// the `(0, "N/A")` sentinel plus a representative slice of the IANA
/// registry; unknown codes are inserted on the fly by the lookup cache.
fn migrations() -> Vec<SqlMigration> {
    vec![
        SqlMigration {
            version: 1,
            name: "create_websites",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS websites (
                    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    domain VARCHAR(255) NOT NULL,
                    is_ssl BOOLEAN NOT NULL DEFAULT TRUE,
                    is_dev BOOLEAN NOT NULL DEFAULT FALSE,
                    owner_email VARCHAR(255) NULL,
                    admin_email VARCHAR(255) NULL,
                    last_activity_at TIMESTAMP NULL,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                    UNIQUE KEY uq_websites_domain (domain)
                ) ENGINE=InnoDB;
            "#,
        },
        SqlMigration {
            version: 2,
            name: "create_hosts",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS hosts (
                    id SMALLINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    hostname VARCHAR(255) NOT NULL,
                    UNIQUE KEY uq_hosts_hostname (hostname)
                ) ENGINE=InnoDB;
            "#,
        },
        SqlMigration {
            version: 3,
            name: "create_http_codes",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS http_codes (
                    id SMALLINT NOT NULL PRIMARY KEY,
                    code VARCHAR(16) NOT NULL,
                    description VARCHAR(255) NOT NULL DEFAULT '',
                    UNIQUE KEY uq_http_codes_code (code)
                ) ENGINE=InnoDB;
            "#,
        },
        SqlMigration {
            version: 4,
            name: "seed_http_codes",
            up_sql: r#"
                INSERT IGNORE INTO http_codes (id, code, description) VALUES
                    (0, 'N/A', 'Not applicable (error log, no status)'),
                    (200, '200', 'OK'),
                    (201, '201', 'Created'),
                    (204, '204', 'No Content'),
                    (301, '301', 'Moved Permanently'),
                    (302, '302', 'Found'),
                    (304, '304', 'Not Modified'),
                    (400, '400', 'Bad Request'),
                    (401, '401', 'Unauthorized'),
                    (403, '403', 'Forbidden'),
                    (404, '404', 'Not Found'),
                    (405, '405', 'Method Not Allowed'),
                    (408, '408', 'Request Timeout'),
                    (429, '429', 'Too Many Requests'),
                    (500, '500', 'Internal Server Error'),
                    (502, '502', 'Bad Gateway'),
                    (503, '503', 'Service Unavailable'),
                    (504, '504', 'Gateway Timeout');
            "#,
        },
        SqlMigration {
            version: 5,
            name: "create_log_records",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS log_records (
                    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    website_id BIGINT NOT NULL,
                    log_type ENUM('access', 'error') NOT NULL,
                    timestamp TIMESTAMP NOT NULL,
                    host_id SMALLINT NOT NULL,
                    code_id SMALLINT NOT NULL DEFAULT 0,
                    remote VARCHAR(64) NULL,
                    raw_data JSON NOT NULL,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    archived_at TIMESTAMP NULL,
                    upstream_batch_uuid BINARY(16) NULL,
                    CONSTRAINT fk_log_records_website FOREIGN KEY (website_id) REFERENCES websites(id) ON DELETE CASCADE,
                    CONSTRAINT fk_log_records_host FOREIGN KEY (host_id) REFERENCES hosts(id),
                    CONSTRAINT fk_log_records_code FOREIGN KEY (code_id) REFERENCES http_codes(id),
                    KEY idx_log_records_website_created (website_id, created_at),
                    KEY idx_log_records_archived (archived_at),
                    KEY idx_log_records_id_archived (id, archived_at)
                ) ENGINE=InnoDB;
            "#,
        },
        SqlMigration {
            version: 6,
            name: "create_api_keys",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS api_keys (
                    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    key_hash VARCHAR(255) NOT NULL,
                    description VARCHAR(255) NOT NULL DEFAULT '',
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    last_used_at TIMESTAMP NULL,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    UNIQUE KEY uq_api_keys_hash (key_hash)
                ) ENGINE=InnoDB;
            "#,
        },
        SqlMigration {
            version: 7,
            name: "create_upstream_sync_batches",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS upstream_sync_batches (
                    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    batch_uuid BINARY(16) NOT NULL,
                    started_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    completed_at TIMESTAMP NULL,
                    record_count BIGINT NOT NULL DEFAULT 0,
                    status ENUM('pending', 'in_progress', 'completed', 'failed') NOT NULL DEFAULT 'pending',
                    error_message TEXT NULL,
                    retry_count INT NOT NULL DEFAULT 0,
                    UNIQUE KEY uq_upstream_sync_batches_uuid (batch_uuid)
                ) ENGINE=InnoDB;
            "#,
        },
        SqlMigration {
            version: 8,
            name: "create_batch_deduplication",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS batch_deduplication (
                    batch_uuid BINARY(16) NOT NULL,
                    source_instance VARCHAR(255) NOT NULL,
                    received_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    record_count BIGINT NOT NULL,
                    PRIMARY KEY (batch_uuid, source_instance)
                ) ENGINE=InnoDB;
            "#,
        },
    ]
}

/// Ensures the tracking table exists, then applies every migration whose
/// version has not yet been recorded, in ascending order.
pub async fn run(pool: &DbPool) -> DbResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT NOT NULL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        ) ENGINE=InnoDB;
        "#,
    )
    .execute(pool.inner())
    .await
    .map_err(|e| DbError::Migration(format!("failed to create schema_migrations: {e}")))?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool.inner())
        .await
        .map_err(|e| DbError::Migration(format!("failed to read schema_migrations: {e}")))?;

    for migration in migrations() {
        if applied.contains(&migration.version) {
            continue;
        }

        tracing::info!(version = migration.version, name = migration.name, "applying migration");

        let mut tx = pool
            .inner()
            .begin()
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        for statement in migration.up_sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| DbError::Migration(format!("{}: {e}", migration.name)))?;
        }

        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        tx.commit().await.map_err(|e| DbError::Migration(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_in_strictly_ascending_version_order() {
        let versions: Vec<i64> = migrations().iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted, "migration versions must already be ascending");
    }

    #[test]
    fn http_code_seed_includes_the_na_sentinel() {
        let seed = migrations().into_iter().find(|m| m.name == "seed_http_codes").unwrap();
        assert!(seed.up_sql.contains("(0, 'N/A'"));
    }
}
