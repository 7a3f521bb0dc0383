//! Repositorio de reservas
//!
//! Cada reserva es un documento completo (sub-registros, eventos y
//! comunicaciones) guardado junto a columnas indexadas para las consultas.
//! Toda escritura es atómica por reserva y está protegida por `version`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::reservation::{Reservation, ReservationStatus};
use crate::models::stats::{average, compute_stats, StatsWindow, StatusStats};
use crate::utils::errors::{not_found_error, AppError, AppResult};
use crate::utils::validation::normalize_phone;

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insertar una reserva nueva; `Conflict` si el id ya existe
    async fn insert(&self, reservation: &Reservation) -> AppResult<Reservation>;

    /// Reescribir el documento si `version` coincide con la almacenada
    async fn update(&self, reservation: &Reservation) -> AppResult<Reservation>;

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Reservation>>;

    /// Reservas de un teléfono (normalizado), más recientes primero
    async fn find_by_phone(&self, phone: &str) -> AppResult<Vec<Reservation>>;

    async fn find_active(&self) -> AppResult<Vec<Reservation>>;

    async fn find_by_driver(&self, driver_id: &str) -> AppResult<Vec<Reservation>>;

    async fn stats(&self, window: &StatsWindow) -> AppResult<Vec<StatusStats>>;
}

fn newest_first(reservations: &mut [Reservation]) {
    reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

// ----------------------------------------------------------------------------
// PostgreSQL
// ----------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ReservationRow {
    version: i64,
    document: Json<Reservation>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        let mut reservation = row.document.0;
        reservation.version = row.version;
        reservation
    }
}

#[derive(sqlx::FromRow)]
struct StatusStatsRow {
    status: String,
    count: i64,
    total_amount: Decimal,
}

pub struct PgReservationRepository {
    pool: PgPool,
}

impl PgReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_column(&self, sql: &str, value: &str) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Persistence(format!("Error querying reservations: {}", e)))?;

        Ok(rows.into_iter().map(Reservation::from).collect())
    }
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    async fn insert(&self, reservation: &Reservation) -> AppResult<Reservation> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            INSERT INTO reservations (
                id, status, customer_phone, driver_id, total_price,
                created_at, updated_at, version, document
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8)
            RETURNING version, document
            "#,
        )
        .bind(&reservation.id)
        .bind(reservation.status().as_str())
        .bind(reservation.customer.normalized_phone())
        .bind(reservation.driver().map(|d| d.driver_id.as_str()))
        .bind(reservation.pricing.total_price)
        .bind(reservation.created_at)
        .bind(reservation.updated_at())
        .bind(Json(reservation))
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        debug!("💾 Reserva {} insertada", reservation.id);
        Ok(row.into())
    }

    async fn update(&self, reservation: &Reservation) -> AppResult<Reservation> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            UPDATE reservations
            SET status = $2, customer_phone = $3, driver_id = $4, total_price = $5,
                updated_at = $6, version = version + 1, document = $7
            WHERE id = $1 AND version = $8
            RETURNING version, document
            "#,
        )
        .bind(&reservation.id)
        .bind(reservation.status().as_str())
        .bind(reservation.customer.normalized_phone())
        .bind(reservation.driver().map(|d| d.driver_id.as_str()))
        .bind(reservation.pricing.total_price)
        .bind(reservation.updated_at())
        .bind(Json(reservation))
        .bind(reservation.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Persistence(format!("Error updating reservation: {}", e)))?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let (exists,): (bool,) =
                    sqlx::query_as("SELECT EXISTS(SELECT 1 FROM reservations WHERE id = $1)")
                        .bind(&reservation.id)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(|e| {
                            AppError::Persistence(format!("Error checking reservation: {}", e))
                        })?;

                if exists {
                    Err(AppError::Conflict(format!(
                        "Reservation {} was modified concurrently",
                        reservation.id
                    )))
                } else {
                    Err(not_found_error("Reservation", &reservation.id))
                }
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(
            "SELECT version, document FROM reservations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Persistence(format!("Error finding reservation: {}", e)))?;

        Ok(row.map(Reservation::from))
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Vec<Reservation>> {
        let phone = normalize_phone(phone);
        self.fetch_by_column(
            r#"
            SELECT version, document FROM reservations
            WHERE customer_phone = $1
            ORDER BY created_at DESC, id DESC
            "#,
            &phone,
        )
        .await
    }

    async fn find_active(&self) -> AppResult<Vec<Reservation>> {
        let statuses: Vec<&str> = ReservationStatus::ACTIVE.iter().map(|s| s.as_str()).collect();

        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT version, document FROM reservations
            WHERE status = ANY($1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Persistence(format!("Error finding active reservations: {}", e)))?;

        Ok(rows.into_iter().map(Reservation::from).collect())
    }

    async fn find_by_driver(&self, driver_id: &str) -> AppResult<Vec<Reservation>> {
        self.fetch_by_column(
            r#"
            SELECT version, document FROM reservations
            WHERE driver_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
            driver_id,
        )
        .await
    }

    async fn stats(&self, window: &StatsWindow) -> AppResult<Vec<StatusStats>> {
        let rows = sqlx::query_as::<_, StatusStatsRow>(
            r#"
            SELECT status, COUNT(*) AS count, COALESCE(SUM(total_price), 0) AS total_amount
            FROM reservations
            WHERE created_at >= $1 AND created_at <= $2
            GROUP BY status
            "#,
        )
        .bind(window.from)
        .bind(window.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Persistence(format!("Error computing stats: {}", e)))?;

        let mut stats = rows
            .into_iter()
            .map(|row| -> AppResult<StatusStats> {
                let status: ReservationStatus = row.status.parse()?;
                let count = u64::try_from(row.count).unwrap_or_default();
                Ok(StatusStats {
                    status,
                    count,
                    total_amount: row.total_amount,
                    avg_amount: average(row.total_amount, count),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        stats.sort_by_key(|s| s.status);
        Ok(stats)
    }
}

// ----------------------------------------------------------------------------
// En memoria (desarrollo sin DATABASE_URL y tests)
// ----------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct InMemoryReservationRepository {
    reservations: Arc<RwLock<HashMap<String, Reservation>>>,
}

impl InMemoryReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filtered<F>(&self, predicate: F) -> Vec<Reservation>
    where
        F: Fn(&Reservation) -> bool,
    {
        let reservations = self.reservations.read().await;
        let mut found: Vec<Reservation> = reservations.values().filter(|r| predicate(r)).cloned().collect();
        newest_first(&mut found);
        found
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn insert(&self, reservation: &Reservation) -> AppResult<Reservation> {
        let mut reservations = self.reservations.write().await;
        if reservations.contains_key(&reservation.id) {
            return Err(AppError::Conflict(format!(
                "Reservation {} already exists",
                reservation.id
            )));
        }

        let mut stored = reservation.clone();
        stored.version = 1;
        reservations.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, reservation: &Reservation) -> AppResult<Reservation> {
        let mut reservations = self.reservations.write().await;
        let current = reservations
            .get(&reservation.id)
            .ok_or_else(|| not_found_error("Reservation", &reservation.id))?;

        if current.version != reservation.version {
            return Err(AppError::Conflict(format!(
                "Reservation {} was modified concurrently",
                reservation.id
            )));
        }

        let mut stored = reservation.clone();
        stored.version += 1;
        reservations.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Reservation>> {
        Ok(self.reservations.read().await.get(id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Vec<Reservation>> {
        let phone = normalize_phone(phone);
        Ok(self.filtered(|r| r.customer.normalized_phone() == phone).await)
    }

    async fn find_active(&self) -> AppResult<Vec<Reservation>> {
        Ok(self.filtered(|r| r.status().is_active()).await)
    }

    async fn find_by_driver(&self, driver_id: &str) -> AppResult<Vec<Reservation>> {
        Ok(self
            .filtered(|r| r.driver().map_or(false, |d| d.driver_id == driver_id))
            .await)
    }

    async fn stats(&self, window: &StatsWindow) -> AppResult<Vec<StatusStats>> {
        let reservations = self.reservations.read().await;
        Ok(compute_stats(reservations.values(), window))
    }
}


/// Tests contra PostgreSQL real: solo corren con `TEST_DATABASE_URL` definida
#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::models::event::Actor;
    use crate::models::test_support::{draft, driver};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rand::Rng;

    async fn repository() -> Option<PgReservationRepository> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL no definida, test de PostgreSQL omitido");
            return None;
        };
        let pool = DatabaseConfig::new(url).create_pool().await.unwrap();
        DatabaseConfig::run_migrations(&pool).await.unwrap();
        Some(PgReservationRepository::new(pool))
    }

    /// Instante aleatorio en 2001 para aislar cada test en su propia ventana
    fn isolated_instant() -> DateTime<Utc> {
        let minutes = rand::thread_rng().gen_range(0..500_000);
        Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn random_phone() -> String {
        format!("06{:08}", rand::thread_rng().gen_range(0..100_000_000u32))
    }

    fn reservation(created_at: DateTime<Utc>, phone: &str) -> Reservation {
        let mut d = draft();
        d.customer.phone = phone.to_string();
        Reservation::create(d, created_at).unwrap()
    }

    #[tokio::test]
    async fn test_pg_insert_find_and_duplicate_key() {
        let Some(repo) = repository().await else { return };
        let reservation = reservation(isolated_instant(), &random_phone());

        let stored = repo.insert(&reservation).await.unwrap();
        assert_eq!(stored.version, 1);

        let found = repo.find_by_id(&reservation.id).await.unwrap().unwrap();
        assert_eq!(found.version, 1);
        assert_eq!(found.events().len(), reservation.events().len());
        assert_eq!(found.customer.phone, reservation.customer.phone);

        // Clave primaria duplicada (23505) se traduce en Conflict
        assert!(matches!(repo.insert(&reservation).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_pg_update_is_guarded_by_version() {
        let Some(repo) = repository().await else { return };
        let stored = repo
            .insert(&reservation(isolated_instant(), &random_phone()))
            .await
            .unwrap();

        let mut first = stored.clone();
        first.update_status(ReservationStatus::Confirmed, None, None, &Actor::system(), Utc::now());
        let first = repo.update(&first).await.unwrap();
        assert_eq!(first.version, 2);

        let mut stale = stored;
        stale.update_status(ReservationStatus::Cancelled, None, None, &Actor::system(), Utc::now());
        assert!(matches!(repo.update(&stale).await, Err(AppError::Conflict(_))));

        let current = repo.find_by_id(&first.id).await.unwrap().unwrap();
        assert_eq!(current.status(), ReservationStatus::Confirmed);

        let missing = reservation(isolated_instant(), &random_phone());
        assert!(matches!(repo.update(&missing).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pg_queries_by_phone_driver_and_status() {
        let Some(repo) = repository().await else { return };
        let phone = random_phone();
        let at = isolated_instant();

        let older = repo.insert(&reservation(at, &phone)).await.unwrap();
        let mut newer = repo
            .insert(&reservation(at + Duration::minutes(5), &phone))
            .await
            .unwrap();

        let mut assigned_driver = driver();
        assigned_driver.driver_id = format!("drv-{}", phone);
        newer.assign_driver(assigned_driver.clone(), &Actor::system(), Utc::now());
        let newer = repo.update(&newer).await.unwrap();

        let mut closed = older.clone();
        closed.update_status(ReservationStatus::Completed, None, None, &Actor::system(), Utc::now());
        let closed = repo.update(&closed).await.unwrap();

        // Teléfono con separadores y prefijo internacional
        let international = format!("+33 {}", &phone[1..]);
        let by_phone = repo.find_by_phone(&international).await.unwrap();
        let ids: Vec<&str> = by_phone.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), closed.id.as_str()]);

        let by_driver = repo.find_by_driver(&assigned_driver.driver_id).await.unwrap();
        assert_eq!(by_driver.len(), 1);
        assert_eq!(by_driver[0].id, newer.id);

        let active = repo.find_active().await.unwrap();
        assert!(active.iter().any(|r| r.id == newer.id));
        assert!(!active.iter().any(|r| r.id == closed.id));
    }

    #[tokio::test]
    async fn test_pg_stats_group_by_status() {
        let Some(repo) = repository().await else { return };
        let at = isolated_instant();

        for offset in 0..2 {
            repo.insert(&reservation(at + Duration::seconds(offset), &random_phone()))
                .await
                .unwrap();
        }
        let mut cancelled = repo
            .insert(&reservation(at + Duration::seconds(2), &random_phone()))
            .await
            .unwrap();
        cancelled.update_status(ReservationStatus::Cancelled, None, None, &Actor::system(), Utc::now());
        repo.update(&cancelled).await.unwrap();

        let window = StatsWindow {
            from: at - Duration::seconds(1),
            to: at + Duration::seconds(3),
        };
        let stats = repo.stats(&window).await.unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].status, ReservationStatus::Pending);
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].total_amount, Decimal::new(11000, 2));
        assert_eq!(stats[0].avg_amount, Decimal::new(5500, 2));
        assert_eq!(stats[1].status, ReservationStatus::Cancelled);
        assert_eq!(stats[1].count, 1);
    }
}
