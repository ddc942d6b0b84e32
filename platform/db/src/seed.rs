use chrono::{TimeZone, Utc};
use entity::employees;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, DatabaseBackend, EntityTrait, PaginatorTrait,
    prelude::Decimal,
};
use tracing::{debug, info};

use crate::{DbPool, DbResult};

/// Result of [`seed_if_empty`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The table was empty and this many records were inserted.
    Seeded(u64),
    /// The table already held this many records; nothing was written.
    AlreadyPopulated(u64),
}

/// The fixed initial employee set.
pub fn seed_employees() -> Vec<employees::Model> {
    [
        (1, "John Doe", "john.doe@company.com", "Engineering", 75_000, (2022, 1, 15), true),
        (2, "Jane Smith", "jane.smith@company.com", "Marketing", 65_000, (2022, 3, 22), true),
        (3, "Mike Johnson", "mike.johnson@company.com", "Engineering", 82_000, (2021, 11, 8), true),
        (4, "Sarah Wilson", "sarah.wilson@company.com", "HR", 58_000, (2023, 2, 14), true),
        (5, "David Brown", "david.brown@company.com", "Finance", 70_000, (2022, 7, 30), true),
        (6, "Lisa Garcia", "lisa.garcia@company.com", "Engineering", 78_000, (2023, 1, 10), true),
        (7, "Robert Taylor", "robert.taylor@company.com", "Sales", 62_000, (2022, 9, 5), false),
        (8, "Emily Davis", "emily.davis@company.com", "Marketing", 67_000, (2023, 4, 18), true),
    ]
    .into_iter()
    .map(
        |(id, name, email, department, salary, (year, month, day), is_active)| employees::Model {
            id,
            name: name.to_string(),
            email: email.to_string(),
            department: department.to_string(),
            salary: Decimal::new(salary * 100, 2),
            hire_date: Utc
                .with_ymd_and_hms(year, month, day, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            is_active,
        },
    )
    .collect()
}

/// Insert [`seed_employees`] when the table holds no rows.
pub async fn seed_if_empty(pool: &DbPool) -> DbResult<SeedOutcome> {
    let existing = employees::Entity::find().count(pool).await?;
    if existing > 0 {
        debug!(existing, "employees table already populated; skipping seed");
        return Ok(SeedOutcome::AlreadyPopulated(existing));
    }

    let rows = seed_employees()
        .into_iter()
        .map(|model| employees::ActiveModel {
            id: Set(model.id),
            name: Set(model.name),
            email: Set(model.email),
            department: Set(model.department),
            salary: Set(model.salary),
            hire_date: Set(model.hire_date),
            is_active: Set(model.is_active),
        })
        .collect::<Vec<_>>();
    let inserted = rows.len() as u64;
    employees::Entity::insert_many(rows).exec(pool).await?;

    // Explicit ids leave the serial sequence behind on Postgres.
    if pool.get_database_backend() == DatabaseBackend::Postgres {
        pool.execute_unprepared(
            "SELECT setval(pg_get_serial_sequence('employees', 'id'), (SELECT MAX(id) FROM employees))",
        )
        .await?;
    }

    info!(inserted, "seeded employees table");
    Ok(SeedOutcome::Seeded(inserted))
}
