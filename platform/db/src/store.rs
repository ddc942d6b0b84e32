use entity::employees;
use sea_orm::{EntityTrait, QueryOrder};

use crate::{DbPool, DbResult};

/// Outcome of a single-record read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Lookup::NotFound, Lookup::Found)
    }
}

/// Read-only handle over the `employees` table.
///
/// Cloning is cheap; every clone shares the underlying pool.
#[derive(Clone, Debug)]
pub struct EmployeeStore {
    pool: DbPool,
}

impl EmployeeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// All employees, ordered by id.
    pub async fn list_all(&self) -> DbResult<Vec<employees::Model>> {
        let rows = employees::Entity::find()
            .order_by_asc(employees::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_by_id(&self, id: i32) -> DbResult<Lookup<employees::Model>> {
        let row = employees::Entity::find_by_id(id).one(&self.pool).await?;
        Ok(row.into())
    }

    /// Employees whose department matches `department` ignoring case.
    ///
    /// Both sides go through [`fold_case`] in Rust rather than SQL `LOWER`,
    /// which folds only ASCII on SQLite but full Unicode on Postgres.
    pub async fn list_by_department(&self, department: &str) -> DbResult<Vec<employees::Model>> {
        let needle = fold_case(department);
        let rows = self
            .list_all()
            .await?
            .into_iter()
            .filter(|employee| fold_case(&employee.department) == needle)
            .collect();
        Ok(rows)
    }
}

fn fold_case(value: &str) -> String {
    value.to_lowercase()
}
