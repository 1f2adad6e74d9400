//! Employee queries (tenant database).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

use super::{map_unique, DbPool};
use crate::models::EmployeeRole;
use crate::{Error, Result};

/// Employee record; also the tenant user principal.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub manager_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Employee {
    pub fn role_enum(&self) -> EmployeeRole {
        EmployeeRole::from_str(&self.role).unwrap_or_default()
    }

    pub fn can_sign_in(&self) -> bool {
        self.active && self.deleted_at.is_none()
    }
}

/// Input for creating an employee.
#[derive(Debug, Clone)]
pub struct CreateEmployee {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: EmployeeRole,
    pub manager_id: Option<String>,
}

pub async fn create_employee(pool: &DbPool, input: CreateEmployee) -> Result<Employee> {
    sqlx::query_as::<_, Employee>(
        r#"
        INSERT INTO employees (id, email, display_name, password_hash, role, manager_id, active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(input.email.trim().to_lowercase())
    .bind(&input.display_name)
    .bind(&input.password_hash)
    .bind(input.role.as_str())
    .bind(&input.manager_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique(e, || format!("Employee {} already exists", input.email)))
}

/// Get a live employee by ID.
pub async fn get_employee<'e, E>(executor: E, id: &str) -> Result<Employee>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ? AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Employee {}", id)))
}

pub async fn get_employee_by_email(pool: &DbPool, email: &str) -> Result<Option<Employee>> {
    let employee = sqlx::query_as::<_, Employee>(
        "SELECT * FROM employees WHERE email = ? COLLATE NOCASE AND deleted_at IS NULL",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(employee)
}

pub async fn list_employees(pool: &DbPool) -> Result<Vec<Employee>> {
    let employees = sqlx::query_as::<_, Employee>(
        "SELECT * FROM employees WHERE deleted_at IS NULL ORDER BY display_name",
    )
    .fetch_all(pool)
    .await?;
    Ok(employees)
}

/// Ids of live employees reporting directly to `manager_id`.
pub async fn list_direct_report_ids(pool: &DbPool, manager_id: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT id FROM employees WHERE manager_id = ? AND deleted_at IS NULL")
            .bind(manager_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Case-insensitive match on name or email.
pub async fn search_employees(pool: &DbPool, query: &str, limit: i64) -> Result<Vec<Employee>> {
    let pattern = format!("%{}%", escape_like(query));
    let employees = sqlx::query_as::<_, Employee>(
        r#"
        SELECT * FROM employees
        WHERE deleted_at IS NULL
          AND (display_name LIKE ? ESCAPE '\' OR email LIKE ? ESCAPE '\')
        ORDER BY display_name
        LIMIT ?
        "#,
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(employees)
}

pub(crate) fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_tenant_schema, IN_MEMORY};

    async fn setup() -> DbPool {
        let pool = init_pool(IN_MEMORY).await.unwrap();
        initialize_tenant_schema(&pool).await.unwrap();
        pool
    }

    fn employee(id: &str, email: &str, name: &str) -> CreateEmployee {
        CreateEmployee {
            id: id.into(),
            email: email.into(),
            display_name: name.into(),
            password_hash: "x".into(),
            role: EmployeeRole::Employee,
            manager_id: None,
        }
    }

    #[tokio::test]
    async fn test_employee_lookup() {
        let pool = setup().await;
        create_employee(&pool, employee("e1", "Ada@Example.com", "Ada Lovelace")).await.unwrap();

        let found = get_employee_by_email(&pool, "ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, "e1");
        assert_eq!(found.role_enum(), EmployeeRole::Employee);
        assert!(found.can_sign_in());

        assert!(matches!(
            create_employee(&pool, employee("e2", "ada@example.com", "Dup")).await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_search_escapes_wildcards() {
        let pool = setup().await;
        create_employee(&pool, employee("e1", "ada@example.com", "Ada Lovelace")).await.unwrap();
        create_employee(&pool, employee("e2", "alan@example.com", "Alan Turing")).await.unwrap();

        assert_eq!(search_employees(&pool, "love", 10).await.unwrap().len(), 1);
        assert_eq!(search_employees(&pool, "example", 10).await.unwrap().len(), 2);
        assert_eq!(search_employees(&pool, "example", 1).await.unwrap().len(), 1);
        assert!(search_employees(&pool, "%", 10).await.unwrap().is_empty());
    }
}
