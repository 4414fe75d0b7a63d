use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use common::{AddressId, UserId};
use domain::identity::{Address, Email, Role, User};
use domain::ports::UserRepository;
use domain::{Page, PageRequest, RepositoryError, RepositoryResult};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::{corrupt, db_error};
use crate::store::{PostgresStore, limit_offset, total};

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, is_active, created_at, updated_at";

fn row_to_user(row: &PgRow) -> RepositoryResult<User> {
    let email: String = row.try_get("email").map_err(db_error)?;
    Ok(User {
        id: UserId::from_uuid(row.try_get("id").map_err(db_error)?),
        email: Email::parse(&email).map_err(|e| corrupt("email", e))?,
        password_hash: row.try_get("password_hash").map_err(db_error)?,
        first_name: row.try_get("first_name").map_err(db_error)?,
        last_name: row.try_get("last_name").map_err(db_error)?,
        roles: BTreeSet::new(),
        addresses: Vec::new(),
        is_active: row.try_get("is_active").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn row_to_address(row: &PgRow) -> RepositoryResult<Address> {
    Ok(Address {
        id: AddressId::from_uuid(row.try_get("id").map_err(db_error)?),
        street: row.try_get("street").map_err(db_error)?,
        city: row.try_get("city").map_err(db_error)?,
        state: row.try_get("state").map_err(db_error)?,
        postal_code: row.try_get("postal_code").map_err(db_error)?,
        country: row.try_get("country").map_err(db_error)?,
        is_default: row.try_get("is_default").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

/// Loads roles and addresses for the given user rows.
async fn hydrate(pool: &PgPool, rows: Vec<PgRow>) -> RepositoryResult<Vec<User>> {
    let mut users = rows.iter().map(row_to_user).collect::<RepositoryResult<Vec<_>>>()?;
    if users.is_empty() {
        return Ok(users);
    }
    let ids: Vec<Uuid> = users.iter().map(|u| u.id.as_uuid()).collect();

    let mut roles: HashMap<Uuid, BTreeSet<Role>> = HashMap::new();
    for row in sqlx::query("SELECT user_id, role FROM user_roles WHERE user_id = ANY($1)")
        .bind(&ids)
        .fetch_all(pool)
        .await
        .map_err(db_error)?
    {
        let user_id: Uuid = row.try_get("user_id").map_err(db_error)?;
        let role: String = row.try_get("role").map_err(db_error)?;
        let role = Role::parse(&role).ok_or_else(|| corrupt("role", &role))?;
        roles.entry(user_id).or_default().insert(role);
    }

    let mut addresses: HashMap<Uuid, Vec<Address>> = HashMap::new();
    for row in sqlx::query(
        r#"
        SELECT id, user_id, street, city, state, postal_code, country, is_default, created_at
        FROM addresses
        WHERE user_id = ANY($1)
        ORDER BY position ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?
    {
        let user_id: Uuid = row.try_get("user_id").map_err(db_error)?;
        addresses
            .entry(user_id)
            .or_default()
            .push(row_to_address(&row)?);
    }

    for user in &mut users {
        let id = user.id.as_uuid();
        user.roles = roles.remove(&id).unwrap_or_default();
        user.addresses = addresses.remove(&id).unwrap_or_default();
        if user.roles.is_empty() {
            return Err(corrupt("user roles", format!("user {} has no roles", user.id)));
        }
    }
    Ok(users)
}

/// Replaces the roles and addresses of a user inside a transaction.
async fn write_children(conn: &mut PgConnection, user: &User) -> RepositoryResult<()> {
    let id = user.id.as_uuid();
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    sqlx::query("DELETE FROM addresses WHERE user_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    for role in &user.roles {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(id)
            .bind(role.as_str())
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
    }

    for (position, address) in (0_i32..).zip(&user.addresses) {
        sqlx::query(
            r#"
            INSERT INTO addresses
                (id, user_id, position, street, city, state, postal_code, country, is_default, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(id)
        .bind(position)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .bind(address.created_at)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

#[async_trait]
impl UserRepository for PostgresStore {
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: &User) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        write_children(&mut tx, user).await?;
        tx.commit().await.map_err(db_error)
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn save_user(&self, user: &User) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, first_name = $4, last_name = $5,
                is_active = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "user {} does not exist",
                user.id
            )));
        }

        write_children(&mut tx, user).await?;
        tx.commit().await.map_err(db_error)
    }

    async fn find_user(&self, id: UserId) -> RepositoryResult<Option<User>> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(hydrate(&self.pool, rows).await?.pop())
    }

    async fn find_user_by_email(&self, email: &Email) -> RepositoryResult<Option<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(hydrate(&self.pool, rows).await?.pop())
    }

    async fn list_users(&self, page: PageRequest) -> RepositoryResult<Page<User>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items: hydrate(&self.pool, rows).await?,
            page: page.page(),
            per_page: page.per_page(),
            total: total(count),
        })
    }
}
