use sqlx::PgPool;

use crate::models::User;

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, name, password_hash, role, created_at
        FROM users
        WHERE lower(email) = lower($1)
        "#,
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await
}
