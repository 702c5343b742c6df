//! Data access layer: a generic CRUD repository over PostgreSQL
//!
//! Repositories are stateless and run against a caller-supplied connection,
//! so the same calls work on a pooled connection or inside the transaction of
//! a [`SqlCommandContext`](crate::database::SqlCommandContext).

use std::marker::PhantomData;

use sqlx::postgres::{PgConnection, PgRow};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Postgres, QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

use crate::telemetry::log_error;

/// A row type stored in its own table, keyed by a UUID.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin {
    const TABLE: &'static str;
    const ID_COLUMN: &'static str = "id";
    /// Every column except the id, in the order `bind_columns` pushes values.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Uuid;

    /// Push one bind per entry of `COLUMNS`, in the same order.
    fn bind_columns<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>);
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Constraint violated while writing {entity}")]
    Constraint {
        entity: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error while accessing {entity}")]
    Database {
        entity: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl RepositoryError {
    fn from_sqlx(entity: &'static str, source: sqlx::Error) -> Self {
        let is_constraint = source.as_database_error().is_some_and(|db| {
            db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation()
        }) || matches!(
            source.as_database_error().and_then(|db| db.code()).as_deref(),
            // not_null_violation
            Some("23502")
        );

        if is_constraint {
            RepositoryError::Constraint { entity, source }
        } else {
            RepositoryError::Database { entity, source }
        }
    }
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// CRUD operations for `T`
pub struct CrudRepository<T> {
    _entity: PhantomData<fn() -> T>,
}

impl<T> Default for CrudRepository<T> {
    fn default() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<T> Clone for CrudRepository<T> {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<T: Entity> CrudRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail<R>(&self, message: &str, err: sqlx::Error) -> RepositoryResult<R> {
        let err = RepositoryError::from_sqlx(T::TABLE, err);
        log_error(message, &err);
        Err(err)
    }

    fn not_found(&self, id: Uuid) -> RepositoryError {
        let err = RepositoryError::NotFound {
            entity: T::TABLE,
            id,
        };
        log_error("Entity not found", &err);
        err
    }

    pub async fn create(&self, conn: &mut PgConnection, entity: &T) -> RepositoryResult<()> {
        let mut query = insert_query(entity);
        match query.build().execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(e) => self.fail("Failed to create entity", e),
        }
    }

    pub async fn get(&self, conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<T>> {
        let mut query = select_by_id_query::<T>(id);
        match query.build_query_as::<T>().fetch_optional(&mut *conn).await {
            Ok(entity) => Ok(entity),
            Err(e) => self.fail("Failed to fetch entity", e),
        }
    }

    /// Like [`get`](Self::get), but a missing row is an error.
    pub async fn get_or_fail(&self, conn: &mut PgConnection, id: Uuid) -> RepositoryResult<T> {
        self.get(conn, id).await?.ok_or_else(|| self.not_found(id))
    }

    /// Page of entities ordered by id
    pub async fn list(
        &self,
        conn: &mut PgConnection,
        offset: i64,
        limit: i64,
    ) -> RepositoryResult<Vec<T>> {
        let mut query = list_query::<T>(offset, limit);
        match query.build_query_as::<T>().fetch_all(&mut *conn).await {
            Ok(entities) => Ok(entities),
            Err(e) => self.fail("Failed to list entities", e),
        }
    }

    pub async fn count(&self, conn: &mut PgConnection) -> RepositoryResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", T::TABLE);
        match sqlx::query_as::<_, (i64,)>(&sql).fetch_one(&mut *conn).await {
            Ok(row) => Ok(row.0),
            Err(e) => self.fail("Failed to count entities", e),
        }
    }

    /// Overwrite every non-id column of entity `id` with the values of `new_entity`.
    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        new_entity: &T,
    ) -> RepositoryResult<()> {
        self.get_or_fail(conn, id).await?;

        let Some(mut query) = update_query(id, new_entity) else {
            return Ok(());
        };
        match query.build().execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(e) => self.fail("Failed to update entity", e),
        }
    }

    pub async fn delete(&self, conn: &mut PgConnection, id: Uuid) -> RepositoryResult<()> {
        self.get_or_fail(conn, id).await?;

        let mut query = delete_query::<T>(id);
        match query.build().execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(e) => self.fail("Failed to delete entity", e),
        }
    }
}

fn column_list<T: Entity>() -> String {
    std::iter::once(T::ID_COLUMN)
        .chain(T::COLUMNS.iter().copied())
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_query<T: Entity>(entity: &T) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        T::TABLE,
        column_list::<T>()
    ));
    {
        let mut values = query.separated(", ");
        values.push_bind(entity.id());
        entity.bind_columns(&mut values);
    }
    query.push(")");
    query
}

fn select_by_id_query<T: Entity>(id: Uuid) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!(
        "SELECT {} FROM {} WHERE {} = ",
        column_list::<T>(),
        T::TABLE,
        T::ID_COLUMN
    ));
    query.push_bind(id);
    query
}

fn list_query<T: Entity>(offset: i64, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!(
        "SELECT {} FROM {} ORDER BY {} LIMIT ",
        column_list::<T>(),
        T::TABLE,
        T::ID_COLUMN
    ));
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);
    query
}

/// `None` when the entity has no column besides its id.
fn update_query<T: Entity>(id: Uuid, entity: &T) -> Option<QueryBuilder<'static, Postgres>> {
    if T::COLUMNS.is_empty() {
        return None;
    }

    let mut query = QueryBuilder::new(format!(
        "UPDATE {} SET ({}) = ROW(",
        T::TABLE,
        T::COLUMNS.join(", ")
    ));
    {
        let mut values = query.separated(", ");
        entity.bind_columns(&mut values);
    }
    query.push(format!(") WHERE {} = ", T::ID_COLUMN));
    query.push_bind(id);
    Some(query)
}

fn delete_query<T: Entity>(id: Uuid) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!(
        "DELETE FROM {} WHERE {} = ",
        T::TABLE,
        T::ID_COLUMN
    ));
    query.push_bind(id);
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
    struct Book {
        id: Uuid,
        title: String,
        pages: i32,
    }

    impl Entity for Book {
        const TABLE: &'static str = "books";
        const COLUMNS: &'static [&'static str] = &["title", "pages"];

        fn id(&self) -> Uuid {
            self.id
        }

        fn bind_columns<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
            values.push_bind(self.title.clone());
            values.push_bind(self.pages);
        }
    }

    #[derive(Debug, sqlx::FromRow)]
    struct Tag {
        tag_id: Uuid,
    }

    impl Entity for Tag {
        const TABLE: &'static str = "tags";
        const ID_COLUMN: &'static str = "tag_id";
        const COLUMNS: &'static [&'static str] = &[];

        fn id(&self) -> Uuid {
            self.tag_id
        }

        fn bind_columns<'args>(&self, _: &mut Separated<'_, 'args, Postgres, &'static str>) {}
    }

    fn book() -> Book {
        Book {
            id: Uuid::new_v4(),
            title: "Dune".to_string(),
            pages: 412,
        }
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_query(&book()).sql(),
            "INSERT INTO books (id, title, pages) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn test_select_sql() {
        assert_eq!(
            select_by_id_query::<Book>(Uuid::nil()).sql(),
            "SELECT id, title, pages FROM books WHERE id = $1"
        );
    }

    #[test]
    fn test_list_sql() {
        assert_eq!(
            list_query::<Book>(20, 10).sql(),
            "SELECT id, title, pages FROM books ORDER BY id LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_update_sql() {
        let query = update_query(Uuid::nil(), &book()).unwrap();
        assert_eq!(
            query.sql(),
            "UPDATE books SET (title, pages) = ROW($1, $2) WHERE id = $3"
        );
    }

    #[test]
    fn test_update_without_columns_is_skipped() {
        let tag = Tag {
            tag_id: Uuid::new_v4(),
        };
        assert!(update_query(tag.id(), &tag).is_none());
    }

    #[test]
    fn test_custom_id_column() {
        assert_eq!(
            delete_query::<Tag>(Uuid::nil()).sql(),
            "DELETE FROM tags WHERE tag_id = $1"
        );
        assert_eq!(
            insert_query(&Tag { tag_id: Uuid::nil() }).sql(),
            "INSERT INTO tags (tag_id) VALUES ($1)"
        );
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = RepositoryError::from_sqlx("books", sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Database { entity: "books", .. }));
    }

    #[test]
    fn test_not_found_message() {
        let err = RepositoryError::NotFound {
            entity: "books",
            id: Uuid::nil(),
        };
        assert_eq!(
            err.to_string(),
            "books 00000000-0000-0000-0000-000000000000 not found"
        );
    }
}
