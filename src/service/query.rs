use sea_orm::{
    sea_query::{Condition, Expr, Func, Query, SelectStatement, SimpleExpr},
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::entities::{patients, users};

/// `%term%` for a case-insensitive substring match, or `None` for a blank term.
pub fn search_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| format!("%{}%", term.to_lowercase()))
}

/// `LOWER(column) LIKE pattern`. Works the same on Postgres and SQLite.
pub fn contains(column: impl Into<SimpleExpr>, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(column)).like(pattern)
}

/// Patient profile keys whose code, names or email match `pattern`.
pub fn patients_matching(pattern: &str, with_email: bool) -> SelectStatement {
    let mut any = Condition::any()
        .add(contains(
            Expr::col((patients::Entity, patients::Column::PatientId)),
            pattern,
        ))
        .add(contains(
            Expr::col((users::Entity, users::Column::FirstName)),
            pattern,
        ))
        .add(contains(
            Expr::col((users::Entity, users::Column::LastName)),
            pattern,
        ));
    if with_email {
        any = any.add(contains(
            Expr::col((users::Entity, users::Column::Email)),
            pattern,
        ));
    }
    Query::select()
        .column((patients::Entity, patients::Column::Id))
        .from(patients::Entity)
        .inner_join(
            users::Entity,
            Expr::col((users::Entity, users::Column::Id))
                .equals((patients::Entity, patients::Column::UserId)),
        )
        .cond_where(any)
        .to_owned()
}

/// Account keys whose names match `pattern`.
pub fn users_matching(pattern: &str) -> SelectStatement {
    Query::select()
        .column(users::Column::Id)
        .from(users::Entity)
        .cond_where(
            Condition::any()
                .add(contains(Expr::col(users::Column::FirstName), pattern))
                .add(contains(Expr::col(users::Column::LastName), pattern)),
        )
        .to_owned()
}

pub async fn users_by_ids<C, I>(conn: &C, ids: I) -> Result<HashMap<i32, users::Model>, DbErr>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = i32>,
{
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = users::Entity::find()
        .filter(users::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|user| (user.id, user)).collect())
}

pub async fn patients_by_ids<C, I>(
    conn: &C,
    ids: I,
) -> Result<HashMap<i32, patients::Model>, DbErr>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = i32>,
{
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = patients::Entity::find()
        .filter(patients::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|patient| (patient.id, patient)).collect())
}

/// First and last name of a joined account, when present.
pub fn names(user: Option<&users::Model>) -> (Option<String>, Option<String>) {
    match user {
        Some(user) => (Some(user.first_name.clone()), Some(user.last_name.clone())),
        None => (None, None),
    }
}

/// Patient and doctor display fields joined onto clinical rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Parties {
    pub patient_code: Option<String>,
    pub patient_first_name: Option<String>,
    pub patient_last_name: Option<String>,
    pub doctor_first_name: Option<String>,
    pub doctor_last_name: Option<String>,
    pub doctor_code: Option<String>,
}

/// Resolves `(patient profile key, doctor account key)` pairs, keeping order.
pub async fn parties<C: ConnectionTrait>(
    conn: &C,
    keys: &[(i32, i32)],
) -> Result<Vec<Parties>, DbErr> {
    let patients = patients_by_ids(conn, keys.iter().map(|(patient_id, _)| *patient_id)).await?;
    let account_ids: Vec<i32> = keys
        .iter()
        .map(|(_, doctor_id)| *doctor_id)
        .chain(patients.values().map(|patient| patient.user_id))
        .collect();
    let users = users_by_ids(conn, account_ids).await?;

    Ok(keys
        .iter()
        .map(|(patient_id, doctor_id)| {
            let patient = patients.get(patient_id);
            let doctor = users.get(doctor_id);
            let (patient_first_name, patient_last_name) =
                names(patient.and_then(|patient| users.get(&patient.user_id)));
            let (doctor_first_name, doctor_last_name) = names(doctor);
            Parties {
                patient_code: patient.map(|patient| patient.patient_id.clone()),
                patient_first_name,
                patient_last_name,
                doctor_first_name,
                doctor_last_name,
                doctor_code: doctor.and_then(|doctor| doctor.doctor_id.clone()),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_search_terms_are_ignored() {
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(Some(" SmiTh ")), Some("%smith%".to_string()));
    }
}
