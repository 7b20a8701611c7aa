use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, Set, Statement,
};
use sea_orm_migration::prelude::*;

use crate::entities::departments;

mod appointments;
mod departments_table;
mod employees;
mod medical_records;
mod notices;
mod patients;
mod payroll;
mod prescriptions;
mod users;

pub(crate) const DEFAULT_DEPARTMENTS: [&str; 15] = [
    "Cardiology",
    "Neurology",
    "Orthopedics",
    "Pediatrics",
    "Emergency",
    "Surgery",
    "Radiology",
    "Laboratory",
    "Pharmacy",
    "Nursing",
    "Administration",
    "IT",
    "Maintenance",
    "Security",
    "Housekeeping",
];

const TIMESTAMPED_TABLES: [&str; 8] = [
    "users",
    "patients",
    "employees",
    "appointments",
    "prescriptions",
    "medical_records",
    "payroll",
    "notices",
];

/// Creates every table that does not exist yet and seeds reference data.
/// Safe to run on each start.
pub async fn apply(conn: &DatabaseConnection) -> Result<(), DbErr> {
    let manager = SchemaManager::new(conn);

    users::apply(&manager).await?;
    departments_table::apply(&manager).await?;
    patients::apply(&manager).await?;
    employees::apply(&manager).await?;
    appointments::apply(&manager).await?;
    prescriptions::apply(&manager).await?;
    medical_records::apply(&manager).await?;
    payroll::apply(&manager).await?;
    notices::apply(&manager).await?;

    if conn.get_database_backend() == DbBackend::Postgres {
        apply_updated_at_triggers(conn).await?;
    }

    seed_departments(conn).await?;

    Ok(())
}

async fn seed_departments(conn: &DatabaseConnection) -> Result<(), DbErr> {
    for name in DEFAULT_DEPARTMENTS {
        let existing = departments::Entity::find()
            .filter(departments::Column::Name.eq(name))
            .one(conn)
            .await?;
        if existing.is_some() {
            continue;
        }
        departments::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn apply_updated_at_triggers(conn: &DatabaseConnection) -> Result<(), DbErr> {
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        r#"
CREATE OR REPLACE FUNCTION set_updated_at()
RETURNS trigger AS $$
BEGIN
  NEW.updated_at = now();
  RETURN NEW;
END;
$$ LANGUAGE plpgsql;
"#
        .to_string(),
    ))
    .await?;

    for table in TIMESTAMPED_TABLES {
        let trigger_name = format!("trg_{}_set_updated_at", table);
        conn.execute(Statement::from_string(
            DbBackend::Postgres,
            format!(
                r#"
DO $$
BEGIN
  IF NOT EXISTS (
    SELECT 1
    FROM pg_trigger
    WHERE tgname = '{trigger_name}'
      AND tgrelid = '{table}'::regclass
  ) THEN
    EXECUTE 'CREATE TRIGGER {trigger_name}
             BEFORE UPDATE ON {table}
             FOR EACH ROW
             EXECUTE FUNCTION set_updated_at()';
  END IF;
END $$;
"#
            ),
        ))
        .await?;
    }

    Ok(())
}

/// `created_at`/`updated_at` pair shared by most tables.
fn timestamp_columns<T: Iden + 'static>(created: T, updated: T) -> [ColumnDef; 2] {
    [
        ColumnDef::new(created)
            .timestamp_with_time_zone()
            .not_null()
            .default(Expr::current_timestamp())
            .to_owned(),
        ColumnDef::new(updated)
            .timestamp_with_time_zone()
            .not_null()
            .default(Expr::current_timestamp())
            .to_owned(),
    ]
}

fn text_in<T: Iden + 'static>(column: T, values: &[&str]) -> SimpleExpr {
    Expr::col(column).is_in(values.iter().map(|value| ToString::to_string(value)))
}
