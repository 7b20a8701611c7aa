use sea_orm_migration::prelude::*;

use super::{departments_table::Departments, text_in, timestamp_columns, users::Users};

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("employees").await? {
        return Ok(());
    }

    let [created_at, updated_at] = timestamp_columns(Employees::CreatedAt, Employees::UpdatedAt);
    manager
        .create_table(
            Table::create()
                .table(Employees::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Employees::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Employees::UserId).integer().not_null())
                .col(ColumnDef::new(Employees::EmployeeId).string_len(50).not_null())
                .col(ColumnDef::new(Employees::DepartmentId).integer())
                .col(ColumnDef::new(Employees::Position).string_len(100).not_null())
                .col(ColumnDef::new(Employees::Specialization).string_len(100))
                .col(ColumnDef::new(Employees::HireDate).date().not_null())
                .col(ColumnDef::new(Employees::Salary).double())
                .col(
                    ColumnDef::new(Employees::Status)
                        .string_len(50)
                        .not_null()
                        .default("active")
                        .check(text_in(
                            Employees::Status,
                            &["active", "on_leave", "terminated"],
                        )),
                )
                .col(created_at)
                .col(updated_at)
                .foreign_key(
                    ForeignKey::create()
                        .name("employees_user_fk")
                        .from(Employees::Table, Employees::UserId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("employees_department_fk")
                        .from(Employees::Table, Employees::DepartmentId)
                        .to(Departments::Table, Departments::Id)
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .to_owned(),
        )
        .await?;

    for (name, column) in [
        ("employees_employee_id_unique", Employees::EmployeeId),
        ("employees_user_id_unique", Employees::UserId),
    ] {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name(name)
                    .table(Employees::Table)
                    .col(column)
                    .unique()
                    .to_owned(),
            )
            .await?;
    }

    Ok(())
}

#[derive(Iden)]
pub(super) enum Employees {
    Table,
    Id,
    UserId,
    EmployeeId,
    DepartmentId,
    Position,
    Specialization,
    HireDate,
    Salary,
    Status,
    CreatedAt,
    UpdatedAt,
}
